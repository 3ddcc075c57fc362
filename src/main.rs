fn main() {
    companion_lib::run()
}
