use regex::Regex;

/// One entry of a priority-ordered classification table.
#[derive(Debug)]
pub struct Rule<T> {
    pub name: &'static str,
    pub pattern: Regex,
    pub result: T,
}

/// Ordered list of `(pattern, result)` pairs; the first matching rule wins.
#[derive(Debug)]
pub struct RuleTable<T> {
    rules: Vec<Rule<T>>,
}

impl<T: Copy> RuleTable<T> {
    /// Builds a table from static patterns. Patterns are matched
    /// case-insensitively.
    pub fn compile(entries: &[(&'static str, &'static str, T)]) -> Self {
        let rules = entries
            .iter()
            .map(|(name, pattern, result)| Rule {
                name,
                pattern: Regex::new(&format!("(?i){pattern}")).unwrap(),
                result: *result,
            })
            .collect();
        Self { rules }
    }

    pub fn classify(&self, text: &str) -> Option<T> {
        self.matching_rule(text).map(|rule| rule.result)
    }

    pub fn matching_rule(&self, text: &str) -> Option<&Rule<T>> {
        self.rules.iter().find(|rule| rule.pattern.is_match(text))
    }

    pub fn rule(&self, name: &str) -> Option<&Rule<T>> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|rule| rule.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_wins() {
        let table = RuleTable::compile(&[
            ("specific", r"\bred apple\b", 1),
            ("general", r"\bapple\b", 2),
        ]);

        assert_eq!(table.classify("a Red Apple please"), Some(1));
        assert_eq!(table.classify("an apple"), Some(2));
        assert_eq!(table.classify("a pear"), None);
        assert_eq!(table.matching_rule("apple").map(|r| r.name), Some("general"));
    }

    #[test]
    fn names_preserve_order() {
        let table = RuleTable::compile(&[("a", "x", 'a'), ("b", "y", 'b')]);
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(table.rule("b").is_some());
        assert!(table.rule("c").is_none());
    }
}
