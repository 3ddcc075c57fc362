use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;

use crate::{
    models::{InteractionSession, SessionKind, SessionPhase, SignalEvent},
    signals::detect_focus_signal,
    store::KeyValueStore,
};

use super::{
    history::SessionHistory,
    state::{MachineConfig, SessionMachine},
};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FocusSnapshot {
    pub phase: SessionPhase,
    pub session: Option<InteractionSession>,
    pub active_ms: u64,
    pub remaining_ms: Option<i64>,
}

impl FocusSnapshot {
    fn capture(machine: &SessionMachine, now: DateTime<Utc>) -> Self {
        let session = machine.current().cloned();
        Self {
            phase: machine.phase(),
            active_ms: session.as_ref().map(|s| s.active_ms(now)).unwrap_or(0),
            remaining_ms: session.as_ref().and_then(|s| s.remaining_ms(now)),
            session,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FocusEvent {
    StateChanged { snapshot: FocusSnapshot },
    Heartbeat { snapshot: FocusSnapshot },
    Signal { signal: SignalEvent },
    Completed { session: InteractionSession },
}

struct Ticker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Runs timed focus sessions on top of a [`SessionMachine`].
///
/// A ticker task re-checks the session once per `tick_interval` and completes
/// it when the timer runs out. Finished sessions are written to the store.
#[derive(Clone)]
pub struct FocusController {
    machine: Arc<Mutex<SessionMachine>>,
    store: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<FocusEvent>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    tick_interval: Duration,
    heartbeat_every_ticks: u32,
}

impl FocusController {
    pub fn new(store: Arc<dyn KeyValueStore>, history_cap: usize) -> Self {
        let debug_mode = std::env::var("COMPANION_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let history = SessionHistory::load(store.as_ref(), SessionKind::Focus, history_cap);
        let config = MachineConfig {
            history_cap,
            ..MachineConfig::default()
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            machine: Arc::new(Mutex::new(SessionMachine::with_history(
                SessionKind::Focus,
                config,
                history,
            ))),
            store,
            events,
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: Duration::from_secs(1),
            heartbeat_every_ticks: if debug_mode { 1 } else { 10 },
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FocusEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> FocusSnapshot {
        let guard = self.machine.lock().await;
        FocusSnapshot::capture(&guard, Utc::now())
    }

    pub async fn history(&self) -> Vec<InteractionSession> {
        let guard = self.machine.lock().await;
        guard.history().iter().cloned().collect()
    }

    pub async fn start(&self, duration_ms: u64) -> Result<FocusSnapshot> {
        if duration_ms == 0 {
            return Err(anyhow!("duration_ms must be greater than zero"));
        }

        let (snapshot, replaced) = {
            let mut guard = self.machine.lock().await;
            let now = Utc::now();
            let replaced = guard.phase().is_live();
            guard.start(None, Some(duration_ms), now)?;
            (FocusSnapshot::capture(&guard, now), replaced)
        };

        if replaced {
            self.persist_history().await;
        }
        self.spawn_ticker().await;
        self.emit(FocusEvent::StateChanged {
            snapshot: snapshot.clone(),
        });

        info!("Focus session started for {} ms", duration_ms);
        Ok(snapshot)
    }

    pub async fn pause(&self) -> Result<FocusSnapshot> {
        self.transition(|machine, now| machine.pause(now).map(|_| ()))
            .await
    }

    pub async fn resume(&self) -> Result<FocusSnapshot> {
        self.transition(|machine, now| machine.resume(now).map(|_| ()))
            .await
    }

    /// Explicit stop; the session is archived as completed.
    pub async fn stop(&self) -> Result<InteractionSession> {
        let session = {
            let mut guard = self.machine.lock().await;
            guard.complete(Utc::now())?
        };

        self.clear_ticker().await;
        self.persist_history().await;
        self.emit_state_changed().await;
        self.emit(FocusEvent::Completed {
            session: session.clone(),
        });
        Ok(session)
    }

    pub async fn cancel(&self) -> Result<InteractionSession> {
        let session = {
            let mut guard = self.machine.lock().await;
            guard.cancel(Utc::now())?
        };

        self.clear_ticker().await;
        self.persist_history().await;
        self.emit_state_changed().await;
        Ok(session)
    }

    /// Classifies a message sent during the session and records the signal.
    pub async fn observe(&self, text: &str) -> Option<SignalEvent> {
        let kind = detect_focus_signal(text)?;
        let event = {
            let mut guard = self.machine.lock().await;
            if !guard.record_signal(kind, Some(text.to_string()), Utc::now()) {
                return None;
            }
            guard
                .current()
                .and_then(|session| session.signals.last().cloned())?
        };

        info!("Focus signal detected: {}", kind.as_str());
        self.emit(FocusEvent::Signal {
            signal: event.clone(),
        });
        Some(event)
    }

    /// Drops archived sessions both in memory and in the store.
    pub async fn clear_history(&self) -> Result<()> {
        let history = {
            let mut guard = self.machine.lock().await;
            guard.history_mut().clear();
            guard.history().clone()
        };
        save_history(self.store.clone(), history).await
    }

    /// Stops the ticker task. Clearing an already-cleared ticker is a no-op.
    pub async fn clear_ticker(&self) {
        if let Some(ticker) = self.ticker.lock().await.take() {
            ticker.cancel.cancel();
            ticker.handle.abort();
        }
    }

    pub async fn ticker_running(&self) -> bool {
        self.ticker
            .lock()
            .await
            .as_ref()
            .is_some_and(|ticker| !ticker.handle.is_finished())
    }

    async fn transition<F>(&self, apply: F) -> Result<FocusSnapshot>
    where
        F: FnOnce(&mut SessionMachine, DateTime<Utc>) -> Result<(), super::TransitionError>,
    {
        let snapshot = {
            let mut guard = self.machine.lock().await;
            let now = Utc::now();
            apply(&mut *guard, now)?;
            FocusSnapshot::capture(&guard, now)
        };
        self.emit(FocusEvent::StateChanged {
            snapshot: snapshot.clone(),
        });
        Ok(snapshot)
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(previous) = ticker_guard.take() {
            previous.cancel.cancel();
            previous.handle.abort();
        }

        let machine = self.machine.clone();
        let store = self.store.clone();
        let events = self.events.clone();
        let tick_interval = self.tick_interval;
        let heartbeat_every = self.heartbeat_every_ticks.max(1);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            let mut ticks: u32 = 0;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let now = Utc::now();
                let (finished, snapshot, history) = {
                    let mut guard = machine.lock().await;
                    if !guard.phase().is_live() {
                        break;
                    }
                    let finished = guard.tick(now);
                    let history = finished.as_ref().map(|_| guard.history().clone());
                    (finished, FocusSnapshot::capture(&guard, now), history)
                };

                if let Some(session) = finished {
                    if let Some(history) = history {
                        if let Err(err) = save_history(store.clone(), history).await {
                            error!("Failed to persist focus history: {err:#}");
                        }
                    }
                    info!("Focus session {} ran to completion", session.id);
                    let _ = events.send(FocusEvent::StateChanged { snapshot });
                    let _ = events.send(FocusEvent::Completed { session });
                    break;
                }

                ticks = ticks.wrapping_add(1);
                if ticks % heartbeat_every == 0 && snapshot.phase == SessionPhase::Active {
                    let _ = events.send(FocusEvent::Heartbeat { snapshot });
                }
            }
        });

        *ticker_guard = Some(Ticker { handle, cancel });
    }

    async fn persist_history(&self) {
        let history = self.machine.lock().await.history().clone();
        if let Err(err) = save_history(self.store.clone(), history).await {
            error!("Failed to persist focus history: {err:#}");
        }
    }

    async fn emit_state_changed(&self) {
        let snapshot = self.snapshot().await;
        self.emit(FocusEvent::StateChanged { snapshot });
    }

    fn emit(&self, event: FocusEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Store backends may block on disk or a worker thread, so writes leave the
/// async worker.
async fn save_history(store: Arc<dyn KeyValueStore>, history: SessionHistory) -> Result<()> {
    tokio::task::spawn_blocking(move || history.save(store.as_ref(), SessionKind::Focus))
        .await
        .map_err(|err| anyhow!("focus history writer failed: {err}"))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignalKind;
    use crate::store::MemoryStore;

    fn controller() -> (FocusController, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let controller = FocusController::new(store.clone(), 50);
        (controller, store)
    }

    #[tokio::test]
    async fn start_pause_resume_stop() {
        let (focus, store) = controller();

        let started = focus.start(25 * 60_000).await.unwrap();
        assert_eq!(started.phase, SessionPhase::Active);
        assert!(focus.ticker_running().await);

        assert_eq!(focus.pause().await.unwrap().phase, SessionPhase::Paused);
        assert!(focus.pause().await.is_err());
        assert_eq!(focus.resume().await.unwrap().phase, SessionPhase::Active);

        let done = focus.stop().await.unwrap();
        assert_eq!(done.phase, SessionPhase::Completed);
        assert!(!focus.ticker_running().await);
        assert_eq!(focus.snapshot().await.phase, SessionPhase::Idle);

        let reloaded = SessionHistory::load(store.as_ref(), SessionKind::Focus, 50);
        assert_eq!(reloaded.latest().map(|s| s.id.clone()), Some(done.id));
    }

    #[tokio::test]
    async fn zero_duration_is_rejected() {
        let (focus, _) = controller();
        assert!(focus.start(0).await.is_err());
        assert_eq!(focus.snapshot().await.phase, SessionPhase::Idle);
    }

    #[tokio::test]
    async fn clearing_the_ticker_twice_is_harmless() {
        let (focus, _) = controller();
        focus.clear_ticker().await;
        focus.start(60_000).await.unwrap();
        focus.clear_ticker().await;
        focus.clear_ticker().await;

        assert!(!focus.ticker_running().await);
        assert_eq!(focus.snapshot().await.phase, SessionPhase::Active);
    }

    #[tokio::test]
    async fn timer_expiry_completes_the_session() {
        let (focus, store) = controller();
        let focus = focus.with_tick_interval(Duration::from_millis(10));
        let mut events = focus.subscribe();

        focus.start(30).await.unwrap();

        let completed = time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(FocusEvent::Completed { session }) = events.recv().await {
                    return session;
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(completed.phase, SessionPhase::Completed);
        assert_eq!(focus.snapshot().await.phase, SessionPhase::Idle);
        assert_eq!(
            SessionHistory::load(store.as_ref(), SessionKind::Focus, 50).len(),
            1
        );
    }

    #[tokio::test]
    async fn restarting_archives_the_previous_session() {
        let (focus, store) = controller();
        let first = focus.start(60_000).await.unwrap().session.unwrap().id;
        focus.start(60_000).await.unwrap();

        let history = SessionHistory::load(store.as_ref(), SessionKind::Focus, 50);
        let archived = history.latest().unwrap();
        assert_eq!(archived.id, first);
        assert_eq!(archived.phase, SessionPhase::Cancelled);
        focus.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn observe_records_signals_only_during_a_session() {
        let (focus, _) = controller();
        assert!(focus.observe("I can't focus right now").await.is_none());

        focus.start(60_000).await.unwrap();
        let signal = focus.observe("I can't focus right now").await.unwrap();
        assert_eq!(signal.kind, SignalKind::Distraction);
        assert!(focus.observe("just writing").await.is_none());

        let snapshot = focus.snapshot().await;
        assert_eq!(snapshot.session.unwrap().signals.len(), 1);
        focus.cancel().await.unwrap();
    }

    /// Sleeps on every write.
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    impl KeyValueStore for SlowStore {
        fn get_raw(&self, key: &str) -> Option<String> {
            self.inner.get_raw(key)
        }

        fn set_raw(&self, key: &str, value: String) -> Result<()> {
            std::thread::sleep(self.delay);
            self.inner.set_raw(key, value)
        }

        fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
            self.inner.keys_with_prefix(prefix)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    #[tokio::test]
    async fn slow_history_writes_do_not_stall_other_tasks() {
        let store = Arc::new(SlowStore {
            inner: MemoryStore::new(),
            delay: Duration::from_millis(400),
        });
        let focus = FocusController::new(store.clone(), 50);
        focus.start(60_000).await.unwrap();

        let started = std::time::Instant::now();
        let (stopped, woke_after) = tokio::join!(focus.stop(), async {
            time::sleep(Duration::from_millis(20)).await;
            started.elapsed()
        });
        stopped.unwrap();

        assert!(woke_after < Duration::from_millis(300), "woke after {woke_after:?}");
        assert_eq!(SessionHistory::load(store.as_ref(), SessionKind::Focus, 50).len(), 1);
        focus.clear_ticker().await;
    }

    #[tokio::test]
    async fn clear_history_empties_memory_and_store() {
        let (focus, store) = controller();
        focus.start(60_000).await.unwrap();
        focus.stop().await.unwrap();
        assert_eq!(focus.history().await.len(), 1);

        focus.clear_history().await.unwrap();
        assert!(focus.history().await.is_empty());
        assert!(SessionHistory::load(store.as_ref(), SessionKind::Focus, 50).is_empty());
    }
}
