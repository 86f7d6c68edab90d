//! Periodic Hypixel online check for a list of tracked players.

pub mod notify;
pub mod tracker;

pub use notify::ChannelSink;
pub use tracker::{PresenceEvent, PresenceTracker, Status, TrackedPlayer};

use crate::apis::hypixel::PlayerRecord;
use crate::apis::{ApiResult, HypixelClient};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Where player records come from.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn player(&self, uuid: &str) -> ApiResult<Option<PlayerRecord>>;
}

#[async_trait]
impl StatusSource for HypixelClient {
    async fn player(&self, uuid: &str) -> ApiResult<Option<PlayerRecord>> {
        HypixelClient::player(self, uuid).await
    }
}

/// Where presence events go.
#[async_trait]
pub trait PresenceSink: Send + Sync {
    /// Human-readable name of the destination.
    fn describe(&self) -> String;
    async fn notify(&self, event: &PresenceEvent);
}

#[derive(Debug)]
pub struct HycheckState {
    pub tracker: PresenceTracker,
    pub interval: Duration,
    pub ignore_exceptions: bool,
}

struct LoopHandle {
    target: String,
    stop: CancellationToken,
    force: CancellationToken,
    task: JoinHandle<()>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning { target: String },
}

pub struct HycheckService {
    source: Arc<dyn StatusSource>,
    state: Arc<Mutex<HycheckState>>,
    runner: Mutex<Option<LoopHandle>>,
}

impl HycheckService {
    pub fn new(source: Arc<dyn StatusSource>, interval: Duration) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(HycheckState {
                tracker: PresenceTracker::new(),
                interval,
                ignore_exceptions: false,
            })),
            runner: Mutex::new(None),
        }
    }

    pub fn state(&self) -> &Mutex<HycheckState> {
        &self.state
    }

    /// Flips the ignore flag and returns the new value.
    pub async fn toggle_ignore_exceptions(&self) -> bool {
        let mut state = self.state.lock().await;
        state.ignore_exceptions = !state.ignore_exceptions;
        state.ignore_exceptions
    }

    /// Takes effect after the current wait.
    pub async fn set_interval(&self, interval: Duration) -> bool {
        if interval.is_zero() {
            return false;
        }
        self.state.lock().await.interval = interval;
        true
    }

    pub async fn interval(&self) -> Duration {
        self.state.lock().await.interval
    }

    pub async fn is_running(&self) -> bool {
        self.runner
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }

    pub async fn start(&self, sink: Arc<dyn PresenceSink>) -> StartOutcome {
        let mut runner = self.runner.lock().await;
        if let Some(handle) = runner.as_ref().filter(|h| !h.task.is_finished()) {
            return StartOutcome::AlreadyRunning {
                target: handle.target.clone(),
            };
        }

        let stop = CancellationToken::new();
        let force = CancellationToken::new();
        let target = sink.describe();
        info!("Starting online check loop, reporting to {}", target);

        let task = tokio::spawn(run_loop(
            Arc::clone(&self.state),
            Arc::clone(&self.source),
            sink,
            stop.clone(),
            force.clone(),
        ));
        *runner = Some(LoopHandle {
            target,
            stop,
            force,
            task,
        });
        StartOutcome::Started
    }

    /// Lets the current iteration finish, then ends the loop.
    pub async fn stop(&self) -> bool {
        match self.runner.lock().await.as_ref() {
            Some(handle) if !handle.task.is_finished() => {
                handle.stop.cancel();
                true
            }
            _ => false,
        }
    }

    /// Aborts the loop immediately, even mid-iteration.
    pub async fn force_stop(&self) -> bool {
        let Some(handle) = self.runner.lock().await.take() else {
            return false;
        };
        if handle.task.is_finished() {
            return false;
        }
        handle.force.cancel();
        if let Err(e) = handle.task.await {
            warn!("Online check loop ended abnormally: {}", e);
        }
        true
    }

    pub async fn add_player(&self, uuid: &str, name: &str) -> bool {
        self.state.lock().await.tracker.add(uuid, name)
    }

    pub async fn remove_player(&self, name: &str) -> bool {
        self.state.lock().await.tracker.remove_by_name(name).is_some()
    }

    pub async fn contains_player(&self, name: &str) -> bool {
        self.state.lock().await.tracker.contains_name(name)
    }

    /// Tracked names split into (online, offline).
    pub async fn checklist(&self) -> (Vec<String>, Vec<String>) {
        let state = self.state.lock().await;
        let (online, offline) = state.tracker.split_by_status();
        (
            online.into_iter().map(str::to_string).collect(),
            offline.into_iter().map(str::to_string).collect(),
        )
    }
}

async fn run_loop(
    state: Arc<Mutex<HycheckState>>,
    source: Arc<dyn StatusSource>,
    sink: Arc<dyn PresenceSink>,
    stop: CancellationToken,
    force: CancellationToken,
) {
    loop {
        let keep_going = tokio::select! {
            _ = force.cancelled() => {
                info!("Online check loop aborted");
                return;
            }
            keep_going = poll_once(&state, source.as_ref(), sink.as_ref()) => keep_going,
        };
        if !keep_going {
            return;
        }

        let interval = state.lock().await.interval;
        tokio::select! {
            _ = stop.cancelled() => {
                info!("Online check loop stopped");
                return;
            }
            _ = force.cancelled() => {
                info!("Online check loop aborted");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Checks every tracked player once. Returns false if polling must stop.
pub async fn poll_once(
    state: &Mutex<HycheckState>,
    source: &dyn StatusSource,
    sink: &dyn PresenceSink,
) -> bool {
    let (uuids, ignore_exceptions) = {
        let state = state.lock().await;
        (state.tracker.uuids(), state.ignore_exceptions)
    };
    debug!("Checking online status of {} players", uuids.len());

    for uuid in uuids {
        let event = match source.player(&uuid).await {
            Ok(Some(record)) => match record.is_online() {
                Some(online) => state.lock().await.tracker.observe(&uuid, online),
                None => {
                    debug!("Player {} hides their session times", uuid);
                    None
                }
            },
            Ok(None) => state.lock().await.tracker.remove_missing(&uuid),
            Err(e) => {
                error!("Online check for {} failed: {}", uuid, e);
                if ignore_exceptions {
                    continue;
                }
                sink.notify(&PresenceEvent::Halted {
                    error: e.to_string(),
                })
                .await;
                return false;
            }
        };

        if let Some(event) = event {
            sink.notify(&event).await;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::ApiError;
    use std::collections::{HashMap, VecDeque};

    /// Replays scripted responses per UUID; repeats the last one when exhausted.
    #[derive(Default)]
    struct ScriptedSource {
        script: std::sync::Mutex<HashMap<String, VecDeque<Option<(i64, i64)>>>>,
        fail: std::sync::atomic::AtomicBool,
    }

    impl ScriptedSource {
        fn with(uuid: &str, sessions: Vec<Option<(i64, i64)>>) -> Self {
            let source = Self::default();
            source
                .script
                .lock()
                .unwrap()
                .insert(uuid.to_string(), sessions.into());
            source
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn player(&self, uuid: &str) -> ApiResult<Option<PlayerRecord>> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(ApiError::Unsuccessful("Invalid API key".into()));
            }
            let mut script = self.script.lock().unwrap();
            let queue = script.entry(uuid.to_string()).or_default();
            let next = if queue.len() > 1 {
                queue.pop_front().flatten()
            } else {
                queue.front().copied().flatten()
            };
            Ok(next.map(|(login, logout)| PlayerRecord {
                last_login: Some(login),
                last_logout: Some(logout),
                ..Default::default()
            }))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: std::sync::Mutex<Vec<PresenceEvent>>,
    }

    #[async_trait]
    impl PresenceSink for RecordingSink {
        fn describe(&self) -> String {
            "#test".to_string()
        }

        async fn notify(&self, event: &PresenceEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn service(source: Arc<dyn StatusSource>) -> HycheckService {
        HycheckService::new(source, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_poll_fires_once_per_edge() {
        let source = ScriptedSource::with(
            "u1",
            vec![Some((2, 1)), Some((2, 1)), Some((2, 3)), Some((2, 3))],
        );
        let svc = service(Arc::new(source));
        svc.add_player("u1", "Fireboerd").await;
        let sink = RecordingSink::default();

        for _ in 0..4 {
            assert!(poll_once(svc.state(), svc.source.as_ref(), &sink).await);
        }

        let events = sink.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                PresenceEvent::CameOnline {
                    uuid: "u1".into(),
                    name: "Fireboerd".into()
                },
                PresenceEvent::WentOffline {
                    uuid: "u1".into(),
                    name: "Fireboerd".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_player_is_removed() {
        let svc = service(Arc::new(ScriptedSource::with("u1", vec![None])));
        svc.add_player("u1", "nobody").await;
        let sink = RecordingSink::default();

        assert!(poll_once(svc.state(), svc.source.as_ref(), &sink).await);
        assert!(!svc.contains_player("nobody").await);
        assert!(matches!(
            sink.events.lock().unwrap()[0],
            PresenceEvent::Removed { .. }
        ));
    }

    #[tokio::test]
    async fn test_error_halts_unless_ignored() {
        let source = Arc::new(ScriptedSource::default());
        source.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        let svc = service(source);
        svc.add_player("u1", "a").await;
        let sink = RecordingSink::default();

        assert!(!poll_once(svc.state(), svc.source.as_ref(), &sink).await);
        assert!(matches!(
            sink.events.lock().unwrap()[0],
            PresenceEvent::Halted { .. }
        ));

        assert!(svc.toggle_ignore_exceptions().await);
        let quiet = RecordingSink::default();
        assert!(poll_once(svc.state(), svc.source.as_ref(), &quiet).await);
        assert!(quiet.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let svc = service(Arc::new(ScriptedSource::default()));
        let sink: Arc<dyn PresenceSink> = Arc::new(RecordingSink::default());

        assert_eq!(svc.start(Arc::clone(&sink)).await, StartOutcome::Started);
        assert_eq!(
            svc.start(Arc::clone(&sink)).await,
            StartOutcome::AlreadyRunning {
                target: "#test".into()
            }
        );
        assert!(svc.is_running().await);

        assert!(svc.stop().await);
        for _ in 0..100 {
            if !svc.is_running().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!svc.is_running().await);
        assert!(!svc.force_stop().await);

        // A stopped loop can be started again and aborted
        assert_eq!(svc.start(sink).await, StartOutcome::Started);
        assert!(svc.force_stop().await);
        assert!(!svc.is_running().await);
    }

    #[tokio::test]
    async fn test_interval_rejects_zero() {
        let svc = service(Arc::new(ScriptedSource::default()));
        assert!(!svc.set_interval(Duration::ZERO).await);
        assert!(svc.set_interval(Duration::from_secs(90)).await);
        assert_eq!(svc.interval().await, Duration::from_secs(90));
    }
}
