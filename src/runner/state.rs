use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::report::types::SessionOutcome;

/// Shared state for one `run()` invocation: the per-browser outcome map and
/// the completion fan-in that implements the join barrier. Created at run
/// entry, dropped once the summary has been rendered.
pub struct RunState {
    outcomes: Mutex<HashMap<String, SessionOutcome>>,
    done_tx: mpsc::Sender<()>,
}

impl RunState {
    /// Build the state for `sessions` browsers plus the receiving half of
    /// the completion channel.
    pub fn new(sessions: usize) -> (Self, mpsc::Receiver<()>) {
        // Capacity covers every signal, so completion handlers never block
        // on the barrier.
        let (done_tx, done_rx) = mpsc::channel(sessions.max(1));
        (
            Self {
                outcomes: Mutex::new(HashMap::new()),
                done_tx,
            },
            done_rx,
        )
    }

    /// Record a session's outcome under its display name.
    pub fn record(&self, name: &str, outcome: SessionOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(name.to_string(), outcome);
    }

    /// Signal that one session has fully completed. Called exactly once per
    /// browser, whatever the browser's fate.
    pub async fn session_done(&self) {
        // Send only fails when the receiver is gone, and the receiver
        // outlives the last signal.
        let _ = self.done_tx.send(()).await;
    }

    /// Copy of the outcome map, for summary rendering.
    pub fn snapshot(&self) -> HashMap<String, SessionOutcome> {
        self.outcomes.lock().unwrap().clone()
    }
}

/// Tag set attached to every session of a run. CI runs carry the CI marker
/// plus the build number; local runs a fixed marker plus a random numeric
/// id so the grid dashboard can group them.
pub fn run_tags(build: Option<&str>) -> Vec<String> {
    match build {
        Some(id) => vec!["travis".to_string(), id.to_string()],
        None => {
            let id: u32 = rand::thread_rng().gen_range(0..100_000_000);
            vec!["custom".to_string(), id.to_string()]
        }
    }
}
