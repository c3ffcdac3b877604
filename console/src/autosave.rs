// Autosave trigger.
//
// A single background task owns the debounce window. Every dirty
// notification resets the deadline; the save fires only after the editor
// has been quiet for the full window. Saves that fail are logged and
// reported, never retried here — the next edit re-arms the trigger, and
// the write-ahead cache already holds the latest snapshot.

use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::models::requests::SaveApplicationRequest;
use crate::persistence::gateway::{PersistenceGateway, SaveError, SaveOutcome};

/// The seam between the trigger and the persistence layer. Production wires
/// in the gateway; tests wire in counting stubs.
#[async_trait]
pub trait SavePort: Send + Sync {
    async fn save(&self, req: &SaveApplicationRequest) -> Result<SaveOutcome, SaveError>;
}

#[async_trait]
impl SavePort for PersistenceGateway {
    async fn save(&self, req: &SaveApplicationRequest) -> Result<SaveOutcome, SaveError> {
        PersistenceGateway::save(self, req).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AutosaveOutcome {
    /// Carries the request that was written, so the session can reset its
    /// dirty baseline against what actually landed rather than whatever the
    /// snapshot looks like by the time the confirmation is drained.
    Saved(SaveApplicationRequest),
    /// Another save for the application was in flight when the window closed.
    Skipped,
    Failed(String),
}

enum Msg {
    Dirty(SaveApplicationRequest),
    /// Save immediately with the latest request, ignoring the window.
    Flush,
    Shutdown,
}

pub struct AutosaveTrigger {
    tx: mpsc::UnboundedSender<Msg>,
}

impl AutosaveTrigger {
    /// Spawn the trigger task. Outcomes stream out the returned receiver so
    /// the session can reset its dirty state after a confirmed save.
    pub fn spawn(
        port: Arc<dyn SavePort>,
        debounce: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<AutosaveOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel::<Msg>();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel::<AutosaveOutcome>();

        tokio::spawn(run_trigger(port, debounce, rx, outcome_tx));

        (Self { tx }, outcome_rx)
    }

    /// A field changed and the snapshot now differs from the last save.
    /// Re-arms the debounce window with the latest full request.
    pub fn notify_dirty(&self, req: SaveApplicationRequest) {
        let _ = self.tx.send(Msg::Dirty(req));
    }

    /// Collapse the window and save now (tab change, explicit save).
    pub fn flush(&self) {
        let _ = self.tx.send(Msg::Flush);
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Msg::Shutdown);
    }
}

async fn run_trigger(
    port: Arc<dyn SavePort>,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<Msg>,
    outcomes: mpsc::UnboundedSender<AutosaveOutcome>,
) {
    let mut pending: Option<SaveApplicationRequest> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        let armed = deadline;
        let fire = async move {
            match armed {
                Some(at) => sleep_until(at).await,
                // No pending edit: park until a message arrives.
                None => futures::future::pending::<()>().await,
            }
        };

        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Some(Msg::Dirty(req)) => {
                        pending = Some(req);
                        deadline = Some(Instant::now() + debounce);
                    }
                    Some(Msg::Flush) => {
                        if pending.is_some() {
                            deadline = Some(Instant::now());
                        }
                    }
                    Some(Msg::Shutdown) | None => break,
                }
            }
            _ = fire => {
                deadline = None;
                if let Some(req) = pending.take() {
                    let outcome = perform_save(port.as_ref(), &req).await;
                    let _ = outcomes.send(outcome);
                }
            }
        }
    }
}

async fn perform_save(port: &dyn SavePort, req: &SaveApplicationRequest) -> AutosaveOutcome {
    match port.save(req).await {
        Ok(SaveOutcome::Saved) => {
            info!(
                "[PHASE: autosave] [STEP: save] Autosaved application {}",
                req.application_id
            );
            AutosaveOutcome::Saved(req.clone())
        }
        Ok(SaveOutcome::SkippedInFlight) => AutosaveOutcome::Skipped,
        Err(e) => {
            warn!(
                "[PHASE: autosave] [STEP: save] Autosave failed for {}: {}",
                req.application_id, e
            );
            AutosaveOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::tabs::Tab;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::timeout;

    struct CountingPort {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingPort {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl SavePort for CountingPort {
        async fn save(&self, _req: &SaveApplicationRequest) -> Result<SaveOutcome, SaveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SaveError::Remote(anyhow::anyhow!("backend down")));
            }
            Ok(SaveOutcome::Saved)
        }
    }

    fn request(name: &str) -> SaveApplicationRequest {
        SaveApplicationRequest {
            application_id: "app-1".to_string(),
            form_data: serde_json::json!({ "businessName": name }),
            progress: 15,
            active_tab: Tab::Business,
        }
    }

    #[tokio::test]
    async fn rapid_edits_inside_the_window_produce_one_save() {
        let port = Arc::new(CountingPort::new());
        let (trigger, mut outcomes) =
            AutosaveTrigger::spawn(port.clone(), Duration::from_millis(40));

        trigger.notify_dirty(request("A"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.notify_dirty(request("Ac"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.notify_dirty(request("Acme"));

        let outcome = timeout(Duration::from_millis(500), outcomes.recv())
            .await
            .expect("outcome within deadline")
            .expect("channel open");
        match outcome {
            AutosaveOutcome::Saved(saved) => assert_eq!(
                saved.form_data,
                serde_json::json!({ "businessName": "Acme" }),
                "the save must carry the latest edit"
            ),
            other => panic!("expected a confirmed save, got {:?}", other),
        }
        assert_eq!(port.calls.load(Ordering::SeqCst), 1, "window must coalesce edits");
    }

    #[tokio::test]
    async fn no_dirty_notification_means_no_save() {
        let port = Arc::new(CountingPort::new());
        let (_trigger, mut outcomes) =
            AutosaveTrigger::spawn(port.clone(), Duration::from_millis(20));

        let outcome = timeout(Duration::from_millis(120), outcomes.recv()).await;
        assert!(outcome.is_err(), "idle trigger must stay quiet");
        assert_eq!(port.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn flush_saves_without_waiting_for_the_window() {
        let port = Arc::new(CountingPort::new());
        let (trigger, mut outcomes) =
            AutosaveTrigger::spawn(port.clone(), Duration::from_secs(30));

        trigger.notify_dirty(request("Acme"));
        trigger.flush();

        let outcome = timeout(Duration::from_millis(500), outcomes.recv())
            .await
            .expect("flush must not wait for the full window")
            .expect("channel open");
        assert!(matches!(outcome, AutosaveOutcome::Saved(_)));
        assert_eq!(port.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn flush_with_nothing_pending_is_a_no_op() {
        let port = Arc::new(CountingPort::new());
        let (trigger, mut outcomes) =
            AutosaveTrigger::spawn(port.clone(), Duration::from_millis(20));

        trigger.flush();
        let outcome = timeout(Duration::from_millis(100), outcomes.recv()).await;
        assert!(outcome.is_err());
        assert_eq!(port.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_save_is_reported_not_retried() {
        let port = Arc::new(CountingPort::failing());
        let (trigger, mut outcomes) =
            AutosaveTrigger::spawn(port.clone(), Duration::from_millis(20));

        trigger.notify_dirty(request("Acme"));

        let outcome = timeout(Duration::from_millis(500), outcomes.recv())
            .await
            .expect("outcome within deadline")
            .expect("channel open");
        assert!(matches!(outcome, AutosaveOutcome::Failed(_)));

        // No retry without a fresh dirty notification.
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(port.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn edits_after_a_save_re_arm_the_window() {
        let port = Arc::new(CountingPort::new());
        let (trigger, mut outcomes) =
            AutosaveTrigger::spawn(port.clone(), Duration::from_millis(20));

        trigger.notify_dirty(request("Acme"));
        let first = timeout(Duration::from_millis(500), outcomes.recv())
            .await
            .expect("first outcome")
            .expect("channel open");
        assert!(matches!(first, AutosaveOutcome::Saved(_)));

        trigger.notify_dirty(request("Acme LLC"));
        let second = timeout(Duration::from_millis(500), outcomes.recv())
            .await
            .expect("second outcome")
            .expect("channel open");
        assert!(matches!(second, AutosaveOutcome::Saved(_)));
        assert_eq!(port.calls.load(Ordering::SeqCst), 2);
    }
}
