//! The run orchestrator.

use std::sync::Arc;

use relay_protocol::{
    CompletionRequest, Event, EventKind, EventListener, ModelProviderPort, RelayError,
    RelayResult, RunId,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Lifecycle of one runner invocation. The terminal states are never left;
/// a consumed runner cannot be re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Running,
    Completed,
    Failed,
}

/// Orchestrates one execution of the agent capability.
///
/// A runner is transient: it mints its [`RunId`] at construction, carries the
/// listeners attached before the run, and is dropped once the run reaches a
/// terminal state. Listener registration takes `&mut self`, as does [`run`],
/// so attach/detach cannot overlap an in-flight run.
///
/// [`run`]: Runner::run
pub struct Runner {
    run_id: RunId,
    model: Option<String>,
    provider: Arc<dyn ModelProviderPort>,
    listeners: Vec<Arc<dyn EventListener>>,
    cancel: CancellationToken,
    state: RunState,
}

impl Runner {
    pub fn new(provider: Arc<dyn ModelProviderPort>, model: Option<String>) -> Self {
        Self {
            run_id: RunId::new(),
            model,
            provider,
            listeners: Vec::new(),
            cancel: CancellationToken::new(),
            state: RunState::Created,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Handle for cooperative cancellation. Cancelling it while the run is
    /// awaiting the capability resolves the run as failed.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn add_event_listener(&mut self, listener: Arc<dyn EventListener>) {
        self.listeners.push(listener);
    }

    /// Detach a listener by identity. No-op when it was never attached.
    pub fn remove_event_listener(&mut self, listener: &Arc<dyn EventListener>) {
        self.listeners
            .retain(|attached| !Arc::ptr_eq(attached, listener));
    }

    /// Deliver one event to every listener in attachment order, awaiting each
    /// before moving to the next.
    async fn emit(&self, kind: EventKind) {
        let event = Event::new(self.run_id.clone(), kind);
        for listener in &self.listeners {
            listener.on_event(&event).await;
        }
    }

    /// Drive the run to a terminal state.
    ///
    /// Emits `RunStarted`, invokes the capability (racing the cancellation
    /// token), then emits `RunCompleted` or `RunFailed`. The failure event is
    /// delivered before the error is returned, and its delivery cannot mask
    /// the run failure itself.
    #[instrument(skip(self, prompt), fields(run_id = %self.run_id))]
    pub async fn run(&mut self, prompt: impl Into<String>) -> RelayResult<String> {
        if self.state != RunState::Created {
            return Err(RelayError::InvalidState(format!(
                "runner already driven to {:?}",
                self.state
            )));
        }
        self.state = RunState::Running;

        let prompt = prompt.into();
        let model_label = self.model.clone().unwrap_or_else(|| "default".to_owned());
        self.emit(EventKind::RunStarted {
            prompt: prompt.clone(),
            model: model_label,
        })
        .await;

        let request = CompletionRequest {
            prompt,
            model: self.model.clone(),
        };
        let cancel = self.cancel.clone();
        let outcome = tokio::select! {
            outcome = self.provider.complete(request) => outcome,
            () = cancel.cancelled() => Err(RelayError::RunCancelled),
        };

        match outcome {
            Ok(response) => {
                self.state = RunState::Completed;
                self.emit(EventKind::RunCompleted {
                    response: response.clone(),
                })
                .await;
                debug!("run completed");
                Ok(response)
            }
            Err(error) => {
                self.state = RunState::Failed;
                self.emit(EventKind::RunFailed {
                    error: error.to_string(),
                })
                .await;
                warn!(%error, "run failed");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use relay_protocol::{
        CompletionRequest, Event, EventKind, EventListener, ModelProviderPort, RelayError,
        RelayResult,
    };

    use crate::provider::StubModelProvider;
    use crate::runner::{RunState, Runner};

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingListener {
        fn events(&self) -> Vec<Event> {
            self.events.lock().clone()
        }
    }

    #[async_trait]
    impl EventListener for RecordingListener {
        async fn on_event(&self, event: &Event) {
            self.events.lock().push(event.clone());
        }
    }

    /// Fails internally on every event; the failure is swallowed inside the
    /// listener, which is the whole point.
    struct BrokenListener {
        deliveries: Mutex<u32>,
    }

    #[async_trait]
    impl EventListener for BrokenListener {
        async fn on_event(&self, _event: &Event) {
            *self.deliveries.lock() += 1;
            let (sender, receiver) = tokio::sync::mpsc::channel::<()>(1);
            drop(receiver);
            if sender.send(()).await.is_err() {
                tracing::warn!("listener failed to forward event");
            }
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ModelProviderPort for FailingProvider {
        async fn complete(&self, _request: CompletionRequest) -> RelayResult<String> {
            Err(RelayError::Completion("provider exploded".to_owned()))
        }
    }

    struct HangingProvider;

    #[async_trait]
    impl ModelProviderPort for HangingProvider {
        async fn complete(&self, _request: CompletionRequest) -> RelayResult<String> {
            std::future::pending::<()>().await;
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn successful_run_emits_started_then_completed() -> Result<()> {
        let mut runner = Runner::new(Arc::new(StubModelProvider), Some("sonnet".to_owned()));
        let listener = Arc::new(RecordingListener::default());
        runner.add_event_listener(listener.clone());

        let response = runner.run("hello").await?;
        assert_eq!(response, "This is a response to: hello");
        assert_eq!(runner.state(), RunState::Completed);

        let events = listener.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.run_id == *runner.run_id()));
        assert_eq!(
            events[0].kind,
            EventKind::RunStarted {
                prompt: "hello".into(),
                model: "sonnet".into(),
            }
        );
        assert_eq!(
            events[1].kind,
            EventKind::RunCompleted {
                response: "This is a response to: hello".into(),
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_model_is_reported_as_default() -> Result<()> {
        let mut runner = Runner::new(Arc::new(StubModelProvider), None);
        let listener = Arc::new(RecordingListener::default());
        runner.add_event_listener(listener.clone());

        runner.run("hi").await?;

        let events = listener.events();
        assert!(matches!(
            &events[0].kind,
            EventKind::RunStarted { model, .. } if model == "default"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn failed_run_emits_run_failed_and_returns_the_error() {
        let mut runner = Runner::new(Arc::new(FailingProvider), None);
        let listener = Arc::new(RecordingListener::default());
        runner.add_event_listener(listener.clone());

        let error = runner.run("hello").await.unwrap_err();
        assert!(error.to_string().contains("provider exploded"));
        assert_eq!(runner.state(), RunState::Failed);

        let events = listener.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].kind, EventKind::RunStarted { .. }));
        assert!(matches!(
            &events[1].kind,
            EventKind::RunFailed { error } if error.contains("provider exploded")
        ));
    }

    #[tokio::test]
    async fn broken_listener_blocks_neither_later_listeners_nor_the_run() -> Result<()> {
        let mut runner = Runner::new(Arc::new(StubModelProvider), None);
        let broken = Arc::new(BrokenListener {
            deliveries: Mutex::new(0),
        });
        let recording = Arc::new(RecordingListener::default());
        runner.add_event_listener(broken.clone());
        runner.add_event_listener(recording.clone());

        let response = runner.run("hello").await?;
        assert_eq!(response, "This is a response to: hello");
        assert_eq!(*broken.deliveries.lock(), 2);
        assert_eq!(recording.events().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn listeners_receive_each_event_in_attachment_order() -> Result<()> {
        struct OrderListener {
            name: &'static str,
            log: Arc<Mutex<Vec<String>>>,
        }

        #[async_trait]
        impl EventListener for OrderListener {
            async fn on_event(&self, event: &Event) {
                self.log
                    .lock()
                    .push(format!("{}:{}", self.name, event.kind.tag()));
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut runner = Runner::new(Arc::new(StubModelProvider), None);
        runner.add_event_listener(Arc::new(OrderListener {
            name: "first",
            log: log.clone(),
        }));
        runner.add_event_listener(Arc::new(OrderListener {
            name: "second",
            log: log.clone(),
        }));

        runner.run("hi").await?;

        assert_eq!(
            *log.lock(),
            vec![
                "first:run_started",
                "second:run_started",
                "first:run_completed",
                "second:run_completed",
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn removed_listener_receives_nothing() -> Result<()> {
        let mut runner = Runner::new(Arc::new(StubModelProvider), None);
        let kept = Arc::new(RecordingListener::default());
        let removed = Arc::new(RecordingListener::default());
        runner.add_event_listener(kept.clone());
        let removed_dyn: Arc<dyn EventListener> = removed.clone();
        runner.add_event_listener(removed_dyn.clone());
        runner.remove_event_listener(&removed_dyn);

        runner.run("hi").await?;

        assert_eq!(kept.events().len(), 2);
        assert!(removed.events().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn run_without_listeners_still_returns_the_response() -> Result<()> {
        let mut runner = Runner::new(Arc::new(StubModelProvider), None);
        let response = runner.run("quiet").await?;
        assert_eq!(response, "This is a response to: quiet");
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_run_fails_with_run_cancelled() -> Result<()> {
        let mut runner = Runner::new(Arc::new(HangingProvider), None);
        let token = runner.cancellation_token();
        let listener = Arc::new(RecordingListener::default());
        runner.add_event_listener(listener.clone());

        let handle = tokio::spawn(async move { runner.run("hang forever").await });
        token.cancel();
        let outcome = handle.await?;
        assert!(matches!(outcome, Err(RelayError::RunCancelled)));

        let events = listener.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].kind, EventKind::RunStarted { .. }));
        assert!(matches!(
            &events[1].kind,
            EventKind::RunFailed { error } if error.contains("cancelled")
        ));
        Ok(())
    }

    #[tokio::test]
    async fn a_consumed_runner_rejects_a_second_run() -> Result<()> {
        let mut runner = Runner::new(Arc::new(StubModelProvider), None);
        runner.run("once").await?;

        let error = runner.run("twice").await.unwrap_err();
        assert!(matches!(error, RelayError::InvalidState(_)));
        assert_eq!(runner.state(), RunState::Completed);
        Ok(())
    }
}
