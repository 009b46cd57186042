//! Execution poller — drives a query from submission to a terminal state.
//!
//! A submitted query is polled at a fixed interval (no backoff, no attempt
//! cap) until the service reports a terminal state. The first status check
//! happens immediately after submission; the interval sleep is the only
//! implementation-controlled suspension in the library and is cancelled only
//! by dropping the calling task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_POLL_INTERVAL, QueryContext};
use crate::error::{Error, Result};
use crate::service::QueryService;
use crate::types::{Event, ExecutionId, ExecutionState};

/// Polls a single query execution to completion
pub struct ExecutionPoller {
    service: Arc<dyn QueryService>,
    context: QueryContext,
    poll_interval: Duration,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl ExecutionPoller {
    /// Create a poller over the given service handle and execution context
    pub fn new(service: Arc<dyn QueryService>, context: QueryContext) -> Self {
        Self {
            service,
            context,
            poll_interval: DEFAULT_POLL_INTERVAL,
            event_tx: None,
        }
    }

    /// Override the fixed poll interval (default 1000 ms).
    ///
    /// Mainly useful for deterministic tests; production callers should keep
    /// the default to avoid hammering the service status endpoint.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Attach an event channel for lifecycle notifications
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.event_tx {
            tx.send(event).ok();
        }
    }

    /// Submit a query and poll until it reaches a terminal state.
    ///
    /// Resolves with the execution identifier on `SUCCEEDED`. Every other
    /// terminal classification fails with a `query error` carrying the
    /// service-reported reason (or a synthesized one). Transport errors from
    /// submit or status calls propagate wrapped with the underlying message
    /// and are not retried at this layer.
    pub async fn submit_and_wait(&self, sql: &str) -> Result<ExecutionId> {
        let id = self.submit(sql).await?;

        loop {
            let status = self
                .service
                .get_status(&id)
                .await
                .map_err(|e| Error::query(e.to_string()))?;

            debug!(execution_id = %id, state = %status.state, "Polled execution status");
            self.emit(Event::PollState {
                id: id.clone(),
                state: status.state.to_string(),
            });

            match status.state {
                ExecutionState::Succeeded => {
                    info!(execution_id = %id, "Query succeeded");
                    self.emit(Event::QueryCompleted { id: id.clone() });
                    return Ok(id);
                }
                ExecutionState::Failed => {
                    let reason = status
                        .reason
                        .unwrap_or_else(|| "Unknown reason".to_string());
                    return self.fail(&id, reason);
                }
                ExecutionState::Cancelled => {
                    return self.fail(&id, "cancelled".to_string());
                }
                ExecutionState::Unknown(raw) => {
                    return self.fail(&id, format!("unknown state: {}", raw));
                }
                ExecutionState::Queued | ExecutionState::Running => {
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn submit(&self, sql: &str) -> Result<ExecutionId> {
        debug!(workgroup = %self.context.workgroup, "Submitting query");

        let id = self
            .service
            .submit_query(sql, &self.context)
            .await
            .map_err(|e| Error::query(e.to_string()))?
            .ok_or_else(|| Error::query("no execution id"))?;

        info!(execution_id = %id, "Query submitted");
        self.emit(Event::QuerySubmitted { id: id.clone() });

        Ok(id)
    }

    fn fail(&self, id: &ExecutionId, reason: String) -> Result<ExecutionId> {
        warn!(execution_id = %id, reason = %reason, "Query failed");
        self.emit(Event::QueryFailed {
            id: id.clone(),
            reason: reason.clone(),
        });
        Err(Error::Query { reason })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExecutionStatus, ResultPage};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted QueryService: hands out canned statuses in order and counts
    /// every call.
    struct ScriptedService {
        submit_result: Option<ExecutionId>,
        statuses: Mutex<Vec<ExecutionStatus>>,
        submit_calls: AtomicUsize,
        status_calls: AtomicUsize,
        submit_error: Option<String>,
    }

    impl ScriptedService {
        fn new(statuses: Vec<ExecutionStatus>) -> Self {
            Self {
                submit_result: Some(ExecutionId::from("exec-1")),
                statuses: Mutex::new(statuses),
                submit_calls: AtomicUsize::new(0),
                status_calls: AtomicUsize::new(0),
                submit_error: None,
            }
        }

        fn without_execution_id() -> Self {
            let mut s = Self::new(vec![]);
            s.submit_result = None;
            s
        }

        fn failing_submit(message: &str) -> Self {
            let mut s = Self::new(vec![]);
            s.submit_error = Some(message.to_string());
            s
        }
    }

    #[async_trait]
    impl QueryService for ScriptedService {
        async fn submit_query(
            &self,
            _sql: &str,
            _context: &QueryContext,
        ) -> Result<Option<ExecutionId>> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(msg) = &self.submit_error {
                return Err(Error::Storage(msg.clone()));
            }
            Ok(self.submit_result.clone())
        }

        async fn get_status(&self, _id: &ExecutionId) -> Result<ExecutionStatus> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.is_empty() {
                return Err(Error::Storage("status script exhausted".into()));
            }
            Ok(statuses.remove(0))
        }

        async fn fetch_page(
            &self,
            _id: &ExecutionId,
            _next_token: Option<&str>,
            _page_size: usize,
        ) -> Result<Option<ResultPage>> {
            unimplemented!("not used by poller tests")
        }
    }

    fn poller(service: Arc<ScriptedService>) -> ExecutionPoller {
        ExecutionPoller::new(service, QueryContext::default())
            .with_poll_interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn resolves_after_queued_queued_running_succeeded() {
        let service = Arc::new(ScriptedService::new(vec![
            ExecutionStatus::new(ExecutionState::Queued),
            ExecutionStatus::new(ExecutionState::Queued),
            ExecutionStatus::new(ExecutionState::Running),
            ExecutionStatus::new(ExecutionState::Succeeded),
        ]));

        let id = poller(service.clone())
            .submit_and_wait("SELECT 1")
            .await
            .unwrap();

        assert_eq!(id, ExecutionId::from("exec-1"));
        assert_eq!(service.submit_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            service.status_calls.load(Ordering::SeqCst),
            4,
            "one status call per scripted state"
        );
    }

    #[tokio::test]
    async fn immediate_success_needs_a_single_status_call() {
        let service = Arc::new(ScriptedService::new(vec![ExecutionStatus::new(
            ExecutionState::Succeeded,
        )]));

        poller(service.clone())
            .submit_and_wait("SELECT 1")
            .await
            .unwrap();

        assert_eq!(service.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_state_carries_service_reason() {
        let service = Arc::new(ScriptedService::new(vec![ExecutionStatus::with_reason(
            ExecutionState::Failed,
            "Table not found",
        )]));

        let err = poller(service).submit_and_wait("SELECT 1").await.unwrap_err();
        assert!(matches!(&err, Error::Query { reason } if reason == "Table not found"));
    }

    #[tokio::test]
    async fn failed_state_without_reason_uses_placeholder() {
        let service = Arc::new(ScriptedService::new(vec![ExecutionStatus::new(
            ExecutionState::Failed,
        )]));

        let err = poller(service).submit_and_wait("SELECT 1").await.unwrap_err();
        assert!(matches!(&err, Error::Query { reason } if reason == "Unknown reason"));
    }

    #[tokio::test]
    async fn cancelled_state_fails_with_cancelled_reason() {
        let service = Arc::new(ScriptedService::new(vec![ExecutionStatus::new(
            ExecutionState::Cancelled,
        )]));

        let err = poller(service).submit_and_wait("SELECT 1").await.unwrap_err();
        assert!(matches!(&err, Error::Query { reason } if reason == "cancelled"));
    }

    #[tokio::test]
    async fn unrecognized_state_fails_and_names_the_value() {
        let service = Arc::new(ScriptedService::new(vec![ExecutionStatus::new(
            ExecutionState::Unknown("THROTTLED".into()),
        )]));

        let err = poller(service).submit_and_wait("SELECT 1").await.unwrap_err();
        assert!(matches!(&err, Error::Query { reason } if reason == "unknown state: THROTTLED"));
    }

    #[tokio::test]
    async fn missing_execution_id_fails_before_any_poll() {
        let service = Arc::new(ScriptedService::without_execution_id());

        let err = poller(service.clone())
            .submit_and_wait("SELECT 1")
            .await
            .unwrap_err();

        assert!(matches!(&err, Error::Query { reason } if reason == "no execution id"));
        assert_eq!(
            service.status_calls.load(Ordering::SeqCst),
            0,
            "contract violation must not trigger polling"
        );
    }

    #[tokio::test]
    async fn submit_transport_error_is_wrapped_with_its_message() {
        let service = Arc::new(ScriptedService::failing_submit("connection refused"));

        let err = poller(service).submit_and_wait("SELECT 1").await.unwrap_err();
        match err {
            Error::Query { reason } => assert!(reason.contains("connection refused")),
            other => panic!("expected Query error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn poll_transport_error_is_wrapped_not_retried() {
        // One QUEUED, then the script runs out and the mock errors
        let service = Arc::new(ScriptedService::new(vec![ExecutionStatus::new(
            ExecutionState::Queued,
        )]));

        let err = poller(service.clone())
            .submit_and_wait("SELECT 1")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Query { .. }));
        assert_eq!(
            service.status_calls.load(Ordering::SeqCst),
            2,
            "the failing status call must not be retried"
        );
    }

    #[tokio::test]
    async fn events_trace_the_lifecycle_in_order() {
        let service = Arc::new(ScriptedService::new(vec![
            ExecutionStatus::new(ExecutionState::Running),
            ExecutionStatus::new(ExecutionState::Succeeded),
        ]));
        let (event_tx, mut event_rx) = broadcast::channel(16);

        poller(service)
            .with_events(event_tx)
            .submit_and_wait("SELECT 1")
            .await
            .unwrap();

        assert!(matches!(
            event_rx.try_recv().unwrap(),
            Event::QuerySubmitted { .. }
        ));
        assert!(matches!(
            event_rx.try_recv().unwrap(),
            Event::PollState { state, .. } if state == "RUNNING"
        ));
        assert!(matches!(
            event_rx.try_recv().unwrap(),
            Event::PollState { state, .. } if state == "SUCCEEDED"
        ));
        assert!(matches!(
            event_rx.try_recv().unwrap(),
            Event::QueryCompleted { .. }
        ));
    }
}
