//! Batch completion: gather results and hand them to the caller.

use crate::queue::QueueState;
use buildq_core::BatchResult;
use tracing::{info, warn};

/// Callback receiving one result per submitted request, in submission order.
pub type CompletionHandler = Box<dyn FnOnce(Vec<BatchResult>) + Send>;

/// Consume a drained batch and return its results in submission order.
pub fn collect_results(state: QueueState) -> Vec<BatchResult> {
    let mut requests = state.requests;
    requests.sort_by_key(|r| r.sequence);

    requests
        .into_iter()
        .map(|request| {
            request.result.unwrap_or_else(|| {
                warn!(config = %request.config_id, "Finished request has no recorded result");
                BatchResult::failure(request.config_id, "build finished without a result")
            })
        })
        .collect()
}

/// Invoke the handler, or log the results when nobody is listening.
///
/// The queue must already be cleared when this runs; a panicking handler
/// propagates to the caller.
pub fn deliver(handler: Option<CompletionHandler>, results: Vec<BatchResult>) {
    let failed = results.iter().filter(|r| r.is_failure()).count();
    info!(total = results.len(), failed, "Build batch completed");

    match handler {
        Some(handler) => handler(results),
        None => {
            for result in &results {
                info!(
                    config = %result.config_id,
                    success = result.success,
                    message = %result.message,
                    "Unclaimed build result"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::JobRequest;
    use buildq_core::{ConfigId, TargetId};
    use std::sync::{Arc, Mutex};

    fn finished(sequence: usize, name: &str) -> JobRequest {
        let mut request = JobRequest::new(sequence, ConfigId::new(name), None);
        request.finish(BatchResult::success(ConfigId::new(name), format!("built {name}")));
        request
    }

    #[test]
    fn test_results_follow_submission_order() {
        let state = QueueState::new(
            TargetId::new("x"),
            vec![finished(0, "a"), finished(2, "c"), finished(1, "b")],
        );

        let results = collect_results(state);
        let ids: Vec<&str> = results.iter().map(|r| r.config_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_result_becomes_failure() {
        let mut request = JobRequest::new(0, ConfigId::new("ghost"), None);
        request.finished = true;
        let state = QueueState::new(TargetId::new("x"), vec![request]);

        let results = collect_results(state);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_failure());
    }

    #[test]
    fn test_deliver_invokes_handler_once() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let handler: CompletionHandler = Box::new(move |results| {
            sink.lock().unwrap().push(results.len());
        });

        deliver(
            Some(handler),
            vec![BatchResult::success(ConfigId::new("a"), "ok")],
        );

        assert_eq!(*received.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_deliver_without_handler_drops_results() {
        deliver(None, vec![BatchResult::failure(ConfigId::new("a"), "boom")]);
    }
}
