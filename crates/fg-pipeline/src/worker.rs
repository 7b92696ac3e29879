//! Background execution of the pipeline.

use std::sync::Arc;
use tracing::error;

use crate::job::{job_channel, JobHandle, JobStatus};
use crate::pipeline::{AttributePipeline, PipelineInputs};

/// Spawns one dedicated worker for a post-assertion handoff.
///
/// The worker publishes a snapshot at each checkpoint and a terminal
/// snapshot when it finishes; it is never retried, never times out beyond
/// the transport default, and cannot be cancelled once started.
#[must_use]
pub fn spawn_job(pipeline: Arc<AttributePipeline>, inputs: PipelineInputs) -> JobHandle {
    let (tx, handle) = job_channel();

    tokio::spawn(async move {
        let progress_tx = tx.clone();
        let result = pipeline
            .execute_with_progress(&inputs, &move |stage| {
                // A send only fails when every poller is gone; the job
                // finishes either way.
                let _ = progress_tx.send(JobStatus::Running(stage));
            })
            .await;

        let terminal = match result {
            Ok(redirect) => JobStatus::Done(redirect),
            Err(e) => {
                error!(error = %e, "attribute pipeline failed");
                JobStatus::Failed(e.to_string())
            }
        };
        let _ = tx.send(terminal);
    });

    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SoapClient;
    use crate::error::PipelineError;
    use async_trait::async_trait;
    use std::time::Duration;

    const ENVELOPE: &str = concat!(
        r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">"#,
        "<soapenv:Body/></soapenv:Envelope>"
    );

    struct SlowClient {
        fail_guard: bool,
    }

    #[async_trait]
    impl SoapClient for SlowClient {
        async fn post_envelope(
            &self,
            url: &str,
            _envelope: &str,
            _present_identity: bool,
        ) -> Result<String, PipelineError> {
            // Let the poller observe intermediate checkpoints.
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail_guard && !url.contains("/aa") {
                return Err(PipelineError::Connection("guard unreachable".into()));
            }
            Ok(ENVELOPE.to_string())
        }
    }

    fn inputs() -> PipelineInputs {
        PipelineInputs {
            guard_session_id: "GUARD-3".to_string(),
            guard_entity_id: "https://sp.example.com".to_string(),
            attribute_consumer_url: "https://app/acs".to_string(),
            attribute_authority_url: "https://idp/aa".to_string(),
            podder_url: "https://app/podder".to_string(),
            idp_provider_id: "https://idp".to_string(),
            name_identifier: "user@example.org".to_string(),
            authn_response_xml: "<R/>".to_string(),
        }
    }

    async fn observe(mut handle: JobHandle) -> Vec<JobStatus> {
        let mut snapshots = vec![handle.snapshot()];
        while !snapshots.last().unwrap().is_completed() {
            match handle.changed().await {
                Some(snapshot) => snapshots.push(snapshot),
                None => break,
            }
        }
        snapshots
    }

    #[tokio::test]
    async fn observed_progress_is_a_non_decreasing_quarter_sequence() {
        let pipeline = Arc::new(AttributePipeline::new(Arc::new(SlowClient {
            fail_guard: false,
        })));
        let handle = spawn_job(pipeline, inputs());

        let snapshots = observe(handle).await;

        // Completed only at the very last observation.
        let (terminal, running) = snapshots.split_last().unwrap();
        assert!(terminal.is_completed());
        assert!(running.iter().all(|s| !s.is_completed()));
        assert!(matches!(terminal, JobStatus::Done(redirect)
            if redirect.url == "https://app/podder?id=GUARD-3"));

        // Whatever subset of checkpoints we saw, it never goes backwards.
        let percents: Vec<u8> = running.iter().filter_map(JobStatus::percent).collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
        assert!(percents.iter().all(|p| [0u8, 25, 50, 75].contains(p)));
    }

    #[tokio::test]
    async fn failures_surface_as_failed_snapshots_not_progress() {
        let pipeline = Arc::new(AttributePipeline::new(Arc::new(SlowClient {
            fail_guard: true,
        })));
        let handle = spawn_job(pipeline, inputs());

        let snapshots = observe(handle).await;
        let terminal = snapshots.last().unwrap();
        assert!(matches!(terminal, JobStatus::Failed(_)));
        assert_eq!(terminal.percent(), None);
    }
}
