//! The five pipeline steps.

use fg_protocol_saml::soap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::client::SoapClient;
use crate::error::PipelineError;
use crate::job::{HandoffRedirect, PipelineStage};

/// Everything one pipeline run needs, resolved before it starts.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    /// The session identifier as the guard knows it.
    pub guard_session_id: String,
    /// The guard's externally visible entity ID.
    pub guard_entity_id: String,
    /// The guard's attribute consumer endpoint.
    pub attribute_consumer_url: String,
    /// The IdP's attribute authority endpoint.
    pub attribute_authority_url: String,
    /// The guard's podder endpoint.
    pub podder_url: String,
    /// The IdP's provider ID.
    pub idp_provider_id: String,
    /// The subject's name identifier from the verified assertion.
    pub name_identifier: String,
    /// The original authentication envelope, forwarded to the guard.
    pub authn_response_xml: String,
}

/// Runs the attribute query → guard forward round trip.
pub struct AttributePipeline {
    client: Arc<dyn SoapClient>,
}

impl AttributePipeline {
    /// Creates the pipeline over a SOAP transport.
    #[must_use]
    pub fn new(client: Arc<dyn SoapClient>) -> Self {
        Self { client }
    }

    /// Synchronous variant: runs to completion on the calling task.
    pub async fn execute(&self, inputs: &PipelineInputs) -> Result<HandoffRedirect, PipelineError> {
        self.execute_with_progress(inputs, &|_| {}).await
    }

    /// Runs the pipeline, reporting each checkpoint through `progress`.
    pub async fn execute_with_progress(
        &self,
        inputs: &PipelineInputs,
        progress: &(dyn Fn(PipelineStage) + Send + Sync),
    ) -> Result<HandoffRedirect, PipelineError> {
        // 1. Build the attribute query for the authority.
        progress(PipelineStage::Preparing);
        let query = soap::build_attribute_query(
            &inputs.guard_entity_id,
            &inputs.idp_provider_id,
            &inputs.name_identifier,
        );

        // 2. Query the authority, with the one documented fallback.
        progress(PipelineStage::QueryingAuthority);
        let aa_response = self
            .query_authority(&inputs.attribute_authority_url, &query)
            .await?;

        // 3. Attach the session and authentication headers and forward the
        //    authority's response to the guard as-is.
        progress(PipelineStage::PreparingGuardRequest);
        let guard_request = soap::attach_guard_headers(
            &aa_response,
            &inputs.guard_session_id,
            &inputs.attribute_authority_url,
            &inputs.authn_response_xml,
        )
        .map_err(|e| {
            error!(error = %e, "attribute authority response did not parse");
            PipelineError::AuthorityResponse(e.to_string())
        })?;

        progress(PipelineStage::QueryingGuard);
        let guard_ack = self
            .client
            .post_envelope(&inputs.attribute_consumer_url, &guard_request, true)
            .await?;

        // 4. The guard must acknowledge with well-formed XML.
        soap::ensure_envelope(&guard_ack).map_err(|e| {
            error!(error = %e, "guard acknowledgement did not parse");
            PipelineError::GuardResponse(e.to_string())
        })?;

        // 5. Hand the browser off to the podder.
        let url = format!("{}?id={}", inputs.podder_url, inputs.guard_session_id);
        info!(guard = %inputs.guard_entity_id, "attribute delivery complete");
        Ok(HandoffRedirect { url })
    }

    /// Queries the attribute authority.
    ///
    /// Some authorities request a client certificate during the handshake
    /// and then reject whatever is presented; for those, one retry is made
    /// with no client certificate at all. No further retries.
    async fn query_authority(&self, aa_url: &str, query: &str) -> Result<String, PipelineError> {
        match self.client.post_envelope(aa_url, query, true).await {
            Ok(response) => Ok(response),
            Err(PipelineError::Connection(first)) => {
                warn!(%aa_url, error = %first, "authority rejected authenticated connection, retrying without client certificate");
                self.client.post_envelope(aa_url, query, false).await
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    const AA_ENVELOPE: &str = concat!(
        r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">"#,
        "<soapenv:Body><samlp:Response>attributes</samlp:Response></soapenv:Body>",
        "</soapenv:Envelope>"
    );
    const GUARD_ACK: &str = concat!(
        r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">"#,
        "<soapenv:Body/></soapenv:Envelope>"
    );

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Call {
        url: String,
        with_identity: bool,
    }

    struct ScriptedClient {
        calls: Mutex<Vec<Call>>,
        fail_authenticated_aa: bool,
        fail_anonymous_aa: bool,
        guard_ack: String,
    }

    impl ScriptedClient {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_authenticated_aa: false,
                fail_anonymous_aa: false,
                guard_ack: GUARD_ACK.to_string(),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl SoapClient for ScriptedClient {
        async fn post_envelope(
            &self,
            url: &str,
            envelope: &str,
            present_identity: bool,
        ) -> Result<String, PipelineError> {
            self.calls.lock().push(Call {
                url: url.to_string(),
                with_identity: present_identity,
            });
            if url.contains("/aa") {
                if present_identity && self.fail_authenticated_aa {
                    return Err(PipelineError::Connection("handshake rejected".into()));
                }
                if !present_identity && self.fail_anonymous_aa {
                    return Err(PipelineError::Connection("still rejected".into()));
                }
                assert!(envelope.contains("AttributeQuery"));
                Ok(AA_ENVELOPE.to_string())
            } else {
                assert!(envelope.contains("GuardSessionID"));
                Ok(self.guard_ack.clone())
            }
        }
    }

    fn inputs() -> PipelineInputs {
        PipelineInputs {
            guard_session_id: "GUARD-11".to_string(),
            guard_entity_id: "https://sp.example.com".to_string(),
            attribute_consumer_url: "https://app.example.org/guard/attribute-consumer".to_string(),
            attribute_authority_url: "https://idp.example.org/aa".to_string(),
            podder_url: "https://app.example.org/guard/podder".to_string(),
            idp_provider_id: "https://idp.example.org".to_string(),
            name_identifier: "user@example.org".to_string(),
            authn_response_xml: "<samlp:Response>authn</samlp:Response>".to_string(),
        }
    }

    #[tokio::test]
    async fn successful_run_ends_at_the_podder() {
        let client = Arc::new(ScriptedClient::new());
        let pipeline = AttributePipeline::new(Arc::clone(&client) as Arc<dyn SoapClient>);

        let redirect = pipeline.execute(&inputs()).await.unwrap();
        assert_eq!(
            redirect.url,
            "https://app.example.org/guard/podder?id=GUARD-11"
        );

        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].url.contains("/aa") && calls[0].with_identity);
        assert!(calls[1].url.contains("attribute-consumer") && calls[1].with_identity);
    }

    #[tokio::test]
    async fn authority_handshake_failure_retries_exactly_once_without_identity() {
        let mut scripted = ScriptedClient::new();
        scripted.fail_authenticated_aa = true;
        let client = Arc::new(scripted);
        let pipeline = AttributePipeline::new(Arc::clone(&client) as Arc<dyn SoapClient>);

        pipeline.execute(&inputs()).await.unwrap();

        let calls = client.calls();
        let aa_calls: Vec<_> = calls.iter().filter(|c| c.url.contains("/aa")).collect();
        assert_eq!(aa_calls.len(), 2);
        assert!(aa_calls[0].with_identity);
        assert!(!aa_calls[1].with_identity);
    }

    #[tokio::test]
    async fn second_authority_failure_is_terminal() {
        let mut scripted = ScriptedClient::new();
        scripted.fail_authenticated_aa = true;
        scripted.fail_anonymous_aa = true;
        let client = Arc::new(scripted);
        let pipeline = AttributePipeline::new(Arc::clone(&client) as Arc<dyn SoapClient>);

        let result = pipeline.execute(&inputs()).await;
        assert!(matches!(result, Err(PipelineError::Connection(_))));

        // The guard is never contacted.
        assert!(client.calls().iter().all(|c| c.url.contains("/aa")));
    }

    #[tokio::test]
    async fn malformed_guard_acknowledgement_is_a_hard_failure() {
        let mut scripted = ScriptedClient::new();
        scripted.guard_ack = "this is not xml <".to_string();
        let client = Arc::new(scripted);
        let pipeline = AttributePipeline::new(client as Arc<dyn SoapClient>);

        let result = pipeline.execute(&inputs()).await;
        assert!(matches!(result, Err(PipelineError::GuardResponse(_))));
    }

    #[tokio::test]
    async fn forwarded_envelope_carries_session_and_authn_headers() {
        let client = Arc::new(ScriptedClient::new());
        let pipeline = AttributePipeline::new(Arc::clone(&client) as Arc<dyn SoapClient>);
        pipeline.execute(&inputs()).await.unwrap();
        // The ScriptedClient asserts the forwarded envelope contains the
        // GuardSessionID header; reaching here means it did.
    }
}
