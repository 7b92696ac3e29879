//! HTTP handlers for the engine endpoints.

use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use fg_ca::{register_guard, GuardRegistration};
use fg_pipeline::{spawn_job, AttributePipeline, JobStatus, MutualTlsSoapClient, PipelineInputs};
use fg_protocol_saml::AuthnDispatch;
use fg_session::EngineSessionId;
use fg_verify::GuardCallback;

use crate::state::EngineState;

/// Query parameters of the guard entry endpoint.
#[derive(Debug, Deserialize)]
pub struct SsoQuery {
    /// The calling guard's entity ID.
    pub guardid: Option<String>,
    /// The guard-issued session identifier.
    pub sessionid: Option<String>,
    /// Optional target IdP entity ID.
    #[serde(rename = "entityID")]
    pub entity_id: Option<String>,
}

/// Guard entry point: verify the caller, then construct and dispatch the
/// authentication request.
pub async fn sso(
    State(state): State<Arc<EngineState>>,
    Query(query): Query<SsoQuery>,
) -> Response {
    let callback = GuardCallback {
        guard_id: query.guardid.as_deref(),
        session_id: query.sessionid.as_deref(),
    };
    let binding = match state.guard_verifier.verify(callback).await {
        Ok(binding) => binding,
        Err(e) => return error_view(&e.to_string()),
    };

    let dispatch = state.dispatcher.dispatch(
        &binding.entity_id,
        &binding.engine_session_id,
        query.entity_id.as_deref(),
    );
    match dispatch {
        Ok(AuthnDispatch::Redirect { url }) => Redirect::temporary(&url).into_response(),
        Ok(AuthnDispatch::Post(form)) => Html(form.render()).into_response(),
        Err(e) => error_view(&e.to_string()),
    }
}

/// Form/query parameters of the assertion consumer endpoint.
#[derive(Debug, Deserialize)]
pub struct AcsParams {
    /// The base64 response from the IdP.
    #[serde(rename = "SAMLResponse")]
    pub saml_response: Option<String>,
    /// The relay token: the guard session for legacy flows, the engine
    /// session key for modern ones.
    #[serde(rename = "TARGET", alias = "RelayState")]
    pub target: Option<String>,
}

/// Assertion consumer: verify the inbound assertion and hand the flow to a
/// background attribute pipeline.
pub async fn acs(
    State(state): State<Arc<EngineState>>,
    Form(params): Form<AcsParams>,
) -> Response {
    let assertion = match state.idp_verifier.verify(params.saml_response.as_deref()) {
        Ok(assertion) => assertion,
        Err(e) => return error_view(&e.to_string()),
    };

    let Some(target) = params.target.as_deref() else {
        return error_view("missing relay token");
    };
    // The relay token may be either side of the session binding.
    let session = state
        .sessions
        .resolve_guard(target)
        .or_else(|| state.sessions.resolve_engine(&EngineSessionId::from_raw(target)));
    let Some(session) = session else {
        return error_view("no session bound for this flow");
    };

    let Some(guard) = session.record.as_guard().cloned() else {
        return error_view("session is not bound to a guard");
    };
    let Some(idp) = assertion.idp.as_idp() else {
        return error_view("issuer is not an identity provider");
    };

    // The engine masquerades as the guard from here on, so the transport
    // is built from the guard's own keystore.
    let identity = match fg_trust::Container::open(&guard.keystore, &guard.keystore_password)
        .and_then(|c| c.identity(&session.binding.entity_id))
    {
        Ok(identity) => identity,
        Err(e) => {
            error!(error = %e, "guard keystore unavailable");
            return error_view("guard identity unavailable");
        }
    };
    let roots = state.trust_store.root_certificates_pem();
    let client = match MutualTlsSoapClient::new(&identity, &roots) {
        Ok(client) => Arc::new(client),
        Err(e) => return error_view(&e.to_string()),
    };

    let inputs = PipelineInputs {
        guard_session_id: session.binding.guard_session_id.clone(),
        guard_entity_id: session.binding.entity_id.clone(),
        attribute_consumer_url: guard.attribute_consumer_url.clone(),
        attribute_authority_url: idp.attribute_authority_url.clone(),
        podder_url: guard.podder_url.clone(),
        idp_provider_id: assertion.issuer.clone(),
        name_identifier: assertion.name_identifier.clone(),
        authn_response_xml: assertion.response.xml.clone(),
    };

    let handle = spawn_job(Arc::new(AttributePipeline::new(client)), inputs);
    let engine_id = session.binding.engine_session_id.as_str().to_string();
    state.jobs.insert(&engine_id, handle);

    Redirect::to(&format!("/acs/process?session={engine_id}")).into_response()
}

/// Query parameters of the polling endpoint.
#[derive(Debug, Deserialize)]
pub struct ProcessQuery {
    /// Engine session key of the job being watched.
    pub session: String,
}

/// Polls a pipeline job: progress page while running, redirect when done.
pub async fn process(
    State(state): State<Arc<EngineState>>,
    Query(query): Query<ProcessQuery>,
) -> Response {
    match state.jobs.poll(&query.session) {
        None => error_view("no pipeline job for this session"),
        Some(JobStatus::Done(redirect)) => Redirect::to(&redirect.url).into_response(),
        Some(JobStatus::Failed(message)) => error_view(&message),
        Some(status) => {
            let (percent, label) = match &status {
                JobStatus::Running(stage) => (stage.percent(), stage.label()),
                _ => (0, "Starting"),
            };
            progress_view(percent, label)
        }
    }
}

/// Guard registration form.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    /// New guard's entity ID.
    pub guardid: String,
    /// Certificate subject organisational unit.
    pub orgunit: String,
    /// Certificate subject organisation.
    pub org: String,
    /// Certificate subject city.
    pub city: String,
    /// Certificate subject state or province.
    pub locality: String,
    /// Certificate subject country code.
    pub country: String,
    /// Guard application scheme.
    pub scheme: String,
    /// Guard application host.
    pub host: String,
    /// Guard application port.
    pub port: u16,
    /// Guard application context path.
    pub application_name: String,
}

/// Registers a guard and shows the issued certificate chain.
pub async fn register(
    State(state): State<Arc<EngineState>>,
    Form(form): Form<RegisterForm>,
) -> Response {
    let registration = GuardRegistration {
        guard_id: form.guardid,
        org_unit: form.orgunit,
        org: form.org,
        city: form.city,
        locality: form.locality,
        country: form.country,
        scheme: form.scheme,
        host: form.host,
        port: form.port,
        application_name: form.application_name,
    };

    match register_guard(&state.config, &state.registry, &state.ca, &registration) {
        Ok(registered) => {
            let chain = registered.identity.chain_pem.join("");
            (StatusCode::OK, chain).into_response()
        }
        Err(e) => {
            error!(error = %e, "guard registration failed");
            error_view(&e.to_string())
        }
    }
}

fn error_view(message: &str) -> Response {
    let page = format!(
        "<!DOCTYPE html><html><head><title>Sign-in failed</title></head>\
         <body><h1>Sign-in failed</h1><p>{}</p></body></html>",
        fg_metadata::document::xml_escape(message)
    );
    (StatusCode::BAD_GATEWAY, Html(page)).into_response()
}

fn progress_view(percent: u8, label: &str) -> Response {
    let page = format!(
        "<!DOCTYPE html><html><head><title>Signing you in</title>\
         <meta http-equiv=\"refresh\" content=\"1\"></head>\
         <body><h1>Signing you in</h1><p>{label} ({percent}%)</p></body></html>"
    );
    Html(page).into_response()
}
