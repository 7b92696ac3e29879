//! Attribute retrieval for the fedgate engine.
//!
//! Once both verifiers have let a flow through, the engine fetches the
//! subject's attributes from the IdP's attribute authority and forwards
//! them to the guard, then sends the browser to the guard's podder
//! endpoint. The same five steps run either synchronously in the calling
//! handler or on a dedicated worker whose progress the browser polls.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod worker;

pub use client::{MutualTlsSoapClient, SoapClient};
pub use error::PipelineError;
pub use job::{HandoffRedirect, JobHandle, JobRegistry, JobSnapshot, JobStatus, PipelineStage};
pub use pipeline::{AttributePipeline, PipelineInputs};
pub use worker::spawn_job;
