//! Federation metadata for the fedgate engine.
//!
//! An [`EntityRecord`] identifies one federation participant, guard or
//! identity provider, together with its endpoints and key material. Records
//! are loaded from metadata documents on disk (or handed over by an external
//! loader), kept immutable in the process-wide [`MetadataRegistry`] and
//! replaced wholesale on reload. The `entity_id` is the sole key used for
//! every lookup across the engine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod document;
pub mod entity;
pub mod registry;

pub use document::{guard_document_xml, idp_document_xml, parse_entity_document};
pub use entity::{EntityRecord, EntityRole, GuardEndpoints, IdpEndpoints, SsoEndpoint};
pub use registry::{MetadataError, MetadataLoader, MetadataRegistry};
