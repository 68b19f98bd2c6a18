//! Warden core — shared types and collaborator traits.
//!
//! Every other crate in the workspace builds on these definitions:
//! typed identifiers, the canonical [`Timestamp`], the per-request
//! [`Principal`], and the two collaborator seams the pipeline depends on
//! ([`EventSink`] for fire-and-forget observability, [`SecretSource`] for
//! by-name credential resolution).

pub mod error;
pub mod traits;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use traits::{
    EventKind, EventSink, InMemoryEventSink, ObservedEvent, SecretSource, StaticSecretSource,
    TracingEventSink,
};
pub use types::{
    ConversationId, ModelVersion, Principal, ProfileName, RequestId, SecretRef, SubjectId,
    Timestamp,
};
