//! Warden policy — relationship-based authorization.
//!
//! Authorization data is a set of `(user, relation, object)` tuples; the
//! published [`AuthorizationModel`] says how each relation resolves (a
//! direct grant, ownership via a computed userset, or membership through a
//! linking tuple). The [`AuthorizationEngine`] evaluates `check`, `expand`,
//! and `list_objects` against an injected [`TupleStore`].
//!
//! Two properties hold unconditionally:
//!
//! - **Termination**: resolution tracks visited goals and bounds depth, so
//!   cyclic grant graphs resolve in finite steps.
//! - **Fail-closed**: exceeding the [`CHECK_BUDGET_MS`] budget or losing
//!   the backend yields [`PolicyError::Timeout`], which callers must treat
//!   as deny — never an implicit allow.

pub mod engine;
pub mod error;
pub mod model;
pub mod store;
pub mod tuple;

pub use engine::{AuthorizationEngine, UsersetNode, UsersetTree, CHECK_BUDGET_MS, MAX_RESOLUTION_DEPTH};
pub use error::{PolicyError, PolicyResult};
pub use model::{AuthorizationModel, AuthorizationModelBuilder, RelationRewrite, TypeDefinition};
pub use store::{
    InMemoryTupleStore, TupleFilter, TupleStore, UnavailableTupleStore, MAX_STALENESS_SECS,
};
pub use tuple::{ObjectRef, RelationName, RelationshipTuple, UserRef};
