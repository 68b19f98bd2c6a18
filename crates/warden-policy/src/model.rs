//! Versioned authorization models.
//!
//! A model is an immutable schema: object types, their relations, and the
//! rewrite rule each relation resolves through. Models are published once
//! and referenced by version on every call; a new version supersedes the
//! old, nothing is mutated in place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use warden_core::ModelVersion;

use crate::error::{PolicyError, PolicyResult};
use crate::tuple::{validate_relation_name, RelationName};

// ---------------------------------------------------------------------------
// RelationRewrite — the closed union of resolution rules
// ---------------------------------------------------------------------------

/// How a relation on an object is satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RelationRewrite {
    /// Satisfied by a stored tuple for exactly this relation.
    Direct,
    /// Satisfied when the user holds another relation on the same object
    /// (e.g. `executor` granted to anyone who is `owner`).
    ComputedUserset { relation: RelationName },
    /// Satisfied through a linking tuple: follow `tupleset_relation` on the
    /// object to a second object, then check `computed_relation` there
    /// (e.g. executor via membership in the tool's organization).
    TupleToUserset {
        tupleset_relation: RelationName,
        computed_relation: RelationName,
    },
    /// Satisfied when any branch is satisfied.
    Union { children: Vec<RelationRewrite> },
}

impl RelationRewrite {
    pub fn union(children: Vec<RelationRewrite>) -> Self {
        Self::Union { children }
    }
}

// ---------------------------------------------------------------------------
// AuthorizationModel
// ---------------------------------------------------------------------------

/// One object type's relations and their rewrite rules.
pub type TypeDefinition = BTreeMap<RelationName, RelationRewrite>;

/// A versioned, immutable authorization schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationModel {
    pub version: ModelVersion,
    pub types: BTreeMap<String, TypeDefinition>,
}

impl AuthorizationModel {
    /// Start building a model at the given version.
    pub fn builder(version: ModelVersion) -> AuthorizationModelBuilder {
        AuthorizationModelBuilder {
            version,
            types: BTreeMap::new(),
        }
    }

    /// Look up the rewrite rule for a relation on an object type.
    pub fn rewrite(&self, object_type: &str, relation: &RelationName) -> Option<&RelationRewrite> {
        self.types.get(object_type)?.get(relation)
    }

    /// Validate the model: every relation a rewrite refers to must exist
    /// somewhere in the model, and type/relation names must be well formed.
    pub fn validate(&self) -> PolicyResult<()> {
        if self.types.is_empty() {
            return Err(PolicyError::Validation(
                "model must define at least one object type".into(),
            ));
        }
        for (object_type, relations) in &self.types {
            if object_type.is_empty() || object_type.contains(':') {
                return Err(PolicyError::Validation(format!(
                    "invalid object type name: '{object_type}'"
                )));
            }
            if relations.is_empty() {
                return Err(PolicyError::Validation(format!(
                    "object type '{object_type}' defines no relations"
                )));
            }
            for (relation, rewrite) in relations {
                validate_relation_name(relation.as_str())?;
                self.validate_rewrite(object_type, relation, rewrite, 0)?;
            }
        }
        Ok(())
    }

    fn validate_rewrite(
        &self,
        object_type: &str,
        relation: &RelationName,
        rewrite: &RelationRewrite,
        depth: usize,
    ) -> PolicyResult<()> {
        // Rewrite nesting is authored by operators, not derived from data;
        // anything past this depth is a schema mistake.
        if depth > 8 {
            return Err(PolicyError::Validation(format!(
                "rewrite nesting too deep for '{object_type}#{relation}'"
            )));
        }
        match rewrite {
            RelationRewrite::Direct => Ok(()),
            RelationRewrite::ComputedUserset { relation: target } => {
                let known = self
                    .types
                    .get(object_type)
                    .map(|t| t.contains_key(target))
                    .unwrap_or(false);
                if !known {
                    return Err(PolicyError::Validation(format!(
                        "'{object_type}#{relation}' rewrites to undefined relation '{target}'"
                    )));
                }
                Ok(())
            }
            RelationRewrite::TupleToUserset {
                tupleset_relation, ..
            } => {
                let known = self
                    .types
                    .get(object_type)
                    .map(|t| t.contains_key(tupleset_relation))
                    .unwrap_or(false);
                if !known {
                    return Err(PolicyError::Validation(format!(
                        "'{object_type}#{relation}' links through undefined relation \
                         '{tupleset_relation}'"
                    )));
                }
                // The computed relation lives on the linked object's type,
                // which is only known from data; resolution treats a missing
                // definition there as a non-match.
                Ok(())
            }
            RelationRewrite::Union { children } => {
                if children.is_empty() {
                    return Err(PolicyError::Validation(format!(
                        "'{object_type}#{relation}' has an empty union rewrite"
                    )));
                }
                for child in children {
                    self.validate_rewrite(object_type, relation, child, depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

/// Builder for [`AuthorizationModel`]. The built model is validated before
/// it is returned, so an engine never holds an inconsistent schema.
pub struct AuthorizationModelBuilder {
    version: ModelVersion,
    types: BTreeMap<String, TypeDefinition>,
}

impl AuthorizationModelBuilder {
    pub fn relation(
        mut self,
        object_type: impl Into<String>,
        relation: RelationName,
        rewrite: RelationRewrite,
    ) -> Self {
        self.types
            .entry(object_type.into())
            .or_default()
            .insert(relation, rewrite);
        self
    }

    pub fn build(self) -> PolicyResult<AuthorizationModel> {
        let model = AuthorizationModel {
            version: self.version,
            types: self.types,
        };
        model.validate()?;
        Ok(model)
    }
}
