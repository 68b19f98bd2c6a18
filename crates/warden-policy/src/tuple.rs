//! Relationship tuples — the atomic unit of authorization data.
//!
//! A tuple `(user, relation, object)` grants one relationship. Users are
//! either plain subjects (`user:alice`) or usersets (`group:eng#member`,
//! meaning "whoever holds `member` on `group:eng`"). Objects render as
//! `type:id`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PolicyError, PolicyResult};

// ---------------------------------------------------------------------------
// RelationName
// ---------------------------------------------------------------------------

/// A validated relation name: `[a-z][a-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationName(String);

impl RelationName {
    pub fn new(name: impl Into<String>) -> PolicyResult<Self> {
        let name = name.into();
        validate_relation_name(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relation names must match `[a-z][a-z0-9_]*` and stay short enough to
/// index. Malformed names fail before any backend round trip.
pub fn validate_relation_name(name: &str) -> PolicyResult<()> {
    if name.is_empty() || name.len() > 64 {
        return Err(PolicyError::Validation(format!(
            "relation name must be 1..=64 characters, got {}",
            name.len()
        )));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or(' ');
    if !first.is_ascii_lowercase() {
        return Err(PolicyError::Validation(format!(
            "relation name must start with a lowercase letter: '{name}'"
        )));
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return Err(PolicyError::Validation(format!(
            "relation name contains invalid characters: '{name}'"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ObjectRef
// ---------------------------------------------------------------------------

/// A typed object reference, rendered `type:id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_type: String,
    pub object_id: String,
}

impl ObjectRef {
    pub fn new(object_type: impl Into<String>, object_id: impl Into<String>) -> PolicyResult<Self> {
        let object = Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
        };
        object.validate()?;
        Ok(object)
    }

    /// Parse a `type:id` reference.
    pub fn parse(raw: &str) -> PolicyResult<Self> {
        match raw.split_once(':') {
            Some((object_type, object_id)) => Self::new(object_type, object_id),
            None => Err(PolicyError::Validation(format!(
                "object reference must be 'type:id', got '{raw}'"
            ))),
        }
    }

    pub fn validate(&self) -> PolicyResult<()> {
        if self.object_type.is_empty() || self.object_id.is_empty() {
            return Err(PolicyError::Validation(format!(
                "object reference halves must be non-empty, got '{}:{}'",
                self.object_type, self.object_id
            )));
        }
        if self.object_type.contains(':') || self.object_type.contains('#') {
            return Err(PolicyError::Validation(format!(
                "object type contains reserved characters: '{}'",
                self.object_type
            )));
        }
        if self.object_id.contains('#') {
            return Err(PolicyError::Validation(format!(
                "object id contains reserved characters: '{}'",
                self.object_id
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

// ---------------------------------------------------------------------------
// UserRef
// ---------------------------------------------------------------------------

/// The user half of a tuple: a plain subject or a userset reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UserRef {
    /// A concrete subject, e.g. `user:alice` or `org:acme`.
    Subject { id: String },
    /// Whoever holds `relation` on `object`, e.g. `group:eng#member`.
    Userset {
        object: ObjectRef,
        relation: RelationName,
    },
}

impl UserRef {
    pub fn subject(id: impl Into<String>) -> Self {
        Self::Subject { id: id.into() }
    }

    pub fn userset(object: ObjectRef, relation: RelationName) -> Self {
        Self::Userset { object, relation }
    }

    /// Parse `subject`, `type:id`, or `type:id#relation`.
    pub fn parse(raw: &str) -> PolicyResult<Self> {
        match raw.split_once('#') {
            Some((object, relation)) => Ok(Self::Userset {
                object: ObjectRef::parse(object)?,
                relation: RelationName::new(relation)?,
            }),
            None => {
                if raw.is_empty() {
                    return Err(PolicyError::Validation(
                        "user reference must be non-empty".into(),
                    ));
                }
                Ok(Self::Subject { id: raw.to_string() })
            }
        }
    }

    pub fn validate(&self) -> PolicyResult<()> {
        match self {
            UserRef::Subject { id } => {
                if id.is_empty() {
                    return Err(PolicyError::Validation(
                        "user reference must be non-empty".into(),
                    ));
                }
                if id.contains('#') {
                    return Err(PolicyError::Validation(format!(
                        "subject id contains reserved characters: '{id}'"
                    )));
                }
                Ok(())
            }
            UserRef::Userset { object, .. } => object.validate(),
        }
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRef::Subject { id } => write!(f, "{id}"),
            UserRef::Userset { object, relation } => write!(f, "{object}#{relation}"),
        }
    }
}

// ---------------------------------------------------------------------------
// RelationshipTuple
// ---------------------------------------------------------------------------

/// One granted relationship. Unique per `(user, relation, object)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipTuple {
    pub user: UserRef,
    pub relation: RelationName,
    pub object: ObjectRef,
}

impl RelationshipTuple {
    pub fn new(user: UserRef, relation: RelationName, object: ObjectRef) -> Self {
        Self {
            user,
            relation,
            object,
        }
    }

    /// Parse from `user`, `relation`, `type:id` string halves.
    pub fn parse(user: &str, relation: &str, object: &str) -> PolicyResult<Self> {
        Ok(Self {
            user: UserRef::parse(user)?,
            relation: RelationName::new(relation)?,
            object: ObjectRef::parse(object)?,
        })
    }

    pub fn validate(&self) -> PolicyResult<()> {
        self.user.validate()?;
        validate_relation_name(self.relation.as_str())?;
        self.object.validate()
    }
}

impl fmt::Display for RelationshipTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.user, self.relation, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_name_valid() {
        assert!(RelationName::new("executor").is_ok());
        assert!(RelationName::new("member_of2").is_ok());
    }

    #[test]
    fn test_relation_name_invalid() {
        assert!(RelationName::new("").is_err());
        assert!(RelationName::new("Executor").is_err());
        assert!(RelationName::new("2nd").is_err());
        assert!(RelationName::new("has space").is_err());
        assert!(RelationName::new("a".repeat(65)).is_err());
    }

    #[test]
    fn test_object_ref_parse() {
        let object = ObjectRef::parse("tool:chat").unwrap();
        assert_eq!(object.object_type, "tool");
        assert_eq!(object.object_id, "chat");
        assert_eq!(object.to_string(), "tool:chat");
    }

    #[test]
    fn test_object_ref_parse_rejects_bare() {
        assert!(ObjectRef::parse("tool").is_err());
        assert!(ObjectRef::parse(":chat").is_err());
        assert!(ObjectRef::parse("tool:").is_err());
    }

    #[test]
    fn test_object_ref_id_may_contain_colon() {
        let object = ObjectRef::parse("tool:ns:chat").unwrap();
        assert_eq!(object.object_type, "tool");
        assert_eq!(object.object_id, "ns:chat");
    }

    #[test]
    fn test_user_ref_parse_subject() {
        let user = UserRef::parse("user:alice").unwrap();
        assert_eq!(user, UserRef::subject("user:alice"));
        assert_eq!(user.to_string(), "user:alice");
    }

    #[test]
    fn test_user_ref_parse_userset() {
        let user = UserRef::parse("group:eng#member").unwrap();
        match &user {
            UserRef::Userset { object, relation } => {
                assert_eq!(object.to_string(), "group:eng");
                assert_eq!(relation.as_str(), "member");
            }
            other => panic!("expected userset, got {other:?}"),
        }
        assert_eq!(user.to_string(), "group:eng#member");
    }

    #[test]
    fn test_user_ref_parse_rejects_bad_userset() {
        assert!(UserRef::parse("group#member").is_err());
        assert!(UserRef::parse("group:eng#").is_err());
        assert!(UserRef::parse("").is_err());
    }

    #[test]
    fn test_tuple_parse_and_display() {
        let tuple = RelationshipTuple::parse("user:alice", "executor", "tool:chat").unwrap();
        assert_eq!(tuple.to_string(), "(user:alice, executor, tool:chat)");
    }

    #[test]
    fn test_tuple_parse_rejects_malformed_relation() {
        assert!(RelationshipTuple::parse("user:alice", "NOT VALID", "tool:chat").is_err());
    }

    #[test]
    fn test_tuple_serde_roundtrip() {
        let tuple = RelationshipTuple::parse("group:eng#member", "executor", "tool:chat").unwrap();
        let json = serde_json::to_string(&tuple).unwrap();
        let restored: RelationshipTuple = serde_json::from_str(&json).unwrap();
        assert_eq!(tuple, restored);
    }
}
