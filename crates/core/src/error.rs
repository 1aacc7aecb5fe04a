use serde::{Deserialize, Serialize};
use std::fmt;

/// Fatal precondition violations found while traversing a value tree.
/// Linking stops at the first one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StructuralError {
    #[error("null value at {location}")]
    NullValue { location: String },

    #[error("malformed {form} expression at {location}: {message}")]
    MalformedExpression {
        form: &'static str,
        location: String,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkErrorKind {
    MissingReference,
    CircularDependency,
    /// Waits on an entry that never resolved, without being part of a cycle.
    BlockedDependency,
    InvalidAttribute,
    UnknownScope,
    DuplicateName,
    InvalidDeclaration,
}

impl LinkErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkErrorKind::MissingReference => "missing_reference",
            LinkErrorKind::CircularDependency => "circular_dependency",
            LinkErrorKind::BlockedDependency => "blocked_dependency",
            LinkErrorKind::InvalidAttribute => "invalid_attribute",
            LinkErrorKind::UnknownScope => "unknown_scope",
            LinkErrorKind::DuplicateName => "duplicate_name",
            LinkErrorKind::InvalidDeclaration => "invalid_declaration",
        }
    }
}

/// A linker diagnostic. All diagnostics of a pass are collected and
/// reported together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkError {
    pub pass: u8,
    pub kind: LinkErrorKind,
    pub entity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Other entities of a circular dependency group.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<String>,
    pub message: String,
}

impl LinkError {
    pub fn new(
        pass: u8,
        kind: LinkErrorKind,
        entity: &str,
        message: impl Into<String>,
    ) -> Self {
        LinkError {
            pass,
            kind,
            entity: entity.to_owned(),
            reference: None,
            location: None,
            related: Vec::new(),
            message: message.into(),
        }
    }

    pub fn with_reference(mut self, reference: &str) -> Self {
        self.reference = Some(reference.to_owned());
        self
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_owned());
        self
    }

    pub fn with_related(mut self, related: Vec<String>) -> Self {
        self.related = related;
        self
    }

    pub fn missing_reference(entity: &str, reference: &str, location: &str) -> Self {
        LinkError::new(
            2,
            LinkErrorKind::MissingReference,
            entity,
            format!("reference to undefined entity '{}'", reference),
        )
        .with_reference(reference)
        .with_location(location)
    }

    pub fn unknown_scope(entity: &str, function: &str) -> Self {
        LinkError::new(
            4,
            LinkErrorKind::UnknownScope,
            entity,
            format!("scope names '{}', which is not a function", function),
        )
        .with_reference(function)
    }

    /// Serialize with every field present (null for missing).
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "entity":    self.entity,
            "kind":      self.kind.as_str(),
            "location":  self.location,
            "message":   self.message,
            "pass":      self.pass,
            "reference": self.reference,
            "related":   self.related,
        })
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} ({}): {}", self.entity, location, self.message),
            None => write!(f, "{}: {}", self.entity, self.message),
        }
    }
}

/// Why a link run failed. No partial output is produced in either case.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LinkFailure {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error("linking failed with {} error(s)", .0.len())]
    Diagnostics(Vec<LinkError>),
}

impl LinkFailure {
    pub fn diagnostics(&self) -> &[LinkError] {
        match self {
            LinkFailure::Structural(_) => &[],
            LinkFailure::Diagnostics(errors) => errors,
        }
    }
}
