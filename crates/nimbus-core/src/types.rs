//! Identity and edge types for the relationship graph.
//!
//! These are plain value types: a [`ResourceId`] names an emulated
//! resource, and an [`Edge`] records a typed, directed relationship
//! between two of them. "From points to To" means *From depends on To*.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::Error;

// ============================================================================
// ResourceId
// ============================================================================

/// Identity of an emulated resource.
///
/// The canonical string form `service:type:id` is also the key format the
/// state store uses, and is what the type serializes as.
///
/// # Example
///
/// ```rust
/// use nimbus_core::ResourceId;
///
/// let vpc = ResourceId::new("ec2", "vpc", "vpc-0a1b2c");
/// assert_eq!(vpc.to_string(), "ec2:vpc:vpc-0a1b2c");
/// assert_eq!(vpc.type_key(), "ec2:vpc");
///
/// let parsed: ResourceId = "ec2:vpc:vpc-0a1b2c".parse().unwrap();
/// assert_eq!(parsed, vpc);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ResourceId {
    /// Owning service (e.g. "ec2", "iam").
    pub service: String,
    /// Resource type within the service (e.g. "vpc", "role").
    pub resource_type: String,
    /// Instance identifier (e.g. "vpc-0a1b2c", or a full ARN).
    pub id: String,
}

impl ResourceId {
    /// Creates a resource identity.
    pub fn new(
        service: impl Into<String>,
        resource_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Returns the `service:type` key used for schema lookups.
    pub fn type_key(&self) -> String {
        format!("{}:{}", self.service, self.resource_type)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.service, self.resource_type, self.id)
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    /// Parses `service:type:id`. Everything after the second `:` is the id,
    /// so ARNs survive intact.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(service), Some(resource_type), Some(id))
                if !service.is_empty() && !resource_type.is_empty() && !id.is_empty() =>
            {
                Ok(Self::new(service, resource_type, id))
            }
            _ => Err(Error::invalid_data(format!(
                "resource id '{s}' is not of the form service:type:id"
            ))),
        }
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ResourceId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// Relationship semantics
// ============================================================================

/// Kind of relationship an edge expresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// Ownership / lifecycle containment.
    Contains,
    /// Loose pointer.
    References,
    /// Attachment, stored as a single directed edge.
    AttachedTo,
    /// Loose many-to-many coupling.
    AssociatedWith,
}

impl RelationshipType {
    /// All variants, for iteration.
    pub const ALL: [RelationshipType; 4] = [
        Self::Contains,
        Self::References,
        Self::AttachedTo,
        Self::AssociatedWith,
    ];

    /// Returns the relationship name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::References => "references",
            Self::AttachedTo => "attached_to",
            Self::AssociatedWith => "associated_with",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Multiplicity constraint on a typed relationship between two type keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// One source to one target.
    OneToOne,
    /// A target accepts at most one source of this type.
    OneToMany,
    /// A source points at most at one target of this type.
    ManyToOne,
    /// Unconstrained.
    ManyToMany,
}

impl Cardinality {
    /// Whether a source may hold at most one such edge per target type.
    pub fn limits_source(&self) -> bool {
        matches!(self, Self::OneToOne | Self::ManyToOne)
    }

    /// Whether a target may receive at most one such edge per source type.
    pub fn limits_target(&self) -> bool {
        matches!(self, Self::OneToOne | Self::OneToMany)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OneToOne => "one-to-one",
            Self::OneToMany => "one-to-many",
            Self::ManyToOne => "many-to-one",
            Self::ManyToMany => "many-to-many",
        };
        f.write_str(s)
    }
}

/// What happens to a node's dependents when the node is removed.
///
/// Resolved per call; edges do not carry a delete behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteBehavior {
    /// Refuse removal while anything depends on the node.
    #[default]
    Restrict,
    /// Remove every dependent first, recursively.
    Cascade,
    /// Drop the edges and leave dependents in place.
    SetNull,
}

impl fmt::Display for DeleteBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Restrict => "restrict",
            Self::Cascade => "cascade",
            Self::SetNull => "set_null",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Node / Edge
// ============================================================================

/// A registered resource in the graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Resource identity.
    pub id: ResourceId,
    /// When the node was registered.
    pub created_at: DateTime<Utc>,
    /// Free-form string metadata.
    pub metadata: HashMap<String, String>,
}

impl Node {
    /// Creates a node stamped with the current time.
    pub fn new(id: ResourceId, metadata: HashMap<String, String>) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            metadata,
        }
    }
}

/// A directed, typed relationship: `from` depends on `to`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Dependent end.
    pub from: ResourceId,
    /// Dependency end.
    pub to: ResourceId,
    /// Relationship kind.
    pub relationship: RelationshipType,
    /// Free-form string metadata. Not part of edge identity.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Edge {
    /// Creates an edge with empty metadata.
    pub fn new(from: ResourceId, to: ResourceId, relationship: RelationshipType) -> Self {
        Self {
            from,
            to,
            relationship,
            metadata: HashMap::new(),
        }
    }

    /// Adds a metadata key-value pair.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether this edge is the `(from, to, relationship)` link.
    pub fn same_link(
        &self,
        from: &ResourceId,
        to: &ResourceId,
        relationship: RelationshipType,
    ) -> bool {
        self.relationship == relationship && &self.from == from && &self.to == to
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.relationship, self.to)
    }
}

// ============================================================================
// Tests
// ============================================================================
