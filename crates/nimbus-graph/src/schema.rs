//! Relationship schema.
//!
//! A [`RelationshipSchema`] maps a `"fromService:fromType -> toService:toType"`
//! pair to the one relationship that pair is allowed to have, along with its
//! cardinality and delete behavior. The schema is read-mostly: the graph
//! holds it behind an `Arc` and swaps it wholesale.

use nimbus_core::{Cardinality, DeleteBehavior, Error, RelationshipType, ResourceId, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// SchemaEntry
// ============================================================================

/// The allowed relationship between two resource types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntry {
    /// The only relationship kind permitted for the pair.
    pub relationship: RelationshipType,
    /// Multiplicity constraint.
    pub cardinality: Cardinality,
    /// Suggested behavior when the target is deleted.
    pub delete_behavior: DeleteBehavior,
    /// Whether every source of this type must hold such an edge.
    pub required: bool,
    /// Human-readable description.
    pub description: String,
}

impl SchemaEntry {
    /// Creates an optional entry with restrict-on-delete.
    pub fn new(relationship: RelationshipType, cardinality: Cardinality) -> Self {
        Self {
            relationship,
            cardinality,
            delete_behavior: DeleteBehavior::Restrict,
            required: false,
            description: String::new(),
        }
    }

    /// Sets the delete behavior.
    pub fn with_delete_behavior(mut self, behavior: DeleteBehavior) -> Self {
        self.delete_behavior = behavior;
        self
    }

    /// Marks the relationship as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

// ============================================================================
// RelationshipSchema
// ============================================================================

/// Table of allowed relationships keyed by type pair.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSchema {
    entries: BTreeMap<String, SchemaEntry>,
}

/// Builds the canonical `"a:b -> c:d"` key.
fn pair_key(from_type_key: &str, to_type_key: &str) -> String {
    format!("{from_type_key} -> {to_type_key}")
}

impl RelationshipSchema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or overwrites) the entry for a type pair.
    pub fn add_relationship(
        &mut self,
        from_service: &str,
        from_type: &str,
        to_service: &str,
        to_type: &str,
        entry: SchemaEntry,
    ) {
        let key = pair_key(
            &format!("{from_service}:{from_type}"),
            &format!("{to_service}:{to_type}"),
        );
        self.entries.insert(key, entry);
    }

    /// Exact lookup by type pair.
    pub fn get_relationship(
        &self,
        from_service: &str,
        from_type: &str,
        to_service: &str,
        to_type: &str,
    ) -> Option<&SchemaEntry> {
        self.entries.get(&pair_key(
            &format!("{from_service}:{from_type}"),
            &format!("{to_service}:{to_type}"),
        ))
    }

    /// Whether the type pair has an entry.
    pub fn has_relationship(
        &self,
        from_service: &str,
        from_type: &str,
        to_service: &str,
        to_type: &str,
    ) -> bool {
        self.get_relationship(from_service, from_type, to_service, to_type)
            .is_some()
    }

    /// Entry for the type pair of two concrete resources.
    pub fn lookup(&self, from: &ResourceId, to: &ResourceId) -> Option<&SchemaEntry> {
        self.entries
            .get(&pair_key(&from.type_key(), &to.type_key()))
    }

    /// All entries whose source side is `service:resource_type`.
    pub fn get_relationships_for_source(
        &self,
        service: &str,
        resource_type: &str,
    ) -> Vec<(&str, &SchemaEntry)> {
        let prefix = format!("{service}:{resource_type} -> ");
        self.entries
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, entry)| (key.as_str(), entry))
            .collect()
    }

    /// All entries whose target side is `service:resource_type`.
    pub fn get_relationships_for_target(
        &self,
        service: &str,
        resource_type: &str,
    ) -> Vec<(&str, &SchemaEntry)> {
        let suffix = format!(" -> {service}:{resource_type}");
        self.entries
            .iter()
            .filter(|(key, _)| key.ends_with(&suffix))
            .map(|(key, entry)| (key.as_str(), entry))
            .collect()
    }

    /// Required entries for a source type key, as `(target_type_key, entry)`.
    pub fn required_for_source(&self, type_key: &str) -> Vec<(&str, &SchemaEntry)> {
        let prefix = format!("{type_key} -> ");
        self.entries
            .iter()
            .filter(|(_, entry)| entry.required)
            .filter_map(|(key, entry)| key.strip_prefix(&prefix).map(|target| (target, entry)))
            .collect()
    }

    /// Checks that `from -[relationship]-> to` is allowed.
    ///
    /// Pure: consults only the table. Cardinality needs the graph and is
    /// checked there.
    pub fn validate_relationship(
        &self,
        from: &ResourceId,
        to: &ResourceId,
        relationship: RelationshipType,
    ) -> Result<&SchemaEntry> {
        let entry = self
            .lookup(from, to)
            .ok_or_else(|| Error::SchemaValidation {
                from: from.clone(),
                to: to.clone(),
                relationship,
                reason: format!(
                    "no relationship defined from {} to {}",
                    from.type_key(),
                    to.type_key()
                ),
            })?;

        if entry.relationship != relationship {
            return Err(Error::SchemaValidation {
                from: from.clone(),
                to: to.clone(),
                relationship,
                reason: format!(
                    "expected relationship '{}', got '{}'",
                    entry.relationship, relationship
                ),
            });
        }

        Ok(entry)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the schema is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(key, entry)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> RelationshipSchema {
        let mut schema = RelationshipSchema::new();
        schema.add_relationship(
            "ec2",
            "subnet",
            "ec2",
            "vpc",
            SchemaEntry::new(RelationshipType::Contains, Cardinality::ManyToOne)
                .with_delete_behavior(DeleteBehavior::Cascade)
                .required(),
        );
        schema.add_relationship(
            "ec2",
            "instance",
            "ec2",
            "subnet",
            SchemaEntry::new(RelationshipType::References, Cardinality::ManyToOne),
        );
        schema.add_relationship(
            "ec2",
            "internet-gateway",
            "ec2",
            "vpc",
            SchemaEntry::new(RelationshipType::AttachedTo, Cardinality::OneToOne),
        );
        schema
    }

    #[test]
    fn test_exact_lookup() {
        let schema = sample_schema();
        assert!(schema.has_relationship("ec2", "subnet", "ec2", "vpc"));
        assert!(!schema.has_relationship("ec2", "vpc", "ec2", "subnet"));

        let entry = schema
            .get_relationship("ec2", "subnet", "ec2", "vpc")
            .unwrap();
        assert_eq!(entry.relationship, RelationshipType::Contains);
        assert_eq!(entry.delete_behavior, DeleteBehavior::Cascade);
        assert!(entry.required);
    }

    #[test]
    fn test_add_overwrites() {
        let mut schema = sample_schema();
        schema.add_relationship(
            "ec2",
            "subnet",
            "ec2",
            "vpc",
            SchemaEntry::new(RelationshipType::References, Cardinality::ManyToMany),
        );
        assert_eq!(schema.len(), 3);
        assert_eq!(
            schema
                .get_relationship("ec2", "subnet", "ec2", "vpc")
                .unwrap()
                .relationship,
            RelationshipType::References
        );
    }

    #[test]
    fn test_source_and_target_queries() {
        let schema = sample_schema();

        let into_vpc = schema.get_relationships_for_target("ec2", "vpc");
        assert_eq!(into_vpc.len(), 2);
        assert!(into_vpc.iter().all(|(k, _)| k.ends_with(" -> ec2:vpc")));

        let from_instance = schema.get_relationships_for_source("ec2", "instance");
        assert_eq!(from_instance.len(), 1);
        assert_eq!(from_instance[0].0, "ec2:instance -> ec2:subnet");

        assert!(schema.get_relationships_for_source("iam", "role").is_empty());
    }

    #[test]
    fn test_required_for_source() {
        let schema = sample_schema();
        let required = schema.required_for_source("ec2:subnet");
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].0, "ec2:vpc");
        assert!(schema.required_for_source("ec2:instance").is_empty());
    }

    #[test]
    fn test_validate_relationship() {
        let schema = sample_schema();
        let subnet = ResourceId::new("ec2", "subnet", "s-1");
        let vpc = ResourceId::new("ec2", "vpc", "v-1");

        assert!(
            schema
                .validate_relationship(&subnet, &vpc, RelationshipType::Contains)
                .is_ok()
        );

        let err = schema
            .validate_relationship(&subnet, &vpc, RelationshipType::References)
            .unwrap_err();
        assert!(err.is_schema_validation());
        assert!(err.to_string().contains("expected relationship 'contains'"));

        let err = schema
            .validate_relationship(&vpc, &subnet, RelationshipType::AssociatedWith)
            .unwrap_err();
        assert!(err.is_schema_validation());
        assert!(err.to_string().contains("no relationship defined"));
    }

    #[test]
    fn test_schema_serialization() {
        let schema = sample_schema();
        let json = serde_json::to_string(&schema).unwrap();
        let parsed: RelationshipSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, schema);
    }
}
