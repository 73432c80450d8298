//! Static AWS relationship table.
//!
//! The emulator loads this once into the graph via `set_schema`. Type names
//! follow the resource-type segment the request handlers use when building
//! [`ResourceId`](nimbus_core::ResourceId)s.

use crate::schema::{RelationshipSchema, SchemaEntry};
use nimbus_core::{Cardinality, DeleteBehavior, RelationshipType};

use nimbus_core::Cardinality::{ManyToMany, ManyToOne, OneToMany, OneToOne};
use nimbus_core::DeleteBehavior::{Cascade, Restrict, SetNull};
use nimbus_core::RelationshipType::{AssociatedWith, AttachedTo, Contains, References};

struct Rule {
    from: (&'static str, &'static str),
    to: (&'static str, &'static str),
    relationship: RelationshipType,
    cardinality: Cardinality,
    on_delete: DeleteBehavior,
    required: bool,
    description: &'static str,
}

const fn rule(
    from: (&'static str, &'static str),
    to: (&'static str, &'static str),
    relationship: RelationshipType,
    cardinality: Cardinality,
    on_delete: DeleteBehavior,
    required: bool,
    description: &'static str,
) -> Rule {
    Rule {
        from,
        to,
        relationship,
        cardinality,
        on_delete,
        required,
        description,
    }
}

#[rustfmt::skip]
const AWS_RULES: &[Rule] = &[
    // EC2 networking
    rule(("ec2", "subnet"), ("ec2", "vpc"), Contains, ManyToOne, Cascade, true,
        "A subnet lives inside exactly one VPC"),
    rule(("ec2", "internet-gateway"), ("ec2", "vpc"), AttachedTo, OneToOne, Restrict, false,
        "A VPC has at most one internet gateway attached"),
    rule(("ec2", "route-table"), ("ec2", "vpc"), Contains, ManyToOne, Cascade, true,
        "A route table belongs to one VPC"),
    rule(("ec2", "route-table"), ("ec2", "subnet"), AssociatedWith, OneToMany, SetNull, false,
        "A subnet is associated with at most one route table"),
    rule(("ec2", "security-group"), ("ec2", "vpc"), Contains, ManyToOne, Cascade, true,
        "A security group belongs to one VPC"),
    rule(("ec2", "network-acl"), ("ec2", "vpc"), Contains, ManyToOne, Cascade, true,
        "A network ACL belongs to one VPC"),
    rule(("ec2", "vpc-endpoint"), ("ec2", "vpc"), Contains, ManyToOne, Cascade, true,
        "A VPC endpoint belongs to one VPC"),
    rule(("ec2", "nat-gateway"), ("ec2", "subnet"), Contains, ManyToOne, Restrict, true,
        "A NAT gateway is placed in one subnet"),
    rule(("ec2", "nat-gateway"), ("ec2", "elastic-ip"), References, OneToOne, Restrict, false,
        "A NAT gateway uses one elastic IP"),
    rule(("ec2", "network-interface"), ("ec2", "subnet"), Contains, ManyToOne, Restrict, true,
        "A network interface is created in one subnet"),
    rule(("ec2", "network-interface"), ("ec2", "security-group"), References, ManyToMany, SetNull, false,
        "Network interfaces reference security groups"),
    // EC2 compute
    rule(("ec2", "instance"), ("ec2", "subnet"), References, ManyToOne, Restrict, false,
        "An instance is launched into one subnet"),
    rule(("ec2", "instance"), ("ec2", "security-group"), References, ManyToMany, SetNull, false,
        "Instances reference security groups"),
    rule(("ec2", "instance"), ("iam", "instance-profile"), References, ManyToOne, SetNull, false,
        "An instance runs with at most one instance profile"),
    rule(("ec2", "volume"), ("ec2", "instance"), AttachedTo, ManyToOne, SetNull, false,
        "A volume is attached to at most one instance"),
    rule(("ec2", "elastic-ip"), ("ec2", "instance"), AssociatedWith, OneToOne, SetNull, false,
        "An elastic IP is associated with at most one instance"),
    // IAM
    rule(("iam", "instance-profile"), ("iam", "role"), References, ManyToOne, Restrict, false,
        "An instance profile wraps one role"),
    rule(("iam", "role"), ("iam", "policy"), AssociatedWith, ManyToMany, SetNull, false,
        "Managed policies attached to roles"),
    rule(("iam", "user"), ("iam", "policy"), AssociatedWith, ManyToMany, SetNull, false,
        "Managed policies attached to users"),
    rule(("iam", "user"), ("iam", "group"), AssociatedWith, ManyToMany, SetNull, false,
        "Group membership"),
    rule(("iam", "group"), ("iam", "policy"), AssociatedWith, ManyToMany, SetNull, false,
        "Managed policies attached to groups"),
    // Lambda
    rule(("lambda", "function"), ("iam", "role"), References, ManyToOne, Restrict, true,
        "A function executes with one role"),
    rule(("lambda", "function"), ("ec2", "subnet"), References, ManyToMany, SetNull, false,
        "VPC-enabled functions reference subnets"),
    rule(("lambda", "event-source-mapping"), ("lambda", "function"), References, ManyToOne, Cascade, true,
        "An event source mapping targets one function"),
    rule(("lambda", "event-source-mapping"), ("sqs", "queue"), References, ManyToOne, Cascade, false,
        "An event source mapping reads one queue"),
    // Storage and messaging
    rule(("s3", "object"), ("s3", "bucket"), Contains, ManyToOne, Cascade, true,
        "An object lives in one bucket"),
    rule(("s3", "bucket-policy"), ("s3", "bucket"), Contains, OneToOne, Cascade, true,
        "A bucket has at most one policy"),
    rule(("sns", "subscription"), ("sns", "topic"), Contains, ManyToOne, Cascade, true,
        "A subscription belongs to one topic"),
    rule(("sns", "subscription"), ("sqs", "queue"), References, ManyToOne, Cascade, false,
        "An SQS subscription delivers to one queue"),
    rule(("sqs", "queue"), ("sqs", "queue"), References, ManyToOne, SetNull, false,
        "Redrive policy dead-letter queue"),
    // RDS and load balancing
    rule(("rds", "db-subnet-group"), ("ec2", "subnet"), References, ManyToMany, Restrict, false,
        "A DB subnet group spans subnets"),
    rule(("rds", "db-instance"), ("rds", "db-subnet-group"), References, ManyToOne, Restrict, false,
        "A DB instance is placed via one subnet group"),
    rule(("elasticloadbalancing", "target-group"), ("ec2", "vpc"), Contains, ManyToOne, Restrict, false,
        "A target group belongs to one VPC"),
];

/// Builds the AWS relationship schema.
///
/// ```rust
/// use nimbus_graph::aws_relationship_schema;
///
/// let schema = aws_relationship_schema();
/// assert!(schema.has_relationship("ec2", "subnet", "ec2", "vpc"));
/// assert!(!schema.has_relationship("ec2", "vpc", "ec2", "subnet"));
/// ```
pub fn aws_relationship_schema() -> RelationshipSchema {
    let mut schema = RelationshipSchema::new();
    for r in AWS_RULES {
        let mut entry = SchemaEntry::new(r.relationship, r.cardinality)
            .with_delete_behavior(r.on_delete)
            .with_description(r.description);
        if r.required {
            entry = entry.required();
        }
        schema.add_relationship(r.from.0, r.from.1, r.to.0, r.to.1, entry);
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_rule_is_loaded() {
        assert_eq!(aws_relationship_schema().len(), AWS_RULES.len());
    }

    #[test]
    fn test_vpc_relationships() {
        let schema = aws_relationship_schema();

        let subnet = schema
            .get_relationship("ec2", "subnet", "ec2", "vpc")
            .unwrap();
        assert_eq!(subnet.relationship, Contains);
        assert_eq!(subnet.cardinality, ManyToOne);
        assert!(subnet.required);

        let igw = schema
            .get_relationship("ec2", "internet-gateway", "ec2", "vpc")
            .unwrap();
        assert_eq!(igw.relationship, AttachedTo);
        assert_eq!(igw.cardinality, OneToOne);

        assert!(schema.get_relationship("ec2", "vpc", "ec2", "subnet").is_none());
    }

    #[test]
    fn test_instance_references_subnet() {
        let schema = aws_relationship_schema();
        let entry = schema
            .get_relationship("ec2", "instance", "ec2", "subnet")
            .unwrap();
        assert_eq!(entry.relationship, References);
        assert_eq!(entry.delete_behavior, Restrict);
    }
}
