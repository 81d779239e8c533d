//! Domain-level errors (no external dependencies)

use std::fmt;

use thiserror::Error;

use crate::domain::entities::{MemberId, MembershipId, NodeId, Owner, ResourceTypeId};

/// Check that failed during membership admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// Current balance of the funding resource is below the fee
    InsufficientFunds { available: i64, required: i64 },
    /// Guaranteed income cannot sustain the fee on top of other commitments
    InsufficientEngagement { income: i64, committed: i64 },
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::InsufficientFunds {
                available,
                required,
            } => write!(f, "insufficient funds (have {}, fee {})", available, required),
            DenialReason::InsufficientEngagement { income, committed } => write!(
                f,
                "insufficient engagement (income {}, committed {})",
                income, committed
            ),
        }
    }
}

fn join_reasons(reasons: &[DenialReason]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Domain errors represent business rule violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("insufficient balance in {owner}: have {available}, need {requested}")]
    InsufficientBalance {
        owner: Owner,
        resource: ResourceTypeId,
        available: i64,
        requested: i64,
    },

    #[error("balance of {owner} in {resource} would leave the representable range")]
    BalanceOverflow {
        owner: Owner,
        resource: ResourceTypeId,
    },

    #[error("admission denied: {}", join_reasons(.0))]
    AdmissionDenied(Vec<DenialReason>),

    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("member {member} holds the member role on node {node} without a membership")]
    MissingMembership { node: NodeId, member: MemberId },

    #[error("no resource type configured for node: {0}")]
    MissingResourceType(NodeId),

    #[error("amount must not be negative: {0}")]
    NegativeAmount(i64),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("member not found: {0}")]
    MemberNotFound(MemberId),

    #[error("membership not found: {0}")]
    MembershipNotFound(MembershipId),

    #[error("resource type not found: {0}")]
    ResourceTypeNotFound(String),

    #[error("resource type already exists: {0}")]
    DuplicateResourceType(String),

    #[error("member {member} already holds a membership on node {node}")]
    DuplicateMembership { member: MemberId, node: NodeId },

    #[error("slug already taken: {0}")]
    DuplicateSlug(String),

    #[error("node {node} is full ({max} members)")]
    NodeFull { node: NodeId, max: usize },

    #[error("harvest plan for node {0} no longer matches its members or status")]
    HarvestOutdated(NodeId),

    #[error("invalid name: {0:?}")]
    InvalidName(String),
}
