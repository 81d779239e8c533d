//! Domain entities: core data structures

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

id_type!(
    /// Identifier of a node in the hierarchy.
    NodeId
);
id_type!(
    /// Identifier of a member.
    MemberId
);
id_type!(
    /// Identifier of a resource type.
    ResourceTypeId
);
id_type!(
    /// Identifier of a membership offered by a node.
    MembershipId
);

/// Growth status of a node, derived from its two flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Seed,
    Sprout,
    Plant,
    Tree,
}

impl Status {
    pub fn from_flags(manifested: bool, growing: bool) -> Self {
        match (manifested, growing) {
            (false, false) => Status::Seed,
            (false, true) => Status::Sprout,
            (true, false) => Status::Plant,
            (true, true) => Status::Tree,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Seed => "seed",
            Status::Sprout => "sprout",
            Status::Plant => "plant",
            Status::Tree => "tree",
        };
        write!(f, "{}", s)
    }
}

/// Role tag a member can wear on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Caretaker,
    Member,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Caretaker, Role::Member];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Caretaker => write!(f, "caretaker"),
            Role::Member => write!(f, "member"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "caretaker" => Ok(Role::Caretaker),
            "member" => Ok(Role::Member),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Owner of a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Owner {
    Node(NodeId),
    Member(MemberId),
}

impl Owner {
    /// Node treasuries may be overdrawn, member ledgers may not.
    pub fn may_overdraw(&self) -> bool {
        matches!(self, Owner::Node(_))
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Node(id) => write!(f, "node:{}", id),
            Owner::Member(id) => write!(f, "member:{}", id),
        }
    }
}

/// A node of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub video_url: Option<String>,
    pub manifested: bool,
    pub growing: bool,
    /// Parent node, None for the root
    pub mother: Option<NodeId>,
    /// Production rate granted to new members
    pub monthly_fruit_basis: i64,
    pub max_members: usize,
    /// The node's own resource type
    pub resource_type: Option<ResourceTypeId>,
}

impl Node {
    pub fn status(&self) -> Status {
        Status::from_flags(self.manifested, self.growing)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.status())
    }
}

/// Terms of a membership offered when creating a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipTerms {
    pub name: String,
    pub monthly_fee: i64,
    pub monthly_gain: i64,
}

/// Parameters for creating a child node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeParams {
    pub name: String,
    pub description: String,
    pub video_url: Option<String>,
    /// Explicit parent from the request; must match the node it is created under
    pub mother: Option<NodeId>,
    pub monthly_fruit_basis: Option<i64>,
    pub max_members: Option<usize>,
    /// Name of the node's own resource type, if it gets one
    pub resource_name: Option<String>,
    pub memberships: Vec<MembershipTerms>,
}

impl NodeParams {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A participant holding roles and memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Scope of a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "node", rename_all = "lowercase")]
pub enum ResourceScope {
    /// The base currency
    Global,
    Node(NodeId),
}

/// A named fungible resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    pub id: ResourceTypeId,
    pub name: String,
    pub scope: ResourceScope,
}

/// Balance container of one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub owner: Owner,
    pub balances: std::collections::BTreeMap<ResourceTypeId, i64>,
}

impl Ledger {
    pub fn new(owner: Owner) -> Self {
        Self {
            owner,
            balances: Default::default(),
        }
    }

    pub fn balance(&self, resource: ResourceTypeId) -> i64 {
        self.balances.get(&resource).copied().unwrap_or(0)
    }
}

/// A member's recurring yield source ("fruit tree") for one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionCapacity {
    pub owner: MemberId,
    pub resource: ResourceTypeId,
    pub monthly_yield: i64,
}

/// Fee/income terms a node offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub node: NodeId,
    pub name: String,
    pub monthly_fee: i64,
    pub monthly_gain: i64,
}

/// Record that a member holds and paid a node's membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipCard {
    pub member: MemberId,
    pub node: NodeId,
    pub membership: MembershipId,
    /// Customer id at the payment provider
    #[serde(default)]
    pub payment_id: Option<String>,
}

/// Role tag ("tshirt") worn by a member on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub node: NodeId,
    pub member: MemberId,
    pub role: Role,
}

/// Kind of monthly batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    Harvest,
    Engagement,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchKind::Harvest => write!(f, "harvest"),
            BatchKind::Engagement => write!(f, "engagement"),
        }
    }
}

/// Calendar month a batch runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, String> {
        if !(1..=12).contains(&month) {
            return Err(format!("invalid month: {}", month));
        }
        Ok(Self { year, month })
    }

    /// Period of the current local date.
    pub fn current() -> Self {
        use chrono::Datelike;
        let today = chrono::Local::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got: {}", s))?;
        let year = year
            .parse::<i32>()
            .map_err(|e| format!("invalid year in {}: {}", s, e))?;
        let month = month
            .parse::<u32>()
            .map_err(|e| format!("invalid month in {}: {}", s, e))?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for Period {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(value: Period) -> Self {
        value.to_string()
    }
}

/// Completed node-period of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchMark {
    pub node: NodeId,
    pub period: Period,
    pub kind: BatchKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(false, false, Status::Seed)]
    #[case(false, true, Status::Sprout)]
    #[case(true, false, Status::Plant)]
    #[case(true, true, Status::Tree)]
    fn test_status_from_flags(
        #[case] manifested: bool,
        #[case] growing: bool,
        #[case] expected: Status,
    ) {
        assert_eq!(Status::from_flags(manifested, growing), expected);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Caretaker".parse::<Role>().unwrap(), Role::Caretaker);
        assert_eq!(" member ".parse::<Role>().unwrap(), Role::Member);
        assert!("gardener".parse::<Role>().is_err());
    }

    #[test]
    fn test_period_parse_and_display() {
        let period: Period = "2026-03".parse().unwrap();
        assert_eq!(period, Period { year: 2026, month: 3 });
        assert_eq!(period.to_string(), "2026-03");
        assert!("2026-13".parse::<Period>().is_err());
        assert!("202603".parse::<Period>().is_err());
    }

    #[test]
    fn test_node_treasury_may_overdraw() {
        assert!(Owner::Node(NodeId::generate()).may_overdraw());
        assert!(!Owner::Member(MemberId::generate()).may_overdraw());
    }
}
