//! Node lifecycle service
//!
//! Creation, membership of members in nodes, status flags and destruction.

use std::collections::BTreeSet;
use std::sync::Arc;

use termtree::Tree;
use tracing::{info, instrument};

use crate::application::store::OrchardStore;
use crate::application::ApplicationResult;
use crate::domain::{
    MemberId, Membership, Node, NodeId, NodeParams, Orchard, Owner, Role, Status,
};
use crate::util::text::video_embed;

/// Everything worth showing about one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub node: Node,
    pub status: Status,
    pub parent: Option<NodeId>,
    /// Slugs from the root down to this node
    pub path: Vec<String>,
    pub children: Vec<NodeId>,
    pub caretakers: BTreeSet<MemberId>,
    pub members: BTreeSet<MemberId>,
    pub memberships: Vec<Membership>,
    /// Treasury balances by resource name
    pub treasury: Vec<(String, i64)>,
    pub can_accept_members: bool,
    pub video: String,
}

pub struct NodeService {
    store: Arc<OrchardStore>,
}

impl NodeService {
    pub fn new(store: Arc<OrchardStore>) -> Self {
        Self { store }
    }

    /// Create a child below `parent`, founded by `founder`.
    #[instrument(level = "debug", skip(self, params), fields(name = %params.name))]
    pub fn create_child(
        &self,
        parent: NodeId,
        params: &NodeParams,
        founder: MemberId,
    ) -> ApplicationResult<NodeId> {
        self.store
            .transaction(|o| o.create_child(parent, params, founder))
    }

    /// Give `member` the member role, a production capacity and a balance slot.
    pub fn admit_member(&self, node: NodeId, member: MemberId) -> ApplicationResult<()> {
        self.store.transaction(|o| o.admit_member(node, member))
    }

    pub fn remove_member(&self, node: NodeId, member: MemberId) -> ApplicationResult<()> {
        self.store.transaction(|o| o.remove_member(node, member))
    }

    /// Destroy `node` and everything below it. Returns the removed ids, leaves first.
    pub fn destroy(&self, node: NodeId) -> ApplicationResult<Vec<NodeId>> {
        let removed = self.store.transaction(|o| o.destroy_node(node))?;
        info!(node = %node, removed = removed.len(), "node destroyed");
        Ok(removed)
    }

    pub fn set_status(
        &self,
        node: NodeId,
        manifested: bool,
        growing: bool,
    ) -> ApplicationResult<Status> {
        self.store
            .transaction(|o| o.set_status(node, manifested, growing))
    }

    /// Grant missing production capacities to the members of `node`.
    pub fn ensure_capacities(&self, node: NodeId) -> ApplicationResult<Vec<MemberId>> {
        let granted = self.store.transaction(|o| o.ensure_capacities(node))?;
        for member in &granted {
            info!(node = %node, member = %member, "granted production capacity");
        }
        Ok(granted)
    }

    pub fn nodes(&self) -> ApplicationResult<Vec<Node>> {
        self.store.read(|o| o.nodes().cloned().collect())
    }

    pub fn descendants(&self, node: NodeId) -> ApplicationResult<Vec<NodeId>> {
        self.store.read(|o| -> ApplicationResult<Vec<NodeId>> {
            o.node(node)?;
            Ok(o.tree().descendants(node))
        })?
    }

    pub fn info(&self, node: NodeId) -> ApplicationResult<NodeInfo> {
        self.store.read(|o| node_info(o, node))?
    }

    /// Render the hierarchy below `from` (the root when `None`).
    pub fn tree(&self, from: Option<NodeId>) -> ApplicationResult<Tree<String>> {
        self.store.read(|o| -> ApplicationResult<Tree<String>> {
            let start = from.unwrap_or_else(|| o.root());
            o.node(start)?;
            Ok(o.tree().to_termtree(start, &|n: &Node| {
                format!("{} [{}] ({})", n.name, n.status(), n.slug)
            }))
        })?
    }
}

fn node_info(o: &Orchard, id: NodeId) -> ApplicationResult<NodeInfo> {
    let node = o.node(id)?.clone();
    let treasury = o
        .ledger(Owner::Node(id))
        .map(|ledger| {
            ledger
                .balances
                .iter()
                .map(|(rt, amount)| {
                    let name = o
                        .resource_type(*rt)
                        .map(|r| r.name.clone())
                        .unwrap_or_else(|| rt.to_string());
                    (name, *amount)
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(NodeInfo {
        status: node.status(),
        parent: o.tree().parent(id),
        path: o
            .tree()
            .ancestors(id)
            .into_iter()
            .rev()
            .chain(std::iter::once(id))
            .filter_map(|n| o.node(n).ok().map(|n| n.slug.clone()))
            .collect(),
        children: o.tree().children(id),
        caretakers: o.members_with_role(id, Role::Caretaker),
        members: o.members_with_role(id, Role::Member),
        memberships: o.memberships_offered(id).into_iter().cloned().collect(),
        treasury,
        can_accept_members: o.can_accept_members(id),
        video: video_embed(node.video_url.as_deref()),
        node,
    })
}
