//! Immutable topology index.
//!
//! Built once from a [`NetworkSnapshot`] and never mutated afterwards, so it can be
//! shared behind an `Arc` by any number of risk-computation contexts. Per-scenario
//! state (demand, DG output) lives outside the index.
//!
//! Lookups follow one rule: *missing* data yields `None` and a `tracing` event,
//! *malformed* storage fails [`TopologyIndex::build`].

use crate::diagnostics::Diagnostics;
use crate::graph_utils::feeder_assignment;
use crate::{
    Category, EdgeKey, EdgeRecord, FeederId, FeederRoots, LineType, NetworkSnapshot, NodeId,
    NodeRecord, NodeTable, PdnError, PdnResult,
};
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Switching policy for inter-feeder tie lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieLines {
    /// Tie switches normally open: tie lines carry nothing
    #[default]
    Excluded,
    /// Tie switches closed for restoration
    Allowed,
}

impl TieLines {
    #[inline]
    pub fn permits(self, record: &EdgeRecord) -> bool {
        self == TieLines::Allowed || !record.is_tie()
    }
}

/// Node attribute selector for [`TopologyIndex::node_attr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAttr {
    Category,
    Power,
    HasDg,
    DgOutput,
    Feeder,
}

/// Edge attribute selector for [`TopologyIndex::edge_attr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeAttr {
    Length,
    Resistance,
    Reactance,
    LineType,
    SectionalizingSwitch,
    TieSwitch,
}

/// Value returned by the keyed attribute accessors.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Number(f64),
    Flag(bool),
    Text(String),
    Category(Category),
    Feeder(FeederId),
    LineType(LineType),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Flag(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Canonical storage and adjacency for one network snapshot.
#[derive(Debug, Clone)]
pub struct TopologyIndex {
    graph: UnGraph<NodeId, EdgeKey>,
    node_index: HashMap<NodeId, NodeIndex>,
    edge_index: HashMap<EdgeKey, EdgeIndex>,
    nodes: NodeTable,
    edges: BTreeMap<EdgeKey, EdgeRecord>,
    /// Edge keys in ingestion order
    order: Vec<EdgeKey>,
    feeders: FeederRoots,
}

impl TopologyIndex {
    /// Build the index, rejecting structurally corrupt edge storage.
    pub fn build(snapshot: NetworkSnapshot) -> PdnResult<Self> {
        let NetworkSnapshot {
            nodes,
            edges,
            feeders,
        } = snapshot;

        for (feeder, root) in feeders.iter() {
            if !nodes.contains_key(&root) {
                return Err(PdnError::UnknownNode {
                    node: root.value(),
                    context: format!("feeder {feeder} root"),
                });
            }
        }

        let mut graph = UnGraph::with_capacity(nodes.len(), edges.len());
        let mut node_index = HashMap::with_capacity(nodes.len());
        for &id in nodes.keys() {
            node_index.insert(id, graph.add_node(id));
        }

        let mut edge_index = HashMap::with_capacity(edges.len());
        let mut stored = BTreeMap::new();
        let mut order = Vec::with_capacity(edges.len());
        for entry in edges.iter() {
            let key = stored_key(&entry.key)?;
            let (lo, hi) = key.endpoints();
            let (Some(&a), Some(&b)) = (node_index.get(&lo), node_index.get(&hi)) else {
                let missing = if node_index.contains_key(&lo) { hi } else { lo };
                return Err(PdnError::UnknownNode {
                    node: missing.value(),
                    context: format!("edge {key}"),
                });
            };
            if stored.insert(key, entry.record.clone()).is_some() {
                return Err(PdnError::DuplicateEdge(lo.value(), hi.value()));
            }
            edge_index.insert(key, graph.add_edge(a, b, key));
            order.push(key);
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built topology index"
        );

        Ok(Self {
            graph,
            node_index,
            edge_index,
            nodes,
            edges: stored,
            order,
            feeders,
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn feeders(&self) -> &FeederRoots {
        &self.feeders
    }

    pub fn feeder_root(&self, feeder: FeederId) -> NodeId {
        self.feeders.root(feeder)
    }

    /// The feeder a node is assigned to in the node table.
    pub fn feeder_of(&self, node: NodeId) -> Option<FeederId> {
        self.node(node).map(|record| record.feeder)
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.node_index.contains_key(&node)
    }

    /// Node ids in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Node records in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeRecord)> + '_ {
        self.nodes.iter().map(|(id, record)| (*id, record))
    }

    /// Edge keys in ingestion order.
    pub fn edge_keys(&self) -> impl Iterator<Item = EdgeKey> + '_ {
        self.order.iter().copied()
    }

    /// Lines usable under the given tie policy, in ingestion order.
    pub fn lines(&self, ties: TieLines) -> impl Iterator<Item = (EdgeKey, &EdgeRecord)> + '_ {
        self.order.iter().filter_map(move |key| {
            let record = &self.edges[key];
            ties.permits(record).then_some((*key, record))
        })
    }

    pub fn node(&self, node: NodeId) -> Option<&NodeRecord> {
        let record = self.nodes.get(&node);
        if record.is_none() {
            debug!(%node, "node not present in topology");
        }
        record
    }

    /// Edge record for `(u, v)` in either orientation.
    pub fn edge(&self, u: NodeId, v: NodeId) -> Option<&EdgeRecord> {
        let key = EdgeKey::canonical(u, v);
        let record = self.edges.get(&key);
        if record.is_none() {
            debug!(edge = %key, "edge not present in topology");
        }
        record
    }

    pub fn has_edge(&self, u: NodeId, v: NodeId) -> bool {
        self.edge_index.contains_key(&EdgeKey::canonical(u, v))
    }

    /// All neighbors of `node`, sorted. Unknown nodes have no neighbors.
    pub fn neighbors(&self, node: NodeId) -> BTreeSet<NodeId> {
        self.neighbors_with(node, TieLines::Allowed)
    }

    /// Neighbors reachable over lines the tie policy permits, sorted.
    pub fn neighbors_with(&self, node: NodeId, ties: TieLines) -> BTreeSet<NodeId> {
        let Some(&idx) = self.node_index.get(&node) else {
            debug!(%node, "neighbors requested for unknown node");
            return BTreeSet::new();
        };
        self.graph
            .edges(idx)
            .filter(|edge| ties.permits(&self.edges[edge.weight()]))
            .filter_map(|edge| edge.weight().other(node))
            .collect()
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.node_index
            .get(&node)
            .map(|&idx| self.graph.edges(idx).count())
            .unwrap_or(0)
    }

    pub fn node_attr(&self, node: NodeId, attr: NodeAttr) -> Option<AttrValue> {
        let record = self.node(node)?;
        let value = match attr {
            NodeAttr::Category => Some(AttrValue::Category(record.category)),
            NodeAttr::Power => Some(AttrValue::Number(record.power_kw)),
            NodeAttr::HasDg => Some(AttrValue::Flag(record.has_dg)),
            NodeAttr::DgOutput => record.dg_output_kw.map(AttrValue::Number),
            NodeAttr::Feeder => Some(AttrValue::Feeder(record.feeder)),
        };
        if value.is_none() {
            debug!(%node, ?attr, "node attribute absent");
        }
        value
    }

    pub fn edge_attr(&self, u: NodeId, v: NodeId, attr: EdgeAttr) -> Option<AttrValue> {
        let record = self.edge(u, v)?;
        let value = match attr {
            EdgeAttr::Length => record.length_km.map(AttrValue::Number),
            EdgeAttr::Resistance => record.resistance_ohm.map(AttrValue::Number),
            EdgeAttr::Reactance => record.reactance_ohm.map(AttrValue::Number),
            EdgeAttr::LineType => Some(AttrValue::LineType(record.line_type)),
            EdgeAttr::SectionalizingSwitch => {
                record.sectionalizing_switch.clone().map(AttrValue::Text)
            }
            EdgeAttr::TieSwitch => record.tie_switch.clone().map(AttrValue::Text),
        };
        if value.is_none() {
            debug!(edge = %EdgeKey::canonical(u, v), ?attr, "edge attribute absent");
        }
        value
    }

    pub fn nodes_with_dg(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, record)| record.has_dg)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn nodes_by_category(&self, category: Category) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, record)| record.category == category)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn edges_by_line_type(&self, line_type: LineType) -> Vec<EdgeKey> {
        self.order
            .iter()
            .filter(|key| self.edges[*key].line_type == line_type)
            .copied()
            .collect()
    }

    /// Lines incident to `node`, sorted by the opposite endpoint.
    pub fn incident_edges(&self, node: NodeId) -> Vec<EdgeKey> {
        self.neighbors(node)
            .into_iter()
            .map(|other| EdgeKey::canonical(node, other))
            .collect()
    }

    pub(crate) fn graph(&self) -> &UnGraph<NodeId, EdgeKey> {
        &self.graph
    }

    /// Validate soft invariants of the snapshot.
    ///
    /// Structural problems were already rejected by [`TopologyIndex::build`]; this
    /// reports the rest: feeder reachability with tie lines open, incomplete line
    /// data and inconsistent switching metadata.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        if self.nodes.is_empty() {
            diag.add_error("topology", "Network has no nodes");
            return;
        }

        let reach = feeder_assignment(self);
        for (id, record) in &self.nodes {
            let entity = format!("Node {id}");
            match reach.get(id).map(Vec::as_slice).unwrap_or(&[]) {
                [] => diag.add_error_with_entity(
                    "topology",
                    "Node is not reachable from any feeder with tie lines open",
                    &entity,
                ),
                [feeder] if *feeder != record.feeder => diag.add_warning_with_entity(
                    "topology",
                    &format!(
                        "Node is assigned to {} but supplied from {}",
                        record.feeder, feeder
                    ),
                    &entity,
                ),
                [_] => {}
                many => diag.add_error_with_entity(
                    "topology",
                    &format!(
                        "Node is reachable from {} feeders with tie lines open",
                        many.len()
                    ),
                    &entity,
                ),
            }

            if record.power_kw < 0.0 {
                diag.add_error_with_entity("data", "Negative demand", &entity);
            }
            if record.dg_output_kw.is_some() && !record.has_dg {
                diag.add_warning_with_entity(
                    "data",
                    "DG output given for a node without DG; ignored",
                    &entity,
                );
            }
        }

        for key in &self.order {
            let record = &self.edges[key];
            let entity = format!("Line {key}");
            if record.length_km.is_none() {
                diag.add_warning_with_entity("data", "Line has no length; treated as 0 km", &entity);
            }
            if record.resistance_ohm.is_none() && record.reactance_ohm.is_none() {
                diag.add_warning_with_entity(
                    "data",
                    "Line has no impedance data; capacity will be zero",
                    &entity,
                );
            }
            match record.line_type {
                LineType::Tie => {
                    if record.tie_switch.is_none() {
                        diag.add_warning_with_entity(
                            "switching",
                            "Tie line has no tie switch id",
                            &entity,
                        );
                    }
                    let (lo, hi) = key.endpoints();
                    if self.feeder_of(lo).is_some() && self.feeder_of(lo) == self.feeder_of(hi) {
                        diag.add_warning_with_entity(
                            "switching",
                            "Tie line connects two nodes of the same feeder",
                            &entity,
                        );
                    }
                }
                LineType::Normal => {
                    if record.tie_switch.is_some() {
                        diag.add_warning_with_entity(
                            "switching",
                            "Normal line carries a tie switch id",
                            &entity,
                        );
                    }
                }
            }
        }

        if diag.has_errors() {
            warn!(summary = %diag.summary(), "topology validation found errors");
        }
    }
}

/// Check a raw stored key: exactly two distinct ids, smaller first.
fn stored_key(raw: &[NodeId]) -> PdnResult<EdgeKey> {
    match raw {
        [u, v] if u == v => Err(PdnError::MalformedEdgeKey {
            key: format!("({u}, {v})"),
            reason: "self-loop".to_string(),
        }),
        [u, v] if u > v => Err(PdnError::NonCanonicalEdge(u.value(), v.value())),
        [u, v] => Ok(EdgeKey::canonical(*u, *v)),
        other => Err(PdnError::MalformedEdgeKey {
            key: format!("{:?}", other.iter().map(NodeId::value).collect::<Vec<_>>()),
            reason: format!("expected a pair of node ids, found {} ids", other.len()),
        }),
    }
}
