//! # pdn-core: Distribution Network Model Core
//!
//! Data structures and the immutable topology index for distribution-network
//! risk analysis.
//!
//! ## Design Philosophy
//!
//! A distribution network is modeled as an **undirected simple graph** where:
//! - **Nodes**: load points, each with a user category, a demand in kW, an optional
//!   distributed-generation (DG) unit, and the feeder (substation) that normally
//!   supplies it
//! - **Edges**: lines with length, series impedance, a line type (normal or
//!   inter-feeder tie) and optional sectionalizing / tie switch ids
//!
//! Every edge is stored under a canonical [`EdgeKey`] (smaller id first). Queries
//! normalize `(u, v)` before lookup, so callers never care about orientation.
//!
//! ## Quick Start
//!
//! ```rust
//! use pdn_core::*;
//!
//! let mut nodes = NodeTable::new();
//! nodes.insert(NodeId::new(1), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb1));
//! nodes.insert(NodeId::new(2), NodeRecord::new(Category::Commercial, 120.0, FeederId::Cb1));
//! nodes.insert(NodeId::new(3), NodeRecord::new(Category::Residential, 80.0, FeederId::Cb2));
//! nodes.insert(NodeId::new(4), NodeRecord::new(Category::Government, 60.0, FeederId::Cb3));
//!
//! let mut edges = EdgeTable::new();
//! edges.insert(NodeId::new(1), NodeId::new(2), EdgeRecord::line(1.2, 0.3, 0.4));
//! edges.insert(NodeId::new(2), NodeId::new(3), EdgeRecord::line(0.8, 0.2, 0.3).as_tie("T1"));
//!
//! let feeders = FeederRoots::new(NodeId::new(1), NodeId::new(3), NodeId::new(4));
//! let topology = TopologyIndex::build(NetworkSnapshot::new(nodes, edges, feeders))?;
//!
//! // Lookups are orientation-free
//! assert!(topology.edge(NodeId::new(2), NodeId::new(1)).is_some());
//! // Missing data is an explicit absent value, not an error
//! assert!(topology.node(NodeId::new(99)).is_none());
//! # Ok::<(), PdnError>(())
//! ```
//!
//! ## Modules
//!
//! - [`topology`] - The immutable [`TopologyIndex`]
//! - [`graph_utils`] - Path finding, connectivity and feeder reachability
//! - [`diagnostics`] - Validation reporting
//! - [`units`] - Unit newtypes (kW, kV, Ω, km, A)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod diagnostics;
pub mod error;
pub mod graph_utils;
pub mod topology;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{ensure_non_negative, PdnError, PdnResult};
pub use graph_utils::*;
pub use topology::{AttrValue, EdgeAttr, NodeAttr, TieLines, TopologyIndex};
pub use units::{Amperes, Kilometers, Kilovolts, Kilowatts, Ohms};

/// Canonical node identifier.
///
/// Ingestion may see ids as JSON object keys (`"17"`) or integers (`17`); both
/// deserialize to the same `NodeId`, and nothing downstream handles raw ids.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub const fn new(value: u32) -> Self {
        NodeId(value)
    }
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User category of a load point. Drives the consequence weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Residential,
    Commercial,
    /// Government and institutional users
    #[serde(alias = "institutional")]
    Government,
    /// Office and building users
    #[serde(alias = "building")]
    Office,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Residential,
        Category::Commercial,
        Category::Government,
        Category::Office,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Residential => "residential",
            Category::Commercial => "commercial",
            Category::Government => "government",
            Category::Office => "office",
        }
    }
}

/// One of the three substation feeders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeederId {
    #[serde(rename = "CB1", alias = "cb1")]
    Cb1,
    #[serde(rename = "CB2", alias = "cb2")]
    Cb2,
    #[serde(rename = "CB3", alias = "cb3")]
    Cb3,
}

impl FeederId {
    pub const ALL: [FeederId; 3] = [FeederId::Cb1, FeederId::Cb2, FeederId::Cb3];

    pub fn label(&self) -> &'static str {
        match self {
            FeederId::Cb1 => "CB1",
            FeederId::Cb2 => "CB2",
            FeederId::Cb3 => "CB3",
        }
    }
}

impl std::fmt::Display for FeederId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The node each feeder is anchored at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeederRoots {
    #[serde(rename = "CB1", alias = "cb1")]
    pub cb1: NodeId,
    #[serde(rename = "CB2", alias = "cb2")]
    pub cb2: NodeId,
    #[serde(rename = "CB3", alias = "cb3")]
    pub cb3: NodeId,
}

impl FeederRoots {
    pub fn new(cb1: NodeId, cb2: NodeId, cb3: NodeId) -> Self {
        Self { cb1, cb2, cb3 }
    }

    pub fn root(&self, feeder: FeederId) -> NodeId {
        match feeder {
            FeederId::Cb1 => self.cb1,
            FeederId::Cb2 => self.cb2,
            FeederId::Cb3 => self.cb3,
        }
    }

    /// `(feeder, root node)` pairs in CB1..CB3 order.
    pub fn iter(&self) -> impl Iterator<Item = (FeederId, NodeId)> + '_ {
        FeederId::ALL.into_iter().map(move |f| (f, self.root(f)))
    }

    /// The feeder anchored at `node`, if any.
    pub fn feeder_at(&self, node: NodeId) -> Option<FeederId> {
        self.iter().find(|(_, root)| *root == node).map(|(f, _)| f)
    }
}

/// Attributes of a load point.
///
/// Field aliases also accept the short names `type`, `power`, `DG` and
/// `which_substation`. Only the field names are aliased; values must use the
/// English category and feeder spellings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(alias = "type")]
    pub category: Category,
    /// Active power demand (kW)
    #[serde(alias = "power")]
    pub power_kw: f64,
    #[serde(default, alias = "DG")]
    pub has_dg: bool,
    /// DG output (kW); falls back to the configured default when `has_dg` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dg_output_kw: Option<f64>,
    #[serde(alias = "which_substation")]
    pub feeder: FeederId,
}

impl NodeRecord {
    pub fn new(category: Category, power_kw: f64, feeder: FeederId) -> Self {
        Self {
            category,
            power_kw,
            has_dg: false,
            dg_output_kw: None,
            feeder,
        }
    }

    /// Mark the node as hosting DG, optionally with an explicit output.
    pub fn with_dg(mut self, output_kw: Option<f64>) -> Self {
        self.has_dg = true;
        self.dg_output_kw = output_kw;
        self
    }
}

/// Line type: normal (closed) or inter-feeder tie (normally open).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineType {
    #[default]
    Normal,
    #[serde(alias = "inter_feeder_tie")]
    Tie,
}

/// Static attributes of a line.
///
/// Capacity is deliberately absent: it depends on the DG state at the endpoints
/// and is recomputed on demand by the capacity model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    #[serde(default, alias = "length")]
    pub length_km: Option<f64>,
    #[serde(default, alias = "Resistor")]
    pub resistance_ohm: Option<f64>,
    #[serde(default, alias = "Reactance")]
    pub reactance_ohm: Option<f64>,
    #[serde(default, alias = "type")]
    pub line_type: LineType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sectionalizing_switch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tie_switch: Option<String>,
}

impl EdgeRecord {
    /// A normal line with full electrical data.
    pub fn line(length_km: f64, resistance_ohm: f64, reactance_ohm: f64) -> Self {
        Self {
            length_km: Some(length_km),
            resistance_ohm: Some(resistance_ohm),
            reactance_ohm: Some(reactance_ohm),
            ..Self::default()
        }
    }

    pub fn with_sectionalizing_switch(mut self, switch_id: impl Into<String>) -> Self {
        self.sectionalizing_switch = Some(switch_id.into());
        self
    }

    /// Turn the line into a normally-open inter-feeder tie.
    pub fn as_tie(mut self, tie_switch_id: impl Into<String>) -> Self {
        self.line_type = LineType::Tie;
        self.tie_switch = Some(tie_switch_id.into());
        self
    }

    pub fn is_tie(&self) -> bool {
        self.line_type == LineType::Tie
    }

    pub fn length(&self) -> Option<Kilometers> {
        self.length_km.map(Kilometers)
    }
}

/// Canonical key of an undirected edge: `lo < hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeKey {
    lo: NodeId,
    hi: NodeId,
}

impl EdgeKey {
    /// Normalize an arbitrary `(u, v)` query into storage order.
    #[inline]
    pub fn canonical(u: NodeId, v: NodeId) -> Self {
        if u <= v {
            EdgeKey { lo: u, hi: v }
        } else {
            EdgeKey { lo: v, hi: u }
        }
    }

    #[inline]
    pub fn lo(&self) -> NodeId {
        self.lo
    }

    #[inline]
    pub fn hi(&self) -> NodeId {
        self.hi
    }

    pub fn endpoints(&self) -> (NodeId, NodeId) {
        (self.lo, self.hi)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.lo == node || self.hi == node
    }

    /// The endpoint opposite `node`, if `node` is an endpoint.
    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if node == self.lo {
            Some(self.hi)
        } else if node == self.hi {
            Some(self.lo)
        } else {
            None
        }
    }
}

impl std::fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.lo, self.hi)
    }
}

/// One row of the edge table as delivered by ingestion: a raw key and its record.
///
/// The key is kept raw so the topology index can reject malformed or
/// non-canonical storage instead of silently fixing it.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeEntry {
    pub key: Vec<NodeId>,
    pub record: EdgeRecord,
}

impl EdgeEntry {
    pub fn new(u: NodeId, v: NodeId, record: EdgeRecord) -> Self {
        Self {
            key: vec![u, v],
            record,
        }
    }
}

/// Ordered edge table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeTable {
    entries: Vec<EdgeEntry>,
}

impl EdgeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw entry as-is.
    pub fn push(&mut self, entry: EdgeEntry) {
        self.entries.push(entry);
    }

    /// Append an edge under its canonical key.
    pub fn insert(&mut self, u: NodeId, v: NodeId, record: EdgeRecord) {
        let key = EdgeKey::canonical(u, v);
        self.entries.push(EdgeEntry::new(key.lo(), key.hi(), record));
    }

    /// Parse the exported JSON shape: a list of single-entry objects keyed by the
    /// textual pair, e.g. `[{"(1, 2)": {"length": 0.5, ...}}]`.
    pub fn from_json_str(json: &str) -> PdnResult<Self> {
        let rows: Vec<BTreeMap<String, EdgeRecord>> = serde_json::from_str(json)?;
        let mut table = EdgeTable::new();
        for row in rows {
            if row.len() != 1 {
                let keys: Vec<&str> = row.keys().map(String::as_str).collect();
                return Err(PdnError::MalformedEdgeKey {
                    key: format!("{keys:?}"),
                    reason: format!("edge row must hold exactly one key, found {}", row.len()),
                });
            }
            for (text, record) in row {
                table.push(EdgeEntry {
                    key: parse_edge_key(&text)?,
                    record,
                });
            }
        }
        Ok(table)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EdgeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<EdgeEntry> for EdgeTable {
    fn from_iter<I: IntoIterator<Item = EdgeEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EdgeTable {
    type Item = &'a EdgeEntry;
    type IntoIter = std::slice::Iter<'a, EdgeEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Parse a textual edge key such as `"(1, 2)"`, `"[1,2]"` or `"1,2"` into raw ids.
///
/// Only the syntax is checked here; arity and ordering are enforced when the
/// topology index is built.
pub fn parse_edge_key(text: &str) -> PdnResult<Vec<NodeId>> {
    let inner = text
        .trim()
        .trim_start_matches(['(', '['])
        .trim_end_matches([')', ']']);
    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<u32>()
                .map(NodeId::new)
                .map_err(|err| PdnError::MalformedEdgeKey {
                    key: text.to_string(),
                    reason: format!("'{}' is not a node id: {err}", part.trim()),
                })
        })
        .collect()
}

/// Node attributes keyed by canonical id.
pub type NodeTable = BTreeMap<NodeId, NodeRecord>;

/// Everything the engine needs, handed over by value.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSnapshot {
    pub nodes: NodeTable,
    pub edges: EdgeTable,
    pub feeders: FeederRoots,
}

impl NetworkSnapshot {
    pub fn new(nodes: NodeTable, edges: EdgeTable, feeders: FeederRoots) -> Self {
        Self {
            nodes,
            edges,
            feeders,
        }
    }

    /// Build a snapshot from the exported JSON node and edge files.
    pub fn from_json(nodes_json: &str, edges_json: &str, feeders: FeederRoots) -> PdnResult<Self> {
        let nodes: NodeTable = serde_json::from_str(nodes_json)?;
        let edges = EdgeTable::from_json_str(edges_json)?;
        Ok(Self::new(nodes, edges, feeders))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_key_canonical() {
        let a = EdgeKey::canonical(NodeId::new(7), NodeId::new(3));
        let b = EdgeKey::canonical(NodeId::new(3), NodeId::new(7));
        assert_eq!(a, b);
        assert_eq!(a.lo(), NodeId::new(3));
        assert_eq!(a.other(NodeId::new(3)), Some(NodeId::new(7)));
        assert_eq!(a.other(NodeId::new(4)), None);
        assert_eq!(a.to_string(), "(3, 7)");
    }

    #[test]
    fn test_parse_edge_key_variants() {
        let ids = |v: Vec<NodeId>| v.into_iter().map(|n| n.value()).collect::<Vec<_>>();
        assert_eq!(ids(parse_edge_key("(1, 2)").unwrap()), vec![1, 2]);
        assert_eq!(ids(parse_edge_key("[4,9]").unwrap()), vec![4, 9]);
        assert_eq!(ids(parse_edge_key("(1, 2, 3)").unwrap()), vec![1, 2, 3]);
        assert!(parse_edge_key("(a, 2)").is_err());
        assert!(parse_edge_key("").is_err());
    }

    #[test]
    fn test_edge_length_in_kilometers() {
        assert_eq!(EdgeRecord::line(1.5, 0.3, 0.4).length(), Some(Kilometers(1.5)));
        assert_eq!(EdgeRecord::default().length(), None);
    }

    #[test]
    fn test_node_record_aliases() {
        let json = r#"{"type": "commercial", "power": 120.5, "DG": true, "which_substation": "CB2"}"#;
        let record: NodeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.category, Category::Commercial);
        assert!(record.has_dg);
        assert_eq!(record.feeder, FeederId::Cb2);
        assert!(record.dg_output_kw.is_none());
    }

    #[test]
    fn test_node_table_string_keys() {
        let json = r#"{
            "1": {"category": "residential", "power_kw": 10.0, "feeder": "CB1"},
            "12": {"category": "office", "power_kw": 40.0, "feeder": "CB1"}
        }"#;
        let table: NodeTable = serde_json::from_str(json).unwrap();
        assert!(table.contains_key(&NodeId::new(12)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_edge_table_from_json() {
        let json = r#"[
            {"(1, 2)": {"length": 0.5, "Resistor": 0.1, "Reactance": 0.2}},
            {"(2, 9)": {"length": 1.0, "type": "tie", "tie_switch": "S9-2"}}
        ]"#;
        let table = EdgeTable::from_json_str(json).unwrap();
        assert_eq!(table.len(), 2);
        let tie = &table.iter().nth(1).unwrap().record;
        assert!(tie.is_tie());
        assert!(tie.resistance_ohm.is_none());
    }

    #[test]
    fn test_edge_table_rejects_multi_key_rows() {
        let json = r#"[{"(1, 2)": {}, "(2, 3)": {}}]"#;
        let err = EdgeTable::from_json_str(json).unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_feeder_roots_lookup() {
        let roots = FeederRoots::new(NodeId::new(1), NodeId::new(23), NodeId::new(43));
        assert_eq!(roots.root(FeederId::Cb2), NodeId::new(23));
        assert_eq!(roots.feeder_at(NodeId::new(43)), Some(FeederId::Cb3));
        assert_eq!(roots.feeder_at(NodeId::new(2)), None);
    }
}
