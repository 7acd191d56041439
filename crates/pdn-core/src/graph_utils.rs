use crate::topology::{TieLines, TopologyIndex};
use crate::{FeederId, NodeId};
use petgraph::algo::connected_components;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Summary statistics of the line graph (density, degree spread, component count).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub connected_components: usize,
    pub min_degree: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub density: f64,
}

/// Degree and component statistics over all lines, tie lines included.
pub fn graph_stats(topology: &TopologyIndex) -> GraphStats {
    let graph = topology.graph();
    let node_count = graph.node_count();
    let edge_count = graph.edge_count();
    let degrees: Vec<usize> = graph
        .node_indices()
        .map(|node| graph.neighbors(node).count())
        .collect();
    let min_degree = degrees.iter().copied().min().unwrap_or(0);
    let max_degree = degrees.iter().copied().max().unwrap_or(0);
    let avg_degree = if node_count == 0 {
        0.0
    } else {
        degrees.iter().sum::<usize>() as f64 / node_count as f64
    };
    let density = if node_count < 2 {
        0.0
    } else {
        2.0 * edge_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
    };
    GraphStats {
        node_count,
        edge_count,
        connected_components: connected_components(graph),
        min_degree,
        avg_degree,
        max_degree,
        density,
    }
}

/// Connected groups of nodes under the given tie policy, each sorted, ordered by
/// their smallest member.
pub fn islands(topology: &TopologyIndex, ties: TieLines) -> Vec<Vec<NodeId>> {
    let mut visited = BTreeSet::new();
    let mut islands = Vec::new();
    for start in topology.node_ids() {
        if visited.contains(&start) {
            continue;
        }
        let members = bfs_parents(topology, start, ties);
        visited.extend(members.keys().copied());
        islands.push(members.into_keys().collect());
    }
    islands
}

/// Shortest path by hop count, or `None` when `end` is unreachable.
///
/// Neighbors are expanded in ascending id order, so ties between equally short
/// paths always resolve the same way.
pub fn find_path(
    topology: &TopologyIndex,
    start: NodeId,
    end: NodeId,
    ties: TieLines,
) -> Option<Vec<NodeId>> {
    if !topology.contains_node(start) || !topology.contains_node(end) {
        return None;
    }
    let parents = bfs_parents(topology, start, ties);
    if !parents.contains_key(&end) {
        return None;
    }
    let mut path = vec![end];
    let mut current = end;
    while let Some(Some(parent)) = parents.get(&current) {
        path.push(*parent);
        current = *parent;
    }
    path.reverse();
    Some(path)
}

pub fn is_connected(topology: &TopologyIndex, a: NodeId, b: NodeId, ties: TieLines) -> bool {
    find_path(topology, a, b, ties).is_some()
}

/// Every simple path from `start` to `end` with at most `max_depth` lines.
///
/// Enumeration is exponential in the worst case; `max_depth` bounds it. Tie lines
/// are traversed.
pub fn all_paths(
    topology: &TopologyIndex,
    start: NodeId,
    end: NodeId,
    max_depth: usize,
) -> Vec<Vec<NodeId>> {
    let mut paths = Vec::new();
    if !topology.contains_node(start) || !topology.contains_node(end) {
        return paths;
    }
    let mut path = vec![start];
    extend_paths(topology, end, max_depth, &mut path, &mut paths);
    paths
}

fn extend_paths(
    topology: &TopologyIndex,
    end: NodeId,
    max_depth: usize,
    path: &mut Vec<NodeId>,
    paths: &mut Vec<Vec<NodeId>>,
) {
    let Some(&last) = path.last() else {
        return;
    };
    if last == end {
        paths.push(path.clone());
        return;
    }
    if path.len() > max_depth {
        return;
    }
    for next in topology.neighbors(last) {
        if path.contains(&next) {
            continue;
        }
        path.push(next);
        extend_paths(topology, end, max_depth, path, paths);
        path.pop();
    }
}

/// Which feeder roots reach each node with tie lines open.
///
/// A healthy radial network maps every node to exactly one feeder.
pub fn feeder_assignment(topology: &TopologyIndex) -> BTreeMap<NodeId, Vec<FeederId>> {
    let mut reach: BTreeMap<NodeId, Vec<FeederId>> = BTreeMap::new();
    for (feeder, root) in topology.feeders().iter() {
        for node in bfs_parents(topology, root, TieLines::Excluded).into_keys() {
            let feeders = reach.entry(node).or_default();
            if !feeders.contains(&feeder) {
                feeders.push(feeder);
            }
        }
    }
    reach
}

/// Breadth-first search from `start`; maps each reached node to its BFS parent.
fn bfs_parents(topology: &TopologyIndex, start: NodeId, ties: TieLines) -> Parents {
    let mut parents = Parents::new();
    if !topology.contains_node(start) {
        return parents;
    }
    parents.insert(start, None);
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        for next in topology.neighbors_with(node, ties) {
            if parents.contains_key(&next) {
                continue;
            }
            parents.insert(next, Some(node));
            queue.push_back(next);
        }
    }
    parents
}

type Parents = BTreeMap<NodeId, Option<NodeId>>;

/// Hop distance from `start` to every node it reaches.
pub fn hop_distances(
    topology: &TopologyIndex,
    start: NodeId,
    ties: TieLines,
) -> HashMap<NodeId, usize> {
    let mut dist = HashMap::new();
    if !topology.contains_node(start) {
        return dist;
    }
    dist.insert(start, 0);
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        let d = dist[&node];
        for next in topology.neighbors_with(node, ties) {
            if !dist.contains_key(&next) {
                dist.insert(next, d + 1);
                queue.push_back(next);
            }
        }
    }
    dist
}
