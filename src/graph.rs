// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use crate::osm::{BuildError, Feature, GraphBuilder, Profile};
use crate::{haversine_earth_distance, ExternalNodeLike, GraphLike, NodeLike, Position, WithPosition};

/// Smallest node id reserved for phantom nodes (2⁵¹).
///
/// Ids of OpenStreetMap nodes must be smaller than this constant; ids at or
/// above it are minted by [Graph::add_features] when cloning nodes to encode
/// turn restrictions.
pub const PHANTOM_NODE_ID_BASE: i64 = 0x0008_0000_0000_0000;

/// A node of a [Graph].
///
/// Due to turn restriction processing, one OpenStreetMap node may be
/// represented by multiple GraphNode instances. If that is the case, the
/// "canonical" node (not bound by any turn restrictions) has
/// `id == external_id`, while its phantom clones have
/// `id >= `[PHANTOM_NODE_ID_BASE] and `external_id` pointing back at the
/// OpenStreetMap node they represent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphNode {
    pub id: i64,
    pub position: Position,
    pub external_id: i64,
}

impl GraphNode {
    /// Creates a canonical GraphNode, with `external_id` equal to `id`.
    pub const fn canonical(id: i64, position: Position) -> Self {
        Self {
            id,
            position,
            external_id: id,
        }
    }
}

impl WithPosition for GraphNode {
    #[inline]
    fn position(&self) -> Position {
        self.position
    }
}

impl NodeLike for GraphNode {
    #[inline]
    fn id(&self) -> i64 {
        self.id
    }
}

impl ExternalNodeLike for GraphNode {
    #[inline]
    fn external_id(&self) -> i64 {
        self.external_id
    }
}

/// A routing graph over OpenStreetMap data: a set of [GraphNodes](GraphNode)
/// with directed, non-negative-cost edges between them.
///
/// Edge costs encode "penalty × crow-flies length", see
/// [Profile::way_penalty].
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    pub(crate) nodes: BTreeMap<i64, GraphNode>,
    pub(crate) edges: BTreeMap<i64, BTreeMap<i64, f64>>,
    pub(crate) phantom_id_counter: i64,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Creates an empty Graph.
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            phantom_id_counter: PHANTOM_NODE_ID_BASE,
        }
    }

    /// Returns the number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns an iterator over all [GraphNodes](GraphNode), in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Retrieves a [GraphNode] with the provided id.
    pub fn get_node(&self, id: i64) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    /// Creates or updates a [GraphNode] with `node.id`.
    ///
    /// All outgoing and incoming edges are preserved. Updating a node's
    /// position may break the edge cost invariant (and thus route finding)
    /// and is therefore disallowed.
    pub fn set_node(&mut self, node: GraphNode) {
        self.nodes.insert(node.id, node);
    }

    /// Deletes a [GraphNode] with the given `id`, along with its outgoing
    /// edges. Incoming edges are preserved, as removing them would require a
    /// walk over the whole graph; re-using the id of a deleted node is
    /// therefore disallowed.
    pub fn delete_node(&mut self, id: i64) {
        self.nodes.remove(&id);
        self.edges.remove(&id);
    }

    /// Iterates over all outgoing edges of a node with the given id, as
    /// (neighbor id, cost) pairs. Yields nothing for unknown ids.
    pub fn get_edges(&self, from_id: i64) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.edges
            .get(&from_id)
            .into_iter()
            .flatten()
            .map(|(&to_id, &cost)| (to_id, cost))
    }

    /// Gets the cost of an edge between two nodes, or `None` if there is no
    /// such edge.
    pub fn get_edge(&self, from_id: i64, to_id: i64) -> Option<f64> {
        self.edges.get(&from_id)?.get(&to_id).copied()
    }

    /// Creates or updates an edge between two nodes.
    ///
    /// Both endpoints must exist in the graph, and `cost` must not be smaller
    /// than the crow-flies distance between them; neither is verified.
    pub fn set_edge(&mut self, from_id: i64, to_id: i64, cost: f64) {
        self.edges.entry(from_id).or_default().insert(to_id, cost);
    }

    /// Removes an edge between two nodes, if it exists.
    pub fn delete_edge(&mut self, from_id: i64, to_id: i64) {
        if let Some(edges) = self.edges.get_mut(&from_id) {
            edges.remove(&to_id);
        }
    }

    /// Finds the closest canonical (`id == external_id`) [GraphNode] to the
    /// given position, or `None` if the graph is empty.
    ///
    /// This function computes the distance to every node in the graph, and is
    /// not suitable for large graphs - use a [KDTree](crate::KDTree) if it
    /// becomes a bottleneck.
    pub fn find_nearest_node(&self, position: Position) -> Option<&GraphNode> {
        self.nodes
            .values()
            .filter(|nd| nd.id == nd.external_id)
            .map(|nd| (haversine_earth_distance(position, nd.position), nd))
            .min_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, nd)| nd)
    }

    /// Interprets a batch of OpenStreetMap features through the provided
    /// [Profile] and merges the resulting nodes and edges into the graph.
    ///
    /// Each batch must be self-contained: ways may only refer to nodes from
    /// the `features` iterable, and relations may only refer to ways and
    /// nodes from the `features` iterable. Within a batch, a feature may only
    /// refer to features defined earlier; listing all nodes first, then ways,
    /// then relations (the usual OSM XML ordering) satisfies this.
    ///
    /// When called on a non-empty graph the incoming data is merged:
    /// duplicate nodes keep the already-existing data, duplicate edges take
    /// the incoming cost, and duplicate turn restrictions are processed again
    /// (normally a no-op).
    ///
    /// Data-quality issues in the incoming features are reported as warnings
    /// through the [log] crate and the offending feature is skipped.
    pub fn add_features<I: IntoIterator<Item = Feature>>(
        &mut self,
        profile: &dyn Profile,
        features: I,
    ) -> Result<(), BuildError> {
        let mut builder = GraphBuilder::new(self, profile);
        for feature in features {
            builder.add_feature(feature)?;
        }
        builder.finish();
        Ok(())
    }
}

impl GraphLike for Graph {
    type Node = GraphNode;

    fn get_node(&self, id: i64) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    fn edges(&self, id: i64) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.get_edges(id)
    }
}
