// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Traits and base types decoupling the [route search](crate::find_route)
//! from the OpenStreetMap-flavoured [Graph](crate::Graph).

/// Physical location of a point.
///
/// For on-Earth positions these are WGS-84 degrees, and
/// [haversine_earth_distance](crate::haversine_earth_distance) applies.
/// Graphs over synthetic data may put arbitrary planar coordinates here,
/// paired with [euclidean_distance](crate::euclidean_distance) or
/// [taxicab_distance](crate::taxicab_distance).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    #[inline]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Anything with a known [Position]. The only requirement of
/// [KDTree](crate::KDTree) elements.
pub trait WithPosition {
    fn position(&self) -> Position;
}

/// A node of a graph, as required by [find_route](crate::find_route).
pub trait NodeLike: WithPosition {
    fn id(&self) -> i64;
}

/// A [NodeLike] which additionally remembers the identifier of the
/// external (OpenStreetMap) node it represents. Multiple graph nodes may
/// share an `external_id` - this is how turn restrictions are encoded,
/// see [Graph](crate::Graph). Required by
/// [find_route_without_turn_around](crate::find_route_without_turn_around)
/// to recognize immediate turnarounds through logically-equivalent nodes.
pub trait ExternalNodeLike: NodeLike {
    fn external_id(&self) -> i64;
}

/// A directed graph with non-negative edge costs, as required by the
/// route search functions.
pub trait GraphLike {
    type Node: NodeLike;

    /// Retrieves a node with the provided id, or `None` if there is no such node.
    fn get_node(&self, id: i64) -> Option<&Self::Node>;

    /// Iterates over all outgoing edges of a node with the provided id,
    /// as (neighbor id, cost) pairs. Must yield nothing for unknown ids.
    fn edges(&self, id: i64) -> impl Iterator<Item = (i64, f64)> + '_;
}
