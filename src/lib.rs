// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Shortest-path routing over [OpenStreetMap](https://www.openstreetmap.org/) data.
//!
//! Wayfind converts OSM data into a standard weighted directed graph
//! representation, and runs A* to find shortest routes between nodes.
//! Interpretation of OSM data is customizable via
//! [profiles](crate::osm::Profile). Wayfind supports one-way streets,
//! access tags (on ways only) and turn restrictions.
//!
//! Turn restrictions are encoded directly in the graph by cloning the
//! restricted nodes into *phantom* nodes, so that route search stays an
//! ordinary shortest-path problem; see [GraphNode] for details. On graphs with
//! turn restrictions use [find_route_without_turn_around], which refuses to
//! step back through a logically-equivalent node.
//!
//! # Example
//!
//! ```no_run
//! let mut g = wayfind::Graph::new();
//! wayfind::osm::add_features_from_file(
//!     &mut g,
//!     &wayfind::osm::CAR_PROFILE,
//!     wayfind::osm::FileFormat::Unknown,
//!     "path/to/monaco.osm.gz",
//! )
//! .expect("failed to load monaco.osm.gz");
//!
//! let start = g
//!     .find_nearest_node(wayfind::Position::new(43.7384, 7.4246))
//!     .expect("empty graph");
//! let end = g
//!     .find_nearest_node(wayfind::Position::new(43.7478, 7.4323))
//!     .expect("empty graph");
//! let route = wayfind::find_route_without_turn_around(
//!     &g,
//!     start.id,
//!     end.id,
//!     Some(wayfind::DEFAULT_STEP_LIMIT),
//! )
//! .expect("failed to find route");
//!
//! println!("Route: {:?}", route);
//! ```

mod astar;
mod distance;
mod graph;
mod kd;
pub mod osm;
mod protocols;

pub use astar::{
    find_route, find_route_with, find_route_without_turn_around,
    find_route_without_turn_around_with, RouteError, DEFAULT_STEP_LIMIT,
};
pub use distance::{
    euclidean_distance, haversine_earth_distance, taxicab_distance, EARTH_DIAMETER, EARTH_RADIUS,
};
pub use graph::{Graph, GraphNode, PHANTOM_NODE_ID_BASE};
pub use kd::KDTree;
pub use protocols::{ExternalNodeLike, GraphLike, NodeLike, Position, WithPosition};
