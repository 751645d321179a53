// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Interpretation of [OpenStreetMap](https://www.openstreetmap.org/) data
//! as a routing [Graph](crate::Graph): the feature model, transport
//! [profiles](Profile), the graph builder and OSM XML reading.

mod builder;
mod model;
mod profile;
mod reader;

pub(crate) use builder::GraphBuilder;

pub use builder::BuildError;
pub use model::{Feature, FeatureType, Node, Relation, RelationMember, Tags, Way};
pub use profile::{
    HighwayProfile, Profile, RailwayProfile, SkeletonProfile, TurnRestriction, BICYCLE_PROFILE,
    BUS_PROFILE, CAR_PROFILE, FOOT_PROFILE, RAILWAY_PROFILE, SUBWAY_PROFILE, TRAM_PROFILE,
};
pub use reader::{
    add_features_from_buffer, add_features_from_file, add_features_from_io, Features, FileFormat,
    ReadError,
};
