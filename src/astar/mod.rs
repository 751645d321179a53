// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

mod error;
mod no_turn_around;
mod plain;

pub use error::{RouteError, DEFAULT_STEP_LIMIT};
pub use no_turn_around::{find_route_without_turn_around, find_route_without_turn_around_with};
pub use plain::{find_route, find_route_with};
