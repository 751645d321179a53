// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

/// Recommended number of allowed node expansions in [find_route](crate::find_route) and
/// [find_route_without_turn_around](crate::find_route_without_turn_around)
/// before [RouteError::StepLimitExceeded] is returned.
pub const DEFAULT_STEP_LIMIT: usize = 1_000_000;

/// Error conditions which may occur during [find_route](crate::find_route) or
/// [find_route_without_turn_around](crate::find_route_without_turn_around).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// The start or end node doesn't exist in the graph.
    #[error("unknown node: {0}")]
    UnknownNode(i64),

    /// Route search has exceeded its limit of steps.
    /// Either the nodes are really far apart, or no route exists.
    ///
    /// Concluding that no route exists requires traversing everything
    /// reachable from the start, which can result in a denial-of-service.
    /// The step limit protects against resource exhaustion.
    #[error("step limit exceeded")]
    StepLimitExceeded,
}
