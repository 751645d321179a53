// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::{haversine_earth_distance, GraphLike, Position, RouteError, WithPosition};

#[derive(Debug, Clone, Copy)]
struct QueueItem {
    node: i64,
    cost: f64,
    score: f64,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // NOTE: The order of comparison is reversed, as lower scores are
        // considered better ("higher"), and Rust's BinaryHeap is a max-heap.
        // The node id is compared last to make the expansion order, and thus
        // the returned route, deterministic.
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.cost.total_cmp(&self.cost))
            .then_with(|| other.node.cmp(&self.node))
    }
}

fn reconstruct_path(came_from: &HashMap<i64, i64>, mut last: i64) -> Vec<i64> {
    let mut path = vec![last];

    while let Some(&nd) = came_from.get(&last) {
        path.push(nd);
        last = nd;
    }

    path.reverse();
    path
}

/// Uses the [A* algorithm](https://en.wikipedia.org/wiki/A*_search_algorithm)
/// to find the shortest route between two nodes in the provided graph,
/// with the [haversine_earth_distance] heuristic.
///
/// Returns an empty vector if there is no route between the two nodes.
///
/// For graphs with turn restrictions, use
/// [find_route_without_turn_around](crate::find_route_without_turn_around),
/// as this implementation will generate instructions with immediate
/// turnarounds (A-B-A) to circumvent any restrictions.
///
/// `step_limit` limits how many nodes may be expanded during the search
/// before [RouteError::StepLimitExceeded] is returned; `None` lifts the
/// limit. Concluding that no route exists requires expanding every node
/// accessible from the start, which is usually very time-consuming,
/// especially on large datasets (like the whole planet). The recommended
/// value is [DEFAULT_STEP_LIMIT](crate::DEFAULT_STEP_LIMIT).
pub fn find_route<G: GraphLike>(
    g: &G,
    from_id: i64,
    to_id: i64,
    step_limit: Option<usize>,
) -> Result<Vec<i64>, RouteError> {
    find_route_with(g, from_id, to_id, haversine_earth_distance, step_limit)
}

/// Same as [find_route], except that the A* heuristic uses the provided
/// distance function.
///
/// For the search to return shortest routes, `distance` must be
/// [admissible](https://en.wikipedia.org/wiki/Admissible_heuristic):
/// it must never overestimate the cost of reaching the end node.
pub fn find_route_with<G, D>(
    g: &G,
    from_id: i64,
    to_id: i64,
    distance: D,
    step_limit: Option<usize>,
) -> Result<Vec<i64>, RouteError>
where
    G: GraphLike,
    D: Fn(Position, Position) -> f64,
{
    let mut queue: BinaryHeap<QueueItem> = BinaryHeap::new();
    let mut came_from: HashMap<i64, i64> = HashMap::new();
    let mut known_costs: HashMap<i64, f64> = HashMap::new();
    let mut steps: usize = 0;

    let to_position = g
        .get_node(to_id)
        .ok_or(RouteError::UnknownNode(to_id))?
        .position();
    let from_position = g
        .get_node(from_id)
        .ok_or(RouteError::UnknownNode(from_id))?
        .position();

    queue.push(QueueItem {
        node: from_id,
        cost: 0.0,
        score: distance(from_position, to_position),
    });
    known_costs.insert(from_id, 0.0);

    while let Some(item) = queue.pop() {
        if item.node == to_id {
            return Ok(reconstruct_path(&came_from, to_id));
        }

        // Contrary to the Wikipedia definition, the queue may hold multiple
        // items for the same node; stale ones are skipped at pop time.
        if item.cost > known_costs.get(&item.node).copied().unwrap_or(f64::INFINITY) {
            continue;
        }

        steps += 1;
        if step_limit.is_some_and(|limit| steps > limit) {
            return Err(RouteError::StepLimitExceeded);
        }

        for (neighbor_id, edge_cost) in g.edges(item.node) {
            let Some(neighbor) = g.get_node(neighbor_id) else {
                continue;
            };

            let neighbor_cost = item.cost + edge_cost;
            if neighbor_cost < known_costs.get(&neighbor_id).copied().unwrap_or(f64::INFINITY) {
                came_from.insert(neighbor_id, item.node);
                known_costs.insert(neighbor_id, neighbor_cost);
                queue.push(QueueItem {
                    node: neighbor_id,
                    cost: neighbor_cost,
                    score: neighbor_cost + distance(neighbor.position(), to_position),
                });
            }
        }
    }

    Ok(vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Graph, GraphNode, DEFAULT_STEP_LIMIT};

    //  4
    //  │ ╲
    //  1──2──3
    //
    // 1-2-3 is the geometrically straight connection, but carries a 10×
    // penalty; the 1-4, 4-3 legs carry none.
    fn penalty_graph() -> Graph {
        let mut g = Graph::new();
        g.set_node(GraphNode::canonical(1, Position::new(0.0, 0.0)));
        g.set_node(GraphNode::canonical(2, Position::new(0.0, 0.01)));
        g.set_node(GraphNode::canonical(3, Position::new(0.0, 0.02)));
        g.set_node(GraphNode::canonical(4, Position::new(0.01, 0.0)));

        let edge = |g: &mut Graph, a: i64, b: i64, penalty: f64| {
            let cost = penalty
                * haversine_earth_distance(
                    g.get_node(a).unwrap().position,
                    g.get_node(b).unwrap().position,
                );
            g.set_edge(a, b, cost);
            g.set_edge(b, a, cost);
        };

        edge(&mut g, 1, 2, 10.0);
        edge(&mut g, 2, 3, 10.0);
        edge(&mut g, 1, 4, 1.0);
        edge(&mut g, 4, 3, 1.0);
        g
    }

    #[test]
    fn returns_cheapest_route_not_shortest() {
        let g = penalty_graph();
        let route = find_route(&g, 1, 3, Some(DEFAULT_STEP_LIMIT)).unwrap();
        assert_eq!(route, vec![1, 4, 3]);
    }

    #[test]
    fn agrees_with_zero_heuristic() {
        let g = penalty_graph();
        let with_heuristic = find_route(&g, 1, 3, None).unwrap();
        let dijkstra = find_route_with(&g, 1, 3, |_, _| 0.0, None).unwrap();
        assert_eq!(with_heuristic, dijkstra);
    }

    #[test]
    fn start_equal_to_end() {
        let g = penalty_graph();
        assert_eq!(find_route(&g, 2, 2, None).unwrap(), vec![2]);
    }

    #[test]
    fn unknown_nodes() {
        let g = penalty_graph();
        assert_eq!(find_route(&g, 42, 3, None), Err(RouteError::UnknownNode(42)));
        assert_eq!(find_route(&g, 1, 42, None), Err(RouteError::UnknownNode(42)));
    }

    #[test]
    fn no_route() {
        let mut g = penalty_graph();
        g.set_node(GraphNode::canonical(5, Position::new(0.05, 0.05)));
        assert_eq!(find_route(&g, 1, 5, None).unwrap(), Vec::<i64>::new());
    }

    #[test]
    fn step_limit_exceeded() {
        let g = penalty_graph();
        assert_eq!(
            find_route(&g, 1, 3, Some(1)),
            Err(RouteError::StepLimitExceeded),
        );
    }

    #[test]
    fn is_deterministic() {
        let g = penalty_graph();
        let first = find_route(&g, 1, 3, None).unwrap();
        let second = find_route(&g, 1, 3, None).unwrap();
        assert_eq!(first, second);
    }
}
