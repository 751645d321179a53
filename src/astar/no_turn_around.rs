// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::{
    haversine_earth_distance, ExternalNodeLike, GraphLike, Position, RouteError, WithPosition,
};

/// The search space of this A* variant: a node, qualified by the external id
/// of the node the search arrived from (`None` at the start node).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SearchKey {
    node: i64,
    entered_from: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
struct QueueItem {
    at: SearchKey,
    external_id: i64,
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
            .then_with(|| other.at.node.cmp(&self.at.node))
    }
}

fn reconstruct_path(came_from: &HashMap<SearchKey, SearchKey>, mut last: SearchKey) -> Vec<i64> {
    let mut path = vec![last.node];

    while let Some(&key) = came_from.get(&last) {
        path.push(key.node);
        last = key;
    }

    path.reverse();
    path
}

/// Uses the [A* algorithm](https://en.wikipedia.org/wiki/A*_search_algorithm)
/// to find the shortest route between two nodes in the provided graph,
/// with the [haversine_earth_distance] heuristic, never going immediately
/// back through a logically-equivalent node.
///
/// Returns an empty vector if there is no route between the two nodes.
///
/// For graphs without turn restrictions, use [find_route](crate::find_route),
/// as it runs faster. This variant searches an extra dimension - not only the
/// current node, but also the previous node's
/// [external_id](ExternalNodeLike::external_id) - to reject A-B-A immediate
/// turnaround instructions, including turnarounds through phantom clones
/// created by turn restriction processing.
///
/// `step_limit` limits how many nodes may be expanded during the search
/// before [RouteError::StepLimitExceeded] is returned; `None` lifts the
/// limit. The recommended value is
/// [DEFAULT_STEP_LIMIT](crate::DEFAULT_STEP_LIMIT).
pub fn find_route_without_turn_around<G>(
    g: &G,
    from_id: i64,
    to_id: i64,
    step_limit: Option<usize>,
) -> Result<Vec<i64>, RouteError>
where
    G: GraphLike,
    G::Node: ExternalNodeLike,
{
    find_route_without_turn_around_with(g, from_id, to_id, haversine_earth_distance, step_limit)
}

/// Same as [find_route_without_turn_around], except that the A* heuristic
/// uses the provided distance function.
///
/// For the search to return shortest routes, `distance` must be
/// [admissible](https://en.wikipedia.org/wiki/Admissible_heuristic):
/// it must never overestimate the cost of reaching the end node.
pub fn find_route_without_turn_around_with<G, D>(
    g: &G,
    from_id: i64,
    to_id: i64,
    distance: D,
    step_limit: Option<usize>,
) -> Result<Vec<i64>, RouteError>
where
    G: GraphLike,
    G::Node: ExternalNodeLike,
    D: Fn(Position, Position) -> f64,
{
    let mut queue: BinaryHeap<QueueItem> = BinaryHeap::new();
    let mut came_from: HashMap<SearchKey, SearchKey> = HashMap::new();
    let mut known_costs: HashMap<SearchKey, f64> = HashMap::new();
    let mut steps: usize = 0;

    let to_position = g
        .get_node(to_id)
        .ok_or(RouteError::UnknownNode(to_id))?
        .position();
    let from_node = g.get_node(from_id).ok_or(RouteError::UnknownNode(from_id))?;

    let initial_key = SearchKey {
        node: from_id,
        entered_from: None,
    };
    queue.push(QueueItem {
        at: initial_key,
        external_id: from_node.external_id(),
        cost: 0.0,
        score: distance(from_node.position(), to_position),
    });
    known_costs.insert(initial_key, 0.0);

    while let Some(item) = queue.pop() {
        if item.at.node == to_id {
            return Ok(reconstruct_path(&came_from, item.at));
        }

        // Contrary to the Wikipedia definition, the queue may hold multiple
        // items for the same key; stale ones are skipped at pop time.
        if item.cost > known_costs.get(&item.at).copied().unwrap_or(f64::INFINITY) {
            continue;
        }

        steps += 1;
        if step_limit.is_some_and(|limit| steps > limit) {
            return Err(RouteError::StepLimitExceeded);
        }

        for (neighbor_id, edge_cost) in g.edges(item.at.node) {
            let Some(neighbor) = g.get_node(neighbor_id) else {
                continue;
            };

            // Forbid immediate turnarounds (A-B-A)
            if item.at.entered_from == Some(neighbor.external_id()) {
                continue;
            }

            let neighbor_key = SearchKey {
                node: neighbor_id,
                entered_from: Some(item.external_id),
            };
            let neighbor_cost = item.cost + edge_cost;
            if neighbor_cost < known_costs.get(&neighbor_key).copied().unwrap_or(f64::INFINITY) {
                came_from.insert(neighbor_key, item.at);
                known_costs.insert(neighbor_key, neighbor_cost);
                queue.push(QueueItem {
                    at: neighbor_key,
                    external_id: neighbor.external_id(),
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
    use crate::{find_route, Graph, GraphNode, PHANTOM_NODE_ID_BASE};

    //  4
    //  │ ╲
    //  1──2──3
    //
    // Node 2 has a phantom clone 2' encoding "only 1 → 2 → 4": the only edge
    // out of 2' leads to 4, and 1 connects to 2' instead of 2. The 4 ↔ 2 leg
    // lets the plain search cheat its way to 3 with an immediate turnaround.
    fn mandatory_turn_graph() -> Graph {
        let phantom = PHANTOM_NODE_ID_BASE + 1;
        let mut g = Graph::new();
        g.set_node(GraphNode::canonical(1, Position::new(0.0, 0.0)));
        g.set_node(GraphNode::canonical(2, Position::new(0.0, 0.01)));
        g.set_node(GraphNode::canonical(3, Position::new(0.0, 0.02)));
        g.set_node(GraphNode::canonical(4, Position::new(0.01, 0.01)));
        g.set_node(GraphNode {
            id: phantom,
            position: Position::new(0.0, 0.01),
            external_id: 2,
        });

        let edge = |g: &mut Graph, a: i64, b: i64| {
            let cost = haversine_earth_distance(
                g.get_node(a).unwrap().position,
                g.get_node(b).unwrap().position,
            );
            g.set_edge(a, b, cost);
        };

        edge(&mut g, 1, phantom);
        edge(&mut g, phantom, 4);
        edge(&mut g, 2, 1);
        edge(&mut g, 2, 3);
        edge(&mut g, 2, 4);
        edge(&mut g, 4, 2);
        g
    }

    #[test]
    fn plain_search_turns_around_through_clone() {
        let g = mandatory_turn_graph();
        let phantom = PHANTOM_NODE_ID_BASE + 1;
        let route = find_route(&g, 1, 3, None).unwrap();
        assert_eq!(route, vec![1, phantom, 4, 2, 3]);
    }

    #[test]
    fn turnaround_through_clone_is_rejected() {
        let g = mandatory_turn_graph();
        let route = find_route_without_turn_around(&g, 1, 3, None).unwrap();
        assert_eq!(route, Vec::<i64>::new());
    }

    #[test]
    fn detour_is_taken_when_available() {
        let mut g = mandatory_turn_graph();
        g.set_node(GraphNode::canonical(5, Position::new(0.01, 0.02)));
        let edge = |g: &mut Graph, a: i64, b: i64| {
            let cost = haversine_earth_distance(
                g.get_node(a).unwrap().position,
                g.get_node(b).unwrap().position,
            );
            g.set_edge(a, b, cost);
        };
        edge(&mut g, 4, 5);
        edge(&mut g, 5, 3);

        let route = find_route_without_turn_around(&g, 1, 3, None).unwrap();
        assert_eq!(route, vec![1, PHANTOM_NODE_ID_BASE + 1, 4, 5, 3]);
    }

    #[test]
    fn matches_plain_search_without_restrictions() {
        let mut g = Graph::new();
        g.set_node(GraphNode::canonical(1, Position::new(0.0, 0.0)));
        g.set_node(GraphNode::canonical(2, Position::new(0.0, 0.01)));
        g.set_node(GraphNode::canonical(3, Position::new(0.01, 0.02)));
        let edge = |g: &mut Graph, a: i64, b: i64| {
            let cost = haversine_earth_distance(
                g.get_node(a).unwrap().position,
                g.get_node(b).unwrap().position,
            );
            g.set_edge(a, b, cost);
            g.set_edge(b, a, cost);
        };
        edge(&mut g, 1, 2);
        edge(&mut g, 2, 3);

        assert_eq!(
            find_route_without_turn_around(&g, 1, 3, None).unwrap(),
            find_route(&g, 1, 3, None).unwrap(),
        );
    }

    #[test]
    fn unknown_nodes() {
        let g = mandatory_turn_graph();
        assert_eq!(
            find_route_without_turn_around(&g, 42, 3, None),
            Err(RouteError::UnknownNode(42)),
        );
        assert_eq!(
            find_route_without_turn_around(&g, 1, 42, None),
            Err(RouteError::UnknownNode(42)),
        );
    }

    #[test]
    fn step_limit_exceeded() {
        let g = mandatory_turn_graph();
        assert_eq!(
            find_route_without_turn_around(&g, 1, 3, Some(1)),
            Err(RouteError::StepLimitExceeded),
        );
    }
}
