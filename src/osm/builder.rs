// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::{HashMap, HashSet};

use log::warn;

use super::model::{Feature, FeatureType, Node, Relation, RelationMember, Way};
use super::profile::{Profile, TurnRestriction};
use crate::graph::PHANTOM_NODE_ID_BASE;
use crate::{haversine_earth_distance, Graph, GraphNode};

/// Fatal conditions encountered while interpreting OSM features.
///
/// Ordinary data-quality issues (unknown references, malformed turn
/// restrictions) are not fatal; they are reported through [log::warn!] and
/// the offending feature is skipped.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum BuildError {
    /// An OpenStreetMap node uses an id from the range reserved for phantom
    /// nodes created during turn restriction processing. Permitting such
    /// ids could create id conflicts, silently corrupting the graph.
    #[error(
        "OSM node {0} uses an id reserved for phantom nodes \
        (not smaller than {PHANTOM_NODE_ID_BASE})"
    )]
    PhantomIdCollision(i64),

    /// The [Profile] returned an invalid penalty for a way.
    #[error("invalid penalty {penalty} for way {way}: penalties must be finite and not less than 1")]
    InvalidPenalty { way: i64, penalty: f64 },
}

/// Reason for rejecting a turn restriction; recovered locally by
/// [GraphBuilder::add_relation] with a warning.
type InvalidRestriction = String;

/// Interprets a self-contained batch of OSM features and merges the result
/// into a [Graph]. See [Graph::add_features] for the data assumptions.
pub(crate) struct GraphBuilder<'a> {
    g: &'a mut Graph,
    profile: &'a dyn Profile,

    /// Nodes added in this batch but not (yet) used by any way;
    /// removed from the graph by [GraphBuilder::finish].
    unused_nodes: HashSet<i64>,

    /// Node lists of accepted ways, required for relation processing.
    way_nodes: HashMap<i64, Vec<i64>>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(g: &'a mut Graph, profile: &'a dyn Profile) -> Self {
        Self {
            g,
            profile,
            unused_nodes: HashSet::new(),
            way_nodes: HashMap::new(),
        }
    }

    pub fn add_feature(&mut self, feature: Feature) -> Result<(), BuildError> {
        match feature {
            Feature::Node(node) => self.add_node(node),
            Feature::Way(way) => self.add_way(way),
            Feature::Relation(relation) => {
                self.add_relation(relation);
                Ok(())
            }
        }
    }

    /// Removes nodes which were not used by any way in this batch.
    /// Must be called exactly once, after all features have been added.
    pub fn finish(self) {
        for node_id in self.unused_nodes {
            self.g.delete_node(node_id);
        }
    }

    fn add_node(&mut self, node: Node) -> Result<(), BuildError> {
        if node.id >= PHANTOM_NODE_ID_BASE {
            return Err(BuildError::PhantomIdCollision(node.id));
        }

        if self.g.get_node(node.id).is_none() {
            self.g.set_node(GraphNode::canonical(node.id, node.position));
            self.unused_nodes.insert(node.id);
        }
        Ok(())
    }

    fn add_way(&mut self, way: Way) -> Result<(), BuildError> {
        let Some(penalty) = self.profile.way_penalty(&way.tags) else {
            return Ok(());
        };
        if !penalty.is_finite() || penalty < 1.0 {
            return Err(BuildError::InvalidPenalty {
                way: way.id,
                penalty,
            });
        }

        let Some(nodes) = self.usable_way_nodes(&way) else {
            return Ok(());
        };

        let (forward, backward) = self.profile.way_direction(&way.tags);
        if !forward && !backward {
            return Ok(());
        }

        self.create_edges(&nodes, penalty, forward, backward);
        for node_id in &nodes {
            self.unused_nodes.remove(node_id);
        }
        self.way_nodes.insert(way.id, nodes);
        Ok(())
    }

    /// Removes references to unknown nodes from `way.nodes`, with a warning
    /// for each. Returns `None` if the way connects fewer than 2 nodes
    /// afterwards.
    fn usable_way_nodes(&self, way: &Way) -> Option<Vec<i64>> {
        let mut nodes = Vec::with_capacity(way.nodes.len());
        for &node_id in &way.nodes {
            if self.g.get_node(node_id).is_some() {
                nodes.push(node_id);
            } else {
                warn!(
                    "way {} references non-existing node {} - skipping node",
                    way.id, node_id,
                );
            }
        }

        if nodes.len() < 2 {
            warn!(
                "way {} has too few nodes (after unknown nodes were removed) - skipping way",
                way.id,
            );
            return None;
        }

        Some(nodes)
    }

    fn create_edges(&mut self, nodes: &[i64], penalty: f64, forward: bool, backward: bool) {
        for pair in nodes.windows(2) {
            let (left_id, right_id) = (pair[0], pair[1]);
            let left = self.g.get_node(left_id).expect("way nodes were validated");
            let right = self.g.get_node(right_id).expect("way nodes were validated");
            let cost = penalty * haversine_earth_distance(left.position, right.position);

            if forward {
                self.g.set_edge(left_id, right_id, cost);
            }
            if backward {
                self.g.set_edge(right_id, left_id, cost);
            }
        }
    }

    fn add_relation(&mut self, relation: Relation) {
        let restriction = self.profile.is_turn_restriction(&relation.tags);
        if restriction == TurnRestriction::Inapplicable {
            return;
        }
        let is_mandatory = restriction == TurnRestriction::Mandatory;

        match self.restriction_route(&relation) {
            Ok(route) => self.apply_restriction(relation.id, &route, is_mandatory),
            Err(reason) => {
                warn!("invalid turn restriction {}: {} - skipping", relation.id, reason);
            }
        }
    }

    /// Returns the sequence of OSM node ids along the restriction's route.
    /// Only the last 2 nodes of the `from` member and the first 2 nodes of
    /// the `to` member are taken into account.
    fn restriction_route(&self, relation: &Relation) -> Result<Vec<i64>, InvalidRestriction> {
        let members = Self::ordered_restriction_members(relation)?;
        let member_nodes = members
            .iter()
            .map(|m| self.restriction_member_nodes(m))
            .collect::<Result<Vec<_>, _>>()?;
        Self::flatten_restriction_nodes(member_nodes)
    }

    /// Returns the restriction's members in from-via-…-via-to order, ensuring
    /// there is exactly one `from` member, exactly one `to` member and at
    /// least one `via` member. Members with any other role are ignored.
    fn ordered_restriction_members(
        relation: &Relation,
    ) -> Result<Vec<&RelationMember>, InvalidRestriction> {
        let mut from: Option<&RelationMember> = None;
        let mut to: Option<&RelationMember> = None;
        let mut via: Vec<&RelationMember> = Vec::new();

        for member in &relation.members {
            match member.role.as_str() {
                "from" => {
                    if from.is_some() {
                        return Err(r#"multiple "from" members"#.to_string());
                    }
                    from = Some(member);
                }
                "via" => via.push(member),
                "to" => {
                    if to.is_some() {
                        return Err(r#"multiple "to" members"#.to_string());
                    }
                    to = Some(member);
                }
                _ => {}
            }
        }

        let from = from.ok_or_else(|| r#"missing "from" member"#.to_string())?;
        if via.is_empty() {
            return Err(r#"missing "via" member"#.to_string());
        }
        let to = to.ok_or_else(|| r#"missing "to" member"#.to_string())?;

        let mut ordered = Vec::with_capacity(via.len() + 2);
        ordered.push(from);
        ordered.extend(via);
        ordered.push(to);
        Ok(ordered)
    }

    /// Returns the list of nodes corresponding to a restriction member.
    /// `node` references are only permitted for `via` members.
    fn restriction_member_nodes(
        &self,
        member: &RelationMember,
    ) -> Result<Vec<i64>, InvalidRestriction> {
        match member.kind {
            FeatureType::Node if member.role == "via" => {
                if self.g.get_node(member.reference).is_none() {
                    return Err(format!("reference to unknown node: {}", member.reference));
                }
                Ok(vec![member.reference])
            }
            FeatureType::Way => self
                .way_nodes
                .get(&member.reference)
                .cloned()
                .ok_or_else(|| format!("reference to unknown way: {}", member.reference)),
            _ => Err(format!(
                "invalid type of \"{}\" member: {}",
                member.role, member.kind,
            )),
        }
    }

    /// Glues the members' node lists into a single flat route, reversing
    /// members whose orientation doesn't match the running path. Only the
    /// last 2 nodes of the first (`from`) member and the first 2 nodes of
    /// the last (`to`) member contribute.
    fn flatten_restriction_nodes(
        mut members_nodes: Vec<Vec<i64>>,
    ) -> Result<Vec<i64>, InvalidRestriction> {
        let last_idx = members_nodes.len() - 1;
        let mut route: Vec<i64> = Vec::new();

        for idx in 0..members_nodes.len() {
            if idx == 0 {
                // The first member needs to be reversed if its first (not
                // last) node matches either endpoint of the second member.
                let next_first = members_nodes[1][0];
                let next_last = *members_nodes[1].last().unwrap();
                let member = &mut members_nodes[0];
                let first = member[0];
                let last = *member.last().unwrap();

                if last == next_first || last == next_last {
                    // correct order, (A-B, B-C) or (A-B, C-B) case
                } else if first == next_first || first == next_last {
                    // incorrect order, (B-A, B-C) or (B-A, C-B) case
                    member.reverse();
                } else {
                    // disjoined restriction, (A-B, C-D) case
                    return Err("disjoined members".to_string());
                }

                route.extend_from_slice(&member[member.len() - 2..]);
            } else {
                // Every other member needs to be reversed if its last (not
                // first) node matches the running path's tail.
                let tail = *route.last().unwrap();
                let member = &mut members_nodes[idx];

                if member[0] == tail {
                    // correct order, (A-B, B-C) case
                } else if *member.last().unwrap() == tail {
                    // incorrect order, (A-B, C-B) case
                    member.reverse();
                } else {
                    // disjoined restriction, (A-B, C-D) case
                    return Err("disjoined members".to_string());
                }

                // The overlapping node is already the route's tail.
                if idx == last_idx {
                    route.push(member[1]);
                } else {
                    route.extend_from_slice(&member[1..]);
                }
            }
        }

        Ok(route)
    }

    /// Rewrites the graph to realize a turn restriction, given by the
    /// sequence of OSM node ids along its route.
    ///
    /// A restriction over the route A-B-C-D-E replaces all via nodes with
    /// phantom clones, A-B'-C'-D'-E, and replaces the A→B edge by A→B'. Each
    /// clone inherits all outgoing edges of its source node. For prohibitory
    /// restrictions, the D'→E edge is then removed; for mandatory
    /// restrictions, every clone keeps only the edge to the next node of the
    /// route. An already-existing phantom B' linked from A is reused instead
    /// of minting a new clone.
    fn apply_restriction(&mut self, relation_id: i64, route: &[i64], is_mandatory: bool) {
        let mut change = GraphChange::new(self.g);

        let Some(cloned) = change.restriction_as_cloned_nodes(route) else {
            // The staged change must be discarded, as it may contain garbage.
            warn!(
                "turn restriction {}: {} a non-existing route - skipping",
                relation_id,
                if is_mandatory { "mandates" } else { "prohibits" },
            );
            return;
        };

        if is_mandatory {
            for pair in cloned[1..].windows(2) {
                change.ensure_only_edge(pair[0], pair[1]);
            }
        } else {
            change
                .edges_to_remove
                .insert((cloned[cloned.len() - 2], cloned[cloned.len() - 1]));
        }

        change.apply();
    }
}

/// A staged change to a [Graph] which must be applied atomically, so that a
/// turn restriction which turns out to be unsatisfiable partway through its
/// route leaves no trace in the graph.
struct GraphChange<'g> {
    g: &'g mut Graph,

    /// Nodes to clone (including their edges), mapping from new id to old id.
    new_nodes: HashMap<i64, i64>,

    /// New edges, from (new) node id to (new) node id to cost.
    /// Takes precedence over [GraphChange::new_nodes] and
    /// [GraphChange::edges_to_remove].
    edges_to_add: HashMap<i64, HashMap<i64, f64>>,

    /// Edges to remove, as (from (new) node id, to (new) node id) pairs.
    /// Takes precedence over [GraphChange::new_nodes], but **not** over
    /// [GraphChange::edges_to_add].
    edges_to_remove: HashSet<(i64, i64)>,

    /// New value for the graph's phantom node id counter.
    phantom_id_counter: i64,
}

impl<'g> GraphChange<'g> {
    fn new(g: &'g mut Graph) -> Self {
        let phantom_id_counter = g.phantom_id_counter;
        Self {
            g,
            new_nodes: HashMap::new(),
            edges_to_add: HashMap::new(),
            edges_to_remove: HashSet::new(),
            phantom_id_counter,
        }
    }

    /// Turns an A-B-C-D-E route of OSM node ids into an A-B'-C'-D'-E node id
    /// list by staging clones of all middle nodes. Existing phantom nodes
    /// with a matching inbound edge are reused. The last node is never
    /// cloned.
    ///
    /// Returns `None` if the route does not exist in the graph; the whole
    /// GraphChange **must** then be discarded, as it may contain garbage.
    fn restriction_as_cloned_nodes(&mut self, route: &[i64]) -> Option<Vec<i64>> {
        debug_assert!(route.len() >= 3);

        let mut cloned = Vec::with_capacity(route.len());
        cloned.push(route[0]);

        for (idx, &external_id) in route.iter().enumerate().skip(1) {
            let previous_id = *cloned.last().unwrap();
            let (existing_id, cost) = self.resolve_step(previous_id, external_id)?;

            let is_clone = existing_id != external_id;
            let is_last = idx == route.len() - 1;

            // The node only needs a fresh clone if the edge from previous_id
            // leads to a non-phantom node, and the route continues past it.
            let next_id = if !is_clone && !is_last {
                let clone_id = self.stage_clone(existing_id);
                self.edges_to_remove.insert((previous_id, existing_id));
                self.edges_to_add
                    .entry(previous_id)
                    .or_default()
                    .insert(clone_id, cost);
                clone_id
            } else {
                existing_id
            };

            cloned.push(next_id);
        }

        Some(cloned)
    }

    /// Finds the node with the given external id reachable over an edge from
    /// `from_id` (which may be a staged clone), returning its id and the edge
    /// cost. Phantom nodes are preferred over the canonical one, so that
    /// clones created by earlier restrictions are reused.
    fn resolve_step(&self, from_id: i64, external_id: i64) -> Option<(i64, f64)> {
        let origin = self.new_nodes.get(&from_id).copied().unwrap_or(from_id);

        let mut canonical: Option<(i64, f64)> = None;
        for (candidate, cost) in self.g.get_edges(origin) {
            let Some(node) = self.g.get_node(candidate) else {
                continue;
            };
            if node.external_id != external_id {
                continue;
            }
            if candidate != external_id {
                return Some((candidate, cost));
            }
            canonical = Some((candidate, cost));
        }
        canonical
    }

    /// Stages a clone of `original_id`, returning the phantom id assigned to it.
    fn stage_clone(&mut self, original_id: i64) -> i64 {
        self.phantom_id_counter += 1;
        self.new_nodes.insert(self.phantom_id_counter, original_id);
        self.phantom_id_counter
    }

    /// Ensures that the only edge out of `from_id` leads to `to_id`.
    /// Both ids may refer to staged clones.
    fn ensure_only_edge(&mut self, from_id: i64, to_id: i64) {
        if let Some(staged) = self.edges_to_add.get_mut(&from_id) {
            staged.retain(|&to, _| to == to_id);
        }

        let origin = self.new_nodes.get(&from_id).copied().unwrap_or(from_id);
        let to_remove: Vec<i64> = self
            .g
            .get_edges(origin)
            .map(|(to, _)| to)
            .filter(|&to| to != to_id)
            .collect();
        for to in to_remove {
            self.edges_to_remove.insert((from_id, to));
        }
    }

    /// Applies the staged change to the graph.
    fn apply(self) {
        self.g.phantom_id_counter = self.phantom_id_counter;

        for (&new_id, &old_id) in &self.new_nodes {
            let old = *self.g.get_node(old_id).expect("cloned nodes must exist");
            self.g.set_node(GraphNode {
                id: new_id,
                position: old.position,
                external_id: old.external_id,
            });
            let old_edges = self.g.edges.get(&old_id).cloned().unwrap_or_default();
            self.g.edges.insert(new_id, old_edges);
        }

        for &(from_id, to_id) in &self.edges_to_remove {
            self.g.delete_edge(from_id, to_id);
        }

        for (&from_id, edges) in &self.edges_to_add {
            for (&to_id, &cost) in edges {
                self.g.set_edge(from_id, to_id, cost);
            }
        }
    }
}
