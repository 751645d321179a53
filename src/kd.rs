// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::{Position, WithPosition};

/// KDTree implements the [k-d tree data structure](https://en.wikipedia.org/wiki/K-d_tree)
/// over anything with a [Position], which can be used to speed up
/// nearest-neighbor search for large datasets. Practice shows that
/// [Graph::find_nearest_node](crate::Graph::find_nearest_node) takes
/// significantly more time than [find_route](crate::find_route) when
/// generating multiple routes, and a k-d tree helps with that, trading memory
/// usage for CPU time.
///
/// When indexing a [Graph](crate::Graph), filter out phantom
/// (`id != external_id`) nodes before building the tree.
///
/// This implementation assumes euclidean geometry, even if the query distance
/// function is [haversine_earth_distance](crate::haversine_earth_distance).
/// This results in undefined behavior when points are close to the ante
/// meridian (180°/-180° longitude) or poles (90°/-90° latitude), or when the
/// data spans multiple continents.
#[derive(Debug, Clone)]
pub struct KDTree<T> {
    pivot: T,
    left: Option<Box<KDTree<T>>>,
    right: Option<Box<KDTree<T>>>,
}

impl<T: WithPosition + Clone> KDTree<T> {
    /// Builds a k-d tree from an iterable of items.
    /// Returns `None` if the iterable was empty.
    pub fn from_items<I: IntoIterator<Item = T>>(items: I) -> Option<Self> {
        let mut items = items.into_iter().collect::<Vec<_>>();
        Self::build(&mut items)
    }

    /// Builds a k-d tree from a mutable slice of items. Items are reordered
    /// in the slice to facilitate building the tree.
    /// Returns `None` if the slice was empty.
    pub fn build(items: &mut [T]) -> Option<Self> {
        Self::build_impl(items, false)
    }

    fn build_impl(items: &mut [T], lon_divides: bool) -> Option<Self> {
        match items.len() {
            0 => None,
            1 => Some(Self {
                pivot: items[0].clone(),
                left: None,
                right: None,
            }),
            _ => {
                if lon_divides {
                    items.sort_by(|a, b| a.position().lon.total_cmp(&b.position().lon));
                } else {
                    items.sort_by(|a, b| a.position().lat.total_cmp(&b.position().lat));
                }
                let median = items.len() / 2;
                let pivot = items[median].clone();
                let (left, right_and_pivot) = items.split_at_mut(median);
                let right = &mut right_and_pivot[1..];
                Some(Self {
                    pivot,
                    left: Self::build_impl(left, !lon_divides).map(Box::new),
                    right: Self::build_impl(right, !lon_divides).map(Box::new),
                })
            }
        }
    }

    /// Finds the item closest to the given position, as determined by the
    /// provided distance function.
    pub fn find_nearest_neighbor<D: Fn(Position, Position) -> f64>(
        &self,
        root: Position,
        distance: D,
    ) -> &T {
        self.find_nearest_neighbor_impl(root, &distance, false).0
    }

    fn find_nearest_neighbor_impl<D: Fn(Position, Position) -> f64>(
        &self,
        root: Position,
        distance: &D,
        lon_divides: bool,
    ) -> (&T, f64) {
        // Start by assuming that pivot is the closest
        let pivot_position = self.pivot.position();
        let mut best = &self.pivot;
        let mut best_dist = distance(root, pivot_position);

        // Select which branch to recurse into first
        let first_left = if lon_divides {
            root.lon < pivot_position.lon
        } else {
            root.lat < pivot_position.lat
        };
        let (first, second) = if first_left {
            (&self.left, &self.right)
        } else {
            (&self.right, &self.left)
        };

        // Recurse into the first branch
        if let Some(branch) = first {
            let (alt, alt_dist) = branch.find_nearest_neighbor_impl(root, distance, !lon_divides);
            if alt_dist < best_dist {
                best = alt;
                best_dist = alt_dist;
            }
        }

        // (Optionally) recurse into the second branch
        if let Some(branch) = second {
            // A closer item is possible in the second branch if and only if
            // the splitting axis is closer than the current best candidate.
            let point_on_axis = if lon_divides {
                Position::new(root.lat, pivot_position.lon)
            } else {
                Position::new(pivot_position.lat, root.lon)
            };
            let dist_to_axis = distance(root, point_on_axis);

            if dist_to_axis < best_dist {
                let (alt, alt_dist) =
                    branch.find_nearest_neighbor_impl(root, distance, !lon_divides);
                if alt_dist < best_dist {
                    best = alt;
                    best_dist = alt_dist;
                }
            }
        }

        (best, best_dist)
    }
}
