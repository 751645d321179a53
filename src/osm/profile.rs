// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use super::model::Tags;

/// Turn restriction kind indicator, returned by [Profile::is_turn_restriction].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRestriction {
    /// Not a turn restriction, or a turn restriction which does not apply
    /// to the current [Profile].
    Inapplicable,

    /// The sequence of nodes indicated by this restriction is prohibited.
    Prohibitory,

    /// The sequence of nodes must be followed after using an edge identified
    /// by the first two nodes.
    Mandatory,
}

/// Describes how [Graph::add_features](crate::Graph::add_features) should
/// interpret OSM data for a single mode of transport.
pub trait Profile {
    /// Returns the penalty for traversing a way with the provided tags,
    /// or `None` if the way is not traversable.
    ///
    /// The penalty is multiplied by each way segment's crow-flies length
    /// to get the cost of traversing an edge. The returned value must be
    /// finite and not less than 1.
    fn way_penalty(&self, way_tags: &Tags) -> Option<f64>;

    /// Determines whether a way with the provided tags is traversable
    /// forward (first element) and backward (second element). Both `false`
    /// is equivalent to an untraversable way.
    fn way_direction(&self, way_tags: &Tags) -> (bool, bool);

    /// Determines whether a relation with the provided tags is an applicable
    /// [turn restriction](https://wiki.openstreetmap.org/wiki/Relation:restriction).
    fn is_turn_restriction(&self, relation_tags: &Tags) -> TurnRestriction;
}

/// Interprets the restriction tag value (e.g. `no_left_turn`) as a [TurnRestriction].
fn restriction_value_kind(value: &str) -> TurnRestriction {
    let (kind, description) = value.split_once('_').unwrap_or(("", ""));

    match description {
        "right_turn" | "left_turn" | "u_turn" | "straight_on" => {}
        _ => return TurnRestriction::Inapplicable,
    }

    match kind {
        "no" => TurnRestriction::Prohibitory,
        "only" => TurnRestriction::Mandatory,
        _ => TurnRestriction::Inapplicable,
    }
}

fn tag<'t>(tags: &'t Tags, key: &str) -> Option<&'t str> {
    tags.get(key).map(String::as_str)
}

/// [Profile] for routing over every way in the data, regardless of tags.
///
/// Meant for graphs exchanged in the OSM XML format without following
/// OpenStreetMap mapping conventions. The only introspected tag is `oneway`,
/// which may be set to `yes` or `-1`. All relations (and thus turn
/// restrictions) are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkeletonProfile;

impl Profile for SkeletonProfile {
    fn way_penalty(&self, _way_tags: &Tags) -> Option<f64> {
        Some(1.0)
    }

    fn way_direction(&self, way_tags: &Tags) -> (bool, bool) {
        match tag(way_tags, "oneway") {
            Some("yes") => (true, false),
            Some("-1") => (false, true),
            _ => (true, true),
        }
    }

    fn is_turn_restriction(&self, _relation_tags: &Tags) -> TurnRestriction {
        TurnRestriction::Inapplicable
    }
}

/// Equivalent `highway` tag values, applied before penalty lookup.
const EQUIVALENT_HIGHWAY_VALUES: &[(&str, &str)] = &[
    ("motorway_link", "motorway"),
    ("trunk_link", "trunk"),
    ("primary_link", "primary"),
    ("secondary_link", "secondary"),
    ("tertiary_link", "tertiary"),
    ("minor", "unclassified"),
];

/// [Profile] for routing over `highway=*` ways, honoring
/// [access tags](https://wiki.openstreetmap.org/wiki/Key:access), one-way
/// streets, roundabouts and turn restrictions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighwayProfile<'a> {
    /// Human-readable name of the routing profile, customary the most
    /// specific access tag. Not used for OSM data interpretation.
    pub name: &'a str,

    /// Maps `highway` tag values (after normalization through the equivalence
    /// table, e.g. `motorway_link` → `motorway`) into their corresponding
    /// penalties. All penalties must be finite and not less than 1.
    pub penalties: &'a [(&'a str, f64)],

    /// Hierarchy of [access tags](https://wiki.openstreetmap.org/wiki/Key:access)
    /// to consider when checking if a way is traversable, listed from
    /// least-specific first. Also used to follow mode-specific `oneway:*` and
    /// `restriction:*` tags, and `except` restriction exemptions.
    pub access: &'a [&'a str],

    /// Force no routing over [motorroad=yes](https://wiki.openstreetmap.org/wiki/Key:motorroad) ways.
    pub disallow_motorroad: bool,

    /// Apply the pedestrian tagging exceptions:
    /// - `public_transport=platform` and `railway=platform` count as
    ///   `highway=platform` for penalty lookup;
    /// - the generic `oneway` tag is only honored on `highway=footway`,
    ///   `highway=path`, `highway=steps` and `highway=platform` ways,
    ///   and is always overridable by `oneway:foot`;
    /// - only `restriction:foot` turn restrictions are considered.
    pub foot_rules: bool,
}

impl<'a> HighwayProfile<'a> {
    /// Returns the normalized `highway` value used for penalty lookup.
    fn active_highway_value<'t>(&self, tags: &'t Tags) -> &'t str {
        let highway = tag(tags, "highway").unwrap_or("");
        let highway = EQUIVALENT_HIGHWAY_VALUES
            .iter()
            .find(|&&(from, _)| from == highway)
            .map(|&(_, to)| to)
            .unwrap_or(highway);

        if self.foot_rules
            && highway.is_empty()
            && (tag(tags, "public_transport") == Some("platform")
                || tag(tags, "railway") == Some("platform"))
        {
            return "platform";
        }

        highway
    }

    /// Checks if the way is routable, by considering motorroads
    /// ([HighwayProfile::disallow_motorroad]) and access tags
    /// ([HighwayProfile::access], walked least-specific-first, with
    /// more specific tags overriding earlier ones).
    pub fn is_allowed(&self, tags: &Tags) -> bool {
        if self.disallow_motorroad && tag(tags, "motorroad") == Some("yes") {
            return false;
        }

        let mut allowed = true;
        for &key in self.access {
            if let Some(value) = tag(tags, key) {
                allowed = !matches!(value, "no" | "private");
            }
        }
        allowed
    }

    /// Returns the value of the most specific `oneway:MODE` tag (based on
    /// [HighwayProfile::access]), falling back to plain `oneway`, and to an
    /// empty string if no relevant tag is present.
    fn active_oneway_value<'t>(&self, tags: &'t Tags) -> &'t str {
        if self.foot_rules {
            if let Some(value) = tag(tags, "oneway:foot") {
                return value;
            }
            if matches!(
                self.active_highway_value(tags),
                "footway" | "path" | "steps" | "platform"
            ) {
                return tag(tags, "oneway").unwrap_or("");
            }
            ""
        } else {
            self.access
                .iter()
                .rev()
                .filter(|&&mode| mode != "access")
                .find_map(|&mode| tags.get(&format!("oneway:{mode}")))
                .or_else(|| tags.get("oneway"))
                .map(String::as_str)
                .unwrap_or("")
        }
    }

    /// Returns the value of the most specific `restriction:MODE` tag (based
    /// on [HighwayProfile::access]), falling back to plain `restriction`, and
    /// to an empty string if no relevant tag is present.
    fn active_restriction_value<'t>(&self, tags: &'t Tags) -> &'t str {
        if self.foot_rules {
            tag(tags, "restriction:foot").unwrap_or("")
        } else {
            self.access
                .iter()
                .rev()
                .filter(|&&mode| mode != "access")
                .find_map(|&mode| tags.get(&format!("restriction:{mode}")))
                .or_else(|| tags.get("restriction"))
                .map(String::as_str)
                .unwrap_or("")
        }
    }

    /// Returns true if [HighwayProfile::access] intersects with any mode
    /// listed in the `except` tag.
    pub fn is_exempted(&self, tags: &Tags) -> bool {
        tag(tags, "except")
            .unwrap_or("")
            .split(';')
            .any(|mode| self.access.contains(&mode))
    }
}

impl<'a> Profile for HighwayProfile<'a> {
    fn way_penalty(&self, way_tags: &Tags) -> Option<f64> {
        let highway = self.active_highway_value(way_tags);
        let penalty = self
            .penalties
            .iter()
            .find(|&&(value, _)| value == highway)
            .map(|&(_, penalty)| penalty)?;

        if !self.is_allowed(way_tags) {
            return None;
        }

        Some(penalty)
    }

    fn way_direction(&self, way_tags: &Tags) -> (bool, bool) {
        let mut forward = true;
        let mut backward = true;

        // Default one-way ways (does not apply on foot)
        if !self.foot_rules {
            if matches!(tag(way_tags, "highway"), Some("motorway" | "motorway_link"))
                || matches!(tag(way_tags, "junction"), Some("roundabout" | "circular"))
            {
                backward = false;
            }
        }

        match self.active_oneway_value(way_tags) {
            "yes" | "true" | "1" => {
                forward = true;
                backward = false;
            }
            "-1" | "reverse" => {
                forward = false;
                backward = true;
            }
            "no" => {
                forward = true;
                backward = true;
            }
            _ => {}
        }

        (forward, backward)
    }

    fn is_turn_restriction(&self, relation_tags: &Tags) -> TurnRestriction {
        if tag(relation_tags, "type") != Some("restriction") || self.is_exempted(relation_tags) {
            return TurnRestriction::Inapplicable;
        }
        restriction_value_kind(self.active_restriction_value(relation_tags))
    }
}

/// [Profile] for routing over `railway=*` ways.
///
/// Access handling is minimal (only `access=no` and `access=private` are
/// honored), one-way tracks come only from an explicit `oneway=yes` or
/// `oneway=-1`, and any `type=restriction` relation with a supported
/// `restriction` value applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RailwayProfile<'a> {
    /// Human-readable name of the routing profile.
    /// Not used for OSM data interpretation.
    pub name: &'a str,

    /// Maps `railway` tag values into their corresponding penalties.
    /// All penalties must be finite and not less than 1.
    pub penalties: &'a [(&'a str, f64)],
}

impl<'a> Profile for RailwayProfile<'a> {
    fn way_penalty(&self, way_tags: &Tags) -> Option<f64> {
        if matches!(tag(way_tags, "access"), Some("no" | "private")) {
            return None;
        }

        let railway = tag(way_tags, "railway").unwrap_or("");
        self.penalties
            .iter()
            .find(|&&(value, _)| value == railway)
            .map(|&(_, penalty)| penalty)
    }

    fn way_direction(&self, way_tags: &Tags) -> (bool, bool) {
        match tag(way_tags, "oneway") {
            Some("yes") => (true, false),
            Some("-1") => (false, true),
            _ => (true, true),
        }
    }

    fn is_turn_restriction(&self, relation_tags: &Tags) -> TurnRestriction {
        if tag(relation_tags, "type") != Some("restriction") {
            return TurnRestriction::Inapplicable;
        }
        restriction_value_kind(tag(relation_tags, "restriction").unwrap_or(""))
    }
}

/// Example routing [Profile] for cars, with high preference for faster roads
/// and with appropriate [access tags](https://wiki.openstreetmap.org/wiki/Key:access).
pub const CAR_PROFILE: HighwayProfile<'static> = HighwayProfile {
    name: "motorcar",
    penalties: &[
        ("motorway", 1.0),
        ("trunk", 2.0),
        ("primary", 5.0),
        ("secondary", 6.5),
        ("tertiary", 10.0),
        ("unclassified", 10.0),
        ("residential", 15.0),
        ("living_street", 20.0),
        ("track", 20.0),
        ("service", 20.0),
    ],
    access: &["access", "vehicle", "motor_vehicle", "motorcar"],
    disallow_motorroad: false,
    foot_rules: false,
};

/// Example routing [Profile] for buses, without high preference differences
/// for different road types and with appropriate
/// [access tags](https://wiki.openstreetmap.org/wiki/Key:access).
pub const BUS_PROFILE: HighwayProfile<'static> = HighwayProfile {
    name: "bus",
    penalties: &[
        ("motorway", 1.0),
        ("trunk", 1.0),
        ("primary", 1.1),
        ("secondary", 1.15),
        ("tertiary", 1.15),
        ("unclassified", 1.5),
        ("residential", 2.5),
        ("living_street", 2.5),
        ("track", 5.0),
        ("service", 5.0),
    ],
    access: &[
        "access",
        "vehicle",
        "motor_vehicle",
        "psv",
        "bus",
        "routing:ztm",
    ],
    disallow_motorroad: false,
    foot_rules: false,
};

/// Example routing [Profile] for bicycles, with preferences for quieter roads
/// and with appropriate [access tags](https://wiki.openstreetmap.org/wiki/Key:access).
pub const BICYCLE_PROFILE: HighwayProfile<'static> = HighwayProfile {
    name: "bicycle",
    penalties: &[
        ("trunk", 50.0),
        ("primary", 10.0),
        ("secondary", 3.0),
        ("tertiary", 2.5),
        ("unclassified", 2.5),
        ("cycleway", 1.0),
        ("residential", 1.0),
        ("living_street", 1.5),
        ("track", 2.0),
        ("service", 2.0),
        ("bridleway", 3.0),
        ("footway", 3.0),
        ("steps", 5.0),
        ("path", 2.0),
    ],
    access: &["access", "vehicle", "bicycle"],
    disallow_motorroad: true,
    foot_rules: false,
};

/// Example routing [Profile] for walking, with the pedestrian tagging
/// exceptions (see [HighwayProfile::foot_rules]) and with appropriate
/// [access tags](https://wiki.openstreetmap.org/wiki/Key:access).
pub const FOOT_PROFILE: HighwayProfile<'static> = HighwayProfile {
    name: "foot",
    penalties: &[
        ("trunk", 4.0),
        ("primary", 2.0),
        ("secondary", 1.3),
        ("tertiary", 1.2),
        ("unclassified", 1.2),
        ("residential", 1.2),
        ("living_street", 1.2),
        ("track", 1.2),
        ("service", 1.2),
        ("bridleway", 1.2),
        ("footway", 1.05),
        ("path", 1.05),
        ("steps", 1.15),
        ("pedestrian", 1.0),
        ("platform", 1.1),
    ],
    access: &["access", "foot"],
    disallow_motorroad: true,
    foot_rules: true,
};

/// Example simple routing [Profile] for different kinds of trains.
pub const RAILWAY_PROFILE: RailwayProfile<'static> = RailwayProfile {
    name: "train",
    penalties: &[
        ("rail", 1.0),
        ("light_rail", 1.0),
        ("subway", 1.0),
        ("narrow_gauge", 1.0),
    ],
};

/// Example simple routing [Profile] for routing over tram and light rail lines.
pub const TRAM_PROFILE: RailwayProfile<'static> = RailwayProfile {
    name: "tram",
    penalties: &[("tram", 1.0), ("light_rail", 1.0)],
};

/// Example simple routing [Profile] for routing over subway lines.
pub const SUBWAY_PROFILE: RailwayProfile<'static> = RailwayProfile {
    name: "subway",
    penalties: &[("subway", 1.0)],
};
