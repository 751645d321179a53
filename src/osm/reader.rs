// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::fs::File;
use std::io::{self, BufRead};
use std::path::Path;
use std::str::from_utf8;

use bzip2::bufread::BzDecoder;
use flate2::bufread::MultiGzDecoder;
use quick_xml::events::{BytesStart, Event};

use super::builder::GraphBuilder;
use super::model::{Feature, FeatureType, Node, Relation, RelationMember, Tags, Way};
use super::profile::Profile;
use super::BuildError;
use crate::{Graph, Position};

/// Format of the input OSM data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    /// Unknown format - guess based on the gzip/bzip2 magic bytes,
    /// falling back to uncompressed XML.
    #[default]
    Unknown,

    /// Uncompressed [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML)
    Xml,

    /// [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML)
    /// with [gzip](https://en.wikipedia.org/wiki/Gzip) compression
    XmlGz,

    /// [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML)
    /// with [bzip2](https://en.wikipedia.org/wiki/Bzip2) compression
    XmlBz2,
}

/// Error conditions which may occur when reading OSM data into a [Graph].
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Parses OSM features from a file at the provided path into a [Graph],
/// as interpreted by the provided [Profile].
pub fn add_features_from_file<P: AsRef<Path>>(
    g: &mut Graph,
    profile: &dyn Profile,
    format: FileFormat,
    path: P,
) -> Result<(), ReadError> {
    let f = File::open(path)?;
    add_features_from_io(g, profile, format, io::BufReader::new(f))
}

/// Parses OSM features from a reader into a [Graph],
/// as interpreted by the provided [Profile].
pub fn add_features_from_io<R: BufRead>(
    g: &mut Graph,
    profile: &dyn Profile,
    format: FileFormat,
    reader: R,
) -> Result<(), ReadError> {
    let decoded = decompress(format, Box::new(reader))?;
    let mut builder = GraphBuilder::new(g, profile);
    for feature in Features::new(decoded) {
        builder.add_feature(feature?)?;
    }
    builder.finish();
    Ok(())
}

/// Parses OSM features from an in-memory buffer into a [Graph],
/// as interpreted by the provided [Profile].
pub fn add_features_from_buffer(
    g: &mut Graph,
    profile: &dyn Profile,
    format: FileFormat,
    data: &[u8],
) -> Result<(), ReadError> {
    add_features_from_io(g, profile, format, data)
}

/// Wraps `reader` in a decompressor matching `format`, sniffing the
/// compression magic bytes first for [FileFormat::Unknown].
fn decompress<'a>(
    format: FileFormat,
    mut reader: Box<dyn BufRead + 'a>,
) -> io::Result<Box<dyn BufRead + 'a>> {
    let format = match format {
        FileFormat::Unknown => sniff_format(reader.as_mut())?,
        other => other,
    };

    Ok(match format {
        FileFormat::Unknown | FileFormat::Xml => reader,
        FileFormat::XmlGz => Box::new(io::BufReader::new(MultiGzDecoder::new(reader))),
        FileFormat::XmlBz2 => Box::new(io::BufReader::new(BzDecoder::new(reader))),
    })
}

fn sniff_format(reader: &mut dyn BufRead) -> io::Result<FileFormat> {
    let head = reader.fill_buf()?;
    Ok(if head.starts_with(&[0x1f, 0x8b]) {
        FileFormat::XmlGz
    } else if head.starts_with(b"BZh") {
        FileFormat::XmlBz2
    } else {
        FileFormat::Xml
    })
}

/// Streams [OSM features](Feature) from
/// [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML) data.
///
/// Features with missing or malformed mandatory attributes are silently
/// skipped; structurally invalid XML stops the iterator with an error.
pub struct Features<R: BufRead> {
    parser: quick_xml::Reader<R>,
    buf: Vec<u8>,
    pending: Option<Feature>,
    eof: bool,
}

impl<R: BufRead> Features<R> {
    pub fn new(reader: R) -> Self {
        Self {
            parser: quick_xml::Reader::from_reader(reader),
            buf: Vec::new(),
            pending: None,
            eof: false,
        }
    }
}

impl<R: BufRead> Iterator for Features<R> {
    type Item = Result<Feature, quick_xml::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.eof {
            self.buf.clear();
            let event = match self.parser.read_event_into(&mut self.buf) {
                Ok(e) => e,
                Err(e) => return Some(Err(e)),
            };

            match event {
                Event::Empty(start) => match start.local_name().as_ref() {
                    b"node" => {
                        if let Some(node) = parse_node(&start) {
                            return Some(Ok(Feature::Node(node)));
                        }
                    }
                    // "way" and "relation" can't be self-closing
                    b"tag" => {
                        if let Some(tags) = pending_tags(&mut self.pending) {
                            if let Some((k, v)) = parse_tag(&start) {
                                tags.insert(k, v);
                            }
                        }
                    }
                    b"nd" => {
                        if let Some(nodes) = pending_way_nodes(&mut self.pending) {
                            if let Some(reference) = parse_nd(&start) {
                                nodes.push(reference);
                            }
                        }
                    }
                    b"member" => {
                        if let Some(members) = pending_members(&mut self.pending) {
                            if let Some(member) = parse_member(&start) {
                                members.push(member);
                            }
                        }
                    }
                    _ => {}
                },

                Event::Start(start) => match start.local_name().as_ref() {
                    b"node" => self.pending = parse_node(&start).map(Feature::Node),
                    b"way" => self.pending = parse_way(&start).map(Feature::Way),
                    b"relation" => self.pending = parse_relation(&start).map(Feature::Relation),
                    // "tag", "nd" and "member" must be self-closing
                    _ => {}
                },

                Event::End(end) => match end.local_name().as_ref() {
                    b"node" | b"way" | b"relation" => {
                        if let Some(feature) = self.pending.take() {
                            return Some(Ok(feature));
                        }
                    }
                    _ => {}
                },

                Event::Eof => self.eof = true,

                _ => {}
            }
        }

        self.pending.take().map(Ok)
    }
}

fn parse_node(start: &BytesStart<'_>) -> Option<Node> {
    let mut id: Option<i64> = None;
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr in start.attributes() {
        let attr = attr.ok()?;
        match attr.key.as_ref() {
            b"id" => id = from_utf8(&attr.value).ok()?.parse().ok(),
            b"lat" => lat = from_utf8(&attr.value).ok()?.parse().ok(),
            b"lon" => lon = from_utf8(&attr.value).ok()?.parse().ok(),
            _ => {}
        }
    }

    match (id, lat, lon) {
        (Some(id), Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some(Node {
            id,
            position: Position::new(lat, lon),
            tags: Tags::default(),
        }),
        _ => None,
    }
}

fn parse_way(start: &BytesStart<'_>) -> Option<Way> {
    parse_id(start).map(|id| Way {
        id,
        nodes: Vec::default(),
        tags: Tags::default(),
    })
}

fn parse_relation(start: &BytesStart<'_>) -> Option<Relation> {
    parse_id(start).map(|id| Relation {
        id,
        members: Vec::default(),
        tags: Tags::default(),
    })
}

fn parse_id(start: &BytesStart<'_>) -> Option<i64> {
    for attr in start.attributes() {
        let attr = attr.ok()?;
        if attr.key.as_ref() == b"id" {
            return from_utf8(&attr.value).ok()?.parse().ok();
        }
    }
    None
}

fn parse_tag(start: &BytesStart<'_>) -> Option<(String, String)> {
    let mut k: Option<String> = None;
    let mut v: Option<String> = None;

    for attr in start.attributes() {
        let attr = attr.ok()?;
        match attr.key.as_ref() {
            b"k" => k = from_utf8(&attr.value).ok().map(str::to_string),
            b"v" => v = from_utf8(&attr.value).ok().map(str::to_string),
            _ => {}
        }
    }

    Some((k?, v.unwrap_or_default()))
}

fn parse_nd(start: &BytesStart<'_>) -> Option<i64> {
    for attr in start.attributes() {
        let attr = attr.ok()?;
        if attr.key.as_ref() == b"ref" {
            return from_utf8(&attr.value).ok()?.parse().ok();
        }
    }
    None
}

fn parse_member(start: &BytesStart<'_>) -> Option<RelationMember> {
    let mut kind: Option<FeatureType> = None;
    let mut reference: Option<i64> = None;
    let mut role = String::new();

    for attr in start.attributes() {
        let attr = attr.ok()?;
        match attr.key.as_ref() {
            b"type" => kind = parse_feature_type(&attr.value),
            b"ref" => reference = from_utf8(&attr.value).ok()?.parse().ok(),
            b"role" => role = from_utf8(&attr.value).ok()?.to_string(),
            _ => {}
        }
    }

    Some(RelationMember {
        kind: kind?,
        reference: reference?,
        role,
    })
}

fn parse_feature_type(s: &[u8]) -> Option<FeatureType> {
    match s {
        b"node" => Some(FeatureType::Node),
        b"way" => Some(FeatureType::Way),
        b"relation" => Some(FeatureType::Relation),
        _ => None,
    }
}

fn pending_tags(f: &mut Option<Feature>) -> Option<&mut Tags> {
    match f {
        Some(Feature::Node(n)) => Some(&mut n.tags),
        Some(Feature::Way(w)) => Some(&mut w.tags),
        Some(Feature::Relation(r)) => Some(&mut r.tags),
        None => None,
    }
}

fn pending_way_nodes(f: &mut Option<Feature>) -> Option<&mut Vec<i64>> {
    match f {
        Some(Feature::Way(w)) => Some(&mut w.nodes),
        _ => None,
    }
}

fn pending_members(f: &mut Option<Feature>) -> Option<&mut Vec<RelationMember>> {
    match f {
        Some(Feature::Relation(r)) => Some(&mut r.members),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osm::profile::CAR_PROFILE;
    use crate::{find_route, PHANTOM_NODE_ID_BASE};

    macro_rules! tags {
        {} => { Tags::default() };
        {$( $k:literal : $v:literal ),+} => {
            Tags::from_iter([ $( ($k.to_string(), $v.to_string()) ),+ ])
        };
    }

    const SIMPLE_XML: &[u8] = include_bytes!("test_fixtures/simple.osm");
    const SIMPLE_XML_GZ: &[u8] = include_bytes!("test_fixtures/simple.osm.gz");
    const SIMPLE_XML_BZ2: &[u8] = include_bytes!("test_fixtures/simple.osm.bz2");

    fn expected_nodes() -> Vec<Node> {
        let node = |id: i64, lat: f64, lon: f64, tags: Tags| Node {
            id,
            position: Position::new(lat, lon),
            tags,
        };
        vec![
            node(1, 50.06, 19.93, tags! {"crossing": "marked"}),
            node(2, 50.06, 19.94, tags! {}),
            node(3, 50.06, 19.95, tags! {}),
            node(4, 50.07, 19.94, tags! {}),
            node(5, 50.07, 19.93, tags! {}),
            node(6, 50.05, 19.94, tags! {}),
            node(7, 50.07, 19.95, tags! {}),
            node(8, 50.08, 19.94, tags! {}),
        ]
    }

    fn expected_ways() -> Vec<Way> {
        let way = |id: i64, nodes: &[i64], tags: Tags| Way {
            id,
            nodes: nodes.to_vec(),
            tags,
        };
        vec![
            way(101, &[1, 2], tags! {"highway": "residential"}),
            way(102, &[2, 3], tags! {"highway": "residential"}),
            way(103, &[2, 4], tags! {"highway": "residential"}),
            way(104, &[4, 5], tags! {"highway": "residential", "oneway": "yes"}),
            way(105, &[5, 1], tags! {"highway": "residential"}),
            way(106, &[4, 7], tags! {"highway": "unclassified"}),
            way(107, &[4, 8], tags! {"highway": "track", "motor_vehicle": "no"}),
            way(109, &[2, 6], tags! {"highway": "service", "access": "private"}),
        ]
    }

    fn expected_relations() -> Vec<Relation> {
        vec![
            Relation {
                id: 201,
                members: vec![
                    RelationMember {
                        kind: FeatureType::Way,
                        reference: 101,
                        role: "from".to_string(),
                    },
                    RelationMember {
                        kind: FeatureType::Node,
                        reference: 2,
                        role: "via".to_string(),
                    },
                    RelationMember {
                        kind: FeatureType::Way,
                        reference: 103,
                        role: "to".to_string(),
                    },
                ],
                tags: tags! {"type": "restriction", "restriction": "no_left_turn"},
            },
            Relation {
                id: 202,
                members: vec![
                    RelationMember {
                        kind: FeatureType::Way,
                        reference: 103,
                        role: "from".to_string(),
                    },
                    RelationMember {
                        kind: FeatureType::Node,
                        reference: 4,
                        role: "via".to_string(),
                    },
                    RelationMember {
                        kind: FeatureType::Way,
                        reference: 106,
                        role: "to".to_string(),
                    },
                ],
                tags: tags! {
                    "type": "restriction",
                    "restriction": "only_right_turn",
                    "except": "motorcar"
                },
            },
        ]
    }

    fn collect_features<R: BufRead>(
        features: Features<R>,
    ) -> Result<(Vec<Node>, Vec<Way>, Vec<Relation>), quick_xml::Error> {
        let mut nodes = Vec::new();
        let mut ways = Vec::new();
        let mut relations = Vec::new();

        for feature in features {
            match feature? {
                Feature::Node(n) => nodes.push(n),
                Feature::Way(w) => ways.push(w),
                Feature::Relation(r) => relations.push(r),
            }
        }

        Ok((nodes, ways, relations))
    }

    #[test]
    fn parses_xml() -> Result<(), quick_xml::Error> {
        let (nodes, ways, relations) = collect_features(Features::new(SIMPLE_XML))?;
        assert_eq!(nodes, expected_nodes());
        assert_eq!(ways, expected_ways());
        assert_eq!(relations, expected_relations());
        Ok(())
    }

    #[test]
    fn sniffs_formats() -> io::Result<()> {
        assert_eq!(sniff_format(&mut &SIMPLE_XML[..])?, FileFormat::Xml);
        assert_eq!(sniff_format(&mut &SIMPLE_XML_GZ[..])?, FileFormat::XmlGz);
        assert_eq!(sniff_format(&mut &SIMPLE_XML_BZ2[..])?, FileFormat::XmlBz2);
        Ok(())
    }

    #[test]
    fn decompresses_gzip() -> Result<(), ReadError> {
        for format in [FileFormat::XmlGz, FileFormat::Unknown] {
            let decoded = decompress(format, Box::new(SIMPLE_XML_GZ))?;
            let (nodes, ways, relations) = collect_features(Features::new(decoded))?;
            assert_eq!(nodes, expected_nodes());
            assert_eq!(ways, expected_ways());
            assert_eq!(relations, expected_relations());
        }
        Ok(())
    }

    #[test]
    fn decompresses_bzip2() -> Result<(), ReadError> {
        for format in [FileFormat::XmlBz2, FileFormat::Unknown] {
            let decoded = decompress(format, Box::new(SIMPLE_XML_BZ2))?;
            let (nodes, ways, relations) = collect_features(Features::new(decoded))?;
            assert_eq!(nodes, expected_nodes());
            assert_eq!(ways, expected_ways());
            assert_eq!(relations, expected_relations());
        }
        Ok(())
    }

    #[test]
    fn builds_car_graph_from_fixture() -> Result<(), ReadError> {
        let mut g = Graph::new();
        add_features_from_buffer(&mut g, &CAR_PROFILE, FileFormat::Unknown, SIMPLE_XML)?;

        let phantom = PHANTOM_NODE_ID_BASE + 1;

        // 6 routable nodes + 1 phantom; nodes of untraversable ways are gone
        assert_eq!(g.len(), 7);
        assert!(g.get_node(6).is_none());
        assert!(g.get_node(8).is_none());
        assert_eq!(g.get_node(phantom).unwrap().external_id, 2);

        // Access tags dropped ways 107 and 109 entirely
        assert_eq!(g.get_edge(4, 8), None);
        assert_eq!(g.get_edge(2, 6), None);

        // The oneway street only runs 4 → 5
        assert!(g.get_edge(4, 5).is_some());
        assert_eq!(g.get_edge(5, 4), None);

        // Restriction 201 redirects 1 → 2 through the clone, which must not
        // lead to 4; restriction 202 is exempted for cars
        assert_eq!(g.get_edge(1, 2), None);
        assert!(g.get_edge(1, phantom).is_some());
        assert!(g.get_edge(phantom, 3).is_some());
        assert_eq!(g.get_edge(phantom, 4), None);
        assert!(g.get_edge(4, 7).is_some());

        assert_eq!(
            find_route(&g, 1, 4, None).unwrap(),
            vec![1, phantom, 3, 2, 4],
        );
        Ok(())
    }
}
