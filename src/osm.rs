//! Simplified map-data XML export and import.
//!
//! The document carries a `bounds` element, one `node` per road point, and
//! one `way` per named road referencing its nodes in order, tagged
//! `highway=unclassified` and `name=<road name>`.

use std::fs;
use std::path::Path;

use ahash::AHashMap;
use log::info;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use crate::error::{Error, Result};
use crate::formats::NamedRoads;
use crate::geometry::{GeoBounds, PixelMapper};

pub const ROADS_OSM_FILE: &str = "roads.osm";

#[derive(Debug, Clone)]
pub struct OsmWay {
    pub id: u64,
    pub node_refs: Vec<u64>,
    pub name: String,
}

/// Parsed road-network document.
#[derive(Debug)]
pub struct OsmDocument {
    pub bounds: GeoBounds,
    pub nodes: AHashMap<u64, [f64; 2]>,
    pub ways: Vec<OsmWay>,
}

impl OsmDocument {
    /// Way geometries in `[lat, lon]` space, paired with the road name.
    /// Ways referencing unknown nodes are dropped.
    pub fn way_geometries(&self) -> Vec<(Vec<[f64; 2]>, String)> {
        self.ways
            .iter()
            .filter_map(|way| {
                let coords: Option<Vec<[f64; 2]>> = way
                    .node_refs
                    .iter()
                    .map(|id| self.nodes.get(id).copied())
                    .collect();
                coords.map(|c| (c, way.name.clone()))
            })
            .collect()
    }
}

/// Write the named road network as a road-network XML document.
pub fn write_roads_osm(
    path: &Path,
    named: &NamedRoads,
    bounds: &GeoBounds,
    mapper: &PixelMapper,
) -> Result<()> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| Error::xml(path, e))?;

    let mut osm = BytesStart::new("osm");
    osm.push_attribute(("version", "0.6"));
    osm.push_attribute(("generator", "gridcode"));
    writer.write_event(Event::Start(osm)).map_err(|e| Error::xml(path, e))?;

    let mut bounds_el = BytesStart::new("bounds");
    bounds_el.push_attribute(("minlat", bounds.min_lat.to_string().as_str()));
    bounds_el.push_attribute(("minlon", bounds.min_lon.to_string().as_str()));
    bounds_el.push_attribute(("maxlat", bounds.max_lat.to_string().as_str()));
    bounds_el.push_attribute(("maxlon", bounds.max_lon.to_string().as_str()));
    writer.write_event(Event::Empty(bounds_el)).map_err(|e| Error::xml(path, e))?;

    // Nodes first, each road remembering the ids it was assigned; ids keep
    // counting through the ways so every element id is unique.
    let mut next_id: u64 = 1;
    let mut road_node_ids: Vec<(&String, Vec<u64>)> = Vec::with_capacity(named.roads.len());
    for (name, points) in &named.roads {
        let mut ids = Vec::with_capacity(points.len());
        for point in points {
            let [lat, lon] = mapper.to_lat_lon(point.pixel.row, point.pixel.col);
            let mut node = BytesStart::new("node");
            node.push_attribute(("id", next_id.to_string().as_str()));
            node.push_attribute(("lat", lat.to_string().as_str()));
            node.push_attribute(("lon", lon.to_string().as_str()));
            node.push_attribute(("version", "1"));
            writer.write_event(Event::Empty(node)).map_err(|e| Error::xml(path, e))?;
            ids.push(next_id);
            next_id += 1;
        }
        road_node_ids.push((name, ids));
    }

    for (name, ids) in road_node_ids {
        let mut way = BytesStart::new("way");
        way.push_attribute(("id", next_id.to_string().as_str()));
        way.push_attribute(("version", "1"));
        writer.write_event(Event::Start(way)).map_err(|e| Error::xml(path, e))?;
        for id in ids {
            let mut nd = BytesStart::new("nd");
            nd.push_attribute(("ref", id.to_string().as_str()));
            writer.write_event(Event::Empty(nd)).map_err(|e| Error::xml(path, e))?;
        }
        for (k, v) in [("highway", "unclassified"), ("name", name.as_str())] {
            let mut tag = BytesStart::new("tag");
            tag.push_attribute(("k", k));
            tag.push_attribute(("v", v));
            writer.write_event(Event::Empty(tag)).map_err(|e| Error::xml(path, e))?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("way")))
            .map_err(|e| Error::xml(path, e))?;
        next_id += 1;
    }

    writer
        .write_event(Event::End(BytesEnd::new("osm")))
        .map_err(|e| Error::xml(path, e))?;

    fs::write(path, writer.into_inner()).map_err(|e| Error::io(path, e))?;
    info!("road network written to {}", path.display());
    Ok(())
}

fn attr_map(path: &Path, element: &BytesStart<'_>) -> Result<AHashMap<String, String>> {
    let mut map = AHashMap::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| Error::xml(path, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::xml(path, e))?
            .into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

fn required<T: std::str::FromStr>(
    path: &Path,
    attrs: &AHashMap<String, String>,
    key: &str,
    element: &str,
) -> Result<T> {
    attrs
        .get(key)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::xml(path, format!("{element} element missing numeric '{key}'")))
}

/// Parse a road-network XML document back into bounds, nodes and named ways.
/// Ways without a `name` tag are skipped.
pub fn read_roads_osm(path: &Path) -> Result<OsmDocument> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let mut reader = Reader::from_str(&text);

    let mut bounds = None;
    let mut nodes = AHashMap::new();
    let mut ways = Vec::new();
    let mut current_way: Option<(u64, Vec<u64>, Option<String>)> = None;

    loop {
        match reader.read_event().map_err(|e| Error::xml(path, e))? {
            Event::Start(el) | Event::Empty(el) => {
                let attrs = attr_map(path, &el)?;
                match el.name().as_ref() {
                    b"bounds" => {
                        bounds = Some(GeoBounds {
                            min_lat: required(path, &attrs, "minlat", "bounds")?,
                            min_lon: required(path, &attrs, "minlon", "bounds")?,
                            max_lat: required(path, &attrs, "maxlat", "bounds")?,
                            max_lon: required(path, &attrs, "maxlon", "bounds")?,
                        });
                    }
                    b"node" => {
                        let id = required(path, &attrs, "id", "node")?;
                        let lat = required(path, &attrs, "lat", "node")?;
                        let lon = required(path, &attrs, "lon", "node")?;
                        nodes.insert(id, [lat, lon]);
                    }
                    b"way" => {
                        current_way = Some((required(path, &attrs, "id", "way")?, Vec::new(), None));
                    }
                    b"nd" => {
                        if let Some((_, refs, _)) = current_way.as_mut() {
                            refs.push(required(path, &attrs, "ref", "nd")?);
                        }
                    }
                    b"tag" => {
                        if let Some((_, _, name)) = current_way.as_mut() {
                            if attrs.get("k").map(String::as_str) == Some("name") {
                                *name = attrs.get("v").cloned();
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::End(el) => {
                if el.name().as_ref() == b"way" {
                    if let Some((id, node_refs, Some(name))) = current_way.take() {
                        ways.push(OsmWay {
                            id,
                            node_refs,
                            name,
                        });
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let bounds =
        bounds.ok_or_else(|| Error::xml(path, "document has no bounds element".to_string()))?;
    Ok(OsmDocument {
        bounds,
        nodes,
        ways,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{ImageMeta, RoadPoint};
    use std::collections::BTreeMap;

    const BOUNDS: GeoBounds = GeoBounds {
        min_lat: 40.0,
        min_lon: -75.1,
        max_lat: 40.1,
        max_lon: -75.0,
    };

    fn sample_named() -> NamedRoads {
        let mut roads = BTreeMap::new();
        roads.insert(
            "CA10".to_string(),
            vec![
                RoadPoint::new(10, 10, 0.0),
                RoadPoint::new(10, 90, 80.0),
            ],
        );
        roads.insert(
            "CA11".to_string(),
            vec![
                RoadPoint::new(10, 50, 0.0),
                RoadPoint::new(90, 50, 80.0),
                RoadPoint::new(95, 50, 85.0),
            ],
        );
        NamedRoads {
            meta: ImageMeta {
                height: 100,
                width: 100,
            },
            roads,
        }
    }

    #[test]
    fn document_round_trips() {
        let dir = std::env::temp_dir().join(format!("gridcode-osm-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(ROADS_OSM_FILE);

        let named = sample_named();
        let mapper = PixelMapper::new(BOUNDS, named.meta);
        write_roads_osm(&path, &named, &BOUNDS, &mapper).unwrap();

        let doc = read_roads_osm(&path).unwrap();
        assert_eq!(doc.bounds, BOUNDS);
        assert_eq!(doc.nodes.len(), 5);
        assert_eq!(doc.ways.len(), 2);

        let geoms = doc.way_geometries();
        assert_eq!(geoms.len(), 2);
        let ca10 = geoms.iter().find(|(_, name)| name == "CA10").unwrap();
        assert_eq!(ca10.0.len(), 2);
        // First CA10 point is pixel (10, 10).
        let expected = mapper.to_lat_lon(10, 10);
        assert!((ca10.0[0][0] - expected[0]).abs() < 1e-9);
        assert!((ca10.0[0][1] - expected[1]).abs() < 1e-9);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_bounds_is_an_error() {
        let dir = std::env::temp_dir().join(format!("gridcode-osm-nb-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.osm");
        fs::write(&path, r#"<?xml version="1.0"?><osm version="0.6"></osm>"#).unwrap();
        assert!(matches!(read_roads_osm(&path), Err(Error::Xml { .. })));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn unnamed_ways_are_skipped() {
        let dir = std::env::temp_dir().join(format!("gridcode-osm-un-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("partial.osm");
        fs::write(
            &path,
            r#"<?xml version="1.0"?>
            <osm version="0.6">
              <bounds minlat="40.0" minlon="-75.1" maxlat="40.1" maxlon="-75.0"/>
              <node id="1" lat="40.05" lon="-75.05" version="1"/>
              <node id="2" lat="40.06" lon="-75.05" version="1"/>
              <way id="3" version="1">
                <nd ref="1"/>
                <nd ref="2"/>
              </way>
            </osm>"#,
        )
        .unwrap();
        let doc = read_roads_osm(&path).unwrap();
        assert!(doc.ways.is_empty());
        fs::remove_dir_all(&dir).ok();
    }
}
