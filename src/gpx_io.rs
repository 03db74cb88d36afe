//! GPX input and output.
//!
//! Reading takes every track segment in order, or the routes when the file
//! has no tracks. Two output flavours exist:
//!
//! - **waypoints**: one waypoint per included place, nothing else
//! - **enhanced**: the original track with a there-and-back detour spliced in
//!   for every place that has a road route, plus the waypoints

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use geo::Point;
use gpx::{Gpx, GpxVersion, Metadata, TrackSegment, Waypoint};
use log::{debug, info};

use crate::{Category, FinderError, GpsPoint, Place, PlaceKey, Track};

/// Longest waypoint name many GPS units accept.
pub const MAX_WAYPOINT_NAME: usize = 50;

/// Which GPX file to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Waypoints,
    Enhanced,
}

/// Points of all track segments, or of all routes if there are no tracks.
pub fn track_points(gpx: &Gpx) -> Vec<GpsPoint> {
    let to_gps = |wpt: &Waypoint| {
        let p = wpt.point();
        GpsPoint::new(p.y(), p.x())
    };

    let points: Vec<GpsPoint> = gpx
        .tracks
        .iter()
        .flat_map(|t| &t.segments)
        .flat_map(|s| &s.points)
        .map(to_gps)
        .collect();
    if !points.is_empty() {
        return points;
    }

    gpx.routes.iter().flat_map(|r| &r.points).map(to_gps).collect()
}

/// Parse GPX from any reader.
pub fn parse_track<R: Read>(reader: R, path: &Path) -> Result<Track, FinderError> {
    let gpx = gpx::read(reader).map_err(|source| FinderError::Gpx {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        "[GPX] {} track(s), {} route(s) in {}",
        gpx.tracks.len(),
        gpx.routes.len(),
        path.display()
    );
    Track::new(track_points(&gpx))
}

/// Load the track from a GPX file.
pub fn read_track(path: &Path) -> Result<Track, FinderError> {
    let file = File::open(path).map_err(|source| FinderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let track = parse_track(BufReader::new(file), path)?;
    info!(
        "[GPX] Read {} points ({:.2} km) from {}",
        track.points().len(),
        track.length_km(),
        path.display()
    );
    Ok(track)
}

/// `<stem>-<category keys>.gpx` for `input`.
pub fn output_file_name(input: &Path, categories: &[Category]) -> String {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("route");
    let keys: Vec<&str> = categories.iter().map(Category::key).collect();
    format!("{}-{}.gpx", stem, keys.join("-"))
}

/// `"<Prefix> <n> (<d.d>km) <name>"`, shortened to [`MAX_WAYPOINT_NAME`] chars.
///
/// Only the place name is shortened, ending in `...`. If the prefix alone
/// is too long the name is dropped.
pub fn waypoint_name(place: &Place, number: usize) -> String {
    let base = format!(
        "{} {} ({:.1}km)",
        place.category.waypoint_prefix(),
        number,
        place.distance_km
    );
    let full = format!("{} {}", base, place.name);
    if full.chars().count() <= MAX_WAYPOINT_NAME {
        return full;
    }

    let available = MAX_WAYPOINT_NAME.saturating_sub(base.chars().count() + 1);
    if available == 0 {
        return base;
    }
    let kept: String = place.name.chars().take(available.saturating_sub(3)).collect();
    format!("{base} {kept}...")
}

pub fn waypoint_description(place: &Place) -> String {
    format!(
        "{}: {} - Distance from route: {} km",
        place.category.display_name(),
        place.name,
        place.distance_km
    )
}

fn gps_waypoint(point: GpsPoint) -> Waypoint {
    Waypoint::new(Point::new(point.longitude, point.latitude))
}

/// Waypoints numbered per category in input order.
fn place_waypoints(places: &[&Place]) -> Vec<Waypoint> {
    let mut counts = [0usize; Category::ALL.len()];
    places
        .iter()
        .map(|place| {
            let slot = Category::ALL
                .iter()
                .position(|c| *c == place.category)
                .unwrap_or(0);
            counts[slot] += 1;

            let mut wpt = gps_waypoint(place.point());
            wpt.name = Some(waypoint_name(place, counts[slot]));
            wpt.description = Some(waypoint_description(place));
            wpt.symbol = Some(place.category.gpx_symbol().to_string());
            wpt
        })
        .collect()
}

fn new_gpx(name: &str, description: &str) -> Gpx {
    Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(concat!("route-places ", env!("CARGO_PKG_VERSION")).to_string()),
        metadata: Some(Metadata {
            name: Some(name.to_string()),
            description: Some(description.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// GPX document with only the place waypoints.
pub fn waypoints_gpx(places: &[&Place]) -> Gpx {
    let mut gpx = new_gpx(
        "Places Found Along Route",
        "Places found along route within specified distances",
    );
    gpx.waypoints = place_waypoints(places);
    gpx
}

/// Track points with road-route detours spliced in.
///
/// Each detour goes out along the road route, visits the place and comes
/// back along the reversed route. It is inserted after the track point
/// closest to the route's start; detours sharing an insertion point keep
/// their input order.
pub fn splice_detours<'a>(
    track: &Track,
    places: &[&Place],
    route_for: impl Fn(PlaceKey) -> Option<&'a [GpsPoint]>,
) -> Vec<GpsPoint> {
    let mut insertions: Vec<(usize, &Place, &[GpsPoint])> = places
        .iter()
        .filter_map(|place| {
            let route = route_for(place.key()).filter(|r| r.len() > 1)?;
            let index = track.line().closest_vertex_index(&route[0]);
            debug!("[GPX] Detour to {} after track point {}", place.name, index);
            Some((index, *place, route))
        })
        .collect();
    insertions.sort_by_key(|(index, _, _)| *index);

    let extra: usize = insertions.iter().map(|(_, _, r)| 2 * r.len() + 1).sum();
    let mut points = Vec::with_capacity(track.points().len() + extra);
    let mut pending = insertions.into_iter().peekable();

    for (i, point) in track.points().iter().enumerate() {
        points.push(*point);
        while let Some((_, place, route)) = pending.next_if(|(index, _, _)| *index == i) {
            points.extend_from_slice(route);
            points.push(place.point());
            points.extend(route.iter().rev());
        }
    }
    points
}

/// GPX document with the detour-enhanced track and the place waypoints.
pub fn enhanced_gpx<'a>(
    track: &Track,
    places: &[&Place],
    route_for: impl Fn(PlaceKey) -> Option<&'a [GpsPoint]>,
) -> Gpx {
    let mut gpx = new_gpx(
        "Enhanced Route with Places",
        "Original route with deviations inserted at correct positions",
    );

    let mut segment = TrackSegment::new();
    segment.points = splice_detours(track, places, route_for)
        .into_iter()
        .map(gps_waypoint)
        .collect();

    let mut gpx_track = gpx::Track::new();
    gpx_track.name = Some("Enhanced Route with Deviations".to_string());
    gpx_track.description =
        Some("Original route with deviations inserted where they branch off".to_string());
    gpx_track.segments.push(segment);

    gpx.tracks.push(gpx_track);
    gpx.waypoints = place_waypoints(places);
    gpx
}

/// Serialize `gpx` to `writer`.
pub fn write_gpx_to<W: Write>(gpx: &Gpx, writer: W, path: &Path) -> Result<(), FinderError> {
    gpx::write(gpx, writer).map_err(|source| FinderError::Gpx {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `gpx` to `path`, replacing any existing file.
pub fn write_gpx(gpx: &Gpx, path: &Path) -> Result<(), FinderError> {
    let io_err = |source| FinderError::Io { path: path.to_path_buf(), source };

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    write_gpx_to(gpx, &mut writer, path)?;
    writer.flush().map_err(io_err)?;

    info!(
        "[GPX] Wrote {} waypoints, {} track(s) to {}",
        gpx.waypoints.len(),
        gpx.tracks.len(),
        path.display()
    );
    Ok(())
}

pub fn write_waypoints_gpx(places: &[&Place], path: &Path) -> Result<(), FinderError> {
    write_gpx(&waypoints_gpx(places), path)
}

pub fn write_enhanced_gpx<'a>(
    track: &Track,
    places: &[&Place],
    route_for: impl Fn(PlaceKey) -> Option<&'a [GpsPoint]>,
    path: &Path,
) -> Result<(), FinderError> {
    write_gpx(&enhanced_gpx(track, places, route_for), path)
}
