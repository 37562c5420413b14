//! Shared geometry helpers for the ownership passes.

use serde::{Deserialize, Serialize};

use crate::observation::Tracks;
use crate::TrackId;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// Nearest track to `target` by center distance.
///
/// Exact ties keep the first candidate in iteration order (ascending id).
pub fn nearest(target: Point, candidates: &Tracks) -> Option<(TrackId, f32)> {
    let mut best: Option<(TrackId, f32)> = None;
    for (&id, bbox) in candidates {
        let dist = distance(bbox.center(), target);
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((id, dist)),
        }
    }
    best
}

/// Center-to-center distance between two visible tracks, if both are visible.
pub fn track_distance(a: &Tracks, a_id: TrackId, b: &Tracks, b_id: TrackId) -> Option<f32> {
    let a_box = a.get(&a_id)?;
    let b_box = b.get(&b_id)?;
    Some(distance(a_box.center(), b_box.center()))
}
