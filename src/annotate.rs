//! Overlay annotations for a rendering collaborator.
//!
//! The kernel never draws. It describes what a renderer should put on the
//! frame: a labelled box per visible track, a marker over each visible
//! left-behind bag, and one banner line per event raised on the frame.

use serde::Serialize;

use crate::geometry::Point;
use crate::observation::FrameObservation;
use crate::ownership::{FrameReport, OwnershipTracker};
use crate::{BoundingBox, Event, EventKind, TrackId};

const BANNER_X: f32 = 50.0;
const MOVED_AWAY_BANNER_Y: f32 = 80.0;
const LEFT_BEHIND_BANNER_Y: f32 = 120.0;
const LEFT_WITHOUT_BAG_BANNER_Y: f32 = 160.0;
const MARKER_LIFT: f32 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStyle {
    Person,
    Bag,
    LeftBehind,
    Alert,
}

impl AnnotationStyle {
    /// RGB color conventionally used for this style.
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            AnnotationStyle::Person => [0, 255, 0],
            AnnotationStyle::Bag => [0, 0, 255],
            AnnotationStyle::LeftBehind => [255, 255, 0],
            AnnotationStyle::Alert => [255, 0, 0],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Annotation {
    pub style: AnnotationStyle,
    pub text: String,
    /// Where the text baseline starts.
    pub anchor: Point,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

pub fn person_label(id: TrackId) -> String {
    format!("P{}", id)
}

pub fn bag_label(id: TrackId) -> String {
    format!("B{}", id)
}

pub fn left_behind_label(bag: TrackId) -> String {
    format!("Bag {} LEFT BEHIND", bag)
}

/// Banner text for an event.
pub fn alert_text(event: &Event) -> String {
    match event.kind {
        EventKind::MovedAway => format!(
            "Person {} MOVED AWAY from Bag {}",
            event.person_id, event.bag_id
        ),
        EventKind::LeftBehind => left_behind_label(event.bag_id),
        EventKind::LeftWithoutBag => format!(
            "ALERT: Person {} LEFT WITHOUT Bag {}",
            event.person_id, event.bag_id
        ),
    }
}

fn banner_y(kind: EventKind) -> f32 {
    match kind {
        EventKind::MovedAway => MOVED_AWAY_BANNER_Y,
        EventKind::LeftBehind => LEFT_BEHIND_BANNER_Y,
        EventKind::LeftWithoutBag => LEFT_WITHOUT_BAG_BANNER_Y,
    }
}

fn above(bbox: &BoundingBox, lift: f32) -> Point {
    let tl = bbox.top_left();
    Point {
        x: tl.x,
        y: tl.y - lift,
    }
}

/// Build the overlay for one processed frame.
pub fn annotate(
    tracker: &OwnershipTracker,
    obs: &FrameObservation,
    report: &FrameReport,
) -> Vec<Annotation> {
    let mut out = Vec::with_capacity(obs.persons.len() + obs.bags.len() + report.events.len());

    for (&id, bbox) in &obs.persons {
        out.push(Annotation {
            style: AnnotationStyle::Person,
            text: person_label(id),
            anchor: above(bbox, 10.0),
            bbox: Some(*bbox),
        });
    }
    for (&id, bbox) in &obs.bags {
        out.push(Annotation {
            style: AnnotationStyle::Bag,
            text: bag_label(id),
            anchor: above(bbox, 10.0),
            bbox: Some(*bbox),
        });
    }
    for (&id, bbox) in &obs.bags {
        if tracker.is_left_behind(id) {
            out.push(Annotation {
                style: AnnotationStyle::LeftBehind,
                text: left_behind_label(id),
                anchor: above(bbox, MARKER_LIFT),
                bbox: None,
            });
        }
    }
    for event in &report.events {
        out.push(Annotation {
            style: AnnotationStyle::Alert,
            text: alert_text(event),
            anchor: Point {
                x: BANNER_X,
                y: banner_y(event.kind),
            },
            bbox: None,
        });
    }
    out
}
