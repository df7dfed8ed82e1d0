//! Face landmark geometry
//!
//! Landmarks are normalized (0..1) image coordinates keyed by face-mesh index.
//! Only the indices below are consumed by the detector.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Landmark index sets for one eye
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeIndices {
    /// Points along the upper eyelid
    pub upper: [u16; 2],
    /// Points along the lower eyelid
    pub lower: [u16; 2],
    /// Outer corner
    pub outer: u16,
    /// Inner corner
    pub inner: u16,
}

pub const LEFT_EYE: EyeIndices = EyeIndices {
    upper: [386, 385],
    lower: [374, 380],
    outer: 263,
    inner: 362,
};

pub const RIGHT_EYE: EyeIndices = EyeIndices {
    upper: [159, 158],
    lower: [145, 153],
    outer: 133,
    inner: 33,
};

pub const UPPER_LIP: u16 = 13;
pub const LOWER_LIP: u16 = 14;
pub const MOUTH_LEFT: u16 = 61;
pub const MOUTH_RIGHT: u16 = 291;
pub const LEFT_CHEEK: u16 = 234;
pub const RIGHT_CHEEK: u16 = 454;

const MIN_SPAN: f32 = 1e-6;

/// Normalized 2D point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Landmarks of one tracked face
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceLandmarks {
    points: BTreeMap<u16, Point>,
}

impl FaceLandmarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, index: u16, point: Point) -> Self {
        self.points.insert(index, point);
        self
    }

    pub fn insert(&mut self, index: u16, point: Point) {
        self.points.insert(index, point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Look up a landmark by mesh index
    pub fn get(&self, index: u16) -> Result<Point, DmsError> {
        self.points
            .get(&index)
            .copied()
            .ok_or(DmsError::LandmarkMissing(index))
    }

    /// Eyelid gap over corner-to-corner width; smaller when the eye closes
    pub fn eye_aspect_ratio(&self, eye: &EyeIndices) -> Result<f32, DmsError> {
        let upper = self.get(eye.upper[0])?.midpoint(&self.get(eye.upper[1])?);
        let lower = self.get(eye.lower[0])?.midpoint(&self.get(eye.lower[1])?);
        let width = self.get(eye.outer)?.distance(&self.get(eye.inner)?);
        if width <= MIN_SPAN {
            return Ok(0.0);
        }
        Ok(upper.distance(&lower) / width)
    }

    /// Lip gap over mouth width; larger when the mouth opens
    pub fn mouth_open_ratio(&self) -> Result<f32, DmsError> {
        let gap = self.get(UPPER_LIP)?.distance(&self.get(LOWER_LIP)?);
        let width = self.get(MOUTH_LEFT)?.distance(&self.get(MOUTH_RIGHT)?);
        if width <= MIN_SPAN {
            return Ok(0.0);
        }
        Ok(gap / width)
    }

    pub fn mouth_center(&self) -> Result<Point, DmsError> {
        Ok(self.get(UPPER_LIP)?.midpoint(&self.get(LOWER_LIP)?))
    }

    /// Signed angle (radians) of the cheek-to-cheek line.
    /// Positive when the right cheek sits lower in the image.
    pub fn cheek_tilt(&self) -> Result<f32, DmsError> {
        let left = self.get(LEFT_CHEEK)?;
        let right = self.get(RIGHT_CHEEK)?;
        Ok((right.y - left.y).atan2(right.x - left.x))
    }

    /// Centre of the landmark bounding box
    pub fn bounding_center(&self) -> Option<Point> {
        let mut points = self.points.values();
        let first = points.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0))
    }
}

/// Pick the face to monitor: the user's selection if it is still present,
/// otherwise the face closest to the image centre.
pub fn select_target(faces: &[FaceLandmarks], selected: Option<usize>) -> Option<usize> {
    if faces.is_empty() {
        return None;
    }
    if let Some(index) = selected.filter(|&i| i < faces.len()) {
        return Some(index);
    }

    let centre = Point::new(0.5, 0.5);
    faces
        .iter()
        .enumerate()
        .filter_map(|(i, face)| face.bounding_center().map(|c| (i, c.distance(&centre))))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
        .or(Some(0))
}
