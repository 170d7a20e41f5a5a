//! Landmark detection results and the [`LandmarkSource`] trait.

use crate::{
    image::{Image, Rect},
    timer::Timer,
};

/// A point in frame pixel coordinates.
///
/// X points to the right, Y points *down*, matching the input image.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<[f32; 2]> for Point {
    #[inline]
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Point {
    #[inline]
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// A single facial landmark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Relative depth, if the network provides one. Smaller values are closer to the camera.
    pub z: Option<f32>,
    /// Name of the landmark, for the few landmarks that have one.
    pub name: Option<&'static str>,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: None,
            name: None,
        }
    }

    pub fn with_z(self, z: f32) -> Self {
        Self { z: Some(z), ..self }
    }

    pub fn with_name(self, name: &'static str) -> Self {
        Self {
            name: Some(name),
            ..self
        }
    }

    /// Returns the 2D position of this keypoint.
    #[inline]
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl From<Point> for Keypoint {
    fn from(p: Point) -> Self {
        Keypoint::new(p.x, p.y)
    }
}

/// Axis-aligned bounding box of a detected face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Computes the bounding box of a set of keypoints.
    ///
    /// Returns `None` if `keypoints` is empty.
    pub fn enclosing(keypoints: &[Keypoint]) -> Option<Self> {
        Rect::bounding(keypoints.iter().map(|kp| [kp.x, kp.y])).map(Self::from)
    }

    #[inline]
    pub fn x_max(&self) -> f32 {
        self.x_min + self.width
    }

    #[inline]
    pub fn y_max(&self) -> f32 {
        self.y_min + self.height
    }

    /// Returns the four corners, clockwise starting at the top left.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x_min, self.y_min),
            Point::new(self.x_max(), self.y_min),
            Point::new(self.x_max(), self.y_max()),
            Point::new(self.x_min, self.y_max()),
        ]
    }
}

impl From<Rect> for BoundingBox {
    fn from(rect: Rect) -> Self {
        Self {
            x_min: rect.x(),
            y_min: rect.y(),
            width: rect.width(),
            height: rect.height(),
        }
    }
}

impl From<BoundingBox> for Rect {
    fn from(bbox: BoundingBox) -> Self {
        Rect::from_top_left(bbox.x_min, bbox.y_min, bbox.width, bbox.height)
    }
}

/// One face found in a frame.
#[derive(Debug, Clone)]
pub struct Detection {
    keypoints: Vec<Keypoint>,
    bounding_box: BoundingBox,
    confidence: f32,
}

impl Detection {
    /// Creates a detection whose bounding box encloses all keypoints.
    ///
    /// An empty keypoint list results in an empty bounding box at the origin.
    pub fn new(keypoints: Vec<Keypoint>, confidence: f32) -> Self {
        let bounding_box = BoundingBox::enclosing(&keypoints).unwrap_or(BoundingBox {
            x_min: 0.0,
            y_min: 0.0,
            width: 0.0,
            height: 0.0,
        });
        Self::with_bounding_box(keypoints, bounding_box, confidence)
    }

    pub fn with_bounding_box(
        keypoints: Vec<Keypoint>,
        bounding_box: BoundingBox,
        confidence: f32,
    ) -> Self {
        Self {
            keypoints,
            bounding_box,
            confidence,
        }
    }

    #[inline]
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    /// Returns the confidence that this is an actual face, in range 0.0 to 1.0.
    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Looks up a keypoint by name.
    pub fn keypoint(&self, name: &str) -> Option<&Keypoint> {
        self.keypoints.iter().find(|kp| kp.name == Some(name))
    }
}

/// Something that finds faces and their landmarks in video frames.
///
/// Implementations are driven from a worker thread and may keep state between frames (for
/// example a tracked region of interest).
pub trait LandmarkSource: Send + 'static {
    /// Number of keypoints in every [`Detection`] returned by [`LandmarkSource::estimate_faces`].
    fn num_keypoints(&self) -> usize;

    /// Runs detection on one frame.
    ///
    /// An `Err` is transient: the caller treats it as "no faces in this frame".
    fn estimate_faces(&mut self, frame: &Image) -> anyhow::Result<Vec<Detection>>;

    /// Returns the profiling timers of this source.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_encloses_keypoints() {
        let det = Detection::new(
            vec![
                Keypoint::new(1.0, 2.0),
                Keypoint::new(5.0, 3.0).with_name("noseTip"),
                Keypoint::new(2.0, 7.0),
            ],
            0.9,
        );
        let bbox = det.bounding_box();
        assert_eq!((bbox.x_min, bbox.y_min), (1.0, 2.0));
        assert_eq!((bbox.width, bbox.height), (4.0, 5.0));
        assert_eq!(det.keypoint("noseTip").unwrap().point(), Point::new(5.0, 3.0));
        assert!(det.keypoint("chin").is_none());
    }

    #[test]
    fn corners_are_clockwise() {
        let bbox = BoundingBox {
            x_min: 0.0,
            y_min: 0.0,
            width: 2.0,
            height: 1.0,
        };
        assert_eq!(
            bbox.corners(),
            [
                Point::new(0.0, 0.0),
                Point::new(2.0, 0.0),
                Point::new(2.0, 1.0),
                Point::new(0.0, 1.0),
            ]
        );
    }
}
