//! Coordinate normalization between pixel space and unit space.
//!
//! # Why normalize? (for beginners)
//!
//! Two participants rarely look at the canvas through windows of the same
//! size.  If the host draws a line at pixel `(960, 540)` on a 1920×1080
//! canvas and a joiner's canvas is only 1280×720, sending raw pixels would
//! place the line in the wrong spot.  Instead every point that leaves a peer
//! is divided by the sender's canvas size, producing a value in `[0, 1]`.
//! The receiver multiplies by *its own* canvas size:
//!
//! ```text
//! sender  (1920×1080):  (960, 540)  ──normalize──►  (0.5, 0.5)
//! receiver(1280× 720):  (0.5, 0.5)  ─denormalize─►  (640, 360)
//! ```
//!
//! # Legacy pixel values
//!
//! Older peers sent raw pixels.  A component greater than `1.0` cannot be a
//! normalized coordinate, so in viewport mode it is passed through unchanged.
//! The infinite canvas has no such rule: its reference frame is identical on
//! every peer and values beyond the frame are legitimate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A 2-D point.  Pixel space or unit space depending on context.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Errors raised when constructing a [`Frame`].
#[derive(Debug, Error, PartialEq)]
pub enum CoordinateError {
    #[error("frame dimensions must be positive and finite, got {width}x{height}")]
    InvalidFrame { width: f64, height: f64 },
}

/// The pixel dimensions a set of coordinates is measured against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    width: f64,
    height: f64,
}

impl Frame {
    /// Default reference frame for the infinite canvas.
    pub const REFERENCE: Frame = Frame {
        width: 1920.0,
        height: 1080.0,
    };

    /// Creates a frame.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError::InvalidFrame`] if either dimension is zero,
    /// negative, NaN, or infinite.
    pub fn new(width: f64, height: f64) -> Result<Self, CoordinateError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(width) || !valid(height) {
            return Err(CoordinateError::InvalidFrame { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

/// Maps a pixel point into unit space relative to `frame`.
pub fn normalize(point: Point, frame: Frame) -> Point {
    Point::new(point.x / frame.width, point.y / frame.height)
}

/// Maps a unit-space point back into pixels relative to `frame`.
pub fn denormalize(point: Point, frame: Frame) -> Point {
    Point::new(point.x * frame.width, point.y * frame.height)
}

/// How a peer measures coordinates it puts on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanvasSpace {
    /// Relative to the peer's current canvas size.
    Viewport(Frame),
    /// Relative to a fixed frame shared by every peer.
    Infinite(Frame),
}

impl Default for CanvasSpace {
    fn default() -> Self {
        Self::Viewport(Frame::REFERENCE)
    }
}

impl CanvasSpace {
    /// The frame points are scaled against.
    pub fn frame(&self) -> Frame {
        match self {
            Self::Viewport(frame) | Self::Infinite(frame) => *frame,
        }
    }

    /// Outbound conversion: local pixels to wire coordinates.
    pub fn to_wire(&self, point: Point) -> Point {
        normalize(point, self.frame())
    }

    /// Inbound conversion: wire coordinates to local pixels.
    ///
    /// In viewport mode each component above `1.0` is treated as a legacy
    /// pixel value and kept as-is.
    pub fn from_wire(&self, point: Point) -> Point {
        match self {
            Self::Viewport(frame) => Point::new(
                scale_or_pass(point.x, frame.width),
                scale_or_pass(point.y, frame.height),
            ),
            Self::Infinite(frame) => denormalize(point, *frame),
        }
    }

    /// Replaces the frame, keeping the mode.
    pub fn with_frame(self, frame: Frame) -> Self {
        match self {
            Self::Viewport(_) => Self::Viewport(frame),
            Self::Infinite(_) => Self::Infinite(frame),
        }
    }
}

fn scale_or_pass(value: f64, dimension: f64) -> f64 {
    if value > 1.0 {
        value
    } else {
        value * dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn test_frame_rejects_zero_width() {
        assert_eq!(
            Frame::new(0.0, 100.0),
            Err(CoordinateError::InvalidFrame {
                width: 0.0,
                height: 100.0
            })
        );
    }

    #[test]
    fn test_frame_rejects_nan_and_infinite() {
        assert!(Frame::new(f64::NAN, 10.0).is_err());
        assert!(Frame::new(10.0, f64::INFINITY).is_err());
        assert!(Frame::new(-5.0, 10.0).is_err());
    }

    #[test]
    fn test_normalize_center_of_frame() {
        // Arrange
        let frame = Frame::new(1920.0, 1080.0).unwrap();

        // Act
        let n = normalize(Point::new(960.0, 540.0), frame);

        // Assert
        assert!(approx(n, Point::new(0.5, 0.5)));
    }

    #[test]
    fn test_round_trip_across_many_frames() {
        let frames = [(1.0, 1.0), (800.0, 600.0), (1920.0, 1080.0), (3840.0, 2160.0), (333.3, 97.1)];
        for (w, h) in frames {
            let frame = Frame::new(w, h).unwrap();
            for i in 0..=10 {
                let p = Point::new(w * i as f64 / 10.0, h * (10 - i) as f64 / 10.0);
                let back = denormalize(normalize(p, frame), frame);
                assert!(
                    (back.x - p.x).abs() < 1e-6 && (back.y - p.y).abs() < 1e-6,
                    "round trip drifted for {p:?} in {w}x{h}"
                );
            }
        }
    }

    #[test]
    fn test_receiver_scales_to_own_frame() {
        // Arrange
        let sender = CanvasSpace::Viewport(Frame::new(1920.0, 1080.0).unwrap());
        let receiver = CanvasSpace::Viewport(Frame::new(1280.0, 720.0).unwrap());

        // Act
        let wire = sender.to_wire(Point::new(960.0, 540.0));
        let local = receiver.from_wire(wire);

        // Assert
        assert!(approx(local, Point::new(640.0, 360.0)));
    }

    #[test]
    fn test_viewport_passes_legacy_pixels_through() {
        // Arrange
        let space = CanvasSpace::Viewport(Frame::new(1000.0, 500.0).unwrap());

        // Act – x is a legacy pixel value, y is normalized
        let local = space.from_wire(Point::new(250.0, 0.5));

        // Assert
        assert!(approx(local, Point::new(250.0, 250.0)));
    }

    #[test]
    fn test_exactly_one_is_still_normalized() {
        let space = CanvasSpace::Viewport(Frame::new(1000.0, 500.0).unwrap());
        assert!(approx(space.from_wire(Point::new(1.0, 1.0)), Point::new(1000.0, 500.0)));
    }

    #[test]
    fn test_infinite_canvas_scales_values_beyond_frame() {
        // Arrange
        let space = CanvasSpace::Infinite(Frame::REFERENCE);

        // Act
        let local = space.from_wire(Point::new(2.0, -0.5));

        // Assert
        assert!(approx(local, Point::new(3840.0, -540.0)));
    }

    #[test]
    fn test_with_frame_keeps_mode() {
        let frame = Frame::new(10.0, 20.0).unwrap();
        assert_eq!(
            CanvasSpace::Infinite(Frame::REFERENCE).with_frame(frame),
            CanvasSpace::Infinite(frame)
        );
        assert_eq!(CanvasSpace::default().with_frame(frame), CanvasSpace::Viewport(frame));
    }
}
