//! Annotation elements: strokes, shapes, text, stickers, and groups.
//!
//! An [`AnnotationElement`] is the unit of replication.  Its `id` is assigned
//! once by the originating peer and never changes; everything else (geometry,
//! style, rotation) may be patched in place.
//!
//! # Groups
//!
//! A group stores its children relative to its own bounding box: a child
//! point `(u, v)` means "`u` of the way across the box and `v` of the way
//! down".  Moving or resizing a group only rewrites the group's `start`/`end`;
//! absolute child positions are derived from the box every time they are
//! needed, so repeated resizes cannot accumulate drift.

use serde::{Deserialize, Serialize};

use super::coords::Point;

/// Identifier of an element, unique per originating peer.
pub type ElementId = String;

/// The drawing tool that produced an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Pencil,
    Eraser,
    Rect,
    Circle,
    Ellipse,
    Line,
    Arrow,
    Triangle,
    Diamond,
    Star,
    Pentagon,
    Hexagon,
    Octagon,
    Text,
    Sticker,
    Group,
}

impl Tool {
    /// Freehand tools accumulate a point sequence; all others track `end`.
    pub fn is_freehand(self) -> bool {
        matches!(self, Tool::Pencil | Tool::Eraser)
    }
}

/// Stroke and fill styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    pub color: String,
    pub width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(default)]
    pub filled: bool,
}

impl Style {
    /// An unfilled stroke style.
    pub fn stroke(color: impl Into<String>, width: f64) -> Self {
        Self {
            color: color.into(),
            width,
            fill_color: None,
            filled: false,
        }
    }
}

impl Default for Style {
    fn default() -> Self {
        Self::stroke("#000000", 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationElement {
    pub id: ElementId,
    #[serde(rename = "type")]
    pub tool: Tool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Point>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Point>,
    #[serde(flatten)]
    pub style: Style,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub rotation: f64,
    /// Text or sticker content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Group members, in box-relative unit coordinates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AnnotationElement>,
}

impl AnnotationElement {
    /// Starts a new element at `at`, marked active.
    pub fn begin(id: impl Into<ElementId>, tool: Tool, style: Style, at: Point) -> Self {
        Self {
            id: id.into(),
            tool,
            start: Some(at),
            end: Some(at),
            points: if tool.is_freehand() { vec![at] } else { Vec::new() },
            style,
            is_active: true,
            rotation: 0.0,
            text: None,
            children: Vec::new(),
        }
    }

    /// Extends the geometry: freehand tools append, shapes move `end`.
    pub fn extend(&mut self, point: Point) {
        if self.tool.is_freehand() {
            self.points.push(point);
        } else {
            self.end = Some(point);
        }
    }

    /// Returns a copy with every absolute point passed through `f`.
    ///
    /// Group children are box-relative and are left untouched.
    pub fn map_points(&self, f: impl Fn(Point) -> Point) -> Self {
        let mut out = self.clone();
        out.start = self.start.map(&f);
        out.end = self.end.map(&f);
        out.points = self.points.iter().copied().map(&f).collect();
        out
    }

    /// Axis-aligned bounds over `start`, `end`, and `points`.
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let mut all = self
            .start
            .iter()
            .chain(self.end.iter())
            .chain(self.points.iter());
        let first = *all.next()?;
        Some(all.fold((first, first), |(min, max), p| {
            (
                Point::new(min.x.min(p.x), min.y.min(p.y)),
                Point::new(max.x.max(p.x), max.y.max(p.y)),
            )
        }))
    }

    /// Builds a group around `members`.
    ///
    /// Returns `None` if no member has geometry.
    pub fn group(id: impl Into<ElementId>, members: Vec<AnnotationElement>) -> Option<Self> {
        let (min, max) = members
            .iter()
            .filter_map(AnnotationElement::bounds)
            .reduce(|(a_min, a_max), (b_min, b_max)| {
                (
                    Point::new(a_min.x.min(b_min.x), a_min.y.min(b_min.y)),
                    Point::new(a_max.x.max(b_max.x), a_max.y.max(b_max.y)),
                )
            })?;
        let size = box_size(min, max);
        let children = members
            .into_iter()
            .map(|mut m| {
                m.is_active = false;
                m.map_points(|p| Point::new((p.x - min.x) / size.x, (p.y - min.y) / size.y))
            })
            .collect();
        Some(Self {
            id: id.into(),
            tool: Tool::Group,
            start: Some(min),
            end: Some(max),
            points: Vec::new(),
            style: Style::default(),
            is_active: false,
            rotation: 0.0,
            text: None,
            children,
        })
    }

    /// Derives the absolute geometry of each child from the current box.
    ///
    /// Empty for anything that is not a group.
    pub fn group_members(&self) -> Vec<AnnotationElement> {
        let (Some(min), Some(max)) = (self.start, self.end) else {
            return Vec::new();
        };
        if self.tool != Tool::Group {
            return Vec::new();
        }
        let size = box_size(min, max);
        self.children
            .iter()
            .map(|c| c.map_points(|p| Point::new(min.x + p.x * size.x, min.y + p.y * size.y)))
            .collect()
    }

    /// Applies every field present in `patch`.
    pub fn apply_patch(&mut self, patch: &ElementPatch) {
        if let Some(start) = patch.start {
            self.start = Some(start);
        }
        if let Some(end) = patch.end {
            self.end = Some(end);
        }
        if let Some(points) = &patch.points {
            self.points = points.clone();
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }
        if let Some(width) = patch.width {
            self.style.width = width;
        }
        if let Some(color) = &patch.color {
            self.style.color = color.clone();
        }
        if let Some(text) = &patch.text {
            self.text = Some(text.clone());
        }
        if let Some(children) = &patch.children {
            self.children = children.clone();
        }
    }
}

// Degenerate boxes (a single point, a horizontal line) get a unit extent so
// box-relative math never divides by zero.
fn box_size(min: Point, max: Point) -> Point {
    let w = max.x - min.x;
    let h = max.y - min.y;
    Point::new(if w > 0.0 { w } else { 1.0 }, if h > 0.0 { h } else { 1.0 })
}

/// A partial element used by `ELEMENT_UPDATE`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<AnnotationElement>>,
}

impl ElementPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The fields of `after` that differ from `before`.
    pub fn diff(before: &AnnotationElement, after: &AnnotationElement) -> Self {
        fn changed<T: PartialEq + Clone>(a: &T, b: &T) -> Option<T> {
            (a != b).then(|| b.clone())
        }
        Self {
            start: changed(&before.start, &after.start).flatten(),
            end: changed(&before.end, &after.end).flatten(),
            points: changed(&before.points, &after.points),
            rotation: changed(&before.rotation, &after.rotation),
            width: changed(&before.style.width, &after.style.width),
            color: changed(&before.style.color, &after.style.color),
            text: changed(&before.text, &after.text).flatten(),
            children: changed(&before.children, &after.children),
        }
    }

    /// Returns a copy with absolute points passed through `f`.
    pub fn map_points(&self, f: impl Fn(Point) -> Point) -> Self {
        let mut out = self.clone();
        out.start = self.start.map(&f);
        out.end = self.end.map(&f);
        out.points = self
            .points
            .as_ref()
            .map(|pts| pts.iter().copied().map(&f).collect());
        out
    }
}
