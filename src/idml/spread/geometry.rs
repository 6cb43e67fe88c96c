//! Points, path geometry and item transformations.

use crate::common::xml::{XmlEvent, attribute, qname};
use crate::common::{Error, Result};
use crate::idml::markup::Element;
use quick_xml::events::{BytesStart, Event};
use std::cmp::Ordering;
use std::fmt;

use crate::idml::core::preferences::StoryDirection;

const PATH_GEOMETRY: &str = "PathGeometry";
const GEOMETRY_PATH_TYPE: &str = "GeometryPathType";
const PATH_POINT_TYPE: &str = "PathPointType";

/// Half side of the square substituted for items without geometry.
const DEFAULT_COORDINATE: f64 = 5.0;

fn parse_number(s: &str, context: &str) -> Result<f64> {
    fast_float2::parse::<f64, _>(s.trim())
        .map_err(|_| Error::BadInput(format!("invalid number \"{}\" in {}", s, context)))
}

/// Format a double the way the IDML writer does: the shortest decimal that
/// round-trips, always with a fractional part, and scientific notation
/// (`1.0E7`, `1.5E-4`) outside `[1e-3, 1e7)`.
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let sign = if value.is_sign_negative() { "-" } else { "" };
    if value == 0.0 {
        return format!("{}0.0", sign);
    }

    let mut buffer = ryu::Buffer::new();
    let shortest = buffer.format_finite(value.abs());
    let (mantissa, exponent) = match shortest.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (shortest, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let mut digits: String = format!("{}{}", int_part, frac_part);
    let mut point = int_part.len() as i32 + exponent;
    let leading = digits.len() - digits.trim_start_matches('0').len();
    digits.drain(..leading);
    point -= leading as i32;
    let trimmed = digits.trim_end_matches('0').len();
    digits.truncate(trimmed.max(1));

    let abs = value.abs();
    let mut out = String::with_capacity(digits.len() + 8);
    out.push_str(sign);
    if (1e-3..1e7).contains(&abs) {
        if point <= 0 {
            out.push_str("0.");
            out.extend(std::iter::repeat_n('0', (-point) as usize));
            out.push_str(&digits);
        } else if point as usize >= digits.len() {
            out.push_str(&digits);
            out.extend(std::iter::repeat_n('0', point as usize - digits.len()));
            out.push_str(".0");
        } else {
            let (int, frac) = digits.split_at(point as usize);
            out.push_str(int);
            out.push('.');
            out.push_str(frac);
        }
    } else {
        let (first, rest) = digits.split_at(1);
        out.push_str(first);
        out.push('.');
        out.push_str(if rest.is_empty() { "0" } else { rest });
        out.push('E');
        out.push_str(itoa::Buffer::new().format(point - 1));
    }
    out
}

/// A point on the pasteboard.
///
/// A point read from the source remembers its attribute text so that it
/// serializes back unchanged.
#[derive(Debug, Clone)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    source: Option<String>,
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, source: None }
    }

    /// Parse an `"x y"` attribute value.
    pub fn parse(value: &str) -> Result<Self> {
        let mut parts = value.split_whitespace();
        let (Some(x), Some(y)) = (parts.next(), parts.next()) else {
            return Err(Error::BadInput(format!("invalid point \"{}\"", value)));
        };
        Ok(Self {
            x: parse_number(x, "point")?,
            y: parse_number(y, "point")?,
            source: Some(value.to_string()),
        })
    }

    /// Map the point through a matrix stack, bottom of the stack first.
    pub fn transformed_with(&self, matrices: &[TransformationMatrix]) -> Self {
        matrices
            .iter()
            .fold(Point::new(self.x, self.y), |p, m| m.apply(&p))
    }

    /// Order of points used to pick an item's minimum anchor.
    pub fn compare(&self, other: &Point, direction: StoryDirection) -> Ordering {
        match direction {
            StoryDirection::LeftToRight => self.x.total_cmp(&other.x).then(self.y.total_cmp(&other.y)),
            StoryDirection::RightToLeft => other.x.total_cmp(&self.x).then(other.y.total_cmp(&self.y)),
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => f.write_str(source),
            None => write!(f, "{} {}", format_double(self.x), format_double(self.y)),
        }
    }
}

/// An affine transformation `a b c d tx ty`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformationMatrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for TransformationMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl TransformationMatrix {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Parse an `ItemTransform` value.
    pub fn parse(value: &str) -> Result<Self> {
        let numbers = value
            .split_whitespace()
            .map(|n| parse_number(n, "ItemTransform"))
            .collect::<Result<Vec<f64>>>()?;
        match numbers[..] {
            [a, b, c, d, tx, ty] => Ok(Self { a, b, c, d, tx, ty }),
            _ => Err(Error::BadInput(format!("invalid ItemTransform \"{}\"", value))),
        }
    }

    /// Read the `ItemTransform` attribute, identity when absent.
    pub fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        match attribute(start, "ItemTransform")? {
            Some(value) => Self::parse(&value),
            None => Ok(Self::IDENTITY),
        }
    }

    pub fn apply(&self, p: &Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }
}

/// A path point with its anchor and direction handles.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPoint {
    pub anchor: Point,
    pub left_direction: Point,
    pub right_direction: Point,
}

impl PathPoint {
    /// A corner point whose handles coincide with the anchor.
    pub fn corner(x: f64, y: f64) -> Self {
        Self {
            anchor: Point::new(x, y),
            left_direction: Point::new(x, y),
            right_direction: Point::new(x, y),
        }
    }

    pub fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let point = |name: &str| -> Result<Point> {
            let value = attribute(start, name)?
                .ok_or_else(|| Error::unexpected(format!("PathPointType without {}", name)))?;
            Point::parse(&value)
        };
        Ok(Self {
            anchor: point("Anchor")?,
            left_direction: point("LeftDirection")?,
            right_direction: point("RightDirection")?,
        })
    }

    /// Serialize as a `PathPointType` element.
    pub fn to_event(&self) -> XmlEvent {
        let mut start = BytesStart::new(PATH_POINT_TYPE);
        start.push_attribute(("Anchor", self.anchor.to_string().as_str()));
        start.push_attribute(("LeftDirection", self.left_direction.to_string().as_str()));
        start.push_attribute(("RightDirection", self.right_direction.to_string().as_str()));
        Event::Empty(start)
    }
}

/// One `GeometryPathType`: an ordered list of path points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryPath {
    pub path_points: Vec<PathPoint>,
}

impl GeometryPath {
    /// The square centered at the origin used when an item has no geometry.
    pub fn default_square() -> Self {
        let c = DEFAULT_COORDINATE;
        Self {
            path_points: vec![
                PathPoint::corner(-c, -c),
                PathPoint::corner(-c, c),
                PathPoint::corner(c, c),
                PathPoint::corner(c, -c),
            ],
        }
    }
}

/// Extract geometry paths from a `PathGeometry` property element.
///
/// Returns `None` when the element is some other property.
pub fn geometry_paths(element: &Element) -> Result<Option<Vec<GeometryPath>>> {
    if !element.is_named(PATH_GEOMETRY) {
        return Ok(None);
    }
    let mut paths: Vec<GeometryPath> = Vec::new();
    for event in &element.inner {
        if let Event::Start(start) | Event::Empty(start) = event {
            match qname(start).as_str() {
                GEOMETRY_PATH_TYPE => paths.push(GeometryPath::default()),
                PATH_POINT_TYPE => {
                    let point = PathPoint::from_start(start)?;
                    match paths.last_mut() {
                        Some(path) => path.path_points.push(point),
                        None => paths.push(GeometryPath { path_points: vec![point] }),
                    }
                },
                _ => {},
            }
        }
    }
    Ok(Some(paths))
}
