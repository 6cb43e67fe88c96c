//! Spreads, their placed items and the reading order of textual items.

pub mod geometry;
pub mod item;
pub mod pasteboard;

pub use geometry::{GeometryPath, PathPoint, Point, TransformationMatrix, format_double};
pub use item::{Spread, SpreadItem, TextFlow, TextualItem};
pub use pasteboard::{PasteboardItem, VisibilityFilter, ordered_pasteboard_items, story_ids};
