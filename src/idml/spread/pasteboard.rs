//! Pasteboard items: textual items placed at absolute coordinates, their
//! reading order and visibility.

use super::geometry::{GeometryPath, Point, TransformationMatrix};
use super::item::{Spread, SpreadItem, TextualItem};
use crate::common::{Error, Result};
use crate::idml::core::design_map::Layer;
use crate::idml::core::preferences::StoryDirection;
use std::cmp::Ordering;

/// A textual item with its anchor points in pasteboard coordinates.
#[derive(Debug, Clone)]
pub struct PasteboardItem<'a> {
    pub item: &'a TextualItem,
    pub anchor_points: Vec<Point>,
}

impl<'a> PasteboardItem<'a> {
    fn new(item: &'a TextualItem, matrices: &[TransformationMatrix]) -> Self {
        let square;
        let paths: &[GeometryPath] = match &item.geometry_paths {
            Some(paths) => paths,
            None => {
                square = [GeometryPath::default_square()];
                &square
            },
        };
        let anchor_points = paths
            .iter()
            .flat_map(|path| path.path_points.iter())
            .map(|point| point.anchor.transformed_with(matrices))
            .collect();
        Self { item, anchor_points }
    }

    pub fn min_anchor_point(&self, direction: StoryDirection) -> Option<&Point> {
        self.anchor_points.iter().min_by(|a, b| a.compare(b, direction))
    }

    /// Reading order: items without anchors first, then by the minimum
    /// anchor's y, then by its x in the story direction.
    pub fn compare(&self, other: &Self, direction: StoryDirection) -> Ordering {
        match (self.min_anchor_point(direction), other.min_anchor_point(direction)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.y.total_cmp(&b.y).then_with(|| match direction {
                StoryDirection::LeftToRight => a.x.total_cmp(&b.x),
                StoryDirection::RightToLeft => b.x.total_cmp(&a.x),
            }),
        }
    }
}

/// Collect the pasteboard items of a spread in document order.
pub fn pasteboard_items(spread: &Spread) -> Vec<PasteboardItem<'_>> {
    let mut out = Vec::new();
    let mut matrices = vec![spread.transformation];
    collect(&spread.items, &mut matrices, &mut out);
    out
}

fn collect<'a>(items: &'a [SpreadItem], matrices: &mut Vec<TransformationMatrix>, out: &mut Vec<PasteboardItem<'a>>) {
    for item in items {
        matrices.push(item.header().transformation);
        match item {
            SpreadItem::Group(container) | SpreadItem::TextBox(container) => {
                collect(&container.items, matrices, out);
            },
            SpreadItem::TextFrame(textual)
            | SpreadItem::Rectangle(textual)
            | SpreadItem::Oval(textual)
            | SpreadItem::Polygon(textual)
            | SpreadItem::GraphicLine(textual) => {
                out.push(PasteboardItem::new(textual, matrices));
            },
            SpreadItem::MultiStateObject(multi_state) | SpreadItem::Button(multi_state) => {
                for state in &multi_state.states {
                    matrices.push(state.transformation);
                    collect(&state.items, matrices, out);
                    matrices.pop();
                }
            },
        }
        matrices.pop();
    }
}

/// Pasteboard items of a spread in reading order.
pub fn ordered_pasteboard_items(spread: &Spread, direction: StoryDirection) -> Vec<PasteboardItem<'_>> {
    let mut items = pasteboard_items(spread);
    items.sort_by(|a, b| a.compare(b, direction));
    items
}

/// Splits pasteboard items by layer and item visibility.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityFilter<'l> {
    layers: &'l [Layer],
    extract_hidden_layers: bool,
    extract_hidden_pasteboard_items: bool,
}

impl<'l> VisibilityFilter<'l> {
    pub fn new(layers: &'l [Layer], extract_hidden_layers: bool, extract_hidden_pasteboard_items: bool) -> Self {
        Self {
            layers,
            extract_hidden_layers,
            extract_hidden_pasteboard_items,
        }
    }

    pub fn is_visible(&self, item: &PasteboardItem<'_>) -> Result<bool> {
        let header = &item.item.header;
        let layer = self
            .layers
            .iter()
            .find(|layer| layer.id == header.layer_id)
            .ok_or_else(|| Error::Referential(format!("Layer does not exist: {}", header.layer_id)))?;
        Ok((self.extract_hidden_layers || layer.visible) && (self.extract_hidden_pasteboard_items || header.visible))
    }

    /// Returns `(visible, invisible)`, both keeping the input order.
    pub fn split<'a>(&self, items: Vec<PasteboardItem<'a>>) -> Result<(Vec<PasteboardItem<'a>>, Vec<PasteboardItem<'a>>)> {
        let mut visible = Vec::with_capacity(items.len());
        let mut invisible = Vec::new();
        for item in items {
            if self.is_visible(&item)? {
                visible.push(item);
            } else {
                invisible.push(item);
            }
        }
        Ok((visible, invisible))
    }
}

/// Story ids referenced by the items, first occurrence wins.
pub fn story_ids(items: &[PasteboardItem<'_>]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in items.iter().flat_map(|item| item.item.story_ids()) {
        if !ids.iter().any(|known| known == id) {
            ids.push(id.to_string());
        }
    }
    ids
}
