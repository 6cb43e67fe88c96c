//! Spread parts and the tree of items placed on them.

use super::geometry::{GeometryPath, TransformationMatrix, geometry_paths};
use crate::common::xml::{XmlEvent, XmlReader, attribute, qname};
use crate::common::{Error, Result};
use crate::idml::markup::{Element, PROPERTIES, Properties};
use quick_xml::events::{BytesStart, Event};
use std::io::BufRead;

const NULL_ID: &str = "n";

/// Attributes shared by every placed item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemHeader {
    pub id: String,
    pub layer_id: String,
    pub visible: bool,
    pub transformation: TransformationMatrix,
}

impl ItemHeader {
    fn from_start(start: &BytesStart<'_>, active_layer_id: &str) -> Result<Self> {
        Ok(Self {
            id: attribute(start, "Self")?.unwrap_or_default(),
            layer_id: attribute(start, "ItemLayer")?.unwrap_or_else(|| active_layer_id.to_string()),
            visible: attribute(start, "Visible")?.is_none_or(|v| v != "false"),
            transformation: TransformationMatrix::from_start(start)?,
        })
    }
}

/// A story reference carried by a text frame or a text path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextFlow {
    pub story_id: Option<String>,
    pub previous_text_frame_id: Option<String>,
    pub next_text_frame_id: Option<String>,
}

impl TextFlow {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let id = |name: &str| -> Result<Option<String>> {
            Ok(attribute(start, name)?.filter(|value| value != NULL_ID))
        };
        Ok(Self {
            story_id: id("ParentStory")?,
            previous_text_frame_id: id("PreviousTextFrame")?,
            next_text_frame_id: id("NextTextFrame")?,
        })
    }
}

/// An item that may carry text: a text frame or a shape with text paths.
#[derive(Debug, Clone, PartialEq)]
pub struct TextualItem {
    pub header: ItemHeader,
    /// Set for text frames only.
    pub text_frame: Option<TextFlow>,
    pub text_paths: Vec<TextFlow>,
    /// `None` when the item has no `PathGeometry` property.
    pub geometry_paths: Option<Vec<GeometryPath>>,
}

impl TextualItem {
    /// Story ids in the order they appear on the item.
    pub fn story_ids(&self) -> impl Iterator<Item = &str> {
        self.text_frame
            .iter()
            .chain(self.text_paths.iter())
            .filter_map(|flow| flow.story_id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub header: ItemHeader,
    pub items: Vec<SpreadItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub transformation: TransformationMatrix,
    pub items: Vec<SpreadItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiState {
    pub header: ItemHeader,
    pub states: Vec<State>,
}

/// A placed item.
#[derive(Debug, Clone, PartialEq)]
pub enum SpreadItem {
    Group(Container),
    TextBox(Container),
    TextFrame(TextualItem),
    Rectangle(TextualItem),
    Oval(TextualItem),
    Polygon(TextualItem),
    GraphicLine(TextualItem),
    MultiStateObject(MultiState),
    Button(MultiState),
}

impl SpreadItem {
    pub fn header(&self) -> &ItemHeader {
        match self {
            SpreadItem::Group(c) | SpreadItem::TextBox(c) => &c.header,
            SpreadItem::TextFrame(t)
            | SpreadItem::Rectangle(t)
            | SpreadItem::Oval(t)
            | SpreadItem::Polygon(t)
            | SpreadItem::GraphicLine(t) => &t.header,
            SpreadItem::MultiStateObject(m) | SpreadItem::Button(m) => &m.header,
        }
    }
}

/// A spread or master spread with its item tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Spread {
    pub id: String,
    pub transformation: TransformationMatrix,
    pub items: Vec<SpreadItem>,
}

impl Spread {
    /// Parse a spread part. The first `Spread` or `MasterSpread` element
    /// is the spread; a part without one yields an empty spread.
    pub fn parse<R: BufRead>(reader: &mut XmlReader<R>, active_layer_id: &str) -> Result<Self> {
        loop {
            match reader.next_event()? {
                Event::Start(start) if is_spread(&start) => {
                    return Ok(Self {
                        id: attribute(&start, "Self")?.unwrap_or_default(),
                        transformation: TransformationMatrix::from_start(&start)?,
                        items: parse_items(reader, active_layer_id)?,
                    });
                },
                Event::Empty(start) if is_spread(&start) => {
                    return Ok(Self {
                        id: attribute(&start, "Self")?.unwrap_or_default(),
                        transformation: TransformationMatrix::from_start(&start)?,
                        items: Vec::new(),
                    });
                },
                Event::Eof => {
                    log::debug!("spread part without a spread element");
                    return Ok(Self {
                        id: String::new(),
                        transformation: TransformationMatrix::IDENTITY,
                        items: Vec::new(),
                    });
                },
                _ => {},
            }
        }
    }
}

fn is_spread(start: &BytesStart<'_>) -> bool {
    matches!(start.name().as_ref(), b"Spread" | b"MasterSpread")
}

/// Parse items up to the end tag of the enclosing element.
///
/// Elements that are not items are descended into, so items nested in
/// them are still found.
fn parse_items<R: BufRead>(reader: &mut XmlReader<R>, active_layer_id: &str) -> Result<Vec<SpreadItem>> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    loop {
        let event = reader.next_event()?;
        match event {
            Event::Start(ref start) | Event::Empty(ref start) => {
                let has_content = matches!(event, Event::Start(_));
                match parse_item(start, has_content, reader, active_layer_id)? {
                    Some(item) => items.push(item),
                    None if has_content => depth += 1,
                    None => {},
                }
            },
            Event::End(_) => {
                if depth == 0 {
                    return Ok(items);
                }
                depth -= 1;
            },
            Event::Eof => return Err(Error::unexpected("end of spread inside an item")),
            _ => {},
        }
    }
}

fn parse_item<R: BufRead>(
    start: &BytesStart<'_>,
    has_content: bool,
    reader: &mut XmlReader<R>,
    active_layer_id: &str,
) -> Result<Option<SpreadItem>> {
    let name = qname(start);
    let item = match name.as_str() {
        "Group" | "TextBox" => {
            let header = ItemHeader::from_start(start, active_layer_id)?;
            let items = if has_content {
                parse_items(reader, active_layer_id)?
            } else {
                Vec::new()
            };
            let container = Container { header, items };
            if name == "Group" {
                SpreadItem::Group(container)
            } else {
                SpreadItem::TextBox(container)
            }
        },
        "TextFrame" | "Rectangle" | "Oval" | "Polygon" | "GraphicLine" => {
            let mut textual = parse_textual(start, has_content, reader, active_layer_id)?;
            match name.as_str() {
                "TextFrame" => {
                    textual.text_frame = Some(TextFlow::from_start(start)?);
                    SpreadItem::TextFrame(textual)
                },
                "Rectangle" => SpreadItem::Rectangle(textual),
                "Oval" => SpreadItem::Oval(textual),
                "Polygon" => SpreadItem::Polygon(textual),
                _ => SpreadItem::GraphicLine(textual),
            }
        },
        "MultiStateObject" | "Button" => {
            let header = ItemHeader::from_start(start, active_layer_id)?;
            let states = if has_content {
                parse_states(reader, active_layer_id)?
            } else {
                Vec::new()
            };
            let multi_state = MultiState { header, states };
            if name == "Button" {
                SpreadItem::Button(multi_state)
            } else {
                SpreadItem::MultiStateObject(multi_state)
            }
        },
        _ => return Ok(None),
    };
    Ok(Some(item))
}

fn parse_textual<R: BufRead>(
    start: &BytesStart<'_>,
    has_content: bool,
    reader: &mut XmlReader<R>,
    active_layer_id: &str,
) -> Result<TextualItem> {
    let mut item = TextualItem {
        header: ItemHeader::from_start(start, active_layer_id)?,
        text_frame: None,
        text_paths: Vec::new(),
        geometry_paths: None,
    };
    if !has_content {
        return Ok(item);
    }
    let mut depth = 0usize;
    loop {
        let event: XmlEvent = reader.next_event()?;
        match &event {
            Event::Start(child) | Event::Empty(child) if child.name().as_ref() == PROPERTIES.as_bytes() => {
                let properties = Properties::read(event, reader)?;
                for property in properties.properties() {
                    if let Some(paths) = geometry_paths(property.element())? {
                        item.geometry_paths.get_or_insert_with(Vec::new).extend(paths);
                    }
                }
            },
            Event::Start(child) | Event::Empty(child) if child.name().as_ref() == b"TextPath" => {
                item.text_paths.push(TextFlow::from_start(child)?);
                Element::read(event, reader)?;
            },
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                if depth == 0 {
                    return Ok(item);
                }
                depth -= 1;
            },
            Event::Eof => return Err(Error::unexpected("end of spread inside a textual item")),
            _ => {},
        }
    }
}

fn parse_states<R: BufRead>(reader: &mut XmlReader<R>, active_layer_id: &str) -> Result<Vec<State>> {
    let mut states = Vec::new();
    let mut depth = 0usize;
    loop {
        match reader.next_event()? {
            Event::Start(start) if start.name().as_ref() == b"State" => states.push(State {
                transformation: TransformationMatrix::from_start(&start)?,
                items: parse_items(reader, active_layer_id)?,
            }),
            Event::Empty(start) if start.name().as_ref() == b"State" => states.push(State {
                transformation: TransformationMatrix::from_start(&start)?,
                items: Vec::new(),
            }),
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                if depth == 0 {
                    return Ok(states);
                }
                depth -= 1;
            },
            Event::Eof => return Err(Error::unexpected("end of spread inside a multi-state object")),
            _ => {},
        }
    }
}
