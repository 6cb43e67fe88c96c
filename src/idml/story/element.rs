//! The elements a story is made of.

use super::style_range::{RangeFontMapper, StyleRanges};
use super::writer::StoryChildElementsWriter;
use crate::common::xml::XmlEvent;
use crate::idml::markup::{Element, Properties};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use std::rc::Rc;

pub const CONTENT: &str = "Content";
pub const BREAK: &str = "Br";
pub const HYPERLINK_TEXT_SOURCE: &str = "HyperlinkTextSource";
pub const FOOTNOTE: &str = "Footnote";
pub const NOTE: &str = "Note";
pub const TABLE: &str = "Table";
pub const CELL: &str = "Cell";
pub const ROW: &str = "Row";
pub const COLUMN: &str = "Column";
pub const CHANGE: &str = "Change";
pub const XML_ELEMENT: &str = "XMLElement";
pub const XML_ATTRIBUTE: &str = "XMLAttribute";
pub const XML_COMMENT: &str = "XMLComment";
pub const XML_INSTRUCTION: &str = "XMLInstruction";

/// A preserved element together with the ranges it sits in.
#[derive(Debug, Clone, PartialEq)]
pub struct StyledElement {
    pub element: Element,
    pub style_ranges: StyleRanges,
}

impl StyledElement {
    pub fn new(element: Element, style_ranges: StyleRanges) -> Self {
        Self { element, style_ranges }
    }
}

/// An element whose content is itself a list of story elements.
///
/// Cells carry no style ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceElement {
    pub start: BytesStart<'static>,
    pub properties: Option<Properties>,
    pub children: Vec<StoryChildElement>,
    pub end: Option<BytesEnd<'static>>,
    pub style_ranges: Option<StyleRanges>,
}

impl ReferenceElement {
    pub fn new(start: BytesStart<'static>, style_ranges: Option<StyleRanges>) -> Self {
        Self {
            start,
            properties: None,
            children: Vec::new(),
            end: None,
            style_ranges,
        }
    }

    /// A copy with other children, keeping tags and properties.
    pub fn with_children(&self, children: Vec<StoryChildElement>) -> Self {
        Self {
            start: self.start.clone(),
            properties: self.properties.clone(),
            children,
            end: self.end.clone(),
            style_ranges: self.style_ranges.clone(),
        }
    }

    /// Whether every styled child sits in this element's own ranges.
    fn children_share_ranges(&self) -> bool {
        let Some(own) = &self.style_ranges else {
            return false;
        };
        self.children.iter().all(|child| {
            child
                .style_ranges()
                .is_none_or(|r| Rc::ptr_eq(&r.paragraph, &own.paragraph) && Rc::ptr_eq(&r.character, &own.character))
        })
    }

    fn is_bare(&self) -> bool {
        self.end.is_none() && self.properties.is_none() && self.children.is_empty()
    }

    fn write_start(&self, out: &mut Vec<XmlEvent>) {
        if self.is_bare() {
            out.push(Event::Empty(self.start.clone()));
        } else {
            out.push(Event::Start(self.start.clone()));
        }
    }

    fn write_end(&self, out: &mut Vec<XmlEvent>) {
        if self.is_bare() {
            return;
        }
        let end = match &self.end {
            Some(end) => end.clone(),
            None => self.start.to_end().into_owned(),
        };
        out.push(Event::End(end));
    }

    /// Start tag, properties, children through a fresh writer, the closing
    /// ranges when the last child is styled, end tag.
    fn write_events(&self, out: &mut Vec<XmlEvent>) {
        self.write_start(out);
        if let Some(properties) = &self.properties {
            properties.write_events(out);
        }
        let mut writer = StoryChildElementsWriter::new();
        writer.write(&self.children, out);
        writer.close(&self.children, out);
        self.write_end(out);
    }

    fn with_font_mappings(&self, mapper: &mut RangeFontMapper<'_>) -> Self {
        Self {
            start: self.start.clone(),
            properties: self.properties.clone(),
            children: self.children.iter().map(|c| c.with_font_mappings(mapper)).collect(),
            end: self.end.clone(),
            style_ranges: self.style_ranges.as_ref().map(|r| r.with_font_mappings(mapper)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub start: BytesStart<'static>,
    pub properties: Option<Properties>,
    /// `Row` and `Column` elements in source order.
    pub markup: Vec<Element>,
    pub cells: Vec<ReferenceElement>,
    pub end: Option<BytesEnd<'static>>,
    pub style_ranges: StyleRanges,
}

impl Table {
    pub fn new(start: BytesStart<'static>, style_ranges: StyleRanges) -> Self {
        Self {
            start,
            properties: None,
            markup: Vec::new(),
            cells: Vec::new(),
            end: None,
            style_ranges,
        }
    }

    pub fn with_cells(&self, cells: Vec<ReferenceElement>) -> Self {
        Self {
            cells,
            ..self.clone()
        }
    }

    fn write_events(&self, out: &mut Vec<XmlEvent>) {
        out.push(Event::Start(self.start.clone()));
        if let Some(properties) = &self.properties {
            properties.write_events(out);
        }
        for element in &self.markup {
            element.write_events(out);
        }
        for cell in &self.cells {
            cell.write_events(out);
        }
        let end = match &self.end {
            Some(end) => end.clone(),
            None => self.start.to_end().into_owned(),
        };
        out.push(Event::End(end));
    }
}

/// One child of a story or of a reference element.
#[derive(Debug, Clone, PartialEq)]
pub enum StoryChildElement {
    /// An element outside any style range, kept verbatim.
    Markup(Element),
    Content(StyledElement),
    Break(StyledElement),
    /// Any other element inside a character range.
    Styled(StyledElement),
    HyperlinkTextSource(ReferenceElement),
    Footnote(ReferenceElement),
    Note(ReferenceElement),
    Table(Table),
}

impl StoryChildElement {
    pub fn style_ranges(&self) -> Option<&StyleRanges> {
        match self {
            Self::Markup(_) => None,
            Self::Content(e) | Self::Break(e) | Self::Styled(e) => Some(&e.style_ranges),
            Self::HyperlinkTextSource(r) | Self::Footnote(r) | Self::Note(r) => r.style_ranges.as_ref(),
            Self::Table(t) => Some(&t.style_ranges),
        }
    }

    /// Whether the writer keeps this element inside style ranges.
    pub fn is_styled(&self) -> bool {
        !matches!(self, Self::Markup(_))
    }

    pub fn is_content(&self) -> bool {
        matches!(self, Self::Content(_))
    }

    /// A copy sitting in other style ranges.
    pub fn with_style_ranges(&self, style_ranges: StyleRanges) -> Self {
        match self {
            Self::Markup(_) => self.clone(),
            Self::Content(e) => Self::Content(StyledElement::new(e.element.clone(), style_ranges)),
            Self::Break(e) => Self::Break(StyledElement::new(e.element.clone(), style_ranges)),
            Self::Styled(e) => Self::Styled(StyledElement::new(e.element.clone(), style_ranges)),
            Self::HyperlinkTextSource(r) => Self::HyperlinkTextSource(ReferenceElement {
                style_ranges: Some(style_ranges),
                ..r.clone()
            }),
            Self::Footnote(r) => Self::Footnote(ReferenceElement {
                style_ranges: Some(style_ranges),
                ..r.clone()
            }),
            Self::Note(r) => Self::Note(ReferenceElement {
                style_ranges: Some(style_ranges),
                ..r.clone()
            }),
            Self::Table(t) => Self::Table(Table {
                style_ranges,
                ..t.clone()
            }),
        }
    }

    /// A copy of a hyperlink, footnote or note with other children.
    pub fn with_children(&self, children: Vec<StoryChildElement>) -> Self {
        match self {
            Self::HyperlinkTextSource(r) => Self::HyperlinkTextSource(r.with_children(children)),
            Self::Footnote(r) => Self::Footnote(r.with_children(children)),
            Self::Note(r) => Self::Note(r.with_children(children)),
            _ => self.clone(),
        }
    }

    /// The element's own markup, without surrounding style ranges.
    pub fn write_events(&self, out: &mut Vec<XmlEvent>) {
        match self {
            Self::Markup(element) => element.write_events(out),
            Self::Content(e) | Self::Break(e) | Self::Styled(e) => e.element.write_events(out),
            Self::HyperlinkTextSource(r) if r.children.len() == 1 || r.children_share_ranges() => {
                r.write_start(out);
                if let Some(properties) = &r.properties {
                    properties.write_events(out);
                }
                for child in &r.children {
                    child.write_events(out);
                }
                r.write_end(out);
            },
            Self::HyperlinkTextSource(r) | Self::Footnote(r) | Self::Note(r) => r.write_events(out),
            Self::Table(t) => t.write_events(out),
        }
    }

    /// Rewrite `AppliedFont` properties of every style range in the tree.
    pub fn with_font_mappings(&self, mapper: &mut RangeFontMapper<'_>) -> Self {
        match self {
            Self::Markup(_) => self.clone(),
            Self::Content(_) | Self::Break(_) | Self::Styled(_) => match self.style_ranges() {
                Some(ranges) => self.with_style_ranges(ranges.with_font_mappings(mapper)),
                None => self.clone(),
            },
            Self::HyperlinkTextSource(r) => Self::HyperlinkTextSource(r.with_font_mappings(mapper)),
            Self::Footnote(r) => Self::Footnote(r.with_font_mappings(mapper)),
            Self::Note(r) => Self::Note(r.with_font_mappings(mapper)),
            Self::Table(t) => Self::Table(Table {
                cells: t.cells.iter().map(|c| c.with_font_mappings(mapper)).collect(),
                style_ranges: t.style_ranges.with_font_mappings(mapper),
                ..t.clone()
            }),
        }
    }
}
