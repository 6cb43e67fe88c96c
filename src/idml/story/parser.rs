//! Story parsing.
//!
//! A story is read in one pass with an explicit stack of open frames, so
//! deeply nested notes and tables do not grow the call stack. Each frame
//! collects the children of one open element and, once its end tag is
//! seen, hands its result to the frame below.

use super::element::{
    BREAK, CELL, CHANGE, COLUMN, CONTENT, FOOTNOTE, HYPERLINK_TEXT_SOURCE, NOTE, ROW, ReferenceElement,
    StoryChildElement, StyledElement, TABLE, Table, XML_ATTRIBUTE, XML_COMMENT, XML_ELEMENT, XML_INSTRUCTION,
};
use super::merge::StoryChildElementsMerger;
use super::style_range::{CHARACTER_STYLE_RANGE, PARAGRAPH_STYLE_RANGE, RangeFontMapper, StyleRange, StyleRanges};
use super::writer::StoryChildElementsWriter;
use crate::common::xml::{XmlEvent, XmlReader, events_to_bytes, qname, required_attribute};
use crate::common::{Error, Result};
use crate::idml::markup::{Element, PROPERTIES, Properties};
use crate::idml::parameters::FontMappings;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use std::io::BufRead;
use std::rc::Rc;

const STORY: &str = "Story";
const CHANGE_TYPE: &str = "ChangeType";
const DELETED_TEXT: &str = "DeletedText";

/// Element names that only make sense inside a paragraph range; met
/// outside one they get the default ranges.
const RANGE_CHILDREN: [&str; 12] = [
    CHARACTER_STYLE_RANGE,
    CONTENT,
    BREAK,
    HYPERLINK_TEXT_SOURCE,
    FOOTNOTE,
    NOTE,
    TABLE,
    CHANGE,
    XML_ELEMENT,
    XML_ATTRIBUTE,
    XML_COMMENT,
    XML_INSTRUCTION,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReferenceKind {
    HyperlinkTextSource,
    Footnote,
    Note,
    Cell,
}

#[derive(Debug)]
enum Frame {
    Paragraph {
        range: Rc<StyleRange>,
        current_character: Option<Rc<StyleRange>>,
        elements: Vec<StoryChildElement>,
    },
    Character {
        ranges: StyleRanges,
        elements: Vec<StoryChildElement>,
    },
    /// Unwrapped `XMLElement` or a kept `Change`: the children are lifted
    /// into the enclosing list.
    ElementRange {
        ranges: StyleRanges,
        elements: Vec<StoryChildElement>,
    },
    Reference {
        kind: ReferenceKind,
        element: ReferenceElement,
    },
    Table(Table),
}

/// What a finished frame hands to the one below.
enum Produced {
    Elements(Vec<StoryChildElement>),
    CharacterRange(Rc<StyleRange>, Vec<StoryChildElement>),
    Cell(ReferenceElement),
}

enum Step {
    Push(Frame),
    Emit(Vec<StoryChildElement>),
}

pub struct StoryParser<'a> {
    untag_xml_structures: bool,
    merger: StoryChildElementsMerger<'a>,
    /// Ranges for elements outside any source range, one instance per story.
    defaults: StyleRanges,
}

impl<'a> StoryParser<'a> {
    pub fn new(untag_xml_structures: bool, merger: StoryChildElementsMerger<'a>) -> Self {
        Self {
            untag_xml_structures,
            merger,
            defaults: StyleRanges::default(),
        }
    }

    /// Parse the children of an already consumed `Story` start tag, up to
    /// and including its end tag.
    pub fn parse<R: BufRead>(&self, reader: &mut XmlReader<R>) -> Result<(Vec<StoryChildElement>, BytesEnd<'static>)> {
        let mut root: Vec<StoryChildElement> = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();
        loop {
            let event = reader.next_tag()?;
            if let Event::End(end) = event {
                let Some(frame) = stack.pop() else {
                    return Ok((self.merger.merge(root), end));
                };
                let produced = self.finish(frame, Some(end));
                deliver(produced, stack.last_mut(), &mut root)?;
                continue;
            }

            let empty = matches!(event, Event::Empty(_));
            let step = match stack.last_mut() {
                None => self.dispatch(event, None, None, reader)?,
                Some(frame) => self.child(frame, event, reader)?,
            };
            match step {
                Step::Emit(elements) => deliver(Produced::Elements(elements), stack.last_mut(), &mut root)?,
                Step::Push(frame) if empty => {
                    let produced = self.finish(frame, None);
                    deliver(produced, stack.last_mut(), &mut root)?;
                },
                Step::Push(frame) => stack.push(frame),
            }
        }
    }

    /// A child start tag met inside an open frame.
    fn child<R: BufRead>(&self, frame: &mut Frame, event: XmlEvent, reader: &mut XmlReader<R>) -> Result<Step> {
        match frame {
            Frame::Paragraph {
                range,
                current_character,
                ..
            } => {
                if is_start_named(&event, CHARACTER_STYLE_RANGE) {
                    let character = Rc::new(StyleRange::read(event, reader)?);
                    return Ok(Step::Push(Frame::Character {
                        ranges: StyleRanges::new(Rc::clone(range), character),
                        elements: Vec::new(),
                    }));
                }
                let character = current_character
                    .clone()
                    .unwrap_or_else(|| Rc::clone(&self.defaults.character));
                let ranges = StyleRanges::new(Rc::clone(range), character);
                self.character_child(event, ranges, reader)
            },
            Frame::Character { ranges, .. } => self.character_child(event, ranges.clone(), reader),
            Frame::ElementRange { ranges, .. } => {
                let (paragraph, character) = (Rc::clone(&ranges.paragraph), Rc::clone(&ranges.character));
                self.dispatch(event, Some(paragraph), Some(character), reader)
            },
            Frame::Reference { kind, element } => {
                if is_start_named(&event, PROPERTIES) {
                    element.properties = Some(Properties::read(event, reader)?);
                    return Ok(Step::Emit(Vec::new()));
                }
                // Hyperlink text sits in the ranges around the hyperlink.
                match (*kind, &element.style_ranges) {
                    (ReferenceKind::HyperlinkTextSource, Some(ranges)) => {
                        let (paragraph, character) = (Rc::clone(&ranges.paragraph), Rc::clone(&ranges.character));
                        self.dispatch(event, Some(paragraph), Some(character), reader)
                    },
                    _ => self.dispatch(event, None, None, reader),
                }
            },
            Frame::Table(table) => match start_name(&event).as_deref() {
                Some(PROPERTIES) => {
                    table.properties = Some(Properties::read(event, reader)?);
                    Ok(Step::Emit(Vec::new()))
                },
                Some(ROW) | Some(COLUMN) => {
                    table.markup.push(Element::read(event, reader)?);
                    Ok(Step::Emit(Vec::new()))
                },
                Some(CELL) => Ok(Step::Push(Frame::Reference {
                    kind: ReferenceKind::Cell,
                    element: ReferenceElement::new(owned_start(event)?, None),
                })),
                _ => Err(Error::unexpected(format!("unexpected table child: {:?}", event))),
            },
        }
    }

    /// A start tag with the paragraph and character ranges in effect, if any.
    fn dispatch<R: BufRead>(
        &self,
        event: XmlEvent,
        paragraph: Option<Rc<StyleRange>>,
        character: Option<Rc<StyleRange>>,
        reader: &mut XmlReader<R>,
    ) -> Result<Step> {
        let name = start_name(&event).unwrap_or_default();
        if name == PARAGRAPH_STYLE_RANGE {
            return Ok(Step::Push(Frame::Paragraph {
                range: Rc::new(StyleRange::read(event, reader)?),
                current_character: character,
                elements: Vec::new(),
            }));
        }
        if !RANGE_CHILDREN.contains(&name.as_str()) {
            return Ok(Step::Emit(vec![StoryChildElement::Markup(Element::read(event, reader)?)]));
        }
        let paragraph = paragraph.unwrap_or_else(|| Rc::clone(&self.defaults.paragraph));
        if name == CHARACTER_STYLE_RANGE {
            let character = Rc::new(StyleRange::read(event, reader)?);
            return Ok(Step::Push(Frame::Character {
                ranges: StyleRanges::new(paragraph, character),
                elements: Vec::new(),
            }));
        }
        let character = character.unwrap_or_else(|| Rc::clone(&self.defaults.character));
        self.character_child(event, StyleRanges::new(paragraph, character), reader)
    }

    /// A start tag inside a character range.
    fn character_child<R: BufRead>(&self, event: XmlEvent, ranges: StyleRanges, reader: &mut XmlReader<R>) -> Result<Step> {
        let name = start_name(&event).unwrap_or_default();
        match name.as_str() {
            XML_ATTRIBUTE | XML_COMMENT | XML_INSTRUCTION if self.untag_xml_structures => {
                Element::read(event, reader)?;
                Ok(Step::Emit(Vec::new()))
            },
            XML_ELEMENT if self.untag_xml_structures => Ok(Step::Push(Frame::ElementRange {
                ranges,
                elements: Vec::new(),
            })),
            HYPERLINK_TEXT_SOURCE | FOOTNOTE | NOTE => {
                let kind = match name.as_str() {
                    HYPERLINK_TEXT_SOURCE => ReferenceKind::HyperlinkTextSource,
                    FOOTNOTE => ReferenceKind::Footnote,
                    _ => ReferenceKind::Note,
                };
                Ok(Step::Push(Frame::Reference {
                    kind,
                    element: ReferenceElement::new(owned_start(event)?, Some(ranges)),
                }))
            },
            TABLE => Ok(Step::Push(Frame::Table(Table::new(owned_start(event)?, ranges)))),
            CHANGE => {
                let change_type = match &event {
                    Event::Start(start) | Event::Empty(start) => required_attribute(start, CHANGE_TYPE)?,
                    _ => return Err(Error::unexpected("change without a start tag")),
                };
                if change_type == DELETED_TEXT {
                    Element::read(event, reader)?;
                    return Ok(Step::Emit(Vec::new()));
                }
                Ok(Step::Push(Frame::ElementRange {
                    ranges,
                    elements: Vec::new(),
                }))
            },
            CONTENT => Ok(Step::Emit(vec![StoryChildElement::Content(StyledElement::new(
                Element::read(event, reader)?,
                ranges,
            ))])),
            BREAK => Ok(Step::Emit(vec![StoryChildElement::Break(StyledElement::new(
                Element::read(event, reader)?,
                ranges,
            ))])),
            _ => Ok(Step::Emit(vec![StoryChildElement::Styled(StyledElement::new(
                Element::read(event, reader)?,
                ranges,
            ))])),
        }
    }

    fn finish(&self, frame: Frame, end: Option<BytesEnd<'static>>) -> Produced {
        match frame {
            Frame::Paragraph { elements, .. } => Produced::Elements(elements),
            Frame::Character { ranges, elements } => Produced::CharacterRange(ranges.character, elements),
            Frame::ElementRange { elements, .. } => Produced::Elements(self.merger.merge(elements)),
            Frame::Reference { kind, mut element } => {
                element.children = self.merger.merge(std::mem::take(&mut element.children));
                element.end = end;
                Produced::Elements(vec![match kind {
                    ReferenceKind::HyperlinkTextSource => StoryChildElement::HyperlinkTextSource(element),
                    ReferenceKind::Footnote => StoryChildElement::Footnote(element),
                    ReferenceKind::Note => StoryChildElement::Note(element),
                    ReferenceKind::Cell => return Produced::Cell(element),
                }])
            },
            Frame::Table(mut table) => {
                table.end = end;
                Produced::Elements(vec![StoryChildElement::Table(table)])
            },
        }
    }
}

/// Add a finished result to the frame below, or to the story itself.
fn deliver(produced: Produced, parent: Option<&mut Frame>, root: &mut Vec<StoryChildElement>) -> Result<()> {
    let (elements, character) = match produced {
        Produced::Elements(elements) => (elements, None),
        Produced::CharacterRange(range, elements) => (elements, Some(range)),
        Produced::Cell(cell) => {
            return match parent {
                Some(Frame::Table(table)) => {
                    table.cells.push(cell);
                    Ok(())
                },
                _ => Err(Error::unexpected("cell outside a table")),
            };
        },
    };
    match parent {
        None => root.extend(elements),
        Some(Frame::Paragraph {
            current_character,
            elements: target,
            ..
        }) => {
            // The last character range stays in effect for later children.
            if let Some(range) = character {
                *current_character = Some(range);
            }
            target.extend(elements);
        },
        Some(Frame::Character { elements: target, .. }) | Some(Frame::ElementRange { elements: target, .. }) => {
            target.extend(elements)
        },
        Some(Frame::Reference { element, .. }) => element.children.extend(elements),
        Some(Frame::Table(_)) => {
            if !elements.is_empty() {
                return Err(Error::unexpected("story content directly inside a table"));
            }
        },
    }
    Ok(())
}

fn start_name(event: &XmlEvent) -> Option<String> {
    match event {
        Event::Start(start) | Event::Empty(start) => Some(qname(start)),
        _ => None,
    }
}

fn is_start_named(event: &XmlEvent, name: &str) -> bool {
    matches!(event, Event::Start(s) | Event::Empty(s) if s.name().as_ref() == name.as_bytes())
}

fn owned_start(event: XmlEvent) -> Result<BytesStart<'static>> {
    match event {
        Event::Start(start) | Event::Empty(start) => Ok(start),
        other => Err(Error::unexpected(format!("expected a start tag, found {:?}", other))),
    }
}

/// A parsed story part: the events around the `Story` element are kept
/// verbatim, its children as story elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Story {
    head: Vec<XmlEvent>,
    pub elements: Vec<StoryChildElement>,
    end: Option<BytesEnd<'static>>,
    tail: Vec<XmlEvent>,
}

impl Story {
    pub fn parse<R: BufRead>(reader: &mut XmlReader<R>, parser: &StoryParser<'_>) -> Result<Self> {
        let mut head = Vec::new();
        loop {
            let event = reader.next_event()?;
            match &event {
                Event::Start(start) if start.name().as_ref() == STORY.as_bytes() => {
                    head.push(event);
                    break;
                },
                Event::Empty(start) if start.name().as_ref() == STORY.as_bytes() => {
                    head.push(event);
                    let tail = reader.read_to_end()?;
                    return Ok(Self {
                        head,
                        elements: Vec::new(),
                        end: None,
                        tail,
                    });
                },
                Event::Eof => return Err(Error::unexpected("story part has no Story element")),
                _ => head.push(event),
            }
        }
        let (elements, end) = parser.parse(reader)?;
        let tail = reader.read_to_end()?;
        Ok(Self {
            head,
            elements,
            end: Some(end),
            tail,
        })
    }

    /// Value of an attribute of the `Story` start tag.
    pub fn attribute(&self, name: &str) -> Result<Option<String>> {
        match self.head.last() {
            Some(Event::Start(start)) | Some(Event::Empty(start)) => crate::common::xml::attribute(start, name),
            _ => Ok(None),
        }
    }

    /// The same story with other children.
    pub fn with_elements(&self, elements: Vec<StoryChildElement>) -> Self {
        Self {
            head: self.head.clone(),
            elements,
            end: self.end.clone(),
            tail: self.tail.clone(),
        }
    }

    pub fn apply_font_mappings(&mut self, mappings: &FontMappings) {
        if mappings.is_empty() {
            return;
        }
        let mut mapper = RangeFontMapper::new(mappings);
        self.elements = self.elements.iter().map(|e| e.with_font_mappings(&mut mapper)).collect();
    }

    pub fn to_events(&self) -> Vec<XmlEvent> {
        let mut out = self.head.clone();
        let mut writer = StoryChildElementsWriter::new();
        writer.write(&self.elements, &mut out);
        writer.close(&self.elements, &mut out);
        if let Some(end) = &self.end {
            out.push(Event::End(end.clone()));
        }
        out.extend(self.tail.iter().cloned());
        out
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        events_to_bytes(&self.to_events())
    }
}
