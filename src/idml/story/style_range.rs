//! Paragraph and character style ranges.

use crate::common::Result;
use crate::common::xml::{XmlEvent, XmlReader, attributes, qname, start_tag};
use crate::idml::markup::{PROPERTIES, Properties, Property};
use crate::idml::parameters::FontMappings;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use std::collections::HashMap;
use std::io::BufRead;
use std::rc::Rc;

pub const PARAGRAPH_STYLE_RANGE: &str = "ParagraphStyleRange";
pub const CHARACTER_STYLE_RANGE: &str = "CharacterStyleRange";

const APPLIED_PARAGRAPH_STYLE: &str = "AppliedParagraphStyle";
const APPLIED_CHARACTER_STYLE: &str = "AppliedCharacterStyle";
const DEFAULT_PARAGRAPH_STYLE: &str = "ParagraphStyle/$ID/[No paragraph style]";
const DEFAULT_CHARACTER_STYLE: &str = "CharacterStyle/$ID/[No character style]";

/// One `ParagraphStyleRange` or `CharacterStyleRange`: its start tag and
/// its optional `Properties` block.
#[derive(Debug, Clone)]
pub struct StyleRange {
    start: BytesStart<'static>,
    attributes: Vec<(String, String)>,
    properties: Option<Properties>,
}

impl PartialEq for StyleRange {
    fn eq(&self, other: &Self) -> bool {
        self.start.name() == other.start.name()
            && self.attributes == other.attributes
            && self.properties().eq(other.properties())
    }
}

impl StyleRange {
    pub fn new(start: BytesStart<'static>, properties: Option<Properties>) -> Result<Self> {
        let attributes = attributes(&start)?;
        Ok(Self {
            start,
            attributes,
            properties,
        })
    }

    /// Read a range start tag and its leading `Properties` block.
    pub fn read<R: BufRead>(first: XmlEvent, reader: &mut XmlReader<R>) -> Result<Self> {
        match first {
            Event::Empty(start) => Self::new(start, None),
            Event::Start(start) => {
                let has_properties = matches!(
                    reader.peek_tag()?,
                    Event::Start(s) | Event::Empty(s) if s.name().as_ref() == PROPERTIES.as_bytes()
                );
                let properties = if has_properties {
                    let event = reader.next_event()?;
                    Some(Properties::read(event, reader)?)
                } else {
                    None
                };
                Self::new(start, properties)
            },
            other => Err(crate::common::Error::unexpected(format!(
                "expected a style range, found {:?}",
                other
            ))),
        }
    }

    pub fn default_paragraph() -> Self {
        Self::synthesized(PARAGRAPH_STYLE_RANGE, APPLIED_PARAGRAPH_STYLE, DEFAULT_PARAGRAPH_STYLE)
    }

    pub fn default_character() -> Self {
        Self::synthesized(CHARACTER_STYLE_RANGE, APPLIED_CHARACTER_STYLE, DEFAULT_CHARACTER_STYLE)
    }

    fn synthesized(name: &str, attribute: &str, style: &str) -> Self {
        Self {
            start: start_tag(name, &[(attribute, style)]),
            attributes: vec![(attribute.to_string(), style.to_string())],
            properties: None,
        }
    }

    pub fn name(&self) -> String {
        qname(&self.start)
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().flat_map(|p| p.properties())
    }

    /// Number of attributes and properties.
    pub fn amount(&self) -> usize {
        self.attributes.len() + self.properties().count()
    }

    pub fn write_start(&self, out: &mut Vec<XmlEvent>) {
        out.push(Event::Start(self.start.clone()));
        if let Some(properties) = &self.properties {
            properties.write_events(out);
        }
    }

    pub fn write_end(&self, out: &mut Vec<XmlEvent>) {
        out.push(Event::End(BytesEnd::new(self.name())));
    }

    pub fn with_font_mappings(&self, mappings: &FontMappings) -> Option<Self> {
        let properties = self.properties.as_ref()?.with_font_mappings(mappings)?;
        Some(Self {
            start: self.start.clone(),
            attributes: self.attributes.clone(),
            properties: Some(properties),
        })
    }
}

/// The paragraph and character range a story element sits in.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRanges {
    pub paragraph: Rc<StyleRange>,
    pub character: Rc<StyleRange>,
}

impl Default for StyleRanges {
    fn default() -> Self {
        Self::new(Rc::new(StyleRange::default_paragraph()), Rc::new(StyleRange::default_character()))
    }
}

impl StyleRanges {
    pub fn new(paragraph: Rc<StyleRange>, character: Rc<StyleRange>) -> Self {
        Self { paragraph, character }
    }

    pub fn amount(&self) -> usize {
        self.paragraph.amount() + self.character.amount()
    }

    /// Attributes of both ranges without the applied style names.
    pub fn combined_attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        let paragraph = self
            .paragraph
            .attributes()
            .iter()
            .filter(|(name, _)| local(name) != APPLIED_PARAGRAPH_STYLE);
        let character = self
            .character
            .attributes()
            .iter()
            .filter(|(name, _)| local(name) != APPLIED_CHARACTER_STYLE);
        paragraph.chain(character).map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn combined_properties(&self) -> impl Iterator<Item = &Property> {
        self.paragraph.properties().chain(self.character.properties())
    }

    pub fn with_font_mappings(&self, mapper: &mut RangeFontMapper<'_>) -> Self {
        Self::new(mapper.map(&self.paragraph), mapper.map(&self.character))
    }
}

/// Applies font mappings to ranges, once per range instance.
///
/// Elements that shared a range before mapping share the mapped one.
pub struct RangeFontMapper<'m> {
    mappings: &'m FontMappings,
    mapped: HashMap<*const StyleRange, Rc<StyleRange>>,
}

impl<'m> RangeFontMapper<'m> {
    pub fn new(mappings: &'m FontMappings) -> Self {
        Self {
            mappings,
            mapped: HashMap::new(),
        }
    }

    pub fn map(&mut self, range: &Rc<StyleRange>) -> Rc<StyleRange> {
        let mappings = self.mappings;
        let mapped = self
            .mapped
            .entry(Rc::as_ptr(range))
            .or_insert_with(|| match range.with_font_mappings(mappings) {
                Some(mapped) => Rc::new(mapped),
                None => Rc::clone(range),
            });
        Rc::clone(mapped)
    }
}

fn local(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}
