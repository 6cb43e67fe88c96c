//! Preserved XML elements and the `Properties` blocks shared by styles,
//! story ranges and spread items.

use crate::common::xml::{XmlEvent, XmlReader, escape_text, local_name, qname, text_of};
use crate::common::{Error, Result};
use crate::idml::parameters::FontMappings;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::io::BufRead;

pub const PROPERTIES: &str = "Properties";
const APPLIED_FONT: &str = "AppliedFont";

/// An element kept as raw events: start tag, inner events, end tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub start: BytesStart<'static>,
    pub inner: Vec<XmlEvent>,
    /// `None` for a self-closing element.
    pub end: Option<BytesEnd<'static>>,
}

impl Element {
    pub fn new(start: BytesStart<'static>, inner: Vec<XmlEvent>, end: Option<BytesEnd<'static>>) -> Self {
        Self { start, inner, end }
    }

    /// Read a whole element whose first event has already been consumed.
    pub fn read<R: BufRead>(first: XmlEvent, reader: &mut XmlReader<R>) -> Result<Self> {
        match first {
            Event::Empty(start) => Ok(Self::new(start, Vec::new(), None)),
            Event::Start(start) => {
                let (inner, end) = read_inner(reader)?;
                Ok(Self::new(start, inner, Some(end)))
            },
            other => Err(Error::unexpected(format!("expected an element, found {:?}", other))),
        }
    }

    pub fn qname(&self) -> String {
        qname(&self.start)
    }

    pub fn local_name(&self) -> String {
        local_name(&self.start)
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.start.name().as_ref() == name.as_bytes()
    }

    /// The start tag event as it appeared in the source.
    pub fn start_event(&self) -> XmlEvent {
        match self.end {
            Some(_) => Event::Start(self.start.clone()),
            None => Event::Empty(self.start.clone()),
        }
    }

    pub fn write_events(&self, out: &mut Vec<XmlEvent>) {
        out.push(self.start_event());
        if let Some(end) = &self.end {
            out.extend(self.inner.iter().cloned());
            out.push(Event::End(end.clone()));
        }
    }

    pub fn to_events(&self) -> Vec<XmlEvent> {
        let mut out = Vec::with_capacity(self.inner.len() + 2);
        self.write_events(&mut out);
        out
    }

    /// Concatenated character data of the element.
    pub fn text(&self) -> Result<String> {
        text_of(&self.inner)
    }

    /// A copy with the content replaced by a single text node.
    pub fn with_text(&self, text: &str) -> Self {
        let end = match &self.end {
            Some(end) => end.clone(),
            None => self.start.to_end().into_owned(),
        };
        Self::new(
            self.start.clone(),
            vec![Event::Text(BytesText::from_escaped(escape_text(text)))],
            Some(end),
        )
    }
}

/// Read events up to the end tag matching an already consumed start tag.
pub fn read_inner<R: BufRead>(reader: &mut XmlReader<R>) -> Result<(Vec<XmlEvent>, BytesEnd<'static>)> {
    let mut inner = Vec::new();
    let mut depth = 0usize;
    loop {
        let event = reader.next_event()?;
        match event {
            Event::Start(_) => {
                depth += 1;
                inner.push(event);
            },
            Event::End(end) => {
                if depth == 0 {
                    return Ok((inner, end));
                }
                depth -= 1;
                inner.push(Event::End(end));
            },
            Event::Eof => return Err(Error::unexpected("end of document inside an element")),
            other => inner.push(other),
        }
    }
}

/// One named property with its character data value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    element: Element,
    value: String,
}

impl Property {
    pub fn from_element(element: Element) -> Result<Self> {
        let value = element.text()?;
        Ok(Self { element, value })
    }

    pub fn name(&self) -> String {
        self.element.qname()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn with_value(&self, value: &str) -> Self {
        Self {
            element: self.element.with_text(value),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertiesNode {
    Property(Property),
    /// Whitespace and comments between properties
    Other(XmlEvent),
}

/// A `<Properties>` block.
///
/// Equality only considers the property list, so formatting differences
/// between two blocks do not make them differ.
#[derive(Debug, Clone)]
pub struct Properties {
    element_start: BytesStart<'static>,
    nodes: Vec<PropertiesNode>,
    end: Option<BytesEnd<'static>>,
}

impl PartialEq for Properties {
    fn eq(&self, other: &Self) -> bool {
        self.properties().eq(other.properties())
    }
}

impl Eq for Properties {}

impl Properties {
    /// Read a `Properties` block whose start tag has already been consumed.
    pub fn read<R: BufRead>(first: XmlEvent, reader: &mut XmlReader<R>) -> Result<Self> {
        let start = match first {
            Event::Empty(start) => {
                return Ok(Self {
                    element_start: start,
                    nodes: Vec::new(),
                    end: None,
                });
            },
            Event::Start(start) => start,
            other => return Err(Error::unexpected(format!("expected Properties, found {:?}", other))),
        };
        let mut nodes = Vec::new();
        loop {
            let event = reader.next_event()?;
            match event {
                Event::Start(_) | Event::Empty(_) => {
                    let element = Element::read(event, reader)?;
                    nodes.push(PropertiesNode::Property(Property::from_element(element)?));
                },
                Event::End(end) => {
                    return Ok(Self {
                        element_start: start,
                        nodes,
                        end: Some(end),
                    });
                },
                Event::Eof => return Err(Error::unexpected("end of document inside Properties")),
                other => nodes.push(PropertiesNode::Other(other)),
            }
        }
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.nodes.iter().filter_map(|node| match node {
            PropertiesNode::Property(property) => Some(property),
            PropertiesNode::Other(_) => None,
        })
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties().find(|p| p.element().is_named(name))
    }

    pub fn len(&self) -> usize {
        self.properties().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write_events(&self, out: &mut Vec<XmlEvent>) {
        match &self.end {
            None => out.push(Event::Empty(self.element_start.clone())),
            Some(end) => {
                out.push(Event::Start(self.element_start.clone()));
                for node in &self.nodes {
                    match node {
                        PropertiesNode::Property(property) => property.element().write_events(out),
                        PropertiesNode::Other(event) => out.push(event.clone()),
                    }
                }
                out.push(Event::End(end.clone()));
            },
        }
    }

    /// Apply font mappings to `AppliedFont` properties.
    ///
    /// Returns `None` when no property changes.
    pub fn with_font_mappings(&self, mappings: &FontMappings) -> Option<Self> {
        let mut changed = false;
        let nodes = self
            .nodes
            .iter()
            .map(|node| match node {
                PropertiesNode::Property(property) if property.element().local_name() == APPLIED_FONT => {
                    match mappings.target_for(property.value()) {
                        Some(target) if target != property.value() => {
                            changed = true;
                            PropertiesNode::Property(property.with_value(target))
                        },
                        _ => node.clone(),
                    }
                },
                _ => node.clone(),
            })
            .collect();
        changed.then(|| Self {
            element_start: self.element_start.clone(),
            nodes,
            end: self.end.clone(),
        })
    }
}
