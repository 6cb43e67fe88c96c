//! Style definitions (`Resources/Styles.xml`).
//!
//! The part is read in one pass, in the fixed order InDesign writes it:
//! the `Styles` root, the root character and paragraph style groups, table
//! of contents styles, the root cell, table and object style groups, trap
//! presets and the root end. Everything between the recognised parts is
//! kept, so an unmodified value serializes back to the original bytes.

use crate::common::xml::{XmlEvent, XmlReader, events_to_bytes, local_name};
use crate::common::{Error, Result};
use crate::idml::markup::{Element, PROPERTIES, Properties};
use crate::idml::parameters::FontMappings;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use std::io::BufRead;

const STYLES: &str = "Styles";
const TOC_STYLE: &str = "TOCStyle";
const TRAP_PRESET: &str = "TrapPreset";

/// Style and group element names of one style family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleFamily {
    pub root: &'static str,
    pub style: &'static str,
    pub group: &'static str,
    what: &'static str,
}

pub const CHARACTER_STYLES: StyleFamily = StyleFamily {
    root: "RootCharacterStyleGroup",
    style: "CharacterStyle",
    group: "CharacterStyleGroup",
    what: "root character style group",
};
pub const PARAGRAPH_STYLES: StyleFamily = StyleFamily {
    root: "RootParagraphStyleGroup",
    style: "ParagraphStyle",
    group: "ParagraphStyleGroup",
    what: "root paragraph style group",
};
pub const CELL_STYLES: StyleFamily = StyleFamily {
    root: "RootCellStyleGroup",
    style: "CellStyle",
    group: "CellStyleGroup",
    what: "root cell style group",
};
pub const TABLE_STYLES: StyleFamily = StyleFamily {
    root: "RootTableStyleGroup",
    style: "TableStyle",
    group: "TableStyleGroup",
    what: "root table style group",
};
pub const OBJECT_STYLES: StyleFamily = StyleFamily {
    root: "RootObjectStyleGroup",
    style: "ObjectStyle",
    group: "ObjectStyleGroup",
    what: "root object style group",
};

fn structure_error(what: &str) -> Error {
    Error::unexpected(format!("Unexpected styles structure: {}", what))
}

/// A child of a style, a group or the styles root.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleNode {
    Properties(Properties),
    Style(Style),
    Group(StyleGroup),
    /// Any other element, preserved as is
    Element(Element),
    /// Whitespace, comments and other non-element events
    Other(XmlEvent),
}

impl StyleNode {
    fn write_events(&self, out: &mut Vec<XmlEvent>) {
        match self {
            StyleNode::Properties(properties) => properties.write_events(out),
            StyleNode::Style(style) => style.write_events(out),
            StyleNode::Group(group) => group.write_events(out),
            StyleNode::Element(element) => element.write_events(out),
            StyleNode::Other(event) => out.push(event.clone()),
        }
    }

    fn with_font_mappings(&self, mappings: &FontMappings) -> Option<Self> {
        match self {
            StyleNode::Properties(properties) => properties.with_font_mappings(mappings).map(StyleNode::Properties),
            StyleNode::Style(style) => style.with_font_mappings(mappings).map(StyleNode::Style),
            StyleNode::Group(group) => group.with_font_mappings(mappings).map(StyleNode::Group),
            StyleNode::Element(_) | StyleNode::Other(_) => None,
        }
    }
}

fn rewrite_nodes(nodes: &[StyleNode], mappings: &FontMappings) -> Option<Vec<StyleNode>> {
    let rewritten: Vec<Option<StyleNode>> = nodes.iter().map(|n| n.with_font_mappings(mappings)).collect();
    if rewritten.iter().all(Option::is_none) {
        return None;
    }
    Some(
        rewritten
            .into_iter()
            .zip(nodes)
            .map(|(new, old)| new.unwrap_or_else(|| old.clone()))
            .collect(),
    )
}

fn write_container(start: &BytesStart<'static>, children: &[StyleNode], end: &Option<BytesEnd<'static>>, out: &mut Vec<XmlEvent>) {
    match end {
        None => out.push(Event::Empty(start.clone())),
        Some(end) => {
            out.push(Event::Start(start.clone()));
            children.iter().for_each(|child| child.write_events(out));
            out.push(Event::End(end.clone()));
        },
    }
}

/// A single style definition (also used for TOC styles and trap presets).
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    start: BytesStart<'static>,
    children: Vec<StyleNode>,
    end: Option<BytesEnd<'static>>,
}

impl Style {
    fn read<R: BufRead>(first: XmlEvent, reader: &mut XmlReader<R>) -> Result<Self> {
        let start = match first {
            Event::Empty(start) => {
                return Ok(Self {
                    start,
                    children: Vec::new(),
                    end: None,
                });
            },
            Event::Start(start) => start,
            other => return Err(Error::unexpected(format!("expected a style, found {:?}", other))),
        };
        let mut children = Vec::new();
        loop {
            let event = reader.next_event()?;
            let child = match &event {
                Event::Start(s) | Event::Empty(s) => {
                    if s.name().as_ref() == PROPERTIES.as_bytes() {
                        StyleNode::Properties(Properties::read(event, reader)?)
                    } else {
                        StyleNode::Element(Element::read(event, reader)?)
                    }
                },
                Event::End(end) => {
                    let end = end.clone();
                    return Ok(Self {
                        start,
                        children,
                        end: Some(end),
                    });
                },
                Event::Eof => return Err(structure_error("a style is not closed")),
                _ => StyleNode::Other(event),
            };
            children.push(child);
        }
    }

    pub fn name(&self) -> String {
        local_name(&self.start)
    }

    pub fn properties(&self) -> Option<&Properties> {
        self.children.iter().find_map(|c| match c {
            StyleNode::Properties(p) => Some(p),
            _ => None,
        })
    }

    fn write_events(&self, out: &mut Vec<XmlEvent>) {
        write_container(&self.start, &self.children, &self.end, out);
    }

    fn with_font_mappings(&self, mappings: &FontMappings) -> Option<Self> {
        rewrite_nodes(&self.children, mappings).map(|children| Self {
            start: self.start.clone(),
            children,
            end: self.end.clone(),
        })
    }
}

/// A style group holding properties, styles and nested groups in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleGroup {
    family: StyleFamily,
    start: BytesStart<'static>,
    children: Vec<StyleNode>,
    end: Option<BytesEnd<'static>>,
}

impl StyleGroup {
    fn read<R: BufRead>(first: XmlEvent, family: StyleFamily, reader: &mut XmlReader<R>) -> Result<Self> {
        let start = match first {
            Event::Empty(start) => {
                return Ok(Self {
                    family,
                    start,
                    children: Vec::new(),
                    end: None,
                });
            },
            Event::Start(start) => start,
            other => return Err(Error::unexpected(format!("expected a style group, found {:?}", other))),
        };
        let mut children = Vec::new();
        loop {
            let event = reader.next_event()?;
            let child = match &event {
                Event::Start(s) | Event::Empty(s) => {
                    let name = local_name(s);
                    if s.name().as_ref() == PROPERTIES.as_bytes() {
                        StyleNode::Properties(Properties::read(event, reader)?)
                    } else if name == family.style {
                        StyleNode::Style(Style::read(event, reader)?)
                    } else if name == family.group {
                        StyleNode::Group(StyleGroup::read(event, family, reader)?)
                    } else {
                        StyleNode::Element(Element::read(event, reader)?)
                    }
                },
                Event::End(end) => {
                    let end = end.clone();
                    return Ok(Self {
                        family,
                        start,
                        children,
                        end: Some(end),
                    });
                },
                Event::Eof => return Err(structure_error("a style group is not closed")),
                _ => StyleNode::Other(event),
            };
            children.push(child);
        }
    }

    pub fn family(&self) -> StyleFamily {
        self.family
    }

    pub fn styles(&self) -> impl Iterator<Item = &Style> {
        self.children.iter().filter_map(|c| match c {
            StyleNode::Style(s) => Some(s),
            _ => None,
        })
    }

    pub fn groups(&self) -> impl Iterator<Item = &StyleGroup> {
        self.children.iter().filter_map(|c| match c {
            StyleNode::Group(g) => Some(g),
            _ => None,
        })
    }

    fn write_events(&self, out: &mut Vec<XmlEvent>) {
        write_container(&self.start, &self.children, &self.end, out);
    }

    fn with_font_mappings(&self, mappings: &FontMappings) -> Option<Self> {
        rewrite_nodes(&self.children, mappings).map(|children| Self {
            family: self.family,
            start: self.start.clone(),
            children,
            end: self.end.clone(),
        })
    }
}

/// Result of scanning forward for the next recognised part.
enum Seek {
    Found(XmlEvent),
    RootEnd(XmlEvent),
    Eof,
}

/// Parsed style definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDefinitions {
    /// Events up to and including the `Styles` start tag
    head: Vec<XmlEvent>,
    children: Vec<StyleNode>,
    /// The `Styles` end tag and everything after it
    tail: Vec<XmlEvent>,
}

impl StyleDefinitions {
    pub fn parse<R: BufRead>(reader: &mut XmlReader<R>) -> Result<Self> {
        let mut head = Vec::new();
        loop {
            let event = reader.next_event()?;
            match &event {
                Event::Start(s) if local_name(s) == STYLES => {
                    head.push(event);
                    break;
                },
                Event::Eof => return Err(structure_error("the start element event is absent")),
                _ => head.push(event),
            }
        }

        let mut children = Vec::new();
        for family in [CHARACTER_STYLES, PARAGRAPH_STYLES] {
            match seek(reader, &mut children, &[family.root])? {
                Seek::Found(first) => children.push(StyleNode::Group(StyleGroup::read(first, family, reader)?)),
                _ => return Err(structure_error(&format!("the {} is absent", family.what))),
            }
        }

        loop {
            match seek(reader, &mut children, &[TOC_STYLE, CELL_STYLES.root])? {
                Seek::Found(first) if is_start_named(&first, TOC_STYLE) => {
                    children.push(StyleNode::Style(Style::read(first, reader)?));
                },
                Seek::Found(first) => {
                    children.push(StyleNode::Group(StyleGroup::read(first, CELL_STYLES, reader)?));
                    break;
                },
                _ => return Err(structure_error(&format!("the {} is absent", CELL_STYLES.what))),
            }
        }

        for family in [TABLE_STYLES, OBJECT_STYLES] {
            match seek(reader, &mut children, &[family.root])? {
                Seek::Found(first) => children.push(StyleNode::Group(StyleGroup::read(first, family, reader)?)),
                _ => return Err(structure_error(&format!("the {} is absent", family.what))),
            }
        }

        let mut tail = loop {
            match seek(reader, &mut children, &[TRAP_PRESET])? {
                Seek::Found(first) => children.push(StyleNode::Style(Style::read(first, reader)?)),
                Seek::RootEnd(end) => break vec![end],
                Seek::Eof => return Err(structure_error("the end element event is absent")),
            }
        };
        tail.extend(reader.read_to_end()?);

        Ok(Self { head, children, tail })
    }

    pub fn group(&self, family: StyleFamily) -> Option<&StyleGroup> {
        self.children.iter().find_map(|c| match c {
            StyleNode::Group(g) if g.family == family => Some(g),
            _ => None,
        })
    }

    pub fn table_of_contents_styles(&self) -> impl Iterator<Item = &Style> {
        self.top_level_styles(TOC_STYLE)
    }

    pub fn trap_presets(&self) -> impl Iterator<Item = &Style> {
        self.top_level_styles(TRAP_PRESET)
    }

    fn top_level_styles<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Style> {
        self.children.iter().filter_map(move |c| match c {
            StyleNode::Style(s) if s.name() == name => Some(s),
            _ => None,
        })
    }

    /// Apply font mappings to every style and group, returning the rewritten
    /// definitions, or `None` when nothing changes.
    pub fn with_font_mappings(&self, mappings: &FontMappings) -> Option<Self> {
        if mappings.is_empty() {
            return None;
        }
        rewrite_nodes(&self.children, mappings).map(|children| Self {
            head: self.head.clone(),
            children,
            tail: self.tail.clone(),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut events = self.head.clone();
        self.children.iter().for_each(|c| c.write_events(&mut events));
        events.extend(self.tail.iter().cloned());
        events_to_bytes(&events)
    }
}

fn is_start_named(event: &XmlEvent, name: &str) -> bool {
    matches!(event, Event::Start(s) | Event::Empty(s) if local_name(s) == name)
}

/// Scan forward to the next element with one of `names`, preserving
/// everything passed over in `skipped`.
fn seek<R: BufRead>(reader: &mut XmlReader<R>, skipped: &mut Vec<StyleNode>, names: &[&str]) -> Result<Seek> {
    loop {
        let event = reader.next_event()?;
        match &event {
            Event::Start(s) | Event::Empty(s) => {
                if names.contains(&local_name(s).as_str()) {
                    return Ok(Seek::Found(event));
                }
                skipped.push(StyleNode::Element(Element::read(event, reader)?));
            },
            Event::End(_) => return Ok(Seek::RootEnd(event)),
            Event::Eof => return Ok(Seek::Eof),
            _ => skipped.push(StyleNode::Other(event)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::xml::DEFAULT_MAX_ATTRIBUTE_SIZE;
    use crate::idml::parameters::FontMapping;

    const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<idPkg:Styles xmlns:idPkg="http://ns.adobe.com/AdobeInDesign/idml/1.0/packaging" DOMVersion="16.0">
	<RootCharacterStyleGroup Self="u79">
		<CharacterStyle Self="CharacterStyle/$ID/[No character style]" Name="$ID/[No character style]"/>
		<CharacterStyle Self="CharacterStyle/Bold" Name="Bold" FontStyle="Bold">
			<Properties><AppliedFont type="string">Arial</AppliedFont></Properties>
		</CharacterStyle>
	</RootCharacterStyleGroup>
	<RootParagraphStyleGroup Self="u78">
		<ParagraphStyleGroup Self="ParagraphStyleGroup/Body" Name="Body">
			<ParagraphStyle Self="ParagraphStyle/Body%3aText" Name="Body:Text">
				<Properties><AppliedFont type="string">Minion Pro</AppliedFont><Leading type="unit">12</Leading></Properties>
			</ParagraphStyle>
		</ParagraphStyleGroup>
	</RootParagraphStyleGroup>
	<TOCStyle Self="TOCStyle/$ID/DefaultTOCStyleName" Name="$ID/DefaultTOCStyleName"/>
	<RootCellStyleGroup Self="u8a"/>
	<RootTableStyleGroup Self="u8c"/>
	<RootObjectStyleGroup Self="u97">
		<ObjectStyle Self="ObjectStyle/$ID/[None]" Name="$ID/[None]"/>
	</RootObjectStyleGroup>
	<TrapPreset Self="TrapPreset/$ID/kDefaultTrapStyleName" Name="$ID/kDefaultTrapStyleName"/>
</idPkg:Styles>
"#;

    fn parse(xml: &str) -> Result<StyleDefinitions> {
        let mut reader = XmlReader::from_bytes(xml.as_bytes().to_vec(), DEFAULT_MAX_ATTRIBUTE_SIZE);
        StyleDefinitions::parse(&mut reader)
    }

    #[test]
    fn test_parse_structure() {
        let styles = parse(STYLES_XML).unwrap();
        let chars = styles.group(CHARACTER_STYLES).unwrap();
        assert_eq!(chars.styles().count(), 2);
        let paras = styles.group(PARAGRAPH_STYLES).unwrap();
        assert_eq!(paras.groups().count(), 1);
        assert_eq!(styles.table_of_contents_styles().count(), 1);
        assert_eq!(styles.trap_presets().count(), 1);
        assert!(styles.group(OBJECT_STYLES).is_some());
    }

    #[test]
    fn test_unmodified_round_trip_is_byte_identical() {
        let styles = parse(STYLES_XML).unwrap();
        assert_eq!(styles.to_bytes().unwrap(), STYLES_XML.as_bytes());
    }

    #[test]
    fn test_missing_group_is_fatal() {
        let xml = STYLES_XML.replace("<RootTableStyleGroup Self=\"u8c\"/>", "");
        let err = parse(&xml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unexpected structure: Unexpected styles structure: the root table style group is absent"
        );
    }

    #[test]
    fn test_font_mapping_rewrite_in_nested_groups() {
        let styles = parse(STYLES_XML).unwrap();
        let mappings = FontMappings::compile(&[FontMapping::new("Minion.*", "Garamond")]).unwrap();
        let rewritten = styles.with_font_mappings(&mappings).unwrap();
        let bytes = String::from_utf8(rewritten.to_bytes().unwrap()).unwrap();
        assert!(bytes.contains("<AppliedFont type=\"string\">Garamond</AppliedFont><Leading"));
        assert!(bytes.contains("<AppliedFont type=\"string\">Arial</AppliedFont>"));
        // the original value is untouched
        assert_eq!(styles.to_bytes().unwrap(), STYLES_XML.as_bytes());
    }

    #[test]
    fn test_font_mapping_without_match() {
        let styles = parse(STYLES_XML).unwrap();
        let mappings = FontMappings::compile(&[FontMapping::new("Courier", "Mono")]).unwrap();
        assert!(styles.with_font_mappings(&mappings).is_none());
        assert!(styles.with_font_mappings(&FontMappings::default()).is_none());
    }
}
