//! Cutting a parsed story into text units.
//!
//! Units are emitted as events in story order, and a [`StorySkeleton`]
//! records how to put each one back.

use super::element::{ReferenceElement, StoryChildElement, Table};
use super::parser::Story;
use super::special::{SpecialCharacter, may_contain_special};
use super::style_range::StyleRanges;
use crate::common::xml::{XmlEvent, event_text, events_to_bytes};
use crate::common::{IdGenerator, Result, root_id};
use crate::idml::event::{Code, CodeKind, DocumentPart, Event, Fragment, Group, TagType, TextUnit};
use crate::idml::markup::Element;
use crate::idml::parameters::Parameters;
use quick_xml::events::Event as XmlEventKind;
use std::rc::Rc;

/// What a story entry is rebuilt from.
#[derive(Debug, Clone, PartialEq)]
pub struct StorySkeleton {
    pub entry_name: String,
    /// The story without its children.
    pub story: Story,
    pub parts: Vec<StoryPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoryPart {
    /// Written back as it was read.
    Element(StoryChildElement),
    Unit(UnitSkeleton),
    Table(TableSkeleton),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSkeleton {
    pub id: String,
    /// The table without cells.
    pub table: Table,
    /// Each cell without children, and the parts of its content.
    pub cells: Vec<(ReferenceElement, Vec<StoryPart>)>,
}

/// One text unit, or a document part holding a unit without text.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSkeleton {
    pub id: String,
    /// Ranges of the first element; text outside any style code gets these.
    pub base: StyleRanges,
    /// The fragments as extracted.
    pub fragments: Vec<Fragment>,
    pub codes: Vec<(u32, CodeSource)>,
    /// Where each source `Content` begins. Text of neighbouring `Content`
    /// elements shares one fragment.
    pub content_starts: Vec<ContentStart>,
}

/// The start of a source `Content` within the extracted fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentStart {
    pub fragment: usize,
    /// Byte offset into a text fragment, zero for a code.
    pub offset: usize,
    pub ranges: StyleRanges,
}

impl UnitSkeleton {
    pub fn source(&self, id: u32) -> Option<&CodeSource> {
        self.codes.iter().find(|(code, _)| *code == id).map(|(_, source)| source)
    }
}

/// The markup a code stands for.
#[derive(Debug, Clone, PartialEq)]
pub enum CodeSource {
    /// Character ranges of the enclosed text.
    Style(StyleRanges),
    /// The hyperlink without children, and the ranges of its first child.
    Hyperlink {
        element: ReferenceElement,
        base: StyleRanges,
    },
    /// A character kept in the content.
    Character(char),
    /// An event kept in the content, such as a processing instruction.
    Event(XmlEvent),
    Element(StoryChildElement),
    /// A footnote or note without children, and the parts of its content.
    Reference {
        element: StoryChildElement,
        parts: Vec<StoryPart>,
    },
}

/// Fragments and codes of the unit being built.
#[derive(Debug, Default)]
struct UnitBuilder {
    fragments: Vec<Fragment>,
    codes: Vec<(u32, CodeSource)>,
    last_id: u32,
    content_starts: Vec<ContentStart>,
    /// Ranges of a `Content` that has begun with nothing recorded yet.
    content_pending: Option<StyleRanges>,
}

impl UnitBuilder {
    fn begin_content(&mut self, ranges: &StyleRanges) {
        self.content_pending = Some(ranges.clone());
    }

    /// Record a pending `Content` start before the next code.
    fn boundary(&mut self) {
        if let Some(ranges) = self.content_pending.take() {
            self.content_starts.push(ContentStart {
                fragment: self.fragments.len(),
                offset: 0,
                ranges,
            });
        }
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(ranges) = self.content_pending.take() {
            let (fragment, offset) = match self.fragments.last() {
                Some(Fragment::Text(last)) => (self.fragments.len() - 1, last.len()),
                _ => (self.fragments.len(), 0),
            };
            self.content_starts.push(ContentStart {
                fragment,
                offset,
                ranges,
            });
        }
        match self.fragments.last_mut() {
            Some(Fragment::Text(last)) => last.push_str(text),
            _ => self.fragments.push(Fragment::Text(text.to_string())),
        }
    }

    /// Register a new code source and return its id.
    fn source(&mut self, source: CodeSource) -> u32 {
        self.last_id += 1;
        self.codes.push((self.last_id, source));
        self.last_id
    }

    fn code(&mut self, id: u32, tag_type: TagType, kind: CodeKind, data: String) {
        self.boundary();
        self.fragments.push(Fragment::Code(Code::new(id, tag_type, kind, data)));
    }

    fn placeholder(&mut self, kind: CodeKind, data: String, source: CodeSource) {
        self.labelled_placeholder(kind, data, None, source);
    }

    fn labelled_placeholder(&mut self, kind: CodeKind, data: String, display: Option<&'static str>, source: CodeSource) {
        let id = self.source(source);
        self.boundary();
        self.fragments
            .push(Fragment::Code(Code::new(id, TagType::Placeholder, kind, data).with_display(display)));
    }
}

/// Style code state within a unit or a hyperlink.
struct Scope {
    base: StyleRanges,
    open: Option<(u32, StyleRanges)>,
}

impl Scope {
    fn new(base: StyleRanges) -> Self {
        Self { base, open: None }
    }

    /// Open or close style codes so that `ranges` are in effect.
    fn switch(&mut self, ranges: &StyleRanges, unit: &mut UnitBuilder) -> Result<()> {
        let target = (*ranges != self.base).then_some(ranges);
        if let (Some((_, open)), Some(target)) = (&self.open, target) {
            if open == target {
                return Ok(());
            }
        }
        self.close(unit);
        if let Some(target) = target {
            let mut events = Vec::new();
            target.character.write_start(&mut events);
            let data = markup(&events)?;
            let id = unit.source(CodeSource::Style(target.clone()));
            unit.code(id, TagType::Opening, CodeKind::Style, data);
            self.open = Some((id, target.clone()));
        }
        Ok(())
    }

    fn close(&mut self, unit: &mut UnitBuilder) {
        if let Some((id, ranges)) = self.open.take() {
            let data = format!("</{}>", ranges.character.name());
            unit.code(id, TagType::Closing, CodeKind::Style, data);
        }
    }
}

/// Builds the events and skeleton of one story entry.
pub struct StoryAccumulator<'p> {
    parameters: &'p Parameters,
    text_unit_ids: IdGenerator,
    document_part_ids: IdGenerator,
    group_ids: IdGenerator,
    events: Vec<Event>,
}

impl<'p> StoryAccumulator<'p> {
    pub fn new(entry_name: &str, parameters: &'p Parameters) -> Self {
        let root = root_id(entry_name);
        Self {
            parameters,
            text_unit_ids: IdGenerator::new(root.clone(), "tu"),
            document_part_ids: IdGenerator::new(root.clone(), "dp"),
            group_ids: IdGenerator::new(root, "sg"),
            events: Vec::new(),
        }
    }

    /// The events between the sub-document start and end, and the skeleton.
    pub fn accumulate(mut self, entry_name: &str, story: Story) -> Result<(Vec<Event>, StorySkeleton)> {
        let parts = self.parts(&story.elements)?;
        log::debug!("{}: {} events from {} story parts", entry_name, self.events.len(), parts.len());
        let skeleton = StorySkeleton {
            entry_name: entry_name.to_string(),
            story: story.with_elements(Vec::new()),
            parts,
        };
        Ok((self.events, skeleton))
    }

    fn parts(&mut self, elements: &[StoryChildElement]) -> Result<Vec<StoryPart>> {
        let mut parts = Vec::new();
        let mut pending: Vec<&StoryChildElement> = Vec::new();
        for element in elements {
            match element {
                StoryChildElement::Markup(_) => {
                    self.flush(&mut pending, &mut parts)?;
                    let id = self.document_part_ids.create_id();
                    self.events.push(Event::DocumentPart(DocumentPart { id, entry: None }));
                    parts.push(StoryPart::Element(element.clone()));
                },
                StoryChildElement::Table(table) => {
                    self.flush(&mut pending, &mut parts)?;
                    parts.push(StoryPart::Table(self.table(table)?));
                },
                StoryChildElement::Break(_) if !self.parameters.extract_breaks_inline => {
                    self.flush(&mut pending, &mut parts)?;
                    parts.push(StoryPart::Element(element.clone()));
                },
                _ => {
                    if pending.first().is_some_and(|first| !same_paragraph(first, element)) {
                        self.flush(&mut pending, &mut parts)?;
                    }
                    pending.push(element);
                },
            }
        }
        self.flush(&mut pending, &mut parts)?;
        Ok(parts)
    }

    fn table(&mut self, table: &Table) -> Result<TableSkeleton> {
        let id = self.group_ids.create_id();
        self.events.push(Event::StartGroup(Group { id: id.clone() }));
        let mut cells = Vec::with_capacity(table.cells.len());
        for cell in &table.cells {
            let parts = self.parts(&cell.children)?;
            cells.push((cell.with_children(Vec::new()), parts));
        }
        self.events.push(Event::EndGroup(Group { id: id.clone() }));
        Ok(TableSkeleton {
            id,
            table: table.with_cells(Vec::new()),
            cells,
        })
    }

    /// Turn the pending run into one unit.
    fn flush(&mut self, pending: &mut Vec<&StoryChildElement>, parts: &mut Vec<StoryPart>) -> Result<()> {
        let Some(first) = pending.first() else {
            return Ok(());
        };
        let base = first.style_ranges().cloned().unwrap_or_default();
        let mut unit = UnitBuilder::default();
        let mut scope = Scope::new(base.clone());
        for element in pending.drain(..) {
            self.add_element(element, &mut scope, &mut unit)?;
        }
        scope.close(&mut unit);

        let mut text_unit = TextUnit::new(String::new(), unit.fragments);
        let id = if text_unit.has_text() {
            let id = self.text_unit_ids.create_id();
            text_unit.id = id.clone();
            self.events.push(Event::TextUnit(text_unit.clone()));
            id
        } else {
            let id = self.document_part_ids.create_id();
            self.events.push(Event::DocumentPart(DocumentPart {
                id: id.clone(),
                entry: None,
            }));
            id
        };
        parts.push(StoryPart::Unit(UnitSkeleton {
            id,
            base,
            fragments: text_unit.fragments,
            codes: unit.codes,
            content_starts: unit.content_starts,
        }));
        Ok(())
    }

    fn add_element(&mut self, element: &StoryChildElement, scope: &mut Scope, unit: &mut UnitBuilder) -> Result<()> {
        if let Some(ranges) = element.style_ranges() {
            scope.switch(ranges, unit)?;
        }
        match element {
            StoryChildElement::Content(e) => {
                unit.begin_content(&e.style_ranges);
                self.add_content(&e.element, unit)?
            },
            StoryChildElement::Break(_) => {
                unit.placeholder(CodeKind::Break, element_markup(element)?, CodeSource::Element(element.clone()))
            },
            StoryChildElement::HyperlinkTextSource(reference) => {
                let base = reference
                    .children
                    .first()
                    .and_then(|c| c.style_ranges())
                    .cloned()
                    .unwrap_or_default();
                let data = markup(&[XmlEventKind::Start(reference.start.clone())])?;
                let id = unit.source(CodeSource::Hyperlink {
                    element: reference.with_children(Vec::new()),
                    base: base.clone(),
                });
                unit.code(id, TagType::Opening, CodeKind::Hyperlink, data);
                let mut inner = Scope::new(base);
                for child in &reference.children {
                    self.add_element(child, &mut inner, unit)?;
                }
                inner.close(unit);
                let end = format!("</{}>", crate::common::xml::qname(&reference.start));
                unit.code(id, TagType::Closing, CodeKind::Hyperlink, end);
            },
            StoryChildElement::Footnote(reference) | StoryChildElement::Note(reference)
                if matches!(element, StoryChildElement::Footnote(_)) || self.parameters.extract_notes =>
            {
                let data = markup(&[XmlEventKind::Empty(reference.start.clone())])?;
                let parts = self.parts(&reference.children)?;
                unit.placeholder(
                    CodeKind::Reference,
                    data,
                    CodeSource::Reference {
                        element: element.with_children(Vec::new()),
                        parts,
                    },
                );
            },
            _ => unit.placeholder(CodeKind::Element, element_markup(element)?, CodeSource::Element(element.clone())),
        }
        Ok(())
    }

    fn add_content(&self, content: &Element, unit: &mut UnitBuilder) -> Result<()> {
        for event in &content.inner {
            if let Some(text) = event_text(event)? {
                self.add_text(&text, unit);
                continue;
            }
            let (kind, display) = match event {
                XmlEventKind::PI(pi) => {
                    let special = SpecialCharacter::from_instruction(&String::from_utf8_lossy(pi.as_ref()));
                    (CodeKind::Instruction, special.label())
                },
                _ => (CodeKind::Element, None),
            };
            let data = markup(std::slice::from_ref(event))?;
            unit.labelled_placeholder(kind, data, display, CodeSource::Event(event.clone()));
        }
        Ok(())
    }

    fn add_text(&self, text: &str, unit: &mut UnitBuilder) {
        if !may_contain_special(text) {
            unit.text(text);
            return;
        }
        let mut run = String::with_capacity(text.len());
        for ch in text.chars() {
            let special = SpecialCharacter::from_char(ch);
            if special == SpecialCharacter::DiscretionaryHyphen && self.parameters.skip_discretionary_hyphens {
                continue;
            }
            if special.is_code() {
                unit.text(&run);
                run.clear();
                unit.labelled_placeholder(CodeKind::Character, ch.to_string(), special.label(), CodeSource::Character(ch));
            } else {
                run.push(ch);
            }
        }
        unit.text(&run);
    }
}

/// Whether both elements sit in the same source paragraph range.
fn same_paragraph(a: &StoryChildElement, b: &StoryChildElement) -> bool {
    match (a.style_ranges(), b.style_ranges()) {
        (Some(a), Some(b)) => Rc::ptr_eq(&a.paragraph, &b.paragraph),
        (None, None) => true,
        _ => false,
    }
}

fn markup(events: &[XmlEvent]) -> Result<String> {
    Ok(String::from_utf8_lossy(&events_to_bytes(events)?).into_owned())
}

fn element_markup(element: &StoryChildElement) -> Result<String> {
    let mut events = Vec::new();
    element.write_events(&mut events);
    markup(&events)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::idml::event::EventKind;
    use crate::idml::story::parser::tests::{parse_story, story_xml};

    pub(crate) fn accumulate(body: &str, parameters: &Parameters) -> (Vec<Event>, StorySkeleton) {
        let story = parse_story(&story_xml(body), parameters.untag_xml_structures).unwrap();
        StoryAccumulator::new("Stories/Story_u1.xml", parameters)
            .accumulate("Stories/Story_u1.xml", story)
            .unwrap()
    }

    fn units(events: &[Event]) -> Vec<String> {
        events
            .iter()
            .filter_map(Event::as_text_unit)
            .map(|u| u.to_string())
            .collect()
    }

    fn kinds(events: &[Event]) -> Vec<EventKind> {
        events.iter().map(Event::kind).collect()
    }

    const P: &str = "<ParagraphStyleRange AppliedParagraphStyle=\"ParagraphStyle/p\">";
    const C: &str = "<CharacterStyleRange AppliedCharacterStyle=\"CharacterStyle/c\">";

    #[test]
    fn test_paragraph_becomes_one_unit() {
        let body = format!("{}{}<Content>Hello world</Content></CharacterStyleRange></ParagraphStyleRange>", P, C);
        let (events, skeleton) = accumulate(&body, &Parameters::default());
        assert_eq!(units(&events), vec!["Hello world"]);
        let unit = events[0].as_text_unit().unwrap();
        assert_eq!(unit.id, format!("{}-tu1", root_id("Stories/Story_u1.xml")));
        assert_eq!(skeleton.parts.len(), 1);
    }

    #[test]
    fn test_character_range_change_becomes_paired_codes() {
        let body = format!(
            "{}{}<Content>Plain </Content></CharacterStyleRange><CharacterStyleRange FontStyle=\"Bold\"><Content>bold</Content></CharacterStyleRange>{}<Content> again</Content></CharacterStyleRange></ParagraphStyleRange>",
            P, C, C
        );
        let (events, _) = accumulate(&body, &Parameters::default());
        assert_eq!(units(&events), vec!["Plain <1>bold</1> again"]);
        let unit = events[0].as_text_unit().unwrap();
        let code = unit.codes().next().unwrap();
        assert_eq!(code.kind, CodeKind::Style);
        assert!(code.data.contains("FontStyle=\"Bold\""));
    }

    #[test]
    fn test_breaks_split_units_unless_inline() {
        let body = format!(
            "{}{}<Content>One</Content><Br/><Content>Two</Content></CharacterStyleRange></ParagraphStyleRange>",
            P, C
        );
        let (events, skeleton) = accumulate(&body, &Parameters::default());
        assert_eq!(units(&events), vec!["One", "Two"]);
        assert!(matches!(skeleton.parts[1], StoryPart::Element(StoryChildElement::Break(_))));

        let mut inline = Parameters::default();
        inline.extract_breaks_inline = true;
        let (events, _) = accumulate(&body, &inline);
        assert_eq!(units(&events), vec!["One<1/>Two"]);
    }

    #[test]
    fn test_paragraph_change_splits_units() {
        let body = format!(
            "{}{}<Content>First</Content></CharacterStyleRange></ParagraphStyleRange><ParagraphStyleRange AppliedParagraphStyle=\"ParagraphStyle/q\">{}<Content>Second</Content></CharacterStyleRange></ParagraphStyleRange>",
            P, C, C
        );
        let (events, _) = accumulate(&body, &Parameters::default());
        assert_eq!(units(&events), vec!["First", "Second"]);
    }

    #[test]
    fn test_special_characters_and_instructions() {
        let body = format!(
            "{}{}<Content>Tab<?ACE 7?>here&#x2028;soft\u{00AD}hyphen</Content></CharacterStyleRange></ParagraphStyleRange>",
            P, C
        );
        let (events, _) = accumulate(&body, &Parameters::default());
        assert_eq!(units(&events), vec!["Tab<1/>here<2/>soft\u{00AD}hyphen"]);
        let unit = events[0].as_text_unit().unwrap();
        let kinds: Vec<CodeKind> = unit.codes().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![CodeKind::Instruction, CodeKind::Character]);

        let mut skip = Parameters::default();
        skip.skip_discretionary_hyphens = true;
        let (events, _) = accumulate(&body, &skip);
        assert_eq!(units(&events), vec!["Tab<1/>here<2/>softhyphen"]);
    }

    #[test]
    fn test_literal_line_separator_is_a_code() {
        let body = format!(
            "{}{}<Content>one\u{2028}two<?ACE 7?></Content></CharacterStyleRange></ParagraphStyleRange>",
            P, C
        );
        let (events, skeleton) = accumulate(&body, &Parameters::default());
        assert_eq!(units(&events), vec!["one<1/>two<2/>"]);
        let unit = events[0].as_text_unit().unwrap();
        let displays: Vec<Option<&str>> = unit.codes().map(|c| c.display).collect();
        assert_eq!(displays, vec![Some("forced line break"), Some("indent to here")]);
        let StoryPart::Unit(part) = &skeleton.parts[0] else {
            panic!("expected a unit");
        };
        assert!(matches!(part.source(1), Some(CodeSource::Character('\u{2028}'))));
    }

    #[test]
    fn test_content_starts_recorded() {
        let body = format!(
            "{}{}<Content>ab</Content><Content>c</Content><Content><?ACE 7?>d</Content></CharacterStyleRange></ParagraphStyleRange>",
            P, C
        );
        let (_, skeleton) = accumulate(&body, &Parameters::default());
        let StoryPart::Unit(unit) = &skeleton.parts[0] else {
            panic!("expected a unit");
        };
        let starts: Vec<(usize, usize)> = unit.content_starts.iter().map(|s| (s.fragment, s.offset)).collect();
        assert_eq!(starts, vec![(0, 0), (0, 2), (1, 0)]);
    }

    #[test]
    fn test_footnote_units_come_first() {
        let body = format!(
            "{}{}<Content>Main</Content><Footnote><ParagraphStyleRange><CharacterStyleRange><Content>Foot</Content></CharacterStyleRange></ParagraphStyleRange></Footnote></CharacterStyleRange></ParagraphStyleRange>",
            P, C
        );
        let (events, _) = accumulate(&body, &Parameters::default());
        assert_eq!(units(&events), vec!["Foot", "Main<1/>"]);
    }

    #[test]
    fn test_notes_only_extracted_on_request() {
        let body = format!(
            "{}{}<Content>Main</Content><Note><ParagraphStyleRange><CharacterStyleRange><Content>Remark</Content></CharacterStyleRange></ParagraphStyleRange></Note></CharacterStyleRange></ParagraphStyleRange>",
            P, C
        );
        let (events, _) = accumulate(&body, &Parameters::default());
        assert_eq!(units(&events), vec!["Main<1/>"]);
        assert_eq!(events[0].as_text_unit().unwrap().codes().next().unwrap().kind, CodeKind::Element);

        let mut notes = Parameters::default();
        notes.extract_notes = true;
        let (events, _) = accumulate(&body, &notes);
        assert_eq!(units(&events), vec!["Remark", "Main<1/>"]);
    }

    #[test]
    fn test_hyperlink_codes_wrap_its_text() {
        let body = format!(
            "{}{}<Content>See </Content><HyperlinkTextSource Self=\"h1\" Name=\"link\"><Content>here</Content></HyperlinkTextSource></CharacterStyleRange></ParagraphStyleRange>",
            P, C
        );
        let (events, _) = accumulate(&body, &Parameters::default());
        assert_eq!(units(&events), vec!["See <1>here</1>"]);
    }

    #[test]
    fn test_table_is_a_group() {
        let body = format!(
            "{}{}<Table Self=\"t\"><Row Self=\"r\"/><Cell Self=\"c1\"><ParagraphStyleRange><CharacterStyleRange><Content>A</Content></CharacterStyleRange></ParagraphStyleRange></Cell><Cell Self=\"c2\"><ParagraphStyleRange><CharacterStyleRange><Content>B</Content></CharacterStyleRange></ParagraphStyleRange></Cell></Table></CharacterStyleRange></ParagraphStyleRange>",
            P, C
        );
        let (events, _) = accumulate(&body, &Parameters::default());
        assert_eq!(
            kinds(&events),
            vec![EventKind::StartGroup, EventKind::TextUnit, EventKind::TextUnit, EventKind::EndGroup]
        );
        assert_eq!(units(&events), vec!["A", "B"]);
    }

    #[test]
    fn test_markup_and_empty_units_are_document_parts() {
        let body = format!(
            "<StoryPreference/>{}{}<Content>  </Content></CharacterStyleRange></ParagraphStyleRange>",
            P, C
        );
        let (events, skeleton) = accumulate(&body, &Parameters::default());
        assert_eq!(kinds(&events), vec![EventKind::DocumentPart, EventKind::DocumentPart]);
        let StoryPart::Unit(unit) = &skeleton.parts[1] else {
            panic!("expected a unit");
        };
        assert!(unit.id.ends_with("-dp2"));
    }
}
