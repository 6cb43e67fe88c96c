//! Rebuilding story XML from a skeleton and (possibly translated) text units.

use super::accumulator::{CodeSource, ContentStart, StoryPart, StorySkeleton, UnitSkeleton};
use super::element::{CONTENT, ReferenceElement, StoryChildElement, StyledElement};
use super::style_range::StyleRanges;
use crate::common::xml::{XmlEvent, escape_text};
use crate::common::{Error, Result};
use crate::idml::event::{Fragment, TagType, TextUnit};
use crate::idml::markup::Element;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use smallvec::SmallVec;
use std::collections::HashMap;

impl StorySkeleton {
    /// Serialize the story, taking each unit's fragments from `units` when
    /// a unit with its id is present.
    pub fn regenerate(&self, units: &HashMap<String, TextUnit>) -> Result<Vec<u8>> {
        let elements = regenerate_parts(&self.parts, units)?;
        self.story.with_elements(elements).to_bytes()
    }
}

fn regenerate_parts(parts: &[StoryPart], units: &HashMap<String, TextUnit>) -> Result<Vec<StoryChildElement>> {
    let mut elements = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            StoryPart::Element(element) => elements.push(element.clone()),
            StoryPart::Unit(unit) => elements.extend(regenerate_unit(unit, units)?),
            StoryPart::Table(table) => {
                let mut cells = Vec::with_capacity(table.cells.len());
                for (cell, parts) in &table.cells {
                    cells.push(cell.with_children(regenerate_parts(parts, units)?));
                }
                elements.push(StoryChildElement::Table(table.table.with_cells(cells)));
            },
        }
    }
    Ok(elements)
}

/// Elements under construction: the whole unit, or the inside of a hyperlink.
struct Sink<'s> {
    base: StyleRanges,
    styles: SmallVec<[StyleRanges; 4]>,
    /// Inner events of the `Content` being filled.
    content: Vec<XmlEvent>,
    /// Ranges of the source `Content` being filled, when known.
    content_ranges: Option<StyleRanges>,
    elements: Vec<StoryChildElement>,
    hyperlink: Option<(u32, &'s ReferenceElement)>,
}

impl<'s> Sink<'s> {
    fn new(base: StyleRanges, hyperlink: Option<(u32, &'s ReferenceElement)>) -> Self {
        Self {
            base,
            styles: SmallVec::new(),
            content: Vec::new(),
            content_ranges: None,
            elements: Vec::new(),
            hyperlink,
        }
    }

    /// Close the pending `Content` and start one in the given ranges.
    fn begin_content(&mut self, ranges: &StyleRanges) {
        self.flush();
        self.content_ranges = Some(ranges.clone());
    }

    fn ranges(&self) -> &StyleRanges {
        self.styles.last().unwrap_or(&self.base)
    }

    fn text(&mut self, text: &str) {
        if !text.is_empty() {
            self.content.push(Event::Text(BytesText::from_escaped(escape_text(text))));
        }
    }

    /// Close the pending `Content`, if any.
    fn flush(&mut self) {
        if self.content.is_empty() {
            return;
        }
        let element = Element::new(
            BytesStart::new(CONTENT),
            std::mem::take(&mut self.content),
            Some(BytesEnd::new(CONTENT)),
        );
        let ranges = match self.content_ranges.take() {
            Some(ranges) => ranges,
            None => self.ranges().clone(),
        };
        self.elements.push(StoryChildElement::Content(StyledElement::new(element, ranges)));
    }

    fn push(&mut self, element: StoryChildElement) {
        self.flush();
        self.elements.push(element);
    }

    fn finish(mut self) -> Vec<StoryChildElement> {
        self.flush();
        self.elements
    }
}

fn regenerate_unit(unit: &UnitSkeleton, units: &HashMap<String, TextUnit>) -> Result<Vec<StoryChildElement>> {
    // Source `Content` boundaries only apply to the fragments they were
    // recorded on; changed text is written as one `Content` per run.
    let (fragments, content_starts) = match units.get(&unit.id) {
        Some(changed) if changed.fragments != unit.fragments => (changed.fragments.as_slice(), &[][..]),
        _ => (unit.fragments.as_slice(), unit.content_starts.as_slice()),
    };
    let mut content_starts = content_starts.iter().peekable();
    let mut sinks: SmallVec<[Sink<'_>; 2]> = SmallVec::new();
    sinks.push(Sink::new(unit.base.clone(), None));

    for (index, fragment) in fragments.iter().enumerate() {
        let Some(sink) = sinks.last_mut() else {
            return Err(Error::Other("no open element list".to_string()));
        };
        let mut starts: SmallVec<[&ContentStart; 4]> = SmallVec::new();
        while let Some(start) = content_starts.next_if(|start| start.fragment == index) {
            starts.push(start);
        }
        let code = match fragment {
            Fragment::Text(text) => {
                let mut from = 0;
                for start in starts {
                    if let Some(piece) = text.get(from..start.offset) {
                        sink.text(piece);
                        from = start.offset;
                    }
                    sink.begin_content(&start.ranges);
                }
                sink.text(text.get(from..).unwrap_or_default());
                continue;
            },
            Fragment::Code(code) => code,
        };
        for start in starts {
            sink.begin_content(&start.ranges);
        }
        let source = unit.source(code.id).ok_or_else(|| {
            Error::BadInput(format!("Unknown code id {} in text unit {}", code.id, unit.id))
        })?;
        match (code.tag_type, source) {
            (TagType::Opening, CodeSource::Style(ranges)) => {
                sink.flush();
                sink.styles.push(ranges.clone());
            },
            (TagType::Closing, CodeSource::Style(_)) => {
                sink.flush();
                sink.styles.pop();
            },
            (TagType::Opening, CodeSource::Hyperlink { element, base }) => {
                sink.flush();
                sinks.push(Sink::new(base.clone(), Some((code.id, element))));
            },
            (TagType::Closing, CodeSource::Hyperlink { .. }) => {
                let inner = match sinks.pop() {
                    Some(inner) if !sinks.is_empty() && inner.hyperlink.is_some_and(|(id, _)| id == code.id) => inner,
                    _ => {
                        return Err(Error::BadInput(format!(
                            "Unbalanced hyperlink code {} in text unit {}",
                            code.id, unit.id
                        )));
                    },
                };
                let element = inner.hyperlink.map(|(_, element)| element.clone());
                let children = inner.finish();
                if let (Some(parent), Some(element)) = (sinks.last_mut(), element) {
                    parent.push(StoryChildElement::HyperlinkTextSource(element.with_children(children)));
                }
            },
            (_, CodeSource::Character(ch)) => sink.text(ch.encode_utf8(&mut [0u8; 4])),
            (_, CodeSource::Event(event)) => sink.content.push(event.clone()),
            (_, CodeSource::Element(element)) => sink.push(element.clone()),
            (_, CodeSource::Reference { element, parts }) => {
                let children = regenerate_parts(parts, units)?;
                sink.push(element.with_children(children));
            },
            (tag_type, _) => {
                return Err(Error::BadInput(format!(
                    "Code {} in text unit {} cannot be {:?}",
                    code.id, unit.id, tag_type
                )));
            },
        }
    }

    if sinks.len() != 1 {
        return Err(Error::BadInput(format!("Unclosed hyperlink code in text unit {}", unit.id)));
    }
    Ok(sinks.pop().map(Sink::finish).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idml::event::Event as FilterEvent;
    use crate::idml::parameters::Parameters;
    use crate::idml::story::accumulator::tests::accumulate;
    use crate::idml::story::parser::tests::story_xml;

    fn round_trip(body: &str, parameters: &Parameters, translate: impl Fn(&str) -> String) -> String {
        let (events, skeleton) = accumulate(body, parameters);
        let units: HashMap<String, TextUnit> = events
            .iter()
            .filter_map(FilterEvent::as_text_unit)
            .map(|u| (u.id.clone(), u.map_text(&translate)))
            .collect();
        String::from_utf8(skeleton.regenerate(&units).unwrap()).unwrap()
    }

    const P: &str = "<ParagraphStyleRange AppliedParagraphStyle=\"ParagraphStyle/p\">";
    const C: &str = "<CharacterStyleRange AppliedCharacterStyle=\"CharacterStyle/c\">";
    const B: &str = "<CharacterStyleRange AppliedCharacterStyle=\"CharacterStyle/c\" FontStyle=\"Bold\">";

    #[test]
    fn test_untranslated_story_is_unchanged() {
        let body = format!(
            "<StoryPreference/>{P}{C}<Content>Plain </Content></CharacterStyleRange>{B}<Content>bold</Content></CharacterStyleRange>{C}<Content> tab<?ACE 7?>here</Content><Br/><Content>next &amp; last</Content><Content> and more</Content><HyperlinkTextSource Self=\"h\"><Content>x</Content><Content>y</Content></HyperlinkTextSource><Content>a</Content><Content><?ACE 18?>b</Content></CharacterStyleRange></ParagraphStyleRange>"
        );
        let xml = story_xml(&body);
        assert_eq!(round_trip(&body, &Parameters::default(), str::to_string), xml);

        let mut inline = Parameters::default();
        inline.extract_breaks_inline = true;
        assert_eq!(round_trip(&body, &inline, str::to_string), xml);
    }

    #[test]
    fn test_equal_paragraph_ranges_stay_apart() {
        let body = format!(
            "{P}{C}<Content>a</Content><Br/></CharacterStyleRange></ParagraphStyleRange>{P}{C}<Content>b</Content></CharacterStyleRange></ParagraphStyleRange>{P}{C}<Content>c</Content></CharacterStyleRange>{C}<Content>d</Content></CharacterStyleRange></ParagraphStyleRange>"
        );
        let out = round_trip(&body, &Parameters::default(), str::to_string);
        assert_eq!(out.matches("<ParagraphStyleRange").count(), 3);
        assert_eq!(out.matches("<CharacterStyleRange").count(), 4);
        assert_eq!(out, story_xml(&body));
    }

    #[test]
    fn test_forced_line_break_round_trips() {
        let body = format!("{P}{C}<Content>one\u{2028}two</Content></CharacterStyleRange></ParagraphStyleRange>");
        let xml = story_xml(&body);
        assert_eq!(round_trip(&body, &Parameters::default(), str::to_string), xml);
        assert!(round_trip(&body, &Parameters::default(), |t| t.to_uppercase()).contains("<Content>ONE\u{2028}TWO</Content>"));
    }

    #[test]
    fn test_translated_contents_are_joined() {
        let body = format!("{P}{C}<Content>one </Content><Content>two</Content></CharacterStyleRange></ParagraphStyleRange>");
        let out = round_trip(&body, &Parameters::default(), |t| t.replace("one two", "eins zwei"));
        assert!(out.contains(&format!("{P}{C}<Content>eins zwei</Content></CharacterStyleRange></ParagraphStyleRange>")));
    }

    #[test]
    fn test_translation_replaces_text_and_keeps_codes() {
        let body = format!(
            "{P}{C}<Content>Plain </Content></CharacterStyleRange>{B}<Content>bold</Content></CharacterStyleRange></ParagraphStyleRange>"
        );
        let out = round_trip(&body, &Parameters::default(), |t| t.to_uppercase().replace('A', "<&>"));
        assert!(out.contains(&format!("{P}{C}<Content>PL&lt;&amp;&gt;IN </Content></CharacterStyleRange>{B}<Content>BOLD</Content>")));
    }

    #[test]
    fn test_footnote_and_table_translated() {
        let body = format!(
            "{P}{C}<Content>Main</Content><Footnote><ParagraphStyleRange><CharacterStyleRange><Content>foot</Content></CharacterStyleRange></ParagraphStyleRange></Footnote><Table Self=\"t\"><Cell Self=\"c\"><ParagraphStyleRange><CharacterStyleRange><Content>cell</Content></CharacterStyleRange></ParagraphStyleRange></Cell></Table></CharacterStyleRange></ParagraphStyleRange>"
        );
        let out = round_trip(&body, &Parameters::default(), |t| t.to_uppercase());
        assert!(out.contains("<Content>FOOT</Content>"));
        assert!(out.contains("<Content>CELL</Content>"));
        assert!(out.contains("<Content>MAIN</Content>"));
        assert_eq!(out.to_lowercase(), story_xml(&body).to_lowercase());
    }

    #[test]
    fn test_hyperlink_rebuilt() {
        let body = format!(
            "{P}{C}<Content>See </Content><HyperlinkTextSource Self=\"h\"><Content>here</Content></HyperlinkTextSource></CharacterStyleRange></ParagraphStyleRange>"
        );
        let out = round_trip(&body, &Parameters::default(), |t| t.replace("here", "there"));
        assert!(out.contains("<HyperlinkTextSource Self=\"h\"><Content>there</Content></HyperlinkTextSource>"));
    }

    #[test]
    fn test_unknown_code_id_is_bad_input() {
        let body = format!("{P}{C}<Content>a<?ACE 7?>b</Content></CharacterStyleRange></ParagraphStyleRange>");
        let (events, skeleton) = accumulate(&body, &Parameters::default());
        let mut unit = events[0].as_text_unit().unwrap().clone();
        for fragment in unit.fragments.iter_mut() {
            if let Fragment::Code(code) = fragment {
                code.id = 42;
            }
        }
        let units = HashMap::from([(unit.id.clone(), unit)]);
        assert!(matches!(skeleton.regenerate(&units), Err(Error::BadInput(_))));
    }
}
