//! Document orchestration: opening a package, computing the translation
//! order and turning each zip entry into events.

use crate::common::id::Counter;
use crate::common::{Error, IdGenerator, Result, root_id};
use crate::idml::core::design_map::DesignMap;
use crate::idml::core::package::{MIME_TYPE, Package, part_names};
use crate::idml::core::preferences::Preferences;
use crate::idml::core::styles::StyleDefinitions;
use crate::idml::event::{
    DocumentPart, EndSubDocument, Ending, Event, StartDocument, StartSubDocument, SubDocumentSkeleton,
};
use crate::idml::parameters::{FontMappings, Parameters, StyleIgnorances};
use crate::idml::skeleton::SkeletonEntry;
use crate::idml::spread::{PasteboardItem, Spread, VisibilityFilter, ordered_pasteboard_items, story_ids};
use crate::idml::story::{Story, StoryAccumulator, StoryChildElementsMerger, StoryParser};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

pub const START_DOCUMENT_ID: &str = "sd";
pub const END_DOCUMENT_ID: &str = "ed";

/// How a zip entry is turned into events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubDocument {
    /// A story part in the translatable order.
    Story { id: String, name: String },
    /// The style definitions, rewritten when font mappings apply.
    Styles { name: String },
    /// Anything else, carried as its original bytes.
    PassThrough { name: String },
}

impl SubDocument {
    pub fn name(&self) -> &str {
        match self {
            Self::Story { name, .. } | Self::Styles { name } | Self::PassThrough { name } => name,
        }
    }
}

/// An opened IDML package.
pub struct Document<R> {
    package: Package<R>,
    name: Option<String>,
    parameters: Parameters,
    font_mappings: FontMappings,
    ignorances: StyleIgnorances,
    design_map: DesignMap,
    preferences: Preferences,
    styles: StyleDefinitions,
    /// Entries that are never story sub-documents.
    non_translatable: HashSet<String>,
    /// Entry names in dispatch order, reversed so the next one pops off.
    pending: Vec<String>,
    sub_document_ids: Counter,
}

impl Document<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P, parameters: Parameters) -> Result<Self> {
        let name = path.as_ref().to_string_lossy().into_owned();
        let mut document = Self::from_reader(Package::open(path)?, parameters)?;
        document.name = Some(name);
        Ok(document)
    }
}

impl<R: Read + Seek> Document<R> {
    /// Read the package metadata and compute the order entries are
    /// dispatched in.
    pub fn from_reader(package: Package<R>, parameters: Parameters) -> Result<Self> {
        let font_mappings = parameters.compiled_font_mappings()?;
        let ignorances = parameters.style_ignorances();
        let max = parameters.max_attribute_size;

        let design_map = DesignMap::parse(&mut package.xml_reader(part_names::DESIGN_MAP, max)?)?;
        let preferences_name = design_map
            .preferences
            .as_deref()
            .ok_or_else(|| Error::MissingEntry("design map names no preferences part".to_string()))?;
        let preferences = Preferences::parse(&mut package.xml_reader(preferences_name, max)?)?;
        let styles_name = design_map
            .styles
            .as_deref()
            .ok_or_else(|| Error::MissingEntry("design map names no styles part".to_string()))?;
        let styles = StyleDefinitions::parse(&mut package.xml_reader(styles_name, max)?)?;

        let master_spreads = parse_spreads(&package, &design_map, &design_map.master_spreads, max)?;
        let spreads = parse_spreads(&package, &design_map, &design_map.spreads, max)?;
        let (visible, invisible) = split_pasteboard_items(&master_spreads, &spreads, &design_map, &preferences, &parameters)?;

        let story_part_names = design_map.story_part_names(&story_ids(&visible));
        let invisible_story_part_names = design_map.story_part_names(&story_ids(&invisible));
        log::debug!(
            "{} translatable and {} non-translatable story parts",
            story_part_names.len(),
            invisible_story_part_names.len()
        );

        let non_translatable = design_map.part_names(&invisible_story_part_names).into_iter().collect();
        let pending = dispatch_order(package.entry_names(), &design_map.part_names(&story_part_names));

        Ok(Self {
            package,
            name: None,
            parameters,
            font_mappings,
            ignorances,
            design_map,
            preferences,
            styles,
            non_translatable,
            pending,
            sub_document_ids: Counter::default(),
        })
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn design_map(&self) -> &DesignMap {
        &self.design_map
    }

    pub fn start_event(&self) -> Event {
        Event::StartDocument(StartDocument {
            id: START_DOCUMENT_ID.to_string(),
            name: self.name.clone(),
            mime_type: MIME_TYPE,
        })
    }

    pub fn end_event(&self) -> Event {
        Event::EndDocument(Ending {
            id: END_DOCUMENT_ID.to_string(),
        })
    }

    pub fn has_next_sub_document(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn next_sub_document(&mut self) -> Option<SubDocument> {
        let name = self.pending.pop()?;
        let sub_document = if self.is_story(&name) {
            SubDocument::Story {
                id: self.sub_document_ids.next_id(),
                name,
            }
        } else if self.design_map.styles.as_deref() == Some(name.as_str()) {
            SubDocument::Styles { name }
        } else {
            SubDocument::PassThrough { name }
        };
        log::debug!("dispatching {:?}", sub_document);
        Some(sub_document)
    }

    fn is_story(&self, name: &str) -> bool {
        !self.non_translatable.contains(name) && self.design_map.stories.iter().any(|part| part == name)
    }

    /// The events of one sub-document, in stream order.
    pub fn events(&self, sub_document: &SubDocument) -> Result<Vec<Event>> {
        match sub_document {
            SubDocument::Story { id, name } => self.story_events(id, name),
            SubDocument::Styles { name } => {
                let entry = match self.styles.with_font_mappings(&self.font_mappings) {
                    Some(styles) => SkeletonEntry::Regenerated {
                        name: name.clone(),
                        bytes: styles.to_bytes()?,
                    },
                    None => SkeletonEntry::PassThrough {
                        name: name.clone(),
                        bytes: self.package.get_file(name)?,
                    },
                };
                Ok(vec![document_part(name, entry)])
            },
            SubDocument::PassThrough { name } => {
                let entry = SkeletonEntry::PassThrough {
                    name: name.clone(),
                    bytes: self.package.get_file(name)?,
                };
                Ok(vec![document_part(name, entry)])
            },
        }
    }

    fn story_events(&self, id: &str, name: &str) -> Result<Vec<Event>> {
        let merger = StoryChildElementsMerger::new(&self.ignorances);
        let parser = StoryParser::new(self.parameters.untag_xml_structures, merger);
        let mut story = {
            let mut reader = self.package.xml_reader(name, self.parameters.max_attribute_size)?;
            Story::parse(&mut reader, &parser)?
        };
        story.apply_font_mappings(&self.font_mappings);

        let (events, skeleton) = StoryAccumulator::new(name, &self.parameters).accumulate(name, story)?;
        let mut out = Vec::with_capacity(events.len() + 2);
        out.push(Event::StartSubDocument(StartSubDocument {
            parent_id: START_DOCUMENT_ID.to_string(),
            id: id.to_string(),
            name: name.to_string(),
        }));
        out.extend(events);
        out.push(Event::EndSubDocument(EndSubDocument {
            id: id.to_string(),
            skeleton: SubDocumentSkeleton::Story(Box::new(skeleton)),
        }));
        Ok(out)
    }

    /// Release the package and return the underlying reader.
    pub fn close(self) -> R {
        self.package.into_inner()
    }
}

fn document_part(name: &str, entry: SkeletonEntry) -> Event {
    Event::DocumentPart(DocumentPart {
        id: IdGenerator::new(root_id(name), "dp").create_id(),
        entry: Some(entry),
    })
}

fn parse_spreads<R: Read + Seek>(
    package: &Package<R>,
    design_map: &DesignMap,
    names: &[String],
    max_attribute_size: usize,
) -> Result<Vec<Spread>> {
    names
        .iter()
        .map(|name| Spread::parse(&mut package.xml_reader(name, max_attribute_size)?, &design_map.active_layer_id))
        .collect()
}

/// Visible and invisible pasteboard items over all spreads.
///
/// Master spread items are always ordered, and join the visible candidates
/// only when master spreads are extracted.
fn split_pasteboard_items<'a>(
    master_spreads: &'a [Spread],
    spreads: &'a [Spread],
    design_map: &DesignMap,
    preferences: &Preferences,
    parameters: &Parameters,
) -> Result<(Vec<PasteboardItem<'a>>, Vec<PasteboardItem<'a>>)> {
    let direction = preferences.story_direction;
    let mut candidates = Vec::new();
    let mut invisible = Vec::new();

    let master_items = master_spreads
        .iter()
        .flat_map(|spread| ordered_pasteboard_items(spread, direction));
    if parameters.extract_master_spreads {
        candidates.extend(master_items);
    } else {
        invisible.extend(master_items);
    }
    candidates.extend(spreads.iter().flat_map(|spread| ordered_pasteboard_items(spread, direction)));

    let filter = VisibilityFilter::new(
        &design_map.layers,
        parameters.extract_hidden_layers,
        parameters.extract_hidden_pasteboard_items,
    );
    let (visible, hidden) = filter.split(candidates)?;
    invisible.extend(hidden);
    Ok((visible, invisible))
}

/// Entry names stably sorted by their position in `part_names`; unknown
/// entries keep zip order at the end. Returned reversed.
fn dispatch_order(entry_names: &[String], part_names: &[String]) -> Vec<String> {
    let mut names = entry_names.to_vec();
    names.sort_by_key(|name| part_names.iter().position(|part| part == name).unwrap_or(usize::MAX));
    names.reverse();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idml::event::EventKind;
    use crate::idml::test_support::{PackageBuilder, story, text_frame};
    use std::io::Cursor;

    fn open(builder: PackageBuilder, parameters: Parameters) -> Result<Document<Cursor<Vec<u8>>>> {
        let package = Package::from_reader(Cursor::new(builder.build()))?;
        Document::from_reader(package, parameters)
    }

    fn drain(document: &mut Document<Cursor<Vec<u8>>>) -> Vec<(SubDocument, Vec<Event>)> {
        let mut out = Vec::new();
        while document.has_next_sub_document() {
            let sub_document = document.next_sub_document().unwrap();
            let events = document.events(&sub_document).unwrap();
            out.push((sub_document, events));
        }
        assert!(document.next_sub_document().is_none());
        out
    }

    #[test]
    fn test_dispatch_order_is_stable() {
        let entries: Vec<String> = ["z", "b", "y", "a"].iter().map(|s| s.to_string()).collect();
        let parts: Vec<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let mut order = dispatch_order(&entries, &parts);
        order.reverse();
        assert_eq!(order, vec!["a", "b", "z", "y"]);
    }

    #[test]
    fn test_stories_follow_reading_order() {
        let builder = PackageBuilder::minimal()
            .spread("Spreads/Spread_s1.xml", &[text_frame("lower", 0.0, 100.0), text_frame("upper", 0.0, 10.0)])
            .story("lower", &story("Lower text"))
            .story("upper", &story("Upper text"));
        let mut document = open(builder, Parameters::default()).unwrap();
        let stories: Vec<String> = drain(&mut document)
            .into_iter()
            .filter_map(|(sub, _)| match sub {
                SubDocument::Story { id, name } => Some(format!("{} {}", id, name)),
                _ => None,
            })
            .collect();
        assert_eq!(stories, vec!["1 Stories/Story_upper.xml", "2 Stories/Story_lower.xml"]);
    }

    #[test]
    fn test_story_events_are_framed() {
        let builder = PackageBuilder::minimal()
            .spread("Spreads/Spread_s1.xml", &[text_frame("u1", 0.0, 0.0)])
            .story("u1", &story("Hello"));
        let mut document = open(builder, Parameters::default()).unwrap();
        let (_, events) = drain(&mut document)
            .into_iter()
            .find(|(sub, _)| matches!(sub, SubDocument::Story { .. }))
            .unwrap();
        let kinds: Vec<EventKind> = events.iter().map(Event::kind).collect();
        // The unstyled StoryPreference comes before the paragraph.
        assert_eq!(
            kinds,
            vec![
                EventKind::StartSubDocument,
                EventKind::DocumentPart,
                EventKind::TextUnit,
                EventKind::EndSubDocument
            ]
        );
        let texts: Vec<String> = events.iter().filter_map(Event::as_text_unit).map(|u| u.text()).collect();
        assert_eq!(texts, vec!["Hello"]);
    }

    #[test]
    fn test_unreferenced_story_is_still_a_story() {
        let builder = PackageBuilder::minimal().story("orphan", &story("Orphan"));
        let mut document = open(builder, Parameters::default()).unwrap();
        let subs = drain(&mut document);
        assert!(subs.iter().any(|(sub, _)| matches!(sub, SubDocument::Story { name, .. } if name == "Stories/Story_orphan.xml")));
    }

    #[test]
    fn test_hidden_layer_story_passes_through() {
        let builder = PackageBuilder::minimal()
            .layer("hidden", false)
            .spread("Spreads/Spread_s1.xml", &[text_frame("u1", 0.0, 0.0).on_layer("hidden")])
            .story("u1", &story("Hidden"));
        let mut document = open(builder.clone(), Parameters::default()).unwrap();
        let subs = drain(&mut document);
        assert!(subs.iter().any(|(sub, _)| matches!(sub, SubDocument::PassThrough { name } if name == "Stories/Story_u1.xml")));

        let mut parameters = Parameters::default();
        parameters.extract_hidden_layers = true;
        let mut document = open(builder, parameters).unwrap();
        assert!(drain(&mut document).iter().any(|(sub, _)| matches!(sub, SubDocument::Story { .. })));
    }

    #[test]
    fn test_hidden_item_needs_its_own_flag() {
        let builder = PackageBuilder::minimal()
            .layer("hidden", false)
            .spread(
                "Spreads/Spread_s1.xml",
                &[text_frame("both", 0.0, 0.0).on_layer("hidden").hidden()],
            )
            .story("both", &story("Both"));
        let extracted = |layers: bool, items: bool| {
            let mut parameters = Parameters::default();
            parameters.extract_hidden_layers = layers;
            parameters.extract_hidden_pasteboard_items = items;
            let mut document = open(builder.clone(), parameters).unwrap();
            drain(&mut document).iter().any(|(sub, _)| matches!(sub, SubDocument::Story { .. }))
        };
        assert!(!extracted(false, false));
        assert!(!extracted(true, false));
        assert!(!extracted(false, true));
        assert!(extracted(true, true));
    }

    #[test]
    fn test_unknown_entry_passes_through_last() {
        let builder = PackageBuilder::minimal()
            .entry("Extra/notes.txt", b"not xml")
            .spread("Spreads/Spread_s1.xml", &[text_frame("u1", 0.0, 0.0)])
            .story("u1", &story("Text"));
        let mut document = open(builder, Parameters::default()).unwrap();
        let subs = drain(&mut document);
        let (last, events) = subs.last().unwrap();
        assert_eq!(last, &SubDocument::PassThrough { name: "Extra/notes.txt".to_string() });
        match &events[0] {
            Event::DocumentPart(DocumentPart { entry: Some(entry), .. }) => assert_eq!(entry.bytes(), b"not xml"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_unknown_layer_is_referential_error() {
        let builder = PackageBuilder::minimal()
            .spread("Spreads/Spread_s1.xml", &[text_frame("u1", 0.0, 0.0).on_layer("nowhere")])
            .story("u1", &story("Text"));
        assert!(matches!(open(builder, Parameters::default()), Err(Error::Referential(_))));
    }

    #[test]
    fn test_styles_pass_through_without_mappings() {
        let mut document = open(PackageBuilder::minimal(), Parameters::default()).unwrap();
        let subs = drain(&mut document);
        let (_, events) = subs.iter().find(|(sub, _)| matches!(sub, SubDocument::Styles { .. })).unwrap();
        match &events[0] {
            Event::DocumentPart(DocumentPart { entry: Some(entry), .. }) => assert!(!entry.is_regenerated()),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_missing_design_map_is_missing_entry() {
        let builder = PackageBuilder::minimal().without("designmap.xml");
        assert!(matches!(open(builder, Parameters::default()), Err(Error::MissingEntry(_))));
    }

    #[test]
    fn test_open_from_disk_names_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.idml");
        std::fs::write(&path, PackageBuilder::minimal().build()).unwrap();
        let document = Document::open(&path, Parameters::default()).unwrap();
        match document.start_event() {
            Event::StartDocument(start) => {
                assert_eq!(start.id, "sd");
                assert!(start.name.unwrap().ends_with("sample.idml"));
            },
            other => panic!("unexpected event {:?}", other),
        }
        drop(document.close());
    }
}
