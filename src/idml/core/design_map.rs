//! `designmap.xml` parsing.
//!
//! The design map names every other part of the package and declares the
//! layers items are placed on.

use crate::common::Result;
use crate::common::xml::{XmlEvent, XmlReader, attribute, qname};
use quick_xml::events::Event;
use std::io::BufRead;

const ID_PKG_PREFIX: &str = "idPkg:";

/// A document layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub id: String,
    pub visible: bool,
}

/// Part names and layers declared by the design map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesignMap {
    pub active_layer_id: String,
    pub graphic: Option<String>,
    pub fonts: Option<String>,
    pub styles: Option<String>,
    pub preferences: Option<String>,
    pub tags: Option<String>,
    pub mapping: Option<String>,
    pub backing_story: Option<String>,
    pub master_spreads: Vec<String>,
    pub spreads: Vec<String>,
    pub stories: Vec<String>,
    pub layers: Vec<Layer>,
}

impl DesignMap {
    pub fn parse<R: BufRead>(reader: &mut XmlReader<R>) -> Result<Self> {
        let mut map = DesignMap::default();
        loop {
            let event: XmlEvent = reader.next_event()?;
            match &event {
                Event::Start(start) | Event::Empty(start) => {
                    let name = qname(start);
                    if name == "Document" {
                        if let Some(active) = attribute(start, "ActiveLayer")? {
                            map.active_layer_id = active;
                        }
                    } else if name == "Layer" {
                        map.layers.push(Layer {
                            id: attribute(start, "Self")?.unwrap_or_default(),
                            visible: attribute(start, "Visible")?.is_none_or(|v| v != "false"),
                        });
                    } else if let Some(kind) = name.strip_prefix(ID_PKG_PREFIX) {
                        if let Some(src) = attribute(start, "src")? {
                            map.add_part(kind, src);
                        }
                    }
                },
                Event::Eof => break,
                _ => {},
            }
        }
        log::debug!(
            "design map: {} master spreads, {} spreads, {} stories, {} layers",
            map.master_spreads.len(),
            map.spreads.len(),
            map.stories.len(),
            map.layers.len()
        );
        Ok(map)
    }

    fn add_part(&mut self, kind: &str, src: String) {
        match kind {
            "Graphic" => self.graphic = Some(src),
            "Fonts" => self.fonts = Some(src),
            "Styles" => self.styles = Some(src),
            "Preferences" => self.preferences = Some(src),
            "Tags" => self.tags = Some(src),
            "Mapping" => self.mapping = Some(src),
            "BackingStory" => self.backing_story = Some(src),
            "MasterSpread" => self.master_spreads.push(src),
            "Spread" => self.spreads.push(src),
            "Story" => self.stories.push(src),
            other => log::debug!("ignoring design map part {}{}", ID_PKG_PREFIX, other),
        }
    }

    /// The fixed part order followed by the given story parts.
    ///
    /// Used both to order zip entries for dispatch and to name the
    /// entries that are never story sub-documents.
    pub fn part_names(&self, story_part_names: &[String]) -> Vec<String> {
        use super::package::part_names::*;
        let mut names: Vec<String> = [MIME_TYPE, DESIGN_MAP, CONTAINER, METADATA]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let resources = [
            &self.graphic,
            &self.fonts,
            &self.styles,
            &self.preferences,
            &self.tags,
            &self.mapping,
        ];
        names.extend(resources.into_iter().flatten().cloned());
        names.extend(self.master_spreads.iter().cloned());
        names.extend(self.spreads.iter().cloned());
        names.extend(self.backing_story.iter().cloned());
        names.extend(story_part_names.iter().cloned());
        names
    }

    /// Story part names for the given story ids, in id order.
    ///
    /// An id maps to the part whose file name is `Story_<id>.xml`; ids
    /// without a part are dropped.
    pub fn story_part_names(&self, story_ids: &[String]) -> Vec<String> {
        story_ids
            .iter()
            .filter_map(|id| {
                let file_name = format!("Story_{}.xml", id);
                self.stories
                    .iter()
                    .find(|part| part.rsplit('/').next() == Some(file_name.as_str()))
                    .cloned()
            })
            .collect()
    }
}
