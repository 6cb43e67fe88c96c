//! `Resources/Preferences.xml` parsing.

use crate::common::Result;
use crate::common::xml::{XmlReader, attribute, qname};
use quick_xml::events::Event;
use std::io::BufRead;

/// Text direction that drives the horizontal reading order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoryDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

impl StoryDirection {
    fn from_attribute(value: &str) -> Self {
        match value {
            "LeftToRightDirection" => StoryDirection::LeftToRight,
            "RightToLeftDirection" => StoryDirection::RightToLeft,
            other => {
                log::warn!("unknown story direction \"{}\", using left to right", other);
                StoryDirection::LeftToRight
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    pub story_direction: StoryDirection,
}

impl Preferences {
    pub fn parse<R: BufRead>(reader: &mut XmlReader<R>) -> Result<Self> {
        let mut preferences = Preferences::default();
        loop {
            match reader.next_event()? {
                Event::Start(start) | Event::Empty(start) if qname(&start) == "StoryPreference" => {
                    if let Some(direction) = attribute(&start, "StoryDirection")? {
                        preferences.story_direction = StoryDirection::from_attribute(&direction);
                    }
                },
                Event::Eof => return Ok(preferences),
                _ => {},
            }
        }
    }
}
