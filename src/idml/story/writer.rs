//! Replays story elements, regenerating style range boundaries.
//!
//! A boundary is written wherever the range instance changes, so two
//! source ranges with equal attributes stay two ranges.

use super::element::StoryChildElement;
use super::style_range::StyleRanges;
use crate::common::xml::XmlEvent;
use std::rc::Rc;

/// Writer state: the ranges currently open in the output.
#[derive(Debug, Default)]
pub struct StoryChildElementsWriter {
    current: Option<StyleRanges>,
}

impl StoryChildElementsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the elements, opening and closing ranges where they change.
    ///
    /// Ranges left open after the last element are not closed here; see
    /// [`StoryChildElementsWriter::close`].
    pub fn write(&mut self, elements: &[StoryChildElement], out: &mut Vec<XmlEvent>) {
        for element in elements {
            let Some(ranges) = element.style_ranges() else {
                if let Some(current) = &self.current {
                    close_both(current, out);
                }
                element.write_events(out);
                if let Some(current) = &self.current {
                    open_both(current, out);
                }
                continue;
            };

            let next = match self.current.take() {
                None => {
                    open_both(ranges, out);
                    ranges.clone()
                },
                Some(current) if !Rc::ptr_eq(&current.paragraph, &ranges.paragraph) => {
                    close_both(&current, out);
                    open_both(ranges, out);
                    ranges.clone()
                },
                Some(current) if !Rc::ptr_eq(&current.character, &ranges.character) => {
                    current.character.write_end(out);
                    ranges.character.write_start(out);
                    ranges.clone()
                },
                Some(current) => current,
            };
            self.current = Some(next);
            element.write_events(out);
        }
    }

    /// Close the open ranges when the last element is styled.
    pub fn close(&self, elements: &[StoryChildElement], out: &mut Vec<XmlEvent>) {
        if let (Some(current), Some(last)) = (&self.current, elements.last()) {
            if last.is_styled() {
                close_both(current, out);
            }
        }
    }
}

fn open_both(ranges: &StyleRanges, out: &mut Vec<XmlEvent>) {
    ranges.paragraph.write_start(out);
    ranges.character.write_start(out);
}

fn close_both(ranges: &StyleRanges, out: &mut Vec<XmlEvent>) {
    ranges.character.write_end(out);
    ranges.paragraph.write_end(out);
}
