//! Owned-event XML reader used by every package part parser.
//!
//! The reader hands out `Event<'static>` values so parsers can keep raw
//! events around for verbatim replay, and it rejects oversized attribute
//! values before they reach any parser.

use crate::common::error::{Error, Result};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::{BufRead, Cursor};

/// An event detached from the reader buffer.
pub type XmlEvent = Event<'static>;

/// Default upper bound for a single attribute value (4 MiB).
pub const DEFAULT_MAX_ATTRIBUTE_SIZE: usize = 4 * 1024 * 1024;

/// Pull reader producing owned events with one event of look-ahead.
pub struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    peeked: Option<XmlEvent>,
    max_attribute_size: usize,
}

impl XmlReader<Cursor<Vec<u8>>> {
    /// Create a reader over an in-memory part.
    pub fn from_bytes(bytes: Vec<u8>, max_attribute_size: usize) -> Self {
        Self::from_reader(Cursor::new(bytes), max_attribute_size)
    }
}

impl<R: BufRead> XmlReader<R> {
    pub fn from_reader(inner: R, max_attribute_size: usize) -> Self {
        let mut reader = Reader::from_reader(inner);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = true;
        config.expand_empty_elements = false;
        Self {
            reader,
            buf: Vec::with_capacity(1024),
            peeked: None,
            max_attribute_size,
        }
    }

    /// Read the next event, whatever its kind. Returns `Event::Eof` at the end.
    pub fn next_event(&mut self) -> Result<XmlEvent> {
        if let Some(event) = self.peeked.take() {
            return Ok(event);
        }
        self.buf.clear();
        let event = self.reader.read_event_into(&mut self.buf)?.into_owned();
        if let Event::Start(start) | Event::Empty(start) = &event {
            for attr in start.attributes() {
                let attr = attr?;
                if attr.value.len() > self.max_attribute_size {
                    return Err(Error::BadInput(format!(
                        "Attribute {} exceeds maximum size of {} bytes",
                        String::from_utf8_lossy(attr.key.as_ref()),
                        self.max_attribute_size
                    )));
                }
            }
        }
        Ok(event)
    }

    /// Look at the next event without consuming it.
    pub fn peek_event(&mut self) -> Result<&XmlEvent> {
        if self.peeked.is_none() {
            let event = self.next_event()?;
            self.peeked = Some(event);
        }
        match self.peeked.as_ref() {
            Some(event) => Ok(event),
            None => Err(Error::Other("peek buffer empty".to_string())),
        }
    }

    /// Skip whitespace, comments and processing instructions and return the
    /// next start, empty or end tag.
    ///
    /// Any other event, including the end of input, is a structure error.
    pub fn next_tag(&mut self) -> Result<XmlEvent> {
        loop {
            let event = self.next_event()?;
            match event {
                Event::Start(_) | Event::Empty(_) | Event::End(_) => return Ok(event),
                Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_) => continue,
                Event::Text(ref text) if is_whitespace(text) => continue,
                Event::Eof => return Err(Error::unexpected("end of document while a tag was expected")),
                other => {
                    return Err(Error::unexpected(format!(
                        "content where a tag was expected: {:?}",
                        other
                    )));
                },
            }
        }
    }

    /// Peek at the next tag, consuming the ignorable events before it.
    pub fn peek_tag(&mut self) -> Result<&XmlEvent> {
        loop {
            let skip = match self.peek_event()? {
                Event::Start(_) | Event::Empty(_) | Event::End(_) => false,
                Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_) => true,
                Event::Text(text) if is_whitespace(text) => true,
                Event::Eof => return Err(Error::unexpected("end of document while a tag was expected")),
                other => {
                    return Err(Error::unexpected(format!(
                        "content where a tag was expected: {:?}",
                        other
                    )));
                },
            };
            if !skip {
                return self.peek_event();
            }
            self.next_event()?;
        }
    }

    /// Drain all remaining events, excluding the terminating `Eof`.
    pub fn read_to_end(&mut self) -> Result<Vec<XmlEvent>> {
        let mut events = Vec::new();
        loop {
            match self.next_event()? {
                Event::Eof => return Ok(events),
                event => events.push(event),
            }
        }
    }
}

/// True for character data consisting of XML whitespace only.
pub fn is_whitespace(text: &[u8]) -> bool {
    text.iter().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(xml: &str) -> XmlReader<Cursor<Vec<u8>>> {
        XmlReader::from_bytes(xml.as_bytes().to_vec(), DEFAULT_MAX_ATTRIBUTE_SIZE)
    }

    #[test]
    fn test_next_tag_skips_whitespace_and_comments() {
        let mut r = reader("<a>\n  <!-- note --><?pi x?>\n<b/></a>");
        assert!(matches!(r.next_tag().unwrap(), Event::Start(_)));
        match r.next_tag().unwrap() {
            Event::Empty(e) => assert_eq!(e.name().as_ref(), b"b"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(r.next_tag().unwrap(), Event::End(_)));
    }

    #[test]
    fn test_next_tag_rejects_text() {
        let mut r = reader("<a>text</a>");
        r.next_tag().unwrap();
        assert!(matches!(r.next_tag(), Err(Error::UnexpectedStructure(_))));
    }

    #[test]
    fn test_next_tag_rejects_eof() {
        let mut r = reader("<a/>");
        r.next_tag().unwrap();
        assert!(matches!(r.next_tag(), Err(Error::UnexpectedStructure(_))));
    }

    #[test]
    fn test_attribute_size_limit() {
        let xml = format!("<a v=\"{}\"/>", "x".repeat(64));
        let mut r = XmlReader::from_bytes(xml.into_bytes(), 16);
        assert!(matches!(r.next_event(), Err(Error::BadInput(_))));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut r = reader("<a/>");
        let peeked = r.peek_event().unwrap().clone();
        assert_eq!(peeked, r.next_event().unwrap());
        assert_eq!(r.next_event().unwrap(), Event::Eof);
    }

    #[test]
    fn test_peek_tag_skips_ignorable_events() {
        let mut r = reader("<a>\n\t<!-- c --><b/></a>");
        r.next_tag().unwrap();
        assert!(matches!(r.peek_tag().unwrap(), Event::Empty(_)));
        assert!(matches!(r.next_event().unwrap(), Event::Empty(_)));
        assert!(matches!(r.peek_tag().unwrap(), Event::End(_)));
    }
}
