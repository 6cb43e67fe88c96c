//! Helpers over raw quick-xml events: attribute lookup, character data
//! extraction and serialization of event sequences.

use super::reader::XmlEvent;
use crate::common::error::{Error, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesStart, Event};

/// Qualified name of a start tag as UTF-8 text.
pub fn qname(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

/// Local part of a start tag name as UTF-8 text.
pub fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

/// Look up an attribute by its qualified name and unescape its value.
pub fn attribute(start: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    match start.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Like [`attribute`], failing when the attribute is absent.
pub fn required_attribute(start: &BytesStart<'_>, name: &str) -> Result<String> {
    attribute(start, name)?.ok_or_else(|| {
        Error::unexpected(format!(
            "element {} has no {} attribute",
            qname(start),
            name
        ))
    })
}

/// All attributes in document order as `(qualified name, unescaped value)`.
pub fn attributes(start: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        out.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            attr.unescape_value()?.into_owned(),
        ));
    }
    Ok(out)
}

/// Character data carried by a single event, if any.
///
/// Entity and character references are resolved, CDATA is taken literally.
/// Line ends are not normalized: U+2028, U+0085 and CR stay as written.
pub fn event_text(event: &XmlEvent) -> Result<Option<String>> {
    match event {
        Event::Text(text) => Ok(Some(text.decode()?.into_owned())),
        Event::CData(data) => Ok(Some(data.decode()?.into_owned())),
        Event::GeneralRef(reference) => {
            if let Some(ch) = reference.resolve_char_ref()? {
                return Ok(Some(ch.to_string()));
            }
            let name = reference.decode()?;
            match quick_xml::escape::resolve_predefined_entity(&name) {
                Some(value) => Ok(Some(value.to_string())),
                None => Err(Error::Xml(format!("unknown entity &{};", name))),
            }
        },
        _ => Ok(None),
    }
}

/// Concatenate all character data found in a sequence of events.
pub fn text_of<'a>(events: impl IntoIterator<Item = &'a XmlEvent>) -> Result<String> {
    let mut out = String::new();
    for event in events {
        if let Some(text) = event_text(event)? {
            out.push_str(&text);
        }
    }
    Ok(out)
}

/// Serialize events exactly as they were read.
pub fn write_events<'a>(events: impl IntoIterator<Item = &'a XmlEvent>, out: &mut Vec<u8>) -> Result<()> {
    let mut writer = Writer::new(out);
    for event in events {
        writer.write_event(event.borrow())?;
    }
    Ok(())
}

/// Serialize events into a fresh buffer.
pub fn events_to_bytes<'a>(events: impl IntoIterator<Item = &'a XmlEvent>) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_events(events, &mut out)?;
    Ok(out)
}

/// Build an owned start tag from a name and already unescaped attributes.
pub fn start_tag(name: &str, attrs: &[(&str, &str)]) -> BytesStart<'static> {
    let mut start = BytesStart::new(name.to_string());
    for (key, value) in attrs {
        start.push_attribute((*key, *value));
    }
    start
}
