//! XML plumbing shared by all package part parsers.
//!
//! Parsers work on owned quick-xml events so that anything not interpreted
//! can be written back byte for byte.

pub mod escape;
pub mod events;
pub mod reader;

pub use escape::escape_text;
pub use events::{
    attribute, attributes, event_text, events_to_bytes, local_name, qname, required_attribute, start_tag, text_of, write_events,
};
pub use reader::{DEFAULT_MAX_ATTRIBUTE_SIZE, XmlEvent, XmlReader};
