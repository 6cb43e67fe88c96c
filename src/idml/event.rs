//! Events produced by the filter and consumed by the skeleton writer.

use crate::idml::skeleton::SkeletonEntry;
use crate::idml::story::StorySkeleton;
use std::fmt;

/// One step of the extraction stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StartDocument(StartDocument),
    /// A part that carries no translatable text. Package-level parts carry
    /// their skeleton entry; parts inside a story do not.
    DocumentPart(DocumentPart),
    StartSubDocument(StartSubDocument),
    StartGroup(Group),
    EndGroup(Group),
    TextUnit(TextUnit),
    EndSubDocument(EndSubDocument),
    EndDocument(Ending),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StartDocument(_) => EventKind::StartDocument,
            Self::DocumentPart(_) => EventKind::DocumentPart,
            Self::StartSubDocument(_) => EventKind::StartSubDocument,
            Self::StartGroup(_) => EventKind::StartGroup,
            Self::EndGroup(_) => EventKind::EndGroup,
            Self::TextUnit(_) => EventKind::TextUnit,
            Self::EndSubDocument(_) => EventKind::EndSubDocument,
            Self::EndDocument(_) => EventKind::EndDocument,
        }
    }

    pub fn as_text_unit(&self) -> Option<&TextUnit> {
        match self {
            Self::TextUnit(unit) => Some(unit),
            _ => None,
        }
    }
}

/// Event discriminant, handy for assertions and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StartDocument,
    DocumentPart,
    StartSubDocument,
    StartGroup,
    EndGroup,
    TextUnit,
    EndSubDocument,
    EndDocument,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartDocument {
    pub id: String,
    pub name: Option<String>,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPart {
    pub id: String,
    pub entry: Option<SkeletonEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartSubDocument {
    pub parent_id: String,
    pub id: String,
    /// Zip entry name
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndSubDocument {
    pub id: String,
    /// What the writer needs to rebuild the entry.
    pub skeleton: SubDocumentSkeleton,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubDocumentSkeleton {
    Story(Box<StorySkeleton>),
    /// The entry was already delivered in a document part.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ending {
    pub id: String,
}

/// Whether a code opens, closes or stands alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagType {
    Opening,
    Closing,
    Placeholder,
}

/// What a code stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeKind {
    /// A character style range change
    Style,
    Hyperlink,
    /// A special character kept out of the text
    Character,
    /// A processing instruction such as `<?ACE 7?>`
    Instruction,
    Break,
    /// A preserved element
    Element,
    /// A footnote or note whose content is extracted separately
    Reference,
}

/// An inline marker standing for markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    /// Unique within its unit; an opening and its closing code share it.
    pub id: u32,
    pub tag_type: TagType,
    pub kind: CodeKind,
    /// Original XML, for display only.
    pub data: String,
    /// What a special character or instruction code stands for.
    pub display: Option<&'static str>,
}

impl Code {
    pub fn new(id: u32, tag_type: TagType, kind: CodeKind, data: impl Into<String>) -> Self {
        Self {
            id,
            tag_type,
            kind,
            data: data.into(),
            display: None,
        }
    }

    pub fn with_display(mut self, display: Option<&'static str>) -> Self {
        self.display = display;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Code(Code),
}

/// A translatable run of text with inline codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    pub id: String,
    pub name: Option<String>,
    pub fragments: Vec<Fragment>,
}

impl TextUnit {
    pub fn new(id: impl Into<String>, fragments: Vec<Fragment>) -> Self {
        Self {
            id: id.into(),
            name: None,
            fragments,
        }
    }

    /// The text without codes.
    pub fn text(&self) -> String {
        self.fragments
            .iter()
            .filter_map(|f| match f {
                Fragment::Text(text) => Some(text.as_str()),
                Fragment::Code(_) => None,
            })
            .collect()
    }

    pub fn codes(&self) -> impl Iterator<Item = &Code> {
        self.fragments.iter().filter_map(|f| match f {
            Fragment::Code(code) => Some(code),
            Fragment::Text(_) => None,
        })
    }

    /// Whether the unit holds anything worth translating.
    pub fn has_text(&self) -> bool {
        self.fragments
            .iter()
            .any(|f| matches!(f, Fragment::Text(text) if !text.trim().is_empty()))
    }

    /// A copy with other text, keeping the codes in place.
    ///
    /// Each text fragment is passed through `translate`.
    pub fn map_text(&self, mut translate: impl FnMut(&str) -> String) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            fragments: self
                .fragments
                .iter()
                .map(|f| match f {
                    Fragment::Text(text) => Fragment::Text(translate(text)),
                    Fragment::Code(code) => Fragment::Code(code.clone()),
                })
                .collect(),
        }
    }
}

/// Renders the unit with codes as `<n>`, `</n>` and `<n/>`.
impl fmt::Display for TextUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in &self.fragments {
            match fragment {
                Fragment::Text(text) => f.write_str(text)?,
                Fragment::Code(code) => match code.tag_type {
                    TagType::Opening => write!(f, "<{}>", code.id)?,
                    TagType::Closing => write!(f, "</{}>", code.id)?,
                    TagType::Placeholder => write!(f, "<{}/>", code.id)?,
                },
            }
        }
        Ok(())
    }
}
