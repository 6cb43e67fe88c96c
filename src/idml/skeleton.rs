//! Write-back: collecting the skeleton from the event stream and
//! serializing it into a package.

use crate::common::{Error, Result};
use crate::idml::core::package::part_names;
use crate::idml::event::{Event, SubDocumentSkeleton, TextUnit};
use std::collections::HashMap;
use std::io::{Seek, Write};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

/// The content of one package entry on write-back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkeletonEntry {
    /// The original bytes, untouched.
    PassThrough { name: String, bytes: Vec<u8> },
    /// Bytes produced by the filter.
    Regenerated { name: String, bytes: Vec<u8> },
}

impl SkeletonEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::PassThrough { name, .. } | Self::Regenerated { name, .. } => name,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::PassThrough { bytes, .. } | Self::Regenerated { bytes, .. } => bytes,
        }
    }

    pub fn is_regenerated(&self) -> bool {
        matches!(self, Self::Regenerated { .. })
    }
}

/// Ordered package entries ready to be written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Skeleton {
    entries: Vec<SkeletonEntry>,
}

impl Skeleton {
    pub fn entries(&self) -> &[SkeletonEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&SkeletonEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Consumes filter events and builds the skeleton.
///
/// Text units received inside a story replace the extracted ones with the
/// same id when the story is regenerated.
#[derive(Debug, Default)]
pub struct SkeletonWriter {
    skeleton: Skeleton,
    units: HashMap<String, TextUnit>,
}

impl SkeletonWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::DocumentPart(part) => {
                if let Some(entry) = &part.entry {
                    self.skeleton.entries.push(entry.clone());
                }
            },
            Event::StartSubDocument(_) => self.units.clear(),
            Event::TextUnit(unit) => {
                self.units.insert(unit.id.clone(), unit.clone());
            },
            Event::EndSubDocument(end) => {
                if let SubDocumentSkeleton::Story(story) = &end.skeleton {
                    let bytes = story.regenerate(&self.units)?;
                    self.skeleton.entries.push(SkeletonEntry::Regenerated {
                        name: story.entry_name.clone(),
                        bytes,
                    });
                }
                self.units.clear();
            },
            Event::StartDocument(_) | Event::StartGroup(_) | Event::EndGroup(_) | Event::EndDocument(_) => {},
        }
        Ok(())
    }

    pub fn finish(self) -> Skeleton {
        self.skeleton
    }

    /// Drive a whole event stream through a fresh writer.
    pub fn write_all(events: impl IntoIterator<Item = Result<Event>>) -> Result<Skeleton> {
        let mut writer = Self::new();
        for event in events {
            writer.handle(&event?)?;
        }
        Ok(writer.finish())
    }
}

/// Serializes a skeleton into a zip archive.
pub struct PackageWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
}

impl<W: Write + Seek> PackageWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            zip: ZipWriter::new(inner),
        }
    }

    /// Write every entry: `mimetype` first and stored, the rest deflated in
    /// skeleton order.
    pub fn write(&mut self, skeleton: &Skeleton) -> Result<()> {
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mimetype = skeleton
            .entry(part_names::MIME_TYPE)
            .ok_or_else(|| Error::MissingEntry(part_names::MIME_TYPE.to_string()))?;
        self.zip.start_file(part_names::MIME_TYPE, stored)?;
        self.zip.write_all(mimetype.bytes())?;

        for entry in skeleton.entries().iter().filter(|e| e.name() != part_names::MIME_TYPE) {
            self.zip.start_file(entry.name(), deflated)?;
            self.zip.write_all(entry.bytes())?;
        }
        Ok(())
    }

    pub fn finish(self) -> Result<W> {
        Ok(self.zip.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idml::event::{DocumentPart, EndSubDocument, StartSubDocument};
    use std::io::{Cursor, Read};

    fn pass(name: &str, bytes: &[u8]) -> SkeletonEntry {
        SkeletonEntry::PassThrough {
            name: name.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_writer_collects_document_parts() {
        let events = vec![
            Ok(Event::DocumentPart(DocumentPart {
                id: "a".to_string(),
                entry: Some(pass("designmap.xml", b"<Document/>")),
            })),
            Ok(Event::StartSubDocument(StartSubDocument {
                parent_id: "sd".to_string(),
                id: "1".to_string(),
                name: "Resources/Styles.xml".to_string(),
            })),
            Ok(Event::DocumentPart(DocumentPart {
                id: "b".to_string(),
                entry: Some(SkeletonEntry::Regenerated {
                    name: "Resources/Styles.xml".to_string(),
                    bytes: b"<Styles/>".to_vec(),
                }),
            })),
            Ok(Event::EndSubDocument(EndSubDocument {
                id: "1".to_string(),
                skeleton: SubDocumentSkeleton::None,
            })),
        ];
        let skeleton = SkeletonWriter::write_all(events).unwrap();
        assert_eq!(skeleton.len(), 2);
        assert!(skeleton.entry("Resources/Styles.xml").unwrap().is_regenerated());
    }

    #[test]
    fn test_writer_stops_on_error() {
        let events = vec![Err(Error::Cancelled)];
        assert!(matches!(SkeletonWriter::write_all(events), Err(Error::Cancelled)));
    }

    #[test]
    fn test_package_writer_puts_mimetype_first_and_stored() {
        let mut skeleton = Skeleton::default();
        skeleton.entries.push(pass("designmap.xml", b"<Document/>"));
        skeleton.entries.push(pass("mimetype", b"application/vnd.adobe.indesign-idml-package"));

        let mut writer = PackageWriter::new(Cursor::new(Vec::new()));
        writer.write(&skeleton).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
        drop(first);
        let mut designmap = archive.by_name("designmap.xml").unwrap();
        assert_eq!(designmap.compression(), CompressionMethod::Deflated);
        let mut content = String::new();
        designmap.read_to_string(&mut content).unwrap();
        assert_eq!(content, "<Document/>");
    }

    #[test]
    fn test_package_writer_requires_mimetype() {
        let mut writer = PackageWriter::new(Cursor::new(Vec::new()));
        assert!(matches!(writer.write(&Skeleton::default()), Err(Error::MissingEntry(_))));
    }
}
