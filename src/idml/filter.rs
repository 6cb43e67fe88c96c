//! The pull loop over one document.

use crate::common::{Error, Result};
use crate::idml::document::Document;
use crate::idml::event::Event;
use std::collections::VecDeque;
use std::io::{Read, Seek};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    OpenDocument,
    NextInDocument,
    NextInSubDocument,
    Done,
}

/// Produces the events of a document one at a time.
///
/// Any error ends the stream; a new [`Document`] is needed to try again.
///
/// ```no_run
/// use longan::idml::{Document, IdmlFilter, Parameters};
///
/// let document = Document::open("book.idml", Parameters::default())?;
/// for event in IdmlFilter::new(document) {
///     println!("{:?}", event?.kind());
/// }
/// # Ok::<(), longan::Error>(())
/// ```
pub struct IdmlFilter<R> {
    document: Document<R>,
    action: Action,
    queue: VecDeque<Event>,
    cancelled: Arc<AtomicBool>,
}

impl<R: Read + Seek> IdmlFilter<R> {
    pub fn new(document: Document<R>) -> Self {
        Self {
            document,
            action: Action::OpenDocument,
            queue: VecDeque::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A flag that, once set, makes the next call to `next` fail with
    /// [`Error::Cancelled`].
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    fn advance(&mut self) -> Result<Option<Event>> {
        loop {
            match self.action {
                Action::OpenDocument => {
                    self.action = Action::NextInDocument;
                    return Ok(Some(self.document.start_event()));
                },
                Action::NextInDocument => match self.document.next_sub_document() {
                    Some(sub_document) => {
                        self.queue.extend(self.document.events(&sub_document)?);
                        self.action = Action::NextInSubDocument;
                    },
                    None => {
                        self.action = Action::Done;
                        return Ok(Some(self.document.end_event()));
                    },
                },
                Action::NextInSubDocument => match self.queue.pop_front() {
                    Some(event) => return Ok(Some(event)),
                    None => self.action = Action::NextInDocument,
                },
                Action::Done => return Ok(None),
            }
        }
    }
}

impl<R: Read + Seek> Iterator for IdmlFilter<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.action == Action::Done {
            return None;
        }
        if self.cancelled.load(Ordering::Relaxed) {
            self.action = Action::Done;
            return Some(Err(Error::Cancelled));
        }
        match self.advance() {
            Ok(event) => event.map(Ok),
            Err(e) => {
                log::debug!("filter stopped: {}", e);
                self.action = Action::Done;
                self.queue.clear();
                Some(Err(e))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idml::core::package::Package;
    use crate::idml::event::{EventKind, TextUnit};
    use crate::idml::parameters::Parameters;
    use crate::idml::skeleton::{PackageWriter, SkeletonWriter};
    use crate::idml::test_support::{PackageBuilder, story, text_frame};
    use std::collections::HashSet;
    use std::io::Cursor;

    fn filter(builder: PackageBuilder, parameters: Parameters) -> IdmlFilter<Cursor<Vec<u8>>> {
        let package = Package::from_reader(Cursor::new(builder.build())).unwrap();
        IdmlFilter::new(Document::from_reader(package, parameters).unwrap())
    }

    fn two_spreads() -> PackageBuilder {
        PackageBuilder::minimal()
            .master_spread("MasterSpreads/MasterSpread_m1.xml", &[text_frame("master", 0.0, 0.0)])
            .spread("Spreads/Spread_s1.xml", &[text_frame("first", 0.0, 0.0)])
            .spread("Spreads/Spread_s2.xml", &[text_frame("second", 0.0, 0.0)])
            .story("master", &story("Master page text"))
            .story("first", &story("First spread"))
            .story("second", &story("Second spread"))
    }

    fn texts(events: &[Event]) -> Vec<String> {
        events.iter().filter_map(Event::as_text_unit).map(TextUnit::text).collect()
    }

    #[test]
    fn test_event_stream_shape() {
        let events: Vec<Event> = filter(two_spreads(), Parameters::default()).collect::<Result<_>>().unwrap();
        assert_eq!(events.first().map(Event::kind), Some(EventKind::StartDocument));
        assert_eq!(events.last().map(Event::kind), Some(EventKind::EndDocument));
        assert_eq!(texts(&events), vec!["Master page text", "First spread", "Second spread"]);
    }

    #[test]
    fn test_master_spread_stories_not_extracted() {
        let mut parameters = Parameters::default();
        parameters.extract_master_spreads = false;
        let events: Vec<Event> = filter(two_spreads(), parameters).collect::<Result<_>>().unwrap();
        assert_eq!(texts(&events), vec!["First spread", "Second spread"]);

        let passed: HashSet<&str> = events
            .iter()
            .filter_map(|e| match e {
                Event::DocumentPart(part) => part.entry.as_ref().map(|entry| entry.name()),
                _ => None,
            })
            .collect();
        assert!(passed.contains("Stories/Story_master.xml"));
        assert!(passed.contains("MasterSpreads/MasterSpread_m1.xml"));
    }

    #[test]
    fn test_cancel_ends_the_stream() {
        let mut events = filter(two_spreads(), Parameters::default());
        assert!(matches!(events.next(), Some(Ok(Event::StartDocument(_)))));
        events.cancel_handle().store(true, Ordering::Relaxed);
        assert!(matches!(events.next(), Some(Err(Error::Cancelled))));
        assert!(events.next().is_none());

        let mut events = filter(two_spreads(), Parameters::default());
        events.cancel();
        assert!(matches!(events.next(), Some(Err(Error::Cancelled))));
    }

    #[test]
    fn test_error_ends_the_stream() {
        let builder = PackageBuilder::minimal()
            .spread("Spreads/Spread_s1.xml", &[text_frame("bad", 0.0, 0.0)])
            .story("bad", "<Story Self=\"bad\"><ParagraphStyleRange><CharacterStyleRange><Content>x</Content></ParagraphStyleRange></Story>");
        let mut filter = filter(builder, Parameters::default());
        let outcome: Vec<Result<Event>> = filter.by_ref().collect();
        assert!(matches!(outcome.last(), Some(Err(Error::UnexpectedStructure(_)))));
        assert!(filter.next().is_none());
    }

    #[test]
    fn test_round_trip_through_package_writer() {
        let source = two_spreads();
        let original = source.clone().build();
        let events = filter(source, Parameters::default()).map(|event| {
            event.map(|e| match e {
                Event::TextUnit(unit) => Event::TextUnit(unit.map_text(|t| t.replace("spread", "Druckbogen"))),
                other => other,
            })
        });
        let skeleton = SkeletonWriter::write_all(events).unwrap();

        let mut writer = PackageWriter::new(Cursor::new(Vec::new()));
        writer.write(&skeleton).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let written = Package::from_reader(Cursor::new(bytes)).unwrap();
        let before = Package::from_reader(Cursor::new(original)).unwrap();
        let mut names: Vec<&String> = written.entry_names().iter().collect();
        let mut expected: Vec<&String> = before.entry_names().iter().collect();
        names.sort();
        expected.sort();
        assert_eq!(names, expected);

        let first = String::from_utf8(written.get_file("Stories/Story_first.xml").unwrap()).unwrap();
        assert!(first.contains("<Content>First Druckbogen</Content>"));
        assert_eq!(
            written.get_file("designmap.xml").unwrap(),
            before.get_file("designmap.xml").unwrap()
        );
        assert_eq!(
            written.get_file("Stories/Story_master.xml").unwrap(),
            before.get_file("Stories/Story_master.xml").unwrap()
        );
    }
}
