//! Error conversion implementations.
//!
//! This module contains From trait implementations to convert from the
//! errors of the zip and XML crates to the unified Error type.

use super::types::Error;

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Error::Io(e),
            zip::result::ZipError::FileNotFound => Error::MissingEntry("file not found in archive".to_string()),
            other => Error::Zip(other.to_string()),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        match err {
            quick_xml::Error::Io(e) => Error::Io(std::io::Error::new(e.kind(), e.to_string())),
            quick_xml::Error::IllFormed(e) => Error::UnexpectedStructure(e.to_string()),
            other => Error::Xml(other.to_string()),
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(format!("attribute error: {}", err))
    }
}

impl From<quick_xml::encoding::EncodingError> for Error {
    fn from(err: quick_xml::encoding::EncodingError) -> Self {
        Error::Xml(format!("encoding error: {}", err))
    }
}

impl From<quick_xml::escape::EscapeError> for Error {
    fn from(err: quick_xml::escape::EscapeError) -> Self {
        Error::Xml(format!("escape error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zip_io_error_keeps_io_kind() {
        let err: Error = zip::result::ZipError::Io(std::io::Error::other("boom")).into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_ill_formed_xml_is_structure_error() {
        let mut reader = quick_xml::Reader::from_str("<a></b>");
        let mut outcome = None;
        loop {
            match reader.read_event() {
                Ok(quick_xml::events::Event::Eof) => break,
                Ok(_) => continue,
                Err(e) => {
                    outcome = Some(Error::from(e));
                    break;
                },
            }
        }
        assert!(matches!(outcome, Some(Error::UnexpectedStructure(_))));
    }
}
