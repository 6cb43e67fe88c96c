//! IDML package (ZIP archive) access.
//!
//! The package keeps the archive open for its whole lifetime and hands out
//! entry bytes or XML readers on demand.

use crate::common::xml::XmlReader;
use crate::common::{Error, Result};
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use zip::result::ZipError;

/// MIME type stored in the `mimetype` entry of every IDML package.
pub const MIME_TYPE: &str = "application/vnd.adobe.indesign-idml-package";

/// Well-known entry names.
pub mod part_names {
    pub const MIME_TYPE: &str = "mimetype";
    pub const DESIGN_MAP: &str = "designmap.xml";
    pub const CONTAINER: &str = "META-INF/container.xml";
    pub const METADATA: &str = "META-INF/metadata.xml";
}

/// An IDML package.
pub struct Package<R> {
    archive: RefCell<zip::ZipArchive<R>>,
    entry_names: Vec<String>,
}

impl Package<BufReader<File>> {
    /// Open a package from a file path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> Package<R> {
    /// Open a package from a reader and validate its MIME type.
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader)
            .map_err(|e| Error::BadInput(format!("Invalid ZIP archive: {}", e)))?;

        let mimetype = Self::read_mimetype(&mut archive)?;
        if mimetype != MIME_TYPE {
            return Err(Error::BadInput(format!(
                "not an IDML package: unsupported MIME type \"{}\"",
                mimetype
            )));
        }

        // Central directory order; entry contents are not touched here.
        let entry_names = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect();

        Ok(Self {
            archive: RefCell::new(archive),
            entry_names,
        })
    }

    fn read_mimetype(archive: &mut zip::ZipArchive<R>) -> Result<String> {
        let mut mimetype_file = archive
            .by_name(part_names::MIME_TYPE)
            .map_err(|_| Error::BadInput("not an IDML package: no mimetype entry".to_string()))?;

        let mut content = String::new();
        mimetype_file
            .read_to_string(&mut content)
            .map_err(|_| Error::BadInput("not an IDML package: unreadable mimetype entry".to_string()))?;
        Ok(content.trim().to_string())
    }

    /// Entry names in archive order, directories excluded.
    pub fn entry_names(&self) -> &[String] {
        &self.entry_names
    }

    /// Read an entry fully.
    pub fn get_file(&self, name: &str) -> Result<Vec<u8>> {
        let mut archive = self.archive.borrow_mut();
        let mut file = archive.by_name(name).map_err(|e| match e {
            ZipError::FileNotFound => Error::MissingEntry(name.to_string()),
            other => Error::from(other),
        })?;

        // The header size is not trusted for preallocation.
        let mut content = Vec::new();
        file.read_to_end(&mut content)?;
        Ok(content)
    }

    /// Open an XML reader over an entry.
    pub fn xml_reader(&self, name: &str, max_attribute_size: usize) -> Result<XmlReader<Cursor<Vec<u8>>>> {
        let bytes = self.get_file(name)?;
        Ok(XmlReader::from_bytes(bytes, max_attribute_size))
    }

    /// Release the archive and return the underlying reader.
    pub fn into_inner(self) -> R {
        self.archive.into_inner().into_inner()
    }
}
