//! Longan - Round-trip text extraction for Adobe InDesign IDML packages
//!
//! This library pulls the translatable text out of an IDML package as a
//! stream of text units and writes a package back from (possibly translated)
//! units, reproducing everything else byte for byte.
//!
//! # Features
//!
//! - **Reading order**: Stories follow the placement of their frames on the
//!   spreads, with layer and item visibility honoured
//! - **Strict story parser**: Paragraph and character style ranges, tables,
//!   footnotes, notes, hyperlinks and XML structures
//! - **Style-range merging**: Runs differing only in ignorable kerning,
//!   tracking, leading or baseline shift are merged
//! - **Inline codes**: Formatting and special characters become codes inside
//!   text units
//! - **Write-back**: Untouched entries pass through, stories are regenerated
//!
//! # Example - Extracting text
//!
//! ```no_run
//! use longan::idml::{Document, IdmlFilter, Parameters};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let document = Document::open("brochure.idml", Parameters::default())?;
//! for event in IdmlFilter::new(document) {
//!     if let Some(unit) = event?.as_text_unit() {
//!         println!("{}: {}", unit.id, unit.text());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Writing a translated package
//!
//! ```no_run
//! use longan::idml::{Document, Event, IdmlFilter, PackageWriter, Parameters, SkeletonWriter};
//! use std::fs::File;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut parameters = Parameters::default();
//! parameters.set_ignore_character_kerning(true);
//! parameters.set_character_kerning_min_ignorance_threshold("-10")?;
//!
//! let document = Document::open("brochure.idml", parameters)?;
//! let events = IdmlFilter::new(document).map(|event| {
//!     event.map(|event| match event {
//!         Event::TextUnit(unit) => Event::TextUnit(unit.map_text(|text| text.to_uppercase())),
//!         other => other,
//!     })
//! });
//! let skeleton = SkeletonWriter::write_all(events)?;
//!
//! let mut writer = PackageWriter::new(File::create("brochure-upper.idml")?);
//! writer.write(&skeleton)?;
//! writer.finish()?;
//! # Ok(())
//! # }
//! ```

/// Error type, XML plumbing and event ids shared by all layers
pub mod common;

/// IDML package processing
///
/// This module provides the document orchestrator, the filter driver, the
/// spread and story layers and the skeleton writer.
pub mod idml;

// Re-export commonly used types for convenience
pub use common::{Error, Result};
pub use idml::{Document, Event, IdmlFilter, Parameters, Skeleton, SkeletonWriter};
