//! IDML (InDesign Markup Language) packages.
//!
//! A [`Document`] opens a package and decides the order its entries are
//! handled in; an [`IdmlFilter`] turns it into a stream of [`Event`]s.
//! Feeding the events, with translated text units, to a [`SkeletonWriter`]
//! gives the [`Skeleton`] of the package to write back.
//!
//! # Architecture
//!
//! - `core`: the zip package, design map, preferences and style definitions
//! - `spread`: placed items, their geometry and reading order
//! - `story`: story parsing, style-range merging, text units and regeneration
//! - `markup`: preserved elements and properties
//! - `parameters`: filter options
//! - `skeleton`: write-back

pub mod core;
pub mod document;
pub mod event;
pub mod filter;
pub mod markup;
pub mod parameters;
pub mod skeleton;
pub mod spread;
pub mod story;

#[cfg(test)]
pub(crate) mod test_support;

pub use document::{Document, SubDocument};
pub use event::{Code, CodeKind, Event, EventKind, Fragment, TagType, TextUnit};
pub use filter::IdmlFilter;
pub use parameters::{FontMapping, Parameters};
pub use skeleton::{PackageWriter, Skeleton, SkeletonEntry, SkeletonWriter};
