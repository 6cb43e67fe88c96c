//! Stories: parsing, range merging, text-unit extraction and regeneration.
//!
//! A story part is parsed into a flat list of [`StoryChildElement`]s, each
//! tagged with the paragraph and character ranges it sits in. Writing the
//! list back regenerates the range markup around runs of elements.

pub mod accumulator;
pub mod element;
pub mod merge;
pub mod parser;
pub mod regenerate;
pub mod special;
pub mod style_range;
pub mod writer;

pub use accumulator::{CodeSource, StoryAccumulator, StoryPart, StorySkeleton, TableSkeleton, UnitSkeleton};
pub use element::{ReferenceElement, StoryChildElement, StyledElement, Table};
pub use merge::StoryChildElementsMerger;
pub use parser::{Story, StoryParser};
pub use special::SpecialCharacter;
pub use style_range::{RangeFontMapper, StyleRange, StyleRanges};
pub use writer::StoryChildElementsWriter;
