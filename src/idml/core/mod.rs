//! Package access and the package-level parts: design map, preferences
//! and style definitions.

pub mod design_map;
pub mod package;
pub mod preferences;
pub mod styles;

pub use design_map::{DesignMap, Layer};
pub use package::{MIME_TYPE, Package, part_names};
pub use preferences::{Preferences, StoryDirection};
pub use styles::StyleDefinitions;
