//! Filter parameters.
//!
//! [`Parameters`] is a plain value that can be built in code or loaded from
//! YAML. The style ignorance rules used by the merge engine are derived from
//! it on demand, so switching an ignore flag off drops its rules at once.

use crate::common::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

const VALUE_IS_NOT_VALID: &str = "value is not valid";

/// Default maximum attribute value size (4 MiB).
pub const DEFAULT_MAX_ATTRIBUTE_SIZE: usize = crate::common::xml::DEFAULT_MAX_ATTRIBUTE_SIZE;

/// A source font pattern and the font that replaces matching names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontMapping {
    /// Regular expression matched against the whole font family name
    pub source_font_pattern: String,
    /// Replacement font family name
    pub target_font: String,
}

impl FontMapping {
    pub fn new(source_font_pattern: impl Into<String>, target_font: impl Into<String>) -> Self {
        Self {
            source_font_pattern: source_font_pattern.into(),
            target_font: target_font.into(),
        }
    }
}

/// Font mappings with their patterns compiled.
#[derive(Debug, Clone, Default)]
pub struct FontMappings {
    mappings: Vec<(Regex, String)>,
}

impl FontMappings {
    pub fn compile(mappings: &[FontMapping]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            // anchored so that a pattern describes a whole font name
            let pattern = format!("^(?:{})$", mapping.source_font_pattern);
            let regex = Regex::new(&pattern).map_err(|e| {
                Error::Config(format!(
                    "Source font pattern \"{}\" {}: {}",
                    mapping.source_font_pattern, VALUE_IS_NOT_VALID, e
                ))
            })?;
            compiled.push((regex, mapping.target_font.clone()));
        }
        Ok(Self { mappings: compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Target font of the first mapping whose pattern matches `font`.
    pub fn target_for(&self, font: &str) -> Option<&str> {
        self.mappings
            .iter()
            .find(|(regex, _)| regex.is_match(font))
            .map(|(_, target)| target.as_str())
    }
}

/// Value type of a tolerance window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdType {
    Integer,
    Double,
    String,
}

/// A `[min, max]` tolerance window for one ignored attribute or property.
///
/// Bounds are kept as validated strings; an empty bound is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thresholds {
    pub kind: ThresholdType,
    pub min: String,
    pub max: String,
}

impl Thresholds {
    /// The unbounded window.
    pub fn empty() -> Self {
        Self {
            kind: ThresholdType::String,
            min: String::new(),
            max: String::new(),
        }
    }

    pub fn double(min: &str, max: &str) -> Self {
        Self {
            kind: ThresholdType::Double,
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind == ThresholdType::String && self.min.is_empty() && self.max.is_empty()
    }

    /// Whether both values lie inside the window.
    ///
    /// A string window accepts only when it is empty. A value that does not
    /// parse as the window's numeric type is never accepted.
    pub fn accepts(&self, first: &str, second: &str) -> bool {
        match self.kind {
            ThresholdType::String => self.is_empty(),
            ThresholdType::Integer => within(first, second, &self.min, &self.max, |s| s.trim().parse::<i64>().ok().map(|v| v as f64)),
            ThresholdType::Double => within(first, second, &self.min, &self.max, parse_double),
        }
    }
}

fn within(first: &str, second: &str, min: &str, max: &str, parse: impl Fn(&str) -> Option<f64>) -> bool {
    let (Some(a), Some(b)) = (parse(first), parse(second)) else {
        return false;
    };
    let lower = if min.is_empty() { None } else { parse(min) };
    let upper = if max.is_empty() { None } else { parse(max) };
    if (!min.is_empty() && lower.is_none()) || (!max.is_empty() && upper.is_none()) {
        return false;
    }
    lower.is_none_or(|lo| a >= lo && b >= lo) && upper.is_none_or(|hi| a <= hi && b <= hi)
}

fn parse_double(s: &str) -> Option<f64> {
    fast_float2::parse::<f64, _>(s.trim()).ok()
}

/// Ignorance rules keyed by attribute or property name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleIgnorances {
    attributes: Vec<(&'static str, Thresholds)>,
    properties: Vec<(&'static str, Thresholds)>,
}

impl StyleIgnorances {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.properties.is_empty()
    }

    pub fn put_attribute(&mut self, name: &'static str, thresholds: Thresholds) {
        put(&mut self.attributes, name, thresholds);
    }

    pub fn put_property(&mut self, name: &'static str, thresholds: Thresholds) {
        put(&mut self.properties, name, thresholds);
    }

    /// Window for an ignored attribute, `None` when the attribute is compared exactly.
    pub fn attribute(&self, name: &str) -> Option<&Thresholds> {
        self.attributes.iter().find(|(n, _)| *n == name).map(|(_, t)| t)
    }

    /// Window for an ignored property, `None` when the property is compared exactly.
    pub fn property(&self, name: &str) -> Option<&Thresholds> {
        self.properties.iter().find(|(n, _)| *n == name).map(|(_, t)| t)
    }
}

fn put(rules: &mut Vec<(&'static str, Thresholds)>, name: &'static str, thresholds: Thresholds) {
    match rules.iter_mut().find(|(n, _)| *n == name) {
        Some(slot) => slot.1 = thresholds,
        None => rules.push((name, thresholds)),
    }
}

/// Ignorance attribute names.
pub mod names {
    pub const KERNING_METHOD: &str = "KerningMethod";
    pub const KERNING_VALUE: &str = "KerningValue";
    pub const TRACKING: &str = "Tracking";
    pub const BASELINE_SHIFT: &str = "BaselineShift";
    /// The only ignorable property.
    pub const LEADING: &str = "Leading";
}

/// One ignore flag with its optional thresholds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Ignorance {
    ignore: bool,
    min: String,
    max: String,
}

impl Ignorance {
    fn set_ignore(&mut self, ignore: bool) {
        self.ignore = ignore;
        if !ignore {
            self.min.clear();
            self.max.clear();
        }
    }

    fn set_min(&mut self, value: &str, label: &str) -> Result<()> {
        if self.ignore {
            self.min = sanitise_double(value, label)?;
        }
        Ok(())
    }

    fn set_max(&mut self, value: &str, label: &str) -> Result<()> {
        if self.ignore {
            self.max = sanitise_double(value, label)?;
        }
        Ok(())
    }

    fn thresholds(&self) -> Thresholds {
        if self.min.is_empty() && self.max.is_empty() {
            Thresholds::empty()
        } else {
            Thresholds::double(&self.min, &self.max)
        }
    }
}

fn sanitise_double(value: &str, label: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    match parse_double(trimmed) {
        Some(_) => Ok(trimmed.to_string()),
        None => Err(Error::Config(format!("{} \"{}\" {}", label, value, VALUE_IS_NOT_VALID))),
    }
}

macro_rules! ignorance_accessors {
    ($field:ident, $get:ident, $set:ident, $get_min:ident, $set_min:ident, $get_max:ident, $set_max:ident, $min_label:literal, $max_label:literal) => {
        pub fn $get(&self) -> bool {
            self.$field.ignore
        }

        pub fn $set(&mut self, ignore: bool) {
            self.$field.set_ignore(ignore);
        }

        pub fn $get_min(&self) -> &str {
            &self.$field.min
        }

        /// Ignored unless the matching ignore flag is on.
        pub fn $set_min(&mut self, threshold: &str) -> Result<()> {
            self.$field.set_min(threshold, $min_label)
        }

        pub fn $get_max(&self) -> &str {
            &self.$field.max
        }

        /// Ignored unless the matching ignore flag is on.
        pub fn $set_max(&mut self, threshold: &str) -> Result<()> {
            self.$field.set_max(threshold, $max_label)
        }
    };
}

/// Options recognized by the IDML filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Parameters {
    /// Upper bound for a single XML attribute value, in bytes
    pub max_attribute_size: usize,
    /// Unwrap `XMLElement` and drop XML attributes, comments and instructions in stories
    pub untag_xml_structures: bool,
    /// Extract note content as separate text units
    pub extract_notes: bool,
    /// Treat master spread stories as translatable
    pub extract_master_spreads: bool,
    /// Extract items placed on hidden layers
    pub extract_hidden_layers: bool,
    /// Extract items marked invisible
    pub extract_hidden_pasteboard_items: bool,
    /// Drop U+00AD from extracted text
    pub skip_discretionary_hyphens: bool,
    /// Keep line breaks inside text units as codes
    pub extract_breaks_inline: bool,
    character_kerning: Ignorance,
    character_tracking: Ignorance,
    character_leading: Ignorance,
    character_baseline_shift: Ignorance,
    /// Ordered font substitutions applied to style definitions
    pub font_mappings: Vec<FontMapping>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            max_attribute_size: DEFAULT_MAX_ATTRIBUTE_SIZE,
            untag_xml_structures: true,
            extract_notes: false,
            extract_master_spreads: true,
            extract_hidden_layers: false,
            extract_hidden_pasteboard_items: false,
            skip_discretionary_hyphens: false,
            extract_breaks_inline: false,
            character_kerning: Ignorance::default(),
            character_tracking: Ignorance::default(),
            character_leading: Ignorance::default(),
            character_baseline_shift: Ignorance::default(),
            font_mappings: Vec::new(),
        }
    }
}

impl Parameters {
    ignorance_accessors!(
        character_kerning,
        ignore_character_kerning,
        set_ignore_character_kerning,
        character_kerning_min_ignorance_threshold,
        set_character_kerning_min_ignorance_threshold,
        character_kerning_max_ignorance_threshold,
        set_character_kerning_max_ignorance_threshold,
        "Character kerning minimum ignorance threshold",
        "Character kerning maximum ignorance threshold"
    );

    ignorance_accessors!(
        character_tracking,
        ignore_character_tracking,
        set_ignore_character_tracking,
        character_tracking_min_ignorance_threshold,
        set_character_tracking_min_ignorance_threshold,
        character_tracking_max_ignorance_threshold,
        set_character_tracking_max_ignorance_threshold,
        "Character tracking minimum ignorance threshold",
        "Character tracking maximum ignorance threshold"
    );

    ignorance_accessors!(
        character_leading,
        ignore_character_leading,
        set_ignore_character_leading,
        character_leading_min_ignorance_threshold,
        set_character_leading_min_ignorance_threshold,
        character_leading_max_ignorance_threshold,
        set_character_leading_max_ignorance_threshold,
        "Character leading minimum ignorance threshold",
        "Character leading maximum ignorance threshold"
    );

    ignorance_accessors!(
        character_baseline_shift,
        ignore_character_baseline_shift,
        set_ignore_character_baseline_shift,
        character_baseline_shift_min_ignorance_threshold,
        set_character_baseline_shift_min_ignorance_threshold,
        character_baseline_shift_max_ignorance_threshold,
        set_character_baseline_shift_max_ignorance_threshold,
        "Character baseline shift minimum ignorance threshold",
        "Character baseline shift maximum ignorance threshold"
    );

    /// The merge rules implied by the ignore flags and their thresholds.
    pub fn style_ignorances(&self) -> StyleIgnorances {
        let mut ignorances = StyleIgnorances::default();
        if self.character_kerning.ignore {
            ignorances.put_attribute(names::KERNING_METHOD, Thresholds::empty());
            ignorances.put_attribute(names::KERNING_VALUE, self.character_kerning.thresholds());
        }
        if self.character_tracking.ignore {
            ignorances.put_attribute(names::TRACKING, self.character_tracking.thresholds());
        }
        if self.character_leading.ignore {
            ignorances.put_property(names::LEADING, self.character_leading.thresholds());
        }
        if self.character_baseline_shift.ignore {
            ignorances.put_attribute(names::BASELINE_SHIFT, self.character_baseline_shift.thresholds());
        }
        ignorances
    }

    /// Compile the configured font mappings.
    pub fn compiled_font_mappings(&self) -> Result<FontMappings> {
        FontMappings::compile(&self.font_mappings)
    }

    /// Re-apply the setter rules to values that bypassed them, as after
    /// deserialization.
    pub fn validate(&mut self) -> Result<()> {
        if self.max_attribute_size == 0 {
            return Err(Error::Config(format!("Maximum attribute size \"0\" {}", VALUE_IS_NOT_VALID)));
        }
        let labels = [
            ("Character kerning", &mut self.character_kerning),
            ("Character tracking", &mut self.character_tracking),
            ("Character leading", &mut self.character_leading),
            ("Character baseline shift", &mut self.character_baseline_shift),
        ];
        for (label, ignorance) in labels {
            if !ignorance.ignore {
                ignorance.min.clear();
                ignorance.max.clear();
                continue;
            }
            ignorance.min = sanitise_double(&ignorance.min, &format!("{} minimum ignorance threshold", label))?;
            ignorance.max = sanitise_double(&ignorance.max, &format!("{} maximum ignorance threshold", label))?;
        }
        FontMappings::compile(&self.font_mappings)?;
        Ok(())
    }

    /// Load and validate parameters from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut parameters: Parameters = serde_saphyr::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse parameters: {}", e)))?;
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self)
            .map_err(|e| Error::Config(format!("Failed to serialize parameters to YAML: {}", e)))
    }
}
