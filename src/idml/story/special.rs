//! Special characters: InDesign `ACE` processing instructions and the
//! Unicode characters with a layout meaning.

use phf::phf_map;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialCharacter {
    Alignment,
    EndNestedStyle,
    FootnoteMarker,
    IndentHereTab,
    RightIndentTab,
    AutoPageNumber,
    SectionMarker,
    FixedWidthNonBreakingSpace,
    HairSpace,
    ThinSpace,
    PunctuationSpace,
    FigureSpace,
    SixthSpace,
    QuarterSpace,
    ThirdSpace,
    FlushSpace,
    ForcedLineBreak,
    DiscretionaryLineBreak,
    ZeroWidthNonJoiner,
    DiscretionaryHyphen,
    NonBreakingHyphen,
    ZeroWidthNoBreakSpace,
    Unsupported,
}

static INSTRUCTIONS: phf::Map<&'static str, SpecialCharacter> = phf_map! {
    "0" => SpecialCharacter::Alignment,
    "3" => SpecialCharacter::EndNestedStyle,
    "4" => SpecialCharacter::FootnoteMarker,
    "7" => SpecialCharacter::IndentHereTab,
    "8" => SpecialCharacter::RightIndentTab,
    "18" => SpecialCharacter::AutoPageNumber,
    "19" => SpecialCharacter::SectionMarker,
};

static CHARACTERS: phf::Map<char, SpecialCharacter> = phf_map! {
    '\u{202F}' => SpecialCharacter::FixedWidthNonBreakingSpace,
    '\u{200A}' => SpecialCharacter::HairSpace,
    '\u{2009}' => SpecialCharacter::ThinSpace,
    '\u{2008}' => SpecialCharacter::PunctuationSpace,
    '\u{2007}' => SpecialCharacter::FigureSpace,
    '\u{2006}' => SpecialCharacter::SixthSpace,
    '\u{2005}' => SpecialCharacter::QuarterSpace,
    '\u{2004}' => SpecialCharacter::ThirdSpace,
    '\u{2001}' => SpecialCharacter::FlushSpace,
    '\u{2028}' => SpecialCharacter::ForcedLineBreak,
    '\u{200B}' => SpecialCharacter::DiscretionaryLineBreak,
    '\u{200C}' => SpecialCharacter::ZeroWidthNonJoiner,
    '\u{00AD}' => SpecialCharacter::DiscretionaryHyphen,
    '\u{2011}' => SpecialCharacter::NonBreakingHyphen,
    '\u{FEFF}' => SpecialCharacter::ZeroWidthNoBreakSpace,
};

impl SpecialCharacter {
    /// Classify the content of a processing instruction such as `ACE 7`.
    pub fn from_instruction(content: &str) -> Self {
        let mut parts = content.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some("ACE"), Some(code), None) => INSTRUCTIONS.get(code).copied().unwrap_or(Self::Unsupported),
            _ => Self::Unsupported,
        }
    }

    pub fn from_char(ch: char) -> Self {
        CHARACTERS.get(&ch).copied().unwrap_or(Self::Unsupported)
    }

    /// A short name for display next to a code, `None` when unsupported.
    pub fn label(self) -> Option<&'static str> {
        let label = match self {
            Self::Alignment => "alignment",
            Self::EndNestedStyle => "end nested style",
            Self::FootnoteMarker => "footnote marker",
            Self::IndentHereTab => "indent to here",
            Self::RightIndentTab => "right indent tab",
            Self::AutoPageNumber => "page number",
            Self::SectionMarker => "section marker",
            Self::FixedWidthNonBreakingSpace => "fixed width non-breaking space",
            Self::HairSpace => "hair space",
            Self::ThinSpace => "thin space",
            Self::PunctuationSpace => "punctuation space",
            Self::FigureSpace => "figure space",
            Self::SixthSpace => "sixth space",
            Self::QuarterSpace => "quarter space",
            Self::ThirdSpace => "third space",
            Self::FlushSpace => "flush space",
            Self::ForcedLineBreak => "forced line break",
            Self::DiscretionaryLineBreak => "discretionary line break",
            Self::ZeroWidthNonJoiner => "zero width non-joiner",
            Self::DiscretionaryHyphen => "discretionary hyphen",
            Self::NonBreakingHyphen => "non-breaking hyphen",
            Self::ZeroWidthNoBreakSpace => "zero width no-break space",
            Self::Unsupported => return None,
        };
        Some(label)
    }

    /// Characters that stand for markup rather than text and become
    /// inline codes.
    pub fn is_code(self) -> bool {
        matches!(
            self,
            Self::ForcedLineBreak | Self::DiscretionaryLineBreak | Self::ZeroWidthNonJoiner | Self::ZeroWidthNoBreakSpace
        )
    }
}

/// Quick check for text that may contain a special character.
///
/// Every special character encodes with one of these lead bytes.
pub fn may_contain_special(text: &str) -> bool {
    memchr::memchr3(0xC2, 0xE2, 0xEF, text.as_bytes()).is_some()
}
