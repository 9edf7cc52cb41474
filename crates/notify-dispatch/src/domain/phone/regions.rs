//! Region numbering plans known to the validator.

use serde::{Deserialize, Serialize};

/// Shape of a national number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineType {
    /// Mobile subscriber number.
    Mobile,
    /// Geographic landline number.
    Landline,
    /// Plan does not distinguish mobile from landline (NANP).
    FixedOrMobile,
}

/// One national-number shape within a region.
#[derive(Debug, Clone, Copy)]
pub struct NumberPattern {
    /// Line type the shape identifies.
    pub line_type: LineType,
    /// Allowed leading digits of the national number.
    pub leading: &'static [char],
    /// Shortest allowed national number.
    pub min_len: usize,
    /// Longest allowed national number.
    pub max_len: usize,
}

impl NumberPattern {
    /// True when `national` (digits only, no trunk prefix) has this shape.
    pub fn matches(&self, national: &str) -> bool {
        (self.min_len..=self.max_len).contains(&national.len())
            && national
                .chars()
                .next()
                .is_some_and(|first| self.leading.contains(&first))
    }
}

/// Numbering plan for one country.
#[derive(Debug, Clone, Copy)]
pub struct Region {
    /// ISO 3166 alpha-2 tag.
    pub tag: &'static str,
    /// Country calling code.
    pub country_code: &'static str,
    /// Trunk prefix dialled before national numbers.
    pub trunk_prefix: &'static str,
    /// Whether bare national numbers are customarily written without the
    /// trunk prefix.
    pub national_without_trunk: bool,
    /// Valid national number shapes.
    pub patterns: &'static [NumberPattern],
    /// Digit group sizes for display; the remainder forms the last group.
    pub display_groups: &'static [usize],
    /// Separator between display groups.
    pub display_separator: char,
}

impl Region {
    /// First pattern matching `national`.
    pub fn classify(&self, national: &str) -> Option<LineType> {
        self.patterns
            .iter()
            .find(|pattern| pattern.matches(national))
            .map(|pattern| pattern.line_type)
    }

    /// Remove a trunk prefix the user typed after the country code or in a
    /// national number.
    pub fn strip_trunk<'a>(&self, national: &'a str) -> &'a str {
        national
            .strip_prefix(self.trunk_prefix)
            .filter(|_| !self.trunk_prefix.is_empty())
            .unwrap_or(national)
    }
}

/// Indonesia.
pub const INDONESIA: Region = Region {
    tag: "ID",
    country_code: "62",
    trunk_prefix: "0",
    national_without_trunk: false,
    patterns: &[
        NumberPattern {
            line_type: LineType::Mobile,
            leading: &['8'],
            min_len: 9,
            max_len: 12,
        },
        NumberPattern {
            line_type: LineType::Landline,
            leading: &['2', '3', '4', '5', '6', '7', '9'],
            min_len: 8,
            max_len: 11,
        },
    ],
    display_groups: &[3, 4],
    display_separator: '-',
};

/// Turkey.
pub const TURKEY: Region = Region {
    tag: "TR",
    country_code: "90",
    trunk_prefix: "0",
    national_without_trunk: false,
    patterns: &[
        NumberPattern {
            line_type: LineType::Mobile,
            leading: &['5'],
            min_len: 10,
            max_len: 10,
        },
        NumberPattern {
            line_type: LineType::Landline,
            leading: &['2', '3', '4'],
            min_len: 10,
            max_len: 10,
        },
    ],
    display_groups: &[3, 3, 2],
    display_separator: ' ',
};

/// United States and other NANP members.
pub const UNITED_STATES: Region = Region {
    tag: "US",
    country_code: "1",
    trunk_prefix: "1",
    national_without_trunk: true,
    patterns: &[NumberPattern {
        line_type: LineType::FixedOrMobile,
        leading: &['2', '3', '4', '5', '6', '7', '8', '9'],
        min_len: 10,
        max_len: 10,
    }],
    display_groups: &[3, 3],
    display_separator: '-',
};

/// Every region the validator recognises.
pub const REGIONS: &[Region] = &[INDONESIA, TURKEY, UNITED_STATES];

/// Look up a region by tag, case-insensitively.
pub fn region_by_tag(tag: &str) -> Option<&'static Region> {
    REGIONS
        .iter()
        .find(|region| region.tag.eq_ignore_ascii_case(tag))
}
