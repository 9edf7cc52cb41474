//! Phone number normalization.

use serde::Serialize;

use super::regions::{region_by_tag, LineType, Region, INDONESIA, REGIONS};
use crate::domain::RecipientAddress;

/// Shortest accepted number in the generic fallback.
const GENERIC_MIN_DIGITS: usize = 2;
/// Longest accepted number in the generic fallback (E.164 limit).
const GENERIC_MAX_DIGITS: usize = 15;

/// Result of validating one raw recipient string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhoneValidation {
    /// Whether the input could be normalized.
    pub is_valid: bool,
    /// Canonical address, when valid.
    pub formatted: Option<RecipientAddress>,
    /// Reason for rejection, when invalid.
    pub error: Option<String>,
    /// Matched region tag; `None` for the generic fallback.
    pub region_tag: Option<String>,
    /// Matched line type; `None` for the generic fallback.
    pub line_type: Option<LineType>,
}

impl PhoneValidation {
    fn invalid(reason: &str) -> Self {
        Self {
            is_valid: false,
            formatted: None,
            error: Some(reason.to_owned()),
            region_tag: None,
            line_type: None,
        }
    }

    /// Canonical address, or the rejection reason.
    pub fn into_address(self) -> Result<RecipientAddress, String> {
        match self.formatted {
            Some(address) => Ok(address),
            None => Err(self
                .error
                .unwrap_or_else(|| "Invalid phone number format".to_owned())),
        }
    }
}

/// How a number was resolved.
enum Resolved {
    Regional {
        region: &'static Region,
        national: String,
        line_type: LineType,
    },
    Generic(String),
}

impl Resolved {
    fn canonical(&self) -> String {
        match self {
            Self::Regional {
                region, national, ..
            } => format!("{}{}", region.country_code, national),
            Self::Generic(digits) => digits.clone(),
        }
    }
}

/// Stateless recipient normalizer.
///
/// Output is `<country code><national number>`, digits only. Region plans are
/// tried first; anything else that looks like an international number is
/// accepted as-is by the generic fallback.
///
/// Every address it produces validates to itself under the same default
/// region. International input whose digits the default region would also
/// read as a bare national number is rejected instead of accepted.
#[derive(Debug, Clone, Copy)]
pub struct PhoneValidator {
    default_region: &'static Region,
}

impl Default for PhoneValidator {
    fn default() -> Self {
        Self::new(&INDONESIA)
    }
}

impl PhoneValidator {
    /// Validator interpreting national numbers in `default_region`.
    pub fn new(default_region: &'static Region) -> Self {
        Self { default_region }
    }

    /// Validator for a region tag such as `"ID"`; `None` if unknown.
    pub fn for_region(tag: &str) -> Option<Self> {
        region_by_tag(tag).map(Self::new)
    }

    /// Region used for numbers without a country code.
    pub fn default_region(&self) -> &'static Region {
        self.default_region
    }

    /// Normalize `raw` into a canonical recipient address.
    pub fn validate(&self, raw: &str) -> PhoneValidation {
        match self.resolve(raw) {
            Ok(resolved) => {
                let formatted = RecipientAddress::from_canonical(resolved.canonical());
                let (region_tag, line_type) = match &resolved {
                    Resolved::Regional {
                        region, line_type, ..
                    } => (Some(region.tag.to_owned()), Some(*line_type)),
                    Resolved::Generic(_) => (None, None),
                };
                PhoneValidation {
                    is_valid: true,
                    formatted: Some(formatted),
                    error: None,
                    region_tag,
                    line_type,
                }
            }
            Err(reason) => PhoneValidation::invalid(reason),
        }
    }

    /// Human-readable grouping, e.g. `+62 812-3456-7890`.
    ///
    /// Presentation only. Input that does not validate is returned trimmed.
    pub fn format_for_display(&self, raw: &str) -> String {
        match self.resolve(raw) {
            Ok(Resolved::Regional {
                region, national, ..
            }) => format!(
                "+{} {}",
                region.country_code,
                group_digits(&national, region.display_groups, region.display_separator)
            ),
            Ok(Resolved::Generic(digits)) => format!("+{digits}"),
            Err(_) => raw.trim().to_owned(),
        }
    }

    fn resolve(&self, raw: &str) -> Result<Resolved, &'static str> {
        let (digits, international) = strip_formatting(raw)?;

        if let Some(resolved) = match_country_code(&digits) {
            return Ok(resolved);
        }
        if let Some(resolved) = self.match_national(&digits) {
            if international {
                // Stored digits-only, this would come back as a national
                // number of the default region.
                return Err("International number is ambiguous with a national number");
            }
            return Ok(resolved);
        }

        let generic = digits.len() >= GENERIC_MIN_DIGITS
            && digits.len() <= GENERIC_MAX_DIGITS
            && !digits.starts_with('0');
        if generic {
            Ok(Resolved::Generic(digits))
        } else {
            Err("Invalid phone number format")
        }
    }

    fn match_national(&self, digits: &str) -> Option<Resolved> {
        let region = self.default_region;
        let national = if !region.trunk_prefix.is_empty() && digits.starts_with(region.trunk_prefix)
        {
            region.strip_trunk(digits)
        } else if region.national_without_trunk {
            digits
        } else {
            return None;
        };
        region.classify(national).map(|line_type| Resolved::Regional {
            region,
            national: national.to_owned(),
            line_type,
        })
    }
}

/// Digits of `raw` and whether it was written in international form
/// (`+` or `00` prefix).
fn strip_formatting(raw: &str) -> Result<(String, bool), &'static str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("Phone number is required");
    }

    let (body, plus) = match trimmed.strip_prefix('+') {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    };

    let mut digits = String::with_capacity(body.len());
    for c in body.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' | '/' => {}
            _ => return Err("Phone number contains invalid characters"),
        }
    }
    if digits.is_empty() {
        return Err("Phone number has no digits");
    }

    if !plus {
        if let Some(rest) = digits.strip_prefix("00") {
            return Ok((rest.to_owned(), true));
        }
    }
    Ok((digits, plus))
}

/// Match a number that starts with a known country code.
fn match_country_code(digits: &str) -> Option<Resolved> {
    REGIONS.iter().find_map(|region| {
        let rest = digits.strip_prefix(region.country_code)?;
        let national = if region.classify(rest).is_some() {
            rest
        } else {
            region.strip_trunk(rest)
        };
        region.classify(national).map(|line_type| Resolved::Regional {
            region,
            national: national.to_owned(),
            line_type,
        })
    })
}

fn group_digits(national: &str, sizes: &[usize], separator: char) -> String {
    let mut out = String::with_capacity(national.len() + sizes.len());
    let mut rest = national;
    for &size in sizes {
        if rest.len() <= size {
            break;
        }
        let (head, tail) = rest.split_at(size);
        out.push_str(head);
        out.push(separator);
        rest = tail;
    }
    out.push_str(rest);
    out
}
