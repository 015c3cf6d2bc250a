//! Phone number normalization (E.164) and dialing-code decomposition.

use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::{COUNTRIES, Country, default_country};

static E164: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+\d{10,15}$").expect("static E.164 pattern"));

/// Strip all whitespace, e.g. `"+1 555 000 0000"` -> `"+15550000000"`.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// `+` followed by 10-15 digits, after whitespace is stripped.
pub fn is_e164(raw: &str) -> bool {
    E164.is_match(&normalize_phone(raw))
}

/// Form representation: dialing code and national number side by side.
pub fn join_phone(dial_code: &str, national_number: &str) -> String {
    format!("{} {}", dial_code, national_number.trim())
        .trim()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneParts {
    pub country: &'static Country,
    pub national_number: String,
}

impl PhoneParts {
    pub fn dial_code(&self) -> &'static str {
        self.country.dial_code
    }
}

/// Split a stored number back into (dialing code, national number).
///
/// Candidates are tried longest dialing code first so `+44...` never lands on
/// a shorter code that happens to prefix it. Unmatched numbers keep their
/// digits under the default country.
pub fn split_phone(stored: &str) -> PhoneParts {
    let stored = stored.trim();

    let mut candidates: Vec<&'static Country> = COUNTRIES.iter().collect();
    // Stable sort keeps catalog order (US before CA) among equal lengths.
    candidates.sort_by(|a, b| b.dial_code.len().cmp(&a.dial_code.len()));

    for country in candidates {
        if let Some(rest) = stored.strip_prefix(country.dial_code) {
            return PhoneParts {
                country,
                national_number: normalize_phone(rest),
            };
        }
    }

    PhoneParts {
        country: default_country(),
        national_number: stored.chars().filter(char::is_ascii_digit).collect(),
    }
}
