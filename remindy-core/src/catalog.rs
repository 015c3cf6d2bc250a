//! Shipped catalogs: selectable timezones and phone dialing codes.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::time::parse_tz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogTimezone {
    pub name: &'static str,
    /// Standard-time offset shown in the selector.
    pub label: &'static str,
}

const fn tz(name: &'static str, label: &'static str) -> CatalogTimezone {
    CatalogTimezone { name, label }
}

/// Zones offered for selection and accepted on submission, west to east.
pub const TIMEZONES: &[CatalogTimezone] = &[
    tz("Pacific/Midway", "Pacific/Midway (GMT-11:00)"),
    tz("Pacific/Honolulu", "Pacific/Honolulu (GMT-10:00)"),
    tz("America/Anchorage", "America/Anchorage (GMT-09:00)"),
    tz("America/Los_Angeles", "America/Los_Angeles (GMT-08:00)"),
    tz("America/Denver", "America/Denver (GMT-07:00)"),
    tz("America/Chicago", "America/Chicago (GMT-06:00)"),
    tz("America/New_York", "America/New_York (GMT-05:00)"),
    tz("America/Caracas", "America/Caracas (GMT-04:00)"),
    tz("America/Sao_Paulo", "America/Sao_Paulo (GMT-03:00)"),
    tz("Atlantic/South_Georgia", "Atlantic/South_Georgia (GMT-02:00)"),
    tz("Atlantic/Azores", "Atlantic/Azores (GMT-01:00)"),
    tz("Europe/London", "Europe/London (GMT+00:00)"),
    tz("Europe/Berlin", "Europe/Berlin (GMT+01:00)"),
    tz("Africa/Cairo", "Africa/Cairo (GMT+02:00)"),
    tz("Europe/Moscow", "Europe/Moscow (GMT+03:00)"),
    tz("Asia/Dubai", "Asia/Dubai (GMT+04:00)"),
    tz("Asia/Karachi", "Asia/Karachi (GMT+05:00)"),
    tz("Asia/Kathmandu", "Asia/Kathmandu (GMT+05:45)"),
    tz("Asia/Kolkata", "Asia/Kolkata (GMT+05:30)"),
    tz("Asia/Almaty", "Asia/Almaty (GMT+06:00)"),
    tz("Asia/Yangon", "Asia/Yangon (GMT+06:30)"),
    tz("Asia/Bangkok", "Asia/Bangkok (GMT+07:00)"),
    tz("Asia/Shanghai", "Asia/Shanghai (GMT+08:00)"),
    tz("Asia/Tokyo", "Asia/Tokyo (GMT+09:00)"),
    tz("Australia/Adelaide", "Australia/Adelaide (GMT+09:30)"),
    tz("Australia/Sydney", "Australia/Sydney (GMT+10:00)"),
    tz("Pacific/Guadalcanal", "Pacific/Guadalcanal (GMT+11:00)"),
    tz("Pacific/Auckland", "Pacific/Auckland (GMT+12:00)"),
    tz("Pacific/Chatham", "Pacific/Chatham (GMT+12:45)"),
];

pub const FALLBACK_TIMEZONE: &str = "Europe/London";

pub fn is_supported_timezone(name: &str) -> bool {
    find_timezone(name).is_some()
}

pub fn find_timezone(name: &str) -> Option<&'static CatalogTimezone> {
    TIMEZONES.iter().find(|t| t.name == name)
}

/// Map a detected zone onto the catalog: itself if listed, otherwise the
/// entry whose offset at `at` is closest.
pub fn nearest_catalog_timezone(detected: Tz, at: DateTime<Utc>) -> &'static str {
    if let Some(entry) = find_timezone(detected.name()) {
        return entry.name;
    }

    let offset_of = |tz: Tz| {
        let local = at.with_timezone(&tz).naive_local();
        (local - at.naive_utc()).num_seconds()
    };
    let target = offset_of(detected);

    TIMEZONES
        .iter()
        .filter_map(|entry| parse_tz(entry.name).ok().map(|tz| (entry.name, offset_of(tz))))
        .min_by_key(|(_, offset)| (offset - target).abs())
        .map(|(name, _)| name)
        .unwrap_or(FALLBACK_TIMEZONE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Country {
    /// ISO 3166-1 alpha-2.
    pub code: &'static str,
    pub name: &'static str,
    pub dial_code: &'static str,
}

const fn country(code: &'static str, name: &'static str, dial_code: &'static str) -> Country {
    Country {
        code,
        name,
        dial_code,
    }
}

pub const DEFAULT_COUNTRY: &str = "US";

pub const COUNTRIES: &[Country] = &[
    country("US", "United States", "+1"),
    country("CA", "Canada", "+1"),
    country("BS", "Bahamas", "+1242"),
    country("JM", "Jamaica", "+1876"),
    country("RU", "Russia", "+7"),
    country("KZ", "Kazakhstan", "+7"),
    country("EG", "Egypt", "+20"),
    country("ZA", "South Africa", "+27"),
    country("GR", "Greece", "+30"),
    country("NL", "Netherlands", "+31"),
    country("BE", "Belgium", "+32"),
    country("FR", "France", "+33"),
    country("ES", "Spain", "+34"),
    country("PT", "Portugal", "+351"),
    country("IE", "Ireland", "+353"),
    country("FI", "Finland", "+358"),
    country("HU", "Hungary", "+36"),
    country("IT", "Italy", "+39"),
    country("RO", "Romania", "+40"),
    country("CH", "Switzerland", "+41"),
    country("CZ", "Czech Republic", "+420"),
    country("AT", "Austria", "+43"),
    country("GB", "United Kingdom", "+44"),
    country("DK", "Denmark", "+45"),
    country("SE", "Sweden", "+46"),
    country("NO", "Norway", "+47"),
    country("PL", "Poland", "+48"),
    country("DE", "Germany", "+49"),
    country("MX", "Mexico", "+52"),
    country("AR", "Argentina", "+54"),
    country("BR", "Brazil", "+55"),
    country("CL", "Chile", "+56"),
    country("CO", "Colombia", "+57"),
    country("VE", "Venezuela", "+58"),
    country("MY", "Malaysia", "+60"),
    country("AU", "Australia", "+61"),
    country("ID", "Indonesia", "+62"),
    country("PH", "Philippines", "+63"),
    country("NZ", "New Zealand", "+64"),
    country("SG", "Singapore", "+65"),
    country("TH", "Thailand", "+66"),
    country("JP", "Japan", "+81"),
    country("KR", "South Korea", "+82"),
    country("VN", "Vietnam", "+84"),
    country("CN", "China", "+86"),
    country("HK", "Hong Kong", "+852"),
    country("TW", "Taiwan", "+886"),
    country("TR", "Turkey", "+90"),
    country("IN", "India", "+91"),
    country("PK", "Pakistan", "+92"),
    country("LK", "Sri Lanka", "+94"),
    country("MM", "Myanmar", "+95"),
    country("AE", "United Arab Emirates", "+971"),
    country("IL", "Israel", "+972"),
    country("NP", "Nepal", "+977"),
    country("SA", "Saudi Arabia", "+966"),
    country("NG", "Nigeria", "+234"),
    country("KE", "Kenya", "+254"),
];

pub fn find_country(code: &str) -> Option<&'static Country> {
    COUNTRIES.iter().find(|c| c.code.eq_ignore_ascii_case(code))
}

pub fn default_country() -> &'static Country {
    find_country(DEFAULT_COUNTRY).unwrap_or(&COUNTRIES[0])
}
