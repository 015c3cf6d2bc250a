//! Error taxonomy for schedule validation and timezone conversion.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Form fields a validation failure can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Message,
    Phone,
    Date,
    Time,
    Timezone,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Message => "message",
            Field::Phone => "phone",
            Field::Date => "date",
            Field::Time => "time",
            Field::Timezone => "timezone",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-scoped validation failure. Non-fatal; shown next to the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("this field is required")]
    RequiredField,
    #[error("invalid phone number (E.164 format required)")]
    InvalidPhoneFormat,
    #[error("invalid date or time")]
    InvalidDateTime,
    #[error("reminder time must be in the future")]
    PastSchedule,
    #[error("unsupported timezone")]
    InvalidTimezone,
    #[error("invalid timestamp")]
    InvalidInstant,
}

/// Conversion failure between instants and wall-clock times.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
    #[error("invalid instant '{0}'")]
    InvalidInstant(String),
}

impl From<ConvertError> for ValidationError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::InvalidTimezone(_) => ValidationError::InvalidTimezone,
            ConvertError::InvalidInstant(_) => ValidationError::InvalidInstant,
        }
    }
}

/// Validation failures keyed by field. At most one error per field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors {
    errors: BTreeMap<Field, ValidationError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `err` for `field` unless the field already failed an earlier rule.
    pub fn insert(&mut self, field: Field, err: ValidationError) {
        self.errors.entry(field).or_insert(err);
    }

    pub fn clear(&mut self, field: Field) {
        self.errors.remove(&field);
    }

    pub fn get(&self, field: Field) -> Option<ValidationError> {
        self.errors.get(&field).copied()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.errors.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, ValidationError)> + '_ {
        self.errors.iter().map(|(f, e)| (*f, *e))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, err) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {err}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}
