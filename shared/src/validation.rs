//! Explicit DTO validation.
//!
//! Each input type implements [`Validate`] by calling the check helpers
//! below; failures are collected in field order so a client sees every
//! problem at once.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidateEmail;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("{}", join_messages(.errors))]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn join_messages(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Deserializes a request body and validates it.
///
/// Malformed JSON and type mismatches are reported as validation errors
/// too, never as a raw decoder message on a 500.
pub fn parse_json<T>(body: &[u8]) -> Result<T, AppError>
where
    T: DeserializeOwned + Validate,
{
    let value: T = serde_json::from_slice(body).map_err(|e| {
        let mut errors = ValidationErrors::default();
        match missing_field(&e.to_string()) {
            Some(field) => errors.push(field.clone(), format!("{field} should not be empty")),
            None => errors.push("body", format!("invalid request body: {e}")),
        }
        AppError::Validation(errors)
    })?;
    value.validate()?;
    Ok(value)
}

fn missing_field(message: &str) -> Option<String> {
    let rest = message.strip_prefix("missing field `")?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}

/* ---------------- checks ---------------- */

pub fn not_blank(errors: &mut ValidationErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(field, format!("{field} should not be empty"));
    }
}

pub fn min_len(errors: &mut ValidationErrors, field: &str, value: &str, min: usize) {
    if value.chars().count() < min {
        errors.push(
            field,
            format!("{field} must be longer than or equal to {min} characters"),
        );
    }
}

pub fn exact_len(errors: &mut ValidationErrors, field: &str, value: &str, len: usize) {
    if value.chars().count() != len {
        errors.push(field, format!("{field} must be exactly {len} characters"));
    }
}

pub fn email(errors: &mut ValidationErrors, field: &str, value: &str) {
    if !value.to_owned().validate_email() {
        errors.push(field, format!("{field} must be an email"));
    }
}

pub fn positive(errors: &mut ValidationErrors, field: &str, value: i64) {
    if value <= 0 {
        errors.push(field, format!("{field} must be a positive number"));
    }
}

/// Parses an optional numeric query value; absent or empty means `None`.
pub fn optional_positive(errors: &mut ValidationErrors, field: &str, raw: Option<&str>) -> Option<i64> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    match raw.parse::<i64>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            errors.push(field, format!("{field} must be a positive number"));
            None
        }
    }
}

pub fn in_range(errors: &mut ValidationErrors, field: &str, value: f64, min: f64, max: f64) {
    if !(min..=max).contains(&value) {
        errors.push(field, format!("{field} must be between {min} and {max}"));
    }
}

pub fn one_of(errors: &mut ValidationErrors, field: &str, value: &str, allowed: &[&str]) {
    if !allowed.contains(&value) {
        errors.push(
            field,
            format!("{field} must be one of the following values: {}", allowed.join(", ")),
        );
    }
}
