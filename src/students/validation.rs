//! Per-field validation of student input.
//!
//! Each field validator returns either the cleaned value or a
//! [`FieldError`]; [`validate_student_form`] collects every error into one
//! [`ValidationReport`] before anything touches the store.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use time::{macros::format_description, Date};

use crate::auth::services::is_valid_email;
use crate::students::dto::{FormValue, StudentForm};
use crate::students::repo_types::StudentDraft;

pub const NAME_MAX_LEN: usize = 50;
pub const EMAIL_MAX_LEN: usize = 254;
pub const PHONE_MAX_LEN: usize = 20;
pub const ADDRESS_MAX_LEN: usize = 500;

const GPA_MAX: Decimal = Decimal::from_parts(400, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    fn take<T>(&mut self, result: Result<T, FieldError>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

fn trimmed(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Stored text stays on one line: CSV export writes one record per line.
fn reject_control(field: &'static str, value: &str) -> Result<(), FieldError> {
    if value.chars().any(char::is_control) {
        return Err(FieldError::new(field, "Line breaks and control characters are not allowed"));
    }
    Ok(())
}

pub fn validate_name(field: &'static str, raw: Option<&str>) -> Result<String, FieldError> {
    let value = trimmed(raw).ok_or_else(|| FieldError::new(field, "This field is required"))?;
    reject_control(field, value)?;
    if value.chars().count() > NAME_MAX_LEN {
        return Err(FieldError::new(
            field,
            format!("Ensure this value has at most {NAME_MAX_LEN} characters"),
        ));
    }
    Ok(value.to_string())
}

/// Emails are stored lowercased, so uniqueness is case-insensitive.
pub fn validate_email(raw: Option<&str>) -> Result<String, FieldError> {
    let value = trimmed(raw)
        .ok_or_else(|| FieldError::new("email", "This field is required"))?
        .to_lowercase();
    reject_control("email", &value)?;
    if value.len() > EMAIL_MAX_LEN || !is_valid_email(&value) {
        return Err(FieldError::new("email", "Enter a valid email address"));
    }
    Ok(value)
}

pub fn validate_phone(raw: Option<&str>) -> Result<Option<String>, FieldError> {
    lazy_static! {
        static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9][0-9 ()\-]*$").unwrap();
    }
    let Some(value) = trimmed(raw) else {
        return Ok(None);
    };
    if value.len() > PHONE_MAX_LEN || !PHONE_RE.is_match(value) {
        return Err(FieldError::new("phone", "Enter a valid phone number, e.g. +1234567890"));
    }
    Ok(Some(value.to_string()))
}

pub fn validate_address(raw: Option<&str>) -> Result<Option<String>, FieldError> {
    let Some(value) = trimmed(raw) else {
        return Ok(None);
    };
    reject_control("address", value)?;
    if value.chars().count() > ADDRESS_MAX_LEN {
        return Err(FieldError::new(
            "address",
            format!("Ensure this value has at most {ADDRESS_MAX_LEN} characters"),
        ));
    }
    Ok(Some(value.to_string()))
}

pub fn validate_date(field: &'static str, raw: Option<&str>) -> Result<Option<Date>, FieldError> {
    let Some(value) = trimmed(raw) else {
        return Ok(None);
    };
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map(Some)
        .map_err(|_| FieldError::new(field, "Enter a valid date (YYYY-MM-DD)"))
}

/// Parses a decimal with at most two fractional digits. Shared with the
/// listing filters, which accept the same notation.
pub fn parse_gpa(raw: &str) -> Option<Decimal> {
    let mut value = Decimal::from_str(raw.trim()).ok()?;
    if value.normalize().scale() > 2 {
        return None;
    }
    value.rescale(2);
    Some(value)
}

pub fn validate_gpa(raw: Option<&FormValue>) -> Result<Decimal, FieldError> {
    let text = raw
        .map(FormValue::to_text)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| FieldError::new("gpa", "This field is required"))?;
    let gpa = parse_gpa(&text)
        .ok_or_else(|| FieldError::new("gpa", "Enter a number with at most 2 decimal places"))?;
    if gpa < Decimal::ZERO || gpa > GPA_MAX {
        return Err(FieldError::new("gpa", "GPA must be between 0.00 and 4.00"));
    }
    Ok(gpa)
}

/// Validates every field and returns a draft only when all of them pass.
pub fn validate_student_form(form: &StudentForm) -> Result<StudentDraft, ValidationReport> {
    let mut report = ValidationReport::default();
    let first_name = report.take(validate_name("first_name", form.first_name.as_deref()));
    let last_name = report.take(validate_name("last_name", form.last_name.as_deref()));
    let email = report.take(validate_email(form.email.as_deref()));
    let phone = report.take(validate_phone(form.phone.as_deref()));
    let address = report.take(validate_address(form.address.as_deref()));
    let date_of_birth = report.take(validate_date("date_of_birth", form.date_of_birth.as_deref()));
    let enrollment_date =
        report.take(validate_date("enrollment_date", form.enrollment_date.as_deref()));
    let gpa = report.take(validate_gpa(form.gpa.as_ref()));

    match (
        first_name,
        last_name,
        email,
        phone,
        address,
        date_of_birth,
        enrollment_date,
        gpa,
    ) {
        (
            Some(first_name),
            Some(last_name),
            Some(email),
            Some(phone),
            Some(address),
            Some(date_of_birth),
            Some(enrollment_date),
            Some(gpa),
        ) if report.is_empty() => Ok(StudentDraft {
            first_name,
            last_name,
            email,
            phone,
            address,
            date_of_birth,
            enrollment_date,
            gpa,
        }),
        _ => Err(report),
    }
}
