use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};

use crate::students::bands::StatsBand;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Student record as stored.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Student {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    /// Unique across the store.
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(with = "iso_date::option")]
    pub date_of_birth: Option<Date>,
    #[serde(with = "iso_date")]
    pub enrollment_date: Date,
    /// Always two fractional digits.
    pub gpa: Decimal,
    /// Object storage key.
    pub profile_picture: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Band used by dashboard statistics (four-way split).
    pub fn stats_band(&self) -> StatsBand {
        StatsBand::of(self.gpa)
    }
}

/// Validated form fields for an insert or a full update. Pictures are set
/// separately through `StudentStore::set_picture`.
///
/// `enrollment_date: None` means "creation date" on insert and "unchanged"
/// on update.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<Date>,
    pub enrollment_date: Option<Date>,
    pub gpa: Decimal,
}
