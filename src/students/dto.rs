use serde::{Deserialize, Serialize};

/// A form value that may arrive as a JSON string or a JSON number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Text(String),
    Number(serde_json::Number),
}

impl FormValue {
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        }
    }
}

/// Create/edit payload. Every field is optional at the wire level so that
/// validation can report all problems at once.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StudentForm {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<String>,
    pub enrollment_date: Option<String>,
    pub gpa: Option<FormValue>,
}

#[derive(Debug, Deserialize)]
pub struct BulkIdsRequest {
    #[serde(default)]
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub requested: usize,
    pub deleted: u64,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct EmailResponse {
    pub sent: bool,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PictureResponse {
    pub id: i64,
    pub profile_picture: String,
}
