//! CSV export and import parsing.
//!
//! Records are one per line; quoted fields may contain commas and doubled
//! quotes but not line breaks.

use crate::students::dto::{FormValue, StudentForm};
use crate::students::error::StudentError;
use crate::students::repo_types::Student;

pub const FULL_EXPORT_COLUMNS: [&str; 8] = [
    "id",
    "first_name",
    "last_name",
    "email",
    "phone",
    "gpa",
    "date_of_birth",
    "enrollment_date",
];

pub const SELECTED_EXPORT_COLUMNS: [&str; 6] =
    ["id", "first_name", "last_name", "email", "phone", "gpa"];

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => out.push(std::mem::take(&mut buf)),
            _ => buf.push(ch),
        }
    }
    out.push(buf);
    out
}

fn write_row(out: &mut String, fields: &[String]) {
    let quoted: Vec<String> = fields.iter().map(|f| csv_quote(f)).collect();
    out.push_str(&quoted.join(","));
    out.push_str("\r\n");
}

fn header(columns: &[&str]) -> String {
    let mut out = String::new();
    write_row(&mut out, &columns.iter().map(|c| c.to_string()).collect::<Vec<_>>());
    out
}

fn opt(value: Option<impl ToString>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Every column of the full export.
pub fn export_full(students: &[Student]) -> String {
    let mut out = header(&FULL_EXPORT_COLUMNS);
    for s in students {
        write_row(
            &mut out,
            &[
                s.id.to_string(),
                s.first_name.clone(),
                s.last_name.clone(),
                s.email.clone(),
                opt(s.phone.as_ref()),
                s.gpa.to_string(),
                opt(s.date_of_birth),
                s.enrollment_date.to_string(),
            ],
        );
    }
    out
}

/// The reduced column set used for exporting a selection.
pub fn export_selected(students: &[Student]) -> String {
    let mut out = header(&SELECTED_EXPORT_COLUMNS);
    for s in students {
        write_row(
            &mut out,
            &[
                s.id.to_string(),
                s.first_name.clone(),
                s.last_name.clone(),
                s.email.clone(),
                opt(s.phone.as_ref()),
                s.gpa.to_string(),
            ],
        );
    }
    out
}

/// One data row of an import, already mapped onto form fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub line: usize,
    pub form: StudentForm,
}

#[derive(Default)]
struct ColumnMap {
    first_name: Option<usize>,
    last_name: Option<usize>,
    email: Option<usize>,
    gpa: Option<usize>,
    phone: Option<usize>,
    address: Option<usize>,
}

impl ColumnMap {
    fn from_header(fields: &[String]) -> Self {
        let mut map = Self::default();
        for (idx, name) in fields.iter().enumerate() {
            let slot = match name.trim().to_ascii_lowercase().as_str() {
                "first_name" => &mut map.first_name,
                "last_name" => &mut map.last_name,
                "email" => &mut map.email,
                "gpa" => &mut map.gpa,
                "phone" => &mut map.phone,
                "address" => &mut map.address,
                _ => continue,
            };
            slot.get_or_insert(idx);
        }
        map
    }

    fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.gpa.is_none()
            && self.phone.is_none()
            && self.address.is_none()
    }
}

/// Splits an uploaded file into rows. The first non-empty line is the
/// header; columns are matched by name and missing ones default to empty
/// text, or `0` for the GPA.
pub fn parse_import(text: &str) -> Result<Vec<ImportRow>, StudentError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let Some((_, header_line)) = lines.next() else {
        return Err(StudentError::invalid("csv_file", "file is empty"));
    };
    let columns = ColumnMap::from_header(&parse_csv_record(header_line));
    if columns.is_empty() {
        return Err(StudentError::invalid(
            "csv_file",
            "header must name at least one of first_name, last_name, email, gpa, phone, address",
        ));
    }

    let rows = lines
        .map(|(idx, line)| {
            let fields = parse_csv_record(line);
            let text = |col: Option<usize>| -> Option<String> {
                Some(col.and_then(|i| fields.get(i)).cloned().unwrap_or_default())
            };
            let gpa = col_or_zero(columns.gpa.and_then(|i| fields.get(i)));
            ImportRow {
                line: idx + 1,
                form: StudentForm {
                    first_name: text(columns.first_name),
                    last_name: text(columns.last_name),
                    email: text(columns.email),
                    phone: text(columns.phone),
                    address: text(columns.address),
                    date_of_birth: None,
                    enrollment_date: None,
                    gpa: Some(FormValue::Text(gpa)),
                },
            }
        })
        .collect();
    Ok(rows)
}

fn col_or_zero(raw: Option<&String>) -> String {
    match raw.map(|s| s.trim()) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => "0".to_string(),
    }
}
