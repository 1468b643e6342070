use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::mail::{MailMessage, Mailer};
use crate::students::csv::{export_full, export_selected, parse_import};
use crate::students::dto::{EmailRequest, EmailResponse, StudentForm};
use crate::students::error::StudentError;
use crate::students::query::{FilterSpec, SortField, SortSpec};
use crate::students::repo::StudentStore;
use crate::students::repo_types::Student;
use crate::students::validation::validate_student_form;

#[instrument(skip(store, form))]
pub async fn create_student(
    store: &dyn StudentStore,
    form: &StudentForm,
) -> Result<Student, StudentError> {
    let draft = validate_student_form(form).map_err(StudentError::Validation)?;
    let student = store.insert(draft).await?;
    info!(student_id = student.id, "student created");
    Ok(student)
}

/// Full edit. Pictures change only through the upload endpoint.
#[instrument(skip(store, form))]
pub async fn update_student(
    store: &dyn StudentStore,
    id: i64,
    form: &StudentForm,
) -> Result<Student, StudentError> {
    let draft = validate_student_form(form).map_err(StudentError::Validation)?;
    let student = store.update(id, draft).await?;
    info!(student_id = id, "student updated");
    Ok(student)
}

/// One failed import row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    pub errors: Vec<ImportRowError>,
}

/// Imports every row it can; a bad row is counted and skipped.
#[instrument(skip(store, text), fields(bytes = text.len()))]
pub async fn import_csv(
    store: &dyn StudentStore,
    text: &str,
) -> Result<ImportReport, StudentError> {
    let rows = parse_import(text)?;
    let mut report = ImportReport::default();
    for row in rows {
        let result = match validate_student_form(&row.form) {
            Ok(draft) => store.insert(draft).await.map(|_| ()),
            Err(invalid) => Err(StudentError::Validation(invalid)),
        };
        match result {
            Ok(()) => report.imported += 1,
            Err(StudentError::Storage(e)) => return Err(StudentError::Storage(e)),
            Err(e) => {
                warn!(line = row.line, error = %e, "import row rejected");
                report.failed += 1;
                report.errors.push(ImportRowError {
                    line: row.line,
                    message: e.to_string(),
                });
            }
        }
    }
    info!(imported = report.imported, failed = report.failed, "csv import finished");
    Ok(report)
}

pub async fn export_all_csv(store: &dyn StudentStore) -> Result<String, StudentError> {
    let students = store
        .query(&FilterSpec::all(), SortSpec::asc(SortField::Id), None)
        .await?;
    Ok(export_full(&students))
}

pub async fn export_selected_csv(
    store: &dyn StudentStore,
    ids: Vec<i64>,
) -> Result<String, StudentError> {
    if ids.is_empty() {
        return Err(StudentError::invalid("ids", "select at least one student"));
    }
    let students = store
        .query(&FilterSpec::ids(ids), SortSpec::asc(SortField::Id), None)
        .await?;
    Ok(export_selected(&students))
}

#[instrument(skip(store))]
pub async fn bulk_delete(store: &dyn StudentStore, ids: &[i64]) -> Result<u64, StudentError> {
    if ids.is_empty() {
        return Err(StudentError::invalid("ids", "select at least one student"));
    }
    let deleted = store.delete_many(ids).await?;
    info!(requested = ids.len(), deleted, "bulk delete finished");
    Ok(deleted)
}

/// Sends a message to the student's address. Delivery failure is a
/// warning in the response; the record is never touched.
#[instrument(skip(store, mailer, req))]
pub async fn email_student(
    store: &dyn StudentStore,
    mailer: &dyn Mailer,
    from: &str,
    id: i64,
    req: EmailRequest,
) -> Result<EmailResponse, StudentError> {
    if req.subject.trim().is_empty() {
        return Err(StudentError::invalid("subject", "must not be empty"));
    }
    if req.message.trim().is_empty() {
        return Err(StudentError::invalid("message", "must not be empty"));
    }
    let student = store.get(id).await?;
    let message = MailMessage {
        from: from.to_string(),
        to: student.email.clone(),
        to_name: Some(student.full_name()),
        subject: req.subject,
        body: req.message,
    };
    match mailer.send(&message).await {
        Ok(()) => {
            info!(student_id = id, "email sent");
            Ok(EmailResponse {
                sent: true,
                to: student.email,
                warning: None,
            })
        }
        Err(e) => {
            warn!(student_id = id, error = %e, "email delivery failed");
            Ok(EmailResponse {
                sent: false,
                to: student.email,
                warning: Some(format!("Failed to send email: {e}")),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::testing::RecordingMailer;
    use crate::students::dto::FormValue;
    use crate::students::memory::MemoryStudentStore;
    use std::collections::BTreeSet;

    fn form(first: &str, last: &str, email: &str, gpa: &str) -> StudentForm {
        StudentForm {
            first_name: Some(first.into()),
            last_name: Some(last.into()),
            email: Some(email.into()),
            gpa: Some(FormValue::Text(gpa.into())),
            ..StudentForm::default()
        }
    }

    #[tokio::test]
    async fn create_rejects_invalid_form_without_touching_store() {
        let store = MemoryStudentStore::new();
        let err = create_student(&store, &form("", "X", "bad", "9"))
            .await
            .unwrap_err();
        let StudentError::Validation(report) = err else {
            panic!("expected validation error");
        };
        assert_eq!(report.errors.len(), 3);
        assert_eq!(store.aggregate().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn update_keeps_picture_and_checks_existence() {
        let store = MemoryStudentStore::new();
        let s = create_student(&store, &form("A", "B", "a@b.co", "3.1")).await.unwrap();
        store.set_picture(s.id, "students/1/p.png").await.unwrap();

        let updated = update_student(&store, s.id, &form("Al", "B", "a@b.co", "3.3"))
            .await
            .unwrap();
        assert_eq!(updated.first_name, "Al");
        assert_eq!(updated.profile_picture.as_deref(), Some("students/1/p.png"));

        let err = update_student(&store, 404, &form("Al", "B", "z@b.co", "3.3"))
            .await
            .unwrap_err();
        assert!(matches!(err, StudentError::NotFound { id: 404 }));
    }

    #[tokio::test]
    async fn import_counts_failures_and_continues() {
        let store = MemoryStudentStore::new();
        let text = "first_name,last_name,email,gpa,phone,address\n\
                    Ann,Lee,ann@x.io,3.5,,\n\
                    Bad,Gpa,bad@x.io,five,,\n\
                    Dup,Ann,ann@x.io,2.0,,\n\
                    Cy,Moe,cy@x.io,,555-0100,\"1 Elm St, Apt 2\"\n";
        let report = import_csv(&store, text).await.unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(
            report.errors.iter().map(|e| e.line).collect::<Vec<_>>(),
            vec![3, 4]
        );

        let cy = store
            .query(
                &FilterSpec {
                    search: Some("cy@".into()),
                    ..FilterSpec::all()
                },
                SortSpec::default(),
                None,
            )
            .await
            .unwrap()
            .remove(0);
        assert_eq!(cy.gpa.to_string(), "0.00");
        assert_eq!(cy.address.as_deref(), Some("1 Elm St, Apt 2"));
        assert_eq!(cy.phone.as_deref(), Some("555-0100"));
    }

    #[tokio::test]
    async fn export_then_import_reproduces_core_tuples() {
        let source = MemoryStudentStore::new();
        for (f, l, e, g) in [
            ("Ann", "Lee", "ann@x.io", "3.90"),
            ("Bo", "Smith, Jr.", "bo@x.io", "3.20"),
            ("Cy", "O\"Hara", "cy@x.io", "1.05"),
        ] {
            create_student(&source, &form(f, l, e, g)).await.unwrap();
        }
        let csv = export_all_csv(&source).await.unwrap();

        let target = MemoryStudentStore::new();
        let report = import_csv(&target, &csv).await.unwrap();
        assert_eq!(report.imported, 3);
        assert_eq!(report.failed, 0);

        let tuples = |rows: Vec<Student>| -> BTreeSet<(String, String, String, String)> {
            rows.into_iter()
                .map(|s| (s.first_name, s.last_name, s.email, s.gpa.to_string()))
                .collect()
        };
        async fn all(store: &MemoryStudentStore) -> Vec<Student> {
            store
                .query(&FilterSpec::all(), SortSpec::default(), None)
                .await
                .unwrap()
        }
        assert_eq!(tuples(all(&source).await), tuples(all(&target).await));
    }

    #[tokio::test]
    async fn names_with_line_breaks_never_reach_the_export() {
        let store = MemoryStudentStore::new();
        let err = create_student(&store, &form("Ann\nMarie", "Lee", "ann@x.io", "3.5"))
            .await
            .unwrap_err();
        assert!(matches!(err, StudentError::Validation(_)));

        create_student(&store, &form("Ann Marie", "Lee", "ann@x.io", "3.5")).await.unwrap();
        let csv = export_all_csv(&store).await.unwrap();
        let target = MemoryStudentStore::new();
        let report = import_csv(&target, &csv).await.unwrap();
        assert_eq!((report.imported, report.failed), (1, 0));
        let copied = target.get(1).await.unwrap();
        assert_eq!(copied.first_name, "Ann Marie");
    }

    #[tokio::test]
    async fn selected_export_only_includes_requested_ids() {
        let store = MemoryStudentStore::new();
        for i in 0..4 {
            create_student(&store, &form("S", &format!("N{i}"), &format!("s{i}@x.io"), "3"))
                .await
                .unwrap();
        }
        let csv = export_selected_csv(&store, vec![3, 1, 99]).await.unwrap();
        let ids: Vec<&str> = csv
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert!(export_selected_csv(&store, vec![]).await.is_err());
    }

    #[tokio::test]
    async fn bulk_delete_with_missing_ids_is_silent() {
        let store = MemoryStudentStore::new();
        for i in 0..3 {
            create_student(&store, &form("S", "T", &format!("s{i}@x.io"), "3"))
                .await
                .unwrap();
        }
        assert_eq!(bulk_delete(&store, &[1, 2, 999]).await.unwrap(), 2);
        assert!(store.get(1).await.is_err());
        assert!(store.get(2).await.is_err());
        assert!(bulk_delete(&store, &[]).await.is_err());
    }

    #[tokio::test]
    async fn email_failure_is_a_warning() {
        let store = MemoryStudentStore::new();
        let s = create_student(&store, &form("Em", "Ail", "em@x.io", "3")).await.unwrap();

        let ok = RecordingMailer::default();
        let resp = email_student(
            &store,
            &ok,
            "office@school.edu",
            s.id,
            EmailRequest { subject: "Hello".into(), message: "Welcome".into() },
        )
        .await
        .unwrap();
        assert!(resp.sent);
        let sent = ok.sent.lock().await;
        assert_eq!(sent[0].to, "em@x.io");
        assert_eq!(sent[0].to_name.as_deref(), Some("Em Ail"));
        drop(sent);

        let broken = RecordingMailer { fail: true, ..RecordingMailer::default() };
        let resp = email_student(
            &store,
            &broken,
            "office@school.edu",
            s.id,
            EmailRequest { subject: "Hello".into(), message: "Welcome".into() },
        )
        .await
        .unwrap();
        assert!(!resp.sent);
        assert!(resp.warning.unwrap().contains("smtp relay refused"));
        assert_eq!(store.get(s.id).await.unwrap(), s);
    }

    #[tokio::test]
    async fn unconfigured_transport_is_not_reported_as_sent() {
        let store = MemoryStudentStore::new();
        let s = create_student(&store, &form("Lo", "Gg", "lo@x.io", "3")).await.unwrap();
        let resp = email_student(
            &store,
            &crate::mail::LogMailer,
            "office@school.edu",
            s.id,
            EmailRequest { subject: "Hello".into(), message: "Welcome".into() },
        )
        .await
        .unwrap();
        assert!(!resp.sent);
        assert!(resp.warning.unwrap().contains("SMTP_URL"));
    }

    #[tokio::test]
    async fn email_requires_subject_and_existing_student() {
        let store = MemoryStudentStore::new();
        let mailer = RecordingMailer::default();
        let err = email_student(
            &store,
            &mailer,
            "o@x.io",
            1,
            EmailRequest { subject: " ".into(), message: "x".into() },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StudentError::InvalidParameter { name: "subject", .. }));

        let err = email_student(
            &store,
            &mailer,
            "o@x.io",
            1,
            EmailRequest { subject: "s".into(), message: "x".into() },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StudentError::NotFound { id: 1 }));
    }
}
