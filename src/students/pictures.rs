use anyhow::Context;
use bytes::Bytes;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::state::AppState;
use crate::students::error::StudentError;
use crate::students::repo_types::Student;

pub const PICTURE_URL_TTL_SECS: u64 = 10 * 60;

pub struct UploadItem<'a> {
    pub body: Bytes,
    pub content_type: &'a str,
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

fn picture_key(student_id: i64, ext: &str) -> String {
    format!("students/{}/{}.{}", student_id, Uuid::new_v4(), ext)
}

/// Stores a new profile picture and points the record at it. The record
/// switch is a single store call, so a concurrent edit can neither undo it
/// nor be undone by it. The replaced object is removed afterwards; failing
/// to remove it only logs.
#[instrument(skip(st, upload), fields(student_id = id, content_type = upload.content_type))]
pub async fn replace_profile_picture(
    st: &AppState,
    id: i64,
    upload: UploadItem<'_>,
) -> Result<Student, StudentError> {
    let ext = ext_from_mime(upload.content_type).ok_or_else(|| {
        StudentError::invalid("picture", "expected a jpeg, png, webp or gif image")
    })?;
    if upload.body.is_empty() {
        return Err(StudentError::invalid("picture", "file is empty"));
    }

    st.students.get(id).await?;
    let key = picture_key(id, ext);
    st.storage
        .put_object(&key, upload.body, upload.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;

    let (updated, previous) = match st.students.set_picture(id, &key).await {
        Ok(switched) => switched,
        Err(e) => {
            if let Err(cleanup) = st.storage.delete_object(&key).await {
                warn!(error = %cleanup, %key, "orphaned picture left in storage");
            }
            return Err(e);
        }
    };

    if let Some(old) = previous {
        if let Err(e) = st.storage.delete_object(&old).await {
            warn!(error = %e, key = %old, "failed to delete previous picture");
        }
    }
    Ok(updated)
}

/// Short-lived URL for the record's picture.
pub async fn picture_url(st: &AppState, id: i64) -> Result<String, StudentError> {
    let student = st.students.get(id).await?;
    let key = student
        .profile_picture
        .ok_or_else(|| StudentError::not_found(id))?;
    let url = st
        .storage
        .presign_get(&key, PICTURE_URL_TTL_SECS)
        .await
        .with_context(|| format!("presign url for {}", key))?;
    Ok(url)
}
