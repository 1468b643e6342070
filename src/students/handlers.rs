use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::extractors::AuthUser,
    state::AppState,
    students::{
        dto::{
            BulkDeleteResponse, BulkIdsRequest, EmailRequest, EmailResponse, PictureResponse,
            StudentForm,
        },
        error::StudentError,
        pictures::{picture_url, replace_profile_picture, UploadItem},
        pipeline::{chart_data, list_students, ChartData, ListingResult},
        query::{ListingParams, ListingQuery},
        repo_types::Student,
        services,
        services::ImportReport,
    },
};

const UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/students", get(list).post(create))
        .route("/students/chart-data", get(chart))
        .route("/students/export", get(export_all))
        .route("/students/import", post(import))
        .route("/students/bulk-delete", post(bulk_delete))
        .route("/students/bulk-export", post(bulk_export))
        .route("/students/:id", get(detail).put(update).delete(delete_one))
        .route("/students/:id/email", post(send_email))
        .route(
            "/students/:id/picture",
            get(picture_redirect).post(upload_picture),
        )
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
}

fn csv_attachment(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

#[instrument(skip(state, params))]
pub async fn list(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(params): Query<ListingParams>,
) -> Result<Json<ListingResult>, StudentError> {
    let query = ListingQuery::parse(&params, state.config.default_page_size)?;
    let result = list_students(state.students.as_ref(), query).await?;
    Ok(Json(result))
}

#[instrument(skip(state))]
pub async fn chart(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
) -> Result<Json<ChartData>, StudentError> {
    Ok(Json(chart_data(state.students.as_ref()).await?))
}

#[instrument(skip(state))]
pub async fn detail(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Student>, StudentError> {
    Ok(Json(state.students.get(id).await?))
}

#[instrument(skip(state, form))]
pub async fn create(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(form): Json<StudentForm>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<Student>), StudentError> {
    let student = services::create_student(state.students.as_ref(), &form).await?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/api/v1/students/{}", student.id))],
        Json(student),
    ))
}

#[instrument(skip(state, form))]
pub async fn update(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<i64>,
    Json(form): Json<StudentForm>,
) -> Result<Json<Student>, StudentError> {
    Ok(Json(
        services::update_student(state.students.as_ref(), id, &form).await?,
    ))
}

#[instrument(skip(state))]
pub async fn delete_one(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, StudentError> {
    state.students.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, body))]
pub async fn bulk_delete(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(body): Json<BulkIdsRequest>,
) -> Result<Json<BulkDeleteResponse>, StudentError> {
    let deleted = services::bulk_delete(state.students.as_ref(), &body.ids).await?;
    Ok(Json(BulkDeleteResponse {
        requested: body.ids.len(),
        deleted,
    }))
}

#[instrument(skip(state))]
pub async fn export_all(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
) -> Result<Response, StudentError> {
    let body = services::export_all_csv(state.students.as_ref()).await?;
    Ok(csv_attachment("students.csv", body))
}

#[instrument(skip(state, body))]
pub async fn bulk_export(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(body): Json<BulkIdsRequest>,
) -> Result<Response, StudentError> {
    let csv = services::export_selected_csv(state.students.as_ref(), body.ids).await?;
    Ok(csv_attachment("selected_students.csv", csv))
}

/// POST /students/import (multipart, field `csv_file`)
#[instrument(skip(state, mp))]
pub async fn import(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    mut mp: Multipart,
) -> Result<Json<ImportReport>, StudentError> {
    let mut text: Option<String> = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| StudentError::invalid("csv_file", e.to_string()))?
    {
        if field.name() != Some("csv_file") {
            continue;
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| StudentError::invalid("csv_file", e.to_string()))?;
        let decoded = String::from_utf8(data.to_vec())
            .map_err(|_| StudentError::invalid("csv_file", "file must be UTF-8 text"))?;
        text = Some(decoded);
    }
    let Some(text) = text else {
        warn!("import without csv_file");
        return Err(StudentError::invalid("csv_file", "csv_file is required"));
    };
    Ok(Json(services::import_csv(state.students.as_ref(), &text).await?))
}

#[instrument(skip(state, body))]
pub async fn send_email(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<EmailResponse>, StudentError> {
    let resp = services::email_student(
        state.students.as_ref(),
        state.mailer.as_ref(),
        &state.config.mail_from,
        id,
        body,
    )
    .await?;
    Ok(Json(resp))
}

/// POST /students/:id/picture (multipart, field `picture`)
#[instrument(skip(state, mp))]
pub async fn upload_picture(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<i64>,
    mut mp: Multipart,
) -> Result<Json<PictureResponse>, StudentError> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| StudentError::invalid("picture", e.to_string()))?
    {
        if field.name() != Some("picture") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let body = field
            .bytes()
            .await
            .map_err(|e| StudentError::invalid("picture", e.to_string()))?;
        let student = replace_profile_picture(
            &state,
            id,
            UploadItem {
                body,
                content_type: &content_type,
            },
        )
        .await?;
        return Ok(Json(PictureResponse {
            id: student.id,
            profile_picture: student.profile_picture.unwrap_or_default(),
        }));
    }
    Err(StudentError::invalid("picture", "picture is required"))
}

/// 307 to a presigned URL of the picture.
#[instrument(skip(state))]
pub async fn picture_redirect(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Redirect, StudentError> {
    let url = picture_url(&state, id).await?;
    Ok(Redirect::temporary(&url))
}
