//! Notice endpoints. Creation takes a multipart form with `title`,
//! `content` and an optional `attachment` file part.

use axum::extract::{Multipart, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domains::{Notice, Upload};
use serde::Deserialize;

use crate::envelope::Envelope;
use crate::error::{api_bad_request, ApiError, ApiResult};
use crate::extract::{AuthUser, Id, ValidJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateNoticeRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Default)]
struct NoticeForm {
    title: String,
    content: String,
    attachment: Option<Upload>,
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    api_bad_request(&format!("malformed multipart body: {}", err.body_text()))
}

async fn read_form(mut multipart: Multipart) -> ApiResult<NoticeForm> {
    let mut form = NoticeForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("title") => form.title = field.text().await.map_err(multipart_error)?,
            Some("content") => form.content = field.text().await.map_err(multipart_error)?,
            Some("attachment") | Some("file") => {
                let original_name = field.file_name().unwrap_or("attachment").to_string();
                let content_type = field
                    .content_type()
                    .and_then(|value| value.parse::<mime::Mime>().ok())
                    .unwrap_or(mime::APPLICATION_OCTET_STREAM);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                // Browsers send an empty part when no file was chosen.
                if !bytes.is_empty() {
                    form.attachment = Some(Upload {
                        original_name,
                        content_type,
                        bytes,
                    });
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Notices of the caller's current department.
pub async fn list_notices(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Envelope<Vec<Notice>>>> {
    let notices = state.services.notices.list_for_user(&user.identity).await?;
    Ok(Json(Envelope::ok(notices)))
}

pub async fn list_my_notices(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Envelope<Vec<Notice>>>> {
    let notices = state
        .services
        .notices
        .list_by_author(user.identity.user_id)
        .await?;
    Ok(Json(Envelope::ok(notices)))
}

pub async fn create_notice(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Envelope<Notice>>)> {
    let form = read_form(multipart).await?;
    let notice = state
        .services
        .notices
        .create(&user.identity, &form.title, &form.content, form.attachment)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(notice).with_message("notice created")),
    ))
}

pub async fn update_notice(
    State(state): State<AppState>,
    user: AuthUser,
    Id(id): Id,
    ValidJson(body): ValidJson<UpdateNoticeRequest>,
) -> ApiResult<Json<Envelope<Notice>>> {
    let notice = state
        .services
        .notices
        .update(&user.identity, id, &body.title, &body.content)
        .await?;
    Ok(Json(Envelope::ok(notice).with_message("notice updated")))
}

pub async fn delete_notice(
    State(state): State<AppState>,
    user: AuthUser,
    Id(id): Id,
) -> ApiResult<Json<Envelope<()>>> {
    state.services.notices.delete(&user.identity, id).await?;
    Ok(Json(Envelope::done("notice deleted")))
}

pub async fn download_attachment(
    State(state): State<AppState>,
    user: AuthUser,
    Id(id): Id,
) -> ApiResult<impl IntoResponse> {
    let file = state.services.notices.attachment(&user.identity, id).await?;
    let disposition = format!("attachment; filename=\"{}\"", file.original_name);
    Ok((
        [
            (CONTENT_TYPE, file.content_type.to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    ))
}
