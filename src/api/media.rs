// src/api/media.rs

use actix_web::{HttpResponse, delete, post, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::AppState;
use crate::api::auth::{Claims, caller};
use crate::error::{AppError, MediaError};
use crate::media::PresignedUpload;
use crate::permissions::{MANAGE_ANY_COURSE, MANAGE_COURSE, MANAGE_MEDIA, MANAGE_SITE};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest {
    pub file_name: String,
}

#[utoipa::path(
    post,
    path = "/api/media/presigned",
    tag = "media",
    request_body = PresignRequest,
    responses(
        (status = 200, description = "Upload URL", body = PresignedUpload),
        (status = 403, description = "Caller cannot upload media")
    ),
    security(("bearer" = []))
)]
#[post("/media/presigned")]
pub async fn presigned_upload(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    payload: web::Json<PresignRequest>,
) -> Result<HttpResponse, AppError> {
    let ctx = caller(&state, &claims).await?;
    if !ctx.can(&[MANAGE_MEDIA, MANAGE_COURSE, MANAGE_ANY_COURSE, MANAGE_SITE]) {
        return Err(AppError::ActionNotAllowed);
    }
    let file_name = payload.file_name.trim();
    if file_name.is_empty() {
        return Err(AppError::InvalidInput("fileName is required".into()));
    }

    let upload = state.media.presigned_upload(&ctx.domain, file_name).await?;
    log::info!(
        "presigned upload issued domain={} user_id={} media_id={}",
        ctx.domain,
        ctx.user_id(),
        upload.media_id
    );
    Ok(HttpResponse::Ok().json(upload))
}

#[utoipa::path(
    post,
    path = "/api/media/{media_id}/seal",
    tag = "media",
    params(("media_id" = String, Path, description = "Media id returned by the presign call")),
    responses(
        (status = 200, description = "Upload moved into place; returns the media record"),
        (status = 404, description = "Nothing was uploaded under this id")
    ),
    security(("bearer" = []))
)]
#[post("/media/{media_id}/seal")]
pub async fn seal_media(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let ctx = caller(&state, &claims).await?;
    if !ctx.can(&[MANAGE_MEDIA, MANAGE_COURSE, MANAGE_ANY_COURSE, MANAGE_SITE]) {
        return Err(AppError::ActionNotAllowed);
    }
    let media = state.media.seal(&ctx.domain, &path).await.map_err(|e| match e {
        MediaError::NotFound(_) => AppError::ItemNotFound,
        other => other.into(),
    })?;
    Ok(HttpResponse::Ok().json(media))
}

#[utoipa::path(
    delete,
    path = "/api/media/{media_id}",
    tag = "media",
    params(("media_id" = String, Path, description = "Media id")),
    responses(
        (status = 200, description = "Media deleted"),
        (status = 403, description = "Missing media:manage"),
        (status = 404, description = "No media with this id in the caller's domain")
    ),
    security(("bearer" = []))
)]
#[delete("/media/{media_id}")]
pub async fn delete_media(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let ctx = caller(&state, &claims).await?;
    if !ctx.can(&[MANAGE_MEDIA]) {
        return Err(AppError::ActionNotAllowed);
    }
    if !state.media.delete(&ctx.domain, &path).await? {
        return Err(AppError::ItemNotFound);
    }
    Ok(HttpResponse::Ok().json(json!({ "deleted": true })))
}
