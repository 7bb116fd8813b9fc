// src/api/lessons.rs

use actix_web::{HttpResponse, delete, get, post, put, web};
use serde_json::{Value, json};

use crate::AppState;
use crate::api::auth::{Claims, caller};
use crate::error::AppError;
use crate::lessons::{self, QuizAnswers};

#[utoipa::path(
    get,
    path = "/api/lessons/{lesson_id}",
    tag = "lessons",
    params(("lesson_id" = String, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Lesson with its neighbours", body = lessons::LessonView),
        (status = 403, description = "Not enrolled or section not released"),
        (status = 404, description = "Item not found")
    ),
    security(("bearer" = []))
)]
#[get("/lessons/{lesson_id}")]
pub async fn get_lesson(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let ctx = caller(&state, &claims).await?;
    let view = lessons::get_lesson_details(state.store.as_ref(), &ctx, &path).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    delete,
    path = "/api/lessons/{lesson_id}",
    tag = "lessons",
    params(("lesson_id" = String, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Lesson deleted"),
        (status = 404, description = "Item not found")
    ),
    security(("bearer" = []))
)]
#[delete("/lessons/{lesson_id}")]
pub async fn delete_lesson(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let ctx = caller(&state, &claims).await?;
    let deleted =
        lessons::delete_lesson(state.store.as_ref(), state.media.as_ref(), &ctx, &path).await?;
    Ok(HttpResponse::Ok().json(json!({ "deleted": deleted })))
}

#[utoipa::path(
    post,
    path = "/api/lessons/{lesson_id}/complete",
    tag = "lessons",
    params(("lesson_id" = String, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Updated course progress"),
        (status = 400, description = "SCORM package or quiz not passed"),
        (status = 403, description = "Not enrolled or section not released")
    ),
    security(("bearer" = []))
)]
#[post("/lessons/{lesson_id}/complete")]
pub async fn complete_lesson(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let ctx = caller(&state, &claims).await?;
    let progress = lessons::mark_lesson_completed(state.store.as_ref(), &ctx, &path).await?;
    Ok(HttpResponse::Ok().json(progress))
}

#[utoipa::path(
    post,
    path = "/api/lessons/{lesson_id}/evaluate",
    tag = "lessons",
    params(("lesson_id" = String, Path, description = "Lesson id")),
    request_body = QuizAnswers,
    responses(
        (status = 200, description = "Stored evaluation with pass flag and score"),
        (status = 400, description = "Lesson is not a quiz")
    ),
    security(("bearer" = []))
)]
#[post("/lessons/{lesson_id}/evaluate")]
pub async fn evaluate_lesson(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    payload: web::Json<QuizAnswers>,
) -> Result<HttpResponse, AppError> {
    let ctx = caller(&state, &claims).await?;
    let evaluation =
        lessons::evaluate_quiz(state.store.as_ref(), &ctx, &path, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(evaluation))
}

#[utoipa::path(
    put,
    path = "/api/lessons/{lesson_id}/scorm",
    tag = "lessons",
    params(("lesson_id" = String, Path, description = "Lesson id")),
    request_body(content = Object, description = "SCORM runtime (cmi) state"),
    responses(
        (status = 200, description = "Stored; returns the derived outcome"),
        (status = 400, description = "Lesson is not a SCORM package")
    ),
    security(("bearer" = []))
)]
#[put("/lessons/{lesson_id}/scorm")]
pub async fn put_scorm_state(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    payload: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    let ctx = caller(&state, &claims).await?;
    let outcome =
        lessons::record_scorm_state(state.store.as_ref(), &ctx, &path, payload.into_inner())
            .await?;
    Ok(HttpResponse::Ok().json(json!({
        "outcome": outcome,
        "complete": outcome.is_complete(),
    })))
}
