// src/api/courses.rs

use actix_web::{HttpResponse, delete, get, patch, post, web};
use serde_json::json;

use crate::AppState;
use crate::api::auth::{Claims, caller};
use crate::courses::{self, CreateCourseInput, UpdateCourseInput};
use crate::error::AppError;
use crate::lessons::{self, CreateLessonInput};

#[utoipa::path(
    get,
    path = "/api/courses/{course_id}",
    tag = "courses",
    params(("course_id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course"),
        (status = 404, description = "Missing or not manageable by the caller")
    ),
    security(("bearer" = []))
)]
#[get("/courses/{course_id}")]
pub async fn get_course(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let ctx = caller(&state, &claims).await?;
    let course = courses::get_course_or_throw(state.store.as_ref(), &ctx, &path).await?;
    Ok(HttpResponse::Ok().json(course))
}

#[utoipa::path(
    post,
    path = "/api/courses",
    tag = "courses",
    request_body = CreateCourseInput,
    responses(
        (status = 201, description = "Course created"),
        (status = 403, description = "Missing course:manage")
    ),
    security(("bearer" = []))
)]
#[post("/courses")]
pub async fn create_course(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    payload: web::Json<CreateCourseInput>,
) -> Result<HttpResponse, AppError> {
    let ctx = caller(&state, &claims).await?;
    let course = courses::create_course(state.store.as_ref(), &ctx, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(course))
}

#[utoipa::path(
    patch,
    path = "/api/courses/{course_id}",
    tag = "courses",
    params(("course_id" = String, Path, description = "Course id")),
    request_body = UpdateCourseInput,
    responses(
        (status = 200, description = "Course updated"),
        (status = 404, description = "Item not found")
    ),
    security(("bearer" = []))
)]
#[patch("/courses/{course_id}")]
pub async fn update_course(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    payload: web::Json<UpdateCourseInput>,
) -> Result<HttpResponse, AppError> {
    let ctx = caller(&state, &claims).await?;
    let course = courses::update_course(
        state.store.as_ref(),
        state.media.as_ref(),
        &ctx,
        &path,
        payload.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(course))
}

#[utoipa::path(
    delete,
    path = "/api/courses/{course_id}",
    tag = "courses",
    params(("course_id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course and everything referencing it deleted"),
        (status = 404, description = "Item not found"),
        (status = 403, description = "Owner lacks course:manage")
    ),
    security(("bearer" = []))
)]
#[delete("/courses/{course_id}")]
pub async fn delete_course(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let ctx = caller(&state, &claims).await?;
    let deleted =
        courses::delete_course(state.store.as_ref(), state.media.as_ref(), &ctx, &path).await?;
    Ok(HttpResponse::Ok().json(json!({ "deleted": deleted })))
}

#[utoipa::path(
    post,
    path = "/api/courses/{course_id}/lessons",
    tag = "lessons",
    params(("course_id" = String, Path, description = "Course id")),
    request_body = CreateLessonInput,
    responses(
        (status = 201, description = "Lesson created"),
        (status = 404, description = "Course or section not found")
    ),
    security(("bearer" = []))
)]
#[post("/courses/{course_id}/lessons")]
pub async fn create_lesson(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    payload: web::Json<CreateLessonInput>,
) -> Result<HttpResponse, AppError> {
    let ctx = caller(&state, &claims).await?;
    let lesson =
        lessons::create_lesson(state.store.as_ref(), &ctx, &path, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(lesson))
}
