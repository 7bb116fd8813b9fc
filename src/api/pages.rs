// src/api/pages.rs

use actix_web::{HttpResponse, post, put, web};
use serde_json::Value;

use crate::AppState;
use crate::api::auth::{Claims, caller};
use crate::error::AppError;
use crate::pages;

#[utoipa::path(
    put,
    path = "/api/pages/{page_id}/draft",
    tag = "pages",
    params(("page_id" = String, Path, description = "Page id")),
    request_body(content = Object, description = "Draft layout"),
    responses(
        (status = 200, description = "Draft saved"),
        (status = 404, description = "Item not found")
    ),
    security(("bearer" = []))
)]
#[put("/pages/{page_id}/draft")]
pub async fn save_draft(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    payload: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    let ctx = caller(&state, &claims).await?;
    let page = pages::update_page_draft(
        state.store.as_ref(),
        state.media.as_ref(),
        &ctx,
        &path,
        payload.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    post,
    path = "/api/pages/{page_id}/publish",
    tag = "pages",
    params(("page_id" = String, Path, description = "Page id")),
    responses(
        (status = 200, description = "Draft published"),
        (status = 404, description = "Item not found")
    ),
    security(("bearer" = []))
)]
#[post("/pages/{page_id}/publish")]
pub async fn publish(
    state: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let ctx = caller(&state, &claims).await?;
    let page = pages::publish_page(state.store.as_ref(), state.media.as_ref(), &ctx, &path).await?;
    Ok(HttpResponse::Ok().json(page))
}
