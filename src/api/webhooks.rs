// src/api/webhooks.rs

use actix_web::{HttpRequest, HttpResponse, get, post, web};
use serde_json::json;

use crate::AppState;
use crate::error::AppError;
use crate::payments::{self, PaymentEvent, PaymentOutcome};
use crate::responses;

pub const SIGNATURE_HEADER: &str = "X-Signature";

#[utoipa::path(
    post,
    path = "/webhooks/payment",
    tag = "webhooks",
    request_body = PaymentEvent,
    params(("X-Signature" = String, Header, description = "Hex HMAC-SHA256 of the raw body")),
    responses(
        (status = 200, description = "Event processed, or already processed"),
        (status = 400, description = "Malformed payload"),
        (status = 401, description = "Bad or missing signature")
    )
)]
#[post("/webhooks/payment")]
pub async fn payment_webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !payments::verify_signature(&state.webhook_secret, &body, signature) {
        log::warn!("payment webhook rejected: bad signature");
        return Err(AppError::InvalidSignature);
    }

    let event: PaymentEvent = serde_json::from_slice(&body).map_err(|e| {
        log::warn!("payment webhook parse error: {e}");
        AppError::InvalidInput(e.to_string())
    })?;

    let outcome = payments::handle_payment_event(state.store.as_ref(), &event).await?;
    let status = match outcome {
        PaymentOutcome::Activated => "activated",
        PaymentOutcome::Failed => "failed",
        PaymentOutcome::Duplicate => "duplicate",
        PaymentOutcome::Ignored => "ignored",
    };
    log::info!(
        "payment webhook processed transaction_id={} outcome={}",
        event.transaction_id,
        status
    );
    Ok(HttpResponse::Ok().json(json!({ "status": status })))
}

#[utoipa::path(
    get,
    path = "/unsubscribe/{token}",
    tag = "webhooks",
    params(("token" = String, Path, description = "Unsubscribe token from an email footer")),
    responses(
        (status = 200, description = "Unsubscribed"),
        (status = 404, description = "Unknown token")
    )
)]
#[get("/unsubscribe/{token}")]
pub async fn unsubscribe(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    payments::unsubscribe(state.store.as_ref(), &path).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": responses::UNSUBSCRIBED })))
}
