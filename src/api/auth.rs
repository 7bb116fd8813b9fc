// src/api/auth.rs

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage, web};
use chrono::{Duration, Utc};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::task::{Context, Poll};

use crate::AppState;
use crate::error::AppError;
use crate::permissions::Ctx;
use crate::responses;

/// Bearer token payload: the user and the tenant it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub domain: String,
    pub exp: usize,
}

pub fn issue_token(
    secret: &str,
    user_id: &str,
    domain: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = (Utc::now() + ttl).timestamp().max(0) as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        domain: domain.to_string(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Resolves the authenticated caller into a permission context.
/// Unknown or deactivated users are rejected as unauthorized.
pub async fn caller(state: &AppState, claims: &Claims) -> Result<Ctx, AppError> {
    let user = state
        .store
        .get_user(&claims.domain, &claims.sub)
        .await?
        .filter(|u| u.active)
        .ok_or(AppError::Unauthorized)?;
    Ok(Ctx::new(user))
}

/// Middleware that:
/// - reads `Authorization: Bearer <jwt>`
/// - validates it against the secret in `AppState`
/// - puts the decoded `Claims` into request extensions
pub struct JwtMiddleware;

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtMiddlewareInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareInner { service }))
    }
}

pub struct JwtMiddlewareInner<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let Some(secret) = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.jwt_secret.clone())
        else {
            return Box::pin(async move {
                Err(actix_web::error::ErrorInternalServerError(
                    responses::INTERNAL_ERROR,
                ))
            });
        };

        let token = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_owned);

        let Some(token) = token else {
            return Box::pin(async move { Err(AppError::Unauthorized.into()) });
        };

        match decode::<Claims>(
            &token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(token_data) => {
                req.extensions_mut().insert(token_data.claims);
                let fut = self.service.call(req);
                Box::pin(async move { fut.await })
            }
            Err(e) => {
                log::debug!("rejected bearer token: {e}");
                Box::pin(async move {
                    Err(actix_web::error::ErrorUnauthorized(responses::INVALID_TOKEN))
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_round_trip_claims() {
        let token = issue_token("secret", "u1", "school", Duration::hours(1)).unwrap();
        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, "u1");
        assert_eq!(data.claims.domain, "school");
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let token = issue_token("secret", "u1", "school", Duration::hours(-2)).unwrap();
        let res = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        );
        assert!(res.is_err());
    }
}
