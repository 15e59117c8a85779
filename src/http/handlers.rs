//! Route handlers. Each one unwraps its input, calls a service and shapes JSON.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::HOST;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde_json::json;

use super::{ApiError, AppState};
use crate::accounts::{SigninRequest, SignupRequest, VerifyOtpRequest};
use crate::auth::AuthUser;
use crate::content::{ContentUpdate, NewContent};
use crate::entities::{ContentId, LabelId};

type ApiResult<T> = Result<T, ApiError>;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    state.accounts.signup(request).await?;
    Ok(Json(json!({ "message": "OTP sent to your email" })))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let token = state.accounts.verify_otp(request).await?;
    Ok(Json(json!({ "token": token })))
}

pub async fn signin(
    State(state): State<AppState>,
    payload: Result<Json<SigninRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let token = state.accounts.signin(request).await?;
    Ok(Json(json!({ "token": token })))
}

pub async fn create_content(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<NewContent>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(input) = payload?;
    let content = state.content.create(user_id, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Content created", "content": content })),
    ))
}

pub async fn list_content(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<impl IntoResponse> {
    let contents = state.content.list(user_id).await?;
    Ok(Json(json!({ "contents": contents })))
}

pub async fn update_content(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    payload: Result<Json<ContentUpdate>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(update) = payload?;
    let content = state
        .content
        .update(user_id, ContentId(id), update)
        .await?;
    Ok(Json(json!({ "message": "Content updated", "content": content })))
}

pub async fn delete_content(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.content.delete(user_id, ContentId(id)).await?;
    Ok(Json(json!({ "message": "Content deleted" })))
}

/// Base URL the client reached us on, honouring a reverse proxy's scheme.
fn public_base_url(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .filter(|proto| matches!(*proto, "http" | "https"))
        .unwrap_or("http");
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("{scheme}://{host}")
}

pub async fn share_content(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let link = state.shares.share(user_id).await?;
    let url = format!(
        "{}/api/v1/content/{}",
        public_base_url(&headers),
        link.token
    );
    let (status, message) = if link.created {
        (StatusCode::CREATED, "Shareable link created")
    } else {
        (StatusCode::OK, "Shareable link already exists")
    };
    Ok((
        status,
        Json(json!({ "message": message, "shareableLink": url })),
    ))
}

pub async fn shared_contents(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let contents = state.shares.shared_contents(&token).await?;
    Ok(Json(json!({ "contents": contents })))
}

pub async fn list_types(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<impl IntoResponse> {
    let types = state.content.types(user_id).await?;
    Ok(Json(json!({ "types": types })))
}

pub async fn contents_by_type(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(type_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let contents = state.content.by_type(user_id, LabelId(type_id)).await?;
    Ok(Json(json!({ "contents": contents })))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_public_base_url_uses_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("links.example.com"));
        assert_eq!(public_base_url(&headers), "http://links.example.com");

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(public_base_url(&headers), "https://links.example.com");
    }

    #[test]
    fn test_public_base_url_ignores_bogus_proto() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("h:3000"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("gopher"));
        assert_eq!(public_base_url(&headers), "http://h:3000");
    }
}
