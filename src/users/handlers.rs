use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::model::{NewUser, User};
use super::service;
use crate::context::RequestContext;
use crate::error::StoreError;
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/users", get(list_users).post(create_user))
}

/// POST /users
#[instrument(skip(state, input))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<NewUser>,
) -> Result<(StatusCode, HeaderMap, Json<User>), StoreError> {
    let ctx = RequestContext::with_timeout(state.config.request_timeout);
    let user = service::create_user(&ctx, state.store.as_ref(), input).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/users/{}", user.id)) {
        headers.insert(header::LOCATION, location);
    }

    Ok((StatusCode::CREATED, headers, Json(user)))
}

/// GET /users
#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, StoreError> {
    let ctx = RequestContext::with_timeout(state.config.request_timeout);
    let users = service::list_users(&ctx, state.store.as_ref()).await?;
    Ok(Json(users))
}
