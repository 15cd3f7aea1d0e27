use axum::{
    extract::{Multipart, Path, State},
    response::{Json, Redirect},
};
use serde_json::json;

use crate::{
    error::{FormError, Result},
    handlers::AppState,
    models::User,
    upload::parse_user_form,
};

/// Browser form submission. Replies with a redirect to the list page so a
/// reload does not resubmit; errors render as plain text.
pub async fn add_user(
    State(state): State<AppState>,
    multipart: Multipart,
) -> std::result::Result<Redirect, FormError> {
    let form = parse_user_form(multipart, &state.config).await?;
    state.service.create_user(form).await?;
    Ok(Redirect::to("/users"))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    Ok(Json(state.service.list_users().await?))
}

pub async fn get_user(State(state): State<AppState>, Path(id): Path<i32>) -> Result<Json<User>> {
    Ok(Json(state.service.get_user(id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Json<User>> {
    let form = parse_user_form(multipart, &state.config).await?;
    Ok(Json(state.service.update_user(id, form).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>> {
    let user = state.service.delete_user(id).await?;
    Ok(Json(json!({ "deleted": true, "user": user })))
}
