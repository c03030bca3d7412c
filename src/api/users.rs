// User endpoints
//
// The user route table is an external collaborator; the handlers here are
// placeholders that will be replaced when it lands.

use crate::api::routes::AppState;
use crate::errors::{AppError, Result};
use axum::{
    extract::Path,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile/:id", get(get_profile))
        .route("/profile/:id", put(update_profile))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: String,
    pub display_name: String,
}

/// GET /auth/user/profile/:id
pub async fn get_profile(Path(id): Path<String>) -> Json<serde_json::Value> {
    Json(json!({ "id": id }))
}

/// PUT /auth/user/profile/:id
pub async fn update_profile(
    Path(id): Path<String>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>> {
    if req.display_name.is_empty() {
        return Err(AppError::ValidationError(
            "Display name is required".to_string(),
        ));
    }

    Ok(Json(ProfileResponse {
        id,
        display_name: req.display_name,
    }))
}
