//! Control surface handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use super::AppState;

/// Response body for `/herd`, and the shape `PATCH /herd` echoes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HerdBody {
    pub num: usize,
    pub msg: String,
}

/// Request body for `PATCH /herd`. Signed so negative sizes reach the
/// engine and get a proper rejection instead of a parse error.
#[derive(Debug, Deserialize)]
pub struct HerdPatch {
    pub num: i64,
}

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn get_herd(State(state): State<AppState>) -> Json<HerdBody> {
    Json(HerdBody {
        num: state.herd.herd_size(),
        msg: "success".to_string(),
    })
}

pub async fn patch_herd(
    State(state): State<AppState>,
    payload: Result<Json<HerdPatch>, JsonRejection>,
) -> (StatusCode, Json<HerdBody>) {
    let Json(patch) = match payload {
        Ok(patch) => patch,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "bad herd patch");
            return (
                StatusCode::BAD_REQUEST,
                Json(HerdBody {
                    num: state.herd.herd_size(),
                    msg: rejection.body_text(),
                }),
            );
        }
    };

    let resize = state.herd.update_herd_size(patch.num).await;
    let status = if resize.is_rejected() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(HerdBody {
            num: resize.num,
            msg: resize.msg,
        }),
    )
}

pub async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.herd.metrics())
}
