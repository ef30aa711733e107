use axum::extract::State;
use axum::response::Json;

use crate::{auth::Actor, handlers::AppState, services::dashboard::Dashboard, ApiResponse, ApiResult};

pub async fn get_dashboard(State(state): State<AppState>, actor: Actor) -> ApiResult<Dashboard> {
    let dashboard = state.services.dashboard.dashboard_for(&actor).await?;
    Ok(Json(ApiResponse::success(dashboard)))
}
