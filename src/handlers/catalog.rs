use axum::extract::State;
use axum::response::Json;

use crate::{
    auth::Actor, entities::item, handlers::AppState, services::catalog::CatalogReader,
    ApiResponse, ApiResult,
};

/// Active catalog items, by name.
pub async fn list_items(State(state): State<AppState>, _actor: Actor) -> ApiResult<Vec<item::Model>> {
    let items = state.services.catalog.list_active_items().await?;
    Ok(Json(ApiResponse::success(items)))
}
