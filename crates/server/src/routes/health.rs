use axum::{Extension, Json};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

use crate::live::SessionRegistry;

/// GET /health
pub async fn health_check(
    Extension(registry): Extension<Arc<SessionRegistry>>,
) -> Json<JsonValue> {
    Json(json!({ "status": "ok", "live_sessions": registry.len() }))
}
