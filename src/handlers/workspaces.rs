use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingDuration, WorkspaceType};
use crate::services::lifecycle;
use crate::state::AppState;

// GET /api/workspaces
pub async fn list_workspaces(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<WorkspaceType>>, AppError> {
    let workspaces = {
        let db = state.db()?;
        queries::list_workspace_types(&db)?
    };
    Ok(Json(workspaces))
}

// GET /api/quote
#[derive(Deserialize)]
pub struct QuoteQuery {
    pub workspace_type: String,
    pub duration: String,
}

#[derive(Serialize)]
pub struct QuoteResponse {
    workspace_type: String,
    duration: BookingDuration,
    total_price: f64,
}

pub async fn get_quote(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<QuoteResponse>, AppError> {
    let duration = BookingDuration::parse(&query.duration)
        .ok_or_else(|| AppError::Validation(format!("unknown duration: {}", query.duration)))?;
    let total_price = lifecycle::quote(&state, &query.workspace_type, duration)?;

    Ok(Json(QuoteResponse {
        workspace_type: query.workspace_type,
        duration,
        total_price,
    }))
}
