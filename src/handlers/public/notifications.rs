use axum::{
    Json,
    extract::{Query, State},
};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::{NotificationQuery, PaymentNotification, Provider};

/// Recent webhook deliveries and their outcomes, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(mut query): Query<NotificationQuery>,
) -> Result<Json<Vec<PaymentNotification>>> {
    if let Some(ref raw) = query.provider {
        let provider = raw
            .parse::<Provider>()
            .map_err(|_| AppError::BadRequest(format!("Unknown provider: {}", raw)))?;
        query.provider = Some(provider.as_str().to_string());
    }

    let conn = state.db.get()?;
    let notifications = queries::list_notifications(&conn, &query)?;
    Ok(Json(notifications))
}
