//! Notification endpoint handlers.
//!
//! Submission, status lookup, operator retry/cancel, and the failed-work
//! listing.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use domain::models::{
    CreateNotificationRequest, NotificationResponse, NotificationStatus,
    NotificationStatusResponse,
};

/// Submit a notification for delivery.
///
/// POST /api/v1/notifications
///
/// Accepted work is durably stored before the 202 is returned.
pub async fn create_notification(
    State(state): State<AppState>,
    Json(request): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<NotificationResponse>), ApiError> {
    request.validate()?;
    let new = request.into_new().map_err(ApiError::validation)?;

    let notification = state.service.create(new).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(NotificationResponse::from(&notification)),
    ))
}

/// Fetch a notification with its full attempt history.
///
/// GET /api/v1/notifications/:id
pub async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationStatusResponse>, ApiError> {
    let notification = state
        .service
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Notification not found with id: {}", id)))?;

    Ok(Json(notification.into()))
}

/// Manually retry a failed notification.
///
/// POST /api/v1/notifications/:id/retry
///
/// Resets the retry budget and requeues. 409 unless the notification is in
/// FAILED.
pub async fn retry_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationResponse>, ApiError> {
    state
        .service
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Notification not found with id: {}", id)))?;

    let notification = state.service.reset_for_retry(id).await?.ok_or_else(|| {
        ApiError::Conflict("Notification is not in FAILED status and cannot be retried".into())
    })?;

    Ok(Json(NotificationResponse::from(&notification)))
}

/// Cancel a pending notification.
///
/// DELETE /api/v1/notifications/:id
///
/// 409 unless the notification is in PENDING. An attempt already in flight
/// cannot be retracted, but its outcome will not overwrite the cancellation.
pub async fn cancel_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Notification not found with id: {}", id)))?;

    state.service.cancel_notification(id).await?.ok_or_else(|| {
        ApiError::Conflict("Notification is not in PENDING status and cannot be cancelled".into())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Query parameters for the failed-notification listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedNotificationsQuery {
    pub vendor_name: Option<String>,
}

/// List failed notifications for operator review.
///
/// GET /api/v1/notifications/failed[?vendorName=...]
pub async fn list_failed_notifications(
    State(state): State<AppState>,
    Query(query): Query<FailedNotificationsQuery>,
) -> Result<Json<Vec<NotificationStatusResponse>>, ApiError> {
    let failed = match query.vendor_name.as_deref().filter(|v| !v.is_empty()) {
        Some(vendor_name) => {
            state
                .service
                .find_by_vendor_and_status(vendor_name, NotificationStatus::Failed)
                .await?
        }
        None => {
            state
                .service
                .find_by_status(NotificationStatus::Failed)
                .await?
        }
    };

    Ok(Json(failed.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_query_accepts_camel_case_vendor() {
        let query: FailedNotificationsQuery =
            serde_json::from_str(r#"{"vendorName": "payments"}"#).unwrap();
        assert_eq!(query.vendor_name.as_deref(), Some("payments"));
    }

    #[test]
    fn test_failed_query_vendor_optional() {
        let query: FailedNotificationsQuery = serde_json::from_str("{}").unwrap();
        assert!(query.vendor_name.is_none());
    }
}
