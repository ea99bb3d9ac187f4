// --- File: crates/courier_notify/src/handlers.rs ---
//! Axum handlers for the notification, template and device endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use courier_common::error::{CourierError, HttpStatusCode};
use courier_common::services::{DispatchResult, EmailMessage, SmsMessage, WhatsAppMessage};
use courier_db::{DeviceToken, DeviceTokenRepository};
use courier_templates::manager::TemplateManager;
use courier_templates::model::{NewTemplate, Template, TemplateFilter, TemplateUpdate};
use courier_templates::usage::{TemplateAnalytics, UsageLog};

use crate::service::{NotificationService, PushDispatchSummary, PushPayload};

/// Shared state for the notification routes.
pub struct NotifyState {
    pub service: Arc<NotificationService>,
    pub manager: TemplateManager,
    pub usage_log: Arc<dyn UsageLog>,
    pub tokens: Arc<dyn DeviceTokenRepository>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(err: CourierError) -> ApiError {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}

// --- Send endpoints ---

pub async fn send_email(
    State(state): State<Arc<NotifyState>>,
    Json(message): Json<EmailMessage>,
) -> Result<Json<DispatchResult>, ApiError> {
    state
        .service
        .send_email(message)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn send_sms(
    State(state): State<Arc<NotifyState>>,
    Json(message): Json<SmsMessage>,
) -> Result<Json<DispatchResult>, ApiError> {
    state
        .service
        .send_sms(message)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn send_whatsapp(
    State(state): State<Arc<NotifyState>>,
    Json(message): Json<WhatsAppMessage>,
) -> Result<Json<DispatchResult>, ApiError> {
    state
        .service
        .send_whatsapp(message)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn send_push(
    State(state): State<Arc<NotifyState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<PushPayload>,
) -> Result<Json<PushDispatchSummary>, ApiError> {
    state
        .service
        .send_push(&user_id, payload)
        .await
        .map(Json)
        .map_err(api_error)
}

/// Per-item outcome of a bulk send, in input order.
#[derive(Debug, Serialize)]
pub struct BulkItemOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn send_bulk_emails(
    State(state): State<Arc<NotifyState>>,
    Json(messages): Json<Vec<EmailMessage>>,
) -> Json<Vec<BulkItemOutcome>> {
    let outcomes = state.service.send_bulk_emails(messages).await;
    Json(
        outcomes
            .into_iter()
            .map(|outcome| match outcome {
                Ok(result) => BulkItemOutcome {
                    success: true,
                    provider_message_id: result.provider_message_id,
                    error: None,
                },
                Err(err) => BulkItemOutcome {
                    success: false,
                    provider_message_id: None,
                    error: Some(err.to_string()),
                },
            })
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
pub struct TemplatedSendRequest {
    pub to: String,
    pub template: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

fn default_language() -> String {
    "en".to_string()
}

pub async fn send_templated_email(
    State(state): State<Arc<NotifyState>>,
    Json(req): Json<TemplatedSendRequest>,
) -> Result<Json<DispatchResult>, ApiError> {
    state
        .service
        .send_templated_email(&req.to, &req.template, &req.language, req.variables)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn send_templated_sms(
    State(state): State<Arc<NotifyState>>,
    Json(req): Json<TemplatedSendRequest>,
) -> Result<Json<DispatchResult>, ApiError> {
    state
        .service
        .send_templated_sms(&req.to, &req.template, &req.language, req.variables)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn send_templated_whatsapp(
    State(state): State<Arc<NotifyState>>,
    Json(req): Json<TemplatedSendRequest>,
) -> Result<Json<DispatchResult>, ApiError> {
    state
        .service
        .send_templated_whatsapp(&req.to, &req.template, &req.language, req.variables)
        .await
        .map(Json)
        .map_err(api_error)
}

// --- Template lifecycle endpoints ---

pub async fn create_template(
    State(state): State<Arc<NotifyState>>,
    Json(definition): Json<NewTemplate>,
) -> Result<(StatusCode, Json<Template>), ApiError> {
    state
        .manager
        .create(definition)
        .await
        .map(|t| (StatusCode::CREATED, Json(t)))
        .map_err(api_error)
}

pub async fn list_templates(
    State(state): State<Arc<NotifyState>>,
    Query(filter): Query<TemplateFilter>,
) -> Result<Json<Vec<Template>>, ApiError> {
    state.manager.list(filter).await.map(Json).map_err(api_error)
}

pub async fn get_template(
    State(state): State<Arc<NotifyState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Template>, ApiError> {
    state.manager.get(id).await.map(Json).map_err(api_error)
}

pub async fn update_template(
    State(state): State<Arc<NotifyState>>,
    Path(id): Path<Uuid>,
    Json(changes): Json<TemplateUpdate>,
) -> Result<Json<Template>, ApiError> {
    state
        .manager
        .update(id, changes)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn create_template_version(
    State(state): State<Arc<NotifyState>>,
    Path(id): Path<Uuid>,
    Json(changes): Json<TemplateUpdate>,
) -> Result<(StatusCode, Json<Template>), ApiError> {
    state
        .manager
        .create_version(id, changes)
        .await
        .map(|t| (StatusCode::CREATED, Json(t)))
        .map_err(api_error)
}

pub async fn submit_template(
    State(state): State<Arc<NotifyState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Template>, ApiError> {
    state
        .manager
        .submit_for_approval(id)
        .await
        .map(Json)
        .map_err(api_error)
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub approved_by: String,
}

pub async fn approve_template(
    State(state): State<Arc<NotifyState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<Template>, ApiError> {
    state
        .manager
        .approve(id, &req.approved_by)
        .await
        .map(Json)
        .map_err(api_error)
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

pub async fn reject_template(
    State(state): State<Arc<NotifyState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<Template>, ApiError> {
    state
        .manager
        .reject(id, &req.reason)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn activate_template(
    State(state): State<Arc<NotifyState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Template>, ApiError> {
    state.manager.activate(id).await.map(Json).map_err(api_error)
}

pub async fn archive_template(
    State(state): State<Arc<NotifyState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Template>, ApiError> {
    state.manager.archive(id).await.map(Json).map_err(api_error)
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    #[serde(default = "default_window_days")]
    pub days: i64,
}

fn default_window_days() -> i64 {
    30
}

pub async fn template_analytics(
    State(state): State<Arc<NotifyState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<TemplateAnalytics>, ApiError> {
    state
        .usage_log
        .analytics(id, Duration::days(params.days))
        .await
        .map(Json)
        .map_err(api_error)
}

// --- Device token endpoints ---

#[derive(Debug, Deserialize)]
pub struct RegisterDeviceRequest {
    pub user_id: String,
    pub token: String,
    pub platform: String,
}

pub async fn register_device(
    State(state): State<Arc<NotifyState>>,
    Json(req): Json<RegisterDeviceRequest>,
) -> Result<(StatusCode, Json<DeviceToken>), ApiError> {
    state
        .tokens
        .register(&req.user_id, &req.token, &req.platform)
        .await
        .map(|t| (StatusCode::CREATED, Json(t)))
        .map_err(|e| api_error(e.into()))
}

pub async fn unregister_device(
    State(state): State<Arc<NotifyState>>,
    Path(token): Path<String>,
) -> Result<StatusCode, ApiError> {
    let found = state
        .tokens
        .unregister(&token)
        .await
        .map_err(|e| api_error(e.into()))?;
    if found {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(CourierError::NotFoundError(format!(
            "device token '{token}'"
        ))))
    }
}

pub async fn subscribe_topic(
    State(state): State<Arc<NotifyState>>,
    Path((token, topic)): Path<(String, String)>,
) -> Result<Json<DeviceToken>, ApiError> {
    state
        .tokens
        .subscribe_topic(&token, &topic)
        .await
        .map(Json)
        .map_err(|e| api_error(e.into()))
}

pub async fn unsubscribe_topic(
    State(state): State<Arc<NotifyState>>,
    Path((token, topic)): Path<(String, String)>,
) -> Result<Json<DeviceToken>, ApiError> {
    state
        .tokens
        .unsubscribe_topic(&token, &topic)
        .await
        .map(Json)
        .map_err(|e| api_error(e.into()))
}
