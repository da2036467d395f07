//! Notification-creation endpoint
//!
//! Stateless HTTP handler that validates its input and inserts one
//! notification row. Validation and storage failures share the same `500`
//! response shape; every response, preflight and error included, carries
//! permissive cross-origin headers.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::Response,
    routing::any,
    Router,
};
use log::error;
use serde::Deserialize;
use serde_json::json;

use crate::error::Error;
use crate::models::{NewNotification, Notification};
use crate::MarcheHub;

const ALLOWED_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

/// Shared state for the notification endpoint
#[derive(Clone)]
pub struct NotifyState {
    hub: MarcheHub,
}

impl NotifyState {
    /// Wrap a backend handle; the handle's key must allow inserts into
    /// `notifications`
    pub fn new(hub: MarcheHub) -> Self {
        Self { hub }
    }
}

/// Request body of the notification endpoint
#[derive(Debug, Deserialize)]
struct CreateNotification {
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Build the router hosting the endpoint
pub fn router(state: NotifyState) -> Router {
    Router::new()
        .route("/notify-user", any(handle))
        .with_state(state)
}

/// Accepts any method; `OPTIONS` short-circuits with an empty success
async fn handle(State(state): State<NotifyState>, method: Method, body: String) -> Response {
    if method == Method::OPTIONS {
        return with_cors(StatusCode::OK, Body::empty());
    }

    match create_notification(&state, &body).await {
        Ok(payload) => json_response(StatusCode::OK, payload),
        Err(err) => {
            error!("notification not created: {}", err);
            let message = match &err {
                Error::Notify(message) => message.clone(),
                other => other.to_string(),
            };
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message }),
            )
        }
    }
}

async fn create_notification(
    state: &NotifyState,
    body: &str,
) -> Result<serde_json::Value, Error> {
    let request: CreateNotification = serde_json::from_str(body)
        .map_err(|err| Error::notify(format!("invalid request body: {}", err)))?;

    let user_id = request.user_id.filter(|id| !id.is_empty());
    let title = request.title.filter(|title| !title.is_empty());
    let (Some(user_id), Some(title)) = (user_id, title) else {
        return Err(Error::notify("userId and title are required"));
    };

    let row = NewNotification {
        user_id,
        kind: request.kind.unwrap_or_else(|| "info".to_string()),
        title,
        message: request.message,
        read: false,
    };

    let inserted = state
        .hub
        .from("notifications")
        .insert(&row)
        .execute::<Notification>()
        .await?;
    let notification = inserted
        .into_iter()
        .next()
        .ok_or_else(|| Error::notify("insert returned no row"))?;

    Ok(json!({
        "success": true,
        "notification": notification,
        "message": "Notification créée avec succès",
    }))
}

fn with_cors(status: StatusCode, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}

fn json_response(status: StatusCode, payload: serde_json::Value) -> Response {
    let mut response = with_cors(status, Body::from(payload.to_string()));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}
