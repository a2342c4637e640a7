use std::time::Duration;

use metrics::counter;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::warn;

use srscs_domain::DomainResult;
use srscs_domain::compose::{PushNotification, PushPriority};
use srscs_domain::error::DomainError;
use srscs_domain::ports::BoxFuture;
use srscs_domain::ports::push::{MulticastResponse, PushTransport, SendErrorClass, SendResult};

use crate::config::AppConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const SEND_RESULT_TOTAL: &str = "srscs_push_send_total";
const BROADCAST_TOTAL: &str = "srscs_push_broadcast_total";

#[derive(Debug, thiserror::Error)]
pub enum FcmError {
    #[error("fcm transport configuration error: {0}")]
    Configuration(String),
    #[error("fcm transport error: {0}")]
    Transport(String),
}

/// FCM HTTP v1 adapter. The v1 API takes one message per request, so a
/// multicast is a sequential loop of per-token sends, each classified on
/// its own; one dead token never fails the batch.
pub struct FcmTransport {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    access_token: String,
}

impl FcmTransport {
    pub fn from_config(config: &AppConfig) -> Result<Self, FcmError> {
        if config.fcm_project_id.is_empty() {
            return Err(FcmError::Configuration("fcm_project_id is not set".to_string()));
        }
        if config.fcm_access_token.is_empty() {
            return Err(FcmError::Configuration("fcm_access_token is not set".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| FcmError::Configuration(err.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.fcm_endpoint.trim_end_matches('/').to_string(),
            project_id: config.fcm_project_id.clone(),
            access_token: config.fcm_access_token.clone(),
        })
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.endpoint, self.project_id
        )
    }

    fn message_body(notification: &PushNotification, target: Value) -> Value {
        let android_priority = match notification.priority {
            PushPriority::Normal => "normal",
            PushPriority::High | PushPriority::Max => "high",
        };
        let mut message = json!({
            "notification": {
                "title": notification.title,
                "body": notification.body,
            },
            "data": notification.data,
            "android": {
                "priority": android_priority,
                "notification": {
                    "channel_id": notification.hints.android_channel_id,
                    "sound": notification.hints.sound,
                },
            },
            "apns": {
                "payload": {
                    "aps": {
                        "sound": notification.hints.sound,
                        "badge": notification.hints.badge,
                    },
                },
            },
        });
        if notification.priority == PushPriority::Max {
            message["android"]["notification"]["default_vibrate_timings"] = json!(true);
        }
        if let (Value::Object(message), Value::Object(target)) = (&mut message, target) {
            message.extend(target);
        }
        json!({ "message": message })
    }

    /// `Ok` carries the response body when FCM accepted the message; a
    /// rejection or local transport failure comes back as a classified
    /// error.
    async fn post_message(&self, payload: &Value) -> Result<Option<Value>, SendErrorClass> {
        let response = self
            .http
            .post(self.send_url())
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await
            .map_err(|_| SendErrorClass::Unavailable)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Value>().await.ok());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body))
    }

    async fn send_single(
        &self,
        token: &str,
        notification: &PushNotification,
    ) -> Result<(), SendErrorClass> {
        let payload = Self::message_body(notification, json!({ "token": token }));
        self.post_message(&payload).await.map(|_| ())
    }
}

/// Maps an FCM error response onto the domain's failure taxonomy. The v1
/// API reports dead registrations as 404/UNREGISTERED and malformed
/// tokens as 400/INVALID_ARGUMENT.
pub fn classify_failure(status: StatusCode, body: &str) -> SendErrorClass {
    if status == StatusCode::NOT_FOUND || body.contains("UNREGISTERED") {
        return SendErrorClass::Unregistered;
    }
    if status == StatusCode::BAD_REQUEST || body.contains("INVALID_ARGUMENT") {
        return SendErrorClass::InvalidToken;
    }
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return SendErrorClass::Unavailable;
    }
    SendErrorClass::Internal
}

impl PushTransport for FcmTransport {
    fn send_multicast(
        &self,
        tokens: &[String],
        notification: &PushNotification,
    ) -> BoxFuture<'_, DomainResult<MulticastResponse>> {
        let tokens = tokens.to_vec();
        let notification = notification.clone();
        Box::pin(async move {
            let mut responses = Vec::with_capacity(tokens.len());
            for token in &tokens {
                let result = match self.send_single(token, &notification).await {
                    Ok(()) => SendResult {
                        success: true,
                        error: None,
                    },
                    Err(class) => {
                        warn!(class = ?class, "push send failed");
                        SendResult {
                            success: false,
                            error: Some(class),
                        }
                    }
                };
                let label = match result.error {
                    None => "ok",
                    Some(class) if class.is_permanent() => "permanent_failure",
                    Some(_) => "transient_failure",
                };
                counter!(SEND_RESULT_TOTAL, "result" => label).increment(1);
                responses.push(result);
            }
            let success_count = responses.iter().filter(|r| r.success).count();
            Ok(MulticastResponse {
                success_count,
                failure_count: responses.len() - success_count,
                responses,
            })
        })
    }

    fn send_to_channel(
        &self,
        channel: &str,
        notification: &PushNotification,
    ) -> BoxFuture<'_, DomainResult<String>> {
        let channel = channel.to_string();
        let notification = notification.clone();
        Box::pin(async move {
            let payload = Self::message_body(&notification, json!({ "topic": channel }));
            match self.post_message(&payload).await {
                Ok(body) => {
                    counter!(BROADCAST_TOTAL, "result" => "ok").increment(1);
                    let ack = body
                        .as_ref()
                        .and_then(|value| value.get("name"))
                        .and_then(Value::as_str)
                        .unwrap_or(&channel)
                        .to_string();
                    Ok(ack)
                }
                Err(class) => {
                    counter!(BROADCAST_TOTAL, "result" => "error").increment(1);
                    Err(DomainError::Transport(format!(
                        "channel broadcast to {channel} failed: {class:?}"
                    )))
                }
            }
        })
    }

    fn send_dry_run(&self, token: &str) -> BoxFuture<'_, DomainResult<Option<SendErrorClass>>> {
        let token = token.to_string();
        Box::pin(async move {
            let payload = json!({
                "validate_only": true,
                "message": {
                    "token": token,
                    "data": { "test": "true" },
                },
            });
            match self.post_message(&payload).await {
                Ok(_) => Ok(None),
                Err(class) => Ok(Some(class)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_and_unregistered_bodies_are_permanent() {
        let class = classify_failure(StatusCode::NOT_FOUND, "");
        assert!(class.is_permanent());
        let class = classify_failure(
            StatusCode::FORBIDDEN,
            r#"{"error":{"status":"UNREGISTERED"}}"#,
        );
        assert_eq!(class, SendErrorClass::Unregistered);
    }

    #[test]
    fn bad_request_is_an_invalid_token() {
        let class = classify_failure(StatusCode::BAD_REQUEST, "");
        assert_eq!(class, SendErrorClass::InvalidToken);
        assert!(class.is_permanent());
    }

    #[test]
    fn throttling_and_server_errors_are_transient() {
        assert_eq!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, ""),
            SendErrorClass::Unavailable
        );
        assert_eq!(
            classify_failure(StatusCode::INTERNAL_SERVER_ERROR, ""),
            SendErrorClass::Unavailable
        );
        assert!(!SendErrorClass::Unavailable.is_permanent());
    }

    #[test]
    fn max_priority_requests_vibration_hints() {
        let notification = srscs_domain::compose::urgent_notice(
            "n1",
            &srscs_domain::event::NoticeSnapshot {
                notice_type: "emergency".to_string(),
                title: "t".to_string(),
            },
        );
        let body = FcmTransport::message_body(&notification, json!({ "topic": "urgent_notices" }));
        assert_eq!(body["message"]["topic"], "urgent_notices");
        assert_eq!(body["message"]["android"]["priority"], "high");
        assert_eq!(
            body["message"]["android"]["notification"]["default_vibrate_timings"],
            json!(true)
        );
        assert_eq!(
            body["message"]["android"]["notification"]["channel_id"],
            "srscs_high_importance"
        );
    }

    #[test]
    fn missing_credentials_fail_construction() {
        let config = AppConfig {
            app_env: "development".to_string(),
            log_level: "info".to_string(),
            push_backend: "fcm".to_string(),
            fcm_endpoint: "https://fcm.googleapis.com".to_string(),
            fcm_project_id: String::new(),
            fcm_access_token: String::new(),
            sweep_hour: 2,
            sweep_utc_offset_hours: 6,
        };
        assert!(matches!(
            FcmTransport::from_config(&config),
            Err(FcmError::Configuration(_))
        ));
    }
}
