use crate::config::WorkflowConfig;
use crate::http::client;
use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::Utc;
use ensemble_skills::{
    fault, Capability, CapabilityDescriptor, CapabilityRequest, OperationDescriptor,
};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Workflow automation: current time lookups and email delivery through an
/// HTTP-triggered workflow.
pub struct WorkflowCapability {
    descriptor: CapabilityDescriptor,
    config: WorkflowConfig,
    client: reqwest::Client,
}

impl WorkflowCapability {
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            descriptor: CapabilityDescriptor {
                name: crate::WORKFLOW.to_string(),
                description: "Workflow automation: send email reports and provide the current time."
                    .to_string(),
                primary_operation: "fetch_current_datetime".to_string(),
                operations: vec![
                    OperationDescriptor {
                        name: "fetch_current_datetime".to_string(),
                        description: "Current UTC time, optionally strftime-formatted.".to_string(),
                        parameters_schema: json!({
                            "type": "object",
                            "properties": {"time_format": {"type": "string"}}
                        }),
                    },
                    OperationDescriptor {
                        name: "send_email".to_string(),
                        description: "Send an email through the workflow trigger.".to_string(),
                        parameters_schema: json!({
                            "type": "object",
                            "properties": {
                                "recipient": {"type": "string"},
                                "subject": {"type": "string"},
                                "body": {"type": "string"}
                            },
                            "required": ["subject", "body"]
                        }),
                    },
                ],
            },
            config,
            client: client(),
        }
    }

    async fn send_email(&self, recipient: &str, subject: &str, body: &str) -> Value {
        let Some(trigger_url) = &self.config.trigger_url else {
            return json!({
                "status": "warning",
                "message": "Workflow trigger is not configured; running in simulated mode",
                "result": "Simulated send: OK",
                "recipient": recipient,
                "subject": subject,
            });
        };

        info!(recipient = %recipient, subject = %subject, "Triggering email workflow");
        let payload = json!({"to": recipient, "subject": subject, "body": body});
        match self.client.post(trigger_url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => json!({
                "status": "success",
                "message": format!("Email sent to {recipient}"),
                "http_status": response.status().as_u16(),
            }),
            Ok(response) => {
                let status = response.status().as_u16();
                warn!(status, "Email workflow rejected the request");
                fault(
                    "Failed to send email",
                    format!("Workflow trigger returned HTTP {status}"),
                )
            }
            Err(e) => fault("Failed to send email", e.to_string()),
        }
    }
}

/// Current UTC time. An invalid format string falls back to RFC 3339.
fn current_datetime(time_format: Option<&str>) -> String {
    let now = Utc::now();
    match time_format {
        Some(fmt) if !StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) => {
            now.format(fmt).to_string()
        }
        _ => now.to_rfc3339(),
    }
}

#[async_trait]
impl Capability for WorkflowCapability {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, request: CapabilityRequest) -> Value {
        match request.operation.as_str() {
            "fetch_current_datetime" => json!({
                "current_time": current_datetime(request.arg_str("time_format")),
            }),
            "send_email" => {
                let recipient = request
                    .arg_str("recipient")
                    .or(self.config.recipient.as_deref());
                let Some(recipient) = recipient else {
                    return fault(
                        "Missing recipient",
                        "Pass 'recipient' or set workflow.recipient",
                    );
                };
                let (Some(subject), Some(body)) =
                    (request.arg_str("subject"), request.arg_str("body"))
                else {
                    return fault("Missing argument", "'subject' and 'body' are required");
                };
                self.send_email(recipient, subject, body).await
            }
            other => fault(
                format!("Unsupported operation: {other}"),
                "workflow exposes fetch_current_datetime and send_email",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_skills::is_fault;

    #[test]
    fn test_current_datetime_formats() {
        let year = current_datetime(Some("%Y"));
        assert_eq!(year.len(), 4);
        assert!(year.chars().all(|c| c.is_ascii_digit()));

        let fallback = current_datetime(Some("%Y-%"));
        assert!(chrono::DateTime::parse_from_rfc3339(&fallback).is_ok());

        let default = current_datetime(None);
        assert!(chrono::DateTime::parse_from_rfc3339(&default).is_ok());
    }

    #[tokio::test]
    async fn test_simulated_send() {
        let workflow = WorkflowCapability::new(WorkflowConfig {
            trigger_url: None,
            recipient: Some("ops@example.com".to_string()),
        });
        let result = workflow
            .invoke(CapabilityRequest::new(
                "send_email",
                json!({"subject": "Report", "body": "All good"}),
            ))
            .await;
        assert_eq!(result["status"], "warning");
        assert_eq!(result["recipient"], "ops@example.com");
    }

    #[tokio::test]
    async fn test_missing_recipient_is_fault() {
        let workflow = WorkflowCapability::new(WorkflowConfig::default());
        let result = workflow
            .invoke(CapabilityRequest::new(
                "send_email",
                json!({"subject": "Report", "body": "All good"}),
            ))
            .await;
        assert!(is_fault(&result));
        assert_eq!(result["error"], "Missing recipient");
    }
}
