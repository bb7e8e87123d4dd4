// libs/assistant-cell/src/services/gemini.rs
use std::collections::HashSet;
use std::iter;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::{ModelError, ModelErrorKind};
use crate::models::{ModelResponse, ToolInvocation, TurnPayload};
use crate::services::tools::tool_declarations;

/// A stateful conversation with the model. A failed send leaves the
/// dialogue untouched so the same payload can be sent again, and so does a
/// reply with no content.
#[async_trait]
pub trait Dialogue: Send {
    async fn send(&mut self, payload: &TurnPayload) -> Result<ModelResponse, ModelError>;
}

/// Opens a fresh [`Dialogue`] for each new conversation.
pub trait DialogueFactory: Send + Sync {
    fn open(&self) -> Box<dyn Dialogue>;
}

// ==============================================================================
// WIRE FORMAT
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A content part. Fields we do not interpret (thought signatures and the
/// like) are kept in `extra` and sent back unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    fn is_thought(&self) -> bool {
        self.extra.get("thought").and_then(Value::as_bool).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: &'a Content,
    contents: Vec<&'a Content>,
    tools: &'a Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[allow(dead_code)]
    code: Option<i64>,
    message: Option<String>,
    status: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}

// ==============================================================================
// ERROR CLASSIFICATION
// ==============================================================================

/// Classifies a non-success `generateContent` reply from its status code and
/// structured error envelope.
pub fn classify_failure(status: u16, body: &str) -> ModelError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();

    let status_text = envelope
        .as_ref()
        .and_then(|envelope| envelope.error.status.clone())
        .unwrap_or_default();
    let key_rejected = envelope.as_ref().is_some_and(|envelope| {
        envelope
            .error
            .details
            .iter()
            .any(|detail| detail.reason.as_deref() == Some("API_KEY_INVALID"))
    });
    let message = envelope
        .and_then(|envelope| envelope.error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("Model request failed with status {}", status)
            } else {
                body.to_string()
            }
        });

    let kind = if status == 503 || status_text == "UNAVAILABLE" {
        ModelErrorKind::Overloaded
    } else if status == 401
        || status == 403
        || key_rejected
        || status_text == "UNAUTHENTICATED"
        || status_text == "PERMISSION_DENIED"
    {
        ModelErrorKind::Configuration
    } else {
        ModelErrorKind::Other
    };

    ModelError::new(kind, message).with_status(status)
}

fn classify_transport(err: &reqwest::Error) -> ModelError {
    let kind = if err.is_connect() || err.is_timeout() || err.is_request() {
        ModelErrorKind::Connectivity
    } else {
        ModelErrorKind::Other
    };
    ModelError::new(kind, format!("Model request failed: {}", err))
}

// ==============================================================================
// CLIENT
// ==============================================================================

/// Gemini `generateContent` client with the booking tools declared.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    tools: Value,
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
            tools: json!([{ "functionDeclarations": tool_declarations() }]),
        }
    }

    async fn generate_content(
        &self,
        system_instruction: &Content,
        contents: Vec<&Content>,
    ) -> Result<Content, ModelError> {
        if self.api_key.is_empty() {
            return Err(ModelError::new(
                ModelErrorKind::Configuration,
                "Gemini API key is not set",
            ));
        }

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = GenerateContentRequest {
            system_instruction,
            contents,
            tools: &self.tools,
        };

        debug!("Sending {} contents to {}", request.contents.len(), self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| classify_transport(&err))?;

        let status = response.status();
        let body = response.text().await.map_err(|err| classify_transport(&err))?;

        if !status.is_success() {
            let err = classify_failure(status.as_u16(), &body);
            warn!("Model request failed ({:?}, {}): {}", err.kind, status, err.message);
            return Err(err);
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|err| {
            ModelError::new(
                ModelErrorKind::InvalidResponse,
                format!("Failed to parse model response: {}", err),
            )
        })?;

        let candidate = parsed.candidates.into_iter().next();
        if let Some(reason) = candidate.as_ref().and_then(|candidate| candidate.finish_reason.as_deref()) {
            debug!("Model finished with {}", reason);
        }

        let mut content = candidate
            .and_then(|candidate| candidate.content)
            .unwrap_or_default();
        if content.role.is_empty() {
            content.role = "model".to_string();
        }
        Ok(content)
    }
}

// ==============================================================================
// DIALOGUE
// ==============================================================================

/// Receptionist instructions for one conversation, pinned to the moment the
/// conversation was opened.
pub fn system_prompt(clinic_name: &str, now: DateTime<Utc>) -> String {
    format!(
        "You are a smart and helpful receptionist for {clinic}.\n\
         Current Date/Time: {now}\n\
         \n\
         Your responsibilities:\n\
         1. Answer questions about the clinic.\n\
         2. Help patients book appointments.\n\
         \n\
         Booking Process:\n\
         1. Ask for Patient Name and Email if not known.\n\
         2. Ask for preferred date and time.\n\
         3. Call 'checkAvailability' to see if the requested time overlaps with existing bookings (busy slots).\n\
         4. If available, call 'bookAppointment'.\n\
         5. If busy, suggest alternative times.\n\
         \n\
         Rules:\n\
         - Always output dates in ISO 8601 when calling tools.\n\
         - Be polite and professional.\n\
         - If a tool fails, explain the error to the user.\n",
        clinic = clinic_name,
        now = now.format("%A, %B %-d %Y %H:%M:%S UTC"),
    )
}

const NOT_EXECUTED: &str = "Error: Not executed. The conversation moved on before this tool ran.";

/// A Gemini conversation. Holds the full content history and replays it on
/// every exchange.
pub struct GeminiDialogue {
    client: Arc<GeminiClient>,
    system_instruction: Content,
    history: Vec<Content>,
    generated_ids: HashSet<String>,
    /// Tool results whose send never produced a stored reply.
    undelivered: Vec<Part>,
}

impl GeminiDialogue {
    pub fn new(client: Arc<GeminiClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            client,
            system_instruction: Content {
                role: "system".to_string(),
                parts: vec![Part::text(system_prompt)],
            },
            history: Vec::new(),
            generated_ids: HashSet::new(),
            undelivered: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    /// Function calls in the last model turn that no tool results answered.
    /// Left behind when a message ends before its tool rounds finish.
    fn unanswered_calls(&self) -> Vec<&FunctionCall> {
        match self.history.last() {
            Some(last) if last.role == "model" => last
                .parts
                .iter()
                .filter_map(|part| part.function_call.as_ref())
                .collect(),
            _ => Vec::new(),
        }
    }

    fn user_content(&self, payload: &TurnPayload) -> Content {
        let parts = match payload {
            // Every function call needs a response before the next text turn.
            TurnPayload::Text(text) => {
                let pending = self.unanswered_calls();
                let answers: Vec<Part> = if pending.is_empty() {
                    Vec::new()
                } else if !self.undelivered.is_empty() {
                    self.undelivered.clone()
                } else {
                    pending
                        .into_iter()
                        .map(|call| Part {
                            function_response: Some(FunctionResponse {
                                id: call.id.clone(),
                                name: call.name.clone(),
                                response: json!({ "result": NOT_EXECUTED }),
                            }),
                            ..Default::default()
                        })
                        .collect()
                };
                answers.into_iter().chain(iter::once(Part::text(text.clone()))).collect()
            }
            TurnPayload::ToolResults(results) => results
                .iter()
                .map(|result| Part {
                    function_response: Some(FunctionResponse {
                        // Ids we minted ourselves mean nothing to the model.
                        id: Some(result.id.clone()).filter(|id| !self.generated_ids.contains(id)),
                        name: result.name.clone(),
                        response: json!({ "result": result.result }),
                    }),
                    ..Default::default()
                })
                .collect(),
        };

        Content {
            role: "user".to_string(),
            parts,
        }
    }

    fn interpret(&mut self, reply: &Content) -> ModelResponse {
        let text: String = reply
            .parts
            .iter()
            .filter(|part| !part.is_thought())
            .filter_map(|part| part.text.as_deref())
            .collect();

        let tool_invocations = reply
            .parts
            .iter()
            .filter_map(|part| part.function_call.as_ref())
            .map(|call| {
                let id = match &call.id {
                    Some(id) if !id.is_empty() => id.clone(),
                    _ => {
                        let id = Uuid::new_v4().to_string();
                        self.generated_ids.insert(id.clone());
                        id
                    }
                };
                ToolInvocation::new(id, call.name.clone(), call.args.clone())
            })
            .collect();

        ModelResponse {
            text: Some(text).filter(|text| !text.is_empty()),
            tool_invocations,
        }
    }
}

#[async_trait]
impl Dialogue for GeminiDialogue {
    async fn send(&mut self, payload: &TurnPayload) -> Result<ModelResponse, ModelError> {
        let turn = self.user_content(payload);
        if matches!(payload, TurnPayload::ToolResults(_)) {
            self.undelivered = turn.parts.clone();
        }
        let contents = self.history.iter().chain(iter::once(&turn)).collect();

        let reply = self
            .client
            .generate_content(&self.system_instruction, contents)
            .await?;

        if reply.parts.is_empty() {
            warn!("Model returned no content, leaving the exchange out of the history");
            return Ok(ModelResponse::default());
        }

        let response = self.interpret(&reply);
        self.undelivered.clear();
        self.history.push(turn);
        self.history.push(reply);
        Ok(response)
    }
}

/// Opens [`GeminiDialogue`]s sharing one HTTP client.
pub struct GeminiDialogueFactory {
    client: Arc<GeminiClient>,
    clinic_name: String,
}

impl GeminiDialogueFactory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Arc::new(GeminiClient::new(config)),
            clinic_name: config.clinic_name.clone(),
        }
    }
}

impl DialogueFactory for GeminiDialogueFactory {
    fn open(&self) -> Box<dyn Dialogue> {
        Box::new(GeminiDialogue::new(
            self.client.clone(),
            system_prompt(&self.clinic_name, Utc::now()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_is_overloaded() {
        let body = r#"{"error":{"code":503,"message":"The model is overloaded. Please try again later.","status":"UNAVAILABLE"}}"#;
        let err = classify_failure(503, body);
        assert_eq!(err.kind, ModelErrorKind::Overloaded);
        assert_eq!(err.status, Some(503));
        assert_eq!(err.message, "The model is overloaded. Please try again later.");

        let proxied = r#"{"error":{"code":500,"message":"backend","status":"UNAVAILABLE"}}"#;
        assert_eq!(classify_failure(500, proxied).kind, ModelErrorKind::Overloaded);
    }

    #[test]
    fn invalid_key_is_configuration() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT","details":[{"@type":"type.googleapis.com/google.rpc.ErrorInfo","reason":"API_KEY_INVALID","domain":"googleapis.com"}]}}"#;
        assert_eq!(classify_failure(400, body).kind, ModelErrorKind::Configuration);
        assert_eq!(classify_failure(403, "").kind, ModelErrorKind::Configuration);

        let denied = r#"{"error":{"code":403,"message":"denied","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(classify_failure(403, denied).kind, ModelErrorKind::Configuration);
    }

    #[test]
    fn other_failures_keep_message() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = classify_failure(429, body);
        assert_eq!(err.kind, ModelErrorKind::Other);
        assert_eq!(err.message, "Resource has been exhausted");

        let opaque = classify_failure(500, "");
        assert_eq!(opaque.message, "Model request failed with status 500");
    }

    #[test]
    fn unknown_part_fields_round_trip() {
        let raw = json!({
            "functionCall": { "name": "checkAvailability", "args": {} },
            "thoughtSignature": "abc123"
        });
        let part: Part = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(part.extra.get("thoughtSignature"), Some(&json!("abc123")));
        assert_eq!(serde_json::to_value(&part).unwrap(), raw);
    }

    #[test]
    fn prompt_names_clinic_and_tools() {
        let prompt = system_prompt("DentalCare Hospital", Utc::now());
        assert!(prompt.contains("receptionist for DentalCare Hospital"));
        assert!(prompt.contains("'checkAvailability'"));
        assert!(prompt.contains("'bookAppointment'"));
    }
}
