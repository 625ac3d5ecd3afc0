//! Wire types for the inference endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use stepwise_protocols::{Artifact, InferenceRequest, InferenceResponse, Payload, SessionEvent};

/// Body posted to the endpoint.
#[derive(Debug, Serialize)]
pub struct ApiRequest<'a> {
    pub run_id: &'a str,
    pub step_index: usize,
    pub total_steps: usize,
    pub attempt: u32,
    pub instruction: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    pub flags: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<&'a str>,
    pub context: &'a [SessionEvent],
}

impl<'a> From<&'a InferenceRequest> for ApiRequest<'a> {
    fn from(request: &'a InferenceRequest) -> Self {
        Self {
            run_id: &request.run_id,
            step_index: request.step_index,
            total_steps: request.total_steps,
            attempt: request.attempt,
            instruction: &request.instruction,
            system: request.system.as_deref(),
            flags: &request.flags,
            last_error: request.last_error.as_deref(),
            context: &request.context,
        }
    }
}

/// Body returned by the endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    pub output: String,
    /// Only an explicit `true` counts as success.
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub artifacts: Vec<ApiArtifact>,
}

/// Artifact as sent over the wire: text content or raw bytes.
#[derive(Debug, Deserialize)]
pub struct ApiArtifact {
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub bytes: Option<Vec<u8>>,
}

impl From<ApiArtifact> for Artifact {
    fn from(artifact: ApiArtifact) -> Self {
        let payload = match (artifact.text, artifact.bytes) {
            (Some(text), _) => Payload::Text(text),
            (None, Some(bytes)) => Payload::Bytes(bytes),
            (None, None) => Payload::Empty,
        };
        Artifact::new(artifact.kind, payload)
    }
}

impl From<ApiResponse> for InferenceResponse {
    fn from(response: ApiResponse) -> Self {
        Self {
            output_text: response.output,
            is_success: response.success,
            artifacts: response.artifacts.into_iter().map(Artifact::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_protocols::{ExecutionState, WorkflowStep};

    #[test]
    fn test_request_borrows_state_view() {
        let step = WorkflowStep {
            index: 0,
            instruction: "Open page".to_string(),
        };
        let request = InferenceRequest::for_step("run-9", &step, 3, &ExecutionState::default())
            .with_system("act");
        let json = serde_json::to_value(ApiRequest::from(&request)).unwrap();
        assert_eq!(json["run_id"], "run-9");
        assert_eq!(json["instruction"], "Open page");
        assert_eq!(json["system"], "act");
        assert_eq!(json["total_steps"], 3);
        assert!(json.get("last_error").is_none());
    }

    #[test]
    fn test_response_without_success_is_unconfirmed() {
        let response: ApiResponse =
            serde_json::from_str(r#"{"output": "error: page failed to load"}"#).unwrap();
        let response = InferenceResponse::from(response);
        assert!(!response.is_success);
        assert!(response.artifacts.is_empty());
    }

    #[test]
    fn test_artifact_payload_selection() {
        let json = r#"{"output": "x", "artifacts": [
            {"kind": "page_snapshot", "text": "<html/>"},
            {"kind": "screenshot", "bytes": [1, 2, 3]},
            {"kind": "marker"}
        ]}"#;
        let response = InferenceResponse::from(serde_json::from_str::<ApiResponse>(json).unwrap());
        assert_eq!(response.artifacts[0].payload, Payload::Text("<html/>".to_string()));
        assert_eq!(response.artifacts[1].payload, Payload::Bytes(vec![1, 2, 3]));
        assert_eq!(response.artifacts[2].payload, Payload::Empty);
    }
}
