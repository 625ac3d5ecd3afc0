//! Inference response.

use serde::{Deserialize, Serialize};

use crate::types::Payload;

/// Capture produced while the step was acted out, e.g. a screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub sub_kind: String,
    pub payload: Payload,
}

impl Artifact {
    pub fn new(sub_kind: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            sub_kind: sub_kind.into(),
            payload: payload.into(),
        }
    }
}

/// Answer of the inference component for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub output_text: String,
    pub is_success: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
}

impl InferenceResponse {
    pub fn success(output_text: impl Into<String>) -> Self {
        Self {
            output_text: output_text.into(),
            is_success: true,
            artifacts: Vec::new(),
        }
    }

    pub fn failure(output_text: impl Into<String>) -> Self {
        Self {
            output_text: output_text.into(),
            is_success: false,
            artifacts: Vec::new(),
        }
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let ok = InferenceResponse::success("clicked");
        assert!(ok.is_success);
        let failed = InferenceResponse::failure("no button");
        assert!(!failed.is_success);
        assert_eq!(failed.output_text, "no button");
    }

    #[test]
    fn test_deserialize_without_artifacts() {
        let json = r#"{"output_text": "ok", "is_success": true}"#;
        let response: InferenceResponse = serde_json::from_str(json).unwrap();
        assert!(response.artifacts.is_empty());
    }

    #[test]
    fn test_with_artifact() {
        let response = InferenceResponse::success("ok")
            .with_artifact(Artifact::new("screenshot", vec![1u8, 2]));
        assert_eq!(response.artifacts.len(), 1);
        assert_eq!(response.artifacts[0].sub_kind, "screenshot");
    }
}
