//! Request and response bodies of the model service HTTP contract.

use serde::{Deserialize, Serialize};

use super::GenerationParams;

/// Body of `POST /generate`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    pub content_prompt: String,
    /// Empty when no style was given, as the services expect.
    pub style_prompt: String,
    pub has_vocals: bool,
    pub output_path: String,
    /// Prompt composed by the gateway.
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl From<&GenerationParams> for GenerateBody {
    fn from(params: &GenerationParams) -> Self {
        Self {
            content_prompt: params.content_prompt.clone(),
            style_prompt: params.style_prompt.clone().unwrap_or_default(),
            has_vocals: params.has_vocals,
            output_path: params.output_path.to_string_lossy().to_string(),
            prompt: params.prompt.clone(),
            duration: params.duration_secs,
        }
    }
}

/// Body of `POST /generate/extend`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendBody {
    #[serde(flatten)]
    pub base: GenerateBody,
    pub source_path: String,
    /// Same value as `source_path`; some services read this key instead.
    pub source_track_path: String,
    pub extend_duration: f64,
}

/// Body of `POST /generate/remix`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemixBody {
    #[serde(flatten)]
    pub base: GenerateBody,
    pub source_path: String,
    pub source_track_path: String,
    pub is_remix: bool,
}

/// JSON response of every model service endpoint.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BackendResponse {
    pub success: Option<bool>,
    pub duration: Option<f64>,
    pub output_path: Option<String>,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl BackendResponse {
    /// Best human-readable cause carried by the response.
    pub fn cause(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn params() -> GenerationParams {
        GenerationParams {
            prompt: "rain on a tin roof. Instrumental only, no vocals.".to_string(),
            content_prompt: "rain on a tin roof".to_string(),
            style_prompt: None,
            has_vocals: false,
            output_path: PathBuf::from("/app/output/abc.wav"),
            duration_secs: None,
        }
    }

    #[test]
    fn generate_body_uses_service_field_names() {
        let body = GenerateBody::from(&params());
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "contentPrompt": "rain on a tin roof",
                "stylePrompt": "",
                "hasVocals": false,
                "outputPath": "/app/output/abc.wav",
                "prompt": "rain on a tin roof. Instrumental only, no vocals.",
            })
        );
    }

    #[test]
    fn extend_body_flattens_and_duplicates_source() {
        let body = ExtendBody {
            base: GenerateBody::from(&params()),
            source_path: "/app/output/src.wav".to_string(),
            source_track_path: "/app/output/src.wav".to_string(),
            extend_duration: 15.0,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["sourcePath"], "/app/output/src.wav");
        assert_eq!(value["sourceTrackPath"], "/app/output/src.wav");
        assert_eq!(value["extendDuration"], 15.0);
        assert_eq!(value["contentPrompt"], "rain on a tin roof");
    }

    #[test]
    fn parses_partial_responses() {
        let response: BackendResponse =
            serde_json::from_value(json!({"success": true, "duration": 29.5})).unwrap();
        assert_eq!(response.success, Some(true));
        assert_eq!(response.duration, Some(29.5));
        assert!(response.output_path.is_none());

        let response: BackendResponse = serde_json::from_value(
            json!({"success": false, "error": "outputPath required"}),
        )
        .unwrap();
        assert_eq!(response.cause(), Some("outputPath required"));

        let response: BackendResponse =
            serde_json::from_value(json!({"message": "Model loaded successfully"})).unwrap();
        assert_eq!(response.cause(), Some("Model loaded successfully"));
    }
}
