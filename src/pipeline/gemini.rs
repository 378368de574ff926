// Gemini `generateContent` client.

use std::env;
use std::time::Duration;

use log::debug;
use poll_validity::{ClassificationService, ServiceError};
use serde_json::json;
use serde_json::Value as JSValue;
use snafu::prelude::*;

use crate::pipeline::config_reader::ServiceSettings;
use crate::pipeline::*;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Connection and generation parameters, with the defaults filled in.
#[derive(PartialEq, Debug, Clone)]
pub struct GeminiSettings {
    pub model: String,
    pub endpoint: String,
    pub api_key_env: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl GeminiSettings {
    pub fn from_config(service: Option<&ServiceSettings>) -> GeminiSettings {
        let s = service.cloned().unwrap_or_default();
        GeminiSettings {
            model: s.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            endpoint: s.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_key_env: s
                .api_key_env
                .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
            temperature: s.temperature.unwrap_or(0.0),
            top_p: s.top_p.unwrap_or(0.95),
            top_k: s.top_k.unwrap_or(64),
            max_output_tokens: s.max_output_tokens.unwrap_or(8192),
            timeout: Duration::from_secs(s.timeout_secs.unwrap_or(120)),
        }
    }

    pub fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }

    pub fn request_body(&self, payload: &str, instruction: &str) -> JSValue {
        json!({
            "systemInstruction": {"parts": [{"text": instruction}]},
            "contents": [{"role": "user", "parts": [{"text": payload}]}],
            "generationConfig": {
                "temperature": self.temperature,
                "topP": self.top_p,
                "topK": self.top_k,
                "maxOutputTokens": self.max_output_tokens,
                "responseMimeType": "application/json"
            }
        })
    }
}

pub struct GeminiClient {
    http: reqwest::blocking::Client,
    settings: GeminiSettings,
    api_key: String,
}

impl GeminiClient {
    /// The API key is read from the environment variable named in the
    /// settings.
    pub fn new(settings: &GeminiSettings) -> PipelineResult<GeminiClient> {
        let api_key = env::var(&settings.api_key_env).context(MissingApiKeySnafu {
            var: settings.api_key_env.clone(),
        })?;
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("pollcheck/{}", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .context(HttpClientSnafu {})?;
        Ok(GeminiClient {
            http,
            settings: settings.clone(),
            api_key,
        })
    }
}

impl ClassificationService for GeminiClient {
    fn classify(&self, payload: &str, instruction: &str) -> Result<String, ServiceError> {
        let body = self.settings.request_body(payload, instruction);
        let response = self
            .http
            .post(self.settings.url())
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&body)
            .send()
            .map_err(|e| ServiceError::new(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(ServiceError::new(format!("HTTP {}: {}", status.as_u16(), text)));
        }
        let js: JSValue = response
            .json()
            .map_err(|e| ServiceError::new(format!("unreadable response: {}", e)))?;
        debug!("classify: usage: {:?}", js.get("usageMetadata"));
        response_text(&js)
    }
}

/// The text of the first candidate. A response without one (a blocked
/// prompt for instance) is a service error.
fn response_text(js: &JSValue) -> Result<String, ServiceError> {
    let parts = js["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| {
            ServiceError::new(format!(
                "no candidate in the response (finish reason {}, feedback {})",
                js["candidates"][0]["finishReason"], js["promptFeedback"]
            ))
        })?;
    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<&str>>()
        .concat();
    Ok(text)
}
