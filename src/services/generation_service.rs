use std::{env, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    dto::{
        generation::{GeneratedQuestion, VarietalDescription},
        validation::validate_question_options,
    },
    error::ServiceError,
    state::SharedState,
};

const ENDPOINT_ENV: &str = "GENAI_ENDPOINT";
const API_KEY_ENV: &str = "GENAI_API_KEY";
const MODEL_ENV: &str = "GENAI_MODEL";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the OpenAI-compatible text generation backend.
///
/// The whole feature is optional: when the environment does not configure a
/// backend, generation endpoints answer with an error and everything else
/// works normally.
#[derive(Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl GenerationClient {
    /// Build the client from `GENAI_ENDPOINT`, `GENAI_API_KEY`, and the
    /// optional `GENAI_MODEL` environment variables.
    pub fn from_env() -> Option<Self> {
        let endpoint = env::var(ENDPOINT_ENV).ok()?;
        let Ok(api_key) = env::var(API_KEY_ENV) else {
            warn!(
                "{ENDPOINT_ENV} is set but {API_KEY_ENV} is missing; generation stays disabled"
            );
            return None;
        };
        let model = env::var(MODEL_ENV).unwrap_or_else(|_| DEFAULT_MODEL.to_owned());

        let http = match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
            Ok(http) => http,
            Err(err) => {
                warn!(error = %err, "failed to build HTTP client; generation stays disabled");
                return None;
            }
        };

        Some(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            api_key,
            model,
        })
    }

    /// Send a single-prompt completion request and return the raw text.
    async fn complete(&self, prompt: String) -> Result<String, ServiceError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_owned(),
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| ServiceError::GenerationFailed(err.to_string()))?
            .error_for_status()
            .map_err(|err| ServiceError::GenerationFailed(err.to_string()))?
            .json::<ChatResponse>()
            .await
            .map_err(|err| ServiceError::GenerationFailed(err.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ServiceError::GenerationFailed(
                "the generation backend returned an empty response".into(),
            ));
        }
        Ok(content)
    }

    /// Generate one multiple-choice question, avoiding the given prompts.
    pub async fn generate_question(
        &self,
        topic: Option<&str>,
        existing_prompts: &[String],
    ) -> Result<GeneratedQuestion, ServiceError> {
        let mut prompt = String::from(
            "Write one wine trivia question as a JSON object with the fields \
             \"question\", \"options\" (exactly 4 distinct strings), \
             \"correct_answer\" (one of the options), and \"explanation\". \
             Answer with the JSON object only, no surrounding text.",
        );
        if let Some(topic) = topic {
            prompt.push_str(&format!(" The question should be about: {topic}."));
        }
        if !existing_prompts.is_empty() {
            prompt.push_str(" Do not repeat any of these questions: ");
            prompt.push_str(&existing_prompts.join(" | "));
        }

        let raw = self.complete(prompt).await?;
        let json = extract_json_object(&raw).ok_or_else(|| {
            ServiceError::GenerationFailed("the generation backend returned no JSON object".into())
        })?;
        let question: GeneratedQuestion = serde_json::from_str(json)
            .map_err(|err| ServiceError::GenerationFailed(format!("unusable payload: {err}")))?;

        validate_question_options(&question.options, &question.correct_answer).map_err(|err| {
            ServiceError::GenerationFailed(format!(
                "generated question is invalid: {}",
                err.message.unwrap_or_else(|| "unknown reason".into())
            ))
        })?;
        Ok(question)
    }

    /// Generate a short free-text description of a grape varietal.
    pub async fn describe_varietal(&self, varietal: &str) -> Result<String, ServiceError> {
        let prompt = format!(
            "In two or three sentences, describe the wine grape varietal \
             \"{varietal}\" for a trivia audience: typical flavours, notable \
             regions, one memorable fact. Plain text only."
        );
        self.complete(prompt).await
    }
}

/// Describe a varietal through the configured generation backend.
pub async fn describe_varietal(
    state: &SharedState,
    varietal: &str,
) -> Result<VarietalDescription, ServiceError> {
    let client = require_client(state)?;
    let description = client.describe_varietal(varietal).await?;
    Ok(VarietalDescription {
        varietal: varietal.to_owned(),
        description,
    })
}

/// The configured generation client, or a failure when there is none.
pub fn require_client(state: &SharedState) -> Result<&GenerationClient, ServiceError> {
    state.generation().ok_or_else(|| {
        ServiceError::GenerationFailed("no generation backend is configured".into())
    })
}

/// Trim chatter and code fences down to the first JSON object in `raw`.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end >= start).then(|| &raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_from_fenced_output() {
        let raw = "```json\n{\"question\": \"Q?\"}\n```";
        assert_eq!(extract_json_object(raw), Some("{\"question\": \"Q?\"}"));
    }

    #[test]
    fn rejects_output_without_json() {
        assert_eq!(extract_json_object("no object here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }
}
