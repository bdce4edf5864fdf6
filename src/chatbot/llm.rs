//! Language model providers
//!
//! Gemini (`generateContent`) and OpenAI (chat completions, embeddings) over
//! reqwest. Failures never surface as errors to the caller; they are
//! collected in a [`ProviderErrors`] so the fallback reply can say why the
//! models were skipped.

use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::context::ChatContext;
use super::rag::RetrievedDoc;
use crate::config::Settings;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const TEMPERATURE: f64 = 0.2;
const MAX_DOC_CHARS: usize = 800;
const MAX_ERROR_SNIPPET: usize = 200;

pub const SYSTEM_PROMPT: &str = concat!(
    "You are an expert agricultural advisor focused on crops, soil science, fertilizers, irrigation, ",
    "pest and disease management, seasonal cropping systems, organic farming, and sustainable practices. ",
    "You ONLY answer agriculture-related questions. If the question is unrelated to agriculture, refuse ",
    "with exactly: ",
    "'I am your Agricultural Advisory Assistant. Please ask crop or farming related questions.' ",
    "Tone: calm, practical, field-ready, and respectful. ",
    "Avoid rigid templates. Vary structure naturally based on the question; answer directly. ",
    "Use bullets only when it improves clarity. ",
    "Avoid overclaiming or inventing real-time facts. If local conditions matter (weather, market, ",
    "regulations), ask for location and advise checking local extension advisories. ",
    "When suggesting pesticides or nutrient doses, include safety precautions (PPE, label adherence, ",
    "waiting period) and prefer integrated pest management."
);

/// Provider failures for one chat turn, deduplicated, joined with " | "
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderErrors {
    messages: Vec<String>,
}

impl ProviderErrors {
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        if message.is_empty() || self.messages.iter().any(|m| m.contains(&message)) {
            return;
        }
        warn!(error = %message, "Chat provider failed");
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn summary(&self) -> Option<String> {
        (!self.messages.is_empty()).then(|| self.messages.join(" | "))
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Crop match, first five soil rows and the last six turns as compact JSON
pub fn compact_context(query: &str, ctx: &ChatContext) -> Value {
    let crop = match ctx.extract_crop(query) {
        Some((_, details)) => serde_json::to_value(details).unwrap_or(Value::Null),
        None => json!("No exact crop matched. Ask user to mention crop name."),
    };
    let turns = ctx.conversation();
    let recent = &turns[turns.len().saturating_sub(6)..];

    json!({
        "crop": crop,
        "soil_profiles": ctx.soil_rows().iter().take(5).collect::<Vec<_>>(),
        "conversation": recent,
    })
}

pub fn build_user_prompt(query: &str, ctx: &ChatContext, docs: &[RetrievedDoc]) -> String {
    let notes = docs
        .iter()
        .take(4)
        .map(|doc| format!("[{}]\n{}", doc.title, truncate_chars(&doc.text, MAX_DOC_CHARS)))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "User query: {}\n\n\
         Local dataset context (JSON): {}\n\n\
         Retrieved notes (if relevant):\n{}\n\n\
         Answer in plain text. Keep the response focused on the user's question. \
         Do not follow a fixed template; vary the structure naturally. \
         Include safety cautions only when recommending pesticides or specific doses. \
         If retrieved notes are relevant, use them; otherwise rely on general agronomy knowledge.",
        query,
        compact_context(query, ctx),
        notes
    )
}

fn slim_user_prompt(query: &str) -> String {
    format!(
        "User query: {}\n\n\
         Answer in plain text. Use short sections and bullet points when helpful. \
         Finish with a short Caution line and a Next step line.",
        query
    )
}

/// Credentials, model names and endpoints for both providers
#[derive(Debug, Clone)]
pub struct ChatProviders {
    client: reqwest::Client,
    gemini_api_key: Option<String>,
    gemini_model: String,
    gemini_base_url: String,
    openai_api_key: Option<String>,
    openai_model: String,
    pub(crate) embedding_model: String,
    openai_base_url: String,
    pub(crate) rag_rebuild: bool,
}

impl ChatProviders {
    pub fn from_settings(settings: &Settings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        let model = settings.gemini_model.trim();
        let model = model.strip_prefix("models/").unwrap_or(model);

        Self {
            client,
            gemini_api_key: settings.gemini_api_key.clone(),
            gemini_model: if model.is_empty() { "gemini-1.5-flash".to_string() } else { model.to_string() },
            gemini_base_url: GEMINI_BASE_URL.to_string(),
            openai_api_key: settings.openai_api_key.clone(),
            openai_model: settings.openai_model.clone(),
            embedding_model: settings.openai_embedding_model.clone(),
            openai_base_url: OPENAI_BASE_URL.to_string(),
            rag_rebuild: settings.rag_rebuild,
        }
    }

    /// No keys: every reply comes from the rule-based fallback
    pub fn disabled() -> Self {
        Self::from_settings(&Settings {
            gemini_api_key: None,
            openai_api_key: None,
            ..Settings::default()
        })
    }

    pub fn with_endpoints(mut self, gemini_base_url: &str, openai_base_url: &str) -> Self {
        self.gemini_base_url = gemini_base_url.trim_end_matches('/').to_string();
        self.openai_base_url = openai_base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn openai_configured(&self) -> bool {
        self.openai_api_key.is_some()
    }

    pub fn gemini_configured(&self) -> bool {
        self.gemini_api_key.is_some()
    }

    // ========================================================================
    // Gemini
    // ========================================================================

    /// Full prompt first, then a slimmer retry if that yielded nothing
    pub async fn gemini_reply(
        &self,
        query: &str,
        ctx: &ChatContext,
        docs: &[RetrievedDoc],
        errors: &mut ProviderErrors,
    ) -> Option<String> {
        let Some(api_key) = self.gemini_api_key.as_deref() else {
            errors.push("GEMINI_API_KEY is missing.");
            return None;
        };

        let prompt = build_user_prompt(query, ctx, docs);
        match self.call_gemini(api_key, &prompt, errors).await {
            Ok(Some(reply)) => return Some(reply),
            Ok(None) => debug!("Gemini gave no answer, retrying with slim prompt"),
            Err(e) => {
                errors.push(format!("Gemini request failed: {}", e));
                return None;
            }
        }

        match self.call_gemini(api_key, &slim_user_prompt(query), errors).await {
            Ok(reply) => reply,
            Err(e) => {
                errors.push(format!("Gemini request failed: {}", e));
                None
            }
        }
    }

    async fn call_gemini(
        &self,
        api_key: &str,
        prompt: &str,
        errors: &mut ProviderErrors,
    ) -> reqwest::Result<Option<String>> {
        let url = format!("{}/models/{}:generateContent", self.gemini_base_url, self.gemini_model);
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "systemInstruction": {"parts": [{"text": SYSTEM_PROMPT}]},
            "generationConfig": {"temperature": TEMPERATURE},
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            errors.push(format!(
                "Gemini error {}: {}",
                status.as_u16(),
                truncate_chars(text.trim(), MAX_ERROR_SNIPPET)
            ));
            return Ok(None);
        }

        let payload: Value = response.json().await?;
        let Some(parts) = payload["candidates"]
            .as_array()
            .and_then(|c| c.first())
            .map(|c| &c["content"]["parts"])
        else {
            errors.push("Gemini returned no candidates.");
            return Ok(None);
        };

        let text: String = parts
            .as_array()
            .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
            .unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            errors.push("Gemini returned empty text.");
            return Ok(None);
        }
        Ok(Some(text.to_string()))
    }

    // ========================================================================
    // OpenAI
    // ========================================================================

    pub async fn openai_reply(
        &self,
        query: &str,
        ctx: &ChatContext,
        docs: &[RetrievedDoc],
        errors: &mut ProviderErrors,
    ) -> Option<String> {
        let Some(api_key) = self.openai_api_key.as_deref() else {
            errors.push("OpenAI API key missing.");
            return None;
        };

        let body = json!({
            "model": self.openai_model,
            "temperature": TEMPERATURE,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_user_prompt(query, ctx, docs)},
            ],
        });

        let result: reqwest::Result<Value> = async {
            self.client
                .post(format!("{}/chat/completions", self.openai_base_url))
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        }
        .await;

        match result {
            Ok(payload) => {
                let text = payload["choices"][0]["message"]["content"].as_str().map(str::trim).unwrap_or("");
                if text.is_empty() {
                    errors.push("OpenAI returned an empty response.");
                    None
                } else {
                    Some(text.to_string())
                }
            }
            Err(e) => {
                errors.push(format!("OpenAI request failed: {}", e));
                None
            }
        }
    }

    /// Embedding vectors in input order; `None` when unavailable
    pub async fn embed_texts(&self, texts: &[String]) -> Option<Vec<Vec<f32>>> {
        let api_key = self.openai_api_key.as_deref()?;
        let body = json!({
            "model": self.embedding_model,
            "input": texts,
            "encoding_format": "float",
        });

        let result: reqwest::Result<Value> = async {
            self.client
                .post(format!("{}/embeddings", self.openai_base_url))
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        }
        .await;

        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Embedding request failed");
                return None;
            }
        };

        let vectors: Vec<Vec<f32>> = payload["data"]
            .as_array()?
            .iter()
            .map(|item| {
                item["embedding"]
                    .as_array()
                    .map(|values| values.iter().filter_map(Value::as_f64).map(|v| v as f32).collect())
                    .unwrap_or_default()
            })
            .collect();
        (vectors.len() == texts.len()).then_some(vectors)
    }
}
