//! Crop Chatbot
//!
//! Routing for a farmer's question:
//! 1. Empty prompt → usage hint; off-topic with no crop → refusal
//! 2. NPK question naming a crop → dataset NPK guidance
//! 3. Retrieval notes, then Gemini, then OpenAI
//! 4. Rule-based advisory, prefixed with why the models were skipped
//!
//! Provider failures are collected per call, never shared between requests.

pub mod keywords;
pub mod context;
pub mod rules;
pub mod rag;
pub mod llm;

pub use context::{ChatContext, ChatTurn};
pub use llm::{ChatProviders, ProviderErrors};

use tracing::debug;

use keywords::{contains_agri_intent, detect_topics, is_non_agri_query, is_npk_query, Topic};

pub const NON_AGRI_REPLY: &str =
    "I am your Agricultural Advisory Assistant. Please ask crop or farming related questions.";

pub const EMPTY_QUERY_HINT: &str =
    "Please ask a crop-related question (for example: 'fertilizer plan for cotton').";

/// Retrieval then Gemini then OpenAI; the first non-empty reply wins
async fn ask_models(
    query: &str,
    ctx: &ChatContext,
    providers: &ChatProviders,
    errors: &mut ProviderErrors,
) -> Option<String> {
    let docs = rag::retrieve_context(query, ctx, providers).await;
    debug!(retrieved = docs.len(), "Chat retrieval");

    if let Some(reply) = providers.gemini_reply(query, ctx, &docs, errors).await {
        return Some(reply);
    }
    providers.openai_reply(query, ctx, &docs, errors).await
}

pub async fn generate_crop_response(query: &str, ctx: &ChatContext, providers: &ChatProviders) -> String {
    let query = query.trim();
    if query.is_empty() {
        return EMPTY_QUERY_HINT.to_string();
    }

    let mentioned = ctx.extract_crop(query);
    if is_non_agri_query(query) && !contains_agri_intent(query) && mentioned.is_none() {
        return NON_AGRI_REPLY.to_string();
    }

    if is_npk_query(query) {
        if let Some((key, crop)) = mentioned {
            return rules::build_npk_response(key, crop);
        }
    }

    // Nutrition/usage questions without a crop get their own model pass;
    // failures there do not count against the main attempt
    let normalized = crate::utils::normalize_text(query);
    let utilization = detect_topics(query).contains(&Topic::Utilization)
        || normalized.contains("nutrition")
        || normalized.contains("health");
    if utilization && mentioned.is_none() {
        let mut discarded = ProviderErrors::default();
        if let Some(reply) = ask_models(query, ctx, providers, &mut discarded).await {
            return reply;
        }
    }

    let mut errors = ProviderErrors::default();
    if let Some(reply) = ask_models(query, ctx, providers, &mut errors).await {
        return reply;
    }

    let fallback = rules::build_rule_based_response(query, ctx);
    match errors.summary() {
        Some(summary) => format!("AI service unavailable ({}). Showing dataset-based advisory.\n{}", summary, fallback),
        None => format!(
            "AI service unavailable (no response from providers). Showing dataset-based advisory.\n{}",
            fallback
        ),
    }
}
