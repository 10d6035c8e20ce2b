//! Definition lookups against an OpenAI-compatible chat completions endpoint.
//!
//! Every term is requested independently and concurrently. A term that fails
//! for any reason resolves to the placeholder instead of failing the book.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::DefinitionsSettings;
use crate::domain::DEFINITION_PLACEHOLDER;

use super::DefinitionProvider;

/// HTTP client for the definition service
#[derive(Clone)]
pub struct DefinitionClient {
    client: reqwest::Client,
    endpoint: String,
    /// No model means the capability is switched off
    model: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
    max_concurrent: usize,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

impl DefinitionClient {
    /// Create a client; `model: None` yields placeholders for every term
    pub fn new(endpoint: impl Into<String>, model: Option<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model,
            api_key,
            timeout: Duration::from_secs(30),
            max_concurrent: 8,
        }
    }

    /// Build from resolved settings, reading the API key from the environment
    pub fn from_settings(settings: &DefinitionsSettings) -> Self {
        let api_key = std::env::var(&settings.api_key_env).ok();
        Self::new(settings.endpoint.clone(), settings.model.clone(), api_key)
            .with_timeout(Duration::from_secs(settings.timeout_seconds))
            .with_max_concurrent(settings.max_concurrent)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Fetch one definition
    async fn define(&self, model: &str, term: &str, language: &str) -> Result<String> {
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: instructions(language),
                },
                ChatMessage {
                    role: "user",
                    content: term,
                },
            ],
            temperature: 0.0,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = tokio::time::timeout(self.timeout, builder.send())
            .await
            .with_context(|| format!("Definition request for '{}' timed out", term))?
            .with_context(|| format!("Failed to request definition for '{}'", term))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Definition service error ({}): {}", status, text.trim());
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse definition response")?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        let definition = fold_definition(&content);
        if definition.is_empty() {
            anyhow::bail!("Definition service returned an empty answer for '{}'", term);
        }
        Ok(definition)
    }
}

fn instructions(language: &str) -> &'static str {
    match language {
        "fr" => {
            "Donne une courte définition de dictionnaire du mot ou de l'expression \
             en français. Réponds uniquement par la définition, sur une seule ligne."
        }
        _ => {
            "Give a short dictionary definition of the English word or expression. \
             Answer with the definition only, on a single line."
        }
    }
}

/// Definitions are stored on one line, so fold any line breaks
fn fold_definition(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl DefinitionProvider for DefinitionClient {
    fn name(&self) -> &str {
        "chat-completions"
    }

    fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    async fn get_definitions(&self, terms: &[String], language: &str) -> HashMap<String, String> {
        let Some(model) = self.model.clone() else {
            return terms
                .iter()
                .map(|t| (t.clone(), DEFINITION_PLACEHOLDER.to_string()))
                .collect();
        };

        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for term in terms {
            let this = self.clone();
            let model = model.clone();
            let term = term.clone();
            let language = language.to_string();
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let result = this.define(&model, &term, &language).await;
                (term, result)
            });
        }

        let mut definitions = HashMap::with_capacity(terms.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((term, Ok(definition))) => {
                    debug!(%term, "Definition fetched");
                    definitions.insert(term, definition);
                }
                Ok((term, Err(e))) => {
                    warn!(%term, error = %e, "Definition unavailable, using placeholder");
                    definitions.insert(term, DEFINITION_PLACEHOLDER.to_string());
                }
                Err(e) => {
                    warn!(error = %e, "Definition task failed");
                }
            }
        }

        // Terms lost to a panicked task still resolve
        for term in terms {
            definitions
                .entry(term.clone())
                .or_insert_with(|| DEFINITION_PLACEHOLDER.to_string());
        }

        definitions
    }
}
