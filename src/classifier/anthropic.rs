//! Anthropic Messages API client for segment classification

use crate::classifier::{ClassifierError, ClassifierResult, Segment};
use crate::config::ClassifierConfig;
use crate::storage::UnclassifiedModel;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const API_VERSION: &str = "2023-06-01";
const SINGLE_MAX_TOKENS: u32 = 50;
const BATCH_MAX_TOKENS: u32 = 1024;

fn system_prompt() -> String {
    let segments = Segment::ALL
        .iter()
        .map(|s| format!("- {}", s.as_str()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a Brazilian vehicle classification expert. Your task is to classify car \
         models into segments based on their brand and model name.\n\n\
         Available segments (use EXACTLY these values):\n{}\n\n\
         Rules:\n\
         - Respond with ONLY the segment name, nothing else\n\
         - If uncertain, make your best guess based on the model name\n\
         - \"Perua\" is the Brazilian term for station wagon\n\
         - \"Caminhão Leve\" is for light commercial trucks/vans with cargo bed\n\
         - \"Van/Utilitário\" is for passenger vans and utility vehicles",
        segments
    )
}

/// Classifies models into segments with a language model
pub struct SegmentClassifier {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    batch_size: usize,
    batch_delay: Duration,
    system_prompt: String,
}

impl SegmentClassifier {
    /// Creates a classifier, reading the API key from the configured variable
    pub fn from_config(config: &ClassifierConfig) -> ClassifierResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ClassifierError::MissingApiKey(config.api_key_env.clone()))?;
        Self::with_api_key(config, api_key)
    }

    /// Creates a classifier with an explicit API key
    pub fn with_api_key(config: &ClassifierConfig, api_key: String) -> ClassifierResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            system_prompt: system_prompt(),
        })
    }

    /// Classifies a single model
    pub async fn classify(&self, brand: &str, model: &str) -> ClassifierResult<Segment> {
        let prompt = format!("Classify: Brand: {}, Model: {}", brand, model);
        let answer = self.complete(&prompt, SINGLE_MAX_TOKENS).await?;

        Segment::parse(&answer).ok_or(ClassifierError::Unparseable(answer))
    }

    /// Classifies models in numbered batches
    ///
    /// Returns one entry per input model, in input order. A failed request
    /// yields `None` for every model of that batch and an unparseable answer
    /// line yields `None` for its model only; neither affects other batches.
    pub async fn classify_batch(
        &self,
        models: &[UnclassifiedModel],
    ) -> Vec<(i64, Option<Segment>)> {
        let mut results = Vec::with_capacity(models.len());
        let batch_count = models.len().div_ceil(self.batch_size);

        for (index, batch) in models.chunks(self.batch_size).enumerate() {
            if index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            let numbered = batch
                .iter()
                .enumerate()
                .map(|(i, m)| {
                    format!("{}. Brand: {}, Model: {}", i + 1, m.brand_name, m.model_name)
                })
                .collect::<Vec<_>>()
                .join("\n");
            let prompt = format!(
                "Classify each vehicle. Respond with one segment per line, numbered to match:\n\n{}",
                numbered
            );

            match self.complete(&prompt, BATCH_MAX_TOKENS).await {
                Ok(answer) => {
                    let lines: Vec<&str> = answer.trim().lines().collect();
                    for (i, model) in batch.iter().enumerate() {
                        let line = lines.get(i).copied().unwrap_or("");
                        let segment = Segment::parse(line);
                        if segment.is_none() {
                            warn!(
                                "Could not parse segment for {} {}: {:?}",
                                model.brand_name, model.model_name, line
                            );
                        }
                        results.push((model.id, segment));
                    }
                }
                Err(e) => {
                    warn!("Batch {}/{} failed: {}", index + 1, batch_count, e);
                    results.extend(batch.iter().map(|m| (m.id, None)));
                }
            }
        }

        results
    }

    /// Sends one user message and returns the concatenated text answer
    async fn complete(&self, prompt: &str, max_tokens: u32) -> ClassifierResult<String> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(self.api_key.trim())
                .map_err(|_| ClassifierError::Unavailable("invalid API key".to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = MessagesRequest {
            model: &self.model,
            max_tokens,
            system: &self.system_prompt,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!("Classifier request ({} max tokens)", max_tokens);

        let response = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ClassifierError::Unavailable(format!(
                "HTTP {}: {}",
                status, text
            )));
        }

        let parsed: MessagesResponse = response.json().await?;
        let answer = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if answer.trim().is_empty() {
            return Err(ClassifierError::Unavailable(
                "response has no text content".to_string(),
            ));
        }

        Ok(answer)
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}
