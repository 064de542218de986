// src/arbitration/provider.rs - HTTP classification providers
//
// Gemini (with API-key rotation) first, OpenRouter second. The chain is
// one adapter behind the ArbitrationOracle trait; the matching logic never
// sees which provider answered.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::arbitration::{ArbitrationOracle, ArbitrationQuery, ArbitrationVerdict};
use crate::config::MatchingConfig;

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const GEMINI_MODEL: &str = "gemini-2.0-flash";
const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const OPENROUTER_MODEL: &str = "google/gemini-2.0-flash-001";

const SYSTEM_PROMPT: &str = "You are a fragrance product matching expert. For every numbered \
merchant item you are given a list of competitor candidates. Pick the candidate that is the \
same product (same brand, fragrance, concentration and size), or 0 when none of them is. \
Answer with a JSON array only, one object per item: [{\"item\": 1, \"choice\": 2}, ...]. \
choice is the 1-based candidate number, 0 means no match.";

/// Line protocol shared by all providers.
#[derive(Debug, Deserialize)]
struct Selection {
    item: usize,
    choice: Option<i64>,
}

fn build_prompt(batch: &[ArbitrationQuery]) -> String {
    let mut prompt = String::new();
    for (i, query) in batch.iter().enumerate() {
        prompt.push_str(&format!("Item {}: {} (price {:.2})\n", i + 1, query.product, query.price));
        for (j, entry) in query.shortlist.iter().enumerate() {
            prompt.push_str(&format!(
                "  Candidate {}: {} (price {:.2}, similarity {:.1})\n",
                j + 1,
                entry.name,
                entry.price,
                entry.score
            ));
        }
    }
    prompt.push_str("\nReturn the JSON array now.");
    prompt
}

/// Pull the JSON array out of a free-text model reply and map it onto one
/// verdict per query. Items the model skipped default to the top
/// candidate; indices are not range-checked here (the orchestrator guards).
fn parse_selections(text: &str, batch_len: usize) -> Result<Vec<ArbitrationVerdict>> {
    let start = text.find('[').ok_or_else(|| anyhow!("no JSON array in oracle reply"))?;
    let end = text.rfind(']').ok_or_else(|| anyhow!("unterminated JSON array in oracle reply"))?;
    if end < start {
        return Err(anyhow!("malformed JSON array in oracle reply"));
    }
    let selections: Vec<Selection> =
        serde_json::from_str(&text[start..=end]).context("oracle reply is not a selection array")?;

    let mut verdicts = vec![ArbitrationVerdict { selected: Some(0) }; batch_len];
    for selection in selections {
        if selection.item == 0 || selection.item > batch_len {
            continue;
        }
        let verdict = match selection.choice {
            None | Some(0) => ArbitrationVerdict { selected: None },
            Some(c) if c < 0 => ArbitrationVerdict { selected: None },
            Some(c) => ArbitrationVerdict {
                selected: Some((c - 1) as usize),
            },
        };
        verdicts[selection.item - 1] = verdict;
    }
    Ok(verdicts)
}

/// Gemini with rotation over every configured API key; quota errors move
/// on to the next key.
pub struct GeminiProvider {
    client: Client,
    api_keys: Vec<String>,
}

impl GeminiProvider {
    pub fn new(api_keys: Vec<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build Gemini HTTP client")?;
        Ok(Self { client, api_keys })
    }
}

#[async_trait]
impl ArbitrationOracle for GeminiProvider {
    async fn arbitrate(&self, batch: &[ArbitrationQuery]) -> Result<Vec<ArbitrationVerdict>> {
        let prompt = format!("{}\n\n{}", SYSTEM_PROMPT, build_prompt(batch));
        let payload = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {"temperature": 0.3, "maxOutputTokens": 2048, "topP": 0.8}
        });

        for key in &self.api_keys {
            let url = format!("{}/{}:generateContent?key={}", GEMINI_BASE, GEMINI_MODEL, key);
            let response = match self.client.post(&url).json(&payload).send().await {
                Ok(r) => r,
                Err(e) => {
                    debug!("Gemini request failed: {}", e);
                    continue;
                }
            };
            if response.status().as_u16() == 429 {
                debug!("Gemini key exhausted, rotating to next key");
                continue;
            }
            if !response.status().is_success() {
                debug!("Gemini returned status {}", response.status());
                continue;
            }
            let body: serde_json::Value = match response.json().await {
                Ok(v) => v,
                Err(e) => {
                    debug!("Gemini reply was not JSON: {}", e);
                    continue;
                }
            };
            let text = body["candidates"][0]["content"]["parts"][0]["text"]
                .as_str()
                .unwrap_or_default();
            if text.is_empty() {
                continue;
            }
            match parse_selections(text, batch.len()) {
                Ok(verdicts) => return Ok(verdicts),
                Err(e) => {
                    warn!("Gemini reply unparseable: {}", e);
                    continue;
                }
            }
        }
        Err(anyhow!("all Gemini keys failed"))
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: String, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build OpenRouter HTTP client")?;
        Ok(Self { client, api_key })
    }
}

#[async_trait]
impl ArbitrationOracle for OpenRouterProvider {
    async fn arbitrate(&self, batch: &[ArbitrationQuery]) -> Result<Vec<ArbitrationVerdict>> {
        let payload = json!({
            "model": OPENROUTER_MODEL,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(batch)}
            ],
            "temperature": 0.3,
            "max_tokens": 2048
        });

        let response = self
            .client
            .post(OPENROUTER_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("OpenRouter request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!("OpenRouter returned status {}", response.status()));
        }
        let body: serde_json::Value = response.json().await.context("OpenRouter reply was not JSON")?;
        let text = body["choices"][0]["message"]["content"].as_str().unwrap_or_default();
        parse_selections(text, batch.len())
    }

    fn name(&self) -> &'static str {
        "openrouter"
    }
}

/// Ordered fallback over the configured providers; the first one that
/// produces a parseable reply wins.
pub struct ProviderChainOracle {
    providers: Vec<Box<dyn ArbitrationOracle>>,
}

impl ProviderChainOracle {
    pub fn new(providers: Vec<Box<dyn ArbitrationOracle>>) -> Self {
        Self { providers }
    }

    /// Build the chain from GEMINI_KEY_1..3 and OPENROUTER_KEY. Returns
    /// None when no provider is configured at all; the engine then runs on
    /// its failure policy alone.
    pub fn from_env(config: &MatchingConfig) -> Result<Option<Self>> {
        let gemini_keys: Vec<String> = ["GEMINI_KEY_1", "GEMINI_KEY_2", "GEMINI_KEY_3"]
            .iter()
            .filter_map(|k| std::env::var(k).ok())
            .filter(|k| !k.trim().is_empty())
            .collect();

        let mut providers: Vec<Box<dyn ArbitrationOracle>> = Vec::new();
        if !gemini_keys.is_empty() {
            providers.push(Box::new(GeminiProvider::new(gemini_keys, config.oracle_timeout_secs)?));
        }
        if let Ok(key) = std::env::var("OPENROUTER_KEY") {
            if !key.trim().is_empty() {
                providers.push(Box::new(OpenRouterProvider::new(key, config.oracle_timeout_secs)?));
            }
        }

        if providers.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Self::new(providers)))
        }
    }
}

#[async_trait]
impl ArbitrationOracle for ProviderChainOracle {
    async fn arbitrate(&self, batch: &[ArbitrationQuery]) -> Result<Vec<ArbitrationVerdict>> {
        let mut last_error = anyhow!("no arbitration providers configured");
        for provider in &self.providers {
            match provider.arbitrate(batch).await {
                Ok(verdicts) => {
                    debug!("Arbitration answered by provider '{}'", provider.name());
                    return Ok(verdicts);
                }
                Err(e) => {
                    warn!("Provider '{}' failed: {}", provider.name(), e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    fn name(&self) -> &'static str {
        "provider-chain"
    }
}
