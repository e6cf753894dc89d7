//! Deliberation providers: a language model judging a reported data point
//! against retrieved normative evidence.
//!
//! - **[`DisabledDeliberator`]** returns an `ERROR` verdict without any call;
//!   used when no provider is configured.
//! - **[`OpenAiDeliberator`]** calls the chat-completions API in JSON mode.
//!
//! The API key is read once by [`create_deliberator`] and owned by the
//! provider instance; nothing here is process-global. Retrieval and sealing
//! never depend on this module.
//!
//! # Retry Strategy
//!
//! HTTP 429 and 5xx responses and network errors are retried with
//! exponential backoff (1s, 2s, 4s, ...); other 4xx responses fail at once.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use gices_raga_core::models::Evidence;

use crate::config::DeliberationConfig;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Characters of each evidence fragment included in the prompt.
const EVIDENCE_EXCERPT_CHARS: usize = 600;

/// Structured verdict returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deliberation {
    pub narrative: String,
    /// `COMPLIANT`, `HIGH RISK`, `NON-COMPLIANT`, or a provider status such as `ERROR`.
    pub compliance_check: String,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub key_risk: Option<String>,
}

#[async_trait]
pub trait Deliberator: Send + Sync {
    fn name(&self) -> &str;

    async fn deliberate(
        &self,
        data_point: &serde_json::Value,
        evidence: &[Evidence<'_>],
    ) -> Result<Deliberation>;
}

pub struct DisabledDeliberator;

#[async_trait]
impl Deliberator for DisabledDeliberator {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn deliberate(
        &self,
        _data_point: &serde_json::Value,
        _evidence: &[Evidence<'_>],
    ) -> Result<Deliberation> {
        Ok(Deliberation {
            narrative: "No deliberation provider configured; set [deliberation] provider \
                        and OPENAI_API_KEY."
                .to_string(),
            compliance_check: "ERROR".to_string(),
            citations: Vec::new(),
            key_risk: None,
        })
    }
}

pub struct OpenAiDeliberator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f64,
    max_retries: u32,
    mode: String,
}

impl OpenAiDeliberator {
    pub fn new(config: &DeliberationConfig, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!("OpenAI API key is empty");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
            mode: config.mode.clone(),
        })
    }
}

#[async_trait]
impl Deliberator for OpenAiDeliberator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn deliberate(
        &self,
        data_point: &serde_json::Value,
        evidence: &[Evidence<'_>],
    ) -> Result<Deliberation> {
        let prompt = build_prompt(&self.mode, data_point, evidence);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "system", "content": prompt}],
            "response_format": {"type": "json_object"},
            "temperature": self.temperature,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(OPENAI_CHAT_URL)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(%status, attempt, "deliberation request failed; retrying");
                        last_err =
                            Some(anyhow::anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "deliberation request failed; retrying");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Deliberation failed after retries")))
    }
}

/// Build the provider selected by `config`.
pub fn create_deliberator(config: &DeliberationConfig) -> Result<Box<dyn Deliberator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledDeliberator)),
        "openai" => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
            Ok(Box::new(OpenAiDeliberator::new(config, api_key)?))
        }
        other => bail!("Unknown deliberation provider: {}", other),
    }
}

/// Prompt asking for a JSON verdict grounded only in `evidence`.
pub fn build_prompt(
    mode: &str,
    data_point: &serde_json::Value,
    evidence: &[Evidence<'_>],
) -> String {
    let evidence_block = evidence
        .iter()
        .map(|e| {
            let excerpt: String = e.content.chars().take(EVIDENCE_EXCERPT_CHARS).collect();
            format!("- [Source: {}] {}...", e.source, excerpt)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"Act as an expert researcher in {mode} (CSRD/ESRS).

GOAL: Validate the ethical and legal integrity of the following reported data point.
DATA: {data}

NORMATIVE EVIDENCE (base your analysis EXCLUSIVELY on this):
{evidence_block}

INSTRUCTIONS:
1. Assess whether the project meets "High Integrity" or "Restoration" criteria.
2. Identify greenwashing risks.
3. Cite the provided documents explicitly.

Return a valid JSON object with this shape:
{{
    "narrative": "Critical analysis in 3-4 sentences.",
    "compliance_check": "COMPLIANT / HIGH RISK / NON-COMPLIANT",
    "citations": ["Names of the documents used"],
    "key_risk": "The main risk detected"
}}"#,
        mode = mode,
        data = data_point,
        evidence_block = evidence_block,
    )
}

/// Extract the JSON verdict from `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<Deliberation> {
    let content = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))?;
    let verdict: Deliberation = serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("Deliberation response is not the expected JSON: {}", e))?;
    Ok(verdict)
}
