//! Claude API client for forecasts and market commentary.
//!
//! Every call is rate limited and its token cost is logged.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::ai::prompts;
use crate::ai::{ForecastProvider, NarrativeProvider};
use crate::config::AiConfig;
use crate::market::models::{DailyRateSummary, PredictionPoint, Rate};

const API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Claude API pricing (per million tokens, claude-sonnet-4-20250514).
const INPUT_PRICE_PER_MILLION: Decimal = dec!(3.00);
const OUTPUT_PRICE_PER_MILLION: Decimal = dec!(15.00);
const MILLION: Decimal = dec!(1_000_000);

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct ClaudeClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
    limiter: Limiter,
}

impl ClaudeClient {
    pub fn new(api_key: String, config: &AiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .context("Failed to build HTTP client")?;

        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            base_url: API_URL.to_string(),
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }

    /// Point the client at a different endpoint (used against mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Send a message to Claude and return the concatenated text blocks.
    #[instrument(skip(self, system_prompt, user_prompt), fields(model = %self.model))]
    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<ClaudeResponse> {
        if self.limiter.check().is_err() {
            bail!("Claude rate limit reached, skipping call");
        }

        let request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: Some(system_prompt.to_string()),
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: user_prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Claude API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            bail!("Claude API error ({}): {}", status, error_body);
        }

        let api_response: ClaudeApiResponse = response
            .json()
            .await
            .context("Failed to parse Claude API response")?;

        let text = api_response
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<&str>>()
            .join("");

        let input_tokens = api_response.usage.input_tokens;
        let output_tokens = api_response.usage.output_tokens;
        let cost = calculate_cost(input_tokens, output_tokens);

        info!(input_tokens, output_tokens, cost = %cost, "Claude API call completed");

        Ok(ClaudeResponse {
            text,
            input_tokens,
            output_tokens,
            cost,
        })
    }
}

#[async_trait]
impl ForecastProvider for ClaudeClient {
    async fn generate_forecast(&self, species_name: &str, history: &[Rate]) -> Result<Vec<PredictionPoint>> {
        let response = self
            .complete(
                &prompts::forecast_system_prompt(),
                &prompts::forecast_user_prompt(species_name, history),
            )
            .await?;
        prompts::parse_forecast_response(&response.text)
    }

    fn name(&self) -> &str {
        "claude"
    }
}

#[async_trait]
impl NarrativeProvider for ClaudeClient {
    async fn generate_narrative(&self, harbour_name: &str, summaries: &[DailyRateSummary]) -> Result<String> {
        let response = self
            .complete(
                &prompts::narrative_system_prompt(),
                &prompts::narrative_user_prompt(harbour_name, summaries),
            )
            .await?;

        let text = response.text.trim();
        if text.is_empty() {
            bail!("Claude returned an empty narrative");
        }
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "claude"
    }
}

/// Calculate the dollar cost of a Claude API call.
pub fn calculate_cost(input_tokens: i64, output_tokens: i64) -> Decimal {
    let input_cost = Decimal::from(input_tokens) * INPUT_PRICE_PER_MILLION / MILLION;
    let output_cost = Decimal::from(output_tokens) * OUTPUT_PRICE_PER_MILLION / MILLION;
    input_cost + output_cost
}

// --- Request/Response Types ---

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeApiResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: i64,
    output_tokens: i64,
}

pub struct ClaudeResponse {
    pub text: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> AiConfig {
        AiConfig {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 512,
            timeout_seconds: 5,
            requests_per_minute: 60,
        }
    }

    fn api_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "content": [{"type": "text", "text": text}],
            "usage": {"input_tokens": 1000, "output_tokens": 500}
        })
    }

    #[test]
    fn test_cost_calculation() {
        // input: 1000 * 3.00 / 1_000_000 = 0.003, output: 500 * 15.00 / 1_000_000 = 0.0075
        assert_eq!(calculate_cost(1000, 500), dec!(0.0105));
        assert_eq!(calculate_cost(0, 0), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_complete_joins_text_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [
                    {"type": "text", "text": "Calm "},
                    {"type": "thinking", "thinking": "..."},
                    {"type": "text", "text": "seas."}
                ],
                "usage": {"input_tokens": 10, "output_tokens": 2}
            })))
            .mount(&server)
            .await;

        let client = ClaudeClient::new("test-key".to_string(), &test_config())
            .unwrap()
            .with_base_url(server.uri());
        let response = client.complete("system", "user").await.unwrap();
        assert_eq!(response.text, "Calm seas.");
        assert_eq!(response.input_tokens, 10);
    }

    #[tokio::test]
    async fn test_forecast_provider_parses_array() {
        let server = MockServer::start().await;
        let body = api_body(r#"[{"date": "2025-03-02", "price": 201}]"#);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = ClaudeClient::new("k".to_string(), &test_config())
            .unwrap()
            .with_base_url(server.uri());
        let points = client.generate_forecast("Sardine", &[]).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].price, dec!(201));
    }

    #[tokio::test]
    async fn test_api_error_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = ClaudeClient::new("k".to_string(), &test_config())
            .unwrap()
            .with_base_url(server.uri());
        let err = client.generate_narrative("Kochi", &[]).await.unwrap_err();
        assert!(err.to_string().contains("529"));
    }
}
