use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{Error, Result};
use crate::prompts::TaskPrompt;
use crate::steam::GameDetails;
use crate::util::env as env_util;

const GITHUB_MODELS_ENDPOINT: &str = "https://models.github.ai/inference/chat/completions";
const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Text enrichment boundary the orchestrator depends on.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn generate(&self, task: &TaskPrompt, user_content: &str) -> Result<String>;
}

/// GitHub Models chat-completions client.
///
/// Rate limiting (429) is retried exactly once, honoring the server's
/// `Retry-After` hint when present.
pub struct ModelsClient {
    http: Client,
    endpoint: String,
    token: String,
    default_retry_wait: Duration,
}

impl ModelsClient {
    /// Requires `GH_MODELS_TOKEN`; a missing token is a configuration error
    /// caught before the batch starts.
    pub fn from_env() -> Result<Self> {
        let token = env_util::env_opt("GH_MODELS_TOKEN").ok_or_else(|| {
            Error::Config("GH_MODELS_TOKEN is not set; required for GitHub Models".into())
        })?;
        Ok(Self::with_endpoint(
            token,
            GITHUB_MODELS_ENDPOINT,
            DEFAULT_RETRY_WAIT,
        ))
    }

    pub fn with_endpoint(
        token: impl Into<String>,
        endpoint: impl Into<String>,
        default_retry_wait: Duration,
    ) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            token: token.into(),
            default_retry_wait,
        }
    }

    async fn send(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        Ok(self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?)
    }
}

#[async_trait]
impl Enricher for ModelsClient {
    async fn generate(&self, task: &TaskPrompt, user_content: &str) -> Result<String> {
        let body = json!({
            "model": task.config.model,
            "temperature": task.config.temperature,
            "max_tokens": task.config.max_tokens,
            "messages": [
                { "role": "system", "content": task.prompt },
                { "role": "user", "content": user_content },
            ],
        });

        let mut resp = self.send(&body).await?;

        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            let wait = resp
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(self.default_retry_wait);
            warn!(wait_ms = wait.as_millis() as u64, "models API rate limited, retrying once");
            sleep(wait).await;
            resp = self.send(&body).await?;
        }

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: status.as_u16(),
                status_text: if detail.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown status")
                        .to_string()
                } else {
                    detail
                },
            });
        }

        let parsed: ChatCompletionResponse = resp.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty());

        content.ok_or_else(|| Error::Generation("models API returned no text".into()))
    }
}

/// User-content block fed to the intro and catch-phrase tasks.
pub fn format_game_details(game: &GameDetails) -> String {
    [
        format!("ゲーム名: {}", game.name),
        format!("ジャンル: {}", game.genres.join(", ")),
        format!("価格: {}", game.price),
        format!("開発者: {}", game.developer),
        format!(
            "Steam評価: {} ({}%)",
            game.review_score, game.review_percentage
        ),
        format!("説明: {}", game.description),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::ModelConfig;
    use httpmock::prelude::*;

    fn task() -> TaskPrompt {
        TaskPrompt {
            prompt: "You are a test prompt.".into(),
            config: ModelConfig {
                model: "openai/gpt-4o-mini".into(),
                temperature: 0.8,
                max_tokens: 100,
                prompt_file: "test.md".into(),
            },
        }
    }

    fn client(server: &MockServer) -> ModelsClient {
        ModelsClient::with_endpoint("test-token", server.url("/chat"), Duration::ZERO)
    }

    #[tokio::test]
    async fn returns_generated_content() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/chat")
                .header("authorization", "Bearer test-token")
                .json_body_partial(r#"{ "model": "openai/gpt-4o-mini" }"#);
            then.status(200).json_body(serde_json::json!({
                "choices": [ { "message": { "content": "ほんまにええゲームや" } } ]
            }));
        });

        let out = client(&server).generate(&task(), "review text").await.unwrap();
        assert_eq!(out, "ほんまにええゲームや");
        mock.assert();
    }

    #[tokio::test]
    async fn empty_content_is_generation_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat");
            then.status(200)
                .json_body(serde_json::json!({ "choices": [] }));
        });

        match client(&server).generate(&task(), "x").await.unwrap_err() {
            Error::Generation(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_retries_exactly_once() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/chat");
            then.status(429).header("Retry-After", "0");
        });

        let err = client(&server).generate(&task(), "x").await.unwrap_err();
        mock.assert_hits(2);
        match err {
            Error::Upstream { status, .. } => assert_eq!(status, 429),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_success_is_upstream_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat");
            then.status(401).body("bad token");
        });

        match client(&server).generate(&task(), "x").await.unwrap_err() {
            Error::Upstream {
                status,
                status_text,
            } => {
                assert_eq!(status, 401);
                assert_eq!(status_text, "bad token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn game_details_block_contains_key_fields() {
        let details = GameDetails {
            app_id: 1,
            name: "Pixel Cave".into(),
            description: "Dig deep.".into(),
            detailed_description: String::new(),
            genres: vec!["Indie".into(), "Roguelike".into()],
            tags: vec![],
            price: "¥1,200".into(),
            release_date: String::new(),
            developer: "Tiny Shovel".into(),
            header_image: String::new(),
            review_score: "非常に好評".into(),
            review_percentage: 84,
        };
        let block = format_game_details(&details);
        assert!(block.contains("ゲーム名: Pixel Cave"));
        assert!(block.contains("ジャンル: Indie, Roguelike"));
        assert!(block.contains("Steam評価: 非常に好評 (84%)"));
    }
}
