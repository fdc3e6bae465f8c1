//! "Explain this code" passthrough to an OpenAI-compatible chat-completions API.

use anyhow::Context;
use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{config::AiConfig, AppError, AppResult, AppState};

const MAX_TOKENS: u32 = 300;
const TEMPERATURE: f32 = 0.7;
const NO_RESPONSE: &str = "No response";

#[derive(Clone)]
pub struct AiClient {
    http: reqwest::Client,
    config: AiConfig,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [PromptMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct PromptMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl AiClient {
    pub fn new(config: AiConfig) -> AiClient {
        AiClient {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Sends the prompt as a single user message and returns the first choice verbatim.
    pub async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let api_key = self.config.api_key.as_deref().context("no API key")?;

        let body: Value = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(api_key)
            .json(&CompletionRequest {
                model: &self.config.model,
                messages: [PromptMessage { role: "user", content: prompt }],
                max_tokens: MAX_TOKENS,
                temperature: TEMPERATURE,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or(NO_RESPONSE)
            .to_owned())
    }
}

#[derive(Deserialize)]
pub(crate) struct AskBody {
    prompt: Option<Value>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn ask_ai(
    State(ai): State<AiClient>,
    Json(AskBody { prompt }): Json<AskBody>,
) -> AppResult<Json<Value>> {
    if !ai.enabled() {
        return Err(AppError::AiDisabled);
    }
    let Some(prompt) = prompt.as_ref().and_then(Value::as_str).filter(|p| !p.is_empty()) else {
        return Err(AppError::BadRequest("prompt required"));
    };

    let text = ai.complete(prompt).await.context("AI request failed")?;
    Ok(Json(json!({ "text": text })))
}

#[cfg(test)]
mod tests {
    use axum::{routing::post, Router};
    use tokio::net::TcpListener;

    use super::*;

    async fn fake_upstream(reply: Value) -> String {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move |Json(req): Json<Value>| {
                let reply = reply.clone();
                async move {
                    assert_eq!(req["messages"][0]["role"], "user");
                    assert_eq!(req["max_tokens"], MAX_TOKENS);
                    Json(reply)
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/v1")
    }

    fn client(base_url: String) -> AiClient {
        AiClient::new(AiConfig {
            api_key: Some("sk-test".to_owned()),
            base_url,
            ..AiConfig::default()
        })
    }

    #[tokio::test]
    async fn relays_first_choice() {
        let url = fake_upstream(json!({
            "choices": [{"message": {"role": "assistant", "content": "It prints hello."}}]
        }))
        .await;

        assert_eq!(client(url).complete("explain").await.unwrap(), "It prints hello.");
    }

    #[tokio::test]
    async fn empty_choices_mean_no_response() {
        let url = fake_upstream(json!({ "choices": [] })).await;
        assert_eq!(client(url).complete("explain").await.unwrap(), NO_RESPONSE);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(client(format!("http://{addr}/v1")).complete("explain").await.is_err());
    }

    #[test]
    fn disabled_without_key() {
        assert!(!AiClient::new(AiConfig::default()).enabled());
    }
}
