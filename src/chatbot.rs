use axum::{debug_handler, extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{auth::AuthUser, AppError, AppResult, AppState};

pub const FALLBACK_REPLY: &str = "Sorry, I couldn’t generate a response.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chatbot", post(chatbot))
}

/// Client for a Gemini-style `generateContent` endpoint.
#[derive(Clone)]
pub struct Chatbot {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl Chatbot {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Chatbot {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }

    pub async fn ask(&self, message: &str) -> anyhow::Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is not set"))?;

        let res = self
            .http
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&json!({
                "contents": [{ "role": "user", "parts": [{ "text": message }] }],
            }))
            .send()
            .await?;

        let status = res.status();
        let body: Value = res.json().await?;
        if !status.is_success() {
            tracing::warn!(%status, "chatbot endpoint answered with an error");
        }

        Ok(extract_reply(&body).unwrap_or(FALLBACK_REPLY).to_owned())
    }
}

/// `candidates[0].content.parts[0].text`, if present and non-empty.
pub fn extract_reply(body: &Value) -> Option<&str> {
    body.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}

#[derive(Debug, Deserialize)]
struct ChatbotBody {
    message: Option<String>,
}

#[debug_handler(state = AppState)]
async fn chatbot(
    _: AuthUser,
    State(chatbot): State<Chatbot>,
    Json(ChatbotBody { message }): Json<ChatbotBody>,
) -> AppResult<Json<Value>> {
    let Some(message) = message.filter(|message| !message.trim().is_empty()) else {
        return Err(AppError::BadRequest("No message".into()));
    };

    let reply = chatbot
        .ask(&message)
        .await
        .map_err(|err| AppError::internal("Bot error", err))?;

    Ok(Json(json!({ "reply": reply })))
}

#[cfg(test)]
mod tests {
    use axum::extract::Query;
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn reply_comes_from_the_first_candidate() {
        let body = json!({
            "candidates": [
                { "content": { "parts": [{ "text": "Photosynthesis turns light into sugar." }] } },
                { "content": { "parts": [{ "text": "ignored" }] } },
            ],
        });
        assert_eq!(extract_reply(&body), Some("Photosynthesis turns light into sugar."));
    }

    #[test]
    fn odd_shapes_have_no_reply() {
        assert_eq!(extract_reply(&json!({})), None);
        assert_eq!(extract_reply(&json!({ "candidates": [] })), None);
        assert_eq!(extract_reply(&json!({ "candidates": [{ "content": { "parts": [{ "text": "" }] } }] })), None);
        assert_eq!(extract_reply(&json!({ "error": { "code": 400 } })), None);
    }

    async fn stub(answer: Value) -> String {
        let app = Router::new().route(
            "/generate",
            post(move |Query(query): Query<HashMap<String, String>>, Json(req): Json<Value>| async move {
                assert_eq!(query.get("key").map(String::as_str), Some("k"));
                assert_eq!(req["contents"][0]["role"], "user");
                Json(answer)
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/generate")
    }

    #[tokio::test]
    async fn asks_the_endpoint_with_the_key() {
        let endpoint = stub(json!({ "candidates": [{ "content": { "parts": [{ "text": "42" }] } }] })).await;
        let reply = Chatbot::new(endpoint, Some("k".into())).ask("meaning of life?").await.unwrap();
        assert_eq!(reply, "42");
    }

    #[tokio::test]
    async fn empty_answers_fall_back() {
        let endpoint = stub(json!({ "candidates": [] })).await;
        let reply = Chatbot::new(endpoint, Some("k".into())).ask("hello").await.unwrap();
        assert_eq!(reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn missing_key_is_an_error() {
        assert!(Chatbot::new("http://127.0.0.1:9/never", None).ask("hello").await.is_err());
    }
}
