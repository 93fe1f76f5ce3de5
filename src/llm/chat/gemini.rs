use async_trait::async_trait;
use std::error::Error as StdError;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE } };
use serde::{ Deserialize, Serialize };
use log::{ debug, error, info };

use super::{ ChatClient, CompletionResponse };
use crate::error::ExchangeError;
use crate::llm::{ GenerationConfig, LlmConfig };
use crate::models::chat::{ ChatMessage, Role };

const DEFAULT_MODEL: &str = "gemini-1.5-pro";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Debug)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize, Debug)]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
}

#[derive(Deserialize, Debug)]
struct GoogleCandidate {
    content: Option<GoogleContent>,
}

#[derive(Deserialize, Debug)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize, Debug)]
struct GooglePart {
    text: Option<String>,
}

fn build_request(turns: &[ChatMessage], generation: GenerationConfig) -> GeminiRequest {
    let contents = turns
        .iter()
        .map(|msg| GeminiContent {
            role: match msg.role {
                Role::User => "user",
                Role::Assistant => "model",
            },
            parts: vec![GeminiPart { text: msg.content.clone() }],
        })
        .collect();

    GeminiRequest {
        contents,
        generation_config: generation,
    }
}

/// Pulls `candidates[0].content.parts[0].text` out of a success body.
fn parse_response_body(body: &[u8]) -> Result<String, ExchangeError> {
    let parsed: GoogleResponse = serde_json
        ::from_slice(body)
        .map_err(|e| ExchangeError::MalformedResponse(format!("invalid JSON body: {}", e)))?;

    parsed.candidates
        .into_iter()
        .next()
        .ok_or_else(|| ExchangeError::MalformedResponse("response has no candidates".to_string()))?
        .content
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(||
            ExchangeError::MalformedResponse("first candidate has no text part".to_string())
        )
}

pub struct GeminiChatClient {
    http: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
    generation: GenerationConfig,
}

impl GeminiChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        generation: GenerationConfig
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let chat_model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;

        Ok(Self {
            http,
            api_key,
            model: chat_model,
            base_url: api_url,
            generation,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| "Gemini API key is required (set GEMINI_API_KEY)".to_string())?;

        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
            config.generation
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url.trim_end_matches('/'), self.model)
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn complete(
        &self,
        turns: &[ChatMessage]
    ) -> Result<CompletionResponse, ExchangeError> {
        let url = self.endpoint();
        let req = build_request(turns, self.generation);

        info!(
            "GeminiChatClient::complete() → model={} turns={}",
            self.model,
            req.contents.len()
        );
        debug!("Making API request with body: {:?}", req);

        let resp = self.http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&req)
            .send().await
            .map_err(|e| ExchangeError::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp.text().await.unwrap_or_default();
            error!("API Error ({}): {}", status, error_body);
            return Err(ExchangeError::HttpStatus { status: status.as_u16() });
        }

        let body = resp
            .bytes().await
            .map_err(|e| ExchangeError::Transport(e.without_url().to_string()))?;
        debug!("API Response: {}", String::from_utf8_lossy(&body));

        let text = parse_response_body(&body)?;
        Ok(CompletionResponse { response: text })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use tokio::net::TcpListener;

    const GENERATE_PATH: &str = "/models/gemini-1.5-pro:generateContent";

    fn client_for(base_url: String) -> GeminiChatClient {
        GeminiChatClient::new(
            "test-key".to_string(),
            None,
            Some(base_url),
            GenerationConfig::default()
        ).unwrap()
    }

    #[test]
    fn request_carries_text_and_generation_config() {
        let req = build_request(&[ChatMessage::user("Hello")], GenerationConfig::default());
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["contents"].as_array().unwrap().len(), 1);
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Hello");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
        assert!((json["generationConfig"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn assistant_turns_are_sent_as_model_role() {
        let turns = vec![
            ChatMessage::user("Hello"),
            ChatMessage::assistant("Hi there"),
            ChatMessage::user("How are you?")
        ];
        let json = serde_json::to_value(build_request(&turns, GenerationConfig::default())).unwrap();
        let roles: Vec<&str> = json["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
    }

    #[test]
    fn first_candidate_text_is_extracted() {
        let body = br#"{"candidates":[{"content":{"parts":[{"text":"Hi there"}]}},{"content":{"parts":[{"text":"ignored"}]}}]}"#;
        assert_eq!(parse_response_body(body).unwrap(), "Hi there");
    }

    #[test]
    fn missing_candidates_is_malformed() {
        let err = parse_response_body(br#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap_err();
        assert!(matches!(err, ExchangeError::MalformedResponse(_)));

        let err = parse_response_body(br#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap_err();
        assert!(matches!(err, ExchangeError::MalformedResponse(_)));

        let err = parse_response_body(b"not json").unwrap_err();
        assert!(matches!(err, ExchangeError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn success_response_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", GENERATE_PATH)
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_header("content-type", "application/json")
            .match_body(
                Matcher::PartialJson(
                    json!({
                        "contents": [{ "role": "user", "parts": [{ "text": "Hello" }] }],
                        "generationConfig": { "maxOutputTokens": 2048 }
                    })
                )
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"Hi there"}]}}]}"#)
            .create_async().await;
        let client = client_for(server.url());

        let resp = client.complete(&[ChatMessage::user("Hello")]).await.unwrap();
        assert_eq!(resp.response, "Hi there");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_code() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", GENERATE_PATH)
            .match_query(Matcher::Any)
            .with_status(429)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"code":429,"message":"Resource has been exhausted"}}"#)
            .expect(1)
            .create_async().await;
        let client = client_for(server.url());

        let err = client.complete(&[ChatMessage::user("Hello")]).await.unwrap_err();
        assert_eq!(err, ExchangeError::HttpStatus { status: 429 });
        assert!(err.to_string().contains("status: 429"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn success_without_candidate_text_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", GENERATE_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
            .create_async().await;
        let client = client_for(server.url());

        let err = client.complete(&[ChatMessage::user("Hello")]).await.unwrap_err();
        assert!(matches!(err, ExchangeError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_failure() {
        // Bind then drop to get a port nobody is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(format!("http://{}", addr));
        let err = client.complete(&[ChatMessage::user("Hello")]).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Transport(_)));
    }
}
