// Copyright (c) 2025 Sean McNamara <smcnam@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Settings;
use crate::project::ProjectConfig;
use crate::secrets;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One conversation turn, serialized as `{"role": .., "content": ..}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A chat-completion backend
pub trait Provider {
    fn name(&self) -> String;

    /// Return the assistant's next reply given the conversation so far
    fn chat_completion(&self, messages: &[Message]) -> Result<String>;
}

/// Provider kind as named in `.ecrivez/config.yaml`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Ollama,
    Echo,
}

impl ProviderKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "ollama" => Some(Self::Ollama),
            "echo" => Some(Self::Echo),
            _ => None,
        }
    }
}

/// Offline provider that repeats the latest user message
#[derive(Debug, Default)]
pub struct EchoProvider;

impl Provider for EchoProvider {
    fn name(&self) -> String {
        "echo".to_string()
    }

    fn chat_completion(&self, messages: &[Message]) -> Result<String> {
        let reply = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| format!("(echo) {}", m.content))
            .unwrap_or_else(|| "(echo) <no user message>".to_string());
        Ok(reply)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// OpenAI (or compatible) `/chat/completions` endpoint
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(model: &str, api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

impl Provider for OpenAiProvider {
    fn name(&self) -> String {
        format!("openai:{}", self.model)
    }

    fn chat_completion(&self, messages: &[Message]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .context("Failed to reach OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            anyhow::bail!("OpenAI API returned error {}: {}", status, body);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .context("Failed to parse OpenAI response")?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("OpenAI response contained no message content"))
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

/// Local inference through Ollama's `/api/chat`
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(model: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

impl Provider for OllamaProvider {
    fn name(&self) -> String {
        format!("ollama:{}", self.model)
    }

    fn chat_completion(&self, messages: &[Message]) -> Result<String> {
        let request = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .with_context(|| format!("Failed to reach Ollama at {}", self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            anyhow::bail!("Ollama returned error {}: {}", status, body);
        }

        let chat: OllamaChatResponse = response
            .json()
            .context("Failed to parse Ollama response")?;

        chat.message
            .content
            .ok_or_else(|| anyhow!("Ollama response contained no message content"))
    }
}

/// Environment first, then the project config, then user settings
pub fn resolve_openai_key<F>(project: &ProjectConfig, settings: &Settings, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let configured = |key: &Option<String>| key.clone().filter(|k| !k.trim().is_empty());

    secrets::api_key_from("openai", lookup)
        .or_else(|| configured(&project.openai_api_key))
        .or_else(|| configured(&settings.openai_api_key))
}

/// Pick the provider named by the project config; unknown names fall back to echo
pub fn choose_provider(project: &ProjectConfig, settings: &Settings) -> Result<Box<dyn Provider>> {
    match ProviderKind::from_name(&project.provider) {
        Some(ProviderKind::OpenAi) => {
            let api_key = resolve_openai_key(project, settings, |name| std::env::var(name).ok())
                .ok_or_else(|| {
                    anyhow!(
                        "OPENAI_API_KEY not set – export it or add 'openai_api_key' to .ecrivez/config.yaml"
                    )
                })?;
            Ok(Box::new(OpenAiProvider::new(
                &project.model,
                &api_key,
                &settings.openai_base_url(),
                settings.request_timeout(),
            )?))
        }
        Some(ProviderKind::Ollama) => Ok(Box::new(OllamaProvider::new(
            &project.model,
            &settings.ollama_base_url(),
            settings.request_timeout(),
        )?)),
        Some(ProviderKind::Echo) => Ok(Box::new(EchoProvider)),
        None => {
            eprintln!(
                "Warning: unknown provider '{}'; falling back to echo.",
                project.provider
            );
            Ok(Box::new(EchoProvider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::runtime::Runtime;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// The mock server runs its own thread; the runtime only drives setup and inspection
    fn runtime() -> Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn mock_post(rt: &Runtime, route: &str, response: ResponseTemplate) -> MockServer {
        rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(route))
                .respond_with(response)
                .expect(1)
                .mount(&server)
                .await;
            server
        })
    }

    fn last_request_body(rt: &Runtime, server: &MockServer) -> serde_json::Value {
        let requests = rt.block_on(server.received_requests()).unwrap();
        requests.last().unwrap().body_json().unwrap()
    }

    fn project(provider: &str) -> ProjectConfig {
        ProjectConfig::new("demo", "gpt-4o", provider)
    }

    #[test]
    fn test_echo_returns_last_user_message() {
        let messages = vec![
            Message::user("Hello"),
            Message::assistant("Hi"),
            Message::user("How are you?"),
        ];
        assert_eq!(
            EchoProvider.chat_completion(&messages).unwrap(),
            "(echo) How are you?"
        );
    }

    #[test]
    fn test_echo_without_user_message() {
        let messages = vec![Message::system("be brief")];
        assert_eq!(
            EchoProvider.chat_completion(&messages).unwrap(),
            "(echo) <no user message>"
        );
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_string(&Message::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!(ProviderKind::from_name("OpenAI"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::from_name("ollama"), Some(ProviderKind::Ollama));
        assert_eq!(ProviderKind::from_name("echo"), Some(ProviderKind::Echo));
        assert_eq!(ProviderKind::from_name("anthropic"), None);
    }

    #[test]
    fn test_choose_echo_and_unknown() {
        let settings = Settings::default();
        assert_eq!(choose_provider(&project("echo"), &settings).unwrap().name(), "echo");
        assert_eq!(choose_provider(&project("mystery"), &settings).unwrap().name(), "echo");
    }

    #[test]
    fn test_choose_ollama() {
        let provider = choose_provider(&project("ollama"), &Settings::default()).unwrap();
        assert_eq!(provider.name(), "ollama:gpt-4o");
    }

    #[test]
    fn test_choose_openai_with_project_key() {
        let mut config = project("openai");
        config.openai_api_key = Some("sk-project".to_string());
        let provider = choose_provider(&config, &Settings::default()).unwrap();
        assert!(provider.name().starts_with("openai:"));
    }

    #[test]
    fn test_openai_key_precedence() {
        let mut config = project("openai");
        config.openai_api_key = Some("sk-project".to_string());
        let settings = Settings {
            openai_api_key: Some("sk-settings".to_string()),
            ..Settings::default()
        };

        let from_env = resolve_openai_key(&config, &settings, |name| {
            (name == "OPENAI_API_KEY").then(|| "sk-env".to_string())
        });
        assert_eq!(from_env.as_deref(), Some("sk-env"));

        let from_project = resolve_openai_key(&config, &settings, |_| None);
        assert_eq!(from_project.as_deref(), Some("sk-project"));

        config.openai_api_key = None;
        let from_settings = resolve_openai_key(&config, &settings, |_| None);
        assert_eq!(from_settings.as_deref(), Some("sk-settings"));

        assert_eq!(resolve_openai_key(&config, &Settings::default(), |_| None), None);
    }

    #[test]
    fn test_blank_project_key_falls_through_to_settings() {
        let mut config = project("openai");
        config.openai_api_key = Some("   ".to_string());
        let settings = Settings {
            openai_api_key: Some("sk-settings".to_string()),
            ..Settings::default()
        };

        let key = resolve_openai_key(&config, &settings, |_| None);
        assert_eq!(key.as_deref(), Some("sk-settings"));

        let blank_everywhere = Settings {
            openai_api_key: Some(String::new()),
            ..Settings::default()
        };
        assert_eq!(resolve_openai_key(&config, &blank_everywhere, |_| None), None);
    }

    #[test]
    fn test_openai_chat_completion() {
        let rt = runtime();
        let server = mock_post(
            &rt,
            "/chat/completions",
            ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "assistant reply"}}]
            })),
        );
        let provider =
            OpenAiProvider::new("gpt-4o", "sk-test", &server.uri(), Duration::from_secs(5)).unwrap();

        let reply = provider.chat_completion(&[Message::user("hi")]).unwrap();
        assert_eq!(reply, "assistant reply");

        let requests = rt.block_on(server.received_requests()).unwrap();
        let auth = requests[0].headers.get("authorization").unwrap();
        assert_eq!(auth.to_str().unwrap(), "Bearer sk-test");

        let body = last_request_body(&rt, &server);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"], json!([{"role": "user", "content": "hi"}]));
    }

    #[test]
    fn test_openai_error_status() {
        let rt = runtime();
        let server = mock_post(
            &rt,
            "/chat/completions",
            ResponseTemplate::new(429).set_body_string(r#"{"error":"slow down"}"#),
        );
        let provider =
            OpenAiProvider::new("gpt-4o", "sk-test", &server.uri(), Duration::from_secs(5)).unwrap();

        let err = provider.chat_completion(&[Message::user("hi")]).unwrap_err();
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("slow down"));
    }

    #[test]
    fn test_ollama_chat_completion() {
        let rt = runtime();
        let server = mock_post(
            &rt,
            "/api/chat",
            ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.1",
                "message": {"role": "assistant", "content": "local reply"},
                "done": true
            })),
        );
        let provider =
            OllamaProvider::new("llama3.1", &server.uri(), Duration::from_secs(5)).unwrap();

        let reply = provider.chat_completion(&[Message::user("hi")]).unwrap();
        assert_eq!(reply, "local reply");

        let body = last_request_body(&rt, &server);
        assert_eq!(body["model"], "llama3.1");
        assert_eq!(body["stream"], false);
    }
}
