//! Remote API model adapter
//!
//! Remote models are described by a small JSON file next to the local
//! weights (`apiKey`, `modelName`, and `baseUrl` for OpenAI-compatible
//! endpoints). The adapter speaks the `/chat/completions` convention and
//! streams `delta.content` pieces back through the response callback.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{LanguageModel, ModelError, ModelHandle, PromptCallback, PromptContext, ResponseCallback};
use crate::catalog::ModelDescriptor;
use crate::config::RemoteConfig;
use crate::error::{Error, Result};

/// Contents of a remote model file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteModelFile {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub base_url: String,
}

impl RemoteModelFile {
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| Error::RemoteConfigUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| Error::RemoteConfigMalformed {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Parse a URL the way a user would type it: a bare `host/path` is taken as
/// `http://host/path`.
pub fn parse_user_url(input: &str) -> Option<Url> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match Url::parse(input) {
        Ok(url) if url.has_host() || url.scheme() == "file" => Some(url),
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("http://{}", input)).ok()
        }
        Err(_) => None,
    }
}

/// An endpoint must be http(s) and name a host.
pub fn is_http_url_valid(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
}

/// Completions URL for `model`: the built-in URL, or `<baseUrl>/chat/completions`
/// for OpenAI-compatible endpoints.
pub fn resolve_request_url(model: &ModelDescriptor, file: &RemoteModelFile) -> Result<String> {
    if !model.is_compatible_api {
        return Ok(model.url.clone());
    }

    let mut url = parse_user_url(&file.base_url)
        .filter(is_http_url_valid)
        .ok_or_else(|| Error::InvalidApiUrl(file.base_url.clone()))?;
    let path = format!("{}/chat/completions", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url.to_string())
}

/// Build a fresh remote handle for `model` from its API model file.
pub fn connect(model: &ModelDescriptor, remote: &RemoteConfig) -> Result<ModelHandle> {
    let path = model.file_path();
    let file = RemoteModelFile::read(&path)?;
    let request_url = resolve_request_url(model, &file)?;

    info!(
        "API model endpoint - URL: {}, model name: {}",
        request_url, file.model_name
    );

    let api = ChatApiModel::new(file.model_name, request_url, file.api_key)
        .with_timeout(remote.timeout())
        .with_user_agent(remote.user_agent.clone());
    Ok(ModelHandle::remote(Box::new(api), path))
}

/// One chat turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Adapter forwarding prompts to an OpenAI-style completions endpoint
#[derive(Debug, Clone)]
pub struct ChatApiModel {
    model_name: String,
    request_url: String,
    api_key: String,
    timeout: Duration,
    user_agent: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: i32,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl ChatApiModel {
    pub fn new(model_name: String, request_url: String, api_key: String) -> Self {
        Self {
            model_name,
            request_url,
            api_key,
            timeout: Duration::from_secs(600),
            user_agent: format!("localdocs/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

impl LanguageModel for ChatApiModel {
    fn is_model_loaded(&self) -> bool {
        true
    }

    fn prompt(
        &mut self,
        prompt: &str,
        _on_prompt: &mut PromptCallback<'_>,
        on_response: &mut ResponseCallback<'_>,
        ctx: &PromptContext,
    ) -> std::result::Result<(), ModelError> {
        let messages = parse_chat_markup(prompt)?;
        let body = CompletionRequest {
            model: &self.model_name,
            messages: &messages,
            max_tokens: ctx.n_predict,
            temperature: ctx.temp,
            top_p: ctx.top_p,
            stream: true,
        };

        // The blocking client owns a runtime of its own, so it is created and
        // dropped here on the calling worker thread.
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .build()?;

        debug!("POST {} ({} messages)", self.request_url, messages.len());
        let response = client
            .post(&self.request_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        for line in BufReader::new(response).lines() {
            let line = line.map_err(|e| ModelError::Protocol(e.to_string()))?;
            match parse_event_line(&line)? {
                StreamEvent::Piece(piece) => {
                    if !on_response(-1, &piece) {
                        break;
                    }
                }
                StreamEvent::Done => break,
                StreamEvent::Skip => {}
            }
        }
        Ok(())
    }
}

/// One decoded server-sent-event line
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StreamEvent {
    Piece(String),
    Done,
    Skip,
}

pub(crate) fn parse_event_line(line: &str) -> std::result::Result<StreamEvent, ModelError> {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return Ok(StreamEvent::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(StreamEvent::Done);
    }
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| ModelError::Protocol(format!("bad stream chunk: {}", e)))?;
    match chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
        Some(piece) if !piece.is_empty() => Ok(StreamEvent::Piece(piece)),
        _ => Ok(StreamEvent::Skip),
    }
}

/// Split `<chat><system>..</system><user>..</user></chat>` into turns.
pub fn parse_chat_markup(markup: &str) -> std::result::Result<Vec<ChatMessage>, ModelError> {
    let body = markup
        .trim()
        .strip_prefix("<chat>")
        .and_then(|rest| rest.strip_suffix("</chat>"))
        .ok_or_else(|| ModelError::Prompt("expected a <chat> document".to_string()))?;

    let mut messages = Vec::new();
    let mut rest = body.trim_start();
    while !rest.is_empty() {
        let open_end = rest
            .strip_prefix('<')
            .and_then(|r| r.find('>'))
            .ok_or_else(|| ModelError::Prompt(format!("unexpected text: {:.32}", rest)))?;
        let role = &rest[1..open_end + 1];
        if !matches!(role, "system" | "user" | "assistant") {
            return Err(ModelError::Prompt(format!("unknown role <{}>", role)));
        }

        let content_start = open_end + 2;
        let close = format!("</{}>", role);
        let content_len = rest[content_start..]
            .find(&close)
            .ok_or_else(|| ModelError::Prompt(format!("unterminated <{}>", role)))?;
        let content = &rest[content_start..content_start + content_len];

        messages.push(ChatMessage {
            role: role.to_string(),
            content: unescape_html(content),
        });
        rest = rest[content_start + content_len + close.len()..].trim_start();
    }

    if messages.is_empty() {
        warn!("Chat markup contained no turns");
    }
    Ok(messages)
}

fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
