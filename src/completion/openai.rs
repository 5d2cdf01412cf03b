//! OpenAI-compatible `/chat/completions` client in streaming mode.
//!
//! The response body is server-sent events: `data: {json}` lines carrying
//! `choices[0].delta.content`, terminated by `data: [DONE]`.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionProvider, TextStream};
use crate::chat::Message;
use crate::config::CompletionConfig;
use crate::error::ProviderError;

pub struct OpenAiCompletion {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    user: &'a str,
}

#[derive(Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

/// One parsed SSE line.
#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(String),
    Done,
    Skip,
}

impl OpenAiCompletion {
    pub fn new(config: &CompletionConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    async fn stream(&self, messages: &[Message], user_id: &str) -> Result<TextStream, ProviderError> {
        tracing::debug!(model = %self.model, messages = messages.len(), "starting completion stream");

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&CompletionRequest {
                model: &self.model,
                messages,
                stream: true,
                user: user_id,
            });
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let resp = req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message });
        }

        Ok(sse_deltas(resp.bytes_stream().boxed()))
    }
}

struct SseState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    error: Option<ProviderError>,
    finished: bool,
}

impl SseState {
    /// Move every complete line out of the buffer. Returns true once `[DONE]`
    /// or a finish reason has been seen.
    fn drain_lines(&mut self) -> Result<bool, ProviderError> {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.push_line(&line)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn push_line(&mut self, line: &[u8]) -> Result<bool, ProviderError> {
        let line = String::from_utf8_lossy(line);
        match parse_sse_line(line.trim())? {
            SseLine::Delta(text) => {
                self.pending.push_back(text);
                Ok(false)
            }
            SseLine::Done => Ok(true),
            SseLine::Skip => Ok(false),
        }
    }
}

/// Turn a raw SSE byte stream into reply fragments.
fn sse_deltas(body: BoxStream<'static, reqwest::Result<Bytes>>) -> TextStream {
    let state = SseState {
        body,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        error: None,
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            // fragments parsed before a failure are still delivered
            if let Some(text) = st.pending.pop_front() {
                return Some((Ok(text), st));
            }
            if let Some(e) = st.error.take() {
                return Some((Err(e), st));
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => {
                    st.buffer.extend_from_slice(&chunk);
                    match st.drain_lines() {
                        Ok(done) => st.finished = done,
                        Err(e) => {
                            st.finished = true;
                            st.error = Some(e);
                        }
                    }
                }
                Some(Err(e)) => {
                    st.finished = true;
                    st.error = Some(e.into());
                }
                None => {
                    st.finished = true;
                    let tail = std::mem::take(&mut st.buffer);
                    if let Err(e) = st.push_line(&tail) {
                        st.error = Some(e);
                    }
                }
            }
        }
    })
    .boxed()
}

fn parse_sse_line(line: &str) -> Result<SseLine, ProviderError> {
    let Some(data) = line.strip_prefix("data:") else {
        // comments, event names, blank separators
        return Ok(SseLine::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let parsed: StreamResponse = serde_json::from_str(data)
        .map_err(|e| ProviderError::Parse(format!("completion chunk: {e}")))?;

    match parsed.choices.into_iter().next() {
        Some(choice) => match choice.delta.content {
            Some(text) if !text.is_empty() => Ok(SseLine::Delta(text)),
            _ if choice.finish_reason.is_some() => Ok(SseLine::Done),
            _ => Ok(SseLine::Skip),
        },
        None => Ok(SseLine::Skip),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(chunks: &[&str]) -> BoxStream<'static, reqwest::Result<Bytes>> {
        let owned: Vec<reqwest::Result<Bytes>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from(c.to_string())))
            .collect();
        stream::iter(owned).boxed()
    }

    #[test]
    fn parses_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert_eq!(parse_sse_line(line).unwrap(), SseLine::Delta("Hel".into()));
    }

    #[test]
    fn parses_done_and_skips_noise() {
        assert_eq!(parse_sse_line("data: [DONE]").unwrap(), SseLine::Done);
        assert_eq!(parse_sse_line("").unwrap(), SseLine::Skip);
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), SseLine::Skip);
        let role_only = r#"data: {"choices":[{"delta":{"role":"assistant"},"finish_reason":null}]}"#;
        assert_eq!(parse_sse_line(role_only).unwrap(), SseLine::Skip);
    }

    #[test]
    fn finish_reason_ends_stream() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_sse_line(line).unwrap(), SseLine::Done);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            parse_sse_line("data: {not json"),
            Err(ProviderError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn deltas_survive_chunk_boundaries() {
        let body = body_of(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"AWP is \"},\"finish_reason\":null}]}\n\ndata: {\"choi",
            "ces\":[{\"delta\":{\"content\":\"a price.\"},\"finish_reason\":null}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"},\"finish_reason\":null}]}\n\n",
        ]);

        let fragments: Vec<String> = sse_deltas(body).map(|r| r.unwrap()).collect().await;
        assert_eq!(fragments, vec!["AWP is ", "a price."]);
    }

    #[tokio::test]
    async fn multibyte_text_split_across_chunks() {
        let full = "data: {\"choices\":[{\"delta\":{\"content\":\"día\"},\"finish_reason\":null}]}\n";
        let bytes = full.as_bytes();
        let split = full.find('í').unwrap() + 1; // inside the two-byte char
        let body = stream::iter(vec![
            Ok(Bytes::copy_from_slice(&bytes[..split])),
            Ok(Bytes::copy_from_slice(&bytes[split..])),
        ])
        .boxed();

        let fragments: Vec<String> = sse_deltas(body).map(|r| r.unwrap()).collect().await;
        assert_eq!(fragments, vec!["día"]);
    }

    #[tokio::test]
    async fn unterminated_last_line_is_flushed() {
        let body = body_of(&["data: {\"choices\":[{\"delta\":{\"content\":\"tail\"},\"finish_reason\":null}]}"]);
        let fragments: Vec<String> = sse_deltas(body).map(|r| r.unwrap()).collect().await;
        assert_eq!(fragments, vec!["tail"]);
    }

    #[tokio::test]
    async fn bad_chunk_yields_error_then_ends() {
        let body = body_of(&["data: {\"choices\":[{\"delta\":{\"content\":\"ok\"},\"finish_reason\":null}]}\ndata: {oops\n"]);
        let items: Vec<_> = sse_deltas(body).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "ok");
        assert!(items[1].is_err());
    }

    #[test]
    fn request_serializes_roles_and_user() {
        let messages = vec![Message::system("sys"), Message::user("What is AWP?")];
        let body = serde_json::to_value(CompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            stream: true,
            user: "u-1",
        })
        .unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "What is AWP?");
        assert_eq!(body["user"], "u-1");
        assert_eq!(body["stream"], true);
    }
}
