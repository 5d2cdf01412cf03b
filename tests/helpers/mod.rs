#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use docent::chat::{ChatPipeline, ChatRequest, Message};
use docent::completion::{self, CompletionProvider, TextStream};
use docent::db::DbPool;
use docent::documents::Passage;
use docent::embedding::EmbeddingProvider;
use docent::error::ProviderError;
use docent::memory::MemoryRecorder;
use docent::retrieval::ContextRetriever;
use futures::StreamExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;
use tokio::sync::mpsc;

pub const DIMS: usize = 4;

/// Open a small pool over a fresh database in `tmp`.
pub fn temp_pool(tmp: &TempDir) -> Arc<DbPool> {
    Arc::new(DbPool::open(tmp.path().join("docs.db"), 2, DIMS).unwrap())
}

/// Unit vector along axis `axis`, plus `lean` along the next axis.
pub fn vector(axis: usize, lean: f32) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    v[axis % DIMS] = 1.0;
    v[(axis + 1) % DIMS] = lean;
    v
}

pub fn passage(content: &str, similarity: f64) -> Passage {
    Passage {
        id: format!("p-{content}"),
        content: content.to_string(),
        source: Some("glossary.md".into()),
        similarity,
    }
}

pub fn request(messages: Vec<Message>, persona: Option<&str>) -> ChatRequest {
    ChatRequest {
        messages,
        user_id: "user-42".into(),
        persona: persona.map(str::to_string),
    }
}

pub struct FakeEmbedder {
    pub calls: AtomicUsize,
    pub fail: bool,
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Api {
                status: 500,
                message: "embedding service down".into(),
            });
        }
        Ok(texts.iter().map(|_| vector(0, 0.0)).collect())
    }

    fn dimensions(&self) -> usize {
        DIMS
    }
}

pub struct FakeRetriever {
    pub calls: AtomicUsize,
    pub passages: Vec<Passage>,
}

#[async_trait]
impl ContextRetriever for FakeRetriever {
    async fn retrieve(&self, _query_embedding: &[f32]) -> Result<Vec<Passage>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.passages.clone())
    }
}

/// Replays `reply` and captures every prompt it is given.
pub struct FakeCompletion {
    pub prompts: Mutex<Vec<Vec<Message>>>,
    pub reply: String,
}

#[async_trait]
impl CompletionProvider for FakeCompletion {
    async fn stream(&self, messages: &[Message], _user_id: &str) -> Result<TextStream, ProviderError> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        Ok(completion::replay(&self.reply))
    }
}

/// Forwards every memory write to a channel.
pub struct ChannelMemory(mpsc::UnboundedSender<(String, Vec<Message>)>);

#[async_trait]
impl MemoryRecorder for ChannelMemory {
    async fn record(&self, user_id: &str, messages: &[Message]) -> Result<(), ProviderError> {
        let _ = self.0.send((user_id.to_string(), messages.to_vec()));
        Ok(())
    }
}

pub struct Harness {
    pub embedder: Arc<FakeEmbedder>,
    pub retriever: Arc<FakeRetriever>,
    pub completion: Arc<FakeCompletion>,
    pub memory_rx: mpsc::UnboundedReceiver<(String, Vec<Message>)>,
    pub pipeline: Arc<ChatPipeline>,
}

pub fn harness(passages: Vec<Passage>, reply: &str) -> Harness {
    build_harness(passages, reply, false, 7)
}

pub fn failing_embedder_harness() -> Harness {
    build_harness(Vec::new(), "unused", true, 7)
}

pub fn seeded_harness(seed: u64) -> Harness {
    build_harness(Vec::new(), "unused", false, seed)
}

fn build_harness(passages: Vec<Passage>, reply: &str, fail_embed: bool, seed: u64) -> Harness {
    let embedder = Arc::new(FakeEmbedder {
        calls: AtomicUsize::new(0),
        fail: fail_embed,
    });
    let retriever = Arc::new(FakeRetriever {
        calls: AtomicUsize::new(0),
        passages,
    });
    let completion = Arc::new(FakeCompletion {
        prompts: Mutex::new(Vec::new()),
        reply: reply.to_string(),
    });
    let (tx, memory_rx) = mpsc::unbounded_channel();

    let pipeline = ChatPipeline::new(
        embedder.clone(),
        retriever.clone(),
        completion.clone(),
        Some(Arc::new(ChannelMemory(tx))),
    )
    .unwrap()
    .with_rng(StdRng::seed_from_u64(seed));

    Harness {
        embedder,
        retriever,
        completion,
        memory_rx,
        pipeline: Arc::new(pipeline),
    }
}

impl Harness {
    pub fn embed_calls(&self) -> usize {
        self.embedder.calls.load(Ordering::SeqCst)
    }

    pub fn retrieve_calls(&self) -> usize {
        self.retriever.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.completion.prompts.lock().unwrap().clone()
    }

    /// Wait for the next memory write, failing the test after one second.
    pub async fn next_memory_write(&mut self) -> (String, Vec<Message>) {
        tokio::time::timeout(Duration::from_secs(1), self.memory_rx.recv())
            .await
            .expect("memory write timed out")
            .expect("memory channel closed")
    }
}

/// Drain a response stream into one string.
pub async fn collect_text<S>(stream: S) -> String
where
    S: futures::Stream<Item = Result<String, ProviderError>>,
{
    stream
        .map(|fragment| fragment.unwrap())
        .collect::<Vec<_>>()
        .await
        .concat()
}
