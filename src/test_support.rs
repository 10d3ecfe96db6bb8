//! Shared fixtures for tests: generated PDFs and mock model backends.

use std::sync::Mutex;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::backend::{BackendError, ChatModel, ChatTurn, EmbeddingProvider};

/// Build a minimal valid PDF with one page per entry in `pages`.
pub fn fixture_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 750.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("serialize fixture pdf");
    buffer
}

/// Deterministic bag-of-words embedding: words hashed into a fixed number of
/// buckets, so texts sharing words land close under cosine similarity.
pub fn keyword_embedding(text: &str) -> Vec<f32> {
    const DIMS: usize = 32;
    let mut vector = vec![0.0f32; DIMS];
    let words = text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect::<Vec<_>>();
    for word in words {
        // FNV-1a
        let mut hash: u32 = 2166136261;
        for byte in word.bytes() {
            hash ^= byte as u32;
            hash = hash.wrapping_mul(16777619);
        }
        vector[(hash as usize) % DIMS] += 1.0;
    }
    vector
}

/// Embedding backend with deterministic output and an optional failure mode.
pub struct MockEmbedder {
    fail: bool,
}

impl MockEmbedder {
    pub fn keyword() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        if self.fail {
            return Err(BackendError::Server {
                status: 503,
                message: "embedding backend unavailable".to_string(),
            });
        }
        Ok(texts.iter().map(|t| keyword_embedding(t)).collect())
    }
}

/// Chat backend returning a canned reply and recording the prompt it saw.
pub struct MockChat {
    reply: Option<String>,
    seen: Mutex<Vec<ChatTurn>>,
}

impl MockChat {
    pub fn canned(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// The message sequence from the most recent `complete` call.
    pub fn last_messages(&self) -> Vec<ChatTurn> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for MockChat {
    async fn complete(&self, messages: &[ChatTurn]) -> Result<String, BackendError> {
        *self.seen.lock().unwrap() = messages.to_vec();
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(BackendError::Server {
                status: 502,
                message: "model backend unreachable".to_string(),
            }),
        }
    }
}
