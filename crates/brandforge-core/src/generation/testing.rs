//! Scripted model fakes shared by unit tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::image::ImagePayload;
use crate::provider::{ImageModel, TextModel};

pub const PNG_BYTES: [u8; 16] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13, b'I', b'H', b'D', b'R',
];

/// Returns queued replies in order, then repeats `fallback`
pub struct ScriptedText {
    replies: Mutex<VecDeque<Result<String>>>,
    fallback: String,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedText {
    pub fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: "{}".to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextModel for ScriptedText {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => Ok(self.fallback.clone()),
        }
    }

    fn model_name(&self) -> &str {
        "scripted-text"
    }
}

/// Succeeds with a PNG unless the prompt mentions a failing marker
pub struct ScriptedImage {
    fail_markers: Vec<String>,
    fail_first: AtomicUsize,
    calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedImage {
    pub fn ok() -> Self {
        Self {
            fail_markers: Vec::new(),
            fail_first: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call whose prompt contains `marker`
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_markers: vec![marker.to_string()],
            ..Self::ok()
        }
    }

    /// Fail the first `n` calls, then succeed
    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_first: AtomicUsize::new(n),
            ..Self::ok()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageModel for ScriptedImage {
    async fn generate_image(&self, prompt: &str) -> Result<ImagePayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if self.fail_markers.iter().any(|m| prompt.contains(m.as_str())) {
            return Err(Error::Upstream("scripted failure".to_string()));
        }
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Upstream("scripted transient failure".to_string()));
        }
        Ok(ImagePayload::Bytes(PNG_BYTES.to_vec()))
    }

    fn model_name(&self) -> &str {
        "scripted-image"
    }
}
