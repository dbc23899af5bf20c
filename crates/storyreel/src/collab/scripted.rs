//! Scripted collaborators for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ArtifactRef, CollaboratorError, ImageGenerator, TextGenerator};

/// Text generator that replays queued responses, then repeats `fallback`.
pub struct ScriptedText {
    responses: Mutex<VecDeque<Result<String, CollaboratorError>>>,
    fallback: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedText {
    pub fn new(responses: Vec<Result<String, CollaboratorError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: String::new(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(response: &str) -> Self {
        let mut scripted = Self::new(vec![]);
        scripted.fallback = response.to_string();
        scripted
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn generate(
        &self,
        prompt: &str,
        _system_directive: &str,
        _max_tokens: u32,
    ) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Image generator that fails with a fixed error a given number of times.
pub struct FlakyImage {
    failures: Mutex<VecDeque<CollaboratorError>>,
    calls: AtomicUsize,
}

impl FlakyImage {
    pub fn new(failures: Vec<CollaboratorError>) -> Self {
        Self {
            failures: Mutex::new(failures.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for FlakyImage {
    async fn generate(&self, prompt: &str) -> Result<ArtifactRef, CollaboratorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(ArtifactRef::new(format!("test://image/{}/{}", n, prompt.len())))
    }
}
