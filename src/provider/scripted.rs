// src/provider/scripted.rs — Deterministic provider for tests and dry runs
//
// Replays a fixed script of responses in order, records every request it
// receives, and can simulate latency per call. No network access.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, ModelProvider};
use crate::infra::errors::JudgeError;

pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, JudgeError>>>,
    fallback: Option<String>,
    latency: Vec<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    /// Respond with each text once, in order.
    pub fn new<S: Into<String>>(responses: Vec<S>) -> Self {
        Self::from_results(responses.into_iter().map(|r| Ok(r.into())).collect())
    }

    /// Replay a mix of responses and errors, in order.
    pub fn from_results(results: Vec<Result<String, JudgeError>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            fallback: None,
            latency: Vec::new(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always respond with the same text.
    pub fn constant(response: impl Into<String>) -> Self {
        let mut provider = Self::from_results(Vec::new());
        provider.fallback = Some(response.into());
        provider
    }

    /// Delay for the n-th call (0-indexed). Calls past the end are instant.
    pub fn with_latency(mut self, latency: Vec<Duration>) -> Self {
        self.latency = latency;
        self
    }

    /// Number of calls started so far, including ones that timed out.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_result(&self) -> Result<String, JudgeError> {
        let popped = self
            .script
            .lock()
            .map_err(|_| JudgeError::Config("scripted provider lock poisoned".into()))?
            .pop_front();

        match (popped, &self.fallback) {
            (Some(result), _) => result,
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => Err(JudgeError::Provider {
                provider: "scripted".into(),
                message: "script exhausted".into(),
                retriable: false,
            }),
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn name(&self) -> &str {
        "Scripted"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, JudgeError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        if let Some(delay) = self.latency.get(index) {
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }
        }

        self.next_result().map(ChatResponse::text)
    }
}
