//! Scripted transport for tests and dry runs
//!
//! Responses are served per path: queued outcomes first, then a responder
//! closure if one is registered, otherwise 404. Every request is recorded.

use super::transport::Transport;
use super::types::{RawResponse, Request, TransportError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

type Outcome = Result<RawResponse, TransportError>;
type Responder = Box<dyn Fn(&Request) -> Outcome + Send + Sync>;

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<Outcome>>,
    responders: HashMap<String, Responder>,
    requests: Vec<Request>,
}

/// Transport that replays canned outcomes
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue one outcome for a path
    pub fn push(&self, path: &str, outcome: Outcome) -> &Self {
        self.script()
            .queued
            .entry(normalize(path))
            .or_default()
            .push_back(outcome);
        self
    }

    /// Queue a response with the given status and JSON body
    pub fn push_json(&self, path: &str, status: u16, body: serde_json::Value) -> &Self {
        self.push(path, Ok(RawResponse::new(status, body.to_string())))
    }

    /// Serve a path dynamically once its queue is empty
    pub fn respond_with<F>(&self, path: &str, responder: F) -> &Self
    where
        F: Fn(&Request) -> Outcome + Send + Sync + 'static,
    {
        self.script()
            .responders
            .insert(normalize(path), Box::new(responder));
        self
    }

    /// All requests seen so far, in order
    pub fn requests(&self) -> Vec<Request> {
        self.script().requests.clone()
    }

    /// Number of requests made against a path
    pub fn call_count(&self, path: &str) -> usize {
        let path = normalize(path);
        self.script()
            .requests
            .iter()
            .filter(|r| normalize(&r.path) == path)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, request: &Request) -> Result<RawResponse, TransportError> {
        let mut script = self.script();
        script.requests.push(request.clone());

        let path = normalize(&request.path);
        if let Some(outcome) = script.queued.get_mut(&path).and_then(|q| q.pop_front()) {
            return outcome;
        }
        if let Some(responder) = script.responders.get(&path) {
            return responder(request);
        }
        Ok(RawResponse::new(404, format!("no script for {}", path)))
    }
}

fn normalize(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}
