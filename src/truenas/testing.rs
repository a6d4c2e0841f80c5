//! Scripted connection for unit tests.

use super::connection::{Connection, TransportResult};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub payload: Option<Value>,
}

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct ScriptedConnection {
    responses: Mutex<VecDeque<TransportResult>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedConnection {
    pub fn new(responses: Vec<TransportResult>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn send_request(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
    ) -> Result<TransportResult> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            path: path.to_string(),
            payload: payload.cloned(),
        });

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::unexpected(format!("no scripted response left for {}", path)))
    }
}
