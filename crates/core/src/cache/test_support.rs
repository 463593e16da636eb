//! Scripted upstream for cache tests.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::Semaphore;

use crate::{Error, Upstream};

/// Upstream that answers from a fixed script and records every call.
///
/// Unscripted identifiers answer with HTTP 404. A gated upstream blocks each
/// fetch until [`ScriptedUpstream::release`] hands out a permit.
pub(crate) struct ScriptedUpstream {
    script: Mutex<HashMap<String, Result<Value, Error>>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Semaphore>,
}

impl ScriptedUpstream {
    pub(crate) fn new() -> Self {
        Self { script: Mutex::new(HashMap::new()), calls: Mutex::new(Vec::new()), gate: None }
    }

    pub(crate) fn gated() -> Self {
        Self { gate: Some(Semaphore::new(0)), ..Self::new() }
    }

    pub(crate) fn respond(&self, id: &str, payload: Value) {
        self.script.lock().unwrap().insert(id.to_string(), Ok(payload));
    }

    pub(crate) fn fail(&self, id: &str, error: Error) {
        self.script.lock().unwrap().insert(id.to_string(), Err(error));
    }

    pub(crate) fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Upstream for ScriptedUpstream {
    async fn fetch(&self, identifier: &str) -> Result<Value, Error> {
        self.calls.lock().unwrap().push(identifier.to_string());

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        self.script
            .lock()
            .unwrap()
            .get(identifier)
            .cloned()
            .unwrap_or_else(|| Err(Error::upstream_status(404, format!("HTTP 404 for {identifier}"))))
    }
}
