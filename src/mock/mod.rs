//! Mock implementations for testing
//!
//! Scripted telemetry sources and a recording accessory host, usable from
//! unit tests and from the integration tests under `tests/`.

use crate::client::{Endpoint, RawTelemetry, TelemetrySource};
use crate::error::{BridgeError, Result};
use crate::host::{AccessoryHost, CachedAccessory};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Telemetry source replaying a fixed script of responses
///
/// Once the script is exhausted it keeps returning the repeat value if one
/// was given, never answers if stalling, otherwise a network error.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Value>>>,
    repeat: Option<Value>,
    panic_next: AtomicBool,
    stall_when_exhausted: bool,
    calls: AtomicUsize,
    endpoints: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Value>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    /// Answer every fetch with the same body
    pub fn repeating(body: Value) -> Self {
        Self {
            repeat: Some(body),
            ..Default::default()
        }
    }

    /// Panic on the first fetch, then replay `script`
    pub fn panicking_then(script: Vec<Result<Value>>) -> Self {
        let source = Self::new(script);
        source.panic_next.store(true, Ordering::SeqCst);
        source
    }

    /// Replay `script`, then leave every later fetch pending forever
    pub fn stalling_after(script: Vec<Result<Value>>) -> Self {
        Self {
            stall_when_exhausted: true,
            ..Self::new(script)
        }
    }

    /// Append a response to the script
    pub fn push(&self, response: Result<Value>) {
        lock(&self.script).push_back(response);
    }

    /// Number of fetches issued so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Endpoints fetched, in order
    pub fn endpoints(&self) -> Vec<String> {
        lock(&self.endpoints).clone()
    }
}

#[async_trait]
impl TelemetrySource for ScriptedSource {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<RawTelemetry> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.endpoints).push(endpoint.url().to_string());

        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("scripted source panic");
        }

        let next = lock(&self.script).pop_front();
        if next.is_none() && self.stall_when_exhausted {
            futures::future::pending::<()>().await;
        }
        match next {
            Some(response) => response.and_then(RawTelemetry::from_value),
            None => match &self.repeat {
                Some(body) => RawTelemetry::from_value(body.clone()),
                None => Err(BridgeError::network("script exhausted")),
            },
        }
    }
}

/// Accessory host that records every call
#[derive(Debug, Default)]
pub struct RecordingHost {
    cached: Vec<CachedAccessory>,
    registered: Mutex<Vec<CachedAccessory>>,
    restored: Mutex<Vec<CachedAccessory>>,
    updated: Mutex<Vec<CachedAccessory>>,
    fail_registration: AtomicBool,
}

impl RecordingHost {
    /// Host that already knows `cached` from an earlier run
    pub fn with_cached(cached: Vec<CachedAccessory>) -> Self {
        Self {
            cached,
            ..Default::default()
        }
    }

    /// Make subsequent registrations fail
    pub fn fail_registrations(&self, fail: bool) {
        self.fail_registration.store(fail, Ordering::SeqCst);
    }

    pub fn registered(&self) -> Vec<CachedAccessory> {
        lock(&self.registered).clone()
    }

    pub fn restored(&self) -> Vec<CachedAccessory> {
        lock(&self.restored).clone()
    }

    pub fn updated(&self) -> Vec<CachedAccessory> {
        lock(&self.updated).clone()
    }
}

#[async_trait]
impl AccessoryHost for RecordingHost {
    async fn cached_accessories(&self) -> Result<Vec<CachedAccessory>> {
        Ok(self.cached.clone())
    }

    async fn register_accessory(&self, accessory: &CachedAccessory) -> Result<()> {
        if self.fail_registration.load(Ordering::SeqCst) {
            return Err(BridgeError::host("registration rejected"));
        }
        lock(&self.registered).push(accessory.clone());
        Ok(())
    }

    async fn restore_accessory(&self, accessory: &CachedAccessory) -> Result<()> {
        lock(&self.restored).push(accessory.clone());
        Ok(())
    }

    async fn update_accessory(&self, accessory: &CachedAccessory) -> Result<()> {
        lock(&self.updated).push(accessory.clone());
        Ok(())
    }
}

// A poisoned lock only means another test thread panicked mid-push.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
