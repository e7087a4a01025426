//! Deferred helper values
//!
//! Template evaluation is synchronous, but some helpers produce values that
//! are only available later. Such a helper enqueues a future on the current
//! [`DeferredPass`] and hands back a [`DeferredPass::handle`] value. When the
//! handle lands in output position the pass records a [`Segment::Pending`]
//! slot; after evaluation every referenced future is awaited together and
//! one linear pass joins text and resolved values.
//!
//! Handles carry the issuing pass's nonce, so template data shaped like a
//! handle is never mistaken for one.

use std::collections::hash_map::RandomState;
use std::collections::{BTreeSet, HashMap};
use std::hash::{BuildHasher, Hasher};
use std::io;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{try_join_all, BoxFuture};
use serde_json::{json, Value};

use super::CompileError;

/// Key of the object a deferred handle is encoded as
pub const HANDLE_KEY: &str = "$deferred";

/// Key holding the nonce of the pass that issued a handle
pub const PASS_KEY: &str = "$pass";

static PASSES: AtomicU64 = AtomicU64::new(0);

/// A value that resolves after template evaluation
pub type PendingValue = BoxFuture<'static, Result<Value, CompileError>>;

/// Index of a pending value within one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(pub usize);

/// A piece of evaluated output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(Vec<u8>),
    Pending(Ticket),
}

#[derive(Default)]
struct PassState {
    segments: Vec<Segment>,
    pending: Vec<Option<PendingValue>>,
    error: Option<CompileError>,
}

/// Output buffer and pending values of one compilation
#[derive(Clone)]
pub struct DeferredPass {
    state: Arc<Mutex<PassState>>,
    nonce: u64,
}

impl Default for DeferredPass {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredPass {
    pub fn new() -> Self {
        let mut hasher = RandomState::new().build_hasher();
        hasher.write_u64(PASSES.fetch_add(1, Ordering::Relaxed));
        Self {
            state: Arc::default(),
            nonce: hasher.finish(),
        }
    }

    /// Encode a ticket of this pass as a template value
    pub fn handle(&self, ticket: Ticket) -> Value {
        json!({ HANDLE_KEY: ticket.0, PASS_KEY: self.nonce })
    }

    /// Decode a handle issued by this pass
    pub fn ticket_of(&self, value: &Value) -> Option<Ticket> {
        let Value::Object(map) = value else {
            return None;
        };
        if map.len() != 2 || map.get(PASS_KEY).and_then(Value::as_u64) != Some(self.nonce) {
            return None;
        }
        map.get(HANDLE_KEY)
            .and_then(Value::as_u64)
            .and_then(|index| usize::try_from(index).ok())
            .map(Ticket)
    }

    fn lock(&self) -> MutexGuard<'_, PassState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a pending value and return its ticket
    pub fn enqueue(&self, value: PendingValue) -> Ticket {
        let mut state = self.lock();
        state.pending.push(Some(value));
        Ticket(state.pending.len() - 1)
    }

    /// Place a pending value at the current output position
    pub fn push_pending(&self, ticket: Ticket) -> Result<(), CompileError> {
        let mut state = self.lock();
        if ticket.0 >= state.pending.len() {
            return Err(CompileError::NotDeferred(self.handle(ticket).to_string()));
        }
        state.segments.push(Segment::Pending(ticket));
        Ok(())
    }

    /// Append evaluated text at the current output position
    pub fn push_text(&self, bytes: &[u8]) {
        let mut state = self.lock();
        match state.segments.last_mut() {
            Some(Segment::Text(text)) => text.extend_from_slice(bytes),
            _ => state.segments.push(Segment::Text(bytes.to_vec())),
        }
    }

    /// Writer appending to this pass, for the template engine
    pub fn writer(&self) -> PassWriter {
        PassWriter { pass: self.clone() }
    }

    /// Keep a typed error raised inside a helper; the engine only carries a message
    pub fn record_error(&self, error: CompileError) {
        let mut state = self.lock();
        if state.error.is_none() {
            state.error = Some(error);
        }
    }

    pub fn take_error(&self) -> Option<CompileError> {
        self.lock().error.take()
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.lock().segments.clone()
    }

    /// Await every referenced pending value and join the output
    ///
    /// A ticket placed more than once is awaited once. Tickets that never
    /// reached output position are dropped unawaited.
    pub async fn resolve(self) -> Result<String, CompileError> {
        let (segments, mut pending) = {
            let mut state = self.lock();
            (mem::take(&mut state.segments), mem::take(&mut state.pending))
        };

        let referenced: BTreeSet<Ticket> = segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Pending(ticket) => Some(*ticket),
                Segment::Text(_) => None,
            })
            .collect();
        let mut order = Vec::with_capacity(referenced.len());
        let mut futures = Vec::with_capacity(referenced.len());
        for ticket in referenced {
            if let Some(value) = pending.get_mut(ticket.0).and_then(Option::take) {
                order.push(ticket);
                futures.push(value);
            }
        }
        log::debug!("awaiting {} deferred value(s)", futures.len());
        let resolved: HashMap<Ticket, Value> = order.into_iter().zip(try_join_all(futures).await?).collect();

        let mut output = Vec::new();
        for segment in segments {
            match segment {
                Segment::Text(text) => output.extend_from_slice(&text),
                Segment::Pending(ticket) => {
                    let value = resolved
                        .get(&ticket)
                        .ok_or_else(|| CompileError::NotDeferred(self.handle(ticket).to_string()))?;
                    output.extend_from_slice(value_text(value).as_bytes());
                }
            }
        }
        Ok(String::from_utf8(output)?)
    }
}

/// `io::Write` sink feeding a [`DeferredPass`]
pub struct PassWriter {
    pass: DeferredPass,
}

impl io::Write for PassWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pass.push_text(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Text substituted for a resolved value: strings raw, everything else as JSON
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
