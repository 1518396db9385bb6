use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};

use super::{EvalError, EvalResult};

/// Identity of a `map`/`repeat` iteration: the dotted output address of its list.
pub type LoopId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCursor {
    Open(usize),
    Closed,
}

/// One named input channel. Values are delivered exactly once, in push order.
#[derive(Clone)]
struct InputQueue {
    sender: mpsc::UnboundedSender<Value>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Value>>>,
}

impl InputQueue {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }
}

/// The mutable structure shared by every evaluator frame of one agent
/// invocation. It is always handed around behind an `Arc`, never copied.
#[derive(Default)]
pub struct CoordinationState {
    loop_cursors: DashMap<LoopId, LoopCursor>,
    input_queues: DashMap<String, InputQueue>,
}

impl CoordinationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self, loop_id: &str) -> Option<LoopCursor> {
        self.loop_cursors.get(loop_id).map(|cursor| *cursor)
    }

    pub fn loop_ids(&self) -> Vec<LoopId> {
        self.loop_cursors
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Moves an open loop to `index`. Returns `false`, leaving the cursor
    /// untouched, when the loop has been closed.
    pub fn advance_loop(&self, loop_id: &str, index: usize) -> bool {
        match self.loop_cursors.entry(loop_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() == LoopCursor::Closed {
                    return false;
                }
                entry.insert(LoopCursor::Open(index));
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(LoopCursor::Open(index));
                true
            }
        }
    }

    /// Closing is permanent and may happen before the loop first runs.
    pub fn close_loop(&self, loop_id: &str) {
        debug!(loop_id, "Loop closed");
        self.loop_cursors
            .insert(loop_id.to_string(), LoopCursor::Closed);
    }

    pub fn is_closed(&self, loop_id: &str) -> bool {
        self.cursor(loop_id) == Some(LoopCursor::Closed)
    }

    fn queue(&self, name: &str) -> InputQueue {
        self.input_queues
            .entry(name.to_string())
            .or_insert_with(InputQueue::new)
            .clone()
    }

    pub fn push_input(&self, name: &str, value: Value) {
        trace!(queue = name, "Input pushed");
        // The receiver lives in the same map, so the channel cannot be closed.
        let _ = self.queue(name).sender.send(value);
    }

    /// Waits for the oldest pending value of `name`.
    pub async fn next_input(&self, name: &str) -> EvalResult<Value> {
        let queue = self.queue(name);
        let mut receiver = queue.receiver.lock().await;
        receiver.recv().await.ok_or_else(|| EvalError::QueueClosed {
            queue: name.to_string(),
        })
    }

    /// Pops the oldest pending value without waiting.
    pub fn try_next_input(&self, name: &str) -> Option<Value> {
        let queue = self.queue(name);
        let mut receiver = queue.receiver.try_lock().ok()?;
        receiver.try_recv().ok()
    }
}
