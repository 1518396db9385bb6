//! # Generation events
//!
//! Every completed `gen` publishes a [`GenerationEvent`](event_bus::GenerationEvent)
//! on the agent's [`EventBus`](event_bus::EventBus). Application code reacts to
//! a specific generation without polling, either through synchronous observers
//! or through a broadcast subscription.
//!
//! ```text
//! ┌─────┐  publish  ┌──────────┐  Named("answer")  ┌──────────┐
//! │ gen │──────────▶│ EventBus │──────────────────▶│ Observer │
//! └─────┘           └────┬─────┘  Any              └──────────┘
//!                        │
//!                        ▼ broadcast
//!                  ┌─────────────┐
//!                  │EventReceiver│
//!                  └─────────────┘
//! ```
//!
//! Observers run inline, before the generating action yields control, which
//! makes them the right place to bridge one agent's output into another
//! agent's input queue:
//!
//! ```rust,no_run
//! # use kotoba::AgentHandle;
//! # fn example(a: AgentHandle, b: AgentHandle) {
//! let to_b = b.input_sender();
//! a.on("answer", move |event| to_b.send("question", event.value.to_text()));
//! # }
//! ```

pub mod event_bus;
