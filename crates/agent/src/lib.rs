//! The sampling loop that drives a conversation through provider rounds and tool calls.
//!
//! The loop follows a **Propose → Execute → Feed back** cycle:
//!
//! 1. **Prune** stale tool-result images from the history (if configured)
//! 2. **Send** the system prompt, history, and tool definitions to the provider
//! 3. **Append** the reply as an assistant message
//! 4. **If tool uses**: execute them, append the results as one user message,
//!    loop back to step 1
//! 5. **If no tool uses**: the run is over
//!
//! Observers watch every reply block and tool result without steering the loop.

pub mod loop_runner;
pub mod observer;
pub mod prompt;

pub use loop_runner::{RunSummary, SamplingLoop, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
pub use observer::{FnObserver, LoopObserver, NoopObserver};
