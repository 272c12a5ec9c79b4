//! Observation hooks for a running loop.
//!
//! Observers see every reply and every tool result as they happen. They are
//! side-effect only: nothing they do changes what the loop does next.

use autoloop_core::message::ContentBlock;
use autoloop_core::provider::ProviderReply;
use autoloop_core::tool::ToolOutput;

/// Callbacks fired by [`SamplingLoop`](crate::SamplingLoop) during a run.
///
/// All methods default to no-ops. Callbacks run inline on the loop's task,
/// so a slow callback delays the run.
pub trait LoopObserver: Send + Sync {
    /// The full reply, once per round, before its blocks.
    fn on_response(&self, _reply: &ProviderReply) {}

    /// Each reply block, in order.
    fn on_reply(&self, _block: &ContentBlock) {}

    /// Each completed tool invocation, with the id of the request it answers.
    fn on_tool_result(&self, _output: &ToolOutput, _tool_use_id: &str) {}
}

/// Ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LoopObserver for NoopObserver {}

/// Adapts a pair of closures into an observer.
pub struct FnObserver<R, T>
where
    R: Fn(&ContentBlock) + Send + Sync,
    T: Fn(&ToolOutput, &str) + Send + Sync,
{
    on_reply: R,
    on_tool_result: T,
}

impl<R, T> FnObserver<R, T>
where
    R: Fn(&ContentBlock) + Send + Sync,
    T: Fn(&ToolOutput, &str) + Send + Sync,
{
    pub fn new(on_reply: R, on_tool_result: T) -> Self {
        Self {
            on_reply,
            on_tool_result,
        }
    }
}

impl<R, T> LoopObserver for FnObserver<R, T>
where
    R: Fn(&ContentBlock) + Send + Sync,
    T: Fn(&ToolOutput, &str) + Send + Sync,
{
    fn on_reply(&self, block: &ContentBlock) {
        (self.on_reply)(block)
    }

    fn on_tool_result(&self, output: &ToolOutput, tool_use_id: &str) {
        (self.on_tool_result)(output, tool_use_id)
    }
}
