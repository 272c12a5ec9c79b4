//! The sampling loop implementation.

use std::future::Future;
use std::sync::Arc;

use autoloop_config::AppConfig;
use autoloop_core::error::{Error, Result};
use autoloop_core::history::{count_tool_result_images, prune_images, DEFAULT_MIN_REMOVAL_CHUNK};
use autoloop_core::message::{Conversation, Message, ToolResultBlock};
use autoloop_core::provider::{Provider, ProviderRequest, Usage};
use autoloop_core::text::truncate;
use autoloop_core::tool::{ToolOutput, ToolRegistry};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::observer::LoopObserver;
use crate::prompt;

/// Model used when none is set.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Default output budget per reply.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Provider calls made.
    pub rounds: u32,
    /// Tool invocations dispatched across all rounds.
    pub tool_calls: usize,
    /// Token usage summed over replies that reported it. Reporting only;
    /// no loop decision reads it.
    pub usage: Usage,
}

/// A tool request lifted out of a reply.
struct PendingCall {
    id: String,
    name: String,
    input: serde_json::Value,
}

/// Drives one conversation through provider rounds and tool dispatch until
/// the model stops asking for tools.
pub struct SamplingLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    model: String,
    images_to_keep: Option<usize>,
    min_removal_chunk: usize,
    max_tokens: u32,
    max_rounds: Option<u32>,
    parallel_tools: bool,
}

impl SamplingLoop {
    /// Create a loop with an empty system prompt and no image pruning.
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            tools,
            system_prompt: String::new(),
            model: DEFAULT_MODEL.into(),
            images_to_keep: None,
            min_removal_chunk: DEFAULT_MIN_REMOVAL_CHUNK,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_rounds: None,
            parallel_tools: false,
        }
    }

    /// Create a loop with every option taken from `config`, including the
    /// assembled system prompt.
    pub fn from_config(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, config: &AppConfig) -> Self {
        Self::new(provider, tools)
            .with_system_prompt(prompt::system_prompt(&config.system_prompt_suffix))
            .with_model(config.model())
            .with_images_to_keep(config.images_to_keep)
            .with_min_removal_chunk(config.min_removal_chunk)
            .with_max_tokens(config.max_output_tokens)
            .with_max_rounds(config.max_rounds)
            .with_parallel_tools(config.parallel_tools)
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Keep at most this many tool-result images (plus chunk slack).
    /// `None` disables pruning.
    pub fn with_images_to_keep(mut self, images_to_keep: Option<usize>) -> Self {
        self.images_to_keep = images_to_keep;
        self
    }

    pub fn with_min_removal_chunk(mut self, chunk: usize) -> Self {
        self.min_removal_chunk = chunk;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    /// Stop with [`Error::RoundLimit`] after this many provider calls.
    pub fn with_max_rounds(mut self, max: Option<u32>) -> Self {
        self.max_rounds = max;
        self
    }

    /// Run the tool calls of one round concurrently.
    pub fn with_parallel_tools(mut self, enabled: bool) -> Self {
        self.parallel_tools = enabled;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Run rounds until a reply requests no tools.
    ///
    /// The conversation is updated in place, so after an error it still
    /// holds every completed round. Provider errors end the run; tool errors
    /// are handed back to the model as error results.
    pub async fn run(&self, conversation: &mut Conversation, observer: &dyn LoopObserver) -> Result<RunSummary> {
        info!(
            conversation_id = %conversation.id,
            provider = %self.provider.name(),
            model = %self.model,
            messages = conversation.len(),
            "Starting sampling loop"
        );

        let tool_definitions = self.tools.definitions();
        let mut summary = RunSummary::default();

        loop {
            if let Some(max) = self.max_rounds {
                if summary.rounds >= max {
                    warn!(conversation_id = %conversation.id, rounds = summary.rounds, "Round limit reached");
                    return Err(Error::RoundLimit { rounds: summary.rounds });
                }
            }
            summary.rounds += 1;

            if let Some(keep) = self.images_to_keep {
                prune_images(&mut conversation.messages, keep, self.min_removal_chunk);
            }

            debug!(
                round = summary.rounds,
                messages = conversation.len(),
                images = count_tool_result_images(&conversation.messages),
                tools = tool_definitions.len(),
                last = %conversation.last().map(|m| truncate(&m.text())).unwrap_or_default(),
                "Sending request"
            );

            let request = ProviderRequest {
                model: self.model.clone(),
                system_prompt: self.system_prompt.clone(),
                messages: conversation.messages.clone(),
                tools: tool_definitions.clone(),
                max_tokens: self.max_tokens,
            };

            let reply = self.provider.send(request).await?;

            if let Some(usage) = reply.usage {
                summary.usage += usage;
            }

            observer.on_response(&reply);
            for block in &reply.content {
                observer.on_reply(block);
            }

            let calls: Vec<PendingCall> = reply
                .content
                .iter()
                .filter_map(|b| b.as_tool_use())
                .map(|(id, name, input)| PendingCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: input.clone(),
                })
                .collect();

            info!(
                round = summary.rounds,
                model = %reply.model,
                blocks = reply.content.len(),
                tool_uses = calls.len(),
                "Received reply"
            );

            conversation.push(Message::assistant(reply.content));

            if calls.is_empty() {
                info!(
                    conversation_id = %conversation.id,
                    rounds = summary.rounds,
                    tool_calls = summary.tool_calls,
                    "Sampling loop finished"
                );
                return Ok(summary);
            }

            let outputs = self.dispatch(&calls).await;

            let mut results = Vec::with_capacity(calls.len());
            for (call, output) in calls.iter().zip(outputs) {
                observer.on_tool_result(&output, &call.id);
                results.push(ToolResultBlock::from_output(call.id.clone(), &output));
            }

            summary.tool_calls += results.len();
            conversation.push(Message::tool_results(results));
        }
    }

    /// [`run`](Self::run), aborted with [`Error::Cancelled`] if `cancel`
    /// completes first.
    ///
    /// A run cancelled during tool dispatch leaves the last assistant
    /// message without results.
    pub async fn run_until_cancelled<F>(
        &self,
        conversation: &mut Conversation,
        observer: &dyn LoopObserver,
        cancel: F,
    ) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let conversation_id = conversation.id.clone();
        tokio::select! {
            biased;
            _ = cancel => {
                warn!(conversation_id = %conversation_id, "Sampling loop cancelled");
                Err(Error::Cancelled)
            }
            result = self.run(conversation, observer) => result,
        }
    }

    /// Invoke every call, returning outputs in request order.
    async fn dispatch(&self, calls: &[PendingCall]) -> Vec<ToolOutput> {
        if self.parallel_tools {
            return join_all(
                calls
                    .iter()
                    .map(|call| self.tools.invoke(&call.name, call.input.clone())),
            )
            .await;
        }

        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            outputs.push(self.tools.invoke(&call.name, call.input.clone()).await);
        }
        outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use async_trait::async_trait;
    use autoloop_core::error::{ProviderError, ToolError};
    use autoloop_core::message::{ContentBlock, ImageSource, Role};
    use autoloop_core::provider::ProviderReply;
    use autoloop_core::text::{MAX_TEXT_CHARS, TRUNCATION_MARKER};
    use autoloop_core::tool::Tool;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays scripted replies and records every request.
    struct ScriptedProvider {
        replies: Mutex<Vec<std::result::Result<ProviderReply, ProviderError>>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<std::result::Result<ProviderReply, ProviderError>>) -> Arc<Self> {
            let mut replies = replies;
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn ok(replies: Vec<ProviderReply>) -> Arc<Self> {
            Self::new(replies.into_iter().map(Ok).collect())
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, i: usize) -> ProviderRequest {
            self.requests.lock().unwrap()[i].clone()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str { "scripted" }

        async fn send(
            &self,
            request: ProviderRequest,
        ) -> std::result::Result<ProviderReply, ProviderError> {
            self.requests.lock().unwrap().push(request);
            self.replies.lock().unwrap().pop().unwrap_or_else(|| {
                Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "script exhausted".into(),
                })
            })
        }
    }

    fn tool_reply(calls: &[(&str, &str, serde_json::Value)]) -> ProviderReply {
        let mut reply = ProviderReply::text("mock-model", "working on it");
        for (id, name, input) in calls {
            reply.content.push(ContentBlock::tool_use(*id, *name, input.clone()));
        }
        reply.usage = Some(Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 });
        reply
    }

    fn done() -> ProviderReply {
        ProviderReply::text("mock-model", "All done.")
    }

    /// Fails the way a headless host would.
    struct ScreenshotTool;

    #[async_trait]
    impl Tool for ScreenshotTool {
        fn name(&self) -> &str { "screenshot" }
        fn description(&self) -> &str { "Capture the screen" }
        fn parameters_schema(&self) -> serde_json::Value { json!({"type": "object"}) }
        async fn execute(&self, _args: serde_json::Value) -> std::result::Result<ToolOutput, ToolError> {
            Ok(ToolOutput::failure("display not found"))
        }
    }

    /// Returns a screenshot image every time.
    struct CameraTool;

    #[async_trait]
    impl Tool for CameraTool {
        fn name(&self) -> &str { "camera" }
        fn description(&self) -> &str { "Take a picture" }
        fn parameters_schema(&self) -> serde_json::Value { json!({"type": "object"}) }
        async fn execute(&self, _args: serde_json::Value) -> std::result::Result<ToolOutput, ToolError> {
            Ok(ToolOutput::success("captured").with_image(ImageSource::png(vec![0x89, 0x50])))
        }
    }

    /// Prints `len` copies of 'x'.
    struct LoudTool;

    #[async_trait]
    impl Tool for LoudTool {
        fn name(&self) -> &str { "loud" }
        fn description(&self) -> &str { "Print a lot" }
        fn parameters_schema(&self) -> serde_json::Value { json!({"type": "object"}) }
        async fn execute(&self, args: serde_json::Value) -> std::result::Result<ToolOutput, ToolError> {
            let len = args["len"].as_u64().unwrap_or(0) as usize;
            Ok(ToolOutput::success("x".repeat(len)))
        }
    }

    /// Sleeps `ms`, then records its label in finish order.
    struct SleepyTool {
        finished: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Tool for SleepyTool {
        fn name(&self) -> &str { "sleepy" }
        fn description(&self) -> &str { "Sleep then answer" }
        fn parameters_schema(&self) -> serde_json::Value { json!({"type": "object"}) }
        async fn execute(&self, args: serde_json::Value) -> std::result::Result<ToolOutput, ToolError> {
            tokio::time::sleep(Duration::from_millis(args["ms"].as_u64().unwrap_or(0))).await;
            let label = args["label"].as_str().unwrap_or_default().to_string();
            self.finished.lock().unwrap().push(label.clone());
            Ok(ToolOutput::success(label))
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(ScreenshotTool));
        tools.register(Box::new(CameraTool));
        tools.register(Box::new(LoudTool));
        Arc::new(tools)
    }

    fn conversation() -> Conversation {
        Conversation::from_messages(vec![Message::user("Check the screen")])
    }

    #[derive(Default)]
    struct RecordingObserver {
        responses: Mutex<usize>,
        replies: Mutex<Vec<ContentBlock>>,
        results: Mutex<Vec<(String, bool)>>,
    }

    impl LoopObserver for RecordingObserver {
        fn on_response(&self, _reply: &ProviderReply) {
            *self.responses.lock().unwrap() += 1;
        }
        fn on_reply(&self, block: &ContentBlock) {
            self.replies.lock().unwrap().push(block.clone());
        }
        fn on_tool_result(&self, output: &ToolOutput, tool_use_id: &str) {
            self.results.lock().unwrap().push((tool_use_id.to_string(), output.is_error()));
        }
    }

    #[tokio::test]
    async fn text_reply_ends_run_after_one_call() {
        let provider = ScriptedProvider::ok(vec![done()]);
        let agent = SamplingLoop::new(provider.clone(), registry());

        let mut conv = conversation();
        let summary = agent.run(&mut conv, &NoopObserver).await.unwrap();

        assert_eq!(provider.calls(), 1);
        assert_eq!(summary.rounds, 1);
        assert_eq!(summary.tool_calls, 0);
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages[1].role, Role::Assistant);
        assert_eq!(conv.messages[1].text(), "All done.");
    }

    #[tokio::test]
    async fn missing_usage_does_not_change_control_flow() {
        let mut silent = tool_reply(&[("t1", "camera", json!({}))]);
        silent.usage = None;
        let provider = ScriptedProvider::ok(vec![silent, done()]);
        let agent = SamplingLoop::new(provider.clone(), registry());

        let mut conv = conversation();
        let summary = agent.run(&mut conv, &NoopObserver).await.unwrap();

        assert_eq!(provider.calls(), 2);
        assert_eq!(summary.rounds, 2);
        assert_eq!(summary.tool_calls, 1);
        assert_eq!(summary.usage, Usage::default());
        conv.check_tool_pairing().unwrap();
    }

    #[tokio::test]
    async fn tool_error_is_reported_and_loop_continues() {
        let provider = ScriptedProvider::ok(vec![
            tool_reply(&[("a", "screenshot", json!({}))]),
            done(),
        ]);
        let agent = SamplingLoop::new(provider.clone(), registry());

        let mut conv = conversation();
        agent.run(&mut conv, &NoopObserver).await.unwrap();

        assert_eq!(provider.calls(), 2);
        let result = conv.messages[2].tool_results_iter().next().unwrap();
        assert_eq!(result.tool_use_id, "a");
        assert!(result.is_error);
        assert_eq!(result.text.as_deref(), Some("display not found"));

        // The second request carries the error result back to the model.
        let second = provider.request(1);
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[2].role, Role::User);
    }

    #[tokio::test]
    async fn long_tool_output_truncated() {
        let provider = ScriptedProvider::ok(vec![
            tool_reply(&[("t1", "loud", json!({"len": 5000}))]),
            done(),
        ]);
        let agent = SamplingLoop::new(provider, registry());

        let mut conv = conversation();
        agent.run(&mut conv, &NoopObserver).await.unwrap();

        let text = conv.messages[2].tool_results_iter().next().unwrap().text.clone().unwrap();
        assert_eq!(text.chars().count(), MAX_TEXT_CHARS + TRUNCATION_MARKER.chars().count());
        assert!(text.ends_with(TRUNCATION_MARKER));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_result() {
        let provider = ScriptedProvider::ok(vec![
            tool_reply(&[("t1", "teleport", json!({}))]),
            done(),
        ]);
        let agent = SamplingLoop::new(provider, registry());

        let mut conv = conversation();
        agent.run(&mut conv, &NoopObserver).await.unwrap();

        let result = conv.messages[2].tool_results_iter().next().unwrap();
        assert!(result.is_error);
        assert!(result.text.as_deref().unwrap().contains("teleport"));
    }

    #[tokio::test]
    async fn every_tool_use_answered_in_order() {
        let provider = ScriptedProvider::ok(vec![
            tool_reply(&[
                ("t1", "camera", json!({})),
                ("t2", "screenshot", json!({})),
                ("t3", "loud", json!({"len": 3})),
            ]),
            tool_reply(&[("t4", "camera", json!({}))]),
            done(),
        ]);
        let agent = SamplingLoop::new(provider, registry());

        let mut conv = conversation();
        let summary = agent.run(&mut conv, &NoopObserver).await.unwrap();

        assert_eq!(summary.rounds, 3);
        assert_eq!(summary.tool_calls, 4);
        assert_eq!(summary.usage.total_tokens, 30);
        conv.check_tool_pairing().unwrap();

        let ids: Vec<_> = conv.messages[2].tool_results_iter().map(|r| r.tool_use_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
    }

    #[tokio::test]
    async fn provider_error_keeps_partial_history() {
        let provider = ScriptedProvider::new(vec![
            Ok(tool_reply(&[("t1", "camera", json!({}))])),
            Err(ProviderError::AuthenticationFailed("key revoked".into())),
        ]);
        let agent = SamplingLoop::new(provider.clone(), registry());

        let mut conv = conversation();
        let err = agent.run(&mut conv, &NoopObserver).await.unwrap_err();

        assert!(matches!(err, Error::Provider(ProviderError::AuthenticationFailed(_))));
        assert_eq!(provider.calls(), 2);
        assert_eq!(conv.len(), 3);
        conv.check_tool_pairing().unwrap();
    }

    #[tokio::test]
    async fn request_carries_prompt_tools_and_budget() {
        let provider = ScriptedProvider::ok(vec![done()]);
        let agent = SamplingLoop::new(provider.clone(), registry())
            .with_system_prompt("be brief")
            .with_model("gpt-4o")
            .with_max_tokens(256);

        agent.run(&mut conversation(), &NoopObserver).await.unwrap();

        let request = provider.request(0);
        assert_eq!(request.system_prompt, "be brief");
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.max_tokens, 256);
        let names: Vec<_> = request.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["screenshot", "camera", "loud"]);
    }

    #[tokio::test]
    async fn images_pruned_before_each_request() {
        let provider = ScriptedProvider::ok(vec![
            tool_reply(&[("t1", "camera", json!({}))]),
            tool_reply(&[("t2", "camera", json!({}))]),
            tool_reply(&[("t3", "camera", json!({}))]),
            done(),
        ]);
        let agent = SamplingLoop::new(provider.clone(), registry())
            .with_images_to_keep(Some(1))
            .with_min_removal_chunk(1);

        let mut conv = conversation();
        agent.run(&mut conv, &NoopObserver).await.unwrap();

        for round in 1..4 {
            assert_eq!(count_tool_result_images(&provider.request(round).messages), 1, "round {round}");
        }
        // The final results were appended after the last prune.
        assert_eq!(count_tool_result_images(&conv.messages), 1);
        let texts: Vec<_> = conv.messages.iter().flat_map(|m| m.tool_results_iter()).map(|r| r.text.clone()).collect();
        assert!(texts.iter().all(|t| t.as_deref() == Some("captured")));
    }

    #[tokio::test]
    async fn no_pruning_when_unset() {
        let provider = ScriptedProvider::ok(vec![
            tool_reply(&[("t1", "camera", json!({}))]),
            tool_reply(&[("t2", "camera", json!({}))]),
            done(),
        ]);
        let agent = SamplingLoop::new(provider.clone(), registry());

        let mut conv = conversation();
        agent.run(&mut conv, &NoopObserver).await.unwrap();
        assert_eq!(count_tool_result_images(&conv.messages), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_dispatch_keeps_request_order() {
        let finished = Arc::new(Mutex::new(Vec::new()));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(SleepyTool { finished: finished.clone() }));

        let provider = ScriptedProvider::ok(vec![
            tool_reply(&[
                ("slow", "sleepy", json!({"ms": 50, "label": "slow"})),
                ("fast", "sleepy", json!({"ms": 1, "label": "fast"})),
            ]),
            done(),
        ]);
        let agent = SamplingLoop::new(provider, Arc::new(tools)).with_parallel_tools(true);

        let mut conv = conversation();
        agent.run(&mut conv, &NoopObserver).await.unwrap();

        assert_eq!(finished.lock().unwrap().as_slice(), &["fast".to_string(), "slow".to_string()]);
        let ids: Vec<_> = conv.messages[2].tool_results_iter().map(|r| r.tool_use_id.as_str()).collect();
        assert_eq!(ids, vec!["slow", "fast"]);
        let texts: Vec<_> = conv.messages[2].tool_results_iter().map(|r| r.text.as_deref().unwrap()).collect();
        assert_eq!(texts, vec!["slow", "fast"]);
    }

    #[tokio::test]
    async fn round_limit_stops_with_history_intact() {
        let provider = ScriptedProvider::ok(vec![
            tool_reply(&[("t1", "camera", json!({}))]),
            tool_reply(&[("t2", "camera", json!({}))]),
            tool_reply(&[("t3", "camera", json!({}))]),
        ]);
        let agent = SamplingLoop::new(provider.clone(), registry()).with_max_rounds(Some(2));

        let mut conv = conversation();
        let err = agent.run(&mut conv, &NoopObserver).await.unwrap_err();

        assert!(matches!(err, Error::RoundLimit { rounds: 2 }));
        assert_eq!(provider.calls(), 2);
        assert_eq!(conv.len(), 5);
        conv.check_tool_pairing().unwrap();
    }

    #[tokio::test]
    async fn cancellation_aborts_before_any_call() {
        let provider = ScriptedProvider::ok(vec![done()]);
        let agent = SamplingLoop::new(provider.clone(), registry());

        let mut conv = conversation();
        let err = agent
            .run_until_cancelled(&mut conv, &NoopObserver, std::future::ready(()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(provider.calls(), 0);
        assert_eq!(conv.len(), 1);
    }

    #[tokio::test]
    async fn uncancelled_run_completes() {
        let provider = ScriptedProvider::ok(vec![done()]);
        let agent = SamplingLoop::new(provider, registry());

        let mut conv = conversation();
        let summary = agent
            .run_until_cancelled(&mut conv, &NoopObserver, std::future::pending())
            .await
            .unwrap();
        assert_eq!(summary.rounds, 1);
    }

    #[tokio::test]
    async fn observer_sees_blocks_and_results_in_order() {
        let provider = ScriptedProvider::ok(vec![
            tool_reply(&[("a", "screenshot", json!({})), ("b", "camera", json!({}))]),
            done(),
        ]);
        let agent = SamplingLoop::new(provider, registry());
        let observer = RecordingObserver::default();

        agent.run(&mut conversation(), &observer).await.unwrap();

        assert_eq!(*observer.responses.lock().unwrap(), 2);
        let replies = observer.replies.lock().unwrap();
        assert_eq!(replies.len(), 4);
        assert_eq!(replies[0].as_text(), Some("working on it"));
        assert_eq!(replies[1].as_tool_use().unwrap().0, "a");
        assert_eq!(replies[3].as_text(), Some("All done."));
        assert_eq!(
            observer.results.lock().unwrap().as_slice(),
            &[("a".to_string(), true), ("b".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn from_config_applies_options() {
        let config = AppConfig {
            model: Some("gpt-4o-mini".into()),
            system_prompt_suffix: "Stay in /tmp.".into(),
            images_to_keep: Some(3),
            max_output_tokens: 1000,
            ..AppConfig::default()
        };
        let provider = ScriptedProvider::ok(vec![done()]);
        let agent = SamplingLoop::from_config(provider.clone(), registry(), &config);

        assert!(agent.system_prompt().ends_with(" Stay in /tmp."));
        agent.run(&mut conversation(), &NoopObserver).await.unwrap();
        let request = provider.request(0);
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.max_tokens, 1000);
    }
}
