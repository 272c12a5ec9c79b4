//! Built-in tool implementations for autoloop.
//!
//! The loop itself is tool-agnostic; this crate provides the bash tool so
//! the binary has something useful to dispatch to. Screen and editor tools
//! plug in the same way through `autoloop_core::Tool`.

pub mod bash;

use std::time::Duration;

use autoloop_config::BashConfig;
use autoloop_core::tool::ToolRegistry;

pub use bash::BashTool;

/// Create a registry with the built-in tools, configured from `bash`.
pub fn default_registry(bash: &BashConfig) -> ToolRegistry {
    let mut tool = BashTool::new(Duration::from_secs(bash.timeout_secs));
    if let Some(dir) = &bash.working_dir {
        tool = tool.with_working_dir(dir);
    }

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(tool));
    registry
}
