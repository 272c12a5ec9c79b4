//! Image retention for long-running conversations.
//!
//! Screenshots returned by tools lose value as the conversation moves on but
//! keep costing request size. The pruner drops the oldest ones and leaves a
//! bounded tail. Removal happens in chunks so the leading portion of the
//! history changes rarely, which keeps backend prefix caches warm.

use tracing::debug;

use crate::message::{ContentBlock, Message};

/// Default chunk size for image removal.
pub const DEFAULT_MIN_REMOVAL_CHUNK: usize = 10;

/// Position of a tool-result image: `(message index, block index)`.
type ImageSlot = (usize, usize);

/// Chronological index of every image held inside a tool result.
///
/// Top-level image blocks are not indexed; only tool output is prunable.
fn tool_result_image_slots(messages: &[Message]) -> Vec<ImageSlot> {
    messages
        .iter()
        .enumerate()
        .flat_map(|(m, message)| {
            message
                .content
                .iter()
                .enumerate()
                .filter_map(move |(b, block)| match block {
                    ContentBlock::ToolResult(result) if result.image.is_some() => Some((m, b)),
                    _ => None,
                })
        })
        .collect()
}

/// Number of images currently held by tool results.
pub fn count_tool_result_images(messages: &[Message]) -> usize {
    tool_result_image_slots(messages).len()
}

/// How many images a prune pass would remove.
///
/// The excess over `images_to_keep` is rounded down to a multiple of
/// `min_removal_chunk`, so the pass under-prunes rather than over-prunes.
/// A chunk of zero behaves like a chunk of one.
pub fn removal_count(total_images: usize, images_to_keep: usize, min_removal_chunk: usize) -> usize {
    let excess = total_images.saturating_sub(images_to_keep);
    let chunk = min_removal_chunk.max(1);
    excess - excess % chunk
}

/// Drop the oldest tool-result images so that at most
/// `images_to_keep + min_removal_chunk - 1` remain.
///
/// Sibling text and annotations in the same result are left intact, and no
/// block is added, removed, or reordered. Returns how many images were dropped.
pub fn prune_images(messages: &mut [Message], images_to_keep: usize, min_removal_chunk: usize) -> usize {
    let slots = tool_result_image_slots(messages);
    let to_remove = removal_count(slots.len(), images_to_keep, min_removal_chunk);
    if to_remove == 0 {
        return 0;
    }

    for &(m, b) in &slots[..to_remove] {
        if let ContentBlock::ToolResult(result) = &mut messages[m].content[b] {
            result.image = None;
        }
    }

    debug!(
        total = slots.len(),
        removed = to_remove,
        kept = slots.len() - to_remove,
        "Pruned tool-result images"
    );
    to_remove
}
