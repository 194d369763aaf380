//! Context rendering for the system prompt
//!
//! Turns the most recent memory items into a bounded text block. Items
//! arrive newest-first (as the store returns them) and are rendered
//! oldest-first; when the block exceeds the character budget, the oldest
//! content is dropped, never the newest.

use crate::models::MemoryItem;

pub fn build_context(items: &[MemoryItem], max_chars: usize) -> String {
    let lines: Vec<String> = items
        .iter()
        .rev()
        .map(|item| format!("{}: {}", item.role, item.text))
        .collect();

    let context = lines.join("\n");
    truncate_to_suffix(&context, max_chars)
}

fn truncate_to_suffix(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    text.chars().skip(total - max_chars).collect()
}
