//! Embedded prompts
//!
//! Compiled into the binary from the `.pmt` files in `prompts/`.

use tracing::debug;

pub const EXTRACT: &str = include_str!("../../prompts/extract.pmt");
pub const INTENT: &str = include_str!("../../prompts/intent.pmt");
pub const LOCATION: &str = include_str!("../../prompts/location.pmt");
pub const ACTIVITY: &str = include_str!("../../prompts/activity.pmt");
pub const PACKING: &str = include_str!("../../prompts/packing.pmt");
pub const SUMMARY: &str = include_str!("../../prompts/summary.pmt");
pub const REFINE: &str = include_str!("../../prompts/refine.pmt");
pub const CHAT: &str = include_str!("../../prompts/chat.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "extract" => Some(EXTRACT),
        "intent" => Some(INTENT),
        "location" => Some(LOCATION),
        "activity" => Some(ACTIVITY),
        "packing" => Some(PACKING),
        "summary" => Some(SUMMARY),
        "refine" => Some(REFINE),
        "chat" => Some(CHAT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_prompt_has_a_heading() {
        for name in [
            "extract", "intent", "location", "activity", "packing", "summary", "refine", "chat",
        ] {
            let prompt = get_embedded(name).unwrap();
            assert!(prompt.starts_with("# "), "{} lacks a heading", name);
        }
    }

    #[test]
    fn test_extract_mentions_tool() {
        assert!(EXTRACT.contains("record_trip_details"));
        assert!(INTENT.contains("route_decision"));
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("unknown-template").is_none());
    }
}
