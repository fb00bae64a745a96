//! Hand-rolled SSE wire framing.
//!
//! `axum::response::sse::Event` orders its fields by insertion, which does
//! not match the fixed `event` → `retry` → `id` → `data` order required
//! here, so updates are framed as raw bytes instead of going through it.

use mercure_core::Event;

/// SSE comment line used for the connect preamble and heartbeats.
pub const COMMENT_LINE: &str = ":\n";

/// Frame `event` as an SSE record: `event:`/`retry:`/`id:` (each omitted
/// when empty/zero), one `data:` line per line of the payload, then a
/// blank line terminator.
pub fn frame_event(event: &Event) -> String {
    let mut out = String::new();
    if !event.r#type.is_empty() {
        out.push_str("event: ");
        out.push_str(&event.r#type);
        out.push('\n');
    }
    if event.retry > 0 {
        out.push_str("retry: ");
        out.push_str(&event.retry.to_string());
        out.push('\n');
    }
    if !event.id.is_empty() {
        out.push_str("id: ");
        out.push_str(&event.id);
        out.push('\n');
    }
    for line in event.data.split('\n') {
        out.push_str("data: ");
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_event_emits_only_id_and_data() {
        let event = Event::new("b", "Hello World");
        assert_eq!(frame_event(&event), "id: b\ndata: Hello World\n\n");
    }

    #[test]
    fn full_event_orders_fields_event_then_retry_then_id_then_data() {
        let event = Event::new("c", "Great").with_type("test").with_retry(1);
        assert_eq!(
            frame_event(&event),
            "event: test\nretry: 1\nid: c\ndata: Great\n\n"
        );
    }

    #[test]
    fn multi_line_data_becomes_one_data_line_per_line() {
        let event = Event::new("d", "line1\nline2");
        assert_eq!(frame_event(&event), "id: d\ndata: line1\ndata: line2\n\n");
    }

    #[test]
    fn retry_only_update_omits_event_and_id() {
        let mut event = Event::new("", "Great").with_retry(1);
        event.id = "c".to_string();
        // id re-set after with_retry just to show field independence; the
        // literal scenario's retry-only case has no type and id "c".
        assert_eq!(frame_event(&event), "retry: 1\nid: c\ndata: Great\n\n");
    }
}
