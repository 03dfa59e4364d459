//! Server-sent event framing for streaming completions
//!
//! The completion endpoint delivers chunks as `data: {json}` frames
//! separated by blank lines, terminated by `data: [DONE]`. Frames may be
//! split across HTTP chunks, so callers accumulate bytes into a buffer and
//! drain complete frames from it.

/// Payload of one complete SSE frame
#[derive(Debug, PartialEq, Eq)]
pub enum SseData {
    /// A `data:` payload carrying JSON
    Data(String),
    /// The `[DONE]` end-of-stream marker
    Done,
    /// A frame with no data field (comment or keep-alive)
    Empty,
}

/// Extract the next complete frame from the buffer, returning its data and
/// the remaining buffer contents. Returns `None` until a full frame
/// (terminated by a blank line) has arrived.
pub fn extract_frame(buffer: &str) -> Option<(SseData, String)> {
    let (frame, rest) = buffer.split_once("\n\n")?;
    let rest = rest.to_string();

    let mut data: Option<&str> = None;
    for line in frame.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data = Some(value.trim_start());
        }
    }

    let payload = match data {
        Some("[DONE]") => SseData::Done,
        Some(json) => SseData::Data(json.to_string()),
        None => SseData::Empty,
    };
    Some((payload, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_frame() {
        let (data, rest) = extract_frame("data: {\"a\":1}\n\nrest").unwrap();
        assert_eq!(data, SseData::Data("{\"a\":1}".to_string()));
        assert_eq!(rest, "rest");
    }

    #[test]
    fn waits_for_frame_terminator() {
        assert!(extract_frame("data: {\"a\":1}\n").is_none());
        assert!(extract_frame("data: {\"a\"").is_none());
    }

    #[test]
    fn recognizes_done_marker() {
        let (data, rest) = extract_frame("data: [DONE]\n\n").unwrap();
        assert_eq!(data, SseData::Done);
        assert!(rest.is_empty());
    }

    #[test]
    fn skips_comment_frames() {
        let (data, _) = extract_frame(": keep-alive\n\n").unwrap();
        assert_eq!(data, SseData::Empty);
    }

    #[test]
    fn drains_frames_in_order() {
        let mut buffer = "data: one\n\ndata: two\n\ndata: [DONE]\n\n".to_string();
        let mut seen = Vec::new();
        while let Some((data, rest)) = extract_frame(&buffer) {
            seen.push(data);
            buffer = rest;
        }
        assert_eq!(
            seen,
            vec![
                SseData::Data("one".to_string()),
                SseData::Data("two".to_string()),
                SseData::Done,
            ]
        );
    }

    #[test]
    fn event_name_lines_are_ignored() {
        let (data, _) = extract_frame("event: chunk\ndata: payload\n\n").unwrap();
        assert_eq!(data, SseData::Data("payload".to_string()));
    }
}
