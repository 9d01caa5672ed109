//! Incremental decoder for `data: <payload>\n\n` stream frames

/// Buffers partial chunks and yields the data of each completed frame
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one body chunk, returning the data of every frame it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending
            .extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = self.pending.windows(2).position(|w| w == b"\n\n") {
            let frame: Vec<u8> = self.pending.drain(..end + 2).collect();
            if let Some(data) = frame_data(&String::from_utf8_lossy(&frame)) {
                frames.push(data);
            }
        }
        frames
    }
}

/// Join the `data:` lines of one frame; comment-only frames yield nothing
fn frame_data(frame: &str) -> Option<String> {
    let lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data: {\"type\":\"oom\"}\n\n");
        assert_eq!(frames, vec![r#"{"type":"oom"}"#.to_string()]);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"pgfa").is_empty());
        assert!(decoder.push(b"ult\":60}\n").is_empty());
        let frames = decoder.push(b"\ndata: {\"pgfault\":61}\n\n");
        assert_eq!(
            frames,
            vec![r#"{"pgfault":60}"#.to_string(), r#"{"pgfault":61}"#.to_string()]
        );
    }

    #[test]
    fn test_comment_frames_skipped() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b":keep-alive\n\ndata: 1\n\n");
        assert_eq!(frames, vec!["1".to_string()]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data: 2\r\n\r\n");
        assert_eq!(frames, vec!["2".to_string()]);
    }
}
