/// Incremental splitter for `text/event-stream` bodies.
///
/// Bytes are buffered until a blank line closes a frame. The trailing
/// partial frame is held back for the next read. Splitting happens on
/// raw bytes so a multi-byte character cut in half by the transport is
/// reassembled before it is decoded.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Feed the next chunk of the body and return the `data` payload of
    /// each frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // CRLF framing (used by some upstream providers) is folded into LF
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut payloads = Vec::new();
        while let Some(end) = find_delimiter(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let frame = String::from_utf8_lossy(&frame[..end]);
            if let Some(data) = frame_data(&frame) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Bytes of an unfinished frame still waiting for its delimiter.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

// Joins the `data:` lines of one frame. Comments (`:keep-alive`) and
// other fields are dropped.
fn frame_data(frame: &str) -> Option<String> {
    let lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();

    if lines.is_empty() {
        return None;
    }

    let data = lines.join("\n");
    if data.trim().is_empty() {
        return None;
    }
    Some(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_holds_back_partial_frames() {
        let mut decoder = FrameDecoder::default();

        assert!(decoder.push(b"data: {\"te").is_empty());
        assert!(decoder.pending() > 0);

        let payloads = decoder.push(b"xt\":\"Hi\",\"done\":false}\n\ndata: {");
        assert_eq!(payloads, vec![String::from("{\"text\":\"Hi\",\"done\":false}")]);
        assert_eq!(decoder.pending(), 7);
    }

    #[test]
    fn it_splits_many_frames_in_one_chunk() {
        let mut decoder = FrameDecoder::default();
        let payloads = decoder.push(b"data: one\n\ndata: two\n\ndata: three\n\n");
        assert_eq!(payloads, vec!["one", "two", "three"]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn it_skips_comments_and_empty_frames() {
        let mut decoder = FrameDecoder::default();
        let payloads = decoder.push(b":keep-alive\n\nevent: ping\n\ndata: \n\ndata: real\n\n");
        assert_eq!(payloads, vec!["real"]);
    }

    #[test]
    fn it_decodes_crlf_streams() {
        let mut decoder = FrameDecoder::default();
        let payloads = decoder.push(b"data: {\"a\":1}\r\n\r\ndata: {\"a\":2}\r\n\r\n");
        assert_eq!(payloads, vec!["{\"a\":1}", "{\"a\":2}"]);
    }

    #[test]
    fn it_reassembles_split_multibyte_characters() {
        let frame = "data: caf\u{e9} \u{1f600}\n\n".as_bytes().to_vec();
        let mut decoder = FrameDecoder::default();
        let mut payloads = Vec::new();
        for byte in frame {
            payloads.extend(decoder.push(&[byte]));
        }
        assert_eq!(payloads, vec!["caf\u{e9} \u{1f600}"]);
    }

    #[test]
    fn it_joins_multiline_data() {
        let mut decoder = FrameDecoder::default();
        let payloads = decoder.push(b"data: first\ndata: second\n\n");
        assert_eq!(payloads, vec!["first\nsecond"]);
    }
}
