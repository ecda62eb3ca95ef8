//! Incremental decoders that turn a chunked HTTP body into vendor events.
//!
//! Chunk boundaries are arbitrary: a frame may be split anywhere, including
//! inside a multi-byte character. Both decoders buffer raw bytes and only
//! interpret complete frames.

use crate::LlmError;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

pub trait FrameDecoder: Send + 'static {
    type Item: Send + 'static;

    /// Feed the next body chunk and return every frame it completed, in
    /// order. A frame that fails to decode is returned as an `Err` in place.
    fn push(&mut self, chunk: &[u8]) -> Vec<Result<Self::Item, LlmError>>;

    /// Called once the body is exhausted.
    fn finish(&mut self) -> Vec<Result<Self::Item, LlmError>>;
}

/// Line-delimited server-sent events. Only `data:` lines carry payloads;
/// `event:`, comments and blank separators are ignored, and the `[DONE]`
/// sentinel is skipped.
pub struct SseDecoder<T> {
    buffer: Vec<u8>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for SseDecoder<T> {
    fn default() -> Self {
        SseDecoder {
            buffer: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<T> SseDecoder<T>
where
    T: DeserializeOwned,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_line(line: &[u8]) -> Result<Option<T>, LlmError> {
        let line = std::str::from_utf8(line).map_err(|e| LlmError::Decode(e.to_string()))?;
        let line = line.trim_end_matches('\r');
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(None);
        };
        let data = data.strip_prefix(' ').unwrap_or(data);
        if data.trim().is_empty() || data.trim() == "[DONE]" {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(data)?))
    }
}

impl<T> FrameDecoder for SseDecoder<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Item = T;

    fn push(&mut self, chunk: &[u8]) -> Vec<Result<T, LlmError>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|b| *b == b'\n') {
            let line = &self.buffer[consumed..consumed + offset];
            if let Some(event) = Self::decode_line(line).transpose() {
                events.push(event);
            }
            consumed += offset + 1;
        }
        self.buffer.drain(..consumed);
        events
    }

    fn finish(&mut self) -> Vec<Result<T, LlmError>> {
        let rest = std::mem::take(&mut self.buffer);
        Self::decode_line(&rest).transpose().into_iter().collect()
    }
}

/// Extracts complete top-level `{...}` objects from a streamed JSON array.
///
/// Depth only changes outside string literals, and escapes inside strings
/// are honoured, so braces in generated text never end an object early.
/// Bytes between objects (`[`, `,`, `]`, whitespace) are discarded.
#[derive(Debug, Default)]
pub struct JsonObjectScanner {
    buffer: Vec<u8>,
    pos: usize,
    start: Option<usize>,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl JsonObjectScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);

        let mut objects = Vec::new();
        while self.pos < self.buffer.len() {
            let byte = self.buffer[self.pos];
            match self.start {
                None => {
                    if byte == b'{' {
                        self.start = Some(self.pos);
                        self.depth = 1;
                    }
                }
                Some(start) => {
                    if self.in_string {
                        if self.escaped {
                            self.escaped = false;
                        } else if byte == b'\\' {
                            self.escaped = true;
                        } else if byte == b'"' {
                            self.in_string = false;
                        }
                    } else {
                        match byte {
                            b'"' => self.in_string = true,
                            b'{' => self.depth += 1,
                            b'}' => {
                                self.depth -= 1;
                                if self.depth == 0 {
                                    objects.push(self.buffer[start..=self.pos].to_vec());
                                    self.start = None;
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            self.pos += 1;
        }

        // Drop everything before the object currently being assembled.
        let keep_from = self.start.unwrap_or(self.pos);
        self.buffer.drain(..keep_from);
        self.pos -= keep_from;
        if self.start.is_some() {
            self.start = Some(0);
        }

        objects
    }

    /// True while an object has been opened but not yet closed.
    pub fn is_mid_object(&self) -> bool {
        self.start.is_some()
    }
}

/// Decodes each complete object of a streamed JSON array as `T`.
pub struct JsonArrayDecoder<T> {
    scanner: JsonObjectScanner,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for JsonArrayDecoder<T> {
    fn default() -> Self {
        JsonArrayDecoder {
            scanner: JsonObjectScanner::new(),
            _marker: PhantomData,
        }
    }
}

impl<T> JsonArrayDecoder<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T> FrameDecoder for JsonArrayDecoder<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Item = T;

    fn push(&mut self, chunk: &[u8]) -> Vec<Result<T, LlmError>> {
        self.scanner
            .push(chunk)
            .iter()
            .map(|object| serde_json::from_slice(object).map_err(LlmError::from))
            .collect()
    }

    fn finish(&mut self) -> Vec<Result<T, LlmError>> {
        if self.scanner.is_mid_object() {
            return vec![Err(LlmError::Decode(
                "stream ended inside an unterminated object".to_string(),
            ))];
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestEvent {
        id: u32,
        text: String,
    }

    fn feed<D: FrameDecoder>(decoder: &mut D, chunks: &[&[u8]]) -> Vec<D::Item> {
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(decoder.push(chunk).into_iter().map(Result::unwrap));
        }
        out.extend(decoder.finish().into_iter().map(Result::unwrap));
        out
    }

    #[test]
    fn test_sse_complete_lines() {
        let mut decoder = SseDecoder::<TestEvent>::new();
        let events = feed(
            &mut decoder,
            &[b"data: {\"id\":1,\"text\":\"hello\"}\n\ndata: {\"id\":2,\"text\":\"world\"}\n\n"],
        );

        assert_eq!(events.len(), 2);
        assert_eq!(events[1], TestEvent { id: 2, text: "world".into() });
    }

    #[test]
    fn test_sse_split_across_chunks() {
        let mut decoder = SseDecoder::<TestEvent>::new();
        let events = feed(
            &mut decoder,
            &[
                b"data: {\"id\":1,\"te",
                b"xt\":\"hello\"}\ndata: {\"id\":2",
                b",\"text\":\"world\"}\n",
            ],
        );

        assert_eq!(
            events,
            vec![
                TestEvent { id: 1, text: "hello".into() },
                TestEvent { id: 2, text: "world".into() },
            ]
        );
    }

    #[test]
    fn test_sse_split_inside_multibyte_char() {
        let line = "data: {\"id\":1,\"text\":\"héllo\"}\n".as_bytes();
        let split = line.iter().position(|b| *b >= 0x80).unwrap() + 1;

        let mut decoder = SseDecoder::<TestEvent>::new();
        let events = feed(&mut decoder, &[&line[..split], &line[split..]]);

        assert_eq!(events[0].text, "héllo");
    }

    #[test]
    fn test_sse_skips_done_and_event_lines() {
        let mut decoder = SseDecoder::<TestEvent>::new();
        let events = feed(
            &mut decoder,
            &[b"event: message\r\ndata: {\"id\":1,\"text\":\"a\"}\r\n: keep-alive\n\ndata: [DONE]\n"],
        );

        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_sse_trailing_line_without_newline() {
        let mut decoder = SseDecoder::<TestEvent>::new();
        let events = feed(&mut decoder, &[b"data: {\"id\":7,\"text\":\"tail\"}"]);
        assert_eq!(events[0].id, 7);
    }

    #[test]
    fn test_sse_malformed_payload_is_an_error() {
        let mut decoder = SseDecoder::<TestEvent>::new();
        let result = decoder.push(b"data: {not json}\n");
        assert!(matches!(result.as_slice(), [Err(LlmError::Decode(_))]));
    }

    #[test]
    fn test_scanner_respects_braces_in_strings() {
        let mut scanner = JsonObjectScanner::new();
        let body = br#"[{"text":"a } brace"},{"text":"quote \" and { open"}]"#;

        let objects = scanner.push(body);

        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0], br#"{"text":"a } brace"}"#.to_vec());
        assert_eq!(objects[1], br#"{"text":"quote \" and { open"}"#.to_vec());
    }

    #[test]
    fn test_scanner_every_split_point() {
        let body = br#"[{"id":1,"text":"x{\"}"}
,
{"id":2,"text":"nested {\"a\":{}}"}]"#;

        for split in 0..=body.len() {
            let mut decoder = JsonArrayDecoder::<TestEvent>::new();
            let events = feed(&mut decoder, &[&body[..split], &body[split..]]);
            assert_eq!(events.len(), 2, "split at {}", split);
            assert_eq!(events[0].text, "x{\"}");
            assert_eq!(events[1].text, "nested {\"a\":{}}");
        }
    }

    #[test]
    fn test_scanner_byte_at_a_time() {
        let body = br#"[{"id":1,"text":"\\"},{"id":2,"text":"b"}]"#;
        let chunks: Vec<&[u8]> = body.chunks(1).collect();

        let mut decoder = JsonArrayDecoder::<TestEvent>::new();
        let events = feed(&mut decoder, &chunks);

        assert_eq!(events[0].text, "\\");
        assert_eq!(events[1].text, "b");
    }

    #[test]
    fn test_truncated_array_is_an_error() {
        let mut decoder = JsonArrayDecoder::<TestEvent>::new();
        assert_eq!(decoder.push(br#"[{"id":1,"text":"a"},{"id":2"#).len(), 1);
        assert!(matches!(decoder.finish().as_slice(), [Err(LlmError::Decode(_))]));
    }
}
