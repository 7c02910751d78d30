//! Line-framed decoding of streaming response bodies
//!
//! Network chunks do not respect record boundaries, so a partial trailing line is
//! carried into the next chunk. OpenAI-compatible servers frame records as SSE
//! `data: ` lines ending in `data: [DONE]`; Ollama sends one JSON object per line
//! with `"done": true` on the last.

use futures::{Stream, StreamExt};
use serde_json::Value;
use tagmeister_core::CaptionError;
use tracing::{debug, warn};

use crate::CaptionStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Sse,
    NdJson,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Record(Value),
    Done,
    Malformed { line: String, error: String },
}

#[derive(Debug)]
pub struct StreamDecoder {
    framing: Framing,
    carry: Vec<u8>,
    finished: bool,
}

impl StreamDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            carry: Vec::new(),
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decode every complete line in `chunk` plus whatever was carried over.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }

        self.carry.extend_from_slice(chunk);
        while let Some(pos) = self.carry.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.carry.drain(..=pos).collect();
            self.decode_line(&line[..pos], &mut frames);
            if self.finished {
                self.carry.clear();
                break;
            }
        }
        frames
    }

    /// End of body: a non-empty remainder is treated as a final record.
    pub fn close(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        let rest = std::mem::take(&mut self.carry);
        if !self.finished && !rest.is_empty() {
            self.decode_line(&rest, &mut frames);
        }
        self.finished = true;
        frames
    }

    fn decode_line(&mut self, raw: &[u8], out: &mut Vec<Frame>) {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim_end_matches('\r');

        let payload = match self.framing {
            Framing::Sse => match line.strip_prefix("data:") {
                Some(data) => data.trim(),
                None => return,
            },
            Framing::NdJson => line.trim(),
        };
        if payload.is_empty() {
            return;
        }
        if self.framing == Framing::Sse && payload == "[DONE]" {
            self.finished = true;
            out.push(Frame::Done);
            return;
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(value) => out.push(Frame::Record(value)),
            Err(e) => out.push(Frame::Malformed {
                line: payload.to_string(),
                error: e.to_string(),
            }),
        }
    }
}

/// Per-backend view into a decoded record.
#[derive(Clone, Copy)]
pub struct FieldExtractor {
    pub text: fn(&Value) -> Option<&str>,
    pub is_final: fn(&Value) -> bool,
}

/// Turn a byte stream into a stream of non-empty text fragments.
pub fn decode_body<S, B, E>(body: S, framing: Framing, extractor: FieldExtractor) -> CaptionStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<CaptionError> + Send + 'static,
{
    let mut body = Box::pin(body);

    Box::pin(async_stream::stream! {
        let mut decoder = StreamDecoder::new(framing);
        let mut done = false;

        while !done {
            let Some(chunk) = body.next().await else {
                break;
            };
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let err: CaptionError = e.into();
                    yield Err(err);
                    return;
                }
            };

            for frame in decoder.feed(chunk.as_ref()) {
                let (text, stop) = interpret(frame, &extractor);
                if let Some(text) = text {
                    yield Ok(text);
                }
                if stop {
                    done = true;
                    break;
                }
            }
        }

        if !done {
            for frame in decoder.close() {
                if let (Some(text), _) = interpret(frame, &extractor) {
                    yield Ok(text);
                }
            }
        }
        debug!("Stream body finished");
    })
}

fn interpret(frame: Frame, extractor: &FieldExtractor) -> (Option<String>, bool) {
    match frame {
        Frame::Record(value) => {
            let text = (extractor.text)(&value)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            (text, (extractor.is_final)(&value))
        }
        Frame::Done => (None, true),
        Frame::Malformed { line, error } => {
            let preview: String = line.chars().take(120).collect();
            warn!(%error, line = %preview, "Skipping unparseable stream record");
            (None, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delta(v: &Value) -> Option<&str> {
        v.pointer("/choices/0/delta/content").and_then(Value::as_str)
    }

    fn never(_: &Value) -> bool {
        false
    }

    fn response(v: &Value) -> Option<&str> {
        v.get("response").and_then(Value::as_str)
    }

    fn done(v: &Value) -> bool {
        v.get("done").and_then(Value::as_bool).unwrap_or(false)
    }

    const SSE: FieldExtractor = FieldExtractor {
        text: delta,
        is_final: never,
    };
    const NDJSON: FieldExtractor = FieldExtractor {
        text: response,
        is_final: done,
    };

    const SSE_BODY: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"A \"}}]}\r\n\r\n\
data: {\"choices\":[{\"delta\":{\"content\":\"red\"}}]}\n\n\
: keep-alive\n\
data: {\"choices\":[{\"delta\":{}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\" fox\"}}]}\n\n\
data: [DONE]\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n";

    async fn collect(chunks: Vec<&'static [u8]>, framing: Framing, ex: FieldExtractor) -> Vec<String> {
        let body = futures::stream::iter(chunks.into_iter().map(Ok::<_, CaptionError>));
        decode_body(body, framing, ex)
            .map(|r| r.unwrap())
            .collect()
            .await
    }

    #[test]
    fn sse_records_and_done() {
        let mut decoder = StreamDecoder::new(Framing::Sse);
        let frames = decoder.feed(SSE_BODY.as_bytes());

        assert_eq!(frames.len(), 5);
        assert_eq!(frames[0], Frame::Record(json!({"choices":[{"delta":{"content":"A "}}]})));
        assert_eq!(frames[4], Frame::Done);
        assert!(decoder.is_finished());
        assert!(decoder.feed(b"data: {}\n").is_empty());
    }

    #[test]
    fn partial_line_waits_for_newline() {
        let mut decoder = StreamDecoder::new(Framing::NdJson);
        assert!(decoder.feed(b"{\"response\":\"ca").is_empty());
        let frames = decoder.feed(b"t\"}\n{\"resp");
        assert_eq!(frames, vec![Frame::Record(json!({"response":"cat"}))]);
        assert_eq!(decoder.close(), vec![Frame::Malformed {
            line: "{\"resp".to_string(),
            error: serde_json::from_str::<Value>("{\"resp").unwrap_err().to_string(),
        }]);
    }

    #[test]
    fn trailing_record_without_newline() {
        let mut decoder = StreamDecoder::new(Framing::NdJson);
        assert!(decoder.feed(b"{\"response\":\"x\",\"done\":true}").is_empty());
        assert_eq!(decoder.close().len(), 1);
    }

    #[tokio::test]
    async fn sse_fragments_in_order() {
        let chunks = collect(vec![SSE_BODY.as_bytes()], Framing::Sse, SSE).await;
        assert_eq!(chunks, vec!["A ", "red", " fox"]);
    }

    #[tokio::test]
    async fn chunk_boundaries_do_not_matter() {
        let whole = collect(vec![SSE_BODY.as_bytes()], Framing::Sse, SSE).await;

        for split in [1usize, 7, 13, 40, 61] {
            let bytes = SSE_BODY.as_bytes();
            let pieces: Vec<&'static [u8]> = bytes.chunks(split).collect();
            let split_result = collect(pieces, Framing::Sse, SSE).await;
            assert_eq!(split_result, whole, "split every {split} bytes");
        }
    }

    #[tokio::test]
    async fn ndjson_stops_at_done() {
        let body: &'static [u8] = b"{\"response\":\"a\",\"done\":false}\n\
not json\n\
{\"response\":\"b\",\"done\":false}\n\
{\"response\":\"\",\"done\":true}\n\
{\"response\":\"late\",\"done\":false}\n";
        let chunks = collect(vec![body], Framing::NdJson, NDJSON).await;
        assert_eq!(chunks, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let body = futures::stream::iter(vec![
            Ok::<&'static [u8], CaptionError>(b"{\"response\":\"a\"}\n"),
            Err(CaptionError::transport("connection reset")),
            Ok(b"{\"response\":\"b\"}\n"),
        ]);
        let items: Vec<_> = decode_body(body, Framing::NdJson, NDJSON).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "a");
        assert!(items[1].is_err());
    }
}
