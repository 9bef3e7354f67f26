//! Incremental frame decoding for inference-server response bodies.
//!
//! Local inference servers answer a streamed generation in one of two shapes:
//!
//! - event-framed bodies, where `data:` lines carry the payload and a blank
//!   line ends each event (`data: [DONE]` ends the generation), and
//! - concatenated JSON objects, newline-delimited or glued together, possibly
//!   interleaved with plain-text fragments.
//!
//! The shape is recognised from the first bytes of the body. Both shapes run
//! their payloads through the same [`ObjectCarver`], which splits text into
//! balanced-brace JSON objects and plain-text gaps, so every decoded unit ends
//! up as a [`Frame`] regardless of where it came from.

use memchr::memmem;
use serde_json::Value;
use tracing::debug;

use super::utf8::Utf8Decoder;

/// Payload that terminates an event-framed stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const EVENT_SEPARATOR: &[u8] = b"\n\n";
const EVENT_FIELDS: [&str; 5] = ["data:", "event:", "id:", "retry:", ":"];

/// One decoded logical unit of the response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A complete JSON object.
    Json(Value),
    /// Text that is not a JSON object, kept verbatim.
    Text(String),
}

/// Output of the decoder for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Frame(Frame),
    /// The event-framed end sentinel was seen.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Undetermined,
    EventFramed,
    Concatenated,
}

#[derive(Debug, Clone, Copy)]
enum ScanState {
    /// Between objects. `has_text` records whether the gap so far holds
    /// anything other than whitespace.
    Gap { has_text: bool },
    /// Inside an object that started at offset 0 of the carver buffer.
    Object {
        depth: usize,
        in_string: bool,
        escaped: bool,
    },
}

impl Default for ScanState {
    fn default() -> Self {
        ScanState::Gap { has_text: false }
    }
}

/// Splits text into JSON objects and plain-text gaps.
///
/// Scanning resumes where the previous call stopped, so a long pending object
/// is walked once no matter how many chunks it arrives in. Braces inside JSON
/// string literals do not count towards nesting depth.
#[derive(Debug, Default)]
pub struct ObjectCarver {
    buffer: String,
    cursor: usize,
    state: ScanState,
}

impl ObjectCarver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: &str, out: &mut Vec<Frame>) {
        self.buffer.push_str(text);
        self.scan(out);
    }

    /// Flush whatever is left once no more input will arrive.
    pub fn finish(&mut self, out: &mut Vec<Frame>) {
        match self.state {
            ScanState::Gap { has_text } => {
                if has_text && !self.buffer.is_empty() {
                    out.push(Frame::Text(std::mem::take(&mut self.buffer)));
                }
            }
            ScanState::Object { .. } => {
                let raw = std::mem::take(&mut self.buffer);
                out.push(parse_object(raw));
            }
        }
        self.buffer.clear();
        self.cursor = 0;
        self.state = ScanState::default();
    }

    /// Carve a payload that is already complete.
    pub fn carve_complete(payload: &str) -> Vec<Frame> {
        let mut carver = Self::new();
        let mut frames = Vec::new();
        carver.push(payload, &mut frames);
        carver.finish(&mut frames);
        frames
    }

    fn scan(&mut self, out: &mut Vec<Frame>) {
        loop {
            match self.state {
                ScanState::Gap { has_text } => {
                    let unscanned = &self.buffer[self.cursor..];
                    match unscanned.find('{') {
                        Some(relative) => {
                            let open = self.cursor + relative;
                            let has_text = has_text || contains_text(&unscanned[..relative]);
                            if has_text && open > 0 {
                                out.push(Frame::Text(self.buffer[..open].to_string()));
                            }
                            self.buffer.drain(..open);
                            self.cursor = 1;
                            self.state = ScanState::Object {
                                depth: 1,
                                in_string: false,
                                escaped: false,
                            };
                        }
                        None => {
                            let has_text = has_text || contains_text(unscanned);
                            if has_text {
                                if !self.buffer.is_empty() {
                                    out.push(Frame::Text(std::mem::take(&mut self.buffer)));
                                }
                                self.cursor = 0;
                            } else {
                                // Whitespace-only so far: hold it until we know
                                // whether the gap is a separator or text.
                                self.cursor = self.buffer.len();
                            }
                            self.state = ScanState::Gap { has_text };
                            return;
                        }
                    }
                }
                ScanState::Object {
                    mut depth,
                    mut in_string,
                    mut escaped,
                } => {
                    let mut close = None;
                    for (offset, ch) in self.buffer[self.cursor..].char_indices() {
                        if in_string {
                            if escaped {
                                escaped = false;
                            } else if ch == '\\' {
                                escaped = true;
                            } else if ch == '"' {
                                in_string = false;
                            }
                            continue;
                        }
                        match ch {
                            '"' => in_string = true,
                            '{' => depth += 1,
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    close = Some(self.cursor + offset + 1);
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }

                    match close {
                        Some(end) => {
                            let raw: String = self.buffer.drain(..end).collect();
                            out.push(parse_object(raw));
                            self.cursor = 0;
                            self.state = ScanState::default();
                        }
                        None => {
                            self.cursor = self.buffer.len();
                            self.state = ScanState::Object {
                                depth,
                                in_string,
                                escaped,
                            };
                            return;
                        }
                    }
                }
            }
        }
    }
}

fn contains_text(segment: &str) -> bool {
    segment.chars().any(|ch| !ch.is_whitespace())
}

fn parse_object(raw: String) -> Frame {
    match serde_json::from_str::<Value>(&raw) {
        Ok(value) if value.is_object() => Frame::Json(value),
        Ok(_) => {
            debug!(bytes = raw.len(), "Non-object JSON frame kept as text");
            Frame::Text(raw)
        }
        Err(err) => {
            debug!(bytes = raw.len(), error = %err, "Malformed frame kept as text");
            Frame::Text(raw)
        }
    }
}

/// Turns response-body chunks into [`Decoded`] items.
///
/// Chunk boundaries may fall anywhere: inside a UTF-8 sequence, inside a JSON
/// object, or inside a `data:` marker. Nothing is emitted until it is
/// complete, so the concatenated output never depends on how the body was
/// split.
#[derive(Debug)]
pub struct FrameDecoder {
    utf8: Utf8Decoder,
    dialect: Dialect,
    /// Undecided prefix, or unterminated event text.
    pending: String,
    /// Raw event-framed text seen before the first `data:` payload. A body
    /// that never produces one is released as text at the end.
    unclaimed: Option<String>,
    carver: ObjectCarver,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            utf8: Utf8Decoder::new(),
            dialect: Dialect::Undetermined,
            pending: String::new(),
            unclaimed: None,
            carver: ObjectCarver::new(),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<Decoded> {
        let text = self.utf8.push(chunk);
        let mut out = Vec::new();
        self.feed(&text, false, &mut out);
        out
    }

    /// Flush retained fragments at end of stream.
    pub fn finish(&mut self) -> Vec<Decoded> {
        let text = self.utf8.finish();
        let mut out = Vec::new();
        self.feed(&text, true, &mut out);
        out
    }

    pub fn is_event_framed(&self) -> bool {
        self.dialect == Dialect::EventFramed
    }

    fn feed(&mut self, text: &str, at_end: bool, out: &mut Vec<Decoded>) {
        let text = text.replace('\r', "");

        if self.dialect == Dialect::Undetermined {
            self.pending.push_str(&text);
            match detect_dialect(&self.pending, at_end) {
                Dialect::Undetermined => return,
                Dialect::EventFramed => {
                    debug!("Response body is event-framed");
                    self.dialect = Dialect::EventFramed;
                    self.unclaimed = Some(self.pending.clone());
                    self.drain_events(at_end, out);
                }
                Dialect::Concatenated => {
                    debug!("Response body is a concatenated object stream");
                    self.dialect = Dialect::Concatenated;
                    let undecided = std::mem::take(&mut self.pending);
                    self.carve(&undecided, at_end, out);
                }
            }
            return;
        }

        match self.dialect {
            Dialect::EventFramed => {
                if let Some(raw) = self.unclaimed.as_mut() {
                    raw.push_str(&text);
                }
                self.pending.push_str(&text);
                self.drain_events(at_end, out);
            }
            _ => self.carve(&text, at_end, out),
        }
    }

    fn carve(&mut self, text: &str, at_end: bool, out: &mut Vec<Decoded>) {
        let mut frames = Vec::new();
        self.carver.push(text, &mut frames);
        if at_end {
            self.carver.finish(&mut frames);
        }
        out.extend(frames.into_iter().map(Decoded::Frame));
    }

    fn drain_events(&mut self, at_end: bool, out: &mut Vec<Decoded>) {
        while let Some(end) = memmem::find(self.pending.as_bytes(), EVENT_SEPARATOR) {
            let event: String = self.pending.drain(..end + EVENT_SEPARATOR.len()).collect();
            if decode_event(&event[..end], out) {
                self.unclaimed = None;
            }
        }

        if at_end && !self.pending.trim().is_empty() {
            let event = std::mem::take(&mut self.pending);
            if decode_event(&event, out) {
                self.unclaimed = None;
            }
        }
        if at_end {
            self.pending.clear();
            if let Some(raw) = self.unclaimed.take().filter(|raw| !raw.trim().is_empty()) {
                debug!("Event-framed body carried no data payload; keeping it as text");
                out.push(Decoded::Frame(Frame::Text(raw)));
            }
        }
    }
}

fn detect_dialect(buffered: &str, at_end: bool) -> Dialect {
    let trimmed = buffered.trim_start();
    if trimmed.is_empty() {
        return if at_end {
            Dialect::Concatenated
        } else {
            Dialect::Undetermined
        };
    }

    let (first_line, line_complete) = match trimmed.find('\n') {
        Some(pos) => (&trimmed[..pos], true),
        None => (trimmed, false),
    };

    if EVENT_FIELDS
        .iter()
        .any(|field| first_line.starts_with(field))
    {
        return Dialect::EventFramed;
    }

    let could_still_be_field = !line_complete
        && !at_end
        && EVENT_FIELDS.iter().any(|field| field.starts_with(first_line));
    if could_still_be_field {
        Dialect::Undetermined
    } else {
        Dialect::Concatenated
    }
}

/// Returns whether the event carried a `data:` payload.
fn decode_event(event: &str, out: &mut Vec<Decoded>) -> bool {
    let payload_lines: Vec<&str> = event
        .split('\n')
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect();

    if payload_lines.is_empty() {
        return false;
    }

    let payload = payload_lines.join("\n");
    if payload == DONE_SENTINEL {
        out.push(Decoded::Done);
        return true;
    }

    out.extend(
        ObjectCarver::carve_complete(&payload)
            .into_iter()
            .map(Decoded::Frame),
    );
    true
}
