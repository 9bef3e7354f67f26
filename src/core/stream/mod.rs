//! Response-body decoding: bytes → frames → text deltas.

pub mod delta;
pub mod frame;
pub mod utf8;

pub use delta::{extract_delta, format_api_error, Delta};
pub use frame::{Decoded, Frame, FrameDecoder, ObjectCarver, DONE_SENTINEL};

/// Result of running one body chunk through decoder and extractor.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    /// Non-empty text deltas, in order.
    pub deltas: Vec<String>,
    /// A completion flag or end sentinel was seen.
    pub finished: bool,
    /// First in-band error reported by the server.
    pub error: Option<String>,
}

/// Decoder plus extractor, fed one transport chunk at a time.
///
/// Frames decoded after completion is signalled in the same chunk are still
/// extracted; callers decide whether to keep reading.
#[derive(Debug, Default)]
pub struct DeltaPipeline {
    decoder: FrameDecoder,
}

impl DeltaPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> ChunkOutcome {
        let decoded = self.decoder.push(chunk);
        collect(decoded)
    }

    pub fn finish(&mut self) -> ChunkOutcome {
        let decoded = self.decoder.finish();
        collect(decoded)
    }
}

fn collect(decoded: Vec<Decoded>) -> ChunkOutcome {
    let mut outcome = ChunkOutcome::default();
    for item in decoded {
        match item {
            Decoded::Done => {
                outcome.finished = true;
                break;
            }
            Decoded::Frame(frame) => {
                let delta = extract_delta(&frame);
                if !delta.text.is_empty() {
                    outcome.deltas.push(delta.text);
                }
                if outcome.error.is_none() {
                    outcome.error = delta.error;
                }
                if delta.is_final {
                    outcome.finished = true;
                    break;
                }
            }
        }
    }
    outcome
}
