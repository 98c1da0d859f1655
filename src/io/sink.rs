use std::error::Error;
use std::fmt;

/// Failure writing a block to the output sink.
///
/// The render loop treats any of these as "drop this block and try the next
/// tick"; retry policy belongs to the sink, not the engine.
#[derive(Debug)]
pub enum SinkError {
    /// The sink's backing stream is gone and will not come back.
    Closed,
    /// The platform audio layer reported an error.
    Backend(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Closed => write!(f, "output sink closed"),
            SinkError::Backend(msg) => write!(f, "audio backend error: {msg}"),
        }
    }
}

impl Error for SinkError {}

/// Where finished sample blocks go.
///
/// The engine is the single writer: one `write_block` per render tick, 16-bit
/// signed mono at `sample_rate()`. A sink is allowed to block in
/// `write_block` - that backpressure is what paces the render loop.
pub trait OutputSink: Send {
    fn sample_rate(&self) -> u32;
    fn write_block(&mut self, block: &[i16]) -> Result<(), SinkError>;
}

/// In-memory sink capturing everything written - tests, demos, offline
/// rendering. Never blocks, never fails.
pub struct BufferSink {
    sample_rate: u32,
    samples: Vec<i16>,
}

impl BufferSink {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples: Vec::new(),
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

impl OutputSink for BufferSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write_block(&mut self, block: &[i16]) -> Result<(), SinkError> {
        self.samples.extend_from_slice(block);
        Ok(())
    }
}
