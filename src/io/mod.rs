// Purpose - the output-sink boundary between the engine and the platform

#[cfg(feature = "rtrb")]
pub mod cpal;
pub mod sink;

pub use sink::{BufferSink, OutputSink, SinkError};
