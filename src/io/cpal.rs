//! cpal-backed output sink.
//!
//! cpal pulls samples from a callback on its own audio thread, while the
//! engine pushes finished blocks. An rtrb ring buffer bridges the two: the
//! sink side pushes PCM samples and blocks while the ring is full (the
//! backpressure that paces the render loop), and the cpal callback drains
//! the ring, converting to f32 and fanning mono out to every device channel.
//!
//! `cpal::Stream` is not `Send`, so opening the sink yields two halves: a
//! `CpalStream` guard that must stay on the thread that opened it, and a
//! `CpalSink` that can move onto the render thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::warn;
use rtrb::{Producer, RingBuffer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::io::sink::{OutputSink, SinkError};

/// Ring capacity in samples: ~190 ms at 44.1 kHz. Deep enough to ride out
/// scheduling hiccups, shallow enough to keep key-to-ear latency playable.
const RING_CAPACITY: usize = 8192;

/// How long a full-ring write sleeps before trying again.
const BACKPRESSURE_NAP: Duration = Duration::from_micros(500);

/// Keep-alive guard for the platform stream. Dropping it stops playback.
pub struct CpalStream {
    _stream: cpal::Stream,
}

/// The engine-side half: push blocks, block on a full ring.
pub struct CpalSink {
    tx: Producer<i16>,
    sample_rate: u32,
    failed: Arc<AtomicBool>,
}

/// Open the default output device and start its stream.
///
/// The device's own default sample rate is used and reported through
/// `CpalSink::sample_rate` - the engine should be built against it.
pub fn open() -> Result<(CpalStream, CpalSink), SinkError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| SinkError::Backend("no default output device available".into()))?;
    let config = device
        .default_output_config()
        .map_err(|e| SinkError::Backend(e.to_string()))?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;

    let (tx, mut rx) = RingBuffer::<i16>::new(RING_CAPACITY);
    let failed = Arc::new(AtomicBool::new(false));
    let failed_in_callback = failed.clone();

    let stream = device
        .build_output_stream(
            &config.into(),
            move |data: &mut [f32], _| {
                for frame in data.chunks_mut(channels) {
                    // Underrun plays silence rather than stale samples.
                    let sample = rx
                        .pop()
                        .map(|s| s as f32 / i16::MAX as f32)
                        .unwrap_or(0.0);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            move |err| {
                warn!("audio stream error: {err}");
                failed_in_callback.store(true, Ordering::Release);
            },
            None,
        )
        .map_err(|e| SinkError::Backend(e.to_string()))?;

    stream
        .play()
        .map_err(|e| SinkError::Backend(e.to_string()))?;

    Ok((
        CpalStream { _stream: stream },
        CpalSink {
            tx,
            sample_rate,
            failed,
        },
    ))
}

impl OutputSink for CpalSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write_block(&mut self, block: &[i16]) -> Result<(), SinkError> {
        for &sample in block {
            loop {
                if self.failed.load(Ordering::Acquire) {
                    return Err(SinkError::Closed);
                }
                match self.tx.push(sample) {
                    Ok(()) => break,
                    // Ring full: the device hasn't caught up yet.
                    Err(_) => std::thread::sleep(BACKPRESSURE_NAP),
                }
            }
        }
        Ok(())
    }
}
