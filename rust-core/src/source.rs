//! Sample delivery between producers and the classifier.
//!
//! A producer (live sensor adapter or the simulation engine) pushes
//! [`SourceEvent`]s into a [`StreamFeed`]; the consumer drains the matching
//! [`SampleStream`] on its own serialized context. Both halves share a
//! [`CancelFlag`]. Once the flag is raised the stream yields nothing more,
//! even if the producer had already queued samples, so a `stop()` that
//! raises the flag before returning guarantees no further deliveries.
//!
//! That guarantee is strict when `stop()` runs on the consumer's thread. A
//! cancel raised from another thread while `next()` is already returning a
//! sample can still let that one sample through; consumers that must not
//! act on it check [`SampleStream::is_cancelled`] again before processing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use crate::types::AccelerationSample;

/// Something delivered by a sample source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceEvent {
    /// One tick worth of acceleration.
    Sample(AccelerationSample),
    /// The source ran out of samples. Delivered at most once, never after a
    /// cancellation.
    Finished,
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Producer half of a sample stream.
#[derive(Debug)]
pub struct StreamFeed {
    tx: Sender<SourceEvent>,
    cancel: CancelFlag,
}

impl StreamFeed {
    /// Push a sample. Returns false once the stream is cancelled or the
    /// consumer has gone away; the producer should stop then.
    pub fn send(&self, sample: AccelerationSample) -> bool {
        !self.cancel.is_cancelled() && self.tx.send(SourceEvent::Sample(sample)).is_ok()
    }

    /// Signal normal completion. Ignored after cancellation.
    pub fn finish(self) {
        if !self.cancel.is_cancelled() {
            let _ = self.tx.send(SourceEvent::Finished);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Flag shared with the consumer half.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }
}

/// Consumer half of a sample stream.
///
/// A finite, non-restartable sequence: it ends after `Finished`, after
/// cancellation, or when the producer disappears without finishing.
#[derive(Debug)]
pub struct SampleStream {
    rx: Receiver<SourceEvent>,
    cancel: CancelFlag,
    done: bool,
}

impl SampleStream {
    /// Create a connected feed/stream pair.
    pub fn pair() -> (StreamFeed, SampleStream) {
        let (tx, rx) = mpsc::channel();
        let cancel = CancelFlag::new();
        let feed = StreamFeed {
            tx,
            cancel: cancel.clone(),
        };
        let stream = SampleStream {
            rx,
            cancel,
            done: false,
        };
        (feed, stream)
    }

    /// Cancel from the consumer side.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Flag that cancels this stream from another thread.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Only the samples, dropping the completion marker.
    pub fn samples(self) -> impl Iterator<Item = AccelerationSample> {
        self.filter_map(|event| match event {
            SourceEvent::Sample(sample) => Some(sample),
            SourceEvent::Finished => None,
        })
    }
}

impl Iterator for SampleStream {
    type Item = SourceEvent;

    fn next(&mut self) -> Option<SourceEvent> {
        if self.done || self.cancel.is_cancelled() {
            return None;
        }

        match self.rx.recv() {
            // Cancellation may have happened while we were blocked.
            Ok(_) if self.cancel.is_cancelled() => {
                self.done = true;
                None
            }
            Ok(event) => {
                if event == SourceEvent::Finished {
                    self.done = true;
                }
                Some(event)
            }
            Err(_) => {
                self.done = true;
                None
            }
        }
    }
}

/// A producer of acceleration samples with a start/stop lifecycle.
///
/// Only one source may drive a classifier at a time; the monitor enforces
/// this by holding at most one active stream.
pub trait SampleSource {
    /// Begin delivery. Returns `None` if the source is already running or
    /// the underlying sensor is unavailable.
    fn start(&mut self) -> Option<SampleStream>;

    /// Stop delivery. Idempotent; after it returns the stream handed out by
    /// `start` yields nothing more (see the module docs for cross-thread
    /// cancellation).
    fn stop(&mut self);

    /// Whether delivery is in progress.
    fn is_running(&self) -> bool;

    /// Short name for logs.
    fn name(&self) -> &str {
        "sample-source"
    }
}
