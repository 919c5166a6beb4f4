//! Output side: where decoded samples go once the codec has produced them.
//!
//! The codec never owns an output channel. Anything that republishes samples
//! (a streaming-telemetry outlet, a recorder, a plot) implements
//! [`SampleSink`], and [`publish`] routes each decoded [`Notification`] into
//! it.  ECG and ACC frames arrive as chunks whose length the strap may change
//! from one notification to the next, so sinks that need a fixed chunk size
//! keep a [`ChunkTracker`] and react to [`ChunkChange::Renegotiated`].

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::types::{AccFrame, DataFrame, EcgFrame, Notification};

/// Logical output streams, one per kind of sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    HeartRate,
    RrInterval,
    Ecg,
    Acc,
}

impl StreamKind {
    /// Stream name as advertised to downstream consumers.
    pub fn name(self) -> &'static str {
        match self {
            StreamKind::HeartRate => "HeartRate",
            StreamKind::RrInterval => "RRinterval",
            StreamKind::Ecg => "RawECG",
            StreamKind::Acc => "RawACC",
        }
    }

    /// Values per sample: 3 for the accelerometer axes, 1 otherwise.
    pub fn channel_count(self) -> usize {
        match self {
            StreamKind::Acc => 3,
            _ => 1,
        }
    }
}

/// Receiver for decoded samples.
///
/// Heart rate and RR intervals are pushed one value at a time; ECG and ACC
/// are pushed a whole frame at a time together with the sensor timestamp.
pub trait SampleSink {
    fn push_heart_rate(&mut self, bpm: u16);
    fn push_rr_interval(&mut self, ms: f32);
    fn push_ecg(&mut self, frame: &EcgFrame);
    fn push_acc(&mut self, frame: &AccFrame);

    /// The stream was stopped; release whatever is held for it.
    fn close(&mut self, _stream: StreamKind) {}
}

/// Route one decoded notification into `sink`.
///
/// Battery levels and control-point replies carry no samples and are not
/// forwarded.
pub fn publish<S: SampleSink + ?Sized>(sink: &mut S, notification: &Notification) {
    match notification {
        Notification::HeartRate(hr) => {
            sink.push_heart_rate(hr.heart_rate_bpm);
            for &rr in &hr.rr_intervals_ms {
                sink.push_rr_interval(rr);
            }
        }
        Notification::Data(DataFrame::Ecg(frame)) => sink.push_ecg(frame),
        Notification::Data(DataFrame::Acc(frame)) => sink.push_acc(frame),
        Notification::Battery(_) | Notification::ControlPoint(_) => {}
    }
}

// ── Chunk size tracking ───────────────────────────────────────────────────────

/// What a [`ChunkTracker`] observed for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkChange {
    /// First frame on this stream; the chunk size is now `n`.
    Configured(usize),
    Unchanged,
    /// The strap switched chunk size mid-stream.
    Renegotiated { from: usize, to: usize },
}

/// Per-stream record of the chunk size an output was configured with.
#[derive(Debug, Default, Clone)]
pub struct ChunkTracker {
    sizes: HashMap<StreamKind, usize>,
}

impl ChunkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame of `len` samples on `stream`.
    ///
    /// A renegotiation also becomes the new configured size.
    pub fn observe(&mut self, stream: StreamKind, len: usize) -> ChunkChange {
        match self.sizes.insert(stream, len) {
            None => ChunkChange::Configured(len),
            Some(prev) if prev == len => ChunkChange::Unchanged,
            Some(prev) => ChunkChange::Renegotiated { from: prev, to: len },
        }
    }

    /// Configured chunk size for `stream`, if any frame has been seen.
    pub fn configured(&self, stream: StreamKind) -> Option<usize> {
        self.sizes.get(&stream).copied()
    }

    /// Streams that have a configured chunk size, in a stable order.
    pub fn streams(&self) -> Vec<StreamKind> {
        let mut streams: Vec<StreamKind> = self.sizes.keys().copied().collect();
        streams.sort_by_key(|s| s.name());
        streams
    }

    /// Forget `stream`; the next frame configures it afresh.
    pub fn reset(&mut self, stream: StreamKind) {
        self.sizes.remove(&stream);
    }
}

// ── LogSink ───────────────────────────────────────────────────────────────────

/// A [`SampleSink`] that writes every sample to the `log` facade.
///
/// Heart rate and RR go out at `info`, frames at `debug` (they arrive at
/// 130–200 Hz), chunk-size changes at `warn`.
#[derive(Debug, Default)]
pub struct LogSink {
    chunks: ChunkTracker,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> &ChunkTracker {
        &self.chunks
    }

    /// Close every stream that has received at least one frame. Used on
    /// shutdown.
    pub fn close_all(&mut self) {
        for stream in self.chunks.streams() {
            self.close(stream);
        }
    }

    fn track(&mut self, stream: StreamKind, len: usize) {
        match self.chunks.observe(stream, len) {
            ChunkChange::Configured(n) => {
                info!("{} stream configured with chunk size {n}", stream.name())
            }
            ChunkChange::Renegotiated { from, to } => warn!(
                "{} stream: variable chunk size, configured as {from} and now received {to}",
                stream.name()
            ),
            ChunkChange::Unchanged => {}
        }
    }
}

impl SampleSink for LogSink {
    fn push_heart_rate(&mut self, bpm: u16) {
        info!("[HR]  {bpm} bpm");
    }

    fn push_rr_interval(&mut self, ms: f32) {
        info!("[RR]  {ms:.3} ms");
    }

    fn push_ecg(&mut self, frame: &EcgFrame) {
        self.track(StreamKind::Ecg, frame.samples_uv.len());
        debug!(
            "[ECG] ts={} ns  n={}  first={:?} µV",
            frame.timestamp_ns,
            frame.samples_uv.len(),
            frame.samples_uv.first()
        );
    }

    fn push_acc(&mut self, frame: &AccFrame) {
        self.track(StreamKind::Acc, frame.samples.len());
        if let Some(s) = frame.samples.first() {
            debug!(
                "[ACC] ts={} ns  n={}  x={:+} y={:+} z={:+}",
                frame.timestamp_ns,
                frame.samples.len(),
                s.x,
                s.y,
                s.z
            );
        }
    }

    fn close(&mut self, stream: StreamKind) {
        self.chunks.reset(stream);
        info!("{} stream closed", stream.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameEncoding;
    use crate::types::{AccSample, HeartRateSample, SensorContact};

    #[derive(Default)]
    struct Recorder {
        hr: Vec<u16>,
        rr: Vec<f32>,
        ecg_chunks: Vec<usize>,
        acc_chunks: Vec<usize>,
        closed: Vec<StreamKind>,
    }

    impl SampleSink for Recorder {
        fn push_heart_rate(&mut self, bpm: u16) {
            self.hr.push(bpm);
        }
        fn push_rr_interval(&mut self, ms: f32) {
            self.rr.push(ms);
        }
        fn push_ecg(&mut self, frame: &EcgFrame) {
            self.ecg_chunks.push(frame.samples_uv.len());
        }
        fn push_acc(&mut self, frame: &AccFrame) {
            self.acc_chunks.push(frame.samples.len());
        }
        fn close(&mut self, stream: StreamKind) {
            self.closed.push(stream);
        }
    }

    #[test]
    fn publish_splits_heart_rate_into_streams() {
        let mut sink = Recorder::default();
        let hr = Notification::HeartRate(HeartRateSample {
            heart_rate_bpm: 61,
            sensor_contact: SensorContact::Detected,
            energy_expended_kj: None,
            rr_intervals_ms: vec![980.5, 1001.0],
        });
        publish(&mut sink, &hr);
        assert_eq!(sink.hr, vec![61]);
        assert_eq!(sink.rr, vec![980.5, 1001.0]);
    }

    #[test]
    fn publish_forwards_frames_and_skips_non_samples() {
        let mut sink = Recorder::default();
        publish(
            &mut sink,
            &Notification::Data(DataFrame::Ecg(EcgFrame { timestamp_ns: 1, samples_uv: vec![1, 2, 3] })),
        );
        publish(
            &mut sink,
            &Notification::Data(DataFrame::Acc(AccFrame {
                timestamp_ns: 2,
                encoding: FrameEncoding::T6Bytes,
                samples: vec![AccSample::default(); 2],
            })),
        );
        publish(&mut sink, &Notification::Battery(90));
        assert_eq!(sink.ecg_chunks, vec![3]);
        assert_eq!(sink.acc_chunks, vec![2]);
        assert!(sink.hr.is_empty());

        let dyn_sink: &mut dyn SampleSink = &mut sink;
        dyn_sink.close(StreamKind::Ecg);
        assert_eq!(sink.closed, vec![StreamKind::Ecg]);
    }

    #[test]
    fn chunk_tracker_reports_changes() {
        let mut t = ChunkTracker::new();
        assert_eq!(t.observe(StreamKind::Ecg, 73), ChunkChange::Configured(73));
        assert_eq!(t.observe(StreamKind::Ecg, 73), ChunkChange::Unchanged);
        assert_eq!(t.observe(StreamKind::Acc, 36), ChunkChange::Configured(36));
        assert_eq!(
            t.observe(StreamKind::Ecg, 57),
            ChunkChange::Renegotiated { from: 73, to: 57 }
        );
        assert_eq!(t.configured(StreamKind::Ecg), Some(57));
        t.reset(StreamKind::Ecg);
        assert_eq!(t.configured(StreamKind::Ecg), None);
        assert_eq!(t.observe(StreamKind::Ecg, 57), ChunkChange::Configured(57));
    }

    #[test]
    fn log_sink_tracks_and_resets_chunks() {
        let mut sink = LogSink::new();
        sink.push_ecg(&EcgFrame { timestamp_ns: 0, samples_uv: vec![0; 73] });
        assert_eq!(sink.chunks().configured(StreamKind::Ecg), Some(73));
        sink.close(StreamKind::Ecg);
        assert_eq!(sink.chunks().configured(StreamKind::Ecg), None);
    }

    #[test]
    fn close_all_releases_every_open_stream() {
        let mut sink = LogSink::new();
        sink.push_acc(&AccFrame {
            timestamp_ns: 0,
            encoding: FrameEncoding::T6Bytes,
            samples: vec![AccSample::default(); 36],
        });
        sink.push_ecg(&EcgFrame { timestamp_ns: 0, samples_uv: vec![0; 73] });
        assert_eq!(sink.chunks().streams(), vec![StreamKind::Acc, StreamKind::Ecg]);
        sink.close_all();
        assert!(sink.chunks().streams().is_empty());
    }

    #[test]
    fn stream_metadata() {
        assert_eq!(StreamKind::Acc.channel_count(), 3);
        assert_eq!(StreamKind::RrInterval.channel_count(), 1);
        assert_eq!(StreamKind::Ecg.name(), "RawECG");
    }
}
