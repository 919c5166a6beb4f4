//! # polar-h10
//!
//! Async Rust library and CLI for streaming heart rate, ECG, and
//! accelerometer data from a [Polar H10](https://www.polar.com/en/sensors/h10-heart-rate-sensor)
//! chest strap over Bluetooth Low Energy.
//!
//! ## Channels
//!
//! | Characteristic | Direction | Content |
//! |---|---|---|
//! | Heart Rate Measurement (`0x2A37`) | notify | BPM, energy expended, RR intervals |
//! | Battery Level (`0x2A19`) | read | percent |
//! | PMD control point (`fb005c81-…`) | write / indicate / read | start, stop, settings; feature report |
//! | PMD data (`fb005c82-…`) | notify | ECG (130 Hz, µV) and ACC (200 Hz, 3 axes) frames |
//!
//! ## Quick start
//!
//! ```no_run
//! use polar_h10::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = PolarClient::new(PolarClientConfig::default());
//!     let (mut rx, handle) = client.connect().await?;
//!     handle.start(MeasurementSensor::Ecg).await?;
//!
//!     while let Some(event) = rx.recv().await {
//!         match event {
//!             PolarEvent::HeartRate(hr) => println!("{} bpm {:?}", hr.heart_rate_bpm, hr.rr_intervals_ms),
//!             PolarEvent::Ecg(f) => println!("{} ECG samples", f.samples_uv.len()),
//!             PolarEvent::Disconnected => break,
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The codec is usable without the BLE client: every decoder in [`parse`] is
//! a pure function from a byte slice to a typed record.
//!
//! ```
//! use polar_h10::parse::decode_control_response;
//! use polar_h10::types::ControlPointReply;
//!
//! let reply = decode_control_response(&[0x0F, 0x05]).unwrap();
//! assert!(matches!(reply, ControlPointReply::Features(f) if f.ecg && f.acc));
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`prelude`] | One-line glob import of the most commonly needed items |
//! | [`polar_client`] | BLE scanning, connecting, and the [`polar_client::PolarHandle`] command API |
//! | [`types`] | Decoded records and client events |
//! | [`protocol`] | GATT UUIDs, wire enums, START presets, and the command encoder |
//! | [`parse`] | Byte-to-record decoders for every characteristic |
//! | [`reader`] | Little-endian cursor and 24-bit sign extension |
//! | [`sink`] | [`sink::SampleSink`] output interface and chunk-size tracking |
//! | [`error`] | [`error::ProtocolError`] |

pub mod error;
pub mod parse;
pub mod polar_client;
pub mod protocol;
pub mod reader;
pub mod sink;
pub mod types;

// ── Prelude ───────────────────────────────────────────────────────────────────

/// Convenience re-exports for downstream crates.
pub mod prelude {
    // ── Client ────────────────────────────────────────────────────────────────
    pub use crate::polar_client::{PolarClient, PolarClientConfig, PolarDevice, PolarHandle};

    // ── Codec ─────────────────────────────────────────────────────────────────
    pub use crate::error::ProtocolError;
    pub use crate::parse::{
        decode_battery_level, decode_control_response, decode_data_frame, decode_heart_rate,
        decode_notification,
    };
    pub use crate::protocol::{
        encode_command, Characteristic, ControlCommand, ControlStatus, FrameEncoding,
        MeasurementSensor, SettingType,
    };

    // ── Records and events ────────────────────────────────────────────────────
    pub use crate::types::{
        AccFrame, AccSample, CommandResult, ControlPointReply, DataFrame, EcgFrame,
        HeartRateSample, Notification, PolarEvent, StreamSettings, SupportedMeasurements,
    };

    // ── Output ────────────────────────────────────────────────────────────────
    pub use crate::sink::{publish, LogSink, SampleSink, StreamKind};
}
