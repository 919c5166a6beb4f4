//! Error taxonomy for the PMD / heart-rate codec.
//!
//! Every decoder and the command encoder return [`ProtocolError`] on failure.
//! A negative acknowledgement from the strap (a control-point reply whose
//! status is not [`crate::protocol::ControlStatus::Success`]) is *not* an
//! error: it decodes into a normal [`crate::types::ControlPointReply`].

/// Failure to decode an inbound buffer or to build an outbound command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The buffer ends before a field the format declares.
    #[error("truncated buffer: needed {needed} byte(s), {available} available")]
    TruncatedBuffer { needed: usize, available: usize },

    /// First byte of a control-point reply is neither `0x0F` nor `0xF0`.
    #[error("unknown control-point response code {0:#04x}")]
    UnknownResponseCode(u8),

    /// Sensor byte outside the known measurement types, or a known type this
    /// codec cannot stream (e.g. a START for PPG, a PMD frame for GYRO).
    #[error("unsupported measurement sensor {0:#04x}")]
    UnsupportedSensor(u8),

    /// Control-point op code outside GET_SETTINGS / START / STOP.
    #[error("invalid control-point command {0:#04x}")]
    InvalidCommand(u8),

    /// Status byte outside `0x00..=0x0A`.
    #[error("unknown control-point status {0:#04x}")]
    UnknownStatus(u8),

    /// Setting type byte outside SAMPLE_RATE / RESOLUTION / RANGE.
    #[error("unknown measurement setting type {0:#04x}")]
    UnknownSettingType(u8),

    /// PMD frame-type byte outside `0..=2`.
    #[error("unknown frame encoding {0:#04x}")]
    UnknownFrameEncoding(u8),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
