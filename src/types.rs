use std::fmt;

use serde::Serialize;

use crate::protocol::{ControlCommand, ControlStatus, FrameEncoding, MeasurementSensor, SettingType};

/// Measurement types the strap reports as available (PMD feature read).
///
/// Decoded from the capability bitmask: bit 0 = ECG, bit 1 = PPG,
/// bit 2 = ACC, bit 3 = PPI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SupportedMeasurements {
    pub ecg: bool,
    pub ppg: bool,
    pub acc: bool,
    pub ppi: bool,
}

impl SupportedMeasurements {
    pub fn from_bitmask(mask: u8) -> Self {
        Self {
            ecg: mask & 0x01 != 0,
            ppg: mask & 0x02 != 0,
            acc: mask & 0x04 != 0,
            ppi: mask & 0x08 != 0,
        }
    }
}

/// One setting echoed in a GET_SETTINGS reply, with every candidate value
/// the strap offers for it, in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingGroup {
    pub setting: SettingType,
    pub values: Vec<u16>,
}

/// Stream settings echoed by the strap, in wire order.
///
/// ECG replies carry SAMPLE_RATE and RESOLUTION; ACC replies add RANGE.
/// Other sensors echo nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamSettings {
    pub groups: Vec<SettingGroup>,
}

impl StreamSettings {
    /// Values offered for `setting`, if the strap echoed it.
    pub fn get(&self, setting: SettingType) -> Option<&[u16]> {
        self.groups
            .iter()
            .find(|g| g.setting == setting)
            .map(|g| g.values.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl fmt::Display for StreamSettings {
    /// One line per setting, e.g. `SAMPLE_RATE: 130Hz`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, group) in self.groups.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}:", group.setting.label())?;
            for v in &group.values {
                write!(f, " {v}{}", group.setting.unit())?;
            }
        }
        Ok(())
    }
}

/// Acknowledgement of a command written to the PMD control point.
///
/// `settings`, `more`, and `parameters` are only populated when `status` is
/// [`ControlStatus::Success`]; a rejection carries just the echoed bytes and
/// the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    /// Echoed command, `None` when the strap rejected an unknown op code.
    pub op_code: Option<ControlCommand>,
    /// Echoed sensor, `None` when the strap rejected an unknown sensor.
    pub sensor: Option<MeasurementSensor>,
    pub raw_op_code: u8,
    pub raw_sensor: u8,
    pub status: ControlStatus,
    /// `Some` for a successful GET_SETTINGS reply that carries settings,
    /// `None` otherwise.
    pub settings: Option<StreamSettings>,
    /// The strap has more reply data to send.
    pub more: bool,
    /// Bytes after the parsed region, copied verbatim.
    pub parameters: Vec<u8>,
}

/// A decoded PMD control-point message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ControlPointReply {
    Features(SupportedMeasurements),
    CommandResult(CommandResult),
}

/// Sensor-contact state from Heart Rate Measurement flag bits 1–2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SensorContact {
    #[default]
    NotSupported,
    NotDetected,
    Detected,
}

impl SensorContact {
    pub fn from_flags(flags: u8) -> Self {
        match (flags >> 1) & 0b11 {
            0b10 => SensorContact::NotDetected,
            0b11 => SensorContact::Detected,
            _ => SensorContact::NotSupported,
        }
    }
}

/// One Heart Rate Measurement notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeartRateSample {
    /// Beats per minute.
    pub heart_rate_bpm: u16,
    pub sensor_contact: SensorContact,
    /// Cumulative energy expended in kJ, when the strap includes it.
    pub energy_expended_kj: Option<u16>,
    /// RR intervals in milliseconds, oldest first.
    pub rr_intervals_ms: Vec<f32>,
}

/// A PMD ECG frame: single-channel samples in µV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EcgFrame {
    /// Sensor timestamp of the frame, in nanoseconds.
    pub timestamp_ns: u64,
    pub samples_uv: Vec<i32>,
}

/// A single three-axis accelerometer sample in raw sensor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccSample {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// A PMD accelerometer frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccFrame {
    /// Sensor timestamp of the frame, in nanoseconds.
    pub timestamp_ns: u64,
    pub encoding: FrameEncoding,
    pub samples: Vec<AccSample>,
}

/// Any frame from the PMD data characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DataFrame {
    Ecg(EcgFrame),
    Acc(AccFrame),
}

impl DataFrame {
    pub fn sensor(&self) -> MeasurementSensor {
        match self {
            DataFrame::Ecg(_) => MeasurementSensor::Ecg,
            DataFrame::Acc(_) => MeasurementSensor::Acc,
        }
    }

    pub fn timestamp_ns(&self) -> u64 {
        match self {
            DataFrame::Ecg(f) => f.timestamp_ns,
            DataFrame::Acc(f) => f.timestamp_ns,
        }
    }

    /// Number of samples in this frame. Sinks use it to size output chunks.
    pub fn sample_count(&self) -> usize {
        match self {
            DataFrame::Ecg(f) => f.samples_uv.len(),
            DataFrame::Acc(f) => f.samples.len(),
        }
    }
}

/// A decoded buffer from any of the four characteristics the crate handles.
///
/// Produced by [`crate::parse::decode_notification`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Notification {
    /// Battery level in percent.
    Battery(u8),
    HeartRate(HeartRateSample),
    ControlPoint(ControlPointReply),
    Data(DataFrame),
}

/// Events emitted by [`crate::polar_client::PolarClient`].
///
/// Consumers receive these through the `mpsc::Receiver` returned by
/// [`crate::polar_client::PolarClient::connect`] or
/// [`crate::polar_client::PolarClient::connect_to`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PolarEvent {
    /// GATT services discovered and notifications subscribed.
    /// Carries the advertised device name (e.g. `"Polar H10 1A2B3C4D"`).
    Connected(String),
    /// Battery level in percent.
    Battery(u8),
    /// Heart rate and RR intervals (~1 Hz).
    HeartRate(HeartRateSample),
    /// Feature report or command acknowledgement from the PMD control point.
    Control(ControlPointReply),
    /// ECG frame (130 Hz once started).
    Ecg(EcgFrame),
    /// Accelerometer frame (200 Hz once started).
    Acc(AccFrame),
    /// The BLE link was lost. No further events follow.
    Disconnected,
}

impl From<Notification> for PolarEvent {
    fn from(n: Notification) -> Self {
        match n {
            Notification::Battery(level) => PolarEvent::Battery(level),
            Notification::HeartRate(hr) => PolarEvent::HeartRate(hr),
            Notification::ControlPoint(reply) => PolarEvent::Control(reply),
            Notification::Data(DataFrame::Ecg(f)) => PolarEvent::Ecg(f),
            Notification::Data(DataFrame::Acc(f)) => PolarEvent::Acc(f),
        }
    }
}

impl PolarEvent {
    /// The decoded record carried by this event, if any.
    /// Link events (`Connected`, `Disconnected`) yield `None`.
    pub fn into_notification(self) -> Option<Notification> {
        match self {
            PolarEvent::Battery(level) => Some(Notification::Battery(level)),
            PolarEvent::HeartRate(hr) => Some(Notification::HeartRate(hr)),
            PolarEvent::Control(reply) => Some(Notification::ControlPoint(reply)),
            PolarEvent::Ecg(f) => Some(Notification::Data(DataFrame::Ecg(f))),
            PolarEvent::Acc(f) => Some(Notification::Data(DataFrame::Acc(f))),
            PolarEvent::Connected(_) | PolarEvent::Disconnected => None,
        }
    }
}
