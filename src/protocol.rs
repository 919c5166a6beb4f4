//! GATT UUIDs, wire vocabulary, and the PMD control-point command encoder.
//!
//! The Polar Measurement Data (PMD) service lives in the vendor namespace
//! `fb005c8X-02e7-f387-1cad-8acd2d8df0c8`; heart rate and battery use the
//! Bluetooth SIG 16-bit UUIDs on the base `0000XXXX-0000-1000-8000-00805f9b34fb`.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{ProtocolError, Result};

// ── Services ──────────────────────────────────────────────────────────────────

/// Standard Battery service.
pub const BATTERY_SERVICE: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);

/// Standard Heart Rate service.
pub const HEART_RATE_SERVICE: Uuid = Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb);

/// Polar Measurement Data service (ECG / ACC streaming).
pub const PMD_SERVICE: Uuid = Uuid::from_u128(0xfb005c80_02e7_f387_1cad_8acd2d8df0c8);

// ── Characteristics ───────────────────────────────────────────────────────────

/// Battery Level: one byte, percent. Read on demand.
pub const BATTERY_LEVEL_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

/// Heart Rate Measurement: notified about once per second.
/// Decoded by [`crate::parse::decode_heart_rate`].
pub const HEART_RATE_MEASUREMENT_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb);

/// PMD control point.
///
/// The host writes command buffers built by [`encode_command`]; the strap
/// answers with indications decoded by
/// [`crate::parse::decode_control_response`].  A plain read returns the
/// supported-measurements feature report.
pub const PMD_CONTROL_POINT_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0xfb005c81_02e7_f387_1cad_8acd2d8df0c8);

/// PMD data: chunked ECG / ACC frames, decoded by
/// [`crate::parse::decode_data_frame`].
pub const PMD_DATA_CHARACTERISTIC: Uuid = Uuid::from_u128(0xfb005c82_02e7_f387_1cad_8acd2d8df0c8);

/// Identity of the characteristic a notification or read came from.
///
/// This is the only routing key the decoders need; see
/// [`crate::parse::decode_notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Characteristic {
    BatteryLevel,
    HeartRateMeasurement,
    PmdControlPoint,
    PmdData,
}

impl Characteristic {
    pub const ALL: [Characteristic; 4] = [
        Characteristic::BatteryLevel,
        Characteristic::HeartRateMeasurement,
        Characteristic::PmdControlPoint,
        Characteristic::PmdData,
    ];

    pub fn uuid(self) -> Uuid {
        match self {
            Characteristic::BatteryLevel => BATTERY_LEVEL_CHARACTERISTIC,
            Characteristic::HeartRateMeasurement => HEART_RATE_MEASUREMENT_CHARACTERISTIC,
            Characteristic::PmdControlPoint => PMD_CONTROL_POINT_CHARACTERISTIC,
            Characteristic::PmdData => PMD_DATA_CHARACTERISTIC,
        }
    }

    /// Map a GATT UUID back to a known characteristic.
    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.uuid() == uuid)
    }
}

// ── Sampling constants ────────────────────────────────────────────────────────

/// ECG sample rate negotiated by the START preset.
pub const ECG_FREQUENCY: u16 = 130;

/// ECG resolution negotiated by the START preset, in bits.
pub const ECG_RESOLUTION_BITS: u16 = 14;

/// Accelerometer sample rate negotiated by the START preset.
pub const ACC_FREQUENCY: u16 = 200;

/// Accelerometer resolution negotiated by the START preset, in bits.
pub const ACC_RESOLUTION_BITS: u16 = 16;

/// Accelerometer full-scale range negotiated by the START preset, in G.
pub const ACC_RANGE_G: u16 = 8;

/// RR intervals are transmitted in units of 1/1024 s.
pub const RR_TICKS_PER_SECOND: f32 = 1024.0;

// ── Wire vocabulary ───────────────────────────────────────────────────────────

/// Generates a `#[repr(u8)]` enum with a `code()` accessor and a fallible
/// `TryFrom<u8>` that maps unknown bytes to the given error variant.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $err:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[repr(u8)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $code, )+
        }

        impl $name {
            /// Raw wire byte.
            pub fn code(self) -> u8 {
                self as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = ProtocolError;

            fn try_from(byte: u8) -> Result<Self> {
                match byte {
                    $( $code => Ok($name::$variant), )+
                    other => Err(ProtocolError::$err(other)),
                }
            }
        }
    };
}

wire_enum! {
    /// Measurement types known to the PMD service.
    ///
    /// The H10 streams only [`MeasurementSensor::Ecg`] and
    /// [`MeasurementSensor::Acc`]; the rest are recognised so replies that
    /// mention them still decode.
    MeasurementSensor, UnsupportedSensor {
        Ecg = 0x00,
        Ppg = 0x01,
        Acc = 0x02,
        Ppi = 0x03,
        Bioz = 0x04,
        Gyro = 0x05,
        Magnetometer = 0x06,
        Barometer = 0x07,
        Ambient = 0x08,
        Unknown = 0xFF,
    }
}

impl MeasurementSensor {
    /// Number of setting groups the strap echoes in a GET_SETTINGS reply.
    pub fn settings_group_count(self) -> usize {
        match self {
            MeasurementSensor::Ecg => 2,
            MeasurementSensor::Acc => 3,
            _ => 0,
        }
    }

    /// Fixed START parameter block for this sensor, or `None` if this codec
    /// cannot stream it.
    pub fn start_preset(self) -> Option<&'static [u8]> {
        match self {
            MeasurementSensor::Ecg => Some(&ECG_START_PRESET),
            MeasurementSensor::Acc => Some(&ACC_START_PRESET),
            _ => None,
        }
    }
}

wire_enum! {
    /// Commands written to the PMD control point.
    ControlCommand, InvalidCommand {
        GetMeasurementSettings = 0x01,
        RequestMeasurementStart = 0x02,
        StopMeasurement = 0x03,
    }
}

wire_enum! {
    /// First byte of every control-point reply.
    ControlResponseCode, UnknownResponseCode {
        /// Supported-measurements feature report.
        FeaturesReadResponse = 0x0F,
        /// Result of a previously written command.
        ControlPointResponse = 0xF0,
    }
}

wire_enum! {
    /// Outcome carried in a command result.
    ControlStatus, UnknownStatus {
        Success = 0x00,
        InvalidOpCode = 0x01,
        InvalidMeasurementType = 0x02,
        NotSupported = 0x03,
        InvalidLength = 0x04,
        InvalidParameter = 0x05,
        InvalidState = 0x06,
        InvalidResolution = 0x07,
        InvalidSampleRate = 0x08,
        InvalidRange = 0x09,
        InvalidMtu = 0x0A,
    }
}

impl ControlStatus {
    pub fn is_success(self) -> bool {
        self == ControlStatus::Success
    }
}

wire_enum! {
    /// Setting tag used in START parameter blocks and GET_SETTINGS replies.
    SettingType, UnknownSettingType {
        SampleRate = 0x00,
        Resolution = 0x01,
        Range = 0x02,
    }
}

impl SettingType {
    /// Unit suffix used when rendering setting values.
    pub fn unit(self) -> &'static str {
        match self {
            SettingType::SampleRate => "Hz",
            SettingType::Resolution => "-bit",
            SettingType::Range => "G",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SettingType::SampleRate => "SAMPLE_RATE",
            SettingType::Resolution => "RESOLUTION",
            SettingType::Range => "RANGE",
        }
    }
}

wire_enum! {
    /// Per-axis sample width of an accelerometer frame (PMD header byte 9).
    FrameEncoding, UnknownFrameEncoding {
        /// 1 byte per axis, unsigned.
        T3Bytes = 0,
        /// 2 bytes per axis, signed 16-bit little-endian.
        T6Bytes = 1,
        /// 3 bytes per axis, signed 24-bit little-endian.
        T9Bytes = 2,
    }
}

impl FrameEncoding {
    /// Bytes per axis value.
    pub fn step(self) -> usize {
        self.code() as usize + 1
    }

    /// Bytes per three-axis sample.
    pub fn sample_width(self) -> usize {
        self.step() * 3
    }
}

// ── Control commands ──────────────────────────────────────────────────────────

/// START parameters for ECG: 130 Hz, 14-bit.
///
/// ```text
/// 00 01 82 00   SAMPLE_RATE ×1  130
/// 01 01 0E 00   RESOLUTION  ×1  14
/// ```
pub const ECG_START_PRESET: [u8; 8] = [0x00, 0x01, 0x82, 0x00, 0x01, 0x01, 0x0E, 0x00];

/// START parameters for ACC: 200 Hz, 16-bit, ±8 G.
///
/// ```text
/// 00 01 C8 00   SAMPLE_RATE ×1  200
/// 01 01 10 00   RESOLUTION  ×1  16
/// 02 01 08 00   RANGE       ×1  8
/// ```
pub const ACC_START_PRESET: [u8; 12] = [
    0x00, 0x01, 0xC8, 0x00, 0x01, 0x01, 0x10, 0x00, 0x02, 0x01, 0x08, 0x00,
];

/// Build a PMD control-point command buffer.
///
/// ```text
/// byte 0     : command code
/// byte 1     : sensor code
/// bytes 2..  : START only, the sensor's fixed parameter preset
/// ```
///
/// GET_SETTINGS and STOP are always 2 bytes. START is 10 bytes for ECG and
/// 14 for ACC; any other sensor fails with
/// [`ProtocolError::UnsupportedSensor`].
///
/// ```
/// # use polar_h10::protocol::{encode_command, ControlCommand, MeasurementSensor};
/// let stop = encode_command(ControlCommand::StopMeasurement, MeasurementSensor::Acc).unwrap();
/// assert_eq!(stop, [0x03, 0x02]);
/// ```
pub fn encode_command(command: ControlCommand, sensor: MeasurementSensor) -> Result<Vec<u8>> {
    let mut out = vec![command.code(), sensor.code()];
    if command == ControlCommand::RequestMeasurementStart {
        let preset = sensor
            .start_preset()
            .ok_or(ProtocolError::UnsupportedSensor(sensor.code()))?;
        out.extend_from_slice(preset);
    }
    Ok(out)
}

/// Like [`encode_command`] but takes a raw command byte, failing with
/// [`ProtocolError::InvalidCommand`] outside `0x01..=0x03`.
pub fn encode_command_code(command: u8, sensor: MeasurementSensor) -> Result<Vec<u8>> {
    encode_command(ControlCommand::try_from(command)?, sensor)
}
