//! Binary decoders for Polar H10 GATT payloads.
//!
//! All public functions in this module are pure (no I/O, no shared state) and
//! return a fresh record per buffer, so they are safe to call concurrently
//! from any notification callback.
//!
//! | Function | Characteristic | Format |
//! |---|---|---|
//! | [`decode_battery_level`] | Battery Level | u8 percent |
//! | [`decode_heart_rate`] | Heart Rate Measurement | flags, u8/u16 HR, opt. u16 EE, u16 RR × n |
//! | [`decode_control_response`] | PMD control point | feature bitmask or command result |
//! | [`decode_data_frame`] | PMD data | 10-byte header + ECG i24 / ACC 3×{u8,i16,i24} |
//! | [`decode_notification`] | any of the above | dispatch on [`Characteristic`] |
//!
//! Every multi-byte field is little-endian.

use crate::error::{ProtocolError, Result};
use crate::protocol::{
    Characteristic, ControlCommand, ControlResponseCode, ControlStatus, FrameEncoding,
    MeasurementSensor, SettingType, RR_TICKS_PER_SECOND,
};
use crate::reader::{sign_extend_24, ByteReader};
use crate::types::{
    AccFrame, AccSample, CommandResult, ControlPointReply, DataFrame, EcgFrame, HeartRateSample,
    Notification, SensorContact, SettingGroup, StreamSettings, SupportedMeasurements,
};

// ── Battery ───────────────────────────────────────────────────────────────────

/// Decode a Battery Level read. Byte 0 is the charge in percent; anything
/// after it is ignored.
pub fn decode_battery_level(data: &[u8]) -> Result<u8> {
    ByteReader::new(data).read_u8()
}

// ── Heart rate ────────────────────────────────────────────────────────────────

mod hr_flags {
    pub const HR_FORMAT_U16: u8 = 0x01;
    pub const ENERGY_EXPENDED: u8 = 0x08;
    pub const RR_INTERVALS: u8 = 0x10;
}

/// Convert one RR tick count (1/1024 s) to milliseconds.
pub fn rr_ticks_to_ms(ticks: u16) -> f32 {
    ticks as f32 * 1000.0 / RR_TICKS_PER_SECOND
}

/// Decode a Heart Rate Measurement notification.
///
/// ```text
/// byte 0       : flags
///                  bit 0    heart rate is u16 (else u8)
///                  bits 1-2 sensor contact
///                  bit 3    energy expended present
///                  bit 4    RR intervals present
/// byte 1..     : heart rate (u8 or u16)
///                energy expended u16, if flagged
///                RR interval u16 × n until the end, if flagged
/// ```
///
/// Fails with [`ProtocolError::TruncatedBuffer`] on an empty buffer or when a
/// flagged field (including a dangling half RR value) does not fit.
pub fn decode_heart_rate(data: &[u8]) -> Result<HeartRateSample> {
    let mut r = ByteReader::new(data);
    let flags = r.read_u8()?;

    let heart_rate_bpm = if flags & hr_flags::HR_FORMAT_U16 != 0 {
        r.read_u16_le()?
    } else {
        r.read_u8()? as u16
    };

    let energy_expended_kj = if flags & hr_flags::ENERGY_EXPENDED != 0 {
        Some(r.read_u16_le()?)
    } else {
        None
    };

    let mut rr_intervals_ms = Vec::new();
    if flags & hr_flags::RR_INTERVALS != 0 {
        rr_intervals_ms.reserve(r.remaining() / 2);
        while !r.is_empty() {
            rr_intervals_ms.push(rr_ticks_to_ms(r.read_u16_le()?));
        }
    }

    Ok(HeartRateSample {
        heart_rate_bpm,
        sensor_contact: SensorContact::from_flags(flags),
        energy_expended_kj,
        rr_intervals_ms,
    })
}

// ── PMD control point ─────────────────────────────────────────────────────────

/// Decode a PMD control-point reply (indication or read).
///
/// ```text
/// Features:       0F  mask
/// CommandResult:  F0  op_code  sensor  status  [more  [settings…]  [parameters…]]
/// ```
///
/// * A non-SUCCESS status is a valid negative acknowledgement: decoding
///   stops after the status byte and no settings or parameters are reported.
///   The echoed op code and sensor may be bytes outside the known vocabulary
///   (that is what INVALID_OP_CODE and INVALID_MEASUREMENT_TYPE reject), so
///   they are kept raw and only typed when recognised.
/// * For a successful GET_SETTINGS reply with bytes from offset 5 on, setting
///   groups `(type, count, count × u16)` are read there, at most as many as
///   the sensor defines (ECG 2, ACC 3, others none). Bytes after the settings
///   are vendor data and end up in `parameters`. A reply that ends at the
///   `more` byte has `settings: None`.
/// * For other op codes every byte from offset 5 goes to `parameters`.
pub fn decode_control_response(data: &[u8]) -> Result<ControlPointReply> {
    let mut r = ByteReader::new(data);
    match ControlResponseCode::try_from(r.read_u8()?)? {
        ControlResponseCode::FeaturesReadResponse => {
            let mask = r.read_u8()?;
            Ok(ControlPointReply::Features(SupportedMeasurements::from_bitmask(mask)))
        }
        ControlResponseCode::ControlPointResponse => {
            decode_command_result(&mut r).map(ControlPointReply::CommandResult)
        }
    }
}

fn decode_command_result(r: &mut ByteReader<'_>) -> Result<CommandResult> {
    // op_code, sensor, status must all be present before any is interpreted.
    let [raw_op_code, raw_sensor, status] = match r.take(3) {
        Ok(&[op, sensor, status]) => [op, sensor, status],
        _ => {
            return Err(ProtocolError::TruncatedBuffer {
                needed: 3,
                available: r.remaining(),
            })
        }
    };
    let status = ControlStatus::try_from(status)?;

    let mut result = CommandResult {
        op_code: ControlCommand::try_from(raw_op_code).ok(),
        sensor: MeasurementSensor::try_from(raw_sensor).ok(),
        raw_op_code,
        raw_sensor,
        status,
        settings: None,
        more: false,
        parameters: Vec::new(),
    };
    if !status.is_success() {
        return Ok(result);
    }

    // A success echo is only interpretable for a known command and sensor.
    let op_code = ControlCommand::try_from(raw_op_code)?;
    let sensor = MeasurementSensor::try_from(raw_sensor)?;

    if !r.is_empty() {
        result.more = r.read_u8()? != 0;
    }
    if op_code == ControlCommand::GetMeasurementSettings && !r.is_empty() {
        result.settings = Some(decode_stream_settings(r, sensor.settings_group_count())?);
    }
    result.parameters = r.rest().to_vec();
    Ok(result)
}

/// Read up to `groups` setting groups, stopping early at a group boundary if
/// the buffer runs out.
fn decode_stream_settings(r: &mut ByteReader<'_>, groups: usize) -> Result<StreamSettings> {
    let mut settings = StreamSettings::default();
    for _ in 0..groups {
        if r.is_empty() {
            break;
        }
        let setting = SettingType::try_from(r.read_u8()?)?;
        let count = r.read_u8()? as usize;
        let values = (0..count)
            .map(|_| r.read_u16_le())
            .collect::<Result<Vec<u16>>>()?;
        settings.groups.push(SettingGroup { setting, values });
    }
    Ok(settings)
}

// ── PMD data ──────────────────────────────────────────────────────────────────

/// Size of the common PMD data header: sensor, u64 timestamp, frame type.
pub const DATA_HEADER_LEN: usize = 10;

/// Decode a PMD data notification into an ECG or accelerometer frame.
///
/// ```text
/// byte 0      : measurement sensor (ECG = 0x00, ACC = 0x02)
/// bytes 1..=8 : timestamp, u64 ns
/// byte 9      : frame encoding (ACC only; ignored for ECG)
/// bytes 10..  : samples
/// ```
///
/// * ECG: 3 bytes per sample, signed 24-bit µV.
/// * ACC: x, y, z per sample, 1/2/3 bytes per axis for T3/T6/T9.
///
/// A trailing partial sample is padding and is dropped. Sensors other than
/// ECG and ACC fail with [`ProtocolError::UnsupportedSensor`]; the caller
/// decides whether to drop the frame.
pub fn decode_data_frame(data: &[u8]) -> Result<DataFrame> {
    if data.len() < DATA_HEADER_LEN {
        return Err(ProtocolError::TruncatedBuffer {
            needed: DATA_HEADER_LEN,
            available: data.len(),
        });
    }
    let mut r = ByteReader::new(data);
    let sensor_byte = r.read_u8()?;
    let timestamp_ns = r.read_u64_le()?;
    let frame_type = r.read_u8()?;
    let payload = r.rest();

    match MeasurementSensor::try_from(sensor_byte)? {
        MeasurementSensor::Ecg => Ok(DataFrame::Ecg(decode_ecg_samples(timestamp_ns, payload))),
        MeasurementSensor::Acc => {
            let encoding = FrameEncoding::try_from(frame_type)?;
            Ok(DataFrame::Acc(decode_acc_samples(timestamp_ns, encoding, payload)))
        }
        _ => Err(ProtocolError::UnsupportedSensor(sensor_byte)),
    }
}

/// Decode ECG samples (everything after the 10-byte header).
pub fn decode_ecg_samples(timestamp_ns: u64, payload: &[u8]) -> EcgFrame {
    let samples_uv = payload
        .chunks_exact(3)
        .map(|c| sign_extend_24([c[0], c[1], c[2]]))
        .collect();
    EcgFrame {
        timestamp_ns,
        samples_uv,
    }
}

/// Decode accelerometer samples (everything after the 10-byte header).
pub fn decode_acc_samples(timestamp_ns: u64, encoding: FrameEncoding, payload: &[u8]) -> AccFrame {
    let step = encoding.step();
    let axis = |b: &[u8]| -> i32 {
        match encoding {
            FrameEncoding::T3Bytes => b[0] as i32,
            FrameEncoding::T6Bytes => i16::from_le_bytes([b[0], b[1]]) as i32,
            FrameEncoding::T9Bytes => sign_extend_24([b[0], b[1], b[2]]),
        }
    };
    let samples = payload
        .chunks_exact(encoding.sample_width())
        .map(|c| AccSample {
            x: axis(&c[..step]),
            y: axis(&c[step..2 * step]),
            z: axis(&c[2 * step..]),
        })
        .collect();
    AccFrame {
        timestamp_ns,
        encoding,
        samples,
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// Decode a buffer according to the characteristic it arrived on.
pub fn decode_notification(characteristic: Characteristic, data: &[u8]) -> Result<Notification> {
    match characteristic {
        Characteristic::BatteryLevel => decode_battery_level(data).map(Notification::Battery),
        Characteristic::HeartRateMeasurement => {
            decode_heart_rate(data).map(Notification::HeartRate)
        }
        Characteristic::PmdControlPoint => {
            decode_control_response(data).map(Notification::ControlPoint)
        }
        Characteristic::PmdData => decode_data_frame(data).map(Notification::Data),
    }
}
