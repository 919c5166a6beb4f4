//! Known-good byte vectors for every characteristic, exercised through the
//! public API only.

use polar_h10::error::ProtocolError;
use polar_h10::parse::{
    decode_control_response, decode_data_frame, decode_heart_rate, decode_notification,
    DATA_HEADER_LEN,
};
use polar_h10::protocol::{
    encode_command, encode_command_code, Characteristic, ControlCommand, ControlStatus,
    FrameEncoding, MeasurementSensor, SettingType,
};
use polar_h10::reader::sign_extend_24;
use polar_h10::sink::{publish, SampleSink, StreamKind};
use polar_h10::types::{
    AccFrame, AccSample, ControlPointReply, DataFrame, EcgFrame, Notification, PolarEvent,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn data_header(sensor: u8, timestamp_ns: u64, frame_type: u8) -> Vec<u8> {
    let mut out = vec![sensor];
    out.extend_from_slice(&timestamp_ns.to_le_bytes());
    out.push(frame_type);
    out
}

/// Test-side encoder for accelerometer payloads.
fn encode_acc(encoding: FrameEncoding, samples: &[AccSample]) -> Vec<u8> {
    let mut out = data_header(0x02, 42, encoding.code());
    for s in samples {
        for v in [s.x, s.y, s.z] {
            let le = v.to_le_bytes();
            out.extend_from_slice(&le[..encoding.step()]);
        }
    }
    out
}

fn command_result(data: &[u8]) -> polar_h10::types::CommandResult {
    match decode_control_response(data).unwrap() {
        ControlPointReply::CommandResult(r) => r,
        other => panic!("expected command result, got {other:?}"),
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

#[test]
fn command_buffers() {
    assert_eq!(
        encode_command(ControlCommand::RequestMeasurementStart, MeasurementSensor::Ecg).unwrap(),
        [0x02, 0x00, 0x00, 0x01, 0x82, 0x00, 0x01, 0x01, 0x0E, 0x00]
    );
    assert_eq!(
        encode_command(ControlCommand::RequestMeasurementStart, MeasurementSensor::Acc).unwrap(),
        [0x02, 0x02, 0x00, 0x01, 0xC8, 0x00, 0x01, 0x01, 0x10, 0x00, 0x02, 0x01, 0x08, 0x00]
    );
    assert_eq!(
        encode_command(ControlCommand::GetMeasurementSettings, MeasurementSensor::Ecg).unwrap(),
        [0x01, 0x00]
    );
    assert_eq!(
        encode_command(ControlCommand::StopMeasurement, MeasurementSensor::Ecg).unwrap(),
        [0x03, 0x00]
    );
    assert_eq!(
        encode_command(ControlCommand::RequestMeasurementStart, MeasurementSensor::Ppg),
        Err(ProtocolError::UnsupportedSensor(0x01))
    );
    assert_eq!(
        encode_command_code(0x09, MeasurementSensor::Ecg),
        Err(ProtocolError::InvalidCommand(0x09))
    );
}

// ── Control point ─────────────────────────────────────────────────────────────

#[test]
fn feature_report() {
    match decode_control_response(&[0x0F, 0x05]).unwrap() {
        ControlPointReply::Features(f) => {
            assert!(f.ecg && f.acc);
            assert!(!f.ppg && !f.ppi);
        }
        other => panic!("expected features, got {other:?}"),
    }
}

#[test]
fn negative_acknowledgement_is_not_an_error() {
    let r = command_result(&[0xF0, 0x02, 0x00, 0x06]);
    assert_eq!(r.op_code, Some(ControlCommand::RequestMeasurementStart));
    assert_eq!(r.sensor, Some(MeasurementSensor::Ecg));
    assert_eq!(r.status, ControlStatus::InvalidState);
    assert_eq!(r.settings, None);
    assert!(r.parameters.is_empty());
}

#[test]
fn rejections_of_unknown_command_or_sensor_decode() {
    let r = command_result(&[0xF0, 0x07, 0x00, 0x01]);
    assert_eq!((r.op_code, r.raw_op_code), (None, 0x07));
    assert_eq!(r.status, ControlStatus::InvalidOpCode);

    let r = command_result(&[0xF0, 0x02, 0x09, 0x02]);
    assert_eq!((r.sensor, r.raw_sensor), (None, 0x09));
    assert_eq!(r.status, ControlStatus::InvalidMeasurementType);
}

#[test]
fn acc_settings_echo() {
    let reply = [
        0xF0, 0x01, 0x02, 0x00, 0x00, // GET_SETTINGS ACC SUCCESS, more=0
        0x00, 0x04, 0x19, 0x00, 0x32, 0x00, 0x64, 0x00, 0xC8, 0x00, // 25 50 100 200 Hz
        0x01, 0x01, 0x10, 0x00, // 16-bit
        0x02, 0x03, 0x02, 0x00, 0x04, 0x00, 0x08, 0x00, // 2 4 8 G
    ];
    let r = command_result(&reply);
    let settings = r.settings.unwrap();
    assert_eq!(settings.get(SettingType::SampleRate), Some(&[25u16, 50, 100, 200][..]));
    assert_eq!(settings.get(SettingType::Resolution), Some(&[16u16][..]));
    assert_eq!(settings.get(SettingType::Range), Some(&[2u16, 4, 8][..]));
    assert!(r.parameters.is_empty());
}

// ── Heart rate ────────────────────────────────────────────────────────────────

#[test]
fn heart_rate_little_endian_rr() {
    // RR field 00 0A read little-endian is 2560 ticks, i.e. 2500 ms.
    let hr = decode_heart_rate(&[0x10, 0x3C, 0x00, 0x0A]).unwrap();
    assert_eq!(hr.heart_rate_bpm, 60);
    assert_eq!(hr.rr_intervals_ms, vec![2500.0]);
}

// ── Data frames ───────────────────────────────────────────────────────────────

#[test]
fn sign_extension_boundaries() {
    assert_eq!(sign_extend_24([0xFF, 0xFF, 0xFF]), -1);
    assert_eq!(sign_extend_24([0xFF, 0xFF, 0x7F]), 8_388_607);
    assert_eq!(sign_extend_24([0x00, 0x00, 0x80]), -8_388_608);
    assert_eq!(sign_extend_24([0x01, 0x00, 0x00]), 1);
}

#[test]
fn ecg_frame() {
    let mut data = data_header(0x00, 1_000, 0x00);
    data.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0x10, 0x00, 0x00, 0xAB]);
    match decode_data_frame(&data).unwrap() {
        DataFrame::Ecg(EcgFrame { timestamp_ns, samples_uv }) => {
            assert_eq!(timestamp_ns, 1_000);
            assert_eq!(samples_uv, vec![-1, 16]);
        }
        other => panic!("expected ECG, got {other:?}"),
    }
}

#[test]
fn acc_frames_decode_every_encoding() {
    for encoding in [FrameEncoding::T3Bytes, FrameEncoding::T6Bytes, FrameEncoding::T9Bytes] {
        for n in [0usize, 1, 3, 36] {
            let samples: Vec<AccSample> = (0..n as i32)
                .map(|i| match encoding {
                    // T3 axes are unsigned bytes.
                    FrameEncoding::T3Bytes => AccSample { x: i, y: 100 + i, z: 255 - i },
                    FrameEncoding::T6Bytes => AccSample { x: -i * 7, y: 1000 + i, z: i16::MIN as i32 + i },
                    FrameEncoding::T9Bytes => AccSample { x: -8_388_608 + i, y: i * 31, z: 8_388_607 - i },
                })
                .collect();
            let frame = decode_data_frame(&encode_acc(encoding, &samples)).unwrap();
            assert_eq!(
                frame,
                DataFrame::Acc(AccFrame { timestamp_ns: 42, encoding, samples }),
                "{encoding:?} n={n}"
            );
        }
    }
}

#[test]
fn data_frame_errors() {
    assert_eq!(
        decode_data_frame(&[0x00; 9]),
        Err(ProtocolError::TruncatedBuffer { needed: DATA_HEADER_LEN, available: 9 })
    );
    assert_eq!(
        decode_data_frame(&data_header(0x01, 0, 0)),
        Err(ProtocolError::UnsupportedSensor(0x01))
    );
    assert_eq!(
        decode_data_frame(&data_header(0x02, 0, 0x07)),
        Err(ProtocolError::UnknownFrameEncoding(0x07))
    );
}

#[test]
fn every_prefix_decodes_without_panicking() {
    let mut ecg = data_header(0x00, 7, 0x00);
    ecg.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
    let buffers: Vec<(Characteristic, Vec<u8>)> = vec![
        (Characteristic::HeartRateMeasurement, vec![0x19, 0x3C, 0x00, 0x10, 0x00, 0x00, 0x04]),
        (
            Characteristic::PmdControlPoint,
            vec![0xF0, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01, 0x82, 0x00, 0x01, 0x01, 0x0E, 0x00],
        ),
        (Characteristic::PmdData, ecg),
        (Characteristic::PmdData, encode_acc(FrameEncoding::T9Bytes, &[AccSample { x: 1, y: -2, z: 3 }])),
        (Characteristic::BatteryLevel, vec![87]),
    ];
    for (characteristic, data) in buffers {
        assert!(decode_notification(characteristic, &data).is_ok());
        for len in 0..data.len() {
            // Any outcome is fine as long as it is a value, not a panic.
            let _ = decode_notification(characteristic, &data[..len]);
        }
    }
}

// ── Sink ──────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Counts {
    hr: usize,
    rr: usize,
    ecg_samples: usize,
    acc_samples: usize,
    closed: Vec<StreamKind>,
}

impl SampleSink for Counts {
    fn push_heart_rate(&mut self, _bpm: u16) {
        self.hr += 1;
    }
    fn push_rr_interval(&mut self, _ms: f32) {
        self.rr += 1;
    }
    fn push_ecg(&mut self, frame: &EcgFrame) {
        self.ecg_samples += frame.samples_uv.len();
    }
    fn push_acc(&mut self, frame: &AccFrame) {
        self.acc_samples += frame.samples.len();
    }
    fn close(&mut self, stream: StreamKind) {
        self.closed.push(stream);
    }
}

#[test]
fn decoded_events_flow_into_sink() {
    let mut ecg = data_header(0x00, 7, 0x00);
    ecg.extend_from_slice(&[0; 9]);
    let raw = [
        (Characteristic::HeartRateMeasurement, vec![0x10, 0x3C, 0x00, 0x04, 0x00, 0x04]),
        (Characteristic::PmdData, ecg),
        (Characteristic::PmdData, encode_acc(FrameEncoding::T6Bytes, &[AccSample::default(); 4])),
        (Characteristic::PmdControlPoint, vec![0x0F, 0x05]),
        (Characteristic::BatteryLevel, vec![50]),
    ];

    let mut sink = Counts::default();
    for (characteristic, data) in raw {
        let event = PolarEvent::from(decode_notification(characteristic, &data).unwrap());
        let notification: Notification = event.into_notification().unwrap();
        publish(&mut sink, &notification);
    }
    sink.close(StreamKind::Acc);

    assert_eq!(sink.hr, 1);
    assert_eq!(sink.rr, 2);
    assert_eq!(sink.ecg_samples, 3);
    assert_eq!(sink.acc_samples, 4);
    assert_eq!(sink.closed, vec![StreamKind::Acc]);
}
