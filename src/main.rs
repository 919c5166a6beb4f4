use std::io::{self, BufRead};
use std::sync::Arc;

use anyhow::Result;
use log::{error, info};

use polar_h10::polar_client::{PolarClient, PolarClientConfig, PolarHandle};
use polar_h10::protocol::MeasurementSensor;
use polar_h10::sink::{publish, LogSink, SampleSink, StreamKind};
use polar_h10::types::{ControlPointReply, PolarEvent};

/// Requests from the stdin task to the event loop.
enum Control {
    Close(StreamKind),
    Quit,
}

fn parse_sensor(name: &str) -> Option<MeasurementSensor> {
    match name {
        "ecg" => Some(MeasurementSensor::Ecg),
        "acc" => Some(MeasurementSensor::Acc),
        _ => None,
    }
}

fn stream_of(sensor: MeasurementSensor) -> Option<StreamKind> {
    match sensor {
        MeasurementSensor::Ecg => Some(StreamKind::Ecg),
        MeasurementSensor::Acc => Some(StreamKind::Acc),
        _ => None,
    }
}

/// Run one stdin command. Returns the stream to close after a successful stop.
async fn run_command(handle: &PolarHandle, line: &str) -> Result<Option<StreamKind>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["b"] => info!("Battery: {}%", handle.read_battery().await?),
        ["f"] => info!("Features: {:?}", handle.read_features().await?),
        [name] => match parse_sensor(name) {
            Some(sensor) => {
                info!("Starting {sensor:?} stream …");
                handle.start(sensor).await?;
            }
            None => error!("Unknown command '{line}'"),
        },
        ["stop", name] => match parse_sensor(name) {
            Some(sensor) => {
                info!("Stopping {sensor:?} stream …");
                handle.stop(sensor).await?;
                return Ok(stream_of(sensor));
            }
            None => error!("Unknown sensor '{name}' (expected ecg or acc)"),
        },
        ["settings", name] => match parse_sensor(name) {
            Some(sensor) => handle.request_settings(sensor).await?,
            None => error!("Unknown sensor '{name}' (expected ecg or acc)"),
        },
        _ => error!("Unknown command '{line}'"),
    }
    Ok(None)
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ───────────────────────────────────────────────────────────────
    // RUST_LOG=polar_h10=debug shows raw notifications and ECG/ACC frames.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // ── Configuration ─────────────────────────────────────────────────────────
    // `--json` prints every event as one JSON line on stdout instead of logging.
    let json = std::env::args().skip(1).any(|a| a == "--json");
    let config = PolarClientConfig::default();

    // ── Connect ───────────────────────────────────────────────────────────────
    let client = PolarClient::new(config);
    info!("Connecting to Polar H10 …");
    let (mut rx, handle) = client.connect().await?;
    let handle = Arc::new(handle);

    info!("Connected. Commands (type + Enter):");
    info!("  ecg | acc          – start a stream");
    info!("  stop ecg | stop acc");
    info!("  settings ecg | settings acc");
    info!("  b  – read battery");
    info!("  f  – read supported measurements");
    info!("  q  – quit\n");

    // ── Stdin command loop ────────────────────────────────────────────────────
    // Lines are read on an OS thread so the StdinLock never crosses an await.
    let (line_tx, mut line_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(l) => {
                    if line_tx.send(l.trim().to_owned()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    // Stream closures and quit are forwarded to the main loop, which owns the
    // sink and closes it before exiting.
    let (ctl_tx, mut ctl_rx) = tokio::sync::mpsc::unbounded_channel::<Control>();
    let handle_cmd = Arc::clone(&handle);
    tokio::spawn(async move {
        while let Some(line) = line_rx.recv().await {
            if line.is_empty() {
                continue;
            }
            if line == "q" {
                info!("Quit requested.");
                let _ = ctl_tx.send(Control::Quit);
                break;
            }
            match run_command(&handle_cmd, &line).await {
                Ok(Some(stream)) => {
                    let _ = ctl_tx.send(Control::Close(stream));
                }
                Ok(None) => {}
                Err(e) => error!("'{line}' failed: {e}"),
            }
        }
    });

    // ── Main event loop ───────────────────────────────────────────────────────
    let mut sink = LogSink::new();
    loop {
        let event = tokio::select! {
            Some(ctl) = ctl_rx.recv() => match ctl {
                Control::Close(stream) => {
                    sink.close(stream);
                    continue;
                }
                Control::Quit => {
                    handle.disconnect().await.ok();
                    break;
                }
            },
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        if json {
            println!("{}", serde_json::to_string(&event)?);
            if event == PolarEvent::Disconnected {
                break;
            }
            continue;
        }

        match event {
            PolarEvent::Connected(name) => info!("✅  Connected to: {name}"),
            PolarEvent::Disconnected => {
                info!("❌  Disconnected from device.");
                break;
            }
            PolarEvent::Battery(level) => info!("[BATTERY] {level}%"),
            PolarEvent::Control(ControlPointReply::Features(f)) => info!(
                "[PMD] supported: ecg={} ppg={} acc={} ppi={}",
                f.ecg, f.ppg, f.acc, f.ppi
            ),
            PolarEvent::Control(ControlPointReply::CommandResult(r)) => {
                match (r.op_code, r.sensor) {
                    (Some(op), Some(sensor)) => info!("[PMD] {op:?} {sensor:?}: {:?}", r.status),
                    _ => info!(
                        "[PMD] op {:#04x} sensor {:#04x}: {:?}",
                        r.raw_op_code, r.raw_sensor, r.status
                    ),
                }
                if let Some(settings) = r.settings.filter(|s| !s.is_empty()) {
                    for line in settings.to_string().lines() {
                        info!("[PMD]   {line}");
                    }
                }
            }
            other => {
                if let Some(notification) = other.into_notification() {
                    publish(&mut sink, &notification);
                }
            }
        }
    }

    sink.close_all();
    info!("Event loop finished – exiting.");
    Ok(())
}
