use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{anyhow, Result};
use btleplug::api::{
    Central, CentralEvent, Characteristic as GattCharacteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::parse::{decode_battery_level, decode_control_response, decode_notification};
use crate::protocol::{
    encode_command, Characteristic, ControlCommand, MeasurementSensor,
    BATTERY_LEVEL_CHARACTERISTIC, HEART_RATE_MEASUREMENT_CHARACTERISTIC,
    PMD_CONTROL_POINT_CHARACTERISTIC, PMD_DATA_CHARACTERISTIC,
};
use crate::types::{ControlPointReply, PolarEvent};

// ── PolarDevice ───────────────────────────────────────────────────────────────

/// A Polar strap discovered during a BLE scan.
///
/// Returned by [`PolarClient::scan_all`]; pass to [`PolarClient::connect_to`].
#[derive(Clone, Debug)]
pub struct PolarDevice {
    /// Advertised name, `"Polar H10 <serial>"`.
    pub name: String,
    /// Platform BLE identifier (UUID on macOS / Windows, MAC address on Linux).
    pub id: String,
    pub(crate) peripheral: Peripheral,
    /// Adapter that discovered the device, reused for the disconnect watcher.
    pub(crate) adapter: Adapter,
}

// ── PolarClientConfig ─────────────────────────────────────────────────────────

/// Configuration for [`PolarClient`].
#[derive(Debug, Clone)]
pub struct PolarClientConfig {
    /// Match devices whose advertised name starts with this string.
    ///
    /// Straps advertise as `"Polar H10 <serial>"`; append the serial to pick
    /// one strap among several. Default: `"Polar H10"`.
    pub name_prefix: String,
    /// BLE scan duration in seconds before giving up. Default: `15`.
    pub scan_timeout_secs: u64,
    /// Capacity of the event channel. Default: `256`.
    ///
    /// Values below [`MIN_EVENT_BUFFER`] are raised to it: the connection
    /// events queued before the receiver is handed out must all fit.
    pub event_buffer: usize,
}

/// Smallest event channel the client will create. Covers `Connected`, the
/// feature report and the battery level sent during setup, plus one slot.
pub const MIN_EVENT_BUFFER: usize = 4;

impl PolarClientConfig {
    /// Event channel capacity actually used, `event_buffer` clamped to
    /// [`MIN_EVENT_BUFFER`].
    pub fn channel_capacity(&self) -> usize {
        self.event_buffer.max(MIN_EVENT_BUFFER)
    }
}

impl Default for PolarClientConfig {
    fn default() -> Self {
        Self {
            name_prefix: "Polar H10".into(),
            scan_timeout_secs: 15,
            event_buffer: 256,
        }
    }
}

// ── PolarClient ───────────────────────────────────────────────────────────────

/// BLE client for the Polar H10.
///
/// Scans, connects, subscribes to Heart Rate Measurement and both PMD
/// characteristics, and turns every notification into a [`PolarEvent`] via
/// [`crate::parse::decode_notification`].  Streams are started and stopped
/// through the returned [`PolarHandle`].
pub struct PolarClient {
    config: PolarClientConfig,
}

impl PolarClient {
    pub fn new(config: PolarClientConfig) -> Self {
        Self { config }
    }

    async fn first_adapter() -> Result<Adapter> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;

        // CoreBluetooth ignores scan requests until the central reaches
        // PoweredOn, which takes a moment after launch.
        #[cfg(target_os = "macos")]
        {
            use btleplug::api::CentralState;

            let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
            loop {
                match adapter.adapter_state().await {
                    Ok(CentralState::PoweredOn) => break,
                    Ok(state) if tokio::time::Instant::now() >= deadline => {
                        warn!("macOS: adapter still {state:?} after 3 s, proceeding anyway");
                        break;
                    }
                    Ok(state) => debug!("macOS: adapter state = {state:?}, waiting"),
                    Err(e) => {
                        warn!("macOS: adapter_state() error: {e}");
                        break;
                    }
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            tokio::time::sleep(Duration::from_millis(300)).await;
        }

        Ok(adapter)
    }

    // ── Public: scan ─────────────────────────────────────────────────────────

    /// Scan for `scan_timeout_secs` and return every matching strap in range.
    pub async fn scan_all(&self) -> Result<Vec<PolarDevice>> {
        let adapter = Self::first_adapter().await?;

        info!("scan_all: scanning for {} s", self.config.scan_timeout_secs);
        adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(Duration::from_secs(self.config.scan_timeout_secs)).await;
        adapter.stop_scan().await.ok();

        let mut found = vec![];
        for p in adapter.peripherals().await? {
            if let Ok(Some(props)) = p.properties().await {
                if let Some(name) = props.local_name {
                    if name.starts_with(&self.config.name_prefix) {
                        let id = p.id().to_string();
                        info!("scan_all: found {name}  id={id}");
                        found.push(PolarDevice {
                            name,
                            id,
                            peripheral: p,
                            adapter: adapter.clone(),
                        });
                    }
                }
            }
        }
        info!("scan_all: {} device(s) found", found.len());
        Ok(found)
    }

    // ── Public: connect ──────────────────────────────────────────────────────

    /// Connect to a device returned by [`PolarClient::scan_all`].
    pub async fn connect_to(
        &self,
        device: PolarDevice,
    ) -> Result<(mpsc::Receiver<PolarEvent>, PolarHandle)> {
        self.setup_peripheral(device.peripheral, device.name, device.adapter)
            .await
    }

    /// Connect to the first strap whose name matches the configured prefix.
    pub async fn connect(&self) -> Result<(mpsc::Receiver<PolarEvent>, PolarHandle)> {
        let adapter = Self::first_adapter().await?;

        info!(
            "Scanning for '{}' (timeout: {} s)",
            self.config.name_prefix, self.config.scan_timeout_secs
        );
        adapter.start_scan(ScanFilter::default()).await?;
        let peripheral = self.find_first(&adapter).await;
        adapter.stop_scan().await.ok();
        let peripheral = peripheral?;

        let props = peripheral.properties().await?.unwrap_or_default();
        let device_name = props.local_name.unwrap_or_else(|| "Unknown".into());
        info!("Found device: {device_name}");

        self.setup_peripheral(peripheral, device_name, adapter).await
    }

    // ── Private ──────────────────────────────────────────────────────────────

    async fn setup_peripheral(
        &self,
        peripheral: Peripheral,
        device_name: String,
        adapter: Adapter,
    ) -> Result<(mpsc::Receiver<PolarEvent>, PolarHandle)> {
        // BlueZ can block forever in Device1.Connect when the strap is out of
        // range or not being worn.
        tokio::time::timeout(Duration::from_secs(10), peripheral.connect())
            .await
            .map_err(|_| anyhow!("BLE connect() timed out after 10 s"))??;

        // BlueZ reports the link before its GATT cache is populated.
        #[cfg(target_os = "linux")]
        tokio::time::sleep(Duration::from_millis(600)).await;

        tokio::time::timeout(Duration::from_secs(15), peripheral.discover_services())
            .await
            .map_err(|_| anyhow!("discover_services() timed out after 15 s"))??;
        info!("Connected and services discovered: {device_name}");

        let chars: BTreeSet<GattCharacteristic> = peripheral.characteristics();
        let find_char = |uuid: Uuid| -> Result<GattCharacteristic> {
            chars
                .iter()
                .find(|c| c.uuid == uuid)
                .cloned()
                .ok_or_else(|| anyhow!("Characteristic {uuid} not found"))
        };

        let hr_char = find_char(HEART_RATE_MEASUREMENT_CHARACTERISTIC)?;
        let control_char = find_char(PMD_CONTROL_POINT_CHARACTERISTIC)?;
        let data_char = find_char(PMD_DATA_CHARACTERISTIC)?;
        let battery_char = match find_char(BATTERY_LEVEL_CHARACTERISTIC) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("{e}; battery reads disabled");
                None
            }
        };

        for c in [&hr_char, &control_char, &data_char] {
            peripheral.subscribe(c).await?;
        }

        let (tx, rx) = mpsc::channel::<PolarEvent>(self.config.channel_capacity());
        let _ = tx.send(PolarEvent::Connected(device_name.clone())).await;

        let handle = PolarHandle {
            peripheral: peripheral.clone(),
            control_char,
            battery_char,
        };

        // A plain read of the control point is the feature report.
        match handle.read_features().await {
            Ok(reply) => {
                info!("{device_name}: {reply:?}");
                let _ = tx.send(PolarEvent::Control(reply)).await;
            }
            Err(e) => warn!("{device_name}: could not read PMD features: {e}"),
        }
        if handle.battery_char.is_some() {
            match handle.read_battery().await {
                Ok(level) => {
                    let _ = tx.send(PolarEvent::Battery(level)).await;
                }
                Err(e) => warn!("{device_name}: could not read battery level: {e}"),
            }
        }

        // ── Disconnect watcher ──────────────────────────────────────────────
        let disconnect_tx = tx.clone();
        let peripheral_id = peripheral.id();
        tokio::spawn(async move {
            match adapter.events().await {
                Ok(mut events) => {
                    while let Some(event) = events.next().await {
                        if let CentralEvent::DeviceDisconnected(id) = event {
                            if id == peripheral_id {
                                info!("Disconnect watcher: device {id:?} disconnected.");
                                let _ = disconnect_tx.send(PolarEvent::Disconnected).await;
                                break;
                            }
                        }
                    }
                }
                Err(e) => warn!("Disconnect watcher: could not subscribe to adapter events: {e}"),
            }
        });

        // ── Notification dispatch ───────────────────────────────────────────
        tokio::spawn(async move {
            let mut notifications = match peripheral.notifications().await {
                Ok(n) => n,
                Err(e) => {
                    warn!("could not get notifications stream: {e}");
                    return;
                }
            };
            info!("notification stream subscribed, waiting for data");
            let mut notif_count: u64 = 0;
            let mut dropped: u64 = 0;

            while let Some(notif) = notifications.next().await {
                notif_count += 1;
                let Some(characteristic) = Characteristic::from_uuid(notif.uuid) else {
                    debug!("Unknown notification from {}", notif.uuid);
                    continue;
                };
                if notif_count <= 5 || notif_count % 500 == 0 {
                    debug!(
                        "notif #{notif_count} {characteristic:?} len={} raw={:02x?}",
                        notif.value.len(),
                        &notif.value[..notif.value.len().min(32)]
                    );
                }

                match decode_notification(characteristic, &notif.value) {
                    Ok(n) => {
                        if tx.send(n.into()).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        dropped += 1;
                        warn!(
                            "dropping {characteristic:?} notification ({e}), {dropped} dropped so far: {:02x?}",
                            notif.value
                        );
                    }
                }
            }

            info!("notification stream ended, device disconnected.");
            let _ = tx.send(PolarEvent::Disconnected).await;
        });

        Ok((rx, handle))
    }

    /// Poll until the first matching peripheral appears or the timeout expires.
    async fn find_first(&self, adapter: &Adapter) -> Result<Peripheral> {
        use tokio::time::{sleep, timeout};

        let prefix = self.config.name_prefix.as_str();
        let timeout_secs = self.config.scan_timeout_secs;
        timeout(Duration::from_secs(timeout_secs), async {
            loop {
                for p in adapter.peripherals().await.unwrap_or_default() {
                    if let Ok(Some(props)) = p.properties().await {
                        if props.local_name.as_deref().is_some_and(|n| n.starts_with(prefix)) {
                            return p;
                        }
                    }
                }
                sleep(Duration::from_millis(250)).await;
            }
        })
        .await
        .map_err(|_| anyhow!("Timed out scanning for '{prefix}' after {timeout_secs} s"))
    }
}

// ── PolarHandle ───────────────────────────────────────────────────────────────

/// Command side of an active connection.
///
/// Command results arrive asynchronously as [`PolarEvent::Control`] on the
/// event channel; the methods here only report whether the write succeeded.
pub struct PolarHandle {
    peripheral: Peripheral,
    control_char: GattCharacteristic,
    battery_char: Option<GattCharacteristic>,
}

impl PolarHandle {
    /// Write one control-point command.
    pub async fn send_command(&self, command: ControlCommand, sensor: MeasurementSensor) -> Result<()> {
        let payload = encode_command(command, sensor)?;
        debug!("PMD write {command:?} {sensor:?}: {payload:02x?}");
        self.peripheral
            .write(&self.control_char, &payload, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    /// Start streaming ECG (130 Hz, 14-bit) or ACC (200 Hz, 16-bit, 8 G).
    pub async fn start(&self, sensor: MeasurementSensor) -> Result<()> {
        self.send_command(ControlCommand::RequestMeasurementStart, sensor)
            .await
    }

    pub async fn stop(&self, sensor: MeasurementSensor) -> Result<()> {
        self.send_command(ControlCommand::StopMeasurement, sensor)
            .await
    }

    /// Ask the strap which settings it supports for `sensor`; the answer
    /// arrives as a [`PolarEvent::Control`] carrying
    /// [`crate::types::StreamSettings`].
    pub async fn request_settings(&self, sensor: MeasurementSensor) -> Result<()> {
        self.send_command(ControlCommand::GetMeasurementSettings, sensor)
            .await
    }

    /// Read the battery level in percent.
    pub async fn read_battery(&self) -> Result<u8> {
        let c = self
            .battery_char
            .as_ref()
            .ok_or_else(|| anyhow!("Battery Level characteristic not available"))?;
        let raw = self.peripheral.read(c).await?;
        Ok(decode_battery_level(&raw)?)
    }

    /// Read the PMD control point, which answers with the feature report.
    pub async fn read_features(&self) -> Result<ControlPointReply> {
        let raw = self.peripheral.read(&self.control_char).await?;
        debug!("PMD control point read: {raw:02x?}");
        Ok(decode_control_response(&raw)?)
    }

    pub async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PolarClientConfig::default();
        assert_eq!(config.name_prefix, "Polar H10");
        assert_eq!(config.channel_capacity(), 256);
    }

    #[test]
    fn small_event_buffers_are_raised_to_fit_setup_events() {
        for event_buffer in [0, 1, 2, 3] {
            let config = PolarClientConfig { event_buffer, ..Default::default() };
            assert_eq!(config.channel_capacity(), MIN_EVENT_BUFFER);
        }
        let config = PolarClientConfig { event_buffer: 9, ..Default::default() };
        assert_eq!(config.channel_capacity(), 9);
    }

    #[tokio::test]
    async fn setup_events_fit_before_receiver_is_polled() {
        let config = PolarClientConfig { event_buffer: 1, ..Default::default() };
        let (tx, mut rx) = mpsc::channel::<PolarEvent>(config.channel_capacity());
        // Connected, feature report, battery: none may block.
        for event in [
            PolarEvent::Connected("Polar H10 1A2B3C4D".into()),
            PolarEvent::Control(ControlPointReply::Features(Default::default())),
            PolarEvent::Battery(80),
        ] {
            tx.try_send(event).unwrap();
        }
        assert!(matches!(rx.recv().await, Some(PolarEvent::Connected(_))));
    }
}
