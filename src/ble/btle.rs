//! [`Transport`] backed by the platform Bluetooth stack through btleplug.
//!
//! The session calls into [`BtleTransport`] while holding the controller
//! lock, so every call just queues a command. A driver task owns the adapter,
//! does the slow async work and reports back over the event channel.

use std::{collections::HashMap, pin::Pin};

use anyhow::{anyhow, Error};
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::{Stream, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use super::{BleEvent, DiscoveredCharacteristic, PeripheralHandle, RgbCharacteristicRef, Transport};

/// Commands waiting for the driver. At 50 colors a second this is over a
/// second of backlog; past that, commands get dropped.
const COMMAND_QUEUE: usize = 64;

type CentralEvents = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

#[derive(Debug)]
enum Command {
    StartScan(String),
    StopScan,
    Connect(String),
    DiscoverServices(String),
    Write {
        peripheral: String,
        characteristic: Uuid,
        payload: [u8; 4],
    },
    Disconnect(String),
}

pub struct BtleTransport {
    commands: mpsc::Sender<Command>,
}

impl BtleTransport {
    /// Grab the first Bluetooth adapter and start the driver task. Results
    /// of every operation get sent to `events`.
    pub async fn init(events: mpsc::Sender<BleEvent>) -> Result<Self, Error> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;

        info!("Using Bluetooth adapter {}", adapter.adapter_info().await?);

        let central_events = adapter.events().await?;
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);

        let driver = Driver {
            adapter,
            events,
            scan_name: None,
            peripherals: HashMap::new(),
            current: None,
            characteristics: Vec::new(),
        };
        tokio::spawn(driver.run(commands_rx, central_events));

        Ok(Self {
            commands: commands_tx,
        })
    }

    fn send(&self, command: Command) {
        match self.commands.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                debug!("BLE command queue full, dropping {:?}", command);
            }
            Err(TrySendError::Closed(_)) => {
                warn!("BLE driver has stopped");
            }
        }
    }
}

impl Transport for BtleTransport {
    fn start_scan(&mut self, device_name: &str) {
        self.send(Command::StartScan(device_name.to_string()));
    }

    fn stop_scan(&mut self) {
        self.send(Command::StopScan);
    }

    fn connect(&mut self, peripheral: &PeripheralHandle) {
        self.send(Command::Connect(peripheral.id.clone()));
    }

    fn discover_services(&mut self, peripheral: &PeripheralHandle) {
        self.send(Command::DiscoverServices(peripheral.id.clone()));
    }

    fn write_without_response(
        &mut self,
        peripheral: &PeripheralHandle,
        characteristic: &RgbCharacteristicRef,
        payload: [u8; 4],
    ) {
        self.send(Command::Write {
            peripheral: peripheral.id.clone(),
            characteristic: characteristic.uuid,
            payload,
        });
    }

    fn disconnect(&mut self, peripheral: &PeripheralHandle) {
        self.send(Command::Disconnect(peripheral.id.clone()));
    }
}

struct Driver {
    adapter: Adapter,
    events: mpsc::Sender<BleEvent>,
    /// Set while scanning, the local name we're looking for
    scan_name: Option<String>,
    peripherals: HashMap<String, Peripheral>,
    /// The peripheral we connected to, if any
    current: Option<String>,
    characteristics: Vec<Characteristic>,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut central: CentralEvents) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                event = central.next() => match event {
                    Some(event) => self.handle_central_event(event).await,
                    None => {
                        error!("Bluetooth adapter event stream ended");
                        break;
                    }
                },
            }
        }

        debug!("BLE driver stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartScan(name) => {
                self.scan_name = Some(name);
                if let Err(e) = self.adapter.start_scan(ScanFilter::default()).await {
                    self.scan_name = None;
                    self.emit(BleEvent::ScanFailed(e.to_string())).await;
                }
            }
            Command::StopScan => {
                self.scan_name = None;
                if let Err(e) = self.adapter.stop_scan().await {
                    warn!("Failed to stop scan: {}", e);
                }
            }
            Command::Connect(id) => {
                let Some(peripheral) = self.peripherals.get(&id).cloned() else {
                    self.emit(BleEvent::ConnectFailed(format!("unknown peripheral {}", id)))
                        .await;
                    return;
                };

                self.current = Some(id);
                match peripheral.connect().await {
                    Ok(()) => self.emit(BleEvent::Connected).await,
                    Err(e) => {
                        self.current = None;
                        self.emit(BleEvent::ConnectFailed(e.to_string())).await;
                    }
                }
            }
            Command::DiscoverServices(id) => {
                let Some(peripheral) = self.peripherals.get(&id).cloned() else {
                    return;
                };

                match peripheral.discover_services().await {
                    Ok(()) => {
                        self.characteristics = peripheral.characteristics().into_iter().collect();
                        let discovered = self
                            .characteristics
                            .iter()
                            .map(|c| DiscoveredCharacteristic {
                                service: c.service_uuid,
                                uuid: c.uuid,
                            })
                            .collect();
                        self.emit(BleEvent::ServicesDiscovered(discovered)).await;
                    }
                    Err(e) => {
                        self.emit(BleEvent::ServiceDiscoveryFailed(e.to_string()))
                            .await;
                    }
                }
            }
            Command::Write {
                peripheral,
                characteristic,
                payload,
            } => {
                let (Some(peripheral), Some(characteristic)) = (
                    self.peripherals.get(&peripheral),
                    self.characteristics.iter().find(|c| c.uuid == characteristic),
                ) else {
                    return;
                };

                // Writes are best effort, a lost one is replaced on the next tick
                if let Err(e) = peripheral
                    .write(characteristic, &payload, WriteType::WithoutResponse)
                    .await
                {
                    debug!("Write failed: {}", e);
                }
            }
            Command::Disconnect(id) => {
                if self.current.as_ref() == Some(&id) {
                    self.current = None;
                    self.characteristics.clear();
                }
                if let Some(peripheral) = self.peripherals.get(&id) {
                    if let Err(e) = peripheral.disconnect().await {
                        warn!("Failed to disconnect: {}", e);
                    }
                }
            }
        }
    }

    async fn handle_central_event(&mut self, event: CentralEvent) {
        match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                let Some(wanted) = self.scan_name.clone() else {
                    return;
                };

                let peripheral = match self.adapter.peripheral(&id).await {
                    Ok(peripheral) => peripheral,
                    Err(e) => {
                        debug!("Lost track of {:?}: {}", id, e);
                        return;
                    }
                };
                let name = match peripheral.properties().await {
                    Ok(properties) => properties.and_then(|p| p.local_name),
                    Err(_) => None,
                };

                if !name_matches(name.as_deref(), &wanted) {
                    return;
                }

                let key = peripheral_key(&id);
                self.peripherals.insert(key.clone(), peripheral);
                // Only the first match is reported
                self.scan_name = None;
                self.emit(BleEvent::DeviceDiscovered(PeripheralHandle { id: key, name }))
                    .await;
            }
            CentralEvent::DeviceDisconnected(id) => {
                let key = peripheral_key(&id);
                if self.current.as_ref() == Some(&key) {
                    self.current = None;
                    self.characteristics.clear();
                    self.emit(BleEvent::Disconnected).await;
                }
            }
            _ => {}
        }
    }

    async fn emit(&self, event: BleEvent) {
        if self.events.send(event).await.is_err() {
            warn!("Nobody is listening for BLE events");
        }
    }
}

fn peripheral_key(id: &PeripheralId) -> String {
    format!("{:?}", id)
}

fn name_matches(local_name: Option<&str>, wanted: &str) -> bool {
    local_name == Some(wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_matches_exactly() {
        assert!(name_matches(Some("RgbLedTest"), "RgbLedTest"));
        assert!(!name_matches(Some("RgbLedTest2"), "RgbLedTest"));
        assert!(!name_matches(Some("rgbledtest"), "RgbLedTest"));
        assert!(!name_matches(None, "RgbLedTest"));
    }
}
