use log::{debug, error, info, warn};
use tokio::sync::watch;

use super::{
    BleEvent, PeripheralHandle, RgbCharacteristicRef, ScanTimeout, SessionSettings, SessionState,
    Status, Transport, WriteMode,
};
use crate::{animation::ColorSink, color::ByteColor};

/// The connection to a single light.
///
/// It scans for the configured device name, connects to the first match,
/// looks for the RGB characteristic and then accepts color writes until the
/// device goes away. There's no automatic reconnect; the user has to ask
/// again.
pub struct BleSession<T> {
    transport: T,
    settings: SessionSettings,
    state: SessionState,
    peripheral: Option<PeripheralHandle>,
    characteristic: Option<RgbCharacteristicRef>,
    /// Bumped on every scan so that timers from older scans are ignored
    scan_id: u64,
    status: watch::Sender<Status>,
}

impl<T: Transport> BleSession<T> {
    pub fn new(transport: T, settings: SessionSettings) -> Self {
        let (status, _) = watch::channel(Status::idle());

        Self {
            transport,
            settings,
            state: SessionState::Idle,
            peripheral: None,
            characteristic: None,
            scan_id: 0,
            status,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> Status {
        self.status.borrow().clone()
    }

    /// Follow every status change from now on
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn peripheral(&self) -> Option<&PeripheralHandle> {
        self.peripheral.as_ref()
    }

    pub fn characteristic(&self) -> Option<&RgbCharacteristicRef> {
        self.characteristic.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Start looking for the light. Returns the scan timer to arm when a scan
    /// actually started.
    pub fn request_connect(&mut self) -> Option<ScanTimeout> {
        match self.state {
            SessionState::Idle | SessionState::Disconnected => Some(self.start_scan()),
            SessionState::CharacteristicMissing => {
                // This device is no use to us, drop it before looking again
                self.release_peripheral();
                Some(self.start_scan())
            }
            SessionState::Scanning => {
                debug!("Already scanning");
                None
            }
            state => {
                debug!("Ignoring connect request while {:?}", state);
                None
            }
        }
    }

    /// Cancel a scan, or drop the current connection
    pub fn request_disconnect(&mut self) {
        match self.state {
            SessionState::Scanning => {
                info!("Scan cancelled");
                self.transport.stop_scan();
                self.set_state(SessionState::Idle, None);
            }
            state if state.has_peripheral() => {
                self.release_peripheral();
                self.set_state(SessionState::Disconnected, None);
            }
            _ => {}
        }
    }

    /// The single connect button: connect when there's nothing going on,
    /// cancel or disconnect otherwise
    pub fn toggle(&mut self) -> Option<ScanTimeout> {
        match self.state {
            SessionState::Idle
            | SessionState::Disconnected
            | SessionState::CharacteristicMissing => self.request_connect(),
            _ => {
                self.request_disconnect();
                None
            }
        }
    }

    /// Feed in something the Bluetooth stack reported. Events that make no
    /// sense in the current state are dropped.
    pub fn handle_event(&mut self, event: BleEvent) -> SessionState {
        match (self.state, event) {
            (SessionState::Scanning, BleEvent::DeviceDiscovered(peripheral)) => {
                info!("Found {:?} ({})", peripheral.name, peripheral.id);
                self.transport.stop_scan();
                self.transport.connect(&peripheral);
                self.peripheral = Some(peripheral);
                self.set_state(SessionState::Connecting, None);
            }
            (SessionState::Scanning, BleEvent::ScanTimeout(scan_id)) if scan_id == self.scan_id => {
                warn!("No device named {} found", self.settings.device_name);
                self.transport.stop_scan();
                let error = format!("no device named {} found", self.settings.device_name);
                self.set_state(SessionState::Idle, Some(error));
            }
            (SessionState::Scanning, BleEvent::ScanFailed(reason)) => {
                error!("Scan failed: {}", reason);
                self.set_state(SessionState::Idle, Some(reason));
            }
            (SessionState::Connecting, BleEvent::Connected) => {
                if let Some(peripheral) = &self.peripheral {
                    self.transport.discover_services(peripheral);
                }
                self.set_state(SessionState::ServiceDiscovery, None);
            }
            (SessionState::Connecting, BleEvent::ConnectFailed(reason)) => {
                error!("Connecting failed: {}", reason);
                self.peripheral = None;
                self.set_state(SessionState::Disconnected, Some(reason));
            }
            (SessionState::ServiceDiscovery, BleEvent::ServicesDiscovered(characteristics)) => {
                for characteristic in &characteristics {
                    debug!(
                        "Characteristic {} in service {}",
                        characteristic.uuid, characteristic.service
                    );
                }

                match characteristics
                    .into_iter()
                    .find(|c| c.uuid == self.settings.characteristic)
                {
                    Some(found) => {
                        info!("RGB characteristic found");
                        self.characteristic = Some(RgbCharacteristicRef {
                            service: found.service,
                            uuid: found.uuid,
                            write_mode: WriteMode::WithoutResponse,
                        });
                        self.set_state(SessionState::Ready, None);
                    }
                    None => {
                        let error = format!(
                            "characteristic {} not found",
                            self.settings.characteristic
                        );
                        error!("Device has no RGB characteristic: {}", error);
                        self.set_state(SessionState::CharacteristicMissing, Some(error));
                    }
                }
            }
            (SessionState::ServiceDiscovery, BleEvent::ServiceDiscoveryFailed(reason)) => {
                error!("Service discovery failed: {}", reason);
                self.set_state(SessionState::CharacteristicMissing, Some(reason));
            }
            (SessionState::Idle, BleEvent::Disconnected) => {}
            (state, BleEvent::Disconnected) => {
                info!("Disconnected");
                if state == SessionState::Scanning {
                    self.transport.stop_scan();
                }
                self.peripheral = None;
                self.characteristic = None;
                self.set_state(SessionState::Disconnected, None);
            }
            (state, event) => {
                debug!("Ignoring {:?} while {:?}", event, state);
            }
        }

        self.state
    }

    /// Send a color to the light. Silently does nothing unless the session is
    /// ready; samples are never queued for later.
    pub fn write(&mut self, color: ByteColor) {
        if self.state != SessionState::Ready {
            return;
        }

        if let (Some(peripheral), Some(characteristic)) = (&self.peripheral, &self.characteristic) {
            self.transport
                .write_without_response(peripheral, characteristic, color.payload());
        }
    }

    fn start_scan(&mut self) -> ScanTimeout {
        self.scan_id += 1;
        info!("Scanning for {}", self.settings.device_name);
        self.transport.start_scan(&self.settings.device_name);
        self.set_state(SessionState::Scanning, None);

        ScanTimeout {
            scan_id: self.scan_id,
            after: self.settings.scan_timeout,
        }
    }

    fn release_peripheral(&mut self) {
        self.characteristic = None;
        if let Some(peripheral) = self.peripheral.take() {
            self.transport.disconnect(&peripheral);
        }
    }

    fn set_state(&mut self, state: SessionState, error: Option<String>) {
        if state != self.state {
            info!("BLE session: {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.status.send_replace(Status { state, error });
    }
}

impl<T: Transport> ColorSink for BleSession<T> {
    fn is_ready(&self) -> bool {
        self.state == SessionState::Ready && self.characteristic.is_some()
    }

    fn write(&mut self, color: ByteColor) {
        BleSession::write(self, color);
    }
}
