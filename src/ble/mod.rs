//! Everything between the animation engine and the light over Bluetooth LE.
//!
//! [`BleSession`] is the state machine. It never touches a Bluetooth stack
//! itself: it asks a [`Transport`] to do things and hears back through
//! [`BleEvent`]s, which keeps it testable without hardware. The real
//! transport lives in [`btle`].

use std::time::Duration;

use uuid::Uuid;

pub mod btle;
mod session;

#[cfg(test)]
pub(crate) mod fake;

pub use session::BleSession;

/// Where the session is in its life
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Scanning,
    Connecting,
    ServiceDiscovery,
    /// Connected with a characteristic to write colors to
    Ready,
    /// Connected, but the device has no RGB characteristic we can write to
    CharacteristicMissing,
    Disconnected,
}

impl SessionState {
    /// The text shown on the connect button
    pub const fn label(self) -> &'static str {
        match self {
            SessionState::Idle | SessionState::Disconnected => "Connect",
            SessionState::Scanning => "Scanning",
            SessionState::Connecting => "Connecting",
            SessionState::ServiceDiscovery => "Discovering",
            SessionState::Ready => "Connected",
            SessionState::CharacteristicMissing => "Unsupported device",
        }
    }

    /// Whether a peripheral is (or is about to be) attached
    pub const fn has_peripheral(self) -> bool {
        matches!(
            self,
            SessionState::Connecting
                | SessionState::ServiceDiscovery
                | SessionState::Ready
                | SessionState::CharacteristicMissing
        )
    }
}

/// What observers of the session get told on every transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub state: SessionState,
    /// Why the session ended up here, if it was a failure
    pub error: Option<String>,
}

impl Status {
    pub const fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            error: None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error {
            Some(error) => write!(f, "{} ({})", self.state.label(), error),
            None => write!(f, "{}", self.state.label()),
        }
    }
}

/// A device found by a scan
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeripheralHandle {
    /// Platform identifier, only meaningful to the transport that made it
    pub id: String,
    pub name: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    WithResponse,
    WithoutResponse,
}

/// A characteristic reported by service discovery
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredCharacteristic {
    pub service: Uuid,
    pub uuid: Uuid,
}

/// The characteristic colors get written to. Only held while the session is
/// ready.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbCharacteristicRef {
    pub service: Uuid,
    pub uuid: Uuid,
    pub write_mode: WriteMode,
}

/// Things the Bluetooth stack tells the session about
#[derive(Clone, Debug, PartialEq)]
pub enum BleEvent {
    /// A device matching the scan filter showed up
    DeviceDiscovered(PeripheralHandle),
    ScanFailed(String),
    /// The timer for the scan with this id ran out
    ScanTimeout(u64),
    Connected,
    ConnectFailed(String),
    ServicesDiscovered(Vec<DiscoveredCharacteristic>),
    ServiceDiscoveryFailed(String),
    Disconnected,
}

/// A timer the caller has to arm after a scan starts. When it fires it
/// should deliver [`BleEvent::ScanTimeout`] with the same id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct ScanTimeout {
    pub scan_id: u64,
    pub after: Duration,
}

impl ScanTimeout {
    pub fn event(&self) -> BleEvent {
        BleEvent::ScanTimeout(self.scan_id)
    }
}

/// The Bluetooth operations the session needs.
///
/// Every call has to return straight away. Results come back later as
/// [`BleEvent`]s; a write has no result at all.
pub trait Transport: Send {
    fn start_scan(&mut self, device_name: &str);
    fn stop_scan(&mut self);
    fn connect(&mut self, peripheral: &PeripheralHandle);
    fn discover_services(&mut self, peripheral: &PeripheralHandle);
    fn write_without_response(
        &mut self,
        peripheral: &PeripheralHandle,
        characteristic: &RgbCharacteristicRef,
        payload: [u8; 4],
    );
    fn disconnect(&mut self, peripheral: &PeripheralHandle);
}

/// How the session finds and talks to the light
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSettings {
    pub device_name: String,
    pub characteristic: Uuid,
    pub scan_timeout: Duration,
}
