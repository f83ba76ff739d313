use std::sync::{Arc, Mutex};

use super::{PeripheralHandle, RgbCharacteristicRef, Transport};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    StartScan(String),
    StopScan,
    Connect(String),
    DiscoverServices(String),
    Write([u8; 4]),
    Disconnect(String),
}

/// Transport that only records what it was asked to do
#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl FakeTransport {
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn writes(&self) -> Vec<[u8; 4]> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Write(payload) => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Transport for FakeTransport {
    fn start_scan(&mut self, device_name: &str) {
        self.push(Call::StartScan(device_name.to_string()));
    }

    fn stop_scan(&mut self) {
        self.push(Call::StopScan);
    }

    fn connect(&mut self, peripheral: &PeripheralHandle) {
        self.push(Call::Connect(peripheral.id.clone()));
    }

    fn discover_services(&mut self, peripheral: &PeripheralHandle) {
        self.push(Call::DiscoverServices(peripheral.id.clone()));
    }

    fn write_without_response(
        &mut self,
        _peripheral: &PeripheralHandle,
        _characteristic: &RgbCharacteristicRef,
        payload: [u8; 4],
    ) {
        self.push(Call::Write(payload));
    }

    fn disconnect(&mut self, peripheral: &PeripheralHandle) {
        self.push(Call::Disconnect(peripheral.id.clone()));
    }
}
