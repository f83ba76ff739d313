use std::{sync::Arc, time::Duration};

use log::{debug, info};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time::{interval, sleep, MissedTickBehavior},
};

use crate::{
    animation::AnimationEngine,
    ble::{BleEvent, BleSession, ScanTimeout, SessionState, Transport},
    color::ByteColor,
    config::Config,
    ControlMessage,
};

/// How many BLE events can pile up before the driver has to wait
pub const EVENT_QUEUE: usize = 100;

/// The engine and the session behind one lock. Ticks, BLE events and
/// settings changes all take it, so none of them ever sees the other half
/// mid-update.
pub struct Controller<T> {
    pub engine: AnimationEngine,
    pub session: BleSession<T>,
}

pub type SharedController<T> = Arc<Mutex<Controller<T>>>;

impl<T: Transport> Controller<T> {
    pub fn new(engine: AnimationEngine, session: BleSession<T>) -> Self {
        Self { engine, session }
    }

    pub fn from_config(config: &Config, transport: T) -> Self {
        let mut engine = AnimationEngine::new(config.tick_period());
        for command in config.settings.commands() {
            engine.apply(command);
        }

        let session = BleSession::new(transport, config.session_settings());
        Self::new(engine, session)
    }

    pub fn shared(self) -> SharedController<T> {
        Arc::new(Mutex::new(self))
    }

    /// One animation tick, written out if the session is ready
    pub fn tick(&mut self) -> Option<ByteColor> {
        self.engine.tick(&mut self.session)
    }

    /// Apply something the user asked for. Hands back a scan timer when the
    /// message started a scan.
    pub fn handle_control(&mut self, message: ControlMessage) -> Option<ScanTimeout> {
        match message {
            ControlMessage::Config(command) => {
                self.engine.apply(command);
                None
            }
            ControlMessage::Connect => self.session.request_connect(),
            ControlMessage::Disconnect => {
                self.session.request_disconnect();
                None
            }
            ControlMessage::Toggle => self.session.toggle(),
        }
    }

    pub fn handle_event(&mut self, event: BleEvent) -> SessionState {
        self.session.handle_event(event)
    }
}

/// Tick the controller at a fixed rate forever. Late ticks are skipped rather
/// than bunched up.
pub async fn run_tick_loop<T: Transport>(controller: SharedController<T>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        controller.lock().await.tick();
    }
}

/// Feed BLE events into the session until every sender is gone
pub async fn run_event_loop<T: Transport>(
    controller: SharedController<T>,
    mut events: mpsc::Receiver<BleEvent>,
) {
    while let Some(event) = events.recv().await {
        debug!("BLE event: {:?}", event);
        controller.lock().await.handle_event(event);
    }

    info!("BLE event loop finished");
}

/// Apply control messages until every sender is gone. Scan timers report
/// back through `events`.
pub async fn run_control_loop<T: Transport>(
    controller: SharedController<T>,
    mut control: mpsc::Receiver<ControlMessage>,
    events: mpsc::Sender<BleEvent>,
) {
    while let Some(message) = control.recv().await {
        let timeout = controller.lock().await.handle_control(message);
        if let Some(timeout) = timeout {
            arm_scan_timeout(timeout, events.clone());
        }
    }

    info!("Control loop finished");
}

/// Deliver the scan timeout event once its time is up. The session ignores
/// it if the scan it belongs to is already over.
pub fn arm_scan_timeout(timeout: ScanTimeout, events: mpsc::Sender<BleEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(timeout.after).await;
        let _ = events.send(timeout.event()).await;
    })
}

/// Start the tick, event and control loops
pub fn spawn<T: Transport + 'static>(
    controller: SharedController<T>,
    tick_period: Duration,
    events: (mpsc::Sender<BleEvent>, mpsc::Receiver<BleEvent>),
    control: mpsc::Receiver<ControlMessage>,
) -> Vec<JoinHandle<()>> {
    let (events_tx, events_rx) = events;

    vec![
        tokio::spawn(run_tick_loop(controller.clone(), tick_period)),
        tokio::spawn(run_event_loop(controller.clone(), events_rx)),
        tokio::spawn(run_control_loop(controller, control, events_tx)),
    ]
}

#[cfg(test)]
mod tests {
    use common::{Color, ConfigCommand, Settings};
    use uuid::Uuid;

    use super::*;
    use crate::{
        ble::{fake::FakeTransport, DiscoveredCharacteristic, PeripheralHandle},
        config::RGB_COLOR_UUID,
    };

    const TICK: Duration = Duration::from_millis(20);

    struct Harness {
        controller: SharedController<FakeTransport>,
        transport: FakeTransport,
        events: mpsc::Sender<BleEvent>,
        control: mpsc::Sender<ControlMessage>,
    }

    fn start(config: Config) -> Harness {
        let transport = FakeTransport::default();
        let controller = Controller::from_config(&config, transport.clone()).shared();

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
        let (control_tx, control_rx) = mpsc::channel(10);
        spawn(
            controller.clone(),
            config.tick_period(),
            (events_tx.clone(), events_rx),
            control_rx,
        );

        Harness {
            controller,
            transport,
            events: events_tx,
            control: control_tx,
        }
    }

    async fn state(harness: &Harness) -> SessionState {
        harness.controller.lock().await.session.state()
    }

    async fn connect(harness: &Harness) {
        harness.control.send(ControlMessage::Connect).await.unwrap();
        sleep(TICK).await;
        assert_eq!(state(harness).await, SessionState::Scanning);

        for event in [
            BleEvent::DeviceDiscovered(PeripheralHandle {
                id: "light".to_string(),
                name: Some("RgbLedTest".to_string()),
            }),
            BleEvent::Connected,
            BleEvent::ServicesDiscovered(vec![DiscoveredCharacteristic {
                service: Uuid::from_u128(1),
                uuid: RGB_COLOR_UUID,
            }]),
        ] {
            harness.events.send(event).await.unwrap();
        }
        sleep(TICK).await;
        assert_eq!(state(harness).await, SessionState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_only_start_once_ready() {
        let harness = start(Config::default());
        harness
            .control
            .send(ControlMessage::Config(ConfigCommand::RequestColor {
                color: Color::new(1.0, 0.0, 0.0),
            }))
            .await
            .unwrap();

        sleep(Duration::from_millis(500)).await;
        assert!(harness.transport.writes().is_empty());
        assert_eq!(harness.controller.lock().await.engine.state().current, Color::BLACK);

        connect(&harness).await;
        sleep(Duration::from_millis(200)).await;

        let writes = harness.transport.writes();
        assert!(!writes.is_empty());
        assert!(writes.iter().all(|w| *w == [255, 0, 0, 0]));

        // Writes stop as soon as the light goes away
        harness.events.send(BleEvent::Disconnected).await.unwrap();
        sleep(TICK).await;
        let count = harness.transport.writes().len();
        sleep(Duration::from_millis(200)).await;
        assert_eq!(harness.transport.writes().len(), count);
        assert_eq!(state(&harness).await, SessionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_times_out() {
        let harness = start(Config::default());
        harness.control.send(ControlMessage::Toggle).await.unwrap();

        sleep(Duration::from_secs(9)).await;
        assert_eq!(state(&harness).await, SessionState::Scanning);

        sleep(Duration::from_secs(2)).await;
        let status = harness.controller.lock().await.session.status();
        assert_eq!(status.state, SessionState::Idle);
        assert!(status.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_disarmed_by_connection() {
        let harness = start(Config::default());
        connect(&harness).await;

        sleep(Duration::from_secs(15)).await;
        assert_eq!(state(&harness).await, SessionState::Ready);
    }

    #[test]
    fn test_initial_settings_from_config() {
        let config = Config {
            settings: Settings {
                smoothing: 0.4,
                intensity: 0.5,
                ..Settings::default()
            },
            ..Config::default()
        };
        let controller = Controller::from_config(&config, FakeTransport::default());

        let state = controller.engine.state();
        assert_eq!(state.smoothing, 0.4);
        assert_eq!(state.intensity, 0.5);
    }
}
