//! Per-connection concurrency core
//!
//! Each connected controller gets a [`Connection`]: shared state behind a
//! short-lived lock plus three worker tasks, each the only consumer of its
//! queue:
//!
//! - **setup**: bring-up after the device is handed over
//! - **sequencer**: acknowledgements and gesture-triggered commands
//! - **rumble**: force-feedback updates, coalesced to the latest request
//!
//! Device writes block, so workers run them on the blocking pool. The report
//! path ([`Connection::handle_report`]) never sends; it decodes, updates state
//! and enqueues.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::gesture::{Gesture, GestureDetector, HomeTimer, DEFAULT_HOLD};
use crate::input::{decode_full, decode_simple, AnalogDpad, DecodePolicy, GyroTrigger, Mode, PadEvent};
use crate::protocol::{self, Command, Framing, RawReport};
use crate::registry::{led_pattern, ConnectionId, SharedRegistry};
use crate::rumble::encode_rumble;
use crate::sequencer::{Phase, Sequencer, SequencerView, Step, Transition, DEFAULT_SETTLE};
use crate::sink::{InputSink, SinkError};
use crate::transport::Transport;

// ============================================================================
// State
// ============================================================================

/// Mutable per-connection state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControllerState {
    pub slot: Option<u8>,
    /// Acknowledged input mode
    pub mode: Mode,
    /// Mode the sequencer is working towards
    pub mode_new: Mode,
    pub analog_dpad: AnalogDpad,
    pub gyro_trigger: GyroTrigger,
    pub registered: bool,
    pub phase: Phase,
    pub home: HomeTimer,
    /// Latest rumble request not yet sent (weak, strong)
    pub rumble: Option<(u16, u16)>,
}

impl ControllerState {
    fn view(&self) -> SequencerView {
        SequencerView {
            mode: self.mode,
            mode_new: self.mode_new,
            registered: self.registered,
        }
    }

    fn policy(&self) -> DecodePolicy {
        DecodePolicy {
            mode: self.mode,
            analog_dpad: self.analog_dpad,
            gyro_trigger: self.gyro_trigger,
        }
    }
}

/// Tunables for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Home button hold time for gestures
    pub gesture_hold: Duration,
    /// Delay between a home light ack and the finalizing no-op
    pub settle: Duration,
    /// Analog D-pad policy a new connection starts with
    pub analog_dpad: AnalogDpad,
    /// Forward rumble requests to the device
    pub rumble: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            gesture_hold: DEFAULT_HOLD,
            settle: DEFAULT_SETTLE,
            analog_dpad: AnalogDpad::Off,
            rumble: true,
        }
    }
}

/// Connection error type
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The virtual gamepad could not be created
    #[error("input sink: {0}")]
    Sink(#[from] SinkError),
}

// ============================================================================
// Jobs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetupJob {
    Connect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SequencerJob {
    AckReceived(u8),
    Gesture(Gesture),
}

/// State shared between the report path and the workers
struct Shared {
    id: ConnectionId,
    framing: Framing,
    state: Mutex<ControllerState>,
    transport: Arc<dyn Transport>,
    registry: SharedRegistry,
    sequencer: Sequencer,
    rumble_enabled: bool,
    rejected: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write one command on the blocking pool
    async fn send(&self, command: Command) -> bool {
        let frame = command.encode(self.framing);
        let transport = Arc::clone(&self.transport);
        let result = tokio::task::spawn_blocking(move || protocol::send(&*transport, &frame)).await;

        match result {
            Ok(Ok(_)) => {
                tracing::debug!(id = self.id, %command, "Command sent");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(id = self.id, %command, error = %e, "Send failed");
                false
            }
            Err(e) => {
                tracing::warn!(id = self.id, %command, error = %e, "Send task failed");
                false
            }
        }
    }

    /// Take a slot and light the matching LEDs
    async fn register(&self) -> bool {
        let assigned = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .assign(self.id);

        let slot = match assigned {
            Ok(slot) => slot,
            Err(e) => {
                tracing::error!(id = self.id, error = %e, "Controller rejected");
                self.lock().phase = Phase::Disconnected;
                self.rejected.store(true, Ordering::SeqCst);
                return false;
            }
        };

        {
            let mut state = self.lock();
            state.slot = Some(slot);
            state.registered = true;
        }
        tracing::info!(id = self.id, slot, framing = %self.framing, "Controller registered");
        self.send(Command::SetLed(led_pattern(slot))).await
    }

    /// Apply a sequencer transition
    ///
    /// The desired mode and phase are stored before anything is sent, so an
    /// ack racing the send already sees them. The acknowledged mode is
    /// committed last.
    async fn apply(&self, transition: Transition) {
        if transition.is_idle() {
            return;
        }

        {
            let mut state = self.lock();
            if let Some(mode_new) = transition.mode_new {
                state.mode_new = mode_new;
            }
            if let Some(phase) = transition.phase {
                state.phase = phase;
            }
        }

        for step in transition.steps {
            let ok = match step {
                Step::Register => self.register().await,
                Step::Send(command) => self.send(command).await,
                Step::Settle(delay) => {
                    tokio::time::sleep(delay).await;
                    true
                }
            };
            if !ok {
                break;
            }
        }

        if let Some(mode) = transition.mode {
            let mut state = self.lock();
            if state.mode != mode {
                tracing::info!(id = self.id, from = ?state.mode, to = ?mode, "Mode changed");
            }
            state.mode = mode;
        }
    }
}

// ============================================================================
// Workers
// ============================================================================

async fn setup_worker(shared: Arc<Shared>, mut rx: mpsc::UnboundedReceiver<SetupJob>) {
    while let Some(job) = rx.recv().await {
        match job {
            SetupJob::Connect => {
                tracing::debug!(id = shared.id, framing = %shared.framing, "Connecting");
                shared.apply(shared.sequencer.on_connect()).await;
            }
        }
    }
}

async fn sequencer_worker(shared: Arc<Shared>, mut rx: mpsc::UnboundedReceiver<SequencerJob>) {
    while let Some(job) = rx.recv().await {
        let view = shared.lock().view();
        let transition = match job {
            SequencerJob::AckReceived(id) => shared.sequencer.on_ack(id, &view),
            SequencerJob::Gesture(gesture) => shared.sequencer.on_gesture(gesture, &view),
        };
        shared.apply(transition).await;
    }
}

async fn rumble_worker(shared: Arc<Shared>, mut rx: mpsc::Receiver<()>) {
    while rx.recv().await.is_some() {
        let Some((weak, strong)) = shared.lock().rumble.take() else {
            continue;
        };
        shared.send(Command::Rumble(encode_rumble(weak, strong))).await;
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Entry point for force-feedback requests
#[derive(Clone)]
pub struct RumbleHandle {
    shared: Arc<Shared>,
    tx: mpsc::Sender<()>,
}

impl RumbleHandle {
    /// Request a new rumble level. Requests arriving faster than the device
    /// accepts them collapse into the latest one.
    pub fn on_rumble_requested(&self, weak: u16, strong: u16) {
        request_rumble(&self.shared, &self.tx, weak, strong);
    }
}

fn request_rumble(shared: &Shared, tx: &mpsc::Sender<()>, weak: u16, strong: u16) {
    if !shared.rumble_enabled {
        return;
    }
    shared.lock().rumble = Some((weak, strong));
    // A full queue already holds a wakeup that will pick this value up
    if let Err(mpsc::error::TrySendError::Closed(_)) = tx.try_send(()) {
        tracing::trace!(id = shared.id, "Rumble after shutdown dropped");
    }
}

/// One connected controller
pub struct Connection {
    shared: Arc<Shared>,
    sink: Box<dyn InputSink>,
    detector: GestureDetector,
    setup_tx: mpsc::UnboundedSender<SetupJob>,
    sequencer_tx: mpsc::UnboundedSender<SequencerJob>,
    rumble_tx: mpsc::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl Connection {
    /// Take over a device: create the virtual gamepad, start the workers and
    /// queue the bring-up sequence. Must be called inside a tokio runtime.
    pub fn new(
        id: ConnectionId,
        framing: Framing,
        transport: Arc<dyn Transport>,
        mut sink: Box<dyn InputSink>,
        registry: SharedRegistry,
        settings: ConnectionSettings,
    ) -> Result<Self, ConnectionError> {
        sink.register_capabilities(framing)?;

        let shared = Arc::new(Shared {
            id,
            framing,
            state: Mutex::new(ControllerState {
                analog_dpad: settings.analog_dpad,
                ..Default::default()
            }),
            transport,
            registry,
            sequencer: Sequencer::new(framing, settings.settle),
            rumble_enabled: settings.rumble,
            rejected: AtomicBool::new(false),
        });

        let (setup_tx, setup_rx) = mpsc::unbounded_channel();
        let (sequencer_tx, sequencer_rx) = mpsc::unbounded_channel();
        let (rumble_tx, rumble_rx) = mpsc::channel(1);

        let tasks = vec![
            tokio::spawn(setup_worker(Arc::clone(&shared), setup_rx)),
            tokio::spawn(sequencer_worker(Arc::clone(&shared), sequencer_rx)),
            tokio::spawn(rumble_worker(Arc::clone(&shared), rumble_rx)),
        ];

        // Receivers are alive, the send cannot fail here
        let _ = setup_tx.send(SetupJob::Connect);
        tracing::info!(id, framing = %framing, "Controller connected");

        Ok(Self {
            shared,
            sink,
            detector: GestureDetector::new(settings.gesture_hold),
            setup_tx,
            sequencer_tx,
            rumble_tx,
            tasks,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    pub fn framing(&self) -> Framing {
        self.shared.framing
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ControllerState {
        self.shared.lock().clone()
    }

    /// Whether the registry turned this controller away
    pub fn is_rejected(&self) -> bool {
        self.shared.rejected.load(Ordering::SeqCst)
    }

    pub fn rumble_handle(&self) -> RumbleHandle {
        RumbleHandle {
            shared: Arc::clone(&self.shared),
            tx: self.rumble_tx.clone(),
        }
    }

    /// Process one report read from the device
    pub fn handle_report(&mut self, data: &[u8]) {
        self.handle_report_at(data, Instant::now());
    }

    /// Process one report with an explicit arrival time
    pub fn handle_report_at(&mut self, data: &[u8], now: Instant) {
        let report = match protocol::decode(self.shared.framing, data) {
            Ok(report) => report,
            Err(e) => {
                tracing::trace!(id = self.shared.id, error = %e, "Report dropped");
                return;
            }
        };

        match report {
            RawReport::AckReply(subcommand) => {
                tracing::trace!(id = self.shared.id, subcommand = format!("0x{:02X}", subcommand), "Ack");
                self.enqueue(SequencerJob::AckReceived(subcommand));
            }
            RawReport::InputFull(payload) => {
                let (policy, timer) = {
                    let mut state = self.shared.lock();
                    // IMU still running from an earlier session
                    if state.mode == Mode::Full && payload.imu_active() {
                        tracing::info!(id = self.shared.id, "Gyro data detected");
                        state.mode = Mode::Gyro;
                    }
                    (state.policy(), state.home)
                };
                let event = decode_full(&payload, &policy);
                self.handle_event(event, timer, now);
            }
            RawReport::InputSimple(payload) => {
                let (policy, timer) = {
                    let state = self.shared.lock();
                    (state.policy(), state.home)
                };
                let event = decode_simple(&payload, &policy);
                self.handle_event(event, timer, now);
            }
            RawReport::OutputCommand(_) | RawReport::Unrecognized(_) => {
                tracing::trace!(id = self.shared.id, "Report ignored: {:02X?}", &data[..data.len().min(4)]);
            }
        }
    }

    /// Forward rumble that clients of the virtual gamepad asked for
    pub fn poll_force_feedback(&mut self) {
        match self.sink.poll_rumble() {
            Ok(Some((weak, strong))) => request_rumble(&self.shared, &self.rumble_tx, weak, strong),
            Ok(None) => {}
            Err(e) => tracing::debug!(id = self.shared.id, error = %e, "Force-feedback poll failed"),
        }
    }

    fn handle_event(&mut self, event: PadEvent, timer: HomeTimer, now: Instant) {
        let (timer, gesture) = self.detector.update(timer, &event, now);

        if let Err(e) = self.sink.deliver(&event) {
            tracing::warn!(id = self.shared.id, error = %e, "Input delivery failed");
        }

        {
            let mut state = self.shared.lock();
            state.home = timer;
            match gesture {
                Some(Gesture::ToggleGyro { trigger }) => state.gyro_trigger = trigger,
                Some(Gesture::ToggleDpadPolicy { side }) => {
                    state.analog_dpad = state.analog_dpad.toggled(side);
                    tracing::info!(id = self.shared.id, policy = ?state.analog_dpad, "Analog D-pad toggled");
                }
                None => {}
            }
        }

        if let Some(gesture) = gesture {
            self.enqueue(SequencerJob::Gesture(gesture));
        }
    }

    fn enqueue(&self, job: SequencerJob) {
        if self.sequencer_tx.send(job).is_err() {
            tracing::trace!(id = self.shared.id, ?job, "Sequencer stopped, job dropped");
        }
    }

    /// Tear down: close the queues, stop the workers and free the slot
    pub async fn shutdown(self) {
        let Connection {
            shared,
            setup_tx,
            sequencer_tx,
            rumble_tx,
            tasks,
            ..
        } = self;

        drop(setup_tx);
        drop(sequencer_tx);
        drop(rumble_tx);

        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }

        let released = shared
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release_connection(shared.id);

        {
            let mut state = shared.lock();
            state.slot = None;
            state.phase = Phase::Disconnected;
        }
        tracing::info!(id = shared.id, slot = ?released, "Controller disconnected");
    }
}

// ============================================================================
// Tests
// ============================================================================
