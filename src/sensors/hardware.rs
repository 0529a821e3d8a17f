//! Hardware trainer and heart-rate channels over a GATT transport.
//!
//! The trainer channel subscribes to Indoor Bike Data, then asks for control
//! through the Fitness Machine Control Point. Simulation parameters are only
//! written after the device answers the request with Success; until then
//! (or forever, on trainers without a control point) the channel is a
//! telemetry-only source.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::StreamExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::sensors::channel::{
    ConsumerSlot, DebugLog, ResistanceControl, TelemetryCallback, TrainerChannel,
};
use crate::sensors::ftms::{
    self, FTMS_CONTROL_POINT_UUID, FTMS_SERVICE_UUID, HEART_RATE_MEASUREMENT_UUID,
    HEART_RATE_SERVICE_UUID, INDOOR_BIKE_DATA_UUID,
};
use crate::sensors::transport::{
    BtleTransport, BtleTransportConfig, GattTransport, NotificationStream,
};
use crate::sensors::types::{
    ConnectionError, ConnectionStatus, TelemetryFrame, TrainerError, TrainerState,
};

/// Hardware trainer settings.
#[derive(Debug, Clone)]
pub struct HardwareTrainerConfig {
    /// How long `connect` waits for the control grant before settling for
    /// telemetry only
    pub control_grant_timeout: Duration,
    /// Raw exchanges kept for `download_debug_log`
    pub debug_log_capacity: usize,
}

impl Default for HardwareTrainerConfig {
    fn default() -> Self {
        Self {
            control_grant_timeout: Duration::from_secs(5),
            debug_log_capacity: 64,
        }
    }
}

/// State shared with the notification task.
struct Link {
    state: Mutex<TrainerState>,
    granted: AtomicBool,
    grant_signal: Notify,
    consumer: ConsumerSlot<TelemetryFrame>,
    exchanges: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl Link {
    fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(TrainerState::Disconnected),
            granted: AtomicBool::new(false),
            grant_signal: Notify::new(),
            consumer: ConsumerSlot::new(),
            exchanges: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn state(&self) -> TrainerState {
        self.state.lock().map(|s| *s).unwrap_or(TrainerState::Failed)
    }

    fn set_state(&self, state: TrainerState) {
        if let Ok(mut current) = self.state.lock() {
            if *current != state {
                tracing::debug!("Trainer state: {} -> {}", *current, state);
                *current = state;
            }
        }
    }

    fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn grant(&self) {
        if let Ok(mut state) = self.state.lock() {
            self.granted.store(true, Ordering::SeqCst);
            *state = TrainerState::ControlGranted;
        }
        self.grant_signal.notify_one();
        tracing::info!("Trainer granted control");
    }

    /// Fall back to telemetry only unless the grant already landed.
    fn settle_without_grant(&self) {
        if let Ok(mut state) = self.state.lock() {
            if !self.granted.load(Ordering::SeqCst) {
                *state = TrainerState::Subscribed;
            }
        }
    }

    fn reset(&self, state: TrainerState) {
        self.granted.store(false, Ordering::SeqCst);
        self.set_state(state);
    }

    fn record(&self, direction: &str, channel: &str, data: &[u8]) {
        if self.capacity == 0 {
            return;
        }
        if let Ok(mut log) = self.exchanges.lock() {
            if log.len() == self.capacity {
                log.pop_front();
            }
            log.push_back(format!(
                "{} {} {} {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                direction,
                channel,
                ftms::to_hex(data)
            ));
        }
    }
}

/// FTMS smart trainer reached through a [`GattTransport`].
pub struct HardwareTrainer<T: GattTransport> {
    transport: Arc<T>,
    link: Arc<Link>,
    config: HardwareTrainerConfig,
    task: Option<JoinHandle<()>>,
}

impl HardwareTrainer<BtleTransport> {
    /// Trainer over btleplug, selecting the first device advertising FTMS.
    pub fn ble(transport: BtleTransportConfig, config: HardwareTrainerConfig) -> Self {
        Self::new(BtleTransport::new(FTMS_SERVICE_UUID, transport), config)
    }
}

impl<T: GattTransport> HardwareTrainer<T> {
    pub fn new(transport: T, config: HardwareTrainerConfig) -> Self {
        let link = Arc::new(Link::new(config.debug_log_capacity));
        Self {
            transport: Arc::new(transport),
            link,
            config,
            task: None,
        }
    }

    /// Current link state.
    pub fn state(&self) -> TrainerState {
        self.link.state()
    }

    async fn establish(&mut self) -> Result<(), TrainerError> {
        self.transport.open().await?;

        if !self.transport.has_characteristic(INDOOR_BIKE_DATA_UUID).await {
            return Err(ConnectionError::CharacteristicMissing(INDOOR_BIKE_DATA_UUID).into());
        }

        // Take the stream before subscribing so the first frames are not lost
        let stream = self.transport.notifications().await?;
        self.transport.subscribe(INDOOR_BIKE_DATA_UUID).await?;

        let has_control_point = if self.transport.has_characteristic(FTMS_CONTROL_POINT_UUID).await {
            match self.transport.subscribe(FTMS_CONTROL_POINT_UUID).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Control point indications unavailable: {}", e);
                    false
                }
            }
        } else {
            false
        };

        let link = self.link.clone();
        self.task = Some(tokio::spawn(async move {
            pump_notifications(stream, link).await;
        }));
        self.link.set_state(TrainerState::Subscribed);
        tracing::info!("Subscribed to indoor bike data");

        if has_control_point {
            self.request_control().await;
        } else {
            tracing::info!("Trainer has no control point; telemetry only");
        }

        Ok(())
    }

    async fn request_control(&self) {
        let request = ftms::encode_request_control();
        self.link.set_state(TrainerState::ControlRequested);
        self.link.record("TX", "CP", &request);

        if let Err(e) = self.transport.write(FTMS_CONTROL_POINT_UUID, &request).await {
            tracing::warn!("Request control write failed: {}", e);
            self.link.settle_without_grant();
            return;
        }

        let link = self.link.clone();
        let wait_for_grant = async move {
            while !link.is_granted() {
                link.grant_signal.notified().await;
            }
        };

        if tokio::time::timeout(self.config.control_grant_timeout, wait_for_grant)
            .await
            .is_err()
        {
            tracing::info!(
                "No control grant within {:?}; resistance control disabled",
                self.config.control_grant_timeout
            );
            self.link.settle_without_grant();
        }
    }

    fn stop_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn pump_notifications(mut stream: NotificationStream, link: Arc<Link>) {
    while let Some(notification) = stream.next().await {
        if notification.uuid == INDOOR_BIKE_DATA_UUID {
            link.record("RX", "IBD", &notification.value);
            match ftms::parse_telemetry(&notification.value) {
                Ok(frame) => {
                    link.consumer.dispatch(frame);
                }
                Err(e) => tracing::debug!("Dropping indoor bike data frame: {}", e),
            }
        } else if notification.uuid == FTMS_CONTROL_POINT_UUID {
            link.record("RX", "CP", &notification.value);
            match ftms::parse_control_point_response(&notification.value) {
                Ok(response) if response.is_control_granted() => link.grant(),
                Ok(response) => tracing::debug!(
                    "Control point response: op 0x{:02x} {:?}",
                    response.request_op,
                    response.result
                ),
                Err(e) => tracing::debug!("Ignoring control point indication: {}", e),
            }
        }
    }

    tracing::warn!("Trainer notification stream ended");
    link.reset(TrainerState::Disconnected);
}

#[async_trait]
impl<T: GattTransport> TrainerChannel for HardwareTrainer<T> {
    async fn connect(&mut self) -> Result<(), TrainerError> {
        if self.link.state().is_connected() {
            return Ok(());
        }

        self.link.reset(TrainerState::Connecting);

        match self.establish().await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!("Trainer connection failed: {}", e);
                self.stop_task();
                if let Err(close_err) = self.transport.close().await {
                    tracing::debug!("Close after failed connect: {}", close_err);
                }
                self.link.reset(TrainerState::Failed);
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) {
        // Consumer first so nothing is delivered after this call starts
        self.link.consumer.clear();
        self.stop_task();

        if let Err(e) = self.transport.close().await {
            tracing::warn!("Trainer disconnect failed: {}", e);
        }

        if self.link.state() != TrainerState::Disconnected {
            tracing::info!("Trainer disconnected");
        }
        self.link.reset(TrainerState::Disconnected);
    }

    fn on_data(&mut self, callback: TelemetryCallback) {
        self.link.consumer.set(callback);
    }

    fn is_connected(&self) -> bool {
        self.link.state().is_connected()
    }

    fn status(&self) -> ConnectionStatus {
        self.link.state().status()
    }

    fn name(&self) -> &str {
        "FTMS trainer"
    }

    fn resistance_control(&self) -> Option<&dyn ResistanceControl> {
        Some(self)
    }

    fn debug_log(&self) -> Option<&dyn DebugLog> {
        Some(self)
    }
}

#[async_trait]
impl<T: GattTransport> ResistanceControl for HardwareTrainer<T> {
    async fn set_simulation_params(
        &self,
        grade: f64,
        crr: f64,
        cwa: f64,
    ) -> Result<(), TrainerError> {
        if !self.link.is_granted() {
            tracing::debug!("Control not granted; skipping simulation parameters");
            return Ok(());
        }

        let command = ftms::encode_simulation_params(grade, crr, cwa);
        self.link.record("TX", "CP", &command);

        match self.transport.write(FTMS_CONTROL_POINT_UUID, &command).await {
            Ok(()) => {
                tracing::debug!(
                    "Simulation params sent: grade={:.4} crr={:.4} cwa={:.3}",
                    grade,
                    crr,
                    cwa
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Simulation parameter write failed: {}", e);
                Err(e)
            }
        }
    }

    fn has_control(&self) -> bool {
        self.link.is_granted()
    }
}

impl<T: GattTransport> DebugLog for HardwareTrainer<T> {
    fn download_debug_log(&self) -> String {
        self.link
            .exchanges
            .lock()
            .map(|log| log.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default()
    }
}

/// Heart rate strap reached through a [`GattTransport`].
pub struct HeartRateMonitor<T: GattTransport> {
    transport: Arc<T>,
    consumer: ConsumerSlot<u16>,
    status: Arc<Mutex<ConnectionStatus>>,
    task: Option<JoinHandle<()>>,
}

impl HeartRateMonitor<BtleTransport> {
    pub fn ble(transport: BtleTransportConfig) -> Self {
        Self::new(BtleTransport::new(HEART_RATE_SERVICE_UUID, transport))
    }
}

impl<T: GattTransport> HeartRateMonitor<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            consumer: ConsumerSlot::new(),
            status: Arc::new(Mutex::new(ConnectionStatus::Disconnected)),
            task: None,
        }
    }

    /// Register the BPM consumer, replacing any previous one.
    pub fn on_bpm(&mut self, callback: Box<dyn FnMut(u16) + Send + 'static>) {
        self.consumer.set(callback);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
            .lock()
            .map(|s| *s)
            .unwrap_or(ConnectionStatus::Failed)
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    fn set_status(&self, status: ConnectionStatus) {
        if let Ok(mut current) = self.status.lock() {
            *current = status;
        }
    }

    pub async fn connect(&mut self) -> Result<(), TrainerError> {
        if self.is_connected() {
            return Ok(());
        }
        self.set_status(ConnectionStatus::Connecting);

        match self.establish().await {
            Ok(()) => {
                self.set_status(ConnectionStatus::Connected);
                tracing::info!("Heart rate monitor connected");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Heart rate monitor connection failed: {}", e);
                if let Err(close_err) = self.transport.close().await {
                    tracing::debug!("Close after failed connect: {}", close_err);
                }
                self.set_status(ConnectionStatus::Failed);
                Err(e)
            }
        }
    }

    async fn establish(&mut self) -> Result<(), TrainerError> {
        self.transport.open().await?;

        if !self
            .transport
            .has_characteristic(HEART_RATE_MEASUREMENT_UUID)
            .await
        {
            return Err(
                ConnectionError::CharacteristicMissing(HEART_RATE_MEASUREMENT_UUID).into(),
            );
        }

        let mut stream = self.transport.notifications().await?;
        self.transport.subscribe(HEART_RATE_MEASUREMENT_UUID).await?;

        let consumer = self.consumer.clone();
        let status = self.status.clone();
        self.task = Some(tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid != HEART_RATE_MEASUREMENT_UUID {
                    continue;
                }
                match ftms::parse_heart_rate_measurement(&notification.value) {
                    Ok(bpm) => {
                        consumer.dispatch(bpm);
                    }
                    Err(e) => tracing::debug!("Dropping heart rate frame: {}", e),
                }
            }
            tracing::warn!("Heart rate notification stream ended");
            if let Ok(mut s) = status.lock() {
                *s = ConnectionStatus::Disconnected;
            }
        }));

        Ok(())
    }

    pub async fn disconnect(&mut self) {
        self.consumer.clear();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Err(e) = self.transport.close().await {
            tracing::warn!("Heart rate monitor disconnect failed: {}", e);
        }
        self.set_status(ConnectionStatus::Disconnected);
    }
}
