//! ClearOne Converge Pro 2 driver.
//!
//! Protocol Overview:
//! - Format: ASCII lines, `EP <channel> <block> <parameter> [value]`
//! - Terminators: commands end in CR, responses end in LF
//! - Heartbeat: `BOX <box_name> UNIT SN`
//! - Presets: `MCCF <id>`
//!
//! # Pipeline
//!
//! ```text
//!   stream ─► reader task ─► bounded queue ─► process_line ─► router ─► control points
//!                                                                         │
//!   stream ◄─ writer task ◄─ CommandTransmitter ◄─────────────────────────┘
//! ```
//!
//! Lines are processed one at a time, in arrival order, by the task running
//! [`ConvergePro2Driver::run`]. Heartbeat, bootstrap and keypad sequencing run
//! on their own tasks and only ever enqueue commands.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dsp_core::driver::DriverFactory;
//! use dsp_driver_clearone::ConvergePro2Factory;
//!
//! let driver = ConvergePro2Factory.build(device_table)?;
//! loop {
//!     let stream = connect_tcp("10.0.0.20", 23, timeout).await?;
//!     driver.run(stream).await;
//! }
//! ```

use crate::bootstrap::run_bootstrap;
use crate::config::{ConvergePro2Config, FramingSettings};
use crate::dialer::DialerLine;
use crate::framer::{read_lines, LineFramer, ReadOutcome};
use crate::level::LevelControlPoint;
use crate::liveness::{log_status_change, run_heartbeat};
use crate::login::{login_prompts, LoginAction, LoginHandshake, COMMAND_PROMPT};
use crate::preset::{recall_command, PresetList};
use crate::response::{parse_line, Response, ResponseLine};
use crate::router::{LevelParam, Route, RouteTable};
use crate::transmitter::{write_commands, CommandTransmitter};
use anyhow::{Context, Result};
use dsp_core::capabilities::PresetRecall;
use dsp_core::driver::{Capability, DriverFactory};
use dsp_core::error::{DspError, DspResult};
use dsp_core::health::CommunicationMonitor;
use dsp_core::observable::Observable;
use dsp_core::transport::SerialPortIO;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// =============================================================================
// ConvergePro2Factory - DriverFactory implementation
// =============================================================================

/// Factory for Converge Pro 2 driver instances.
pub struct ConvergePro2Factory;

static CONVERGE_PRO2_CAPABILITIES: &[Capability] = &[
    Capability::VolumeControl,
    Capability::Dialer,
    Capability::PresetRecall,
];

impl DriverFactory for ConvergePro2Factory {
    type Driver = ConvergePro2Driver;

    fn driver_type(&self) -> &'static str {
        "clearone_converge_pro2"
    }

    fn name(&self) -> &'static str {
        "ClearOne Converge Pro 2"
    }

    fn capabilities(&self) -> &'static [Capability] {
        CONVERGE_PRO2_CAPABILITIES
    }

    fn validate(&self, config: &toml::Value) -> Result<()> {
        ConvergePro2Config::from_value(config.clone()).context("Invalid Converge Pro 2 config")?;
        Ok(())
    }

    fn build(&self, config: toml::Value) -> Result<ConvergePro2Driver> {
        let cfg =
            ConvergePro2Config::from_value(config).context("Invalid Converge Pro 2 config")?;
        Ok(ConvergePro2Driver::new(cfg)?)
    }
}

// =============================================================================
// ConvergePro2Driver
// =============================================================================

#[derive(Default)]
struct SessionTasks {
    bootstrap: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

impl SessionTasks {
    fn abort_all(&mut self) {
        for task in [self.bootstrap.take(), self.heartbeat.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

struct Inner {
    box_name: String,
    levels: Vec<Arc<LevelControlPoint>>,
    dialers: Vec<Arc<DialerLine>>,
    presets: PresetList,
    routes: RouteTable,
    transmitter: CommandTransmitter,
    monitor: Arc<CommunicationMonitor>,
    login: Option<Mutex<LoginHandshake>>,
    logged_in: Observable<bool>,
    framing: FramingSettings,
    settle: Duration,
    /// A bootstrap has been issued at least once on the current connection
    initialized: AtomicBool,
    tasks: Mutex<SessionTasks>,
}

/// Driver for one Converge Pro 2 unit.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct ConvergePro2Driver {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ConvergePro2Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvergePro2Driver")
            .field("box_name", &self.inner.box_name)
            .field("levels", &self.inner.levels.len())
            .field("dialers", &self.inner.dialers.len())
            .field("presets", &self.inner.presets.len())
            .field("status", &self.inner.monitor.status())
            .finish()
    }
}

impl ConvergePro2Driver {
    /// Build control points from a validated configuration. No I/O.
    pub fn new(config: ConvergePro2Config) -> DspResult<Self> {
        config.validate()?;

        let transmitter = CommandTransmitter::new();
        let mut routes = RouteTable::new();

        let mut levels = Vec::with_capacity(config.level_controls.len());
        for (key, level) in &config.level_controls {
            let channel = level.channel_identifier().ok_or_else(|| {
                DspError::Configuration(format!("level control '{}' has no channel", key))
            })?;
            routes.add_level_parameter(&level.level_parameter, LevelParam::Gain);
            routes.add_level_parameter(&level.mute_parameter, LevelParam::Mute);
            levels.push(Arc::new(LevelControlPoint::new(
                key.as_str(),
                channel,
                level,
                transmitter.clone(),
            )));
        }

        let mut dialers = Vec::with_capacity(config.dialers.len());
        for (key, dialer) in &config.dialers {
            let channel = dialer.channel_identifier().ok_or_else(|| {
                DspError::Configuration(format!("dialer '{}' has no channel", key))
            })?;
            dialers.push(Arc::new(DialerLine::new(
                key.as_str(),
                channel,
                dialer,
                &config.timing,
                transmitter.clone(),
            )));
        }

        tracing::info!(
            box_name = %config.box_name,
            levels = levels.len(),
            dialers = dialers.len(),
            presets = config.presets.len(),
            login = config.login.is_some(),
            "Converge Pro 2 driver built"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                presets: PresetList::from_config(&config.presets),
                monitor: Arc::new(CommunicationMonitor::new(
                    config.communication_monitor.to_monitor_config(),
                )),
                login: config.login.clone().map(|l| Mutex::new(LoginHandshake::new(l))),
                logged_in: Observable::new("logged_in", false),
                settle: config.timing.bootstrap_settle(),
                framing: config.framing.clone(),
                box_name: config.box_name,
                levels,
                dialers,
                routes,
                transmitter,
                initialized: AtomicBool::new(false),
                tasks: Mutex::new(SessionTasks::default()),
            }),
        })
    }

    pub fn box_name(&self) -> &str {
        &self.inner.box_name
    }

    pub fn levels(&self) -> &[Arc<LevelControlPoint>] {
        &self.inner.levels
    }

    pub fn level(&self, key: &str) -> Option<&Arc<LevelControlPoint>> {
        self.inner.levels.iter().find(|p| p.key() == key)
    }

    pub fn dialers(&self) -> &[Arc<DialerLine>] {
        &self.inner.dialers
    }

    pub fn dialer(&self, key: &str) -> Option<&Arc<DialerLine>> {
        self.inner.dialers.iter().find(|d| d.key() == key)
    }

    pub fn presets(&self) -> &PresetList {
        &self.inner.presets
    }

    /// Link status and heartbeat misses.
    pub fn monitor(&self) -> &CommunicationMonitor {
        &self.inner.monitor
    }

    /// Online/offline feedback
    pub fn online(&self) -> &Observable<bool> {
        self.inner.monitor.online_observable()
    }

    pub fn logged_in(&self) -> &Observable<bool> {
        &self.inner.logged_in
    }

    pub fn is_connected(&self) -> bool {
        self.inner.transmitter.is_connected()
    }

    /// Queue a raw protocol line.
    pub fn send_line(&self, line: impl Into<String>) -> DspResult<()> {
        self.inner.transmitter.try_send_line(line)
    }

    /// Recall a preset by its device identifier.
    pub fn run_preset_by_id(&self, preset_id: &str) {
        let preset_id = preset_id.trim();
        if preset_id.is_empty() {
            tracing::warn!("empty preset id, recall skipped");
            return;
        }
        tracing::info!(preset = preset_id, "recalling preset");
        self.inner.transmitter.send_line(recall_command(preset_id));
    }

    // -------------------------------------------------------------------------
    // Connection lifecycle
    // -------------------------------------------------------------------------

    /// Drive one connection until the peer closes it or a read fails.
    ///
    /// Every call starts a fresh session: the link monitor is reset, the
    /// command queue is replaced and the bootstrap runs again once the session
    /// is ready, so state is never carried over from a previous connection.
    pub async fn run<S>(&self, stream: S) -> ReadOutcome
    where
        S: SerialPortIO + 'static,
    {
        let inner = &self.inner;
        self.begin_session();
        let runtime = tokio::runtime::Handle::current();
        for line in &inner.dialers {
            line.attach_runtime(runtime.clone());
        }

        let (reader, writer) = tokio::io::split(stream);
        let commands = inner.transmitter.connect();
        let terminator = inner.framing.tx_delimiter.clone();
        let writer_task = tokio::spawn(async move {
            if let Err(e) = write_commands(writer, commands, terminator).await {
                tracing::warn!(error = %e, "[TX] write failed");
            }
        });

        let (queue_tx, mut queue_rx) = mpsc::channel(inner.framing.queue_capacity);
        let prompts = if inner.login.is_some() {
            login_prompts()
        } else {
            Vec::new()
        };
        let framer = LineFramer::new(inner.framing.rx_delimiter.as_bytes())
            .with_max_line(inner.framing.max_line_length);
        let reader_task = tokio::spawn(read_lines(reader, framer, queue_tx, prompts));

        if inner.login.is_none() {
            self.session_ready();
        }

        // Single consumer; ends once the reader drops its sender
        while let Some(line) = queue_rx.recv().await {
            self.process_line(&line);
        }

        let outcome = match reader_task.await {
            Ok(outcome) => outcome,
            Err(e) => ReadOutcome::Error(e.to_string()),
        };
        self.end_session();
        writer_task.abort();
        tracing::info!(box_name = %inner.box_name, ?outcome, "connection closed");
        outcome
    }

    fn begin_session(&self) {
        let inner = &self.inner;
        inner.tasks.lock().abort_all();
        inner.monitor.reset();
        inner.initialized.store(false, Ordering::SeqCst);
        inner.logged_in.set(false);
        if let Some(login) = &inner.login {
            login.lock().reset();
        }
        tracing::info!(box_name = %inner.box_name, "connection attached");
    }

    fn end_session(&self) {
        let inner = &self.inner;
        inner.transmitter.disconnect();
        inner.tasks.lock().abort_all();
        if let Some(change) = inner.monitor.mark_disconnected() {
            log_status_change(change);
        }
        inner.logged_in.set(false);
    }

    /// Commands are accepted: start the heartbeat and the bootstrap.
    fn session_ready(&self) {
        let inner = &self.inner;
        inner.logged_in.set(true);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no runtime, heartbeat not started");
            return;
        };
        let heartbeat = handle.spawn(run_heartbeat(
            inner.monitor.clone(),
            inner.transmitter.clone(),
            inner.box_name.clone(),
        ));
        if let Some(old) = inner.tasks.lock().heartbeat.replace(heartbeat) {
            old.abort();
        }
        self.start_bootstrap();
    }

    /// (Re)issue the full bootstrap sequence, cancelling one in progress.
    pub fn start_bootstrap(&self) {
        let inner = &self.inner;
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no runtime, bootstrap not started");
            return;
        };
        inner.initialized.store(true, Ordering::SeqCst);
        let task = handle.spawn(run_bootstrap(
            inner.levels.clone(),
            inner.dialers.clone(),
            inner.settle,
        ));
        if let Some(old) = inner.tasks.lock().bootstrap.replace(task) {
            old.abort();
        }
    }

    // -------------------------------------------------------------------------
    // Response pipeline
    // -------------------------------------------------------------------------

    /// Handle one received line.
    pub fn process_line(&self, line: &str) {
        let inner = &self.inner;
        tracing::debug!(%line, "[RX]");

        if let Some(change) = inner.monitor.record_traffic() {
            log_status_change(change);
            if change.is_recovery() && inner.initialized.load(Ordering::SeqCst) {
                tracing::info!("communication restored, resynchronizing");
                self.start_bootstrap();
            }
        }

        let line = line.trim();
        if line.is_empty() {
            return;
        }

        if let Some(login) = &inner.login {
            let action = login.lock().on_line(line);
            match action {
                LoginAction::Respond(reply) => {
                    inner.transmitter.send_line(reply);
                    return;
                }
                LoginAction::Completed => {
                    self.session_ready();
                    return;
                }
                LoginAction::Rejected => {
                    let error = DspError::Login("credentials rejected".into());
                    tracing::error!(box_name = %inner.box_name, %error, "login failed");
                    return;
                }
                LoginAction::None => {}
            }
            if line == COMMAND_PROMPT {
                return;
            }
        }

        match parse_line(line) {
            Ok(Response::Error(message)) => {
                tracing::warn!(%message, "device reported error");
            }
            Ok(Response::Message(response)) => self.route(&response),
            Err(e) => {
                tracing::debug!(error = %e, "unparsed line");
            }
        }
    }

    fn route(&self, response: &ResponseLine) {
        let inner = &self.inner;
        let route = inner.routes.lookup(&response.parameter);

        // Query and subscription echoes carry no value
        if response.value.is_empty() && matches!(route, Route::Level(_) | Route::Dialer(_)) {
            tracing::trace!(channel = %response.channel, parameter = %response.parameter, "echo without value");
            return;
        }

        match route {
            Route::Level(param) => {
                let mut matched = false;
                for point in inner
                    .levels
                    .iter()
                    .filter(|p| p.is_enabled() && p.matches(&response.channel))
                {
                    matched = true;
                    point.apply(param, response);
                }
                if !matched {
                    tracing::trace!(channel = %response.channel, parameter = %response.parameter, "no level control for channel");
                }
            }
            Route::Dialer(param) => {
                let mut matched = false;
                for line in inner.dialers.iter().filter(|d| d.matches(&response.channel)) {
                    matched = true;
                    line.apply(param, response);
                }
                if !matched {
                    tracing::trace!(channel = %response.channel, parameter = %response.parameter, "no dialer for channel");
                }
            }
            Route::Heartbeat => {
                tracing::trace!(serial = %response.value, "heartbeat answered");
            }
            Route::DeviceError => {
                tracing::warn!(channel = %response.channel, value = %response.value, "device error notification");
            }
            Route::Ignored => {
                tracing::trace!(parameter = %response.parameter, "ignored parameter");
            }
            Route::Unhandled => {
                tracing::info!(
                    command_type = %response.command_type,
                    channel = %response.channel,
                    parameter = %response.parameter,
                    "unhandled parameter"
                );
            }
        }
    }
}

impl PresetRecall for ConvergePro2Driver {
    fn recall_preset(&self, index: u16) {
        match self.inner.presets.by_index(index) {
            Some(preset) => self.run_preset_by_id(&preset.preset),
            None => tracing::warn!(
                index,
                count = self.inner.presets.len(),
                "preset index out of range"
            ),
        }
    }

    fn recall_preset_named(&self, name: &str) {
        match self.inner.presets.by_name(name) {
            Some(preset) => self.run_preset_by_id(&preset.preset),
            None => tracing::warn!(name, "unknown preset"),
        }
    }
}
