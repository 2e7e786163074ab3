//! Task wiring for `std` targets.
//!
//! [`spawn_system`] restores the register table, creates the channels and
//! shared status, and starts one named thread per task:
//!
//! | Task | Stack | Priority | Joins |
//! |------|-------|----------|-------|
//! | `controller` | 8 KiB | 5 | input, wireless |
//! | `wireless` | 8 KiB | 4 | |
//! | `input` | 4 KiB | 4 | |
//! | `guardian` | 4 KiB | 3 | |
//!
//! Priorities only apply on ESP-IDF, where they are set through
//! `ThreadSpawnConfiguration` before each spawn. On the desktop they are
//! ignored.
//!
//! When the session ends the controller thread collects the button from the
//! Input Handler and the register values from the Wireless Interface, then
//! runs the [`ShutdownOrchestrator`]. A [`ShutdownReport`] is published right
//! before sleep entry.

use crate::actuator::{ActuatorController, DriveOutputs, Handoff, Peers};
use crate::config::DeviceConfig;
use crate::input::InputHandler;
use crate::messages::ControlMessage;
use crate::power::PowerGuardian;
use crate::priority::ShutdownReason;
use crate::shutdown::ShutdownOrchestrator;
use crate::status::{LinkStatus, StatusBoard};
use crate::store::ConfigStore;
use crate::traits::{
    ActuatorDriver, BackEmfSensor, ButtonInput, Clock, Delay, Indicator, SleepControl,
    VoltageSensor, WirelessTransport,
};
use crate::wireless::{ConfigHandoff, ConfigRegisters, WirelessInterface};
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

// ============================================================================
// Tasks
// ============================================================================

struct TaskSpec {
    name: &'static str,
    #[cfg_attr(not(feature = "esp32"), allow(dead_code))]
    c_name: &'static [u8],
    stack_size: usize,
    #[cfg_attr(not(feature = "esp32"), allow(dead_code))]
    priority: u8,
}

const CONTROLLER_TASK: TaskSpec = TaskSpec {
    name: "controller",
    c_name: b"controller\0",
    stack_size: 8192,
    priority: 5,
};

const WIRELESS_TASK: TaskSpec = TaskSpec {
    name: "wireless",
    c_name: b"wireless\0",
    stack_size: 8192,
    priority: 4,
};

const INPUT_TASK: TaskSpec = TaskSpec {
    name: "input",
    c_name: b"input\0",
    stack_size: 4096,
    priority: 4,
};

const GUARDIAN_TASK: TaskSpec = TaskSpec {
    name: "guardian",
    c_name: b"guardian\0",
    stack_size: 4096,
    priority: 3,
};

fn spawn_task<F, R>(task: &TaskSpec, f: F) -> Result<JoinHandle<R>, RuntimeError>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    #[cfg(feature = "esp32")]
    {
        use esp_idf_hal::task::thread::ThreadSpawnConfiguration;
        ThreadSpawnConfiguration {
            name: Some(task.c_name),
            stack_size: task.stack_size,
            priority: task.priority,
            ..Default::default()
        }
        .set()
        .map_err(RuntimeError::ThreadConfig)?;
    }

    let handle = thread::Builder::new()
        .name(task.name.into())
        .stack_size(task.stack_size)
        .spawn(f)
        .map_err(|source| RuntimeError::Spawn {
            task: task.name,
            source,
        });

    #[cfg(feature = "esp32")]
    {
        use esp_idf_hal::task::thread::ThreadSpawnConfiguration;
        if let Err(e) = ThreadSpawnConfiguration::default().set() {
            log::warn!("Failed to reset thread configuration: {:?}", e);
        }
    }

    if handle.is_ok() {
        log::debug!("Spawned {} task", task.name);
    }
    handle
}

// ============================================================================
// Errors
// ============================================================================

/// Errors from starting or supervising the tasks.
#[derive(Debug)]
pub enum RuntimeError {
    /// A thread could not be created.
    Spawn {
        /// Task name.
        task: &'static str,
        /// OS error.
        source: std::io::Error,
    },
    /// ESP-IDF rejected the spawn configuration.
    #[cfg(feature = "esp32")]
    ThreadConfig(esp_idf_sys::EspError),
    /// The controller thread ended without a report.
    ControllerLost,
    /// No report within the wait.
    Timeout,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Spawn { task, source } => write!(f, "failed to spawn {} task: {}", task, source),
            #[cfg(feature = "esp32")]
            RuntimeError::ThreadConfig(e) => write!(f, "thread configuration rejected: {}", e),
            RuntimeError::ControllerLost => write!(f, "controller stopped without a shutdown report"),
            RuntimeError::Timeout => write!(f, "timed out waiting for shutdown"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ============================================================================
// System
// ============================================================================

/// Every device the tasks own.
pub struct Hardware<A, L, E, B, V, T, S, P> {
    /// H-bridge, owned by the controller.
    pub actuator: A,
    /// RGB indicator, owned by the controller.
    pub indicator: L,
    /// Back-EMF channel, owned by the controller.
    pub back_emf: E,
    /// Button, owned by the Input Handler.
    pub button: B,
    /// Battery channel, owned by the Power Guardian.
    pub battery: V,
    /// Register transport, owned by the Wireless Interface.
    pub transport: T,
    /// Configuration storage.
    pub store: S,
    /// Sleep controller, owned by the Shutdown Orchestrator.
    pub sleep: P,
}

/// Summary of a finished session, published right before sleep entry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShutdownReport {
    /// Why the session ended.
    pub reason: ShutdownReason,
    /// Register values handed over by the Wireless Interface, if it stopped
    /// cleanly.
    pub config: Option<ConfigHandoff>,
    /// Whether the Input Handler returned the button.
    pub button_returned: bool,
}

/// Handle to a running system.
pub struct SystemHandle {
    reports: Receiver<ShutdownReport>,
    /// Status shared by the tasks.
    pub status: Arc<StatusBoard>,
    /// Radio link flags, for the transport's event callbacks.
    pub link: Arc<LinkStatus>,
}

impl SystemHandle {
    /// Blocks until the session ends.
    pub fn wait_for_shutdown(&self) -> Result<ShutdownReport, RuntimeError> {
        self.reports.recv().map_err(|_| RuntimeError::ControllerLost)
    }

    /// Waits at most `timeout` for the session to end.
    pub fn wait_for_shutdown_timeout(&self, timeout: Duration) -> Result<ShutdownReport, RuntimeError> {
        self.reports.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => RuntimeError::Timeout,
            RecvTimeoutError::Disconnected => RuntimeError::ControllerLost,
        })
    }
}

/// Starts every task. Returns once all threads are running.
///
/// `link` is shared with the transport's connection callbacks; pass
/// `Arc::new(LinkStatus::new())` when the transport has none.
pub fn spawn_system<A, L, E, B, V, T, S, P, C, D>(
    hardware: Hardware<A, L, E, B, V, T, S, P>,
    config: &DeviceConfig,
    link: Arc<LinkStatus>,
    clock: C,
    delay: D,
) -> Result<SystemHandle, RuntimeError>
where
    A: ActuatorDriver + Send + 'static,
    L: Indicator + Send + 'static,
    E: BackEmfSensor + Send + 'static,
    B: ButtonInput + Send + 'static,
    V: VoltageSensor + Send + 'static,
    T: WirelessTransport + Send + 'static,
    S: ConfigStore + Send + 'static,
    P: SleepControl + Send + 'static,
    C: Clock + Clone + Send + 'static,
    D: Delay + Clone + Send + 'static,
{
    let Hardware {
        actuator,
        indicator,
        back_emf,
        button,
        battery,
        transport,
        mut store,
        sleep,
    } = hardware;

    let registers = ConfigRegisters::restore(&mut store);
    let status = Arc::new(StatusBoard::new(registers.mode()));

    let (to_controller, controller_inbox) = mpsc::channel::<ControlMessage>();
    let (to_input, input_inbox) = mpsc::channel::<ControlMessage>();
    let (to_wireless, wireless_inbox) = mpsc::channel::<ControlMessage>();
    let (report_tx, reports) = mpsc::channel::<ShutdownReport>();

    let controller = ActuatorController::new(
        DriveOutputs::new(actuator, indicator),
        back_emf,
        controller_inbox,
        Peers::new(to_input, to_wireless.clone(), status.clone()),
        clock.clone(),
    )
    .with_timing(config.controller.clone())
    .with_tuning(registers.live_tuning())
    .with_mode(registers.mode());

    let input = InputHandler::new(
        button,
        input_inbox,
        to_controller.clone(),
        to_wireless,
        clock.clone(),
        status.clone(),
        config.button.clone(),
    );

    let wireless = WirelessInterface::new(
        transport,
        wireless_inbox,
        to_controller.clone(),
        clock,
        registers,
        link.clone(),
        status.clone(),
        config.wireless.clone(),
    );

    let guardian = PowerGuardian::new(battery, to_controller, status.clone(), config.battery.clone());

    let input_delay = delay.clone();
    let input_task = spawn_task(&INPUT_TASK, move || input.run(input_delay))?;
    let wireless_task = spawn_task(&WIRELESS_TASK, move || wireless.run())?;
    let guardian_delay = delay.clone();
    // not joined; it stops on its own or dies with the sleep entry
    spawn_task(&GUARDIAN_TASK, move || guardian.run(guardian_delay))?;

    let shutdown_timing = config.shutdown.clone();
    spawn_task(&CONTROLLER_TASK, move || {
        let Handoff { outputs, reason } = controller.run();
        log::info!("Session ended: {:?}", reason);

        let button = match input_task.join() {
            Ok(button) => Some(button),
            Err(_) => {
                log::error!("Input handler panicked");
                None
            }
        };
        let handoff = match wireless_task.join() {
            Ok(handoff) => Some(handoff),
            Err(_) => {
                log::error!("Wireless interface panicked");
                None
            }
        };

        let report = ShutdownReport {
            reason,
            config: handoff,
            button_returned: button.is_some(),
        };
        let mut orchestrator = ShutdownOrchestrator::new(outputs, button, store, sleep, delay)
            .with_config(handoff)
            .with_timing(shutdown_timing);
        orchestrator.prepare();
        // nobody may be waiting on the desktop; on the device the bin exits
        let _ = report_tx.send(report);
        orchestrator.sleep()
    })?;

    log::info!("All tasks started");
    Ok(SystemHandle {
        reports,
        status,
        link,
    })
}
