//! Daemon supervision: PID file, health probing, process control, and the
//! [`Supervisor`] that ties them together.

mod health;
mod pid_file;
mod process;
mod supervisor;

pub use health::{HealthProbe, HttpHealthProbe, PROBE_TIMEOUT};
pub use pid_file::{PidFile, PidInfo};
pub use process::{
    resolve_daemon_executable, DetachedLauncher, Launcher, ProcessControl, Signal,
    SystemProcess, DAEMON_EXECUTABLE,
};
pub use supervisor::{
    CancelToken, DaemonStatus, HealthSchedule, StopOutcome, StopPolicy, Supervisor,
};
