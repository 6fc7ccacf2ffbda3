//! OS process primitives used by the supervisor: liveness checks, signals, and
//! launching the daemon detached from the caller's terminal.
//!
//! Platform differences stay in this file. On Linux the daemon gets its own session
//! (`setsid`); on other unix systems it gets its own process group.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::error::{CortexError, Result};

/// File name of the daemon binary.
pub const DAEMON_EXECUTABLE: &str = "cortexd";

/// `cortexd` only accepts `--port` on its `serve` subcommand.
const SERVE_SUBCOMMAND: &str = "serve";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Graceful shutdown request (SIGTERM).
    Terminate,
    /// Forced termination (SIGKILL).
    Kill,
}

pub trait ProcessControl: Send + Sync {
    fn is_alive(&self, pid: u32) -> bool;
    fn signal(&self, pid: u32, signal: Signal) -> std::io::Result<()>;
}

/// Real processes via `kill(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcess;

/// `kill(pid, 0)` would address our own process group, and values past `i32::MAX`
/// wrap to negative group IDs.
#[cfg(unix)]
fn to_pid(pid: u32) -> Option<libc::pid_t> {
    match libc::pid_t::try_from(pid) {
        Ok(p) if p > 0 => Some(p),
        _ => None,
    }
}

impl ProcessControl for SystemProcess {
    #[cfg(unix)]
    fn is_alive(&self, pid: u32) -> bool {
        let Some(pid) = to_pid(pid) else {
            return false;
        };
        // SAFETY: signal 0 performs only the existence and permission check.
        #[allow(unsafe_code)]
        let rc = unsafe { libc::kill(pid, 0) };
        // EPERM means the process exists but belongs to someone else.
        rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    #[cfg(not(unix))]
    fn is_alive(&self, _pid: u32) -> bool {
        false
    }

    #[cfg(unix)]
    fn signal(&self, pid: u32, signal: Signal) -> std::io::Result<()> {
        let pid = to_pid(pid).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid pid")
        })?;
        let sig = match signal {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        };
        // SAFETY: plain kill(2) on a single positive pid.
        #[allow(unsafe_code)]
        let rc = unsafe { libc::kill(pid, sig) };
        if rc == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    fn signal(&self, _pid: u32, _signal: Signal) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "signals are not supported on this platform",
        ))
    }
}

/// Starts the daemon listening on `port` and returns its pid.
pub trait Launcher: Send + Sync {
    fn launch(&self, port: u16) -> Result<u32>;
}

/// Launches an executable detached: new session or process group, all standard
/// streams on the null device. The port is passed as a trailing `--port <n>`.
#[derive(Debug, Clone)]
pub struct DetachedLauncher {
    executable: PathBuf,
    args: Vec<String>,
}

impl DetachedLauncher {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        DetachedLauncher {
            executable: executable.into(),
            args: Vec::new(),
        }
    }

    /// Launcher for the `cortexd` binary found by [`resolve_daemon_executable`].
    pub fn cortexd() -> Result<Self> {
        Ok(Self::cortexd_at(resolve_daemon_executable(DAEMON_EXECUTABLE)?))
    }

    /// Runs `<executable> serve --port <n>`.
    pub fn cortexd_at(executable: impl Into<PathBuf>) -> Self {
        Self::new(executable).arg(SERVE_SUBCOMMAND)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl Launcher for DetachedLauncher {
    fn launch(&self, port: u16) -> Result<u32> {
        let mut cmd = Command::new(&self.executable);
        cmd.args(&self.args)
            .arg("--port")
            .arg(port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        detach(&mut cmd);

        let mut child = cmd.spawn().map_err(|e| {
            CortexError::io(format!("spawning {}", self.executable.display()), e)
        })?;
        let pid = child.id();

        // Reap the child when it exits so a dead daemon never lingers as a zombie
        // that still answers kill(pid, 0).
        let spawned = std::thread::Builder::new()
            .name(format!("reap-{pid}"))
            .spawn(move || {
                let _ = child.wait();
            });
        if let Err(err) = spawned {
            warn!(error = %err, pid, "Could not start reaper thread");
        }

        debug!(pid, executable = %self.executable.display(), "Daemon process spawned");
        Ok(pid)
    }
}

#[cfg(target_os = "linux")]
fn detach(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    // SAFETY: setsid is async-signal-safe and touches no parent state.
    #[allow(unsafe_code)]
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
fn detach(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn detach(_cmd: &mut Command) {}

/// Finds `name` next to the running executable, then on `PATH`.
pub fn resolve_daemon_executable(name: &str) -> Result<PathBuf> {
    let colocated = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(name)));
    if let Some(path) = colocated.filter(|p| is_executable(p)) {
        return Ok(path);
    }

    find_on_path(name, std::env::var_os("PATH").as_deref()).ok_or_else(|| {
        CortexError::DaemonExecutableNotFound {
            name: name.to_string(),
        }
    })
}

fn find_on_path(name: &str, path_var: Option<&std::ffi::OsStr>) -> Option<PathBuf> {
    std::env::split_paths(path_var?)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
