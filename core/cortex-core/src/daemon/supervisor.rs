//! Daemon lifecycle: start on demand, report status, stop.
//!
//! ```text
//! NotRunning ─spawn─▶ HealthChecking ─probe ok─▶ Healthy
//!                          │                        │
//!                    schedule exhausted        stop / death
//!                          ▼                        ▼
//!                     StartFailed              NotRunning
//! ```
//!
//! The PID file is the only shared state. It is written right after a successful
//! spawn and removed whenever the process it names is found dead or is stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::health::{HealthProbe, HttpHealthProbe};
use super::pid_file::{PidFile, PidInfo};
use super::process::{DetachedLauncher, Launcher, ProcessControl, Signal, SystemProcess};
use crate::config::DaemonConfig;
use crate::error::{CortexError, Result};
use crate::storage::StorageConfig;

/// Longest uninterrupted sleep while waiting on a [`CancelToken`].
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Waits between health probes after a spawn.
///
/// One probe follows `initial_delay`, one follows each entry of `intervals`, and a
/// last one follows `final_wait`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSchedule {
    pub initial_delay: Duration,
    pub intervals: Vec<Duration>,
    pub final_wait: Duration,
}

impl Default for HealthSchedule {
    fn default() -> Self {
        HealthSchedule {
            initial_delay: Duration::from_millis(100),
            intervals: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(5),
            ],
            final_wait: Duration::from_secs(5),
        }
    }
}

impl HealthSchedule {
    /// Same number of probes with no waiting in between.
    pub fn immediate(intervals: usize) -> Self {
        HealthSchedule {
            initial_delay: Duration::ZERO,
            intervals: vec![Duration::ZERO; intervals],
            final_wait: Duration::ZERO,
        }
    }

    pub fn attempts(&self) -> usize {
        self.intervals.len() + 2
    }

    fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::once(self.initial_delay)
            .chain(self.intervals.iter().copied())
            .chain(std::iter::once(self.final_wait))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopPolicy {
    /// How long SIGTERM gets before escalating to SIGKILL.
    pub grace: Duration,
    /// Liveness polling interval while waiting.
    pub poll: Duration,
    /// How long to wait for the process to vanish after SIGKILL.
    pub kill_wait: Duration,
}

impl Default for StopPolicy {
    fn default() -> Self {
        StopPolicy {
            grace: Duration::from_secs(5),
            poll: Duration::from_millis(100),
            kill_wait: Duration::from_secs(1),
        }
    }
}

/// Cooperative cancellation for [`Supervisor::ensure_running_until`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` in short slices, bailing out once cancelled.
    fn sleep(&self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return Err(CortexError::Cancelled);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }
            thread::sleep(remaining.min(CANCEL_POLL));
        }
    }
}

/// Snapshot returned by [`Supervisor::status`].
///
/// `running` is true only when the process is alive and healthy. An alive but
/// unhealthy daemon still reports its PID details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub port: Option<u16>,
    pub version: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime: Option<chrono::Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited within the grace period after SIGTERM.
    Graceful,
    /// Needed SIGKILL.
    Forced,
    /// Was gone before SIGTERM could be delivered.
    AlreadyExited,
}

pub struct Supervisor {
    pid_file: PidFile,
    port: u16,
    version: String,
    probe: Arc<dyn HealthProbe>,
    process: Arc<dyn ProcessControl>,
    /// Resolved on first spawn when not injected.
    launcher: Option<Arc<dyn Launcher>>,
    schedule: HealthSchedule,
    stop_policy: StopPolicy,
}

impl Supervisor {
    pub fn new(storage: &StorageConfig, config: &DaemonConfig) -> Self {
        Supervisor {
            pid_file: PidFile::new(storage.pid_file()),
            port: config.port,
            version: env!("CARGO_PKG_VERSION").to_string(),
            probe: Arc::new(HttpHealthProbe::new(&config.base_url())),
            process: Arc::new(SystemProcess),
            launcher: None,
            schedule: HealthSchedule::default(),
            stop_policy: StopPolicy::default(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_process(mut self, process: Arc<dyn ProcessControl>) -> Self {
        self.process = process;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn with_schedule(mut self, schedule: HealthSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.stop_policy = policy;
        self
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Starts the daemon unless it already answers health checks. Blocks through the
    /// whole health schedule in the worst case.
    pub fn ensure_running(&self) -> Result<()> {
        self.ensure_running_until(&CancelToken::new())
    }

    /// [`Self::ensure_running`] that gives up with [`CortexError::Cancelled`] once
    /// `cancel` fires.
    pub fn ensure_running_until(&self, cancel: &CancelToken) -> Result<()> {
        if self.probe.check() {
            debug!(port = self.port, "Daemon already healthy");
            return Ok(());
        }

        // A live process that isn't healthy yet is probably still starting; spawning
        // a second one would orphan it.
        match self.validate_pid_file()? {
            Some(existing) => {
                info!(pid = existing.pid, "Daemon process alive but not healthy, waiting");
            }
            None => {
                self.spawn(self.port)?;
            }
        }

        self.wait_healthy(cancel)
    }

    /// Single health probe.
    pub fn is_running(&self) -> bool {
        self.probe.check()
    }

    pub fn status(&self) -> Result<DaemonStatus> {
        let Some(info) = self.pid_file.read()? else {
            return Ok(DaemonStatus::default());
        };

        if !self.process.is_alive(info.pid) {
            info!(pid = info.pid, "Removing stale PID file");
            self.pid_file.remove()?;
            return Ok(DaemonStatus::default());
        }

        Ok(DaemonStatus {
            running: self.probe.check(),
            pid: Some(info.pid),
            port: Some(info.port),
            uptime: Some(info.uptime(Utc::now())),
            started_at: Some(info.started_at),
            version: Some(info.version),
        })
    }

    /// Removes the PID file if the process it names is dead. Returns the PID info
    /// when a live process remains.
    pub fn validate_pid_file(&self) -> Result<Option<PidInfo>> {
        let Some(info) = self.pid_file.read()? else {
            return Ok(None);
        };
        if self.process.is_alive(info.pid) {
            return Ok(Some(info));
        }
        info!(pid = info.pid, path = %self.pid_file.path().display(), "Removing stale PID file");
        self.pid_file.remove()?;
        Ok(None)
    }

    /// Launches a detached daemon on `port` and records it in the PID file. If the
    /// PID file can't be written the new process is killed.
    pub fn spawn(&self, port: u16) -> Result<PidInfo> {
        let launcher = match &self.launcher {
            Some(launcher) => Arc::clone(launcher),
            None => Arc::new(DetachedLauncher::cortexd()?),
        };
        let pid = launcher.launch(port)?;
        let info = PidInfo::new(pid, port, self.version.clone());

        if let Err(err) = self.pid_file.write(&info) {
            warn!(pid, error = %err, "Failed to write PID file, killing daemon");
            if let Err(kill_err) = self.process.signal(pid, Signal::Kill) {
                warn!(pid, error = %kill_err, "Failed to kill untracked daemon");
            }
            return Err(err);
        }

        info!(pid, port, "Daemon spawned");
        Ok(info)
    }

    /// SIGTERM, then SIGKILL once the grace period runs out. The PID file is removed
    /// on every path that finds one.
    pub fn stop(&self) -> Result<StopOutcome> {
        let Some(info) = self.pid_file.read()? else {
            return Err(CortexError::DaemonNotRunning {
                reason: "no PID file".to_string(),
            });
        };
        let pid = info.pid;

        if !self.process.is_alive(pid) {
            self.pid_file.remove()?;
            return Err(CortexError::DaemonNotRunning {
                reason: "stale PID file".to_string(),
            });
        }

        let outcome = self.terminate(pid);
        self.pid_file.remove()?;
        info!(pid, outcome = ?outcome, "Daemon stopped");
        Ok(outcome)
    }

    fn terminate(&self, pid: u32) -> StopOutcome {
        if let Err(err) = self.process.signal(pid, Signal::Terminate) {
            debug!(pid, error = %err, "SIGTERM failed, assuming process already exited");
            return StopOutcome::AlreadyExited;
        }

        if self.wait_for_exit(pid, self.stop_policy.grace) {
            return StopOutcome::Graceful;
        }

        warn!(pid, grace = ?self.stop_policy.grace, "Daemon ignored SIGTERM, sending SIGKILL");
        if let Err(err) = self.process.signal(pid, Signal::Kill) {
            debug!(pid, error = %err, "SIGKILL failed");
        }
        if !self.wait_for_exit(pid, self.stop_policy.kill_wait) {
            warn!(pid, "Daemon still alive after SIGKILL");
        }
        StopOutcome::Forced
    }

    fn wait_for_exit(&self, pid: u32, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.process.is_alive(pid) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(self.stop_policy.poll);
        }
    }

    fn wait_healthy(&self, cancel: &CancelToken) -> Result<()> {
        for (attempt, delay) in self.schedule.delays().enumerate() {
            cancel.sleep(delay)?;
            if self.probe.check() {
                info!(attempt = attempt + 1, "Daemon healthy");
                return Ok(());
            }
            debug!(attempt = attempt + 1, "Daemon not healthy yet");
        }
        Err(CortexError::DaemonStartFailed {
            attempts: self.schedule.attempts(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashSet, VecDeque};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Answers from a script, then repeats `fallback`.
    struct ScriptedProbe {
        script: Mutex<VecDeque<bool>>,
        fallback: bool,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(script: &[bool], fallback: bool) -> Arc<Self> {
            Arc::new(ScriptedProbe {
                script: Mutex::new(script.iter().copied().collect()),
                fallback,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl HealthProbe for ScriptedProbe {
        fn check(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script.lock().unwrap().pop_front().unwrap_or(self.fallback)
        }
    }

    /// Process table double. `survives_term` keeps processes alive through SIGTERM.
    #[derive(Default)]
    struct FakeProcesses {
        alive: Mutex<HashSet<u32>>,
        signals: Mutex<Vec<(u32, Signal)>>,
        survives_term: bool,
    }

    impl FakeProcesses {
        fn with_alive(pids: &[u32]) -> Arc<Self> {
            Arc::new(FakeProcesses {
                alive: Mutex::new(pids.iter().copied().collect()),
                ..Default::default()
            })
        }

        fn stubborn(pids: &[u32]) -> Arc<Self> {
            Arc::new(FakeProcesses {
                alive: Mutex::new(pids.iter().copied().collect()),
                survives_term: true,
                ..Default::default()
            })
        }

        fn signals(&self) -> Vec<(u32, Signal)> {
            self.signals.lock().unwrap().clone()
        }
    }

    impl ProcessControl for FakeProcesses {
        fn is_alive(&self, pid: u32) -> bool {
            self.alive.lock().unwrap().contains(&pid)
        }

        fn signal(&self, pid: u32, signal: Signal) -> std::io::Result<()> {
            self.signals.lock().unwrap().push((pid, signal));
            let mut alive = self.alive.lock().unwrap();
            if !alive.contains(&pid) {
                return Err(std::io::Error::from_raw_os_error(libc::ESRCH));
            }
            if signal == Signal::Kill || !self.survives_term {
                alive.remove(&pid);
            }
            Ok(())
        }
    }

    struct FakeLauncher {
        pid: u32,
        launches: Mutex<Vec<u16>>,
        processes: Arc<FakeProcesses>,
    }

    impl FakeLauncher {
        fn new(pid: u32, processes: Arc<FakeProcesses>) -> Arc<Self> {
            Arc::new(FakeLauncher {
                pid,
                launches: Mutex::new(Vec::new()),
                processes,
            })
        }

        fn launches(&self) -> Vec<u16> {
            self.launches.lock().unwrap().clone()
        }
    }

    impl Launcher for FakeLauncher {
        fn launch(&self, port: u16) -> Result<u32> {
            self.launches.lock().unwrap().push(port);
            self.processes.alive.lock().unwrap().insert(self.pid);
            Ok(self.pid)
        }
    }

    fn quick_stop() -> StopPolicy {
        StopPolicy {
            grace: Duration::from_millis(30),
            poll: Duration::from_millis(1),
            kill_wait: Duration::from_millis(10),
        }
    }

    fn supervisor(
        temp: &TempDir,
        probe: Arc<ScriptedProbe>,
        processes: Arc<FakeProcesses>,
        launcher: Arc<FakeLauncher>,
    ) -> Supervisor {
        let storage = StorageConfig::with_root(temp.path().join("home"));
        Supervisor::new(&storage, &DaemonConfig::default())
            .with_probe(probe)
            .with_process(processes)
            .with_launcher(launcher)
            .with_schedule(HealthSchedule::immediate(3))
            .with_stop_policy(quick_stop())
    }

    #[test]
    fn default_schedule_probes_five_times() {
        let schedule = HealthSchedule::default();
        assert_eq!(schedule.attempts(), 5);
        let total: Duration = schedule.delays().sum();
        assert_eq!(total, Duration::from_millis(13_100));
    }

    #[test]
    fn ensure_running_is_noop_when_healthy() {
        let temp = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[]);
        let launcher = FakeLauncher::new(900, processes.clone());
        let probe = ScriptedProbe::new(&[], true);
        let sup = supervisor(&temp, probe.clone(), processes, launcher.clone());

        sup.ensure_running().unwrap();

        assert_eq!(probe.calls(), 1);
        assert!(launcher.launches().is_empty());
        assert!(!sup.pid_file().exists());
    }

    #[test]
    fn ensure_running_replaces_stale_pid_file_and_spawns() {
        let temp = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[]);
        let launcher = FakeLauncher::new(900, processes.clone());
        let probe = ScriptedProbe::new(&[false, false], true);
        let sup = supervisor(&temp, probe.clone(), processes, launcher.clone());
        sup.pid_file().write(&PidInfo::new(123, 4200, "old")).unwrap();

        sup.ensure_running().unwrap();

        assert_eq!(launcher.launches(), vec![DaemonConfig::default().port]);
        let info = sup.pid_file().read().unwrap().unwrap();
        assert_eq!(info.pid, 900);
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        // Initial probe, one failed poll, then healthy.
        assert_eq!(probe.calls(), 3);
    }

    #[test]
    fn ensure_running_waits_on_live_unhealthy_daemon() {
        let temp = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[555]);
        let launcher = FakeLauncher::new(900, processes.clone());
        let probe = ScriptedProbe::new(&[false], true);
        let sup = supervisor(&temp, probe, processes, launcher.clone());
        sup.pid_file().write(&PidInfo::new(555, 4200, "v")).unwrap();

        sup.ensure_running().unwrap();

        assert!(launcher.launches().is_empty());
        assert_eq!(sup.pid_file().read().unwrap().unwrap().pid, 555);
    }

    #[test]
    fn ensure_running_fails_after_full_schedule() {
        let temp = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[]);
        let launcher = FakeLauncher::new(900, processes.clone());
        let probe = ScriptedProbe::new(&[], false);
        let sup = supervisor(&temp, probe.clone(), processes, launcher);

        let err = sup.ensure_running().unwrap_err();

        assert!(matches!(err, CortexError::DaemonStartFailed { attempts: 5 }));
        assert_eq!(probe.calls(), 1 + 5);
    }

    #[test]
    fn cancelled_wait_returns_cancelled() {
        let temp = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[]);
        let launcher = FakeLauncher::new(900, processes.clone());
        let probe = ScriptedProbe::new(&[], false);
        let sup = supervisor(&temp, probe, processes, launcher).with_schedule(HealthSchedule {
            initial_delay: Duration::from_secs(30),
            intervals: vec![],
            final_wait: Duration::ZERO,
        });

        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            trigger.cancel();
        });

        let started = Instant::now();
        let err = sup.ensure_running_until(&cancel).unwrap_err();
        handle.join().unwrap();

        assert!(matches!(err, CortexError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn spawn_kills_process_when_pid_file_cannot_be_written() {
        let temp = TempDir::new().unwrap();
        // A regular file where the home directory should be.
        let home = temp.path().join("home");
        fs_err::write(&home, "not a directory").unwrap();

        let processes = FakeProcesses::with_alive(&[]);
        let launcher = FakeLauncher::new(900, processes.clone());
        let sup = Supervisor::new(&StorageConfig::with_root(home), &DaemonConfig::default())
            .with_probe(ScriptedProbe::new(&[], false))
            .with_process(processes.clone())
            .with_launcher(launcher);

        assert!(sup.spawn(4300).is_err());
        assert_eq!(processes.signals(), vec![(900, Signal::Kill)]);
        assert!(!processes.is_alive(900));
    }

    #[test]
    fn status_without_pid_file_is_not_running() {
        let temp = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[]);
        let launcher = FakeLauncher::new(900, processes.clone());
        let sup = supervisor(&temp, ScriptedProbe::new(&[], true), processes, launcher);

        assert_eq!(sup.status().unwrap(), DaemonStatus::default());
    }

    #[test]
    fn status_removes_pid_file_of_dead_process() {
        let temp = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[]);
        let launcher = FakeLauncher::new(900, processes.clone());
        let sup = supervisor(&temp, ScriptedProbe::new(&[], true), processes, launcher);
        sup.pid_file().write(&PidInfo::new(77, 4200, "v")).unwrap();

        let status = sup.status().unwrap();

        assert!(!status.running);
        assert_eq!(status.pid, None);
        assert!(!sup.pid_file().exists());
    }

    #[test]
    fn status_of_alive_but_unhealthy_keeps_pid_file() {
        let temp = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[77]);
        let launcher = FakeLauncher::new(900, processes.clone());
        let sup = supervisor(&temp, ScriptedProbe::new(&[], false), processes, launcher);
        sup.pid_file().write(&PidInfo::new(77, 4200, "0.3.0")).unwrap();

        let status = sup.status().unwrap();

        assert!(!status.running);
        assert_eq!(status.pid, Some(77));
        assert_eq!(status.version.as_deref(), Some("0.3.0"));
        assert!(sup.pid_file().exists());
    }

    #[test]
    fn status_of_healthy_daemon_reports_uptime() {
        let temp = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[77]);
        let launcher = FakeLauncher::new(900, processes.clone());
        let sup = supervisor(&temp, ScriptedProbe::new(&[], true), processes, launcher);
        let mut info = PidInfo::new(77, 4201, "0.3.0");
        info.started_at = Utc::now() - chrono::Duration::minutes(3);
        sup.pid_file().write(&info).unwrap();

        let status = sup.status().unwrap();

        assert!(status.running);
        assert_eq!(status.port, Some(4201));
        assert!(status.uptime.unwrap() >= chrono::Duration::minutes(3));
    }

    #[test]
    fn stop_without_pid_file_is_not_running() {
        let temp = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[]);
        let launcher = FakeLauncher::new(900, processes.clone());
        let sup = supervisor(&temp, ScriptedProbe::new(&[], false), processes, launcher);

        let err = sup.stop().unwrap_err();
        assert_eq!(err.to_string(), "daemon is not running (no PID file)");
    }

    #[test]
    fn stop_with_stale_pid_file_removes_it() {
        let temp = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[]);
        let launcher = FakeLauncher::new(900, processes.clone());
        let sup = supervisor(&temp, ScriptedProbe::new(&[], false), processes, launcher);
        sup.pid_file().write(&PidInfo::new(31, 4200, "v")).unwrap();

        let err = sup.stop().unwrap_err();

        assert!(matches!(err, CortexError::DaemonNotRunning { .. }));
        assert!(!sup.pid_file().exists());
    }

    #[test]
    fn stop_graceful() {
        let temp = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[31]);
        let launcher = FakeLauncher::new(900, processes.clone());
        let sup = supervisor(&temp, ScriptedProbe::new(&[], true), processes.clone(), launcher);
        sup.pid_file().write(&PidInfo::new(31, 4200, "v")).unwrap();

        assert_eq!(sup.stop().unwrap(), StopOutcome::Graceful);
        assert_eq!(processes.signals(), vec![(31, Signal::Terminate)]);
        assert!(!sup.pid_file().exists());
    }

    #[test]
    fn stop_escalates_after_grace_period() {
        let temp = TempDir::new().unwrap();
        let processes = FakeProcesses::stubborn(&[31]);
        let launcher = FakeLauncher::new(900, processes.clone());
        let sup = supervisor(&temp, ScriptedProbe::new(&[], true), processes.clone(), launcher);
        sup.pid_file().write(&PidInfo::new(31, 4200, "v")).unwrap();

        let started = Instant::now();
        assert_eq!(sup.stop().unwrap(), StopOutcome::Forced);

        assert!(started.elapsed() >= quick_stop().grace);
        assert_eq!(
            processes.signals(),
            vec![(31, Signal::Terminate), (31, Signal::Kill)]
        );
        assert!(!sup.pid_file().exists());
    }

    #[test]
    fn stop_when_process_vanishes_before_sigterm() {
        struct VanishingProcess;
        impl ProcessControl for VanishingProcess {
            fn is_alive(&self, _pid: u32) -> bool {
                true
            }
            fn signal(&self, _pid: u32, _signal: Signal) -> std::io::Result<()> {
                Err(std::io::Error::from_raw_os_error(libc::ESRCH))
            }
        }

        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        let sup = Supervisor::new(&storage, &DaemonConfig::default())
            .with_process(Arc::new(VanishingProcess))
            .with_probe(ScriptedProbe::new(&[], false));
        sup.pid_file().write(&PidInfo::new(31, 4200, "v")).unwrap();

        assert_eq!(sup.stop().unwrap(), StopOutcome::AlreadyExited);
        assert!(!sup.pid_file().exists());
    }

    #[test]
    fn validate_pid_file_keeps_live_process() {
        let temp = TempDir::new().unwrap();
        let processes = FakeProcesses::with_alive(&[8]);
        let launcher = FakeLauncher::new(900, processes.clone());
        let sup = supervisor(&temp, ScriptedProbe::new(&[], false), processes, launcher);

        assert_eq!(sup.validate_pid_file().unwrap(), None);

        sup.pid_file().write(&PidInfo::new(8, 4200, "v")).unwrap();
        assert_eq!(sup.validate_pid_file().unwrap().map(|i| i.pid), Some(8));
        assert!(sup.pid_file().exists());
    }
}
