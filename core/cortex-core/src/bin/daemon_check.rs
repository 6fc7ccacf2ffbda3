//! daemon-check: debug harness for the daemon supervisor and session registries.
//!
//! ## Subcommands
//!
//! - `check`: Print storage paths, PID file, liveness, health, tickets and sessions
//! - `status`: Supervisor status snapshot
//! - `start`: Start the daemon if it isn't healthy, waiting through the health schedule
//! - `stop`: SIGTERM the daemon, escalating to SIGKILL after the grace period

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cortex_core::daemon::{HealthProbe, HttpHealthProbe, PidFile, ProcessControl, SystemProcess};
use cortex_core::{
    logging, DaemonConfig, ProjectPaths, SessionRegistry, StorageConfig, Supervisor, TicketStore,
};

#[derive(Parser)]
#[command(name = "daemon-check")]
#[command(about = "Cortex daemon and session diagnostics")]
#[command(version)]
struct Cli {
    /// Cortex home directory (defaults to $CORTEX_HOME or ~/.cortex)
    #[arg(long, global = true, value_name = "DIR")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print paths, daemon state, tickets and sessions
    Check {
        /// Project directories to inspect (defaults to the current directory)
        #[arg(value_name = "PROJECT")]
        projects: Vec<PathBuf>,
    },

    /// Show the supervisor's view of the daemon
    Status,

    /// Start the daemon unless it is already healthy
    Start,

    /// Stop the daemon
    Stop,
}

fn main() {
    let cli = Cli::parse();

    let storage = match cli.home {
        Some(home) => StorageConfig::with_root(home),
        None => match StorageConfig::from_env() {
            Ok(storage) => storage,
            Err(err) => {
                eprintln!("error: {err}");
                std::process::exit(1);
            }
        },
    };
    let config = DaemonConfig::load(&storage.settings_file()).unwrap_or_else(|err| {
        eprintln!("warning: {err}; using defaults");
        DaemonConfig::default()
    });
    let _logging_guard = logging::init(&config.log_level, None);

    let supervisor = Supervisor::new(&storage, &config);
    let result = match cli.command.unwrap_or(Commands::Check { projects: vec![] }) {
        Commands::Check { projects } => {
            check(&storage, &config, projects);
            Ok(())
        }
        Commands::Status => supervisor.status().map(|status| {
            if status.running {
                println!("🟢 running");
            } else {
                println!("⚫ not running");
            }
            if let (Some(pid), Some(port)) = (status.pid, status.port) {
                println!("  pid {pid}, port {port}");
            }
            if let Some(version) = status.version {
                println!("  version {version:?}");
            }
            if let Some(uptime) = status.uptime {
                println!("  uptime {}s", uptime.num_seconds());
            }
        }),
        Commands::Start => supervisor
            .ensure_running()
            .map(|()| println!("daemon healthy on port {}", supervisor.port())),
        Commands::Stop => supervisor
            .stop()
            .map(|outcome| println!("daemon stopped ({outcome:?})")),
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "daemon-check failed");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn check(storage: &StorageConfig, config: &DaemonConfig, projects: Vec<PathBuf>) {
    println!("═══════════════════════════════════════════════════════════");
    println!("  Cortex Daemon Check");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    println!("Home:     {}", storage.root().display());
    println!("PID file: {}", storage.pid_file().display());
    println!("Log file: {}", storage.log_file().display());
    println!("Settings: {}", storage.settings_file().display());
    println!();

    println!("── Daemon ────────────────────────────────────────────────");
    match PidFile::new(storage.pid_file()).read() {
        Ok(Some(info)) => {
            let status = if SystemProcess.is_alive(info.pid) {
                "✓ ALIVE"
            } else {
                "✗ DEAD (stale PID file)"
            };
            println!("  {} PID {} on port {}", status, info.pid, info.port);
            println!("  version {:?}, started {}", info.version, info.started_at);
        }
        Ok(None) => println!("  (no PID file)"),
        Err(err) => println!("  ✗ unreadable PID file: {err}"),
    }

    let probe = HttpHealthProbe::new(&config.base_url());
    let health = if probe.check() {
        "🟢 HEALTHY"
    } else {
        "⚫ NOT RESPONDING"
    };
    println!("  {} {}", health, probe.url());
    println!();

    let projects = if projects.is_empty() {
        vec![std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))]
    } else {
        projects
    };

    println!("── Meta Sessions ─────────────────────────────────────────");
    print_sessions(&SessionRegistry::meta(storage));
    println!();

    for project in &projects {
        let paths = ProjectPaths::new(project);
        println!("── Project: {} ", project.display());
        println!("  cortex dir: {}", paths.cortex_dir().display());

        match TicketStore::for_project(project).list_all() {
            Ok(grouped) => {
                let counts: Vec<String> = grouped
                    .iter()
                    .map(|(status, tickets)| format!("{status}={}", tickets.len()))
                    .collect();
                println!("  tickets: {}", counts.join(" "));
            }
            Err(err) => println!("  ✗ tickets: {err}"),
        }

        print_sessions(&SessionRegistry::for_project(project));
        println!();
    }

    println!("═══════════════════════════════════════════════════════════");
}

fn print_sessions(registry: &SessionRegistry) {
    match registry.list() {
        Ok(sessions) if sessions.is_empty() => println!("  (no sessions)"),
        Ok(sessions) => {
            for (key, session) in sessions {
                let ticket = session.scope.ticket_id().unwrap_or("-");
                println!(
                    "  {:<10} {:?} ticket={} agent={} window={} status={:?}",
                    key,
                    session.scope.session_type(),
                    ticket,
                    session.agent,
                    session.window,
                    session.status
                );
                if let Some(tool) = &session.tool {
                    println!("             tool: {tool}");
                }
            }
        }
        Err(err) => println!("  ✗ {}: {err}", registry.path().display()),
    }
}
