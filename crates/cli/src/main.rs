//! stackwatch CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: load `stackwatch.toml` (or `--config`) layered
//!    with `STACKWATCH_*` environment variables, and resolve the distribution
//!    domain.
//! 2. **Wire observability**: configure `tracing-subscriber` with a text or
//!    JSON layer and an optional OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure**: create the control-plane and object-store
//!    clients, wrap the event feed in a [`RetryingEventSource`] and build the
//!    shared [`Monitor`].
//! 4. **Dispatch**: translate the command line into [`Operation`]s and run them
//!    through one [`Dispatcher`].
//!
//! Exit status is 0 on success and 1 on any error. Interrupting a passive
//! `stack monitor` with Ctrl+C exits 0.

mod config;
mod console;
mod dispatcher;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use control_plane::{ControlPlaneClient, ObjectStoreClient};
use monitor::{
    ArtifactLocation, Clock, FunctionName, Monitor, RetryingEventSource, StackName, SystemClock,
};
use packaging::PackageBuilder;
use tracing::warn;

use crate::config::StackwatchConfig;
use crate::console::ConsoleObserver;
use crate::dispatcher::{Dispatcher, FunctionTarget, Operation, Ports, StackCommand, StackTarget};

#[derive(Parser)]
#[command(name = "stackwatch")]
#[command(about = "Drive stack operations and follow their events until they finish")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./stackwatch.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, update or delete the stack, or watch its events
    Stack {
        #[arg(value_enum)]
        action: StackCommand,

        /// Fail when no new event arrives for this many seconds
        #[arg(long, value_name = "SECS")]
        idle_timeout: Option<u64>,
    },

    /// Build, upload, deploy and invoke the function package
    #[command(group(
        ArgGroup::new("operations")
            .args(["build", "put", "update", "invoke"])
            .required(true)
            .multiple(true)
    ))]
    Function {
        /// Stage sources, run the build command and create the archive
        #[arg(short, long)]
        build: bool,

        /// Upload the archive to object storage
        #[arg(short, long)]
        put: bool,

        /// Point the function at the uploaded archive
        #[arg(short, long)]
        update: bool,

        /// Invoke the function and save its response
        #[arg(short, long)]
        invoke: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = StackwatchConfig::load(cli.config.as_deref())?;
    config.resolve_domain(|name| std::env::var(name).ok());

    let _telemetry = telemetry::init(&config.telemetry)?;

    let operations = match cli.command {
        Commands::Stack {
            action,
            idle_timeout,
        } => {
            if idle_timeout.is_some() {
                config.monitor.idle_timeout_secs = idle_timeout;
            }
            vec![Operation::Stack(action)]
        }
        Commands::Function {
            build,
            put,
            update,
            invoke,
        } => Operation::function_sequence(build, put, update, invoke),
    };

    let dispatcher = compose(config)?;
    dispatcher.run(&operations, interrupted()).await
}

/// Builds the dispatcher and everything it depends on.
fn compose(config: StackwatchConfig) -> anyhow::Result<Dispatcher> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let control_plane = Arc::new(
        ControlPlaneClient::new(&config.control_plane)
            .context("failed to create control-plane client")?,
    );
    let storage = Arc::new(
        ObjectStoreClient::new(&config.storage).context("failed to create object-store client")?,
    );

    let events = RetryingEventSource::new(control_plane.clone(), clock.clone())
        .with_max_retries(config.monitor.fetch_retries)
        .with_delay(config.monitor.fetch_retry_delay());
    let monitor = Monitor::new(Arc::new(events))
        .with_clock(clock.clone())
        .with_observer(Arc::new(ConsoleObserver))
        .with_poll_interval(config.monitor.poll_interval());

    let ports = Ports {
        stacks: control_plane.clone(),
        distributions: control_plane.clone(),
        functions: control_plane,
        artifacts: storage,
    };

    let stack = StackTarget {
        name: StackName::new(config.stack.name).context("stack name must not be empty")?,
        template_path: config.stack.template_path,
        parameters: config.stack.parameters,
        domain: config.domain.unwrap_or_default(),
        idle_timeout: config.monitor.idle_timeout_secs.map(Duration::from_secs),
    };
    let function = FunctionTarget {
        name: FunctionName::new(config.function.name)
            .context("function name must not be empty")?,
        package: ArtifactLocation::new(config.storage.bucket, config.storage.key),
        invoke_output: config.function.invoke_output,
    };

    Ok(Dispatcher::new(
        ports,
        Arc::new(monitor),
        clock,
        PackageBuilder::new(config.package),
        stack,
        function,
    ))
}

/// Resolves on Ctrl+C. The handler is only installed once this is polled.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn function_requires_at_least_one_operation() {
        assert!(Cli::try_parse_from(["stackwatch", "function"]).is_err());

        let cli = Cli::try_parse_from(["stackwatch", "function", "-b", "-i"]).unwrap();
        match cli.command {
            Commands::Function {
                build,
                put,
                update,
                invoke,
            } => assert_eq!(
                Operation::function_sequence(build, put, update, invoke),
                [Operation::Build, Operation::Invoke]
            ),
            Commands::Stack { .. } => panic!("expected function command"),
        }
    }

    #[test]
    fn stack_accepts_idle_timeout_and_rejects_unknown_actions() {
        let cli = Cli::try_parse_from([
            "stackwatch",
            "--config",
            "other.toml",
            "stack",
            "update",
            "--idle-timeout",
            "300",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("other.toml")));
        assert!(matches!(
            cli.command,
            Commands::Stack {
                action: StackCommand::Update,
                idle_timeout: Some(300)
            }
        ));

        assert!(Cli::try_parse_from(["stackwatch", "stack", "rollback"]).is_err());
    }

    #[tokio::test]
    async fn compose_wires_default_configuration() {
        let mut config = StackwatchConfig::default();
        config.resolve_domain(|_| None);
        assert!(compose(config).is_ok());

        let mut config = StackwatchConfig::default();
        config.stack.name.clear();
        assert!(compose(config).is_err());
    }
}
