//! mesh-conformance - run the SMI conformance tool against a service mesh

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use kube::Client;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mesh_conformance::cluster::KubeClusterQuery;
use mesh_conformance::config::ConformanceConfig;
use mesh_conformance::events::{self, EventStream};
use mesh_conformance::lifecycle::{ScriptActuator, ToolLifecycleManager};
use mesh_conformance::probe::TcpProbe;
use mesh_conformance::resolver::EndpointResolver;
use mesh_conformance::runner::GrpcConnector;
use mesh_conformance::session::{ConformanceSession, SessionRequest};
use mesh_conformance::{
    DEFAULT_DELETE_SCRIPT, DEFAULT_INSTALL_SCRIPT, DEFAULT_NAMESPACE, DEFAULT_SERVICE_NAME,
};

/// mesh-conformance - SMI conformance runs against a service mesh
#[derive(Parser, Debug)]
#[command(name = "mesh-conformance", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install the conformance tool
    Install(OperationArgs),

    /// Delete the conformance tool
    Delete(OperationArgs),

    /// Print the endpoint the conformance tool is reachable at
    Resolve,

    /// Run a full conformance session
    ///
    /// Installs the tool (unless --skip-install), locates it, runs the suite
    /// and optionally deletes the tool again.
    Run(RunArgs),
}

/// Settings shared by every subcommand
#[derive(Args, Debug)]
struct Settings {
    /// Namespace the conformance tool runs in
    #[arg(long, env = "SMI_NAMESPACE", default_value = DEFAULT_NAMESPACE, global = true)]
    namespace: String,

    /// Service exposing the conformance tool
    #[arg(long, env = "SMI_SERVICE", default_value = DEFAULT_SERVICE_NAME, global = true)]
    service: String,

    /// Script that installs the tool
    #[arg(long, env = "SMI_INSTALL_SCRIPT", default_value = DEFAULT_INSTALL_SCRIPT, global = true)]
    install_script: PathBuf,

    /// Script that deletes the tool
    #[arg(long, env = "SMI_DELETE_SCRIPT", default_value = DEFAULT_DELETE_SCRIPT, global = true)]
    delete_script: PathBuf,

    /// Seconds to wait after install for resources to be created
    #[arg(long, default_value = "10", global = true)]
    settle_secs: u64,

    /// Seconds allowed for the internal address check
    #[arg(long, default_value = "5", global = true)]
    probe_timeout_secs: u64,

    /// Seconds allowed for connecting to the tool
    #[arg(long, default_value = "10", global = true)]
    connect_timeout_secs: u64,

    /// Seconds allowed for the RunTest call (unbounded when omitted)
    #[arg(long, global = true)]
    request_timeout_secs: Option<u64>,

    /// Seconds allowed for a whole session (unbounded when omitted)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

impl Settings {
    fn to_config(&self) -> ConformanceConfig {
        ConformanceConfig {
            namespace: self.namespace.clone(),
            service_name: self.service.clone(),
            install_script: self.install_script.clone(),
            delete_script: self.delete_script.clone(),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            settle_interval: Duration::from_secs(self.settle_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
            session_timeout: self.timeout_secs.map(Duration::from_secs),
            ..Default::default()
        }
    }
}

/// Arguments for install/delete
#[derive(Args, Debug)]
struct OperationArgs {
    /// Operation identifier attached to emitted events
    #[arg(long)]
    operation_id: Option<String>,
}

/// Arguments for a full session
#[derive(Args, Debug)]
struct RunArgs {
    /// Mesh under test
    #[arg(long, default_value = "osm")]
    mesh_name: String,

    /// Operation identifier attached to emitted events
    #[arg(long)]
    operation_id: Option<String>,

    /// Assume the tool is already installed
    #[arg(long)]
    skip_install: bool,

    /// Delete the tool after the run
    #[arg(long)]
    cleanup: bool,
}

fn operation_id(given: Option<String>) -> String {
    given.unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Print events as JSON lines until every sender is gone
fn spawn_event_printer(mut stream: EventStream) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = stream.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "Failed to encode event"),
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = cli.settings.to_config();

    let (sink, stream) = events::channel(config.event_buffer);
    let printer = spawn_event_printer(stream);

    let actuator = Arc::new(ScriptActuator::new(
        config.install_script.clone(),
        config.delete_script.clone(),
    ));

    let result = match cli.command {
        Commands::Install(args) => {
            let lifecycle = ToolLifecycleManager::new(actuator, sink, config.settle_interval);
            lifecycle
                .install(&operation_id(args.operation_id))
                .await
                .map(|_| ())
        }
        Commands::Delete(args) => {
            let lifecycle = ToolLifecycleManager::new(actuator, sink, config.settle_interval);
            lifecycle
                .delete(&operation_id(args.operation_id))
                .await
                .map(|_| ())
        }
        Commands::Resolve => {
            drop(sink);
            let client = Client::try_default().await?;
            let resolver = EndpointResolver::new(
                Arc::new(KubeClusterQuery::new(client)),
                Arc::new(TcpProbe),
                config.namespace.clone(),
                config.service_name.clone(),
                config.probe_timeout,
            );
            resolver.resolve().await.map(|endpoint| println!("{endpoint}"))
        }
        Commands::Run(args) => {
            let client = Client::try_default().await?;
            let session = ConformanceSession::from_config(
                &config,
                Arc::new(KubeClusterQuery::new(client)),
                Arc::new(TcpProbe),
                actuator,
                Arc::new(GrpcConnector::new(
                    config.connect_timeout,
                    config.request_timeout,
                )),
                sink,
            );
            let request = SessionRequest {
                operation_id: operation_id(args.operation_id),
                mesh_name: args.mesh_name,
                install: !args.skip_install,
                cleanup: args.cleanup,
            };
            session.run(&request).await.map(|_| ())
        }
    };

    // Senders are dropped with their owners above; wait for the printer to flush
    printer.await?;
    result.map_err(|e| anyhow::anyhow!("{}", e))
}
