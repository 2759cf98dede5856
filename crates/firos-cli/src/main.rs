//! `firos` – NGSI context broker ⇄ robot topic gateway.
//!
//! 1. Initialises structured logging (and OTLP export when configured).
//! 2. Loads `~/.firos/config.toml` (or `--config <path>`), then applies
//!    `FIROS_*` environment overrides.
//! 3. Loads the robots file and optional message schema table.
//! 4. Serves the gateway HTTP surface until Ctrl-C.
//!
//! Command values accepted by the gateway are republished on the in-process
//! topic bus; a bus listener logs every update it carries.

mod config;
mod telemetry;

use std::net::IpAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use firos_gateway::{Collaborators, Gateway, GatewayServer, UpdateDedupCache};
use firos_middleware::{
    BusPublishSink, ContextBrokerClient, EventBus, QuotedJsonCodec, RobotRegistry, StaticRegistry,
};
use firos_types::{EventPayload, FirosError};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use config::Config;

fn main() -> ExitCode {
    let _guard = telemetry::init_tracing("firos");

    let path = match config::config_path_from_args(std::env::args().skip(1)) {
        Ok(path) => path,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let cfg = load_config(&path);
    info!(config = ?cfg, "configuration resolved");

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start the Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(cfg)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, kind = e.kind(), "gateway stopped");
            ExitCode::FAILURE
        }
    }
}

/// Read the config file, falling back to defaults when it is missing or
/// broken. Environment overrides apply in every case.
fn load_config(path: &Path) -> Config {
    let mut cfg = match config::load_from(path) {
        Ok(Some(cfg)) => {
            info!(path = %path.display(), "config loaded");
            cfg
        }
        Ok(None) => {
            info!(path = %path.display(), "no config file, using defaults");
            Config::default()
        }
        Err(e) => {
            warn!(error = %e, "config error, using defaults");
            Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);
    cfg
}

fn build_registry(cfg: &Config) -> Result<StaticRegistry, FirosError> {
    let mut registry = StaticRegistry::load(&cfg.robots_path)?;
    if let Some(path) = &cfg.schemas_path {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FirosError::Registry(format!("failed to read schema table {}: {e}", path.display()))
        })?;
        registry.extend_schemas_from_json(&raw)?;
    }
    Ok(registry)
}

async fn serve(cfg: Config) -> Result<(), FirosError> {
    let bind_address: IpAddr = cfg.bind_address.parse().map_err(|e| {
        FirosError::Io(format!("invalid bind address {:?}: {e}", cfg.bind_address))
    })?;

    let registry = build_registry(&cfg)?;
    info!(
        robots = registry.robots()?.len(),
        path = %cfg.robots_path.display(),
        "robots loaded"
    );

    let bus = Arc::new(EventBus::new(cfg.bus_capacity));
    spawn_update_listener(&bus);

    let collaborators = Collaborators {
        registry: Arc::new(registry),
        publisher: Arc::new(BusPublishSink::new(Arc::clone(&bus))),
        query: Arc::new(ContextBrokerClient::new(cfg.context_broker_url.clone())),
        codec: Arc::new(QuotedJsonCodec),
    };
    let gateway = Gateway::new(collaborators, Arc::new(UpdateDedupCache::new()))?;
    let server = GatewayServer::new(Arc::new(gateway))
        .with_port(cfg.server_port)
        .with_bind_address(bind_address);

    tokio::select! {
        result = server.run() => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Ctrl-C received, shutting down");
            Ok(())
        }
    }
}

/// Log every topic update carried by the bus.
fn spawn_update_listener(bus: &EventBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match event.payload {
                    EventPayload::TopicUpdate { robot, topic, value } => {
                        info!(%robot, %topic, %value, event_id = %event.id, "topic update");
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "update listener lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
