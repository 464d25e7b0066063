//! CLI binary that replays a recorded event trace through the node
//! properties state service and logs every notification it produces.
//!
//! Usage:
//!   nodeprops-replay [OPTIONS] <TRACE>
//!
//! Options:
//!   -c, --config <FILE>    Path to configuration TOML file
//!   -v, --verbose          Increase logging verbosity
//!   --wait-ms <MS>         How long to wait for observer delivery

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;

use nodeprops_notify::WorkerPool;
use nodeprops_protocol::{ListenerError, NodePropertiesChangeListener, PropertySet, ValueMapDelta};
use nodeprops_service::logging::init_tracing;
use nodeprops_service::{NodePropertiesStateService, ServiceConfig, Trace};

/// Node properties trace replay.
#[derive(Parser, Debug)]
#[command(name = "nodeprops-replay")]
#[command(about = "Replay a node property event trace and log the resulting notifications")]
#[command(version)]
struct Cli {
    /// JSON trace file to replay.
    #[arg(value_name = "TRACE")]
    trace: PathBuf,

    /// Path to configuration TOML file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (can be repeated: -v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Maximum time to wait for all notifications to be delivered.
    #[arg(long, value_name = "MS", default_value_t = 5000)]
    wait_ms: u64,
}

/// Observer that logs every notification it receives.
#[derive(Default)]
struct LoggingObserver {
    received: AtomicU64,
}

impl NodePropertiesChangeListener for LoggingObserver {
    fn on_reachable_node_properties_changed(
        &self,
        added: &PropertySet,
        updated: &PropertySet,
        removed: &PropertySet,
    ) -> Result<(), ListenerError> {
        let names = |set: &PropertySet| {
            let mut items: Vec<String> = set.iter().map(ToString::to_string).collect();
            items.sort();
            items
        };
        tracing::info!(
            added = ?names(added),
            updated = ?names(updated),
            removed = ?names(removed),
            "Reachable node properties changed"
        );
        self.received.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_node_property_maps_changed(&self, delta: &ValueMapDelta) -> Result<(), ListenerError> {
        for (node_id, map) in delta {
            match map {
                Some(map) => {
                    let sorted: BTreeMap<&String, &String> = map.iter().collect();
                    tracing::info!(node = %node_id, values = ?sorted, "Node value map changed");
                }
                None => tracing::info!(node = %node_id, "Node no longer reachable"),
            }
        }
        self.received.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ServiceConfig::load(cli.config.as_deref())?;

    let level_override = match cli.verbose {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    };
    init_tracing(&config.logging, level_override)?;

    let trace = Trace::from_file(&cli.trace)?;
    tracing::info!(
        trace = %cli.trace.display(),
        steps = trace.steps.len(),
        "Starting node properties trace replay"
    );

    let pool = Arc::new(WorkerPool::start(config.worker_pool_config())?);
    let service = NodePropertiesStateService::new(pool.clone());
    let observer = Arc::new(LoggingObserver::default());
    service.add_node_properties_change_listener(observer.clone());

    let outcome = trace.replay(&service);

    // The initial subscription callback counts as two notifications.
    let stats = service.stats();
    let expected = stats.property_notifications + stats.value_map_notifications + 2;
    let deadline = Instant::now() + Duration::from_millis(cli.wait_ms);
    while observer.received.load(Ordering::SeqCst) < expected && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    pool.stop();

    let applied = outcome?;
    let received = observer.received.load(Ordering::SeqCst);
    if received < expected {
        tracing::warn!(received, expected, "Not all notifications were delivered in time");
    }

    let summary = serde_json::json!({
        "steps_applied": applied,
        "stats": stats,
        "reachable_nodes": service.reachable_nodes().len(),
        "reachable_properties": service.reachable_properties().len(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
