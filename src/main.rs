use std::path::PathBuf;
use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use clap::Parser;

use factoryverse::admin::start_admin_listener;
use factoryverse::config::RuntimeConfig;
use factoryverse::sinks::SinkKind;
use factoryverse::snapshot::SnapshotExporter;
use factoryverse::transport::CompletionTransport;
use factoryverse::FactoryVersePlugin;

/// Headless agent action runtime server.
#[derive(Parser, Debug)]
#[command(name = "factoryverse", version, about)]
struct Args {
    /// Admin line-protocol TCP port (0 disables the listener).
    #[arg(long, default_value_t = 27015)]
    admin_port: u16,

    /// UDP host for completion datagrams.
    #[arg(long, default_value = "127.0.0.1")]
    udp_host: String,

    /// UDP port for completion datagrams.
    #[arg(long, default_value_t = 34202)]
    udp_port: u16,

    /// Base directory for snapshot and signal output.
    #[arg(long, default_value = "script-output/factoryverse")]
    base_dir: PathBuf,

    /// Demo world seed.
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,

    /// Optional RON config file overriding the defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match RuntimeConfig::load_ron(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ config {:?} unreadable: {}", path, e);
                std::process::exit(1);
            }
        },
        None => RuntimeConfig::default(),
    };
    config.completion_host = args.udp_host.clone();
    config.completion_port = args.udp_port;
    config.admin_port = (args.admin_port != 0).then_some(args.admin_port);
    config.base_dir = args.base_dir.clone();
    config.save_path = args.base_dir.join("state.ron");
    config.world_seed = args.seed;

    println!("🚀 Starting FactoryVerse agent runtime (headless, 60 TPS)");

    let mut app = App::new();
    app.add_plugins(
        MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
            1.0 / 60.0,
        ))),
    )
    .add_plugins(bevy::log::LogPlugin::default());

    app.insert_resource(CompletionTransport::new(
        &config.completion_host,
        config.completion_port,
    ));
    app.insert_resource(SnapshotExporter::with_sink(SinkKind::File {
        base_dir: config.base_dir.clone(),
    }));

    if let Some(port) = config.admin_port {
        match start_admin_listener(port) {
            Ok(channel) => {
                app.insert_resource(channel);
            }
            Err(e) => {
                eprintln!("❌ admin listener on port {} failed: {}", port, e);
                std::process::exit(1);
            }
        }
    }

    app.insert_resource(config);
    app.add_plugins(FactoryVersePlugin);
    app.add_systems(Startup, setup.after(factoryverse::actions::load_registry));
    app.run();
}

/// Demo world, default agent, signal subscriptions, and the initial
/// chunked map snapshot.
fn setup(world: &mut World) {
    let (seed, base_dir) = {
        let config = world.resource::<RuntimeConfig>();
        (config.world_seed, config.base_dir.clone())
    };
    factoryverse::world::worldgen::generate_demo_world(world, seed);
    factoryverse::snapshot::seed_water_rows(world);

    if let Err(e) = factoryverse::agents::spawn_agent(world, 1, Vec2::ZERO) {
        warn!("default agent spawn failed: {}", e);
    }

    let mut subscriptions =
        world.resource_mut::<factoryverse::signals::SignalSubscriptions>();
    subscriptions.subscribe(
        "force:player",
        "agents.positions",
        30,
        0,
        SinkKind::File {
            base_dir: base_dir.clone(),
        },
        serde_json::json!({"source": "server"}),
    );
    subscriptions.subscribe(
        "surface:nauvis",
        "entities.count",
        300,
        7,
        SinkKind::File {
            base_dir: base_dir.clone(),
        },
        serde_json::json!({"source": "server"}),
    );
    subscriptions.subscribe(
        "telemetry",
        "queue.depth",
        60,
        13,
        SinkKind::File { base_dir },
        serde_json::json!({"source": "server"}),
    );

    match factoryverse::snapshot::start_export(world, 0) {
        Ok((action_id, chunks)) => {
            info!("initial map snapshot {}: {} chunks", action_id, chunks);
        }
        Err(e) => warn!("initial snapshot failed: {}", e),
    }
}
