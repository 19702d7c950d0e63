//! CLI Entry Point for tentalux
//!
//! Talks to a rig directly from the terminal:
//! - inspect state (`status`, `poses`)
//! - drive arms and poses (`on`, `off`, `set`, `pose`)
//! - grab a camera still (`camera`)
//! - follow state changes as the hub would see them (`watch`)
//!
//! # Usage
//!
//! ```bash
//! tentalux --host 192.168.1.40 status
//! tentalux --config config/tentalux.toml on 3 --brightness 128
//! tentalux --mock watch
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tentalux::config::TentaluxConfig;
use tentalux::devices::{channel_publisher, StatePublisher};
use tentalux::logging::{self, OutputFormat, TracingConfig};
use tentalux::platform::TentaluxPlatform;
use tentalux::rig::protocol::{ArmCommand, Pose};
use tentalux::rig::{HttpTransport, MockTransport, RigTransport};
use tentalux::{Snapshot, TentaluxController};

#[derive(Parser)]
#[command(name = "tentalux")]
#[command(about = "Control a Tentalux lighting rig", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Rig host (overrides the configuration file)
    #[arg(long)]
    host: Option<String>,

    /// Rig port (overrides the configuration file)
    #[arg(long)]
    port: Option<u16>,

    /// Use a simulated rig instead of the network
    #[arg(long)]
    mock: bool,

    /// Log level (overrides the configuration file)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format: pretty, compact or json
    #[arg(long, default_value = "compact")]
    log_format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the brightness of every arm
    Status,
    /// List the poses the rig knows
    Poses,
    /// Turn an arm on
    On {
        /// Arm index
        arm: usize,
        /// Brightness, full when omitted
        #[arg(long)]
        brightness: Option<u8>,
    },
    /// Turn an arm off
    Off {
        /// Arm index
        arm: usize,
    },
    /// Set an arm's brightness
    Set {
        /// Arm index
        arm: usize,
        /// Brightness, 0-255
        brightness: u8,
    },
    /// Activate a pose
    Pose {
        /// Pose name
        name: String,
    },
    /// Save a still from the rig camera
    Camera {
        /// Output file
        out: PathBuf,
    },
    /// Follow device state changes until Ctrl+C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let mut tracing = TracingConfig::from_config(&config)
        .map_err(anyhow::Error::msg)?
        .with_format(cli.log_format);
    if let Some(level) = &cli.log_level {
        tracing.level = logging::parse_log_level(level).map_err(anyhow::Error::msg)?;
    }
    logging::init(tracing).map_err(anyhow::Error::msg)?;

    let transport: Arc<dyn RigTransport> = if cli.mock {
        Arc::new(MockTransport::default().with_camera_image(&b"\xff\xd8\xff\xd9"[..]))
    } else {
        Arc::new(HttpTransport::new(config.base_url(), config.request_timeout())?)
    };

    run(&config, transport, cli.command).await
}

fn load_config(cli: &Cli) -> Result<TentaluxConfig> {
    let mut config = match &cli.config {
        Some(path) => TentaluxConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => {
            let host = match (&cli.host, cli.mock) {
                (Some(host), _) => host.clone(),
                (None, true) => "mock-tentalux".to_string(),
                (None, false) => anyhow::bail!("either --config or --host is required"),
            };
            TentaluxConfig::new(host, 80)
        }
    };

    if let Some(host) = &cli.host {
        config.rig.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.rig.port = port;
    }
    config.validate()?;
    Ok(config)
}

async fn run(
    config: &TentaluxConfig,
    transport: Arc<dyn RigTransport>,
    command: Commands,
) -> Result<()> {
    if let Commands::Watch = command {
        return watch(config, transport).await;
    }

    let controller = TentaluxController::from_config(transport, config);
    // Cache the arm count so commands are validated locally.
    controller.status().await.context("rig unreachable")?;

    match command {
        Commands::Status => print_snapshot(&controller.snapshot()),
        Commands::Poses => {
            for pose in controller.get_poses().await? {
                println!("{}", pose);
            }
        }
        Commands::On { arm, brightness } => {
            let brightness = brightness.unwrap_or(tentalux::devices::light::DEFAULT_BRIGHTNESS);
            let snapshot = controller
                .control_some(&[ArmCommand::new(arm, brightness)])
                .await?;
            print_snapshot(&snapshot);
        }
        Commands::Off { arm } => {
            let snapshot = controller.control_some(&[ArmCommand::new(arm, 0)]).await?;
            print_snapshot(&snapshot);
        }
        Commands::Set { arm, brightness } => {
            let snapshot = controller
                .control_some(&[ArmCommand::new(arm, brightness)])
                .await?;
            print_snapshot(&snapshot);
        }
        Commands::Pose { name } => {
            let snapshot = controller.set_pose(&Pose::new(name)).await?;
            print_snapshot(&snapshot);
        }
        Commands::Camera { out } => {
            let camera = tentalux::devices::TentaluxCamera::new(
                controller.clone(),
                format!("{} camera", config.application.name),
                Arc::new(|_: &str, _: &tentalux::devices::DeviceState| {}),
            )
            .with_timeout(config.camera_timeout());
            let image = camera
                .image()
                .await
                .context("camera returned no image")?;
            tokio::fs::write(&out, &image)
                .await
                .with_context(|| format!("writing {}", out.display()))?;
            println!("Saved {} bytes to {}", image.len(), out.display());
        }
        Commands::Watch => {}
    }
    Ok(())
}

async fn watch(config: &TentaluxConfig, transport: Arc<dyn RigTransport>) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let publisher: Arc<dyn StatePublisher> = Arc::new(channel_publisher(tx));
    let platform = TentaluxPlatform::setup(config, transport, publisher).await?;
    platform.publish_all();

    println!(
        "Watching {} ({} arms), Ctrl+C to stop",
        platform.controller().transport().base_url(),
        platform.lights().len()
    );

    loop {
        tokio::select! {
            Some((entity, state)) = rx.recv() => {
                println!("{}: {}", entity, serde_json::to_string(&state)?);
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
        }
    }

    platform.shutdown().await;
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot) {
    for record in snapshot.records() {
        println!("arm {:>2}  brightness {:>3}", record.number(), record.brightness());
    }
    if let Some(avg) = snapshot.average_brightness() {
        println!("average  {:.1}", avg);
    }
}
