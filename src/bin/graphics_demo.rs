use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use icedespresso::core::bitmap::sweep_frame;
use icedespresso::core::broadcast::broadcast_bitmap;
use icedespresso::utils::logger;
use icedespresso::{Bitmap, DeviceApi, DeviceArgs, IcedEspresso, RgbColor};
use std::time::Duration;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Pattern {
    /// A diagonal line sweeping across the panel
    Sweep,
    /// Random noise, pushed to every device at once
    Random,
}

/// Animate CM-2 panels over the bitmap endpoint.
#[derive(Parser, Debug)]
#[command(name = "graphics_demo")]
struct Args {
    #[command(flatten)]
    device: DeviceArgs,

    #[arg(long, value_enum, default_value = "sweep")]
    pattern: Pattern,

    /// Delay between frames, in milliseconds
    #[arg(long, default_value = "100")]
    interval_ms: u64,

    /// Stop after this many frames; runs until interrupted otherwise
    #[arg(long)]
    frames: Option<usize>,

    /// Brightest value used by the random pattern
    #[arg(long, default_value = "255")]
    max_level: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.device.verbose);

    let config = args.device.resolve()?;
    if config.devices.is_empty() {
        anyhow::bail!("no devices given, use --device or --config");
    }

    let mut devices = Vec::with_capacity(config.devices.len());
    for target in &config.devices {
        let device = IcedEspresso::with_timeout(&target.host, config.timeout)?;
        // Start from a dark board so only the panel is lit
        device
            .rgb_led_put(RgbColor::off())
            .await
            .with_context(|| format!("resetting RGB LED on {}", target.name))?;
        device.status_led_put(false).await?;
        devices.push((target.name.clone(), device));
    }

    let interval = Duration::from_millis(args.interval_ms);
    let mut rng = rand::thread_rng();
    let mut step = 0usize;

    loop {
        if args.frames.is_some_and(|frames| step >= frames) {
            break;
        }

        let frame = match args.pattern {
            Pattern::Sweep => sweep_frame(step),
            Pattern::Random => Bitmap::random(&mut rng, args.max_level),
        };

        let outcomes =
            broadcast_bitmap(devices.clone(), frame.as_bytes(), config.concurrency).await?;
        for outcome in outcomes.iter().filter(|o| !o.is_ok()) {
            tracing::warn!("{} dropped frame {}", outcome.device, step);
        }

        step += 1;
        tokio::time::sleep(interval).await;
    }

    tracing::info!("Sent {} frames", step);
    Ok(())
}
