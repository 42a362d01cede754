use anyhow::{Context, Result};
use clap::Parser;
use icedespresso::core::ws2822::{channel_for_tile, tile_frame, TILE_SLOTS};
use icedespresso::utils::logger;
use icedespresso::{DeviceArgs, IcedEspresso, Ws2822};
use std::time::Duration;

/// Program WS2821/WS2822 tile addresses through the wifi-fpga bitstream.
#[derive(Parser, Debug)]
#[command(name = "ws2822_program")]
struct Args {
    #[command(flatten)]
    device: DeviceArgs,

    /// Tile number to program. DMX start address = 1 + 3 * (number - 1)
    number: u16,

    /// Pause between test frames, in milliseconds
    #[arg(long, default_value = "100")]
    frame_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.device.verbose);

    let config = args.device.resolve()?;
    let target = config.single_device()?;
    let channel = channel_for_tile(args.number)?;

    let device = IcedEspresso::with_timeout(&target.host, config.timeout)?;
    let tiles = Ws2822::new(device).with_poll_timeout(config.poll_timeout);

    println!(
        "Programming tile to: {} The tile will flash white on successful program, then cycle r,g,b three times",
        args.number
    );

    tiles
        .program_address(channel)
        .await
        .with_context(|| format!("programming tile {} on {}", args.number, target.host))?;

    tiles.set_channel_count((TILE_SLOTS * 3) as u16).await?;

    let pause = Duration::from_millis(args.frame_ms);
    for _ in 0..3 {
        for rgb in [[255, 0, 0], [0, 255, 0], [0, 0, 255]] {
            tiles.send_dmx(&tile_frame(channel, rgb)).await?;
            tokio::time::sleep(pause).await;
        }
    }

    tiles.set_power(false).await?;
    tracing::info!("✅ Tile {} programmed at DMX channel {}", args.number, channel);
    Ok(())
}
