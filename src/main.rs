use clap::Parser;
use icedespresso::config::cli::{Command, MemoryCommand};
use icedespresso::core::broadcast::broadcast_bitmap;
use icedespresso::core::conformance::{CheckStatus, ConformanceSuite, SuiteOptions};
use icedespresso::utils::logger;
use icedespresso::utils::validation::validate_range;
use icedespresso::{
    Bitmap, CliConfig, DeviceApi, DeviceError, IcedEspresso, ResolvedConfig, Result, RgbColor,
};
use std::path::Path;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    if cli.device.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.device.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    let outcome = match cli.device.resolve() {
        Ok(config) => run(&cli.command, &config).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("❌ {} (Category: {:?})", e, e.category());
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(e.exit_code());
        }
    }
}

fn connect(config: &ResolvedConfig) -> Result<IcedEspresso> {
    let target = config.single_device()?;
    tracing::debug!("Connecting to {} ({})", target.name, target.host);
    IcedEspresso::with_timeout(&target.host, config.timeout)
}

fn read_input(path: &Path, allow_empty: bool) -> Result<Vec<u8>> {
    let data = std::fs::read(path)?;
    if data.is_empty() && !allow_empty {
        return Err(DeviceError::InvalidInput {
            message: format!("{} is empty", path.display()),
        });
    }
    tracing::debug!("Loaded {} ({} bytes)", path.display(), data.len());
    Ok(data)
}

fn hex_dump(base: u16, data: &[u8]) {
    for (row, chunk) in data.chunks(16).enumerate() {
        let bytes: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        println!("{:04x}: {}", usize::from(base) + row * 16, bytes.join(" "));
    }
}

/// Returns `Ok(false)` when the command ran but reported failures.
async fn run(command: &Command, config: &ResolvedConfig) -> Result<bool> {
    match command {
        Command::StatusLed { state } => {
            let device = connect(config)?;
            match state {
                Some(state) => {
                    let on = bool::from(*state);
                    device.status_led_put(on).await?;
                    tracing::info!("✅ Status LED {}", if on { "on" } else { "off" });
                }
                None => {
                    let on = device.status_led_get().await?;
                    println!("{}", if on { "on" } else { "off" });
                }
            }
        }

        Command::Rgb { color } => {
            let device = connect(config)?;
            match color.as_deref() {
                Some([red, green, blue]) => {
                    validate_range("red", *red, 0.0, 1.0)?;
                    validate_range("green", *green, 0.0, 1.0)?;
                    validate_range("blue", *blue, 0.0, 1.0)?;
                    device.rgb_led_put(RgbColor::new(*red, *green, *blue)).await?;
                    tracing::info!("✅ RGB LED set to {} {} {}", red, green, blue);
                }
                Some(other) => {
                    return Err(DeviceError::InvalidInput {
                        message: format!("expected 3 color channels, got {}", other.len()),
                    })
                }
                None => {
                    let color = device.rgb_led_get().await?;
                    println!(
                        "red={:.4} green={:.4} blue={:.4}",
                        color.red, color.green, color.blue
                    );
                }
            }
        }

        Command::Brightness { level } => {
            let device = connect(config)?;
            match level {
                Some(level) => {
                    validate_range("brightness", *level, 0.0, 1.0)?;
                    device.brightness_put(*level).await?;
                    tracing::info!("✅ Brightness set to {}", level);
                }
                None => println!("{:.4}", device.brightness_get().await?),
            }
        }

        Command::Register { address, value } => {
            let device = connect(config)?;
            match value {
                Some(value) => {
                    device.register_put(*address, *value).await?;
                    tracing::info!("✅ Register 0x{:04x} = 0x{:04x}", address, value);
                }
                None => {
                    let value = device.register_get(*address).await?;
                    println!("0x{:04x} ({})", value, value);
                }
            }
        }

        Command::Memory(MemoryCommand::Read {
            address,
            length,
            out,
        }) => {
            let device = connect(config)?;
            let data = device.memory_get(*address, *length).await?;
            match out {
                Some(path) => {
                    std::fs::write(path, &data)?;
                    tracing::info!("✅ {} bytes written to {}", data.len(), path.display());
                }
                None => hex_dump(*address, &data),
            }
        }

        Command::Memory(MemoryCommand::Write { address, file }) => {
            let device = connect(config)?;
            let data = read_input(file, false)?;
            device.memory_put(*address, &data).await?;
            tracing::info!("✅ {} bytes written at 0x{:04x}", data.len(), address);
        }

        Command::Bitstream { file } => {
            let device = connect(config)?;
            let bitstream = read_input(file, false)?;
            device.fpga_bitstream_put(&bitstream).await?;
            tracing::info!("✅ FPGA loaded from {}", file.display());
        }

        Command::Bitmap { file } => {
            let bitmap = Bitmap::from_bytes(&read_input(file, false)?)?;
            if config.devices.is_empty() {
                return Err(DeviceError::MissingConfigError {
                    field: "device (use --device or a profile with [[devices]])".to_string(),
                });
            }

            let mut devices = Vec::with_capacity(config.devices.len());
            for target in &config.devices {
                devices.push((
                    target.name.clone(),
                    IcedEspresso::with_timeout(&target.host, config.timeout)?,
                ));
            }

            let outcomes = broadcast_bitmap(devices, bitmap.as_bytes(), config.concurrency).await?;
            let total = outcomes.len();
            let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(()) => println!("✅ {} ({:?})", outcome.device, outcome.elapsed),
                    Err(e) => println!("❌ {}: {}", outcome.device, e.user_friendly_message()),
                }
            }
            tracing::info!("Bitmap pushed to {}/{} devices", total - failed, total);
            return Ok(failed == 0);
        }

        Command::Dmx { file } => {
            let device = connect(config)?;
            let channels = read_input(file, true)?;
            device.dmx_put(&channels).await?;
            tracing::info!("✅ {} DMX channels sent", channels.len());
        }

        Command::Ota { file } => {
            let device = connect(config)?;
            let image = read_input(file, false)?;
            device.ota(&image).await?;
            tracing::info!("✅ Firmware image accepted, the device will reboot");
        }

        Command::Check {
            cm2,
            memory_readback,
            bitstream,
            json,
        } => {
            let target = config.single_device()?;
            let device = connect(config)?;
            let options = SuiteOptions {
                cm2: *cm2,
                memory_readback: *memory_readback,
                bitstream: match bitstream {
                    Some(path) => Some(read_input(path, false)?),
                    None => None,
                },
            };

            let report = ConformanceSuite::new(&device, target.name.clone(), options)
                .run()
                .await;

            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for result in &report.results {
                    match &result.status {
                        CheckStatus::Passed => println!("✅ {}", result.name),
                        CheckStatus::Failed(reason) => println!("❌ {}: {}", result.name, reason),
                        CheckStatus::Skipped(reason) => {
                            println!("⏭️  {} ({})", result.name, reason)
                        }
                    }
                }
                println!("{}", report.summary());
            }
            return Ok(report.all_passed());
        }
    }

    Ok(true)
}
