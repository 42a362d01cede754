use anyhow::Result;
use clap::Parser;
use icedespresso::core::rom_table::{git_version, RomComponent};
use icedespresso::utils::logger;
use std::path::PathBuf;

/// Generate an ESP-IDF component embedding FPGA binaries in flash.
#[derive(Parser, Debug)]
#[command(name = "build_rom_table")]
struct Args {
    /// Component name, also used for the generated C identifiers
    #[arg(long, default_value = "fpga_bin")]
    component: String,

    /// Project directory; the component lands in <project>/components/<component>
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Version string; defaults to `git describe` of the repository holding the project
    #[arg(long)]
    version: Option<String>,

    /// Files to embed, relative to the project directory
    #[arg(default_values = ["fpga/top.bin"])]
    files: Vec<PathBuf>,

    #[arg(long, help = "Enable verbose output")]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let version = match args.version {
        Some(version) => version,
        None => git_version(&args.project)?,
    };
    println!("{}", version);

    let component = RomComponent::new(&args.component, args.files, &version)?;
    let summary = component.write(&args.project)?;
    println!("{}", summary);
    Ok(())
}
