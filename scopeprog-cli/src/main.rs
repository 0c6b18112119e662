//! scopeprog CLI - Command-line tool for the scope-meter flash programmer.
//!
//! ## Features
//!
//! - RAM test and flash chip identification
//! - Full-chip erase with confirmation
//! - Dump flash to an image file / program flash from an image file
//! - Diagnostic raw read (hex dump) and raw write (test pattern)
//! - Scope-meter model and serial-number readout (V1 firmware)
//! - Shell completion generation
//! - Environment variable support

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use console::style;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use scopeprog::{
    Command, DeviceProfile, FirmwareRevision, FlashSize, NativePort, NativePortEnumerator, Outcome,
    Port, PortEnumerator, Programmer, RAW_WRITE_PATTERN, SerialConfig, WORD_BYTES,
    programmer::RAW_WRITE_ADDR,
};
use std::env;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write as _};
use std::path::PathBuf;
use std::time::Duration;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

/// Check if animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(std::sync::atomic::Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// scopeprog - host-side driver for the scope-meter flash-module programmer.
///
/// Environment variables:
///   SCOPEPROG_PORT      - Default serial port
///   SCOPEPROG_FIRMWARE  - Default programmer firmware revision (v1, v2)
///   SCOPEPROG_TIMEOUT   - Default read timeout in seconds
#[derive(Parser)]
#[command(name = "scopeprog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Serial port the programmer is attached to.
    #[arg(
        short,
        long,
        global = true,
        default_value = "/dev/ttyUSB0",
        env = "SCOPEPROG_PORT"
    )]
    port: String,

    /// Module has the older 16 Mbit flash chips (default: 8 Mbit).
    #[arg(long, global = true)]
    large: bool,

    /// Programmer firmware revision.
    #[arg(
        long,
        global = true,
        default_value = "v1",
        env = "SCOPEPROG_FIRMWARE"
    )]
    firmware: Firmware,

    /// Read timeout in seconds.
    #[arg(
        long,
        global = true,
        default_value = "20",
        env = "SCOPEPROG_TIMEOUT"
    )]
    timeout: u64,

    /// Assume "y" for all confirmation prompts.
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Programmer firmware revisions.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Firmware {
    /// Earlier firmware: dual-chip diagnostics, scope-meter metadata.
    V1,
    /// Later firmware: single-chip diagnostics.
    V2,
}

impl From<Firmware> for FirmwareRevision {
    fn from(fw: Firmware) -> Self {
        match fw {
            Firmware::V1 => FirmwareRevision::V1,
            Firmware::V2 => FirmwareRevision::V2,
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the RAM test and report per-chip error counts.
    Test,

    /// Read manufacturer and device IDs of the flash chips.
    Id {
        /// Output the IDs as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Erase the entire flash (asks for confirmation).
    Erase,

    /// Dump flash contents to an image file.
    Read {
        /// Output image file.
        image: PathBuf,

        /// Start address in words (hex, default 0).
        #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
        addr: u32,

        /// Number of words to read (default: whole chip).
        #[arg(long)]
        words: Option<u32>,
    },

    /// Erase the chip and program it from an image file (asks for
    /// confirmation).
    Write {
        /// Input image file.
        image: PathBuf,

        /// Start address in words (hex, default 0).
        #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
        addr: u32,

        /// Number of words to write (default: whole chip).
        #[arg(long)]
        words: Option<u32>,
    },

    /// Diagnostic read of a 64-word window, printed as a hex dump.
    RawRead {
        /// Start address in words (hex, default 0).
        #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
        addr: u32,
    },

    /// Diagnostic write of literal words at word address 1.
    RawWrite {
        /// Pattern words in hex (default: the classic 8-word test pattern).
        #[arg(value_parser = parse_hex_u32)]
        words: Vec<u32>,
    },

    /// Read the scope-meter model and serial number (V1 firmware only).
    Scopemeter,

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Parse hexadecimal value (supports 0x prefix and underscores).
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    // Support underscore separators like 0x0008_0000
    let s: String = s.chars().filter(|c| *c != '_').collect();
    u32::from_str_radix(&s, 16).map_err(|e| format!("Invalid hex value: {e}"))
}

fn main() -> Result<()> {
    // --- NO_COLOR and TTY detection (clig.dev best practice) ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, std::sync::atomic::Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        // Disable all color output
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "scopeprog v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match &cli.command {
        Commands::Test => cmd_test(&cli),
        Commands::Id { json } => cmd_id(&cli, *json),
        Commands::Erase => cmd_erase(&cli),
        Commands::Read { image, addr, words } => cmd_read(&cli, image, *addr, *words),
        Commands::Write { image, addr, words } => cmd_write(&cli, image, *addr, *words),
        Commands::RawRead { addr } => cmd_raw_read(&cli, *addr),
        Commands::RawWrite { words } => cmd_raw_write(&cli, words),
        Commands::Scopemeter => cmd_scopemeter(&cli),
        Commands::ListPorts { json } => cmd_list_ports(*json),
        Commands::Completions { shell } => {
            cmd_completions(*shell);
            Ok(())
        },
    }
}

/// The device profile selected by the global flags.
fn profile_from(cli: &Cli) -> DeviceProfile {
    let size = if cli.large {
        FlashSize::Mbit16
    } else {
        FlashSize::Mbit8
    };
    DeviceProfile::new(size, cli.firmware.into())
}

/// Open the serial port and wrap it in the command engine.
///
/// The engine owns the port; dropping it on any exit path closes the port.
fn open_programmer(cli: &Cli) -> Result<Programmer<NativePort>> {
    let profile = profile_from(cli);
    let config = SerialConfig::new(&cli.port, 115200)
        .with_timeout(Duration::from_secs(cli.timeout));

    if !cli.quiet {
        eprintln!(
            "{} Using port {} ({} module, {} firmware)",
            style("🔌").cyan(),
            style(&cli.port).cyan(),
            profile.size,
            profile.revision
        );
    }

    let mut port = NativePort::open(&config)
        .with_context(|| format!("Failed to open serial port {}", cli.port))?;
    // Drop anything left over from a previous run before the first exchange
    port.clear_buffers()
        .context("Failed to clear serial buffers")?;
    Ok(Programmer::new(port, profile))
}

/// Confirmation hook for the engine's destructive commands.
///
/// The prompt stays a plain stderr/stdin exchange so scripted callers can
/// pipe a "y" in; `--yes` answers without prompting.
fn engine_confirm(assume_yes: bool) -> impl FnMut(&str) -> bool {
    move |prompt: &str| {
        if assume_yes {
            return true;
        }
        eprint!("{prompt}");
        let _ = io::stderr().flush();
        let mut answer = String::new();
        if io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        answer.trim() == "y"
    }
}

/// Progress bar for bulk transfers, hidden when quiet or not on a TTY.
fn transfer_bar(cli: &Cli, total_bytes: u64) -> ProgressBar {
    if cli.quiet || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(total_bytes);
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb
    }
}

/// RAM test command implementation.
fn cmd_test(cli: &Cli) -> Result<()> {
    let mut programmer = open_programmer(cli)?;
    let outcome = programmer.execute(Command::Test, &mut engine_confirm(cli.yes), &mut |_, _| {})?;

    let Outcome::TestErrors(errors) = outcome else {
        bail!("unexpected outcome for test command");
    };
    for (i, count) in errors.iter().enumerate() {
        println!("error count U{}: {}", i + 1, count);
    }
    Ok(())
}

/// Identify command implementation.
fn cmd_id(cli: &Cli, json: bool) -> Result<()> {
    let mut programmer = open_programmer(cli)?;
    let outcome =
        programmer.execute(Command::Identify, &mut engine_confirm(cli.yes), &mut |_, _| {})?;

    let Outcome::ChipIds(ids) = outcome else {
        bail!("unexpected outcome for id command");
    };

    if json {
        let chips: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "manufacturer": format!("{:04x}", id.manufacturer),
                    "device": format!("{:04x}", id.device),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "chips": chips }))
                .unwrap_or_default()
        );
        return Ok(());
    }

    // Flash chips sit at board positions U3 and U4
    let label = if ids.len() == 2 { "(U3 U4)" } else { "(U3)" };
    let manufacturers: Vec<String> = ids
        .iter()
        .map(|id| format!("{:04x}", id.manufacturer))
        .collect();
    let devices: Vec<String> = ids
        .iter()
        .map(|id| format!("{:04x}", id.device))
        .collect();
    println!("manufacturer's IDs {label}: {}", manufacturers.join(" "));
    println!("device IDs {label}: {}", devices.join(" "));
    Ok(())
}

/// Erase command implementation.
fn cmd_erase(cli: &Cli) -> Result<()> {
    let mut programmer = open_programmer(cli)?;
    let outcome = programmer.execute(Command::Erase, &mut engine_confirm(cli.yes), &mut |_, _| {})?;

    match outcome {
        Outcome::Declined => {
            if !cli.quiet {
                eprintln!("{} Erase declined, nothing done", style("•").dim());
            }
        },
        Outcome::Erased => {
            if !cli.quiet {
                eprintln!("{} Flash erased", style("✓").green().bold());
            }
        },
        _ => bail!("unexpected outcome for erase command"),
    }
    Ok(())
}

/// Read command implementation: dump flash to an image file.
fn cmd_read(cli: &Cli, image: &PathBuf, addr: u32, words: Option<u32>) -> Result<()> {
    let mut programmer = open_programmer(cli)?;
    let size_words = words.unwrap_or_else(|| {
        programmer
            .profile()
            .flash_words()
    });

    if image.exists() && !cli.yes {
        let overwrite = dialoguer::Confirm::new()
            .with_prompt(format!("{} exists, overwrite?", image.display()))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !overwrite {
            if !cli.quiet {
                eprintln!("{} Read cancelled", style("•").dim());
            }
            return Ok(());
        }
    }

    let file = File::create(image)
        .with_context(|| format!("Failed to create image file {}", image.display()))?;
    let mut sink = BufWriter::new(file);

    let total_bytes = u64::from(size_words) * u64::from(WORD_BYTES);
    let pb = transfer_bar(cli, total_bytes);
    pb.set_message("reading");

    let outcome = programmer.execute(
        Command::Read {
            start_addr: addr,
            size_words,
            sink: &mut sink,
        },
        &mut engine_confirm(cli.yes),
        &mut |transferred, _total| pb.set_position(transferred),
    )?;
    pb.finish_and_clear();
    sink.flush()
        .context("Failed to flush image file")?;

    let Outcome::Read { bytes } = outcome else {
        bail!("unexpected outcome for read command");
    };
    if !cli.quiet {
        eprintln!(
            "{} Read {} bytes into {}",
            style("✓").green().bold(),
            bytes,
            image.display()
        );
    }
    Ok(())
}

/// Write command implementation: erase, then program from an image file.
fn cmd_write(cli: &Cli, image: &PathBuf, addr: u32, words: Option<u32>) -> Result<()> {
    let mut programmer = open_programmer(cli)?;
    let size_words = words.unwrap_or_else(|| {
        programmer
            .profile()
            .flash_words()
    });

    let file = File::open(image)
        .with_context(|| format!("Failed to open image file {}", image.display()))?;
    let total_bytes = u64::from(size_words) * u64::from(WORD_BYTES);
    let file_len = file
        .metadata()
        .with_context(|| format!("Failed to stat image file {}", image.display()))?
        .len();
    if file_len < total_bytes {
        bail!(
            "Image file {} is {} bytes, but {} bytes are needed to cover {} words",
            image.display(),
            file_len,
            total_bytes,
            size_words
        );
    }
    let mut source = BufReader::new(file);

    let pb = transfer_bar(cli, total_bytes);
    pb.set_message("writing");

    let outcome = programmer.execute(
        Command::Write {
            start_addr: addr,
            size_words,
            source: &mut source,
        },
        &mut engine_confirm(cli.yes),
        &mut |transferred, _total| pb.set_position(transferred),
    )?;
    pb.finish_and_clear();

    match outcome {
        Outcome::Declined => {
            if !cli.quiet {
                eprintln!("{} Write declined, nothing done", style("•").dim());
            }
        },
        Outcome::Written { bytes } => {
            if !cli.quiet {
                eprintln!(
                    "{} Erased and wrote {} bytes from {}",
                    style("✓").green().bold(),
                    bytes,
                    image.display()
                );
            }
        },
        _ => bail!("unexpected outcome for write command"),
    }
    Ok(())
}

/// Raw read command implementation: hex dump of a diagnostic window.
fn cmd_raw_read(cli: &Cli, addr: u32) -> Result<()> {
    let mut programmer = open_programmer(cli)?;
    let outcome = programmer.execute(
        Command::RawRead { start_addr: addr },
        &mut engine_confirm(cli.yes),
        &mut |_, _| {},
    )?;

    let Outcome::RawRead { dump } = outcome else {
        bail!("unexpected outcome for raw-read command");
    };
    println!("{dump}");
    Ok(())
}

/// Raw write command implementation: diagnostic pattern words.
fn cmd_raw_write(cli: &Cli, words: &[u32]) -> Result<()> {
    let words = if words.is_empty() {
        &RAW_WRITE_PATTERN[..]
    } else {
        words
    };

    let mut programmer = open_programmer(cli)?;
    let outcome = programmer.execute(
        Command::RawWrite {
            start_addr: RAW_WRITE_ADDR,
            words,
        },
        &mut engine_confirm(cli.yes),
        &mut |_, _| {},
    )?;

    let Outcome::RawWritten { words } = outcome else {
        bail!("unexpected outcome for raw-write command");
    };
    if !cli.quiet {
        eprintln!(
            "{} Wrote {} diagnostic words",
            style("✓").green().bold(),
            words
        );
    }
    Ok(())
}

/// Scope-meter metadata command implementation.
fn cmd_scopemeter(cli: &Cli) -> Result<()> {
    let mut programmer = open_programmer(cli)?;
    let outcome = programmer.execute(
        Command::ScopeMeterInfo,
        &mut engine_confirm(cli.yes),
        &mut |_, _| {},
    )?;

    let Outcome::ScopeMeter { model, serial } = outcome else {
        bail!("unexpected outcome for scopemeter command");
    };
    println!("Model: {model}");
    println!("SN: {serial}");
    Ok(())
}

/// List ports command implementation.
fn cmd_list_ports(json: bool) -> Result<()> {
    let ports = NativePortEnumerator::list_ports().context("Failed to enumerate serial ports")?;

    if json {
        let entries: Vec<serde_json::Value> = ports
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "vid": p.vid,
                    "pid": p.pid,
                    "manufacturer": p.manufacturer,
                    "product": p.product,
                    "serial": p.serial_number,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).unwrap_or_default()
        );
        return Ok(());
    }

    eprintln!("{}", style("Available serial ports").bold().underlined());

    if ports.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
    } else {
        for port in &ports {
            let product = port.product.as_deref().unwrap_or("");
            let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
                format!(" ({vid:04X}:{pid:04X})")
            } else {
                String::new()
            };

            eprintln!(
                "  {} {}{}{}",
                style("•").green(),
                style(&port.name).cyan(),
                vid_pid,
                if product.is_empty() {
                    String::new()
                } else {
                    format!(" - {}", style(product).dim())
                }
            );
        }
    }
    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}
