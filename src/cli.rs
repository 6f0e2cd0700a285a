// Command-line interface (feature `cli`).
//
// Subcommands: `puff` and `huff` transcode files, `locate` prints the
// deflate extents inside a container, `blocks` prints the block structure
// of a raw deflate stream, `config` prints build details.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use serde::Serialize;

use crate::deflate::BlockType;
use crate::engine;
use crate::io::{huff_file, puff_file};
use crate::locator::{self, ByteExtent};

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// DEFLATE <-> puff transcoder.
#[derive(Parser, Debug)]
#[command(
    name = "oxipuff",
    version,
    about = "Transcode DEFLATE streams to and from the diff-friendly puff form",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Transcode a raw DEFLATE file into its puff form.
    Puff(TranscodeArgs),
    /// Transcode a puff file back into raw DEFLATE bytes.
    Huff(TranscodeArgs),
    /// Print the deflate extents inside a gzip/zlib/zip container.
    Locate(LocateArgs),
    /// Print the block structure of a raw DEFLATE file.
    Blocks(PrintArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct TranscodeArgs {
    /// Input file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Write output to stdout.
    #[arg(short = 'c', long, conflicts_with = "output")]
    stdout: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Gzip,
    Zlib,
    Zip,
}

#[derive(Args, Debug)]
struct LocateArgs {
    /// Container format.
    #[arg(long, value_enum, default_value_t = FormatArg::Gzip)]
    format: FormatArg,

    /// Container file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct PrintArgs {
    /// Raw DEFLATE file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();
    let code = match dispatch(&cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("oxipuff: {e}");
            1
        }
    };
    process::exit(code);
}

fn dispatch(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Cmd::Puff(args) => transcode(cli, args, Direction::Puff),
        Cmd::Huff(args) => transcode(cli, args, Direction::Huff),
        Cmd::Locate(args) => locate(cli, args),
        Cmd::Blocks(args) => blocks(cli, args),
        Cmd::Config => {
            print_config();
            Ok(())
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Puff,
    Huff,
}

/// Stats reported after a transcode, serialized as-is for `--json`.
#[derive(Serialize)]
struct TranscodeStats {
    command: &'static str,
    input_size: u64,
    output_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    streams: Option<u64>,
}

fn report_stats(cli: &Cli, stats: &TranscodeStats) {
    if cli.json_output {
        eprintln!("{}", serde_json::to_string_pretty(stats).unwrap());
    } else if !cli.quiet {
        match (stats.blocks, stats.streams) {
            (Some(blocks), Some(streams)) => eprintln!(
                "{}: {} -> {} bytes ({blocks} blocks, {streams} streams)",
                stats.command, stats.input_size, stats.output_size
            ),
            _ => eprintln!(
                "{}: {} -> {} bytes",
                stats.command, stats.input_size, stats.output_size
            ),
        }
    }
}

fn check_overwrite(cli: &Cli, path: &Path) -> io::Result<()> {
    if !cli.force && path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists (use --force to overwrite)", path.display()),
        ));
    }
    Ok(())
}

fn transcode(
    cli: &Cli,
    args: &TranscodeArgs,
    direction: Direction,
) -> Result<(), Box<dyn std::error::Error>> {
    let command = match direction {
        Direction::Puff => "puff",
        Direction::Huff => "huff",
    };

    if args.stdout {
        let mut input = File::open(&args.input)?;
        let mut stdout = io::stdout().lock();
        let (read, written) = match direction {
            Direction::Puff => engine::puff_stream(&mut input, &mut stdout)?,
            Direction::Huff => engine::huff_stream(&mut input, &mut stdout)?,
        };
        stdout.flush()?;
        report_stats(
            cli,
            &TranscodeStats {
                command,
                input_size: read,
                output_size: written,
                blocks: None,
                streams: None,
            },
        );
        return Ok(());
    }

    let output = args
        .output
        .as_ref()
        .ok_or("missing output file (or use --stdout)")?;
    check_overwrite(cli, output)?;

    let stats = match direction {
        Direction::Puff => {
            let stats = puff_file(&args.input, output)?;
            TranscodeStats {
                command,
                input_size: stats.input_size,
                output_size: stats.output_size,
                blocks: Some(stats.blocks),
                streams: Some(stats.streams),
            }
        }
        Direction::Huff => {
            let stats = huff_file(&args.input, output)?;
            TranscodeStats {
                command,
                input_size: stats.input_size,
                output_size: stats.output_size,
                blocks: None,
                streams: None,
            }
        }
    };
    report_stats(cli, &stats);
    Ok(())
}

fn locate(cli: &Cli, args: &LocateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(&args.input)?;
    let extents = match args.format {
        FormatArg::Gzip => locator::locate_deflates_in_gzip(&data)?,
        FormatArg::Zlib => locator::locate_deflates_in_zlib(&data)?,
        FormatArg::Zip => locator::locate_deflates_in_zip(&data)?,
    };
    print_extents(cli, &extents);
    Ok(())
}

fn print_extents(cli: &Cli, extents: &[ByteExtent]) {
    let mut stdout = io::stdout().lock();
    if cli.json_output {
        let json: Vec<_> = extents
            .iter()
            .map(|e| serde_json::json!({ "offset": e.offset, "length": e.length }))
            .collect();
        let _ = writeln!(stdout, "{}", serde_json::to_string_pretty(&json).unwrap());
    } else {
        for e in extents {
            let _ = writeln!(stdout, "{}\t{}", e.offset, e.length);
        }
    }
}

fn blocks(cli: &Cli, args: &PrintArgs) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(&args.input)?;
    let blocks = locator::locate_deflate_blocks(&data)?;
    let mut stdout = io::stdout().lock();
    for b in &blocks {
        let kind = match b.block_type {
            BlockType::Uncompressed => "stored",
            BlockType::Fixed => "fixed",
            BlockType::Dynamic => "dynamic",
        };
        let _ = writeln!(
            stdout,
            "{}\t{}\t{}\t{}\t{}",
            b.bit_offset,
            b.bit_length,
            kind,
            if b.final_block { "final" } else { "-" },
            b.uncompressed_size
        );
    }
    if !cli.quiet && cli.verbose > 0 {
        eprintln!("{} blocks", blocks.len());
    }
    Ok(())
}

fn print_config() {
    println!("oxipuff {}", env!("CARGO_PKG_VERSION"));
    println!("features:");
    println!("  cli: enabled");
    #[cfg(feature = "file-io")]
    println!("  file-io: enabled");
    #[cfg(not(feature = "file-io"))]
    println!("  file-io: disabled");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
