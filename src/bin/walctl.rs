//! AtlasWAL command-line tool
//!
//! Append records to a WAL directory and inspect existing segments.

use std::path::PathBuf;
use std::process::ExitCode;

use atlaswal::wal::{segment, WalReader, WalRecovery};
use atlaswal::{DurabilityMode, Operation, Wal, WalConfig};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasWAL CLI
#[derive(Parser, Debug)]
#[command(name = "walctl")]
#[command(about = "Write to and inspect an AtlasWAL directory")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Append a put (key + value) or delete (key only) record
    Write {
        /// WAL directory
        dir: PathBuf,

        /// Record key
        key: String,

        /// Record value; omit to log a delete
        value: Option<String>,

        /// Maximum segment size in KB
        #[arg(long, default_value = "4")]
        segment_kb: u64,

        /// Maximum number of segments
        #[arg(long, default_value = "1024")]
        max_segments: usize,

        /// Skip fsync (buffered only)
        #[arg(long)]
        no_fsync: bool,
    },

    /// Print every valid entry in sequence order
    Dump {
        /// WAL directory
        dir: PathBuf,
    },

    /// Check every segment without modifying it
    Verify {
        /// WAL directory
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atlaswal=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Write {
            dir,
            key,
            value,
            segment_kb,
            max_segments,
            no_fsync,
        } => write(dir, key, value, segment_kb, max_segments, !no_fsync),
        Commands::Dump { dir } => dump(dir),
        Commands::Verify { dir } => verify(dir),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn write(
    dir: PathBuf,
    key: String,
    value: Option<String>,
    segment_kb: u64,
    max_segments: usize,
    fsync: bool,
) -> atlaswal::Result<ExitCode> {
    let config = WalConfig::builder()
        .dir(dir)
        .durability(DurabilityMode::from(fsync))
        .max_segment_size(segment_kb * 1024)
        .max_segment_count(max_segments)
        .build();

    let operation = match value {
        Some(value) => Operation::Put {
            key: key.into_bytes(),
            value: value.into_bytes(),
        },
        None => Operation::Delete {
            key: key.into_bytes(),
        },
    };

    let wal = Wal::open(config)?;
    let sequence_number = wal.append(&operation.to_bytes()?)?;
    wal.close()?;

    println!(
        "wrote entry {} to segment {}",
        sequence_number,
        wal.active_segment_id()
    );
    Ok(ExitCode::SUCCESS)
}

fn dump(dir: PathBuf) -> atlaswal::Result<ExitCode> {
    let summary = WalReader::replay(&dir, |entry| {
        match Operation::from_bytes(&entry.payload) {
            Ok(Operation::Put { key, value }) => println!(
                "{:>8}  PUT  {} = {}",
                entry.sequence_number,
                String::from_utf8_lossy(&key),
                String::from_utf8_lossy(&value)
            ),
            Ok(Operation::Delete { key }) => println!(
                "{:>8}  DEL  {}",
                entry.sequence_number,
                String::from_utf8_lossy(&key)
            ),
            Err(_) => println!(
                "{:>8}  RAW  {} bytes",
                entry.sequence_number,
                entry.payload.len()
            ),
        }
        Ok(())
    })?;

    println!(
        "{} entries, last sequence {}",
        summary.entries, summary.last_sequence
    );

    match summary.stopped_at {
        Some((segment_id, offset)) => {
            println!("stopped at invalid frame: segment {} offset {}", segment_id, offset);
            Ok(ExitCode::FAILURE)
        }
        None => Ok(ExitCode::SUCCESS),
    }
}

fn verify(dir: PathBuf) -> atlaswal::Result<ExitCode> {
    let mut clean = true;

    for id in segment::discover_segments(&dir)? {
        let result = WalRecovery::verify(&segment::segment_path(&dir, id))?;
        println!(
            "{}{:<6} entries={:<8} last_sequence={:<8} valid_bytes={:<10} discarded={}",
            segment::SEGMENT_PREFIX,
            id,
            result.entries_recovered,
            result.last_sequence,
            result.valid_bytes,
            result.bytes_discarded
        );
        if result.bytes_discarded > 0 {
            clean = false;
        }
    }

    Ok(if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
