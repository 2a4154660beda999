use std::path::PathBuf;

use databank::{Bank, BankConfig, NodeId, SortRule};
use databank_utils::{
    config::ConfigFile,
    dump, generate, load,
    pattern::{build_filter, Pattern},
    save,
};
use structopt::StructOpt;
use tracing::{info, Level};

#[cfg(target_env = "musl")]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

pub type Result<T> = anyhow::Result<T>;

#[derive(StructOpt)]
#[structopt(about = "CLI to work with databank files")]
struct Opts {
    #[structopt(short, parse(from_occurrences = set_log_level), global = true)]
    #[allow(dead_code)] // log level will be set in [`set_log_level`]
    /// Increase verbosity
    verbosity: u64,
    #[structopt(subcommand)]
    cmd: Command,
}

fn set_log_level(verbosity: u64) -> u64 {
    let level = match verbosity {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    verbosity
}

#[derive(StructOpt)]
enum Command {
    /// Build a bank of random teams and members and write it to a file
    Build {
        #[structopt(long)]
        /// The file to write
        out: PathBuf,
        #[structopt(long, default_value = "10")]
        /// The number of teams
        teams: usize,
        #[structopt(long, default_value = "20")]
        /// The maximum number of members per team
        members: usize,
        #[structopt(long, default_value = "0")]
        /// Seed for the random data
        seed: u64,
        #[structopt(long)]
        /// A JSON config file for the new bank
        config: Option<PathBuf>,
    },
    /// Dump a bank as an indented outline
    Dump {
        /// The bank file
        file: PathBuf,
        #[structopt(long)]
        /// Only dump the record with this primary key
        pk: Option<u64>,
    },
    /// Dump a bank as JSON to stdout
    DumpJson {
        /// The bank file
        file: PathBuf,
        #[structopt(long)]
        /// Only dump the record with this primary key
        pk: Option<u64>,
    },
    /// Dump a bank as dot. Can be piped directly:
    /// `databank-cli graph bank.db | dot -Tpng -o bank.png`.
    /// Records are depicted as rectangles, data points as plain text.
    Graph {
        /// The bank file
        file: PathBuf,
        #[structopt(long)]
        /// Only graph the record with this primary key
        pk: Option<u64>,
    },
    /// Print the primary keys of all records matching a filter
    Filter {
        /// The bank file
        file: PathBuf,
        #[structopt(long)]
        /// Key of the records to test
        key: String,
        #[structopt(long = "pattern", short = "p")]
        /// Patterns like `member/age>u32:18`, all of which must match
        patterns: Vec<Pattern>,
        #[structopt(long)]
        /// Compare strings without regard to case
        ignore_case: bool,
    },
    /// Sort the siblings of a record by one of their data points, in place
    Sort {
        /// The bank file
        file: PathBuf,
        #[structopt(long)]
        /// Primary key of any record of the generation to sort
        pk: u64,
        #[structopt(long)]
        /// Key of the data point to sort on
        on: String,
        #[structopt(long)]
        /// Sort in descending order
        descending: bool,
        #[structopt(long)]
        /// Write the result here instead of replacing the input
        out: Option<PathBuf>,
    },
    /// Print statistics about a bank
    Stats {
        /// The bank file
        file: PathBuf,
    },
}

/// The record to start from, the root if none is given.
fn start(bank: &Bank, pk: Option<u64>) -> Result<NodeId> {
    match pk {
        Some(pk) => Ok(bank
            .get_record_with_id(pk)
            .ok_or(databank::Error::RecordNotFound(pk))?),
        None => Ok(bank.root()),
    }
}

fn stats(bank: &Bank) {
    let buckets = bank.bucket_lengths();
    let used = buckets.iter().filter(|len| **len > 0).count();
    let longest = buckets.iter().copied().max().unwrap_or_default();
    println!("records:         {}", bank.record_count());
    println!("nodes:           {}", bank.node_count());
    println!("memory used:     {}", bank.memory_used());
    println!("next key:        {}", bank.primary_key_index());
    println!("hash slots:      {} ({} used)", bank.slot_count(), used);
    println!("longest chain:   {}", longest);
    println!("disabled types:  {:?}", bank.disabled_types());
}

fn main() -> Result<()> {
    let opts = Opts::from_args();
    let stdout = std::io::stdout();
    match opts.cmd {
        Command::Build {
            out,
            teams,
            members,
            seed,
            config,
        } => {
            let config = match config {
                Some(path) => ConfigFile::load(path)?.bank_config()?,
                None => BankConfig::default(),
            };
            let bank = Bank::create(config)?;
            generate::build(&bank, seed, teams, members)?;
            let written = save(&bank, &out)?;
            println!(
                "wrote {} records in {} bytes to {}",
                bank.record_count(),
                written,
                out.display()
            );
        }
        Command::Dump { file, pk } => {
            let bank = load(file)?;
            dump::dump(&bank, start(&bank, pk)?, stdout.lock())?;
        }
        Command::DumpJson { file, pk } => {
            let bank = load(file)?;
            let json = dump::to_json(&bank, start(&bank, pk)?)?;
            serde_json::to_writer_pretty(stdout.lock(), &json)?;
            println!();
        }
        Command::Graph { file, pk } => {
            let bank = load(file)?;
            dump::graph(&bank, start(&bank, pk)?, stdout.lock())?;
        }
        Command::Filter {
            file,
            key,
            patterns,
            ignore_case,
        } => {
            let bank = load(file)?;
            let filter = build_filter(&key, &patterns)?;
            let mut hits = 0;
            for (node, _) in bank.walk(bank.root())? {
                if bank.kind(node)? == databank::ValueKind::Record
                    && bank.evaluate(&filter, node, !ignore_case)?
                {
                    println!("{}", bank.primary_key(node)?);
                    hits += 1;
                }
            }
            info!("{} records matched", hits);
        }
        Command::Sort {
            file,
            pk,
            on,
            descending,
            out,
        } => {
            let bank = load(&file)?;
            let sibling = start(&bank, Some(pk))?;
            let rule = if descending {
                SortRule::Descending
            } else {
                SortRule::Ascending
            };
            bank.sort_generation(sibling, &on, rule)?;
            save(&bank, out.unwrap_or(file))?;
        }
        Command::Stats { file } => {
            let bank = load(file)?;
            stats(&bank);
        }
    }
    Ok(())
}
