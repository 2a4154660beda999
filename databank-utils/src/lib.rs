pub mod config;
pub mod dump;
pub mod generate;
pub mod pattern;

use std::{fs, path::Path};

use anyhow::Context;
use databank::Bank;

/// Load a bank from a file written by [save].
///
/// A partial load is an error here, since the tools want either the whole file or nothing.
pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Bank> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (bank, report) = Bank::deserialize_with_report(&bytes)?;
    if let Some(cause) = report.stopped_by {
        anyhow::bail!(
            "{} is damaged, stopped after {} nodes: {}",
            path.display(),
            report.nodes_loaded,
            cause
        );
    }
    Ok(bank)
}

/// Write a bank to a file, replacing whatever was there.
pub fn save(bank: &Bank, path: impl AsRef<Path>) -> anyhow::Result<usize> {
    let path = path.as_ref();
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let written = bank.serialize_into(std::io::BufWriter::new(file))?;
    Ok(written)
}
