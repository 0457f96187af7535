//! Append-only order log
//!
//! One JSON object per line. The log is the source of truth on restart:
//! [`OrderLog::replay`] rebuilds the ledger, skipping any row that fails
//! structural validation rather than refusing to start.
//!
//! Appends are serialized by the log lock and issued as a single
//! `write_all` of the complete line, so concurrent writers never interleave
//! records. A failed write is truncated back to the previous record end.
//! Anything torn that survives (a crash, or a truncate that also failed) is
//! sealed with a newline before the next append and skipped on replay.

use crate::order::{Order, OrderRecord};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Result of replaying the log at startup
#[derive(Debug, Clone, Default)]
pub struct Replay {
    /// Well-formed orders, deduplicated and sorted by transaction number
    pub orders: Vec<Order>,
    /// Highest transaction number seen, `None` when the log is empty
    pub max_transaction: Option<u64>,
    /// Rows that failed validation
    pub skipped: usize,
}

/// Durable, append-only order log for one replica
pub struct OrderLog {
    path: PathBuf,
    /// Log lock; also owns the append handle
    file: Mutex<File>,
}

impl OrderLog {
    /// Open (or create) the log at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        seal_torn_tail(&mut file)?;

        tracing::info!("Order log opened at {}", path.display());
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one committed order
    pub fn append(&self, order: &Order) -> Result<()> {
        let mut line = serde_json::to_vec(order)?;
        line.push(b'\n');

        let mut file = self.file.lock();
        seal_torn_tail(&mut file)?;
        let end = file.metadata()?.len();
        if let Err(e) = write_line(&mut file, &line) {
            if let Err(truncate) = file.set_len(end) {
                tracing::warn!(
                    "Could not drop partial record {} from {}: {}",
                    order.transaction_number,
                    self.path.display(),
                    truncate
                );
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Swap the append handle for a read-only one so every write fails
    #[cfg(test)]
    pub(crate) fn make_read_only(&self) -> Result<()> {
        *self.file.lock() = File::open(&self.path)?;
        Ok(())
    }

    /// Read every well-formed record
    pub fn replay(&self) -> Result<Replay> {
        let _guard = self.file.lock();
        let reader = match File::open(&self.path) {
            Ok(f) => BufReader::new(f),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Order log {} missing, starting empty", self.path.display());
                return Ok(Replay::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut replay = Replay::default();
        let mut seen = HashSet::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Ok(order) => {
                    if !seen.insert(order.transaction_number) {
                        tracing::warn!(
                            "Skipping duplicate order {} at line {} of {}",
                            order.transaction_number,
                            index + 1,
                            self.path.display()
                        );
                        replay.skipped += 1;
                        continue;
                    }
                    replay.max_transaction = replay.max_transaction.max(Some(order.transaction_number));
                    replay.orders.push(order);
                }
                Err(e) => {
                    tracing::warn!("Skipping line {} of {}: {}", index + 1, self.path.display(), e);
                    replay.skipped += 1;
                }
            }
        }
        replay.orders.sort_by_key(|o| o.transaction_number);

        tracing::info!(
            "Replayed {} orders from {} (max transaction {:?}, {} skipped)",
            replay.orders.len(),
            self.path.display(),
            replay.max_transaction,
            replay.skipped
        );
        Ok(replay)
    }

    /// Scan the file for one transaction number
    pub fn find(&self, transaction_number: u64) -> Result<Option<Order>> {
        let _guard = self.file.lock();
        let reader = BufReader::new(File::open(&self.path)?);
        for line in reader.lines() {
            let line = line?;
            if let Ok(order) = parse_line(&line) {
                if order.transaction_number == transaction_number {
                    return Ok(Some(order));
                }
            }
        }
        Ok(None)
    }
}

fn parse_line(line: &str) -> Result<Order> {
    let record: OrderRecord = serde_json::from_str(line)
        .map_err(|e| Error::LogCorruption(format!("unparseable row: {}", e)))?;
    record
        .into_order()
        .map_err(|e| Error::LogCorruption(e.to_string()))
}

fn write_line(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line)?;
    file.flush()
}

/// Terminate a torn trailing record so the next append starts on a fresh line
fn seal_torn_tail(file: &mut File) -> Result<()> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        tracing::warn!("Order log has a torn trailing record, sealing it");
        file.write_all(b"\n")?;
        file.flush()?;
    }
    Ok(())
}
