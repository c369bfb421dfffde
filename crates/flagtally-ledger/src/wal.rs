//! Crash-recoverable vote ledger backed by an append-only log file.
//!
//! On-disk format, one frame per record:
//! ```text
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode-serialized VoteRecord)]
//! ```
//!
//! Opening the ledger replays the file into the same indexed state the
//! in-memory backend uses. Frames that fail the CRC check are skipped. A
//! frame that runs past the end of the file is a torn write: it is copied to
//! `<log>.torn` and cut off so later appends start on a frame boundary. A
//! header whose length no frame could have refuses the open with
//! [`LedgerError::Corrupt`] and leaves the file untouched.
//!
//! Each frame is written to the file in one call. If the write or the sync
//! fails, the file is cut back to the last committed frame before the error
//! is returned.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use flagtally_types::{VoteKey, VoteRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{LedgerError, Result};
use crate::filter::VoteFilter;
use crate::memory::LedgerState;
use crate::traits::VoteLedger;

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: u64 = 8;

/// Upper bound on a frame's payload length. Encoded vote records are well
/// under a hundred bytes.
const MAX_FRAME_LEN: u32 = 4096;

/// Flush/sync strategy for the log file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every append (safest, highest latency).
    EveryWrite,
    /// Leave flushing to the OS page cache.
    #[default]
    OsDefault,
}

struct LogWriter {
    file: File,
    /// End of the last committed frame.
    offset: u64,
    /// Set when a failed append could not be rolled back.
    poisoned: bool,
}

impl LogWriter {
    fn append(&mut self, frame: &[u8], sync: bool) -> io::Result<()> {
        self.file.write_all(frame)?;
        if sync {
            self.file.sync_all()?;
        }
        self.offset += frame.len() as u64;
        Ok(())
    }

    /// Cut the file back to the last committed frame.
    fn rollback(&mut self) -> io::Result<()> {
        if self.file.metadata()?.len() > self.offset {
            self.file.set_len(self.offset)?;
        }
        Ok(())
    }
}

/// Vote ledger persisted to a single append-only log file.
pub struct WalVoteLedger {
    path: PathBuf,
    sync_mode: SyncMode,
    state: RwLock<LedgerState>,
    writer: Mutex<LogWriter>,
}

impl std::fmt::Debug for WalVoteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalVoteLedger")
            .field("path", &self.path)
            .field("sync_mode", &self.sync_mode)
            .finish_non_exhaustive()
    }
}

impl WalVoteLedger {
    /// Open (or create) the log at `path` and replay it.
    pub fn open(path: &Path, sync_mode: SyncMode) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (state, valid_len) = recover(path)?;

        let file_len = file.metadata()?.len();
        if valid_len < file_len {
            let torn = save_torn_tail(path, valid_len)?;
            warn!(
                path = %path.display(),
                valid_len,
                file_len,
                saved_to = %torn.display(),
                "moving torn tail of vote log aside"
            );
            file.set_len(valid_len)?;
        }

        info!(
            path = %path.display(),
            records = state.len(),
            "vote log opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            sync_mode,
            state: RwLock::new(state),
            writer: Mutex::new(LogWriter {
                file,
                offset: valid_len,
                poisoned: false,
            }),
        })
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current end-of-log offset in bytes.
    pub fn offset(&self) -> Result<u64> {
        Ok(self.lock_writer()?.offset)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|_| LedgerError::Unavailable("vote log read lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|_| LedgerError::Unavailable("vote log write lock poisoned".into()))
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, LogWriter>> {
        self.writer
            .lock()
            .map_err(|_| LedgerError::Unavailable("vote log writer poisoned".into()))
    }

    /// Append one frame for `record`. On failure the log holds no trace of it.
    fn append_frame(&self, w: &mut LogWriter, record: &VoteRecord) -> Result<u64> {
        if w.poisoned {
            return Err(LedgerError::Unavailable(
                "vote log holds an unfinished write; reopen to recover".into(),
            ));
        }

        let payload =
            bincode::serialize(record).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .ok()
            .filter(|len| *len <= MAX_FRAME_LEN)
            .ok_or_else(|| LedgerError::Serialization("record exceeds frame size".into()))?;
        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE as usize + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);

        let frame_offset = w.offset;
        if let Err(e) = w.append(&frame, self.sync_mode == SyncMode::EveryWrite) {
            if let Err(rollback) = w.rollback() {
                warn!(
                    path = %self.path.display(),
                    offset = frame_offset,
                    error = %rollback,
                    "failed to roll back vote log append; refusing further writes"
                );
                w.poisoned = true;
            }
            return Err(e.into());
        }
        Ok(frame_offset)
    }
}

impl VoteLedger for WalVoteLedger {
    fn insert(&self, key: &VoteKey) -> Result<VoteRecord> {
        // Lock order: state, then writer.
        let mut state = self.write()?;
        let record = state.next_record(key)?;

        let offset = {
            let mut w = self.lock_writer()?;
            self.append_frame(&mut w, &record)?
        };
        state.push(record.clone())?;

        debug!(id = record.id.0, key = %key, offset, "vote appended to log");
        Ok(record)
    }

    fn count(&self, filter: &VoteFilter) -> Result<u64> {
        Ok(self.read()?.select(filter).count() as u64)
    }

    fn list(&self, filter: &VoteFilter) -> Result<Vec<VoteRecord>> {
        Ok(self.read()?.select(filter).cloned().collect())
    }
}

/// Replay the log at `path`. Returns the rebuilt state and the length of the
/// valid prefix of the file.
fn recover(path: &Path) -> Result<(LedgerState, u64)> {
    let mut reader = BufReader::new(File::open(path)?);
    let file_len = reader.get_ref().metadata()?.len();
    let mut state = LedgerState::default();
    let mut offset: u64 = 0;

    while offset + HEADER_SIZE <= file_len {
        let mut header = [0u8; HEADER_SIZE as usize];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if length == 0 || length > MAX_FRAME_LEN {
            return Err(LedgerError::Corrupt {
                offset,
                reason: format!("frame header declares {length} payload bytes"),
            });
        }
        let next_offset = offset + HEADER_SIZE + u64::from(length);
        if next_offset > file_len {
            warn!(offset, length, file_len, "vote frame runs past end of log; stopping recovery");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        match reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!(offset, "truncated vote frame; stopping recovery");
                break;
            }
            Err(e) => return Err(e.into()),
        }

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; skipping vote frame"
            );
            offset = next_offset;
            continue;
        }

        match bincode::deserialize::<VoteRecord>(&payload) {
            Ok(record) => {
                let key = record.key();
                if state.push(record).is_err() {
                    warn!(offset, key = %key, "duplicate vote in log; skipping");
                }
            }
            Err(e) => {
                warn!(offset, error = %e, "failed to decode vote frame; skipping");
            }
        }

        offset = next_offset;
    }

    debug!(recovered = state.len(), valid_len = offset, "vote log recovery complete");
    Ok((state, offset))
}

/// Path the torn tail of `path` is saved to.
fn torn_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".torn");
    PathBuf::from(name)
}

/// Copy the bytes of `path` from `from` to the end into its `.torn` file.
fn save_torn_tail(path: &Path, from: u64) -> Result<PathBuf> {
    let mut source = File::open(path)?;
    source.seek(SeekFrom::Start(from))?;

    let torn = torn_path(path);
    let mut sink = OpenOptions::new().create(true).append(true).open(&torn)?;
    io::copy(&mut source, &mut sink)?;
    sink.sync_all()?;
    Ok(torn)
}
