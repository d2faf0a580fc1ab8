use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::model::Event;

/// Frame a commit as `[len][bincode][crc32]`.
fn encode_commit(events: &[Event]) -> io::Result<BytesMut> {
    let payload =
        bincode::serialize(events).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut frame = BytesMut::with_capacity(payload.len() + 8);
    frame.put_u32_le(payload.len() as u32);
    frame.put_slice(&payload);
    frame.put_u32_le(crc32fast::hash(&payload));
    Ok(frame)
}

/// Append-only Write-Ahead Log.
///
/// Format per entry: `[u32: len][bincode: Vec<Event>][u32: crc32]`
/// - One entry is one commit. Its events are replayed together or not at all.
/// - `len` is the byte length of the bincode payload (not including the CRC).
/// - Truncated last entry (crash) is safely discarded via length-prefix + CRC check.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    /// Open (or create) the WAL file at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    /// Append a single commit and fsync. Used by tests only;
    /// production code uses `append_buffered` + `flush_sync` for group commit.
    #[cfg(test)]
    pub fn append(&mut self, events: &[Event]) -> io::Result<()> {
        self.append_buffered(events)?;
        self.flush_sync()
    }

    /// Append a commit to the BufWriter without flushing or syncing.
    /// Call `flush_sync()` after the batch to durably commit all buffered entries.
    pub fn append_buffered(&mut self, events: &[Event]) -> io::Result<()> {
        let frame = encode_commit(events)?;
        self.writer.write_all(&frame)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    /// Flush the BufWriter and fsync the underlying file.
    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write compacted commits to a temp file and fsync.
    pub fn write_compact_file(path: &Path, commits: &[Vec<Event>]) -> io::Result<()> {
        let tmp_path = path.with_extension("wal.tmp");
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        for commit in commits {
            writer.write_all(&encode_commit(commit)?)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Atomic swap: rename temp file over the WAL and reopen.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        let tmp_path = self.path.with_extension("wal.tmp");
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    /// Both compaction phases in one call. Used by tests.
    #[cfg(test)]
    pub fn compact(&mut self, commits: &[Vec<Event>]) -> io::Result<()> {
        Self::write_compact_file(&self.path, commits)?;
        self.swap_compact_file()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Replay the WAL from disk, returning all valid commits in order.
    /// Truncated/corrupt trailing entries are silently discarded.
    pub fn replay(path: &Path) -> io::Result<Vec<Vec<Event>>> {
        Ok(Self::scan(path)?.0)
    }

    /// Replay, then cut the file back to the end of the last valid commit so
    /// that later appends are not stranded behind a torn tail.
    pub fn recover(path: &Path) -> io::Result<Vec<Vec<Event>>> {
        let (commits, valid_len) = Self::scan(path)?;
        let file = match OpenOptions::new().write(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(commits),
            Err(e) => return Err(e),
        };
        let len = file.metadata()?.len();
        if len > valid_len {
            tracing::warn!(
                "discarding {} bytes of torn WAL tail in {}",
                len - valid_len,
                path.display()
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        Ok(commits)
    }

    /// Valid commits plus the byte length they occupy from the start of the file.
    fn scan(path: &Path) -> io::Result<(Vec<Vec<Event>>, u64)> {
        let data = match fs::read(path) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(e),
        };
        let total = data.len();
        let mut buf = Bytes::from(data);
        let mut commits = Vec::new();
        let mut valid_len = 0usize;

        while buf.remaining() >= 4 {
            let len = buf.get_u32_le() as usize;
            if buf.remaining() < len + 4 {
                break; // truncated
            }
            let payload = buf.split_to(len);
            let stored_crc = buf.get_u32_le();
            if stored_crc != crc32fast::hash(&payload) {
                // Corrupt entry: stop replaying
                break;
            }
            match bincode::deserialize::<Vec<Event>>(&payload) {
                Ok(events) => commits.push(events),
                Err(_) => break,
            }
            valid_len = total - buf.remaining();
        }

        Ok((commits, valid_len as u64))
    }
}
