use crate::error::CartdataError;
use crate::memory::LiveMemory;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

struct OpenRecord {
    id: String,
    file: File,
}

/// Persistent 256-byte save record backing the cartdata window. Writes to
/// the window only mark it dirty; the record is rewritten at most once per
/// tick, when the scheduler flushes.
pub struct CartdataStore {
    dir: PathBuf,
    record: Option<OpenRecord>,
    dirty: bool,
    writes: u64,
}

impl CartdataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CartdataStore {
            dir: dir.into(),
            record: None,
            dirty: false,
            writes: 0,
        }
    }

    /// id of the open record, if any
    pub fn id(&self) -> Option<&str> {
        self.record.as_ref().map(|r| r.id.as_str())
    }

    /// file writes since this store was created
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Open (creating if needed) the record for `id` and load it into the
    /// cartdata window, zero-filling whatever the file is short of.
    pub fn open(&mut self, id: &str, memory: &mut LiveMemory) -> Result<(), CartdataError> {
        if let Some(active) = self.id() {
            return Err(CartdataError::AlreadyOpen {
                active: active.to_string(),
            });
        }
        if id.is_empty() || id == "." || id == ".." || id.contains(&['/', '\\'][..]) {
            return Err(CartdataError::InvalidId(id.to_string()));
        }
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(id);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        let window = memory.cartdata_mut();
        let n = read_up_to(&mut file, window)?;
        window[n..].fill(0);
        log::info!("opened cartdata {} ({} bytes on disk)", path.display(), n);
        self.record = Some(OpenRecord {
            id: id.to_string(),
            file,
        });
        self.dirty = false;
        Ok(())
    }

    /// the window changed; no I/O happens until the next flush
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Rewrite the whole record if it is dirty. Returns whether a write
    /// happened. Dirty is cleared before writing; a failed write is not
    /// retried until the window changes again.
    pub fn flush(&mut self, memory: &LiveMemory) -> Result<bool, CartdataError> {
        let record = match self.record.as_mut() {
            Some(record) if self.dirty => record,
            _ => return Ok(false),
        };
        self.dirty = false;
        record.file.seek(SeekFrom::Start(0))?;
        record.file.write_all(memory.cartdata())?;
        record.file.flush()?;
        self.writes += 1;
        Ok(true)
    }

    /// flush, then release the record; fine to call when nothing is open
    pub fn close(&mut self, memory: &LiveMemory) -> Result<(), CartdataError> {
        if self.record.is_none() {
            return Ok(());
        }
        let flushed = self.flush(memory);
        self.record = None;
        self.dirty = false;
        flushed.map(|_| ())
    }
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize, io::Error> {
    let mut n = 0;
    while n < buf.len() {
        match reader.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(read) => n += read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::memory::{MemoryMap, CARTDATA, CARTDATA_SIZE};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// a fresh, empty directory under the system temp dir
    pub(crate) fn scratch_dir(name: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "pocket8-{}-{}-{}",
            name,
            std::process::id(),
            n
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_open_creates_dir_and_zero_fills() -> Result<(), CartdataError> {
        let dir = scratch_dir("create");
        let mut store = CartdataStore::new(&dir);
        let mut m = LiveMemory::new();
        m.cartdata_mut().fill(0xee);
        store.open("game", &mut m)?;
        assert!(dir.is_dir());
        assert!(dir.join("game").is_file());
        assert!(m.cartdata().iter().all(|&b| b == 0));
        assert_eq!(store.id(), Some("game"));
        Ok(())
    }

    #[test]
    fn test_open_reads_short_file() -> Result<(), CartdataError> {
        let dir = scratch_dir("short");
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("game"), [1u8, 2, 3])?;
        let mut store = CartdataStore::new(&dir);
        let mut m = LiveMemory::new();
        m.cartdata_mut().fill(0xee);
        store.open("game", &mut m)?;
        assert_eq!(&m.cartdata()[..4], &[1, 2, 3, 0]);
        assert_eq!(m.cartdata()[CARTDATA_SIZE - 1], 0);
        Ok(())
    }

    #[test]
    fn test_second_open_fails() -> Result<(), CartdataError> {
        let dir = scratch_dir("twice");
        let mut store = CartdataStore::new(&dir);
        let mut m = LiveMemory::new();
        store.open("one", &mut m)?;
        match store.open("two", &mut m) {
            Err(CartdataError::AlreadyOpen { active }) => assert_eq!(active, "one"),
            other => panic!("expected AlreadyOpen, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let mut store = CartdataStore::new(scratch_dir("ids"));
        let mut m = LiveMemory::new();
        for id in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(
                store.open(id, &mut m),
                Err(CartdataError::InvalidId(_))
            ));
        }
    }

    #[test]
    fn test_many_marks_one_write() -> Result<(), CartdataError> {
        let dir = scratch_dir("coalesce");
        let mut store = CartdataStore::new(&dir);
        let mut m = LiveMemory::new();
        store.open("game", &mut m)?;
        for i in 0..10u8 {
            m.poke(CARTDATA + i as u16, i + 1);
            store.mark_dirty();
        }
        assert_eq!(store.writes(), 0);
        assert!(store.flush(&m)?);
        assert!(!store.flush(&m)?);
        assert_eq!(store.writes(), 1);
        let on_disk = fs::read(dir.join("game"))?;
        assert_eq!(on_disk.len(), CARTDATA_SIZE);
        assert_eq!(&on_disk[..3], &[1, 2, 3]);
        Ok(())
    }

    #[test]
    fn test_clean_flush_is_noop() -> Result<(), CartdataError> {
        let mut store = CartdataStore::new(scratch_dir("clean"));
        let m = LiveMemory::new();
        store.mark_dirty();
        assert!(!store.flush(&m)?);
        Ok(())
    }

    #[test]
    fn test_close_flushes_and_allows_reopen() -> Result<(), CartdataError> {
        let dir = scratch_dir("close");
        let mut store = CartdataStore::new(&dir);
        let mut m = LiveMemory::new();
        store.open("a", &mut m)?;
        m.poke(CARTDATA, 42);
        store.mark_dirty();
        store.close(&m)?;
        assert_eq!(store.id(), None);
        store.close(&m)?;

        let mut fresh = LiveMemory::new();
        store.open("a", &mut fresh)?;
        assert_eq!(fresh.peek(CARTDATA), 42);
        Ok(())
    }
}
