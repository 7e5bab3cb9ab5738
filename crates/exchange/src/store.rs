use crate::clock::Clock;
use anyhow::Context;
use protocol::{CommandRecord, CommandStatus, COMMAND_FILE_NAME, RESULT_FILE_NAME};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    Command,
    Result,
}

impl Slot {
    pub fn file_name(self) -> &'static str {
        match self {
            Slot::Command => COMMAND_FILE_NAME,
            Slot::Result => RESULT_FILE_NAME,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SlotSnapshot {
    pub content: String,
    pub modified: SystemTime,
}

/// Backing for the two single-slot mailboxes. Writes replace the whole slot;
/// there is no locking, so readers may observe a partially written slot.
pub trait ExchangeStore: Send + Sync {
    fn read(&self, slot: Slot) -> io::Result<Option<SlotSnapshot>>;
    fn write(&self, slot: Slot, content: &str) -> io::Result<()>;
    fn location(&self, slot: Slot) -> String;
}

impl<T: ExchangeStore + ?Sized> ExchangeStore for Arc<T> {
    fn read(&self, slot: Slot) -> io::Result<Option<SlotSnapshot>> {
        (**self).read(slot)
    }

    fn write(&self, slot: Slot, content: &str) -> io::Result<()> {
        (**self).write(slot, content)
    }

    fn location(&self, slot: Slot) -> String {
        (**self).location(slot)
    }
}

/// The exchange directory on disk.
#[derive(Clone, Debug)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, slot: Slot) -> PathBuf {
        self.dir.join(slot.file_name())
    }
}

impl ExchangeStore for FsStore {
    fn read(&self, slot: Slot) -> io::Result<Option<SlotSnapshot>> {
        let path = self.path(slot);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        let modified = fs::metadata(&path)?.modified()?;
        Ok(Some(SlotSnapshot { content, modified }))
    }

    fn write(&self, slot: Slot, content: &str) -> io::Result<()> {
        // The host side may have removed the directory since startup.
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(slot), content)
    }

    fn location(&self, slot: Slot) -> String {
        self.path(slot).display().to_string()
    }
}

/// In-process store for tests and embedding. Modification times come from
/// the supplied clock.
pub struct MemoryStore {
    slots: Mutex<HashMap<Slot, SlotSnapshot>>,
    clock: Arc<dyn Clock>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            clock,
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_modified(&self, slot: Slot, modified: SystemTime) {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(snapshot) = slots.get_mut(&slot) {
            snapshot.modified = modified;
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl ExchangeStore for MemoryStore {
    fn read(&self, slot: Slot) -> io::Result<Option<SlotSnapshot>> {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        Ok(slots.get(&slot).cloned())
    }

    fn write(&self, slot: Slot, content: &str) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "writes disabled",
            ));
        }
        let snapshot = SlotSnapshot {
            content: content.to_string(),
            modified: self.clock.now(),
        };
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.insert(slot, snapshot);
        Ok(())
    }

    fn location(&self, slot: Slot) -> String {
        format!("memory:{}", slot.file_name())
    }
}

/// Typed view over the command slot.
pub struct CommandSlot<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: ExchangeStore + ?Sized> CommandSlot<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn load(&self) -> anyhow::Result<Option<CommandRecord>> {
        let Some(snapshot) = self.store.read(Slot::Command)? else {
            return Ok(None);
        };
        if snapshot.content.trim().is_empty() {
            return Ok(None);
        }
        let record = serde_json::from_str(&snapshot.content)
            .with_context(|| format!("invalid command record in {}", self.location()))?;
        Ok(Some(record))
    }

    pub fn save(&self, record: &CommandRecord) -> anyhow::Result<()> {
        let payload = serde_json::to_string_pretty(record)?;
        self.store.write(Slot::Command, &payload)?;
        Ok(())
    }

    /// Moves `record` to `status`, but only if the slot still holds that same
    /// record. Returns false when a newer command replaced it in the meantime.
    pub fn transition(&self, record: &CommandRecord, status: CommandStatus) -> anyhow::Result<bool> {
        let Some(current) = self.load()? else {
            return Ok(false);
        };
        if current.command != record.command || current.timestamp != record.timestamp {
            return Ok(false);
        }
        self.save(&CommandRecord { status, ..current })?;
        Ok(true)
    }

    pub fn location(&self) -> String {
        self.store.location(Slot::Command)
    }
}

/// Typed view over the result slot.
pub struct ResultSlot<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: ExchangeStore + ?Sized> ResultSlot<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn snapshot(&self) -> io::Result<Option<SlotSnapshot>> {
        self.store.read(Slot::Result)
    }

    pub fn save(&self, content: &str) -> io::Result<()> {
        self.store.write(Slot::Result, content)
    }

    pub fn location(&self) -> String {
        self.store.location(Slot::Result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    #[test]
    fn fs_store_reports_missing_slots_as_none() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::open(dir.path().join("bridge")).unwrap();
        assert!(store.read(Slot::Result).unwrap().is_none());
        assert!(CommandSlot::new(&store).load().unwrap().is_none());
    }

    #[test]
    fn fs_store_round_trips_content_with_mtime() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        store.write(Slot::Result, "{\"ok\":true}").unwrap();
        let snapshot = store.read(Slot::Result).unwrap().expect("snapshot");
        assert_eq!(snapshot.content, "{\"ok\":true}");
        assert!(snapshot.modified <= SystemTime::now());
        assert!(dir.path().join(RESULT_FILE_NAME).exists());
    }

    #[test]
    fn fs_store_recreates_a_removed_directory() {
        let dir = TempDir::new().unwrap();
        let bridge = dir.path().join("bridge");
        let store = FsStore::open(&bridge).unwrap();
        fs::remove_dir_all(&bridge).unwrap();
        store.write(Slot::Command, "{}").unwrap();
        assert!(bridge.join(COMMAND_FILE_NAME).exists());
    }

    #[test]
    fn memory_store_stamps_writes_with_clock() {
        let start = UNIX_EPOCH + Duration::from_secs(1_000);
        let clock = Arc::new(ManualClock::new(start));
        let store = MemoryStore::new(clock.clone());
        store.write(Slot::Result, "x").unwrap();
        clock.advance(Duration::from_secs(5));
        let snapshot = store.read(Slot::Result).unwrap().expect("snapshot");
        assert_eq!(snapshot.modified, start);
    }

    #[test]
    fn transition_ignores_a_replaced_record() {
        let clock = Arc::new(ManualClock::new(UNIX_EPOCH));
        let store = MemoryStore::new(clock.clone());
        let slot = CommandSlot::new(&store);
        let first = CommandRecord::pending("getLayerInfo", json!({}), clock.now());
        slot.save(&first).unwrap();
        clock.advance(Duration::from_millis(10));
        let second = CommandRecord::pending("listCompositions", json!({}), clock.now());
        slot.save(&second).unwrap();

        assert!(!slot.transition(&first, CommandStatus::Completed).unwrap());
        let current = slot.load().unwrap().expect("record");
        assert_eq!(current, second);

        assert!(slot.transition(&second, CommandStatus::Running).unwrap());
        assert_eq!(slot.load().unwrap().unwrap().status, CommandStatus::Running);
    }

    #[test]
    fn garbage_in_command_slot_is_an_error() {
        let clock = Arc::new(ManualClock::new(UNIX_EPOCH));
        let store = MemoryStore::new(clock);
        store.write(Slot::Command, "{\"command\":").unwrap();
        assert!(CommandSlot::new(&store).load().is_err());
    }
}
