//! MDS namespace engine: inode table, directory entries, stripe layouts.
//!
//! All operations run under one process-wide read/write lease. Reads take
//! shared access and never touch disk; mutations take exclusive access and
//! commit the durable transaction before updating the in-memory maps, so a
//! failed commit leaves the caller-visible state untouched. The in-memory
//! maps are a projection of the store, rebuilt on every startup.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tracing::{debug, info};

use stripefs_common::{
    Error, Result, DEFAULT_MODE, DEFAULT_STRIPE_SIZE_BYTES, ROOT_INODE_ID,
};
use stripefs_proto::metadata::{Inode, StripeLayout};

use crate::store::NamespaceStore;

#[derive(Debug, Clone)]
pub struct NamespaceConfig {
    pub db_path: PathBuf,
    /// Canonical OST order used for directory layouts and as the rotation
    /// base for file layouts.
    pub ost_ids: Vec<String>,
    pub default_mode: u32,
    pub default_stripe_size: u32,
}

impl NamespaceConfig {
    pub fn new(db_path: impl Into<PathBuf>, ost_ids: Vec<String>) -> Self {
        Self {
            db_path: db_path.into(),
            ost_ids,
            default_mode: DEFAULT_MODE,
            default_stripe_size: DEFAULT_STRIPE_SIZE_BYTES,
        }
    }
}

/// Counts reported on the metrics endpoint.
#[derive(Debug, Clone, Default)]
pub struct NamespaceStats {
    pub inodes: u64,
    pub dirents: u64,
    pub lease_waits: u64,
    pub lease_wait_us: u64,
}

struct NamespaceState {
    inodes: HashMap<String, Inode>,
    /// Children per directory, keyed by name. BTreeMap iteration order is
    /// the byte-lexicographic order ListDir must return.
    children: HashMap<String, BTreeMap<String, String>>,
}

pub struct Namespace {
    store: NamespaceStore,
    state: RwLock<NamespaceState>,
    ost_ids: Vec<String>,
    stripe_size: u32,
    default_mode: u32,
    /// Round-robin cursor for file stripe layouts. Not persisted; a restart
    /// resets the rotation, which is a load-spreading hint only.
    rr: AtomicU64,
    id_seq: AtomicU64,
    lease_waits: AtomicU64,
    lease_wait_us: AtomicU64,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

impl Namespace {
    /// Open the durable store, rebuild the in-memory projection, and
    /// synthesize the root inode on first start.
    pub fn open(cfg: NamespaceConfig) -> Result<Self> {
        let store = NamespaceStore::open(&cfg.db_path)?;
        let (inodes, dirents) = store.load()?;

        let mut state = NamespaceState {
            inodes: HashMap::with_capacity(inodes.len()),
            children: HashMap::new(),
        };
        for inode in inodes {
            if inode.is_dir {
                state.children.entry(inode.inode_id.clone()).or_default();
            }
            state.inodes.insert(inode.inode_id.clone(), inode);
        }
        for row in dirents {
            state
                .children
                .entry(row.parent)
                .or_default()
                .insert(row.name, row.inode_id);
        }

        let loaded = state.inodes.len();
        let ns = Self {
            store,
            state: RwLock::new(state),
            ost_ids: cfg.ost_ids,
            stripe_size: if cfg.default_stripe_size == 0 {
                DEFAULT_STRIPE_SIZE_BYTES
            } else {
                cfg.default_stripe_size
            },
            default_mode: if cfg.default_mode == 0 {
                DEFAULT_MODE
            } else {
                cfg.default_mode
            },
            rr: AtomicU64::new(0),
            id_seq: AtomicU64::new(0),
            lease_waits: AtomicU64::new(0),
            lease_wait_us: AtomicU64::new(0),
        };
        ns.ensure_root()?;
        info!(inodes = loaded, osts = ns.ost_ids.len(), "namespace loaded");
        Ok(ns)
    }

    fn ensure_root(&self) -> Result<()> {
        let mut state = self.write_state();
        if state.inodes.contains_key(ROOT_INODE_ID) {
            state.children.entry(ROOT_INODE_ID.to_string()).or_default();
            return Ok(());
        }

        let now = unix_now();
        let root = Inode {
            inode_id: ROOT_INODE_ID.to_string(),
            parent_inode_id: String::new(),
            name: "/".to_string(),
            is_dir: true,
            mode: self.default_mode,
            size_bytes: 0,
            created_unix: now,
            modified_unix: now,
            stripe_layout: Some(self.canonical_layout()),
        };
        self.store.insert_root(&root)?;
        state.children.insert(ROOT_INODE_ID.to_string(), BTreeMap::new());
        state.inodes.insert(ROOT_INODE_ID.to_string(), root);
        info!("initialized root inode");
        Ok(())
    }

    /// Create a file or directory under `parent_inode_id`.
    pub fn create(&self, parent_inode_id: &str, name: &str, is_dir: bool, mode: u32) -> Result<Inode> {
        if parent_inode_id.is_empty() || name.is_empty() {
            return Err(Error::invalid_argument(
                "parent_inode_id and name are required",
            ));
        }
        if name.contains('/') {
            return Err(Error::invalid_argument("name cannot contain '/'"));
        }

        let mut state = self.write_state();
        let parent = state
            .inodes
            .get(parent_inode_id)
            .ok_or_else(|| Error::not_found("parent inode not found"))?;
        if !parent.is_dir {
            return Err(Error::failed_precondition("parent inode is not a directory"));
        }
        if state
            .children
            .get(parent_inode_id)
            .is_some_and(|c| c.contains_key(name))
        {
            return Err(Error::already_exists("entry already exists"));
        }

        let now = unix_now();
        let layout = if is_dir {
            self.canonical_layout()
        } else {
            self.next_file_layout()
        };
        let inode = Inode {
            inode_id: self.next_inode_id(),
            parent_inode_id: parent_inode_id.to_string(),
            name: name.to_string(),
            is_dir,
            mode: if mode == 0 { self.default_mode } else { mode },
            size_bytes: 0,
            created_unix: now,
            modified_unix: now,
            stripe_layout: Some(layout),
        };

        self.store.insert_entry(&inode)?;

        state
            .children
            .entry(parent_inode_id.to_string())
            .or_default()
            .insert(name.to_string(), inode.inode_id.clone());
        if is_dir {
            state.children.insert(inode.inode_id.clone(), BTreeMap::new());
        }
        state.inodes.insert(inode.inode_id.clone(), inode.clone());

        debug!(
            inode_id = %inode.inode_id,
            parent = parent_inode_id,
            name,
            is_dir,
            "created inode"
        );
        Ok(inode)
    }

    /// Resolve one name under a parent directory.
    pub fn lookup(&self, parent_inode_id: &str, name: &str) -> Result<Inode> {
        let state = self.read_state();
        let children = state
            .children
            .get(parent_inode_id)
            .ok_or_else(|| Error::not_found("parent inode not found"))?;
        let inode_id = children
            .get(name)
            .ok_or_else(|| Error::not_found("entry not found"))?;
        state
            .inodes
            .get(inode_id)
            .cloned()
            .ok_or_else(|| Error::internal("dirent points at a missing inode"))
    }

    pub fn stat(&self, inode_id: &str) -> Result<Inode> {
        let state = self.read_state();
        state
            .inodes
            .get(inode_id)
            .cloned()
            .ok_or_else(|| Error::not_found("inode not found"))
    }

    /// Children of a directory, sorted by name.
    pub fn list_dir(&self, inode_id: &str) -> Result<Vec<Inode>> {
        let state = self.read_state();
        let children = state
            .children
            .get(inode_id)
            .ok_or_else(|| Error::not_found("directory inode not found"))?;
        Ok(children
            .values()
            .filter_map(|id| state.inodes.get(id).cloned())
            .collect())
    }

    /// Remove an entry. Unlinking an absent name reports `false` rather
    /// than failing; unlinking a non-empty directory fails.
    pub fn unlink(&self, parent_inode_id: &str, name: &str) -> Result<bool> {
        let mut state = self.write_state();
        let Some(children) = state.children.get(parent_inode_id) else {
            return Err(Error::not_found("parent inode not found"));
        };
        let Some(inode_id) = children.get(name).cloned() else {
            return Ok(false);
        };
        let Some(inode) = state.inodes.get(&inode_id) else {
            return Ok(false);
        };
        let is_dir = inode.is_dir;
        if is_dir && state.children.get(&inode_id).is_some_and(|c| !c.is_empty()) {
            return Err(Error::failed_precondition("directory is not empty"));
        }

        self.store.remove_entry(parent_inode_id, name, &inode_id)?;

        if let Some(children) = state.children.get_mut(parent_inode_id) {
            children.remove(name);
        }
        state.inodes.remove(&inode_id);
        if is_dir {
            state.children.remove(&inode_id);
        }

        debug!(inode_id = %inode_id, parent = parent_inode_id, name, "unlinked inode");
        Ok(true)
    }

    pub fn stats(&self) -> NamespaceStats {
        let state = self.read_state();
        NamespaceStats {
            inodes: state.inodes.len() as u64,
            dirents: state.children.values().map(|c| c.len() as u64).sum(),
            lease_waits: self.lease_waits.load(Ordering::Relaxed),
            lease_wait_us: self.lease_wait_us.load(Ordering::Relaxed),
        }
    }

    fn read_state(&self) -> parking_lot::RwLockReadGuard<'_, NamespaceState> {
        let start = Instant::now();
        let guard = self.state.read();
        self.observe_lease_wait(start);
        guard
    }

    fn write_state(&self) -> parking_lot::RwLockWriteGuard<'_, NamespaceState> {
        let start = Instant::now();
        let guard = self.state.write();
        self.observe_lease_wait(start);
        guard
    }

    fn observe_lease_wait(&self, start: Instant) {
        self.lease_waits.fetch_add(1, Ordering::Relaxed);
        self.lease_wait_us
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
    }

    fn canonical_layout(&self) -> StripeLayout {
        StripeLayout {
            stripe_size_bytes: self.stripe_size,
            ost_ids: self.ost_ids.clone(),
        }
    }

    /// Stripe layout for the next file: the configured OST list rotated so
    /// consecutive creates start on different targets.
    fn next_file_layout(&self) -> StripeLayout {
        if self.ost_ids.is_empty() {
            return StripeLayout {
                stripe_size_bytes: self.stripe_size,
                ost_ids: Vec::new(),
            };
        }
        let n = self.ost_ids.len();
        let start = (self.rr.fetch_add(1, Ordering::Relaxed) as usize) % n;
        let ost_ids = (0..n)
            .map(|i| self.ost_ids[(start + i) % n].clone())
            .collect();
        StripeLayout {
            stripe_size_bytes: self.stripe_size,
            ost_ids,
        }
    }

    /// Inode ids must stay unique across restarts: wall-clock nanoseconds
    /// plus a process-local sequence.
    fn next_inode_id(&self) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let seq = self.id_seq.fetch_add(1, Ordering::Relaxed);
        format!("inode-{nanos:x}-{seq:x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn three_osts() -> Vec<String> {
        vec!["ost-0".to_string(), "ost-1".to_string(), "ost-2".to_string()]
    }

    fn open_namespace(dir: &std::path::Path) -> Namespace {
        Namespace::open(NamespaceConfig::new(dir.join("mds.redb"), three_osts())).unwrap()
    }

    #[test]
    fn test_root_synthesized_on_first_start() {
        let dir = tempdir().unwrap();
        let ns = open_namespace(dir.path());

        let root = ns.stat(ROOT_INODE_ID).unwrap();
        assert!(root.is_dir);
        assert_eq!(root.name, "/");
        assert_eq!(root.parent_inode_id, "");
        assert_eq!(root.mode, 0o644);
        assert_eq!(
            root.stripe_layout.unwrap().ost_ids,
            three_osts(),
            "root carries the canonical layout"
        );
        assert!(ns.list_dir(ROOT_INODE_ID).unwrap().is_empty());
    }

    #[test]
    fn test_create_validation() {
        let dir = tempdir().unwrap();
        let ns = open_namespace(dir.path());

        assert!(matches!(
            ns.create("", "a", false, 0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            ns.create(ROOT_INODE_ID, "", false, 0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            ns.create(ROOT_INODE_ID, "a/b", false, 0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            ns.create("inode-missing", "a", false, 0),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_create_under_file_fails() {
        let dir = tempdir().unwrap();
        let ns = open_namespace(dir.path());

        let file = ns.create(ROOT_INODE_ID, "f.bin", false, 0).unwrap();
        assert!(matches!(
            ns.create(&file.inode_id, "child", false, 0),
            Err(Error::FailedPrecondition(_))
        ));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let dir = tempdir().unwrap();
        let ns = open_namespace(dir.path());

        ns.create(ROOT_INODE_ID, "sample.bin", false, 0o644).unwrap();
        assert!(matches!(
            ns.create(ROOT_INODE_ID, "sample.bin", false, 0o644),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_mode_zero_defaults() {
        let dir = tempdir().unwrap();
        let ns = open_namespace(dir.path());

        let inode = ns.create(ROOT_INODE_ID, "f", false, 0).unwrap();
        assert_eq!(inode.mode, 0o644);
        let inode = ns.create(ROOT_INODE_ID, "g", false, 0o755).unwrap();
        assert_eq!(inode.mode, 0o755);
    }

    #[test]
    fn test_file_layouts_rotate() {
        let dir = tempdir().unwrap();
        let ns = open_namespace(dir.path());

        let a = ns.create(ROOT_INODE_ID, "a", false, 0).unwrap();
        let b = ns.create(ROOT_INODE_ID, "b", false, 0).unwrap();
        let c = ns.create(ROOT_INODE_ID, "c", false, 0).unwrap();
        let d = ns.create(ROOT_INODE_ID, "d", false, 0).unwrap();

        let layout = |inode: &Inode| inode.stripe_layout.clone().unwrap().ost_ids;
        assert_eq!(layout(&a), vec!["ost-0", "ost-1", "ost-2"]);
        assert_eq!(layout(&b), vec!["ost-1", "ost-2", "ost-0"]);
        assert_eq!(layout(&c), vec!["ost-2", "ost-0", "ost-1"]);
        assert_eq!(layout(&d), vec!["ost-0", "ost-1", "ost-2"]);

        // Every layout is a rotation: same set, length N, distinct ids.
        for inode in [&a, &b, &c, &d] {
            let mut ids = layout(inode);
            ids.sort();
            assert_eq!(ids, three_osts());
        }
    }

    #[test]
    fn test_directories_get_canonical_layout() {
        let dir = tempdir().unwrap();
        let ns = open_namespace(dir.path());

        // Burn a rotation step with a file first.
        ns.create(ROOT_INODE_ID, "f", false, 0).unwrap();
        let d = ns.create(ROOT_INODE_ID, "d", true, 0).unwrap();
        assert_eq!(d.stripe_layout.unwrap().ost_ids, three_osts());
    }

    #[test]
    fn test_lookup_and_stat() {
        let dir = tempdir().unwrap();
        let ns = open_namespace(dir.path());

        let created = ns.create(ROOT_INODE_ID, "f", false, 0).unwrap();
        let looked_up = ns.lookup(ROOT_INODE_ID, "f").unwrap();
        assert_eq!(looked_up.inode_id, created.inode_id);

        let stat = ns.stat(&created.inode_id).unwrap();
        assert_eq!(stat.name, "f");
        assert_eq!(stat.parent_inode_id, ROOT_INODE_ID);

        assert!(ns.lookup(ROOT_INODE_ID, "missing").unwrap_err().is_not_found());
        assert!(ns.lookup("inode-missing", "f").unwrap_err().is_not_found());
        assert!(ns.stat("inode-missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_dir_sorted_by_name() {
        let dir = tempdir().unwrap();
        let ns = open_namespace(dir.path());

        for name in ["zeta", "alpha", "Mid", "beta", "10", "2"] {
            ns.create(ROOT_INODE_ID, name, false, 0).unwrap();
        }

        let names: Vec<String> = ns
            .list_dir(ROOT_INODE_ID)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        // Byte-wise lexicographic order.
        assert_eq!(names, vec!["10", "2", "Mid", "alpha", "beta", "zeta"]);

        assert!(ns.list_dir("inode-missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_unlink_file() {
        let dir = tempdir().unwrap();
        let ns = open_namespace(dir.path());

        ns.create(ROOT_INODE_ID, "sample.bin", false, 0).unwrap();
        assert!(ns.unlink(ROOT_INODE_ID, "sample.bin").unwrap());
        assert!(ns.lookup(ROOT_INODE_ID, "sample.bin").unwrap_err().is_not_found());

        // Absent name: idempotent, state unchanged.
        assert!(!ns.unlink(ROOT_INODE_ID, "sample.bin").unwrap());
        let stats = ns.stats();
        assert_eq!(stats.inodes, 1); // just root
        assert_eq!(stats.dirents, 0);
    }

    #[test]
    fn test_unlink_non_empty_directory_fails() {
        let dir = tempdir().unwrap();
        let ns = open_namespace(dir.path());

        let d = ns.create(ROOT_INODE_ID, "d", true, 0).unwrap();
        ns.create(&d.inode_id, "f", false, 0).unwrap();

        assert!(matches!(
            ns.unlink(ROOT_INODE_ID, "d"),
            Err(Error::FailedPrecondition(_))
        ));
        // Still listed afterwards.
        assert_eq!(ns.list_dir(ROOT_INODE_ID).unwrap().len(), 1);

        // Emptying the directory unblocks the unlink.
        assert!(ns.unlink(&d.inode_id, "f").unwrap());
        assert!(ns.unlink(ROOT_INODE_ID, "d").unwrap());
        assert!(ns.stat(&d.inode_id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_dirent_inode_agreement() {
        let dir = tempdir().unwrap();
        let ns = open_namespace(dir.path());

        let d = ns.create(ROOT_INODE_ID, "d", true, 0).unwrap();
        ns.create(&d.inode_id, "nested", false, 0).unwrap();
        ns.create(ROOT_INODE_ID, "top", false, 0).unwrap();

        for parent in [ROOT_INODE_ID, d.inode_id.as_str()] {
            for child in ns.list_dir(parent).unwrap() {
                assert_eq!(child.parent_inode_id, parent);
                let direct = ns.lookup(parent, &child.name).unwrap();
                assert_eq!(direct.inode_id, child.inode_id);
            }
        }
    }

    #[test]
    fn test_restart_rebuilds_from_store() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("mds.redb");

        let mut created_ids = Vec::new();
        {
            let ns =
                Namespace::open(NamespaceConfig::new(&db_path, three_osts())).unwrap();
            for i in 0..100 {
                let inode = ns
                    .create(ROOT_INODE_ID, &format!("file-{i:03}"), false, 0)
                    .unwrap();
                created_ids.push((inode.name.clone(), inode.inode_id.clone()));
            }
        }

        let ns = Namespace::open(NamespaceConfig::new(&db_path, three_osts())).unwrap();
        let root = ns.stat(ROOT_INODE_ID).unwrap();
        assert!(root.is_dir);

        let children = ns.list_dir(ROOT_INODE_ID).unwrap();
        assert_eq!(children.len(), 100);

        let mut expected = created_ids.clone();
        expected.sort();
        let listed: Vec<(String, String)> = children
            .into_iter()
            .map(|i| (i.name, i.inode_id))
            .collect();
        assert_eq!(listed, expected, "names sorted and inode ids stable");
    }

    #[test]
    fn test_restart_preserves_deletions() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("mds.redb");

        {
            let ns =
                Namespace::open(NamespaceConfig::new(&db_path, three_osts())).unwrap();
            ns.create(ROOT_INODE_ID, "keep", false, 0).unwrap();
            ns.create(ROOT_INODE_ID, "drop", false, 0).unwrap();
            ns.unlink(ROOT_INODE_ID, "drop").unwrap();
        }

        let ns = Namespace::open(NamespaceConfig::new(&db_path, three_osts())).unwrap();
        assert!(ns.lookup(ROOT_INODE_ID, "keep").is_ok());
        assert!(ns.lookup(ROOT_INODE_ID, "drop").unwrap_err().is_not_found());
        let stats = ns.stats();
        assert_eq!(stats.inodes, 2); // root + keep
        assert_eq!(stats.dirents, 1);
    }

    #[test]
    fn test_single_ost_rotation_degenerates() {
        let dir = tempdir().unwrap();
        let ns = Namespace::open(NamespaceConfig::new(
            dir.path().join("mds.redb"),
            vec!["ost-only".to_string()],
        ))
        .unwrap();

        let a = ns.create(ROOT_INODE_ID, "a", false, 0).unwrap();
        let b = ns.create(ROOT_INODE_ID, "b", false, 0).unwrap();
        assert_eq!(a.stripe_layout.unwrap().ost_ids, vec!["ost-only"]);
        assert_eq!(b.stripe_layout.unwrap().ost_ids, vec!["ost-only"]);
    }

    #[test]
    fn test_inode_ids_unique() {
        let dir = tempdir().unwrap();
        let ns = open_namespace(dir.path());

        let mut seen = std::collections::HashSet::new();
        for i in 0..64 {
            let inode = ns.create(ROOT_INODE_ID, &format!("f{i}"), false, 0).unwrap();
            assert!(seen.insert(inode.inode_id), "duplicate inode id");
        }
    }
}
