//! Durable namespace store backed by Redb.
//!
//! Two tables: `inodes` (id → prost bytes) and `dirents` (composite
//! `parent\x00name` key → child id). Every mutation touches both tables in
//! one write transaction, so the store is always a consistent snapshot of
//! the namespace after a crash.

use std::fmt;
use std::path::Path;

use prost::Message;
use redb::{Database, ReadableTable};
use tracing::warn;

use stripefs_common::{Error, Result};
use stripefs_proto::metadata::Inode;

use crate::tables::{dirent_key, split_dirent_key, DIRENTS, INODES};

/// One dirent edge loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirentRow {
    pub parent: String,
    pub name: String,
    pub inode_id: String,
}

pub struct NamespaceStore {
    db: Database,
}

fn store_err(op: &str, err: impl fmt::Display) -> Error {
    Error::internal(format!("{op}: {err}"))
}

impl NamespaceStore {
    /// Open (or create) the store at `path`. Redb holds an exclusive lock
    /// on the file, so a second MDS on the same store fails here.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path).map_err(|e| store_err("open namespace store", e))?;

        let wtx = db.begin_write().map_err(|e| store_err("init tables", e))?;
        wtx.open_table(INODES).map_err(|e| store_err("init inodes table", e))?;
        wtx.open_table(DIRENTS).map_err(|e| store_err("init dirents table", e))?;
        wtx.commit().map_err(|e| store_err("init commit", e))?;

        Ok(Self { db })
    }

    /// Load the full namespace: every inode and every dirent edge.
    /// Malformed dirent keys are skipped with a warning rather than
    /// poisoning startup.
    pub fn load(&self) -> Result<(Vec<Inode>, Vec<DirentRow>)> {
        let rtx = self.db.begin_read().map_err(|e| store_err("begin load", e))?;

        let mut inodes = Vec::new();
        let inodes_table = rtx.open_table(INODES).map_err(|e| store_err("open inodes", e))?;
        for entry in inodes_table.iter().map_err(|e| store_err("scan inodes", e))? {
            let (_, value) = entry.map_err(|e| store_err("scan inodes", e))?;
            let inode = Inode::decode(value.value())
                .map_err(|e| store_err("decode inode row", e))?;
            inodes.push(inode);
        }

        let mut dirents = Vec::new();
        let dirents_table = rtx.open_table(DIRENTS).map_err(|e| store_err("open dirents", e))?;
        for entry in dirents_table.iter().map_err(|e| store_err("scan dirents", e))? {
            let (key, value) = entry.map_err(|e| store_err("scan dirents", e))?;
            let Some((parent, name)) = split_dirent_key(key.value()) else {
                warn!(key = key.value(), "skipping malformed dirent key");
                continue;
            };
            dirents.push(DirentRow {
                parent: parent.to_string(),
                name: name.to_string(),
                inode_id: value.value().to_string(),
            });
        }

        Ok((inodes, dirents))
    }

    /// Persist a new inode and its dirent edge atomically.
    pub fn insert_entry(&self, inode: &Inode) -> Result<()> {
        let blob = inode.encode_to_vec();
        let key = dirent_key(&inode.parent_inode_id, &inode.name);

        let wtx = self.db.begin_write().map_err(|e| store_err("begin create", e))?;
        {
            let mut table = wtx.open_table(INODES).map_err(|e| store_err("open inodes", e))?;
            table
                .insert(inode.inode_id.as_str(), blob.as_slice())
                .map_err(|e| store_err("insert inode row", e))?;
        }
        {
            let mut table = wtx.open_table(DIRENTS).map_err(|e| store_err("open dirents", e))?;
            table
                .insert(key.as_str(), inode.inode_id.as_str())
                .map_err(|e| store_err("insert dirent row", e))?;
        }
        wtx.commit().map_err(|e| store_err("commit create", e))
    }

    /// Persist the synthesized root inode. Root has no parent, so no
    /// dirent row accompanies it.
    pub fn insert_root(&self, root: &Inode) -> Result<()> {
        let blob = root.encode_to_vec();

        let wtx = self.db.begin_write().map_err(|e| store_err("begin root init", e))?;
        {
            let mut table = wtx.open_table(INODES).map_err(|e| store_err("open inodes", e))?;
            table
                .insert(root.inode_id.as_str(), blob.as_slice())
                .map_err(|e| store_err("insert root row", e))?;
        }
        wtx.commit().map_err(|e| store_err("commit root init", e))
    }

    /// Remove an inode and its dirent edge atomically.
    pub fn remove_entry(&self, parent: &str, name: &str, inode_id: &str) -> Result<()> {
        let key = dirent_key(parent, name);

        let wtx = self.db.begin_write().map_err(|e| store_err("begin unlink", e))?;
        {
            let mut table = wtx.open_table(INODES).map_err(|e| store_err("open inodes", e))?;
            table
                .remove(inode_id)
                .map_err(|e| store_err("remove inode row", e))?;
        }
        {
            let mut table = wtx.open_table(DIRENTS).map_err(|e| store_err("open dirents", e))?;
            table
                .remove(key.as_str())
                .map_err(|e| store_err("remove dirent row", e))?;
        }
        wtx.commit().map_err(|e| store_err("commit unlink", e))
    }
}
