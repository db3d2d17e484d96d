//! Redb table definitions for the MDS namespace.

use redb::TableDefinition;

/// Inodes: inode_id → prost-encoded Inode.
pub const INODES: TableDefinition<&str, &[u8]> = TableDefinition::new("inodes");

/// Dirents: "parent\x00name" → child inode_id.
pub const DIRENTS: TableDefinition<&str, &str> = TableDefinition::new("dirents");

/// Composite dirent key. NUL can never appear in a leaf name, so the split
/// is unambiguous.
pub fn dirent_key(parent: &str, name: &str) -> String {
    format!("{parent}\x00{name}")
}

pub fn split_dirent_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('\x00')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirent_key_round_trip() {
        let key = dirent_key("root", "a.bin");
        assert_eq!(split_dirent_key(&key), Some(("root", "a.bin")));
    }

    #[test]
    fn test_malformed_key_rejected() {
        assert_eq!(split_dirent_key("no-separator"), None);
    }
}
