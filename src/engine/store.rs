use std::fs;
use std::path::Path;

use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};

use crate::xml::{self, XmlReader};
use crate::{KvsError, Result};

/// The authoritative in-memory store that sits behind the cache.
///
/// It is an unbounded concurrent map: it never evicts, and every method is safe to call from
/// many threads at once without outside locking. Its contents can be dumped to a file and
/// restored later with [`KvStore::dump_to_file`] and [`KvStore::restore_from_file`].
#[derive(Debug, Default)]
pub struct KvStore {
    map: DashMap<String, String>,
}

impl KvStore {
    /// creates an empty store
    pub fn new() -> Self {
        KvStore::default()
    }

    /// inserts `key` and `value`, overwriting any previous value
    pub fn put(&self, key: String, value: String) {
        self.map.insert(key, value);
    }

    /// returns the value stored for `key`
    ///
    /// # Errors
    /// [`KvsError::NoSuchKey`] if the key is not in the store
    pub fn get(&self, key: &str) -> Result<String> {
        self.map
            .get(key)
            .map(|v| v.value().clone())
            .ok_or(KvsError::NoSuchKey)
    }

    /// removes `key` and its value
    ///
    /// # Errors
    /// [`KvsError::NoSuchKey`] if the key is not in the store
    pub fn del(&self, key: &str) -> Result<()> {
        self.map.remove(key).map(|_| ()).ok_or(KvsError::NoSuchKey)
    }

    /// number of stored pairs
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// true if the store holds nothing
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// serializes every pair into the snapshot document
    /// `<KVStore><KVPair><Key>K</Key><Value>V</Value></KVPair>...</KVStore>`.
    /// Pairs are written in no particular order
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><KVStore>");
        for pair in self.map.iter() {
            out.push_str("<KVPair>");
            xml::push_text_element(&mut out, "Key", pair.key());
            xml::push_text_element(&mut out, "Value", pair.value());
            out.push_str("</KVPair>");
        }
        out.push_str("</KVStore>");
        out
    }

    /// writes the snapshot document to `path`, replacing the file if it exists
    #[instrument(skip(self))]
    pub fn dump_to_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_xml())?;
        debug!(pairs = self.len(), "store dumped");
        Ok(())
    }

    /// replaces the whole contents of the store with the snapshot in `path`.
    ///
    /// The previous contents are dropped first, so the store is left empty if anything goes
    /// wrong.
    ///
    /// # Errors
    /// [`KvsError::Io`] if the file cannot be read, and [`KvsError::InvalidFormat`] if it is not
    /// a snapshot document
    #[instrument(skip(self))]
    pub fn restore_from_file(&self, path: &Path) -> Result<()> {
        self.map.clear();
        let doc = fs::read_to_string(path)?;
        let pairs = parse_snapshot(&doc).map_err(|e| {
            warn!("snapshot is not a valid store document");
            e
        })?;
        for (key, value) in pairs {
            self.map.insert(key, value);
        }
        info!(pairs = self.len(), "store restored");
        Ok(())
    }
}

/// parses a whole snapshot document before anything is inserted, so a malformed file restores
/// nothing
fn parse_snapshot(doc: &str) -> Result<Vec<(String, String)>> {
    let mut reader = XmlReader::new(doc);
    reader.skip_prolog()?;
    let root = reader.start_tag()?;
    if root.name != "KVStore" {
        return Err(KvsError::InvalidFormat);
    }

    let mut pairs = vec![];
    if !root.empty {
        while !reader.at_end_tag() {
            let pair = reader.start_tag()?;
            if pair.name != "KVPair" || pair.empty {
                return Err(KvsError::InvalidFormat);
            }
            let key_tag = reader.start_tag()?;
            if key_tag.name != "Key" {
                return Err(KvsError::InvalidFormat);
            }
            let key = reader.text_content(&key_tag)?;
            let value_tag = reader.start_tag()?;
            if value_tag.name != "Value" {
                return Err(KvsError::InvalidFormat);
            }
            let value = reader.text_content(&value_tag)?;
            reader.end_tag("KVPair")?;
            pairs.push((key, value));
        }
        reader.end_tag("KVStore")?;
    }
    reader.finish()?;
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn get_and_del_report_missing_keys() {
        let store = KvStore::new();
        assert!(matches!(store.get("a"), Err(KvsError::NoSuchKey)));
        assert!(matches!(store.del("a"), Err(KvsError::NoSuchKey)));

        store.put("a".into(), "1".into());
        store.put("a".into(), "2".into());
        assert_eq!(store.get("a").unwrap(), "2");
        store.del("a").unwrap();
        assert!(matches!(store.del("a"), Err(KvsError::NoSuchKey)));
    }

    #[test]
    fn dump_and_restore_replace_the_contents() {
        let dir = TempDir::new().expect("unable to create temporary working directory");
        let path = dir.path().join("store.xml");

        let store = KvStore::new();
        store.put("fuzzy".into(), "wuzzy".into());
        store.put("<tag>".into(), "a & b".into());
        store.dump_to_file(&path).unwrap();

        let restored = KvStore::new();
        restored.put("stale".into(), "gone".into());
        restored.restore_from_file(&path).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get("fuzzy").unwrap(), "wuzzy");
        assert_eq!(restored.get("<tag>").unwrap(), "a & b");
        assert!(restored.get("stale").is_err());
    }

    #[test]
    fn malformed_snapshot_leaves_the_store_empty() {
        let dir = TempDir::new().expect("unable to create temporary working directory");
        let path = dir.path().join("broken.xml");
        fs::write(
            &path,
            "<KVStore><KVPair><Key>a</Key><Value>1</Value></KVPair><KVPair><Key>b</Key>",
        )
        .unwrap();

        let store = KvStore::new();
        store.put("old".into(), "value".into());
        assert!(matches!(
            store.restore_from_file(&path),
            Err(KvsError::InvalidFormat)
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn missing_snapshot_leaves_the_store_empty() {
        let dir = TempDir::new().expect("unable to create temporary working directory");
        let store = KvStore::new();
        store.put("old".into(), "value".into());
        assert!(matches!(
            store.restore_from_file(&dir.path().join("nope.xml")),
            Err(KvsError::Io(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn empty_store_round_trips() {
        let dir = TempDir::new().expect("unable to create temporary working directory");
        let path = dir.path().join("empty.xml");
        KvStore::new().dump_to_file(&path).unwrap();
        let store = KvStore::new();
        store.restore_from_file(&path).unwrap();
        assert!(store.is_empty());
    }
}
