use serde::Serialize;
use tracing::warn;

use crate::xml;

/// A point-in-time copy of the cache contents, used for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSnapshot {
    /// one entry per set, in set order
    pub sets: Vec<SetSnapshot>,
}

/// The valid entries of one set, in clock order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetSnapshot {
    /// index of the set within the cache
    pub id: usize,
    /// the entries, next eviction candidate first
    pub entries: Vec<EntrySnapshot>,
}

/// One cached pair and its reference bit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySnapshot {
    /// the cached key
    pub key: String,
    /// the cached value
    pub value: String,
    /// the second-chance bit
    pub referenced: bool,
}

impl CacheSnapshot {
    /// renders the snapshot as
    /// `<KVCache><Set Id="0"><CacheEntry isReferenced="false"><Key>k</Key><Value>v</Value></CacheEntry></Set>...</KVCache>`
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><KVCache>");
        for set in &self.sets {
            out.push_str(&format!("<Set Id=\"{}\">", set.id));
            for entry in &set.entries {
                out.push_str(&format!("<CacheEntry isReferenced=\"{}\">", entry.referenced));
                xml::push_text_element(&mut out, "Key", &entry.key);
                xml::push_text_element(&mut out, "Value", &entry.value);
                out.push_str("</CacheEntry>");
            }
            out.push_str("</Set>");
        }
        out.push_str("</KVCache>");
        out
    }

    /// renders the snapshot as JSON. This is best-effort: a render failure is logged and
    /// yields `None`
    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!("could not render cache snapshot: {}", e);
                None
            }
        }
    }

    /// total number of entries in the snapshot
    pub fn len(&self) -> usize {
        self.sets.iter().map(|s| s.entries.len()).sum()
    }

    /// true if the snapshot holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
