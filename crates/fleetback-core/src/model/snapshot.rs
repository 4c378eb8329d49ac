//! Database snapshots as listed by `nodetool listsnapshots`

use serde::ser::{Serialize, SerializeMap, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotItem {
    pub keyspace: String,
    pub column_family: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub tag: String,
    pub items: Vec<SnapshotItem>,
}

/// Snapshots keyed by tag, kept in the order tags first appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshots {
    snapshots: Vec<Snapshot>,
}

impl Snapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item to the snapshot `tag`, creating it on first use.
    pub fn add(&mut self, tag: &str, item: SnapshotItem) {
        match self.snapshots.iter_mut().find(|s| s.tag == tag) {
            Some(snapshot) => snapshot.items.push(item),
            None => self.snapshots.push(Snapshot {
                tag: tag.to_string(),
                items: vec![item],
            }),
        }
    }

    pub fn get(&self, tag: &str) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.tag == tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.get(tag).is_some()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.snapshots.iter().map(|s| s.tag.as_str())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Snapshot> {
        self.snapshots.iter()
    }
}

impl Serialize for Snapshots {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.snapshots.len()))?;
        for snapshot in &self.snapshots {
            map.serialize_entry(&snapshot.tag, &snapshot.items)?;
        }
        map.end()
    }
}
