//! Color descriptors, color sets, and the two color stores a wallet owns.
//!
//! A descriptor is `<kind>:<params...>`; the empty string denotes uncolored
//! bitcoin. Only EPOBC is mapped to a wallet chain; other kinds parse but
//! classify as unsupported.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::Storage;

pub const UNCOLORED_DESCRIPTOR: &str = "";
pub const UNCOLORED_COLOR_ID: u32 = 0;
pub const EPOBC_PREFIX: &str = "epobc";

const COLOR_DEFINITIONS: &str = "color_definitions";
const COLOR_DATA: &str = "color_data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorKind {
    Uncolored,
    Epobc,
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorDescriptor(String);

impl ColorDescriptor {
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self(descriptor.into())
    }

    pub fn uncolored() -> Self {
        Self(UNCOLORED_DESCRIPTOR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> ColorKind {
        if self.0.is_empty() {
            return ColorKind::Uncolored;
        }
        let prefix = self.0.split(':').next().unwrap_or_default();
        if prefix == EPOBC_PREFIX {
            ColorKind::Epobc
        } else {
            ColorKind::Unsupported(prefix.to_string())
        }
    }

    /// Replace a trailing `:<digits>` field with `:0`.
    ///
    /// The tail encodes where the genesis output sits, not what the color is,
    /// so zeroed descriptors compare equal across it.
    pub fn zero_tail(&self) -> Self {
        match self.0.rsplit_once(':') {
            Some((head, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => {
                Self(format!("{head}:0"))
            }
            _ => self.clone(),
        }
    }
}

impl std::fmt::Display for ColorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ColorDescriptor {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Shape of a color set as far as chain selection is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSetKind {
    UncoloredOnly,
    EpobcOnly,
    Other,
}

/// Ordered set of color descriptors an asset is denominated in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColorSet {
    descriptors: Vec<ColorDescriptor>,
}

impl ColorSet {
    pub fn new(descriptors: Vec<ColorDescriptor>) -> Self {
        let mut unique = Vec::with_capacity(descriptors.len());
        for d in descriptors {
            if !unique.contains(&d) {
                unique.push(d);
            }
        }
        Self {
            descriptors: unique,
        }
    }

    pub fn descriptors(&self) -> &[ColorDescriptor] {
        &self.descriptors
    }

    pub fn is_uncolored_only(&self) -> bool {
        !self.descriptors.is_empty()
            && self
                .descriptors
                .iter()
                .all(|d| d.kind() == ColorKind::Uncolored)
    }

    pub fn is_epobc_only(&self) -> bool {
        !self.descriptors.is_empty()
            && self
                .descriptors
                .iter()
                .all(|d| d.kind() == ColorKind::Epobc)
    }

    pub fn classify(&self) -> ColorSetKind {
        if self.is_uncolored_only() {
            ColorSetKind::UncoloredOnly
        } else if self.is_epobc_only() {
            ColorSetKind::EpobcOnly
        } else {
            ColorSetKind::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorDefinition {
    pub color_id: u32,
    pub descriptor: ColorDescriptor,
}

impl ColorDefinition {
    pub fn uncolored() -> Self {
        Self {
            color_id: UNCOLORED_COLOR_ID,
            descriptor: ColorDescriptor::uncolored(),
        }
    }

    pub fn kind(&self) -> ColorKind {
        self.descriptor.kind()
    }
}

/// Persisted descriptor -> color id registry.
///
/// Uncolored is always id 0 and never stored; other descriptors get ids from 1
/// in registration order.
#[derive(Debug, Clone)]
pub struct ColorDefinitionStore {
    storage: Storage,
}

impl ColorDefinitionStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Return the definition for `descriptor`, registering it if needed.
    pub fn resolve(&self, descriptor: &ColorDescriptor) -> Result<ColorDefinition> {
        if descriptor.kind() == ColorKind::Uncolored {
            return Ok(ColorDefinition::uncolored());
        }
        self.storage
            .update(COLOR_DEFINITIONS, |defs: &mut Vec<ColorDefinition>| {
                if let Some(existing) = defs.iter().find(|d| &d.descriptor == descriptor) {
                    return Ok(existing.clone());
                }
                let color_id = defs.iter().map(|d| d.color_id).max().unwrap_or(0) + 1;
                let def = ColorDefinition {
                    color_id,
                    descriptor: descriptor.clone(),
                };
                log::debug!("registered color {} as id {}", descriptor, color_id);
                defs.push(def.clone());
                Ok(def)
            })
    }

    pub fn get_by_descriptor(
        &self,
        descriptor: &ColorDescriptor,
    ) -> Result<Option<ColorDefinition>> {
        if descriptor.kind() == ColorKind::Uncolored {
            return Ok(Some(ColorDefinition::uncolored()));
        }
        Ok(self
            .all()?
            .into_iter()
            .find(|d| &d.descriptor == descriptor))
    }

    pub fn get_by_color_id(&self, color_id: u32) -> Result<ColorDefinition> {
        if color_id == UNCOLORED_COLOR_ID {
            return Ok(ColorDefinition::uncolored());
        }
        self.all()?
            .into_iter()
            .find(|d| d.color_id == color_id)
            .ok_or(Error::UnknownColor(color_id))
    }

    /// Registered (non-uncolored) definitions in registration order.
    pub fn all(&self) -> Result<Vec<ColorDefinition>> {
        Ok(self.storage.load(COLOR_DEFINITIONS)?.unwrap_or_default())
    }

    pub fn clear(&self) -> Result<()> {
        self.storage.remove(COLOR_DEFINITIONS)
    }
}

/// A cached color value for one output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorDataEntry {
    pub color_id: u32,
    pub txid: String,
    pub vout: u32,
    pub value: u64,
}

/// Cache of computed color values, filled by color-aware collaborators.
#[derive(Debug, Clone)]
pub struct ColorDataStore {
    storage: Storage,
}

impl ColorDataStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Insert or overwrite the value for (color, txid, vout).
    pub fn add(&self, color_id: u32, txid: &str, vout: u32, value: u64) -> Result<()> {
        self.storage
            .update(COLOR_DATA, |entries: &mut Vec<ColorDataEntry>| {
                match entries
                    .iter_mut()
                    .find(|e| e.color_id == color_id && e.txid == txid && e.vout == vout)
                {
                    Some(entry) => entry.value = value,
                    None => entries.push(ColorDataEntry {
                        color_id,
                        txid: txid.to_string(),
                        vout,
                        value,
                    }),
                }
                Ok(())
            })
    }

    pub fn get(&self, color_id: u32, txid: &str, vout: u32) -> Result<Option<u64>> {
        Ok(self
            .entries()?
            .into_iter()
            .find(|e| e.color_id == color_id && e.txid == txid && e.vout == vout)
            .map(|e| e.value))
    }

    /// Every cached color value for one output.
    pub fn for_output(&self, txid: &str, vout: u32) -> Result<Vec<ColorDataEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.txid == txid && e.vout == vout)
            .collect())
    }

    pub fn remove_color(&self, color_id: u32) -> Result<()> {
        self.storage
            .update(COLOR_DATA, |entries: &mut Vec<ColorDataEntry>| {
                entries.retain(|e| e.color_id != color_id);
                Ok(())
            })
    }

    pub fn clear(&self) -> Result<()> {
        self.storage.remove(COLOR_DATA)
    }

    fn entries(&self) -> Result<Vec<ColorDataEntry>> {
        Ok(self.storage.load(COLOR_DATA)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, shared};

    fn storage() -> Storage {
        Storage::new(shared(MemoryStore::default()), "t_")
    }

    #[test]
    fn descriptor_kinds() {
        assert_eq!(ColorDescriptor::uncolored().kind(), ColorKind::Uncolored);
        assert_eq!(ColorDescriptor::from("epobc:ab:0:0").kind(), ColorKind::Epobc);
        assert_eq!(
            ColorDescriptor::from("obc:ab:0:0").kind(),
            ColorKind::Unsupported("obc".into())
        );
    }

    #[test]
    fn zero_tail_only_touches_numeric_tail() {
        assert_eq!(
            ColorDescriptor::from("epobc:abc:1:543").zero_tail().as_str(),
            "epobc:abc:1:0"
        );
        assert_eq!(
            ColorDescriptor::from("proto:abc:x").zero_tail().as_str(),
            "proto:abc:x"
        );
        assert_eq!(ColorDescriptor::from("").zero_tail().as_str(), "");
        assert_eq!(ColorDescriptor::from("proto:").zero_tail().as_str(), "proto:");
    }

    #[test]
    fn color_set_classification() {
        let uncolored = ColorSet::new(vec![ColorDescriptor::uncolored()]);
        let epobc = ColorSet::new(vec!["epobc:aa:0:0".into()]);
        let mixed = ColorSet::new(vec![ColorDescriptor::uncolored(), "epobc:aa:0:0".into()]);
        let other = ColorSet::new(vec!["obc:aa:0:0".into()]);
        assert_eq!(uncolored.classify(), ColorSetKind::UncoloredOnly);
        assert_eq!(epobc.classify(), ColorSetKind::EpobcOnly);
        assert_eq!(mixed.classify(), ColorSetKind::Other);
        assert_eq!(other.classify(), ColorSetKind::Other);
        assert_eq!(ColorSet::default().classify(), ColorSetKind::Other);
    }

    #[test]
    fn color_set_dedups() {
        let set = ColorSet::new(vec!["epobc:aa:0:0".into(), "epobc:aa:0:0".into()]);
        assert_eq!(set.descriptors().len(), 1);
    }

    #[test]
    fn definitions_get_stable_ids() {
        let store = ColorDefinitionStore::new(storage());
        let a = store.resolve(&"epobc:aa:0:0".into()).unwrap();
        let b = store.resolve(&"epobc:bb:0:0".into()).unwrap();
        let a2 = store.resolve(&"epobc:aa:0:0".into()).unwrap();
        assert_eq!(a.color_id, 1);
        assert_eq!(b.color_id, 2);
        assert_eq!(a, a2);
        assert_eq!(store.get_by_color_id(2).unwrap(), b);
        assert_eq!(store.all().unwrap().len(), 2);
    }

    #[test]
    fn uncolored_is_never_stored() {
        let store = ColorDefinitionStore::new(storage());
        let def = store.resolve(&ColorDescriptor::uncolored()).unwrap();
        assert_eq!(def.color_id, UNCOLORED_COLOR_ID);
        assert!(store.all().unwrap().is_empty());
        assert_eq!(store.get_by_color_id(0).unwrap(), ColorDefinition::uncolored());
    }

    #[test]
    fn unknown_color_id_errors() {
        let store = ColorDefinitionStore::new(storage());
        assert!(matches!(store.get_by_color_id(9), Err(Error::UnknownColor(9))));
    }

    #[test]
    fn color_data_overwrites_and_clears() {
        let data = ColorDataStore::new(storage());
        data.add(1, "aa", 0, 10).unwrap();
        data.add(1, "aa", 0, 15).unwrap();
        data.add(2, "aa", 0, 3).unwrap();
        assert_eq!(data.get(1, "aa", 0).unwrap(), Some(15));
        assert_eq!(data.for_output("aa", 0).unwrap().len(), 2);
        data.remove_color(2).unwrap();
        assert_eq!(data.get(2, "aa", 0).unwrap(), None);
        data.clear().unwrap();
        assert_eq!(data.get(1, "aa", 0).unwrap(), None);
    }
}
