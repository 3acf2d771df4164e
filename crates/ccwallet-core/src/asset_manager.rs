use crate::asset::{AssetDefinition, AssetDefinitionDesc};
use crate::error::{Error, Result};
use crate::storage::Storage;

const ASSET_DEFINITIONS: &str = "asset_definitions";

pub const BITCOIN_MONIKER: &str = "bitcoin";
pub const SATOSHIS_PER_BITCOIN: u64 = 100_000_000;

/// Persisted registry of asset definitions, addressable by id and moniker.
#[derive(Debug, Clone)]
pub struct AssetDefinitionManager {
    storage: Storage,
}

impl AssetDefinitionManager {
    /// Open the registry, seeding the `bitcoin` asset when it is empty.
    pub fn open(storage: Storage) -> Result<Self> {
        let manager = Self { storage };
        if manager.descs()?.is_empty() {
            log::debug!("seeding default bitcoin asset definition");
            manager.resolve(Self::bitcoin_desc())?;
        }
        Ok(manager)
    }

    pub fn bitcoin_desc() -> AssetDefinitionDesc {
        AssetDefinitionDesc::new(
            vec![BITCOIN_MONIKER.to_string()],
            vec![String::new()],
            SATOSHIS_PER_BITCOIN,
        )
    }

    /// Register a new definition.
    ///
    /// Fails with `AssetExists` when the id or any moniker is already taken.
    pub fn resolve(&self, desc: AssetDefinitionDesc) -> Result<AssetDefinition> {
        let asset = AssetDefinition::new(desc)?;
        self.storage
            .update(ASSET_DEFINITIONS, |descs: &mut Vec<AssetDefinitionDesc>| {
                for existing in descs.iter() {
                    let existing = AssetDefinition::new(existing.clone())?;
                    if existing.id() == asset.id() {
                        return Err(Error::AssetExists(asset.id().to_string()));
                    }
                    if let Some(m) = asset
                        .monikers()
                        .iter()
                        .find(|m| existing.monikers().contains(m))
                    {
                        return Err(Error::AssetExists(m.clone()));
                    }
                }
                descs.push(asset.data());
                Ok(())
            })?;
        log::info!("registered asset {} ({})", asset.id(), asset.monikers().join(", "));
        Ok(asset)
    }

    pub fn get_by_moniker(&self, moniker: &str) -> Result<Option<AssetDefinition>> {
        Ok(self
            .all()?
            .into_iter()
            .find(|a| a.monikers().iter().any(|m| m == moniker)))
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<AssetDefinition>> {
        Ok(self.all()?.into_iter().find(|a| a.id() == id))
    }

    /// Every definition in registration order.
    pub fn all(&self) -> Result<Vec<AssetDefinition>> {
        self.descs()?.into_iter().map(AssetDefinition::new).collect()
    }

    pub fn clear(&self) -> Result<()> {
        self.storage.remove(ASSET_DEFINITIONS)
    }

    fn descs(&self) -> Result<Vec<AssetDefinitionDesc>> {
        Ok(self.storage.load(ASSET_DEFINITIONS)?.unwrap_or_default())
    }
}
