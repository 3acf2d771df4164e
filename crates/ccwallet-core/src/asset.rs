//! Asset definitions: a stable identity over one color descriptor plus the
//! fixed-point unit used to display base-unit amounts.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::color::{ColorDefinition, ColorDefinitionStore, ColorDescriptor, ColorSet};
use crate::error::{Error, Result};

/// Largest supported unit; 10^19 no longer fits a signed base-unit amount.
const MAX_DECIMALS: u32 = 18;
const ID_HASH_PREFIX: usize = 10;

fn default_unit() -> u64 {
    1
}

/// Serializable description an [`AssetDefinition`] is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDefinitionDesc {
    pub monikers: Vec<String>,
    #[serde(alias = "colorSchemes")]
    pub color_descs: Vec<String>,
    #[serde(default = "default_unit")]
    pub unit: u64,
}

impl AssetDefinitionDesc {
    pub fn new(monikers: Vec<String>, color_descs: Vec<String>, unit: u64) -> Self {
        Self {
            monikers,
            color_descs,
            unit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDefinition {
    id: String,
    monikers: Vec<String>,
    color_set: ColorSet,
    unit: u64,
    decimals: u32,
}

impl AssetDefinition {
    pub fn new(desc: AssetDefinitionDesc) -> Result<Self> {
        if desc.color_descs.len() != 1 {
            return Err(Error::MultiColorNotSupported);
        }
        let decimals = unit_decimals(desc.unit)?;

        let mut zeroed: Vec<ColorDescriptor> = desc
            .color_descs
            .iter()
            .map(|d| ColorDescriptor::new(d.as_str()).zero_tail())
            .collect();
        zeroed.sort();
        let id = compute_id(&zeroed)?;

        Ok(Self {
            id,
            monikers: desc.monikers,
            color_set: ColorSet::new(zeroed),
            unit: desc.unit,
            decimals,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn monikers(&self) -> &[String] {
        &self.monikers
    }

    pub fn color_set(&self) -> &ColorSet {
        &self.color_set
    }

    pub fn unit(&self) -> u64 {
        self.unit
    }

    pub fn data(&self) -> AssetDefinitionDesc {
        AssetDefinitionDesc {
            monikers: self.monikers.clone(),
            color_descs: self
                .color_set
                .descriptors()
                .iter()
                .map(|d| d.as_str().to_string())
                .collect(),
            unit: self.unit,
        }
    }

    /// Resolve (and register if needed) the color definitions of this asset.
    pub fn color_definitions(&self, store: &ColorDefinitionStore) -> Result<Vec<ColorDefinition>> {
        self.color_set
            .descriptors()
            .iter()
            .map(|d| store.resolve(d))
            .collect()
    }

    /// Parse a decimal string into base units.
    ///
    /// Fraction digits past the unit's precision are truncated. The sign of
    /// the whole string applies to the fraction as well, so `-0.5` is negative.
    pub fn parse_value(&self, portion: &str) -> Result<i64> {
        let invalid = || Error::InvalidValue(portion.to_string());
        let trimmed = portion.trim();
        let (negative, unsigned) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (unsigned, None),
        };
        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let unit = self.unit as i64;
        let whole: i64 = int_part.parse().map_err(|_| invalid())?;
        let mut magnitude = whole.checked_mul(unit).ok_or_else(invalid)?;

        if let Some(frac) = frac_part {
            if !frac.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let width = self.decimals as usize;
            if width > 0 {
                let digits: String = frac
                    .chars()
                    .chain(std::iter::repeat('0'))
                    .take(width)
                    .collect();
                let cents: i64 = digits.parse().map_err(|_| invalid())?;
                magnitude = magnitude.checked_add(cents).ok_or_else(invalid)?;
            }
        }

        Ok(if negative { -magnitude } else { magnitude })
    }

    /// Render base units as a decimal string; the inverse of
    /// [`parse_value`](Self::parse_value) for inputs within precision.
    pub fn format_value(&self, value: i64) -> String {
        let unit = self.unit as i64;
        let whole = value / unit;
        let mut out = if whole == 0 && value < 0 {
            "-0".to_string()
        } else {
            whole.to_string()
        };
        if self.decimals > 0 {
            let cents = (value % unit).unsigned_abs();
            out.push_str(&format!(".{:0width$}", cents, width = self.decimals as usize));
        }
        out
    }
}

/// A base-unit amount of one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetValue {
    asset: AssetDefinition,
    value: i64,
}

impl AssetValue {
    pub fn new(asset: AssetDefinition, value: i64) -> Self {
        Self { asset, value }
    }

    pub fn asset(&self) -> &AssetDefinition {
        &self.asset
    }

    pub fn value(&self) -> i64 {
        self.value
    }
}

impl std::fmt::Display for AssetValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.asset.format_value(self.value))
    }
}

/// A recipient address and the amount it should receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTarget {
    pub address: String,
    pub value: AssetValue,
}

impl AssetTarget {
    /// Fails with `InvalidTarget` unless the amount is positive.
    pub fn new(address: impl Into<String>, value: AssetValue) -> Result<Self> {
        let address = address.into();
        if value.value() <= 0 {
            return Err(Error::InvalidTarget(format!(
                "{} to {} is not a positive amount",
                value, address
            )));
        }
        Ok(Self { address, value })
    }

    pub fn asset(&self) -> &AssetDefinition {
        self.value.asset()
    }

    pub fn amount(&self) -> u64 {
        self.value.value().unsigned_abs()
    }
}

fn unit_decimals(unit: u64) -> Result<u32> {
    let mut rest = unit;
    let mut decimals = 0;
    while rest >= 10 && rest % 10 == 0 {
        rest /= 10;
        decimals += 1;
    }
    if rest != 1 || decimals > MAX_DECIMALS {
        return Err(Error::InvalidUnit(unit));
    }
    Ok(decimals)
}

fn compute_id(sorted: &[ColorDescriptor]) -> Result<String> {
    let canonical = serde_json::to_string(sorted)?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(bitcoin::base58::encode(&digest[..ID_HASH_PREFIX]))
}
