use bitcoin::OutPoint;

/// Which coins a balance query counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BalanceScope {
    #[default]
    Total,
    /// Only coins included in a block.
    Confirmed,
    /// Only coins still in the mempool.
    Unconfirmed,
}

/// An unspent output carrying some value of one color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub outpoint: OutPoint,
    pub value: u64,
    pub color_id: u32,
    pub address: String,
    /// Confirmation height; `None` while unconfirmed.
    pub height: Option<u32>,
}

impl Coin {
    pub fn is_confirmed(&self) -> bool {
        self.height.is_some()
    }
}

/// Summed value of one color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorValue {
    pub color_id: u32,
    pub value: u64,
}

/// What the wallet asks a coin query for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinRequest {
    pub addresses: Vec<String>,
    pub color_ids: Vec<u32>,
    pub scope: BalanceScope,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoinList {
    coins: Vec<Coin>,
}

impl CoinList {
    pub fn new(coins: Vec<Coin>) -> Self {
        Self { coins }
    }

    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    pub fn confirmed(&self) -> CoinList {
        self.filtered(Coin::is_confirmed)
    }

    pub fn unconfirmed(&self) -> CoinList {
        self.filtered(|c| !c.is_confirmed())
    }

    pub fn scoped(&self, scope: BalanceScope) -> CoinList {
        match scope {
            BalanceScope::Total => self.clone(),
            BalanceScope::Confirmed => self.confirmed(),
            BalanceScope::Unconfirmed => self.unconfirmed(),
        }
    }

    pub fn with_colors(&self, color_ids: &[u32]) -> CoinList {
        self.filtered(|c| color_ids.contains(&c.color_id))
    }

    /// One entry per distinct color, in first-seen order.
    pub fn total_values(&self) -> Vec<ColorValue> {
        let mut totals: Vec<ColorValue> = Vec::new();
        for coin in &self.coins {
            match totals.iter_mut().find(|t| t.color_id == coin.color_id) {
                Some(total) => total.value = total.value.saturating_add(coin.value),
                None => totals.push(ColorValue {
                    color_id: coin.color_id,
                    value: coin.value,
                }),
            }
        }
        totals
    }

    fn filtered(&self, keep: impl Fn(&Coin) -> bool) -> CoinList {
        CoinList {
            coins: self.coins.iter().filter(|c| keep(c)).cloned().collect(),
        }
    }
}

impl FromIterator<Coin> for CoinList {
    fn from_iter<I: IntoIterator<Item = Coin>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::Txid;
    use bitcoin::hashes::Hash;

    use super::*;

    fn coin(vout: u32, color_id: u32, value: u64, height: Option<u32>) -> Coin {
        Coin {
            outpoint: OutPoint::new(Txid::all_zeros(), vout),
            value,
            color_id,
            address: "addr".into(),
            height,
        }
    }

    fn list() -> CoinList {
        CoinList::new(vec![
            coin(0, 1, 10, Some(100)),
            coin(1, 1, 5, None),
            coin(2, 0, 7, Some(101)),
        ])
    }

    #[test]
    fn confirmation_filters() {
        let l = list();
        assert_eq!(l.confirmed().len(), 2);
        assert_eq!(l.unconfirmed().len(), 1);
        assert_eq!(l.scoped(BalanceScope::Total), l);
    }

    #[test]
    fn totals_per_color_in_first_seen_order() {
        assert_eq!(
            list().total_values(),
            vec![
                ColorValue {
                    color_id: 1,
                    value: 15
                },
                ColorValue {
                    color_id: 0,
                    value: 7
                },
            ]
        );
        assert!(CoinList::default().total_values().is_empty());
    }

    #[test]
    fn color_filter() {
        let only_uncolored = list().with_colors(&[0]);
        assert_eq!(only_uncolored.len(), 1);
        assert_eq!(only_uncolored.coins()[0].value, 7);
    }
}
