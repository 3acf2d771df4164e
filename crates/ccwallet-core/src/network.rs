use serde::{Deserialize, Serialize};

/// Bitcoin networks a wallet can be opened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn into_bitcoin(self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }

    pub fn is_mainnet(self) -> bool {
        matches!(self, Network::Mainnet)
    }

    pub fn default_electrum_url(self) -> &'static str {
        match self {
            Network::Mainnet => "ssl://electrum.blockstream.info:50002",
            Network::Testnet => "ssl://electrum.blockstream.info:60002",
            Network::Regtest => "tcp://localhost:50001",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            _ => Err(format!("invalid network: {}", s)),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!("bitcoin".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("TESTNET".parse::<Network>().unwrap(), Network::Testnet);
        assert!("liquid".parse::<Network>().is_err());
    }

    #[test]
    fn serde_is_lowercase() {
        let json = serde_json::to_string(&Network::Regtest).unwrap();
        assert_eq!(json, "\"regtest\"");
        let back: Network = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Network::Regtest);
    }

    #[test]
    fn maps_to_bitcoin_network() {
        assert_eq!(Network::Mainnet.into_bitcoin(), bitcoin::Network::Bitcoin);
        assert!(!Network::Testnet.is_mainnet());
    }
}
