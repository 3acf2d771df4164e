use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WalletStatus {
    NotCreated,
    Locked,
    Unlocked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&WalletStatus::NotCreated).unwrap();
        assert_eq!(json, r#""not_created""#);
    }
}
