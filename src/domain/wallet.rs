use std::fmt;

/// A buyer's wallet address as accepted by the checkout form.
///
/// The only structural rule is the network prefix: addresses start with `x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn parse(input: &str) -> Result<Self, String> {
        if input.is_empty() {
            return Err("Wallet address is required.".to_string());
        }
        if !input.starts_with('x') {
            return Err("Wallet address must start with \"x\".".to_string());
        }
        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_x_prefixed_address() {
        let wallet = WalletAddress::parse("xDEF456").unwrap();
        assert_eq!(wallet.as_str(), "xDEF456");
    }

    #[test]
    fn test_rejects_empty_and_unprefixed() {
        assert_eq!(
            WalletAddress::parse(""),
            Err("Wallet address is required.".to_string())
        );
        assert_eq!(
            WalletAddress::parse("abc"),
            Err("Wallet address must start with \"x\".".to_string())
        );
        // Prefix check is case-sensitive
        assert!(WalletAddress::parse("XABC").is_err());
    }
}
