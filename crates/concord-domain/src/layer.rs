//! Authority layer module - ranked provenance classes for extracted facts

use serde::{Deserialize, Serialize};

/// Authority layer of a source class
///
/// Layers form a fixed total order. A higher layer supersedes a lower one
/// when the two disagree:
/// - Baseline: bulk tabular extraction (spreadsheets)
/// - Confirmed: official datasheets
/// - Verified: narrative silicon documentation
/// - Absolute: clarifications from the hardware designer
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AuthorityLayer {
    /// Bulk tabular extraction
    Baseline,

    /// Official datasheet
    Confirmed,

    /// Narrative silicon documentation
    Verified,

    /// Designer clarification
    Absolute,
}

impl AuthorityLayer {
    /// All layers in ascending authority order
    pub const ALL: [AuthorityLayer; 4] = [
        AuthorityLayer::Baseline,
        AuthorityLayer::Confirmed,
        AuthorityLayer::Verified,
        AuthorityLayer::Absolute,
    ];

    /// Get the layer name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorityLayer::Baseline => "baseline",
            AuthorityLayer::Confirmed => "confirmed",
            AuthorityLayer::Verified => "verified",
            AuthorityLayer::Absolute => "absolute",
        }
    }

    /// Key of the layer block inside an entry record
    pub fn key(&self) -> &'static str {
        match self {
            AuthorityLayer::Baseline => "layer1",
            AuthorityLayer::Confirmed => "layer2",
            AuthorityLayer::Verified => "layer3",
            AuthorityLayer::Absolute => "layer4",
        }
    }

    /// Numeric rank, 1 (lowest) through 4 (highest)
    pub fn rank(&self) -> u8 {
        match self {
            AuthorityLayer::Baseline => 1,
            AuthorityLayer::Confirmed => 2,
            AuthorityLayer::Verified => 3,
            AuthorityLayer::Absolute => 4,
        }
    }

    /// Parse a layer from its name, its block key, or its rank
    ///
    /// The long block keys used by older entry files (`layer2_datasheet`)
    /// are accepted as well.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "baseline" | "1" => return Some(AuthorityLayer::Baseline),
            "confirmed" | "2" => return Some(AuthorityLayer::Confirmed),
            "verified" | "3" => return Some(AuthorityLayer::Verified),
            "absolute" | "4" => return Some(AuthorityLayer::Absolute),
            _ => {}
        }
        let rest = s.strip_prefix("layer")?;
        let digit = rest.chars().next()?;
        let tail = &rest[digit.len_utf8()..];
        if !tail.is_empty() && !tail.starts_with('_') {
            return None;
        }
        Self::parse(&digit.to_string())
    }

    /// Get the next layer up (None at the top)
    pub fn next(&self) -> Option<Self> {
        match self {
            AuthorityLayer::Baseline => Some(AuthorityLayer::Confirmed),
            AuthorityLayer::Confirmed => Some(AuthorityLayer::Verified),
            AuthorityLayer::Verified => Some(AuthorityLayer::Absolute),
            AuthorityLayer::Absolute => None,
        }
    }

    /// Get the next layer down (None at the bottom)
    pub fn previous(&self) -> Option<Self> {
        match self {
            AuthorityLayer::Baseline => None,
            AuthorityLayer::Confirmed => Some(AuthorityLayer::Baseline),
            AuthorityLayer::Verified => Some(AuthorityLayer::Confirmed),
            AuthorityLayer::Absolute => Some(AuthorityLayer::Verified),
        }
    }
}

impl std::fmt::Display for AuthorityLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuthorityLayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid authority layer: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_order_is_total() {
        assert!(AuthorityLayer::Baseline < AuthorityLayer::Confirmed);
        assert!(AuthorityLayer::Confirmed < AuthorityLayer::Verified);
        assert!(AuthorityLayer::Verified < AuthorityLayer::Absolute);
        for pair in AuthorityLayer::ALL.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn test_layer_progression() {
        assert_eq!(AuthorityLayer::Baseline.next(), Some(AuthorityLayer::Confirmed));
        assert_eq!(AuthorityLayer::Absolute.next(), None);
        assert_eq!(AuthorityLayer::Verified.previous(), Some(AuthorityLayer::Confirmed));
        assert_eq!(AuthorityLayer::Baseline.previous(), None);
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!(AuthorityLayer::parse("Verified"), Some(AuthorityLayer::Verified));
        assert_eq!(AuthorityLayer::parse("layer2"), Some(AuthorityLayer::Confirmed));
        assert_eq!(
            AuthorityLayer::parse("layer4_clarifications"),
            Some(AuthorityLayer::Absolute)
        );
        assert_eq!(AuthorityLayer::parse("1"), Some(AuthorityLayer::Baseline));
        assert_eq!(AuthorityLayer::parse("layer5"), None);
        assert_eq!(AuthorityLayer::parse("layer12"), None);
        assert!("bogus".parse::<AuthorityLayer>().is_err());
    }

    #[test]
    fn test_keys() {
        let keys: Vec<_> = AuthorityLayer::ALL.iter().map(|l| l.key()).collect();
        assert_eq!(keys, vec!["layer1", "layer2", "layer3", "layer4"]);
    }
}
