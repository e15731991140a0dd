//! LoRaWAN regional parameter plans
//!
//! Band names are matched exactly and case-sensitively. Callers that accept
//! operator input are expected to upper-case it first: `resolve("eu868")`
//! deliberately returns `None`.

use std::fmt;

/// Regional channel plan descriptor
#[derive(Debug, PartialEq, Eq)]
pub struct Band {
    pub name: &'static str,
    /// Lowest uplink frequency in Hz
    pub freq_min_hz: u32,
    /// Highest uplink frequency in Hz
    pub freq_max_hz: u32,
    /// Number of 8-channel sub-bands the plan is split into (0 if the plan has none)
    pub sub_bands: u8,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:.3}-{:.3} MHz)",
            self.name,
            self.freq_min_hz as f64 / 1e6,
            self.freq_max_hz as f64 / 1e6
        )
    }
}

/// Longest band name the durable store will hold
pub const MAX_BAND_NAME_LEN: usize = 10;

static BANDS: [Band; 9] = [
    Band {
        name: "EU868",
        freq_min_hz: 863_000_000,
        freq_max_hz: 870_000_000,
        sub_bands: 0,
    },
    Band {
        name: "US915",
        freq_min_hz: 902_000_000,
        freq_max_hz: 928_000_000,
        sub_bands: 8,
    },
    Band {
        name: "CN780",
        freq_min_hz: 779_000_000,
        freq_max_hz: 787_000_000,
        sub_bands: 0,
    },
    Band {
        name: "EU433",
        freq_min_hz: 433_175_000,
        freq_max_hz: 434_665_000,
        sub_bands: 0,
    },
    Band {
        name: "AU915",
        freq_min_hz: 915_000_000,
        freq_max_hz: 928_000_000,
        sub_bands: 8,
    },
    Band {
        name: "CN500",
        freq_min_hz: 470_000_000,
        freq_max_hz: 510_000_000,
        sub_bands: 12,
    },
    Band {
        name: "AS923",
        freq_min_hz: 915_000_000,
        freq_max_hz: 928_000_000,
        sub_bands: 0,
    },
    Band {
        name: "KR920",
        freq_min_hz: 920_900_000,
        freq_max_hz: 923_300_000,
        sub_bands: 0,
    },
    Band {
        name: "IN865",
        freq_min_hz: 865_000_000,
        freq_max_hz: 867_000_000,
        sub_bands: 0,
    },
];

/// Look up a band by its exact name
pub fn resolve(name: &str) -> Option<&'static Band> {
    BANDS.iter().find(|band| band.name == name)
}

/// Number of supported bands
pub fn count() -> usize {
    BANDS.len()
}

/// Name of the band at `index`, for building selection lists
pub fn name_at(index: usize) -> Option<&'static str> {
    BANDS.get(index).map(|band| band.name)
}

/// All supported bands in table order
pub fn all() -> impl Iterator<Item = &'static Band> {
    BANDS.iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_band() {
        let band = resolve("EU868").expect("EU868 is supported");
        assert_eq!(band.name, "EU868");
        assert!(resolve("US915").is_some());
        assert!(resolve("IN865").is_some());
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        assert!(resolve("eu868").is_none());
        assert!(resolve("Eu868").is_none());
    }

    #[test]
    fn test_resolve_unknown_band() {
        assert!(resolve("").is_none());
        assert!(resolve("EU86").is_none());
        assert!(resolve("XX999").is_none());
    }

    #[test]
    fn test_enumeration_is_stable() {
        assert_eq!(count(), 9);
        assert_eq!(name_at(0), Some("EU868"));
        assert_eq!(name_at(1), Some("US915"));
        assert_eq!(name_at(8), Some("IN865"));
        assert_eq!(name_at(count()), None);

        let names: Vec<_> = all().map(|b| b.name).collect();
        for (i, name) in names.iter().enumerate() {
            assert_eq!(name_at(i), Some(*name));
            assert!(resolve(name).is_some());
            assert!(name.len() <= MAX_BAND_NAME_LEN);
        }
    }

    #[test]
    fn test_display() {
        let band = resolve("EU868").unwrap();
        assert_eq!(band.to_string(), "EU868 (863.000-870.000 MHz)");
    }
}
