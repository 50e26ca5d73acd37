//! Photometric bands.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the six filters, in the order the pipeline iterates them.
///
/// The derived `Ord` follows declaration order, so sorting bands gives
/// `u, g, r, i, z, y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    U,
    G,
    R,
    I,
    Z,
    Y,
}

impl Band {
    /// All bands in iteration order.
    pub const ALL: [Band; 6] = [Band::U, Band::G, Band::R, Band::I, Band::Z, Band::Y];

    /// Filter name as stored in the registry and passed to the stages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Band::U => "u",
            Band::G => "g",
            Band::R => "r",
            Band::I => "i",
            Band::Z => "z",
            Band::Y => "y",
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "u" => Ok(Band::U),
            "g" => Ok(Band::G),
            "r" => Ok(Band::R),
            "i" => Ok(Band::I),
            "z" => Ok(Band::Z),
            "y" => Ok(Band::Y),
            other => Err(format!("unknown band '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_order_is_ugrizy() {
        let names: String = Band::ALL.iter().map(|b| b.as_str()).collect();
        assert_eq!(names, "ugrizy");
    }

    #[test]
    fn sorting_follows_iteration_order() {
        let mut bands = vec![Band::Y, Band::R, Band::U, Band::Z];
        bands.sort();
        assert_eq!(bands, vec![Band::U, Band::R, Band::Z, Band::Y]);
    }

    #[test]
    fn parses_filter_names() {
        assert_eq!("i".parse::<Band>().unwrap(), Band::I);
        assert!("q".parse::<Band>().is_err());
    }
}
