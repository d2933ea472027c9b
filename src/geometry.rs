use serde::{Deserialize, Serialize};

/// Values tried for each of sets, block size and associativity.
pub const CANDIDATES: [u32; 9] = [1, 2, 4, 8, 16, 32, 64, 128, 256];

/// The simulator rejects smaller blocks.
pub const MIN_BLOCK_SIZE: u32 = 8;

/// Level tag of every generated configuration code.
pub const LEVEL_PREFIX: &str = "l1:";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("configuration code {0:?} does not start with {LEVEL_PREFIX:?}")]
    MissingLevel(String),
    #[error("configuration code {0:?} is not terminated by ':'")]
    MissingTerminator(String),
    #[error("{0:?} must have exactly three fields <sets>:<block size>:<associativity>")]
    FieldCount(String),
    #[error("bad {field} {value:?}")]
    Field {
        field: &'static str,
        value: String,
        source: std::num::ParseIntError,
    },
}

/// Geometry of a single level 1 cache.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CacheGeometry {
    pub sets: u32,
    pub block_size: u32,
    pub associativity: u32,
}

impl CacheGeometry {
    #[must_use]
    pub fn new(sets: u32, block_size: u32, associativity: u32) -> Self {
        Self {
            sets,
            block_size,
            associativity,
        }
    }

    /// Total size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::from(self.sets) * u64::from(self.block_size) * u64::from(self.associativity)
    }

    #[must_use]
    pub fn code(&self) -> ConfigurationCode {
        ConfigurationCode(format!(
            "{LEVEL_PREFIX}{}:{}:{}:",
            self.sets, self.block_size, self.associativity
        ))
    }

    /// The identifier fields as they appear in the result table.
    #[must_use]
    pub fn fields(&self) -> [String; 3] {
        [
            self.sets.to_string(),
            self.block_size.to_string(),
            self.associativity.to_string(),
        ]
    }
}

impl std::fmt::Display for CacheGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.sets, self.block_size, self.associativity)
    }
}

/// Parses the short `<sets>:<block size>:<associativity>` form.
impl std::str::FromStr for CacheGeometry {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(':').collect();
        let [sets, block_size, associativity] = fields[..] else {
            return Err(ParseError::FieldCount(s.to_string()));
        };
        let parse = |field: &'static str, value: &str| {
            value.trim().parse::<u32>().map_err(|source| ParseError::Field {
                field,
                value: value.to_string(),
                source,
            })
        };
        Ok(Self {
            sets: parse("sets", sets)?,
            block_size: parse("block size", block_size)?,
            associativity: parse("associativity", associativity)?,
        })
    }
}

/// Simulator configuration string `l1:<sets>:<block size>:<associativity>:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationCode(String);

impl ConfigurationCode {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn geometry(&self) -> Result<CacheGeometry, ParseError> {
        let inner = self
            .0
            .strip_prefix(LEVEL_PREFIX)
            .ok_or_else(|| ParseError::MissingLevel(self.0.clone()))?;
        let inner = inner
            .strip_suffix(':')
            .ok_or_else(|| ParseError::MissingTerminator(self.0.clone()))?;
        inner.parse()
    }
}

impl std::fmt::Display for ConfigurationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ConfigurationCode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = Self(s.to_string());
        code.geometry()?;
        Ok(code)
    }
}

impl From<CacheGeometry> for ConfigurationCode {
    fn from(geometry: CacheGeometry) -> Self {
        geometry.code()
    }
}

/// Enumerate all geometries of exactly `target` bytes.
///
/// Triples are produced in lexicographic order over [`CANDIDATES`].
pub fn enumerate(target: u32) -> impl Iterator<Item = CacheGeometry> {
    itertools::iproduct!(CANDIDATES, CANDIDATES, CANDIDATES)
        .map(|(sets, block_size, associativity)| {
            CacheGeometry::new(sets, block_size, associativity)
        })
        .filter(move |geometry| {
            geometry.size() == u64::from(target) && geometry.block_size >= MIN_BLOCK_SIZE
        })
}

/// Configuration codes for every geometry of `target` bytes, addressed by index.
#[must_use]
pub fn codes(target: u32) -> Vec<ConfigurationCode> {
    enumerate(target).map(ConfigurationCode::from).collect()
}

/// Position of `geometry` in the list of codes.
#[must_use]
pub fn position(codes: &[ConfigurationCode], geometry: &CacheGeometry) -> Option<usize> {
    let code = geometry.code();
    codes.iter().position(|c| *c == code)
}

#[cfg(test)]
mod tests {
    use super::{CacheGeometry, ConfigurationCode, ParseError, CANDIDATES};
    use color_eyre::eyre;
    use pretty_assertions::assert_eq as diff_assert_eq;

    #[test]
    fn enumerated_triples_satisfy_constraints() {
        for target in [1, 8, 16, 64, 256, 1024, 4096, 65_536, 1000] {
            for geometry in super::enumerate(target) {
                assert_eq!(geometry.size(), u64::from(target));
                assert!(geometry.block_size >= 8);
                assert!(CANDIDATES.contains(&geometry.sets));
                assert!(CANDIDATES.contains(&geometry.block_size));
                assert!(CANDIDATES.contains(&geometry.associativity));
            }
        }
    }

    #[test]
    fn enumerate_256() {
        let geometries: Vec<_> = super::enumerate(256).collect();
        assert!(geometries.contains(&CacheGeometry::new(1, 256, 1)));
        assert!(!geometries.iter().any(|g| g.block_size < 8));
        // 2 * 4 * 32 == 256 but the block size is too small
        assert!(!geometries.contains(&CacheGeometry::new(32, 4, 2)));

        diff_assert_eq!(
            geometries[..6].to_vec(),
            vec![
                CacheGeometry::new(1, 8, 32),
                CacheGeometry::new(1, 16, 16),
                CacheGeometry::new(1, 32, 8),
                CacheGeometry::new(1, 64, 4),
                CacheGeometry::new(1, 128, 2),
                CacheGeometry::new(1, 256, 1),
            ]
        );
        // block size b in {8..256}, a * c = 256 / b with a, c powers of two
        assert_eq!(geometries.len(), 6 + 5 + 4 + 3 + 2 + 1);
    }

    #[test]
    fn enumerate_is_empty_below_min_block_size() {
        assert_eq!(super::enumerate(4).count(), 0);
        assert_eq!(super::enumerate(3 * 8).count(), 0);
        assert!(super::codes(7).is_empty());
    }

    #[test]
    fn code_format() {
        diff_assert_eq!(CacheGeometry::new(1, 32, 8).code().as_str(), "l1:1:32:8:");
        diff_assert_eq!(CacheGeometry::new(128, 8, 4).code().to_string(), "l1:128:8:4:");
    }

    #[test]
    fn decode_recovers_triple() -> eyre::Result<()> {
        for geometry in super::enumerate(1024) {
            let code: ConfigurationCode = geometry.code().as_str().parse()?;
            diff_assert_eq!(code.geometry()?, geometry);
        }
        Ok(())
    }

    #[test]
    fn decode_rejects_malformed_codes() {
        assert!(matches!(
            "1:32:8:".parse::<ConfigurationCode>(),
            Err(ParseError::MissingLevel(_))
        ));
        assert!(matches!(
            "l1:1:32:8".parse::<ConfigurationCode>(),
            Err(ParseError::MissingTerminator(_))
        ));
        assert!(matches!(
            "l1:1:32:".parse::<ConfigurationCode>(),
            Err(ParseError::FieldCount(_))
        ));
        assert!(matches!(
            "l1:1:x:8:".parse::<ConfigurationCode>(),
            Err(ParseError::Field {
                field: "block size",
                ..
            })
        ));
    }

    #[test]
    fn short_form() -> eyre::Result<()> {
        diff_assert_eq!("1:256:1".parse::<CacheGeometry>()?, CacheGeometry::new(1, 256, 1));
        diff_assert_eq!(CacheGeometry::new(4, 8, 2).to_string(), "4:8:2");
        Ok(())
    }

    #[test]
    fn position_in_codes() {
        let codes = super::codes(256);
        assert_eq!(super::position(&codes, &CacheGeometry::new(1, 32, 8)), Some(2));
        assert_eq!(super::position(&codes, &CacheGeometry::new(1, 256, 1)), Some(5));
        assert_eq!(super::position(&codes, &CacheGeometry::new(1, 8, 8)), None);
    }
}
