use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("replacement policy {0:?} must be a single character")]
    Length(String),
    #[error("replacement policy {0:?} must be alphanumeric")]
    Character(char),
}

/// Single character tag selecting the replacement policy of a cache.
///
/// The simulator understands `l` (LRU), `f` (FIFO) and `r` (random).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReplacementPolicy(char);

impl ReplacementPolicy {
    pub const LRU: Self = Self('l');
    pub const FIFO: Self = Self('f');
    pub const RANDOM: Self = Self('r');

    pub fn new(code: char) -> Result<Self, ParseError> {
        // underscores separate fields in report file names
        if code.is_ascii_alphanumeric() {
            Ok(Self(code))
        } else {
            Err(ParseError::Character(code))
        }
    }

    #[must_use]
    pub fn code(self) -> char {
        self.0
    }
}

/// The policies swept by default.
#[must_use]
pub fn defaults() -> Vec<ReplacementPolicy> {
    vec![ReplacementPolicy::LRU, ReplacementPolicy::FIFO]
}

impl std::fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ReplacementPolicy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(code), None) => Self::new(code),
            _ => Err(ParseError::Length(s.to_string())),
        }
    }
}

impl TryFrom<String> for ReplacementPolicy {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReplacementPolicy> for String {
    fn from(policy: ReplacementPolicy) -> Self {
        policy.to_string()
    }
}
