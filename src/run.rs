use crate::geometry::ConfigurationCode;
use crate::policy::{self, ReplacementPolicy};
use std::path::{Path, PathBuf};

/// Extension of simulator reports.
pub const REPORT_EXTENSION: &str = "txt";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("report name {0:?} must have four '_' separated fields")]
    FieldCount(String),
    #[error("bad configuration index {value:?} in report name {name:?}")]
    Index {
        name: String,
        value: String,
        source: std::num::ParseIntError,
    },
    #[error("bad replacement policy in report name {name:?}")]
    Policy {
        name: String,
        source: policy::ParseError,
    },
}

/// Identifies one simulator invocation and its report file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunIdentity {
    pub il1: usize,
    pub il1_policy: ReplacementPolicy,
    pub dl1: usize,
    pub dl1_policy: ReplacementPolicy,
}

impl RunIdentity {
    /// `{il1}_{il1 policy}_{dl1}_{dl1 policy}`
    #[must_use]
    pub fn stem(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.il1, self.il1_policy, self.dl1, self.dl1_policy
        )
    }

    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.{REPORT_EXTENSION}", self.stem())
    }

    #[must_use]
    pub fn report_path(&self, results_dir: impl AsRef<Path>) -> PathBuf {
        results_dir.as_ref().join(self.file_name())
    }

    /// Recover the identity from a report path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        stem.parse()
    }
}

impl std::fmt::Display for RunIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "il1[{}{}] dl1[{}{}]",
            self.il1, self.il1_policy, self.dl1, self.dl1_policy
        )
    }
}

impl std::str::FromStr for RunIdentity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split('_').collect();
        let [il1, il1_policy, dl1, dl1_policy] = fields[..] else {
            return Err(ParseError::FieldCount(s.to_string()));
        };
        let index = |value: &str| {
            value.parse::<usize>().map_err(|source| ParseError::Index {
                name: s.to_string(),
                value: value.to_string(),
                source,
            })
        };
        let policy = |value: &str| {
            value
                .parse::<ReplacementPolicy>()
                .map_err(|source| ParseError::Policy {
                    name: s.to_string(),
                    source,
                })
        };
        Ok(Self {
            il1: index(il1)?,
            il1_policy: policy(il1_policy)?,
            dl1: index(dl1)?,
            dl1_policy: policy(dl1_policy)?,
        })
    }
}

/// A single simulator run: which caches to configure and where to write the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub id: RunIdentity,
    pub il1: ConfigurationCode,
    pub dl1: ConfigurationCode,
    pub report: PathBuf,
}

impl Invocation {
    /// Instruction cache argument, e.g. `il1:1:256:1:l`.
    #[must_use]
    pub fn il1_arg(&self) -> String {
        format!("i{}{}", self.il1, self.id.il1_policy)
    }

    /// Data cache argument, e.g. `dl1:1:32:8:l`.
    #[must_use]
    pub fn dl1_arg(&self) -> String {
        format!("d{}{}", self.dl1, self.id.dl1_policy)
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} -> {}", self.id, self.report.display())
    }
}

#[cfg(test)]
mod tests {
    use super::{ParseError, RunIdentity};
    use crate::policy::ReplacementPolicy;
    use color_eyre::eyre;
    use pretty_assertions::assert_eq as diff_assert_eq;
    use std::path::PathBuf;

    #[test]
    fn file_name_contract() -> eyre::Result<()> {
        let id = RunIdentity {
            il1: 3,
            il1_policy: ReplacementPolicy::LRU,
            dl1: 12,
            dl1_policy: ReplacementPolicy::FIFO,
        };
        diff_assert_eq!(id.file_name(), "3_l_12_f.txt");
        diff_assert_eq!(
            id.report_path("/results"),
            PathBuf::from("/results/3_l_12_f.txt")
        );
        diff_assert_eq!(RunIdentity::from_path("/results/3_l_12_f.txt")?, id);
        Ok(())
    }

    #[test]
    fn malformed_names() {
        assert!(matches!(
            "3_l_12".parse::<RunIdentity>(),
            Err(ParseError::FieldCount(_))
        ));
        assert!(matches!(
            "3_l_12_f_x".parse::<RunIdentity>(),
            Err(ParseError::FieldCount(_))
        ));
        assert!(matches!(
            "x_l_12_f".parse::<RunIdentity>(),
            Err(ParseError::Index { .. })
        ));
        assert!(matches!(
            "3_lru_12_f".parse::<RunIdentity>(),
            Err(ParseError::Policy { .. })
        ));
    }

    #[test]
    fn simulator_arguments() -> eyre::Result<()> {
        let invocation = super::Invocation {
            id: RunIdentity {
                il1: 5,
                il1_policy: ReplacementPolicy::LRU,
                dl1: 2,
                dl1_policy: ReplacementPolicy::FIFO,
            },
            il1: "l1:1:256:1:".parse()?,
            dl1: "l1:1:32:8:".parse()?,
            report: PathBuf::from("5_l_2_f.txt"),
        };
        diff_assert_eq!(invocation.il1_arg(), "il1:1:256:1:l");
        diff_assert_eq!(invocation.dl1_arg(), "dl1:1:32:8:f");
        Ok(())
    }
}
