use crate::error::Error;
use crate::geometry::{self, CacheGeometry, ConfigurationCode};
use crate::policy::ReplacementPolicy;
use crate::pool::{Failure, Pool};
use crate::run::{Invocation, RunIdentity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A cache configuration held fixed while the other cache is varied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixed {
    pub geometry: CacheGeometry,
    pub policy: ReplacementPolicy,
}

/// Configurations held fixed by the optimized sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    pub il1: Fixed,
    pub dl1: Fixed,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            il1: Fixed {
                geometry: CacheGeometry::new(1, 256, 1),
                policy: ReplacementPolicy::LRU,
            },
            dl1: Fixed {
                geometry: CacheGeometry::new(1, 32, 8),
                policy: ReplacementPolicy::LRU,
            },
        }
    }
}

/// Runs to submit, grouped into phases separated by a drain of the pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub phases: Vec<Vec<RunIdentity>>,
    /// Combinations that were counted but not planned.
    pub skipped: usize,
}

impl Plan {
    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn runs(&self) -> impl Iterator<Item = &RunIdentity> + '_ {
        self.phases.iter().flatten()
    }
}

/// Outcome of executing a plan.
#[derive(Debug, Default)]
pub struct Summary {
    pub submitted: usize,
    pub skipped: usize,
    pub failures: Vec<Failure>,
}

impl Summary {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.submitted - self.failures.len()
    }
}

/// Every instruction x data cache combination.
///
/// Combinations are counted in nesting order il1 policy, il1 configuration,
/// dl1 policy, dl1 configuration. The first `skip` combinations are not planned,
/// which allows resuming an interrupted sweep.
#[must_use]
pub fn plan_full(num_configs: usize, policies: &[ReplacementPolicy], skip: usize) -> Plan {
    let mut counter = 0;
    let mut runs = vec![];
    for (&il1_policy, il1, &dl1_policy, dl1) in
        itertools::iproduct!(policies, 0..num_configs, policies, 0..num_configs)
    {
        counter += 1;
        if counter > skip {
            runs.push(RunIdentity {
                il1,
                il1_policy,
                dl1,
                dl1_policy,
            });
        }
    }
    Plan {
        skipped: counter.min(skip),
        phases: vec![runs],
    }
}

/// Vary one cache at a time.
///
/// The first phase varies the instruction cache while the data cache is fixed to
/// `defaults.dl1`, the second phase varies the data cache with the instruction
/// cache fixed to `defaults.il1`. The joint configuration space is not explored.
pub fn plan_optimized(
    codes: &[ConfigurationCode],
    policies: &[ReplacementPolicy],
    defaults: &Defaults,
) -> Result<Plan, Error> {
    let index_of = |cache: &str, fixed: &Fixed| {
        geometry::position(codes, &fixed.geometry).ok_or_else(|| {
            Error::config(format!(
                "default {cache} geometry {} is not one of the {} enumerated configurations",
                fixed.geometry,
                codes.len(),
            ))
        })
    };
    let il1_default = index_of("il1", &defaults.il1)?;
    let dl1_default = index_of("dl1", &defaults.dl1)?;

    let vary_il1 = itertools::iproduct!(policies, 0..codes.len())
        .map(|(&il1_policy, il1)| RunIdentity {
            il1,
            il1_policy,
            dl1: dl1_default,
            dl1_policy: defaults.dl1.policy,
        })
        .collect();
    let vary_dl1 = itertools::iproduct!(policies, 0..codes.len())
        .map(|(&dl1_policy, dl1)| RunIdentity {
            il1: il1_default,
            il1_policy: defaults.il1.policy,
            dl1,
            dl1_policy,
        })
        .collect();
    Ok(Plan {
        phases: vec![vary_il1, vary_dl1],
        skipped: 0,
    })
}

pub fn invocation(
    id: RunIdentity,
    codes: &[ConfigurationCode],
    results_dir: &Path,
) -> Result<Invocation, Error> {
    let code = |index: usize| {
        codes
            .get(index)
            .cloned()
            .ok_or(Error::UnknownConfiguration {
                index,
                len: codes.len(),
            })
    };
    Ok(Invocation {
        id,
        il1: code(id.il1)?,
        dl1: code(id.dl1)?,
        report: id.report_path(results_dir),
    })
}

/// Submit every run of the plan, draining the pool after each phase.
pub async fn execute(
    pool: &mut Pool,
    plan: &Plan,
    codes: &[ConfigurationCode],
    results_dir: impl Into<PathBuf>,
) -> Result<Summary, Error> {
    let results_dir = results_dir.into();
    let mut summary = Summary {
        skipped: plan.skipped,
        ..Summary::default()
    };
    for (phase, runs) in plan.phases.iter().enumerate() {
        log::info!(
            "phase {}/{}: submitting {} simulations",
            phase + 1,
            plan.phases.len(),
            runs.len()
        );
        for id in runs {
            pool.submit(invocation(*id, codes, &results_dir)?);
            summary.submitted += 1;
        }
        summary.failures.extend(pool.await_all().await?);
    }
    Ok(summary)
}
