use crate::run::Invocation;
use async_process::Command;
use std::path::PathBuf;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Fs(#[from] utils::fs::Error),

    #[error(transparent)]
    Command(#[from] utils::CommandError),

    #[error("simulation of {id} timed out after {timeout:?}")]
    Timeout {
        id: crate::run::RunIdentity,
        timeout: Duration,
    },
}

impl Error {
    pub fn into_eyre(self) -> color_eyre::Report {
        match self {
            Error::Command(err) => err.into_eyre(),
            err => err.into(),
        }
    }
}

/// Runs one simulation and writes its report to [`Invocation::report`].
#[async_trait::async_trait]
pub trait Simulator: Send + Sync {
    async fn simulate(&self, invocation: &Invocation) -> Result<(), Error>;
}

/// The external `sim-cache` executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimCache {
    pub executable: PathBuf,
    pub trace: PathBuf,
    pub timeout: Option<Duration>,
}

impl SimCache {
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>, trace: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            trace: trace.into(),
            timeout: None,
        }
    }

    /// Command line arguments for one invocation, for display.
    #[must_use]
    pub fn args(&self, invocation: &Invocation) -> Vec<String> {
        self.command(invocation)
            .get_args()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect()
    }

    /// The simulator command for one invocation.
    ///
    /// Report and trace paths are passed as they are, without utf8 conversion.
    #[must_use]
    pub fn command(&self, invocation: &Invocation) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.executable);
        cmd.args(["-cache:il1", invocation.il1_arg().as_str()]);
        cmd.args(["-cache:il2", "none"]);
        cmd.args(["-cache:dl1", invocation.dl1_arg().as_str()]);
        cmd.args(["-cache:dl2", "none"]);
        cmd.arg("-redir:sim").arg(&invocation.report);
        cmd.arg(&self.trace);
        cmd
    }
}

/// Expects the results directory to exist.
#[async_trait::async_trait]
impl Simulator for SimCache {
    async fn simulate(&self, invocation: &Invocation) -> Result<(), Error> {
        let mut cmd = Command::from(self.command(invocation));
        cmd.kill_on_drop(true);
        log::debug!("command: {:?}", &cmd);

        let result = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, cmd.output())
                .await
                .map_err(|_| Error::Timeout {
                    id: invocation.id,
                    timeout,
                })?,
            None => cmd.output().await,
        }?;

        if result.status.success() {
            Ok(())
        } else {
            Err(Error::Command(utils::CommandError::new(&cmd, result)))
        }
    }
}
