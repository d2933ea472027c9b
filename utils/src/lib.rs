#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

pub mod fs;

#[macro_export]
macro_rules! decode_utf8 {
    ($x:expr) => {
        String::from_utf8_lossy(&$x).to_string()
    };
}

/// A failed invocation of an external command.
#[derive(thiserror::Error, Debug)]
#[error("command {command} failed with exit code {:?}", .output.status.code())]
pub struct CommandError {
    pub command: String,
    pub output: async_process::Output,
}

impl CommandError {
    #[must_use]
    pub fn new(command: &async_process::Command, output: async_process::Output) -> Self {
        Self {
            command: format!("{command:?}"),
            output,
        }
    }

    #[must_use]
    pub fn into_eyre(self) -> color_eyre::Report {
        use color_eyre::{eyre, Section, SectionExt};
        let stdout = decode_utf8!(self.output.stdout);
        let stderr = decode_utf8!(self.output.stderr);
        eyre::Report::from(self)
            .with_section(move || stdout.trim().to_string().header("stdout:"))
            .with_section(move || stderr.trim().to_string().header("stderr:"))
    }
}
