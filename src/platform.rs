//! # Platform-specific utilities
//!
//! Questo modulo centralizza la logica cross-platform: chiavi piattaforma e
//! architettura per le directory vendor, suffisso degli eseguibili e la porta
//! `CommandRunner` usata per invocare i tool esterni.
//!
//! I tool vengono sempre lanciati con una lista argv, mai tramite shell.
//! stdout/stderr vengono catturati interamente, non in streaming.

use crate::utils::display_args;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Vendor directory key for the running OS.
pub fn platform_key() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else {
        "linux"
    }
}

/// Vendor directory key for the running CPU architecture.
pub fn arch_key() -> &'static str {
    match std::env::consts::ARCH {
        "aarch64" | "arm64" => "arm64",
        "x86_64" | "amd64" => "x64",
        other => other,
    }
}

/// Executable suffix tried after the bare candidate name.
pub fn executable_suffix() -> &'static str {
    if cfg!(windows) {
        ".exe"
    } else {
        ""
    }
}

/// Captured result of one external process run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Port for running an external executable to completion.
///
/// Blocking: callers must keep it off any latency-sensitive thread. No
/// timeout is applied.
pub trait CommandRunner: Send + Sync {
    fn execute(&self, program: &Path, args: &[OsString]) -> io::Result<CommandOutput>;
}

/// Runs real processes through `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn execute(&self, program: &Path, args: &[OsString]) -> io::Result<CommandOutput> {
        debug!("Running: {}", display_args(program.as_os_str(), args));

        let start_time = std::time::Instant::now();
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let output = command.output()?;
        debug!(
            "{} exited with {:?} after {:?}",
            program.display(),
            output.status.code(),
            start_time.elapsed()
        );

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// System information structure
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub platform_key: &'static str,
    pub arch_key: &'static str,
}

impl SystemInfo {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            platform_key: platform_key(),
            arch_key: arch_key(),
        }
    }
}

impl fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (vendor/{}/{})",
            self.os, self.arch, self.platform_key, self.arch_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_keys() {
        assert!(["windows", "macos", "linux"].contains(&platform_key()));
        assert!(!arch_key().is_empty());
        if cfg!(windows) {
            assert_eq!(executable_suffix(), ".exe");
        } else {
            assert_eq!(executable_suffix(), "");
        }
    }

    #[test]
    fn test_system_info() {
        let info = SystemInfo::current();
        assert!(!info.os.is_empty());
        assert!(info.to_string().contains(info.platform_key));
    }

    #[test]
    fn test_command_output_success() {
        let ok = CommandOutput {
            exit_code: Some(0),
            ..Default::default()
        };
        let failed = CommandOutput {
            exit_code: Some(2),
            ..Default::default()
        };
        let killed = CommandOutput::default();
        assert!(ok.success());
        assert!(!failed.success());
        assert!(!killed.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_missing_program_is_io_error() {
        let runner = SystemCommandRunner;
        let result = runner.execute(Path::new("/nonexistent/definitely-not-a-tool"), &[]);
        assert!(result.is_err());
    }
}
