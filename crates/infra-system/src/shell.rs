// Shell selection for spawned commands

use serde::Deserialize;
use tokio::process::Command;

#[cfg(not(windows))]
const DEFAULT_SHELL: &str = "/bin/sh";

/// Which shell runs generated commands
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Shell executable; `$SHELL` (then `/bin/sh`) when unset. Ignored on Windows.
    pub program: Option<String>,
    /// Start a login shell so the user's profile (PATH, version managers) applies
    pub login: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: None,
            login: true,
        }
    }
}

impl ShellConfig {
    /// Plain `sh -c`, handy for tests that must not depend on the user's profile
    pub fn plain(program: impl Into<String>) -> Self {
        Self {
            program: Some(program.into()),
            login: false,
        }
    }

    #[cfg(not(windows))]
    pub fn resolve_program(&self) -> String {
        self.program
            .clone()
            .or_else(|| std::env::var("SHELL").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| DEFAULT_SHELL.to_string())
    }

    #[cfg(windows)]
    pub fn resolve_program(&self) -> String {
        "cmd".to_string()
    }

    /// Build the process that runs `command`
    pub fn command(&self, command: &str) -> Command {
        let mut cmd = Command::new(self.resolve_program());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            // Passed verbatim: std's argument quoting turns `"` into `\"`,
            // which cmd.exe does not understand
            cmd.as_std_mut().raw_arg(cmd_exe_line(command));
        }

        #[cfg(not(windows))]
        {
            if self.login {
                cmd.arg("-l");
            }
            cmd.arg("-c").arg(command);
        }

        cmd
    }
}

/// `cmd.exe` arguments running `command` as typed
///
/// With `/s` cmd strips only the outermost quotes, so quotes inside the
/// command survive untouched.
#[cfg_attr(not(windows), allow(dead_code))]
fn cmd_exe_line(command: &str) -> String {
    format!("/d /s /c \"{}\"", command)
}
