//! Post-build hook: run a configured shell command after a successful
//! weave or tangle.

use std::process::Command;

use crate::config::{expand, Options};
use crate::errors::{GlitterError, Result};

/// Executes a post-build command string through the platform shell.
///
/// `${weavefile}` expands to the weave output filename and `${SHELL}` to
/// the configured shell; giving `${SHELL}` explicitly makes the command
/// run directly, word-split, instead of through `shell -c`. Any other
/// variable is an error, and a non-zero exit status is reported as
/// `CommandFailed`.
pub fn execute_command(options: &Options, command: &str, weavefile: &str) -> Result<()> {
    let mut explicit_shell = false;
    let mut unknown: Option<String> = None;

    let expanded = expand(command, |var| match var {
        "weavefile" => Some(weavefile.to_string()),
        "SHELL" => {
            explicit_shell = true;
            Some(options.get("Shell").to_string())
        }
        other => {
            unknown = Some(other.to_string());
            None
        }
    });
    if let Some(var) = unknown {
        return Err(GlitterError::CommandFailed(format!(
            "unknown replacement in command: `${var}`"
        )));
    }

    tracing::info!("running `{}`", expanded);
    let status = if explicit_shell {
        let mut words = expanded.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| GlitterError::CommandFailed("empty command".to_string()))?;
        Command::new(program).args(words).status()
    } else {
        Command::new(options.get("Shell"))
            .arg("-c")
            .arg(&expanded)
            .status()
    }
    .map_err(|e| GlitterError::CommandFailed(format!("`{expanded}`: {e}")))?;

    if !status.success() {
        return Err(GlitterError::CommandFailed(format!(
            "`{expanded}` exited with {status}"
        )));
    }
    Ok(())
}
