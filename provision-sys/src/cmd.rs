use std::process::Command;

use crate::error::{Result, SysError};

pub fn render(command: &str, args: &[String]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{} {}", command, args.join(" "))
    }
}

/// Run a local command and return its stdout, failing on non-zero exit.
pub fn run(command: &str, args: &[String]) -> Result<String> {
    let rendered = render(command, args);
    tracing::debug!("running local command: {rendered}");

    let output = Command::new(command)
        .args(args)
        .output()
        .map_err(|error| SysError::CommandFailed {
            command: rendered.clone(),
            stderr: error.to_string(),
        })?;

    if !output.status.success() {
        return Err(SysError::CommandFailed {
            command: rendered,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Check that an external tool is installed before first use.
pub fn require_tool(name: &str) -> Result<()> {
    which::which(name)
        .map(|_| ())
        .map_err(|_| SysError::ToolMissing(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::render;

    #[test]
    fn formats_command_context() {
        let args = vec!["--raw".to_string(), "path".to_string()];
        assert_eq!(render("nix", &args), "nix --raw path");
        assert_eq!(render("nix", &[]), "nix");
    }
}
