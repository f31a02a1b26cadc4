//! # Platform-specific utilities
//!
//! Questo modulo centralizza l'apertura di file e cartelle con l'applicazione
//! predefinita del sistema (comandi `webview.openFile` e `webview.openFileInExplorer`)
//! e le informazioni sulla piattaforma usate nei log di debug.

use crate::args;
use crate::error::CompressError;
use std::path::Path;
use tracing::debug;

/// Program and arguments for one opener invocation
#[derive(Debug, Clone, PartialEq)]
pub struct OpenerCommand {
    pub program: &'static str,
    pub args: Vec<String>,
}

/// Opener commands of the current platform
pub struct PlatformCommands;

impl PlatformCommands {
    /// Command opening `path` with its default application
    pub fn open_command(path: &Path) -> OpenerCommand {
        let target = path.display();
        if cfg!(windows) {
            OpenerCommand {
                program: "cmd",
                args: args!["/C", "start", "", target],
            }
        } else if cfg!(target_os = "macos") {
            OpenerCommand {
                program: "open",
                args: args![target],
            }
        } else {
            OpenerCommand {
                program: "xdg-open",
                args: args![target],
            }
        }
    }

    /// Command showing `path` in the system file browser
    pub fn reveal_command(path: &Path) -> OpenerCommand {
        if cfg!(windows) {
            OpenerCommand {
                program: "explorer",
                args: args![format!("/select,{}", path.display())],
            }
        } else if cfg!(target_os = "macos") {
            OpenerCommand {
                program: "open",
                args: args!["-R", path.display()],
            }
        } else {
            let dir = if path.is_dir() {
                path
            } else {
                path.parent().unwrap_or(path)
            };
            OpenerCommand {
                program: "xdg-open",
                args: args![dir.display()],
            }
        }
    }

    /// Run the opener and wait for it; openers hand the file off and exit quickly
    async fn launch(command: OpenerCommand) -> Result<(), CompressError> {
        debug!("Spawning {} {:?}", command.program, command.args);
        let status = tokio::process::Command::new(command.program)
            .args(&command.args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .map_err(|e| CompressError::io(format!("Failed to launch {}: {}", command.program, e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(CompressError::client(format!("{} exited with {}", command.program, status)))
        }
    }

    pub async fn open_file(path: &Path) -> Result<(), CompressError> {
        if !path.exists() {
            return Err(CompressError::io(format!("{} does not exist", path.display())));
        }
        Self::launch(Self::open_command(path)).await
    }

    pub async fn reveal_in_file_browser(path: &Path) -> Result<(), CompressError> {
        if !path.exists() {
            return Err(CompressError::io(format!("{} does not exist", path.display())));
        }
        Self::launch(Self::reveal_command(path)).await
    }

    /// Get system information for debugging
    pub fn system_info() -> SystemInfo {
        SystemInfo {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            family: std::env::consts::FAMILY,
        }
    }
}

/// System information structure
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
}

impl std::fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.os, self.arch, self.family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_reveal_opens_parent_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("a.png");
        std::fs::write(&file, b"x").unwrap();

        let cmd = PlatformCommands::reveal_command(&file);
        assert_eq!(cmd.program, "xdg-open");
        assert_eq!(cmd.args, vec![temp.path().display().to_string()]);

        let open = PlatformCommands::open_command(&file);
        assert_eq!(open.args, vec![file.display().to_string()]);
    }

    #[tokio::test]
    async fn test_missing_path_is_io_error() {
        let missing = Path::new("/definitely/not/here.png");
        let err = PlatformCommands::open_file(missing).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Io);
        assert!(PlatformCommands::reveal_in_file_browser(missing).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_reaps_and_reports_exit_status() {
        let ok = OpenerCommand {
            program: "true",
            args: Vec::new(),
        };
        assert!(PlatformCommands::launch(ok).await.is_ok());

        let failing = OpenerCommand {
            program: "false",
            args: Vec::new(),
        };
        let err = PlatformCommands::launch(failing).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Client);
    }

    #[test]
    fn test_system_info() {
        let info = PlatformCommands::system_info();
        assert!(!info.os.is_empty());
        assert!(!info.arch.is_empty());
        assert!(!info.family.is_empty());
    }
}
