use std::process::Command;

use tracing::info;

use super::error::SuspendError;

/// OS power-suspend action. Blocking; callers run it off the async workers.
pub trait SuspendInvoker: Send + Sync + 'static {
    fn suspend(&self) -> Result<(), SuspendError>;
}

/// Suspends the host through the platform's power tooling
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSuspend;

impl SystemSuspend {
    fn command() -> Result<(&'static str, &'static [&'static str]), SuspendError> {
        match std::env::consts::OS {
            "linux" => Ok(("systemctl", &["suspend"])),
            "windows" => Ok(("rundll32.exe", &["powrprof.dll,SetSuspendState", "0,1,0"])),
            "macos" => Ok(("pmset", &["sleepnow"])),
            other => Err(SuspendError::Unsupported(other)),
        }
    }
}

impl SuspendInvoker for SystemSuspend {
    fn suspend(&self) -> Result<(), SuspendError> {
        let (program, args) = Self::command()?;
        let rendered = format!("{} {}", program, args.join(" "));
        info!("Running {}", rendered);

        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| SuspendError::Spawn {
                command: rendered.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(SuspendError::Failed {
                command: rendered,
                status: status.to_string(),
            })
        }
    }
}
