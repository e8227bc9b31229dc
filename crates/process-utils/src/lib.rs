//! Small process-related helpers shared across the workspace.

use std::ffi::OsStr;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

#[cfg(feature = "tokio")]
impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `tokio::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
#[cfg(feature = "tokio")]
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd
}

/// Ask a running child to stop gracefully.
///
/// On unix this delivers `SIGINT`, which recorders such as yt-dlp and ffmpeg
/// treat as "finish the current file and exit". Other platforms have no
/// equivalent for console-less children, so the process is terminated.
///
/// Returns `Ok(false)` if the child has already been reaped.
#[cfg(feature = "tokio")]
pub fn interrupt(child: &mut tokio::process::Child) -> std::io::Result<bool> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let Some(pid) = child.id() else {
            return Ok(false);
        };
        let pid = i32::try_from(pid)
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid overflow"))?;

        match kill(Pid::from_raw(pid), Signal::SIGINT) {
            Ok(()) => Ok(true),
            Err(nix::errno::Errno::ESRCH) => Ok(false),
            Err(errno) => Err(std::io::Error::from(errno)),
        }
    }

    #[cfg(not(unix))]
    {
        if child.id().is_none() {
            return Ok(false);
        }
        child.start_kill()?;
        Ok(true)
    }
}

#[cfg(all(test, unix, feature = "tokio"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_interrupt_stops_sleeping_child() {
        let mut child = tokio_command("sleep").arg("30").spawn().unwrap();

        assert!(interrupt(&mut child).unwrap());
        let status = child.wait().await.unwrap();
        assert!(!status.success());

        // Reaped children report no pid and are not signalled again.
        assert!(!interrupt(&mut child).unwrap());
    }
}
