//! Cross-platform process spawning helpers.
//!
//! Every ffmpeg/ffprobe invocation goes through [`configure_command`] so a
//! GUI host on Windows never flashes a console window. Capture processes
//! additionally go through [`detach_command`] so they outlive the caller and
//! can be killed as a tree.

use std::process::Command;

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;
#[cfg(target_os = "windows")]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Apply platform-specific flags to a command.
pub fn configure_command(cmd: &mut Command) {
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}

/// Configure a command to run detached from the caller: no console, its
/// own process group, and no inherited stdio.
pub fn detach_command(cmd: &mut Command) {
    use std::process::Stdio;

    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(CREATE_NO_WINDOW | CREATE_NEW_PROCESS_GROUP);
    }
}

/// Forcefully terminate a process and every child it spawned.
///
/// Returns `true` if a kill signal was delivered to anything.
pub fn kill_process_tree(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        if pid <= 1 {
            return false;
        }
        // SAFETY: kill(2) has no memory-safety preconditions. A negative pid
        // targets the process group led by `pid`.
        let group = unsafe { libc::kill(-pid, libc::SIGKILL) } == 0;
        // SAFETY: as above, for the single process.
        let single = unsafe { libc::kill(pid, libc::SIGKILL) } == 0;
        group || single
    }
    #[cfg(target_os = "windows")]
    {
        let mut cmd = Command::new("taskkill");
        cmd.args(["/PID", &pid.to_string(), "/T", "/F"]);
        configure_command(&mut cmd);
        cmd.output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
    #[cfg(not(any(unix, target_os = "windows")))]
    {
        let _ = pid;
        false
    }
}

/// Whether a process with this PID currently exists.
pub fn process_exists(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        if pid <= 0 {
            return false;
        }
        // SAFETY: signal 0 performs only the existence/permission check.
        let rc = unsafe { libc::kill(pid, 0) };
        rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
    #[cfg(target_os = "windows")]
    {
        let mut cmd = Command::new("tasklist");
        cmd.args(["/FI", &format!("PID eq {pid}"), "/NH", "/FO", "CSV"]);
        configure_command(&mut cmd);
        cmd.output()
            .map(|output| String::from_utf8_lossy(&output.stdout).contains(&format!("\"{pid}\"")))
            .unwrap_or(false)
    }
    #[cfg(not(any(unix, target_os = "windows")))]
    {
        let _ = pid;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_configuration_is_idempotent() {
        let mut cmd = Command::new("echo");
        configure_command(&mut cmd);
        configure_command(&mut cmd);
    }

    #[cfg(unix)]
    #[test]
    fn kill_process_tree_terminates_detached_child() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        detach_command(&mut cmd);
        let mut child = cmd.spawn().expect("sleep should spawn");
        let pid = child.id();

        assert!(process_exists(pid));
        assert!(kill_process_tree(pid));

        let status = child.wait().expect("child should be reaped");
        assert!(!status.success());
        assert!(!process_exists(pid));
    }

    #[test]
    fn kill_refuses_init_and_invalid_pids() {
        assert!(!kill_process_tree(0));
        #[cfg(unix)]
        assert!(!kill_process_tree(1));
    }
}
