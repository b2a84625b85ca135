//! Process lifecycle helpers: PID file, liveness, detached spawn, and
//! bounded command execution.

use std::fs::OpenOptions;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Result, SentinelError};

const WAIT_POLL: Duration = Duration::from_millis(50);

pub fn is_pid_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    #[cfg(unix)]
    {
        unsafe { libc::kill(pid as i32, 0) == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Sends SIGTERM. Returns whether the signal was delivered.
pub fn terminate(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    #[cfg(unix)]
    {
        unsafe { libc::kill(pid as i32, libc::SIGTERM) == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

pub fn read_pid_file(path: &Path) -> Option<u32> {
    let content = std::fs::read_to_string(path).ok()?;
    content.trim().parse::<u32>().ok().filter(|pid| *pid > 0)
}

pub fn write_pid_file(path: &Path, pid: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent).map_err(|err| SentinelError::io("creating pid dir", err))?;
    }
    fs_err::write(path, pid.to_string()).map_err(|err| SentinelError::io("writing pid file", err))
}

pub fn remove_pid_file(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %err, path = %path.display(), "Failed to remove pid file");
        }
    }
}

/// PID from the PID file if that process is still running.
pub fn running_pid(pid_file: &Path) -> Option<u32> {
    read_pid_file(pid_file).filter(|pid| is_pid_alive(*pid))
}

#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_command: &mut Command) {}

fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        // Negative pid targets the whole group the child leads.
        unsafe {
            libc::kill(-(child.id() as i32), libc::SIGKILL);
        }
    }
    let _ = child.kill();
}

/// Starts `exe args...` in its own process group with output appended to
/// `log_path`. The child is reaped in the background.
pub fn spawn_detached(exe: &Path, args: &[&str], log_path: &Path) -> Result<u32> {
    if let Some(parent) = log_path.parent() {
        fs_err::create_dir_all(parent).map_err(|err| SentinelError::io("creating log dir", err))?;
    }
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|err| SentinelError::io(format!("opening {}", log_path.display()), err))?;
    let log_err = log
        .try_clone()
        .map_err(|err| SentinelError::io("duplicating log handle", err))?;

    let mut command = Command::new(exe);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err));
    own_process_group(&mut command);

    let mut child = command.spawn().map_err(|err| SentinelError::CommandFailed {
        command: exe.display().to_string(),
        details: err.to_string(),
    })?;
    let pid = child.id();
    thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(pid)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Runs a command to completion with a hard wall-clock limit.
///
/// On expiry the child's whole process group is killed. A non-zero exit
/// becomes `CommandFailed` carrying stderr (or stdout when stderr is empty).
pub fn run_with_timeout(exe: &Path, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    let label = args
        .first()
        .map(|arg| arg.to_string())
        .unwrap_or_else(|| exe.display().to_string());

    let mut command = Command::new(exe);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    own_process_group(&mut command);

    let mut child = command.spawn().map_err(|err| SentinelError::CommandFailed {
        command: label.clone(),
        details: err.to_string(),
    })?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                kill_tree(&mut child);
                let _ = child.wait();
                return Err(SentinelError::CommandTimeout {
                    command: label,
                    seconds: timeout.as_secs(),
                });
            }
            Ok(None) => thread::sleep(WAIT_POLL),
            Err(err) => {
                kill_tree(&mut child);
                return Err(SentinelError::io(format!("waiting for {}", label), err));
            }
        }
    };

    let output = CommandOutput {
        stdout: stdout.join().unwrap_or_default().trim().to_string(),
        stderr: stderr.join().unwrap_or_default().trim().to_string(),
    };

    if !status.success() {
        let detail = if output.stderr.is_empty() {
            &output.stdout
        } else {
            &output.stderr
        };
        let exit = status
            .code()
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return Err(SentinelError::CommandFailed {
            command: label,
            details: format!("exit={}. {}", exit, detail).trim().to_string(),
        });
    }

    Ok(output)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sh() -> &'static Path {
        Path::new("/bin/sh")
    }

    #[test]
    fn own_pid_is_alive() {
        assert!(is_pid_alive(std::process::id()));
        assert!(!is_pid_alive(0));
    }

    #[test]
    fn pid_file_round_trip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("sentinel.pid");
        assert_eq!(read_pid_file(&path), None);

        write_pid_file(&path, 4321).unwrap();
        assert_eq!(read_pid_file(&path), Some(4321));

        remove_pid_file(&path);
        assert!(!path.exists());
        remove_pid_file(&path);
    }

    #[test]
    fn garbage_pid_file_reads_as_none() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("sentinel.pid");
        std::fs::write(&path, "abc").unwrap();

        assert_eq!(read_pid_file(&path), None);
        assert_eq!(running_pid(&path), None);
    }

    #[test]
    fn captures_stdout() {
        let output = run_with_timeout(sh(), &["-c", "echo hello"], Duration::from_secs(5)).unwrap();
        assert_eq!(output.stdout, "hello");
    }

    #[test]
    fn nonzero_exit_reports_stderr() {
        let err = run_with_timeout(sh(), &["-c", "echo oops >&2; exit 3"], Duration::from_secs(5))
            .unwrap_err();

        match err {
            SentinelError::CommandFailed { details, .. } => {
                assert!(details.contains("exit=3"), "{}", details);
                assert!(details.contains("oops"), "{}", details);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn slow_command_times_out() {
        let started = Instant::now();
        let err = run_with_timeout(sh(), &["-c", "sleep 5"], Duration::from_millis(300)).unwrap_err();

        assert!(matches!(err, SentinelError::CommandTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn detached_child_writes_to_log() {
        let temp = tempdir().unwrap();
        let log = temp.path().join("logs").join("watch.log");

        let pid = spawn_detached(sh(), &["-c", "echo detached"], &log).unwrap();
        assert!(pid > 0);

        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if std::fs::read_to_string(&log).unwrap_or_default().contains("detached") {
                return;
            }
            thread::sleep(Duration::from_millis(50));
        }
        panic!("detached child output never reached the log");
    }
}
