//! Running the tmux binary under a deadline

use super::error::TmuxError;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// How often a running child is checked for completion
const WAIT_STEP: Duration = Duration::from_millis(5);

/// Run `bin args...`, returning stdout. The child is killed once `timeout` passes.
pub fn run(bin: &Path, args: &[&str], timeout: Duration) -> Result<String, TmuxError> {
    let command = args.first().copied().unwrap_or_default().to_string();

    let mut child = Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| TmuxError::Spawn {
            command: command.clone(),
            source,
        })?;

    // Drain both pipes on their own threads so a chatty child never blocks on a full pipe
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let stdout_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(pipe) = stdout.as_mut() {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    });
    let stderr_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr.as_mut() {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    });

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(source) => {
                let _ = child.kill();
                return Err(TmuxError::Spawn { command, source });
            }
        }

        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            log::warn!("tmux {} killed after {:?}", command, timeout);
            return Err(TmuxError::Timeout { command, timeout });
        }

        thread::sleep(WAIT_STEP);
    };

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    if !status.success() {
        return Err(TmuxError::Failed {
            command,
            stderr: String::from_utf8_lossy(&stderr_bytes).trim().to_string(),
            status: status.code(),
        });
    }

    Ok(String::from_utf8_lossy(&stdout_bytes).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_stdout() {
        let script = "printf 'a\\tb\\n'";
        let out = run(Path::new("/bin/sh"), &["-c", script], Duration::from_secs(2)).unwrap();
        assert_eq!(out, "a\tb\n");
    }

    #[test]
    fn test_run_reports_stderr_on_failure() {
        let err = run(
            Path::new("/bin/sh"),
            &["-c", "echo 'no server running on /tmp/x' >&2; exit 1"],
            Duration::from_secs(2),
        )
        .unwrap_err();
        assert!(err.is_no_server());
        assert!(matches!(err, TmuxError::Failed { status: Some(1), .. }));
    }

    #[test]
    fn test_run_times_out() {
        let start = Instant::now();
        let timeout = Duration::from_millis(100);
        let err = run(Path::new("/bin/sh"), &["-c", "sleep 5"], timeout).unwrap_err();
        assert!(matches!(err, TmuxError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
