//! PID-file bookkeeping for long-running playback commands.
//!
//! Playback commands write `/tmp/linx.pid` so a later `linx kill` can stop
//! them. There is no fork here: backgrounding belongs to the shell or a
//! service manager, this module only keeps the PID file honest.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

/// Well-known PID file location.
pub const PID_FILE: &str = "/tmp/linx.pid";

/// RAII guard around the PID file: written on create, removed on drop.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn create() -> io::Result<PidFile> {
        Self::create_at(PathBuf::from(PID_FILE))
    }

    fn create_at(path: PathBuf) -> io::Result<PidFile> {
        fs::write(&path, process::id().to_string())?;
        Ok(PidFile { path })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Stop the process named in the PID file: SIGTERM, wait up to 2 s,
/// escalate to SIGKILL. Returns whether a PID file was found.
pub fn kill_running() -> io::Result<bool> {
    kill_at(PID_FILE)
}

fn kill_at(path: &str) -> io::Result<bool> {
    let Ok(text) = fs::read_to_string(path) else {
        return Ok(false);
    };
    let Ok(pid) = text.trim().parse::<i32>() else {
        // Stale garbage; clean it up.
        let _ = fs::remove_file(path);
        return Ok(false);
    };

    #[cfg(unix)]
    signal_and_wait(pid);

    let _ = fs::remove_file(path);
    Ok(true)
}

#[cfg(unix)]
fn signal_and_wait(pid: i32) {
    // SAFETY: kill(2) with a parsed pid is always safe to call; a stale
    // pid at worst returns ESRCH.
    let alive = |pid| unsafe { libc::kill(pid, 0) == 0 };
    unsafe {
        if libc::kill(pid, libc::SIGTERM) != 0 {
            println!("Process already stopped (stale PID {pid})");
            return;
        }
    }
    for _ in 0..20 {
        thread::sleep(Duration::from_millis(100));
        if !alive(pid) {
            println!("Stopped linx process (PID {pid})");
            return;
        }
    }
    unsafe {
        let _ = libc::kill(pid, libc::SIGKILL);
    }
    println!("Killed unresponsive linx process (PID {pid})");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_file_written_and_removed() {
        let dir = std::env::temp_dir().join(format!("linx-test-{}", process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("linx.pid");

        let guard = PidFile::create_at(path.clone()).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, process::id().to_string());

        drop(guard);
        assert!(!path.exists(), "PID file removed on drop");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn kill_without_pid_file_reports_none() {
        assert!(!kill_at("/nonexistent/dir/linx.pid").unwrap());
    }

    #[test]
    fn kill_cleans_up_garbage_pid_file() {
        let dir = std::env::temp_dir().join(format!("linx-test-garbage-{}", process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("linx.pid");
        fs::write(&path, "not a pid").unwrap();

        assert!(!kill_at(path.to_str().unwrap()).unwrap());
        assert!(!path.exists(), "garbage PID file removed");
        let _ = fs::remove_dir_all(&dir);
    }
}
