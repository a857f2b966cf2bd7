//! Advisory cross-process lock detection for the log file.
//!
//! There is no `flock` here; instead, before opening a log for writing we
//! scan `/proc/*/fd` (Linux only) for symlinks resolving to the log path.
//! Anything found belongs to some other process that already has the file
//! open, so we refuse rather than risk two writers interleaving appends.

use std::fs;
use std::path::Path;

/// Returns the PID of another process with `log_path` open, if any.
///
/// On non-Linux platforms this always returns `None`; the check is
/// advisory and best-effort in any case.
pub fn find_lock_holder(log_path: &Path) -> Option<u32> {
    #[cfg(target_os = "linux")]
    {
        let canonical = fs::canonicalize(log_path).ok();
        let target = canonical.as_deref().unwrap_or(log_path);
        let proc_dir = fs::read_dir("/proc").ok()?;
        let my_pid = std::process::id();

        for entry in proc_dir.flatten() {
            let pid: u32 = match entry.file_name().to_str().and_then(|s| s.parse().ok()) {
                Some(pid) => pid,
                None => continue,
            };
            if pid == my_pid {
                continue;
            }
            let fd_dir = entry.path().join("fd");
            let fds = match fs::read_dir(&fd_dir) {
                Ok(fds) => fds,
                Err(_) => continue,
            };
            for fd in fds.flatten() {
                if let Ok(link) = fs::read_link(fd.path()) {
                    if link == target {
                        return Some(pid);
                    }
                }
            }
        }
        None
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = log_path;
        None
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn does_not_flag_an_unopened_path() {
        assert!(find_lock_holder(Path::new("/tmp/definitely-not-open-anywhere")).is_none());
    }
}
