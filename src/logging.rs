//! Tracing setup for the probe binary.
//!
//! Logs go to stderr unless a log file is given, so stdout stays free for the
//! report. A log file is rotated on every start (`probe.log` → `.1` → `.2` →
//! `.3`) and flushed after each line.

use std::path::Path;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::harness::HarnessError;

/// Rotated log files kept next to the current one.
const KEEP_ROTATED_LOGS: u32 = 3;

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "mcp_probe=info,warn";

/// Initialize the tracing subscriber.
///
/// `verbose` raises the default filter to debug; `RUST_LOG` still wins.
pub fn init_tracing(log_file: Option<&Path>, verbose: bool) -> Result<(), HarnessError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("mcp_probe=debug,warn")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    });

    let (writer, ansi) = match log_file {
        Some(path) => (BoxMakeWriter::new(open_log_file(path)?), false),
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_thread_ids(false)
        .try_init()
        .map_err(|e| HarnessError::LogSetup {
            path: log_file.map(|p| p.display().to_string()).unwrap_or_else(|| "stderr".into()),
            reason: e.to_string(),
        })?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = ?log_file.map(|p| p.display().to_string()),
        pid = std::process::id(),
        "=== mcp-probe starting ==="
    );

    Ok(())
}

/// Rotate, then open a fresh log file wrapped in a flushing writer.
fn open_log_file(path: &Path) -> Result<FlushingWriter, HarnessError> {
    let setup_error = |e: std::io::Error| HarnessError::LogSetup {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(setup_error)?;
    }

    rotate_log_file(path, KEEP_ROTATED_LOGS);

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(setup_error)?;

    Ok(FlushingWriter::new(file))
}

/// Rotate log files: `probe.log` → `probe.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    // Delete the oldest
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    // Shift: .{n-1} → .{n}
    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    // Current → .1
    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_rotate_shifts_and_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("probe.log");
        std::fs::write(&base, "current").unwrap();
        std::fs::write(dir.path().join("probe.log.1"), "one").unwrap();
        std::fs::write(dir.path().join("probe.log.3"), "three").unwrap();

        rotate_log_file(&base, 3);

        assert!(!base.exists());
        let read = |name: &str| std::fs::read_to_string(dir.path().join(name)).unwrap();
        assert_eq!(read("probe.log.1"), "current");
        assert_eq!(read("probe.log.2"), "one");
        assert!(!dir.path().join("probe.log.3").exists());
    }

    #[test]
    fn test_open_log_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/nested/probe.log");

        let mut writer = open_log_file(&path).unwrap();
        writer.write_all(b"line\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line\n");
    }
}
