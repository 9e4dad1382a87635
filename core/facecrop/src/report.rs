use std::io::Write;
use std::sync::Mutex;

/// Sink for the human-readable progress lines of one pipeline invocation.
pub trait Reporter: Send + Sync {
    /// Emit one progress line.
    fn report(&self, line: &str);
}

/// Writes every line to standard output and flushes it immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    fn report(&self, line: &str) {
        let mut stdout = std::io::stdout().lock();
        // Nothing sensible to do if stdout is gone.
        let _ = writeln!(stdout, "{line}");
        let _ = stdout.flush();
    }
}

/// Collects lines in memory, for tests and embedding callers.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    lines: Mutex<Vec<String>>,
}

impl MemoryReporter {
    /// Create an empty reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines reported so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// `true` if any reported line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, line: &str) {
        log::trace!("{line}");
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

impl<R: Reporter + ?Sized> Reporter for std::sync::Arc<R> {
    fn report(&self, line: &str) {
        (**self).report(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_reporter_keeps_order() {
        let reporter = MemoryReporter::new();
        reporter.report("first");
        reporter.report("second");
        assert_eq!(reporter.lines(), vec!["first", "second"]);
        assert!(reporter.contains("sec"));
        assert!(!reporter.contains("third"));
    }
}
