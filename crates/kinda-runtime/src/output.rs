//! Output sinks for `~sorta print`

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Destination for printed lines
pub trait OutputSink: Send + fmt::Debug {
    fn emit(&mut self, line: &str);
}

/// Writes lines to standard output
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&mut self, line: &str) {
        let mut out = io::stdout().lock();
        // A closed stdout is not the program's problem
        let _ = writeln!(out, "{line}");
    }
}

/// Collects lines in memory; clones share the same buffer
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl OutputSink for MemorySink {
    fn emit(&mut self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}
