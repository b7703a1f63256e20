// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Per-line output of a decrypt run.

use std::io::{self, Write};

use bson::{Bson, Document};

use super::error::LineError;

/// Receives exactly one entry per reported line.
///
/// A failed write stops the run; line-level failures never do.
pub trait OutputSink {
    /// A decrypted document.
    fn document(&mut self, line: u64, document: Document) -> io::Result<()>;

    /// A skipped line that is not an error, such as an orphaned record.
    fn warning(&mut self, line: u64, message: &str) -> io::Result<()>;

    fn error(&mut self, line: u64, error: &LineError) -> io::Result<()>;
}

/// Renders a document as relaxed extended JSON, keeping field order.
pub fn to_relaxed_json(document: Document) -> String {
    Bson::Document(document).into_relaxed_extjson().to_string()
}

/// Writes documents as JSON lines and diagnostics as
/// `Error: line N: ...` / `Warning: line N: ...`.
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputSink for WriterSink<W> {
    fn document(&mut self, _line: u64, document: Document) -> io::Result<()> {
        writeln!(self.writer, "{}", to_relaxed_json(document))
    }

    fn warning(&mut self, line: u64, message: &str) -> io::Result<()> {
        writeln!(self.writer, "Warning: line {}: {}", line, message)
    }

    fn error(&mut self, line: u64, error: &LineError) -> io::Result<()> {
        writeln!(self.writer, "Error: line {}: {}", line, error)
    }
}

/// One recorded sink entry.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEntry {
    Document { line: u64, document: Document },
    Warning { line: u64, message: String },
    Error { line: u64, message: String },
}

/// Collects entries in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub entries: Vec<OutputEntry>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> Vec<&Document> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                OutputEntry::Document { document, .. } => Some(document),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<(u64, &str)> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                OutputEntry::Warning { line, message } => Some((*line, message.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<(u64, &str)> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                OutputEntry::Error { line, message } => Some((*line, message.as_str())),
                _ => None,
            })
            .collect()
    }
}

impl OutputSink for MemorySink {
    fn document(&mut self, line: u64, document: Document) -> io::Result<()> {
        self.entries.push(OutputEntry::Document { line, document });
        Ok(())
    }

    fn warning(&mut self, line: u64, message: &str) -> io::Result<()> {
        self.entries.push(OutputEntry::Warning {
            line,
            message: message.to_string(),
        });
        Ok(())
    }

    fn error(&mut self, line: u64, error: &LineError) -> io::Result<()> {
        self.entries.push(OutputEntry::Error {
            line,
            message: error.to_string(),
        });
        Ok(())
    }
}
