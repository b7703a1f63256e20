// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Record framing for audit log files.
//!
//! A file is either newline-delimited extended JSON or back-to-back BSON
//! documents. The encoding is chosen from the first byte: `{` selects
//! JSON, anything else BSON.

use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom};

use tracing::trace;

use super::error::{LineError, ScanError};
use super::line::AuditLogLine;

/// Largest record the scanner accepts.
pub const MAX_DOCUMENT_SIZE: usize = 48 * 1024 * 1024;

/// Smallest valid BSON document: length prefix and terminator.
const MIN_BSON_DOCUMENT_SIZE: i32 = 5;

const BSON_LENGTH_PREFIX_SIZE: usize = 4;

/// On-disk encoding of an audit log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditLogFormat {
    Json,
    Bson,
}

impl std::fmt::Display for AuditLogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditLogFormat::Json => f.write_str("JSON"),
            AuditLogFormat::Bson => f.write_str("BSON"),
        }
    }
}

/// Peeks the first byte and rewinds the stream to offset 0.
pub fn detect_format<R: Read + Seek>(reader: &mut R) -> Result<AuditLogFormat, ScanError> {
    let mut first = [0u8; 1];
    let n = loop {
        match reader.read(&mut first) {
            Ok(n) => break n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    };
    if n == 0 {
        return Err(ScanError::NoBytesToRead);
    }

    let offset = reader
        .seek(SeekFrom::Start(0))
        .map_err(|e| ScanError::SeekNotAllowed(e.to_string()))?;
    if offset != 0 {
        return Err(ScanError::SeekNotAllowed(format!(
            "stream rewound to offset {} instead of 0",
            offset
        )));
    }

    Ok(if first[0] == b'{' {
        AuditLogFormat::Json
    } else {
        AuditLogFormat::Bson
    })
}

/// Restartable cursor over the records of an audit log.
///
/// `scan` advances to the next record and returns false at the end of the
/// stream or on the first framing error, which `err` then reports. Line
/// numbers are 1-based; in JSON files blank lines are skipped but counted.
pub struct AuditLogScanner<R> {
    reader: BufReader<R>,
    format: AuditLogFormat,
    buf: Vec<u8>,
    line_number: u64,
    max_document_size: usize,
    err: Option<ScanError>,
    done: bool,
}

impl<R: Read + Seek> AuditLogScanner<R> {
    /// Detects the encoding and positions the scanner before the first
    /// record.
    pub fn new(mut reader: R) -> Result<Self, ScanError> {
        let format = detect_format(&mut reader)?;
        Ok(Self {
            reader: BufReader::new(reader),
            format,
            buf: Vec::new(),
            line_number: 0,
            max_document_size: MAX_DOCUMENT_SIZE,
            err: None,
            done: false,
        })
    }
}

impl<R: Read> AuditLogScanner<R> {
    pub fn with_max_document_size(mut self, size: usize) -> Self {
        self.max_document_size = size;
        self
    }

    pub fn format(&self) -> AuditLogFormat {
        self.format
    }

    pub fn scan(&mut self) -> bool {
        if self.done {
            return false;
        }

        let result = match self.format {
            AuditLogFormat::Json => self.next_json(),
            AuditLogFormat::Bson => self.next_bson(),
        };

        match result {
            Ok(true) => {
                trace!(line = self.line_number, len = self.buf.len(), "Scanned record");
                true
            }
            Ok(false) => {
                self.done = true;
                false
            }
            Err(e) => {
                self.buf.clear();
                self.err = Some(e);
                self.done = true;
                false
            }
        }
    }

    /// The framing error that stopped the scan, if any.
    pub fn err(&self) -> Option<&ScanError> {
        self.err.as_ref()
    }

    pub fn take_err(&mut self) -> Option<ScanError> {
        self.err.take()
    }

    /// Raw bytes of the current record.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Decodes the current record.
    pub fn audit_log_line(&self) -> Result<AuditLogLine, LineError> {
        AuditLogLine::decode(&self.buf, self.format)
    }

    fn next_json(&mut self) -> Result<bool, ScanError> {
        loop {
            self.buf.clear();
            // Room for the record plus a CRLF terminator.
            let limit = self.max_document_size as u64 + 2;
            let n = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut self.buf)?;
            if n == 0 {
                return Ok(false);
            }
            self.line_number += 1;

            if self.buf.last() == Some(&b'\n') {
                self.buf.pop();
                if self.buf.last() == Some(&b'\r') {
                    self.buf.pop();
                }
            }
            if self.buf.len() > self.max_document_size {
                return Err(ScanError::DocumentTooLarge {
                    line: self.line_number,
                    length: self.buf.len(),
                    limit: self.max_document_size,
                });
            }

            if !self.buf.iter().all(u8::is_ascii_whitespace) {
                return Ok(true);
            }
        }
    }

    fn next_bson(&mut self) -> Result<bool, ScanError> {
        self.buf.clear();
        let got = (&mut self.reader)
            .take(BSON_LENGTH_PREFIX_SIZE as u64)
            .read_to_end(&mut self.buf)?;
        if got == 0 {
            return Ok(false);
        }
        self.line_number += 1;

        if got < BSON_LENGTH_PREFIX_SIZE {
            return Err(ScanError::TruncatedDocument {
                line: self.line_number,
                expected: BSON_LENGTH_PREFIX_SIZE,
                got,
            });
        }

        let length = i32::from_le_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        if length < MIN_BSON_DOCUMENT_SIZE {
            return Err(ScanError::InvalidDocumentLength {
                line: self.line_number,
                length,
            });
        }
        // Positive after the check above.
        let length = length as usize;
        if length > self.max_document_size {
            return Err(ScanError::DocumentTooLarge {
                line: self.line_number,
                length,
                limit: self.max_document_size,
            });
        }

        let remaining = (length - BSON_LENGTH_PREFIX_SIZE) as u64;
        let read = (&mut self.reader)
            .take(remaining)
            .read_to_end(&mut self.buf)?;
        if (read as u64) < remaining {
            return Err(ScanError::TruncatedDocument {
                line: self.line_number,
                expected: length,
                got: self.buf.len(),
            });
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const JSON_FIXTURE: &[u8] = include_bytes!("../../testdata/audit_log.json");
    const BSON_FIXTURE: &[u8] = include_bytes!("../../testdata/audit_log.bson");

    fn collect<R: Read + Seek>(scanner: &mut AuditLogScanner<R>) -> Vec<(u64, Vec<u8>)> {
        let mut records = Vec::new();
        while scanner.scan() {
            records.push((scanner.line_number(), scanner.bytes().to_vec()));
        }
        records
    }

    #[test]
    fn test_detect_format() {
        let mut json = Cursor::new(JSON_FIXTURE);
        assert_eq!(detect_format(&mut json).unwrap(), AuditLogFormat::Json);
        assert_eq!(json.position(), 0);

        let mut bson = Cursor::new(BSON_FIXTURE);
        assert_eq!(detect_format(&mut bson).unwrap(), AuditLogFormat::Bson);
        assert_eq!(bson.position(), 0);
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(
            AuditLogScanner::new(Cursor::new(Vec::<u8>::new())),
            Err(ScanError::NoBytesToRead)
        ));
    }

    struct BadSeek(Cursor<Vec<u8>>);

    impl Read for BadSeek {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Seek for BadSeek {
        fn seek(&mut self, _pos: SeekFrom) -> std::io::Result<u64> {
            Ok(1)
        }
    }

    #[test]
    fn test_seek_not_landing_at_start() {
        let reader = BadSeek(Cursor::new(b"{}".to_vec()));
        assert!(matches!(
            AuditLogScanner::new(reader),
            Err(ScanError::SeekNotAllowed(_))
        ));
    }

    #[test]
    fn test_scan_json_fixture() {
        let mut scanner = AuditLogScanner::new(Cursor::new(JSON_FIXTURE)).unwrap();
        assert_eq!(scanner.format(), AuditLogFormat::Json);
        let records = collect(&mut scanner);
        assert!(scanner.err().is_none());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, 1);
        assert_eq!(records[1].0, 2);
        assert!(records[0].1.starts_with(b"{\"ts\""));
        assert!(!records[1].1.ends_with(b"\n"));
    }

    #[test]
    fn test_scan_bson_fixture() {
        let mut scanner = AuditLogScanner::new(Cursor::new(BSON_FIXTURE)).unwrap();
        assert_eq!(scanner.format(), AuditLogFormat::Bson);
        let records = collect(&mut scanner);
        assert!(scanner.err().is_none());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].1.len(), 281);
        assert_eq!(records[1].1.len(), 371);
    }

    #[test]
    fn test_json_blank_lines_skipped_but_counted() {
        let input = b"{\"a\":1}\r\n\n   \n{\"b\":2}";
        let mut scanner = AuditLogScanner::new(Cursor::new(&input[..])).unwrap();
        let records = collect(&mut scanner);
        assert_eq!(
            records,
            vec![(1, b"{\"a\":1}".to_vec()), (4, b"{\"b\":2}".to_vec())]
        );
    }

    #[test]
    fn test_bson_truncated_document() {
        let input = &BSON_FIXTURE[..BSON_FIXTURE.len() - 10];
        let mut scanner = AuditLogScanner::new(Cursor::new(input)).unwrap();
        assert_eq!(collect(&mut scanner).len(), 1);
        assert!(matches!(
            scanner.err(),
            Some(ScanError::TruncatedDocument {
                line: 2,
                expected: 371,
                ..
            })
        ));
        assert!(!scanner.scan());
    }

    #[test]
    fn test_bson_truncated_prefix() {
        let mut input = BSON_FIXTURE[..281].to_vec();
        input.extend_from_slice(&[0x10, 0x00]);
        let mut scanner = AuditLogScanner::new(Cursor::new(input)).unwrap();
        assert_eq!(collect(&mut scanner).len(), 1);
        assert!(matches!(
            scanner.err(),
            Some(ScanError::TruncatedDocument { expected: 4, got: 2, .. })
        ));
    }

    #[test]
    fn test_bson_invalid_length() {
        let input = [0x02, 0x00, 0x00, 0x00, 0x00];
        let mut scanner = AuditLogScanner::new(Cursor::new(&input[..])).unwrap();
        assert!(!scanner.scan());
        assert!(matches!(
            scanner.err(),
            Some(ScanError::InvalidDocumentLength { line: 1, length: 2 })
        ));

        let negative = (-1i32).to_le_bytes();
        let mut scanner = AuditLogScanner::new(Cursor::new(&negative[..])).unwrap();
        assert!(!scanner.scan());
        assert!(matches!(
            scanner.err(),
            Some(ScanError::InvalidDocumentLength { length: -1, .. })
        ));
    }

    #[test]
    fn test_document_size_limit() {
        let mut scanner = AuditLogScanner::new(Cursor::new(BSON_FIXTURE))
            .unwrap()
            .with_max_document_size(300);
        assert!(scanner.scan());
        assert!(!scanner.scan());
        assert!(matches!(
            scanner.err(),
            Some(ScanError::DocumentTooLarge {
                length: 371,
                limit: 300,
                ..
            })
        ));

        let line = format!("{{\"log\":\"{}\"}}\n", "A".repeat(64));
        let mut scanner = AuditLogScanner::new(Cursor::new(line.into_bytes()))
            .unwrap()
            .with_max_document_size(32);
        assert!(!scanner.scan());
        assert!(matches!(scanner.err(), Some(ScanError::DocumentTooLarge { .. })));
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn scanning_arbitrary_bytes_never_panics(
                data in proptest::collection::vec(any::<u8>(), 1..2048)
            ) {
                let mut scanner = AuditLogScanner::new(Cursor::new(data)).unwrap();
                let mut count = 0;
                while scanner.scan() {
                    let _ = scanner.audit_log_line();
                    count += 1;
                    prop_assert!(count <= 2048);
                }
            }
        }
    }
}
