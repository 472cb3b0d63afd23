// oneval: Aggregation and Plotting of Anonymity Metrics from ONE Simulator Message Logs
// Copyright (C) 2024-2025 The oneval developers
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//! Transparent reading of plain or gzip-compressed simulation logs, and classification of log
//! lines by their fixed marker substrings.
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;

/// Marker announcing the parameter header of a new simulation run.
pub const RUN_HEADER_MARKER: &str = "Running simulation '";
/// Marker of a per-message lifecycle event.
pub const MSG_EVENT_MARKER: &str = "MSGINFO:";
/// Marker terminating a simulation run.
pub const RUN_END_MARKER: &str = "Simulation done in";
/// Marker separating runs in concatenated batch logs.
pub const RUN_BOUNDARY_MARKER: &str = "Run ";

/// Shape of a single log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    RunHeader,
    MsgEvent,
    RunEnd,
    /// Comments and any other informational output. Reported, never fatal.
    Other,
}

pub fn classify(line: &str) -> LineKind {
    if line.starts_with('#') {
        LineKind::Other
    } else if line.contains(RUN_HEADER_MARKER) {
        LineKind::RunHeader
    } else if line.contains(MSG_EVENT_MARKER) {
        LineKind::MsgEvent
    } else if line.contains(RUN_END_MARKER) {
        LineKind::RunEnd
    } else {
        LineKind::Other
    }
}

/// Open a line-oriented log file, decompressing transparently when the extension indicates a
/// gzipped log. I/O and decode failures propagate to the caller; there is no retry.
pub fn open_log(path: impl AsRef<Path>) -> io::Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(BufReader::new(
            file,
        )))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Lazily iterate the lines of a (possibly compressed) log file.
pub fn read_lines(path: impl AsRef<Path>) -> io::Result<impl Iterator<Item = io::Result<String>>> {
    Ok(open_log(path)?.lines())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn classify_lines() {
        assert_eq!(
            classify("Running simulation 'epidemic_scenario: seed=1; anongroups=1; movement=RandomWaypoint; hosts=10;'"),
            LineKind::RunHeader
        );
        assert_eq!(classify("MSGINFO: M3, created=84.0"), LineKind::MsgEvent);
        assert_eq!(classify("Simulation done in 124.5s"), LineKind::RunEnd);
        assert_eq!(classify("# scenario comment"), LineKind::Other);
        assert_eq!(classify("Message stats for scenario"), LineKind::Other);
    }

    #[test]
    fn read_plain_and_gzipped() {
        let dir = std::env::temp_dir();
        let plain = dir.join(format!("oneval_logfile_test_{}.log", std::process::id()));
        let gzipped = dir.join(format!("oneval_logfile_test_{}.log.gz", std::process::id()));

        std::fs::write(&plain, "first\nsecond\n").unwrap();
        let mut enc = flate2::write::GzEncoder::new(
            File::create(&gzipped).unwrap(),
            flate2::Compression::default(),
        );
        enc.write_all(b"first\nsecond\n").unwrap();
        enc.finish().unwrap();

        for path in [&plain, &gzipped] {
            let lines: Vec<String> = read_lines(path)
                .unwrap()
                .collect::<io::Result<_>>()
                .unwrap();
            assert_eq!(lines, vec!["first".to_string(), "second".to_string()]);
        }

        std::fs::remove_file(plain).unwrap();
        std::fs::remove_file(gzipped).unwrap();
    }

    #[test]
    fn missing_file_is_fatal() {
        assert!(open_log("/nonexistent/oneval.log").is_err());
    }
}
