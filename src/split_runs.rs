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
//! Split a concatenated batch log into one file per run, cutting at the run boundary markers.
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;

use oneval::logfile::{read_lines, RUN_BOUNDARY_MARKER};
use oneval::util;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Concatenated batch log (plain or gzipped).
    file: PathBuf,
    /// Prefix of the generated per-run files; the run number is appended.
    #[arg(short, long, default_value = "parsed_data_")]
    prefix: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    util::init_logging();
    let args = Args::parse();

    let count = split_runs(read_lines(&args.file)?, &args.prefix)?;
    log::info!("wrote {count} run files with prefix {}", args.prefix);

    Ok(())
}

/// Write the lines between run boundary markers to numbered `<prefix><n>` files. Marker lines
/// themselves are echoed, not written; anything before the first marker is discarded with the
/// first run's file. Returns the number of the last run file.
fn split_runs(
    lines: impl Iterator<Item = io::Result<String>>,
    prefix: &str,
) -> io::Result<usize> {
    let mut counter = 1usize;
    let mut output = BufWriter::new(File::create(format!("{prefix}{counter}"))?);
    for line in lines {
        let line = line?;
        if line.contains(RUN_BOUNDARY_MARKER) {
            println!("{line}");
            output.flush()?;
            output = BufWriter::new(File::create(format!("{prefix}{counter}"))?);
            counter += 1;
        } else {
            writeln!(output, "{line}")?;
        }
    }
    output.flush()?;
    Ok(counter.saturating_sub(1).max(1))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn one_file_per_marker() {
        let dir = std::env::temp_dir().join(format!("oneval_split_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let prefix = format!("{}/run_", dir.display());

        let lines = [
            "preamble",
            "Run 1 of 2",
            "MSGINFO: M1, created=1.0",
            "Run 2 of 2",
            "MSGINFO: M2, created=2.0",
        ]
        .into_iter()
        .map(|l| Ok(l.to_string()));

        let count = split_runs(lines, &prefix).unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            std::fs::read_to_string(format!("{prefix}1")).unwrap(),
            "MSGINFO: M1, created=1.0\n"
        );
        assert_eq!(
            std::fs::read_to_string(format!("{prefix}2")).unwrap(),
            "MSGINFO: M2, created=2.0\n"
        );

        std::fs::remove_dir_all(dir).unwrap();
    }
}
