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
//! Plot the CDF of the euclidean distance between source and destination at decryption time,
//! over all messages of one log.
use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;

use oneval::logfile::{classify, read_lines, LineKind};
use oneval::parser::{Action, MsgEvent};
use oneval::plot::{self, CdfTrace};
use oneval::util;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Message log file (plain or gzipped).
    file: PathBuf,
    /// Overwrite the output path for figures.
    #[arg(short, long, default_value = "./plots/")]
    output_path: PathBuf,
    /// Save the generated figure as an HTML file in the output path.
    #[arg(short, long)]
    save: bool,
    /// Do not show the figure after rendering (useful for headless servers).
    #[arg(short = 'x', long)]
    no_show: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    util::init_logging();
    let args = Args::parse();

    // distances per message id, last write wins
    let mut distances: HashMap<String, f64> = HashMap::new();
    for line in read_lines(&args.file)? {
        let line = line?;
        if classify(&line) != LineKind::MsgEvent {
            continue;
        }
        let event = MsgEvent::parse(&line)?;
        if event.action == Action::Euclidean {
            distances.insert(event.id, event.value);
        }
    }

    let (xs, ys) = distance_cdf(distances.into_values().collect());
    let figure = plot::cdf_figure(
        vec![CdfTrace::new("euclidean distance", xs, ys)],
        "Euclidean Distance (meters)",
    );
    plot::emit(
        &figure,
        args.save,
        args.no_show,
        &args.output_path,
        "EuclideanDistanceCDF",
    )?;

    Ok(())
}

/// Sorted distances with cumulative fractions, anchored at the (0, 0) origin and reaching 1.
fn distance_cdf(mut values: Vec<f64>) -> (Vec<f64>, Vec<f64>) {
    values.sort_by(f64::total_cmp);
    let n = values.len() as f64;
    let mut xs = vec![0.0];
    let mut ys = vec![0.0];
    for (i, v) in values.into_iter().enumerate() {
        xs.push(v);
        ys.push((i + 1) as f64 / n);
    }
    (xs, ys)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn anchored_at_origin_and_reaches_one() {
        let (xs, ys) = distance_cdf(vec![300.0, 100.0, 200.0, 400.0]);
        assert_eq!(xs, vec![0.0, 100.0, 200.0, 300.0, 400.0]);
        assert_eq!(ys, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }
}
