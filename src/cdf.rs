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
//! Plot CDFs of the time messages spend encrypted, decrypted and in transit, per anonymity
//! group and movement model of a single experiment log, including the derived overhead lines.
use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use itertools::Itertools;
use plotly::common::DashType;

use oneval::aggregate::Aggregator;
use oneval::metrics::{add_overhead_buckets, cdf_points, interval_buckets, IntervalKind};
use oneval::plot::{self, CdfTrace};
use oneval::records::Movement;
use oneval::util::{self, SECONDS_PER_HOUR};

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Message log file (plain or gzipped).
    file: PathBuf,
    /// Overwrite the output path for figures.
    #[arg(short, long, default_value = "./plots/")]
    output_path: PathBuf,
    /// Save the generated figures as HTML files in the output path.
    #[arg(short, long)]
    save: bool,
    /// Do not show figures after rendering (useful for headless servers).
    #[arg(short = 'x', long)]
    no_show: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    util::init_logging();
    let args = Args::parse();

    let mut agg = Aggregator::new();
    agg.parse_file(&args.file)?;
    let runs = agg.finish();

    let mut buckets = interval_buckets(&runs);
    add_overhead_buckets(&mut buckets);

    // line styles cycle within a figure
    let dashes = [DashType::Dot, DashType::Dash, DashType::Solid];

    // one figure per (movement, interval kind), one line per group
    let figures: BTreeMap<(Movement, IntervalKind), Vec<_>> = buckets
        .into_iter()
        .filter(|(_, bucket)| !bucket.is_empty())
        .map(|(key, bucket)| ((key.movement, key.kind), (key, bucket)))
        .into_group_map()
        .into_iter()
        .collect();

    for ((movement, kind), mut entries) in figures {
        entries.sort_by_key(|(key, _)| key.groups);
        let traces = entries
            .iter()
            .enumerate()
            .map(|(i, (key, bucket))| {
                let hours: Vec<f64> =
                    bucket.values().map(|v| v / SECONDS_PER_HOUR).collect();
                let (xs, ys) = cdf_points(hours);
                CdfTrace::new(key.to_string(), xs, ys)
                    .dash(dashes[i % dashes.len()].clone())
            })
            .collect_vec();

        let figure = plot::cdf_figure(traces, "Time (simulated hours)");
        let name = format!("{movement}_{}CDF", kind.label());
        plot::emit(&figure, args.save, args.no_show, &args.output_path, &name)?;
    }

    Ok(())
}
