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
//! Aggregate several simulation logs and plot the mean delivery, decryption, overhead and
//! distance metrics with 95% confidence intervals, one figure per movement model and metric.
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Serialize;

use oneval::metrics::{self, MeanResults};
use oneval::records::GROUPS_RANDOM_PIVOT;
use oneval::{aggregate, plot, util};

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Simulation log files to aggregate (plain or gzipped).
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Overwrite the output path for figures and raw data.
    #[arg(short, long, default_value = "./plots/")]
    output_path: PathBuf,
    /// Concurrently parse the files using N workers (N < 1 for the available core count).
    #[arg(short, long, default_value_t = 1)]
    parallel: i64,
    /// Save the generated figures as HTML files in the output path.
    #[arg(short, long)]
    save: bool,
    /// Do not show figures after rendering (useful for headless servers).
    #[arg(short = 'x', long)]
    no_show: bool,
}

/// Raw series points as written next to the figures.
#[derive(Debug, Serialize)]
struct RawPoint {
    movement: String,
    metric: String,
    group: String,
    node: f64,
    mean: f64,
    ci_delta: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    util::init_logging();

    let args = Args::parse();
    let workers = if args.parallel < 1 {
        num_cpus::get()
    } else {
        args.parallel as usize
    };

    let runs = aggregate::parse_files(&args.files, workers)?;
    log::info!("parsed {} runs from {} files", runs.len(), args.files.len());

    if let Some(hours) = metrics::grand_mean_baseline_delivery(&runs) {
        log::info!("grand mean baseline message delivery time without anonymity: {hours:.3} h");
    }

    let results = metrics::derive_mean_results(&runs)?;

    fs::create_dir_all(&args.output_path)?;
    write_raw_points(&results, &args.output_path)?;

    for (movement, metrics_map) in &results.by_movement {
        for (metric, groups) in metrics_map {
            if groups.values().all(|s| s.is_empty()) {
                continue;
            }
            let figure = plot::errorbar_figure(*metric, groups);
            plot::emit(
                &figure,
                args.save,
                args.no_show,
                &args.output_path,
                &plot::figure_name(*movement, *metric),
            )?;
        }
    }

    Ok(())
}

/// Dump all derived points to a CSV file so the figures can be reproduced elsewhere.
fn write_raw_points(results: &MeanResults, out_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let path = out_dir.join("mean_results.csv");
    let mut csv = csv::WriterBuilder::new().has_headers(true).from_writer(
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?,
    );

    for (movement, metrics_map) in &results.by_movement {
        for (metric, groups) in metrics_map {
            for (group, series) in groups {
                let group = if *group == GROUPS_RANDOM_PIVOT {
                    "pivot".to_string()
                } else {
                    group.to_string()
                };
                for ((x, y), err) in series.xs.iter().zip(&series.ys).zip(&series.errs) {
                    csv.serialize(RawPoint {
                        movement: movement.to_string(),
                        metric: metric.label().to_string(),
                        group: group.clone(),
                        node: *x,
                        mean: *y,
                        ci_delta: *err,
                    })?;
                }
            }
        }
    }
    csv.flush()?;
    log::debug!("raw mean results written to {path:?}");
    Ok(())
}
