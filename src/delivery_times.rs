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
//! Plot the delivery-time CDF of one or more message logs. Parsed series can be exported to a
//! gzipped CSV and re-imported later, to avoid re-parsing large logs when re-graphing.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use log::LevelFilter;
use rayon::prelude::*;

use oneval::export::{export_series, import_series, XySeries};
use oneval::logfile::{classify, read_lines, LineKind};
use oneval::metrics::cdf_points;
use oneval::parser::{Action, MsgEvent, ParseError};
use oneval::plot::{self, CdfTrace};
use oneval::records::MessageRecord;
use oneval::util::{self, SECONDS_PER_HOUR};

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Message log files to parse (not needed when importing with -i).
    #[arg(required_unless_present = "import")]
    files: Vec<PathBuf>,
    /// Concurrently parse the files using N workers (N < 1 for the available core count).
    #[arg(short, long, default_value_t = 1)]
    parallel: i64,
    /// Export the parsed series to a gzipped csv FILENAME that can later be re-imported with -i.
    #[arg(short, long)]
    export: Option<PathBuf>,
    /// Import series from a gzipped csv FILENAME exported with -e, instead of parsing logs.
    #[arg(short, long)]
    import: Option<PathBuf>,
    /// Log file of the non-anonymized baseline experiment, used to compute the overhead CDF.
    #[arg(long)]
    baseline: Option<PathBuf>,
    /// Save the generated figure as an HTML file in the current directory.
    #[arg(short, long)]
    save: bool,
    /// Do not show the figure after rendering (useful for headless servers).
    #[arg(short = 'x', long)]
    no_show: bool,
    /// Verbosely log progress.
    #[arg(short, long)]
    verbose: bool,
}

fn ensure_gz(path: &Path, what: &str) {
    if !path.extension().is_some_and(|ext| ext == "gz") {
        Args::command()
            .error(
                ErrorKind::ValueValidation,
                format!("please specify a .gz filename for the gzipped {what}"),
            )
            .exit();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    util::init_logging_with_level(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    if let Some(path) = &args.export {
        ensure_gz(path, "export");
    }
    if let Some(path) = &args.import {
        ensure_gz(path, "import");
    }

    let mut series: Vec<XySeries>;
    let mut labels: Vec<String>;

    if let Some(path) = &args.import {
        log::debug!("importing series from an already parsed file");
        series = import_series(path)?;
        labels = (1..=series.len()).map(|i| format!("series {i}")).collect();
        if args.baseline.is_some() {
            log::warn!("overhead needs message ids and cannot be computed from imported series");
        }
    } else {
        log::debug!("parsing {} files with {} workers", args.files.len(), args.parallel);
        let messages = collect_all(&args.files, args.parallel)?;
        series = messages.iter().map(delivery_cdf).collect();
        labels = args
            .files
            .iter()
            .map(|p| p.file_stem().unwrap_or_default().to_string_lossy().to_string())
            .collect();

        if let Some(path) = &args.baseline {
            let base = collect_messages(path)?;
            // all anonymized messages, pooled over the input files
            let mut anon = HashMap::new();
            for map in messages {
                anon.extend(map);
            }
            let (values, not_found) = overhead_values(&anon, &base);
            log::info!("{not_found} total +- messages delivered with anonymity but not in the baseline");
            series.push(cdf_points(
                values.into_iter().map(|v| v / SECONDS_PER_HOUR).collect(),
            ));
            labels.push("overhead".to_string());
        }
    }

    if let Some(path) = &args.export {
        log::debug!("exporting series to {path:?}");
        export_series(path, &series)?;
    }

    let traces = series
        .into_iter()
        .zip(labels)
        .map(|((xs, ys), label)| CdfTrace::new(label, xs, ys).width(3.0))
        .collect();
    let figure = plot::cdf_figure(traces, "Time (h)");
    plot::emit(&figure, args.save, args.no_show, Path::new("."), "data_graph")?;

    Ok(())
}

/// Collect the message records of one log file. Runs are not distinguished here; every
/// `MSGINFO:` line contributes to one flat per-message map, last write wins.
fn collect_messages(path: impl AsRef<Path>) -> Result<HashMap<String, MessageRecord>, ParseError> {
    let mut messages: HashMap<String, MessageRecord> = HashMap::new();
    for line in read_lines(path)? {
        let line = line?;
        if classify(&line) != LineKind::MsgEvent {
            log::debug!("not consumed: {line}");
            continue;
        }
        let event = MsgEvent::parse(&line)?;
        let record = messages.entry(event.id).or_default();
        match event.action {
            Action::Created => record.created = event.value,
            Action::Decrypted => record.decrypted = event.value,
            Action::Delivered => record.delivered = event.value,
            Action::Euclidean => record.euclidean = event.value,
        }
    }
    Ok(messages)
}

/// Parse all files, with a fixed-size worker pool when more than one worker is requested.
fn collect_all(
    paths: &[PathBuf],
    parallel: i64,
) -> Result<Vec<HashMap<String, MessageRecord>>, ParseError> {
    let workers = if parallel < 1 {
        num_cpus::get()
    } else {
        parallel as usize
    };
    if workers > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;
        pool.install(|| paths.par_iter().map(collect_messages).collect())
    } else {
        paths.iter().map(collect_messages).collect()
    }
}

/// Delivery times of all delivered messages in hours, as cumulative-fraction points.
fn delivery_cdf(messages: &HashMap<String, MessageRecord>) -> XySeries {
    cdf_points(
        messages
            .values()
            .filter_map(MessageRecord::total_delivery_time)
            .map(|t| t / SECONDS_PER_HOUR)
            .collect(),
    )
}

/// Per-message overhead versus the baseline: baseline total delivery time minus the anonymized
/// decrypted-state time, over the messages present in both. Also returns the signed count of
/// unmatched messages.
fn overhead_values(
    anon: &HashMap<String, MessageRecord>,
    base: &HashMap<String, MessageRecord>,
) -> (Vec<f64>, i64) {
    let mut values = Vec::new();
    let mut not_found: i64 = 0;
    for (id, m) in anon {
        let Some(decrypted_state) = m.time_decrypted_state() else {
            continue;
        };
        match base.get(id).and_then(MessageRecord::total_delivery_time) {
            Some(total) => values.push(total - decrypted_state),
            None => not_found += 1,
        }
    }
    not_found -= base
        .iter()
        .filter(|(id, n)| {
            n.total_delivery_time().is_some()
                && !anon.get(*id).is_some_and(|m| m.time_decrypted_state().is_some())
        })
        .count() as i64;
    (values, not_found)
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(created: f64, decrypted: f64, delivered: f64) -> MessageRecord {
        MessageRecord {
            created,
            decrypted,
            delivered,
            euclidean: 0.0,
        }
    }

    #[test]
    fn delivery_cdf_in_hours() {
        let messages = HashMap::from([
            ("M1".to_string(), record(0.0, 0.0, 3600.0)),
            ("M2".to_string(), record(0.0, 0.0, 7200.0)),
            ("M3".to_string(), record(5.0, 0.0, 0.0)),
        ]);
        let (xs, ys) = delivery_cdf(&messages);
        assert_eq!(xs, vec![1.0, 2.0]);
        assert_eq!(ys, vec![0.0, 0.5]);
    }

    #[test]
    fn overhead_against_baseline() {
        let anon = HashMap::from([
            ("M1".to_string(), record(10.0, 20.0, 50.0)),
            ("M7".to_string(), record(1.0, 2.0, 3.0)),
        ]);
        let base = HashMap::from([
            ("M1".to_string(), record(10.0, 0.0, 30.0)),
            ("M9".to_string(), record(5.0, 0.0, 6.0)),
        ]);
        let (values, not_found) = overhead_values(&anon, &base);
        // baseline total 20s minus anonymized decrypted-state 30s
        assert_eq!(values, vec![-10.0]);
        // M7 unmatched on the anonymized side, M9 unmatched on the baseline side
        assert_eq!(not_found, 0);
    }
}
