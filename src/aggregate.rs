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
//! Accumulation of per-message events into per-run aggregates, including the parallel
//! multi-file parse path.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indicatif::ParallelProgressIterator;
use rayon::prelude::*;

use crate::logfile::{classify, read_lines, LineKind};
use crate::parser::{Action, MsgEvent, ParseError, SimHeader};
use crate::records::{RunAggregate, RunKey};

/// Accumulates run aggregates from one parsing pass. Construct a fresh instance per
/// invocation; parallel workers each hold their own and the partial results are merged
/// afterwards.
#[derive(Debug, Default)]
pub struct Aggregator {
    runs: BTreeMap<RunKey, RunAggregate>,
    current: Option<RunKey>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> &BTreeMap<RunKey, RunAggregate> {
        &self.runs
    }

    /// Classify and consume a single log line.
    pub fn observe_line(&mut self, line: &str) -> Result<(), ParseError> {
        match classify(line) {
            LineKind::RunHeader => self.start_run(SimHeader::parse(line)?),
            LineKind::MsgEvent => self.apply_event(line, MsgEvent::parse(line)?)?,
            LineKind::RunEnd => self.finish_run(),
            LineKind::Other => log::debug!("not consumed: {line}"),
        }
        Ok(())
    }

    /// Parse an entire (possibly gzipped) log file into this aggregator. The run open at the
    /// end of the file is finalized as if a run terminator had been seen.
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<(), ParseError> {
        log::debug!("parsing file {:?}", path.as_ref());
        for line in read_lines(path)? {
            self.observe_line(&line?)?;
        }
        self.finish_run();
        Ok(())
    }

    /// Finalize any open run and return the collected aggregates.
    pub fn finish(mut self) -> BTreeMap<RunKey, RunAggregate> {
        self.finish_run();
        self.runs
    }

    /// Start (or re-enter) the run announced by a header. Re-encountering a key never resets
    /// the counts collected so far.
    fn start_run(&mut self, header: SimHeader) {
        let key = header.run_key();
        self.runs.entry(key.clone()).or_default();
        self.current = Some(key);
    }

    fn apply_event(&mut self, line: &str, event: MsgEvent) -> Result<(), ParseError> {
        let key = self
            .current
            .as_ref()
            .ok_or_else(|| ParseError::EventBeforeHeader(line.to_string()))?;
        let run = self.runs.get_mut(key).expect("current run key exists");
        let record = run.messages.entry(event.id.clone()).or_default();

        match event.action {
            Action::Created => {
                record.created = event.value;
                run.num_created += 1;
            }
            Action::Decrypted => {
                record.decrypted = event.value;
                run.num_decrypted += 1;
            }
            Action::Delivered => {
                record.delivered = event.value;
                run.num_delivered += 1;
            }
            Action::Euclidean => {
                // The simulator reports the distance right before counting the decryption, so
                // the running mean divides by the count *excluding* this message.
                if record.decrypted > 0.0 {
                    log::warn!(
                        "euclidean event after decrypted for message {}; distance mean may be off",
                        event.id
                    );
                }
                record.euclidean = event.value;
                let n = run.num_decrypted as f64;
                run.mean_dist_decrypted = (run.mean_dist_decrypted * n + event.value) / (n + 1.0);
            }
        }
        Ok(())
    }

    /// Close the current run. Runs without any observed message are dropped, so purely
    /// administrative headers leave no trace.
    fn finish_run(&mut self) {
        if let Some(key) = self.current.take() {
            if self.runs.get(&key).is_some_and(RunAggregate::is_empty) {
                self.runs.remove(&key);
            }
        }
    }
}

/// Merge partial per-file results. Aggregates of runs with an identical parameter tuple
/// accumulate additively.
pub fn merge_runs(
    into: &mut BTreeMap<RunKey, RunAggregate>,
    from: BTreeMap<RunKey, RunAggregate>,
) {
    for (key, agg) in from {
        match into.entry(key) {
            std::collections::btree_map::Entry::Occupied(mut e) => e.get_mut().merge(agg),
            std::collections::btree_map::Entry::Vacant(v) => {
                v.insert(agg);
            }
        }
    }
}

/// Parse several log files and merge the per-file results. With `workers > 1` the files are
/// parsed by a fixed-size worker pool; each worker owns an independent [`Aggregator`], and the
/// partial maps are merged sequentially after the pool joins.
pub fn parse_files(
    paths: &[PathBuf],
    workers: usize,
) -> Result<BTreeMap<RunKey, RunAggregate>, ParseError> {
    let partials: Vec<BTreeMap<RunKey, RunAggregate>> = if workers > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;
        pool.install(|| {
            paths
                .par_iter()
                .progress_count(paths.len() as u64)
                .map(|path| {
                    let mut agg = Aggregator::new();
                    agg.parse_file(path)?;
                    Ok(agg.finish())
                })
                .collect::<Result<_, ParseError>>()
        })?
    } else {
        let mut partials = Vec::with_capacity(paths.len());
        for path in paths {
            let mut agg = Aggregator::new();
            agg.parse_file(path)?;
            partials.push(agg.finish());
        }
        partials
    };

    let mut runs = BTreeMap::new();
    for partial in partials {
        merge_runs(&mut runs, partial);
    }
    Ok(runs)
}

#[cfg(test)]
mod test {
    use super::*;

    const HEADER: &str = "Running simulation 'epidemic_scenario: seed=1; anongroups=1; movement=RandomWaypoint; hosts=10;'";

    fn observe(agg: &mut Aggregator, lines: &[&str]) {
        for line in lines {
            agg.observe_line(line).unwrap();
        }
    }

    #[test]
    fn example_scenario() {
        let mut agg = Aggregator::new();
        observe(
            &mut agg,
            &[
                HEADER,
                "MSGINFO: M1, created=10.0",
                "MSGINFO: M1, delivered=40.0",
                "Simulation done in 12.3s",
            ],
        );
        let runs = agg.finish();
        assert_eq!(runs.len(), 1);
        let run = runs.values().next().unwrap();
        assert_eq!(run.num_created, 1);
        assert_eq!(run.num_delivered, 1);
        assert_eq!(
            run.messages["M1"].total_delivery_time(),
            Some(30.0),
        );
    }

    #[test]
    fn administrative_header_leaves_no_run() {
        let mut agg = Aggregator::new();
        observe(&mut agg, &[HEADER, "Simulation done in 0.1s"]);
        assert!(agg.finish().is_empty());
    }

    #[test]
    fn reencountered_header_keeps_counts() {
        let mut agg = Aggregator::new();
        observe(
            &mut agg,
            &[
                HEADER,
                "MSGINFO: M1, created=10.0",
                "Simulation done in 1s",
                HEADER,
                "MSGINFO: M2, created=11.0",
                "Simulation done in 1s",
            ],
        );
        let runs = agg.finish();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs.values().next().unwrap().num_created, 2);
    }

    #[test]
    fn event_before_header_is_fatal() {
        let mut agg = Aggregator::new();
        assert!(matches!(
            agg.observe_line("MSGINFO: M1, created=10.0"),
            Err(ParseError::EventBeforeHeader(_))
        ));
    }

    #[test]
    fn incremental_distance_mean() {
        let mut agg = Aggregator::new();
        // euclidean is always reported before the matching decrypted event
        observe(
            &mut agg,
            &[
                "Running simulation 'rgroup_scenario: seed=1; anongroups=2; movement=RandomWaypoint; hosts=10;'",
                "MSGINFO: M1, created=1.0",
                "MSGINFO: M2, created=2.0",
                "MSGINFO: M1, euclidean=10.0",
                "MSGINFO: M1, decrypted=5.0",
                "MSGINFO: M2, euclidean=20.0",
                "MSGINFO: M2, decrypted=6.0",
            ],
        );
        let runs = agg.finish();
        let run = runs.values().next().unwrap();
        assert_eq!(run.num_decrypted, 2);
        assert_eq!(run.mean_dist_decrypted, 15.0);
    }

    #[test]
    fn duplicate_actions_are_last_write_wins() {
        let mut agg = Aggregator::new();
        observe(
            &mut agg,
            &[
                HEADER,
                "MSGINFO: M1, created=10.0",
                "MSGINFO: M1, created=12.0",
            ],
        );
        let runs = agg.finish();
        let run = runs.values().next().unwrap();
        // the counter still counts both events; the record keeps the last value
        assert_eq!(run.num_created, 2);
        assert_eq!(run.messages["M1"].created, 12.0);
    }

    #[test]
    fn merge_is_additive_for_matching_tuples() {
        let mut a = Aggregator::new();
        observe(&mut a, &[HEADER, "MSGINFO: M1, created=10.0"]);
        let mut b = Aggregator::new();
        observe(&mut b, &[HEADER, "MSGINFO: M2, created=11.0"]);

        let mut runs = a.finish();
        merge_runs(&mut runs, b.finish());
        assert_eq!(runs.len(), 1);
        let run = runs.values().next().unwrap();
        assert_eq!(run.num_created, 2);
        assert_eq!(run.messages.len(), 2);
    }
}
