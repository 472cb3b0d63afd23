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
//! Derivation of per-run metrics: time-in-state buckets, delivery/decryption/overhead ratios
//! and distance means across seeds, with Student-t confidence intervals.
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;

use crate::plot::{style_for, DisplayStyle};
use crate::records::{
    GroupRole, Movement, RunAggregate, RunKey, GROUPS_BASELINE, GROUPS_RANDOM_PIVOT,
};
use crate::util::SECONDS_PER_HOUR;

#[derive(Debug, thiserror::Error)]
pub enum DeriveError {
    #[error(
        "No baseline run for router {router} under {movement} with hosts={hosts} and seed={seed}"
    )]
    MissingBaseline {
        router: String,
        movement: Movement,
        hosts: u32,
        seed: u64,
    },
}

/// Derived mean metrics, one figure per (movement, metric) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    DeliveryRatio,
    DecryptionRatio,
    OverheadRatio,
    MeanDistance,
}

impl Metric {
    /// Axis label of the metric, also the base of derived figure filenames.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DeliveryRatio => "Message Delivery Ratio",
            Self::DecryptionRatio => "Message Decryption Ratio",
            Self::OverheadRatio => "Delivery Time Ratio",
            Self::MeanDistance => "Mean Distance from Source (m)",
        }
    }

    /// Ratio metrics share a fixed [0, 1] value axis.
    pub fn is_ratio(&self) -> bool {
        matches!(self, Self::DeliveryRatio | Self::DecryptionRatio)
    }
}

/// One plotted line: node counts on x, cross-seed means on y, confidence half-widths as error
/// deltas, plus the display metadata of the group the line belongs to.
#[derive(Debug, Clone)]
pub struct Series {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub errs: Vec<f64>,
    pub style: DisplayStyle,
}

impl Series {
    pub fn new(style: DisplayStyle) -> Self {
        Self {
            xs: Vec::new(),
            ys: Vec::new(),
            errs: Vec::new(),
            style,
        }
    }

    pub fn push(&mut self, x: f64, y: f64, err: f64) {
        self.xs.push(x);
        self.ys.push(y);
        self.errs.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Order the points ascending by the (x, y, err) tuple.
    pub fn sort_points(&mut self) {
        let mut points: Vec<(f64, f64, f64)> = self
            .xs
            .iter()
            .zip(&self.ys)
            .zip(&self.errs)
            .map(|((x, y), e)| (*x, *y, *e))
            .collect();
        points.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then(a.1.total_cmp(&b.1))
                .then(a.2.total_cmp(&b.2))
        });
        self.xs.clear();
        self.ys.clear();
        self.errs.clear();
        for (x, y, e) in points {
            self.push(x, y, e);
        }
    }
}

/// All mean series, keyed movement -> metric -> group count. Runs of different routers that
/// share a movement model land in the same figures.
#[derive(Debug, Default)]
pub struct MeanResults {
    pub by_movement: BTreeMap<Movement, BTreeMap<Metric, BTreeMap<u32, Series>>>,
}

impl MeanResults {
    /// Append one mean point, unless the sample set is empty. Empty samples produce no point
    /// rather than a misleading zero.
    fn push_point(
        &mut self,
        movement: Movement,
        metric: Metric,
        groups: u32,
        style: &DisplayStyle,
        x: f64,
        samples: &[f64],
    ) {
        if samples.is_empty() {
            return;
        }
        self.by_movement
            .entry(movement)
            .or_default()
            .entry(metric)
            .or_default()
            .entry(groups)
            .or_insert_with(|| Series::new(style.clone()))
            .push(x, samples.iter().mean(), ci_half_width(samples, None));
    }

    fn sort_points(&mut self) {
        for metrics in self.by_movement.values_mut() {
            for series in metrics.values_mut().flat_map(BTreeMap::values_mut) {
                series.sort_points();
            }
        }
    }
}

/// Two-sided 95% Student-t critical value for a sample of size `n`.
pub fn t_critical(n: usize) -> f64 {
    if n < 2 {
        return 0.0;
    }
    StudentsT::new(0.0, 1.0, (n - 1) as f64)
        .unwrap()
        .inverse_cdf(0.975)
}

/// 95% confidence half-width `t * (s / sqrt(n))` over the sample standard deviation. Pass an
/// explicit critical value to use a different confidence level.
pub fn ci_half_width(samples: &[f64], critical: Option<f64>) -> f64 {
    let n = samples.len();
    if n < 2 {
        return 0.0;
    }
    let t = critical.unwrap_or_else(|| t_critical(n));
    t * samples.iter().std_dev() / (n as f64).sqrt()
}

/// Compute the per-movement mean series for all four metrics across seeds.
///
/// Overhead relates each anonymized run to the baseline run (group count 1) of the same router,
/// movement, host count and seed. A movement without any baseline runs simply produces no
/// overhead series; a baseline that exists but misses a referenced (hosts, seed) combination is
/// an error, since the ratio is undefined without it.
pub fn derive_mean_results(
    runs: &BTreeMap<RunKey, RunAggregate>,
) -> Result<MeanResults, DeriveError> {
    // one cell per (router, movement, groups, hosts) combination, holding all its seeds
    let mut cells: BTreeMap<(String, Movement, u32, u32), Vec<(u64, &RunAggregate)>> =
        BTreeMap::new();
    for (key, agg) in runs {
        cells
            .entry((key.router.clone(), key.movement, key.groups, key.hosts))
            .or_default()
            .push((key.seed, agg));
    }

    let mut results = MeanResults::default();
    for ((router, movement, groups, hosts), seeds) in &cells {
        let style = style_for(router, GroupRole::of(*groups));
        let node = *hosts as f64;

        // delivery ratio, included even when nothing was delivered
        let samples: Vec<f64> = seeds
            .iter()
            .filter(|(_, a)| a.num_created > 0)
            .map(|(_, a)| a.num_delivered as f64 / a.num_created as f64)
            .collect();
        results.push_point(*movement, Metric::DeliveryRatio, *groups, &style, node, &samples);

        // decryption ratio, only over seeds that decrypted anything
        let samples: Vec<f64> = seeds
            .iter()
            .filter(|(_, a)| a.num_created > 0 && a.num_decrypted > 0)
            .map(|(_, a)| a.num_decrypted as f64 / a.num_created as f64)
            .collect();
        results.push_point(*movement, Metric::DecryptionRatio, *groups, &style, node, &samples);

        let has_baseline = cells
            .keys()
            .any(|(r, m, g, _)| r == router && m == movement && *g == GROUPS_BASELINE);
        // the 14-of-14 threshold at 25 nodes is a known biased sample, dropped unconditionally
        let outlier = *hosts == 25 && *groups == 14;
        if has_baseline && !outlier {
            let mut samples = Vec::new();
            for (seed, agg) in seeds.iter().filter(|(_, a)| a.num_decrypted > 0) {
                let base_key = RunKey {
                    router: router.clone(),
                    movement: *movement,
                    groups: *groups,
                    hosts: *hosts,
                    seed: *seed,
                }
                .baseline();
                let base = runs.get(&base_key).ok_or_else(|| DeriveError::MissingBaseline {
                    router: router.clone(),
                    movement: *movement,
                    hosts: *hosts,
                    seed: *seed,
                })?;
                if let Some(ratio) = overhead_ratio(agg, base) {
                    samples.push(ratio);
                }
            }
            results.push_point(*movement, Metric::OverheadRatio, *groups, &style, node, &samples);
        }

        // mean distance at decryption, only for seeds that observed one
        let samples: Vec<f64> = seeds
            .iter()
            .filter(|(_, a)| a.mean_dist_decrypted > 0.0)
            .map(|(_, a)| a.mean_dist_decrypted)
            .collect();
        results.push_point(*movement, Metric::MeanDistance, *groups, &style, node, &samples);
    }

    results.sort_points();
    Ok(results)
}

/// Delivery-time ratio of one anonymized run versus its baseline run, over the messages
/// delivered in both. `None` when no message matches.
fn overhead_ratio(anon: &RunAggregate, base: &RunAggregate) -> Option<f64> {
    let mut total_anon = 0.0;
    let mut total_base = 0.0;
    let mut count = 0usize;
    for (id, m) in &anon.messages {
        if let Some(n) = base.messages.get(id) {
            if let (Some(anon_time), Some(base_time)) =
                (m.total_delivery_time(), n.total_delivery_time())
            {
                total_anon += anon_time;
                total_base += base_time;
                count += 1;
            }
        }
    }
    (count > 0).then(|| total_anon / total_base)
}

/// Mean baseline delivery time in hours, over all delivered messages of non-epidemic baseline
/// runs. `None` when no such message exists.
pub fn grand_mean_baseline_delivery(runs: &BTreeMap<RunKey, RunAggregate>) -> Option<f64> {
    let mut total = 0.0;
    let mut count = 0u64;
    for (key, run) in runs {
        if key.groups != GROUPS_BASELINE || key.router == "epidemic" {
            continue;
        }
        for rec in run.messages.values() {
            if let Some(t) = rec.total_delivery_time() {
                total += t;
                count += 1;
            }
        }
    }
    (count > 0).then(|| total / count as f64 / SECONDS_PER_HOUR)
}

/// Time-in-state vocabulary of the single-file CDF tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntervalKind {
    /// Time between creation and decryption (":e").
    Encrypted,
    /// Time between decryption and delivery (":d").
    DecryptedState,
    /// Time between creation and delivery (":t").
    Total,
    /// Baseline total minus anonymized decrypted-state time (":o").
    Overhead,
}

impl IntervalKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Encrypted => "e",
            Self::DecryptedState => "d",
            Self::Total => "t",
            Self::Overhead => "o",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Encrypted => "Encrypted",
            Self::DecryptedState => "Decrypted",
            Self::Total => "Total",
            Self::Overhead => "Overhead",
        }
    }
}

/// Key of one time-in-state bucket, displayed as e.g. `4:rw:d`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BucketKey {
    pub groups: u32,
    pub movement: Movement,
    pub kind: IntervalKind,
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.groups == GROUPS_RANDOM_PIVOT {
            write!(f, "pivot:{}:{}", self.movement.code(), self.kind.code())
        } else {
            write!(f, "{}:{}:{}", self.groups, self.movement.code(), self.kind.code())
        }
    }
}

pub type Bucket = HashMap<String, f64>;

/// Collect the per-message time-in-state values of all runs into labeled buckets. Seeds
/// sharing a (group, movement) combination fold into the same bucket.
pub fn interval_buckets(runs: &BTreeMap<RunKey, RunAggregate>) -> BTreeMap<BucketKey, Bucket> {
    let mut buckets: BTreeMap<BucketKey, Bucket> = BTreeMap::new();
    let mut insert = |groups: u32, movement: Movement, kind: IntervalKind, id: &str, v: f64| {
        buckets
            .entry(BucketKey { groups, movement, kind })
            .or_default()
            .insert(id.to_string(), v);
    };

    for (key, run) in runs {
        for (id, rec) in &run.messages {
            if rec.created <= 0.0 {
                continue;
            }
            if let Some(e) = rec.time_encrypted() {
                insert(key.groups, key.movement, IntervalKind::Encrypted, id, e);
                if let Some(d) = rec.time_decrypted_state() {
                    insert(key.groups, key.movement, IntervalKind::DecryptedState, id, d);
                    insert(
                        key.groups,
                        key.movement,
                        IntervalKind::Total,
                        id,
                        rec.delivered - rec.created,
                    );
                }
            } else if let Some(t) = rec.total_delivery_time() {
                insert(key.groups, key.movement, IntervalKind::Total, id, t);
            }
        }
    }
    buckets
}

/// Derive the overhead buckets: for every anonymized decrypted-state bucket and the baseline
/// total bucket of the same movement, overhead per message is baseline total minus anonymized
/// decrypted-state time, over the message ids present in both. Returns the signed count of
/// unmatched messages per derived bucket, which is also reported via the log.
pub fn add_overhead_buckets(buckets: &mut BTreeMap<BucketKey, Bucket>) -> Vec<(BucketKey, i64)> {
    let anon_keys: Vec<BucketKey> = buckets
        .keys()
        .filter(|k| k.groups != GROUPS_BASELINE && k.kind == IntervalKind::DecryptedState)
        .cloned()
        .collect();

    let mut mismatches = Vec::new();
    for key in anon_keys {
        let base_key = BucketKey {
            groups: GROUPS_BASELINE,
            movement: key.movement,
            kind: IntervalKind::Total,
        };
        let (overhead, not_found) = {
            let Some(base) = buckets.get(&base_key) else {
                continue;
            };
            let anon = &buckets[&key];
            let mut overhead = Bucket::new();
            let mut not_found: i64 = 0;
            for (id, anon_d) in anon {
                match base.get(id) {
                    Some(base_t) => {
                        overhead.insert(id.clone(), base_t - anon_d);
                    }
                    None => not_found += 1,
                }
            }
            not_found -= base.keys().filter(|id| !anon.contains_key(*id)).count() as i64;
            (overhead, not_found)
        };
        let new_key = BucketKey {
            kind: IntervalKind::Overhead,
            ..key.clone()
        };
        log::info!(
            "{not_found} total +- messages delivered with anonymity but not in the baseline ({new_key})"
        );
        mismatches.push((new_key.clone(), not_found));
        buckets.insert(new_key, overhead);
    }
    mismatches
}

/// Sort sample values and attach cumulative fractions, starting at 0 for the smallest sample.
pub fn cdf_points(mut values: Vec<f64>) -> (Vec<f64>, Vec<f64>) {
    values.sort_by(f64::total_cmp);
    let n = values.len() as f64;
    let fractions = (0..values.len()).map(|i| i as f64 / n).collect();
    (values, fractions)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::records::MessageRecord;

    fn key(router: &str, groups: u32, hosts: u32, seed: u64) -> RunKey {
        RunKey {
            router: router.to_string(),
            movement: Movement::RandomWaypoint,
            groups,
            hosts,
            seed,
        }
    }

    fn run_with(messages: &[(&str, f64, f64, f64)]) -> RunAggregate {
        let mut agg = RunAggregate::default();
        for (id, created, decrypted, delivered) in messages {
            agg.messages.insert(
                id.to_string(),
                MessageRecord {
                    created: *created,
                    decrypted: *decrypted,
                    delivered: *delivered,
                    euclidean: 0.0,
                },
            );
            agg.num_created += 1;
            if *decrypted > 0.0 {
                agg.num_decrypted += 1;
            }
            if *delivered > 0.0 {
                agg.num_delivered += 1;
            }
        }
        agg
    }

    #[test]
    fn t_critical_matches_table() {
        // two-sided 95% critical value for 9 degrees of freedom
        assert!((t_critical(10) - 2.262).abs() < 1e-3);
    }

    #[test]
    fn ci_of_identical_samples_is_zero() {
        assert_eq!(ci_half_width(&[0.5, 0.5, 0.5], None), 0.0);
    }

    #[test]
    fn ci_scales_with_std_dev() {
        let narrow = ci_half_width(&[0.0, 2.0], None);
        let wide = ci_half_width(&[0.0, 4.0], None);
        assert!(narrow > 0.0);
        assert!((wide / narrow - 2.0).abs() < 1e-9);
    }

    #[test]
    fn ci_accepts_explicit_critical_value() {
        let with_t = ci_half_width(&[0.0, 2.0], Some(1.0));
        let auto = ci_half_width(&[0.0, 2.0], None);
        assert!((auto / with_t - t_critical(2)).abs() < 1e-9);
    }

    #[test]
    fn delivery_included_even_when_zero() {
        let mut runs = BTreeMap::new();
        runs.insert(key("fcontact", 1, 50, 1), run_with(&[("M1", 10.0, 0.0, 0.0)]));
        let results = derive_mean_results(&runs).unwrap();
        let metrics = &results.by_movement[&Movement::RandomWaypoint];
        let series = &metrics[&Metric::DeliveryRatio][&1];
        assert_eq!(series.xs, vec![50.0]);
        assert_eq!(series.ys, vec![0.0]);
        // nothing was decrypted, so there is no decryption series at all
        assert!(!metrics.contains_key(&Metric::DecryptionRatio));
    }

    #[test]
    fn overhead_over_matched_messages() {
        let mut runs = BTreeMap::new();
        // baseline: M2 delivered after 20s; M9 only exists here
        runs.insert(
            key("fcontact", 1, 50, 1),
            run_with(&[("M2", 10.0, 0.0, 30.0), ("M9", 5.0, 0.0, 6.0)]),
        );
        // anonymized: M2 delivered after 30s; M7 only exists here
        runs.insert(
            key("fcontact", 4, 50, 1),
            run_with(&[("M2", 10.0, 15.0, 40.0), ("M7", 1.0, 2.0, 3.0)]),
        );
        let results = derive_mean_results(&runs).unwrap();
        let series =
            &results.by_movement[&Movement::RandomWaypoint][&Metric::OverheadRatio][&4];
        assert_eq!(series.xs, vec![50.0]);
        // matched messages: M2 and M7 is unmatched, M9 is not anonymized
        assert!((series.ys[0] - 30.0 / 20.0).abs() < 1e-12);
    }

    #[test]
    fn overhead_outlier_combination_is_dropped() {
        let mut runs = BTreeMap::new();
        runs.insert(key("fcontact", 1, 25, 1), run_with(&[("M1", 10.0, 0.0, 30.0)]));
        runs.insert(key("fcontact", 14, 25, 1), run_with(&[("M1", 10.0, 15.0, 40.0)]));
        let results = derive_mean_results(&runs).unwrap();
        let metrics = &results.by_movement[&Movement::RandomWaypoint];
        assert!(!metrics
            .get(&Metric::OverheadRatio)
            .is_some_and(|groups| groups.contains_key(&14)));
    }

    #[test]
    fn missing_baseline_seed_is_fatal() {
        let mut runs = BTreeMap::new();
        runs.insert(key("fcontact", 1, 50, 1), run_with(&[("M1", 10.0, 0.0, 30.0)]));
        runs.insert(key("fcontact", 4, 50, 1), run_with(&[("M1", 10.0, 15.0, 40.0)]));
        // seed 2 has an anonymized run but no baseline counterpart
        runs.insert(key("fcontact", 4, 50, 2), run_with(&[("M1", 10.0, 15.0, 40.0)]));
        assert!(matches!(
            derive_mean_results(&runs),
            Err(DeriveError::MissingBaseline { seed: 2, .. })
        ));
    }

    #[test]
    fn movement_without_baseline_has_no_overhead() {
        let mut runs = BTreeMap::new();
        runs.insert(key("rgroup", 4, 50, 1), run_with(&[("M1", 10.0, 15.0, 40.0)]));
        let results = derive_mean_results(&runs).unwrap();
        assert!(!results.by_movement[&Movement::RandomWaypoint]
            .contains_key(&Metric::OverheadRatio));
    }

    #[test]
    fn points_sorted_by_x() {
        let mut runs = BTreeMap::new();
        runs.insert(key("fcontact", 1, 100, 1), run_with(&[("M1", 10.0, 0.0, 30.0)]));
        runs.insert(key("fcontact", 1, 25, 1), run_with(&[("M1", 10.0, 0.0, 30.0)]));
        runs.insert(key("fcontact", 1, 50, 1), run_with(&[("M1", 10.0, 0.0, 30.0)]));
        let results = derive_mean_results(&runs).unwrap();
        let series = &results.by_movement[&Movement::RandomWaypoint][&Metric::DeliveryRatio][&1];
        assert_eq!(series.xs, vec![25.0, 50.0, 100.0]);
    }

    #[test]
    fn interval_buckets_per_run() {
        let mut runs = BTreeMap::new();
        runs.insert(
            key("rgroup", 2, 10, 1),
            run_with(&[("M1", 10.0, 25.0, 40.0), ("M4", 5.0, 0.0, 11.0)]),
        );
        let buckets = interval_buckets(&runs);
        let k = |kind| BucketKey {
            groups: 2,
            movement: Movement::RandomWaypoint,
            kind,
        };
        assert_eq!(buckets[&k(IntervalKind::Encrypted)]["M1"], 15.0);
        assert_eq!(buckets[&k(IntervalKind::DecryptedState)]["M1"], 15.0);
        assert_eq!(buckets[&k(IntervalKind::Total)]["M1"], 30.0);
        assert_eq!(buckets[&k(IntervalKind::Total)]["M4"], 6.0);
        assert!(!buckets[&k(IntervalKind::Encrypted)].contains_key("M4"));
    }

    #[test]
    fn overhead_buckets_and_mismatch_count() {
        let mut buckets = BTreeMap::new();
        let base_key = BucketKey {
            groups: 1,
            movement: Movement::RandomWaypoint,
            kind: IntervalKind::Total,
        };
        let anon_key = BucketKey {
            groups: 4,
            movement: Movement::RandomWaypoint,
            kind: IntervalKind::DecryptedState,
        };
        buckets.insert(
            base_key,
            Bucket::from([("M1".to_string(), 20.0), ("M9".to_string(), 5.0)]),
        );
        buckets.insert(
            anon_key.clone(),
            Bucket::from([("M1".to_string(), 15.0), ("M7".to_string(), 2.0)]),
        );

        let mismatches = add_overhead_buckets(&mut buckets);
        let overhead_key = BucketKey {
            kind: IntervalKind::Overhead,
            ..anon_key
        };
        assert_eq!(buckets[&overhead_key], Bucket::from([("M1".to_string(), 5.0)]));
        // one anonymized message unmatched, one baseline message unmatched
        assert_eq!(mismatches, vec![(overhead_key, 0)]);
    }

    #[test]
    fn bucket_key_display() {
        let k = BucketKey {
            groups: 4,
            movement: Movement::RandomWaypoint,
            kind: IntervalKind::DecryptedState,
        };
        assert_eq!(k.to_string(), "4:rw:d");
        let k = BucketKey {
            groups: GROUPS_RANDOM_PIVOT,
            movement: Movement::MapBased,
            kind: IntervalKind::Overhead,
        };
        assert_eq!(k.to_string(), "pivot:mb:o");
    }

    #[test]
    fn cdf_points_are_sorted_and_monotone() {
        let (xs, ys) = cdf_points(vec![3.0, 1.0, 2.0]);
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
        assert_eq!(ys, vec![0.0, 1.0 / 3.0, 2.0 / 3.0]);
        assert!(ys.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn grand_mean_skips_epidemic() {
        let mut runs = BTreeMap::new();
        runs.insert(
            key("fcontact", 1, 50, 1),
            run_with(&[("M1", 0.5, 0.0, 3600.5), ("M2", 1.0, 0.0, 7201.0)]),
        );
        runs.insert(key("epidemic", 0, 50, 1), run_with(&[("M1", 1.0, 0.0, 2.0)]));
        // mean of 1h and 2h
        assert_eq!(grand_mean_baseline_delivery(&runs), Some(1.5));
    }
}
