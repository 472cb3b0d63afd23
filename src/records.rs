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
//! Module defining the record data types shared by the parsing and aggregation pipeline.
use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sentinel group count for runs where the group count equals the host count. Those runs pick
/// their pivots at random and are graphed as one line, regardless of the literal group value.
pub const GROUPS_RANDOM_PIVOT: u32 = u32::MAX;

/// Group count assigned to runs of the epidemic router, which has no anonymity groups.
pub const GROUPS_EPIDEMIC: u32 = 0;

/// Group count of the non-anonymized run used as the reference for overhead computations.
pub const GROUPS_BASELINE: u32 = 1;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    strum::Display,
    strum_macros::EnumString,
)]
/// Movement models available in the simulator scenarios.
pub enum Movement {
    RandomWaypoint,
    #[serde(rename = "MapBasedMovement")]
    #[strum(serialize = "MapBasedMovement")]
    MapBased,
    #[serde(rename = "ShortestPathMapBasedMovement")]
    #[strum(serialize = "ShortestPathMapBasedMovement")]
    ShortestPathMapBased,
    #[serde(rename = "MapRouteMovement")]
    #[strum(serialize = "MapRouteMovement")]
    MapRoute,
    /// Movement model outside the fixed table. Carries an empty short code.
    Unknown,
}

impl Movement {
    /// Parse the movement model name from a simulation header. Names outside the fixed table
    /// map to [`Movement::Unknown`] rather than an error.
    pub fn from_name(name: impl AsRef<str>) -> Self {
        Self::from_str(name.as_ref()).unwrap_or(Self::Unknown)
    }

    /// Short code used in bucket keys and plot legends.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RandomWaypoint => "rw",
            Self::MapBased => "mb",
            Self::ShortestPathMapBased => "sp",
            Self::MapRoute => "mr",
            Self::Unknown => "",
        }
    }
}

/// Identifies one simulation run by its full parameter tuple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct RunKey {
    pub router: String,
    pub movement: Movement,
    pub groups: u32,
    pub hosts: u32,
    pub seed: u64,
}

impl RunKey {
    /// The key of the baseline run this run is compared against for overhead.
    pub fn baseline(&self) -> RunKey {
        RunKey {
            groups: GROUPS_BASELINE,
            ..self.clone()
        }
    }
}

/// Display role of a run's group count. Closed set keyed by the group corrections applied
/// while parsing the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole {
    Epidemic,
    Baseline,
    RandomPivot,
    Threshold(u32),
}

impl GroupRole {
    pub fn of(groups: u32) -> Self {
        match groups {
            GROUPS_EPIDEMIC => Self::Epidemic,
            GROUPS_BASELINE => Self::Baseline,
            GROUPS_RANDOM_PIVOT => Self::RandomPivot,
            g => Self::Threshold(g),
        }
    }
}

/// Lifecycle observations of one simulated message. All timestamps are simulation seconds and
/// default to 0.0 (unset) until the corresponding event is observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct MessageRecord {
    pub created: f64,
    pub decrypted: f64,
    pub delivered: f64,
    /// Euclidean distance from the source at decryption time, in meters.
    pub euclidean: f64,
}

impl MessageRecord {
    /// Time the message spent encrypted, if it was ever decrypted.
    pub fn time_encrypted(&self) -> Option<f64> {
        (self.decrypted > 0.0).then_some(self.decrypted - self.created)
    }

    /// Time between decryption and delivery, if both were observed.
    pub fn time_decrypted_state(&self) -> Option<f64> {
        (self.decrypted > 0.0 && self.delivered > 0.0).then_some(self.delivered - self.decrypted)
    }

    /// Total time from creation to delivery, if the message was delivered.
    pub fn total_delivery_time(&self) -> Option<f64> {
        (self.delivered > 0.0).then_some(self.delivered - self.created)
    }
}

/// Per-run aggregate counters plus all message records observed for the run.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunAggregate {
    pub messages: HashMap<String, MessageRecord>,
    pub num_created: u64,
    pub num_decrypted: u64,
    pub num_delivered: u64,
    /// Running mean of the euclidean distance at decryption.
    pub mean_dist_decrypted: f64,
}

impl RunAggregate {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Fold another aggregate for the same run key into this one. Counters add up; the distance
    /// means combine weighted by their decrypted counts, which matches parsing the two inputs
    /// back to back.
    pub fn merge(&mut self, other: RunAggregate) {
        let n1 = self.num_decrypted as f64;
        let n2 = other.num_decrypted as f64;
        if n1 + n2 > 0.0 {
            self.mean_dist_decrypted =
                (self.mean_dist_decrypted * n1 + other.mean_dist_decrypted * n2) / (n1 + n2);
        }
        self.num_created += other.num_created;
        self.num_decrypted += other.num_decrypted;
        self.num_delivered += other.num_delivered;
        self.messages.extend(other.messages);
    }
}
