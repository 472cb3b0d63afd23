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
//! Field extraction for the two structured line shapes of the simulator log: the run parameter
//! header and the per-message event record.
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::records::{Movement, RunKey, GROUPS_EPIDEMIC, GROUPS_RANDOM_PIVOT};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed simulation header: {0}")]
    MalformedHeader(String),
    #[error("Malformed message event: {0}")]
    MalformedEvent(String),
    #[error("Unknown message action '{action}' in line: {line}")]
    UnknownAction { action: String, line: String },
    #[error("Message event before any simulation header: {0}")]
    EventBeforeHeader(String),
    #[error("Could not build the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

lazy_static! {
    // The header carries `key=value;` pairs in fixed order. Anything after `hosts` is
    // scenario-specific and ignored.
    static ref HEADER_RE: Regex = Regex::new(
        r"Running simulation '(?P<router>[^'_]+)_[^':]*: seed=(?P<seed>[0-9]+(?:\.[0-9]+)?); anongroups=(?P<groups>[0-9]+(?:\.[0-9]+)?); movement=(?P<movement>[^;]+); hosts=(?P<hosts>[0-9]+(?:\.[0-9]+)?);"
    ).unwrap();
    static ref EVENT_RE: Regex = Regex::new(
        r"MSGINFO: (?P<id>[^,]+), (?P<action>[A-Za-z_]+)=(?P<value>[-+0-9.eE]+)"
    ).unwrap();
}

/// Known per-message event actions. The taxonomy is closed; anything else signals a corrupted
/// or version-mismatched log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum_macros::EnumString)]
pub enum Action {
    #[strum(serialize = "created")]
    Created,
    #[strum(serialize = "decrypted")]
    Decrypted,
    #[strum(serialize = "delivered")]
    Delivered,
    #[strum(serialize = "euclidean")]
    Euclidean,
}

/// Parsed run parameter header.
#[derive(Debug, Clone, PartialEq)]
pub struct SimHeader {
    pub router: String,
    pub seed: u64,
    pub groups: u32,
    pub movement: Movement,
    pub hosts: u32,
}

impl SimHeader {
    /// Parse a line of the form
    /// `Running simulation 'epidemic_scenario: seed=1; anongroups=1; movement=RandomWaypoint; hosts=10;'`.
    /// Additional trailing `key=value;` fields are tolerated.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let caps = HEADER_RE
            .captures(line)
            .ok_or_else(|| ParseError::MalformedHeader(line.to_string()))?;
        // The simulator prints integral parameters, but older logs carry them as floats.
        let num = |name: &str| -> Result<f64, ParseError> {
            f64::from_str(&caps[name]).map_err(|_| ParseError::MalformedHeader(line.to_string()))
        };
        Ok(Self {
            router: caps["router"].to_string(),
            seed: num("seed")? as u64,
            groups: num("groups")? as u32,
            movement: Movement::from_name(&caps["movement"]),
            hosts: num("hosts")? as u32,
        })
    }

    /// Derive the run key, applying the group corrections: a group count equal to the host
    /// count marks a random-pivot run, and the epidemic router has no groups at all.
    pub fn run_key(&self) -> RunKey {
        let mut groups = self.groups;
        if groups == self.hosts {
            groups = GROUPS_RANDOM_PIVOT;
        }
        if self.router == "epidemic" {
            groups = GROUPS_EPIDEMIC;
        }
        RunKey {
            router: self.router.clone(),
            movement: self.movement,
            groups,
            hosts: self.hosts,
            seed: self.seed,
        }
    }
}

/// Parsed per-message event record.
#[derive(Debug, Clone, PartialEq)]
pub struct MsgEvent {
    pub id: String,
    pub action: Action,
    pub value: f64,
}

impl MsgEvent {
    /// Parse a line of the form `MSGINFO: M3, created=84.0`.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let caps = EVENT_RE
            .captures(line)
            .ok_or_else(|| ParseError::MalformedEvent(line.to_string()))?;
        let action = Action::from_str(&caps["action"]).map_err(|_| ParseError::UnknownAction {
            action: caps["action"].to_string(),
            line: line.to_string(),
        })?;
        let value = f64::from_str(&caps["value"])
            .map_err(|_| ParseError::MalformedEvent(line.to_string()))?;
        Ok(Self {
            id: caps["id"].to_string(),
            action,
            value,
        })
    }
}
