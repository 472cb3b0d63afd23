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
//! Library for parsing message logs of anonymous-group experiments in the ONE simulator and
//! deriving delivery, decryption, overhead and distance metrics from them.

pub mod aggregate;
pub mod export;
pub mod logfile;
pub mod metrics;
pub mod parser;
pub mod plot;
pub mod records;
pub mod util;

pub mod prelude {
    pub use super::{
        aggregate::{parse_files, Aggregator},
        metrics::{derive_mean_results, interval_buckets, Metric},
        parser::{Action, MsgEvent, ParseError, SimHeader},
        records::{Movement, RunAggregate, RunKey},
    };
}
