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
//! Export and re-import of plotted series as gzip-compressed CSV, to avoid re-parsing large
//! logs when re-graphing. Each series is written as two consecutive rows: the x values, then
//! the y values.
use std::fs::File;
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// One plottable series: x values and y values of equal length.
pub type XySeries = (Vec<f64>, Vec<f64>);

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Non-numeric field in imported series: {0}")]
    Float(#[from] std::num::ParseFloatError),
    #[error("Imported file ends with an x row without its y row")]
    UnpairedRow,
}

/// Write all series to a gzipped CSV file. Values round-trip exactly through
/// [`import_series`], since both sides carry plain floats with no transformation.
pub fn export_series(path: impl AsRef<Path>, series: &[XySeries]) -> Result<(), ExportError> {
    let encoder = GzEncoder::new(File::create(path)?, Compression::default());
    let mut csv = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(encoder);
    for (xs, ys) in series {
        csv.write_record(xs.iter().map(f64::to_string))?;
        csv.write_record(ys.iter().map(f64::to_string))?;
    }
    csv.flush()?;
    Ok(())
}

/// Read series back from a gzipped CSV file written by [`export_series`], preserving the
/// row pairing.
pub fn import_series(path: impl AsRef<Path>) -> Result<Vec<XySeries>, ExportError> {
    let decoder = GzDecoder::new(File::open(path)?);
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(decoder);

    let mut series = Vec::new();
    let mut pending: Option<Vec<f64>> = None;
    for record in reader.into_records() {
        let row: Vec<f64> = record?
            .iter()
            .map(str::parse)
            .collect::<Result<_, _>>()?;
        match pending.take() {
            None => pending = Some(row),
            Some(xs) => series.push((xs, row)),
        }
    }
    if pending.is_some() {
        return Err(ExportError::UnpairedRow);
    }
    Ok(series)
}
