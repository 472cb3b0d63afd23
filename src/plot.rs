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
//! Rendering of the derived series as plotly figures, and the fixed lookup from group roles to
//! display metadata.
use std::fs;
use std::path::Path;

use plotly::color::Rgb;
use plotly::common::{DashType, ErrorData, ErrorType, Line, Marker, MarkerSymbol, Mode};
use plotly::layout::Axis;
use plotly::{Layout, Plot, Scatter};

use crate::metrics::{Metric, Series};
use crate::records::{GroupRole, Movement};

/// Display metadata of one plotted line.
#[derive(Debug, Clone)]
pub struct DisplayStyle {
    pub label: String,
    pub marker: MarkerSymbol,
    pub dash: DashType,
    pub color: Rgb,
}

fn gray(level: f64) -> Rgb {
    let v = (level * 255.0).round() as u8;
    Rgb::new(v, v, v)
}

/// Fixed display lookup. Threshold groups keep their historical marker/style assignments so
/// figures from different experiment batches stay comparable.
pub fn style_for(router: &str, role: GroupRole) -> DisplayStyle {
    match role {
        GroupRole::Epidemic => DisplayStyle {
            label: router.to_string(),
            marker: MarkerSymbol::Diamond,
            dash: DashType::Dot,
            color: gray(0.5),
        },
        GroupRole::Baseline => DisplayStyle {
            label: "normal".to_string(),
            marker: MarkerSymbol::Star,
            dash: DashType::Solid,
            color: gray(0.0),
        },
        GroupRole::RandomPivot => DisplayStyle {
            label: "ran. pivot".to_string(),
            marker: MarkerSymbol::X,
            dash: DashType::Solid,
            color: gray(0.5),
        },
        GroupRole::Threshold(g) => DisplayStyle {
            label: format!("{g} of {g}"),
            marker: match g {
                2 => MarkerSymbol::TriangleUp,
                6 => MarkerSymbol::Square,
                10 => MarkerSymbol::Circle,
                14 => MarkerSymbol::Diamond,
                _ => MarkerSymbol::Circle,
            },
            dash: match g {
                2 | 10 => DashType::Dash,
                6 | 14 => DashType::Dot,
                _ => DashType::Solid,
            },
            color: match g {
                2 | 14 => gray(0.7),
                6 | 10 => gray(0.3),
                _ => gray(0.0),
            },
        },
    }
}

/// Derived figure filename, e.g. `RandomWaypoint_MessageDeliveryRatio`. Units in parentheses
/// are stripped from the metric label.
pub fn figure_name(movement: Movement, metric: Metric) -> String {
    let mut label = metric.label();
    if let Some(pos) = label.find('(') {
        label = label[..pos].trim_end();
    }
    format!("{movement}_{}", label.replace(' ', ""))
}

/// Build the mean-results figure for one metric: one error-bar line per group, ordered by
/// group count so the draw order is stable.
pub fn errorbar_figure(metric: Metric, groups: &std::collections::BTreeMap<u32, Series>) -> Plot {
    let mut plot = Plot::new();
    for series in groups.values().filter(|s| !s.is_empty()) {
        let trace = Scatter::new(series.xs.clone(), series.ys.clone())
            .mode(Mode::LinesMarkers)
            .name(&series.style.label)
            .marker(Marker::new().symbol(series.style.marker.clone()).size(8))
            .line(
                Line::new()
                    .color(series.style.color.clone())
                    .dash(series.style.dash.clone())
                    .width(2.0),
            )
            .error_y(ErrorData::new(ErrorType::Data).array(series.errs.clone()));
        plot.add_trace(trace);
    }

    let mut y_axis = Axis::new().title(metric.label());
    if metric.is_ratio() {
        y_axis = y_axis.range(vec![0.0, 1.0]);
    }
    plot.set_layout(
        Layout::new()
            .x_axis(Axis::new().title("Number of Nodes").range(vec![0.0, 300.0]))
            .y_axis(y_axis),
    );
    plot
}

/// One line of a CDF figure.
pub struct CdfTrace {
    pub label: String,
    pub dash: DashType,
    pub color: Option<Rgb>,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub width: f64,
}

impl CdfTrace {
    pub fn new(label: impl Into<String>, xs: Vec<f64>, ys: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            dash: DashType::Solid,
            color: None,
            xs,
            ys,
            width: 2.0,
        }
    }

    pub fn dash(mut self, dash: DashType) -> Self {
        self.dash = dash;
        self
    }

    pub fn color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }

    pub fn width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }
}

/// Build a cumulative-fraction figure from the given traces.
pub fn cdf_figure(traces: Vec<CdfTrace>, x_label: &str) -> Plot {
    let mut plot = Plot::new();
    for t in traces {
        let mut line = Line::new().dash(t.dash).width(t.width);
        if let Some(color) = t.color {
            line = line.color(color);
        }
        plot.add_trace(
            Scatter::new(t.xs, t.ys)
                .mode(Mode::Lines)
                .name(&t.label)
                .line(line),
        );
    }
    plot.set_layout(
        Layout::new()
            .x_axis(Axis::new().title(x_label))
            .y_axis(Axis::new().title("Cumulative Fraction").range(vec![0.0, 1.0])),
    );
    plot
}

/// Write the figure to `<out_dir>/<name>.html` when saving, and show it interactively unless
/// suppressed.
pub fn emit(
    plot: &Plot,
    save: bool,
    no_show: bool,
    out_dir: &Path,
    name: &str,
) -> std::io::Result<()> {
    if save {
        fs::create_dir_all(out_dir)?;
        let path = out_dir.join(format!("{name}.html"));
        log::debug!("Plotting {path:?}");
        plot.write_html(path);
    }
    if !no_show {
        plot.show();
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn style_lookup_labels() {
        assert_eq!(style_for("epidemic", GroupRole::Epidemic).label, "epidemic");
        assert_eq!(style_for("fcontact", GroupRole::Baseline).label, "normal");
        assert_eq!(
            style_for("fcontact", GroupRole::RandomPivot).label,
            "ran. pivot"
        );
        assert_eq!(
            style_for("fcontact", GroupRole::Threshold(6)).label,
            "6 of 6"
        );
    }

    #[test]
    fn style_lookup_markers() {
        assert!(matches!(
            style_for("fcontact", GroupRole::Threshold(2)).marker,
            MarkerSymbol::TriangleUp
        ));
        assert!(matches!(
            style_for("fcontact", GroupRole::Threshold(14)).marker,
            MarkerSymbol::Diamond
        ));
        assert!(matches!(
            style_for("fcontact", GroupRole::Baseline).marker,
            MarkerSymbol::Star
        ));
        // thresholds outside the table fall back to a plain line
        let other = style_for("fcontact", GroupRole::Threshold(8));
        assert!(matches!(other.marker, MarkerSymbol::Circle));
        assert!(matches!(other.dash, DashType::Solid));
    }

    #[test]
    fn figure_names_strip_units() {
        assert_eq!(
            figure_name(Movement::RandomWaypoint, Metric::DeliveryRatio),
            "RandomWaypoint_MessageDeliveryRatio"
        );
        assert_eq!(
            figure_name(Movement::MapBased, Metric::MeanDistance),
            "MapBasedMovement_MeanDistancefromSource"
        );
    }

    #[test]
    fn errorbar_figure_skips_empty_series() {
        let mut groups = std::collections::BTreeMap::new();
        groups.insert(1, Series::new(style_for("fcontact", GroupRole::Baseline)));
        let mut with_points = Series::new(style_for("fcontact", GroupRole::Threshold(2)));
        with_points.push(50.0, 0.5, 0.1);
        groups.insert(2, with_points);

        let plot = errorbar_figure(Metric::DeliveryRatio, &groups);
        assert_eq!(plot.data().len(), 1);
    }
}
