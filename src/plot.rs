//! Rendering of the populated rate series to a single PDF.

use std::path::PathBuf;

use chrono::Duration;
use eyre::{ensure, Result};
use plotly::{
    common::{color::NamedColor, Line, Marker, MarkerSymbol, Mode, Title},
    layout::{Axis, AxisType},
    ImageFormat, Layout, Plot, Scatter,
};
use serde::Serialize;

use crate::rates::RateTable;

const CANVAS_WIDTH: usize = 1400;
const CANVAS_HEIGHT: usize = 1000;
const MARKER_SIZE: usize = 10;

/// Padding on each side of the time axis, in days.
const AXIS_PAD_DAYS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XMode {
    Time,
    Charge,
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub x_mode: XMode,
    /// Label used in the output file name.
    pub plot_name: String,
    /// Fixed axis windows matching the old results.
    pub validate_with_old: bool,
    /// Selected CLCT channel, for the legend.
    pub clct: u8,
}

struct SeriesSpec<'a> {
    y: &'a [f64],
    name: String,
    color: NamedColor,
    symbol: MarkerSymbol,
    line: NamedColor,
}

/// Default ALCT/TMB view, optionally with the cathode overlay.
pub fn render_dark_rates(
    table: &RateTable,
    opts: &RenderOptions,
    with_cathodes: bool,
) -> Result<PathBuf> {
    ensure_points(table)?;

    let mut series = vec![
        SeriesSpec {
            y: &table.alct,
            name: "ALCT".to_owned(),
            color: NamedColor::DarkRed,
            symbol: MarkerSymbol::Circle,
            line: NamedColor::DarkRed,
        },
        SeriesSpec {
            y: &table.alct_corrected,
            name: "ALCT Corrected".to_owned(),
            color: NamedColor::DarkRed,
            symbol: MarkerSymbol::CircleOpen,
            line: NamedColor::Black,
        },
        SeriesSpec {
            y: &table.tmb,
            name: "TMB (ALCT*CLCT)".to_owned(),
            color: NamedColor::DarkBlue,
            symbol: MarkerSymbol::Square,
            line: NamedColor::DarkBlue,
        },
    ];
    if with_cathodes {
        series.push(SeriesSpec {
            y: &table.cfeb,
            name: "CFEB".to_owned(),
            color: NamedColor::DarkMagenta,
            symbol: MarkerSymbol::Square,
            line: NamedColor::DarkMagenta,
        });
        series.push(SeriesSpec {
            y: &table.clct,
            name: format!("CLCT#{}", opts.clct),
            color: NamedColor::Blue,
            symbol: MarkerSymbol::Square,
            line: NamedColor::Blue,
        });
    }

    let (title, x_axis, y_default) = match opts.x_mode {
        XMode::Time => ("Dark Rates", time_axis(table), 10.0),
        XMode::Charge if opts.validate_with_old => {
            ("TMB Dump Dark Rates", charge_axis(0.0, 500.0), 5.0)
        }
        XMode::Charge => (
            "TMB Dump Dark Rates",
            charge_axis(table.charge[0], charge_upper(table.charge_max)),
            8.0,
        ),
    };

    let layout = Layout::new()
        .title(Title::new(title))
        .x_axis(x_axis)
        .y_axis(
            Axis::new()
                .title(Title::new("Dark Rate (kHz)"))
                .range(vec![0.0, y_ceiling(y_default, table.rate_max)]),
        )
        .width(CANVAS_WIDTH)
        .height(CANVAS_HEIGHT);

    write_pdf(table, opts, series, layout, "")
}

/// Noisy WG 5 against its quiet layer-5 neighbor, log-scale y.
pub fn render_problem_wg(table: &RateTable, opts: &RenderOptions) -> Result<PathBuf> {
    ensure_points(table)?;

    let series = vec![
        SeriesSpec {
            y: &table.wg_noisy,
            name: "Problem WG 5 Layer 5".to_owned(),
            color: NamedColor::DarkRed,
            symbol: MarkerSymbol::Circle,
            line: NamedColor::DarkRed,
        },
        SeriesSpec {
            y: &table.wg_replacement,
            name: "Normal WG 4 Layer 5".to_owned(),
            color: NamedColor::DarkBlue,
            symbol: MarkerSymbol::Circle,
            line: NamedColor::DarkBlue,
        },
    ];

    let x_axis = match opts.x_mode {
        XMode::Time => time_axis(table),
        XMode::Charge => charge_axis(330.0, 750.0),
    };

    let layout = Layout::new()
        .title(Title::new("Problem WG vs Normal"))
        .x_axis(x_axis)
        .y_axis(
            Axis::new()
                .title(Title::new("Dark Rate (Hz)"))
                .type_(AxisType::Log)
                // log axis ranges are given in log10 units
                .range(vec![-1.0, 4.0]),
        )
        .width(CANVAS_WIDTH)
        .height(CANVAS_HEIGHT);

    write_pdf(table, opts, series, layout, "_ProblemVSNormalWG")
}

/// TMB dump ALCT rate against the Test 11 hit-cluster rates.
pub fn render_test11_compare(table: &RateTable, opts: &RenderOptions) -> Result<PathBuf> {
    ensure_points(table)?;

    let series = vec![
        SeriesSpec {
            y: &table.alct,
            name: "TMB Dump ALCT0 Rate".to_owned(),
            color: NamedColor::DarkRed,
            symbol: MarkerSymbol::Circle,
            line: NamedColor::DarkRed,
        },
        SeriesSpec {
            y: &table.t11_total,
            name: "Total Anode Hit Cluster Rate".to_owned(),
            color: NamedColor::Blue,
            symbol: MarkerSymbol::Circle,
            line: NamedColor::Blue,
        },
        SeriesSpec {
            y: &table.t11_single_layer,
            name: "Single Layer Anode Hit Cluster Rate".to_owned(),
            color: NamedColor::DarkBlue,
            symbol: MarkerSymbol::Circle,
            line: NamedColor::DarkBlue,
        },
    ];

    let x_axis = match opts.x_mode {
        XMode::Time => time_axis(table),
        XMode::Charge => charge_axis(330.0, charge_upper(table.charge_max)),
    };

    let layout = Layout::new()
        .title(Title::new("ALCT Rates Test 11 vs TMB dumps"))
        .x_axis(x_axis)
        .y_axis(
            Axis::new()
                .title(Title::new("Dark Rate (kHz)"))
                .range(vec![0.0, y_ceiling(2.0, table.rate_max)]),
        )
        .width(CANVAS_WIDTH)
        .height(CANVAS_HEIGHT);

    write_pdf(table, opts, series, layout, "_AnodeCompare")
}

fn write_pdf(
    table: &RateTable,
    opts: &RenderOptions,
    series: Vec<SeriesSpec>,
    layout: Layout,
    mode_suffix: &str,
) -> Result<PathBuf> {
    let mut plot = Plot::new();
    plot.set_layout(layout);
    match opts.x_mode {
        XMode::Time => add_traces(&mut plot, &table.taken_at, series),
        XMode::Charge => add_traces(&mut plot, &table.charge, series),
    }

    let out = output_name(opts, mode_suffix);
    plot.write_image(&out, ImageFormat::PDF, CANVAS_WIDTH, CANVAS_HEIGHT, 1.0);
    Ok(out)
}

fn add_traces<X: Serialize + Clone + 'static>(plot: &mut Plot, x: &[X], series: Vec<SeriesSpec>) {
    for spec in series {
        let trace = Scatter::new(x.to_vec(), spec.y.to_vec())
            .mode(Mode::LinesMarkers)
            .name(&spec.name)
            .marker(
                Marker::new()
                    .color(spec.color)
                    .size(MARKER_SIZE)
                    .symbol(spec.symbol),
            )
            .line(Line::new().color(spec.line));
        plot.add_trace(trace);
    }
}

fn ensure_points(table: &RateTable) -> Result<()> {
    ensure!(
        !table.is_empty(),
        "no measurements left to plot after the start-date filter"
    );
    Ok(())
}

fn time_axis(table: &RateTable) -> Axis {
    let pad = Duration::days(AXIS_PAD_DAYS);
    let lo = table.taken_at[0] - pad;
    let hi = *table.taken_at.last().unwrap() + pad;
    Axis::new().title(Title::new("Date of Measurement")).range(vec![
        lo.format("%Y-%m-%d %H:%M:%S").to_string(),
        hi.format("%Y-%m-%d %H:%M:%S").to_string(),
    ])
}

fn charge_axis(lo: f64, hi: f64) -> Axis {
    Axis::new()
        .title(Title::new("Accumulated Charge (mC/cm)"))
        .range(vec![lo, hi])
}

/// Observed maximum with the historical 500 mC/cm floor, plus margin.
fn charge_upper(charge_max: f64) -> f64 {
    charge_max.max(500.0) + 10.0
}

/// Default window unless the observed rates outgrow it.
fn y_ceiling(default: f64, rate_max: f64) -> f64 {
    if rate_max.is_finite() {
        default.max(rate_max * 1.2)
    } else {
        default
    }
}

fn output_name(opts: &RenderOptions, mode_suffix: &str) -> PathBuf {
    let x_suffix = match opts.x_mode {
        XMode::Time => "_Time",
        XMode::Charge => "_Charge",
    };
    PathBuf::from(format!("DarkRates_{}{}{}.pdf", opts.plot_name, mode_suffix, x_suffix))
}
