//! Loader for TMB dump rate files.
//!
//! The dump is whitespace-delimited text with a 6-line preamble. Column
//! layout per measurement line:
//!
//! ```text
//! 0    database id          (dropped)
//! 1-3  date , time          (joined into one timestamp)
//! 4    HV state label
//! 5    source-down flag     (dropped)
//! 6    elapsed seconds
//! 7    ALCT count
//! 8    CFEB count           (sum over all CLCT channels)
//! 9-15 CLCT channels 14-20  (only the selected one is kept)
//! 16   TMB count
//! 17+  L1A count, comments  (dropped)
//! ```

use std::{fs, path::Path};

use chrono::NaiveDateTime;
use eyre::{ensure, Result, WrapErr};

use crate::chamber::{DUMP_DATETIME_FORMAT, DUMP_PREAMBLE_LINES};

/// One TMB dump measurement with only the selected CLCT channel retained.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
    pub taken_at: NaiveDateTime,
    pub hv_state: String,
    pub elapsed_secs: f64,
    pub alct: f64,
    pub cfeb: f64,
    pub clct: f64,
    pub tmb: f64,
}

/// Load the 0V and HV0 dumps together.
///
/// The two files must describe the same measurement cycles line for line, so
/// the raw line counts are compared before anything is parsed.
pub fn load_pair(
    path_0v: &Path,
    path_hv0: &Path,
    clct: u8,
) -> Result<(Vec<MeasurementRow>, Vec<MeasurementRow>)> {
    let lines_0v = count_lines(path_0v)?;
    let lines_hv0 = count_lines(path_hv0)?;
    ensure!(
        lines_0v == lines_hv0,
        "number of lines in the two dump files is not the same (0V: {lines_0v}, HV0: {lines_hv0}); \
         make sure every HV0 measurement has exactly one 0V partner"
    );

    let zero_v = load_dump(path_0v, clct)?;
    let hv0 = load_dump(path_hv0, clct)?;
    Ok((zero_v, hv0))
}

/// Load a single dump file, keeping CLCT channel `clct` (14-20).
pub fn load_dump(path: &Path, clct: u8) -> Result<Vec<MeasurementRow>> {
    ensure!(
        (14..=20).contains(&clct),
        "CLCT channel {clct} out of range, available numbers are 14-20"
    );
    // channels 14-20 sit in columns 9-15
    let clct_col = clct as usize - 5;

    let content =
        fs::read_to_string(path).wrap_err_with(|| format!("reading dump {}", path.display()))?;

    let mut rows = Vec::new();
    for (lnum, line) in content.lines().enumerate() {
        if lnum < DUMP_PREAMBLE_LINES {
            continue;
        }
        let row = parse_row(line, clct_col)
            .wrap_err_with(|| format!("{}:{}", path.display(), lnum + 1))?;
        rows.push(row);
    }
    Ok(rows)
}

fn parse_row(line: &str, clct_col: usize) -> Result<MeasurementRow> {
    let cols: Vec<&str> = line.split_whitespace().collect();
    ensure!(
        cols.len() >= 17,
        "expected at least 17 columns, got {}",
        cols.len()
    );

    // the dump emits a bare comma column between date and UTC time
    let datime = format!("{}{} {}", cols[1], cols[2], cols[3]);
    let taken_at = NaiveDateTime::parse_from_str(&datime, DUMP_DATETIME_FORMAT)
        .wrap_err_with(|| format!("bad measurement date `{datime}`"))?;

    Ok(MeasurementRow {
        taken_at,
        hv_state: cols[4].to_owned(),
        elapsed_secs: num(&cols, 6)?,
        alct: num(&cols, 7)?,
        cfeb: num(&cols, 8)?,
        clct: num(&cols, clct_col)?,
        tmb: num(&cols, 16)?,
    })
}

fn num(cols: &[&str], idx: usize) -> Result<f64> {
    cols[idx]
        .parse()
        .wrap_err_with(|| format!("bad numeric field `{}` in column {idx}", cols[idx]))
}

fn count_lines(path: &Path) -> Result<usize> {
    let content =
        fs::read_to_string(path).wrap_err_with(|| format!("reading dump {}", path.display()))?;
    Ok(content.lines().count())
}
