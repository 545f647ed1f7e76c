//! Dark-rate arithmetic over the aligned measurement sources.
//!
//! The 0V and HV0 dumps, the charge history and the Test 11 result list are
//! positionally aligned by measurement cycle. Every consistency violation is
//! fatal at the row where it is detected; no partial output is produced.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use eyre::{ensure, Result};
use indicatif::ProgressBar;
use itertools::izip;

use crate::chamber::DUMP_DATETIME_FORMAT;
use crate::dump::MeasurementRow;
use crate::test11::ResultFile;

const KILO: f64 = 1000.0;

/// Paired timestamps further apart than this are a data-entry error.
const MAX_PAIR_DRIFT_SECS: i64 = 24 * 3600;

#[derive(Debug, Clone)]
pub struct ComputeOptions {
    /// Rows whose 0V timestamp precedes this are skipped.
    pub start: NaiveDateTime,
    /// Also derive the CFEB and selected-CLCT cathode rates.
    pub with_cathodes: bool,
    /// Derive the Test 11 comparison rates instead of the wire-group
    /// correction series.
    pub test11_compare: bool,
}

/// Per-cycle outputs, one entry per row that survived the start-date filter.
///
/// Rates are in kHz except the wire-group pair, which stays in Hz.
#[derive(Debug, Clone)]
pub struct RateTable {
    pub taken_at: Vec<NaiveDateTime>,
    pub charge: Vec<f64>,
    pub alct: Vec<f64>,
    pub alct_corrected: Vec<f64>,
    pub tmb: Vec<f64>,
    pub cfeb: Vec<f64>,
    pub clct: Vec<f64>,
    pub wg_noisy: Vec<f64>,
    pub wg_replacement: Vec<f64>,
    pub t11_total: Vec<f64>,
    pub t11_single_layer: Vec<f64>,
    /// Running extrema over the dump-rate series, for axis scaling.
    pub rate_min: f64,
    pub rate_max: f64,
    pub charge_max: f64,
}

impl RateTable {
    fn new() -> Self {
        RateTable {
            taken_at: Vec::new(),
            charge: Vec::new(),
            alct: Vec::new(),
            alct_corrected: Vec::new(),
            tmb: Vec::new(),
            cfeb: Vec::new(),
            clct: Vec::new(),
            wg_noisy: Vec::new(),
            wg_replacement: Vec::new(),
            t11_total: Vec::new(),
            t11_single_layer: Vec::new(),
            rate_min: f64::INFINITY,
            rate_max: f64::NEG_INFINITY,
            charge_max: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.taken_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taken_at.is_empty()
    }
}

/// Baseline-subtracted, exposure-normalized rate of `field` in Hz.
pub fn raw_rate(
    hv0: &MeasurementRow,
    zero_v: &MeasurementRow,
    field: impl Fn(&MeasurementRow) -> f64,
) -> f64 {
    field(hv0) / hv0.elapsed_secs - field(zero_v) / zero_v.elapsed_secs
}

/// Walk the aligned rows in file order and fill a [`RateTable`].
pub fn compute(
    zero_v: &[MeasurementRow],
    hv0: &[MeasurementRow],
    charges: &[f64],
    results: &[PathBuf],
    opts: &ComputeOptions,
) -> Result<RateTable> {
    ensure!(
        zero_v.len() == hv0.len(),
        "mismatch in number of 0V and HV0 measurements (0V: {}, HV0: {})",
        zero_v.len(),
        hv0.len()
    );
    ensure!(
        charges.len() == zero_v.len(),
        "mismatch in number of charge samples and TMB dump measurements (TMB: {}, charge: {})",
        zero_v.len(),
        charges.len()
    );
    ensure!(
        results.len() == zero_v.len(),
        "mismatch in number of Test 11 results and TMB dump measurements (TMB: {}, Test 11: {})",
        zero_v.len(),
        results.len()
    );

    let mut table = RateTable::new();
    let pb = ProgressBar::new(hv0.len() as u64);

    for (zero, op, &charge, result) in izip!(zero_v, hv0, charges, results) {
        let drift = op.taken_at - zero.taken_at;
        ensure!(
            drift.num_seconds().abs() <= MAX_PAIR_DRIFT_SECS,
            "too large time difference between 0V and HV0 measurements at {}",
            op.taken_at.format(DUMP_DATETIME_FORMAT)
        );

        if zero.taken_at < opts.start {
            pb.inc(1);
            continue;
        }

        ensure!(
            op.elapsed_secs != 0.0 && zero.elapsed_secs != 0.0,
            "zero elapsed time for measurement at {}",
            zero.taken_at.format(DUMP_DATETIME_FORMAT)
        );

        let alct = raw_rate(op, zero, |row| row.alct);
        let tmb = raw_rate(op, zero, |row| row.tmb);

        let result = ResultFile::open(result)?;
        if opts.test11_compare {
            table.t11_total.push(result.corrected_total_rate() / KILO);
            table.t11_single_layer.push(result.single_layer_rate() / KILO);
        } else {
            let (noisy, replacement) = result.wire_group_rates();
            table.alct_corrected.push((alct - noisy + replacement) / KILO);
            table.wg_noisy.push(noisy);
            table.wg_replacement.push(replacement);
        }

        table.taken_at.push(op.taken_at);
        table.charge.push(charge);
        table.alct.push(alct / KILO);
        table.tmb.push(tmb / KILO);

        let mut extrema = vec![alct / KILO, tmb / KILO];
        if opts.with_cathodes {
            let cfeb = raw_rate(op, zero, |row| row.cfeb);
            let clct = raw_rate(op, zero, |row| row.clct);
            table.cfeb.push(cfeb / KILO);
            table.clct.push(clct / KILO);
            extrema.push(cfeb / KILO);
            extrema.push(clct / KILO);
        }
        for rate in extrema {
            table.rate_min = table.rate_min.min(rate);
            table.rate_max = table.rate_max.max(rate);
        }
        table.charge_max = table.charge_max.max(charge);

        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(table)
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, fs, path::{Path, PathBuf}};

    use chrono::NaiveDate;

    use super::*;
    use crate::chamber::DUMP_PREAMBLE_LINES;
    use crate::test11::Histogram;
    use crate::{charge, dump, test11};

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 9, day).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn row(taken_at: NaiveDateTime, elapsed_secs: f64, alct: f64, tmb: f64) -> MeasurementRow {
        MeasurementRow {
            taken_at,
            hv_state: "HV0".to_owned(),
            elapsed_secs,
            alct,
            cfeb: 0.0,
            clct: 0.0,
            tmb,
        }
    }

    fn opts() -> ComputeOptions {
        ComputeOptions {
            start: at(1),
            with_cathodes: false,
            test11_compare: false,
        }
    }

    fn temp(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gif-rates-rates-{}-{name}", std::process::id()))
    }

    fn write_empty_container(name: &str) -> PathBuf {
        let path = temp(name);
        let empty: BTreeMap<String, Histogram> = BTreeMap::new();
        fs::write(&path, bincode::serialize(&empty).unwrap()).unwrap();
        path
    }

    #[test]
    fn raw_rate_is_antisymmetric_under_state_swap() {
        let hv0 = row(at(1), 25.0, 900.0, 333.0);
        let zero_v = row(at(1), 40.0, 30.0, 3.0);
        let forward = raw_rate(&hv0, &zero_v, |r| r.alct);
        let backward = raw_rate(&zero_v, &hv0, |r| r.alct);
        assert!((forward + backward).abs() < 1e-12);
    }

    #[test]
    fn diverging_timestamps_abort() {
        let zero_v = vec![row(at(1), 30.0, 30.0, 3.0)];
        let hv0 = vec![row(at(3), 30.0, 900.0, 333.0)];
        let container = write_empty_container("drift.bin");

        let err = compute(&zero_v, &hv0, &[10.0], &[container], &opts()).unwrap_err();
        assert!(format!("{err}").contains("time difference"), "{err}");
    }

    #[test]
    fn pair_within_tolerance_passes() {
        let zero_v = vec![row(at(1), 30.0, 30.0, 3.0)];
        let hv0 = vec![row(at(1) + chrono::Duration::hours(23), 30.0, 900.0, 333.0)];
        let container = write_empty_container("tolerance.bin");

        let table = compute(&zero_v, &hv0, &[10.0], &[container], &opts()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn zero_elapsed_time_aborts() {
        let zero_v = vec![row(at(1), 0.0, 30.0, 3.0)];
        let hv0 = vec![row(at(1), 30.0, 900.0, 333.0)];
        let container = write_empty_container("elapsed.bin");

        let err = compute(&zero_v, &hv0, &[10.0], &[container], &opts()).unwrap_err();
        assert!(format!("{err}").contains("zero elapsed time"), "{err}");
    }

    #[test]
    fn cardinality_mismatches_abort_before_any_container_is_opened() {
        let zero_v = vec![row(at(1), 30.0, 30.0, 3.0)];
        let hv0 = vec![row(at(1), 30.0, 900.0, 333.0)];
        let missing = PathBuf::from("/nonexistent/container.bin");

        let err = compute(&zero_v, &hv0, &[], &[missing], &opts()).unwrap_err();
        assert!(format!("{err}").contains("charge"), "{err}");

        let err = compute(&zero_v, &hv0, &[10.0], &[], &opts()).unwrap_err();
        assert!(format!("{err}").contains("Test 11"), "{err}");
    }

    #[test]
    fn rows_before_start_date_are_skipped_not_fatal() {
        let zero_v = vec![row(at(1), 30.0, 30.0, 3.0), row(at(5), 30.0, 60.0, 6.0)];
        let hv0 = vec![row(at(1), 30.0, 900.0, 333.0), row(at(5), 30.0, 900.0, 333.0)];
        let containers = vec![
            write_empty_container("skip-0.bin"),
            write_empty_container("skip-1.bin"),
        ];

        let options = ComputeOptions { start: at(3), ..opts() };
        let table = compute(&zero_v, &hv0, &[10.0, 20.0], &containers, &options).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.taken_at[0], at(5));
        assert_eq!(table.charge, vec![20.0]);
    }

    #[test]
    fn corrections_from_containers_shift_the_alct_rate() {
        let zero_v = vec![row(at(1), 30.0, 30.0, 3.0)];
        let hv0 = vec![row(at(1), 30.0, 900.0, 333.0)];

        // noisy WG at 90 counts, replacement at 60: correction of -1 Hz
        let mut hists = BTreeMap::new();
        hists.insert(
            test11::WG_OCCUPANCY_L5_ENTRY.to_string(),
            Histogram { bins: vec![0.0, 0.0, 0.0, 0.0, 60.0, 90.0] },
        );
        let path = temp("correction.bin");
        fs::write(&path, bincode::serialize(&hists).unwrap()).unwrap();

        let table = compute(&zero_v, &hv0, &[10.0], &[path], &opts()).unwrap();
        assert!((table.alct[0] - 0.029).abs() < 1e-12);
        assert!((table.alct_corrected[0] - 0.028).abs() < 1e-12);
        assert_eq!(table.wg_noisy, vec![3.0]);
        assert_eq!(table.wg_replacement, vec![2.0]);
    }

    fn write_dump(path: &Path, rows: &[String]) {
        let mut out = String::new();
        for n in 0..DUMP_PREAMBLE_LINES {
            out.push_str(&format!("preamble line {n}\n"));
        }
        for row in rows {
            out.push_str(row);
            out.push('\n');
        }
        fs::write(path, out).unwrap();
    }

    fn dump_line(day: u32, hv: &str, elapsed: u32, alct: u32, tmb: u32) -> String {
        format!(
            "421 0{day}-Sep-2017 , 12:00:00 {hv} 0 {elapsed} {alct} 2100 \
             140 150 160 170 180 190 200 {tmb} 12345 ok"
        )
    }

    // three well-formed cycles with empty reference containers: every
    // correction evaluates to zero and the corrected series tracks the raw one
    #[test]
    fn pipeline_end_to_end_with_empty_containers() {
        let dat_0v = temp("e2e-0v.txt");
        write_dump(
            &dat_0v,
            &(1..=3).map(|d| dump_line(d, "0V", 30, 30, 3)).collect::<Vec<_>>(),
        );
        let dat_hv0 = temp("e2e-hv0.txt");
        write_dump(
            &dat_hv0,
            &(1..=3).map(|d| dump_line(d, "HV0", 30, 900, 333)).collect::<Vec<_>>(),
        );

        let charges_path = temp("e2e-charges.txt");
        fs::write(&charges_path, "10\n20\n30\n").unwrap();

        let list_path = temp("e2e-list.txt");
        let mut list = String::from("path\n");
        for n in 0..3 {
            let container = write_empty_container(&format!("e2e-{n}.bin"));
            list.push_str(&format!("{}\n", container.display()));
        }
        fs::write(&list_path, list).unwrap();

        let (zero_v, hv0) = dump::load_pair(&dat_0v, &dat_hv0, 16).unwrap();
        let charges = charge::load_charges(&charges_path, false).unwrap();
        let results = test11::load_result_list(&list_path).unwrap();

        let options = ComputeOptions {
            start: NaiveDate::from_ymd_opt(2015, 9, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            with_cathodes: false,
            test11_compare: false,
        };
        let table = compute(&zero_v, &hv0, &charges, &results, &options).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.charge, vec![10.0, 20.0, 30.0]);
        for n in 0..3 {
            assert!((table.alct[n] - 0.029).abs() < 1e-12);
            assert!((table.alct_corrected[n] - table.alct[n]).abs() < 1e-12);
            assert!((table.tmb[n] - 0.011).abs() < 1e-12);
        }
        assert!((table.rate_max - 0.029).abs() < 1e-12);
        assert!((table.rate_min - 0.011).abs() < 1e-12);
        assert_eq!(table.charge_max, 30.0);
    }

    #[test]
    fn test11_compare_fills_the_comparison_series() {
        let zero_v = vec![row(at(1), 30.0, 30.0, 3.0)];
        let hv0 = vec![row(at(1), 30.0, 900.0, 333.0)];

        let mut hists = BTreeMap::new();
        for layer in 0..crate::chamber::LAYERS {
            hists.insert(test11::layer_hits_entry(layer), Histogram { bins: vec![10.0] });
        }
        hists.insert(
            test11::LAYER_MULTIPLICITY_ENTRY.to_string(),
            Histogram { bins: vec![0.0, 30.0, 10.0, 0.0, 0.0, 0.0] },
        );
        let path = temp("t11-compare.bin");
        fs::write(&path, bincode::serialize(&hists).unwrap()).unwrap();

        let options = ComputeOptions { test11_compare: true, ..opts() };
        let table = compute(&zero_v, &hv0, &[10.0], &[path], &options).unwrap();

        // 60 summed hits minus the 2-layer correction of 5, over 30 s
        assert!((table.t11_total[0] - 55.0 / 30.0 / 1000.0).abs() < 1e-12);
        assert!((table.t11_single_layer[0] - 1.0 / 1000.0).abs() < 1e-12);
        assert!(table.alct_corrected.is_empty());
        assert!(table.wg_noisy.is_empty());
    }
}
