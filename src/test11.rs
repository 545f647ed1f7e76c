//! Test 11 reference results.
//!
//! Each measurement cycle has a companion result file produced by the Test 11
//! anode scan: a bincode-encoded map of named histograms. An entry that is
//! absent from a readable container reads as an empty histogram, so its
//! contribution to any derived rate is zero.

use std::{collections::BTreeMap, fs, path::{Path, PathBuf}};

use eyre::{bail, Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::chamber::{LAYERS, NOISY_WIRE_GROUP, REPLACEMENT_WIRE_GROUP, TEST11_DUMP_SECS};

/// Per-layer anode hit-cluster counts, `L` in 0..6.
pub fn layer_hits_entry(layer: usize) -> String {
    format!("alct/layer_hits[{layer}]")
}

/// Bin `b` counts clusters seen in `b` layers simultaneously, `b` in 0..6.
pub const LAYER_MULTIPLICITY_ENTRY: &str = "alct/layer_multiplicity";

/// Layer-5 counts indexed by wire-group number.
pub const WG_OCCUPANCY_L5_ENTRY: &str = "alct/wg_occupancy_layer5";

/// A named histogram inside a result container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub bins: Vec<f64>,
}

impl Histogram {
    /// Bin content; out-of-range bins read as zero.
    pub fn bin(&self, idx: usize) -> f64 {
        self.bins.get(idx).copied().unwrap_or(0.0)
    }

    /// Total fill count.
    pub fn entries(&self) -> f64 {
        self.bins.iter().sum()
    }
}

/// Multi-layer muon coincidence correction: a cluster seen in `b` layers was
/// counted `b` times but is one track, so `b - 1` of its hits are removed.
pub fn layer_correction(multiplicity: &Histogram) -> f64 {
    (1..LAYERS)
        .map(|b| multiplicity.bin(b) * (b as f64 - 1.0) / b as f64)
        .sum()
}

/// An opened Test 11 result container.
#[derive(Debug, Clone)]
pub struct ResultFile {
    hists: BTreeMap<String, Histogram>,
}

impl ResultFile {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .wrap_err_with(|| format!("opening Test 11 result {}", path.display()))?;
        let hists = bincode::deserialize(&bytes)
            .wrap_err_with(|| format!("decoding Test 11 result {}", path.display()))?;
        Ok(ResultFile { hists })
    }

    pub fn hist(&self, name: &str) -> Option<&Histogram> {
        self.hists.get(name)
    }

    /// Total anode hit-cluster rate in Hz with the muon coincidence removed.
    pub fn corrected_total_rate(&self) -> f64 {
        let summed: f64 = (0..LAYERS)
            .map(|layer| {
                self.hist(&layer_hits_entry(layer))
                    .map(Histogram::entries)
                    .unwrap_or(0.0)
            })
            .sum();
        let correction = self
            .hist(LAYER_MULTIPLICITY_ENTRY)
            .map(layer_correction)
            .unwrap_or(0.0);
        (summed - correction) / TEST11_DUMP_SECS
    }

    /// Rate of clusters seen in exactly one layer, in Hz.
    pub fn single_layer_rate(&self) -> f64 {
        self.hist(LAYER_MULTIPLICITY_ENTRY)
            .map(|hist| hist.bin(1))
            .unwrap_or(0.0)
            / TEST11_DUMP_SECS
    }

    /// Layer-5 rates of the noisy wire group and its quiet replacement, in Hz.
    pub fn wire_group_rates(&self) -> (f64, f64) {
        let occupancy = self.hist(WG_OCCUPANCY_L5_ENTRY);
        let rate = |wire_group: usize| {
            occupancy.map(|hist| hist.bin(wire_group)).unwrap_or(0.0) / TEST11_DUMP_SECS
        };
        (rate(NOISY_WIRE_GROUP), rate(REPLACEMENT_WIRE_GROUP))
    }
}

/// Read the list of result-file paths: a one-line header followed by one path
/// per line (the first whitespace-delimited token).
pub fn load_result_list(path: &Path) -> Result<Vec<PathBuf>> {
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("reading Test 11 result list {}", path.display()))?;

    let mut paths = Vec::new();
    for (lnum, line) in content.lines().enumerate() {
        if lnum == 0 {
            continue;
        }
        match line.split_whitespace().next() {
            Some(entry) => paths.push(PathBuf::from(entry)),
            None => bail!("{}:{}: empty entry in result list", path.display(), lnum + 1),
        }
    }
    Ok(paths)
}
