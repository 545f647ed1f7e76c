//! Loader for the accumulated-charge history, one mC/cm value per line.

use std::{fs, path::Path};

use eyre::{Result, WrapErr};

use crate::chamber::TEN_PCT_CHARGE_OFFSET;

/// Load the charge samples.
///
/// With `ten_pct_zero` set, every sample is shifted by the charge already
/// accumulated during 2% CF4 running so it lines up with the 10% CF4 history.
pub fn load_charges(path: &Path, ten_pct_zero: bool) -> Result<Vec<f64>> {
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("reading charge history {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .map(|(lnum, line)| {
            let charge: f64 = line.trim().parse().wrap_err_with(|| {
                format!("{}:{}: bad charge value `{}`", path.display(), lnum + 1, line.trim())
            })?;
            Ok(if ten_pct_zero {
                charge + TEN_PCT_CHARGE_OFFSET
            } else {
                charge
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("gif-rates-charge-{}-{name}", std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_one_value_per_line() {
        let path = write_temp("plain.txt", "10\n20.5\n30\n");
        assert_eq!(load_charges(&path, false).unwrap(), vec![10.0, 20.5, 30.0]);
    }

    #[test]
    fn ten_pct_zero_offsets_every_value() {
        let path = write_temp("offset.txt", "10\n20\n30\n");
        assert_eq!(load_charges(&path, true).unwrap(), vec![340.0, 350.0, 360.0]);
    }

    #[test]
    fn bad_value_is_an_error_with_location() {
        let path = write_temp("bad.txt", "10\nnot-a-number\n");
        let err = load_charges(&path, false).unwrap_err();
        assert!(format!("{err}").contains(":2"), "{err}");
    }
}
