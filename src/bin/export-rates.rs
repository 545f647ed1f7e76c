use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use eyre::{Result, WrapErr};

use gif_rates::{
    charge, dump,
    rates::{self, ComputeOptions},
    test11,
};

/// Export the computed dark rates as a TSV table instead of a plot.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
struct Args {
    /// CLCT channel to export, available numbers are 14-20
    #[clap(long, default_value_t = 16, value_parser = clap::value_parser!(u8).range(14..=20))]
    clctnum: u8,

    /// Ignore measurements before this date, written as DD MON YYYY
    #[clap(long, default_value = "01 SEP 2015")]
    startdate: String,

    /// Offset charges by the 2% CF4 total so they line up with the 10% CF4
    /// baseline
    #[clap(long)]
    tenpctzero: bool,

    /// Accumulated-charge history, one value per measurement
    #[clap(long, default_value = "charges_me11_2pct.txt")]
    charges: PathBuf,

    /// HV0 TMB dump measurements
    #[clap(long, default_value = "TMB_HV0_me11_2pct.txt")]
    dat_hv0: PathBuf,

    /// 0V TMB dump measurements
    #[clap(long, default_value = "TMB_0V_me11_2pct.txt")]
    dat_0v: PathBuf,

    /// List of Test 11 result files, one per measurement
    #[clap(long, default_value = "anode_me11_2pct.txt")]
    dat_t11: PathBuf,

    /// Output table path
    #[clap(long, default_value = "dark-rates.tsv")]
    out: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let start = NaiveDate::parse_from_str(&args.startdate, "%d %b %Y")
        .wrap_err_with(|| format!("bad start date `{}`, expected DD MON YYYY", args.startdate))?
        .and_hms_opt(0, 0, 0)
        .unwrap();

    let (zero_v, hv0) = dump::load_pair(&args.dat_0v, &args.dat_hv0, args.clctnum)?;
    let charges = charge::load_charges(&args.charges, args.tenpctzero)?;
    let results = test11::load_result_list(&args.dat_t11)?;

    let table = rates::compute(
        &zero_v,
        &hv0,
        &charges,
        &results,
        &ComputeOptions {
            start,
            with_cathodes: true,
            test11_compare: false,
        },
    )?;

    // rates in kHz except the wire-group pair, which stays in Hz
    let mut out =
        "taken_at\tcharge\talct\talct_corrected\tcfeb\tclct\ttmb\twg_noisy\twg_replacement\n"
            .to_string();
    for i in 0..table.len() {
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            table.taken_at[i].format("%d-%b-%Y %H:%M:%S"),
            table.charge[i],
            table.alct[i],
            table.alct_corrected[i],
            table.cfeb[i],
            table.clct[i],
            table.tmb[i],
            table.wg_noisy[i],
            table.wg_replacement[i],
        ));
    }
    std::fs::write(&args.out, out)
        .wrap_err_with(|| format!("writing {}", args.out.display()))?;

    println!("wrote {} rows to {}", table.len(), args.out.display());
    Ok(())
}
