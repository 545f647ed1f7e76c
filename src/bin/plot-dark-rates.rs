use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use eyre::{Result, WrapErr};

use gif_rates::{
    charge, dump,
    plot::{self, RenderOptions, XMode},
    rates::{self, ComputeOptions},
    test11,
};

/// Plot TMB dump dark rates over time or accumulated charge for a chosen CLCT.
///
/// Input text files are produced by dumping the TMB database query output;
/// the charge history comes from the CSC dose monitor. Check the inputs for
/// database errors and measurement outliers before running, and make sure
/// every HV0 measurement has exactly one corresponding 0V measurement.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
struct Args {
    /// CLCT channel to plot, available numbers are 14-20
    #[clap(long, default_value_t = 16, value_parser = clap::value_parser!(u8).range(14..=20))]
    clctnum: u8,

    /// Ignore measurements before this date, written as DD MON YYYY
    #[clap(long, default_value = "01 SEP 2015")]
    startdate: String,

    /// Plot with time as the x axis as opposed to charge
    #[clap(long)]
    timeplot: bool,

    /// Offset charges by the 2% CF4 total so they line up with the 10% CF4
    /// baseline
    #[clap(long)]
    tenpctzero: bool,

    /// Fixed axis windows for validating against the old results
    #[clap(long)]
    validatewithold: bool,

    /// Plot problem WG 5 in layer 5 against normal WG 4
    #[clap(long)]
    plotproblem: bool,

    /// Overlay the CFEB and CLCT cathode rates
    #[clap(long)]
    plotcathodes: bool,

    /// Label used in the output file name
    #[clap(long, default_value = "Sept17-Jun21")]
    plotname: String,

    /// Compare Test 11 ALCT rates with TMB dump ALCT rates (Test 11 is still
    /// used for the noisy-WG correction regardless)
    #[clap(long)]
    test11compare: bool,

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
            with_cathodes: args.plotcathodes,
            test11_compare: args.test11compare,
        },
    )?;

    let opts = RenderOptions {
        x_mode: if args.timeplot { XMode::Time } else { XMode::Charge },
        plot_name: args.plotname.clone(),
        validate_with_old: args.validatewithold,
        clct: args.clctnum,
    };

    let written = if args.test11compare {
        plot::render_test11_compare(&table, &opts)?
    } else if args.plotproblem {
        plot::render_problem_wg(&table, &opts)?
    } else {
        plot::render_dark_rates(&table, &opts, args.plotcathodes)?
    };

    println!("wrote {}", written.display());
    Ok(())
}
