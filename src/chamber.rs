// ME1/1 chamber and measurement constants shared by the binaries.

/// Anode layers per chamber.
pub const LAYERS: usize = 6;

/// Wall-clock length of a Test 11 dump, in seconds.
pub const TEST11_DUMP_SECS: f64 = 30.0;

/// Electrically noisy wire group in layer 5. Its rate is swapped out for the
/// rate of [`REPLACEMENT_WIRE_GROUP`] when correcting the ALCT dark rate.
pub const NOISY_WIRE_GROUP: usize = 5;

/// Quiet neighbor of [`NOISY_WIRE_GROUP`] used as the replacement.
pub const REPLACEMENT_WIRE_GROUP: usize = 4;

/// Charge accumulated over the 2% CF4 running period, in mC/cm. Added to
/// every charge sample when plotting against the full 10% CF4 history.
pub const TEN_PCT_CHARGE_OFFSET: f64 = 330.0;

/// Header lines before the first measurement in a TMB dump file.
pub const DUMP_PREAMBLE_LINES: usize = 6;

/// Timestamp format used by the TMB dump files, e.g. `01-Sep-2017, 12:00:00`.
pub const DUMP_DATETIME_FORMAT: &str = "%d-%b-%Y, %H:%M:%S";
