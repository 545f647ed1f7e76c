pub mod chamber;
pub mod charge;
pub mod dump;
pub mod plot;
pub mod rates;
pub mod test11;

pub use dump::MeasurementRow;
pub use rates::RateTable;
