pub mod api;
pub mod exchange;
pub mod restcountries;

pub use api::{CountryBody, MessageBody, RefreshReportBody, StatusBody};
pub use exchange::RawRateTable;
pub use restcountries::{RawCountry, RawCurrency};
