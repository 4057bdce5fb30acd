mod meridian;

pub use meridian::{ApiErrorBody, ApiErrorObject, ErrorKind, MeridianError};
