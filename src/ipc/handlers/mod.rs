/// Unwraps a helper result or returns its error response.
macro_rules! try_param {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(resp) => return resp,
        }
    };
}

pub mod backup;
pub mod cashflow;
pub mod catalog;
pub mod core;
pub mod pricing;
pub mod quotes;
pub mod records;
pub mod setup;
