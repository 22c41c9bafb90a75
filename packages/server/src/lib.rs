// Cats Social - match request core
//
// Backend for introducing cats owned by different users. The matching domain
// owns the request lifecycle (propose, decide, withdraw) and its eligibility
// rules; cats and users are read through directory traits in kernel/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
