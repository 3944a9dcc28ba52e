pub mod exec;
pub mod output;

pub use exec::{build_report, exec};
