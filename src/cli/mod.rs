//! Command-line surface: argument parsing and result rendering

pub mod args;
pub mod output;
