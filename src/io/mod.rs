//! On-disk formats owned by the crate

pub mod state_file;
