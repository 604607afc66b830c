//! Concrete adapter implementations for ports, plus the tape file codec.

pub mod tape_file_adapter;
pub mod file_config_adapter;
pub mod csv_quote_adapter;
#[cfg(feature = "fetch")]
pub mod marketstack_adapter;
