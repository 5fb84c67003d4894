pub mod signal_source;
