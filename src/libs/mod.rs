pub mod chirp;
pub mod config_dir;
pub mod config_file;
pub mod control_panel;
pub mod device;
pub mod gui;
pub mod iq;
pub mod signal_source;
pub mod transmitter;
pub mod util;
