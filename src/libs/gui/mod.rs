pub mod gui_facades;
pub mod message;
#[cfg(feature = "gui")]
pub mod gui;
