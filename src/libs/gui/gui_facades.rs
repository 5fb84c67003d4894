use std::path::PathBuf;

use crate::libs::device::device::{GainDb, GainStage};
use crate::libs::signal_source::signal_source::SourceMode;
use crate::libs::transmitter::transmitter::TransmitState;

// The GUI controls can effect changes in the rest of the system via this facade...
pub trait GUIOutput {
    fn frequency_changed(&mut self, text: &str);
    fn sample_rate_changed(&mut self, text: &str);
    /// Returns the gain actually applied, for display.
    fn gain_changed(&mut self, stage: GainStage, gain: i32) -> GainDb;
    /// Returns the mode now in effect, which may not be the one asked for.
    fn source_selected(&mut self, mode: SourceMode, pick_file: &mut dyn FnMut() -> Option<PathBuf>) -> SourceMode;
    fn toggle_transmission(&mut self);
    fn poll(&mut self);
    fn close(&mut self);

    // ...and the GUI reflects the state of the rest of the system via these.
    fn status(&self) -> String;
    fn transmit_state(&self) -> TransmitState;
}
