use crate::libs::device::device::GainStage;
use crate::libs::signal_source::signal_source::SourceMode;

#[derive(Clone, Debug)]
pub enum Message {
    FrequencyChanged(String),
    SampleRateChanged(String),
    GainChanged(GainStage, i32),
    SourceSelected(SourceMode),
    ToggleTransmission,
    // Check on the transmitter between user actions.
    Poll,
    Close,
}
