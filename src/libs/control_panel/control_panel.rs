use std::path::PathBuf;

use log::{debug, error, info, warn};

use crate::libs::config_file::config_file::PanelSettings;
use crate::libs::device::device::{FrequencyHz, GainDb, GainStage, MAX_GAIN, MIN_GAIN};
use crate::libs::gui::gui_facades::GUIOutput;
use crate::libs::signal_source::signal_source::{build_buffer, SourceMode, SourceSelector, ToneParameters};
use crate::libs::transmitter::transmitter::{TransmitState, Transmitter};

pub const IDLE_STATUS: &str = "Status: Idle";
pub const TRANSMITTING_STATUS: &str = "Status: Transmitting";
pub const INVALID_FREQUENCY_STATUS: &str = "Error: Invalid frequency input";
pub const INVALID_SAMPLE_RATE_STATUS: &str = "Error: Invalid sample rate input";

pub const START_LABEL: &str = "Start Transmission";
pub const STOP_LABEL: &str = "Stop Transmission";

pub fn button_label(state: TransmitState) -> &'static str {
    match state {
        TransmitState::Idle => START_LABEL,
        TransmitState::Transmitting => STOP_LABEL,
    }
}

/// Parse a value typed in MHz, giving Hz. Rejects anything that isn't finite, or is under 1Hz.
pub fn parse_mhz(text: &str) -> Option<f64> {
    let hz = text.trim().parse::<f64>().ok()? * 1e6;
    if hz.is_finite() && hz >= 1.0 { Some(hz) } else { None }
}

pub fn format_mhz(mhz: f64) -> String {
    format!("{}", mhz)
}

pub fn clamp_gain(gain: i32) -> GainDb {
    gain.clamp(MIN_GAIN as i32, MAX_GAIN as i32) as GainDb
}

/// The state behind the control panel's widgets. Owns the transmitter; the GUI only sees this
/// through the GUIOutput facade.
pub struct ControlPanel {
    transmitter: Transmitter,
    tone: ToneParameters,
    selector: SourceSelector,
    frequency_text: String,
    sample_rate_text: String,
    if_gain: GainDb,
    rf_gain: GainDb,
    status: String,
}

impl ControlPanel {
    /// The configured start-up gains are applied to the device straight away.
    pub fn new(transmitter: Transmitter, settings: &PanelSettings, tone: ToneParameters) -> Self {
        let mut panel = Self {
            transmitter,
            tone,
            selector: SourceSelector::new(),
            frequency_text: format_mhz(settings.frequency_mhz),
            sample_rate_text: format_mhz(settings.sample_rate_mhz),
            if_gain: clamp_gain(settings.if_gain as i32),
            rf_gain: clamp_gain(settings.rf_gain as i32),
            status: IDLE_STATUS.to_owned(),
        };
        for (stage, gain) in [(GainStage::Intermediate, panel.if_gain), (GainStage::RadioFrequency, panel.rf_gain)] {
            if let Err(err) = panel.transmitter.set_gain(stage, gain) {
                warn!("Could not apply initial {} gain: {}", stage, err);
                panel.status = format!("Error: {}", err);
            }
        }
        panel
    }

    pub fn frequency_text(&self) -> &str {
        &self.frequency_text
    }

    pub fn sample_rate_text(&self) -> &str {
        &self.sample_rate_text
    }

    pub fn gain(&self, stage: GainStage) -> GainDb {
        match stage {
            GainStage::Intermediate => self.if_gain,
            GainStage::RadioFrequency => self.rf_gain,
        }
    }

    pub fn source_mode(&self) -> SourceMode {
        self.selector.mode()
    }

    pub fn button_label(&self) -> &'static str {
        button_label(self.transmitter.state())
    }

    fn start(&mut self) {
        let frequency: FrequencyHz = match parse_mhz(&self.frequency_text) {
            Some(hz) => hz,
            None => {
                self.status = INVALID_FREQUENCY_STATUS.to_owned();
                return;
            }
        };
        let sample_rate = match parse_mhz(&self.sample_rate_text) {
            Some(hz) => hz,
            None => {
                self.status = INVALID_SAMPLE_RATE_STATUS.to_owned();
                return;
            }
        };
        let buffer = match build_buffer(self.selector.source(), &self.tone, sample_rate) {
            Ok(buffer) => buffer,
            Err(message) => {
                warn!("{}", message);
                self.status = format!("Error: {}", message);
                return;
            }
        };
        match self.transmitter.start(sample_rate, frequency, buffer) {
            Ok(()) => {
                self.status = TRANSMITTING_STATUS.to_owned();
            }
            Err(err) => {
                error!("Could not start transmission: {}", err);
                self.status = format!("Error: {}", err);
            }
        }
    }
}

impl GUIOutput for ControlPanel {
    fn frequency_changed(&mut self, text: &str) {
        self.frequency_text = text.to_owned();
        match parse_mhz(text) {
            Some(hz) => {
                if let Err(err) = self.transmitter.set_frequency(hz) {
                    error!("{}", err);
                    self.status = format!("Error: {}", err);
                }
            }
            None => {
                debug!("Ignoring frequency {:?}", text);
                self.status = INVALID_FREQUENCY_STATUS.to_owned();
            }
        }
    }

    fn sample_rate_changed(&mut self, text: &str) {
        // Applied on the next start.
        self.sample_rate_text = text.to_owned();
    }

    fn gain_changed(&mut self, stage: GainStage, gain: i32) -> GainDb {
        let gain = clamp_gain(gain);
        match stage {
            GainStage::Intermediate => self.if_gain = gain,
            GainStage::RadioFrequency => self.rf_gain = gain,
        }
        if let Err(err) = self.transmitter.set_gain(stage, gain) {
            error!("{}", err);
            self.status = format!("Error: {}", err);
        }
        gain
    }

    fn source_selected(&mut self, mode: SourceMode, pick_file: &mut dyn FnMut() -> Option<PathBuf>) -> SourceMode {
        if let Some(status) = self.selector.select(mode, || pick_file()) {
            self.status = status;
        }
        self.selector.mode()
    }

    fn toggle_transmission(&mut self) {
        match self.transmitter.state() {
            TransmitState::Idle => self.start(),
            TransmitState::Transmitting => {
                self.transmitter.stop();
                self.status = IDLE_STATUS.to_owned();
            }
        }
    }

    fn poll(&mut self) {
        if let Some(fault) = self.transmitter.take_fault() {
            self.status = format!("Error: {}", fault);
        }
    }

    fn close(&mut self) {
        info!("Closing control panel");
        self.transmitter.shutdown();
    }

    fn status(&self) -> String {
        self.status.clone()
    }

    fn transmit_state(&self) -> TransmitState {
        self.transmitter.state()
    }
}

#[cfg(test)]
#[path = "./control_panel_spec.rs"]
mod control_panel_spec;
