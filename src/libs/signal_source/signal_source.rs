use std::f64::consts::PI;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_derive::{Deserialize, Serialize};

use crate::libs::device::device::SampleRateHz;
use crate::libs::iq::iq::{IqSample, read_cf32_file};

pub const CONTINUOUS_WAVE_LABEL: &str = "Continuous Wave (CW)";
pub const FILE_LABEL: &str = "Load from .bin File";

/// The low audio-rate tone modulated onto the carrier in continuous wave mode.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct ToneParameters {
    pub amplitude: f32,
    pub tone_frequency_hz: f64,
    pub length: usize,
}

impl Default for ToneParameters {
    fn default() -> Self {
        Self {
            amplitude: 0.5,
            tone_frequency_hz: 1000.0,
            length: 1024,
        }
    }
}

pub fn generate_tone(tone: &ToneParameters, sample_rate: SampleRateHz) -> Vec<IqSample> {
    (0..tone.length).map(|n| {
        let phase = 2.0 * PI * tone.tone_frequency_hz * (n as f64 / sample_rate);
        IqSample::new(phase.cos() as f32, phase.sin() as f32) * tone.amplitude
    }).collect()
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum SourceMode {
    ContinuousWave,
    File,
}

impl SourceMode {
    /// Position in the source dropdown.
    pub fn index(&self) -> i32 {
        match self {
            SourceMode::ContinuousWave => 0,
            SourceMode::File => 1,
        }
    }

    pub fn from_index(index: i32) -> Option<SourceMode> {
        match index {
            0 => Some(SourceMode::ContinuousWave),
            1 => Some(SourceMode::File),
            _ => None,
        }
    }
}

impl Display for SourceMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SourceMode::ContinuousWave => write!(f, "{}", CONTINUOUS_WAVE_LABEL),
            SourceMode::File => write!(f, "{}", FILE_LABEL),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum SignalSource {
    ContinuousWave,
    File(PathBuf),
}

impl SignalSource {
    pub fn mode(&self) -> SourceMode {
        match self {
            SignalSource::ContinuousWave => SourceMode::ContinuousWave,
            SignalSource::File(_) => SourceMode::File,
        }
    }
}

/// Build the buffer the transmit loop will send, either the generated tone or a cf32 file loaded
/// verbatim.
pub fn build_buffer(source: &SignalSource, tone: &ToneParameters, sample_rate: SampleRateHz) -> Result<Vec<IqSample>, String> {
    match source {
        SignalSource::ContinuousWave => {
            debug!("Generating {} samples of a {}Hz tone at {}Hz", tone.length, tone.tone_frequency_hz, sample_rate);
            let buffer = generate_tone(tone, sample_rate);
            if buffer.is_empty() {
                return Err("The continuous wave tone has no samples".to_owned());
            }
            Ok(buffer)
        }
        SignalSource::File(path) => {
            let buffer = read_cf32_file(path)
                .map_err(|err| format!("Could not load {}: {}", display_name(path), err))?;
            info!("Loaded {} samples from {:?}", buffer.len(), path);
            Ok(buffer)
        }
    }
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Tracks the chosen source. File mode needs a picked file; a cancelled pick falls back to the
/// continuous wave.
pub struct SourceSelector {
    source: SignalSource,
}

impl SourceSelector {
    pub fn new() -> Self {
        Self { source: SignalSource::ContinuousWave }
    }

    pub fn source(&self) -> &SignalSource {
        &self.source
    }

    pub fn mode(&self) -> SourceMode {
        self.source.mode()
    }

    /// The picker is only consulted for file mode. Returns the status text to show, if any.
    pub fn select<P>(&mut self, mode: SourceMode, pick_file: P) -> Option<String>
        where P: FnOnce() -> Option<PathBuf>
    {
        match mode {
            SourceMode::ContinuousWave => {
                self.source = SignalSource::ContinuousWave;
                None
            }
            SourceMode::File => {
                match pick_file() {
                    Some(path) => {
                        let status = format!("Loaded file: {}", display_name(&path));
                        info!("Signal source is {:?}", path);
                        self.source = SignalSource::File(path);
                        Some(status)
                    }
                    None => {
                        debug!("No file picked; reverting to {}", SourceMode::ContinuousWave);
                        self.source = SignalSource::ContinuousWave;
                        None
                    }
                }
            }
        }
    }
}

impl Default for SourceSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "./signal_source_spec.rs"]
mod signal_source_spec;
