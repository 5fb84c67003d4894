// Triangular frequency-sweep ("chirp") IQ waveform synthesis.
//
// The sweep range is divided into a number of discrete frequency steps. At each step a
// unit-amplitude complex exponential is emitted for the dwell time; the steps are visited in
// ascending order, then in exactly the reverse order, giving a triangle in frequency over time.

use std::convert::TryFrom;
use std::error::Error;
use std::f64::consts::PI;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::path::Path;

use log::{debug, info};

use crate::libs::iq::iq::{BitDepth, encode_cf32, encode_fixed_point, IqFileWriter, IqSample};

pub type SampleRateHz = f64;
pub type FrequencyOffsetHz = f64;

/// The number of samples one ascending half of the triangle is sized to; the step count is this
/// divided by the samples emitted per step.
pub const DEFAULT_SWEEP_SAMPLES: usize = 20_000_000;

#[derive(Debug)]
pub enum ChirpError {
    InvalidArgument(String),
    Io(std::io::Error),
}

impl Display for ChirpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ChirpError::InvalidArgument(message) => write!(f, "Invalid argument: {}", message),
            ChirpError::Io(err) => write!(f, "Could not write chirp file: {}", err),
        }
    }
}

impl Error for ChirpError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ChirpError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ChirpError {
    fn from(err: std::io::Error) -> Self {
        ChirpError::Io(err)
    }
}

#[readonly::make]
#[derive(Debug, Clone, PartialEq)]
pub struct ChirpParameters {
    pub sample_rate: SampleRateHz,
    pub f_min: FrequencyOffsetHz,
    pub f_max: FrequencyOffsetHz,
    /// Seconds spent at each frequency step.
    pub dwell_time: f64,
    pub bit_depth: BitDepth,
    pub sweep_samples: usize,
    samples_per_step: usize,
    step_count: usize,
}

impl ChirpParameters {
    /// Validates everything up front, so nothing is written for a bad request.
    pub fn new(sample_rate: SampleRateHz, f_min: FrequencyOffsetHz, f_max: FrequencyOffsetHz,
               dwell_time: f64, bit_depth: u32) -> Result<Self, ChirpError> {
        let bit_depth = BitDepth::try_from(bit_depth).map_err(ChirpError::InvalidArgument)?;
        Self::with_bit_depth(sample_rate, f_min, f_max, dwell_time, bit_depth, DEFAULT_SWEEP_SAMPLES)
    }

    pub fn with_sweep_samples(&self, sweep_samples: usize) -> Result<Self, ChirpError> {
        Self::with_bit_depth(self.sample_rate, self.f_min, self.f_max, self.dwell_time, self.bit_depth, sweep_samples)
    }

    fn with_bit_depth(sample_rate: SampleRateHz, f_min: FrequencyOffsetHz, f_max: FrequencyOffsetHz,
                      dwell_time: f64, bit_depth: BitDepth, sweep_samples: usize) -> Result<Self, ChirpError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(ChirpError::InvalidArgument(format!("sample rate must be positive, not {}", sample_rate)));
        }
        if !(dwell_time.is_finite() && dwell_time > 0.0) {
            return Err(ChirpError::InvalidArgument(format!("dwell time must be positive, not {}", dwell_time)));
        }
        if !(f_min.is_finite() && f_max.is_finite()) {
            return Err(ChirpError::InvalidArgument("frequency range must be finite".to_owned()));
        }
        let samples_per_step = (dwell_time * sample_rate) as usize;
        if samples_per_step == 0 {
            return Err(ChirpError::InvalidArgument(format!("dwell time {}s is shorter than one sample at {}Hz", dwell_time, sample_rate)));
        }
        let step_count = sweep_samples / samples_per_step;
        if step_count == 0 {
            return Err(ChirpError::InvalidArgument(format!("sweep of {} samples cannot hold a step of {} samples", sweep_samples, samples_per_step)));
        }
        Ok(Self {
            sample_rate,
            f_min,
            f_max,
            dwell_time,
            bit_depth,
            sweep_samples,
            samples_per_step,
            step_count,
        })
    }

    pub fn samples_per_step(&self) -> usize {
        self.samples_per_step
    }

    /// Number of distinct frequencies in one (ascending) half of the triangle.
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Both halves of the triangle.
    pub fn total_samples(&self) -> usize {
        2 * self.step_count * self.samples_per_step
    }

    pub fn total_bytes(&self) -> usize {
        self.total_samples() * self.bit_depth.bytes_per_sample()
    }
}

/// step_count frequencies evenly spaced from f_min to f_max inclusive. A range given high to low
/// sweeps downward.
pub fn frequency_steps(params: &ChirpParameters) -> Vec<FrequencyOffsetHz> {
    let n = params.step_count();
    if n == 1 {
        return vec![params.f_min];
    }
    let spacing = (params.f_max - params.f_min) / (n - 1) as f64;
    let mut steps: Vec<FrequencyOffsetHz> = (0..n).map(|i| params.f_min + i as f64 * spacing).collect();
    // Land exactly on the end of the range.
    steps[n - 1] = params.f_max;
    steps
}

/// The steps followed by their exact reverse.
pub fn frequency_pattern(params: &ChirpParameters) -> Vec<FrequencyOffsetHz> {
    let ascending = frequency_steps(params);
    let mut pattern = ascending.clone();
    pattern.extend(ascending.iter().rev());
    pattern
}

/// One dwell at a single frequency offset; the phase starts at zero.
pub fn synthesize_step(frequency: FrequencyOffsetHz, sample_rate: SampleRateHz, samples: usize) -> Vec<IqSample> {
    (0..samples).map(|n| {
        let phase = 2.0 * PI * frequency * (n as f64 / sample_rate);
        IqSample::new(phase.cos() as f32, phase.sin() as f32)
    }).collect()
}

pub fn synthesize(params: &ChirpParameters) -> Vec<IqSample> {
    let mut signal = Vec::with_capacity(params.total_samples());
    for frequency in frequency_pattern(params) {
        signal.extend(synthesize_step(frequency, params.sample_rate, params.samples_per_step()));
    }
    signal
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChirpSummary {
    pub samples: usize,
    pub bytes: usize,
    pub steps: usize,
}

/// Synthesize the chirp and write it as interleaved fixed-point IQ at the requested bit depth.
pub fn generate_chirp_file(path: &Path, params: &ChirpParameters) -> Result<ChirpSummary, ChirpError> {
    let bit_depth = params.bit_depth;
    write_chirp(path, params, |samples| encode_fixed_point(samples, bit_depth))
}

/// Convenience over ChirpParameters::new + generate_chirp_file with the default sweep.
pub fn generate_chirp(path: &Path, sample_rate: SampleRateHz, f_min: FrequencyOffsetHz, f_max: FrequencyOffsetHz,
                      dwell_time: f64, bit_depth: u32) -> Result<ChirpSummary, ChirpError> {
    let params = ChirpParameters::new(sample_rate, f_min, f_max, dwell_time, bit_depth)?;
    generate_chirp_file(path, &params)
}

/// As generate_chirp_file, but as complex f32, loadable as a transmit buffer.
pub fn generate_chirp_cf32_file(path: &Path, params: &ChirpParameters) -> Result<ChirpSummary, ChirpError> {
    write_chirp(path, params, encode_cf32)
}

// The full buffer can be hundreds of megabytes, so each step is encoded and written as it is
// synthesized.
fn write_chirp<E>(path: &Path, params: &ChirpParameters, encode: E) -> Result<ChirpSummary, ChirpError>
    where E: Fn(&[IqSample]) -> Vec<u8>
{
    let pattern = frequency_pattern(params);
    debug!("Chirp of {} steps of {} samples, {}Hz to {}Hz at {}Hz", pattern.len(),
           params.samples_per_step(), params.f_min, params.f_max, params.sample_rate);
    let mut writer = IqFileWriter::create(path)?;
    for frequency in pattern.iter() {
        let step = synthesize_step(*frequency, params.sample_rate, params.samples_per_step());
        writer.write_block(&encode(&step))?;
    }
    let bytes = writer.finish()?;
    let summary = ChirpSummary {
        samples: pattern.len() * params.samples_per_step(),
        bytes,
        steps: pattern.len(),
    };
    info!("Chirp signal saved to {:?}: {} samples, {} bytes", path, summary.samples, summary.bytes);
    Ok(summary)
}

#[cfg(test)]
#[path = "./chirp_spec.rs"]
mod chirp_spec;
