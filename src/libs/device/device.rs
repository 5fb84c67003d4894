use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, info};

use crate::libs::iq::iq::IqSample;

pub type FrequencyHz = f64;
pub type SampleRateHz = f64;
pub type GainDb = u8;

pub const MIN_GAIN: GainDb = 0;
pub const MAX_GAIN: GainDb = 47;

/// The null device refuses anything slower than this.
pub const MIN_NULL_SAMPLE_RATE: SampleRateHz = 1.0;

// Longest single write the null stream will sleep for.
const MAX_PACING_SECONDS: f64 = 86_400.0;

/// The two independently adjustable amplification points on the transmit chain.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum GainStage {
    Intermediate,
    RadioFrequency,
}

impl Display for GainStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            GainStage::Intermediate => write!(f, "IF"),
            GainStage::RadioFrequency => write!(f, "RF"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceError {
    pub operation: String,
    pub message: String,
}

impl DeviceError {
    pub fn new(operation: &str, message: String) -> Self {
        Self { operation: operation.to_owned(), message }
    }
}

impl Display for DeviceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to {}: {}", self.operation, self.message)
    }
}

impl Error for DeviceError {}

// The configuration side of a transmit-capable radio. Only the control surface calls these.
#[cfg_attr(test, mockall::automock)]
pub trait TransmitDevice: Send {
    fn set_sample_rate(&mut self, sample_rate: SampleRateHz) -> Result<(), DeviceError>;
    fn set_frequency(&mut self, frequency: FrequencyHz) -> Result<(), DeviceError>;
    fn set_gain(&mut self, stage: GainStage, gain: GainDb) -> Result<(), DeviceError>;
    /// Set up the transmit stream, for complex f32 samples. Dropping it closes it.
    fn tx_stream(&mut self) -> Result<Box<dyn TransmitStream>, DeviceError>;
}

// The streaming side. Owned by whichever thread is writing.
#[cfg_attr(test, mockall::automock)]
pub trait TransmitStream: Send {
    fn activate(&mut self) -> Result<(), DeviceError>;
    /// Blocks until the whole buffer has been accepted by the device.
    fn write(&mut self, buffer: &[IqSample]) -> Result<(), DeviceError>;
    fn deactivate(&mut self) -> Result<(), DeviceError>;
}

/// A device without hardware: settings are accepted and logged, and writes take as long as the
/// buffer would take to send at the configured sample rate.
pub struct NullTransmitDevice {
    sample_rate: Arc<Mutex<SampleRateHz>>,
    samples_written: Arc<AtomicU64>,
}

impl NullTransmitDevice {
    pub fn new() -> Self {
        info!("Using the null transmit device; nothing will be sent");
        Self {
            sample_rate: Arc::new(Mutex::new(0.0)),
            samples_written: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written.load(Ordering::SeqCst)
    }
}

impl Default for NullTransmitDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl TransmitDevice for NullTransmitDevice {
    fn set_sample_rate(&mut self, sample_rate: SampleRateHz) -> Result<(), DeviceError> {
        debug!("Null device sample rate {}Hz", sample_rate);
        if !sample_rate.is_finite() || sample_rate < MIN_NULL_SAMPLE_RATE {
            return Err(DeviceError::new("set sample rate", format!("{}Hz is out of range", sample_rate)));
        }
        match self.sample_rate.lock() {
            Ok(mut locked) => { *locked = sample_rate; }
            Err(_) => { return Err(DeviceError::new("set sample rate", "poisoned lock".to_owned())); }
        }
        Ok(())
    }

    fn set_frequency(&mut self, frequency: FrequencyHz) -> Result<(), DeviceError> {
        debug!("Null device frequency {}Hz", frequency);
        Ok(())
    }

    fn set_gain(&mut self, stage: GainStage, gain: GainDb) -> Result<(), DeviceError> {
        debug!("Null device {} gain {}dB", stage, gain);
        Ok(())
    }

    fn tx_stream(&mut self) -> Result<Box<dyn TransmitStream>, DeviceError> {
        Ok(Box::new(NullTransmitStream {
            sample_rate: self.sample_rate.clone(),
            samples_written: self.samples_written.clone(),
        }))
    }
}

// How long sending `samples` takes at `sample_rate`; an error rather than a panic when that
// can't be represented.
fn pacing_delay(samples: usize, sample_rate: SampleRateHz) -> Result<Duration, DeviceError> {
    let seconds = samples as f64 / sample_rate;
    if !seconds.is_finite() || seconds < 0.0 || seconds > MAX_PACING_SECONDS {
        return Err(DeviceError::new("write stream", format!("{} samples at {}Hz cannot be paced", samples, sample_rate)));
    }
    Ok(Duration::from_secs_f64(seconds))
}

struct NullTransmitStream {
    sample_rate: Arc<Mutex<SampleRateHz>>,
    samples_written: Arc<AtomicU64>,
}

impl TransmitStream for NullTransmitStream {
    fn activate(&mut self) -> Result<(), DeviceError> {
        debug!("Null stream activated");
        Ok(())
    }

    fn write(&mut self, buffer: &[IqSample]) -> Result<(), DeviceError> {
        let sample_rate = match self.sample_rate.lock() {
            Ok(locked) => *locked,
            Err(_) => { return Err(DeviceError::new("write stream", "poisoned lock".to_owned())); }
        };
        if sample_rate <= 0.0 {
            return Err(DeviceError::new("write stream", "no sample rate set".to_owned()));
        }
        spin_sleep::sleep(pacing_delay(buffer.len(), sample_rate)?);
        self.samples_written.fetch_add(buffer.len() as u64, Ordering::SeqCst);
        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), DeviceError> {
        debug!("Null stream deactivated after {} samples", self.samples_written.load(Ordering::SeqCst));
        Ok(())
    }
}

#[cfg(test)]
#[path = "./device_spec.rs"]
mod device_spec;
