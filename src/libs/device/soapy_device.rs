use log::{debug, error, info};
use num::Complex;
use soapysdr::Direction::Tx;

use crate::libs::device::device::{DeviceError, FrequencyHz, GainDb, GainStage, SampleRateHz, TransmitDevice, TransmitStream};
use crate::libs::iq::iq::IqSample;

type StreamType = Complex<f32>;

// How long one buffer submission may block before the driver reports failure.
const WRITE_TIMEOUT_US: i64 = 1_000_000;

pub struct SoapySettings<'a> {
    /// Device arguments, e.g. "driver=hackrf"
    pub driver_args: &'a str,
    /// Transmit channel number
    pub channel: usize,
    /// Gain element driven by the intermediate-frequency stage control
    pub if_gain_element: &'a str,
    /// Gain element driven by the radio-frequency stage control
    pub rf_gain_element: &'a str,
}

/// It is annoying to repeat error handling so do that in a macro, which also logs which SoapySDR
/// call failed.
macro_rules! soapycheck {
    ($text:literal, $soapysdr_call:expr) => {
        match $soapysdr_call {
            Ok(ret) => { ret },
            Err(err) => {
                error!("SoapySDR: Failed to {}: {}", $text, err);
                return Err(DeviceError::new($text, err.to_string()));
            }
        }
    }
}

pub struct SoapyTransmitDevice {
    dev: soapysdr::Device,
    channel: usize,
    if_gain_element: String,
    rf_gain_element: String,
}

impl SoapyTransmitDevice {
    pub fn open(settings: &SoapySettings) -> Result<Self, DeviceError> {
        info!("Opening SoapySDR device '{}'", settings.driver_args);
        soapysdr::configure_logging();
        let dev = soapycheck!("open SoapySDR device", soapysdr::Device::new(settings.driver_args));
        Ok(Self {
            dev,
            channel: settings.channel,
            if_gain_element: settings.if_gain_element.to_owned(),
            rf_gain_element: settings.rf_gain_element.to_owned(),
        })
    }
}

impl TransmitDevice for SoapyTransmitDevice {
    fn set_sample_rate(&mut self, sample_rate: SampleRateHz) -> Result<(), DeviceError> {
        debug!("Setting TX sample rate to {}Hz", sample_rate);
        soapycheck!("set TX sample rate", self.dev.set_sample_rate(Tx, self.channel, sample_rate));
        Ok(())
    }

    fn set_frequency(&mut self, frequency: FrequencyHz) -> Result<(), DeviceError> {
        debug!("Setting TX center frequency to {}Hz", frequency);
        soapycheck!("set TX center frequency", self.dev.set_frequency(Tx, self.channel, frequency, soapysdr::Args::new()));
        Ok(())
    }

    fn set_gain(&mut self, stage: GainStage, gain: GainDb) -> Result<(), DeviceError> {
        let element = match stage {
            GainStage::Intermediate => self.if_gain_element.as_str(),
            GainStage::RadioFrequency => self.rf_gain_element.as_str(),
        };
        debug!("Setting TX {} gain element {} to {}dB", stage, element, gain);
        soapycheck!("set TX gain", self.dev.set_gain_element(Tx, self.channel, element, gain as f64));
        Ok(())
    }

    fn tx_stream(&mut self) -> Result<Box<dyn TransmitStream>, DeviceError> {
        debug!("Setting up TX stream on channel {}", self.channel);
        let tx = soapycheck!("setup TX stream", self.dev.tx_stream::<StreamType>(&[self.channel]));
        Ok(Box::new(SoapyTransmitStream { tx }))
    }
}

struct SoapyTransmitStream {
    tx: soapysdr::TxStream<StreamType>,
}

impl TransmitStream for SoapyTransmitStream {
    fn activate(&mut self) -> Result<(), DeviceError> {
        soapycheck!("activate TX stream", self.tx.activate(None));
        Ok(())
    }

    fn write(&mut self, buffer: &[IqSample]) -> Result<(), DeviceError> {
        soapycheck!("write TX stream", self.tx.write_all(&[buffer], None, false, WRITE_TIMEOUT_US));
        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), DeviceError> {
        soapycheck!("deactivate TX stream", self.tx.deactivate(None));
        Ok(())
    }
}

/// Log every attached SoapySDR device; returns how many were found.
pub fn list_devices() -> Result<usize, DeviceError> {
    let devices = soapycheck!("enumerate SoapySDR devices", soapysdr::enumerate(""));
    for (index, args) in devices.iter().enumerate() {
        info!("{}: {}", index, args);
    }
    info!("Number of SoapySDR devices = {}", devices.len());
    Ok(devices.len())
}
