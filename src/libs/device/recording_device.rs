// A device double that records every call, in order, for the transmitter and control panel specs.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::libs::device::device::{DeviceError, FrequencyHz, GainDb, GainStage, SampleRateHz, TransmitDevice, TransmitStream};
use crate::libs::iq::iq::IqSample;
use crate::libs::util::test_util;

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    SampleRate(SampleRateHz),
    Frequency(FrequencyHz),
    Gain(GainStage, GainDb),
    StreamSetup,
    Activate,
    Write(usize),
    Deactivate,
    StreamClosed,
}

pub type EventLog = Arc<Mutex<Vec<DeviceEvent>>>;

pub struct RecordingTransmitDevice {
    events: EventLog,
    fail_writes: Arc<AtomicBool>,
}

impl RecordingTransmitDevice {
    pub fn new() -> (Self, EventLog, Arc<AtomicBool>) {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let fail_writes = Arc::new(AtomicBool::new(false));
        (Self { events: events.clone(), fail_writes: fail_writes.clone() }, events, fail_writes)
    }

    fn record(&self, event: DeviceEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl TransmitDevice for RecordingTransmitDevice {
    fn set_sample_rate(&mut self, sample_rate: SampleRateHz) -> Result<(), DeviceError> {
        self.record(DeviceEvent::SampleRate(sample_rate));
        Ok(())
    }

    fn set_frequency(&mut self, frequency: FrequencyHz) -> Result<(), DeviceError> {
        self.record(DeviceEvent::Frequency(frequency));
        Ok(())
    }

    fn set_gain(&mut self, stage: GainStage, gain: GainDb) -> Result<(), DeviceError> {
        self.record(DeviceEvent::Gain(stage, gain));
        Ok(())
    }

    fn tx_stream(&mut self) -> Result<Box<dyn TransmitStream>, DeviceError> {
        self.record(DeviceEvent::StreamSetup);
        Ok(Box::new(RecordingTransmitStream {
            events: self.events.clone(),
            fail_writes: self.fail_writes.clone(),
        }))
    }
}

struct RecordingTransmitStream {
    events: EventLog,
    fail_writes: Arc<AtomicBool>,
}

impl TransmitStream for RecordingTransmitStream {
    fn activate(&mut self) -> Result<(), DeviceError> {
        self.events.lock().unwrap().push(DeviceEvent::Activate);
        Ok(())
    }

    fn write(&mut self, buffer: &[IqSample]) -> Result<(), DeviceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DeviceError::new("write stream", "device unplugged".to_owned()));
        }
        self.events.lock().unwrap().push(DeviceEvent::Write(buffer.len()));
        // Stand in for the time a real device blocks.
        test_util::wait_n_ms(1);
        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), DeviceError> {
        self.events.lock().unwrap().push(DeviceEvent::Deactivate);
        Ok(())
    }
}

impl Drop for RecordingTransmitStream {
    fn drop(&mut self) {
        if let Ok(mut events) = self.events.lock() {
            events.push(DeviceEvent::StreamClosed);
        }
    }
}

pub fn writes(events: &EventLog) -> usize {
    events.lock().unwrap().iter().filter(|e| matches!(e, DeviceEvent::Write(_))).count()
}

pub fn position(events: &EventLog, wanted: &DeviceEvent) -> Option<usize> {
    events.lock().unwrap().iter().position(|e| e == wanted)
}

pub fn first_write(events: &EventLog) -> Option<usize> {
    events.lock().unwrap().iter().position(|e| matches!(e, DeviceEvent::Write(_)))
}

pub fn last_write(events: &EventLog) -> Option<usize> {
    events.lock().unwrap().iter().rposition(|e| matches!(e, DeviceEvent::Write(_)))
}
