use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::thread::JoinHandle;

use log::{debug, error, info, warn};

use crate::libs::device::device::{DeviceError, FrequencyHz, GainDb, GainStage, SampleRateHz, TransmitDevice, TransmitStream};
use crate::libs::iq::iq::IqSample;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum TransmitState {
    Idle,
    Transmitting,
}

impl Display for TransmitState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TransmitState::Idle => write!(f, "Idle"),
            TransmitState::Transmitting => write!(f, "Transmitting"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransmitError {
    AlreadyTransmitting,
    EmptyBuffer,
    Closed,
    Device(DeviceError),
    Spawn(String),
}

impl Display for TransmitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TransmitError::AlreadyTransmitting => write!(f, "Already transmitting"),
            TransmitError::EmptyBuffer => write!(f, "Signal buffer is empty"),
            TransmitError::Closed => write!(f, "The device has been closed"),
            TransmitError::Device(err) => write!(f, "{}", err),
            TransmitError::Spawn(err) => write!(f, "Could not start transmit thread: {}", err),
        }
    }
}

impl Error for TransmitError {}

impl From<DeviceError> for TransmitError {
    fn from(err: DeviceError) -> Self {
        TransmitError::Device(err)
    }
}

// What the transmit thread hands back when it exits: the stream it borrowed, and why it stopped
// if that wasn't a request.
struct SessionEnd {
    stream: Box<dyn TransmitStream>,
    fault: Option<DeviceError>,
}

struct TransmitSession {
    stop_flag: Arc<AtomicBool>,
    thread_handle: JoinHandle<SessionEnd>,
}

/// Sole owner of the device, its transmit stream, and at most one transmit session.
///
/// Configuration calls go through the device from the caller's thread. While a session runs, its
/// thread owns the stream and writes the whole buffer repeatedly; stopping joins that thread and
/// takes the stream back, so the stream can only be deactivated and closed once nothing can
/// write to it.
pub struct Transmitter {
    device: Option<Box<dyn TransmitDevice>>,
    stream: Option<Box<dyn TransmitStream>>,
    stream_active: bool,
    session: Option<TransmitSession>,
    terminate_flag: Arc<AtomicBool>,
    fault: Option<DeviceError>,
}

impl Transmitter {
    /// Sets up the transmit stream straight away; it is activated on the first start.
    pub fn new(mut device: Box<dyn TransmitDevice>, terminate_flag: Arc<AtomicBool>) -> Result<Self, DeviceError> {
        let stream = device.tx_stream()?;
        debug!("Transmit stream set up");
        Ok(Self {
            device: Some(device),
            stream: Some(stream),
            stream_active: false,
            session: None,
            terminate_flag,
            fault: None,
        })
    }

    fn device(&mut self) -> Result<&mut Box<dyn TransmitDevice>, TransmitError> {
        self.device.as_mut().ok_or(TransmitError::Closed)
    }

    pub fn set_frequency(&mut self, frequency: FrequencyHz) -> Result<(), TransmitError> {
        info!("Setting frequency to {}Hz", frequency);
        self.device()?.set_frequency(frequency)?;
        Ok(())
    }

    pub fn set_sample_rate(&mut self, sample_rate: SampleRateHz) -> Result<(), TransmitError> {
        info!("Setting sample rate to {}Hz", sample_rate);
        self.device()?.set_sample_rate(sample_rate)?;
        Ok(())
    }

    pub fn set_gain(&mut self, stage: GainStage, gain: GainDb) -> Result<(), TransmitError> {
        info!("Setting {} gain to {}dB", stage, gain);
        self.device()?.set_gain(stage, gain)?;
        Ok(())
    }

    /// Transmitting while a session thread exists and has not exited.
    pub fn is_transmitting(&self) -> bool {
        match &self.session {
            None => false,
            Some(session) => !session.thread_handle.is_finished(),
        }
    }

    pub fn state(&self) -> TransmitState {
        if self.is_transmitting() { TransmitState::Transmitting } else { TransmitState::Idle }
    }

    /// Configure the device, then send the buffer continuously from a new thread until stopped.
    /// Only permitted when no session is running.
    pub fn start(&mut self, sample_rate: SampleRateHz, frequency: FrequencyHz, buffer: Vec<IqSample>) -> Result<(), TransmitError> {
        if self.is_transmitting() {
            return Err(TransmitError::AlreadyTransmitting);
        }
        // A session that ended on its own still has to be joined to get the stream back.
        self.reap();
        if let Some(stale) = self.fault.take() {
            warn!("Discarding fault from the previous session: {}", stale);
        }
        if buffer.is_empty() {
            return Err(TransmitError::EmptyBuffer);
        }
        self.set_sample_rate(sample_rate)?;
        self.set_frequency(frequency)?;

        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                // Lost with a panicked or unspawned transmit thread.
                let stream = self.device()?.tx_stream()?;
                info!("Transmit stream set up again");
                self.stream_active = false;
                stream
            }
        };
        if !self.stream_active {
            if let Err(err) = stream.activate() {
                self.stream = Some(stream);
                return Err(err.into());
            }
            self.stream_active = true;
        }

        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread_stop_flag = stop_flag.clone();
        let thread_terminate_flag = self.terminate_flag.clone();
        let buffer_len = buffer.len();
        let spawned = thread::Builder::new()
            .name("transmit".to_owned())
            .spawn(move || {
                info!("Transmit thread started");
                let mut submissions: u64 = 0;
                let mut fault = None;
                loop {
                    if thread_stop_flag.load(Ordering::SeqCst) || thread_terminate_flag.load(Ordering::SeqCst) {
                        info!("Terminating transmit thread");
                        break;
                    }
                    if let Err(err) = stream.write(&buffer) {
                        error!("Transmit thread stopping: {}", err);
                        fault = Some(err);
                        break;
                    }
                    submissions += 1;
                }
                debug!("Transmit thread stopped after {} submissions", submissions);
                SessionEnd { stream, fault }
            });
        match spawned {
            Ok(thread_handle) => {
                info!("Transmitting {} samples at {}Hz on {}Hz", buffer_len, sample_rate, frequency);
                self.session = Some(TransmitSession { stop_flag, thread_handle });
                Ok(())
            }
            Err(err) => {
                // The closure, and the stream with it, has gone.
                error!("Could not spawn transmit thread: {}", err);
                self.stream_active = false;
                Err(TransmitError::Spawn(err.to_string()))
            }
        }
    }

    // Signals the thread to terminate, blocks on joining the handle, and reclaims the stream.
    // After this returns nothing writes to the stream. Safe to call when idle.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("Stopping transmit session");
            session.stop_flag.store(true, Ordering::SeqCst);
            self.join(session);
            info!("Transmission stopped");
        }
    }

    fn reap(&mut self) {
        let finished = match &self.session {
            None => false,
            Some(session) => session.thread_handle.is_finished(),
        };
        if finished {
            if let Some(session) = self.session.take() {
                self.join(session);
            }
        }
    }

    fn join(&mut self, session: TransmitSession) {
        debug!("Joining transmit thread...");
        match session.thread_handle.join() {
            Ok(end) => {
                debug!("...joined transmit thread");
                self.stream = Some(end.stream);
                if end.fault.is_some() {
                    self.fault = end.fault;
                }
            }
            Err(_) => {
                error!("Transmit thread panicked; its stream is lost");
                self.stream_active = false;
            }
        }
    }

    /// The device error that ended the last session early, if any. Taking it clears it.
    pub fn take_fault(&mut self) -> Option<DeviceError> {
        self.reap();
        self.fault.take()
    }

    /// Stop any session, then deactivate and close the stream, then release the device; in
    /// that order. Idempotent.
    pub fn shutdown(&mut self) {
        self.stop();
        if let Some(mut stream) = self.stream.take() {
            if self.stream_active {
                if let Err(err) = stream.deactivate() {
                    warn!("Could not deactivate transmit stream: {}", err);
                }
                self.stream_active = false;
            }
            drop(stream);
            debug!("Transmit stream closed");
        }
        if self.device.take().is_some() {
            info!("Device released");
        }
    }
}

impl Drop for Transmitter {
    fn drop(&mut self) {
        debug!("Transmitter shutting down on drop");
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "./transmitter_spec.rs"]
mod transmitter_spec;
