use std::convert::TryFrom;
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use log::debug;
use num::Complex;

/// One time-domain sample of a complex baseband signal.
pub type IqSample = Complex<f32>;

/// Bytes occupied by one IqSample in a complex f32 (cf32) file.
pub const CF32_SAMPLE_BYTES: usize = 8;

/// The fixed-point encodings a generated chirp can be written in.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    pub fn bits(&self) -> u32 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }

    /// Width of one real or imaginary component on disk.
    pub fn bytes_per_component(&self) -> usize {
        (self.bits() / 8) as usize
    }

    /// An IQ pair is two components.
    pub fn bytes_per_sample(&self) -> usize {
        2 * self.bytes_per_component()
    }
}

impl TryFrom<u32> for BitDepth {
    type Error = String;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(BitDepth::Eight),
            16 => Ok(BitDepth::Sixteen),
            _ => Err(format!("bit_depth must be 8 or 16, not {}", bits)),
        }
    }
}

impl Display for BitDepth {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

// Scaling by the positive full scale and clamping to the type's range means amplitude 1.0 encodes
// as 127 / 32767, never wrapping. The cast truncates toward zero.
fn to_i8(component: f32) -> i8 {
    (component * i8::MAX as f32).clamp(i8::MIN as f32, i8::MAX as f32) as i8
}

fn to_i16(component: f32) -> i16 {
    (component * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Encode samples as interleaved (real, imaginary) signed integers; 16-bit values are
/// little-endian.
pub fn encode_fixed_point(samples: &[IqSample], bit_depth: BitDepth) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * bit_depth.bytes_per_sample());
    match bit_depth {
        BitDepth::Eight => {
            for sample in samples {
                out.push(to_i8(sample.re) as u8);
                out.push(to_i8(sample.im) as u8);
            }
        }
        BitDepth::Sixteen => {
            for sample in samples {
                out.extend_from_slice(&to_i16(sample.re).to_le_bytes());
                out.extend_from_slice(&to_i16(sample.im).to_le_bytes());
            }
        }
    }
    out
}

/// Encode samples as interleaved little-endian f32 (real, imaginary) pairs.
pub fn encode_cf32(samples: &[IqSample]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * CF32_SAMPLE_BYTES);
    for sample in samples {
        out.extend_from_slice(&sample.re.to_le_bytes());
        out.extend_from_slice(&sample.im.to_le_bytes());
    }
    out
}

#[derive(Debug)]
pub enum IqFileError {
    Io(std::io::Error),
    Empty,
    Misaligned(usize),
}

impl Display for IqFileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IqFileError::Io(err) => write!(f, "{}", err),
            IqFileError::Empty => write!(f, "signal file contains no samples"),
            IqFileError::Misaligned(len) => write!(f, "signal file length {} is not a multiple of {} bytes", len, CF32_SAMPLE_BYTES),
        }
    }
}

impl Error for IqFileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            IqFileError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for IqFileError {
    fn from(err: std::io::Error) -> Self {
        IqFileError::Io(err)
    }
}

pub fn decode_cf32(bytes: &[u8]) -> Result<Vec<IqSample>, IqFileError> {
    if bytes.is_empty() {
        return Err(IqFileError::Empty);
    }
    if bytes.len() % CF32_SAMPLE_BYTES != 0 {
        return Err(IqFileError::Misaligned(bytes.len()));
    }
    Ok(bytes.chunks_exact(CF32_SAMPLE_BYTES).map(|pair| {
        let re = f32::from_le_bytes([pair[0], pair[1], pair[2], pair[3]]);
        let im = f32::from_le_bytes([pair[4], pair[5], pair[6], pair[7]]);
        IqSample::new(re, im)
    }).collect())
}

/// Load a headerless cf32 file verbatim as a signal buffer.
pub fn read_cf32_file(path: &Path) -> Result<Vec<IqSample>, IqFileError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    debug!("Read {} bytes from {:?}", bytes.len(), path);
    decode_cf32(&bytes)
}

/// Buffered writer over a newly created (truncated) file, for writing encoded blocks in turn.
pub struct IqFileWriter {
    writer: BufWriter<File>,
    bytes_written: usize,
}

impl IqFileWriter {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        debug!("Creating IQ file {:?}", path);
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            bytes_written: 0,
        })
    }

    pub fn write_block(&mut self, encoded: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(encoded)?;
        self.bytes_written += encoded.len();
        Ok(())
    }

    /// Flushes; errors that a silent drop would swallow surface here.
    pub fn finish(mut self) -> std::io::Result<usize> {
        self.writer.flush()?;
        Ok(self.bytes_written)
    }
}

#[cfg(test)]
#[path = "./iq_spec.rs"]
mod iq_spec;
