pub mod device;
#[cfg(feature = "soapy")]
pub mod soapy_device;

#[cfg(test)]
pub mod recording_device;
