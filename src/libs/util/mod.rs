pub mod logging;
pub mod version;

#[cfg(test)]
pub mod test_util;
