use log::debug;
use std::path::{Path, PathBuf};

use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::libs::device::device::GainDb;
use crate::libs::signal_source::signal_source::ToneParameters;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
struct Config {
    #[serde(default)]
    device: DeviceSettings,
    #[serde(default)]
    panel: PanelSettings,
    #[serde(default)]
    tone: ToneParameters,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DeviceSettings {
    /// SoapySDR device arguments
    pub driver: String,
    pub channel: usize,
    /// Driven by the IF gain slider. On a HackRF, `VGA` takes 0 to 47dB in 1dB steps.
    pub if_gain_element: String,
    /// Driven by the RF gain slider. On a HackRF, `AMP` is the front-end amplifier, which is
    /// either off (0dB) or on (14dB): the driver rounds the slider's 0 to 47dB to one of those.
    /// Point this at a finer element on radios that have one.
    pub rf_gain_element: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            driver: "driver=hackrf".to_owned(),
            channel: 0,
            if_gain_element: "VGA".to_owned(),
            rf_gain_element: "AMP".to_owned(),
        }
    }
}

/// What the control panel shows at start-up. Values typed into the panel are not saved back.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PanelSettings {
    pub frequency_mhz: f64,
    pub sample_rate_mhz: f64,
    pub if_gain: GainDb,
    pub rf_gain: GainDb,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            frequency_mhz: 2400.0,
            sample_rate_mhz: 10.0,
            if_gain: 20,
            rf_gain: 20,
        }
    }
}

const CONFIG_FILE_NAME: &str = "sdrvsg.toml";

pub struct ConfigurationStore {
    config_file_path: Box<Path>,
    config: Config,
}

impl ConfigurationStore {
    pub fn new(config_path: Box<Path>) -> Result<ConfigurationStore, String> {
        let mut config_file_path = PathBuf::new();
        config_file_path.push(config_path);
        config_file_path.push(CONFIG_FILE_NAME);
        debug!("Config file is {:?}", config_file_path);
        if !config_file_path.exists() {
            debug!("Creating config file {:?}", config_file_path);
            let config = Config::default();
            save_configuration(&config_file_path, &config)?;
            Ok(ConfigurationStore {
                config_file_path: config_file_path.into_boxed_path(),
                config,
            })
        } else {
            let config = read_configuration(&config_file_path)?;
            Ok(ConfigurationStore {
                config_file_path: config_file_path.into_boxed_path(),
                config,
            })
        }
    }

    pub fn get_config_file_path(&self) -> &Path {
        &self.config_file_path
    }

    pub fn get_device_settings(&self) -> DeviceSettings {
        self.config.device.clone()
    }

    pub fn get_panel_settings(&self) -> PanelSettings {
        self.config.panel.clone()
    }

    pub fn get_tone_parameters(&self) -> ToneParameters {
        self.config.tone.clone()
    }

    pub fn get_driver(&self) -> String {
        self.config.device.driver.clone()
    }

    pub fn set_driver(&mut self, driver: String) -> Result<(), String> {
        self.config.device.driver = driver;
        self.save()
    }

    pub fn set_channel(&mut self, channel: usize) -> Result<(), String> {
        self.config.device.channel = channel;
        self.save()
    }

    fn save(&self) -> Result<(), String> {
        save_configuration(&self.config_file_path.to_path_buf(), &self.config)
    }
}

fn save_configuration(config_file_path: &PathBuf, config: &Config) -> Result<(), String> {
    let toml = toml::to_string(config)
        .map_err(|err| format!("Could not serialise configuration: {}", err))?;
    std::fs::write(config_file_path, toml)
        .map_err(|err| format!("Could not write config file {:?}: {}", config_file_path, err))
}

fn read_configuration(config_file_path: &PathBuf) -> Result<Config, String> {
    let file_contents = std::fs::read_to_string(config_file_path);
    match file_contents {
        Ok(toml) => {
            let x: Result<Config, toml::de::Error> = toml::from_str(&*toml);
            match x {
                Ok(config) => {
                    Ok(config)
                }
                Err(err) => {
                    Err(format!("Could not parse config file {:?}: {}", config_file_path, err))
                }
            }
        }
        Err(e) => { Err(format!("Could not read config file {:?}: {}", config_file_path, e))}
    }
}

#[cfg(test)]
#[path = "./config_file_spec.rs"]
mod config_file_spec;
