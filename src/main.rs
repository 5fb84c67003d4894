#[macro_use]
extern crate clap;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{App, Arg, ArgMatches};
use clap::arg_enum;
use log::{debug, error, info, warn};

use sdrvsg::libs::chirp::chirp::{ChirpParameters, DEFAULT_SWEEP_SAMPLES, generate_chirp_cf32_file, generate_chirp_file};
use sdrvsg::libs::config_dir::config_dir;
use sdrvsg::libs::config_file::config_file::ConfigurationStore;
use sdrvsg::libs::device::device::{NullTransmitDevice, TransmitDevice};
use sdrvsg::libs::util::logging::initialise_logging;
use sdrvsg::libs::util::version::VERSION;

const OUTPUT: &'static str = "output";
const SAMPLE_RATE: &'static str = "samplerate";
const F_MIN: &'static str = "fmin";
const F_MAX: &'static str = "fmax";
const DWELL: &'static str = "dwell";
const BIT_DEPTH: &'static str = "bitdepth";
const SWEEP_SAMPLES: &'static str = "sweepsamples";
const CF32: &'static str = "cf32";
const DRIVER: &'static str = "driver";
const CHANNEL: &'static str = "channel";
const NO_DEVICE: &'static str = "nodevice";

arg_enum! {
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum Mode {
        GUI,
        Chirp,
        ListDevices,
        ConfigFileLocation
    }
}

fn parse_command_line<'a>() -> (ArgMatches<'a>, Mode) {
    let result = App::new("sdrvsg")
        .version(VERSION)
        .about("SDR Vector Signal Generator and chirp waveform synthesizer")

        .arg(Arg::from_usage("<mode> 'The mode to use, usually GUI.'").possible_values(&Mode::variants()).default_value("GUI"))

        .arg(Arg::with_name(DRIVER)
            .short("d").long("driver").help("Sets the SoapySDR device arguments, e.g. driver=hackrf; remembered in the configuration file")
            .value_name("device arguments").takes_value(true))

        .arg(Arg::with_name(CHANNEL)
            .short("c").long("channel").help("Sets the device's transmit channel; remembered in the configuration file")
            .value_name("channel").takes_value(true))

        .arg(Arg::with_name(NO_DEVICE)
            .short("n").long("nodevice").help("Runs without a radio; transmissions go nowhere"))

        .arg(Arg::with_name(OUTPUT)
            .short("o").long("output").help("Chirp: the file to write")
            .value_name("file").takes_value(true).default_value("triangle_chirp.bin"))

        .arg(Arg::with_name(SAMPLE_RATE)
            .long("samplerate").help("Chirp: sample rate in Hz")
            .value_name("Hz").takes_value(true).default_value("10e6"))

        .arg(Arg::with_name(F_MIN)
            .long("fmin").help("Chirp: frequency offset the sweep starts from, in Hz")
            .value_name("Hz").takes_value(true).allow_hyphen_values(true).default_value("-10e6"))

        .arg(Arg::with_name(F_MAX)
            .long("fmax").help("Chirp: frequency offset the sweep turns back at, in Hz; may be below fmin")
            .value_name("Hz").takes_value(true).allow_hyphen_values(true).default_value("10e6"))

        .arg(Arg::with_name(DWELL)
            .long("dwell").help("Chirp: time spent at each frequency step in seconds")
            .value_name("seconds").takes_value(true).default_value("1e-3"))

        .arg(Arg::with_name(BIT_DEPTH)
            .long("bitdepth").help("Chirp: bits per I or Q component")
            .value_name("bits").takes_value(true).possible_values(&["8", "16"]).default_value("8"))

        .arg(Arg::with_name(SWEEP_SAMPLES)
            .long("sweepsamples").help("Chirp: samples one half of the triangle is sized to [default: 20000000]")
            .value_name("samples").takes_value(true))

        .arg(Arg::with_name(CF32)
            .long("cf32").help("Chirp: write complex f32 samples that the GUI can load, instead of fixed-point"))

        .get_matches();

    let mode = value_t!(result.value_of("mode"), Mode).unwrap_or(Mode::GUI);

    return (result, mode);
}

fn run(arguments: ArgMatches, mode: Mode, terminate: Arc<AtomicBool>) -> Result<i32, Box<dyn Error>> {
    if mode == Mode::Chirp {
        return chirp(&arguments);
    }
    if mode == Mode::ListDevices {
        return list_devices();
    }

    let home_dir = dirs::home_dir();
    let config_path = config_dir::configuration_directory(home_dir)?;
    let config_path_clone = config_path.clone();
    let mut config = ConfigurationStore::new(config_path)?;
    if mode == Mode::ConfigFileLocation {
        info!("Configuration path is [{:?}]", config_path_clone);
        info!("Configuration file is [{:?}]", config.get_config_file_path());
        return Ok(0)
    }

    if let Some(driver) = arguments.value_of(DRIVER) {
        info!("Setting device arguments to '{}'", driver);
        config.set_driver(driver.to_string())?;
    }
    if arguments.is_present(CHANNEL) {
        let channel = value_t!(arguments, CHANNEL, usize)?;
        info!("Setting transmit channel to {}", channel);
        config.set_channel(channel)?;
    }

    let device = open_device(&arguments, &config)?;
    run_gui(device, &config, terminate)
}

fn chirp(arguments: &ArgMatches) -> Result<i32, Box<dyn Error>> {
    let output = PathBuf::from(arguments.value_of(OUTPUT).unwrap_or("triangle_chirp.bin"));
    let sample_rate = value_t!(arguments, SAMPLE_RATE, f64)?;
    let f_min = value_t!(arguments, F_MIN, f64)?;
    let f_max = value_t!(arguments, F_MAX, f64)?;
    let dwell_time = value_t!(arguments, DWELL, f64)?;
    let bit_depth = value_t!(arguments, BIT_DEPTH, u32)?;
    let sweep_samples = if arguments.is_present(SWEEP_SAMPLES) {
        value_t!(arguments, SWEEP_SAMPLES, usize)?
    } else {
        DEFAULT_SWEEP_SAMPLES
    };

    let params = ChirpParameters::new(sample_rate, f_min, f_max, dwell_time, bit_depth)?
        .with_sweep_samples(sweep_samples)?;
    let summary = if arguments.is_present(CF32) {
        generate_chirp_cf32_file(&output, &params)?
    } else {
        generate_chirp_file(&output, &params)?
    };
    if arguments.is_present(CF32) {
        info!("Chirp signal saved to {} as complex f32 IQ", output.display());
    } else {
        info!("Chirp signal saved to {} in {} IQ format", output.display(), params.bit_depth);
    }
    debug!("{} steps, {} samples, {} bytes", summary.steps, summary.samples, summary.bytes);
    Ok(0)
}

#[cfg(feature = "soapy")]
fn list_devices() -> Result<i32, Box<dyn Error>> {
    let found = sdrvsg::libs::device::soapy_device::list_devices()?;
    if found == 0 {
        warn!("No SoapySDR devices found");
    }
    Ok(0)
}

#[cfg(not(feature = "soapy"))]
fn list_devices() -> Result<i32, Box<dyn Error>> {
    simple_error::bail!("Built without SoapySDR support; rebuild with the soapy feature to list devices");
}

#[cfg(feature = "soapy")]
fn open_device(arguments: &ArgMatches, config: &ConfigurationStore) -> Result<Box<dyn TransmitDevice>, Box<dyn Error>> {
    use sdrvsg::libs::device::soapy_device::{SoapySettings, SoapyTransmitDevice};

    if arguments.is_present(NO_DEVICE) {
        return Ok(Box::new(NullTransmitDevice::new()));
    }
    let device_settings = config.get_device_settings();
    let settings = SoapySettings {
        driver_args: device_settings.driver.as_str(),
        channel: device_settings.channel,
        if_gain_element: device_settings.if_gain_element.as_str(),
        rf_gain_element: device_settings.rf_gain_element.as_str(),
    };
    Ok(Box::new(SoapyTransmitDevice::open(&settings)?))
}

#[cfg(not(feature = "soapy"))]
fn open_device(arguments: &ArgMatches, config: &ConfigurationStore) -> Result<Box<dyn TransmitDevice>, Box<dyn Error>> {
    if !arguments.is_present(NO_DEVICE) {
        warn!("Built without SoapySDR support; not opening '{}'", config.get_driver());
    }
    Ok(Box::new(NullTransmitDevice::new()))
}

#[cfg(feature = "gui")]
fn run_gui(device: Box<dyn TransmitDevice>, config: &ConfigurationStore, terminate: Arc<AtomicBool>) -> Result<i32, Box<dyn Error>> {
    use std::sync::Mutex;
    use sdrvsg::libs::control_panel::control_panel::ControlPanel;
    use sdrvsg::libs::gui::gui::Gui;
    use sdrvsg::libs::gui::gui_facades::GUIOutput;
    use sdrvsg::libs::transmitter::transmitter::Transmitter;

    info!("Initialising transmitter...");
    let transmitter = Transmitter::new(device, terminate.clone())?;
    let settings = config.get_panel_settings();
    let panel = Arc::new(Mutex::new(ControlPanel::new(transmitter, &settings, config.get_tone_parameters())));

    info!("Initialising GUI...");
    let mut gui = Gui::new(panel.clone(), &settings, terminate.clone());
    gui.message_loop();

    info!("End of GUI message loop; terminating");
    terminate.store(true, Ordering::SeqCst);
    match panel.lock() {
        Ok(mut locked) => locked.close(),
        Err(poisoned) => poisoned.into_inner().close(),
    }
    info!("Exiting");
    Ok(0)
}

#[cfg(not(feature = "gui"))]
fn run_gui(_device: Box<dyn TransmitDevice>, _config: &ConfigurationStore, _terminate: Arc<AtomicBool>) -> Result<i32, Box<dyn Error>> {
    simple_error::bail!("Built without GUI support; rebuild with the gui feature, or use the Chirp mode");
}

fn set_ctrlc_handler(terminate: Arc<AtomicBool>) {
    let result = ctrlc::set_handler(move || {
        info!("Setting terminate flag...");
        terminate.store(true, Ordering::SeqCst);
    });
    if let Err(err) = result {
        warn!("Could not set Ctrl-C handler: {}", err);
    }
}

fn main() {
    initialise_logging();

    let (arguments, mode) = parse_command_line();
    debug!("Command line parsed");

    let terminate = Arc::new(AtomicBool::new(false));
    set_ctrlc_handler(terminate.clone());

    match run(arguments, mode, terminate) {
        Err(err) => {
            report_error(mode, &*err);
            std::process::exit(1);
        }
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
    }
}

#[cfg(feature = "gui")]
fn report_error(mode: Mode, err: &dyn Error) {
    error!("{}", err);
    if mode == Mode::GUI {
        let _app = fltk::app::App::default().with_scheme(fltk::app::Scheme::Gtk);
        fltk::dialog::message_default(&*format!("{}", err));
    }
}

#[cfg(not(feature = "gui"))]
fn report_error(_mode: Mode, err: &dyn Error) {
    error!("{}", err);
}
