use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use fltk::{
    app::*, button::*, enums::*, frame::*, input::*, menu::*, output::*, prelude::*, valuator::*, window::*,
};
use fltk::dialog::{NativeFileChooser, NativeFileChooserType};
use log::{debug, info, warn};

use crate::libs::config_file::config_file::PanelSettings;
use crate::libs::control_panel::control_panel::{button_label, clamp_gain, format_mhz};
use crate::libs::device::device::{GainStage, MAX_GAIN, MIN_GAIN};
use crate::libs::gui::gui_facades::GUIOutput;
use crate::libs::gui::message::Message;
use crate::libs::signal_source::signal_source::{CONTINUOUS_WAVE_LABEL, FILE_LABEL, SourceMode};
use crate::libs::transmitter::transmitter::TransmitState;
use crate::libs::util::version::VERSION;

pub const WINDOW_TITLE: &str = "SDR Vector Signal Generator";

const WIDGET_HEIGHT: i32 = 25;
const WIDGET_PADDING: i32 = 10;

const LABEL_WIDTH: i32 = 170;
const CONTROL_WIDTH: i32 = 220;
const GAIN_LABEL_WIDTH: i32 = 50;
const WINDOW_WIDTH: i32 = WIDGET_PADDING + LABEL_WIDTH + CONTROL_WIDTH + WIDGET_PADDING + GAIN_LABEL_WIDTH + WIDGET_PADDING;
const ROWS: i32 = 7;

const POLL_INTERVAL_MS: u64 = 250;

fn row_y(row: i32) -> i32 {
    WIDGET_PADDING + row * (WIDGET_HEIGHT + WIDGET_PADDING)
}

fn gain_text(gain: u8) -> String {
    format!("{} dB", gain)
}

// Empty if the chooser was cancelled.
fn pick_bin_file() -> Option<PathBuf> {
    let mut chooser = NativeFileChooser::new(NativeFileChooserType::BrowseFile);
    chooser.set_title("Select Signal File");
    chooser.set_filter("Binary Files\t*.bin");
    chooser.show();
    let filename = chooser.filename();
    if filename.as_os_str().is_empty() {
        None
    } else {
        Some(filename)
    }
}

pub struct Gui {
    app: App,
    gui_output: Arc<Mutex<dyn GUIOutput>>,
    receiver: Receiver<Message>,
    window: Window,
    source_choice: Choice,
    if_gain_label: Frame,
    rf_gain_label: Frame,
    transmit_button: Button,
    status_output: Output,
    poll_stop: Arc<AtomicBool>,
    poll_thread_handle: Option<JoinHandle<()>>,
}

impl Gui {
    pub fn new(gui_output: Arc<Mutex<dyn GUIOutput>>, settings: &PanelSettings, terminate: Arc<AtomicBool>) -> Self {
        debug!("Initialising App");
        let app = App::default().with_scheme(Scheme::Gtk);
        debug!("Initialising Window");
        let mut window = Window::default()
            .with_size(WINDOW_WIDTH, row_y(ROWS))
            .with_label(format!("{} v{}", WINDOW_TITLE, VERSION).as_str());

        let (sender, receiver) = channel::<Message>();

        Frame::new(WIDGET_PADDING, row_y(0), LABEL_WIDTH, WIDGET_HEIGHT, "Frequency (MHz):")
            .with_align(Align::Left | Align::Inside);
        let mut frequency_input = Input::new(WIDGET_PADDING + LABEL_WIDTH, row_y(0), CONTROL_WIDTH, WIDGET_HEIGHT, "");
        frequency_input.set_value(format_mhz(settings.frequency_mhz).as_str());
        frequency_input.set_trigger(CallbackTrigger::Changed);
        let frequency_sender = sender.clone();
        frequency_input.set_callback(move |input| {
            frequency_sender.send(Message::FrequencyChanged(input.value()));
        });

        Frame::new(WIDGET_PADDING, row_y(1), LABEL_WIDTH, WIDGET_HEIGHT, "Sample Rate (MHz):")
            .with_align(Align::Left | Align::Inside);
        let mut sample_rate_input = Input::new(WIDGET_PADDING + LABEL_WIDTH, row_y(1), CONTROL_WIDTH, WIDGET_HEIGHT, "");
        sample_rate_input.set_value(format_mhz(settings.sample_rate_mhz).as_str());
        sample_rate_input.set_trigger(CallbackTrigger::Changed);
        let sample_rate_sender = sender.clone();
        sample_rate_input.set_callback(move |input| {
            sample_rate_sender.send(Message::SampleRateChanged(input.value()));
        });

        Frame::new(WIDGET_PADDING, row_y(2), LABEL_WIDTH, WIDGET_HEIGHT, "Signal Source:")
            .with_align(Align::Left | Align::Inside);
        let mut source_choice = Choice::new(WIDGET_PADDING + LABEL_WIDTH, row_y(2), CONTROL_WIDTH, WIDGET_HEIGHT, "");
        source_choice.add_choice(format!("{}|{}", CONTINUOUS_WAVE_LABEL, FILE_LABEL).as_str());
        source_choice.set_value(SourceMode::ContinuousWave.index());
        let source_sender = sender.clone();
        source_choice.set_callback(move |choice| {
            if let Some(mode) = SourceMode::from_index(choice.value()) {
                source_sender.send(Message::SourceSelected(mode));
            }
        });

        let if_gain = clamp_gain(settings.if_gain as i32);
        let rf_gain = clamp_gain(settings.rf_gain as i32);
        let (_, if_gain_label) = Self::gain_slider(3, "IF Gain (dB):", GainStage::Intermediate, if_gain, &sender);
        let (_, rf_gain_label) = Self::gain_slider(4, "RF Gain (dB):", GainStage::RadioFrequency, rf_gain, &sender);

        let mut transmit_button = Button::new(WIDGET_PADDING, row_y(5), WINDOW_WIDTH - 2 * WIDGET_PADDING, WIDGET_HEIGHT, "");
        transmit_button.set_label(button_label(TransmitState::Idle));
        transmit_button.emit(sender.clone(), Message::ToggleTransmission);

        let mut status_output = Output::new(WIDGET_PADDING, row_y(6), WINDOW_WIDTH - 2 * WIDGET_PADDING, WIDGET_HEIGHT, "");
        status_output.set_readonly(true);

        // Closing the window has to shut the transmitter down before it hides.
        let close_sender = sender.clone();
        window.set_callback(move |_| {
            if event() == Event::Close {
                close_sender.send(Message::Close);
            }
        });

        window.end();
        debug!("Showing main window");
        window.show();

        let poll_stop = Arc::new(AtomicBool::new(false));
        let poll_thread_handle = Self::spawn_poller(sender, poll_stop.clone(), terminate);

        let mut gui = Gui {
            app,
            gui_output,
            receiver,
            window,
            source_choice,
            if_gain_label,
            rf_gain_label,
            transmit_button,
            status_output,
            poll_stop,
            poll_thread_handle,
        };
        gui.refresh();
        gui
    }

    fn gain_slider(row: i32, label: &str, stage: GainStage, gain: u8, sender: &Sender<Message>) -> (HorNiceSlider, Frame) {
        Frame::new(WIDGET_PADDING, row_y(row), LABEL_WIDTH, WIDGET_HEIGHT, None)
            .with_label(label)
            .with_align(Align::Left | Align::Inside);
        let mut slider = HorNiceSlider::new(WIDGET_PADDING + LABEL_WIDTH, row_y(row), CONTROL_WIDTH, WIDGET_HEIGHT, "");
        slider.set_range(MIN_GAIN as f64, MAX_GAIN as f64);
        slider.set_step(1.0, 1);
        slider.set_value(gain as f64);
        let gain_label = Frame::new(WIDGET_PADDING + LABEL_WIDTH + CONTROL_WIDTH + WIDGET_PADDING, row_y(row), GAIN_LABEL_WIDTH, WIDGET_HEIGHT, None)
            .with_label(gain_text(gain).as_str());
        let slider_sender = sender.clone();
        slider.set_callback(move |slider| {
            slider_sender.send(Message::GainChanged(stage, slider.value().round() as i32));
        });
        (slider, gain_label)
    }

    // Wakes the message loop periodically so a transmitter fault gets reported without the user
    // doing anything, and closes the window if the process is asked to terminate.
    fn spawn_poller(sender: Sender<Message>, poll_stop: Arc<AtomicBool>, terminate: Arc<AtomicBool>) -> Option<JoinHandle<()>> {
        let spawned = thread::Builder::new()
            .name("gui-poll".to_owned())
            .spawn(move || {
                loop {
                    thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
                    if poll_stop.load(Ordering::SeqCst) {
                        break;
                    }
                    if terminate.load(Ordering::SeqCst) {
                        info!("Terminating GUI");
                        sender.send(Message::Close);
                        break;
                    }
                    sender.send(Message::Poll);
                }
                debug!("GUI poller stopped");
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!("Could not start GUI poller, faults will show on the next action: {}", err);
                None
            }
        }
    }

    fn output(&self) -> MutexGuard<'_, dyn GUIOutput + 'static> {
        match self.gui_output.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn refresh(&mut self) {
        let (status, state) = {
            let output = self.output();
            (output.status(), output.transmit_state())
        };
        if self.status_output.value() != status {
            self.status_output.set_value(status.as_str());
        }
        let label = button_label(state);
        if self.transmit_button.label() != label {
            self.transmit_button.set_label(label);
        }
    }

    pub fn message_loop(&mut self) {
        debug!("Starting app wait loop");
        while self.app.wait() {
            match self.receiver.recv() {
                None => {
                    // noop
                }
                Some(message) => {
                    if !matches!(message, Message::Poll) {
                        info!("App message {:?}", message);
                    }
                    match message {
                        Message::FrequencyChanged(text) => {
                            self.output().frequency_changed(&text);
                        }

                        Message::SampleRateChanged(text) => {
                            self.output().sample_rate_changed(&text);
                        }

                        Message::GainChanged(stage, gain) => {
                            let applied = self.output().gain_changed(stage, gain);
                            let label = match stage {
                                GainStage::Intermediate => &mut self.if_gain_label,
                                GainStage::RadioFrequency => &mut self.rf_gain_label,
                            };
                            label.set_label(gain_text(applied).as_str());
                        }

                        Message::SourceSelected(mode) => {
                            let mut pick = pick_bin_file;
                            let selected = self.output().source_selected(mode, &mut pick);
                            self.source_choice.set_value(selected.index());
                        }

                        Message::ToggleTransmission => {
                            self.output().toggle_transmission();
                        }

                        Message::Poll => {
                            self.output().poll();
                        }

                        Message::Close => {
                            self.output().close();
                            self.window.hide();
                        }
                    }
                    self.refresh();
                }
            }
        }
        info!("End of app wait loop");
        self.poll_stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.poll_thread_handle.take() {
            debug!("Joining GUI poller...");
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
#[path = "./gui_spec.rs"]
mod gui_spec;
