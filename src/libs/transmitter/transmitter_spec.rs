extern crate hamcrest2;

#[cfg(test)]
mod transmitter_spec {
    use std::env;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use hamcrest2::prelude::*;
    use log::{debug, info};
    use rstest::*;

    use crate::libs::device::device::{DeviceError, GainStage, MockTransmitDevice, MockTransmitStream, NullTransmitDevice, TransmitStream};
    use crate::libs::device::recording_device::{DeviceEvent, EventLog, first_write, last_write, position, RecordingTransmitDevice, writes};
    use crate::libs::iq::iq::IqSample;
    use crate::libs::transmitter::transmitter::{TransmitError, TransmitState, Transmitter};
    use crate::libs::util::test_util;

    const SAMPLE_RATE: f64 = 10e6;
    const FREQUENCY: f64 = 2400e6;

    #[ctor::ctor]
    fn before_each() {
        env::set_var("RUST_LOG", "debug");
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[ctor::dtor]
    fn after_each() {}

    pub struct TransmitterFixture {
        terminate: Arc<AtomicBool>,
        events: EventLog,
        fail_writes: Arc<AtomicBool>,
        transmitter: Transmitter,
    }

    #[fixture]
    fn fixture() -> TransmitterFixture {
        let terminate = Arc::new(AtomicBool::new(false));
        let (device, events, fail_writes) = RecordingTransmitDevice::new();
        info!("Instantiating transmitter...");
        let transmitter = Transmitter::new(Box::new(device), terminate.clone()).unwrap();
        TransmitterFixture {
            terminate,
            events,
            fail_writes,
            transmitter,
        }
    }

    impl Drop for TransmitterFixture {
        fn drop(&mut self) {
            debug!("TransmitterFixture setting terminate flag...");
            self.terminate.store(true, Ordering::SeqCst);
            self.transmitter.shutdown();
            debug!("TransmitterFixture ...shut down");
        }
    }

    fn buffer() -> Vec<IqSample> {
        vec![IqSample::new(0.5, 0.0); 16]
    }

    fn wait_for_writes(events: &EventLog, count: usize) {
        let events = events.clone();
        test_util::panic_after(Duration::from_secs(5), move || {
            while writes(&events) < count {
                test_util::wait_n_ms(1);
            }
        });
    }

    #[rstest]
    pub fn stream_is_set_up_on_construction(fixture: TransmitterFixture) {
        assert_that!(position(&fixture.events, &DeviceEvent::StreamSetup), eq(Some(0)));
        assert_that!(fixture.transmitter.state(), eq(TransmitState::Idle));
    }

    #[rstest]
    pub fn start_configures_the_device_before_the_first_write(mut fixture: TransmitterFixture) {
        fixture.transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()).unwrap();
        assert_that!(fixture.transmitter.state(), eq(TransmitState::Transmitting));
        wait_for_writes(&fixture.events, 3);

        let sample_rate_at = position(&fixture.events, &DeviceEvent::SampleRate(SAMPLE_RATE)).unwrap();
        let frequency_at = position(&fixture.events, &DeviceEvent::Frequency(FREQUENCY)).unwrap();
        let activate_at = position(&fixture.events, &DeviceEvent::Activate).unwrap();
        let first_write_at = first_write(&fixture.events).unwrap();
        assert_that!(sample_rate_at < frequency_at, equal_to(true));
        assert_that!(frequency_at < activate_at, equal_to(true));
        assert_that!(activate_at < first_write_at, equal_to(true));
    }

    #[rstest]
    pub fn whole_buffer_is_written_each_time(mut fixture: TransmitterFixture) {
        fixture.transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()).unwrap();
        wait_for_writes(&fixture.events, 5);
        fixture.transmitter.stop();
        let events = fixture.events.lock().unwrap().clone();
        for event in events.iter() {
            if let DeviceEvent::Write(len) = event {
                assert_that!(*len, eq(16));
            }
        }
    }

    #[rstest]
    pub fn stop_is_synchronous(mut fixture: TransmitterFixture) {
        fixture.transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()).unwrap();
        wait_for_writes(&fixture.events, 2);
        fixture.transmitter.stop();
        assert_that!(fixture.transmitter.state(), eq(TransmitState::Idle));

        let writes_at_stop = writes(&fixture.events);
        test_util::wait_n_ms(50);
        assert_that!(writes(&fixture.events), eq(writes_at_stop));
    }

    #[rstest]
    pub fn stop_when_idle_is_harmless(mut fixture: TransmitterFixture) {
        fixture.transmitter.stop();
        fixture.transmitter.stop();
        assert_that!(fixture.transmitter.state(), eq(TransmitState::Idle));
    }

    #[rstest]
    pub fn only_one_session_at_a_time(mut fixture: TransmitterFixture) {
        fixture.transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()).unwrap();
        let second = fixture.transmitter.start(SAMPLE_RATE, FREQUENCY, buffer());
        assert_that!(second, eq(Err(TransmitError::AlreadyTransmitting)));
        assert_that!(fixture.transmitter.state(), eq(TransmitState::Transmitting));
    }

    #[rstest]
    pub fn can_restart_after_stop_without_reactivating(mut fixture: TransmitterFixture) {
        fixture.transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()).unwrap();
        wait_for_writes(&fixture.events, 1);
        fixture.transmitter.stop();
        fixture.transmitter.start(5e6, 433e6, buffer()).unwrap();
        wait_for_writes(&fixture.events, 3);
        fixture.transmitter.stop();

        let events = fixture.events.lock().unwrap().clone();
        let activations = events.iter().filter(|e| **e == DeviceEvent::Activate).count();
        assert_that!(activations, eq(1));
        assert_that!(events.contains(&DeviceEvent::SampleRate(5e6)), equal_to(true));
        assert_that!(events.contains(&DeviceEvent::Frequency(433e6)), equal_to(true));
    }

    #[rstest]
    pub fn empty_buffer_is_refused(mut fixture: TransmitterFixture) {
        let result = fixture.transmitter.start(SAMPLE_RATE, FREQUENCY, vec![]);
        assert_that!(result, eq(Err(TransmitError::EmptyBuffer)));
        assert_that!(fixture.transmitter.state(), eq(TransmitState::Idle));
        assert_that!(position(&fixture.events, &DeviceEvent::Activate), eq(None));
    }

    #[rstest]
    pub fn shutdown_stops_the_loop_before_tearing_down_the_stream(mut fixture: TransmitterFixture) {
        fixture.transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()).unwrap();
        wait_for_writes(&fixture.events, 2);
        fixture.transmitter.shutdown();

        let last_write_at = last_write(&fixture.events).unwrap();
        let deactivate_at = position(&fixture.events, &DeviceEvent::Deactivate).unwrap();
        let closed_at = position(&fixture.events, &DeviceEvent::StreamClosed).unwrap();
        assert_that!(last_write_at < deactivate_at, equal_to(true));
        assert_that!(deactivate_at < closed_at, equal_to(true));
        assert_that!(fixture.transmitter.state(), eq(TransmitState::Idle));
    }

    #[rstest]
    pub fn nothing_is_configurable_after_shutdown(mut fixture: TransmitterFixture) {
        fixture.transmitter.shutdown();
        assert_that!(fixture.transmitter.set_frequency(FREQUENCY), eq(Err(TransmitError::Closed)));
        assert_that!(fixture.transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()), eq(Err(TransmitError::Closed)));
        fixture.transmitter.shutdown();
    }

    #[rstest]
    pub fn gains_and_frequency_apply_immediately(mut fixture: TransmitterFixture) {
        fixture.transmitter.set_gain(GainStage::Intermediate, 30).unwrap();
        fixture.transmitter.set_gain(GainStage::RadioFrequency, 10).unwrap();
        fixture.transmitter.set_frequency(915e6).unwrap();
        let events = fixture.events.lock().unwrap().clone();
        assert_that!(events, eq(vec![
            DeviceEvent::StreamSetup,
            DeviceEvent::Gain(GainStage::Intermediate, 30),
            DeviceEvent::Gain(GainStage::RadioFrequency, 10),
            DeviceEvent::Frequency(915e6),
        ]));
    }

    #[rstest]
    pub fn write_failure_ends_the_session_with_a_fault(mut fixture: TransmitterFixture) {
        fixture.transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()).unwrap();
        wait_for_writes(&fixture.events, 1);
        fixture.fail_writes.store(true, Ordering::SeqCst);
        while fixture.transmitter.is_transmitting() {
            test_util::wait_n_ms(1);
        }
        let fault = fixture.transmitter.take_fault();
        assert_that!(fault.map(|f| f.operation), eq(Some("write stream".to_owned())));
        assert_that!(fixture.transmitter.take_fault(), eq(None));

        // The stream came back with the thread, so a new session can start.
        fixture.fail_writes.store(false, Ordering::SeqCst);
        let writes_before = writes(&fixture.events);
        fixture.transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()).unwrap();
        wait_for_writes(&fixture.events, writes_before + 1);
    }

    #[rstest]
    pub fn unreported_fault_is_not_carried_into_the_next_session(mut fixture: TransmitterFixture) {
        fixture.transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()).unwrap();
        wait_for_writes(&fixture.events, 1);
        fixture.fail_writes.store(true, Ordering::SeqCst);
        while fixture.transmitter.is_transmitting() {
            test_util::wait_n_ms(1);
        }

        // Restarted without anyone taking the fault first.
        fixture.fail_writes.store(false, Ordering::SeqCst);
        let writes_before = writes(&fixture.events);
        fixture.transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()).unwrap();
        wait_for_writes(&fixture.events, writes_before + 1);
        assert_that!(fixture.transmitter.take_fault(), eq(None));
        assert_that!(fixture.transmitter.state(), eq(TransmitState::Transmitting));
    }

    #[test]
    fn sample_rate_too_low_to_pace_is_refused_and_a_normal_one_still_starts() {
        let device = NullTransmitDevice::new();
        let mut transmitter = Transmitter::new(Box::new(device), Arc::new(AtomicBool::new(false))).unwrap();

        let result = transmitter.start(1e-294, FREQUENCY, buffer());
        assert_that!(matches!(result, Err(TransmitError::Device(_))), equal_to(true));
        assert_that!(transmitter.state(), eq(TransmitState::Idle));
        transmitter.stop();

        assert_that!(transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()), eq(Ok(())));
        assert_that!(transmitter.state(), eq(TransmitState::Transmitting));
        transmitter.shutdown();
    }

    #[rstest]
    pub fn application_termination_ends_the_loop(mut fixture: TransmitterFixture) {
        fixture.transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()).unwrap();
        wait_for_writes(&fixture.events, 1);
        fixture.terminate.store(true, Ordering::SeqCst);
        while fixture.transmitter.is_transmitting() {
            test_util::wait_n_ms(1);
        }
        assert_that!(fixture.transmitter.take_fault(), eq(None));
    }

    #[test]
    fn configuration_failure_leaves_the_stream_inactive() {
        let mut stream = MockTransmitStream::new();
        stream.expect_activate().times(0);
        stream.expect_write().times(0);
        stream.expect_deactivate().times(0);
        let mut device = MockTransmitDevice::new();
        device.expect_tx_stream().times(1).return_once(move || Ok(Box::new(stream) as Box<dyn TransmitStream>));
        device.expect_set_sample_rate()
            .returning(|_| Err(DeviceError::new("set TX sample rate", "rate not supported".to_owned())));
        device.expect_set_frequency().times(0);

        let mut transmitter = Transmitter::new(Box::new(device), Arc::new(AtomicBool::new(false))).unwrap();
        let result = transmitter.start(SAMPLE_RATE, FREQUENCY, buffer());
        match result {
            Err(TransmitError::Device(err)) => {
                assert_that!(err.message, eq("rate not supported".to_owned()));
            }
            other => panic!("Expected a device error, got {:?}", other),
        }
        assert_that!(transmitter.state(), eq(TransmitState::Idle));
    }

    #[test]
    fn activation_failure_keeps_the_stream_for_a_retry() {
        let mut stream = MockTransmitStream::new();
        let mut activations = 0;
        stream.expect_activate().times(2).returning(move || {
            activations += 1;
            if activations == 1 {
                Err(DeviceError::new("activate TX stream", "busy".to_owned()))
            } else {
                Ok(())
            }
        });
        stream.expect_write().returning(|_| {
            test_util::wait_n_ms(1);
            Ok(())
        });
        stream.expect_deactivate().times(1).returning(|| Ok(()));
        let mut device = MockTransmitDevice::new();
        device.expect_tx_stream().times(1).return_once(move || Ok(Box::new(stream) as Box<dyn TransmitStream>));
        device.expect_set_sample_rate().returning(|_| Ok(()));
        device.expect_set_frequency().returning(|_| Ok(()));

        let mut transmitter = Transmitter::new(Box::new(device), Arc::new(AtomicBool::new(false))).unwrap();
        assert_that!(transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()).is_err(), equal_to(true));
        assert_that!(transmitter.state(), eq(TransmitState::Idle));
        transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()).unwrap();
        assert_that!(transmitter.state(), eq(TransmitState::Transmitting));
        transmitter.shutdown();
    }

    #[test]
    fn stream_lost_with_a_panicked_thread_is_set_up_again() {
        let mut broken = MockTransmitStream::new();
        broken.expect_activate().returning(|| Ok(()));
        broken.expect_write().returning(|_| panic!("driver crashed"));
        let mut healthy = MockTransmitStream::new();
        healthy.expect_activate().times(1).returning(|| Ok(()));
        healthy.expect_write().returning(|_| {
            test_util::wait_n_ms(1);
            Ok(())
        });
        healthy.expect_deactivate().times(1).returning(|| Ok(()));
        let mut streams = vec![healthy, broken];
        let mut device = MockTransmitDevice::new();
        device.expect_tx_stream().times(2)
            .returning(move || match streams.pop() {
                Some(stream) => Ok(Box::new(stream) as Box<dyn TransmitStream>),
                None => Err(DeviceError::new("setup TX stream", "no more streams".to_owned())),
            });
        device.expect_set_sample_rate().returning(|_| Ok(()));
        device.expect_set_frequency().returning(|_| Ok(()));

        let mut transmitter = Transmitter::new(Box::new(device), Arc::new(AtomicBool::new(false))).unwrap();
        transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()).unwrap();
        let mut attempts = 0;
        while transmitter.is_transmitting() && attempts < 5000 {
            test_util::wait_n_ms(1);
            attempts += 1;
        }
        assert_that!(transmitter.state(), eq(TransmitState::Idle));

        transmitter.start(SAMPLE_RATE, FREQUENCY, buffer()).unwrap();
        assert_that!(transmitter.state(), eq(TransmitState::Transmitting));
        transmitter.shutdown();
    }

    #[test]
    fn stream_setup_failure_is_reported() {
        let mut device = MockTransmitDevice::new();
        device.expect_tx_stream().times(1)
            .returning(|| Err(DeviceError::new("setup TX stream", "no such channel".to_owned())));
        let result = Transmitter::new(Box::new(device), Arc::new(AtomicBool::new(false)));
        assert_that!(result.is_err(), equal_to(true));
    }
}
