// src/sensor/mod.rs

//! A sensor session: the receive loop plus the blocking command API on top of the stack.

use core::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use log::{trace, warn};

use crate::command::{AsyncError, CommandProcessor};
use crate::common::config::SensorConfig;
use crate::common::error::{SessionError, VnError};
use crate::common::hal_traits::{Clock, Transport};
use crate::measurement::{CompositeData, EnabledMeasurements};
use crate::packet::{
    AsciiFilter, AsciiPacketDispatcher, BinaryFilter, BinaryFraming, ByteBuffer,
    FaPacketDispatcher, FbPacketDispatcher, PacketSynchronizer, RawPacket, SyncStats,
};

mod transaction;

pub use transaction::SendCommandBlockMode;

/// One logical conversation with a sensor over a transport.
#[derive(Debug)]
pub struct Sensor<T, C>
where
    T: Transport,
    C: Clock,
{
    transport: T,
    clock: C,
    config: SensorConfig,
    buffer: ByteBuffer,
    synchronizer: PacketSynchronizer,
    processor: Arc<CommandProcessor>,
    measurements: Receiver<CompositeData>,
    async_errors: Receiver<AsyncError>,
    read_chunk: Vec<u8>,
}

impl<T, C> Sensor<T, C>
where
    T: Transport,
    T::Error: Debug,
    C: Clock,
{
    /// Builds the stack: byte buffer, command processor and the Fa, Ascii and Fb dispatchers
    /// (registered in that order).
    pub fn new(transport: T, clock: C, config: SensorConfig) -> Self {
        let (processor, async_errors) = CommandProcessor::new(&config);
        let processor = Arc::new(processor);
        let (tx, measurements) = crossbeam_channel::bounded(config.measurement_queue_capacity);

        let mut synchronizer = PacketSynchronizer::new();
        synchronizer.register(FaPacketDispatcher::new(tx.clone()));
        synchronizer.register(AsciiPacketDispatcher::new(
            processor.clone(),
            tx.clone(),
            config.ascii_validation,
        ));
        synchronizer.register(FbPacketDispatcher::new(tx));

        Sensor {
            transport,
            clock,
            buffer: ByteBuffer::new(config.byte_buffer_capacity),
            synchronizer,
            processor,
            measurements,
            async_errors,
            read_chunk: vec![0; config.read_chunk_size.max(1)],
            config,
        }
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// The command processor, for registering commands from another context.
    pub fn processor(&self) -> Arc<CommandProcessor> {
        self.processor.clone()
    }

    pub fn stats(&self) -> SyncStats {
        self.synchronizer.stats()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consumes the session, returning the transport and clock.
    pub fn release(self) -> (T, C) {
        (self.transport, self.clock)
    }

    /// Reads everything the transport has and dispatches every complete packet.
    ///
    /// Returns the number of packets dispatched.
    pub fn poll(&mut self) -> Result<usize, SessionError<T::Error>> {
        let mut dispatched = 0;
        loop {
            let n = match self.transport.read(&mut self.read_chunk) {
                Ok(0) | Err(nb::Error::WouldBlock) => break,
                Ok(n) => n,
                Err(nb::Error::Other(e)) => return Err(SessionError::Io(e)),
            };
            trace!("read {} bytes", n);
            let now = self.clock.now();

            if self.buffer.put(&self.read_chunk[..n]).is_err() {
                // make room by draining complete packets, then try once more
                dispatched += self.synchronizer.dispatch_all(&mut self.buffer, now);
                if let Err(e) = self.buffer.put(&self.read_chunk[..n]) {
                    warn!("dropping {} received bytes: {}", n, e);
                    return Err(e.into());
                }
            }
            dispatched += self.synchronizer.dispatch_all(&mut self.buffer, now);
        }
        Ok(dispatched)
    }

    /// Polls until `running` is cleared, sleeping the configured interval between polls.
    pub fn run(&mut self, running: &AtomicBool) -> Result<(), SessionError<T::Error>> {
        while running.load(Ordering::Relaxed) {
            self.poll()?;
            self.clock.sleep(self.config.poll_interval);
        }
        Ok(())
    }

    /// Oldest decoded measurement, if any.
    pub fn next_measurement(&self) -> Option<CompositeData> {
        self.measurements.try_recv().ok()
    }

    pub fn measurements(&self) -> &Receiver<CompositeData> {
        &self.measurements
    }

    pub fn next_async_error(&self) -> Option<AsyncError> {
        self.async_errors.try_recv().ok()
    }

    pub fn async_errors(&self) -> &Receiver<AsyncError> {
        &self.async_errors
    }

    pub fn subscribe_ascii(&mut self, queue: Sender<RawPacket>, filter: AsciiFilter) -> Result<(), VnError> {
        match self.synchronizer.ascii_mut() {
            Some(dispatcher) => dispatcher.subscribe(queue, filter),
            None => Err(VnError::SubscriberListFull),
        }
    }

    pub fn subscribe_binary(
        &mut self,
        framing: BinaryFraming,
        queue: Sender<RawPacket>,
        filter: BinaryFilter,
    ) -> Result<(), VnError> {
        let dispatcher = match framing {
            BinaryFraming::Fa => self.synchronizer.fa_mut(),
            BinaryFraming::Fb => self.synchronizer.fb_mut().map(|fb| &mut **fb),
        };
        match dispatcher {
            Some(dispatcher) => dispatcher.subscribe(queue, filter),
            None => Err(VnError::SubscriberListFull),
        }
    }

    /// Removes `queue` from every dispatcher. Queues that were never subscribed are ignored.
    pub fn unsubscribe(&mut self, queue: &Sender<RawPacket>) {
        if let Some(ascii) = self.synchronizer.ascii_mut() {
            ascii.unsubscribe(queue);
        }
        if let Some(fa) = self.synchronizer.fa_mut() {
            fa.unsubscribe(queue);
        }
        if let Some(fb) = self.synchronizer.fb_mut() {
            fb.unsubscribe(queue);
        }
    }

    /// Restricts which binary packets are decoded onto the measurement queue.
    pub fn set_enabled_measurements(&mut self, enabled: EnabledMeasurements) {
        if let Some(fa) = self.synchronizer.fa_mut() {
            fa.set_enabled_measurements(enabled);
        }
        if let Some(fb) = self.synchronizer.fb_mut() {
            fb.set_enabled_measurements(enabled);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::time::Duration;
    use std::collections::VecDeque;

    pub(crate) type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

    /// In-memory transport: written frames go to `responder`, whose answers become readable.
    pub(crate) struct MockTransport {
        pub rx: VecDeque<u8>,
        pub written: Vec<Vec<u8>>,
        pub responder: Responder,
        pub fail_writes: bool,
        pub block_writes: bool,
    }

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub(crate) struct MockError;

    impl MockTransport {
        pub(crate) fn new(responder: Responder) -> Self {
            MockTransport { rx: VecDeque::new(), written: Vec::new(), responder, fail_writes: false, block_writes: false }
        }

        pub(crate) fn silent() -> Self {
            Self::new(Box::new(|_| None))
        }

        pub(crate) fn stage(&mut self, bytes: &[u8]) {
            self.rx.extend(bytes);
        }
    }

    impl Transport for MockTransport {
        type Error = MockError;

        fn read(&mut self, buf: &mut [u8]) -> nb::Result<usize, MockError> {
            if self.rx.is_empty() {
                return Err(nb::Error::WouldBlock);
            }
            let n = buf.len().min(self.rx.len());
            for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }

        fn write(&mut self, bytes: &[u8]) -> nb::Result<usize, MockError> {
            if self.fail_writes {
                return Err(nb::Error::Other(MockError));
            }
            if self.block_writes {
                return Err(nb::Error::WouldBlock);
            }
            self.written.push(bytes.to_vec());
            if let Some(reply) = (self.responder)(bytes) {
                self.rx.extend(reply);
            }
            Ok(bytes.len())
        }
    }

    /// Clock that only moves when slept on.
    #[derive(Debug, Default)]
    pub(crate) struct MockClock {
        pub now: Duration,
    }

    impl Clock for MockClock {
        fn now(&self) -> Duration {
            self.now
        }

        fn sleep(&mut self, duration: Duration) {
            self.now += duration;
        }
    }

    pub(crate) fn sensor(transport: MockTransport) -> Sensor<MockTransport, MockClock> {
        Sensor::new(transport, MockClock::default(), SensorConfig::default())
    }

    #[test]
    fn test_poll_dispatches_measurements() {
        let mut transport = MockTransport::silent();
        transport.stage(b"$VNYPR,+010.071,-000.278,-001.026*A566\r\n");
        let mut sensor = sensor(transport);

        assert_eq!(sensor.poll().unwrap(), 1);
        let data = sensor.next_measurement().unwrap();
        assert_eq!(data.attitude.ypr.unwrap().yaw, 10.071);
        assert!(sensor.next_measurement().is_none());
    }

    #[test]
    fn test_async_error_surfaces() {
        let mut transport = MockTransport::silent();
        transport.stage(b"$VNERR,0A*00\r\n");
        let mut sensor = sensor(transport);

        sensor.poll().unwrap();
        assert_eq!(sensor.next_async_error().unwrap().code(), Some(10));
    }

    #[test]
    fn test_small_buffer_drains_before_overflow() {
        let frame = b"$VNYPR,+010.071,-000.278,-001.026*A566\r\n";
        let mut transport = MockTransport::silent();
        for _ in 0..3 {
            transport.stage(frame);
        }
        let config = SensorConfig::default()
            .with_byte_buffer_capacity(64)
            .with_read_chunk_size(32);
        let mut sensor = Sensor::new(transport, MockClock::default(), config);

        assert_eq!(sensor.poll().unwrap(), 3);
        assert_eq!(sensor.measurements().len(), 3);
    }

    #[test]
    fn test_run_stops_when_flag_cleared() {
        let mut sensor = sensor(MockTransport::silent());
        let running = AtomicBool::new(false);
        sensor.run(&running).unwrap();
        assert_eq!(sensor.release().1.now, Duration::ZERO);
    }

    #[test]
    fn test_subscriptions_through_session() {
        let mut transport = MockTransport::silent();
        transport.stage(b"$VNYPR,+010.071,-000.278,-001.026*A566\r\n");
        let mut sensor = sensor(transport);

        let (tx, rx) = crossbeam_channel::bounded(4);
        let filter = AsciiFilter::new("VNYPR", crate::packet::AsciiFilterType::StartsWith).unwrap();
        sensor.subscribe_ascii(tx.clone(), filter).unwrap();
        sensor
            .subscribe_binary(
                BinaryFraming::Fb,
                tx.clone(),
                BinaryFilter::new(EnabledMeasurements::all(), crate::packet::FaFilterType::AnyMatch),
            )
            .unwrap();
        sensor.poll().unwrap();
        assert_eq!(rx.len(), 1);

        sensor.unsubscribe(&tx);
        sensor.unsubscribe(&tx);
        sensor.transport_mut().stage(b"$VNYPR,+010.071,-000.278,-001.026*A566\r\n");
        sensor.poll().unwrap();
        assert_eq!(rx.len(), 1);
    }
}
