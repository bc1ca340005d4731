// tests/integration.rs

use core::time::Duration;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Receiver;

use vnproto::command::AsyncErrorKind;
use vnproto::common::{AsciiValidation, ChecksumMode};
use vnproto::measurement::{BinaryGroup, BinaryHeader, CompositeData, EnabledMeasurements, MeasurementSource};
use vnproto::packet::{
    AsciiFilter, AsciiFilterType, AsciiPacketDispatcher, BinaryFilter, BinaryFraming, ByteBuffer,
    FaFilterType, FaPacketDispatcher, FbPacketDispatcher, PacketKind, PacketSynchronizer,
};
use vnproto::register::PortValue;
use vnproto::{
    Clock, Command, CommandProcessor, CommandState, Register, SendCommandBlockMode, Sensor, SensorConfig,
    SensorError, Transport, VnError,
};

struct Stack {
    processor: Arc<CommandProcessor>,
    async_errors: Receiver<vnproto::AsyncError>,
    measurements: Receiver<CompositeData>,
    sync: PacketSynchronizer,
    buffer: ByteBuffer,
}

impl Stack {
    fn new(config: &SensorConfig) -> Self {
        let (processor, async_errors) = CommandProcessor::new(config);
        let processor = Arc::new(processor);
        let (tx, measurements) = crossbeam_channel::bounded(16);
        let mut sync = PacketSynchronizer::new();
        sync.register(FaPacketDispatcher::new(tx.clone()));
        sync.register(AsciiPacketDispatcher::new(processor.clone(), tx.clone(), AsciiValidation::Auto));
        sync.register(FbPacketDispatcher::new(tx));
        Stack { processor, async_errors, measurements, sync, buffer: ByteBuffer::new(4096) }
    }

    fn inject(&mut self, bytes: &[u8]) -> usize {
        self.buffer.put(bytes).unwrap();
        self.sync.dispatch_all(&mut self.buffer, Duration::from_millis(5))
    }
}

fn accel_gyro_packet() -> Vec<u8> {
    let header = BinaryHeader::new()
        .with_group(BinaryGroup::Imu, (1 << 9) | (1 << 10))
        .unwrap();
    let payload: Vec<u8> = [0.5f32, -0.25, -9.81, 0.01, 0.02, 0.03]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    BinaryFraming::Fa.encode_packet(&header, &payload)
}

#[test]
fn test_read_register_round_trip() {
    let mut stack = Stack::new(&SensorConfig::default());
    let command = Arc::new(Command::read_register(5));

    let wire = stack.processor.register_command(&command, Duration::ZERO).unwrap();
    assert_eq!(wire.as_str(), "$VNRRG,05*A1DB\r\n");
    assert_eq!(command.state(), CommandState::AwaitingResponse);

    assert_eq!(stack.inject(b"$VNRRG,05,115200*E2D9\r\n"), 1);
    assert_eq!(command.state(), CommandState::Matched);
    assert_eq!(command.response().unwrap().as_str(), "05,115200");
    assert!(stack.async_errors.is_empty());
}

#[test]
fn test_unsolicited_error_becomes_async_error() {
    let mut stack = Stack::new(&SensorConfig::default());
    stack.inject(b"$VNERR,03*B43A\r\n");

    let error = stack.async_errors.try_recv().unwrap();
    assert_eq!(error.code(), Some(3));
    assert_eq!(error.kind, AsyncErrorKind::Sensor(SensorError::InvalidChecksum));
    assert!(stack.async_errors.is_empty());
    assert_eq!(stack.processor.queue_len(), 0);
}

#[test]
fn test_ins_stream_leaves_async_errors_to_the_device() {
    let mut stack = Stack::new(&SensorConfig::default());
    let (tx, ins) = crossbeam_channel::bounded(64);
    stack
        .sync
        .ascii_mut()
        .unwrap()
        .subscribe(tx, AsciiFilter::new("VNINS", AsciiFilterType::StartsWith).unwrap())
        .unwrap();

    let frame = b"$VNINS,328571.5,2043,0206,+010.071,-000.278,-001.026,+37.42,-122.08,+45.2,-0.5,+1.25,0,0.5,2.1,0.1*XX\r\n";
    for _ in 0..40 {
        stack.inject(frame);
    }
    stack.inject(b"$VNERR,03*B43A\r\n");

    assert_eq!(ins.len(), 40);
    let data = stack.measurements.try_recv().unwrap();
    assert!(data.matches_message("VNINS"));
    assert!(!data.matches_message("VNYMR"));
    let error = stack.async_errors.try_recv().unwrap();
    assert_eq!(error.kind, AsyncErrorKind::Sensor(SensorError::InvalidChecksum));
    assert!(stack.async_errors.is_empty());
}

#[test]
fn test_false_binary_sync_does_not_stall_response() {
    let mut stack = Stack::new(&SensorConfig::default());
    let command = Arc::new(Command::read_register(5));
    stack.processor.register_command(&command, Duration::ZERO).unwrap();

    let mut stream = vec![0xFA, 0x20, 0xFE, 0x07];
    stream.extend_from_slice(b"$VNRRG,05,115200*E2D9\r\n");
    assert_eq!(stack.inject(&stream), 1);
    assert_eq!(command.state(), CommandState::Matched);
    assert!(stack.buffer.is_empty());
}

#[test]
fn test_exact_and_any_match_subscribers() {
    let mut stack = Stack::new(&SensorConfig::default());
    let accel_only = EnabledMeasurements::none().with(BinaryGroup::Imu, 9);
    let (exact_tx, exact_rx) = crossbeam_channel::bounded(4);
    let (any_tx, any_rx) = crossbeam_channel::bounded(4);

    let fa = stack.sync.fa_mut().unwrap();
    fa.subscribe(exact_tx, BinaryFilter::new(accel_only, FaFilterType::ExactMatch)).unwrap();
    fa.subscribe(any_tx, BinaryFilter::new(accel_only, FaFilterType::AnyMatch)).unwrap();

    stack.inject(&accel_gyro_packet());
    assert!(exact_rx.is_empty());
    let packet = any_rx.try_recv().unwrap();
    assert_eq!(packet.kind(), PacketKind::Fa);
    assert_eq!(packet.data.len(), accel_gyro_packet().len());

    let data = stack.measurements.try_recv().unwrap();
    assert_eq!(data.imu.accel.unwrap()[2], -9.81);
    assert_eq!(data.timestamp, Duration::from_millis(5));
    assert_eq!(data.source, MeasurementSource::Binary(BinaryFraming::Fa));
}

#[test]
fn test_command_queue_capacity() {
    let config = SensorConfig::default().with_command_queue_capacity(2);
    let mut stack = Stack::new(&config);

    let first = Arc::new(Command::read_register(1));
    let second = Arc::new(Command::read_register(5));
    let third = Arc::new(Command::write_settings());
    stack.processor.register_command(&first, Duration::ZERO).unwrap();
    stack.processor.register_command(&second, Duration::ZERO).unwrap();
    assert_eq!(
        stack.processor.register_command(&third, Duration::ZERO),
        Err(VnError::CommandQueueFull)
    );

    stack.inject(b"$VNRRG,05,115200*E2D9\r\n");
    // matching the second command also drains the skipped first one
    assert_eq!(second.state(), CommandState::Matched);
    assert!(stack.processor.register_command(&third, Duration::ZERO).is_ok());
}

#[test]
fn test_application_and_receive_contexts() {
    let stack = Stack::new(&SensorConfig::default());
    let Stack { processor, mut sync, mut buffer, .. } = stack;
    let (bytes_tx, bytes_rx) = crossbeam_channel::unbounded::<Vec<u8>>();

    let receiver = thread::spawn(move || {
        for chunk in bytes_rx {
            buffer.put(&chunk).unwrap();
            sync.dispatch_all(&mut buffer, Duration::ZERO);
        }
        sync.stats()
    });

    let command = Arc::new(Command::read_register(5));
    processor.register_command(&command, Duration::ZERO).unwrap();
    bytes_tx.send(b"$VNRRG,05,11".to_vec()).unwrap();
    bytes_tx.send(b"5200*E2D9\r\n".to_vec()).unwrap();
    drop(bytes_tx);

    let stats = receiver.join().unwrap();
    assert_eq!(stats.ascii_packets, 1);
    assert_eq!(command.state(), CommandState::Matched);
}

#[test]
fn test_unsubscribe_is_idempotent() {
    let mut stack = Stack::new(&SensorConfig::default());
    let (tx, rx) = crossbeam_channel::bounded(4);
    let (never_tx, _never_rx) = crossbeam_channel::bounded(4);

    let fb = stack.sync.fb_mut().unwrap();
    fb.unsubscribe(&never_tx);
    fb.subscribe(tx.clone(), BinaryFilter::new(EnabledMeasurements::all(), FaFilterType::AnyMatch))
        .unwrap();
    fb.unsubscribe(&tx);
    fb.unsubscribe(&tx);
    assert_eq!(fb.subscriber_count(), 0);

    let header = BinaryHeader::new().with_group(BinaryGroup::Gnss3, 1 << 1).unwrap();
    stack.inject(&BinaryFraming::Fb.encode_packet(&header, &7u64.to_le_bytes()));
    assert!(rx.is_empty());
    assert_eq!(stack.sync.stats().fb_packets, 1);
}

/// Loopback sensor: answers reads from a register map and echoes writes.
struct FakeSensor {
    rx: VecDeque<u8>,
    baud: u32,
}

impl FakeSensor {
    fn answer(&mut self, body: &str) {
        let crc = vnproto::common::calculate_crc16(body.as_bytes());
        self.rx.extend(format!("${body}*{crc:04X}\r\n").bytes());
    }
}

impl Transport for FakeSensor {
    type Error = ();

    fn read(&mut self, buf: &mut [u8]) -> nb::Result<usize, ()> {
        if self.rx.is_empty() {
            return Err(nb::Error::WouldBlock);
        }
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, bytes: &[u8]) -> nb::Result<usize, ()> {
        let text = String::from_utf8_lossy(bytes).to_string();
        let body = text.trim_start_matches('$').split('*').next().unwrap_or_default().to_string();
        match body.as_str() {
            "VNRRG,05" => {
                let reply = format!("VNRRG,05,{}", self.baud);
                self.answer(&reply);
            }
            b if b.starts_with("VNWRG,05,") => {
                self.baud = b["VNWRG,05,".len()..].parse().unwrap_or(self.baud);
                self.answer(b);
            }
            "VNRRG,08" => self.answer("VNERR,08"),
            _ => {}
        }
        Ok(bytes.len())
    }
}

#[derive(Default)]
struct SteppedClock(Duration);

impl Clock for SteppedClock {
    fn now(&self) -> Duration {
        self.0
    }

    fn sleep(&mut self, duration: Duration) {
        self.0 += duration;
    }
}

#[test]
fn test_sensor_register_session() {
    let transport = FakeSensor { rx: VecDeque::new(), baud: 115200 };
    let config = SensorConfig::default().with_checksum_mode(ChecksumMode::Crc16);
    let mut sensor = Sensor::new(transport, SteppedClock::default(), config);

    assert_eq!(sensor.read_register(5).unwrap(), Register::BaudRate(PortValue::new(115200)));

    let faster = Register::BaudRate(PortValue::new(921600));
    sensor.write_register(&faster).unwrap();
    assert_eq!(sensor.read_register(5).unwrap(), faster);

    let err = sensor.read_register(8).unwrap_err();
    assert_eq!(err.protocol(), Some(&VnError::Sensor(SensorError::InvalidRegister)));

    let silent = Arc::new(Command::known_magnetic_disturbance(true));
    let err = sensor.send_command(&silent, SendCommandBlockMode::Block).unwrap_err();
    assert_eq!(err.protocol(), Some(&VnError::ResponseTimeout));
    assert_eq!(silent.state(), CommandState::TimedOut);
}
