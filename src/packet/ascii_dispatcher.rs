// src/packet/ascii_dispatcher.rs

use core::time::Duration;
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::{Sender, TrySendError};
use log::{debug, trace, warn};

use super::subscriber::{AsciiFilter, DispatchReport, SubscriberList};
use super::{FindPacketResult, PacketDetails, PacketDispatcher, PacketKind, PacketMatch, RawPacket};
use crate::command::CommandProcessor;
use crate::common::ascii::{
    AsciiHeader, ASCII_HEADER_MAX_LEN, ASCII_MESSAGE_MAX_LEN, CHECKSUM_DELIMITER, SYNC_CHAR,
};
use crate::common::checksum::{verify_ascii_frame, AsciiValidation};
use crate::common::error::VnError;
use crate::measurement::{decode_ascii_measurement, is_ascii_measurement, CompositeData, MeasurementSource};

/// Longest checksum field (CRC-16 as hex).
const MAX_CHECKSUM_DIGITS: usize = 4;

/// Dispatcher for `$...*XX\r\n` frames.
///
/// Asynchronous outputs go to the measurement queue, everything else to the command processor.
/// A non-output frame that a subscriber received and no command claims is not reported as an
/// async error.
#[derive(Debug)]
pub struct AsciiPacketDispatcher {
    subscribers: SubscriberList<AsciiFilter>,
    processor: Arc<CommandProcessor>,
    measurements: Sender<CompositeData>,
    validation: AsciiValidation,
}

impl AsciiPacketDispatcher {
    pub fn new(
        processor: Arc<CommandProcessor>,
        measurements: Sender<CompositeData>,
        validation: AsciiValidation,
    ) -> Self {
        AsciiPacketDispatcher { subscribers: SubscriberList::new(), processor, measurements, validation }
    }

    pub fn subscribe(&mut self, queue: Sender<RawPacket>, filter: AsciiFilter) -> Result<(), VnError> {
        self.subscribers.subscribe(queue, filter)
    }

    pub fn unsubscribe(&mut self, queue: &Sender<RawPacket>) {
        self.subscribers.unsubscribe(queue);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn publish(&self, header: &AsciiHeader, message: &str, timestamp: Duration) {
        match decode_ascii_measurement(message) {
            Ok(Some(data)) => {
                let data = data.with_timestamp(timestamp).with_source(MeasurementSource::Ascii(*header));
                match self.measurements.try_send(data) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => warn!("measurement queue full, dropping record"),
                    Err(TrySendError::Disconnected(_)) => debug!("measurement queue closed"),
                }
            }
            Ok(None) => trace!("{} output not decoded", header),
            Err(e) => warn!("malformed measurement {}: {}", message, e),
        }
    }
}

impl PacketDispatcher for AsciiPacketDispatcher {
    fn kind(&self) -> PacketKind {
        PacketKind::Ascii
    }

    fn find_sync(&self, data: &[u8]) -> Option<usize> {
        data.iter().position(|b| *b == SYNC_CHAR)
    }

    fn find_packet(&self, data: &[u8]) -> FindPacketResult {
        if data.first() != Some(&SYNC_CHAR) {
            return FindPacketResult::Invalid;
        }

        // body: printable, no second '$', terminated by '*'
        let mut star = None;
        for (i, b) in data.iter().enumerate().take(ASCII_MESSAGE_MAX_LEN).skip(1) {
            match *b {
                CHECKSUM_DELIMITER => {
                    star = Some(i);
                    break;
                }
                SYNC_CHAR => return FindPacketResult::Invalid,
                0x20..=0x7E => {}
                _ => return FindPacketResult::Invalid,
            }
        }
        let Some(star) = star else {
            return if data.len() >= ASCII_MESSAGE_MAX_LEN {
                FindPacketResult::Invalid
            } else {
                FindPacketResult::Incomplete
            };
        };

        // checksum digits, then "\r\n"
        let tail = &data[star + 1..];
        let mut digits = 0;
        loop {
            match tail.get(digits) {
                None => return FindPacketResult::Incomplete,
                Some(b'\r') => break,
                Some(b) if b.is_ascii_hexdigit() || *b == b'X' => {
                    digits += 1;
                    if digits > MAX_CHECKSUM_DIGITS {
                        return FindPacketResult::Invalid;
                    }
                }
                Some(_) => return FindPacketResult::Invalid,
            }
        }
        if digits != 2 && digits != 4 {
            return FindPacketResult::Invalid;
        }
        match tail.get(digits + 1) {
            None => return FindPacketResult::Incomplete,
            Some(b'\n') => {}
            Some(_) => return FindPacketResult::Invalid,
        }
        let length = star + 1 + digits + 2;
        if length > ASCII_MESSAGE_MAX_LEN {
            return FindPacketResult::Invalid;
        }

        if let Err(e) = verify_ascii_frame(&data[..length], self.validation) {
            trace!("ASCII frame rejected: {}", e);
            return FindPacketResult::Invalid;
        }

        let body = &data[1..star];
        let header_end = body.iter().position(|b| *b == b',').unwrap_or(body.len());
        if header_end == 0 || header_end > ASCII_HEADER_MAX_LEN {
            return FindPacketResult::Invalid;
        }
        // printable ASCII was checked above
        let Some(header) = core::str::from_utf8(&body[..header_end])
            .ok()
            .and_then(|h| AsciiHeader::from(h).ok())
        else {
            return FindPacketResult::Invalid;
        };

        FindPacketResult::Found(PacketMatch { length, details: PacketDetails::Ascii { header, length } })
    }

    fn dispatch(&mut self, packet: &[u8], details: PacketDetails, timestamp: Duration) -> DispatchReport {
        let raw = RawPacket { details, data: Bytes::copy_from_slice(packet), timestamp };
        let PacketDetails::Ascii { header, .. } = &raw.details else {
            return DispatchReport::default();
        };
        let report = self.subscribers.deliver(header.as_str(), &raw);

        let Ok(text) = core::str::from_utf8(packet) else {
            return report;
        };
        let message = text.trim_end_matches(['\r', '\n']);
        trace!("RX {}", message);
        if is_ascii_measurement(header) {
            self.publish(header, message, timestamp);
        } else if report.delivered > 0 {
            self.processor.match_consumed_response(message, timestamp);
        } else {
            self.processor.match_response(message, timestamp);
        }
        report
    }

    fn max_packet_length(&self) -> usize {
        ASCII_MESSAGE_MAX_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CommandState};
    use crate::common::SensorConfig;
    use crate::packet::AsciiFilterType;
    use crossbeam_channel::Receiver;

    struct Fixture {
        dispatcher: AsciiPacketDispatcher,
        processor: Arc<CommandProcessor>,
        measurements: Receiver<CompositeData>,
        async_errors: Receiver<crate::command::AsyncError>,
    }

    fn fixture(validation: AsciiValidation) -> Fixture {
        let (processor, async_errors) = CommandProcessor::new(&SensorConfig::default());
        let processor = Arc::new(processor);
        let (tx, measurements) = crossbeam_channel::bounded(4);
        Fixture {
            dispatcher: AsciiPacketDispatcher::new(processor.clone(), tx, validation),
            processor,
            measurements,
            async_errors,
        }
    }

    fn found(result: FindPacketResult) -> PacketMatch {
        match result {
            FindPacketResult::Found(m) => m,
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn test_find_crc_and_checksum8_frames() {
        let f = fixture(AsciiValidation::Auto);
        let crc = b"$VNRRG,05,115200*E2D9\r\nrest";
        let m = found(f.dispatcher.find_packet(crc));
        assert_eq!(m.length, crc.len() - 4);
        assert_eq!(
            m.details,
            PacketDetails::Ascii { header: AsciiHeader::from("VNRRG").unwrap(), length: m.length }
        );

        let xor = b"$VNRRG,05,115200*5D\r\n";
        assert_eq!(found(f.dispatcher.find_packet(xor)).length, xor.len());

        let unchecked = b"$VNYPR,1,2,3*XX\r\n";
        assert_eq!(found(f.dispatcher.find_packet(unchecked)).length, unchecked.len());
    }

    #[test]
    fn test_validation_mode_restricts_width() {
        let f = fixture(AsciiValidation::Crc16Only);
        assert_eq!(f.dispatcher.find_packet(b"$VNRRG,05,115200*5D\r\n"), FindPacketResult::Invalid);
        assert!(matches!(
            f.dispatcher.find_packet(b"$VNRRG,05,115200*E2D9\r\n"),
            FindPacketResult::Found(_)
        ));
    }

    #[test]
    fn test_incomplete_and_invalid_frames() {
        let f = fixture(AsciiValidation::Auto);
        let frame = b"$VNRRG,05,115200*E2D9\r\n";
        for cut in 1..frame.len() {
            assert_eq!(f.dispatcher.find_packet(&frame[..cut]), FindPacketResult::Incomplete, "cut {cut}");
        }
        assert_eq!(f.dispatcher.find_packet(b"$VNRRG,05,115200*E2D8\r\n"), FindPacketResult::Invalid);
        assert_eq!(f.dispatcher.find_packet(b"$VNRRG$VNRRG,05*A1DB\r\n"), FindPacketResult::Invalid);
        assert_eq!(f.dispatcher.find_packet(b"$VNRRG,05*A1D\r\n"), FindPacketResult::Invalid);
        assert_eq!(f.dispatcher.find_packet(b"$VNRRG,05*A1DB\rX"), FindPacketResult::Invalid);
        assert_eq!(f.dispatcher.find_packet(b"$VN\x01RG*00\r\n"), FindPacketResult::Invalid);

        let mut endless = vec![b'$'];
        endless.extend(std::iter::repeat(b'A').take(ASCII_MESSAGE_MAX_LEN));
        assert_eq!(f.dispatcher.find_packet(&endless), FindPacketResult::Invalid);
    }

    #[test]
    fn test_response_reaches_command() {
        let mut f = fixture(AsciiValidation::Auto);
        let cmd = Arc::new(Command::read_register(5));
        f.processor.register_command(&cmd, Duration::ZERO).unwrap();

        let frame = b"$VNRRG,05,115200*E2D9\r\n";
        let m = found(f.dispatcher.find_packet(frame));
        f.dispatcher.dispatch(frame, m.details, Duration::from_millis(5));

        assert_eq!(cmd.state(), CommandState::Matched);
        assert_eq!(cmd.response().unwrap().as_str(), "05,115200");
        assert!(f.async_errors.is_empty());
    }

    #[test]
    fn test_measurement_and_subscribers() {
        let mut f = fixture(AsciiValidation::Auto);
        let (ypr_tx, ypr_rx) = crossbeam_channel::bounded(2);
        let (rest_tx, rest_rx) = crossbeam_channel::bounded(2);
        f.dispatcher
            .subscribe(ypr_tx, AsciiFilter::new("VNYPR", AsciiFilterType::StartsWith).unwrap())
            .unwrap();
        f.dispatcher
            .subscribe(rest_tx, AsciiFilter::new("VNYPR", AsciiFilterType::DoesNotStartWith).unwrap())
            .unwrap();

        let frame = b"$VNYPR,+010.071,-000.278,-001.026*A566\r\n";
        let m = found(f.dispatcher.find_packet(frame));
        let report = f.dispatcher.dispatch(frame, m.details, Duration::ZERO);

        assert_eq!(report.delivered, 1);
        assert_eq!(ypr_rx.try_recv().unwrap().as_ascii(), Some("$VNYPR,+010.071,-000.278,-001.026*A566\r\n"));
        assert!(rest_rx.is_empty());
        let data = f.measurements.try_recv().unwrap();
        assert_eq!(data.attitude.ypr.unwrap().yaw, 10.071);
        assert!(data.matches_message("VNYPR"));
        // measurement frames never reach the async error queue
        assert!(f.async_errors.is_empty());
    }

    fn dispatch(f: &mut Fixture, frame: &[u8]) -> DispatchReport {
        let m = found(f.dispatcher.find_packet(frame));
        f.dispatcher.dispatch(frame, m.details, Duration::ZERO)
    }

    #[test]
    fn test_undecoded_output_reaches_subscriber_only() {
        let mut f = fixture(AsciiValidation::Auto);
        let (tx, rx) = crossbeam_channel::bounded(2);
        f.dispatcher
            .subscribe(tx, AsciiFilter::new("VNGPS", AsciiFilterType::StartsWith).unwrap())
            .unwrap();

        let frame = b"$VNGPS,342123.5,2043,3,9,+37.42,-122.08,+45.2*XX\r\n";
        assert_eq!(dispatch(&mut f, frame).delivered, 1);
        assert_eq!(rx.len(), 1);
        assert!(f.measurements.is_empty());
        assert!(f.async_errors.is_empty());

        // unsubscribed outputs are dropped quietly too
        dispatch(&mut f, b"$VNG2S,1,2*XX\r\n");
        assert!(f.async_errors.is_empty());
    }

    #[test]
    fn test_ins_output_is_decoded_and_tagged() {
        let mut f = fixture(AsciiValidation::Auto);
        let (tx, rx) = crossbeam_channel::bounded(2);
        f.dispatcher
            .subscribe(tx, AsciiFilter::new("VNINS", AsciiFilterType::StartsWith).unwrap())
            .unwrap();

        let frame = b"$VNINS,328571.5,2043,0206,+010.071,-000.278,-001.026,+37.42,-122.08,+45.2,-0.5,+1.25,0,0.5,2.1,0.1*XX\r\n";
        dispatch(&mut f, frame);

        assert_eq!(rx.len(), 1);
        let data = f.measurements.try_recv().unwrap();
        assert!(data.matches_message("VNINS"));
        assert_eq!(data.ins.vel_ned, Some([-0.5, 1.25, 0.0]));
        assert!(f.async_errors.is_empty());
    }

    #[test]
    fn test_subscribed_unknown_frame_is_not_an_async_error() {
        let mut f = fixture(AsciiValidation::Auto);
        let frame = b"$VNXYZ,1,2*XX\r\n";

        // nobody listening: reported
        dispatch(&mut f, frame);
        assert_eq!(f.async_errors.try_recv().unwrap().kind, crate::command::AsyncErrorKind::UnexpectedMessage);

        let (tx, rx) = crossbeam_channel::bounded(2);
        f.dispatcher
            .subscribe(tx, AsciiFilter::new("VNXYZ", AsciiFilterType::StartsWith).unwrap())
            .unwrap();
        dispatch(&mut f, frame);
        assert_eq!(rx.len(), 1);
        assert!(f.async_errors.is_empty());

        // a subscribed frame can still answer a command
        let (tx, _all) = crossbeam_channel::bounded(2);
        f.dispatcher
            .subscribe(tx, AsciiFilter::new("VNRRG", AsciiFilterType::StartsWith).unwrap())
            .unwrap();
        let cmd = Arc::new(Command::read_register(5));
        f.processor.register_command(&cmd, Duration::ZERO).unwrap();
        dispatch(&mut f, b"$VNRRG,05,115200*E2D9\r\n");
        assert_eq!(cmd.state(), CommandState::Matched);
    }
}
