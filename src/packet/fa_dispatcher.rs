// src/packet/fa_dispatcher.rs

//! Binary packet framing and dispatch.
//!
//! ```text
//! [sync] [group bytes] [type words] [payload] [crc16 BE]
//!         \_________________ crc covers ___________/
//! ```

use core::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{Sender, TrySendError};
use log::{debug, trace, warn};

use super::subscriber::{BinaryFilter, DispatchReport, SubscriberList};
use super::{FindPacketResult, PacketDetails, PacketDispatcher, PacketKind, PacketMatch, RawPacket};
use crate::common::checksum::{encode_packet_crc, verify_packet_crc};
use crate::common::error::VnError;
use crate::measurement::groups::wire_fields;
use crate::measurement::{
    payload_length, BinaryGroup, BinaryHeader, CompositeData, EnabledMeasurements, HeaderError,
    MeasurementSource,
};

pub const FA_SYNC_BYTE: u8 = 0xFA;
pub const FB_SYNC_BYTE: u8 = 0xFB;

/// Sync byte + CRC trailer.
const FRAMING_OVERHEAD: usize = 3;

/// The two binary framings. They share a layout and differ in sync byte and accepted groups.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BinaryFraming {
    /// Legacy framing, original groups only.
    Fa,
    /// Extended framing, also carries the extension-byte groups.
    Fb,
}

impl BinaryFraming {
    pub const fn sync_byte(self) -> u8 {
        match self {
            BinaryFraming::Fa => FA_SYNC_BYTE,
            BinaryFraming::Fb => FB_SYNC_BYTE,
        }
    }

    pub const fn kind(self) -> PacketKind {
        match self {
            BinaryFraming::Fa => PacketKind::Fa,
            BinaryFraming::Fb => PacketKind::Fb,
        }
    }

    pub const fn max_packet_length(self) -> usize {
        match self {
            BinaryFraming::Fa => 2048,
            BinaryFraming::Fb => 4096,
        }
    }

    pub const fn accepts(self, group: BinaryGroup) -> bool {
        match self {
            BinaryFraming::Fa => !group.is_extended(),
            BinaryFraming::Fb => true,
        }
    }

    /// Frames `payload` behind `header`, appending the CRC trailer.
    pub fn encode_packet(self, header: &BinaryHeader, payload: &[u8]) -> Vec<u8> {
        let mut packet = Vec::with_capacity(header.encoded_len() + payload.len() + FRAMING_OVERHEAD);
        packet.push(self.sync_byte());
        header.encode(&mut packet);
        packet.extend_from_slice(payload);
        let crc = encode_packet_crc(&packet[1..]);
        packet.extend_from_slice(&crc);
        packet
    }
}

/// Dispatcher for `0xFA` packets; [`super::FbPacketDispatcher`] reuses it with the extended framing.
#[derive(Debug)]
pub struct FaPacketDispatcher {
    framing: BinaryFraming,
    subscribers: SubscriberList<BinaryFilter>,
    measurements: Sender<CompositeData>,
    enabled: EnabledMeasurements,
}

impl FaPacketDispatcher {
    pub fn new(measurements: Sender<CompositeData>) -> Self {
        Self::with_framing(BinaryFraming::Fa, measurements)
    }

    pub(crate) fn with_framing(framing: BinaryFraming, measurements: Sender<CompositeData>) -> Self {
        FaPacketDispatcher {
            framing,
            subscribers: SubscriberList::new(),
            measurements,
            enabled: EnabledMeasurements::all(),
        }
    }

    pub fn framing(&self) -> BinaryFraming {
        self.framing
    }

    pub fn subscribe(&mut self, queue: Sender<RawPacket>, filter: BinaryFilter) -> Result<(), VnError> {
        self.subscribers.subscribe(queue, filter)
    }

    pub fn unsubscribe(&mut self, queue: &Sender<RawPacket>) {
        self.subscribers.unsubscribe(queue);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Packets whose fields all lie within `enabled` are decoded onto the measurement queue.
    pub fn set_enabled_measurements(&mut self, enabled: EnabledMeasurements) {
        self.enabled = enabled;
    }

    pub fn enabled_measurements(&self) -> EnabledMeasurements {
        self.enabled
    }

    fn publish(&self, header: &BinaryHeader, payload: &[u8], timestamp: Duration) {
        match CompositeData::from_binary(header, payload) {
            Ok(data) => {
                let data = data.with_timestamp(timestamp).with_source(MeasurementSource::Binary(self.framing));
                match self.measurements.try_send(data) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => warn!("measurement queue full, dropping record"),
                    Err(TrySendError::Disconnected(_)) => debug!("measurement queue closed"),
                }
            }
            Err(e) => warn!("{:?} payload rejected: {:?}", self.framing, e),
        }
    }
}

impl PacketDispatcher for FaPacketDispatcher {
    fn kind(&self) -> PacketKind {
        self.framing.kind()
    }

    fn find_sync(&self, data: &[u8]) -> Option<usize> {
        let sync = self.framing.sync_byte();
        data.iter().position(|b| *b == sync)
    }

    fn find_packet(&self, data: &[u8]) -> FindPacketResult {
        if data.first() != Some(&self.framing.sync_byte()) {
            return FindPacketResult::Invalid;
        }
        let (header, header_len) = match BinaryHeader::decode(&data[1..]) {
            Ok(decoded) => decoded,
            Err(HeaderError::Incomplete) => return FindPacketResult::Incomplete,
            Err(e) => {
                trace!("{:?} header rejected: {:?}", self.framing, e);
                return FindPacketResult::Invalid;
            }
        };
        if header.is_empty() || header.groups().iter().any(|g| !self.framing.accepts(g.group)) {
            return FindPacketResult::Invalid;
        }
        let Ok(fields) = wire_fields(&header) else {
            return FindPacketResult::Invalid;
        };

        let payload_start = 1 + header_len;
        let payload_len = match payload_length(&fields, data.get(payload_start..).unwrap_or(&[])) {
            Ok(Some(len)) => len,
            Ok(None) => return FindPacketResult::Incomplete,
            Err(_) => return FindPacketResult::Invalid,
        };
        let total = payload_start + payload_len + 2;
        if total > self.framing.max_packet_length() {
            return FindPacketResult::Invalid;
        }
        if data.len() < total {
            return FindPacketResult::Incomplete;
        }
        if !verify_packet_crc(&data[1..total]) {
            trace!("{:?} packet failed CRC", self.framing);
            return FindPacketResult::Invalid;
        }

        let enabled = header.enabled_measurements();
        FindPacketResult::Found(PacketMatch {
            length: total,
            details: PacketDetails::Binary {
                framing: self.framing,
                header,
                enabled,
                payload_length: payload_len,
            },
        })
    }

    fn dispatch(&mut self, packet: &[u8], details: PacketDetails, timestamp: Duration) -> DispatchReport {
        let raw = RawPacket { details, data: Bytes::copy_from_slice(packet), timestamp };
        let PacketDetails::Binary { header, enabled, payload_length, .. } = &raw.details else {
            return DispatchReport::default();
        };

        let report = self.subscribers.deliver(enabled, &raw);
        if enabled.all_enabled_in(&self.enabled) {
            let end = packet.len().saturating_sub(2);
            let payload = &packet[end.saturating_sub(*payload_length)..end];
            self.publish(header, payload, timestamp);
        }
        report
    }

    fn max_packet_length(&self) -> usize {
        self.framing.max_packet_length()
    }
}
