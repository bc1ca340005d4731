// src/packet/mod.rs

//! Framing, synchronization and fan-out of inbound packets.

use core::time::Duration;

use bytes::Bytes;

use crate::common::ascii::AsciiHeader;
use crate::measurement::{BinaryHeader, EnabledMeasurements};

pub mod ascii_dispatcher;
pub mod byte_buffer;
pub mod fa_dispatcher;
pub mod fb_dispatcher;
pub mod subscriber;
pub mod synchronizer;

pub use ascii_dispatcher::AsciiPacketDispatcher;
pub use byte_buffer::ByteBuffer;
pub use fa_dispatcher::{BinaryFraming, FaPacketDispatcher};
pub use fb_dispatcher::FbPacketDispatcher;
pub use subscriber::{
    AsciiFilter, AsciiFilterType, BinaryFilter, DispatchReport, FaFilterType, PacketFilter,
    SubscriberList, Subscription,
};
pub use synchronizer::{PacketSynchronizer, SyncStats, SyncedPacket};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PacketKind {
    Ascii,
    Fa,
    Fb,
}

/// What a dispatcher learned about a packet while framing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketDetails {
    Ascii {
        header: AsciiHeader,
        /// Frame length including `$` and the trailing `\r\n`.
        length: usize,
    },
    Binary {
        framing: BinaryFraming,
        header: BinaryHeader,
        /// Fields carried, with common fields expanded.
        enabled: EnabledMeasurements,
        payload_length: usize,
    },
}

impl PacketDetails {
    pub fn kind(&self) -> PacketKind {
        match self {
            PacketDetails::Ascii { .. } => PacketKind::Ascii,
            PacketDetails::Binary { framing, .. } => framing.kind(),
        }
    }
}

/// Immutable copy of one framed packet, shared by every queue it is delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub details: PacketDetails,
    pub data: Bytes,
    pub timestamp: Duration,
}

impl RawPacket {
    pub fn kind(&self) -> PacketKind {
        self.details.kind()
    }

    /// The frame as text, for ASCII packets.
    pub fn as_ascii(&self) -> Option<&str> {
        match self.details {
            PacketDetails::Ascii { .. } => core::str::from_utf8(&self.data).ok(),
            PacketDetails::Binary { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketMatch {
    /// Bytes from the sync byte through the end of the packet.
    pub length: usize,
    pub details: PacketDetails,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindPacketResult {
    Found(PacketMatch),
    /// Not enough bytes buffered yet.
    Incomplete,
    /// The sync byte does not start a valid packet.
    Invalid,
}

/// A parser for one framing plus the consumers of its packets.
pub trait PacketDispatcher {
    fn kind(&self) -> PacketKind;

    /// Offset of the first byte that could start a packet.
    fn find_sync(&self, data: &[u8]) -> Option<usize>;

    /// Frames a packet starting at `data[0]`, which is a sync byte.
    fn find_packet(&self, data: &[u8]) -> FindPacketResult;

    /// Hands a framed packet to subscribers and downstream consumers.
    fn dispatch(&mut self, packet: &[u8], details: PacketDetails, timestamp: Duration) -> DispatchReport;

    /// Longest packet this framing can produce.
    fn max_packet_length(&self) -> usize;
}

/// Registered dispatchers. A closed set keeps typed access for subscription management.
#[derive(Debug)]
pub enum Dispatcher {
    Ascii(AsciiPacketDispatcher),
    Fa(FaPacketDispatcher),
    Fb(FbPacketDispatcher),
}

macro_rules! delegate {
    ($self:ident, $d:ident => $body:expr) => {
        match $self {
            Dispatcher::Ascii($d) => $body,
            Dispatcher::Fa($d) => $body,
            Dispatcher::Fb($d) => $body,
        }
    };
}

impl PacketDispatcher for Dispatcher {
    fn kind(&self) -> PacketKind {
        delegate!(self, d => d.kind())
    }

    fn find_sync(&self, data: &[u8]) -> Option<usize> {
        delegate!(self, d => d.find_sync(data))
    }

    fn find_packet(&self, data: &[u8]) -> FindPacketResult {
        delegate!(self, d => d.find_packet(data))
    }

    fn dispatch(&mut self, packet: &[u8], details: PacketDetails, timestamp: Duration) -> DispatchReport {
        delegate!(self, d => d.dispatch(packet, details, timestamp))
    }

    fn max_packet_length(&self) -> usize {
        delegate!(self, d => d.max_packet_length())
    }
}

impl From<AsciiPacketDispatcher> for Dispatcher {
    fn from(d: AsciiPacketDispatcher) -> Self {
        Dispatcher::Ascii(d)
    }
}

impl From<FaPacketDispatcher> for Dispatcher {
    fn from(d: FaPacketDispatcher) -> Self {
        Dispatcher::Fa(d)
    }
}

impl From<FbPacketDispatcher> for Dispatcher {
    fn from(d: FbPacketDispatcher) -> Self {
        Dispatcher::Fb(d)
    }
}
