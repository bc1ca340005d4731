// src/packet/synchronizer.rs

use core::time::Duration;

use log::{debug, trace};

use super::byte_buffer::ByteBuffer;
use super::subscriber::DispatchReport;
use super::{
    AsciiPacketDispatcher, Dispatcher, FaPacketDispatcher, FbPacketDispatcher, FindPacketResult,
    PacketDispatcher, PacketKind,
};

/// A packet the synchronizer framed and dispatched.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SyncedPacket {
    pub kind: PacketKind,
    pub length: usize,
    /// Bytes discarded before the packet's sync byte.
    pub skipped: usize,
    pub report: DispatchReport,
}

/// Running counters.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct SyncStats {
    pub ascii_packets: u64,
    pub fa_packets: u64,
    pub fb_packets: u64,
    pub skipped_bytes: u64,
    /// Sync candidates that did not start a valid packet.
    pub rejected_candidates: u64,
    pub dropped_deliveries: u64,
}

impl SyncStats {
    fn record(&mut self, packet: &SyncedPacket) {
        match packet.kind {
            PacketKind::Ascii => self.ascii_packets += 1,
            PacketKind::Fa => self.fa_packets += 1,
            PacketKind::Fb => self.fb_packets += 1,
        }
        self.skipped_bytes += packet.skipped as u64;
        self.dropped_deliveries += packet.report.dropped as u64;
    }
}

/// Finds packet boundaries in the byte stream and hands each packet to the dispatcher that
/// recognized it.
#[derive(Debug, Default)]
pub struct PacketSynchronizer {
    dispatchers: Vec<Dispatcher>,
    stats: SyncStats,
}

impl PacketSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dispatcher. Earlier registrations win ties on the sync offset.
    pub fn register(&mut self, dispatcher: impl Into<Dispatcher>) {
        self.dispatchers.push(dispatcher.into());
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    pub fn ascii_mut(&mut self) -> Option<&mut AsciiPacketDispatcher> {
        self.dispatchers.iter_mut().find_map(|d| match d {
            Dispatcher::Ascii(d) => Some(d),
            _ => None,
        })
    }

    pub fn fa_mut(&mut self) -> Option<&mut FaPacketDispatcher> {
        self.dispatchers.iter_mut().find_map(|d| match d {
            Dispatcher::Fa(d) => Some(d),
            _ => None,
        })
    }

    pub fn fb_mut(&mut self) -> Option<&mut FbPacketDispatcher> {
        self.dispatchers.iter_mut().find_map(|d| match d {
            Dispatcher::Fb(d) => Some(d),
            _ => None,
        })
    }

    /// Frames and dispatches the next packet in `buffer`.
    ///
    /// The earliest sync byte any dispatcher recognizes is tried first. A candidate that does
    /// not frame a packet is skipped one byte at a time; a partial candidate is kept unless it
    /// already spans the dispatcher's longest packet or a complete packet follows it.
    ///
    /// # Arguments
    ///
    /// * `buffer`: Received bytes. Consumed bytes are discarded from the front.
    /// * `timestamp`: Receive time attached to the dispatched packet.
    ///
    /// # Returns
    ///
    /// The dispatched packet, or `None` when the buffer holds no complete packet. A partial
    /// packet stays buffered, while bytes that cannot start any packet are discarded.
    pub fn dispatch_next(&mut self, buffer: &mut ByteBuffer, timestamp: Duration) -> Option<SyncedPacket> {
        let mut skipped = 0;
        loop {
            let data = buffer.peek();
            if data.is_empty() {
                return None;
            }

            // earliest sync wins; min_by_key keeps the first of equal offsets
            let candidate = self
                .dispatchers
                .iter()
                .enumerate()
                .filter_map(|(idx, d)| d.find_sync(data).map(|offset| (idx, offset)))
                .min_by_key(|(_, offset)| *offset);
            let Some((idx, offset)) = candidate else {
                trace!("no sync in {} buffered bytes, discarding", data.len());
                self.stats.skipped_bytes += (skipped + data.len()) as u64;
                buffer.clear();
                return None;
            };

            let window = &data[offset..];
            let result = {
                let dispatcher = &self.dispatchers[idx];
                match dispatcher.find_packet(window) {
                    FindPacketResult::Incomplete if window.len() >= dispatcher.max_packet_length() => {
                        FindPacketResult::Invalid
                    }
                    // a false sync must not hold back a complete packet buffered behind it
                    FindPacketResult::Incomplete if self.complete_packet_after(data, offset) => {
                        FindPacketResult::Invalid
                    }
                    other => other,
                }
            };

            let dispatcher = &mut self.dispatchers[idx];
            match result {
                FindPacketResult::Found(m) => {
                    let report = dispatcher.dispatch(&window[..m.length], m.details, timestamp);
                    let packet = SyncedPacket {
                        kind: dispatcher.kind(),
                        length: m.length,
                        skipped: skipped + offset,
                        report,
                    };
                    buffer.discard(offset + m.length);
                    self.stats.record(&packet);
                    return Some(packet);
                }
                FindPacketResult::Incomplete => {
                    // garbage ahead of a partial packet can go now
                    buffer.discard(offset);
                    self.stats.skipped_bytes += (skipped + offset) as u64;
                    return None;
                }
                FindPacketResult::Invalid => {
                    debug!("{:?} sync at offset {} rejected", dispatcher.kind(), offset);
                    self.stats.rejected_candidates += 1;
                    buffer.discard(offset + 1);
                    skipped += offset + 1;
                }
            }
        }
    }

    /// True when some dispatcher frames a complete packet starting after `offset`.
    fn complete_packet_after(&self, data: &[u8], offset: usize) -> bool {
        self.dispatchers.iter().any(|d| {
            let mut from = offset + 1;
            while let Some(at) = data.get(from..).and_then(|rest| d.find_sync(rest)).map(|rel| from + rel) {
                if matches!(d.find_packet(&data[at..]), FindPacketResult::Found(_)) {
                    return true;
                }
                from = at + 1;
            }
            false
        })
    }

    /// Dispatches every complete packet in `buffer`, returning how many were found.
    pub fn dispatch_all(&mut self, buffer: &mut ByteBuffer, timestamp: Duration) -> usize {
        let mut count = 0;
        while self.dispatch_next(buffer, timestamp).is_some() {
            count += 1;
        }
        count
    }
}
