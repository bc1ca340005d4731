// src/packet/fb_dispatcher.rs

use core::ops::{Deref, DerefMut};
use core::time::Duration;

use crossbeam_channel::Sender;

use super::fa_dispatcher::{BinaryFraming, FaPacketDispatcher};
use super::subscriber::DispatchReport;
use super::{FindPacketResult, PacketDetails, PacketDispatcher, PacketKind};
use crate::measurement::CompositeData;

/// Dispatcher for extended `0xFB` packets.
///
/// Shares parsing, filtering and decoding with [`FaPacketDispatcher`]; only the sync byte and
/// the accepted groups differ.
#[derive(Debug)]
pub struct FbPacketDispatcher(FaPacketDispatcher);

impl FbPacketDispatcher {
    pub fn new(measurements: Sender<CompositeData>) -> Self {
        FbPacketDispatcher(FaPacketDispatcher::with_framing(BinaryFraming::Fb, measurements))
    }
}

impl Deref for FbPacketDispatcher {
    type Target = FaPacketDispatcher;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for FbPacketDispatcher {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl PacketDispatcher for FbPacketDispatcher {
    fn kind(&self) -> PacketKind {
        PacketKind::Fb
    }

    fn find_sync(&self, data: &[u8]) -> Option<usize> {
        self.0.find_sync(data)
    }

    fn find_packet(&self, data: &[u8]) -> FindPacketResult {
        self.0.find_packet(data)
    }

    fn dispatch(&mut self, packet: &[u8], details: PacketDetails, timestamp: Duration) -> DispatchReport {
        self.0.dispatch(packet, details, timestamp)
    }

    fn max_packet_length(&self) -> usize {
        self.0.max_packet_length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::{BinaryGroup, BinaryHeader};
    use crate::packet::fa_dispatcher::tests::accel_gyro_packet;

    #[test]
    fn test_fb_uses_its_own_sync_byte() {
        let (tx, _rx) = crossbeam_channel::bounded(1);
        let fb = FbPacketDispatcher::new(tx);
        let fa_packet = accel_gyro_packet(BinaryFraming::Fa);
        let fb_packet = accel_gyro_packet(BinaryFraming::Fb);

        assert_eq!(fb.find_sync(&fa_packet), None);
        assert_eq!(fb.find_sync(&fb_packet), Some(0));
        assert_eq!(fb.find_packet(&fa_packet), FindPacketResult::Invalid);
        assert!(matches!(fb.find_packet(&fb_packet), FindPacketResult::Found(_)));
    }

    #[test]
    fn test_fb_decodes_gnss3() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut fb = FbPacketDispatcher::new(tx);
        let header = BinaryHeader::new()
            .with_group(BinaryGroup::Gnss3, (1 << 3) | (1 << 18))
            .unwrap();
        let mut payload = vec![9u8];
        payload.extend(152.5f64.to_le_bytes());
        let packet = BinaryFraming::Fb.encode_packet(&header, &payload);

        let FindPacketResult::Found(m) = fb.find_packet(&packet) else {
            panic!("Fb packet not found");
        };
        fb.dispatch(&packet, m.details, Duration::ZERO);
        let data = rx.try_recv().unwrap();
        assert_eq!(data.gnss3.num_sats, Some(9));
        assert_eq!(data.gnss3.alt_msl, Some(152.5));
        assert!(data.gnss.is_empty());
        assert_eq!(data.source, crate::measurement::MeasurementSource::Binary(BinaryFraming::Fb));
    }
}
