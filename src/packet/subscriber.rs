// src/packet/subscriber.rs

//! Subscriber registrations and the filters deciding which packets reach which queue.

use crossbeam_channel::{Sender, TrySendError};
use log::{debug, warn};

use super::RawPacket;
use crate::common::ascii::AsciiHeader;
use crate::common::error::VnError;
use crate::measurement::EnabledMeasurements;

/// Registrations one dispatcher can hold.
pub const MAX_SUBSCRIBERS: usize = 16;

/// Decides whether a packet goes to a subscription.
pub trait PacketFilter {
    type Subject: ?Sized;

    fn matches(&self, subject: &Self::Subject) -> bool;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AsciiFilterType {
    StartsWith,
    DoesNotStartWith,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AsciiFilter {
    pub header: AsciiHeader,
    pub filter_type: AsciiFilterType,
}

impl AsciiFilter {
    /// Returns `None` when `header` is longer than a header token can be.
    pub fn new(header: &str, filter_type: AsciiFilterType) -> Option<Self> {
        Some(AsciiFilter { header: AsciiHeader::from(header).ok()?, filter_type })
    }
}

impl PacketFilter for AsciiFilter {
    type Subject = str;

    fn matches(&self, header: &str) -> bool {
        let starts = header.starts_with(self.header.as_str());
        match self.filter_type {
            AsciiFilterType::StartsWith => starts,
            AsciiFilterType::DoesNotStartWith => !starts,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FaFilterType {
    /// Packet measurements equal the filter.
    ExactMatch,
    /// Packet and filter share at least one field.
    AnyMatch,
    NotExactMatch,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BinaryFilter {
    pub measurements: EnabledMeasurements,
    pub filter_type: FaFilterType,
}

impl BinaryFilter {
    pub fn new(measurements: EnabledMeasurements, filter_type: FaFilterType) -> Self {
        BinaryFilter { measurements, filter_type }
    }
}

impl PacketFilter for BinaryFilter {
    type Subject = EnabledMeasurements;

    fn matches(&self, packet: &EnabledMeasurements) -> bool {
        match self.filter_type {
            FaFilterType::ExactMatch => *packet == self.measurements,
            FaFilterType::AnyMatch => packet.any_enabled_in(&self.measurements),
            FaFilterType::NotExactMatch => *packet != self.measurements,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Subscription<F> {
    pub queue: Sender<RawPacket>,
    pub filter: F,
}

/// Outcome of delivering one packet to a subscriber list.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct DispatchReport {
    pub delivered: usize,
    /// Matching subscribers whose queue was full.
    pub dropped: usize,
}

impl DispatchReport {
    pub fn merge(self, other: DispatchReport) -> DispatchReport {
        DispatchReport {
            delivered: self.delivered + other.delivered,
            dropped: self.dropped + other.dropped,
        }
    }
}

/// Bounded list of registrations owned by one dispatcher.
#[derive(Debug)]
pub struct SubscriberList<F> {
    subscriptions: heapless::Vec<Subscription<F>, MAX_SUBSCRIBERS>,
}

impl<F> Default for SubscriberList<F> {
    fn default() -> Self {
        SubscriberList { subscriptions: heapless::Vec::new() }
    }
}

impl<F: PacketFilter> SubscriberList<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn subscribe(&mut self, queue: Sender<RawPacket>, filter: F) -> Result<(), VnError> {
        self.subscriptions
            .push(Subscription { queue, filter })
            .map_err(|_| VnError::SubscriberListFull)
    }

    /// Removes every registration feeding `queue`. Unknown queues are ignored.
    pub fn unsubscribe(&mut self, queue: &Sender<RawPacket>) {
        self.subscriptions.retain(|s| !s.queue.same_channel(queue));
    }

    /// Sends a copy of `packet` to every matching subscription.
    ///
    /// Subscriptions whose receiver is gone are pruned.
    pub fn deliver(&mut self, subject: &F::Subject, packet: &RawPacket) -> DispatchReport {
        let mut report = DispatchReport::default();
        self.subscriptions.retain(|sub| {
            if !sub.filter.matches(subject) {
                return true;
            }
            match sub.queue.try_send(packet.clone()) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!("subscriber queue full, dropping {:?} packet", packet.kind());
                    report.dropped += 1;
                    true
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!("subscriber queue closed, removing registration");
                    false
                }
            }
        });
        report
    }
}
