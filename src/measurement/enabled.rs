// src/measurement/enabled.rs

use core::ops::{BitAnd, BitOr};

/// Measurement groups of the binary protocol.
///
/// `Common` only exists on the wire; its fields are aliases of fields in the other groups and
/// it has no slot in [`EnabledMeasurements`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum BinaryGroup {
    Common,
    Time,
    Imu,
    Gnss,
    Attitude,
    Ins,
    Gnss2,
    /// First group of the extension byte; only carried by extended (`0xFB`) packets.
    Gnss3,
}

impl BinaryGroup {
    /// Every group that owns a slot in [`EnabledMeasurements`], in slot order.
    pub const MEASUREMENT_GROUPS: [BinaryGroup; MEASUREMENT_GROUP_COUNT] = [
        BinaryGroup::Time,
        BinaryGroup::Imu,
        BinaryGroup::Gnss,
        BinaryGroup::Attitude,
        BinaryGroup::Ins,
        BinaryGroup::Gnss2,
        BinaryGroup::Gnss3,
    ];

    /// Position of the group in the chained group bytes. Bit 7 of every byte is the extension
    /// flag, so the second byte starts at 8.
    pub const fn header_bit(self) -> u8 {
        match self {
            BinaryGroup::Common => 0,
            BinaryGroup::Time => 1,
            BinaryGroup::Imu => 2,
            BinaryGroup::Gnss => 3,
            BinaryGroup::Attitude => 4,
            BinaryGroup::Ins => 5,
            BinaryGroup::Gnss2 => 6,
            BinaryGroup::Gnss3 => 8,
        }
    }

    pub const fn from_header_bit(bit: u8) -> Option<Self> {
        match bit {
            0 => Some(BinaryGroup::Common),
            1 => Some(BinaryGroup::Time),
            2 => Some(BinaryGroup::Imu),
            3 => Some(BinaryGroup::Gnss),
            4 => Some(BinaryGroup::Attitude),
            5 => Some(BinaryGroup::Ins),
            6 => Some(BinaryGroup::Gnss2),
            8 => Some(BinaryGroup::Gnss3),
            _ => None,
        }
    }

    pub const fn slot(self) -> Option<usize> {
        match self {
            BinaryGroup::Common => None,
            BinaryGroup::Time => Some(0),
            BinaryGroup::Imu => Some(1),
            BinaryGroup::Gnss => Some(2),
            BinaryGroup::Attitude => Some(3),
            BinaryGroup::Ins => Some(4),
            BinaryGroup::Gnss2 => Some(5),
            BinaryGroup::Gnss3 => Some(6),
        }
    }

    /// True for groups that live past the first group byte.
    pub const fn is_extended(self) -> bool {
        self.header_bit() >= 8
    }
}

pub const MEASUREMENT_GROUP_COUNT: usize = 7;

/// One field bitmask per measurement group.
///
/// Bit `n` of a group word is field `n` of that group as numbered on the wire, so bit 15 (the
/// type mask extension flag) is never set.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct EnabledMeasurements(pub [u32; MEASUREMENT_GROUP_COUNT]);

impl EnabledMeasurements {
    pub const fn none() -> Self {
        EnabledMeasurements([0; MEASUREMENT_GROUP_COUNT])
    }

    /// Every bit set; accepts any packet in a subset test.
    pub const fn all() -> Self {
        EnabledMeasurements([u32::MAX; MEASUREMENT_GROUP_COUNT])
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|g| *g == 0)
    }

    pub fn group(&self, group: BinaryGroup) -> u32 {
        group.slot().map_or(0, |slot| self.0[slot])
    }

    pub fn set_group(&mut self, group: BinaryGroup, fields: u32) {
        if let Some(slot) = group.slot() {
            self.0[slot] = fields;
        }
    }

    pub fn enable(&mut self, group: BinaryGroup, field: u8) {
        match group.slot() {
            Some(slot) if field < 32 => self.0[slot] |= 1 << field,
            _ => {}
        }
    }

    /// Builder form of [`Self::enable`].
    pub fn with(mut self, group: BinaryGroup, field: u8) -> Self {
        self.enable(group, field);
        self
    }

    pub fn contains(&self, group: BinaryGroup, field: u8) -> bool {
        field < 32 && self.group(group) & (1 << field) != 0
    }

    /// True when every field enabled here is also enabled in `available`.
    pub fn all_enabled_in(&self, available: &EnabledMeasurements) -> bool {
        self.0.iter().zip(available.0.iter()).all(|(mine, theirs)| mine & !theirs == 0)
    }

    /// True when at least one field is enabled in both.
    pub fn any_enabled_in(&self, available: &EnabledMeasurements) -> bool {
        self.0.iter().zip(available.0.iter()).any(|(mine, theirs)| mine & theirs != 0)
    }

    pub fn union(&self, other: &EnabledMeasurements) -> EnabledMeasurements {
        let mut out = *self;
        for (slot, theirs) in out.0.iter_mut().zip(other.0.iter()) {
            *slot |= theirs;
        }
        out
    }

    pub fn intersection(&self, other: &EnabledMeasurements) -> EnabledMeasurements {
        let mut out = *self;
        for (slot, theirs) in out.0.iter_mut().zip(other.0.iter()) {
            *slot &= theirs;
        }
        out
    }
}

impl BitOr for EnabledMeasurements {
    type Output = EnabledMeasurements;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(&rhs)
    }
}

impl BitAnd for EnabledMeasurements {
    type Output = EnabledMeasurements;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.intersection(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCEL: u8 = 9;
    const GYRO: u8 = 10;

    #[test]
    fn test_header_bits_round_trip() {
        for group in BinaryGroup::MEASUREMENT_GROUPS.iter().copied().chain([BinaryGroup::Common]) {
            assert_eq!(BinaryGroup::from_header_bit(group.header_bit()), Some(group));
        }
        assert_eq!(BinaryGroup::from_header_bit(7), None);
        assert_eq!(BinaryGroup::from_header_bit(9), None);
        assert!(BinaryGroup::Gnss3.is_extended());
        assert!(!BinaryGroup::Gnss2.is_extended());
    }

    #[test]
    fn test_subset_and_overlap() {
        let accel = EnabledMeasurements::none().with(BinaryGroup::Imu, ACCEL);
        let both = accel.with(BinaryGroup::Imu, GYRO);

        assert!(accel.all_enabled_in(&both));
        assert!(!both.all_enabled_in(&accel));
        assert!(accel.any_enabled_in(&both));
        assert!(both.all_enabled_in(&EnabledMeasurements::all()));

        let gyro = EnabledMeasurements::none().with(BinaryGroup::Imu, GYRO);
        assert!(!accel.any_enabled_in(&gyro));
        assert!(EnabledMeasurements::none().all_enabled_in(&accel));
    }

    #[test]
    fn test_union_and_intersection() {
        let a = EnabledMeasurements::none().with(BinaryGroup::Time, 0).with(BinaryGroup::Ins, 1);
        let b = EnabledMeasurements::none().with(BinaryGroup::Ins, 1).with(BinaryGroup::Gnss3, 5);

        let union = a | b;
        assert!(union.contains(BinaryGroup::Time, 0));
        assert!(union.contains(BinaryGroup::Gnss3, 5));
        assert_eq!(a.union(&b), union);

        let inter = a & b;
        assert_eq!(inter, EnabledMeasurements::none().with(BinaryGroup::Ins, 1));
        assert!(!inter.contains(BinaryGroup::Time, 0));
    }

    #[test]
    fn test_common_has_no_slot() {
        let mut enabled = EnabledMeasurements::none();
        enabled.enable(BinaryGroup::Common, 3);
        assert!(enabled.is_empty());
        assert_eq!(enabled.group(BinaryGroup::Common), 0);
    }
}
