use std::fmt;

use crate::error::BridgeError;

/// Number of device columns on a legacy device group row.
pub const DEVICE_UNIVERSE: usize = 128;

/// Membership vector over the fixed device universe.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct DeviceSet(u128);

impl DeviceSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u128) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u128 {
        self.0
    }

    pub fn insert(&mut self, device: i64) -> Result<(), BridgeError> {
        let index = usize::try_from(device)
            .ok()
            .filter(|index| *index < DEVICE_UNIVERSE)
            .ok_or_else(|| {
                BridgeError::reference_data(format!(
                    "device index {device} is outside 0..{DEVICE_UNIVERSE}"
                ))
            })?;
        self.0 |= 1u128 << index;
        Ok(())
    }

    pub fn contains(self, index: usize) -> bool {
        index < DEVICE_UNIVERSE && self.0 & (1u128 << index) != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..DEVICE_UNIVERSE).filter(move |index| self.contains(*index))
    }
}

impl fmt::Debug for DeviceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_iterate() {
        let mut set = DeviceSet::empty();
        set.insert(0).unwrap();
        set.insert(7).unwrap();
        set.insert(127).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 7, 127]);
        assert_eq!(set.len(), 3);
        assert!(set.contains(7));
        assert!(!set.contains(8));
    }

    #[test]
    fn rejects_out_of_range_devices() {
        let mut set = DeviceSet::empty();
        assert!(set.insert(128).is_err());
        assert!(set.insert(-1).is_err());
        assert!(set.is_empty());
    }
}
