// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the modbus-point-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Shared register store
//!
//! A flat array of 16-bit words backing every Modbus table of the simulated
//! device. Holding registers, input registers, coils and discrete inputs all
//! address the same words: the simulator does not model separate object
//! spaces, it only needs clients to read what the scheduler wrote.

use std::sync::{Arc, RwLock};

use crate::utility;

/// Thread-safe word array shared by the scheduler and the Modbus service.
///
/// Cloning is cheap and yields a handle to the same words.
#[derive(Debug, Clone, Default)]
pub struct RegisterStore {
    words: Arc<RwLock<Vec<u16>>>,
}

impl RegisterStore {
    /// Create a store of `len` zeroed words.
    pub fn new(len: usize) -> Self {
        Self {
            words: Arc::new(RwLock::new(vec![0; len])),
        }
    }

    pub fn len(&self) -> usize {
        utility::read(&self.words).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `count` words starting at `address`.
    ///
    /// Returns `None` if any word of the range lies outside the store.
    pub fn read(&self, address: u16, count: u16) -> Option<Vec<u16>> {
        let words = utility::read(&self.words);
        let range = span(address, count as usize, words.len())?;
        Some(words[range].to_vec())
    }

    /// Overwrite words starting at `address`.
    ///
    /// Nothing is written and `false` is returned if the range does not fit.
    pub fn write(&self, address: u16, values: &[u16]) -> bool {
        let mut words = utility::write(&self.words);
        match span(address, values.len(), words.len()) {
            Some(range) => {
                words[range].copy_from_slice(values);
                true
            }
            None => false,
        }
    }

    /// Write several register pairs under a single lock.
    ///
    /// Returns the number of pairs written; pairs that do not fit are skipped.
    pub fn write_pairs(&self, pairs: &[(u16, [u16; 2])]) -> usize {
        let mut words = utility::write(&self.words);
        let len = words.len();
        let mut written = 0;
        for (address, pair) in pairs {
            if let Some(range) = span(*address, 2, len) {
                words[range].copy_from_slice(pair);
                written += 1;
            }
        }
        written
    }

    /// Apply `(word & and_mask) | (or_mask & !and_mask)` to one word.
    ///
    /// Returns the new value, or `None` if `address` lies outside the store.
    pub fn mask_write(&self, address: u16, and_mask: u16, or_mask: u16) -> Option<u16> {
        let mut words = utility::write(&self.words);
        let word = words.get_mut(address as usize)?;
        *word = (*word & and_mask) | (or_mask & !and_mask);
        Some(*word)
    }

    /// Write `values` at `write_address`, then read `count` words at
    /// `read_address`, under a single lock.
    ///
    /// Nothing is written if either range does not fit.
    pub fn write_then_read(
        &self,
        write_address: u16,
        values: &[u16],
        read_address: u16,
        count: u16,
    ) -> Option<Vec<u16>> {
        let mut words = utility::write(&self.words);
        let len = words.len();
        let write_range = span(write_address, values.len(), len)?;
        let read_range = span(read_address, count as usize, len)?;
        words[write_range].copy_from_slice(values);
        Some(words[read_range].to_vec())
    }

    /// Zero every word and grow the store to at least `min_len` words.
    pub fn reset(&self, min_len: usize) {
        let mut words = utility::write(&self.words);
        let len = words.len().max(min_len);
        words.clear();
        words.resize(len, 0);
    }

    /// Copy of the whole store.
    pub fn snapshot(&self) -> Vec<u16> {
        utility::read(&self.words).clone()
    }
}

fn span(address: u16, count: usize, len: usize) -> Option<std::ops::Range<usize>> {
    let start = address as usize;
    let end = start.checked_add(count)?;
    (end <= len).then_some(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_within_bounds() {
        let store = RegisterStore::new(8);
        assert!(store.write(2, &[11, 22, 33]));
        assert_eq!(store.read(1, 4), Some(vec![0, 11, 22, 33]));
    }

    #[test]
    fn test_out_of_bounds_access_is_refused() {
        let store = RegisterStore::new(4);
        assert_eq!(store.read(3, 2), None);
        assert!(!store.write(3, &[1, 2]));
        assert_eq!(store.snapshot(), vec![0; 4]);
        assert_eq!(store.read(u16::MAX, 1), None);
    }

    #[test]
    fn test_write_pairs_skips_what_does_not_fit() {
        let store = RegisterStore::new(4);
        let written = store.write_pairs(&[(0, [1, 2]), (3, [9, 9]), (2, [3, 4])]);
        assert_eq!(written, 2);
        assert_eq!(store.snapshot(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_mask_write() {
        let store = RegisterStore::new(2);
        store.write(0, &[0x12]);
        // Example from the Modbus application protocol: 0x12 AND 0xF2 OR 0x25
        assert_eq!(store.mask_write(0, 0xF2, 0x25), Some(0x17));
        assert_eq!(store.read(0, 1), Some(vec![0x17]));
        assert_eq!(store.mask_write(2, 0, 0), None);
    }

    #[test]
    fn test_write_then_read() {
        let store = RegisterStore::new(4);
        assert_eq!(store.write_then_read(1, &[5, 6], 0, 3), Some(vec![0, 5, 6]));
        // Read range out of bounds: the write is not applied
        assert_eq!(store.write_then_read(0, &[9], 3, 2), None);
        assert_eq!(store.snapshot(), vec![0, 5, 6, 0]);
    }

    #[test]
    fn test_reset_zeroes_and_grows() {
        let store = RegisterStore::new(2);
        store.write(0, &[7, 7]);
        store.reset(6);
        assert_eq!(store.snapshot(), vec![0; 6]);
        store.reset(3);
        assert_eq!(store.len(), 6, "reset never shrinks the store");
    }

    #[test]
    fn test_clones_share_words() {
        let store = RegisterStore::new(2);
        let alias = store.clone();
        alias.write(1, &[5]);
        assert_eq!(store.read(1, 1), Some(vec![5]));
    }
}
