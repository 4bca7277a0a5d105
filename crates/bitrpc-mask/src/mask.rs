use bitrpc_wire::{StreamReader, StreamWriter, WireError};

/// A fixed-capacity presence bitmask, sized in 32-bit words.
///
/// Bit `i` corresponds to field id `i + 1` in a message schema: bit `i` set
/// means that field is present and holds a non-default value. The wire form
/// is exactly `word_count()` little-endian `u32`s, word order matching bit
/// order (bits 0..32 in word 0, 32..64 in word 1, and so on) — the length is
/// never written, it's implied by the schema the caller already knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMask {
    words: Vec<u32>,
}

impl BitMask {
    /// Allocate a zeroed mask with room for `words` 32-bit words
    /// (`32 * words` bits).
    pub fn new(words: usize) -> Self {
        Self {
            words: vec![0u32; words],
        }
    }

    /// Number of 32-bit words this mask occupies on the wire.
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Total addressable bit capacity (`word_count() * 32`).
    pub fn capacity(&self) -> usize {
        self.words.len() * 32
    }

    /// Set or clear bit `i`.
    ///
    /// # Panics
    /// Panics if `i >= capacity()`: an out-of-range bit index is a
    /// programming error (a schema/codec mismatch), never a condition a peer
    /// can trigger by sending bad bytes — those are caught earlier as
    /// `UnknownField`.
    pub fn set(&mut self, i: usize, v: bool) {
        let (word, bit) = (i / 32, i % 32);
        assert!(
            word < self.words.len(),
            "bit index {i} out of range for a {}-word mask",
            self.words.len()
        );
        if v {
            self.words[word] |= 1 << bit;
        } else {
            self.words[word] &= !(1 << bit);
        }
    }

    /// Read bit `i`.
    ///
    /// # Panics
    /// Panics if `i >= capacity()`, for the same reason as [`Self::set`].
    pub fn get(&self, i: usize) -> bool {
        let (word, bit) = (i / 32, i % 32);
        assert!(
            word < self.words.len(),
            "bit index {i} out of range for a {}-word mask",
            self.words.len()
        );
        self.words[word] & (1 << bit) != 0
    }

    /// Zero every bit, keeping the word count.
    pub fn reset(&mut self) {
        for w in &mut self.words {
            *w = 0;
        }
    }

    /// Whether every bit is clear.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Emit exactly `word_count()` little-endian `u32`s.
    pub fn write(&self, writer: &mut StreamWriter) {
        for &w in &self.words {
            writer.write_u32(w);
        }
    }

    /// Consume exactly `word_count()` little-endian `u32`s, overwriting the
    /// mask's current contents.
    pub fn read(&mut self, reader: &mut StreamReader) -> Result<(), WireError> {
        for w in &mut self.words {
            *w = reader.read_u32()?;
        }
        Ok(())
    }

    /// The highest bit index beyond which no field of a schema with `field_count`
    /// fields may be set. Used by the message codec to detect `UnknownField`:
    /// any set bit at index `>= field_count` names a field the schema doesn't have.
    pub fn first_unknown_bit(&self, field_count: usize) -> Option<usize> {
        for i in field_count..self.capacity() {
            if self.get(i) {
                return Some(i);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_mask_is_zeroed() {
        let m = BitMask::new(2);
        assert_eq!(m.word_count(), 2);
        assert_eq!(m.capacity(), 64);
        assert!(m.is_empty());
        for i in 0..64 {
            assert!(!m.get(i));
        }
    }

    #[test]
    fn set_and_get_roundtrip() {
        let mut m = BitMask::new(2);
        m.set(0, true);
        m.set(9, true);
        m.set(63, true);
        assert!(m.get(0));
        assert!(m.get(9));
        assert!(m.get(63));
        assert!(!m.get(1));
        assert!(!m.is_empty());
    }

    #[test]
    fn clearing_a_bit_works() {
        let mut m = BitMask::new(1);
        m.set(5, true);
        m.set(5, false);
        assert!(!m.get(5));
    }

    #[test]
    fn reset_zeroes_all_bits() {
        let mut m = BitMask::new(2);
        m.set(0, true);
        m.set(40, true);
        m.reset();
        assert!(m.is_empty());
    }

    #[test]
    #[should_panic]
    fn set_out_of_range_panics() {
        let mut m = BitMask::new(1);
        m.set(32, true);
    }

    #[test]
    #[should_panic]
    fn get_out_of_range_panics() {
        let m = BitMask::new(1);
        m.get(100);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut m = BitMask::new(2);
        m.set(0, true);
        m.set(9, true);

        let mut w = StreamWriter::new();
        m.write(&mut w);
        let bytes = w.into_bytes();
        assert_eq!(bytes, vec![0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

        let mut round_tripped = BitMask::new(2);
        let mut r = StreamReader::new(&bytes);
        round_tripped.read(&mut r).unwrap();
        assert_eq!(round_tripped, m);
    }

    #[test]
    fn all_default_mask_is_one_zero_word_on_wire() {
        let m = BitMask::new(1);
        let mut w = StreamWriter::new();
        m.write(&mut w);
        assert_eq!(w.into_bytes(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn first_unknown_bit_detects_bits_past_field_count() {
        let mut m = BitMask::new(2);
        m.set(5, true);
        assert_eq!(m.first_unknown_bit(40), None);
        m.set(40, true);
        assert_eq!(m.first_unknown_bit(40), Some(40));
    }

    #[test]
    fn sparse_strings_scenario_mask_bits() {
        // field1 and field10 set, matching spec.md scenario 2.
        let mut m = BitMask::new(2);
        m.set(0, true);
        m.set(9, true);
        let mut w = StreamWriter::new();
        m.write(&mut w);
        assert_eq!(
            w.into_bytes(),
            vec![0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }
}
