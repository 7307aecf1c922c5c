//! Presence bits and required-field masks.
//!
//! Jedes singuläre Feld bekommt ein Bit in der Reihenfolge seiner Deklaration;
//! repeated Felder zählen ihre Elemente und verbrauchen kein Bit. Bit `i` liegt
//! in Wort `i / 32` unter der Maske `1 << (i % 32)`. Pro Wort wird eine
//! Required-Maske aus den Bits aller Required-Felder gebildet.

use crate::schema::FieldDecl;

/// Position of one singular field in the bitfield words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceBit {
    index: usize,
}

impl PresenceBit {
    pub const fn new(index: usize) -> Self {
        Self { index }
    }

    /// Bit index (dense over singular fields).
    pub const fn index(self) -> usize {
        self.index
    }

    pub const fn word(self) -> usize {
        self.index / 32
    }

    pub const fn mask(self) -> u32 {
        1 << (self.index % 32)
    }

    #[inline]
    pub fn is_set(self, words: &[u32]) -> bool {
        words[self.word()] & self.mask() != 0
    }

    #[inline]
    pub fn set(self, words: &mut [u32]) {
        words[self.word()] |= self.mask();
    }

    #[inline]
    pub fn unset(self, words: &mut [u32]) {
        words[self.word()] &= !self.mask();
    }
}

/// Bitfield shape of one message: word count and per-word required masks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PresenceLayout {
    required_masks: Vec<u32>,
    /// Bit-Index → Deklarationsindex des Feldes (für Fehlermeldungen).
    bit_owners: Vec<usize>,
}

impl PresenceLayout {
    /// Assigns presence bits in declaration order and builds the required masks.
    ///
    /// Returns the layout and, per field, its bit (`None` for repeated fields).
    pub fn assign(fields: &[FieldDecl]) -> (Self, Vec<Option<PresenceBit>>) {
        let mut bits = Vec::with_capacity(fields.len());
        let mut bit_owners = Vec::new();
        let mut required_bits = Vec::new();
        for (decl_index, field) in fields.iter().enumerate() {
            if field.is_repeated() {
                bits.push(None);
                continue;
            }
            let bit = PresenceBit::new(bit_owners.len());
            bit_owners.push(decl_index);
            if field.is_required() {
                required_bits.push(bit);
            }
            bits.push(Some(bit));
        }

        let word_count = bit_owners.len().div_ceil(32);
        let mut required_masks = vec![0u32; word_count];
        for bit in required_bits {
            required_masks[bit.word()] |= bit.mask();
        }
        (
            Self {
                required_masks,
                bit_owners,
            },
            bits,
        )
    }

    /// Number of 32-bit words in the bitfield.
    pub fn word_count(&self) -> usize {
        self.required_masks.len()
    }

    pub fn required_mask(&self, word: usize) -> u32 {
        self.required_masks.get(word).copied().unwrap_or(0)
    }

    pub fn has_required(&self) -> bool {
        self.required_masks.iter().any(|&m| m != 0)
    }

    /// Fresh all-zero bitfield words.
    pub fn new_words(&self) -> Vec<u32> {
        vec![0; self.word_count()]
    }

    /// `true` iff `(word & mask) == mask` for every word.
    ///
    /// Alle Wörter werden geprüft, ohne Short-Circuit.
    pub fn check_required(&self, words: &[u32]) -> bool {
        self.required_masks
            .iter()
            .zip(words)
            .fold(true, |ok, (&mask, &word)| ok & (word & mask == mask))
    }

    /// Declaration indices of required fields whose bit is unset.
    pub fn missing_required(&self, words: &[u32]) -> Vec<usize> {
        self.bit_owners
            .iter()
            .enumerate()
            .filter(|&(bit, _)| {
                let bit = PresenceBit::new(bit);
                self.required_mask(bit.word()) & bit.mask() != 0 && !bit.is_set(words)
            })
            .map(|(_, &owner)| owner)
            .collect()
    }
}
