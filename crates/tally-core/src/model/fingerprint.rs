//! 64-bit FNV-1a, used for descriptor fingerprints.
//!
//! Stable across processes and runs, unlike `std`'s randomized hasher.

const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const PRIME: u64 = 0x0000_0100_0000_01b3;

/// Byte written between hashed parts so `("ab", "c")` and `("a", "bc")` differ.
pub(crate) const SEPARATOR: u8 = 0xff;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Fnv64 {
    state: u64,
}

impl Fnv64 {
    pub(crate) fn new() -> Self {
        Self { state: OFFSET }
    }

    pub(crate) fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.state ^= u64::from(*b);
            self.state = self.state.wrapping_mul(PRIME);
        }
    }

    /// Write one part followed by the separator byte.
    pub(crate) fn write_part(&mut self, part: &str) {
        self.write(part.as_bytes());
        self.write(&[SEPARATOR]);
    }

    pub(crate) fn finish(&self) -> u64 {
        self.state
    }
}
