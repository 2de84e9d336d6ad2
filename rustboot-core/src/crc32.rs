//! Bit-reflected IEEE-802.3 CRC-32, polynomial `0xEDB88320`.

/// Running CRC-32 state. `new()` starts at the standard initial value;
/// `update` folds in bytes one at a time; `finalize` applies the final
/// XOR and consumes the state.
#[derive(Debug, Clone, Copy)]
pub struct Crc32(u32);

impl Crc32 {
    const POLY: u32 = 0xEDB8_8320;

    pub fn new() -> Self {
        Crc32(0xFFFF_FFFF)
    }

    pub fn update(&mut self, byte: u8) {
        let mut reg = self.0 ^ byte as u32;
        for _ in 0..8 {
            let mask = 0u32.wrapping_sub(reg & 1);
            reg = (reg >> 1) ^ (Self::POLY & mask);
        }
        self.0 = reg;
    }

    pub fn update_all(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.update(b);
        }
    }

    pub fn finalize(self) -> u32 {
        self.0 ^ 0xFFFF_FFFF
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot convenience wrapper over [`Crc32`].
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut c = Crc32::new();
    c.update_all(bytes);
    c.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn empty_input() {
        assert_eq!(crc32(b""), 0x0000_0000);
    }

    #[test]
    fn streaming_matches_one_shot() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let whole = crc32(data);

        let mut streamed = Crc32::new();
        for chunk in data.chunks(7) {
            streamed.update_all(chunk);
        }
        assert_eq!(streamed.finalize(), whole);
    }
}
