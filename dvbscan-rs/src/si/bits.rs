//! Bit-field extraction and descriptor loop iteration.

use log::warn;

/// Read `bit_width` bits (at most 32) starting at `bit_offset`, MSB first.
///
/// Fields may straddle byte boundaries. Bytes past the end of `buf` read
/// as zero; callers validate lengths before extracting fields.
pub fn get_bits(buf: &[u8], bit_offset: usize, bit_width: usize) -> u32 {
    debug_assert!(bit_width <= 32);
    if bit_width == 0 {
        return 0;
    }

    let first = bit_offset / 8;
    let last = (bit_offset + bit_width + 7) / 8;

    let mut value: u64 = 0;
    for index in first..last {
        value = (value << 8) | buf.get(index).copied().unwrap_or(0) as u64;
    }

    let shift = (last - first) * 8 - (bit_offset % 8) - bit_width;
    ((value >> shift) & ((1u64 << bit_width) - 1)) as u32
}

/// Decode four packed BCD bytes (eight digits) to an integer.
pub fn bcd32_to_cpu(b0: u8, b1: u8, b2: u8, b3: u8) -> u32 {
    [b0, b1, b2, b3]
        .iter()
        .fold(0u32, |acc, &b| acc * 100 + (b >> 4) as u32 * 10 + (b & 0x0F) as u32)
}

/// Iterator over a descriptor loop, yielding `(tag, payload)`.
///
/// The loop ends when the declared length is consumed. A trailing partial
/// record is skipped. A record with a nonzero tag and a zero length ends
/// the loop with a warning.
#[derive(Debug, Clone)]
pub struct DescriptorLoop<'a> {
    data: &'a [u8],
}

impl<'a> DescriptorLoop<'a> {
    /// Iterate over `data`, which must be exactly the descriptor loop.
    pub fn new(data: &'a [u8]) -> Self {
        DescriptorLoop { data }
    }
}

impl<'a> Iterator for DescriptorLoop<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < 2 {
            self.data = &[];
            return None;
        }

        let tag = self.data[0];
        let length = self.data[1] as usize;

        if length == 0 && tag != 0 {
            warn!("descriptor_tag == 0x{:02X}, len is 0", tag);
            self.data = &[];
            return None;
        }

        if 2 + length > self.data.len() {
            self.data = &[];
            return None;
        }

        let payload = &self.data[2..2 + length];
        self.data = &self.data[2 + length..];
        Some((tag, payload))
    }
}

/// Find the payload of the first descriptor with `tag`.
pub fn find_descriptor(data: &[u8], tag: u8) -> Option<&[u8]> {
    DescriptorLoop::new(data)
        .find(|(t, _)| *t == tag)
        .map(|(_, payload)| payload)
}
