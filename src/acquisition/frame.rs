//! Raw entry codec.
//!
//! A frame is a run of 4-byte little-endian words, one conversion each:
//!
//! ```text
//! bit  31 ........ 17 | 16 .. 13 | 12 ......... 0
//!      reserved       | channel  | raw code
//! ```
//!
//! The code field is 13 bits wide; the demultiplexer masks it down to the
//! configured resolution.

/// Bytes per raw entry.
pub const ENTRY_BYTES: usize = 4;

const CODE_MASK: u32 = 0x1FFF;
const CHANNEL_SHIFT: u32 = 13;
const CHANNEL_MASK: u32 = 0xF;

/// One conversion result as written by the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEntry {
    pub channel: u8,
    pub code: u16,
}

impl RawEntry {
    pub const fn new(channel: u8, code: u16) -> Self {
        Self { channel, code }
    }

    pub fn encode(self) -> [u8; ENTRY_BYTES] {
        let word = (u32::from(self.code) & CODE_MASK)
            | ((u32::from(self.channel) & CHANNEL_MASK) << CHANNEL_SHIFT);
        word.to_le_bytes()
    }

    pub fn decode(bytes: [u8; ENTRY_BYTES]) -> Self {
        let word = u32::from_le_bytes(bytes);
        Self {
            channel: ((word >> CHANNEL_SHIFT) & CHANNEL_MASK) as u8,
            code: (word & CODE_MASK) as u16,
        }
    }
}

/// Iterate the whole entries in `bytes`. A trailing partial entry is ignored.
pub fn entries(bytes: &[u8]) -> impl Iterator<Item = RawEntry> + '_ {
    bytes
        .chunks_exact(ENTRY_BYTES)
        .map(|c| RawEntry::decode([c[0], c[1], c[2], c[3]]))
}

/// Append the encoded form of `items` to `out`.
pub fn encode_into(items: &[RawEntry], out: &mut Vec<u8>) {
    out.reserve(items.len() * ENTRY_BYTES);
    for e in items {
        out.extend_from_slice(&e.encode());
    }
}
