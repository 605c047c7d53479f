//! Delta-encoded VLQ source map: maps instruction indices to source
//! character ranges.
//!
//! Each entry is 3 VLQ values:
//! - `delta_pc` (unsigned VLQ)
//! - `delta_start` (signed, zigzag + VLQ)
//! - `delta_end` (signed, zigzag + VLQ)

use serde::{Deserialize, Serialize};

/// An encoded source map, optionally naming the document it points into.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceMap {
    pub document: Option<String>,
    encoded: Vec<u8>,
}

impl SourceMap {
    /// Source range of the last entry at or before `pc`.
    pub fn lookup(&self, pc: u32) -> Option<(u32, u32)> {
        source_map_lookup(&self.encoded, pc)
    }

    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }

    pub fn encoded_len(&self) -> usize {
        self.encoded.len()
    }
}

/// Accumulates source map entries during emission.
#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    document: Option<String>,
    entries: Vec<(u32, u32, u32)>, // (pc, start, end)
}

impl SourceMapBuilder {
    pub fn new(document: Option<String>) -> Self {
        Self {
            document,
            entries: Vec::new(),
        }
    }

    /// Record a mapping from an instruction index to a source character
    /// range. A second entry at the same pc replaces the first.
    pub fn add(&mut self, pc: u32, start: u32, end: u32) {
        match self.entries.last_mut() {
            Some(last) if last.0 == pc => *last = (pc, start, end),
            _ => self.entries.push((pc, start, end)),
        }
    }

    /// Produce the delta-encoded VLQ byte stream.
    pub fn finish(self) -> SourceMap {
        let mut buf = Vec::new();
        let mut prev_pc: u32 = 0;
        let mut prev_start: i64 = 0;
        let mut prev_end: i64 = 0;

        for (pc, start, end) in &self.entries {
            let delta_pc = pc.saturating_sub(prev_pc);
            let delta_start = i64::from(*start) - prev_start;
            let delta_end = i64::from(*end) - prev_end;

            encode_unsigned_vlq(delta_pc, &mut buf);
            encode_unsigned_vlq(zigzag_encode(delta_start), &mut buf);
            encode_unsigned_vlq(zigzag_encode(delta_end), &mut buf);

            prev_pc = *pc;
            prev_start = i64::from(*start);
            prev_end = i64::from(*end);
        }

        SourceMap {
            document: self.document,
            encoded: buf,
        }
    }
}

fn source_map_lookup(encoded: &[u8], target_pc: u32) -> Option<(u32, u32)> {
    let mut pos = 0;
    let mut pc: u32 = 0;
    let mut start: i64 = 0;
    let mut end: i64 = 0;
    let mut best: Option<(u32, u32)> = None;

    while pos < encoded.len() {
        let delta_pc = decode_unsigned_vlq(encoded, &mut pos)?;
        let delta_start = zigzag_decode(decode_unsigned_vlq(encoded, &mut pos)?);
        let delta_end = zigzag_decode(decode_unsigned_vlq(encoded, &mut pos)?);

        pc += delta_pc;
        start += delta_start;
        end += delta_end;

        if pc > target_pc {
            break;
        }
        best = Some((start as u32, end as u32));
    }

    best
}

// VLQ helpers

/// 7 data bits + 1 continuation bit (MSB) per byte.
fn encode_unsigned_vlq(mut value: u32, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn decode_unsigned_vlq(encoded: &[u8], pos: &mut usize) -> Option<u32> {
    let mut result: u32 = 0;
    let mut shift = 0;
    loop {
        let byte = *encoded.get(*pos)?;
        *pos += 1;
        result |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Some(result);
        }
        shift += 7;
        if shift >= 35 {
            return None;
        }
    }
}

fn zigzag_encode(value: i64) -> u32 {
    ((value << 1) ^ (value >> 63)) as u32
}

fn zigzag_decode(value: u32) -> i64 {
    i64::from(value >> 1) ^ (-i64::from(value & 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_map() {
        let map = SourceMapBuilder::new(None).finish();
        assert!(map.is_empty());
        assert_eq!(map.lookup(0), None);
    }

    #[test]
    fn test_lookup_uses_last_entry_at_or_before_pc() {
        let mut builder = SourceMapBuilder::new(Some("main.js".into()));
        builder.add(0, 0, 5);
        builder.add(3, 10, 15);
        builder.add(7, 2, 30);
        let map = builder.finish();

        assert_eq!(map.document.as_deref(), Some("main.js"));
        assert_eq!(map.lookup(0), Some((0, 5)));
        assert_eq!(map.lookup(2), Some((0, 5)));
        assert_eq!(map.lookup(3), Some((10, 15)));
        assert_eq!(map.lookup(7), Some((2, 30)));
        assert_eq!(map.lookup(100), Some((2, 30)));
    }

    #[test]
    fn test_same_pc_replaces_entry() {
        let mut builder = SourceMapBuilder::new(None);
        builder.add(4, 1, 2);
        builder.add(4, 8, 9);
        let map = builder.finish();
        assert_eq!(map.lookup(4), Some((8, 9)));
        assert_eq!(map.lookup(3), None);
    }

    #[test]
    fn test_large_offsets() {
        let mut builder = SourceMapBuilder::new(None);
        builder.add(0, 70_000, 70_100);
        builder.add(900, 12, 13);
        let map = builder.finish();
        assert_eq!(map.lookup(899), Some((70_000, 70_100)));
        assert_eq!(map.lookup(900), Some((12, 13)));
    }
}
