//! Reassembly of out-of-order, possibly overlapping substrings.
//!
//! The peer's segments may arrive in any order, duplicated, or sliced at
//! arbitrary boundaries.  [`Reassembler::insert`] files each substring by
//! its absolute stream index: bytes at the next expected index flow
//! straight into the inbound stream's [`Writer`], everything else parks in
//! an ordered map until the gap before it closes.
//!
//! # Capacity contract
//!
//! The reassembler never holds more than the stream's available capacity:
//! bytes below the next expected index are duplicates (dropped), bytes at
//! or beyond `expected + available_capacity` do not fit (dropped; the peer
//! retransmits them once the window reopens).
//!
//! # Storage
//!
//! Parked substrings live in a `BTreeMap` keyed by start index.  Entries
//! are coalesced on insert, so the map always holds pairwise-disjoint,
//! non-adjacent ranges and [`bytes_pending`](Reassembler::bytes_pending)
//! is a plain sum of lengths.

use std::collections::BTreeMap;

use crate::byte_stream::Writer;

#[derive(Debug, Default)]
pub struct Reassembler {
    pending: BTreeMap<u64, Vec<u8>>,
    /// Whether the final substring has been seen, and the stream index one
    /// past its last byte.
    last: Option<u64>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// File `data`, whose first byte has absolute index `first_index`, and
    /// push whatever has become contiguous into `writer`.  `is_last` marks
    /// the substring containing the end of the stream; once every byte
    /// before that end has been pushed, the writer is closed.
    pub fn insert(&mut self, first_index: u64, data: &[u8], is_last: bool, writer: &mut Writer<'_>) {
        let expected = writer.bytes_pushed();
        let window_end = expected + writer.available_capacity() as u64;

        if is_last {
            let end = first_index + data.len() as u64;
            self.last = Some(self.last.map_or(end, |prev| prev.max(end)));
        }

        let start = first_index.max(expected);
        let end = (first_index + data.len() as u64).min(window_end);
        if start < end {
            let slice = &data[(start - first_index) as usize..(end - first_index) as usize];
            if start == expected {
                writer.push(slice);
                self.drain_contiguous(writer);
            } else {
                self.park(start, slice.to_vec());
            }
        }

        if self.pending.is_empty() && self.last.is_some_and(|end| writer.bytes_pushed() >= end) {
            writer.close();
        }
    }

    /// Number of distinct bytes parked and not yet pushed.
    pub fn bytes_pending(&self) -> u64 {
        self.pending.values().map(|piece| piece.len() as u64).sum()
    }

    /// Pop parked pieces for as long as they touch the pushed prefix.
    fn drain_contiguous(&mut self, writer: &mut Writer<'_>) {
        loop {
            let expected = writer.bytes_pushed();
            match self.pending.first_key_value() {
                Some((&start, _)) if start <= expected => {
                    let (start, piece) = self.pending.pop_first().unwrap();
                    let end = start + piece.len() as u64;
                    if end > expected {
                        writer.push(&piece[(expected - start) as usize..]);
                    }
                }
                _ => break,
            }
        }
    }

    /// Store `[start, start + data.len())`, merging with any overlapping or
    /// adjacent parked ranges.
    fn park(&mut self, mut start: u64, mut data: Vec<u8>) {
        let mut end = start + data.len() as u64;

        if let Some((&prev_start, prev)) = self.pending.range(..=start).next_back() {
            let prev_end = prev_start + prev.len() as u64;
            if prev_end >= end {
                return; // fully contained in an existing range
            }
            if prev_end >= start {
                let mut merged = self.pending.remove(&prev_start).unwrap();
                merged.extend_from_slice(&data[(prev_end - start) as usize..]);
                start = prev_start;
                data = merged;
                end = start + data.len() as u64;
            }
        }

        while let Some((&next_start, next)) = self.pending.range(start..).next() {
            if next_start > end {
                break;
            }
            let next_end = next_start + next.len() as u64;
            let next = self.pending.remove(&next_start).unwrap();
            if next_end > end {
                data.extend_from_slice(&next[(end - next_start) as usize..]);
                end = start + data.len() as u64;
            }
        }

        self.pending.insert(start, data);
    }
}
