//! Decoding of oracle cleartext into typed move records.
//!
//! The oracle returns one flat byte buffer: for each move, three big-endian
//! u32 values (x, y, reveal_step), 12 bytes per record. The record count is
//! the buffer length divided by the record size; a trailing partial record is
//! dropped by the integer division rather than rejected.

use soroban_sdk::{Bytes, Env, Vec};

use crate::DecryptedMove;

/// Size of one 32-bit value in the cleartext buffer.
pub const WORD_SIZE: u32 = 4;
/// Size of one (x, y, reveal_step) record.
pub const RECORD_SIZE: u32 = 3 * WORD_SIZE;

pub fn decode_moves(env: &Env, cleartext: &Bytes) -> Vec<DecryptedMove> {
    let count = cleartext.len() / RECORD_SIZE;
    let mut moves = Vec::new(env);
    for i in 0..count {
        let base = i * RECORD_SIZE;
        moves.push_back(DecryptedMove {
            x: read_u32_be(cleartext, base),
            y: read_u32_be(cleartext, base + WORD_SIZE),
            reveal_step: read_u32_be(cleartext, base + 2 * WORD_SIZE),
        });
    }
    moves
}

fn read_u32_be(buf: &Bytes, offset: u32) -> u32 {
    let mut v = 0u32;
    for i in 0..WORD_SIZE {
        v = (v << 8) | u32::from(buf.get_unchecked(offset + i));
    }
    v
}
