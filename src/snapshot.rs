use std::io::{Read, Write};

use anyhow::{bail, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use engine::{fen, Board as Position};
use registry::{BoardPool, BoardState};

const MAGIC: &[u8; 8] = b"WMBLST01";
const FORMAT_VERSION: u32 = 1;

fn state_tag(state: BoardState) -> u8 {
    match state {
        BoardState::Dormant => 0,
        BoardState::Reserved => 1,
        BoardState::Active => 2,
        BoardState::Archived => 3,
    }
}

fn state_from_tag(tag: u8) -> BoardState {
    match tag {
        1 => BoardState::Reserved,
        2 => BoardState::Active,
        3 => BoardState::Archived,
        _ => BoardState::Dormant,
    }
}

/// Serializes the board pool to the `WMBLST01` snapshot format (§6): an
/// 8-byte magic, a 4-byte format version, a 4-byte board count, an 8-byte
/// next-id, then that many variable-length board records.
///
/// Reservation and timing fields are intentionally dropped from the
/// snapshot — a reloaded process re-derives them fresh, per the non-goal of
/// preserving reservation identity across restarts.
pub fn write_snapshot(pool: &BoardPool, next_id: u64, out: &mut impl Write) -> Result<()> {
    let boards = pool.snapshot_records();

    let mut header = BytesMut::with_capacity(24);
    header.put_slice(MAGIC);
    header.put_u32(FORMAT_VERSION);
    header.put_u32(boards.len() as u32);
    header.put_u64(next_id);
    out.write_all(&header)?;

    for (board_id, state, fen_str) in &boards {
        let fen_bytes = fen_str.as_bytes();
        let mut record = BytesMut::with_capacity(8 + 1 + 4 + fen_bytes.len());
        record.put_u64(*board_id);
        record.put_u8(state_tag(*state));
        record.put_u32(fen_bytes.len() as u32);
        record.put_slice(fen_bytes);
        out.write_all(&record)?;
    }

    Ok(())
}

/// Reads boards back out of a `WMBLST01` snapshot and loads them directly
/// into `pool`, returning the `next_id` counter the pool should resume from.
pub fn load_snapshot_into(pool: &BoardPool, input: &mut impl Read) -> Result<u64> {
    let mut buf = Vec::new();
    input.read_to_end(&mut buf)?;
    let mut bytes = Bytes::from(buf);

    if bytes.len() < 24 {
        bail!("snapshot truncated before header");
    }
    let magic = bytes.split_to(8);
    if &magic[..] != MAGIC {
        bail!("snapshot magic mismatch");
    }
    let version = bytes.get_u32();
    if version != FORMAT_VERSION {
        bail!("unsupported snapshot version {version}");
    }
    let count = bytes.get_u32() as usize;
    let next_id = bytes.get_u64();

    let mut boards: Vec<(u64, BoardState, Position)> = Vec::with_capacity(count);
    for _ in 0..count {
        if bytes.len() < 13 {
            bail!("snapshot truncated mid-record");
        }
        let board_id = bytes.get_u64();
        let state = bytes.get_u8();
        let fen_len = bytes.get_u32() as usize;
        if bytes.len() < fen_len {
            bail!("snapshot truncated in fen field");
        }
        let fen_str = String::from_utf8(bytes.split_to(fen_len).to_vec())?;
        let position =
            fen::parse_fen(&fen_str).ok_or_else(|| anyhow::anyhow!("bad fen in snapshot"))?;
        boards.push((board_id, state_from_tag(state), position));
    }

    pool.restore_from_snapshot(next_id, boards);
    Ok(next_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry::PoolLimits;
    use std::time::Duration;

    #[test]
    fn round_trips_an_empty_pool() {
        let pool = BoardPool::new(PoolLimits {
            min_boards: 1,
            max_boards: 10,
            reservation_timeout: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(600),
        });
        let mut out = Vec::new();
        write_snapshot(&pool, 1, &mut out).unwrap();

        let restored = BoardPool::new(PoolLimits {
            min_boards: 1,
            max_boards: 10,
            reservation_timeout: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(600),
        });
        let next_id = load_snapshot_into(&restored, &mut out.as_slice()).unwrap();
        assert_eq!(next_id, 1);
        assert_eq!(restored.len(), 0);
    }
}
