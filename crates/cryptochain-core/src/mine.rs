use crate::block::{hash_fields, Block, Payload};
use crate::constants::{BYTE, MINE_RATE_MS};
use crate::crypto::stringify;
use crate::error::{LedgerError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Milliseconds since the unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Difficulty for a block following `original` that is stamped at `timestamp`.
///
/// Always one step away from the predecessor, except that a predecessor below
/// one is clamped back up to one.
pub fn adjust_difficulty<T>(original: &Block<T>, timestamp: u64) -> u32 {
    let difficulty = original.difficulty;
    if difficulty < 1 {
        return 1;
    }
    if timestamp.saturating_sub(original.timestamp) > MINE_RATE_MS {
        return difficulty - 1;
    }
    difficulty + 1
}

pub fn count_leading_zero_bits(hash: &[u8]) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += BYTE as u32;
        } else {
            total += b.leading_zeros();
            break;
        }
    }
    total
}

/// True when the binary expansion of the hex `hash` starts with `difficulty` zeros.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    if difficulty == 0 {
        return true;
    }
    match hex::decode(hash) {
        Ok(bytes) => count_leading_zero_bits(&bytes) >= difficulty,
        Err(_) => false,
    }
}

impl<T: Payload> Block<T> {
    /// Mines the block that follows `last_block`.
    ///
    /// Timestamp and difficulty are refreshed on every attempt alongside the nonce.
    pub fn mine(last_block: &Block<T>, data: T) -> Result<Self> {
        Self::mine_until(last_block, data, &AtomicBool::new(false))?
            .ok_or(LedgerError::MiningCancelled)
    }

    /// Same as [`Block::mine`], polling `cancel` once per nonce. Returns `None`
    /// once `cancel` is set.
    pub fn mine_until(last_block: &Block<T>, data: T, cancel: &AtomicBool) -> Result<Option<Self>> {
        let last_hash_json = stringify(&last_block.hash)?;
        let data_json = stringify(&data)?;
        let mut nonce = 0u64;

        loop {
            if cancel.load(Ordering::Relaxed) {
                debug!("mining cancelled after {} attempts", nonce);
                return Ok(None);
            }
            nonce += 1;
            let timestamp = now_millis();
            let difficulty = adjust_difficulty(last_block, timestamp);
            let hash = hash_fields(timestamp, &last_hash_json, &data_json, nonce, difficulty);

            if meets_difficulty(&hash, difficulty) {
                debug!(
                    "mined block with nonce {} at difficulty {} hash {}",
                    nonce, difficulty, hash
                );
                return Ok(Some(Self {
                    timestamp,
                    last_hash: last_block.hash.clone(),
                    hash,
                    data,
                    nonce,
                    difficulty,
                }));
            }
        }
    }
}
