use crate::memory::{LiveMemory, MemoryMap, RNG_STATE};
use std::time::{SystemTime, UNIX_EPOCH};

const ZERO_SEED_HI: u32 = 0x6000_9755;
const ZERO_SEED_LO: u32 = 0xdead_beef;
const SEED_SALT: u32 = 0xbead_29ba;
const MIX_ROUNDS: usize = 32;

/// Expand a 32-bit seed into the 8-byte generator state: `hi` then `lo`,
/// both little-endian.
pub fn seed_state(seed: u32) -> [u8; 8] {
    let (mut hi, mut lo) = if seed == 0 {
        (ZERO_SEED_HI, ZERO_SEED_LO)
    } else {
        let fixed = (seed & 0x7fff_ffff) << 16;
        (fixed ^ SEED_SALT, fixed)
    };
    for _ in 0..MIX_ROUNDS {
        hi = hi.rotate_left(16);
        hi = hi.wrapping_add(lo);
        lo = lo.wrapping_add(hi);
    }
    let mut state = [0u8; 8];
    state[..4].copy_from_slice(&hi.to_le_bytes());
    state[4..].copy_from_slice(&lo.to_le_bytes());
    state
}

/// seed the generator registers of live memory
pub fn seed(memory: &mut LiveMemory, seed: u32) {
    memory.write(&seed_state(seed), RNG_STATE);
}

/// seconds since the epoch, truncated; the only wall-clock input to a cart
pub fn wall_clock_seed() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
