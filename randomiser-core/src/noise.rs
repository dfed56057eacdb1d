//! Seed-keyed positional noise.
//!
//! Every random decision in a run is a pure function of a coordinate and
//! the seed, so two runs with the same seed agree draw for draw regardless
//! of which other decisions were made in between.

use crate::{RandomiserError, Result};

const NOISE1: u128 = 0xB529_7A4D;
const NOISE2: u128 = 0x68E3_1DA4;
const NOISE3: u128 = 0x1B56_C4E9;
const PRIME1: u128 = 0x0BD4_BCB5;
const PRIME2: u128 = 0x0063_D68D;

/// Noise channels. Each randomised concern draws from its own channel so
/// coordinates never collide across concerns.
pub const RAND_CARDS: u64 = 10;
pub const RAND_NPC_DECKS: u64 = 20;
pub const RAND_BOOSTERS: u64 = 30;
pub const RAND_MASTERS: u64 = 40;
pub const RAND_STARTER_DECKS: u64 = 50;
pub const RAND_NPC_NAMES: u64 = 60;
pub const RAND_ATTACKS: u64 = 70;

/// Hash a single integer with the seed.
///
/// The shift/xor steps must see the untruncated intermediate; reducing to
/// 32 bits after each step gives a different (and wrong) sequence. Only the
/// low 48 bits of any intermediate can reach the final low 32 bits, so
/// wrapping at 128 bits is exact.
pub fn scalar(n: u128, seed: u64) -> u32 {
    let mut n = n.wrapping_mul(NOISE1);
    n = n.wrapping_add(seed as u128);
    n ^= n >> 8;
    n = n.wrapping_add(NOISE2);
    n ^= n << 8;
    n = n.wrapping_mul(NOISE3);
    n ^= n >> 8;
    (n & 0xFFFF_FFFF) as u32
}

pub fn point2d(x: u64, y: u64, seed: u64) -> u32 {
    let combined = (x as u128).wrapping_add(PRIME1.wrapping_mul(y as u128));
    scalar(combined, seed)
}

pub fn point3d(x: u64, y: u64, z: u64, seed: u64) -> u32 {
    let combined = (x as u128)
        .wrapping_add(PRIME1.wrapping_mul(y as u128))
        .wrapping_add(PRIME2.wrapping_mul(z as u128));
    scalar(combined, seed)
}

/// `list[n mod len]`. `what` names the list in the error.
pub fn pick<'a, T>(list: &'a [T], n: u32, what: &'static str) -> Result<&'a T> {
    if list.is_empty() {
        return Err(RandomiserError::EmptySelection(what));
    }
    Ok(&list[n as usize % list.len()])
}

/// Map a noise value into the inclusive range `[min, max]`.
///
/// Callers validate `min <= max`; an inverted range collapses to `min`.
pub fn calc_range(n: u32, min: i64, max: i64) -> i64 {
    if max < min {
        return min;
    }
    (n as i64) % (max - min + 1) + min
}

/// Move `base` by an offset in `[-radius, radius]`.
pub fn calc_offset(base: i64, radius: i64, n: u32) -> i64 {
    let radius = radius.max(0);
    base + (n as i64) % (radius * 2 + 1) - radius
}
