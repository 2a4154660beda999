//! Non-cryptographic 32 bit hashing used to place primary keys into buckets.
//!
//! This is the 32 bit body of [MurmurHash3] with one deviation in [hash_u32]: small
//! integers have their low bytes broadcast upwards before mixing, and an extra
//! avalanche term is folded in afterwards. Do not change any constant here, the
//! bucket placement of every bank depends on it.
//!
//! [MurmurHash3]: https://github.com/aappleby/smhasher/wiki/MurmurHash3
//! [hash_u32]: fn.hash_u32.html

/// Seed used to hash primary keys into buckets.
pub const PRIMARY_KEY_SEED: u32 = 963_489_887;

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

#[inline]
fn mix_block(k: u32) -> u32 {
    k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

#[inline]
fn mix_hash(hash: u32, k: u32) -> u32 {
    (hash ^ mix_block(k))
        .rotate_left(13)
        .wrapping_mul(5)
        .wrapping_add(0xe654_6b64)
}

#[inline]
fn final_mix(mut hash: u32) -> u32 {
    hash ^= hash >> 16;
    hash = hash.wrapping_mul(0x85eb_ca6b);
    hash ^= hash >> 13;
    hash = hash.wrapping_mul(0xc2b2_ae35);
    hash ^= hash >> 16;
    hash
}

/// Hash a single u32.
///
/// Zero high bytes are filled with copies of the low bytes before the block is mixed,
/// so that keys in `0..256` do not all land close to each other.
pub fn hash_u32(value: u32, seed: u32) -> u32 {
    let mut k = value;
    if k >> 8 == 0 {
        k |= k << 8;
    }
    if k >> 16 == 0 {
        k |= k << 16;
    }
    if k >> 24 == 0 {
        k |= k << 24;
    }
    let hash = mix_hash(seed, k) ^ (value >> 3).wrapping_mul(4);
    final_mix(hash)
}

/// Hash an arbitrary byte string.
pub fn hash_bytes(bytes: &[u8], seed: u32) -> u32 {
    let mut hash = seed;
    let mut blocks = bytes.chunks_exact(4);
    for block in &mut blocks {
        let k = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        hash = mix_hash(hash, k);
    }
    let tail = blocks.remainder();
    if !tail.is_empty() {
        let k = tail
            .iter()
            .enumerate()
            .fold(0u32, |k, (i, b)| k ^ (u32::from(*b) << (8 * i)));
        hash ^= mix_block(k);
    }
    hash ^= bytes.len() as u32;
    final_mix(hash)
}

/// Hash a u64 by hashing its 8 native-endian bytes.
pub fn hash_u64(value: u64, seed: u32) -> u32 {
    hash_bytes(&value.to_ne_bytes(), seed)
}
