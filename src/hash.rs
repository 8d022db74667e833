//! Hash functions for the table indexes.
//!
//! Integer keys (flow id, priority) go through the MurmurHash3 finalizers;
//! match keys are hashed with full MurmurHash3-x86-32 over their raw bytes.
//! Every function lands in 32 bits because the bucket cells of [`crate::hmap`]
//! store the hash and the bucket state in a single `u32`.

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// 32-bit MurmurHash3 finalizer.
#[inline]
pub fn hash_u32(key: u32) -> u32 {
    let mut h = key;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// 16-bit keys are zero-extended and finalized as 32-bit values.
#[inline]
pub fn hash_u16(key: u16) -> u32 {
    hash_u32(key as u32)
}

/// 64-bit MurmurHash3 finalizer, truncated to the low 32 bits for the index.
#[inline]
pub fn hash_u64(key: u64) -> u32 {
    let mut h = key;
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h as u32
}

/// MurmurHash3-x86-32 over an arbitrary byte slice.
///
/// Match keys are hashed with seed 0. Callers must hand in fully-initialized
/// bytes: a struct with padding holes hashes its garbage too, so match
/// structures have to be zeroed before population.
pub fn murmur3_32(bytes: &[u8], seed: u32) -> u32 {
    let mut h = seed;

    let mut chunks = bytes.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes(chunk.try_into().unwrap());
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);
        h ^= k;
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, &b) in tail.iter().enumerate() {
            k |= (b as u32) << (8 * i);
        }
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);
        h ^= k;
    }

    h ^= bytes.len() as u32;
    hash_u32(h)
}
