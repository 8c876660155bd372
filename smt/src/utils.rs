use primitive_types::H256;

pub(crate) fn get_bits_at_from_msb(data: &[u8], position: usize) -> u8 {
    (data[position / 8] >> (7 - (position % 8))) & 1
}

pub(crate) fn flip_bit(key: &H256, position: usize) -> H256 {
    let mut out = *key;
    out.as_bytes_mut()[position / 8] ^= 1 << (7 - (position % 8));
    out
}

/// Keeps the first `len` bits of `key` and zeroes the rest.
pub(crate) fn truncate(key: &H256, len: usize) -> H256 {
    let mut out = H256::zero();
    let full = len / 8;
    out.as_bytes_mut()[..full].copy_from_slice(&key.as_bytes()[..full]);
    let rem = len % 8;
    if rem > 0 {
        out.as_bytes_mut()[full] = key.as_bytes()[full] & (0xff_u8 << (8 - rem));
    }
    out
}
