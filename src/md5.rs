//! Compile-time MD5 (RFC 1321).
//!
//! Everything here is a `const fn` so trace ids can be computed inside
//! `const` items by instrumented code, and the extractor reuses the exact same
//! code path at build time. The digest is not used for security; it only has
//! to be stable and well-defined.

/// Length of a digest in bytes.
pub const DIGEST_LEN: usize = 16;

/// A raw 128-bit digest.
pub type Digest = [u8; DIGEST_LEN];

const BLOCK_LEN: usize = 64;
const LENGTH_FIELD_LEN: usize = 8;

const INIT: [u32; 4] = [0x67452301, 0xefcdab89, 0x98badcfe, 0x10325476];

const K: [u32; 64] = [
    0xd76aa478, 0xe8c7b756, 0x242070db, 0xc1bdceee, 0xf57c0faf, 0x4787c62a, 0xa8304613, 0xfd469501,
    0x698098d8, 0x8b44f7af, 0xffff5bb1, 0x895cd7be, 0x6b901122, 0xfd987193, 0xa679438e, 0x49b40821,
    0xf61e2562, 0xc040b340, 0x265e5a51, 0xe9b6c7aa, 0xd62f105d, 0x02441453, 0xd8a1e681, 0xe7d3fbc8,
    0x21e1cde6, 0xc33707d6, 0xf4d50d87, 0x455a14ed, 0xa9e3e905, 0xfcefa3f8, 0x676f02d9, 0x8d2a4c8a,
    0xfffa3942, 0x8771f681, 0x6d9d6122, 0xfde5380c, 0xa4beea44, 0x4bdecfa9, 0xf6bb4b60, 0xbebfbc70,
    0x289b7ec6, 0xeaa127fa, 0xd4ef3085, 0x04881d05, 0xd9d4d039, 0xe6db99e5, 0x1fa27cf8, 0xc4ac5665,
    0xf4292244, 0x432aff97, 0xab9423a7, 0xfc93a039, 0x655b59c3, 0x8f0ccc92, 0xffeff47d, 0x85845dd1,
    0x6fa87e4f, 0xfe2ce6e0, 0xa3014314, 0x4e0811a1, 0xf7537e82, 0xbd3af235, 0x2ad7d2bb, 0xeb86d391,
];

const S: [u32; 64] = [
    7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22,
    5, 9, 14, 20, 5, 9, 14, 20, 5, 9, 14, 20, 5, 9, 14, 20,
    4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23,
    6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21,
];

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Digest of a single byte string.
pub const fn md5(data: &[u8]) -> Digest {
    md5_concat(&[], data)
}

/// Digest of `head` immediately followed by `tail`.
///
/// The level prefix and the message text live in separate buffers both in
/// the extractor and in `const` call sites, so the two parts are streamed
/// through the padding logic instead of being joined first.
pub const fn md5_concat(head: &[u8], tail: &[u8]) -> Digest {
    let len = head.len() + tail.len();
    let bit_len = (len as u64).wrapping_mul(8);
    let blocks = (len + LENGTH_FIELD_LEN) / BLOCK_LEN + 1;

    let mut state = INIT;
    let mut block = 0;
    while block < blocks {
        let mut words = [0u32; 16];
        let mut w = 0;
        while w < 16 {
            let mut word = 0u32;
            let mut k = 0;
            while k < 4 {
                let index = block * BLOCK_LEN + w * 4 + k;
                word |= (padded_byte(head, tail, index, blocks, bit_len) as u32) << (8 * k);
                k += 1;
            }
            words[w] = word;
            w += 1;
        }
        state = compress(state, &words);
        block += 1;
    }

    let mut digest = [0u8; DIGEST_LEN];
    let mut i = 0;
    while i < 4 {
        let bytes = state[i].to_le_bytes();
        let mut k = 0;
        while k < 4 {
            digest[i * 4 + k] = bytes[k];
            k += 1;
        }
        i += 1;
    }
    digest
}

/// Lowercase hex rendering of a digest.
pub const fn to_hex(digest: &Digest) -> [u8; DIGEST_LEN * 2] {
    let mut out = [0u8; DIGEST_LEN * 2];
    let mut i = 0;
    while i < DIGEST_LEN {
        out[i * 2] = HEX_DIGITS[(digest[i] >> 4) as usize];
        out[i * 2 + 1] = HEX_DIGITS[(digest[i] & 0x0f) as usize];
        i += 1;
    }
    out
}

/// Hex digest as an owned string.
pub fn hex_digest(head: &[u8], tail: &[u8]) -> String {
    to_hex(&md5_concat(head, tail)).iter().map(|&b| b as char).collect()
}

// Byte `index` of the padded message: data, 0x80, zeros, bit length (LE).
const fn padded_byte(head: &[u8], tail: &[u8], index: usize, blocks: usize, bit_len: u64) -> u8 {
    let len = head.len() + tail.len();
    let length_offset = blocks * BLOCK_LEN - LENGTH_FIELD_LEN;
    if index < head.len() {
        head[index]
    } else if index < len {
        tail[index - head.len()]
    } else if index == len {
        0x80
    } else if index >= length_offset {
        (bit_len >> (8 * (index - length_offset))) as u8
    } else {
        0
    }
}

const fn compress(state: [u32; 4], words: &[u32; 16]) -> [u32; 4] {
    let mut a = state[0];
    let mut b = state[1];
    let mut c = state[2];
    let mut d = state[3];

    let mut i = 0;
    while i < 64 {
        let (f, g) = if i < 16 {
            ((b & c) | (!b & d), i)
        } else if i < 32 {
            ((d & b) | (!d & c), (5 * i + 1) % 16)
        } else if i < 48 {
            (b ^ c ^ d, (3 * i + 5) % 16)
        } else {
            (c ^ (b | !d), (7 * i) % 16)
        };
        let f = f.wrapping_add(a).wrapping_add(K[i]).wrapping_add(words[g]);
        a = d;
        d = c;
        c = b;
        b = b.wrapping_add(f.rotate_left(S[i]));
        i += 1;
    }

    [
        state[0].wrapping_add(a),
        state[1].wrapping_add(b),
        state[2].wrapping_add(c),
        state[3].wrapping_add(d),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(data: &str) -> String {
        hex_digest(&[], data.as_bytes())
    }

    #[test]
    fn test_rfc1321_suite() {
        assert_eq!(hex(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(hex("a"), "0cc175b9c0f1b6a831c399e269772661");
        assert_eq!(hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(hex("message digest"), "f96b697d7cb7938d525a2f31aaf161d0");
        assert_eq!(hex("abcdefghijklmnopqrstuvwxyz"), "c3fcd3d76192e4007dfb496cca67e13b");
        assert_eq!(
            hex("ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789"),
            "d174ab98d277d9f5a5611c2c9f419d9f"
        );
        assert_eq!(
            hex("12345678901234567890123456789012345678901234567890123456789012345678901234567890"),
            "57edf4a22be3c955ac49da2e2107b67a"
        );
    }

    #[test]
    fn test_split_input_matches_joined_input() {
        // 55/56/64 bytes straddle the padding boundaries
        for len in [0usize, 1, 54, 55, 56, 63, 64, 65, 127, 128] {
            let data = vec![b'x'; len];
            for split in [0, len / 2, len] {
                assert_eq!(
                    md5_concat(&data[..split], &data[split..]),
                    md5(&data),
                    "len {} split {}",
                    len,
                    split
                );
            }
        }
    }

    #[test]
    fn test_usable_in_const_context() {
        const DIGEST: Digest = md5(b"abc");
        const HEX: [u8; 32] = to_hex(&DIGEST);
        assert_eq!(&HEX, b"900150983cd24fb0d6963f7d28e17f72");
    }
}
