//! ZUC-128 keystream generator with the 128-EEA3 and 128-EIA3 constructions
//!
//! Reference: ETSI/SAGE specification of the 3GPP confidentiality and
//! integrity algorithms 128-EEA3 & 128-EIA3, documents 1 and 2.

const S0: [u8; 256] = [
    0x3e, 0x72, 0x5b, 0x47, 0xca, 0xe0, 0x00, 0x33, 0x04, 0xd1, 0x54, 0x98, 0x09, 0xb9, 0x6d, 0xcb,
    0x7b, 0x1b, 0xf9, 0x32, 0xaf, 0x9d, 0x6a, 0xa5, 0xb8, 0x2d, 0xfc, 0x1d, 0x08, 0x53, 0x03, 0x90,
    0x4d, 0x4e, 0x84, 0x99, 0xe4, 0xce, 0xd9, 0x91, 0xdd, 0xb6, 0x85, 0x48, 0x8b, 0x29, 0x6e, 0xac,
    0xcd, 0xc1, 0xf8, 0x1e, 0x73, 0x43, 0x69, 0xc6, 0xb5, 0xbd, 0xfd, 0x39, 0x63, 0x20, 0xd4, 0x38,
    0x76, 0x7d, 0xb2, 0xa7, 0xcf, 0xed, 0x57, 0xc5, 0xf3, 0x2c, 0xbb, 0x14, 0x21, 0x06, 0x55, 0x9b,
    0xe3, 0xef, 0x5e, 0x31, 0x4f, 0x7f, 0x5a, 0xa4, 0x0d, 0x82, 0x51, 0x49, 0x5f, 0xba, 0x58, 0x1c,
    0x4a, 0x16, 0xd5, 0x17, 0xa8, 0x92, 0x24, 0x1f, 0x8c, 0xff, 0xd8, 0xae, 0x2e, 0x01, 0xd3, 0xad,
    0x3b, 0x4b, 0xda, 0x46, 0xeb, 0xc9, 0xde, 0x9a, 0x8f, 0x87, 0xd7, 0x3a, 0x80, 0x6f, 0x2f, 0xc8,
    0xb1, 0xb4, 0x37, 0xf7, 0x0a, 0x22, 0x13, 0x28, 0x7c, 0xcc, 0x3c, 0x89, 0xc7, 0xc3, 0x96, 0x56,
    0x07, 0xbf, 0x7e, 0xf0, 0x0b, 0x2b, 0x97, 0x52, 0x35, 0x41, 0x79, 0x61, 0xa6, 0x4c, 0x10, 0xfe,
    0xbc, 0x26, 0x95, 0x88, 0x8a, 0xb0, 0xa3, 0xfb, 0xc0, 0x18, 0x94, 0xf2, 0xe1, 0xe5, 0xe9, 0x5d,
    0xd0, 0xdc, 0x11, 0x66, 0x64, 0x5c, 0xec, 0x59, 0x42, 0x75, 0x12, 0xf5, 0x74, 0x9c, 0xaa, 0x23,
    0x0e, 0x86, 0xab, 0xbe, 0x2a, 0x02, 0xe7, 0x67, 0xe6, 0x44, 0xa2, 0x6c, 0xc2, 0x93, 0x9f, 0xf1,
    0xf6, 0xfa, 0x36, 0xd2, 0x50, 0x68, 0x9e, 0x62, 0x71, 0x15, 0x3d, 0xd6, 0x40, 0xc4, 0xe2, 0x0f,
    0x8e, 0x83, 0x77, 0x6b, 0x25, 0x05, 0x3f, 0x0c, 0x30, 0xea, 0x70, 0xb7, 0xa1, 0xe8, 0xa9, 0x65,
    0x8d, 0x27, 0x1a, 0xdb, 0x81, 0xb3, 0xa0, 0xf4, 0x45, 0x7a, 0x19, 0xdf, 0xee, 0x78, 0x34, 0x60,
];

const S1: [u8; 256] = [
    0x55, 0xc2, 0x63, 0x71, 0x3b, 0xc8, 0x47, 0x86, 0x9f, 0x3c, 0xda, 0x5b, 0x29, 0xaa, 0xfd, 0x77,
    0x8c, 0xc5, 0x94, 0x0c, 0xa6, 0x1a, 0x13, 0x00, 0xe3, 0xa8, 0x16, 0x72, 0x40, 0xf9, 0xf8, 0x42,
    0x44, 0x26, 0x68, 0x96, 0x81, 0xd9, 0x45, 0x3e, 0x10, 0x76, 0xc6, 0xa7, 0x8b, 0x39, 0x43, 0xe1,
    0x3a, 0xb5, 0x56, 0x2a, 0xc0, 0x6d, 0xb3, 0x05, 0x22, 0x66, 0xbf, 0xdc, 0x0b, 0xfa, 0x62, 0x48,
    0xdd, 0x20, 0x11, 0x06, 0x36, 0xc9, 0xc1, 0xcf, 0xf6, 0x27, 0x52, 0xbb, 0x69, 0xf5, 0xd4, 0x87,
    0x7f, 0x84, 0x4c, 0xd2, 0x9c, 0x57, 0xa4, 0xbc, 0x4f, 0x9a, 0xdf, 0xfe, 0xd6, 0x8d, 0x7a, 0xeb,
    0x2b, 0x53, 0xd8, 0x5c, 0xa1, 0x14, 0x17, 0xfb, 0x23, 0xd5, 0x7d, 0x30, 0x67, 0x73, 0x08, 0x09,
    0xee, 0xb7, 0x70, 0x3f, 0x61, 0xb2, 0x19, 0x8e, 0x4e, 0xe5, 0x4b, 0x93, 0x8f, 0x5d, 0xdb, 0xa9,
    0xad, 0xf1, 0xae, 0x2e, 0xcb, 0x0d, 0xfc, 0xf4, 0x2d, 0x46, 0x6e, 0x1d, 0x97, 0xe8, 0xd1, 0xe9,
    0x4d, 0x37, 0xa5, 0x75, 0x5e, 0x83, 0x9e, 0xab, 0x82, 0x9d, 0xb9, 0x1c, 0xe0, 0xcd, 0x49, 0x89,
    0x01, 0xb6, 0xbd, 0x58, 0x24, 0xa2, 0x5f, 0x38, 0x78, 0x99, 0x15, 0x90, 0x50, 0xb8, 0x95, 0xe4,
    0xd0, 0x91, 0xc7, 0xce, 0xed, 0x0f, 0xb4, 0x6f, 0xa0, 0xcc, 0xf0, 0x02, 0x4a, 0x79, 0xc3, 0xde,
    0xa3, 0xef, 0xea, 0x51, 0xe6, 0x6b, 0x18, 0xec, 0x1b, 0x2c, 0x80, 0xf7, 0x74, 0xe7, 0xff, 0x21,
    0x5a, 0x6a, 0x54, 0x1e, 0x41, 0x31, 0x92, 0x35, 0xc4, 0x33, 0x07, 0x0a, 0xba, 0x7e, 0x0e, 0x34,
    0x88, 0xb1, 0x98, 0x7c, 0xf3, 0x3d, 0x60, 0x6c, 0x7b, 0xca, 0xd3, 0x1f, 0x32, 0x65, 0x04, 0x28,
    0x64, 0xbe, 0x85, 0x9b, 0x2f, 0x59, 0x8a, 0xd7, 0xb0, 0x25, 0xac, 0xaf, 0x12, 0x03, 0xe2, 0xf2,
];

/// Key loading constants d_0..d_15 (15 bits each)
const EK_D: [u32; 16] = [
    0x44d7, 0x26bc, 0x626b, 0x135e, 0x5789, 0x35e2, 0x7135, 0x09af,
    0x4d78, 0x2f13, 0x6bc4, 0x1af1, 0x5e26, 0x3c4d, 0x789a, 0x47ac,
];

const P31: u32 = 0x7fff_ffff;

fn add_mod(a: u32, b: u32) -> u32 {
    let c = a.wrapping_add(b);
    (c & P31) + (c >> 31)
}

/// Multiplication by 2^k modulo 2^31 - 1
fn mul_pow2(x: u32, k: u32) -> u32 {
    ((x << k) | (x >> (31 - k))) & P31
}

fn l1(x: u32) -> u32 {
    x ^ x.rotate_left(2) ^ x.rotate_left(10) ^ x.rotate_left(18) ^ x.rotate_left(24)
}

fn l2(x: u32) -> u32 {
    x ^ x.rotate_left(8) ^ x.rotate_left(14) ^ x.rotate_left(22) ^ x.rotate_left(30)
}

fn sbox(x: u32) -> u32 {
    let b = x.to_be_bytes();
    u32::from_be_bytes([
        S0[b[0] as usize],
        S1[b[1] as usize],
        S0[b[2] as usize],
        S1[b[3] as usize],
    ])
}

/// ZUC generator state: 16 cell LFSR over GF(2^31 - 1) and the F registers
pub struct Zuc {
    s: [u32; 16],
    r1: u32,
    r2: u32,
    x: [u32; 4],
}

impl Zuc {
    /// Load `key` and `iv` and run the initialisation rounds
    pub fn new(key: &[u8; 16], iv: &[u8; 16]) -> Self {
        let s = std::array::from_fn(|i| {
            ((key[i] as u32) << 23) | (EK_D[i] << 8) | iv[i] as u32
        });
        let mut zuc = Self {
            s,
            r1: 0,
            r2: 0,
            x: [0; 4],
        };

        for _ in 0..32 {
            zuc.bit_reorganization();
            let w = zuc.f();
            zuc.clock_lfsr(w >> 1);
        }
        zuc.bit_reorganization();
        zuc.f();
        zuc.clock_lfsr(0);
        zuc
    }

    fn lfsr_feedback(&self) -> u32 {
        let s = &self.s;
        let mut v = s[0];
        v = add_mod(v, mul_pow2(s[0], 8));
        v = add_mod(v, mul_pow2(s[4], 20));
        v = add_mod(v, mul_pow2(s[10], 21));
        v = add_mod(v, mul_pow2(s[13], 17));
        add_mod(v, mul_pow2(s[15], 15))
    }

    /// Shift the LFSR, `u` is zero in working mode
    fn clock_lfsr(&mut self, u: u32) {
        let mut v = add_mod(self.lfsr_feedback(), u);
        if v == 0 {
            v = P31;
        }
        self.s.copy_within(1.., 0);
        self.s[15] = v;
    }

    fn bit_reorganization(&mut self) {
        let s = &self.s;
        self.x = [
            ((s[15] & 0x7fff_8000) << 1) | (s[14] & 0xffff),
            ((s[11] & 0xffff) << 16) | (s[9] >> 15),
            ((s[7] & 0xffff) << 16) | (s[5] >> 15),
            ((s[2] & 0xffff) << 16) | (s[0] >> 15),
        ];
    }

    fn f(&mut self) -> u32 {
        let w = (self.x[0] ^ self.r1).wrapping_add(self.r2);
        let w1 = self.r1.wrapping_add(self.x[1]);
        let w2 = self.r2 ^ self.x[2];
        self.r1 = sbox(l1((w1 << 16) | (w2 >> 16)));
        self.r2 = sbox(l2((w2 << 16) | (w1 >> 16)));
        w
    }

    /// Produce the next keystream word
    pub fn next_word(&mut self) -> u32 {
        self.bit_reorganization();
        let z = self.f() ^ self.x[3];
        self.clock_lfsr(0);
        z
    }
}

/// 128-EEA3: XORs `data` with the keystream in place
pub fn eea3(key: &[u8; 16], count: u32, bearer: u8, direction: u8, data: &mut [u8]) {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&count.to_be_bytes());
    iv[4] = ((bearer & 0x1f) << 3) | ((direction & 0x1) << 2);
    iv.copy_within(..8, 8);

    let mut zuc = Zuc::new(key, &iv);
    for chunk in data.chunks_mut(4) {
        let ks = zuc.next_word().to_be_bytes();
        for (b, k) in chunk.iter_mut().zip(ks) {
            *b ^= k;
        }
    }
}

/// 128-EIA3 over a byte aligned message, returns the 32-bit MAC
pub fn eia3(key: &[u8; 16], count: u32, bearer: u8, direction: u8, message: &[u8]) -> u32 {
    eia3_bits(key, count, bearer, direction, message, message.len() * 8)
}

/// 128-EIA3 over the first `length` bits of `message`
pub fn eia3_bits(
    key: &[u8; 16],
    count: u32,
    bearer: u8,
    direction: u8,
    message: &[u8],
    length: usize,
) -> u32 {
    let dir = (direction & 0x1) << 7;
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&count.to_be_bytes());
    iv[4] = (bearer & 0x1f) << 3;
    iv[8] = iv[0] ^ dir;
    iv[9] = iv[1];
    iv[10] = iv[2];
    iv[11] = iv[3];
    iv[12] = iv[4];
    iv[14] = dir;

    let length = length.min(message.len() * 8);
    let n_words = (length + 64).div_ceil(32);
    let mut zuc = Zuc::new(key, &iv);
    let z: Vec<u32> = (0..n_words).map(|_| zuc.next_word()).collect();

    // 32 keystream bits starting at bit position i
    let word_at = |i: usize| -> u32 {
        let (idx, shift) = (i / 32, i % 32);
        if shift == 0 {
            z[idx]
        } else {
            (z[idx] << shift) | (z[idx + 1] >> (32 - shift))
        }
    };

    let mut t = 0u32;
    for i in 0..length {
        if message[i / 8] & (0x80 >> (i % 8)) != 0 {
            t ^= word_at(i);
        }
    }
    t ^= word_at(length);
    t ^ z[n_words - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eea3_test_set_1() {
        let key = [
            0x17, 0x3d, 0x14, 0xba, 0x50, 0x03, 0x73, 0x1d, 0x7a, 0x60, 0x04, 0x94, 0x70, 0xf0,
            0x0a, 0x29,
        ];
        let plaintext = [
            0x6c, 0xf6, 0x53, 0x40, 0x73, 0x55, 0x52, 0xab, 0x0c, 0x97, 0x52, 0xfa, 0x6f, 0x90,
            0x25, 0xfe, 0x0b, 0xd6, 0x75, 0xd9, 0x00, 0x58, 0x75, 0xb2,
        ];
        let ciphertext = [
            0xa6, 0xc8, 0x5f, 0xc6, 0x6a, 0xfb, 0x85, 0x33, 0xaa, 0xfc, 0x25, 0x18, 0xdf, 0xe7,
            0x84, 0x94, 0x0e, 0xe1, 0xe4, 0xb0, 0x30, 0x23, 0x8c, 0xc8,
        ];

        let mut data = plaintext;
        eea3(&key, 0x66035492, 0x0f, 0, &mut data);
        assert_eq!(data, ciphertext);

        eea3(&key, 0x66035492, 0x0f, 0, &mut data);
        assert_eq!(data, plaintext);
    }

    #[test]
    fn test_zuc_keystream_zero_key() {
        // ZUC-128 test vector 1: all zero key and IV
        let mut zuc = Zuc::new(&[0; 16], &[0; 16]);
        assert_eq!(zuc.next_word(), 0x27bede74);
        assert_eq!(zuc.next_word(), 0x018082da);
    }

    #[test]
    fn test_eia3_test_set_1() {
        assert_eq!(eia3_bits(&[0; 16], 0, 0, 0, &[0; 4], 1), 0xc8a9595e);
    }

    #[test]
    fn test_eia3_test_set_2() {
        let key = [
            0x47, 0x05, 0x41, 0x25, 0x56, 0x1e, 0xb2, 0xdd, 0xa9, 0x40, 0x59, 0xda, 0x05, 0x09,
            0x78, 0x50,
        ];
        assert_eq!(eia3_bits(&key, 0x561eb2dd, 0x14, 0, &[0; 12], 90), 0x6719a088);
    }

    #[test]
    fn test_eia3_sensitivity() {
        let key = [0x47; 16];
        let msg = b"signalling message";
        let mac = eia3(&key, 0x10, 4, 1, msg);
        assert_eq!(mac, eia3(&key, 0x10, 4, 1, msg));
        assert_ne!(mac, eia3(&key, 0x11, 4, 1, msg));
        assert_ne!(mac, eia3(&key, 0x10, 5, 1, msg));
        assert_ne!(mac, eia3(&key, 0x10, 4, 0, msg));
        assert_ne!(mac, eia3(&key, 0x10, 4, 1, b"signalling messagf"));
    }

    #[test]
    fn test_eia3_empty_message() {
        let _ = eia3(&[0; 16], 0, 0, 0, &[]);
    }

    #[test]
    fn test_add_mod_wraps() {
        assert_eq!(add_mod(P31, 1), 1);
        assert_eq!(add_mod(0x4000_0000, 0x4000_0000), 1);
        assert_eq!(mul_pow2(0x4000_0000, 1), 1);
    }
}
