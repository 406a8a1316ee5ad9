//! SNOW 3G keystream generator and the f8/f9 constructions built on it
//!
//! Reference: ETSI/SAGE SNOW 3G document (3GPP TS 35.216) and the
//! UEA2/UIA2 document (3GPP TS 35.215).

use std::sync::OnceLock;

/// Rijndael S-box, used by S1
const SR: [u8; 256] = [
    0x63, 0x7c, 0x77, 0x7b, 0xf2, 0x6b, 0x6f, 0xc5, 0x30, 0x01, 0x67, 0x2b, 0xfe, 0xd7, 0xab, 0x76,
    0xca, 0x82, 0xc9, 0x7d, 0xfa, 0x59, 0x47, 0xf0, 0xad, 0xd4, 0xa2, 0xaf, 0x9c, 0xa4, 0x72, 0xc0,
    0xb7, 0xfd, 0x93, 0x26, 0x36, 0x3f, 0xf7, 0xcc, 0x34, 0xa5, 0xe5, 0xf1, 0x71, 0xd8, 0x31, 0x15,
    0x04, 0xc7, 0x23, 0xc3, 0x18, 0x96, 0x05, 0x9a, 0x07, 0x12, 0x80, 0xe2, 0xeb, 0x27, 0xb2, 0x75,
    0x09, 0x83, 0x2c, 0x1a, 0x1b, 0x6e, 0x5a, 0xa0, 0x52, 0x3b, 0xd6, 0xb3, 0x29, 0xe3, 0x2f, 0x84,
    0x53, 0xd1, 0x00, 0xed, 0x20, 0xfc, 0xb1, 0x5b, 0x6a, 0xcb, 0xbe, 0x39, 0x4a, 0x4c, 0x58, 0xcf,
    0xd0, 0xef, 0xaa, 0xfb, 0x43, 0x4d, 0x33, 0x85, 0x45, 0xf9, 0x02, 0x7f, 0x50, 0x3c, 0x9f, 0xa8,
    0x51, 0xa3, 0x40, 0x8f, 0x92, 0x9d, 0x38, 0xf5, 0xbc, 0xb6, 0xda, 0x21, 0x10, 0xff, 0xf3, 0xd2,
    0xcd, 0x0c, 0x13, 0xec, 0x5f, 0x97, 0x44, 0x17, 0xc4, 0xa7, 0x7e, 0x3d, 0x64, 0x5d, 0x19, 0x73,
    0x60, 0x81, 0x4f, 0xdc, 0x22, 0x2a, 0x90, 0x88, 0x46, 0xee, 0xb8, 0x14, 0xde, 0x5e, 0x0b, 0xdb,
    0xe0, 0x32, 0x3a, 0x0a, 0x49, 0x06, 0x24, 0x5c, 0xc2, 0xd3, 0xac, 0x62, 0x91, 0x95, 0xe4, 0x79,
    0xe7, 0xc8, 0x37, 0x6d, 0x8d, 0xd5, 0x4e, 0xa9, 0x6c, 0x56, 0xf4, 0xea, 0x65, 0x7a, 0xae, 0x08,
    0xba, 0x78, 0x25, 0x2e, 0x1c, 0xa6, 0xb4, 0xc6, 0xe8, 0xdd, 0x74, 0x1f, 0x4b, 0xbd, 0x8b, 0x8a,
    0x70, 0x3e, 0xb5, 0x66, 0x48, 0x03, 0xf6, 0x0e, 0x61, 0x35, 0x57, 0xb9, 0x86, 0xc1, 0x1d, 0x9e,
    0xe1, 0xf8, 0x98, 0x11, 0x69, 0xd9, 0x8e, 0x94, 0x9b, 0x1e, 0x87, 0xe9, 0xce, 0x55, 0x28, 0xdf,
    0x8c, 0xa1, 0x89, 0x0d, 0xbf, 0xe6, 0x42, 0x68, 0x41, 0x99, 0x2d, 0x0f, 0xb0, 0x54, 0xbb, 0x16,
];

/// S-box derived from the Dickson polynomial, used by S2
const SQ: [u8; 256] = [
    0x25, 0x24, 0x73, 0x67, 0xd7, 0xae, 0x5c, 0x30, 0xa4, 0xee, 0x6e, 0xcb, 0x7d, 0xb5, 0x82, 0xdb,
    0xe4, 0x8e, 0x48, 0x49, 0x4f, 0x5d, 0x6a, 0x78, 0x70, 0x88, 0xe8, 0x5f, 0x5e, 0x84, 0x65, 0xe2,
    0xd8, 0xe9, 0xcc, 0xed, 0x40, 0x2f, 0x11, 0x28, 0x57, 0xd2, 0xac, 0xe3, 0x4a, 0x15, 0x1b, 0xb9,
    0xb2, 0x80, 0x85, 0xa6, 0x2e, 0x02, 0x47, 0x29, 0x07, 0x4b, 0x0e, 0xc1, 0x51, 0xaa, 0x89, 0xd4,
    0xca, 0x01, 0x46, 0xb3, 0xef, 0xdd, 0x44, 0x7b, 0xc2, 0x7f, 0xbe, 0xc3, 0x9f, 0x20, 0x4c, 0x64,
    0x83, 0xa2, 0x68, 0x42, 0x13, 0xb4, 0x41, 0xcd, 0xba, 0xc6, 0xbb, 0x6d, 0x4d, 0x71, 0x21, 0xf4,
    0x8d, 0xb0, 0xe5, 0x93, 0xfe, 0x8f, 0xe6, 0xcf, 0x43, 0x45, 0x31, 0x22, 0x37, 0x36, 0x96, 0xfa,
    0xbc, 0x0f, 0x08, 0x52, 0x1d, 0x55, 0x1a, 0xc5, 0x4e, 0x23, 0x69, 0x7a, 0x92, 0xff, 0x5b, 0x5a,
    0xeb, 0x9a, 0x1c, 0xa9, 0xd1, 0x7e, 0x0d, 0xfc, 0x50, 0x8a, 0xb6, 0x62, 0xf5, 0x0a, 0xf8, 0xdc,
    0x03, 0x3c, 0x0c, 0x39, 0xf1, 0xb8, 0xf3, 0x3d, 0xf2, 0xd5, 0x97, 0x66, 0x81, 0x32, 0xa0, 0x00,
    0x06, 0xce, 0xf6, 0xea, 0xb7, 0x17, 0xf7, 0x8c, 0x79, 0xd6, 0xa7, 0xbf, 0x8b, 0x3f, 0x1f, 0x53,
    0x63, 0x75, 0x35, 0x2c, 0x60, 0xfd, 0x27, 0xd3, 0x94, 0xa5, 0x7c, 0xa1, 0x05, 0x58, 0x2d, 0xbd,
    0xd9, 0xc7, 0xaf, 0x6b, 0x54, 0x0b, 0xe0, 0x38, 0x04, 0xc8, 0x9d, 0xe7, 0x14, 0xb1, 0x87, 0x9c,
    0xdf, 0x6f, 0xf9, 0xda, 0x2a, 0xc4, 0x59, 0x16, 0x74, 0x91, 0xab, 0x26, 0x61, 0x76, 0x34, 0x2b,
    0xad, 0x99, 0xfb, 0x72, 0xec, 0x33, 0x12, 0xde, 0x98, 0x3b, 0xc0, 0x9b, 0x3e, 0x18, 0x10, 0x3a,
    0x56, 0xe1, 0x77, 0xc9, 0x1e, 0x9e, 0x95, 0xa3, 0x90, 0x19, 0xa8, 0x6c, 0x09, 0xd0, 0xf0, 0x86,
];

fn mul_x(v: u8, c: u8) -> u8 {
    if v & 0x80 != 0 {
        (v << 1) ^ c
    } else {
        v << 1
    }
}

/// Builds a MULalpha/DIValpha table: byte k of entry c is MULxPOW(c, exponents[k], 0xa9)
fn build_alpha_table(exponents: [u32; 4]) -> [u32; 256] {
    let max = exponents.iter().copied().max().unwrap_or(0);
    let mut table = [0u32; 256];
    for (c, entry) in table.iter_mut().enumerate() {
        let mut v = c as u8;
        for i in 0..=max {
            for (k, &e) in exponents.iter().enumerate() {
                if e == i {
                    *entry |= (v as u32) << (24 - 8 * k);
                }
            }
            v = mul_x(v, 0xa9);
        }
    }
    table
}

fn mul_alpha(c: u8) -> u32 {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| build_alpha_table([23, 245, 48, 239]))[c as usize]
}

fn div_alpha(c: u8) -> u32 {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| build_alpha_table([16, 39, 6, 64]))[c as usize]
}

/// Column mix shared by S1 and S2
fn mix_column(s: [u8; 4], c: u8) -> u32 {
    let m = [mul_x(s[0], c), mul_x(s[1], c), mul_x(s[2], c), mul_x(s[3], c)];
    let r0 = m[0] ^ s[1] ^ s[2] ^ m[3] ^ s[3];
    let r1 = m[0] ^ s[0] ^ m[1] ^ s[2] ^ s[3];
    let r2 = s[0] ^ m[1] ^ s[1] ^ m[2] ^ s[3];
    let r3 = s[0] ^ s[1] ^ m[2] ^ s[2] ^ m[3];
    u32::from_be_bytes([r0, r1, r2, r3])
}

fn s1(w: u32) -> u32 {
    let b = w.to_be_bytes();
    mix_column([SR[b[0] as usize], SR[b[1] as usize], SR[b[2] as usize], SR[b[3] as usize]], 0x1b)
}

fn s2(w: u32) -> u32 {
    let b = w.to_be_bytes();
    mix_column([SQ[b[0] as usize], SQ[b[1] as usize], SQ[b[2] as usize], SQ[b[3] as usize]], 0x69)
}

/// SNOW 3G generator state: 16 word LFSR and 3 register FSM
pub struct Snow3g {
    s: [u32; 16],
    r1: u32,
    r2: u32,
    r3: u32,
}

impl Snow3g {
    /// Initialise from key words `k` and IV words `iv`, indexed k0..k3 and IV0..IV3 as in TS 35.216
    pub fn new(k: [u32; 4], iv: [u32; 4]) -> Self {
        let ones = u32::MAX;
        let mut s = [0u32; 16];
        s[15] = k[3] ^ iv[0];
        s[14] = k[2];
        s[13] = k[1];
        s[12] = k[0] ^ iv[1];
        s[11] = k[3] ^ ones;
        s[10] = k[2] ^ ones ^ iv[2];
        s[9] = k[1] ^ ones ^ iv[3];
        s[8] = k[0] ^ ones;
        s[7] = k[3];
        s[6] = k[2];
        s[5] = k[1];
        s[4] = k[0];
        s[3] = k[3] ^ ones;
        s[2] = k[2] ^ ones;
        s[1] = k[1] ^ ones;
        s[0] = k[0] ^ ones;

        let mut gen = Self { s, r1: 0, r2: 0, r3: 0 };
        for _ in 0..32 {
            let f = gen.clock_fsm();
            gen.clock_lfsr(f);
        }
        // The first FSM output after initialisation is discarded
        gen.clock_fsm();
        gen.clock_lfsr(0);
        gen
    }

    /// Build the generator from a 128-bit key and IV words
    pub fn with_key(key: &[u8; 16], iv: [u32; 4]) -> Self {
        // k3 holds the most significant key bytes
        let k = [
            u32::from_be_bytes([key[12], key[13], key[14], key[15]]),
            u32::from_be_bytes([key[8], key[9], key[10], key[11]]),
            u32::from_be_bytes([key[4], key[5], key[6], key[7]]),
            u32::from_be_bytes([key[0], key[1], key[2], key[3]]),
        ];
        Self::new(k, iv)
    }

    fn clock_lfsr(&mut self, f: u32) {
        let s0 = self.s[0];
        let s11 = self.s[11];
        let v = (s0 << 8)
            ^ mul_alpha((s0 >> 24) as u8)
            ^ self.s[2]
            ^ (s11 >> 8)
            ^ div_alpha(s11 as u8)
            ^ f;
        self.s.copy_within(1.., 0);
        self.s[15] = v;
    }

    fn clock_fsm(&mut self) -> u32 {
        let f = self.s[15].wrapping_add(self.r1) ^ self.r2;
        let r = self.r2.wrapping_add(self.r3 ^ self.s[5]);
        self.r3 = s2(self.r2);
        self.r2 = s1(self.r1);
        self.r1 = r;
        f
    }

    /// Produce the next keystream word
    pub fn next_word(&mut self) -> u32 {
        let z = self.clock_fsm() ^ self.s[0];
        self.clock_lfsr(0);
        z
    }
}

/// f8 confidentiality function: XORs `data` with the keystream in place
pub fn f8(key: &[u8; 16], count: u32, bearer: u8, direction: u8, data: &mut [u8]) {
    let bd = ((bearer as u32 & 0x1f) << 27) | ((direction as u32 & 0x1) << 26);
    let mut gen = Snow3g::with_key(key, [bd, count, bd, count]);

    for chunk in data.chunks_mut(4) {
        let ks = gen.next_word().to_be_bytes();
        for (b, k) in chunk.iter_mut().zip(ks) {
            *b ^= k;
        }
    }
}

fn mul64x(v: u64, c: u64) -> u64 {
    if v & 0x8000_0000_0000_0000 != 0 {
        (v << 1) ^ c
    } else {
        v << 1
    }
}

/// Multiplication in GF(2^64) with reduction constant `c`
fn mul64(v: u64, p: u64, c: u64) -> u64 {
    let mut result = 0u64;
    let mut v_pow = v;
    for i in 0..64 {
        if (p >> i) & 1 != 0 {
            result ^= v_pow;
        }
        v_pow = mul64x(v_pow, c);
    }
    result
}

/// f9 integrity function over a byte aligned message, returns the 32-bit MAC
pub fn f9(key: &[u8; 16], count: u32, fresh: u32, direction: u8, message: &[u8]) -> u32 {
    f9_bits(key, count, fresh, direction, message, message.len() as u64 * 8)
}

/// f9 over the first `length` bits of `message`
pub fn f9_bits(
    key: &[u8; 16],
    count: u32,
    fresh: u32,
    direction: u8,
    message: &[u8],
    length: u64,
) -> u32 {
    let dir = direction as u32 & 0x1;
    let mut gen = Snow3g::with_key(key, [fresh ^ (dir << 15), count ^ (dir << 31), fresh, count]);

    let z: [u32; 5] = std::array::from_fn(|_| gen.next_word());
    let p = ((z[0] as u64) << 32) | z[1] as u64;
    let q = ((z[2] as u64) << 32) | z[3] as u64;
    const C: u64 = 0x1b;

    let n_bytes = (length.div_ceil(8) as usize).min(message.len());
    let mut eval = 0u64;
    for (i, block) in message[..n_bytes].chunks(8).enumerate() {
        let mut m = [0u8; 8];
        m[..block.len()].copy_from_slice(block);
        let mut word = u64::from_be_bytes(m);

        // Bits past the message length are zero
        let valid = length - i as u64 * 64;
        if valid < 64 {
            word &= !(u64::MAX >> valid);
        }
        eval = mul64(eval ^ word, p, C);
    }

    eval = mul64(eval ^ length, q, C);

    ((eval >> 32) as u32) ^ z[4]
}
