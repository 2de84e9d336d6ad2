//! GF(2^255 - 19) field arithmetic, five 51-bit limbs (radix 2^51).
//!
//! This is the only number system the Ed25519 verifier needs; there is no
//! general big-integer type anywhere in this crate. `p - 2` (for `invert`)
//! and `(p - 5) / 8` (for [`FieldElement51::pow_p58`]) are derived in the
//! constants below directly from `p = 2^255 - 19`, not copied from a
//! reference implementation.

const MASK51: u64 = (1 << 51) - 1;

/// `p - 2`, little-endian, exponent for `invert()` via Fermat's little theorem.
const P_MINUS_2: [u8; 32] = [
    0xeb, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f,
];

/// `(p - 5) / 8`, little-endian, exponent used while recovering a square root
/// during point decompression.
const P_MINUS_5_OVER_8: [u8; 32] = [
    0xfd, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x0f,
];

/// `(p - 1) / 4`, little-endian. `p ≡ 5 (mod 8)`, so `2^((p-1)/4)` is a square
/// root of `-1` in this field.
const P_MINUS_1_OVER_4: [u8; 32] = [
    0xfb, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x1f,
];

#[derive(Clone, Copy, Debug)]
pub struct FieldElement51(pub [u64; 5]);

impl FieldElement51 {
    pub const ZERO: FieldElement51 = FieldElement51([0, 0, 0, 0, 0]);
    pub const ONE: FieldElement51 = FieldElement51([1, 0, 0, 0, 0]);

    /// `p` itself, limb-decomposed: `2^255 - 19` in base `2^51` is five
    /// limbs of `2^51 - 1` with 19 subtracted from the lowest limb.
    const P_LIMBS: [u64; 5] = [
        (1u64 << 51) - 19,
        (1u64 << 51) - 1,
        (1u64 << 51) - 1,
        (1u64 << 51) - 1,
        (1u64 << 51) - 1,
    ];

    /// Load a little-endian 32-byte encoding. The top bit (the sign bit
    /// used by point compression) is masked off; callers that need it read
    /// it themselves before calling this. Five overlapping 8-byte windows,
    /// shifted and masked to 51 bits each — the standard radix-2^51
    /// unpacking of a 255-bit value.
    pub fn from_bytes(bytes: &[u8; 32]) -> FieldElement51 {
        let load8 = |offset: usize| -> u64 {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[offset..offset + 8]);
            u64::from_le_bytes(buf)
        };

        FieldElement51([
            load8(0) & MASK51,
            (load8(6) >> 3) & MASK51,
            (load8(12) >> 6) & MASK51,
            (load8(19) >> 1) & MASK51,
            (load8(24) >> 12) & MASK51,
        ])
    }

    /// Fully reduce and pack little-endian, with the sign bit (parity of
    /// `x`, chosen by the caller) placed in bit 255. Inverse of
    /// [`FieldElement51::from_bytes`].
    pub fn to_bytes_with_sign(&self, sign: bool) -> [u8; 32] {
        let l = self.canonicalize();
        let mut s = [0u8; 32];

        s[0] = l[0] as u8;
        s[1] = (l[0] >> 8) as u8;
        s[2] = (l[0] >> 16) as u8;
        s[3] = (l[0] >> 24) as u8;
        s[4] = (l[0] >> 32) as u8;
        s[5] = (l[0] >> 40) as u8;
        s[6] = ((l[0] >> 48) | (l[1] << 3)) as u8;
        s[7] = (l[1] >> 5) as u8;
        s[8] = (l[1] >> 13) as u8;
        s[9] = (l[1] >> 21) as u8;
        s[10] = (l[1] >> 29) as u8;
        s[11] = (l[1] >> 37) as u8;
        s[12] = ((l[1] >> 45) | (l[2] << 6)) as u8;
        s[13] = (l[2] >> 2) as u8;
        s[14] = (l[2] >> 10) as u8;
        s[15] = (l[2] >> 18) as u8;
        s[16] = (l[2] >> 26) as u8;
        s[17] = (l[2] >> 34) as u8;
        s[18] = (l[2] >> 42) as u8;
        s[19] = ((l[2] >> 50) | (l[3] << 1)) as u8;
        s[20] = (l[3] >> 7) as u8;
        s[21] = (l[3] >> 15) as u8;
        s[22] = (l[3] >> 23) as u8;
        s[23] = (l[3] >> 31) as u8;
        s[24] = (l[3] >> 39) as u8;
        s[25] = ((l[3] >> 47) | (l[4] << 4)) as u8;
        s[26] = (l[4] >> 4) as u8;
        s[27] = (l[4] >> 12) as u8;
        s[28] = (l[4] >> 20) as u8;
        s[29] = (l[4] >> 28) as u8;
        s[30] = (l[4] >> 36) as u8;
        s[31] = (l[4] >> 44) as u8;

        if sign {
            s[31] |= 0x80;
        }
        s
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.to_bytes_with_sign(false)
    }

    /// Parity of the canonical (fully reduced) representative, i.e. the bit
    /// that point compression stores as the sign bit.
    pub fn is_negative(&self) -> bool {
        self.to_bytes()[0] & 1 == 1
    }

    fn reduce(mut limbs: [u64; 5]) -> FieldElement51 {
        let c0 = limbs[0] >> 51;
        limbs[1] += c0;
        limbs[0] &= MASK51;
        let c1 = limbs[1] >> 51;
        limbs[2] += c1;
        limbs[1] &= MASK51;
        let c2 = limbs[2] >> 51;
        limbs[3] += c2;
        limbs[2] &= MASK51;
        let c3 = limbs[3] >> 51;
        limbs[4] += c3;
        limbs[3] &= MASK51;
        let c4 = limbs[4] >> 51;
        limbs[0] += c4 * 19;
        limbs[4] &= MASK51;
        let c0b = limbs[0] >> 51;
        limbs[1] += c0b;
        limbs[0] &= MASK51;
        FieldElement51(limbs)
    }

    /// Reduce fully to the canonical representative in `[0, p)`, by
    /// conditionally subtracting `p` once the loose reduction above can
    /// leave a value in `[p, 2^255)`.
    fn canonicalize(&self) -> [u64; 5] {
        let mut limbs = Self::reduce(self.0).0;
        // At most one extra subtraction of p is ever needed after `reduce`.
        let is_ge_p = {
            let mut ge = true;
            let mut strictly_gt = false;
            for i in (0..5).rev() {
                if limbs[i] > Self::P_LIMBS[i] {
                    strictly_gt = true;
                    break;
                } else if limbs[i] < Self::P_LIMBS[i] {
                    ge = false;
                    break;
                }
            }
            ge || strictly_gt
        };
        if is_ge_p {
            let mut borrow = 0i64;
            for i in 0..5 {
                let diff = limbs[i] as i64 - Self::P_LIMBS[i] as i64 - borrow;
                if diff < 0 {
                    limbs[i] = (diff + (1i64 << 51)) as u64;
                    borrow = 1;
                } else {
                    limbs[i] = diff as u64;
                    borrow = 0;
                }
            }
        }
        limbs
    }

    pub fn add(&self, rhs: &FieldElement51) -> FieldElement51 {
        let mut limbs = [0u64; 5];
        for i in 0..5 {
            limbs[i] = self.0[i] + rhs.0[i];
        }
        Self::reduce(limbs)
    }

    pub fn sub(&self, rhs: &FieldElement51) -> FieldElement51 {
        // Bias by 2p, limb-wise, so the subtraction never underflows: each
        // limb of self/rhs is < 2^51 and each limb of 2p is >= 2^52 - 38.
        let mut limbs = [0u64; 5];
        for i in 0..5 {
            limbs[i] = self.0[i] + 2 * Self::P_LIMBS[i] - rhs.0[i];
        }
        Self::reduce(limbs)
    }

    pub fn neg(&self) -> FieldElement51 {
        Self::ZERO.sub(self)
    }

    pub fn mul(&self, rhs: &FieldElement51) -> FieldElement51 {
        let a = self.0;
        let b = rhs.0;
        let a0 = a[0] as u128;
        let a1 = a[1] as u128;
        let a2 = a[2] as u128;
        let a3 = a[3] as u128;
        let a4 = a[4] as u128;
        let b0 = b[0] as u128;
        let b1 = b[1] as u128;
        let b2 = b[2] as u128;
        let b3 = b[3] as u128;
        let b4 = b[4] as u128;

        let z0 = a0 * b0 + 19 * (a1 * b4 + a2 * b3 + a3 * b2 + a4 * b1);
        let z1 = a0 * b1 + a1 * b0 + 19 * (a2 * b4 + a3 * b3 + a4 * b2);
        let z2 = a0 * b2 + a1 * b1 + a2 * b0 + 19 * (a3 * b4 + a4 * b3);
        let z3 = a0 * b3 + a1 * b2 + a2 * b1 + a3 * b0 + 19 * (a4 * b4);
        let z4 = a0 * b4 + a1 * b3 + a2 * b2 + a3 * b1 + a4 * b0;

        const MASK: u128 = (1 << 51) - 1;

        let c0 = z0 >> 51;
        let r0 = (z0 & MASK) as u64;
        let z1 = z1 + c0;
        let c1 = z1 >> 51;
        let r1 = (z1 & MASK) as u64;
        let z2 = z2 + c1;
        let c2 = z2 >> 51;
        let r2 = (z2 & MASK) as u64;
        let z3 = z3 + c2;
        let c3 = z3 >> 51;
        let r3 = (z3 & MASK) as u64;
        let z4 = z4 + c3;
        let c4 = z4 >> 51;
        let r4 = (z4 & MASK) as u64;

        let r0b = r0 as u128 + c4 * 19;
        let carry = (r0b >> 51) as u64;
        let r0f = (r0b & MASK) as u64;
        let r1f = r1 + carry;

        FieldElement51([r0f, r1f, r2, r3, r4])
    }

    pub fn square(&self) -> FieldElement51 {
        self.mul(self)
    }

    /// Exponentiate by an exponent given as little-endian bytes, via plain
    /// square-and-multiply from the most significant bit down. Used only
    /// on public values (public-key coordinates during decompression), so
    /// variable-time execution is acceptable.
    fn pow(&self, exponent_le: &[u8; 32]) -> FieldElement51 {
        let mut result = FieldElement51::ONE;
        for &byte in exponent_le.iter().rev() {
            for bit in (0..8).rev() {
                result = result.square();
                if (byte >> bit) & 1 == 1 {
                    result = result.mul(self);
                }
            }
        }
        result
    }

    /// `self^(p-2) = self^-1` by Fermat's little theorem.
    pub fn invert(&self) -> FieldElement51 {
        self.pow(&P_MINUS_2)
    }

    /// `self^((p-5)/8)`, the exponent used to extract square roots when
    /// `p ≡ 5 (mod 8)`.
    pub fn pow_p58(&self) -> FieldElement51 {
        self.pow(&P_MINUS_5_OVER_8)
    }

    /// A fixed square root of `-1` in this field, computed once from
    /// `2^((p-1)/4)` (valid because `p ≡ 5 (mod 8)`).
    pub fn sqrt_m1() -> FieldElement51 {
        let two = FieldElement51::ONE.add(&FieldElement51::ONE);
        two.pow(&P_MINUS_1_OVER_4)
    }

    /// The curve constant `d = -121665/121666`, computed at runtime from
    /// the small integers in its definition rather than hardcoded limbs.
    pub fn edwards_d() -> FieldElement51 {
        let num = FieldElement51::from_u32(121665).neg();
        let den = FieldElement51::from_u32(121666);
        num.mul(&den.invert())
    }

    fn from_u32(x: u32) -> FieldElement51 {
        FieldElement51([x as u64, 0, 0, 0, 0])
    }

    pub fn ct_eq(&self, rhs: &FieldElement51) -> bool {
        let a = self.to_bytes();
        let b = rhs.to_bytes();
        let mut diff = 0u8;
        for i in 0..32 {
            diff |= a[i] ^ b[i];
        }
        diff == 0
    }

    pub fn is_zero(&self) -> bool {
        self.ct_eq(&FieldElement51::ZERO)
    }
}
