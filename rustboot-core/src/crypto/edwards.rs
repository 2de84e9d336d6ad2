//! Twisted Edwards curve arithmetic in extended coordinates `(X, Y, Z, T)`,
//! `T = XY/Z`, `a = -1`. Doubling uses dbl-2008-hwcd; addition uses
//! add-2008-hwcd-3 (unified, no exceptional cases for the inputs this
//! verifier ever sees).

use super::field::FieldElement51;

#[derive(Clone, Copy)]
pub struct ExtendedPoint {
    pub x: FieldElement51,
    pub y: FieldElement51,
    pub z: FieldElement51,
    pub t: FieldElement51,
}

impl ExtendedPoint {
    pub fn identity() -> ExtendedPoint {
        ExtendedPoint {
            x: FieldElement51::ZERO,
            y: FieldElement51::ONE,
            z: FieldElement51::ONE,
            t: FieldElement51::ZERO,
        }
    }

    /// Negate a point: coordinate-wise negation of X and T, per the note in
    /// the verification algorithm (Y and Z are untouched).
    pub fn negate(&self) -> ExtendedPoint {
        ExtendedPoint {
            x: self.x.neg(),
            y: self.y,
            z: self.z,
            t: self.t.neg(),
        }
    }

    pub fn double(&self) -> ExtendedPoint {
        let a = self.x.square();
        let b = self.y.square();
        let c = self.z.square().add(&self.z.square());
        let d = a.neg();
        let xy = self.x.add(&self.y);
        let e = xy.square().sub(&a).sub(&b);
        let g = d.add(&b);
        let f = g.sub(&c);
        let h = d.sub(&b);

        ExtendedPoint {
            x: e.mul(&f),
            y: g.mul(&h),
            z: f.mul(&g),
            t: e.mul(&h),
        }
    }

    pub fn add(&self, rhs: &ExtendedPoint) -> ExtendedPoint {
        let two_d = FieldElement51::edwards_d().add(&FieldElement51::edwards_d());

        let a = self.y.sub(&self.x).mul(&rhs.y.sub(&rhs.x));
        let b = self.y.add(&self.x).mul(&rhs.y.add(&rhs.x));
        let c = self.t.mul(&two_d).mul(&rhs.t);
        let dd = self.z.mul(&rhs.z).add(&self.z.mul(&rhs.z));

        let e = b.sub(&a);
        let f = dd.sub(&c);
        let g = dd.add(&c);
        let h = b.add(&a);

        ExtendedPoint {
            x: e.mul(&f),
            y: g.mul(&h),
            z: f.mul(&g),
            t: e.mul(&h),
        }
    }

    /// Variable-time scalar multiplication, MSB-to-LSB double-and-add over
    /// the raw bits of `scalar`. Acceptable per the verifier's
    /// constant-time posture: only public data (the public key and the
    /// signature) ever flows through this.
    pub fn scalar_mul(&self, scalar: &[u8; 32]) -> ExtendedPoint {
        let mut acc = ExtendedPoint::identity();
        for byte_index in (0..32).rev() {
            let byte = scalar[byte_index];
            for bit in (0..8).rev() {
                acc = acc.double();
                if (byte >> bit) & 1 == 1 {
                    acc = acc.add(self);
                }
            }
        }
        acc
    }

    fn to_affine(&self) -> (FieldElement51, FieldElement51) {
        let z_inv = self.z.invert();
        (self.x.mul(&z_inv), self.y.mul(&z_inv))
    }

    /// Compress to the standard 32-byte encoding: `y` little-endian with
    /// the sign of `x` (its parity) in bit 255.
    pub fn compress(&self) -> [u8; 32] {
        let (x, y) = self.to_affine();
        y.to_bytes_with_sign(x.is_negative())
    }

    /// Decompress a 32-byte point encoding. Recovers `x` from `y` per the
    /// formula in the verification algorithm; returns `None` if the
    /// encoding doesn't correspond to a point on the curve.
    pub fn decompress(bytes: &[u8; 32]) -> Option<ExtendedPoint> {
        let sign = (bytes[31] >> 7) & 1 == 1;
        let y = FieldElement51::from_bytes(bytes);

        let y2 = y.square();
        let u = y2.sub(&FieldElement51::ONE);
        let v = y2.mul(&FieldElement51::edwards_d()).add(&FieldElement51::ONE);

        let v3 = v.square().mul(&v);
        let v7 = v3.square().mul(&v);
        let mut x = u.mul(&v3).mul(&v7.mul(&u).pow_p58());

        let check = v.mul(&x.square());
        if check.sub(&u).is_zero() {
            // x already correct
        } else if check.add(&u).is_zero() {
            x = x.mul(&FieldElement51::sqrt_m1());
        } else {
            return None;
        }

        if x.is_zero() && sign {
            return None;
        }
        if x.is_negative() != sign {
            x = x.neg();
        }

        Some(ExtendedPoint {
            x,
            y,
            z: FieldElement51::ONE,
            t: x.mul(&y),
        })
    }

    /// The canonical Ed25519 basepoint, decompressed from its well-known
    /// compressed form at call time rather than hardcoded in extended
    /// coordinates.
    pub fn basepoint() -> ExtendedPoint {
        const BASEPOINT_COMPRESSED: [u8; 32] = [
            0x58, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66,
            0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66,
            0x66, 0x66, 0x66, 0x66,
        ];
        ExtendedPoint::decompress(&BASEPOINT_COMPRESSED).expect("basepoint always decompresses")
    }
}
