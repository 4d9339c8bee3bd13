//! Encrypted arrays: views of the plaintext space as a vector of slots
//! arranged in the hypercube of Z_m^* / <p>, with homomorphic rotations and
//! shifts.
//!
//! The slot with index k has coordinates e_i = `coordinate(i, k)`, the last
//! dimension varying fastest. Applying X -> X^{g_i^k} rotates the dimension i
//! to the right by k; wrapping is exact only when g_i has the same order in
//! Z_m^* and in the quotient (a native dimension), and is corrected by masking
//! otherwise.

mod complex;
mod exact;

pub use complex::ComplexArray;
pub use exact::ExactArray;

use crate::keys::{PublicKey, SecretKey};
use crate::{Ciphertext, Context, Error, Result, Scheme};
use num_bigint::BigInt;
use num_complex::Complex64;
use rand::{CryptoRng, RngCore};
use rlwe_math::zq::poly::ZpPoly;
use std::sync::Arc;

/// The values held by the slots of an encrypted array.
#[derive(Debug, Clone, PartialEq)]
pub enum Slots {
    /// Elements of the slot ring Z_{p^r}[X]/G(X) of the exact scheme.
    RingElements(Vec<ZpPoly>),
    /// Complex slots of the approximate scheme.
    Complex(Vec<Complex64>),
}

/// An encrypted array, whose variant follows the scheme of the context.
#[derive(Debug)]
pub enum EncryptedArray {
    /// Slots in a finite field, for BGV.
    Exact(ExactArray),
    /// Complex slots, for CKKS.
    Complex(ComplexArray),
}

impl EncryptedArray {
    /// Creates the encrypted array of the context.
    pub fn new(ctx: &Arc<Context>) -> Result<Self> {
        match ctx.scheme() {
            Scheme::Bgv => Ok(Self::Exact(ExactArray::new(ctx)?)),
            Scheme::Ckks => Ok(Self::Complex(ComplexArray::new(ctx)?)),
        }
    }

    /// The context of the array.
    pub fn ctx(&self) -> &Arc<Context> {
        match self {
            Self::Exact(ea) => ea.ctx(),
            Self::Complex(ea) => ea.ctx(),
        }
    }

    /// The exact variant, if the array is one.
    pub fn exact(&self) -> Option<&ExactArray> {
        match self {
            Self::Exact(ea) => Some(ea),
            Self::Complex(_) => None,
        }
    }

    /// The complex variant, if the array is one.
    pub fn complex(&self) -> Option<&ComplexArray> {
        match self {
            Self::Exact(_) => None,
            Self::Complex(ea) => Some(ea),
        }
    }

    fn unsupported(&self, operation: &str) -> Error {
        Error::UnsupportedOperation {
            operation: operation.to_string(),
            scheme: self.ctx().scheme().to_string(),
        }
    }

    fn exact_or(&self, operation: &str) -> Result<&ExactArray> {
        self.exact().ok_or_else(|| self.unsupported(operation))
    }

    fn complex_or(&self, operation: &str) -> Result<&ComplexArray> {
        self.complex().ok_or_else(|| self.unsupported(operation))
    }

    /// The number of slots.
    pub fn size(&self) -> usize {
        self.ctx().zm().num_slots()
    }

    /// The number of dimensions of the hypercube.
    pub fn dimension(&self) -> usize {
        self.ctx().zm().num_gens()
    }

    /// The size of the dimension i.
    ///
    /// Panics if i is not smaller than [`dimension`](Self::dimension).
    pub fn size_of_dimension(&self, i: usize) -> usize {
        self.ctx().zm().order_of(i)
    }

    /// Whether the dimension i is native.
    ///
    /// Panics if i is not smaller than [`dimension`](Self::dimension).
    pub fn native_dimension(&self, i: usize) -> bool {
        self.ctx().zm().is_native(i)
    }

    /// The i-th hypercube coordinate of the slot k.
    pub fn coordinate(&self, i: usize, k: usize) -> usize {
        self.ctx().zm().coordinate(i, k)
    }

    /// The slot obtained from k by adding `offset`, cyclically, to its i-th
    /// coordinate.
    pub fn add_coord(&self, i: usize, k: usize, offset: i64) -> usize {
        self.ctx().zm().add_coord(i, k, offset)
    }

    fn check_dimension(&self, i: usize) -> Result<()> {
        if i < self.dimension() {
            Ok(())
        } else {
            Err(Error::UnspecifiedInput(format!(
                "Invalid dimension {}, the hypercube has {} dimensions",
                i,
                self.dimension()
            )))
        }
    }

    /// Encode slot values as the coefficients of a plaintext polynomial. The
    /// complex slots are scaled by the encoding factor of the context.
    pub fn encode(&self, slots: &Slots) -> Result<Vec<i64>> {
        match (self, slots) {
            (Self::Exact(ea), Slots::RingElements(v)) => ea.encode_ring_elements(v),
            (Self::Complex(ea), Slots::Complex(v)) => ea.encode_complex(v),
            _ => Err(self.unsupported("encode")),
        }
    }

    /// Decode the slots of a plaintext polynomial; `factor` is the scaling
    /// factor of complex slots and is ignored by the exact variant.
    pub fn decode(&self, coefficients: &[BigInt], factor: f64) -> Result<Slots> {
        match self {
            Self::Exact(ea) => Ok(Slots::RingElements(ea.decode_ring_elements(coefficients)?)),
            Self::Complex(ea) => Ok(Slots::Complex(ea.decode_complex(coefficients, factor)?)),
        }
    }

    /// Encode integers, as constant slots reduced modulo p for the exact
    /// variant, and as real slots for the complex one.
    pub fn encode_integers(&self, values: &[i64]) -> Result<Vec<i64>> {
        match self {
            Self::Exact(ea) => ea.encode_integers(values),
            Self::Complex(ea) => {
                let values = values.iter().map(|v| *v as f64).collect::<Vec<_>>();
                ea.encode_reals(&values)
            }
        }
    }

    /// Decode the constant terms of exact slots.
    pub fn decode_integers(&self, coefficients: &[BigInt]) -> Result<Vec<i64>> {
        self.exact_or("decode_integers")?.decode_integers(coefficients)
    }

    /// Encode complex slots with the scaling factor of the context.
    pub fn encode_complex(&self, values: &[Complex64]) -> Result<Vec<i64>> {
        self.complex_or("encode_complex")?.encode_complex(values)
    }

    /// Encode real slots with the scaling factor of the context.
    pub fn encode_reals(&self, values: &[f64]) -> Result<Vec<i64>> {
        self.complex_or("encode_reals")?.encode_reals(values)
    }

    /// Decode complex slots scaled by `factor`.
    pub fn decode_complex(&self, coefficients: &[BigInt], factor: f64) -> Result<Vec<Complex64>> {
        self.complex_or("decode_complex")?.decode_complex(coefficients, factor)
    }

    /// The plaintext with 1 in slot i and 0 elsewhere.
    pub fn encode_unit_selector(&self, i: usize) -> Result<Vec<i64>> {
        match self {
            Self::Exact(ea) => ea.encode_unit_selector(i),
            Self::Complex(ea) => ea.encode_unit_selector(i),
        }
    }

    /// Random slot values.
    pub fn random<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Slots {
        match self {
            Self::Exact(ea) => Slots::RingElements(ea.random(rng)),
            Self::Complex(ea) => Slots::Complex(ea.random(rng)),
        }
    }

    /// Encrypt slot values under the public key.
    pub fn encrypt<R: RngCore + CryptoRng>(
        &self,
        pk: &PublicKey,
        slots: &Slots,
        rng: &mut R,
    ) -> Result<Ciphertext> {
        self.ctx().check_same(pk.ctx())?;
        let ptxt = self.encode(slots)?;
        match slots {
            Slots::RingElements(_) => pk.encrypt_bgv(&ptxt, 0, false, rng),
            Slots::Complex(v) => pk.encrypt_ckks(&ptxt, slot_bound(v), rng),
        }
    }

    /// Decrypt and decode a ciphertext.
    pub fn decrypt_slots(&self, sk: &SecretKey, ct: &Ciphertext) -> Result<Slots> {
        self.ctx().check_same(ct.ctx())?;
        let ptxt = sk.decrypt(ct)?;
        self.decode(&ptxt, ct.rat_factor())
    }

    /// Encrypt integers as constant slots.
    pub fn encrypt_integers<R: RngCore + CryptoRng>(
        &self,
        pk: &PublicKey,
        values: &[i64],
        rng: &mut R,
    ) -> Result<Ciphertext> {
        let ea = self.exact_or("encrypt_integers")?;
        self.ctx().check_same(pk.ctx())?;
        pk.encrypt_bgv(&ea.encode_integers(values)?, 0, false, rng)
    }

    /// Decrypt the constant terms of exact slots.
    pub fn decrypt_integers(&self, sk: &SecretKey, ct: &Ciphertext) -> Result<Vec<i64>> {
        let ea = self.exact_or("decrypt_integers")?;
        self.ctx().check_same(ct.ctx())?;
        ea.decode_integers(&sk.decrypt(ct)?)
    }

    /// Encrypt complex slots.
    pub fn encrypt_complex<R: RngCore + CryptoRng>(
        &self,
        pk: &PublicKey,
        values: &[Complex64],
        rng: &mut R,
    ) -> Result<Ciphertext> {
        let ea = self.complex_or("encrypt_complex")?;
        self.ctx().check_same(pk.ctx())?;
        pk.encrypt_ckks(&ea.encode_complex(values)?, slot_bound(values), rng)
    }

    /// Decrypt complex slots.
    pub fn decrypt_complex(&self, sk: &SecretKey, ct: &Ciphertext) -> Result<Vec<Complex64>> {
        let ea = self.complex_or("decrypt_complex")?;
        self.ctx().check_same(ct.ctx())?;
        ea.decode_complex(&sk.decrypt(ct)?, ct.rat_factor())
    }

    /// Multiply by the plaintext with 1 in the selected slots and 0 elsewhere.
    fn mul_by_mask(&self, ct: &mut Ciphertext, mask: &[bool]) -> Result<()> {
        match self {
            Self::Exact(ea) => {
                let values = mask.iter().map(|b| i64::from(*b)).collect::<Vec<_>>();
                ct.mul_by_constant(&ea.encode_integers(&values)?)
            }
            Self::Complex(ea) => {
                let values = mask.iter().map(|b| f64::from(u8::from(*b))).collect::<Vec<_>>();
                ct.mul_by_scaled_constant(&ea.encode_reals(&values)?, ea.scaling_factor())
            }
        }
    }

    fn slots_where<F: Fn(usize) -> bool>(&self, f: F) -> Vec<bool> {
        (0..self.size()).map(f).collect()
    }

    /// Rotate the ciphertext slots to the right by k, cyclically along the
    /// linear order of the slots.
    pub fn rotate(&self, ct: &mut Ciphertext, pk: &PublicKey, k: i64) -> Result<()> {
        self.ctx().check_same(ct.ctx())?;
        let zm = self.ctx().zm().clone();
        let n = self.size();
        let k = k.rem_euclid(n as i64) as usize;
        if k == 0 || ct.is_empty() {
            return Ok(());
        }
        if self.dimension() == 1 {
            return self.rotate_1d(ct, pk, 0, k as i64, false);
        }

        // pieces[c] holds the slots which receive a carry c in the current
        // dimension, from the last dimension to the first.
        let mut pieces = [ct.clone(), Ciphertext::new(ct.ctx())];
        for i in (1..self.dimension()).rev() {
            let ord = zm.order_of(i);
            let a = zm.coordinate(i, k);
            let mut next = [Ciphertext::new(ct.ctx()), Ciphertext::new(ct.ctx())];
            for (carry, piece) in pieces.iter().enumerate() {
                if piece.is_empty() {
                    continue;
                }
                let amount = a + carry;
                let carries = self.slots_where(|s| zm.coordinate(i, s) + amount >= ord);
                for out in [0, 1] {
                    let mask = carries.iter().map(|c| usize::from(*c) == out).collect::<Vec<_>>();
                    if !mask.contains(&true) {
                        continue;
                    }
                    let mut x = piece.clone();
                    self.mul_by_mask(&mut x, &mask)?;
                    // The carried slots wrap around exactly with g^{amount - ord}.
                    let exponent = amount as i64 - (out * ord) as i64;
                    x.smart_automorph(pk, zm.gen_power(i, exponent))?;
                    next[out].add(&x)?;
                }
            }
            pieces = next;
        }

        let ord = zm.order_of(0);
        let a = zm.coordinate(0, k);
        let mut result = Ciphertext::new(ct.ctx());
        for (carry, mut piece) in pieces.into_iter().enumerate() {
            if piece.is_empty() {
                continue;
            }
            let amount = (a + carry) % ord;
            if zm.is_native(0) {
                piece.smart_automorph(pk, zm.gen_power(0, amount as i64))?;
            } else {
                self.blend_1d(&mut piece, pk, 0, amount)?;
            }
            result.add(&piece)?;
        }
        *ct = result;
        Ok(())
    }

    /// Rotate the ciphertext slots to the right by k along the dimension i.
    ///
    /// With `dont_care`, a non-native dimension is rotated by a single
    /// automorphism, and the slots which wrap around hold unspecified values.
    pub fn rotate_1d(
        &self,
        ct: &mut Ciphertext,
        pk: &PublicKey,
        i: usize,
        k: i64,
        dont_care: bool,
    ) -> Result<()> {
        self.ctx().check_same(ct.ctx())?;
        self.check_dimension(i)?;
        let zm = self.ctx().zm().clone();
        let k = k.rem_euclid(zm.order_of(i) as i64);
        if k == 0 || ct.is_empty() {
            return Ok(());
        }
        if zm.is_native(i) || dont_care {
            ct.smart_automorph(pk, zm.gen_power(i, k))
        } else {
            self.blend_1d(ct, pk, i, k as usize)
        }
    }

    // Rotation of a non-native dimension: g^k moves the slots which do not
    // wrap around, g^{k - ord} the others.
    fn blend_1d(&self, ct: &mut Ciphertext, pk: &PublicKey, i: usize, k: usize) -> Result<()> {
        let zm = self.ctx().zm().clone();
        let ord = zm.order_of(i);
        let mask = self.slots_where(|s| zm.coordinate(i, s) >= k);
        let wrapped = if mask.contains(&false) {
            let mut w = ct.clone();
            w.smart_automorph(pk, zm.gen_power(i, k as i64 - ord as i64))?;
            self.mul_by_mask(&mut w, &mask.iter().map(|b| !b).collect::<Vec<_>>())?;
            Some(w)
        } else {
            None
        };
        let mut moved = ct.clone();
        moved.smart_automorph(pk, zm.gen_power(i, k as i64))?;
        self.mul_by_mask(&mut moved, &mask)?;
        if let Some(w) = wrapped {
            moved.add(&w)?;
        }
        *ct = moved;
        Ok(())
    }

    /// Shift the ciphertext slots to the right by k (to the left if k is
    /// negative) along the linear order of the slots, filling with zeros.
    pub fn shift(&self, ct: &mut Ciphertext, pk: &PublicKey, k: i64) -> Result<()> {
        self.ctx().check_same(ct.ctx())?;
        let n = self.size() as i64;
        if k == 0 || ct.is_empty() {
            return Ok(());
        }
        let mask = self.slots_where(|s| (0..n).contains(&(s as i64 + k)));
        let mut shifted = ct.clone();
        self.mul_by_mask(&mut shifted, &mask)?;
        if k.abs() < n {
            self.rotate(&mut shifted, pk, k)?;
        }
        *ct = shifted;
        Ok(())
    }

    /// Shift the ciphertext slots to the right by k (to the left if k is
    /// negative) along the dimension i, filling with zeros.
    pub fn shift_1d(&self, ct: &mut Ciphertext, pk: &PublicKey, i: usize, k: i64) -> Result<()> {
        self.ctx().check_same(ct.ctx())?;
        self.check_dimension(i)?;
        if k == 0 || ct.is_empty() {
            return Ok(());
        }
        let zm = self.ctx().zm().clone();
        let ord = zm.order_of(i) as i64;
        let mask = self.slots_where(|s| (0..ord).contains(&(zm.coordinate(i, s) as i64 + k)));
        let mut shifted = ct.clone();
        self.mul_by_mask(&mut shifted, &mask)?;
        if k.abs() < ord {
            // No slot wraps around, so a single automorphism suffices.
            shifted.smart_automorph(pk, zm.gen_power(i, k))?;
        }
        *ct = shifted;
        Ok(())
    }

    /// Returns the coefficients of the linearized polynomial mapping X^i to
    /// `images[i]` in every slot; see [`ExactArray::build_lin_poly_coeffs`].
    pub fn build_lin_poly_coeffs(&self, images: &[ZpPoly]) -> Result<Vec<ZpPoly>> {
        self.exact_or("build_lin_poly_coeffs")?
            .build_lin_poly_coeffs(images)
    }

    /// Apply the linearized polynomial Σ_j C_j σ^j(x) to every slot, using
    /// the Frobenius automorphisms σ^j: X -> X^{p^j}.
    pub fn apply_lin_poly(
        &self,
        ct: &mut Ciphertext,
        pk: &PublicKey,
        coeffs: &[ZpPoly],
    ) -> Result<()> {
        let ea = self.exact_or("apply_lin_poly")?;
        self.ctx().check_same(ct.ctx())?;
        if coeffs.len() > ea.degree() {
            return Err(Error::TooManyValues(coeffs.len(), ea.degree()));
        }
        let zm = self.ctx().zm().clone();
        let mut result = Ciphertext::new(ct.ctx());
        for (j, c) in coeffs.iter().enumerate().filter(|(_, c)| !c.is_zero()) {
            let mut x = ct.clone();
            x.smart_automorph(pk, zm.pow(zm.frobenius(), j as u64))?;
            x.mul_by_constant(&ea.encode_ring_elements(&vec![c.clone(); self.size()])?)?;
            result.add(&x)?;
        }
        if result.is_empty() {
            ct.mul_by_constant(&[0])?;
        } else {
            *ct = result;
        }
        Ok(())
    }

    fn check_len(&self, len: usize) -> Result<()> {
        match len.cmp(&self.size()) {
            std::cmp::Ordering::Less => Err(Error::TooFewValues(len, self.size())),
            std::cmp::Ordering::Greater => Err(Error::TooManyValues(len, self.size())),
            std::cmp::Ordering::Equal => Ok(()),
        }
    }

    /// Rotate plaintext slot values to the right by k.
    pub fn rotate_slots<T: Clone>(&self, values: &[T], k: i64) -> Result<Vec<T>> {
        self.check_len(values.len())?;
        let n = values.len();
        let k = k.rem_euclid(n as i64) as usize;
        Ok((0..n).map(|j| values[(j + n - k) % n].clone()).collect())
    }

    /// Shift plaintext slot values to the right by k, filling with zeros.
    pub fn shift_slots<T: Clone + Default>(&self, values: &[T], k: i64) -> Result<Vec<T>> {
        self.check_len(values.len())?;
        let n = values.len() as i64;
        Ok((0..n)
            .map(|j| match j - k {
                s if (0..n).contains(&s) => values[s as usize].clone(),
                _ => T::default(),
            })
            .collect())
    }

    /// Rotate plaintext slot values to the right by k along the dimension i.
    pub fn rotate_1d_slots<T: Clone>(&self, values: &[T], i: usize, k: i64) -> Result<Vec<T>> {
        self.check_len(values.len())?;
        self.check_dimension(i)?;
        Ok((0..values.len())
            .map(|j| values[self.add_coord(i, j, -k)].clone())
            .collect())
    }

    /// Shift plaintext slot values to the right by k along the dimension i,
    /// filling with zeros.
    pub fn shift_1d_slots<T: Clone + Default>(
        &self,
        values: &[T],
        i: usize,
        k: i64,
    ) -> Result<Vec<T>> {
        self.check_len(values.len())?;
        self.check_dimension(i)?;
        let ord = self.size_of_dimension(i) as i64;
        Ok((0..values.len())
            .map(|j| {
                if (0..ord).contains(&(self.coordinate(i, j) as i64 - k)) {
                    values[self.add_coord(i, j, -k)].clone()
                } else {
                    T::default()
                }
            })
            .collect())
    }
}

fn slot_bound(values: &[Complex64]) -> f64 {
    let bound = values.iter().map(|z| z.norm()).fold(0.0, f64::max);
    if bound > 0.0 {
        bound
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::{EncryptedArray, Slots};
    use crate::keys::SecretKey;
    use crate::{ContextBuilder, Error as RlweError, Scheme};
    use num_complex::Complex64;
    use rand::thread_rng;
    use std::error::Error;

    #[test]
    fn hypercube() -> Result<(), Box<dyn Error>> {
        let ctx = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[30])
            .build_arc()?;
        let ea = EncryptedArray::new(&ctx)?;
        assert!(ea.exact().is_some());
        assert!(ea.complex().is_none());
        assert_eq!(ea.size(), 8);
        assert_eq!(ea.dimension(), 2);
        assert_eq!(ea.size_of_dimension(0), 4);
        assert_eq!(ea.size_of_dimension(1), 2);
        assert!(ea.native_dimension(0) && ea.native_dimension(1));
        assert_eq!(ea.coordinate(0, 5), 2);
        assert_eq!(ea.coordinate(1, 5), 1);
        assert_eq!(ea.add_coord(0, 5, 3), 3);
        assert_eq!(ea.add_coord(1, 5, 1), 4);
        Ok(())
    }

    #[test]
    fn plaintext_moves() -> Result<(), Box<dyn Error>> {
        let ctx = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[30])
            .build_arc()?;
        let ea = EncryptedArray::new(&ctx)?;
        let v: Vec<i64> = (1..=8).collect();
        assert_eq!(ea.rotate_slots(&v, 1)?, vec![8, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(ea.rotate_slots(&v, -9)?, vec![2, 3, 4, 5, 6, 7, 8, 1]);
        assert_eq!(ea.shift_slots(&v, 1)?, vec![0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(ea.shift_slots(&v, -3)?, vec![4, 5, 6, 7, 8, 0, 0, 0]);
        assert_eq!(ea.shift_slots(&v, 8)?, vec![0; 8]);
        // Dimension 0 has stride 2, dimension 1 has stride 1.
        assert_eq!(ea.rotate_1d_slots(&v, 0, 1)?, vec![7, 8, 1, 2, 3, 4, 5, 6]);
        assert_eq!(ea.rotate_1d_slots(&v, 1, 1)?, vec![2, 1, 4, 3, 6, 5, 8, 7]);
        assert_eq!(ea.shift_1d_slots(&v, 0, 1)?, vec![0, 0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(ea.shift_1d_slots(&v, 1, -1)?, vec![2, 0, 4, 0, 6, 0, 8, 0]);
        assert_eq!(ea.rotate_slots(&v[..7], 1), Err(RlweError::TooFewValues(7, 8)));
        assert!(ea.rotate_1d_slots(&v, 2, 1).is_err());
        Ok(())
    }

    #[test]
    fn wrong_variant() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = ContextBuilder::new()
            .set_scheme(Scheme::Ckks)
            .set_m(16)
            .set_ciphertext_moduli_sizes(&[40, 40])
            .build_arc()?;
        let sk = SecretKey::generate(&ctx, 4, 0, 1, &mut rng)?;
        let ea = EncryptedArray::new(&ctx)?;
        assert!(matches!(
            ea.encrypt_integers(sk.public_key(), &[1], &mut rng),
            Err(RlweError::UnsupportedOperation { .. })
        ));
        assert!(ea.build_lin_poly_coeffs(&[]).is_err());
        assert!(ea
            .encrypt(sk.public_key(), &Slots::RingElements(vec![]), &mut rng)
            .is_err());

        let values = [Complex64::new(0.5, 0.5), Complex64::new(-1.0, 0.0)];
        let ct = ea.encrypt(sk.public_key(), &Slots::Complex(values.to_vec()), &mut rng)?;
        let Slots::Complex(decrypted) = ea.decrypt_slots(&sk, &ct)? else {
            panic!("complex slots expected")
        };
        assert!((decrypted[0] - values[0]).norm() < 1e-3);
        assert!((decrypted[1] - values[1]).norm() < 1e-3);
        assert!(decrypted[2..].iter().all(|z| z.norm() < 1e-3));
        Ok(())
    }
}
