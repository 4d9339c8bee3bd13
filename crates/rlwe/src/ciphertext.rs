//! Ciphertexts for the BGV and CKKS encryption schemes.

use crate::keys::{KeyHandle, PublicKey};
use crate::{Context, Error, Result, Scheme};
use itertools::izip;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::FromPrimitive;
use rlwe_math::rq::{Poly, PrimeSet, Representation};
use std::sync::Arc;

/// A part of a ciphertext: a ring element and the handle of the key it
/// multiplies during decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiphertextPart {
    pub(crate) poly: Poly,
    pub(crate) handle: KeyHandle,
}

impl CiphertextPart {
    /// The ring element, in evaluation representation.
    pub const fn poly(&self) -> &Poly {
        &self.poly
    }

    /// The key handle of the part.
    pub const fn handle(&self) -> &KeyHandle {
        &self.handle
    }
}

/// A ciphertext, decrypting to sum_i c_i * key(handle_i).
///
/// All the parts are defined over the same prime set. BGV ciphertexts
/// encrypt plaintexts modulo `ptxt_space`, while CKKS ciphertexts encrypt
/// plaintexts scaled by `rat_factor`.
#[derive(Debug, Clone)]
pub struct Ciphertext {
    pub(crate) ctx: Arc<Context>,
    pub(crate) parts: Vec<CiphertextPart>,
    pub(crate) prime_set: PrimeSet,
    pub(crate) ptxt_space: u64,
    pub(crate) noise_var: f64,
    pub(crate) rat_factor: f64,
}

impl PartialEq for Ciphertext {
    fn eq(&self, other: &Self) -> bool {
        self.ctx.check_same(&other.ctx).is_ok()
            && self.parts == other.parts
            && self.prime_set == other.prime_set
            && self.ptxt_space == other.ptxt_space
            && self.noise_var == other.noise_var
            && self.rat_factor == other.rat_factor
    }
}

impl Ciphertext {
    /// Creates an empty ciphertext, which encrypts 0 with no noise.
    pub fn new(ctx: &Arc<Context>) -> Self {
        Self {
            ctx: ctx.clone(),
            parts: vec![],
            prime_set: ctx.ctxt_primes().clone(),
            ptxt_space: ctx.ptxt_space(),
            noise_var: 0.0,
            rat_factor: 1.0,
        }
    }

    /// The context of the ciphertext.
    pub fn ctx(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// The parts of the ciphertext.
    pub fn parts(&self) -> &[CiphertextPart] {
        &self.parts
    }

    /// The primes over which the parts are defined.
    pub const fn prime_set(&self) -> &PrimeSet {
        &self.prime_set
    }

    /// The plaintext space; it is 1 for CKKS.
    pub const fn ptxt_space(&self) -> u64 {
        self.ptxt_space
    }

    /// Estimate of the variance of the noise in the canonical embedding.
    pub const fn noise_var(&self) -> f64 {
        self.noise_var
    }

    /// The scaling factor of a CKKS plaintext.
    pub const fn rat_factor(&self) -> f64 {
        self.rat_factor
    }

    /// Returns whether the ciphertext has no parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The id of the secret key of the first part that is not 1, or 0.
    pub fn key_id(&self) -> usize {
        self.parts
            .iter()
            .find(|part| !part.handle.is_one())
            .map_or(0, |part| part.handle.secret_key_id())
    }

    /// Returns whether the ciphertext only has parts relative to 1 and to the
    /// secret key `key_id`.
    pub fn in_canonical_form(&self, key_id: usize) -> bool {
        self.parts
            .iter()
            .all(|part| part.handle.is_one() || part.handle.is_base(key_id))
    }

    /// Add `poly` to the part with handle `handle`, creating the part if
    /// needed.
    pub(crate) fn add_part(&mut self, poly: Poly, handle: KeyHandle) {
        add_part(&mut self.parts, poly, handle)
    }

    /// Apply the automorphism X -> X^k to the ciphertext. The parts are
    /// then relative to the automorphism of their keys.
    pub fn automorph(&mut self, k: u64) -> Result<()> {
        let zm = self.ctx.zm();
        let k = k % zm.m();
        if !zm.in_zm_star(k) {
            return Err(Error::MathError(rlwe_math::Error::NotInvertible(k, zm.m())));
        }
        if k == 1 {
            return Ok(());
        }
        for part in self.parts.iter_mut() {
            part.poly = part.poly.automorph(k)?;
            part.handle = part.handle.automorph(k, zm.m());
        }
        Ok(())
    }

    /// Switch every part not relative to 1 or to the secret key `key_id` to
    /// that secret key.
    ///
    /// The parts are raised to the special primes, multiplied by their
    /// product P, key switched digit by digit, and divided by P again with a
    /// rounding that preserves the plaintext modulo the plaintext space.
    /// On error, the ciphertext is left unchanged.
    pub fn relinearize(&mut self, pk: &PublicKey, key_id: usize) -> Result<()> {
        self.ctx.check_same(pk.ctx())?;
        if self.in_canonical_form(key_id) {
            return Ok(());
        }
        if &self.prime_set != self.ctx.ctxt_primes() {
            return Err(Error::MathError(rlwe_math::Error::PrimeSetMismatch {
                found: self.prime_set.to_vec(),
                expected: self.ctx.ctxt_primes().to_vec(),
            }));
        }
        let ctx = self.ctx.clone();
        let ring = ctx.ring();
        let all = ctx.all_primes();
        let special = ctx.special_primes();
        let p = ctx.special_modulus()?;
        let log_p = ring.log_modulus(special)?;
        let phi = ctx.degree() as f64;

        let mut parts = vec![];
        let mut key_switch_noise = 0f64;
        for part in &self.parts {
            let mut poly = part.poly.clone();
            if part.handle.is_one() || part.handle.is_base(key_id) {
                poly.add_primes(&all)?;
                poly *= &p;
                add_part(&mut parts, poly, part.handle);
                continue;
            }

            let matrix = pk.get_key_switch_matrix(&part.handle, key_id);
            if matrix.is_dummy() {
                return Err(Error::MissingKeySwitchPath {
                    handle: part.handle.to_string(),
                    to: key_id,
                });
            }
            if matrix.ptxt_space % self.ptxt_space != 0 {
                return Err(Error::PlaintextSpaceMismatch {
                    requested: self.ptxt_space,
                    native: matrix.ptxt_space,
                });
            }

            let digits = poly.decompose(ctx.digits(), &all)?;
            let mut c0 = Poly::zero(ring, &all, Representation::Evaluation);
            let mut c1 = Poly::zero(ring, &all, Representation::Evaluation);
            for (d, b, a, digit) in izip!(&digits, &matrix.b, matrix.a(&ctx), ctx.digits()) {
                c0 += &(d * b);
                c1 += &(d * &a);
                // Each digit is uniform in (-D/2, D/2], of variance D^2 / 12.
                key_switch_noise +=
                    (2.0 * ring.log_modulus(digit)? - 2.0 * log_p).exp() / 12.0
                        * phi
                        * matrix.noise_var;
            }
            add_part(&mut parts, c0, KeyHandle::one());
            add_part(&mut parts, c1, KeyHandle::base(matrix.to_key_id));
        }

        for part in parts.iter_mut() {
            part.poly.mod_down(special, self.ptxt_space)?;
        }
        self.parts = parts;

        let t = self.ptxt_space as f64;
        let key_size = pk.sk_sizes().get(key_id).copied().unwrap_or(0) as f64;
        let rounding_noise = t * t * phi / 12.0 * (1.0 + key_size);
        self.noise_var += key_switch_noise + rounding_noise;
        Ok(())
    }

    /// Apply the automorphism X -> X^k and switch the ciphertext back to its
    /// secret key, following the key-switching graph of the public key.
    ///
    /// The ciphertext is left unchanged when a key switch fails.
    pub fn smart_automorph(&mut self, pk: &PublicKey, k: u64) -> Result<()> {
        let mut ct = self.clone();
        ct.smart_automorph_in_place(pk, k)?;
        *self = ct;
        Ok(())
    }

    fn smart_automorph_in_place(&mut self, pk: &PublicKey, k: u64) -> Result<()> {
        self.ctx.check_same(pk.ctx())?;
        let zm = self.ctx.zm().clone();
        let mut k = k % zm.m();
        if !zm.in_zm_star(k) {
            return Err(Error::MathError(rlwe_math::Error::NotInvertible(k, zm.m())));
        }
        if k == 1 {
            return Ok(());
        }
        let key_id = self.key_id();

        if !pk.is_reachable(k, key_id) {
            let handle = KeyHandle::new(1, k, key_id);
            if !pk.have_key_switch_matrix(&handle, key_id) {
                return Err(Error::MissingKeySwitchPath {
                    handle: handle.to_string(),
                    to: key_id,
                });
            }
            self.relinearize(pk, key_id)?;
            self.automorph(k)?;
            return self.relinearize(pk, key_id);
        }

        self.relinearize(pk, key_id)?;
        while k != 1 {
            let amount = pk.get_next_key_switch_matrix(k, key_id)?.from_key.power_of_x();
            self.automorph(amount)?;
            self.relinearize(pk, key_id)?;
            k = zm.mul(k, zm.inverse(amount));
        }
        Ok(())
    }

    fn check_compatible(&self, other: &Ciphertext) -> Result<()> {
        self.ctx.check_same(&other.ctx)?;
        if self.prime_set != other.prime_set {
            return Err(Error::MathError(rlwe_math::Error::PrimeSetMismatch {
                found: other.prime_set.to_vec(),
                expected: self.prime_set.to_vec(),
            }));
        }
        Ok(())
    }

    fn add_or_sub(&mut self, other: &Ciphertext, negative: bool) -> Result<()> {
        self.ctx.check_same(&other.ctx)?;
        if other.is_empty() {
            return Ok(());
        }
        if self.is_empty() {
            let noise_var = self.noise_var;
            *self = other.clone();
            if negative {
                self.negate();
            }
            self.noise_var += noise_var;
            return Ok(());
        }
        self.check_compatible(other)?;

        match self.ctx.scheme() {
            Scheme::Bgv => {
                let t = self.ptxt_space.gcd(&other.ptxt_space);
                if t <= 1 {
                    return Err(Error::PlaintextSpaceMismatch {
                        requested: other.ptxt_space,
                        native: self.ptxt_space,
                    });
                }
                self.ptxt_space = t;
            }
            Scheme::Ckks => {
                if (self.rat_factor - other.rat_factor).abs() > 1e-9 * self.rat_factor.abs() {
                    return Err(Error::UnspecifiedInput(format!(
                        "Mismatched scaling factors {} and {}",
                        self.rat_factor, other.rat_factor
                    )));
                }
            }
        }

        for part in &other.parts {
            let poly = if negative {
                -&part.poly
            } else {
                part.poly.clone()
            };
            self.add_part(poly, part.handle);
        }
        self.noise_var += other.noise_var;
        Ok(())
    }

    /// Add another ciphertext.
    pub fn add(&mut self, other: &Ciphertext) -> Result<()> {
        self.add_or_sub(other, false)
    }

    /// Subtract another ciphertext.
    pub fn sub(&mut self, other: &Ciphertext) -> Result<()> {
        self.add_or_sub(other, true)
    }

    /// Negate the ciphertext.
    pub fn negate(&mut self) {
        for part in self.parts.iter_mut() {
            part.poly = -&part.poly;
        }
    }

    fn constant_poly(&self, coefficients: &[BigInt]) -> Result<Poly> {
        Ok(Poly::from_bigints(
            self.ctx.ring(),
            &self.prime_set,
            coefficients,
            Representation::Evaluation,
        )?)
    }

    /// Multiply by the plaintext polynomial with the specified coefficients.
    ///
    /// For BGV, the coefficients are reduced modulo the plaintext space. For
    /// CKKS, the scaling factor of the ciphertext is unchanged.
    pub fn mul_by_constant(&mut self, coefficients: &[i64]) -> Result<()> {
        let coefficients = match self.ctx.scheme() {
            Scheme::Bgv => centered_mod(coefficients, self.ptxt_space),
            Scheme::Ckks => coefficients.iter().map(|c| BigInt::from(*c)).collect(),
        };
        self.mul_by_poly(&coefficients)
    }

    /// Multiply a CKKS ciphertext by a plaintext polynomial encoded with the
    /// scaling factor `factor`.
    pub fn mul_by_scaled_constant(&mut self, coefficients: &[i64], factor: f64) -> Result<()> {
        if self.ctx.scheme() != Scheme::Ckks {
            return Err(Error::UnsupportedOperation {
                operation: "mul_by_scaled_constant".to_string(),
                scheme: self.ctx.scheme().to_string(),
            });
        }
        let coefficients = coefficients.iter().map(|c| BigInt::from(*c)).collect::<Vec<_>>();
        self.mul_by_poly(&coefficients)?;
        self.rat_factor *= factor;
        Ok(())
    }

    fn mul_by_poly(&mut self, coefficients: &[BigInt]) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let c = self.constant_poly(coefficients)?;
        for part in self.parts.iter_mut() {
            part.poly *= &c;
        }
        // The canonical embedding of c is bounded by its l1 norm.
        let size: f64 = coefficients
            .iter()
            .map(|ci| ci.magnitude().bits() as f64)
            .map(|bits| 2f64.powf(bits))
            .sum();
        self.noise_var *= size * size;
        Ok(())
    }

    /// Add the plaintext polynomial with the specified coefficients.
    ///
    /// For BGV, the coefficients are reduced modulo the plaintext space and
    /// multiplied by the modulus modulo the plaintext space, as during
    /// encryption. For CKKS, they are scaled by the factor of the ciphertext.
    pub fn add_constant(&mut self, coefficients: &[i64]) -> Result<()> {
        match self.ctx.scheme() {
            Scheme::Bgv => {
                let phi = self.ctx.degree() as f64;
                self.add_bgv_plaintext(coefficients)?;
                self.noise_var += phi * (self.ptxt_space as f64 / 2.0).powi(2);
                Ok(())
            }
            Scheme::Ckks => {
                let scaled = coefficients
                    .iter()
                    .map(|c| {
                        BigInt::from_f64((*c as f64 * self.rat_factor).round()).ok_or_else(|| {
                            Error::UnspecifiedInput(format!("Cannot scale the coefficient {c}"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let size: f64 = coefficients.iter().map(|c| (*c as f64).abs()).sum();
                self.noise_var += (size * self.rat_factor).powi(2);
                self.add_plaintext(&scaled)
            }
        }
    }

    /// Add the plaintext multiplied by Q mod t to the part relative to 1,
    /// where Q is the modulus of the ciphertext and t its plaintext space.
    pub(crate) fn add_bgv_plaintext(&mut self, coefficients: &[i64]) -> Result<()> {
        let t = self.ptxt_space;
        let q_mod_t = self.ctx.modulus_mod(&self.prime_set, t)? as i128;
        let scaled = coefficients
            .iter()
            .map(|c| ((*c as i128).rem_euclid(t as i128) * q_mod_t % t as i128) as i64)
            .collect::<Vec<_>>();
        self.add_plaintext(&centered_mod(&scaled, t))
    }

    /// Add the plaintext as is to the part relative to 1.
    pub(crate) fn add_plaintext(&mut self, coefficients: &[BigInt]) -> Result<()> {
        if coefficients.len() > self.ctx.degree() {
            return Err(Error::TooManyValues(coefficients.len(), self.ctx.degree()));
        }
        let c = self.constant_poly(coefficients)?;
        self.add_part(c, KeyHandle::one());
        Ok(())
    }
}

/// Add `poly` to the part with handle `handle`, creating the part if needed.
pub(crate) fn add_part(parts: &mut Vec<CiphertextPart>, mut poly: Poly, handle: KeyHandle) {
    poly.change_representation(Representation::Evaluation);
    if let Some(part) = parts.iter_mut().find(|part| part.handle == handle) {
        part.poly += &poly;
    } else if handle.is_one() {
        parts.insert(0, CiphertextPart { poly, handle });
    } else {
        parts.push(CiphertextPart { poly, handle });
    }
}

/// Representatives in (-t/2, t/2] of the coefficients modulo t.
fn centered_mod(coefficients: &[i64], t: u64) -> Vec<BigInt> {
    coefficients
        .iter()
        .map(|c| {
            let r = (*c as i128).rem_euclid(t as i128);
            if r > (t / 2) as i128 {
                BigInt::from(r - t as i128)
            } else {
                BigInt::from(r)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{centered_mod, Ciphertext};
    use crate::keys::{KeyHandle, SecretKey};
    use crate::{ContextBuilder, Error as RlweError, Scheme};
    use num_bigint::BigInt;
    use proptest::prelude::any;
    use rand::{thread_rng, Rng};
    use std::error::Error;

    fn to_bigints(v: &[i64]) -> Vec<BigInt> {
        v.iter().map(|c| BigInt::from(*c)).collect()
    }

    #[test]
    fn centered() {
        assert_eq!(centered_mod(&[0, 8, 9, -1, 34], 17), to_bigints(&[0, 8, -8, -1, 0]));
        assert_eq!(centered_mod(&[3, -3], 2), to_bigints(&[1, 1]));
    }

    proptest! {
        #[test]
        fn centered_representatives(c in any::<i64>(), t in 2u64..1 << 40) {
            let r = &centered_mod(&[c], t)[0];
            let t_big = BigInt::from(t);
            prop_assert!(BigInt::from(2) * r <= t_big);
            prop_assert!(BigInt::from(-2) * r < t_big);
            prop_assert_eq!((BigInt::from(c) - r) % &t_big, BigInt::from(0));
        }
    }

    #[test]
    fn add_sub_constants() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[40, 40])
            .build_arc()?;
        let sk = SecretKey::generate(&ctx, 4, 0, 1, &mut rng)?;
        let pk = sk.public_key();

        let a: Vec<i64> = (0..8).map(|_| rng.gen_range(0..17)).collect();
        let b: Vec<i64> = (0..8).map(|_| rng.gen_range(0..17)).collect();
        let ca = pk.encrypt(&a, &mut rng)?;
        let cb = pk.encrypt(&b, &mut rng)?;

        let mut sum = ca.clone();
        sum.add(&cb)?;
        let expected: Vec<i64> = a.iter().zip(&b).map(|(x, y)| (x + y) % 17).collect();
        assert_eq!(sk.decrypt(&sum)?, to_bigints(&expected));

        let mut diff = ca.clone();
        diff.sub(&cb)?;
        let expected: Vec<i64> = a.iter().zip(&b).map(|(x, y)| (x - y).rem_euclid(17)).collect();
        assert_eq!(sk.decrypt(&diff)?, to_bigints(&expected));

        let mut neg = ca.clone();
        neg.negate();
        let expected: Vec<i64> = a.iter().map(|x| (-x).rem_euclid(17)).collect();
        assert_eq!(sk.decrypt(&neg)?, to_bigints(&expected));

        let mut shifted = ca.clone();
        shifted.add_constant(&b)?;
        let expected: Vec<i64> = a.iter().zip(&b).map(|(x, y)| (x + y) % 17).collect();
        assert_eq!(sk.decrypt(&shifted)?, to_bigints(&expected));

        // Multiplication by the constant 3 + X.
        let mut product = ca.clone();
        product.mul_by_constant(&[3, 1])?;
        let mut expected = vec![0i64; 8];
        for i in 0..8 {
            expected[i] += 3 * a[i];
            if i + 1 < 8 {
                expected[i + 1] += a[i];
            } else {
                // X^8 = -1.
                expected[0] -= a[i];
            }
        }
        let expected: Vec<i64> = expected.iter().map(|x| x.rem_euclid(17)).collect();
        assert_eq!(sk.decrypt(&product)?, to_bigints(&expected));

        // Adding to an empty ciphertext.
        let mut empty = Ciphertext::new(&ctx);
        assert!(empty.is_empty());
        empty.add(&ca)?;
        assert_eq!(empty, ca);
        Ok(())
    }

    #[test]
    fn automorph_then_relinearize() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[40, 40])
            .build_arc()?;
        let mut sk = SecretKey::generate(&ctx, 4, 0, 1, &mut rng)?;
        sk.gen_key_switch_matrix(1, 3, 0, 0, 0, &mut rng)?;

        // X -> X^3 maps X to X^3.
        let mut ct = sk.public_key().encrypt(&[0, 1], &mut rng)?;
        ct.automorph(3)?;
        assert_eq!(ct.parts()[1].handle(), &KeyHandle::new(1, 3, 0));
        assert!(!ct.in_canonical_form(0));
        let expected = to_bigints(&[0, 0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(sk.decrypt(&ct)?, expected);

        ct.relinearize(sk.public_key(), 0)?;
        assert!(ct.in_canonical_form(0));
        assert_eq!(ct.parts().len(), 2);
        assert_eq!(ct.prime_set(), ctx.ctxt_primes());
        assert_eq!(sk.decrypt(&ct)?, expected);

        // No matrix for X -> X^5: the ciphertext is kept as is.
        ct.automorph(5)?;
        let before = ct.clone();
        assert!(matches!(
            ct.relinearize(sk.public_key(), 0),
            Err(RlweError::MissingKeySwitchPath { .. })
        ));
        assert_eq!(ct, before);
        assert_eq!(sk.decrypt(&ct)?, to_bigints(&[0, 0, 0, 0, 0, 0, 0, 1]));
        assert!(ct.automorph(2).is_err());
        Ok(())
    }

    #[test]
    fn failed_smart_automorph() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[40, 40])
            .build_arc()?;
        let mut sk = SecretKey::generate(&ctx, 4, 0, 1, &mut rng)?;
        sk.gen_key_switch_matrix(1, 3, 0, 0, 0, &mut rng)?;

        let values: Vec<i64> = (0..8).map(|_| rng.gen_range(0..17)).collect();
        let ct = sk.public_key().encrypt(&values, &mut rng)?;
        let mut c = ct.clone();
        assert!(matches!(
            c.smart_automorph(sk.public_key(), 5),
            Err(RlweError::MissingKeySwitchPath { .. })
        ));
        assert_eq!(c, ct);
        assert_eq!(sk.decrypt(&c)?, to_bigints(&values));
        Ok(())
    }

    #[test]
    fn switch_between_keys() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[40, 40])
            .build_arc()?;
        let mut sk = SecretKey::generate(&ctx, 4, 0, 1, &mut rng)?;
        let second = sk.gen_sec_key(4, 0, 1, &mut rng)?;
        assert_eq!(second, 1);
        // s_0(X^3) -> s_1.
        sk.gen_key_switch_matrix(1, 3, 0, second, 0, &mut rng)?;
        let pk = sk.public_key();

        let values: Vec<i64> = (0..8).map(|_| rng.gen_range(0..17)).collect();
        let ct = pk.encrypt(&values, &mut rng)?;
        let mut expected = ct.clone();
        expected.automorph(3)?;

        let mut switched = ct.clone();
        switched.automorph(3)?;
        switched.relinearize(pk, second)?;
        assert!(switched.in_canonical_form(second));
        assert!(!switched.in_canonical_form(0));
        assert_eq!(switched.key_id(), second);
        assert_eq!(sk.decrypt(&switched)?, sk.decrypt(&expected)?);

        // There is no matrix from s_0(X^3) back to s_0.
        let mut other = ct.clone();
        other.automorph(3)?;
        assert!(other.relinearize(pk, 0).is_err());
        Ok(())
    }

    #[test]
    fn smart_automorph() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[40, 40])
            .build_arc()?;
        let mut sk = SecretKey::generate(&ctx, 4, 0, 1, &mut rng)?;
        sk.gen_key_switch_matrix(1, 3, 0, 0, 0, &mut rng)?;

        let values: Vec<i64> = (0..8).map(|_| rng.gen_range(0..17)).collect();
        let ct = sk.public_key().encrypt(&values, &mut rng)?;
        // 3 generates {1, 3, 9, 11}.
        for k in [9u64, 11, 3] {
            let mut c = ct.clone();
            c.smart_automorph(sk.public_key(), k)?;
            assert!(c.in_canonical_form(0));
            let mut expected = ct.clone();
            expected.automorph(k)?;
            assert_eq!(sk.decrypt(&c)?, sk.decrypt(&expected)?);
        }
        let mut c = ct.clone();
        assert!(matches!(
            c.smart_automorph(sk.public_key(), 5),
            Err(RlweError::MissingKeySwitchPath { .. })
        ));
        Ok(())
    }

    #[test]
    fn mismatches() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[40, 40])
            .build_arc()?;
        let other = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[30, 30])
            .build_arc()?;
        let sk = SecretKey::generate(&ctx, 4, 0, 1, &mut rng)?;
        let sk_other = SecretKey::generate(&other, 4, 0, 1, &mut rng)?;
        let mut ct = sk.public_key().encrypt(&[1], &mut rng)?;
        let ct_other = sk_other.public_key().encrypt(&[1], &mut rng)?;
        assert_eq!(ct.add(&ct_other), Err(RlweError::ContextMismatch));
        assert!(sk.decrypt(&ct_other).is_err());

        let ckks = ContextBuilder::new()
            .set_m(16)
            .set_scheme(Scheme::Ckks)
            .set_ciphertext_moduli_sizes(&[40, 40])
            .build_arc()?;
        let sk_ckks = SecretKey::generate(&ckks, 4, 0, 1, &mut rng)?;
        let mut c = sk_ckks.public_key().encrypt(&[1 << 20], &mut rng)?;
        assert!(matches!(
            ct.mul_by_scaled_constant(&[1], 2.0),
            Err(RlweError::UnsupportedOperation { .. })
        ));
        let mut d = c.clone();
        d.mul_by_scaled_constant(&[1 << 10], 1024.0)?;
        assert_eq!(d.rat_factor(), c.rat_factor() * 1024.0);
        assert!(c.add(&d).is_err());
        Ok(())
    }
}
