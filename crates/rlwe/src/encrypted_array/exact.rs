//! Slots of the exact scheme: elements of Z_{p^r}[X]/G(X).

use crate::{Context, Error, Result, Scheme};
use num_bigint::BigInt;
use rand::{CryptoRng, RngCore};
use rlwe_math::zq::factor::{equal_degree_factorization, hensel_lift, lift_inverse};
use rlwe_math::zq::poly::ZpPoly;
use rlwe_math::zq::{bigint_mod, Modulus};
use std::sync::{Arc, OnceLock};

/// An encrypted array over the plaintext algebra Z_{p^r}[X]/Φ_m(X), whose
/// slots are elements of the Galois ring Z_{p^r}[X]/G(X). G is the Hensel
/// lift of the first irreducible factor of Φ_m modulo p.
///
/// The slot with hypercube coordinates e holds a(X^{t^{-1}}) mod G, where
/// t = g_0^{e_0} ... g_{n-1}^{e_{n-1}} is the representative of the slot.
#[derive(Debug)]
pub struct ExactArray {
    ctx: Arc<Context>,
    p: Modulus,
    pr: Modulus,
    phim: ZpPoly,
    g: ZpPoly,
    crt: OnceLock<ZpPoly>,
    moore_inverse: OnceLock<Vec<Vec<ZpPoly>>>,
}

impl ExactArray {
    /// Creates the exact encrypted array of a BGV context.
    pub fn new(ctx: &Arc<Context>) -> Result<Self> {
        if ctx.scheme() != Scheme::Bgv {
            return Err(Error::UnsupportedOperation {
                operation: "ExactArray".to_string(),
                scheme: ctx.scheme().to_string(),
            });
        }
        let p = Modulus::new(ctx.p())?;
        let pr = Modulus::new(ctx.ptxt_space())?;
        let zm = ctx.zm();
        let factors = equal_degree_factorization(
            &ZpPoly::from_i64(zm.phim_x(), &p),
            zm.frobenius_order(),
            &p,
        )?;
        let g = factors
            .into_iter()
            .next()
            .ok_or_else(|| Error::DefaultError("Φ_m has no factor modulo p".to_string()))?;
        let phim = ZpPoly::from_i64(zm.phim_x(), &pr);
        let g = hensel_lift(&phim, &g, &p, &pr, ctx.r())?;
        log::debug!("Slot algebra Z_{}[X]/({})", *pr, g);
        Ok(Self {
            ctx: ctx.clone(),
            p,
            pr,
            phim,
            g,
            crt: OnceLock::new(),
            moore_inverse: OnceLock::new(),
        })
    }

    /// The context of the array.
    pub fn ctx(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// The number of slots.
    pub fn size(&self) -> usize {
        self.ctx.zm().num_slots()
    }

    /// The degree d of the slot ring over Z_{p^r}.
    pub fn degree(&self) -> usize {
        self.ctx.zm().frobenius_order()
    }

    /// The modulus p^r of the slot coefficients.
    pub fn modulus(&self) -> &Modulus {
        &self.pr
    }

    /// The factor G of Φ_m modulo p^r defining the slot ring.
    pub fn factor(&self) -> &ZpPoly {
        &self.g
    }

    // The idempotent c with c = 1 mod G and c = 0 mod Φ_m / G.
    fn crt(&self) -> Result<&ZpPoly> {
        if let Some(c) = self.crt.get() {
            return Ok(c);
        }
        let (h, r) = self.phim.div_rem(&self.g, &self.pr)?;
        debug_assert!(r.is_zero());
        let h_inv = self
            .unit_inverse(&h)?
            .ok_or_else(|| Error::DefaultError("Φ_m is not squarefree modulo p".to_string()))?;
        let c = h.mul(&h_inv, &self.pr).rem(&self.phim, &self.pr)?;
        Ok(self.crt.get_or_init(|| c))
    }

    // Inverse in the slot ring, when the element is a unit.
    fn unit_inverse(&self, a: &ZpPoly) -> Result<Option<ZpPoly>> {
        Ok(lift_inverse(a, &self.g, &self.p, &self.pr, self.ctx.r())?)
    }

    fn check_slot(&self, v: &ZpPoly) -> Result<()> {
        match v.degree() {
            Some(deg) if deg >= self.degree() => Err(Error::UnspecifiedInput(format!(
                "Slot element of degree {} exceeds the slot degree {}",
                deg,
                self.degree()
            ))),
            _ => Ok(()),
        }
    }

    /// Encode the slot values as the coefficients of a plaintext polynomial,
    /// in [0, p^r). Missing slots are zero.
    pub fn encode_ring_elements(&self, values: &[ZpPoly]) -> Result<Vec<i64>> {
        if values.len() > self.size() {
            return Err(Error::TooManyValues(values.len(), self.size()));
        }
        let zm = self.ctx.zm();
        let m = zm.m() as usize;
        let crt = self.crt()?;
        let mut a = ZpPoly::zero();
        for (k, v) in values.iter().enumerate() {
            self.check_slot(v)?;
            if v.is_zero() {
                continue;
            }
            let lifted = v.mul(crt, &self.pr).rem(&self.phim, &self.pr)?;
            let moved = lifted.substitute_cyclic(zm.rep(k) as usize, m, &self.pr);
            a = a.add(&moved, &self.pr);
        }
        let a = a.rem(&self.phim, &self.pr)?;
        Ok(a.to_vec(zm.phi_m()).into_iter().map(|c| c as i64).collect())
    }

    /// Decode the slot values of a plaintext polynomial.
    pub fn decode_ring_elements(&self, coefficients: &[BigInt]) -> Result<Vec<ZpPoly>> {
        let zm = self.ctx.zm();
        let m = zm.m() as usize;
        let coefficients = coefficients
            .iter()
            .map(|c| bigint_mod(c, *self.pr))
            .collect::<Vec<_>>();
        let a = ZpPoly::new(&coefficients, &self.pr).rem(&self.phim, &self.pr)?;
        (0..self.size())
            .map(|k| {
                let t_inv = zm.inverse(zm.rep(k)) as usize;
                Ok(a.substitute_cyclic(t_inv, m, &self.pr).rem(&self.g, &self.pr)?)
            })
            .collect()
    }

    /// Encode integers, reduced modulo p^r, as constant slots.
    pub fn encode_integers(&self, values: &[i64]) -> Result<Vec<i64>> {
        let slots = values
            .iter()
            .map(|v| ZpPoly::constant(self.pr.reduce_i64(*v), &self.pr))
            .collect::<Vec<_>>();
        self.encode_ring_elements(&slots)
    }

    /// Decode the constant terms of the slots, in [0, p^r).
    pub fn decode_integers(&self, coefficients: &[BigInt]) -> Result<Vec<i64>> {
        Ok(self
            .decode_ring_elements(coefficients)?
            .iter()
            .map(|v| v.coeff(0) as i64)
            .collect())
    }

    /// The plaintext with 1 in slot i and 0 elsewhere.
    pub fn encode_unit_selector(&self, i: usize) -> Result<Vec<i64>> {
        if i >= self.size() {
            return Err(Error::TooManyValues(i + 1, self.size()));
        }
        let mut values = vec![0; self.size()];
        values[i] = 1;
        self.encode_integers(&values)
    }

    /// Uniformly random slot values.
    pub fn random<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Vec<ZpPoly> {
        (0..self.size())
            .map(|_| ZpPoly::new(&self.pr.random_vec(self.degree(), rng), &self.pr))
            .collect()
    }

    // Inverse of the Moore matrix A[i][j] = X^{i p^j} mod G over the slot ring.
    fn moore_inverse(&self) -> Result<&Vec<Vec<ZpPoly>>> {
        if let Some(inv) = self.moore_inverse.get() {
            return Ok(inv);
        }
        let d = self.degree();
        let m = self.ctx.zm().m();
        let mut a = Vec::with_capacity(d);
        for i in 0..d as u64 {
            let mut row = Vec::with_capacity(d);
            // X^m = 1 modulo G, so the exponent is reduced modulo m.
            let mut e = i % m;
            for _ in 0..d {
                row.push(ZpPoly::monomial(e as usize).rem(&self.g, &self.pr)?);
                e = ((e as u128 * *self.p as u128) % m as u128) as u64;
            }
            a.push(row);
        }
        let inv = self.invert(a)?;
        Ok(self.moore_inverse.get_or_init(|| inv))
    }

    // Gauss-Jordan elimination over the slot ring, pivoting on units.
    fn invert(&self, mut a: Vec<Vec<ZpPoly>>) -> Result<Vec<Vec<ZpPoly>>> {
        let d = a.len();
        let mut inv = (0..d)
            .map(|i| {
                (0..d)
                    .map(|j| ZpPoly::constant((i == j) as u64, &self.pr))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        for col in 0..d {
            let mut pivot = None;
            for r in col..d {
                if let Some(scale) = self.unit_inverse(&a[r][col])? {
                    pivot = Some((r, scale));
                    break;
                }
            }
            let (pivot, scale) = pivot
                .ok_or_else(|| Error::DefaultError("Singular linear system".to_string()))?;
            a.swap(col, pivot);
            inv.swap(col, pivot);
            for j in 0..d {
                a[col][j] = a[col][j].mul_mod(&scale, &self.g, &self.pr)?;
                inv[col][j] = inv[col][j].mul_mod(&scale, &self.g, &self.pr)?;
            }
            for r in (0..d).filter(|r| *r != col) {
                if a[r][col].is_zero() {
                    continue;
                }
                let f = a[r][col].clone();
                for j in 0..d {
                    let t = f.mul_mod(&a[col][j], &self.g, &self.pr)?;
                    a[r][j] = a[r][j].sub(&t, &self.pr);
                    let t = f.mul_mod(&inv[col][j], &self.g, &self.pr)?;
                    inv[r][j] = inv[r][j].sub(&t, &self.pr);
                }
            }
        }
        Ok(inv)
    }

    /// Returns the coefficients C such that the Z_{p^r}-linear map
    /// L(x) = Σ_j C_j σ^j(x) of the slot ring sends X^i to `images[i]`, where
    /// σ is the Frobenius X -> X^p.
    pub fn build_lin_poly_coeffs(&self, images: &[ZpPoly]) -> Result<Vec<ZpPoly>> {
        let d = self.degree();
        if images.len() > d {
            return Err(Error::TooManyValues(images.len(), d));
        }
        if images.len() < d {
            return Err(Error::TooFewValues(images.len(), d));
        }
        images.iter().try_for_each(|v| self.check_slot(v))?;
        let inv = self.moore_inverse()?;
        inv.iter()
            .map(|row| {
                row.iter().zip(images).try_fold(ZpPoly::zero(), |acc, (a, b)| {
                    Ok(acc.add(&a.mul_mod(b, &self.g, &self.pr)?, &self.pr))
                })
            })
            .collect()
    }

    /// Evaluates Σ_j C_j σ^j(x) on a slot value.
    pub fn eval_lin_poly(&self, coeffs: &[ZpPoly], x: &ZpPoly) -> Result<ZpPoly> {
        let mut result = ZpPoly::zero();
        let mut image = x.rem(&self.g, &self.pr)?;
        for c in coeffs {
            result = result.add(&c.mul_mod(&image, &self.g, &self.pr)?, &self.pr);
            image = image.compose_monomial(*self.p as usize, &self.g, &self.pr)?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::ExactArray;
    use crate::{ContextBuilder, Error as RlweError};
    use num_bigint::BigInt;
    use rand::thread_rng;
    use rlwe_math::zq::poly::ZpPoly;
    use std::error::Error;

    fn bigints(v: &[i64]) -> Vec<BigInt> {
        v.iter().map(|c| BigInt::from(*c)).collect()
    }

    #[test]
    fn encode_decode() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        for (m, p, r) in [(16, 17, 1), (15, 2, 1), (17, 67, 1), (16, 17, 2), (15, 2, 3)] {
            let ctx = ContextBuilder::new()
                .set_m(m)
                .set_p(p)
                .set_r(r)
                .set_ciphertext_moduli_sizes(&[30])
                .build_arc()?;
            let ea = ExactArray::new(&ctx)?;
            assert_eq!(ea.size() * ea.degree(), ctx.degree());
            assert_eq!(ea.factor().degree(), Some(ea.degree()));
            assert_eq!(**ea.modulus(), ctx.ptxt_space());

            let values = ea.random(&mut rng);
            let encoded = ea.encode_ring_elements(&values)?;
            assert_eq!(encoded.len(), ctx.degree());
            assert_eq!(ea.decode_ring_elements(&bigints(&encoded))?, values);

            let ints = (0..ea.size() as i64).map(|i| 3 * i - 1).collect::<Vec<_>>();
            let decoded = ea.decode_integers(&bigints(&ea.encode_integers(&ints)?))?;
            let expected = ints
                .iter()
                .map(|v| v.rem_euclid(ctx.ptxt_space() as i64))
                .collect::<Vec<_>>();
            assert_eq!(decoded, expected);
        }
        Ok(())
    }

    #[test]
    fn unit_selector() -> Result<(), Box<dyn Error>> {
        let ctx = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[30])
            .build_arc()?;
        let ea = ExactArray::new(&ctx)?;
        // The all-ones vector encodes the constant polynomial 1.
        let ones = ea.encode_integers(&[1; 8])?;
        assert_eq!(ones[0], 1);
        assert!(ones[1..].iter().all(|c| *c == 0));

        for i in 0..8 {
            let sel = ea.encode_unit_selector(i)?;
            let decoded = ea.decode_integers(&bigints(&sel))?;
            assert_eq!(decoded.iter().sum::<i64>(), 1);
            assert_eq!(decoded[i], 1);
        }
        assert_eq!(
            ea.encode_unit_selector(8),
            Err(RlweError::TooManyValues(9, 8))
        );
        assert!(ea.encode_integers(&[0; 9]).is_err());
        Ok(())
    }

    #[test]
    fn lin_poly() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = ContextBuilder::new()
            .set_m(15)
            .set_p(2)
            .set_ciphertext_moduli_sizes(&[30])
            .build_arc()?;
        let ea = ExactArray::new(&ctx)?;
        assert_eq!(ea.degree(), 4);
        let p = ea.modulus().clone();

        // The Frobenius map x -> x^2.
        let images = (0..4)
            .map(|i| ZpPoly::monomial(2 * i).rem(ea.factor(), &p))
            .collect::<Result<Vec<_>, _>>()?;
        let coeffs = ea.build_lin_poly_coeffs(&images)?;
        assert_eq!(
            coeffs,
            vec![ZpPoly::zero(), ZpPoly::constant(1, &p), ZpPoly::zero(), ZpPoly::zero()]
        );

        // A random linear map is reproduced on random inputs.
        let images = ea.random(&mut rng);
        let images = images.iter().cycle().take(4).cloned().collect::<Vec<_>>();
        let coeffs = ea.build_lin_poly_coeffs(&images)?;
        for x in ea.random(&mut rng) {
            let expected = (0..4).fold(ZpPoly::zero(), |acc, i| {
                acc.add(&images[i].scalar_mul(x.coeff(i), &p), &p)
            });
            assert_eq!(ea.eval_lin_poly(&coeffs, &x)?, expected);
        }

        assert!(ea.build_lin_poly_coeffs(&images[..3]).is_err());
        let too_large = [ZpPoly::monomial(4), ZpPoly::zero(), ZpPoly::zero(), ZpPoly::zero()];
        assert!(ea.build_lin_poly_coeffs(&too_large).is_err());
        Ok(())
    }

    #[test]
    fn prime_power_slots() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = ContextBuilder::new()
            .set_m(15)
            .set_p(2)
            .set_r(3)
            .set_ciphertext_moduli_sizes(&[30])
            .build_arc()?;
        let ea = ExactArray::new(&ctx)?;
        let p = ea.modulus().clone();
        assert_eq!(*p, 8);

        // Slots multiply independently: the product of two encodings decodes
        // to the slot-wise products modulo G.
        let a = ea.random(&mut rng);
        let b = ea.random(&mut rng);
        let phim = ZpPoly::from_i64(ctx.zm().phim_x(), &p);
        let ea_a = ZpPoly::from_i64(&ea.encode_ring_elements(&a)?, &p);
        let ea_b = ZpPoly::from_i64(&ea.encode_ring_elements(&b)?, &p);
        let product = ea_a.mul_mod(&ea_b, &phim, &p)?.to_vec(ctx.degree());
        let product = product.iter().map(|c| BigInt::from(*c)).collect::<Vec<_>>();
        let expected = a
            .iter()
            .zip(&b)
            .map(|(x, y)| x.mul_mod(y, ea.factor(), &p))
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(ea.decode_ring_elements(&product)?, expected);

        // A linear map over Z_8 is reproduced, including one that does not
        // reduce to a unit map modulo 2.
        let images = (0..4)
            .map(|i| ZpPoly::monomial(i).scalar_mul(2, &p))
            .collect::<Vec<_>>();
        let coeffs = ea.build_lin_poly_coeffs(&images)?;
        for x in ea.random(&mut rng) {
            assert_eq!(ea.eval_lin_poly(&coeffs, &x)?, x.scalar_mul(2, &p));
        }
        let images = ea.random(&mut rng);
        let images = images.iter().cycle().take(4).cloned().collect::<Vec<_>>();
        let coeffs = ea.build_lin_poly_coeffs(&images)?;
        for x in ea.random(&mut rng) {
            let expected = (0..4).fold(ZpPoly::zero(), |acc, i| {
                acc.add(&images[i].scalar_mul(x.coeff(i), &p), &p)
            });
            assert_eq!(ea.eval_lin_poly(&coeffs, &x)?, expected);
        }
        Ok(())
    }
}
