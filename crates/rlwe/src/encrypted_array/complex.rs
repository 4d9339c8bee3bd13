//! Slots of the approximate scheme: complex numbers.

use crate::{Context, Error, Result, Scheme};
use ndarray::Array2;
use num_bigint::BigInt;
use num_complex::Complex64;
use num_traits::{ToPrimitive, Zero};
use rand::{CryptoRng, Rng, RngCore};
use std::f64::consts::PI;
use std::sync::{Arc, OnceLock};

/// An encrypted array with φ(m)/2 complex slots.
///
/// The slot with hypercube coordinates e holds the evaluation of the
/// plaintext at ζ^{t^{-1}}, with ζ = exp(2iπ/m) and t the representative of
/// the slot in Z_m^* / <-1>, divided by the scaling factor.
#[derive(Debug)]
pub struct ComplexArray {
    ctx: Arc<Context>,
    // Exponents of the evaluation points: the slot roots, then their conjugates.
    roots: Vec<u64>,
    inverse: OnceLock<Array2<Complex64>>,
}

impl ComplexArray {
    /// Creates the complex encrypted array of a CKKS context.
    pub fn new(ctx: &Arc<Context>) -> Result<Self> {
        if ctx.scheme() != Scheme::Ckks {
            return Err(Error::UnsupportedOperation {
                operation: "ComplexArray".to_string(),
                scheme: ctx.scheme().to_string(),
            });
        }
        let zm = ctx.zm();
        let n = zm.num_slots();
        let mut roots = (0..n).map(|k| zm.inverse(zm.rep(k))).collect::<Vec<_>>();
        let conjugates = roots.iter().map(|u| zm.m() - u).collect::<Vec<_>>();
        roots.extend(conjugates);
        Ok(Self {
            ctx: ctx.clone(),
            roots,
            inverse: OnceLock::new(),
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

    /// The factor by which the slots are scaled during encoding.
    pub fn scaling_factor(&self) -> f64 {
        self.ctx.scaling_factor()
    }

    fn zeta(&self, e: u64) -> Complex64 {
        let m = self.ctx.m();
        Complex64::from_polar(1.0, 2.0 * PI * ((e % m) as f64) / (m as f64))
    }

    // Inverse of the Vandermonde matrix V[k][j] = ζ^{roots[k] j}.
    fn inverse(&self) -> Result<&Array2<Complex64>> {
        if let Some(inv) = self.inverse.get() {
            return Ok(inv);
        }
        let phi = self.roots.len();
        let v = Array2::from_shape_fn((phi, phi), |(k, j)| {
            self.zeta(self.roots[k] * j as u64)
        });
        let inv = if self.ctx.zm().is_pow2() {
            // The rows are orthogonal, with squared norm φ(m).
            v.t().mapv(|c| c.conj() / phi as f64)
        } else {
            invert(v)?
        };
        Ok(self.inverse.get_or_init(|| inv))
    }

    /// Encode complex values as the coefficients of a plaintext polynomial
    /// scaled by `factor` and rounded. Missing slots are zero.
    pub fn encode_complex_with_factor(&self, values: &[Complex64], factor: f64) -> Result<Vec<i64>> {
        let n = self.size();
        if values.len() > n {
            return Err(Error::TooManyValues(values.len(), n));
        }
        let mut z = vec![Complex64::zero(); 2 * n];
        for (k, v) in values.iter().enumerate() {
            z[k] = *v;
            z[n + k] = v.conj();
        }
        let inv = self.inverse()?;
        inv.rows()
            .into_iter()
            .map(|row| {
                let a = row.iter().zip(&z).map(|(r, zi)| r * zi).sum::<Complex64>();
                let c = (a.re * factor).round();
                if c.is_finite() && c.abs() < i64::MAX as f64 {
                    Ok(c as i64)
                } else {
                    Err(Error::UnspecifiedInput(format!(
                        "Encoding overflow: {} scaled by {}",
                        a.re, factor
                    )))
                }
            })
            .collect()
    }

    /// Encode complex values with the scaling factor of the context.
    pub fn encode_complex(&self, values: &[Complex64]) -> Result<Vec<i64>> {
        self.encode_complex_with_factor(values, self.scaling_factor())
    }

    /// Encode real values with the scaling factor of the context.
    pub fn encode_reals(&self, values: &[f64]) -> Result<Vec<i64>> {
        let values = values.iter().map(|v| Complex64::new(*v, 0.0)).collect::<Vec<_>>();
        self.encode_complex(&values)
    }

    /// Decode the slots of a plaintext polynomial scaled by `factor`.
    pub fn decode_complex(&self, coefficients: &[BigInt], factor: f64) -> Result<Vec<Complex64>> {
        if coefficients.len() > self.ctx.degree() {
            return Err(Error::TooManyValues(coefficients.len(), self.ctx.degree()));
        }
        if factor.is_nan() || factor <= 0.0 {
            return Err(Error::UnspecifiedInput(format!("Invalid scaling factor {factor}")));
        }
        let coefficients = coefficients
            .iter()
            .map(|c| c.to_f64().unwrap_or(f64::NAN) / factor)
            .collect::<Vec<_>>();
        Ok(self.roots[..self.size()]
            .iter()
            .map(|u| {
                coefficients
                    .iter()
                    .enumerate()
                    .map(|(j, c)| self.zeta(u * j as u64) * *c)
                    .sum::<Complex64>()
            })
            .collect())
    }

    /// Decode the real parts of the slots of a plaintext polynomial scaled by
    /// `factor`.
    pub fn decode_reals(&self, coefficients: &[BigInt], factor: f64) -> Result<Vec<f64>> {
        Ok(self
            .decode_complex(coefficients, factor)?
            .iter()
            .map(|z| z.re)
            .collect())
    }

    /// The plaintext with 1 in slot i and 0 elsewhere.
    pub fn encode_unit_selector(&self, i: usize) -> Result<Vec<i64>> {
        if i >= self.size() {
            return Err(Error::TooManyValues(i + 1, self.size()));
        }
        let mut values = vec![0.0; self.size()];
        values[i] = 1.0;
        self.encode_reals(&values)
    }

    /// Random slot values with real and imaginary parts in [-1, 1].
    pub fn random<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Vec<Complex64> {
        (0..self.size())
            .map(|_| Complex64::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0)))
            .collect()
    }
}

// Gauss-Jordan elimination with partial pivoting.
fn invert(mut a: Array2<Complex64>) -> Result<Array2<Complex64>> {
    let n = a.nrows();
    let mut inv = Array2::<Complex64>::eye(n);
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|x, y| a[[*x, col]].norm().total_cmp(&a[[*y, col]].norm()))
            .filter(|r| a[[*r, col]].norm() > 1e-12)
            .ok_or_else(|| Error::DefaultError("Singular Vandermonde matrix".to_string()))?;
        if pivot != col {
            for j in 0..n {
                a.swap([col, j], [pivot, j]);
                inv.swap([col, j], [pivot, j]);
            }
        }
        let scale = a[[col, col]].inv();
        a.row_mut(col).mapv_inplace(|c| c * scale);
        inv.row_mut(col).mapv_inplace(|c| c * scale);
        for r in (0..n).filter(|r| *r != col) {
            let f = a[[r, col]];
            if f.is_zero() {
                continue;
            }
            for j in 0..n {
                let (ac, ic) = (a[[col, j]], inv[[col, j]]);
                a[[r, j]] -= f * ac;
                inv[[r, j]] -= f * ic;
            }
        }
    }
    Ok(inv)
}

#[cfg(test)]
mod tests {
    use super::ComplexArray;
    use crate::{ContextBuilder, Scheme};
    use num_bigint::BigInt;
    use num_complex::Complex64;
    use rand::thread_rng;
    use std::error::Error;

    fn bigints(v: &[i64]) -> Vec<BigInt> {
        v.iter().map(|c| BigInt::from(*c)).collect()
    }

    #[test]
    fn encode_decode() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        for m in [16, 32, 15, 21] {
            let ctx = ContextBuilder::new()
                .set_scheme(Scheme::Ckks)
                .set_m(m)
                .set_ciphertext_moduli_sizes(&[40])
                .build_arc()?;
            let ea = ComplexArray::new(&ctx)?;
            assert_eq!(2 * ea.size(), ctx.degree());

            let values = ea.random(&mut rng);
            let encoded = ea.encode_complex(&values)?;
            assert_eq!(encoded.len(), ctx.degree());
            let decoded = ea.decode_complex(&bigints(&encoded), ea.scaling_factor())?;
            for (a, b) in values.iter().zip(&decoded) {
                assert!((a - b).norm() < 1e-6, "{a} != {b}");
            }
        }
        Ok(())
    }

    #[test]
    fn constants() -> Result<(), Box<dyn Error>> {
        let ctx = ContextBuilder::new()
            .set_scheme(Scheme::Ckks)
            .set_m(32)
            .set_ciphertext_moduli_sizes(&[40])
            .build_arc()?;
        let ea = ComplexArray::new(&ctx)?;
        let f = ea.scaling_factor() as i64;

        // A constant vector encodes a constant polynomial.
        let encoded = ea.encode_reals(&[2.0; 8])?;
        assert_eq!(encoded[0], 2 * f);
        assert!(encoded[1..].iter().all(|c| *c == 0));

        let decoded = ea.decode_reals(&bigints(&ea.encode_unit_selector(3)?), f as f64)?;
        for (i, v) in decoded.iter().enumerate() {
            let expected = if i == 3 { 1.0 } else { 0.0 };
            assert!((v - expected).abs() < 1e-6);
        }

        let values = [Complex64::new(0.5, -0.25)];
        let decoded = ea.decode_complex(&bigints(&ea.encode_complex(&values)?), f as f64)?;
        assert!((decoded[0] - values[0]).norm() < 1e-6);
        assert!(decoded[1..].iter().all(|z| z.norm() < 1e-6));

        assert!(ea.encode_reals(&[0.0; 9]).is_err());
        assert!(ea.decode_complex(&bigints(&[1]), 0.0).is_err());
        Ok(())
    }

    #[test]
    fn unsupported() -> Result<(), Box<dyn Error>> {
        let ctx = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[30])
            .build_arc()?;
        assert!(ComplexArray::new(&ctx).is_err());
        Ok(())
    }
}
