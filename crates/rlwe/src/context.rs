//! Create contexts for the BGV and CKKS encryption schemes

use crate::{Error, ParametersError, Result};
use itertools::Itertools;
use rlwe_math::{
    rns::product_mod,
    rq::{self, PrimeSet},
    zm::ZmStar,
    zq::primes::generate_prime,
};
use std::fmt::{Debug, Display};
use std::sync::Arc;

/// The encryption scheme of a context.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// The exact scheme, with plaintexts modulo p^r.
    #[default]
    Bgv,
    /// The approximate scheme, with plaintexts scaled by a rational factor.
    Ckks,
}

impl Scheme {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Scheme::Bgv => 0,
            Scheme::Ckks => 1,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Scheme::Bgv),
            1 => Ok(Scheme::Ckks),
            _ => Err(Error::SerializationError(format!("Unknown scheme {v}"))),
        }
    }
}

impl Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scheme::Bgv => write!(f, "BGV"),
            Scheme::Ckks => write!(f, "CKKS"),
        }
    }
}

/// Parameters of the bootstrapping procedure that the keys must support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapParameters {
    /// The bootstrapping plaintext space is p^(e + r).
    pub e: usize,
    /// Hamming weight of the bootstrapping secret key.
    pub sk_hwt: usize,
}

/// Context for the BGV and CKKS encryption schemes.
///
/// The context holds the cyclotomic ring Z\[X\]/Phi_m(X), the chain of
/// ciphertext primes, the special primes used during key switching and their
/// digit decomposition, as well as the parameters of the plaintext space.
#[derive(PartialEq)]
pub struct Context {
    scheme: Scheme,
    m: u64,
    p: u64,
    r: usize,
    pub(crate) ring: Arc<rq::Context>,
    ctxt_primes: PrimeSet,
    special_primes: PrimeSet,
    digits: Vec<PrimeSet>,
    stdev: f64,
    bootstrap: Option<BootstrapParameters>,
    scaling_factor: f64,
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("scheme", &self.scheme)
            .field("m", &self.m)
            .field("p", &self.p)
            .field("r", &self.r)
            .field("moduli", &self.ring.moduli())
            .field("digits", &self.digits)
            .finish()
    }
}

impl Context {
    /// The encryption scheme.
    pub const fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// The cyclotomic index m.
    pub const fn m(&self) -> u64 {
        self.m
    }

    /// The plaintext prime p; it is 0 for the CKKS scheme.
    pub const fn p(&self) -> u64 {
        self.p
    }

    /// The exponent r of the plaintext space p^r for BGV, and the number of
    /// bits of precision for CKKS.
    pub const fn r(&self) -> usize {
        self.r
    }

    /// The degree phi(m) of the ring.
    pub fn degree(&self) -> usize {
        self.ring.degree()
    }

    /// The group Z_m^* and its hypercube structure.
    pub fn zm(&self) -> &Arc<ZmStar> {
        self.ring.zm()
    }

    /// The ring context over all the primes.
    pub fn ring(&self) -> &Arc<rq::Context> {
        &self.ring
    }

    /// The primes of a fresh ciphertext.
    pub fn ctxt_primes(&self) -> &PrimeSet {
        &self.ctxt_primes
    }

    /// The special primes added during key switching.
    pub fn special_primes(&self) -> &PrimeSet {
        &self.special_primes
    }

    /// The union of the ciphertext primes and the special primes.
    pub fn all_primes(&self) -> PrimeSet {
        self.ctxt_primes.union(&self.special_primes)
    }

    /// The digits of the key-switching decomposition, a partition of the
    /// ciphertext primes.
    pub fn digits(&self) -> &[PrimeSet] {
        &self.digits
    }

    /// Standard deviation of the error distribution.
    pub const fn stdev(&self) -> f64 {
        self.stdev
    }

    /// Bootstrapping parameters, if the context is bootstrappable.
    pub const fn bootstrap(&self) -> Option<BootstrapParameters> {
        self.bootstrap
    }

    /// Returns whether the context supports bootstrapping keys.
    pub const fn is_bootstrappable(&self) -> bool {
        self.bootstrap.is_some()
    }

    /// The native plaintext space: p^r for BGV and 1 for CKKS.
    pub fn ptxt_space(&self) -> u64 {
        match self.scheme {
            Scheme::Bgv => self.p.pow(self.r as u32),
            Scheme::Ckks => 1,
        }
    }

    /// The plaintext space p^(e + r) of the bootstrapping key.
    pub fn bootstrap_ptxt_space(&self) -> Option<u64> {
        self.bootstrap
            .map(|b| self.p.pow((b.e + self.r) as u32))
            .filter(|_| self.scheme == Scheme::Bgv)
    }

    /// The factor by which CKKS plaintexts are scaled during encoding.
    pub const fn scaling_factor(&self) -> f64 {
        self.scaling_factor
    }

    /// The CKKS precision 2^r.
    pub fn precision(&self) -> f64 {
        2f64.powi(self.r as i32)
    }

    /// Natural logarithm of the product of the ciphertext primes.
    pub fn log_q(&self) -> f64 {
        self.ring.log_modulus(&self.ctxt_primes).unwrap_or(0.0)
    }

    /// Product of the primes of the set modulo t.
    pub fn modulus_mod(&self, set: &PrimeSet, t: u64) -> Result<u64> {
        Ok(product_mod(&self.ring.moduli_of(set)?, t))
    }

    /// Product P of the special primes, as a big integer.
    pub(crate) fn special_modulus(&self) -> Result<num_bigint::BigUint> {
        Ok(self.ring.modulus(&self.special_primes)?)
    }

    pub(crate) fn check_same(&self, other: &Context) -> Result<()> {
        if std::ptr::eq(self, other) || self == other {
            Ok(())
        } else {
            Err(Error::ContextMismatch)
        }
    }
}

/// Builder for contexts of the BGV and CKKS encryption schemes.
#[derive(Debug)]
pub struct ContextBuilder {
    scheme: Scheme,
    m: u64,
    p: u64,
    r: usize,
    precision: usize,
    ciphertext_moduli: Vec<u64>,
    ciphertext_moduli_sizes: Vec<usize>,
    special_moduli_sizes: Vec<usize>,
    digits: usize,
    stdev: f64,
    bootstrap: Option<BootstrapParameters>,
    scaling_factor: Option<f64>,
}

impl ContextBuilder {
    /// Creates a new instance of the builder
    #[allow(clippy::new_without_default)]
    #[must_use]
    pub fn new() -> Self {
        Self {
            scheme: Scheme::Bgv,
            m: 0,
            p: 0,
            r: 1,
            precision: 10,
            ciphertext_moduli: vec![],
            ciphertext_moduli_sizes: vec![],
            special_moduli_sizes: vec![],
            digits: 0,
            stdev: 3.2,
            bootstrap: None,
            scaling_factor: None,
        }
    }

    /// Sets the encryption scheme.
    pub fn set_scheme(&mut self, scheme: Scheme) -> &mut Self {
        self.scheme = scheme;
        self
    }

    /// Sets the cyclotomic index m.
    pub fn set_m(&mut self, m: u64) -> &mut Self {
        self.m = m;
        self
    }

    /// Sets the plaintext prime p; ignored for CKKS.
    pub fn set_p(&mut self, p: u64) -> &mut Self {
        self.p = p;
        self
    }

    /// Sets the exponent r of the plaintext space p^r; ignored for CKKS.
    pub fn set_r(&mut self, r: usize) -> &mut Self {
        self.r = r;
        self
    }

    /// Sets the number of bits of precision; ignored for BGV.
    pub fn set_precision(&mut self, bits: usize) -> &mut Self {
        self.precision = bits;
        self
    }

    /// Sets the sizes of the ciphertext moduli.
    /// Only one of `set_ciphertext_moduli_sizes` and `set_ciphertext_moduli`
    /// can be specified.
    pub fn set_ciphertext_moduli_sizes(&mut self, sizes: &[usize]) -> &mut Self {
        sizes.clone_into(&mut self.ciphertext_moduli_sizes);
        self
    }

    /// Sets the ciphertext moduli to use.
    /// Only one of `set_ciphertext_moduli_sizes` and `set_ciphertext_moduli`
    /// can be specified.
    pub fn set_ciphertext_moduli(&mut self, moduli: &[u64]) -> &mut Self {
        moduli.clone_into(&mut self.ciphertext_moduli);
        self
    }

    /// Sets the sizes of the special moduli. By default, the special moduli
    /// are chosen so that their product exceeds every digit by 4 bits.
    pub fn set_special_moduli_sizes(&mut self, sizes: &[usize]) -> &mut Self {
        sizes.clone_into(&mut self.special_moduli_sizes);
        self
    }

    /// Sets the number of digits of the key-switching decomposition. By
    /// default, each ciphertext prime is a digit.
    pub fn set_digits(&mut self, digits: usize) -> &mut Self {
        self.digits = digits;
        self
    }

    /// Sets the standard deviation of the error distribution.
    pub fn set_stdev(&mut self, stdev: f64) -> &mut Self {
        self.stdev = stdev;
        self
    }

    /// Makes the context bootstrappable with plaintext space p^(e + r) for the
    /// bootstrapping key, a secret of Hamming weight `sk_hwt`.
    pub fn set_bootstrap(&mut self, e: usize, sk_hwt: usize) -> &mut Self {
        self.bootstrap = Some(BootstrapParameters { e, sk_hwt });
        self
    }

    /// Sets the CKKS encoding scaling factor. By default, it is 2^30.
    pub fn set_encoding_scaling_factor(&mut self, factor: f64) -> &mut Self {
        self.scaling_factor = Some(factor);
        self
    }

    /// Generate moduli congruent to 1 modulo m with the specified sizes,
    /// distinct from the moduli in `existing`.
    fn generate_moduli(sizes: &[usize], m: u64, existing: &[u64]) -> Result<Vec<u64>> {
        let mut moduli: Vec<u64> = vec![];
        for size in sizes {
            if *size > 62 || *size < 10 {
                return Err(Error::ParametersError(ParametersError::InvalidModulusSize(
                    *size, 10, 62,
                )));
            }

            let mut upper_bound = 1 << size;
            loop {
                if let Some(prime) = generate_prime(*size, m, upper_bound) {
                    if !moduli.contains(&prime) && !existing.contains(&prime) {
                        moduli.push(prime);
                        break;
                    } else {
                        upper_bound = prime;
                    }
                } else {
                    return Err(Error::ParametersError(ParametersError::NotEnoughPrimes(
                        *size, m,
                    )));
                }
            }
        }

        Ok(moduli)
    }

    /// Split the indices 0..n into `count` contiguous groups of almost equal
    /// sizes.
    fn split_digits(n: usize, count: usize) -> Vec<PrimeSet> {
        let base = n / count;
        let extra = n % count;
        let mut start = 0;
        (0..count)
            .map(|i| {
                let len = base + usize::from(i < extra);
                let set = PrimeSet::range(start, start + len);
                start += len;
                set
            })
            .collect()
    }

    /// Build a new `Context` inside an `Arc`.
    pub fn build_arc(&self) -> Result<Arc<Context>> {
        self.build().map(Arc::new)
    }

    /// Build a new `Context`.
    pub fn build(&self) -> Result<Context> {
        if self.m < 3 || self.m > (1 << 20) {
            return Err(Error::ParametersError(
                ParametersError::InvalidCyclotomicIndex(self.m),
            ));
        }
        if !self.stdev.is_finite() || self.stdev <= 0.0 {
            return Err(Error::ParametersError(ParametersError::InvalidPlaintext(
                format!("Invalid standard deviation {}", self.stdev),
            )));
        }

        let (p, r, frobenius) = match self.scheme {
            Scheme::Bgv => {
                if !rlwe_util::is_prime(self.p) || self.m % self.p == 0 {
                    return Err(Error::ParametersError(ParametersError::InvalidPlaintext(
                        format!(
                            "The plaintext modulus {} should be a prime not dividing m = {}",
                            self.p, self.m
                        ),
                    )));
                }
                let e = self.bootstrap.map_or(0, |b| b.e);
                let fits = u32::try_from(self.r + e)
                    .ok()
                    .and_then(|exponent| self.p.checked_pow(exponent))
                    .map_or(false, |q| q < (1 << 62));
                if self.r == 0 || !fits {
                    return Err(Error::ParametersError(ParametersError::InvalidPlaintext(
                        format!("Invalid plaintext space {}^{}", self.p, self.r + e),
                    )));
                }
                (self.p, self.r, self.p % self.m)
            }
            Scheme::Ckks => {
                if self.bootstrap.is_some() {
                    return Err(Error::ParametersError(ParametersError::TooManySpecified(
                        "Bootstrapping keys are only supported by the BGV scheme".to_string(),
                    )));
                }
                if self.precision == 0 || self.precision > 52 {
                    return Err(Error::ParametersError(ParametersError::InvalidPlaintext(
                        format!("Invalid precision of {} bits", self.precision),
                    )));
                }
                (0, self.precision, self.m - 1)
            }
        };

        let zm = Arc::new(ZmStar::new(self.m, frobenius)?);
        if let Some(b) = self.bootstrap {
            if b.e == 0 || b.sk_hwt == 0 || b.sk_hwt > zm.phi_m() {
                return Err(Error::ParametersError(ParametersError::InvalidPlaintext(
                    format!(
                        "Invalid bootstrapping parameters e = {}, hwt = {}",
                        b.e, b.sk_hwt
                    ),
                )));
            }
        }

        // Get or generate the ciphertext moduli
        if !self.ciphertext_moduli.is_empty() && !self.ciphertext_moduli_sizes.is_empty() {
            return Err(Error::ParametersError(ParametersError::TooManySpecified(
                "Only one of `ciphertext_moduli` and `ciphertext_moduli_sizes` can be specified"
                    .to_string(),
            )));
        } else if self.ciphertext_moduli.is_empty() && self.ciphertext_moduli_sizes.is_empty() {
            return Err(Error::ParametersError(ParametersError::TooFewSpecified(
                "One of `ciphertext_moduli` and `ciphertext_moduli_sizes` must be specified"
                    .to_string(),
            )));
        }
        let ctxt_moduli = if self.ciphertext_moduli.is_empty() {
            Self::generate_moduli(&self.ciphertext_moduli_sizes, self.m, &[])?
        } else {
            self.ciphertext_moduli.clone()
        };

        let num_digits = if self.digits == 0 {
            ctxt_moduli.len()
        } else {
            self.digits
        };
        if num_digits > ctxt_moduli.len() {
            return Err(Error::ParametersError(ParametersError::TooManySpecified(
                format!(
                    "{num_digits} digits for {} ciphertext moduli",
                    ctxt_moduli.len()
                ),
            )));
        }
        let digits = Self::split_digits(ctxt_moduli.len(), num_digits);

        let special_sizes = if self.special_moduli_sizes.is_empty() {
            let digit_bits = digits
                .iter()
                .map(|d| {
                    d.iter()
                        .map(|i| 64 - ctxt_moduli[i].leading_zeros() as usize)
                        .sum::<usize>()
                })
                .max()
                .unwrap_or(0)
                + 4;
            let count = digit_bits.div_ceil(60);
            vec![digit_bits.div_ceil(count).clamp(10, 62); count]
        } else {
            self.special_moduli_sizes.clone()
        };
        let special_moduli = Self::generate_moduli(&special_sizes, self.m, &ctxt_moduli)?;

        let moduli = ctxt_moduli
            .iter()
            .chain(special_moduli.iter())
            .copied()
            .collect_vec();
        let ring = rq::Context::new_arc(&moduli, zm)?;

        Ok(Context {
            scheme: self.scheme,
            m: self.m,
            p,
            r,
            ring,
            ctxt_primes: PrimeSet::range(0, ctxt_moduli.len()),
            special_primes: PrimeSet::range(ctxt_moduli.len(), moduli.len()),
            digits,
            stdev: self.stdev,
            bootstrap: self.bootstrap,
            scaling_factor: self.scaling_factor.unwrap_or((1u64 << 30) as f64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ContextBuilder, Scheme};
    use rlwe_math::rq::PrimeSet;
    use std::error::Error;

    #[test]
    fn default_bgv() -> Result<(), Box<dyn Error>> {
        let ctx = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[40, 40, 40])
            .build()?;
        assert_eq!(ctx.scheme(), Scheme::Bgv);
        assert_eq!(ctx.degree(), 8);
        assert_eq!(ctx.ptxt_space(), 17);
        assert_eq!(ctx.ctxt_primes(), &PrimeSet::range(0, 3));
        assert_eq!(ctx.digits().len(), 3);
        assert!(!ctx.special_primes().is_empty());
        assert!(ctx.special_primes().is_disjoint(ctx.ctxt_primes()));
        assert_eq!(ctx.all_primes().len(), ctx.ring().moduli().len());
        assert!(ctx.ring().moduli().iter().all(|q| q % 16 == 1));
        assert_eq!(ctx.stdev(), 3.2);
        assert!(!ctx.is_bootstrappable());
        assert_eq!(ctx.bootstrap_ptxt_space(), None);
        assert_eq!(ctx.zm().gens(), &[3, 7]);
        Ok(())
    }

    #[test]
    fn digits() -> Result<(), Box<dyn Error>> {
        let ctx = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[30, 30, 30, 30, 30])
            .set_digits(2)
            .build()?;
        assert_eq!(
            ctx.digits(),
            &[PrimeSet::range(0, 3), PrimeSet::range(3, 5)]
        );
        // The special primes exceed the largest digit.
        let p_bits: f64 = ctx.ring().log_modulus(ctx.special_primes())?;
        let d_bits: f64 = ctx.ring().log_modulus(&ctx.digits()[0])?;
        assert!(p_bits > d_bits);

        assert!(ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[30, 30])
            .set_digits(3)
            .build()
            .is_err());
        Ok(())
    }

    #[test]
    fn plaintext_spaces() -> Result<(), Box<dyn Error>> {
        let ctx = ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_r(2)
            .set_bootstrap(2, 4)
            .set_ciphertext_moduli_sizes(&[40, 40])
            .build()?;
        assert_eq!(ctx.ptxt_space(), 289);
        assert_eq!(ctx.bootstrap_ptxt_space(), Some(17u64.pow(4)));

        let ckks = ContextBuilder::new()
            .set_m(32)
            .set_scheme(Scheme::Ckks)
            .set_precision(12)
            .set_ciphertext_moduli_sizes(&[60, 60])
            .build()?;
        assert_eq!(ckks.ptxt_space(), 1);
        assert_eq!(ckks.precision(), 4096.0);
        assert_eq!(ckks.zm().num_slots(), 8);
        assert_eq!(ckks.scaling_factor(), (1u64 << 30) as f64);
        Ok(())
    }

    #[test]
    fn invalid_parameters() {
        // p divides m.
        assert!(ContextBuilder::new()
            .set_m(16)
            .set_p(2)
            .set_ciphertext_moduli_sizes(&[40])
            .build()
            .is_err());
        // p is not prime.
        assert!(ContextBuilder::new()
            .set_m(16)
            .set_p(15)
            .set_ciphertext_moduli_sizes(&[40])
            .build()
            .is_err());
        // No moduli.
        assert!(ContextBuilder::new().set_m(16).set_p(17).build().is_err());
        // Both moduli and sizes.
        assert!(ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[40])
            .set_ciphertext_moduli(&[65537])
            .build()
            .is_err());
        // Invalid sizes.
        assert!(ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[63])
            .build()
            .is_err());
        // Plaintext space too large.
        assert!(ContextBuilder::new()
            .set_m(16)
            .set_p(17)
            .set_r(20)
            .set_ciphertext_moduli_sizes(&[40])
            .build()
            .is_err());
        // Bootstrapping for CKKS.
        assert!(ContextBuilder::new()
            .set_m(16)
            .set_scheme(Scheme::Ckks)
            .set_bootstrap(1, 4)
            .set_ciphertext_moduli_sizes(&[40])
            .build()
            .is_err());
        assert!(ContextBuilder::new()
            .set_m(2)
            .set_p(17)
            .set_ciphertext_moduli_sizes(&[40])
            .build()
            .is_err());
    }
}
