//! Dense univariate polynomials over Z_p.
//!
//! The modulus is passed explicitly to every operation; a polynomial only
//! stores its normalized coefficients (no trailing zeros).

use super::Modulus;
use crate::{Error, Result};
use num_bigint::BigUint;
use std::fmt::{Display, Formatter};

/// A polynomial with coefficients in Z_p, lowest degree first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ZpPoly {
    coefficients: Vec<u64>,
}

impl Display for ZpPoly {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.coefficients)
    }
}

impl ZpPoly {
    /// Create a polynomial from coefficients, reducing them modulo p.
    pub fn new(coefficients: &[u64], p: &Modulus) -> Self {
        let mut out = Self {
            coefficients: coefficients.iter().map(|c| p.reduce(*c)).collect(),
        };
        out.normalize();
        out
    }

    /// Create a polynomial from signed coefficients, reducing them modulo p.
    pub fn from_i64(coefficients: &[i64], p: &Modulus) -> Self {
        let mut out = Self {
            coefficients: p.reduce_vec_i64(coefficients),
        };
        out.normalize();
        out
    }

    /// The zero polynomial.
    pub fn zero() -> Self {
        Self::default()
    }

    /// The constant polynomial c.
    pub fn constant(c: u64, p: &Modulus) -> Self {
        Self::new(&[c], p)
    }

    /// The monomial X^k.
    pub fn monomial(k: usize) -> Self {
        let mut coefficients = vec![0u64; k + 1];
        coefficients[k] = 1;
        Self { coefficients }
    }

    fn normalize(&mut self) {
        while self.coefficients.last() == Some(&0) {
            self.coefficients.pop();
        }
    }

    /// Returns whether the polynomial is zero.
    pub fn is_zero(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Degree of the polynomial, None for the zero polynomial.
    pub fn degree(&self) -> Option<usize> {
        self.coefficients.len().checked_sub(1)
    }

    /// Coefficient of X^i.
    pub fn coeff(&self, i: usize) -> u64 {
        self.coefficients.get(i).copied().unwrap_or(0)
    }

    /// Normalized coefficients, lowest degree first.
    pub fn coefficients(&self) -> &[u64] {
        &self.coefficients
    }

    /// Coefficients padded with zeros to `len`.
    pub fn to_vec(&self, len: usize) -> Vec<u64> {
        let mut v = self.coefficients.clone();
        v.resize(len.max(v.len()), 0);
        v
    }

    /// Leading coefficient (0 for the zero polynomial).
    pub fn leading(&self) -> u64 {
        self.coefficients.last().copied().unwrap_or(0)
    }

    /// Sum of two polynomials.
    pub fn add(&self, other: &Self, p: &Modulus) -> Self {
        let n = self.coefficients.len().max(other.coefficients.len());
        let coefficients = (0..n)
            .map(|i| p.add(self.coeff(i), other.coeff(i)))
            .collect();
        let mut out = Self { coefficients };
        out.normalize();
        out
    }

    /// Difference of two polynomials.
    pub fn sub(&self, other: &Self, p: &Modulus) -> Self {
        let n = self.coefficients.len().max(other.coefficients.len());
        let coefficients = (0..n)
            .map(|i| p.sub(self.coeff(i), other.coeff(i)))
            .collect();
        let mut out = Self { coefficients };
        out.normalize();
        out
    }

    /// Negation.
    pub fn neg(&self, p: &Modulus) -> Self {
        Self {
            coefficients: self.coefficients.iter().map(|c| p.neg(*c)).collect(),
        }
    }

    /// Multiplication by a scalar.
    pub fn scalar_mul(&self, c: u64, p: &Modulus) -> Self {
        let c = p.reduce(c);
        let mut out = Self {
            coefficients: self.coefficients.iter().map(|a| p.mul(*a, c)).collect(),
        };
        out.normalize();
        out
    }

    /// Product of two polynomials.
    pub fn mul(&self, other: &Self, p: &Modulus) -> Self {
        if self.is_zero() || other.is_zero() {
            return Self::zero();
        }
        let mut coefficients = vec![0u64; self.coefficients.len() + other.coefficients.len() - 1];
        for (i, a) in self.coefficients.iter().enumerate() {
            if *a == 0 {
                continue;
            }
            for (j, b) in other.coefficients.iter().enumerate() {
                coefficients[i + j] = p.add(coefficients[i + j], p.mul(*a, *b));
            }
        }
        let mut out = Self { coefficients };
        out.normalize();
        out
    }

    /// Euclidean division. Returns an error if the divisor is zero or if its
    /// leading coefficient is not invertible.
    pub fn div_rem(&self, divisor: &Self, p: &Modulus) -> Result<(Self, Self)> {
        let deg_d = divisor
            .degree()
            .ok_or_else(|| Error::Default("Division by the zero polynomial".to_string()))?;
        let lead_inv = p
            .inv(divisor.leading())
            .ok_or(Error::NotInvertible(divisor.leading(), **p))?;

        let mut r = self.coefficients.clone();
        if r.len() <= deg_d {
            return Ok((Self::zero(), self.clone()));
        }
        let mut q = vec![0u64; r.len() - deg_d];
        for k in (deg_d..r.len()).rev() {
            let c = p.mul(r[k], lead_inv);
            if c == 0 {
                continue;
            }
            q[k - deg_d] = c;
            for (j, dj) in divisor.coefficients.iter().enumerate() {
                let idx = k - deg_d + j;
                r[idx] = p.sub(r[idx], p.mul(c, *dj));
            }
        }
        r.truncate(deg_d);
        let mut quotient = Self { coefficients: q };
        let mut remainder = Self { coefficients: r };
        quotient.normalize();
        remainder.normalize();
        Ok((quotient, remainder))
    }

    /// Remainder modulo `f`.
    pub fn rem(&self, f: &Self, p: &Modulus) -> Result<Self> {
        Ok(self.div_rem(f, p)?.1)
    }

    /// Returns the monic polynomial with the same roots.
    pub fn make_monic(&self, p: &Modulus) -> Result<Self> {
        if self.is_zero() {
            return Ok(Self::zero());
        }
        let lead_inv = p
            .inv(self.leading())
            .ok_or(Error::NotInvertible(self.leading(), **p))?;
        Ok(self.scalar_mul(lead_inv, p))
    }

    /// Monic greatest common divisor.
    pub fn gcd(&self, other: &Self, p: &Modulus) -> Result<Self> {
        let mut a = self.clone();
        let mut b = other.clone();
        while !b.is_zero() {
            let r = a.rem(&b, p)?;
            a = b;
            b = r;
        }
        a.make_monic(p)
    }

    /// Product modulo `f`.
    pub fn mul_mod(&self, other: &Self, f: &Self, p: &Modulus) -> Result<Self> {
        self.mul(other, p).rem(f, p)
    }

    /// Exponentiation modulo `f`.
    pub fn pow_mod(&self, e: &BigUint, f: &Self, p: &Modulus) -> Result<Self> {
        let mut r = Self::constant(1, p).rem(f, p)?;
        let mut base = self.rem(f, p)?;
        for i in 0..e.bits() {
            if e.bit(i) {
                r = r.mul_mod(&base, f, p)?;
            }
            base = base.mul_mod(&base, f, p)?;
        }
        Ok(r)
    }

    /// Inverse modulo `f`, if it exists.
    pub fn inv_mod(&self, f: &Self, p: &Modulus) -> Result<Option<Self>> {
        // Extended Euclid on (self mod f, f), tracking the coefficient of self.
        let mut r0 = f.clone();
        let mut r1 = self.rem(f, p)?;
        let mut s0 = Self::zero();
        let mut s1 = Self::constant(1, p);
        while !r1.is_zero() {
            let (q, r) = r0.div_rem(&r1, p)?;
            let s = s0.sub(&q.mul(&s1, p), p);
            r0 = r1;
            r1 = r;
            s0 = s1;
            s1 = s;
        }
        if r0.degree() != Some(0) {
            return Ok(None);
        }
        let c = p
            .inv(r0.leading())
            .ok_or(Error::NotInvertible(r0.leading(), **p))?;
        Ok(Some(s0.scalar_mul(c, p).rem(f, p)?))
    }

    /// Returns `self(X^k) mod f`.
    pub fn compose_monomial(&self, k: usize, f: &Self, p: &Modulus) -> Result<Self> {
        let xk = Self::monomial(k).rem(f, p)?;
        let mut power = Self::constant(1, p);
        let mut out = Self::zero();
        for c in &self.coefficients {
            if *c != 0 {
                out = out.add(&power.scalar_mul(*c, p), p);
            }
            power = power.mul_mod(&xk, f, p)?;
        }
        out.rem(f, p)
    }

    /// Returns `self(X^k) mod (X^m - 1)`, that is the coefficient of X^i is
    /// moved to X^{ik mod m}.
    pub fn substitute_cyclic(&self, k: usize, m: usize, p: &Modulus) -> Self {
        let mut coefficients = vec![0u64; m];
        for (i, c) in self.coefficients.iter().enumerate() {
            let j = (i * k) % m;
            coefficients[j] = p.add(coefficients[j], *c);
        }
        let mut out = Self { coefficients };
        out.normalize();
        out
    }

    /// Evaluation at x.
    pub fn evaluate(&self, x: u64, p: &Modulus) -> u64 {
        let x = p.reduce(x);
        self.coefficients
            .iter()
            .rev()
            .fold(0, |acc, c| p.add(p.mul(acc, x), *c))
    }
}

#[cfg(test)]
mod tests {
    use super::ZpPoly;
    use crate::zq::Modulus;
    use num_bigint::BigUint;
    use rand::{thread_rng, Rng};
    use std::error::Error;

    fn random_poly(deg: usize, p: &Modulus) -> ZpPoly {
        let mut rng = thread_rng();
        let c: Vec<u64> = (0..=deg).map(|_| rng.gen_range(0..**p)).collect();
        ZpPoly::new(&c, p)
    }

    #[test]
    fn normalization() -> Result<(), Box<dyn Error>> {
        let p = Modulus::new(17)?;
        assert_eq!(ZpPoly::new(&[1, 2, 17, 34], &p).coefficients(), &[1, 2]);
        assert!(ZpPoly::new(&[0, 17], &p).is_zero());
        assert_eq!(ZpPoly::zero().degree(), None);
        assert_eq!(ZpPoly::monomial(3).degree(), Some(3));
        assert_eq!(ZpPoly::from_i64(&[-1, 1], &p).coefficients(), &[16, 1]);
        assert_eq!(ZpPoly::new(&[1, 2], &p).to_vec(4), vec![1, 2, 0, 0]);
        Ok(())
    }

    #[test]
    fn division() -> Result<(), Box<dyn Error>> {
        let p = Modulus::new(65537)?;
        for _ in 0..20 {
            let a = random_poly(20, &p);
            let b = random_poly(7, &p);
            let (q, r) = a.div_rem(&b, &p)?;
            assert!(r.degree().unwrap_or(0) < 7);
            assert_eq!(q.mul(&b, &p).add(&r, &p), a);
        }
        assert!(random_poly(3, &p).div_rem(&ZpPoly::zero(), &p).is_err());
        Ok(())
    }

    #[test]
    fn gcd_and_inverse() -> Result<(), Box<dyn Error>> {
        let p = Modulus::new(101)?;
        // (X - 1)(X - 2) and (X - 1)(X - 3) have gcd X - 1.
        let a = ZpPoly::from_i64(&[2, -3, 1], &p);
        let b = ZpPoly::from_i64(&[3, -4, 1], &p);
        assert_eq!(a.gcd(&b, &p)?, ZpPoly::from_i64(&[-1, 1], &p));

        // X^2 + 2 is irreducible mod 101 since -2 is not a square.
        let f = ZpPoly::new(&[2, 0, 1], &p);
        for _ in 0..20 {
            let a = random_poly(1, &p);
            if a.is_zero() {
                continue;
            }
            let inv = a.inv_mod(&f, &p)?.unwrap();
            assert_eq!(a.mul_mod(&inv, &f, &p)?, ZpPoly::constant(1, &p));
        }
        assert_eq!(a.inv_mod(&a, &p)?, None);
        Ok(())
    }

    #[test]
    fn powers() -> Result<(), Box<dyn Error>> {
        let p = Modulus::new(101)?;
        let f = ZpPoly::new(&[2, 0, 1], &p);
        let x = ZpPoly::monomial(1);
        // The Frobenius of F_{101^2} has order 2.
        let frob2 = x.pow_mod(&BigUint::from(101u64 * 101), &f, &p)?;
        assert_eq!(frob2, x);
        assert_eq!(x.compose_monomial(101, &f, &p)?, x.pow_mod(&BigUint::from(101u64), &f, &p)?);
        assert_eq!(x.pow_mod(&BigUint::from(0u64), &f, &p)?, ZpPoly::constant(1, &p));
        Ok(())
    }

    #[test]
    fn evaluation_and_substitution() -> Result<(), Box<dyn Error>> {
        let p = Modulus::new(17)?;
        let a = ZpPoly::new(&[1, 2, 3], &p);
        assert_eq!(a.evaluate(2, &p), (1 + 4 + 12) % 17);
        let b = a.substitute_cyclic(3, 4, &p);
        // X -> X^3 mod X^4 - 1 sends X^2 to X^6 = X^2.
        assert_eq!(b, ZpPoly::new(&[1, 0, 3, 2], &p));
        Ok(())
    }
}
