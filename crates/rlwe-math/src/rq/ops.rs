//! Implementation of operations over polynomials.

use super::{Poly, Representation};
use itertools::izip;
use num_bigint::BigUint;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

impl Poly {
    fn check_compatible(&self, p: &Poly) {
        debug_assert_eq!(self.ctx, p.ctx, "Incompatible contexts");
        assert_eq!(self.primes, p.primes, "Incompatible prime sets");
        assert_eq!(
            self.representation, p.representation,
            "Incompatible representations"
        );
    }
}

impl AddAssign<&Poly> for Poly {
    fn add_assign(&mut self, p: &Poly) {
        self.check_compatible(p);
        izip!(
            self.coefficients.outer_iter_mut(),
            p.coefficients.outer_iter(),
            self.primes.iter()
        )
        .for_each(|(mut v1, v2, i)| {
            let qi = &self.ctx.q[i];
            izip!(v1.iter_mut(), v2.iter()).for_each(|(a, b)| *a = qi.add(*a, *b))
        });
    }
}

impl Add<&Poly> for &Poly {
    type Output = Poly;
    fn add(self, p: &Poly) -> Poly {
        let mut q = self.clone();
        q += p;
        q
    }
}

impl Add for Poly {
    type Output = Poly;
    fn add(self, mut p: Poly) -> Poly {
        p += &self;
        p
    }
}

impl SubAssign<&Poly> for Poly {
    fn sub_assign(&mut self, p: &Poly) {
        self.check_compatible(p);
        izip!(
            self.coefficients.outer_iter_mut(),
            p.coefficients.outer_iter(),
            self.primes.iter()
        )
        .for_each(|(mut v1, v2, i)| {
            let qi = &self.ctx.q[i];
            izip!(v1.iter_mut(), v2.iter()).for_each(|(a, b)| *a = qi.sub(*a, *b))
        });
    }
}

impl Sub<&Poly> for &Poly {
    type Output = Poly;
    fn sub(self, p: &Poly) -> Poly {
        let mut q = self.clone();
        q -= p;
        q
    }
}

impl MulAssign<&Poly> for Poly {
    fn mul_assign(&mut self, p: &Poly) {
        self.check_compatible(p);
        assert_eq!(
            self.representation,
            Representation::Evaluation,
            "Multiplication requires the Evaluation representation"
        );
        izip!(
            self.coefficients.outer_iter_mut(),
            p.coefficients.outer_iter(),
            self.primes.iter()
        )
        .for_each(|(mut v1, v2, i)| {
            let qi = &self.ctx.q[i];
            izip!(v1.iter_mut(), v2.iter()).for_each(|(a, b)| *a = qi.mul(*a, *b))
        });
    }
}

impl Mul<&Poly> for &Poly {
    type Output = Poly;
    fn mul(self, p: &Poly) -> Poly {
        let mut q = self.clone();
        q *= p;
        q
    }
}

impl MulAssign<&BigUint> for Poly {
    fn mul_assign(&mut self, c: &BigUint) {
        izip!(self.coefficients.outer_iter_mut(), self.primes.iter()).for_each(|(mut v, i)| {
            let qi = &self.ctx.q[i];
            let ci = qi.reduce_biguint(c);
            v.iter_mut().for_each(|a| *a = qi.mul(*a, ci))
        });
    }
}

impl MulAssign<u64> for Poly {
    fn mul_assign(&mut self, c: u64) {
        izip!(self.coefficients.outer_iter_mut(), self.primes.iter()).for_each(|(mut v, i)| {
            let qi = &self.ctx.q[i];
            let ci = qi.reduce(c);
            v.iter_mut().for_each(|a| *a = qi.mul(*a, ci))
        });
    }
}

impl Mul<&BigUint> for &Poly {
    type Output = Poly;
    fn mul(self, c: &BigUint) -> Poly {
        let mut q = self.clone();
        q *= c;
        q
    }
}

impl Neg for &Poly {
    type Output = Poly;

    fn neg(self) -> Poly {
        let mut out = self.clone();
        izip!(out.coefficients.outer_iter_mut(), self.primes.iter()).for_each(|(mut v, i)| {
            let qi = &self.ctx.q[i];
            v.iter_mut().for_each(|a| *a = qi.neg(*a))
        });
        out
    }
}

impl Neg for Poly {
    type Output = Poly;

    fn neg(self) -> Poly {
        -&self
    }
}
