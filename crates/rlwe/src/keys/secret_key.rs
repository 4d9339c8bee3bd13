//! Secret keys for the BGV and CKKS encryption schemes.

use super::public_key::scale_plaintext;
use super::rlwe::{rlwe, rlwe1};
use super::{KeyHandle, KeySwitch, KeySwitchStrategy, PublicKey};
use crate::ciphertext::CiphertextPart;
use crate::{Ciphertext, Context, Error, ParametersError, Result, Scheme};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use rand::{CryptoRng, Rng, RngCore};
use rlwe_math::rq::{Poly, Representation};
use rlwe_math::zq::{bigint_mod, Modulus};
use std::sync::Arc;
use zeroize::{Zeroize, Zeroizing};

/// A secret key, together with the public key it generated.
///
/// The secret keys are stored in evaluation representation over all the
/// primes of the context, ciphertext and special ones.
#[derive(Debug, Clone, PartialEq)]
pub struct SecretKey {
    pub(crate) pk: PublicKey,
    pub(crate) s_keys: Vec<Poly>,
}

impl Zeroize for SecretKey {
    fn zeroize(&mut self) {
        self.s_keys.iter_mut().for_each(|s| s.zeroize());
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl SecretKey {
    /// Creates a secret key without any secret.
    pub fn new(ctx: &Arc<Context>) -> Self {
        Self {
            pk: PublicKey::new(ctx),
            s_keys: vec![],
        }
    }

    /// Generate a secret key with a first secret of Hamming weight `hwt`, or
    /// with small coefficients if `hwt` is 0.
    pub fn generate<R: RngCore + CryptoRng>(
        ctx: &Arc<Context>,
        hwt: usize,
        ptxt_space: u64,
        max_deg: u64,
        rng: &mut R,
    ) -> Result<Self> {
        let mut sk = Self::new(ctx);
        sk.gen_sec_key(hwt, ptxt_space, max_deg, rng)?;
        Ok(sk)
    }

    /// The public key.
    pub const fn public_key(&self) -> &PublicKey {
        &self.pk
    }

    /// The public key, to register additional strategies.
    pub fn public_key_mut(&mut self) -> &mut PublicKey {
        &mut self.pk
    }

    /// The context of the key.
    pub fn ctx(&self) -> &Arc<Context> {
        &self.pk.ctx
    }

    /// Number of secrets.
    pub fn len(&self) -> usize {
        self.s_keys.len()
    }

    /// Returns whether there is no secret.
    pub fn is_empty(&self) -> bool {
        self.s_keys.is_empty()
    }

    pub(crate) fn secret_key(&self, id: usize) -> Result<&Poly> {
        self.s_keys
            .get(id)
            .ok_or_else(|| Error::UnspecifiedInput(format!("There is no secret key {id}")))
    }

    /// Sample a new secret, of Hamming weight `hwt` or with small
    /// coefficients when `hwt` is 0, and import it.
    pub fn gen_sec_key<R: RngCore + CryptoRng>(
        &mut self,
        hwt: usize,
        ptxt_space: u64,
        max_deg: u64,
        rng: &mut R,
    ) -> Result<usize> {
        let ctx = self.ctx().clone();
        let all = ctx.all_primes();
        let (s, size) = if hwt > 0 {
            (
                Poly::hwt(ctx.ring(), &all, Representation::Evaluation, hwt, rng)?,
                hwt,
            )
        } else {
            (
                Poly::small(ctx.ring(), &all, Representation::Evaluation, rng)?,
                ctx.degree() / 2,
            )
        };
        self.import_secret_key(s, size, ptxt_space, max_deg, rng)
    }

    /// Import the secret `s`, of declared size `size`, and return its
    /// identifier.
    ///
    /// The first imported secret defines the public encryption key, with
    /// plaintext space `ptxt_space` (below 2 selects p^r for BGV; CKKS always
    /// uses 1). Key-switching matrices from s^e to s are generated for all
    /// 2 <= e <= `max_deg`.
    pub fn import_secret_key<R: RngCore + CryptoRng>(
        &mut self,
        mut s: Poly,
        size: usize,
        ptxt_space: u64,
        max_deg: u64,
        rng: &mut R,
    ) -> Result<usize> {
        let ctx = self.ctx().clone();
        if !Arc::ptr_eq(s.ctx(), ctx.ring()) && s.ctx() != ctx.ring() {
            return Err(Error::ContextMismatch);
        }
        let all = ctx.all_primes();
        s.add_primes(&all)?;
        s.change_representation(Representation::Evaluation);

        let t = match ctx.scheme() {
            Scheme::Ckks => 1,
            Scheme::Bgv if ptxt_space < 2 => ctx.ptxt_space(),
            Scheme::Bgv => ptxt_space,
        };

        let id = self.s_keys.len();
        if id == 0 {
            let (c0, c1, noise_var) = rlwe(&ctx, ctx.ctxt_primes(), &s, t, None, rng)?;
            self.pk.pub_encr_key = Ciphertext {
                ctx: ctx.clone(),
                parts: vec![
                    CiphertextPart {
                        poly: c0,
                        handle: KeyHandle::one(),
                    },
                    CiphertextPart {
                        poly: c1,
                        handle: KeyHandle::base(0),
                    },
                ],
                prime_set: ctx.ctxt_primes().clone(),
                ptxt_space: t,
                noise_var,
                rat_factor: match ctx.scheme() {
                    Scheme::Bgv => 1.0,
                    Scheme::Ckks => noise_var.sqrt(),
                },
            };
        }
        self.s_keys.push(s);
        self.pk.sk_sizes.push(size);
        self.pk.set_key_switch_map(id)?;

        for e in 2..=max_deg {
            self.gen_key_switch_matrix(e, 1, id, id, 0, rng)?;
        }
        Ok(id)
    }

    /// Generate the key-switching matrix from s_from(X^from_x)^from_s to
    /// s_to, and rebuild the key-switching map of s_to.
    ///
    /// Does nothing if the matrix would be trivial or already exists. A
    /// `ptxt_space` of 0 selects 1 for CKKS, and for BGV the bootstrapping
    /// plaintext space if the context is bootstrappable or the plaintext
    /// space of the public encryption key otherwise.
    pub fn gen_key_switch_matrix<R: RngCore + CryptoRng>(
        &mut self,
        from_s: u64,
        from_x: u64,
        from_id: usize,
        to_id: usize,
        ptxt_space: u64,
        rng: &mut R,
    ) -> Result<()> {
        let ctx = self.ctx().clone();
        let from_x = from_x % ctx.m();
        if from_s == 0 || from_x == 0 || (from_s == 1 && from_x == 1 && from_id == to_id) {
            return Ok(());
        }
        let handle = KeyHandle::new(from_s, from_x, from_id);
        if self.pk.have_key_switch_matrix(&handle, to_id) {
            return Ok(());
        }

        let to_key = self.secret_key(to_id)?;
        let from_key = Zeroizing::new(self.secret_key(from_id)?.automorph(from_x)?.pow(from_s));

        let t = match ctx.scheme() {
            Scheme::Ckks => 1,
            Scheme::Bgv if ptxt_space == 0 => ctx
                .bootstrap_ptxt_space()
                .unwrap_or(self.pk.pub_encr_key.ptxt_space),
            Scheme::Bgv => ptxt_space,
        };

        let prg_seed = rng.gen::<<rand_chacha::ChaCha8Rng as rand::SeedableRng>::Seed>();
        let mut prod = ctx.special_modulus()?;
        let mut b = Vec::with_capacity(ctx.digits().len());
        let mut noise_var = 0.0;
        for (a_i, digit) in KeySwitch::randomizers(&ctx, prg_seed, ctx.digits().len())
            .iter()
            .zip(ctx.digits())
        {
            let (mut b_i, var) = rlwe1(&ctx, a_i, to_key, t, rng)?;
            b_i += &*Zeroizing::new(&*from_key * &prod);
            b.push(b_i);
            noise_var = var;
            prod *= ctx.ring().modulus(digit)?;
        }

        log::debug!("Generated the key-switching matrix from {handle} to key {to_id}");
        self.pk.key_switching.push(KeySwitch {
            from_key: handle,
            to_key_id: to_id,
            ptxt_space: t,
            b,
            prg_seed,
            noise_var,
        });
        self.pk.set_key_switch_map(to_id)
    }

    /// Generate the matrices s(X^(g_i^j)) -> s for every dimension i and
    /// every 1 <= j < ord_i, and also s(X^(g_i^(j - ord_i))) -> s for the
    /// dimensions that are not native.
    pub fn add_1d_matrices<R: RngCore + CryptoRng>(
        &mut self,
        key_id: usize,
        rng: &mut R,
    ) -> Result<()> {
        let zm = self.ctx().zm().clone();
        for i in 0..zm.num_gens() {
            let ord = zm.order_of(i) as i64;
            for j in 1..ord {
                self.gen_key_switch_matrix(1, zm.gen_power(i, j), key_id, key_id, 0, rng)?;
                if !zm.is_native(i) {
                    self.gen_key_switch_matrix(1, zm.gen_power(i, j - ord), key_id, key_id, 0, rng)?;
                }
            }
            self.pk.set_strategy(i, KeySwitchStrategy::Full);
        }
        Ok(())
    }

    /// Generate the matrices s(X^(g_i)) -> s for every dimension i, and also
    /// s(X^(g_i^-ord_i)) -> s for the dimensions that are not native. All
    /// the other rotations follow paths in the key-switching graph.
    pub fn add_some_1d_matrices<R: RngCore + CryptoRng>(
        &mut self,
        key_id: usize,
        rng: &mut R,
    ) -> Result<()> {
        let zm = self.ctx().zm().clone();
        for i in 0..zm.num_gens() {
            self.gen_key_switch_matrix(1, zm.gen(i), key_id, key_id, 0, rng)?;
            if !zm.is_native(i) {
                let k = zm.gen_power(i, -(zm.order_of(i) as i64));
                self.gen_key_switch_matrix(1, k, key_id, key_id, 0, rng)?;
            }
            self.pk.set_strategy(i, KeySwitchStrategy::Minimal);
        }
        Ok(())
    }

    /// Generate the matrices s(X^(f^j)) -> s for the Frobenius element f and
    /// every 1 <= j < ord(f).
    pub fn add_frobenius_matrices<R: RngCore + CryptoRng>(
        &mut self,
        key_id: usize,
        rng: &mut R,
    ) -> Result<()> {
        let zm = self.ctx().zm().clone();
        for j in 1..zm.frobenius_order() as u64 {
            self.gen_key_switch_matrix(1, zm.pow(zm.frobenius(), j), key_id, key_id, 0, rng)?;
        }
        self.pk.set_strategy(zm.num_gens(), KeySwitchStrategy::Full);
        Ok(())
    }

    /// Decrypt a ciphertext.
    ///
    /// Returns the coefficients of the plaintext polynomial, in
    /// [0, ptxt_space) for BGV, and centered and still scaled by the factor
    /// of the ciphertext for CKKS.
    pub fn decrypt(&self, ct: &Ciphertext) -> Result<Vec<BigInt>> {
        self.ctx().check_same(ct.ctx())?;
        let ctx = self.ctx();
        let primes = ct.prime_set();

        let mut acc = Zeroizing::new(Poly::zero(ctx.ring(), primes, Representation::Evaluation));
        for part in ct.parts() {
            let handle = part.handle();
            if handle.is_one() {
                *acc += part.poly();
                continue;
            }
            let mut key = Zeroizing::new(self.secret_key(handle.secret_key_id())?.restricted(primes)?);
            if handle.power_of_x() > 1 {
                *key = key.automorph(handle.power_of_x())?;
            }
            if handle.power_of_s() > 1 {
                *key = key.pow(handle.power_of_s());
            }
            *key *= part.poly();
            *acc += &*key;
        }

        let log_q = ctx.ring().log_modulus(primes)?;
        if 0.5 * ct.noise_var().ln() > log_q - 2f64.ln() {
            log::warn!(
                "Decryption may fail: the noise variance {:e} is too large for a {:.1}-bit modulus",
                ct.noise_var(),
                log_q / 2f64.ln()
            );
        }

        let coefficients = acc.to_bigints()?;
        if ctx.scheme() == Scheme::Ckks {
            return Ok(coefficients);
        }

        let t = ct.ptxt_space();
        let q_mod_t = ctx.modulus_mod(primes, t)?;
        let q_inv = if t > 2 && q_mod_t != 1 {
            Modulus::new(t)?
                .inv(q_mod_t)
                .ok_or(Error::MathError(rlwe_math::Error::NotInvertible(q_mod_t, t)))?
        } else {
            1
        };
        Ok(coefficients
            .iter()
            .map(|c| {
                let c = bigint_mod(c, t) as u128 * q_inv as u128 % t as u128;
                BigInt::from(c as u64)
            })
            .collect())
    }

    /// Encrypt a plaintext polynomial directly under the secret `key_id`.
    ///
    /// For BGV, a `ptxt_space` below 2 selects the plaintext space of the
    /// public encryption key. For CKKS, `ptxt_space` is the bound on the slots of the
    /// plaintext, which is already scaled by the encoding factor.
    pub fn sk_encrypt<R: RngCore + CryptoRng>(
        &self,
        ptxt: &[i64],
        ptxt_space: u64,
        key_id: usize,
        rng: &mut R,
    ) -> Result<Ciphertext> {
        let ctx = self.ctx().clone();
        let s = self.secret_key(key_id)?;
        let t = match ctx.scheme() {
            Scheme::Ckks => 1,
            Scheme::Bgv if ptxt_space < 2 => self.pk.pub_encr_key.ptxt_space,
            Scheme::Bgv => ptxt_space,
        };
        let (c0, c1, noise_var) = rlwe(&ctx, ctx.ctxt_primes(), s, t, None, rng)?;
        let mut ct = Ciphertext::new(&ctx);
        ct.add_part(c0, KeyHandle::one());
        ct.add_part(c1, KeyHandle::base(key_id));
        ct.ptxt_space = t;
        ct.noise_var = noise_var;

        match ctx.scheme() {
            Scheme::Bgv => ct.add_bgv_plaintext(ptxt)?,
            Scheme::Ckks => {
                let factor = scale_plaintext(&mut ct, ptxt, noise_var)?;
                let size = ptxt_space as f64;
                ct.noise_var += self.pk.r_var(4.0) * (factor * size).powi(2);
            }
        }
        Ok(ct)
    }

    /// Generate the bootstrapping key, or return its identifier if it already
    /// exists.
    ///
    /// The new secret has the Hamming weight of the bootstrapping parameters
    /// of the context. A matrix switches from the first secret to the new
    /// one, and the coefficients of the new secret are encrypted under the
    /// first one with plaintext space p^(e + r).
    pub fn gen_bootstrap_key<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<usize> {
        if let Some(id) = self.pk.recrypt_key_id() {
            return Ok(id);
        }
        let ctx = self.ctx().clone();
        let (Some(bootstrap), Some(ptxt_space)) = (ctx.bootstrap(), ctx.bootstrap_ptxt_space())
        else {
            return Err(Error::ParametersError(ParametersError::NotBootstrappable));
        };
        let p2r = ctx.ptxt_space();

        let s = Poly::hwt(
            ctx.ring(),
            &ctx.all_primes(),
            Representation::PowerBasis,
            bootstrap.sk_hwt,
            rng,
        )?;
        let coefficients = Zeroizing::new(
            s.to_bigints()?
                .iter()
                .map(|c| {
                    c.to_i64()
                        .ok_or_else(|| Error::DefaultError("Invalid secret key".to_string()))
                })
                .collect::<Result<Vec<_>>>()?,
        );
        let id = self.import_secret_key(s, bootstrap.sk_hwt, p2r, 1, rng)?;
        self.gen_key_switch_matrix(1, 1, 0, id, p2r, rng)?;
        let ekey = self.pk.encrypt_bgv(&coefficients, ptxt_space, false, rng)?;
        log::info!(
            "Generated the bootstrapping key {id}, encrypted modulo {}",
            ekey.ptxt_space()
        );
        self.pk.recrypt = Some((id, ekey));
        Ok(id)
    }
}
