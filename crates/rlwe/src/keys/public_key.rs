//! Public keys for the BGV and CKKS encryption schemes.

use super::{KeyHandle, KeySwitch};
use crate::{Ciphertext, Context, Error, Result, Scheme};
use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::FromPrimitive;
use rand::{CryptoRng, RngCore};
use rlwe_math::rq::{Poly, Representation};
use std::collections::VecDeque;
use std::sync::Arc;

/// How the key-switching matrices of a hypercube dimension were generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeySwitchStrategy {
    /// Nothing is known about the matrices.
    #[default]
    Unknown,
    /// A matrix for every power of the generator.
    Full,
    /// Matrices for baby steps and giant steps.
    BabyStepGiantStep,
    /// A matrix for the generator only.
    Minimal,
}

impl KeySwitchStrategy {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Full => 1,
            Self::BabyStepGiantStep => 2,
            Self::Minimal => 3,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Full),
            2 => Ok(Self::BabyStepGiantStep),
            3 => Ok(Self::Minimal),
            _ => Err(Error::SerializationError(format!(
                "Invalid key-switching strategy {v}"
            ))),
        }
    }
}

/// A public key.
///
/// The public key holds an encryption of zero relative to the first secret
/// key, all the key-switching matrices, and for each secret key the map that
/// tells which matrix to use first to switch from s(X^k) back to s(X).
#[derive(Debug, Clone)]
pub struct PublicKey {
    pub(crate) ctx: Arc<Context>,
    pub(crate) pub_encr_key: Ciphertext,
    pub(crate) sk_sizes: Vec<usize>,
    pub(crate) key_switching: Vec<KeySwitch>,
    pub(crate) key_switch_map: Vec<Vec<Option<usize>>>,
    pub(crate) strategies: Vec<KeySwitchStrategy>,
    pub(crate) recrypt: Option<(usize, Ciphertext)>,
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        fn trimmed(strategies: &[KeySwitchStrategy]) -> &[KeySwitchStrategy] {
            let n = strategies
                .iter()
                .rposition(|s| *s != KeySwitchStrategy::Unknown)
                .map_or(0, |i| i + 1);
            &strategies[..n]
        }

        self.ctx.check_same(&other.ctx).is_ok()
            && self.pub_encr_key == other.pub_encr_key
            && self.sk_sizes == other.sk_sizes
            && self.key_switching == other.key_switching
            && self.key_switch_map == other.key_switch_map
            && trimmed(&self.strategies) == trimmed(&other.strategies)
            && self.recrypt == other.recrypt
    }
}

impl PublicKey {
    /// Creates an empty public key, without encryption key nor matrices.
    pub fn new(ctx: &Arc<Context>) -> Self {
        Self {
            ctx: ctx.clone(),
            pub_encr_key: Ciphertext::new(ctx),
            sk_sizes: vec![],
            key_switching: vec![],
            key_switch_map: vec![],
            strategies: vec![],
            recrypt: None,
        }
    }

    /// The context of the public key.
    pub fn ctx(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// The public encryption key, an encryption of zero.
    pub const fn pub_encr_key(&self) -> &Ciphertext {
        &self.pub_encr_key
    }

    /// The declared size of each secret key.
    pub fn sk_sizes(&self) -> &[usize] {
        &self.sk_sizes
    }

    /// All the key-switching matrices.
    pub fn key_switching(&self) -> &[KeySwitch] {
        &self.key_switching
    }

    /// The identifier of the bootstrapping key, if one was generated.
    pub fn recrypt_key_id(&self) -> Option<usize> {
        self.recrypt.as_ref().map(|(id, _)| *id)
    }

    /// The encryption of the bootstrapping key under the first key.
    pub fn recrypt_ekey(&self) -> Option<&Ciphertext> {
        self.recrypt.as_ref().map(|(_, ekey)| ekey)
    }

    /// The strategy used for the dimension `dim`; the dimension equal to the
    /// number of generators stands for the Frobenius automorphisms.
    pub fn strategy(&self, dim: usize) -> KeySwitchStrategy {
        self.strategies.get(dim).copied().unwrap_or_default()
    }

    /// Record the strategy used for the dimension `dim`.
    pub fn set_strategy(&mut self, dim: usize, strategy: KeySwitchStrategy) {
        if dim >= self.strategies.len() {
            self.strategies.resize(dim + 1, KeySwitchStrategy::Unknown);
        }
        self.strategies[dim] = strategy;
    }

    /// Recompute the key-switching map of the secret key `key_id`.
    ///
    /// The map is computed by a breadth-first search from 1, in the graph
    /// whose nodes are the elements of Z_m^* and whose edges are the
    /// matrices s(X^n) -> s(X). The entry of a node records the index of the
    /// first matrix on a shortest path back to 1.
    pub fn set_key_switch_map(&mut self, key_id: usize) -> Result<()> {
        if key_id >= self.sk_sizes.len() {
            return Err(Error::UnspecifiedInput(format!(
                "There is no secret key {key_id}"
            )));
        }
        let m = self.ctx.m();
        let edges = self
            .key_switching
            .iter()
            .enumerate()
            .filter(|(_, matrix)| {
                matrix.to_key_id == key_id
                    && matrix.from_key.power_of_s() == 1
                    && matrix.from_key.secret_key_id() == key_id
            })
            .map(|(i, matrix)| (matrix.from_key.power_of_x(), i))
            .collect::<Vec<_>>();

        if key_id >= self.key_switch_map.len() {
            self.key_switch_map.resize(key_id + 1, vec![]);
        }
        let mut map = vec![None; m as usize];
        let mut queue = VecDeque::from([1u64]);
        while let Some(node) = queue.pop_front() {
            for (n, index) in &edges {
                let next = ((node as u128 * *n as u128) % m as u128) as u64;
                if map[next as usize].is_none() {
                    map[next as usize] = Some(*index);
                    queue.push_back(next);
                }
            }
        }
        log::debug!(
            "Key {key_id}: {} matrices reach {} elements",
            edges.len(),
            map.iter().filter(|e| e.is_some()).count()
        );
        self.key_switch_map[key_id] = map;
        Ok(())
    }

    fn map_entry(&self, k: u64, key_id: usize) -> Option<usize> {
        let map = self.key_switch_map.get(key_id)?;
        *map.get((k % self.ctx.m()) as usize)?
    }

    /// Returns the matrix from the key `handle` to the secret key `to_id`, or
    /// the [`KeySwitch::dummy`] sentinel if there is none.
    pub fn get_key_switch_matrix(&self, handle: &KeyHandle, to_id: usize) -> &KeySwitch {
        if handle.power_of_s() == 1 && handle.secret_key_id() == to_id {
            if let Some(index) = self.map_entry(handle.power_of_x(), to_id) {
                let matrix = &self.key_switching[index];
                if &matrix.from_key == handle {
                    return matrix;
                }
            }
        }
        self.key_switching
            .iter()
            .find(|matrix| matrix.to_key_id == to_id && &matrix.from_key == handle)
            .unwrap_or(KeySwitch::dummy())
    }

    /// Returns a matrix from the key `handle` to any secret key, or the
    /// [`KeySwitch::dummy`] sentinel if there is none.
    pub fn get_any_key_switch_matrix(&self, handle: &KeyHandle) -> &KeySwitch {
        if handle.power_of_s() == 1 {
            if let Some(index) = self.map_entry(handle.power_of_x(), handle.secret_key_id()) {
                let matrix = &self.key_switching[index];
                if &matrix.from_key == handle {
                    return matrix;
                }
            }
        }
        self.key_switching
            .iter()
            .find(|matrix| &matrix.from_key == handle)
            .unwrap_or(KeySwitch::dummy())
    }

    /// Returns whether there is a matrix from the key `handle` to the secret
    /// key `to_id`.
    pub fn have_key_switch_matrix(&self, handle: &KeyHandle, to_id: usize) -> bool {
        !self.get_key_switch_matrix(handle, to_id).is_dummy()
    }

    /// The first matrix on the path from s(X^k) back to the secret key
    /// `key_id`.
    pub fn get_next_key_switch_matrix(&self, k: u64, key_id: usize) -> Result<&KeySwitch> {
        self.map_entry(k, key_id)
            .map(|index| &self.key_switching[index])
            .ok_or_else(|| Error::MissingKeySwitchPath {
                handle: KeyHandle::new(1, k % self.ctx.m(), key_id).to_string(),
                to: key_id,
            })
    }

    /// Returns whether s(X^k) can be switched back to the secret key `key_id`
    /// through the key-switching map.
    pub fn is_reachable(&self, k: u64, key_id: usize) -> bool {
        k % self.ctx.m() == 1 || self.map_entry(k, key_id).is_some()
    }

    /// Encrypt a plaintext polynomial with the default parameters of the
    /// scheme: the native plaintext space for BGV, and a size bound equal to
    /// the largest coefficient for CKKS.
    pub fn encrypt<R: RngCore + CryptoRng>(&self, ptxt: &[i64], rng: &mut R) -> Result<Ciphertext> {
        match self.ctx.scheme() {
            Scheme::Bgv => self.encrypt_bgv(ptxt, 0, false, rng),
            Scheme::Ckks => {
                let size = ptxt.iter().map(|c| c.unsigned_abs()).max().unwrap_or(0).max(1);
                self.encrypt_ckks(ptxt, size as f64, rng)
            }
        }
    }

    /// Encrypt a BGV plaintext polynomial.
    ///
    /// The plaintext space of the ciphertext is the gcd of `ptxt_space` and
    /// of the plaintext space of the public encryption key; a `ptxt_space` of
    /// 0 selects the latter. With `high_noise`, the noise is made almost as
    /// large as the modulus allows.
    pub fn encrypt_bgv<R: RngCore + CryptoRng>(
        &self,
        ptxt: &[i64],
        ptxt_space: u64,
        high_noise: bool,
        rng: &mut R,
    ) -> Result<Ciphertext> {
        self.check_scheme("encrypt_bgv", Scheme::Bgv)?;
        let native = self.pub_encr_key.ptxt_space;
        let t = if ptxt_space == 0 || ptxt_space == native {
            native
        } else {
            ptxt_space.gcd(&native)
        };
        if t <= 1 {
            return Err(Error::PlaintextSpaceMismatch {
                requested: ptxt_space,
                native,
            });
        }
        let ring = self.ctx.ring();
        let primes = self.ctx.ctxt_primes();

        let mut ct = self.randomized_encr_key(rng)?;
        let stdev = self.noise_stdev();
        for (i, part) in ct.parts.iter_mut().enumerate() {
            let mut e = if high_noise && i == 0 {
                let bound = ring.modulus(primes)? / BigUint::from(8 * t);
                Poly::uniform(ring, primes, Representation::Evaluation, &bound, rng)?
            } else {
                Poly::gaussian(ring, primes, Representation::Evaluation, stdev, rng)?
            };
            e *= t;
            part.poly += &e;
        }
        ct.ptxt_space = t;
        ct.add_bgv_plaintext(ptxt)?;

        ct.noise_var = if high_noise {
            (2.0 * self.ctx.log_q() - 8f64.ln()).exp()
        } else {
            let e_var = stdev * stdev;
            let s_var = self.sk_sizes[0] as f64;
            let t2 = (t as f64) * (t as f64);
            self.pub_encr_key.noise_var * self.r_var(2.0) + t2 * (1.0 + s_var * (e_var + 1.0))
        };
        Ok(ct)
    }

    /// Encrypt a CKKS plaintext polynomial, already scaled by the encoding
    /// factor of the context, whose slots are bounded by `size`.
    ///
    /// The plaintext is scaled up further when the noise would otherwise
    /// exceed the precision of the context; the resulting factor is recorded
    /// in the ciphertext.
    pub fn encrypt_ckks<R: RngCore + CryptoRng>(
        &self,
        ptxt: &[i64],
        size: f64,
        rng: &mut R,
    ) -> Result<Ciphertext> {
        self.check_scheme("encrypt_ckks", Scheme::Ckks)?;
        let ring = self.ctx.ring();
        let primes = self.ctx.ctxt_primes();

        let mut ct = self.randomized_encr_key(rng)?;
        let stdev = self.noise_stdev();
        for part in ct.parts.iter_mut() {
            let e = Poly::gaussian(ring, primes, Representation::Evaluation, stdev, rng)?;
            part.poly += &e;
        }

        let r_var = self.r_var(2.0);
        let e_var = stdev * stdev;
        let s_var = self.sk_sizes[0] as f64;
        let noise_var = self.pub_encr_key.noise_var * r_var + s_var * (e_var + 1.0);
        let factor = scale_plaintext(&mut ct, ptxt, noise_var)?;
        ct.noise_var = noise_var + r_var * (factor * size).powi(2);
        ct.ptxt_space = 1;
        Ok(ct)
    }

    /// r * pubEncrKey for a fresh small r.
    fn randomized_encr_key<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<Ciphertext> {
        if self.pub_encr_key.is_empty() || self.sk_sizes.is_empty() {
            return Err(Error::UnspecifiedInput(
                "The public key has no encryption key".to_string(),
            ));
        }
        let mut ct = self.pub_encr_key.clone();
        let r = Poly::small(
            self.ctx.ring(),
            self.ctx.ctxt_primes(),
            Representation::Evaluation,
            rng,
        )?;
        for part in ct.parts.iter_mut() {
            part.poly *= &r;
        }
        Ok(ct)
    }

    fn noise_stdev(&self) -> f64 {
        let zm = self.ctx.zm();
        if zm.is_pow2() {
            self.ctx.stdev()
        } else {
            self.ctx.stdev() * (zm.m() as f64).sqrt()
        }
    }

    /// Variance of a small polynomial, phi(m) / d or m / d.
    pub(crate) fn r_var(&self, d: f64) -> f64 {
        let zm = self.ctx.zm();
        if zm.is_pow2() {
            zm.m() as f64 / d
        } else {
            zm.phi_m() as f64 / d
        }
    }

    fn check_scheme(&self, operation: &str, scheme: Scheme) -> Result<()> {
        if self.ctx.scheme() == scheme {
            Ok(())
        } else {
            Err(Error::UnsupportedOperation {
                operation: operation.to_string(),
                scheme: self.ctx.scheme().to_string(),
            })
        }
    }
}

/// Add the CKKS plaintext, scaled up by the extra factor needed to cover the
/// noise of variance `noise_var`, and return the resulting scaling factor.
pub(crate) fn scale_plaintext(ct: &mut Ciphertext, ptxt: &[i64], noise_var: f64) -> Result<f64> {
    let ctx = ct.ctx.clone();
    let mut factor = ctx.scaling_factor();
    let extra = (ctx.precision() * noise_var.sqrt() * (ctx.m() as f64).log2() / factor).ceil();
    let coefficients = if extra > 1.0 {
        factor *= extra;
        log::debug!("Encryption: extra factor {extra}, factor {factor}");
        let extra = BigInt::from_f64(extra).ok_or_else(|| {
            Error::DefaultError(format!("Invalid scaling factor {extra}"))
        })?;
        ptxt.iter().map(|c| BigInt::from(*c) * &extra).collect::<Vec<_>>()
    } else {
        log::debug!("Encryption: factor {factor}");
        ptxt.iter().map(|c| BigInt::from(*c)).collect::<Vec<_>>()
    };
    ct.add_plaintext(&coefficients)?;
    ct.rat_factor = factor;
    Ok(factor)
}
