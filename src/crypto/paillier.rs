//! The Paillier cryptosystem, with the usual `g = n + 1` simplification.
//!
//! Keys are stored as lowercase hex: the public key is the modulus `n`, the
//! private key is the two primes `p:q` from which everything else is derived.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_prime::RandPrime;
use num_traits::{One, Zero};
use rand::Rng;
use rocket::tokio::task;

use crate::error::Result;

use super::{CryptoError, KeyGenerator, KeyPair};

/// Smallest modulus we will generate. Only tests should go anywhere near it.
pub const MIN_MODULUS_BITS: usize = 64;

/// A Paillier public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaillierPublicKey {
    n: BigUint,
    n_squared: BigUint,
}

impl PaillierPublicKey {
    fn new(n: BigUint) -> Self {
        let n_squared = &n * &n;
        Self { n, n_squared }
    }

    /// The public modulus `n`; plaintexts live in `[0, n)`.
    pub fn modulus(&self) -> &BigUint {
        &self.n
    }

    /// Encrypt `plaintext` with fresh randomness from `rng`.
    pub fn encrypt<R: Rng>(
        &self,
        plaintext: &BigUint,
        rng: &mut R,
    ) -> std::result::Result<Ciphertext, CryptoError> {
        if plaintext >= &self.n {
            return Err(CryptoError::PlaintextTooLarge);
        }

        let one = BigUint::one();
        let r = loop {
            let candidate = rng.gen_biguint_range(&one, &self.n);
            if candidate.gcd(&self.n).is_one() {
                break candidate;
            }
        };

        // g^m = (1 + n)^m = 1 + mn (mod n^2)
        let g_m = (&one + plaintext * &self.n) % &self.n_squared;
        let r_n = r.modpow(&self.n, &self.n_squared);
        Ok(Ciphertext((g_m * r_n) % &self.n_squared))
    }

    /// Homomorphic addition: the result decrypts to the sum of the inputs' plaintexts.
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
        Ciphertext((&a.0 * &b.0) % &self.n_squared)
    }

    /// Homomorphically add up any number of ciphertexts.
    /// The empty sum is the trivial encryption of zero.
    pub fn sum<'a, I>(&self, ciphertexts: I) -> Ciphertext
    where
        I: IntoIterator<Item = &'a Ciphertext>,
    {
        ciphertexts
            .into_iter()
            .fold(Ciphertext::zero(), |acc, c| self.add(&acc, c))
    }

    fn check_ciphertext(&self, ciphertext: &Ciphertext) -> std::result::Result<(), CryptoError> {
        let c = &ciphertext.0;
        if c.is_zero() || c >= &self.n_squared || !c.gcd(&self.n).is_one() {
            return Err(CryptoError::MalformedCiphertext(
                "not an element of Z*_{n^2}".to_string(),
            ));
        }
        Ok(())
    }
}

impl Display for PaillierPublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.n.to_str_radix(16))
    }
}

impl FromStr for PaillierPublicKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let n = parse_hex(s).ok_or_else(|| CryptoError::MalformedKey("bad modulus".to_string()))?;
        if n <= BigUint::one() {
            return Err(CryptoError::MalformedKey("modulus too small".to_string()));
        }
        Ok(Self::new(n))
    }
}

/// A Paillier private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaillierPrivateKey {
    p: BigUint,
    q: BigUint,
    public: PaillierPublicKey,
    lambda: BigUint,
    mu: BigUint,
}

impl PaillierPrivateKey {
    /// Derive a key from two primes. Returns `None` if they do not form a
    /// usable modulus (equal primes, or `gcd(n, phi(n)) != 1`).
    fn from_primes(p: BigUint, q: BigUint) -> Option<Self> {
        if p == q {
            return None;
        }
        let one = BigUint::one();
        let n = &p * &q;
        let lambda = (&p - &one) * (&q - &one);
        let mu = lambda.modinv(&n)?;
        Some(Self {
            p,
            q,
            public: PaillierPublicKey::new(n),
            lambda,
            mu,
        })
    }

    /// The matching public key.
    pub fn public_key(&self) -> &PaillierPublicKey {
        &self.public
    }

    pub fn decrypt(&self, ciphertext: &Ciphertext) -> std::result::Result<BigUint, CryptoError> {
        self.public.check_ciphertext(ciphertext)?;
        let n = &self.public.n;
        let x = ciphertext.0.modpow(&self.lambda, &self.public.n_squared);
        let l = (x - BigUint::one()) / n;
        Ok((l * &self.mu) % n)
    }
}

impl Display for PaillierPrivateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}",
            self.p.to_str_radix(16),
            self.q.to_str_radix(16)
        )
    }
}

impl FromStr for PaillierPrivateKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let malformed = || CryptoError::MalformedKey("expected `p:q` in hex".to_string());
        let (p, q) = s.split_once(':').ok_or_else(malformed)?;
        let p = parse_hex(p).ok_or_else(malformed)?;
        let q = parse_hex(q).ok_or_else(malformed)?;
        if p <= BigUint::one() || q <= BigUint::one() {
            return Err(malformed());
        }
        Self::from_primes(p, q)
            .ok_or_else(|| CryptoError::MalformedKey("primes do not form a valid key".to_string()))
    }
}

/// A Paillier ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext(BigUint);

impl Ciphertext {
    /// Encryption of zero with randomness one; the identity for [`PaillierPublicKey::add`].
    fn zero() -> Self {
        Self(BigUint::one())
    }
}

impl Display for Ciphertext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.to_str_radix(16))
    }
}

impl FromStr for Ciphertext {
    type Err = CryptoError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse_hex(s)
            .map(Self)
            .ok_or_else(|| CryptoError::MalformedCiphertext("expected hex".to_string()))
    }
}

fn parse_hex(s: &str) -> Option<BigUint> {
    if s.is_empty() {
        return None;
    }
    BigUint::parse_bytes(s.as_bytes(), 16)
}

/// Generates Paillier key pairs with a modulus of the configured size.
#[derive(Debug, Clone, Copy)]
pub struct PaillierKeyGenerator {
    modulus_bits: usize,
}

impl PaillierKeyGenerator {
    /// Sizes below [`MIN_MODULUS_BITS`] are raised to it.
    pub fn new(modulus_bits: usize) -> Self {
        Self {
            modulus_bits: modulus_bits.max(MIN_MODULUS_BITS),
        }
    }

    pub fn modulus_bits(&self) -> usize {
        self.modulus_bits
    }

    /// Generate a private key (and with it the public key) using `rng`.
    /// The modulus has exactly the configured number of bits.
    /// This is CPU-bound and can take a while for production key sizes.
    pub fn generate<R: Rng>(&self, rng: &mut R) -> PaillierPrivateKey {
        let p_bits = (self.modulus_bits + 1) / 2;
        let q_bits = self.modulus_bits / 2;
        loop {
            let p: BigUint = rng.gen_prime(p_bits, None);
            let q: BigUint = rng.gen_prime(q_bits, None);
            // The product of a `p_bits` and a `q_bits` prime may be one bit short.
            if (&p * &q).bits() != self.modulus_bits as u64 {
                continue;
            }
            if let Some(key) = PaillierPrivateKey::from_primes(p, q) {
                return key;
            }
        }
    }
}

#[rocket::async_trait]
impl KeyGenerator for PaillierKeyGenerator {
    async fn generate_key_pair(&self) -> Result<KeyPair> {
        let generator = *self;
        debug!("Generating {}-bit Paillier election keys", generator.modulus_bits);
        let private_key =
            task::spawn_blocking(move || generator.generate(&mut rand::thread_rng())).await?;
        Ok(KeyPair {
            public_key: private_key.public_key().to_string(),
            private_key: private_key.to_string(),
        })
    }
}
