//! Engine configuration.
//!
//! The group count, hash table size and hashing prime are fixed for the
//! lifetime of an engine. Everything is checked here, before any structure
//! is built.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Explicit universal-hash parameters `A` and `B`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashParams {
    pub a: u64,
    pub b: u64,
}

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of interest groups (`MG`).
    /// Default: 64
    pub groups: usize,

    /// Number of subscriber directory buckets (`M`).
    /// Default: 101
    pub table_size: usize,

    /// Prime modulus for the universal hash (`P`).
    /// Default: 1_000_003
    pub prime: u64,

    /// Fixed hash parameters (None = drawn randomly at construction).
    pub hash_params: Option<HashParams>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            groups: 64,
            table_size: 101,
            prime: 1_000_003,
            hash_params: None,
        }
    }
}

impl EngineConfig {
    /// Config with the given sizes and randomly drawn hash parameters.
    pub fn new(groups: usize, table_size: usize, prime: u64) -> Self {
        Self {
            groups,
            table_size,
            prime,
            hash_params: None,
        }
    }

    /// Pin the hash parameters, making bucket placement reproducible.
    pub fn with_hash_params(mut self, a: u64, b: u64) -> Self {
        self.hash_params = Some(HashParams { a, b });
        self
    }

    /// Parse a JSON config document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.groups == 0 {
            return Err(EngineError::InvalidConfig("group count must be > 0".into()));
        }
        if self.table_size == 0 {
            return Err(EngineError::InvalidConfig("table size must be > 0".into()));
        }
        if !is_prime(self.prime) {
            return Err(EngineError::InvalidConfig(format!(
                "hash modulus {} is not prime",
                self.prime
            )));
        }
        if let Some(HashParams { a, b }) = self.hash_params {
            if a == 0 || a >= self.prime {
                return Err(EngineError::InvalidConfig(format!(
                    "hash parameter a={} outside [1, {}]",
                    a,
                    self.prime - 1
                )));
            }
            if b >= self.prime {
                return Err(EngineError::InvalidConfig(format!(
                    "hash parameter b={} outside [0, {}]",
                    b,
                    self.prime - 1
                )));
            }
        }
        Ok(())
    }
}

/// Deterministic Miller-Rabin over the full `u64` range.
///
/// The first twelve primes as witnesses decide every `n < 3.3 * 10^24`.
fn is_prime(n: u64) -> bool {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

    if n < 2 {
        return false;
    }
    for p in WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }

    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    'witness: for a in WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    (a as u128 * b as u128 % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut acc = 1;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    acc
}
