//! Universal hash family `((A*x + B) mod P) mod M`.

use crate::config::HashParams;
use crate::error::{EngineError, Result};
use rand::Rng;

/// One member of the universal hash family, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniversalHash {
    a: u64,
    b: u64,
    prime: u64,
    buckets: usize,
}

impl UniversalHash {
    /// Build a hash with explicit parameters.
    ///
    /// Fails with `InvalidConfig` unless `buckets > 0`, `prime >= 2`,
    /// `a` is in `[1, prime-1]` and `b` is in `[0, prime-1]`. Primality of
    /// `prime` is left to `EngineConfig::validate`.
    pub fn with_params(params: HashParams, prime: u64, buckets: usize) -> Result<Self> {
        check_shape(prime, buckets)?;
        if params.a == 0 || params.a >= prime || params.b >= prime {
            return Err(EngineError::InvalidConfig(format!(
                "hash parameters a={} b={} outside range for modulus {}",
                params.a, params.b, prime
            )));
        }
        Ok(Self {
            a: params.a,
            b: params.b,
            prime,
            buckets,
        })
    }

    /// Draw `A` and `B` once from the thread RNG.
    pub fn random(prime: u64, buckets: usize) -> Result<Self> {
        check_shape(prime, buckets)?;
        let mut rng = rand::thread_rng();
        let params = HashParams {
            a: rng.gen_range(1..prime),
            b: rng.gen_range(0..prime),
        };
        Self::with_params(params, prime, buckets)
    }

    pub fn params(&self) -> HashParams {
        HashParams {
            a: self.a,
            b: self.b,
        }
    }

    pub fn buckets(&self) -> usize {
        self.buckets
    }

    /// Bucket index for `x`, always in `0..buckets`.
    pub fn hash(&self, x: u64) -> usize {
        // u128 keeps A*x + B exact for any u64 input.
        let mixed = (self.a as u128 * x as u128 + self.b as u128) % self.prime as u128;
        (mixed % self.buckets as u128) as usize
    }
}

fn check_shape(prime: u64, buckets: usize) -> Result<()> {
    if buckets == 0 {
        return Err(EngineError::InvalidConfig("hash needs at least one bucket".into()));
    }
    if prime < 2 {
        return Err(EngineError::InvalidConfig(format!("hash modulus {} below 2", prime)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        let h = UniversalHash::with_params(HashParams { a: 3, b: 4 }, 13, 5).unwrap();
        // (3*2 + 4) % 13 = 10, 10 % 5 = 0
        assert_eq!(h.hash(2), 0);
        // (3*5 + 4) % 13 = 6, 6 % 5 = 1
        assert_eq!(h.hash(5), 1);
    }

    #[test]
    fn test_deterministic_after_draw() {
        let h = UniversalHash::random(1_000_003, 17).unwrap();
        for x in 0..1000u64 {
            assert_eq!(h.hash(x), h.hash(x));
            assert!(h.hash(x) < 17);
        }
    }

    #[test]
    fn test_random_params_in_range() {
        for _ in 0..100 {
            let h = UniversalHash::random(7, 3).unwrap();
            let HashParams { a, b } = h.params();
            assert!((1..7).contains(&a));
            assert!(b < 7);
        }
    }

    #[test]
    fn test_large_inputs_do_not_overflow() {
        let h = UniversalHash::with_params(HashParams { a: 1_000_002, b: 1_000_002 }, 1_000_003, 101)
            .unwrap();
        assert!(h.hash(u64::MAX) < 101);
    }

    #[test]
    fn test_rejects_unusable_shapes() {
        let params = HashParams { a: 3, b: 4 };
        for result in [
            UniversalHash::with_params(params, 13, 0),
            UniversalHash::with_params(params, 1, 5),
            UniversalHash::with_params(HashParams { a: 0, b: 4 }, 13, 5),
            UniversalHash::with_params(HashParams { a: 13, b: 4 }, 13, 5),
            UniversalHash::with_params(HashParams { a: 3, b: 13 }, 13, 5),
            UniversalHash::random(13, 0),
            UniversalHash::random(0, 5),
        ] {
            assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
        }
    }
}
