//! Factor refinement sieve.
//!
//! Given residues `a` and `b` modulo `n`, the sieve looks for a small `c`
//! such that `a + c * b` is a unit modulo `n`. It works against a list of
//! factors covering the prime support of `n` rather than the prime
//! factorization itself, so whenever a gcd reveals a proper divisor of one of
//! the factors, that factor is split and the caller retries with the finer
//! list.

use log::{trace, warn};
use num_bigint::BigInt;
use num_traits::{One, ToPrimitive, Zero};

use crate::config::SieveConfig;
use crate::error::{MatrixError, Result};
use crate::integer::{extended_greatest_common_divisor, greatest_common_divisor, modulo};

/// The outcome of one sieve attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Refinement {
    /// A finer list of factors. Sorted and without duplicates.
    Factors(Vec<BigInt>),

    /// A `c` with `a + c * b` coprime to every factor.
    Coefficient(BigInt),
}

/// The residues of `a` and `b` modulo a single factor.
struct Residue<'a> {
    factor: &'a BigInt,
    a: BigInt,
    b: BigInt,

    /// Bezout coefficient of `b` in `gcd(b, factor)`.
    /// The inverse of `b` modulo the factor if `b` is a unit.
    inverse: BigInt,
}

/// The number of candidates that are sieved for modulus `n`.
fn sieve_bound(n: &BigInt, multiplier: f64) -> usize {
    if *n == BigInt::from(2) {
        return 1;
    }

    let log2 = match n.to_f64() {
        Some(f) if f.is_finite() => f.log2(),
        _ => n.bits() as f64,
    };
    let k = multiplier * log2 * log2.ln().powi(2);
    (k.floor() as usize).max(1)
}

/// Replaces `factors[i]` by `d` and `factors[i] / d`.
fn split(factors: &[BigInt], i: usize, d: &BigInt) -> Vec<BigInt> {
    let mut refined = factors.to_vec();
    refined[i] = d.clone();
    refined.push(&factors[i] / d);
    refined.sort();
    refined.dedup();
    trace!("Split factor {} into {} and {}", factors[i], d, &factors[i] / d);
    refined
}

/// Runs one pass of the sieve over the candidates `0..=bound`.
/// Returns `None` if every candidate was ruled out.
fn sieve(
    residues: &[Residue<'_>],
    factors: &[BigInt],
    bound: usize,
) -> Result<Option<Refinement>> {
    let mut admissible = vec![true; bound + 1];

    // For a unit `b` there is exactly one bad `c` modulo each factor.
    for r in residues.iter().filter(|r| !r.b.is_zero()) {
        let start = modulo(&(-&r.a * &r.inverse), r.factor)?;
        let Some(mut idx) = start.to_usize() else {
            continue;
        };
        let step = r.factor.to_usize();
        while idx <= bound {
            admissible[idx] = false;
            match step.and_then(|s| idx.checked_add(s)) {
                Some(next) => idx = next,
                None => break,
            }
        }
    }

    'candidates: for c in (0..=bound).filter(|&c| admissible[c]) {
        let c = BigInt::from(c);
        for (i, r) in residues.iter().enumerate() {
            let g = greatest_common_divisor(&(&r.a + &c * &r.b), r.factor);
            if g == *r.factor {
                continue 'candidates;
            }
            if !g.is_one() {
                return Ok(Some(Refinement::Factors(split(factors, i, &g))));
            }
        }
        return Ok(Some(Refinement::Coefficient(c)));
    }

    Ok(None)
}

/// Finds a `c` such that `a + c * b` is coprime to every factor, or a finer
/// factor list.
///
/// `factors` has to cover the prime support of the modulus `n` and every
/// factor has to be greater than one. The number of candidates starts at
/// roughly `multiplier * log(n) * log(log(n))^2` and is doubled whenever
/// every candidate is ruled out.
pub fn refine(
    a: &BigInt,
    b: &BigInt,
    n: &BigInt,
    factors: &[BigInt],
    config: &SieveConfig,
) -> Result<Refinement> {
    let mut residues = Vec::with_capacity(factors.len());
    for (i, f) in factors.iter().enumerate() {
        let a = modulo(a, f)?;
        let b = modulo(b, f)?;
        let (g, inverse, _) = extended_greatest_common_divisor(&b, f);
        if !g.is_one() && g != *f {
            return Ok(Refinement::Factors(split(factors, i, &g)));
        }
        residues.push(Residue { factor: f, a, b, inverse });
    }

    let mut multiplier = f64::from(config.multiplier);
    let mut bound = 0;
    for _ in 0..config.max_rounds {
        bound = sieve_bound(n, multiplier);
        if bound > config.max_bound {
            break;
        }

        if let Some(r) = sieve(&residues, factors, bound)? {
            return Ok(r);
        }

        multiplier *= 2.0;
    }

    warn!("Factor refinement for modulus {n} gave up at sieve bound {bound}");
    Err(MatrixError::RefinementExhausted { modulus: n.clone(), bound })
}

/// Keeps refining `factors` until the sieve returns a coefficient.
pub(crate) fn unit_coefficient(
    a: &BigInt,
    b: &BigInt,
    n: &BigInt,
    factors: &mut Vec<BigInt>,
    config: &SieveConfig,
) -> Result<BigInt> {
    loop {
        match refine(a, b, n, factors, config)? {
            Refinement::Factors(refined) => *factors = refined,
            Refinement::Coefficient(c) => return Ok(c),
        }
    }
}

/// Returns `c` such that `gcd(a + c[0] * bs[0] + c[1] * bs[1] + ..., n)`
/// equals `gcd(a, bs[0], bs[1], ..., n)`.
///
/// `n` has to be positive.
pub fn combination_coefficients(
    a: &BigInt,
    bs: &[BigInt],
    n: &BigInt,
    config: &SieveConfig,
) -> Result<Vec<BigInt>> {
    if n.is_one() {
        return Ok(vec![BigInt::zero(); bs.len()]);
    }

    let mut factors = vec![n.clone()];
    let mut ahat = a.clone();
    let mut coefficients = Vec::with_capacity(bs.len());
    for b in bs {
        let g = greatest_common_divisor(&ahat, b);
        if g.is_zero() {
            coefficients.push(BigInt::zero());
            continue;
        }

        let a_prime = modulo(&(&ahat / &g), n)?;
        let b_prime = modulo(&(b / &g), n)?;
        let c = unit_coefficient(&a_prime, &b_prime, n, &mut factors, config)?;
        ahat = modulo(&(&ahat + &c * b), n)?;
        coefficients.push(c);
    }

    Ok(coefficients)
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng as _;
    use rand::distr::{Distribution as _, Uniform};
    use rand::rngs::StdRng;

    fn big(v: i64) -> BigInt {
        v.into()
    }

    #[test]
    fn reveals_divisor_of_modulus() {
        let cfg = SieveConfig::default();
        let r = refine(&big(1), &big(2), &big(6), &[big(6)], &cfg).unwrap();
        assert_eq!(r, Refinement::Factors(vec![big(2), big(3)]));

        // Refining a factor that is already in the list drops the duplicate.
        let r = refine(&big(1), &big(3), &big(18), &[big(3), big(6)], &cfg).unwrap();
        assert_eq!(r, Refinement::Factors(vec![big(2), big(3)]));
    }

    #[test]
    fn finds_coefficient() {
        let cfg = SieveConfig::default();
        let r = refine(&big(0), &big(1), &big(7), &[big(7)], &cfg).unwrap();
        assert_eq!(r, Refinement::Coefficient(big(1)));

        let r = refine(&big(0), &big(1), &big(2), &[big(2)], &cfg).unwrap();
        assert_eq!(r, Refinement::Coefficient(big(1)));

        let r = refine(&big(3), &big(0), &big(7), &[big(7)], &cfg).unwrap();
        assert_eq!(r, Refinement::Coefficient(big(0)));
    }

    #[test]
    fn tiny_caps_exhaust() {
        let cfg = SieveConfig { max_bound: 0, ..SieveConfig::default() };
        let r = refine(&big(1), &big(1), &big(7), &[big(7)], &cfg);
        assert_eq!(
            r,
            Err(MatrixError::RefinementExhausted { modulus: big(7), bound: 8 })
        );

        let cfg = SieveConfig { max_rounds: 0, ..SieveConfig::default() };
        let r = refine(&big(1), &big(1), &big(7), &[big(7)], &cfg);
        assert!(matches!(r, Err(MatrixError::RefinementExhausted { .. })));
    }

    #[test]
    fn trivial_modulus() {
        let c = combination_coefficients(
            &big(5),
            &[big(3), big(-4)],
            &big(1),
            &SieveConfig::default(),
        )
        .unwrap();
        assert_eq!(c, vec![big(0), big(0)]);
    }

    #[test]
    fn combination_captures_gcd() {
        let rng = &mut StdRng::seed_from_u64(0);
        let entries = Uniform::new_inclusive(-60i64, 60).unwrap();
        let moduli = Uniform::new_inclusive(2i64, 360).unwrap();
        let cfg = SieveConfig::default();

        for _ in 0..500 {
            let n = big(moduli.sample(rng));
            let a = big(entries.sample(rng));
            let bs: Vec<_> = (0..3).map(|_| big(entries.sample(rng))).collect();

            let c = combination_coefficients(&a, &bs, &n, &cfg).unwrap();
            let combined = bs.iter().zip(&c).fold(a.clone(), |acc, (b, c)| acc + b * c);

            let expected = bs
                .iter()
                .fold(greatest_common_divisor(&a, &n), |acc, b| {
                    greatest_common_divisor(&acc, b)
                });
            assert_eq!(
                greatest_common_divisor(&combined, &n),
                expected,
                "a = {a}, bs = {bs:?}, n = {n}, c = {c:?}"
            );
        }
    }
}
