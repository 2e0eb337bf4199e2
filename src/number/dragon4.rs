//! Exact big-integer digit generation.
//!
//! Slow but always correct. Used when Grisu3 gives up, and directly for
//! `toFixed`, where the digit count is tied to the decimal point rather than
//! to the first significant digit.

use num_bigint::BigUint;

use super::grisu3::Double;

const LOG10_2: f64 = 0.301_029_995_663_981_2;

/// `v` as the exact fraction `num / den`
fn as_fraction(v: f64) -> (BigUint, BigUint) {
    let d = Double::new(v);
    let f = BigUint::from(d.significand());
    let e = d.exponent();
    if e >= 0 {
        (f << e as usize, BigUint::from(1u32))
    } else {
        (f, BigUint::from(1u32) << (-e) as usize)
    }
}

fn pow10(n: u32) -> BigUint {
    BigUint::from(10u32).pow(n)
}

/// Estimate of `ceil(log10(v))`, off by at most one
fn estimate_k(v: f64) -> i32 {
    let d = Double::new(v);
    let bits = 64 - d.significand().leading_zeros() as i32;
    ((d.exponent() + bits - 1) as f64 * LOG10_2).ceil() as i32
}

/// Shortest digit string that reads back as `v` under round-to-nearest-even.
/// `v` must be positive and finite. Returns digits and decimal point position.
pub(crate) fn shortest(v: f64) -> (Vec<u8>, i32) {
    let d = Double::new(v);
    let f = d.significand();
    let e = d.exponent();
    let even = f % 2 == 0;
    let one = BigUint::from(1u32);

    let big_f = BigUint::from(f);
    let (mut r, mut s, mut m_plus, mut m_minus) = if e >= 0 {
        let be = &one << e as usize;
        if !d.lower_boundary_is_closer() {
            (&big_f * &be * 2u32, BigUint::from(2u32), be.clone(), be)
        } else {
            (
                &big_f * &be * 4u32,
                BigUint::from(4u32),
                &be * 2u32,
                be,
            )
        }
    } else if !d.lower_boundary_is_closer() {
        (
            &big_f * 2u32,
            &one << (1 - e) as usize,
            one.clone(),
            one.clone(),
        )
    } else {
        (
            &big_f * 4u32,
            &one << (2 - e) as usize,
            BigUint::from(2u32),
            one.clone(),
        )
    };

    let mut k = estimate_k(v);
    if k >= 0 {
        s *= pow10(k as u32);
    } else {
        let scale = pow10((-k) as u32);
        r *= &scale;
        m_plus *= &scale;
        m_minus *= &scale;
    }

    let too_high = |r: &BigUint, m_plus: &BigUint, s: &BigUint| {
        let high = r + m_plus;
        if even { high >= *s } else { high > *s }
    };
    while too_high(&r, &m_plus, &s) {
        s *= 10u32;
        k += 1;
    }
    loop {
        let high = (&r + &m_plus) * 10u32;
        let too_low = if even { high < s } else { high <= s };
        if !too_low {
            break;
        }
        r *= 10u32;
        m_plus *= 10u32;
        m_minus *= 10u32;
        k -= 1;
    }

    let mut digits = Vec::with_capacity(17);
    loop {
        r *= 10u32;
        m_plus *= 10u32;
        m_minus *= 10u32;
        let digit_big = &r / &s;
        r %= &s;
        let digit = digit_big.iter_u32_digits().next().unwrap_or(0) as u8;
        let low_hit = if even { r <= m_minus } else { r < m_minus };
        let high_hit = {
            let high = &r + &m_plus;
            if even { high >= s } else { high > s }
        };
        match (low_hit, high_hit) {
            (false, false) => digits.push(b'0' + digit),
            (true, false) => {
                digits.push(b'0' + digit);
                break;
            }
            (false, true) => {
                digits.push(b'0' + digit + 1);
                break;
            }
            (true, true) => {
                let twice = &r * 2u32;
                if twice < s {
                    digits.push(b'0' + digit);
                } else {
                    digits.push(b'0' + digit + 1);
                }
                break;
            }
        }
        if digits.len() > 30 {
            break;
        }
    }
    (digits, k)
}

/// `v >= 10^j` for the exact value of `v`
fn at_least_pow10(num: &BigUint, den: &BigUint, j: i32) -> bool {
    if j >= 0 {
        *num >= den * pow10(j as u32)
    } else {
        num * pow10((-j) as u32) >= *den
    }
}

/// Divide with ties rounded away from zero
fn round_half_up(num: BigUint, den: &BigUint) -> BigUint {
    let q = &num / den;
    let rem = num % den;
    if rem * 2u32 >= *den { q + 1u32 } else { q }
}

/// Exactly `count` significant digits of positive finite `v`, ties rounded up
pub(crate) fn counted(v: f64, count: usize) -> (Vec<u8>, i32) {
    let (num, den) = as_fraction(v);
    // k such that 10^(k-1) <= v < 10^k
    let mut k = estimate_k(v);
    while at_least_pow10(&num, &den, k) {
        k += 1;
    }
    while !at_least_pow10(&num, &den, k - 1) {
        k -= 1;
    }

    let shift = count as i32 - k;
    let q = if shift >= 0 {
        round_half_up(num * pow10(shift as u32), &den)
    } else {
        round_half_up(num, &(den * pow10((-shift) as u32)))
    };
    let mut text = q.to_str_radix(10).into_bytes();
    if text.len() > count {
        text.truncate(count);
        k += 1;
    }
    while text.len() < count {
        text.push(b'0');
    }
    (text, k)
}

/// Decimal digits of `round(v * 10^fraction_digits)` for non-negative `v`,
/// ties rounded up
pub(crate) fn fixed(v: f64, fraction_digits: u32) -> String {
    let (num, den) = as_fraction(v);
    round_half_up(num * pow10(fraction_digits), &den).to_str_radix(10)
}
