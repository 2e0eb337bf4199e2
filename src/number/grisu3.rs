//! Grisu3 fast path for shortest and fixed-count digit generation.
//!
//! Grisu3 produces the correct result or reports that it cannot decide;
//! callers fall back to Dragon4 in that case.

use std::sync::OnceLock;

use num_bigint::BigUint;

const SIGNIFICAND_SIZE: i32 = 64;
const MIN_TARGET_EXPONENT: i32 = -60;
const MAX_TARGET_EXPONENT: i32 = -32;
const CACHED_POWERS_OFFSET: i32 = 348;
const DECIMAL_EXPONENT_DISTANCE: i32 = 8;
const CACHED_POWERS_COUNT: usize = 87;
const D_1_LOG2_10: f64 = 0.301_029_995_663_981_14;

const PHYSICAL_SIGNIFICAND_SIZE: u32 = 52;
const HIDDEN_BIT: u64 = 1 << PHYSICAL_SIGNIFICAND_SIZE;
const SIGNIFICAND_MASK: u64 = HIDDEN_BIT - 1;
const EXPONENT_BIAS: i32 = 0x3FF + PHYSICAL_SIGNIFICAND_SIZE as i32;
const DENORMAL_EXPONENT: i32 = -EXPONENT_BIAS + 1;

/// A floating point number with a 64-bit significand and no implicit bit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DiyFp {
    pub f: u64,
    pub e: i32,
}

impl DiyFp {
    fn minus(self, other: DiyFp) -> DiyFp {
        DiyFp {
            f: self.f.wrapping_sub(other.f),
            e: self.e,
        }
    }

    fn times(self, other: DiyFp) -> DiyFp {
        let product = (self.f as u128) * (other.f as u128);
        let rounded = (product + (1u128 << 63)) >> 64;
        DiyFp {
            f: rounded as u64,
            e: self.e + other.e + 64,
        }
    }

    fn normalize(self) -> DiyFp {
        let shift = self.f.leading_zeros();
        DiyFp {
            f: self.f << shift,
            e: self.e - shift as i32,
        }
    }
}

/// Decomposed IEEE double
pub(crate) struct Double(pub u64);

impl Double {
    pub fn new(v: f64) -> Self {
        Double(v.to_bits())
    }

    fn biased_exponent(&self) -> i32 {
        ((self.0 >> PHYSICAL_SIGNIFICAND_SIZE) & 0x7FF) as i32
    }

    pub fn exponent(&self) -> i32 {
        if self.biased_exponent() == 0 {
            DENORMAL_EXPONENT
        } else {
            self.biased_exponent() - EXPONENT_BIAS
        }
    }

    pub fn significand(&self) -> u64 {
        let fraction = self.0 & SIGNIFICAND_MASK;
        if self.biased_exponent() == 0 {
            fraction
        } else {
            fraction + HIDDEN_BIT
        }
    }

    /// The lower boundary is closer when the significand is a power of two
    pub fn lower_boundary_is_closer(&self) -> bool {
        (self.0 & SIGNIFICAND_MASK) == 0 && self.biased_exponent() > 1
    }

    fn as_diy_fp(&self) -> DiyFp {
        DiyFp {
            f: self.significand(),
            e: self.exponent(),
        }
    }

    fn normalized_boundaries(&self) -> (DiyFp, DiyFp) {
        let v = self.as_diy_fp();
        let plus = DiyFp {
            f: (v.f << 1) + 1,
            e: v.e - 1,
        }
        .normalize();
        let minus = if self.lower_boundary_is_closer() {
            DiyFp {
                f: (v.f << 2) - 1,
                e: v.e - 2,
            }
        } else {
            DiyFp {
                f: (v.f << 1) - 1,
                e: v.e - 1,
            }
        };
        let minus = DiyFp {
            f: minus.f << (minus.e - plus.e),
            e: plus.e,
        };
        (minus, plus)
    }
}

#[derive(Clone, Copy)]
struct CachedPower {
    significand: u64,
    binary_exponent: i32,
    decimal_exponent: i32,
}

/// Normalized 64-bit approximations of 10^k for k = -348, -340, ..., 340,
/// rounded to nearest.
fn cached_powers() -> &'static [CachedPower] {
    static POWERS: OnceLock<Vec<CachedPower>> = OnceLock::new();
    POWERS.get_or_init(|| {
        (0..CACHED_POWERS_COUNT)
            .map(|i| {
                let decimal_exponent = -CACHED_POWERS_OFFSET + i as i32 * DECIMAL_EXPONENT_DISTANCE;
                let (significand, binary_exponent) = power_of_ten(decimal_exponent);
                CachedPower {
                    significand,
                    binary_exponent,
                    decimal_exponent,
                }
            })
            .collect()
    })
}

fn power_of_ten(k: i32) -> (u64, i32) {
    let ten = BigUint::from(10u32);
    let one = BigUint::from(1u32);
    if k >= 0 {
        let x = ten.pow(k as u32);
        let bits = x.bits() as i32;
        if bits <= 64 {
            let shift = 64 - bits;
            let f = to_u64(&(x << shift as usize));
            return (f, -shift);
        }
        let shift = (bits - 64) as usize;
        let mut f = to_u64(&(&x >> shift));
        let half = (&x >> (shift - 1)) & &one;
        let mut e = shift as i32;
        if half == one {
            match f.checked_add(1) {
                Some(v) => f = v,
                None => {
                    f = 1 << 63;
                    e += 1;
                }
            }
        }
        (f, e)
    } else {
        let p = ten.pow((-k) as u32);
        let b = p.bits() as usize;
        let numerator = &one << (63 + b);
        let q = &numerator / &p;
        let r = &numerator % &p;
        let mut f = to_u64(&q);
        let mut e = -((63 + b) as i32);
        if r * 2u32 >= p {
            match f.checked_add(1) {
                Some(v) => f = v,
                None => {
                    f = 1 << 63;
                    e += 1;
                }
            }
        }
        (f, e)
    }
}

fn to_u64(x: &BigUint) -> u64 {
    x.iter_u64_digits().next().unwrap_or(0)
}

fn cached_power_for_binary_exponent_range(min_exponent: i32) -> (DiyFp, i32) {
    let k = ((min_exponent + SIGNIFICAND_SIZE - 1) as f64 * D_1_LOG2_10).ceil() as i32;
    let index = ((CACHED_POWERS_OFFSET + k - 1) / DECIMAL_EXPONENT_DISTANCE + 1) as usize;
    let powers = cached_powers();
    let cp = powers
        .get(index.min(CACHED_POWERS_COUNT - 1))
        .copied()
        .unwrap_or(CachedPower {
            significand: 1 << 63,
            binary_exponent: -63,
            decimal_exponent: 0,
        });
    (
        DiyFp {
            f: cp.significand,
            e: cp.binary_exponent,
        },
        cp.decimal_exponent,
    )
}

/// Largest power of ten not above `number`, and its exponent plus one
fn biggest_power_ten(number: u32) -> (u32, i32) {
    let mut power: u32 = 1;
    let mut exponent_plus_one = 1;
    while let Some(next) = power.checked_mul(10) {
        if next > number {
            break;
        }
        power = next;
        exponent_plus_one += 1;
    }
    if number == 0 {
        return (0, 0);
    }
    (power, exponent_plus_one)
}

fn round_weed(
    buffer: &mut [u8],
    distance_too_high_w: u64,
    unsafe_interval: u64,
    mut rest: u64,
    ten_kappa: u64,
    unit: u64,
) -> bool {
    let small_distance = distance_too_high_w.wrapping_sub(unit);
    let big_distance = distance_too_high_w.wrapping_add(unit);
    while rest < small_distance
        && unsafe_interval - rest >= ten_kappa
        && (rest + ten_kappa < small_distance
            || small_distance - rest >= rest + ten_kappa - small_distance)
    {
        match buffer.last_mut() {
            Some(d) => *d -= 1,
            None => return false,
        }
        rest += ten_kappa;
    }
    if rest < big_distance
        && unsafe_interval - rest >= ten_kappa
        && (rest + ten_kappa < big_distance
            || big_distance - rest > rest + ten_kappa - big_distance)
    {
        return false;
    }
    match unsafe_interval.checked_sub(unit.saturating_mul(4)) {
        Some(upper) => unit.saturating_mul(2) <= rest && rest <= upper,
        None => false,
    }
}

fn digit_gen(low: DiyFp, w: DiyFp, high: DiyFp, buffer: &mut Vec<u8>) -> Option<i32> {
    let mut unit: u64 = 1;
    let too_low = DiyFp {
        f: low.f - unit,
        e: low.e,
    };
    let too_high = DiyFp {
        f: high.f.wrapping_add(unit),
        e: high.e,
    };
    let mut unsafe_interval = too_high.minus(too_low);
    let one_shift = (-w.e) as u32;
    let one_f: u64 = 1 << one_shift;
    let mut integrals = (too_high.f >> one_shift) as u32;
    let mut fractionals = too_high.f & (one_f - 1);
    let (mut divisor, mut kappa) = biggest_power_ten(integrals);

    while kappa > 0 {
        let digit = integrals / divisor;
        buffer.push(b'0' + digit as u8);
        integrals %= divisor;
        kappa -= 1;
        let rest = ((integrals as u64) << one_shift) + fractionals;
        if rest < unsafe_interval.f {
            let ok = round_weed(
                buffer,
                too_high.minus(w).f,
                unsafe_interval.f,
                rest,
                (divisor as u64) << one_shift,
                unit,
            );
            return ok.then_some(kappa);
        }
        divisor /= 10;
    }

    loop {
        fractionals = fractionals.wrapping_mul(10);
        unit = unit.wrapping_mul(10);
        unsafe_interval.f = unsafe_interval.f.wrapping_mul(10);
        let digit = (fractionals >> one_shift) as u8;
        buffer.push(b'0' + digit);
        fractionals &= one_f - 1;
        kappa -= 1;
        if fractionals < unsafe_interval.f {
            let ok = round_weed(
                buffer,
                too_high.minus(w).f.wrapping_mul(unit),
                unsafe_interval.f,
                fractionals,
                one_f,
                unit,
            );
            return ok.then_some(kappa);
        }
        if buffer.len() > 20 {
            return None;
        }
    }
}

fn round_weed_counted(
    buffer: &mut [u8],
    rest: u64,
    ten_kappa: u64,
    unit: u64,
    kappa: &mut i32,
) -> bool {
    if unit >= ten_kappa || ten_kappa - unit <= unit {
        return false;
    }
    if ten_kappa - rest > rest && ten_kappa - 2 * rest >= unit.saturating_mul(2) {
        return true;
    }
    if rest > unit && ten_kappa - (rest - unit) <= rest - unit {
        let len = buffer.len();
        if let Some(d) = buffer.last_mut() {
            *d += 1;
        }
        for i in (1..len).rev() {
            let carry = buffer.get(i).is_some_and(|&d| d == b'0' + 10);
            if !carry {
                break;
            }
            if let Some(d) = buffer.get_mut(i) {
                *d = b'0';
            }
            if let Some(d) = buffer.get_mut(i - 1) {
                *d += 1;
            }
        }
        if let Some(first) = buffer.first_mut() {
            if *first == b'0' + 10 {
                *first = b'1';
                *kappa += 1;
            }
        }
        return true;
    }
    false
}

fn digit_gen_counted(w: DiyFp, mut requested: usize, buffer: &mut Vec<u8>) -> Option<i32> {
    let mut w_error: u64 = 1;
    let one_shift = (-w.e) as u32;
    let one_f: u64 = 1 << one_shift;
    let mut integrals = (w.f >> one_shift) as u32;
    let mut fractionals = w.f & (one_f - 1);
    let (mut divisor, mut kappa) = biggest_power_ten(integrals);

    while kappa > 0 {
        let digit = integrals / divisor;
        buffer.push(b'0' + digit as u8);
        requested -= 1;
        integrals %= divisor;
        kappa -= 1;
        if requested == 0 {
            break;
        }
        divisor /= 10;
    }

    if requested == 0 {
        let rest = ((integrals as u64) << one_shift) + fractionals;
        let ok = round_weed_counted(
            buffer,
            rest,
            (divisor as u64) << one_shift,
            w_error,
            &mut kappa,
        );
        return ok.then_some(kappa);
    }

    while requested > 0 && fractionals > w_error {
        fractionals *= 10;
        w_error = w_error.saturating_mul(10);
        let digit = (fractionals >> one_shift) as u8;
        buffer.push(b'0' + digit);
        requested -= 1;
        fractionals &= one_f - 1;
        kappa -= 1;
    }
    if requested != 0 {
        return None;
    }
    let ok = round_weed_counted(buffer, fractionals, one_f, w_error, &mut kappa);
    ok.then_some(kappa)
}

/// Shortest digits that round-trip to `v` (positive, finite, non-zero).
/// Returns the digits and the decimal point position, or `None` when
/// Grisu3 cannot guarantee the result.
pub(crate) fn shortest(v: f64) -> Option<(Vec<u8>, i32)> {
    let d = Double::new(v);
    let w = d.as_diy_fp().normalize();
    let (minus, plus) = d.normalized_boundaries();
    let min_exp = MIN_TARGET_EXPONENT - (w.e + SIGNIFICAND_SIZE);
    let (ten_mk, mk) = cached_power_for_binary_exponent_range(min_exp);
    let scaled_w = w.times(ten_mk);
    if !(MIN_TARGET_EXPONENT..=MAX_TARGET_EXPONENT).contains(&scaled_w.e) {
        return None;
    }
    let scaled_minus = minus.times(ten_mk);
    let scaled_plus = plus.times(ten_mk);
    let mut buffer = Vec::with_capacity(18);
    let kappa = digit_gen(scaled_minus, scaled_w, scaled_plus, &mut buffer)?;
    let exponent = -mk + kappa;
    Some((buffer.clone(), exponent + buffer.len() as i32))
}

/// Exactly `count` correctly rounded digits of `v`, or `None` when Grisu3
/// cannot decide the rounding.
pub(crate) fn counted(v: f64, count: usize) -> Option<(Vec<u8>, i32)> {
    if count == 0 {
        return None;
    }
    let d = Double::new(v);
    let w = d.as_diy_fp().normalize();
    let min_exp = MIN_TARGET_EXPONENT - (w.e + SIGNIFICAND_SIZE);
    let (ten_mk, mk) = cached_power_for_binary_exponent_range(min_exp);
    let scaled_w = w.times(ten_mk);
    if !(MIN_TARGET_EXPONENT..=MAX_TARGET_EXPONENT).contains(&scaled_w.e) {
        return None;
    }
    let mut buffer = Vec::with_capacity(count);
    let kappa = digit_gen_counted(scaled_w, count, &mut buffer)?;
    let exponent = -mk + kappa;
    Some((buffer.clone(), exponent + buffer.len() as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits(v: f64) -> Option<(String, i32)> {
        shortest(v).map(|(d, p)| (String::from_utf8_lossy(&d).into_owned(), p))
    }

    #[test]
    fn cached_power_of_one() {
        let (f, e) = power_of_ten(0);
        assert_eq!(f, 1 << 63);
        assert_eq!(e, -63);
    }

    #[test]
    fn shortest_simple_values() {
        assert_eq!(digits(1.0), Some(("1".to_string(), 1)));
        assert_eq!(digits(0.5), Some(("5".to_string(), 0)));
        assert_eq!(digits(123.456), Some(("123456".to_string(), 3)));
    }

    #[test]
    fn shortest_point_one_plus_point_two() {
        assert_eq!(
            digits(0.1 + 0.2),
            Some(("30000000000000004".to_string(), 0))
        );
    }

    #[test]
    fn counted_rounds() {
        let (d, p) = counted(1.0 / 3.0, 5).unwrap_or_default();
        assert_eq!(String::from_utf8_lossy(&d), "33333");
        assert_eq!(p, 0);
    }
}
