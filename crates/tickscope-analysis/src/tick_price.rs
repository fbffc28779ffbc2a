//! Exact price ↔ tick conversion.
//!
//! ## Math
//!
//! A concentrated-liquidity pool prices tick $t$ at $1.0001^t$, so a CEX price
//! maps onto the tick axis via
//!
//! $$tick(p) = \log_{1.0001}\left(\frac{10^D}{p}\right)$$
//!
//! where $D$ is the pool's combined decimal-adjustment exponent (12 for
//! USDC/ETH). The inverse is $price(t) = 10^D / 1.0001^t$.
//!
//! ## No f64 in Computation
//!
//! Double precision cannot discriminate ticks reliably across the full
//! ±900 000 domain, so everything here is integer fixed point:
//!
//! - decimal price strings parse to an exact `U256` numerator/denominator;
//! - the base-2 logarithm comes from iterative squaring of a mantissa
//!   normalized to `[2^127, 2^128)` (64 fractional bits out, 127-bit working
//!   precision), the same scheme Uniswap's own tick math uses;
//! - one Q64.64 multiply by `1/log2(1.0001)` converts base 2 to base 1.0001;
//! - `1.0001^t` is binary exponentiation over 127-bit-normalized reciprocal
//!   powers with an explicit power-of-two exponent, so the entire tick domain
//!   stays representable.
//!
//! `f64` appears only in [`Tick64::to_f64`] and [`price_from_tick`], both of
//! which feed presentation.

use alloy::primitives::U256;
use eyre::{eyre, Result};

/// Largest tick magnitude accepted; slightly beyond the on-chain ±887272.
pub const MAX_TICK_MAGNITUDE: i64 = 1_000_000;

/// `round(2^64 * ln(2) / ln(1.0001))`: converts a Q64.64 base-2 log into a
/// Q64.64 tick count.
const INV_LOG2_BASE_X64: u128 = 127_869_479_499_801_913_173_570;

/// `1.0001^(-2^i)` for `i in 0..20`, as `(mantissa limbs, exp2)` with the
/// mantissa normalized to `[2^127, 2^128)`: value = mantissa / 2^127 · 2^exp2.
const POW_RECIP: [([u64; 4], i32); 20] = [
    ([0x59a46990580e213a, 0xfff97272373d4132, 0x0, 0x0], -1),
    ([0xef12357cf3c7fdcc, 0xfff2e50f5f656932, 0x0, 0x0], -1),
    ([0x1c3624eaa0941cd0, 0xffe5caca7e10e4e6, 0x0, 0x0], -1),
    ([0xc9db58835c926644, 0xffcb9843d60f6159, 0x0, 0x0], -1),
    ([0x472e6896dfb254c0, 0xff973b41fa98c081, 0x0, 0x0], -1),
    ([0x43ec78b326b52861, 0xff2ea16466c96a38, 0x0, 0x0], -1),
    ([0x11c461f1969c3053, 0xfe5dee046a99a2a8, 0x0, 0x0], -1),
    ([0xdcffc83b479aa3a4, 0xfcbe86c7900a88ae, 0x0, 0x0], -1),
    ([0x6f2b074cf7815e54, 0xf987a7253ac41317, 0x0, 0x0], -1),
    ([0x940c7a398e4b70f3, 0xf3392b0822b70005, 0x0, 0x0], -1),
    ([0x43b29c7fa6e889d9, 0xe7159475a2c29b74, 0x0, 0x0], -1),
    ([0x845ad8f792aa5825, 0xd097f3bdfd2022b8, 0x0, 0x0], -1),
    ([0x8a65dc1f90e061e5, 0xa9f746462d870fdf, 0x0, 0x0], -1),
    ([0x21767bec575e65ee, 0xe1b0d342ada54371, 0x0, 0x0], -2),
    ([0x048c541550bf3e96, 0xc6f84d7e5f423f66, 0x0, 0x0], -3),
    ([0x677de54f3e99bc90, 0x9aa508b5b7a84e1c, 0x0, 0x0], -5),
    ([0x33865244bdcc089c, 0xbad5f1bdb70232cd, 0x0, 0x0], -10),
    ([0x98106fb7fa5edd37, 0x885b9613d7e87aa4, 0x0, 0x0], -19),
    ([0x89d1f447715afacd, 0x9142e0723efb8848, 0x0, 0x0], -38),
    ([0x8f140bd96e8e6815, 0xa4d9a773d6131691, 0x0, 0x0], -76),
];

/// A tick coordinate in Q64.64 signed fixed point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick64 {
    x64: i128,
}

impl Tick64 {
    /// Presentation-layer conversion; the only place this type becomes float.
    pub fn to_f64(self) -> f64 {
        self.x64 as f64 / 18_446_744_073_709_551_616.0
    }

    /// Floor to the nearest integer tick.
    pub fn floor(self) -> i64 {
        (self.x64 >> 64) as i64
    }
}

fn one_shl(bits: usize) -> U256 {
    U256::from(1u8) << bits
}

/// Base-2 logarithm of `num/den` in signed Q64.64.
///
/// Inputs above 128 significant bits are truncated to 128 bits first (a
/// relative error below 2^-127); the result carries 64 fractional bits.
fn log2_x64(num: U256, den: U256) -> Result<i128> {
    if num.is_zero() || den.is_zero() {
        return Err(eyre!("log2 requires a positive finite ratio"));
    }

    let mut n = num;
    let mut d = den;
    let mut exp_adjust: i32 = 0;
    if n.bit_len() > 128 {
        let shift = n.bit_len() - 128;
        n >>= shift;
        exp_adjust += shift as i32;
    }
    if d.bit_len() > 128 {
        let shift = d.bit_len() - 128;
        d >>= shift;
        exp_adjust -= shift as i32;
    }

    // Normalize r = n/d into [2^127, 2^128), tracking the integer exponent.
    let mut exp = n.bit_len() as i32 - d.bit_len() as i32;
    let shift = (127 - exp) as usize;
    let mut r = (n << shift) / d;
    if r >= one_shl(128) {
        r >>= 1;
        exp += 1;
    }
    if r < one_shl(127) {
        r <<= 1;
        exp -= 1;
    }
    exp += exp_adjust;

    // Squaring doubles the exponent; the overflow bit of each square is the
    // next fractional bit of log2.
    let mut frac: u128 = 0;
    for bit in (0..64).rev() {
        r = (r * r) >> 127;
        if r >= one_shl(128) {
            frac |= 1u128 << bit;
            r >>= 1;
        }
    }

    Ok((exp as i128) << 64 | frac as i128)
}

/// Converts an exact positive ratio `num/den` to its tick coordinate:
/// `log_1.0001(num/den)`.
///
/// # Errors
/// Returns error if either side is zero.
pub fn tick_from_ratio(num: U256, den: U256) -> Result<Tick64> {
    let log2 = log2_x64(num, den)?;
    let negative = log2 < 0;
    let magnitude: U256 = (U256::from(log2.unsigned_abs()) * U256::from(INV_LOG2_BASE_X64)) >> 64;
    let magnitude = magnitude.to::<u128>() as i128;
    Ok(Tick64 {
        x64: if negative { -magnitude } else { magnitude },
    })
}

/// Parses a positive decimal string into `(digits, scale)` with
/// `value = digits / 10^scale`. The fractional part is truncated beyond 40
/// digits; anything that deep is far below the conversion's precision.
fn parse_decimal(price: &str) -> Result<(U256, u32)> {
    let trimmed = price.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(eyre!("price must be a positive decimal: {price:?}"));
    }

    let (integral, fractional) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };
    if !integral.chars().all(|c| c.is_ascii_digit())
        || !fractional.chars().all(|c| c.is_ascii_digit())
    {
        return Err(eyre!("price is not a decimal number: {price:?}"));
    }

    // Budget significant digits: the fractional tail shrinks first, since
    // anything below ~40 digits is far beneath the conversion's precision.
    let integral_digits = integral.trim_start_matches('0').len();
    let keep = fractional
        .len()
        .min(40)
        .min(70usize.saturating_sub(integral_digits));
    let fractional = &fractional[..keep];
    let mut digits = String::with_capacity(integral.len() + fractional.len());
    digits.push_str(integral);
    digits.push_str(fractional);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Err(eyre!("price must be non-zero: {price:?}"));
    }
    if digits.len() > 77 {
        return Err(eyre!("price has too many significant digits: {price:?}"));
    }

    let value = U256::from_str_radix(digits, 10)
        .map_err(|e| eyre!("failed to parse price {price:?}: {e}"))?;
    Ok((value, fractional.len() as u32))
}

/// Converts a CEX price to its pool-tick equivalent:
/// `tick = log_1.0001(10^D / price)`.
///
/// `decimal_exponent` is the pool's combined decimal adjustment `D` (12 for
/// USDC/ETH). The price is an exact decimal string, e.g. `"3000"` or
/// `"3587.42"`.
///
/// # Errors
/// Returns error if the price is not a positive decimal or is so extreme the
/// exponent arithmetic would overflow.
pub fn tick_from_price(price: &str, decimal_exponent: u32) -> Result<Tick64> {
    let (digits, scale) = parse_decimal(price)?;
    let exponent = decimal_exponent + scale;
    if exponent > 77 {
        return Err(eyre!("combined decimal exponent {exponent} too large"));
    }
    let num = U256::from(10u8).pow(U256::from(exponent));
    tick_from_ratio(num, digits)
}

/// `1.0001^tick` as a normalized float: `(mantissa in [2^127, 2^128), exp2)`
/// with value = mantissa / 2^127 · 2^exp2.
fn pow_1_0001(tick: i64) -> Result<(U256, i32)> {
    if tick.abs() > MAX_TICK_MAGNITUDE {
        return Err(eyre!("tick {tick} outside supported range"));
    }
    if tick == 0 {
        return Ok((one_shl(127), 0));
    }

    // Build 1.0001^(-|tick|) from the reciprocal-power table, then invert for
    // positive ticks. Reciprocal factors are all below one, so the running
    // mantissa product never overflows 256 bits.
    let magnitude = tick.unsigned_abs();
    let mut mantissa = one_shl(127);
    let mut exp2: i32 = 0;
    for (i, (limbs, factor_exp)) in POW_RECIP.iter().enumerate() {
        if magnitude & (1 << i) == 0 {
            continue;
        }
        let factor = U256::from_limbs(*limbs);
        let product = (mantissa * factor) >> 127;
        if product >= one_shl(128) {
            mantissa = product >> 1;
            exp2 += factor_exp + 1;
        } else {
            mantissa = product;
            exp2 += factor_exp;
        }
    }

    if tick < 0 {
        return Ok((mantissa, exp2));
    }

    // Invert: 1 / (m/2^127 · 2^e) = (2^254/m) / 2^127 · 2^-e.
    let inverse = one_shl(254) / mantissa;
    if inverse >= one_shl(127) {
        Ok((inverse, -exp2))
    } else {
        Ok((inverse << 1, -exp2 - 1))
    }
}

fn u256_to_f64(value: U256) -> f64 {
    let bits = value.bit_len();
    if bits == 0 {
        return 0.0;
    }
    if bits <= 64 {
        return value.to::<u64>() as f64;
    }
    let shift = bits - 53;
    let top = (value >> shift).to::<u64>();
    top as f64 * 2f64.powi(shift as i32)
}

/// Converts an integer tick back to a price: `price = 10^D / 1.0001^tick`.
///
/// The conversion runs in fixed point and drops to `f64` only on the way out;
/// this is a presentation value (chart overlays, table output).
///
/// # Errors
/// Returns error if `tick` is outside the supported ±1 000 000 range.
pub fn price_from_tick(tick: i64, decimal_exponent: u32) -> Result<f64> {
    // 10^D / 1.0001^t = 10^D · 1.0001^(-t)
    let (mantissa, exp2) = pow_1_0001(
        tick.checked_neg()
            .ok_or_else(|| eyre!("tick {tick} outside supported range"))?,
    )?;
    Ok(u256_to_f64(mantissa) * 2f64.powi(exp2 - 127) * 10f64.powi(decimal_exponent as i32))
}
