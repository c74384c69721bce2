//! # Share Math
//!
//! ERC-4626 asset/share conversion. The vault carries one virtual share and
//! one virtual asset, so the exchange rate of an empty vault is 1:1 and a
//! first depositor cannot inflate the rate by donating assets: the donation
//! is shared with a share nobody owns.
//!
//! ```text
//! shares = assets * (total_supply + 1) / (total_assets + 1)
//! assets = shares * (total_assets + 1) / (total_supply + 1)
//! ```
//!
//! Products are computed at 256 bits, so an 18-decimal asset never
//! overflows halfway through a conversion. A result that does not fit in
//! `u128` is an error, never a wrap.

use thiserror::Error;

/// Arithmetic failures in share conversion.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ShareMathError {
    /// The result does not fit in 128 bits.
    #[error("arithmetic overflow in share conversion")]
    Overflow,

    /// Division by zero. Cannot happen with virtual offsets, but the
    /// primitive is public.
    #[error("division by zero")]
    DivisionByZero,
}

/// Which way to round a conversion. Always pick the one that favours the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Toward zero. Used when the vault pays out shares (deposit) or
    /// assets (redeem).
    Floor,
    /// Away from zero. Used when the vault charges shares (withdraw) or
    /// assets (mint).
    Ceil,
}

const LOW_MASK: u128 = u64::MAX as u128;

/// Full 256-bit product of two `u128`s, as `(hi, lo)`.
fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    let (a1, a0) = (a >> 64, a & LOW_MASK);
    let (b1, b0) = (b >> 64, b & LOW_MASK);

    let p00 = a0 * b0;
    let p01 = a0 * b1;
    let p10 = a1 * b0;
    let p11 = a1 * b1;

    let mid = (p00 >> 64) + (p01 & LOW_MASK) + (p10 & LOW_MASK);
    let lo = (p00 & LOW_MASK) | ((mid & LOW_MASK) << 64);
    let hi = p11 + (p01 >> 64) + (p10 >> 64) + (mid >> 64);
    (hi, lo)
}

/// `(hi:lo) / d` as `(quotient, remainder)`, or `None` if the quotient
/// needs more than 128 bits.
fn div_wide(hi: u128, lo: u128, d: u128) -> Option<(u128, u128)> {
    if hi >= d {
        return None;
    }
    let mut q: u128 = 0;
    let mut r = hi;
    for i in (0..128).rev() {
        let carry = r >> 127;
        r = (r << 1) | ((lo >> i) & 1);
        q <<= 1;
        if carry == 1 || r >= d {
            r = r.wrapping_sub(d);
            q |= 1;
        }
    }
    Some((q, r))
}

/// `a * b / d`, rounded as requested, without intermediate overflow.
pub fn mul_div(a: u128, b: u128, d: u128, rounding: Rounding) -> Result<u128, ShareMathError> {
    if d == 0 {
        return Err(ShareMathError::DivisionByZero);
    }
    let (hi, lo) = mul_wide(a, b);
    let (q, r) = div_wide(hi, lo, d).ok_or(ShareMathError::Overflow)?;
    match rounding {
        Rounding::Ceil if r > 0 => q.checked_add(1).ok_or(ShareMathError::Overflow),
        _ => Ok(q),
    }
}

/// Shares worth `assets` at the given vault state.
pub fn convert_to_shares(
    assets: u128,
    total_assets: u128,
    total_supply: u128,
    rounding: Rounding,
) -> Result<u128, ShareMathError> {
    let supply = total_supply.checked_add(1).ok_or(ShareMathError::Overflow)?;
    let managed = total_assets.checked_add(1).ok_or(ShareMathError::Overflow)?;
    mul_div(assets, supply, managed, rounding)
}

/// Assets worth `shares` at the given vault state.
pub fn convert_to_assets(
    shares: u128,
    total_assets: u128,
    total_supply: u128,
    rounding: Rounding,
) -> Result<u128, ShareMathError> {
    let supply = total_supply.checked_add(1).ok_or(ShareMathError::Overflow)?;
    let managed = total_assets.checked_add(1).ok_or(ShareMathError::Overflow)?;
    mul_div(shares, managed, supply, rounding)
}
