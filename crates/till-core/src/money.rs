//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely, plus the
//! VAT conversion used when prices are entered tax-inclusive.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Minor Units                                      │
//! │    Every amount is an i64 in the currency's smallest unit.              │
//! │    For a zero-decimal currency (CLP) the minor unit IS the peso.        │
//! │    Rounding only happens at the VAT boundary, and it is explicit.       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: allows negative values for reversals and shortages
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Derives**: full serde support for JSON serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for logs and debugging. UI layers own localized formatting.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// VAT Rate
// =============================================================================

/// VAT rate represented in basis points (bps).
///
/// 1 basis point = 0.01% = 1/10000, so 1900 bps = 19% (Chilean IVA).
///
/// Prices and purchase costs are entered gross (tax-inclusive); the rate
/// only exists to convert between the gross figure on an invoice and the
/// net figure some tenants record as cost. It is configuration, not a
/// compiled-in constant: tenants with different tax regimes share a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatRate(u32);

impl VatRate {
    /// Creates a VAT rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        VatRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        VatRate(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Converts a net amount to gross: `net × (1 + rate)`, rounded half away
    /// from zero.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::{Money, VatRate};
    ///
    /// let rate = VatRate::from_bps(1900); // 19%
    /// assert_eq!(rate.add_to(Money::from_minor(1000)).minor(), 1190);
    /// ```
    pub fn add_to(&self, net: Money) -> Money {
        let numer = net.minor() as i128 * (10_000 + self.0 as i128);
        Money::from_minor(div_round(numer, 10_000) as i64)
    }

    /// Converts a gross amount to net: `gross / (1 + rate)`, rounded half
    /// away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::{Money, VatRate};
    ///
    /// let rate = VatRate::from_bps(1900); // 19%
    /// assert_eq!(rate.remove_from(Money::from_minor(1190)).minor(), 1000);
    /// ```
    pub fn remove_from(&self, gross: Money) -> Money {
        let numer = gross.minor() as i128 * 10_000;
        Money::from_minor(div_round(numer, 10_000 + self.0 as i128) as i64)
    }
}

impl Default for VatRate {
    fn default() -> Self {
        VatRate::zero()
    }
}

/// Integer division rounding half away from zero.
fn div_round(numer: i128, denom: i128) -> i128 {
    debug_assert!(denom > 0);
    if numer >= 0 {
        (numer + denom / 2) / denom
    } else {
        (numer - denom / 2) / denom
    }
}

// =============================================================================
// Cost Basis
// =============================================================================

/// How a gross purchase price is recorded into cost history.
///
/// Invoices carry tax-inclusive line prices. Some tenants keep product cost
/// gross (matching what the invoice says), others net of VAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostBasis {
    /// Record the invoice price as-is.
    Gross,
    /// Strip VAT before recording.
    Net,
}

impl CostBasis {
    /// Resolves a gross invoice price into the cost to record.
    pub fn resolve(&self, gross: Money, vat: VatRate) -> Money {
        match self {
            CostBasis::Gross => gross,
            CostBasis::Net => vat.remove_from(gross),
        }
    }
}

impl Default for CostBasis {
    fn default() -> Self {
        CostBasis::Gross
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor() {
        let money = Money::from_minor(12000);
        assert_eq!(money.minor(), 12000);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_minor(12000)), "$12000");
        assert_eq!(format!("{}", Money::from_minor(-550)), "$-550");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!((a + b).minor(), 1500);
        assert_eq!((a - b).minor(), 500);
        assert_eq!((a * 3).minor(), 3000);
        assert_eq!(a.multiply_quantity(4).minor(), 4000);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_negative());

        let negative = Money::from_minor(-100);
        assert!(negative.is_negative());
        assert_eq!(negative.abs().minor(), 100);
    }

    #[test]
    fn test_vat_add_remove_round_trip_exact() {
        let rate = VatRate::from_bps(1900);
        let net = Money::from_minor(1000);
        let gross = rate.add_to(net);
        assert_eq!(gross.minor(), 1190);
        assert_eq!(rate.remove_from(gross), net);
    }

    #[test]
    fn test_vat_remove_rounds_half_away() {
        let rate = VatRate::from_bps(1900);
        // 1200 / 1.19 = 1008.40... → 1008
        assert_eq!(rate.remove_from(Money::from_minor(1200)).minor(), 1008);
        // 999 / 1.19 = 839.49... → 839
        assert_eq!(rate.remove_from(Money::from_minor(999)).minor(), 839);
    }

    #[test]
    fn test_vat_zero_rate_is_identity() {
        let rate = VatRate::zero();
        let amount = Money::from_minor(4321);
        assert_eq!(rate.add_to(amount), amount);
        assert_eq!(rate.remove_from(amount), amount);
    }

    #[test]
    fn test_cost_basis_resolution() {
        let vat = VatRate::from_bps(1900);
        let gross = Money::from_minor(1190);

        assert_eq!(CostBasis::Gross.resolve(gross, vat).minor(), 1190);
        assert_eq!(CostBasis::Net.resolve(gross, vat).minor(), 1000);
    }
}
