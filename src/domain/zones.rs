use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::swing::Direction;
use crate::domain::timeframe::Timeframe;

/// Zone bounded by the high/low of the candle preceding a directional
/// displacement (§3 "Order block / fair-value gap", GLOSSARY "OB").
/// `mitigated` flips monotonically true on revisit and never flips back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBlock {
    pub direction: Direction,
    pub high: Decimal,
    pub low: Decimal,
    pub timestamp_ms: i64,
    pub timeframe: Timeframe,
    pub mitigated: bool,
}

impl OrderBlock {
    /// Marks the zone mitigated if `price` revisits `[low, high]`. Monotonic:
    /// once true, further calls are no-ops.
    pub fn mark_if_mitigated(&mut self, low: Decimal, high: Decimal) {
        if self.mitigated {
            return;
        }
        if high >= self.low && low <= self.high {
            self.mitigated = true;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FvgGrade {
    Wide,
    Narrow,
    Nested,
}

/// Three-candle imbalance (GLOSSARY "FVG"). `filled` flips monotonically
/// true once price revisits the gap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairValueGap {
    pub direction: Direction,
    pub grade: FvgGrade,
    pub high: Decimal,
    pub low: Decimal,
    pub timeframe: Timeframe,
    /// Normalized location of the gap within the prevailing range, 0 =
    /// discount, 1 = premium.
    pub premium_discount: f64,
    pub filled: bool,
}

impl FairValueGap {
    pub fn mark_if_filled(&mut self, low: Decimal, high: Decimal) {
        if self.filled {
            return;
        }
        if high >= self.low && low <= self.high {
            self.filled = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn mitigation_is_monotonic() {
        let mut ob = OrderBlock {
            direction: Direction::Bullish,
            high: dec!(110),
            low: dec!(100),
            timestamp_ms: 0,
            timeframe: Timeframe::M1,
            mitigated: false,
        };
        ob.mark_if_mitigated(dec!(120), dec!(130));
        assert!(!ob.mitigated);
        ob.mark_if_mitigated(dec!(95), dec!(105));
        assert!(ob.mitigated);
        // A later non-overlapping check must not un-set it.
        ob.mark_if_mitigated(dec!(500), dec!(600));
        assert!(ob.mitigated);
    }
}
