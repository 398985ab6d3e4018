use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::domain::candle::Candle;
use crate::domain::errors::EngineResult;
use crate::domain::ports::CandleSource;
use crate::domain::timeframe::Timeframe;

/// Seeded random walk with a symbol-specific base price and 0.1%
/// per-bar volatility; deterministic given the seed (§4.7 "Synthetic").
pub struct SyntheticCandleSource {
    seed: u64,
    timeframe: Timeframe,
}

impl SyntheticCandleSource {
    pub fn new(seed: u64, timeframe: Timeframe) -> Self {
        Self { seed, timeframe }
    }
}

fn base_price(symbol: &str) -> Decimal {
    let hash: u64 = symbol.bytes().fold(7u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    Decimal::from(100 + (hash % 900)) // in [100, 1000)
}

#[async_trait]
impl CandleSource for SyntheticCandleSource {
    async fn load(&self, symbol: &str, from_ms: i64, to_ms: i64) -> EngineResult<Vec<Candle>> {
        let tf_ms = self.timeframe.minutes() * 60_000;
        let symbol_seed = self.seed ^ symbol.bytes().fold(0u64, |a, b| a.wrapping_mul(257).wrapping_add(b as u64));
        let mut rng = StdRng::seed_from_u64(symbol_seed);

        let mut price = base_price(symbol);
        let volatility = Decimal::new(1, 3); // 0.001 = 0.1%

        let mut candles = Vec::new();
        let mut ts = (from_ms / tf_ms) * tf_ms;
        while ts <= to_ms {
            let drift_bp: i64 = rng.gen_range(-100..=100); // +/- 1.0% of volatility unit
            let drift = price * volatility * Decimal::new(drift_bp, 2);
            let open = price;
            let close = (open + drift).max(Decimal::new(1, 2));
            let wiggle = (open - close).abs().max(price * volatility);
            let high = open.max(close) + wiggle / Decimal::TWO;
            let low = (open.min(close) - wiggle / Decimal::TWO).max(Decimal::new(1, 2));
            let volume = Decimal::from(100 + (rng.gen_range(0..900)));

            candles.push(Candle {
                symbol: symbol.to_string(),
                timestamp_ms: ts,
                open,
                high,
                low,
                close,
                volume,
                timeframe: self.timeframe,
            });

            price = close;
            ts += tf_ms;
        }

        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deterministic_given_same_seed() {
        let source_a = SyntheticCandleSource::new(42, Timeframe::M1);
        let source_b = SyntheticCandleSource::new(42, Timeframe::M1);
        let a = source_a.load("EURUSD", 0, 10 * 60_000).await.unwrap();
        let b = source_b.load("EURUSD", 0, 10 * 60_000).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_symbols_diverge() {
        let source = SyntheticCandleSource::new(42, Timeframe::M1);
        let a = source.load("EURUSD", 0, 10 * 60_000).await.unwrap();
        let b = source.load("GBPUSD", 0, 10 * 60_000).await.unwrap();
        assert_ne!(a[5].close, b[5].close);
    }
}
