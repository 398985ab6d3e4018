use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use statrs::statistics::{Data, Distribution};

use crate::domain::equity::EquityPoint;
use crate::domain::position::ClosedTrade;
use crate::domain::result::ReplayStats;

/// Derives summary statistics from a closed-trade ledger and equity curve
/// (§4.9). Drawdown is read directly off the curve rather than
/// recomputed, since `EquityTracker` already maintains the monotonic peak.
pub fn compute_stats(trades: &[ClosedTrade], equity_curve: &[EquityPoint]) -> ReplayStats {
    let total_trades = trades.len() as u64;
    let winning: Vec<&ClosedTrade> = trades.iter().filter(|t| t.pnl > Decimal::ZERO).collect();
    let losing: Vec<&ClosedTrade> = trades.iter().filter(|t| t.pnl < Decimal::ZERO).collect();

    let win_rate_pct = if total_trades > 0 {
        Decimal::from(winning.len() as u64) * Decimal::from(100) / Decimal::from(total_trades)
    } else {
        Decimal::ZERO
    };

    let gross_profit: Decimal = winning.iter().map(|t| t.pnl).sum();
    let gross_loss: Decimal = losing.iter().map(|t| t.pnl.abs()).sum();
    let net_profit: Decimal = trades.iter().map(|t| t.pnl).sum();

    let profit_factor = if gross_loss.is_zero() {
        None
    } else {
        Some(gross_profit / gross_loss)
    };

    let max_drawdown = equity_curve
        .iter()
        .map(|p| p.drawdown)
        .max()
        .unwrap_or(Decimal::ZERO);
    let max_drawdown_pct = equity_curve
        .iter()
        .map(|p| p.drawdown_pct)
        .max()
        .unwrap_or(Decimal::ZERO);

    let returns = bar_returns(equity_curve);
    let sharpe_ratio = sharpe(&returns);
    let sortino_ratio = sortino(&returns);

    let (max_consecutive_wins, max_consecutive_losses) = consecutive_streaks(trades);

    ReplayStats {
        total_trades,
        winning_trades: winning.len() as u64,
        losing_trades: losing.len() as u64,
        win_rate_pct,
        gross_profit,
        gross_loss,
        net_profit,
        profit_factor,
        max_drawdown,
        max_drawdown_pct,
        sharpe_ratio,
        sortino_ratio,
        max_consecutive_wins,
        max_consecutive_losses,
    }
}

fn bar_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    let mut out = Vec::new();
    for w in equity_curve.windows(2) {
        let prev = w[0].equity.to_f64().unwrap_or(0.0);
        let curr = w[1].equity.to_f64().unwrap_or(0.0);
        if prev != 0.0 {
            out.push((curr - prev) / prev);
        }
    }
    out
}

/// `mean / stddev * sqrt(252)` over bar-to-bar equity returns.
fn sharpe(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let data = Data::new(returns.to_vec());
    let mean = data.mean()?;
    let stddev = data.std_dev()?;
    if stddev == 0.0 {
        return None;
    }
    Some(mean / stddev * (252f64).sqrt())
}

/// Same as `sharpe` but the denominator is the stddev of negative returns
/// only.
fn sortino(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let mean = Data::new(returns.to_vec()).mean()?;
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.len() < 2 {
        return None;
    }
    let downside_dev = Data::new(downside).std_dev()?;
    if downside_dev == 0.0 {
        return None;
    }
    Some(mean / downside_dev * (252f64).sqrt())
}

fn consecutive_streaks(trades: &[ClosedTrade]) -> (u32, u32) {
    let mut max_wins = 0u32;
    let mut max_losses = 0u32;
    let mut cur_wins = 0u32;
    let mut cur_losses = 0u32;
    for t in trades {
        if t.pnl > Decimal::ZERO {
            cur_wins += 1;
            cur_losses = 0;
        } else if t.pnl < Decimal::ZERO {
            cur_losses += 1;
            cur_wins = 0;
        } else {
            cur_wins = 0;
            cur_losses = 0;
        }
        max_wins = max_wins.max(cur_wins);
        max_losses = max_losses.max(cur_losses);
    }
    (max_wins, max_losses)
}

/// Groups a trade list by a key function (symbol or strategy) for the
/// per-group breakdown called out in §4.9.
pub fn group_by<'a, K: std::hash::Hash + Eq + Clone>(
    trades: &'a [ClosedTrade],
    key_fn: impl Fn(&ClosedTrade) -> K,
) -> std::collections::HashMap<K, Vec<&'a ClosedTrade>> {
    let mut map: std::collections::HashMap<K, Vec<&ClosedTrade>> = std::collections::HashMap::new();
    for t in trades {
        map.entry(key_fn(t)).or_default().push(t);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::swing::Direction;
    use rust_decimal_macros::dec;

    fn trade(pnl: Decimal) -> ClosedTrade {
        ClosedTrade {
            ticket: 1,
            symbol: "EURUSD".to_string(),
            direction: Direction::Bullish,
            strategy: "smc".to_string(),
            entry_price: dec!(100),
            exit_price: dec!(101),
            entry_time_ms: 0,
            exit_time_ms: 60_000,
            sl: dec!(99),
            tp: dec!(102),
            volume: dec!(1),
            pnl,
            duration_minutes: 1,
            pips: dec!(1),
            risk_reward: dec!(1),
            close_reason: crate::domain::position::CloseReason::TakeProfit,
        }
    }

    #[test]
    fn win_rate_and_profit_factor() {
        let trades = vec![trade(dec!(10)), trade(dec!(-5)), trade(dec!(20))];
        let stats = compute_stats(&trades, &[]);
        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.winning_trades, 2);
        assert_eq!(stats.win_rate_pct, dec!(66.66666666666666666666666667));
        assert_eq!(stats.profit_factor, Some(dec!(6)));
    }

    #[test]
    fn consecutive_streaks_reset_on_opposite_result() {
        let trades = vec![
            trade(dec!(1)),
            trade(dec!(1)),
            trade(dec!(-1)),
            trade(dec!(1)),
        ];
        let (wins, losses) = consecutive_streaks(&trades);
        assert_eq!(wins, 2);
        assert_eq!(losses, 1);
    }
}
