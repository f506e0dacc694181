//! End-of-run performance report
//!
//! Pure read-side aggregation over a strategy's archived trade cycles and
//! day records. Bookkeeping stays in `Decimal`; ratios and annualization
//! are derived in `f64` for display only and never fed back into state.

use crate::config::LedgerConfig;
use crate::ledger::Account;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use types::ids::StrategyId;

/// Aggregated backtest results for one strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub strategy: StrategyId,
    pub trades: usize,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub gross_total: Decimal,
    pub winners: usize,
    pub losers: usize,
    /// Winning fraction of all trades
    pub hit_ratio: f64,
    pub avg_fills_per_trade: f64,
    pub max_win: Option<Decimal>,
    pub avg_win: Option<Decimal>,
    pub max_loss: Option<Decimal>,
    pub avg_loss: Option<Decimal>,
    pub avg_trade: Decimal,
    pub win_loss_ratio: Option<f64>,
    pub max_profit_close: Decimal,
    pub max_profit_range: Decimal,
    pub max_drawdown_close: Decimal,
    pub max_drawdown_range: Decimal,
    pub max_allocation: Decimal,
    pub avg_allocation: Decimal,
    /// Peak allocation scaled by the margin requirement
    pub max_cash_required: Decimal,
    pub total_fees: Decimal,
    pub total_taxes: Decimal,
    pub net_total: Decimal,
    /// Sum of per-trade gross returns (fraction)
    pub gross_return: f64,
    pub avg_return: f64,
    /// Sum of per-trade net returns (fraction)
    pub net_return: f64,
    /// Net total over the average allocation (fraction)
    pub net_return_avg_alloc: f64,
    pub days: usize,
    pub initial_capital: Decimal,
    pub daily_rate: f64,
    /// Total risk-free carry over the recorded days
    pub carry: Decimal,
    pub net_with_carry: Decimal,
    /// (net total + carry) / initial capital (fraction)
    pub return_on_capital: f64,
    /// Return on capital compounded to a 252-session year (fraction)
    pub annual_return_on_capital: f64,
}

impl Summary {
    pub(crate) fn build(strategy: StrategyId, config: &LedgerConfig, account: &Account) -> Self {
        let history = &account.history;
        let trades = history.len();

        let winners: Vec<Decimal> = history
            .iter()
            .filter(|t| t.pnl > Decimal::ZERO)
            .map(|t| t.pnl)
            .collect();
        let losers: Vec<Decimal> = history
            .iter()
            .filter(|t| t.pnl < Decimal::ZERO)
            .map(|t| t.pnl)
            .collect();

        let gross_profit: Decimal = winners.iter().sum();
        let gross_loss: Decimal = losers.iter().sum();
        let gross_total: Decimal = history.iter().map(|t| t.pnl).sum();
        let total_fees: Decimal = history.iter().map(|t| t.fee).sum();
        let total_taxes: Decimal = history.iter().map(|t| t.tax).sum();
        let net_total = gross_total - total_fees - total_taxes;

        let avg_win = mean(&winners);
        let avg_loss = mean(&losers);
        let win_loss_ratio = match (avg_win, avg_loss) {
            (Some(win), Some(loss)) if !loss.is_zero() => {
                Some((-(win / loss)).to_f64().unwrap_or(0.0))
            }
            _ => None,
        };

        let max_allocation = history
            .iter()
            .map(|t| t.max_alloc)
            .max()
            .unwrap_or(Decimal::ZERO);
        let allocations: Vec<Decimal> = history.iter().map(|t| t.max_alloc).collect();
        let avg_allocation = mean(&allocations).unwrap_or(Decimal::ZERO);

        let gross_return: f64 = history
            .iter()
            .map(|t| t.gross_return.to_f64().unwrap_or(0.0))
            .sum();
        let net_return: f64 = history
            .iter()
            .map(|t| t.net_return.to_f64().unwrap_or(0.0))
            .sum();
        let net_return_avg_alloc = if avg_allocation.is_zero() {
            0.0
        } else {
            (net_total / avg_allocation).to_f64().unwrap_or(0.0)
        };

        let carry: Decimal = account.days.values().map(|day| day.carry).sum();
        let net_with_carry = net_total + carry;
        let days = account.days.len();
        let return_on_capital = if config.initial_capital.is_zero() {
            0.0
        } else {
            ((net_with_carry) / config.initial_capital)
                .to_f64()
                .unwrap_or(0.0)
        };
        let annual_return_on_capital = if days > 0 {
            (1.0 + return_on_capital).powf(252.0 / days as f64) - 1.0
        } else {
            0.0
        };

        Self {
            strategy,
            trades,
            gross_profit,
            gross_loss,
            gross_total,
            winners: winners.len(),
            losers: losers.len(),
            hit_ratio: if trades > 0 {
                winners.len() as f64 / trades as f64
            } else {
                0.0
            },
            avg_fills_per_trade: if trades > 0 {
                history.iter().map(|t| t.fills as f64).sum::<f64>() / trades as f64
            } else {
                0.0
            },
            max_win: winners.iter().max().copied(),
            avg_win,
            max_loss: losers.iter().min().copied(),
            avg_loss,
            avg_trade: if trades > 0 {
                gross_total / Decimal::from(trades as u64)
            } else {
                Decimal::ZERO
            },
            win_loss_ratio,
            max_profit_close: max_of(history.iter().map(|t| t.max_profit_close)),
            max_profit_range: max_of(history.iter().map(|t| t.max_profit_range)),
            max_drawdown_close: min_of(history.iter().map(|t| t.max_drawdown_close)),
            max_drawdown_range: min_of(history.iter().map(|t| t.max_drawdown_range)),
            max_allocation,
            avg_allocation,
            max_cash_required: max_allocation * config.margin,
            total_fees,
            total_taxes,
            net_total,
            gross_return,
            avg_return: if trades > 0 {
                gross_return / trades as f64
            } else {
                0.0
            },
            net_return,
            net_return_avg_alloc,
            days,
            initial_capital: config.initial_capital,
            daily_rate: config.daily_rate(),
            carry,
            net_with_carry,
            return_on_capital,
            annual_return_on_capital,
        }
    }
}

fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<Decimal>() / Decimal::from(values.len() as u64))
    }
}

fn max_of(values: impl Iterator<Item = Decimal>) -> Decimal {
    values.max().unwrap_or(Decimal::ZERO)
}

fn min_of(values: impl Iterator<Item = Decimal>) -> Decimal {
    values.min().unwrap_or(Decimal::ZERO)
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.trades == 0 {
            writeln!(f, "No trades in the period")?;
            writeln!(f)?;
        } else {
            writeln!(f, "Gross Profit: ${:.2}", self.gross_profit)?;
            writeln!(f, "Gross Loss: ${:.2}", self.gross_loss)?;
            writeln!(f, "Gross Total: ${:.2}", self.gross_total)?;
            writeln!(f)?;
            writeln!(f, "Number of trades: {}", self.trades)?;
            writeln!(f, "Hitting Ratio: {:.2}%", 100.0 * self.hit_ratio)?;
            writeln!(f, "Number of profit trades: {}", self.winners)?;
            writeln!(f, "Number of loss trades: {}", self.losers)?;
            writeln!(f, "Average fills per trade: {:.2}", self.avg_fills_per_trade)?;
            writeln!(f)?;
            match (self.max_win, self.avg_win) {
                (Some(max), Some(avg)) => {
                    writeln!(f, "Max win trade: ${max:.2}")?;
                    writeln!(f, "Avg win trade: ${avg:.2}")?;
                }
                _ => {
                    writeln!(f, "Max win trade: $-")?;
                    writeln!(f, "Avg win trade: $-")?;
                }
            }
            match (self.max_loss, self.avg_loss) {
                (Some(max), Some(avg)) => {
                    writeln!(f, "Max loss trade: ${max:.2}")?;
                    writeln!(f, "Avg loss trade: ${avg:.2}")?;
                }
                _ => {
                    writeln!(f, "Max loss trade: $-")?;
                    writeln!(f, "Avg loss trade: $-")?;
                }
            }
            writeln!(f, "Avg all trades: ${:.2}", self.avg_trade)?;
            match self.win_loss_ratio {
                Some(ratio) => writeln!(f, "Win/Loss ratio: {ratio:.2}")?,
                None => writeln!(f, "Win/Loss ratio: -")?,
            }
            writeln!(f)?;
            writeln!(f, "Max Profit: ${:.2}", self.max_profit_close)?;
            writeln!(f, "Max Profit High/Low: ${:.2}", self.max_profit_range)?;
            writeln!(f, "Max Drawdown: ${:.2}", self.max_drawdown_close)?;
            writeln!(f, "Max Drawdown High/Low: ${:.2}", self.max_drawdown_range)?;
            writeln!(f)?;
            writeln!(f, "Max Allocation: ${:.2}", self.max_allocation)?;
            writeln!(f, "Avg Allocation: ${:.2}", self.avg_allocation)?;
            writeln!(f, "Max Cash Required (margin): ${:.2}", self.max_cash_required)?;
            writeln!(f)?;
            writeln!(f, "Gross Total: ${:.2}", self.gross_total)?;
            writeln!(f, "Total Fees: ${:.2}", self.total_fees)?;
            writeln!(f, "Total Taxes: ${:.2}", self.total_taxes)?;
            writeln!(f, "Net Total: ${:.2}", self.net_total)?;
            writeln!(f)?;
            writeln!(f, "Gross Return: {:.2}%", 100.0 * self.gross_return)?;
            writeln!(f, "Average Return: {:.2}%", 100.0 * self.avg_return)?;
            writeln!(f, "Net Return: {:.2}%", 100.0 * self.net_return)?;
            writeln!(
                f,
                "Net Return Avg Allocation: {:.2}%",
                100.0 * self.net_return_avg_alloc
            )?;
            writeln!(f)?;
        }

        writeln!(f, "Number of days: {}", self.days)?;
        writeln!(f, "Initial Capital: ${:.2}", self.initial_capital)?;
        writeln!(
            f,
            "Risk Free Rate: {:.2}% yearly/{:.4}% daily",
            self.annual_rate_percent(),
            100.0 * self.daily_rate
        )?;
        writeln!(f, "Total Carry: ${:.2}", self.carry)?;
        writeln!(f, "Net Total + Carry: ${:.2}", self.net_with_carry)?;
        writeln!(f, "Net Return Capital: {:.2}%", 100.0 * self.return_on_capital)?;
        writeln!(
            f,
            "Net Return Capital Yearly: {:.2}%",
            100.0 * self.annual_return_on_capital
        )
    }
}

impl Summary {
    /// Annual risk-free rate implied by the stored daily rate, percent
    fn annual_rate_percent(&self) -> f64 {
        ((1.0 + self.daily_rate).powf(252.0) - 1.0) * 100.0
    }
}
