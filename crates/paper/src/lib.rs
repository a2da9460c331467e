use tracing::{debug, error};

use common::{Action, InvariantViolation, OrderSide, TradeRecord};

/// Relative tolerance for cash reconciliation against the trade history.
pub const RECONCILE_TOLERANCE: f64 = 1e-9;

/// Simulated single-instrument book: cash, inventory and trade history.
///
/// Fills happen at the tick price, one unit per trade, with no slippage or
/// fees. This is the only place cash and position change; everything else
/// reads them.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    cash: f64,
    position: u64,
    buys: u64,
    sells: u64,
    trades: Vec<TradeRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `action` at `price` for `tick`.
    ///
    /// Returns the appended record for BUY/SELL and `None` for HOLD. A SELL
    /// with no inventory leaves the ledger untouched and is reported as an
    /// invariant violation; the decision policy should make it unreachable.
    pub fn execute(
        &mut self,
        action: Action,
        price: f64,
        tick: usize,
    ) -> Result<Option<TradeRecord>, InvariantViolation> {
        let side = match action.side() {
            Some(side) => side,
            None => return Ok(None),
        };

        match side {
            OrderSide::Buy => {
                self.position += 1;
                self.buys += 1;
                self.cash -= price;
            }
            OrderSide::Sell => {
                let Some(remaining) = self.position.checked_sub(1) else {
                    error!(tick, price, "SELL reached ledger with zero inventory");
                    return Err(InvariantViolation::SellWithoutInventory { tick });
                };
                self.position = remaining;
                self.sells += 1;
                self.cash += price;
            }
        }

        let record = TradeRecord { tick, price, side };
        self.trades.push(record);

        debug!(
            tick,
            side = %side,
            price,
            position = self.position,
            cash = self.cash,
            "Paper fill recorded"
        );

        Ok(Some(record))
    }

    /// Mark-to-market PnL: cash plus open inventory valued at `price`.
    pub fn pnl(&self, price: f64) -> f64 {
        self.cash + self.position as f64 * price
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn buys(&self) -> u64 {
        self.buys
    }

    pub fn sells(&self) -> u64 {
        self.sells
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    /// Constant-time consistency check between inventory and trade counts.
    pub fn check(&self) -> Result<(), InvariantViolation> {
        if self.buys.checked_sub(self.sells) != Some(self.position) {
            return Err(InvariantViolation::PositionMismatch {
                position: self.position,
                buys: self.buys,
                sells: self.sells,
            });
        }
        Ok(())
    }

    /// Full audit: recompute cash from the trade history and compare within
    /// [`RECONCILE_TOLERANCE`] (relative). O(trades).
    pub fn reconcile(&self) -> Result<(), InvariantViolation> {
        self.check()?;

        let expected: f64 = self.trades.iter().map(TradeRecord::cash_flow).sum();
        let scale = self
            .trades
            .iter()
            .map(|t| t.price.abs())
            .sum::<f64>()
            .max(1.0);

        if (self.cash - expected).abs() > RECONCILE_TOLERANCE * scale {
            return Err(InvariantViolation::CashMismatch {
                cash: self.cash,
                expected,
            });
        }
        Ok(())
    }
}
