use crate::domain::{
    Position, PositionState, PositionStatus, PriceSnapshot, ProfitabilityError, Result,
};
use crate::services::cost_basis::{CostBasisCalculator, HUNDRED};
use crate::services::leg_profitability::LegProfitabilityCalculator;
use rust_decimal::Decimal;
use tracing::{debug, warn};

pub struct PositionAggregator;

impl PositionAggregator {
    /// Compute the full [`PositionState`] of one ledger.
    ///
    /// Returns are expressed against the capital committed at the post-ADD
    /// peak, `allocation_after_adds × weighted_average_price`, so sequential
    /// partial exits are all measured on the same base.
    pub fn compute(position: &Position, snapshot: &PriceSnapshot) -> Result<PositionState> {
        position.validate()?;

        let cost_basis = CostBasisCalculator::replay(position)?;
        let average_price = cost_basis.weighted_average_price;

        if average_price.is_zero() {
            return Err(ProfitabilityError::degenerate(format!(
                "{} has a zero weighted average price",
                position.symbol
            )));
        }

        let initial_notional = cost_basis
            .allocation_after_adds
            .checked_mul(average_price)
            .ok_or(ProfitabilityError::ArithmeticOverflow("initial notional"))?;

        if initial_notional.is_zero() {
            return Err(ProfitabilityError::degenerate(format!(
                "{} has a zero initial notional",
                position.symbol
            )));
        }

        let replay = LegProfitabilityCalculator::replay(position, &cost_basis)?;
        let remaining = replay.remaining;

        if !position.is_open && !remaining.is_zero() {
            return Err(ProfitabilityError::malformed(format!(
                "{} is flagged closed but {} of its allocation is still open",
                position.symbol, remaining
            )));
        }

        let unrealized = LegProfitabilityCalculator::mark_to_market(
            position.direction,
            &cost_basis,
            remaining,
            snapshot,
        )?;

        if !unrealized.is_available() {
            warn!(
                "{}: open remainder {} not marked to market, returning realized figures only",
                position.symbol, remaining
            );
        }

        let realized_profit = replay
            .realized_legs
            .iter()
            .try_fold(Decimal::ZERO, |acc, leg| acc.checked_add(leg.profit_amount))
            .ok_or(ProfitabilityError::ArithmeticOverflow("realized profit"))?;

        let realized_return_pct = Self::as_return_pct(realized_profit, initial_notional)?;

        let total_return_pct = match unrealized.profit_amount() {
            Some(unrealized_profit) => {
                let total_profit = realized_profit
                    .checked_add(unrealized_profit)
                    .ok_or(ProfitabilityError::ArithmeticOverflow("total profit"))?;
                Some(Self::as_return_pct(total_profit, initial_notional)?)
            }
            None => None,
        };

        let active_allocation_pct = remaining
            .checked_mul(HUNDRED)
            .ok_or(ProfitabilityError::ArithmeticOverflow("active allocation"))?;

        let status = if remaining > Decimal::ZERO {
            PositionStatus::Open
        } else {
            PositionStatus::Closed
        };

        debug!(
            "{}: avg {} alloc {} remaining {} realized {}% total {:?}%",
            position.symbol,
            average_price,
            cost_basis.allocation_after_adds,
            remaining,
            realized_return_pct,
            total_return_pct
        );

        Ok(PositionState {
            symbol: position.symbol.clone(),
            direction: position.direction,
            status,
            weighted_average_price: average_price,
            allocation_after_adds: cost_basis.allocation_after_adds,
            total_allocation_fraction: remaining,
            active_allocation_pct,
            realized_legs: replay.realized_legs,
            realized_profit,
            realized_return_pct,
            unrealized_return_pct: unrealized.return_pct(),
            unrealized,
            total_return_pct,
        })
    }

    fn as_return_pct(profit: Decimal, notional: Decimal) -> Result<Decimal> {
        profit
            .checked_div(notional)
            .ok_or(ProfitabilityError::ArithmeticOverflow("return on notional"))?
            .checked_mul(HUNDRED)
            .ok_or(ProfitabilityError::ArithmeticOverflow("return on notional"))
    }
}
