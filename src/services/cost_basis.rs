use crate::domain::{Position, ProfitabilityError, Result, TransactionKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub(crate) const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Weighted-average entry price and position size after every ADD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBasis {
    pub weighted_average_price: Decimal,
    /// Size as a multiple of the opening size (1.0 = original size)
    pub allocation_after_adds: Decimal,
}

pub struct CostBasisCalculator;

impl CostBasisCalculator {
    /// Validate the ledger and replay its INITIAL/ADD transactions.
    pub fn compute(position: &Position) -> Result<CostBasis> {
        position.validate()?;
        Self::replay(position)
    }

    /// Replay assuming `position.validate()` already succeeded.
    ///
    /// Each ADD of `p`% grows the size by `p`% of its current value and blends
    /// the new slice in at the ADD price:
    /// `avg' = (alloc × avg + (alloc' − alloc) × price) / alloc'`
    pub(crate) fn replay(position: &Position) -> Result<CostBasis> {
        let initial = position
            .transactions
            .first()
            .ok_or_else(|| ProfitabilityError::malformed("ledger has no transactions"))?;

        let mut average_price = initial.price;
        let mut allocation = Decimal::ONE;

        for (tx, entry) in position.legs().skip(1) {
            if tx.kind != TransactionKind::Add {
                continue;
            }

            let growth = entry
                .percentage
                .checked_div(HUNDRED)
                .ok_or(ProfitabilityError::ArithmeticOverflow("add percentage"))?;

            let new_allocation = allocation
                .checked_mul(Decimal::ONE + growth)
                .ok_or(ProfitabilityError::ArithmeticOverflow("allocation growth"))?;

            let held_value = allocation
                .checked_mul(average_price)
                .ok_or(ProfitabilityError::ArithmeticOverflow("held value"))?;

            let added_value = (new_allocation - allocation)
                .checked_mul(tx.price)
                .ok_or(ProfitabilityError::ArithmeticOverflow("added value"))?;

            let blended_value = held_value
                .checked_add(added_value)
                .ok_or(ProfitabilityError::ArithmeticOverflow("blended value"))?;

            average_price = blended_value
                .checked_div(new_allocation)
                .ok_or(ProfitabilityError::ArithmeticOverflow("average price"))?;

            debug!(
                "{} ADD #{}: {}% at {} -> allocation {} avg {}",
                position.symbol, tx.id, entry.percentage, tx.price, new_allocation, average_price
            );

            allocation = new_allocation;
        }

        Ok(CostBasis {
            weighted_average_price: average_price,
            allocation_after_adds: allocation,
        })
    }
}
