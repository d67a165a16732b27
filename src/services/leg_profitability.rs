use crate::domain::{
    Direction, Position, PriceSnapshot, ProfitabilityError, RealizedLeg, Result, TransactionKind,
    UnrealizedLeg,
};
use crate::services::cost_basis::{CostBasis, CostBasisCalculator, HUNDRED};
use rust_decimal::Decimal;
use tracing::debug;

/// Realized legs of a ledger plus the allocation still open afterwards
#[derive(Debug, Clone, PartialEq)]
pub struct LegReplay {
    pub realized_legs: Vec<RealizedLeg>,
    pub remaining: Decimal,
}

pub struct LegProfitabilityCalculator;

impl LegProfitabilityCalculator {
    /// Validate the ledger, then score every DECREASE/CLOSE against its
    /// cost basis.
    pub fn realize_from_ledger(position: &Position) -> Result<(CostBasis, LegReplay)> {
        let cost_basis = CostBasisCalculator::compute(position)?;
        let replay = Self::replay(position, &cost_basis)?;
        Ok((cost_basis, replay))
    }

    pub(crate) fn replay(position: &Position, cost_basis: &CostBasis) -> Result<LegReplay> {
        let average_price = cost_basis.weighted_average_price;
        let mut remaining = cost_basis.allocation_after_adds;
        let mut realized_legs = Vec::new();

        for (tx, entry) in position.legs() {
            let sold = match tx.kind {
                TransactionKind::Decrease => {
                    let share = entry
                        .percentage
                        .checked_div(HUNDRED)
                        .ok_or(ProfitabilityError::ArithmeticOverflow("decrease percentage"))?;
                    remaining
                        .checked_mul(share)
                        .ok_or(ProfitabilityError::ArithmeticOverflow("decrease size"))?
                }
                TransactionKind::Close => {
                    if entry.percentage != HUNDRED {
                        return Err(ProfitabilityError::InconsistentClose {
                            transaction_id: tx.id,
                            reason: format!(
                                "CLOSE must consume 100% of the remainder, got {}%",
                                entry.percentage
                            ),
                        });
                    }
                    remaining
                }
                TransactionKind::Initial | TransactionKind::Add => continue,
            };

            remaining = if tx.kind == TransactionKind::Close {
                Decimal::ZERO
            } else {
                remaining - sold
            };

            let return_pct = Self::return_pct(position.direction, average_price, tx.price)?;
            let profit_amount = Self::profit_amount(position.direction, average_price, tx.price, sold)?;

            debug!(
                "{} {:?} #{}: sold {} at {} -> return {}% profit {} remaining {}",
                position.symbol, tx.kind, tx.id, sold, tx.price, return_pct, profit_amount, remaining
            );

            realized_legs.push(RealizedLeg {
                source_transaction_id: tx.id,
                allocation_fraction_closed: sold,
                exit_price: tx.price,
                return_pct,
                profit_amount,
                closed_at: tx.timestamp,
            });
        }

        Ok(LegReplay {
            realized_legs,
            remaining,
        })
    }

    /// Percent return of exiting at `price` against `average_price`.
    /// Long: (price − avg) / avg × 100, Short: (avg − price) / avg × 100
    pub fn return_pct(direction: Direction, average_price: Decimal, price: Decimal) -> Result<Decimal> {
        if average_price.is_zero() {
            return Err(ProfitabilityError::degenerate(
                "weighted average price is zero",
            ));
        }

        let price_diff = Self::signed_price_diff(direction, average_price, price)?;

        price_diff
            .checked_div(average_price)
            .ok_or(ProfitabilityError::ArithmeticOverflow("return ratio"))?
            .checked_mul(HUNDRED)
            .ok_or(ProfitabilityError::ArithmeticOverflow("return percent"))
    }

    /// Profit of moving `size` (in opening-size units) at `price`
    pub fn profit_amount(
        direction: Direction,
        average_price: Decimal,
        price: Decimal,
        size: Decimal,
    ) -> Result<Decimal> {
        let price_diff = Self::signed_price_diff(direction, average_price, price)?;

        size.checked_mul(price_diff)
            .ok_or(ProfitabilityError::ArithmeticOverflow("leg profit"))
    }

    /// Mark the open remainder to market.
    ///
    /// Nothing open yields [`UnrealizedLeg::Closed`] whatever the snapshot.
    pub fn mark_to_market(
        direction: Direction,
        cost_basis: &CostBasis,
        remaining: Decimal,
        snapshot: &PriceSnapshot,
    ) -> Result<UnrealizedLeg> {
        if remaining.is_zero() {
            return Ok(UnrealizedLeg::Closed);
        }

        let current_price = match snapshot {
            PriceSnapshot::Quoted(price) => *price,
            PriceSnapshot::Unavailable { reason } => {
                return Ok(UnrealizedLeg::Unavailable {
                    reason: reason.clone(),
                })
            }
            PriceSnapshot::NotRequested => {
                return Ok(UnrealizedLeg::Unavailable {
                    reason: "no current price supplied".to_string(),
                })
            }
        };

        let average_price = cost_basis.weighted_average_price;
        let return_pct = Self::return_pct(direction, average_price, current_price)?;
        let profit_amount = Self::profit_amount(direction, average_price, current_price, remaining)?;

        Ok(UnrealizedLeg::Marked {
            current_price,
            allocation_fraction: remaining,
            return_pct,
            profit_amount,
        })
    }

    fn signed_price_diff(direction: Direction, average_price: Decimal, price: Decimal) -> Result<Decimal> {
        match direction {
            Direction::Long => price.checked_sub(average_price),
            Direction::Short => average_price.checked_sub(price),
        }
        .ok_or(ProfitabilityError::ArithmeticOverflow("price difference"))
    }
}
