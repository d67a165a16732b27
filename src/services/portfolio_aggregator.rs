use crate::domain::{
    PortfolioAggregate, PortfolioMonthGroup, Position, PositionState, PriceSnapshot,
    ProfitabilityError, Result, SkippedPosition,
};
use crate::services::cost_basis::HUNDRED;
use crate::services::position_aggregator::PositionAggregator;
use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// One position's outcome handed to the portfolio aggregation
#[derive(Debug, Clone)]
pub struct PortfolioEntry {
    pub symbol: String,
    pub outcome: Result<PositionState>,
    pub closing_date: Option<NaiveDate>,
}

impl PortfolioEntry {
    /// Compute a position for portfolio use; only closed ledgers matter so no
    /// price is requested.
    pub fn from_position(position: &Position) -> Self {
        Self {
            symbol: position.symbol.clone(),
            outcome: PositionAggregator::compute(position, &PriceSnapshot::NotRequested),
            closing_date: position.closing_date,
        }
    }

    pub fn failed(symbol: impl Into<String>, error: ProfitabilityError) -> Self {
        Self {
            symbol: symbol.into(),
            outcome: Err(error),
            closing_date: None,
        }
    }
}

/// Only count positions closed on or after `as_of − months`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub months: u32,
    pub as_of: NaiveDate,
}

impl LookbackWindow {
    pub fn cutoff(&self) -> NaiveDate {
        self.as_of
            .checked_sub_months(Months::new(self.months))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.cutoff() && date <= self.as_of
    }
}

pub struct PortfolioAggregator;

impl PortfolioAggregator {
    pub fn evaluate(positions: &[Position], window: Option<LookbackWindow>) -> Result<PortfolioAggregate> {
        let entries: Vec<PortfolioEntry> = positions.iter().map(PortfolioEntry::from_position).collect();
        Self::aggregate(&entries, window)
    }

    /// Group closed positions by closing month and compound the monthly means.
    ///
    /// Failed positions are reported in `skipped`, open ones (and closed ones
    /// outside `window`) are counted as `ineligible`. The only error is an
    /// arithmetic overflow while compounding.
    pub fn aggregate(entries: &[PortfolioEntry], window: Option<LookbackWindow>) -> Result<PortfolioAggregate> {
        let mut aggregate = PortfolioAggregate::empty();
        let mut returns_by_month: BTreeMap<String, Vec<Decimal>> = BTreeMap::new();

        for entry in entries {
            let state = match &entry.outcome {
                Ok(state) => state,
                Err(e) => {
                    warn!("Skipping {} in portfolio: {}", entry.symbol, e);
                    aggregate.skipped.push(SkippedPosition::from_error(&entry.symbol, e));
                    continue;
                }
            };

            if !state.is_closed() {
                aggregate.ineligible += 1;
                continue;
            }

            let Some(closing_date) = entry.closing_date else {
                warn!("Skipping {} in portfolio: closed without a closing date", entry.symbol);
                aggregate.skipped.push(SkippedPosition {
                    symbol: entry.symbol.clone(),
                    code: "missing_closing_date".to_string(),
                    reason: "closed position has no closing date".to_string(),
                });
                continue;
            };

            if let Some(window) = window {
                if !window.contains(closing_date) {
                    aggregate.ineligible += 1;
                    continue;
                }
            }

            let Some(total_return_pct) = state.total_return_pct else {
                aggregate.skipped.push(SkippedPosition {
                    symbol: entry.symbol.clone(),
                    code: "missing_total_return".to_string(),
                    reason: "total return could not be computed".to_string(),
                });
                continue;
            };

            returns_by_month
                .entry(closing_date.format("%Y-%m").to_string())
                .or_default()
                .push(total_return_pct);
        }

        if returns_by_month.is_empty() {
            info!(
                "No closed positions to aggregate ({} ineligible, {} skipped)",
                aggregate.ineligible,
                aggregate.skipped.len()
            );
            return Ok(aggregate);
        }

        let mut growth = Decimal::ONE;
        let mut sum_of_returns = Decimal::ZERO;
        let mut included = 0usize;

        // BTreeMap keys "YYYY-MM" iterate in chronological order
        for (month, position_returns) in returns_by_month {
            let month_sum = position_returns
                .iter()
                .try_fold(Decimal::ZERO, |acc, r| acc.checked_add(*r))
                .ok_or(ProfitabilityError::ArithmeticOverflow("monthly sum"))?;
            let count = position_returns.len();
            let mean_return_pct = month_sum
                .checked_div(Decimal::from(count))
                .ok_or(ProfitabilityError::ArithmeticOverflow("monthly mean"))?;

            let monthly_factor = Decimal::ONE
                .checked_add(
                    mean_return_pct
                        .checked_div(HUNDRED)
                        .ok_or(ProfitabilityError::ArithmeticOverflow("monthly factor"))?,
                )
                .ok_or(ProfitabilityError::ArithmeticOverflow("monthly factor"))?;
            growth = growth
                .checked_mul(monthly_factor)
                .ok_or(ProfitabilityError::ArithmeticOverflow("compounding"))?;

            debug!(
                "Month {}: {} positions, mean {}%, growth {}",
                month, count, mean_return_pct, growth
            );

            sum_of_returns = sum_of_returns
                .checked_add(month_sum)
                .ok_or(ProfitabilityError::ArithmeticOverflow("portfolio sum"))?;
            included += count;

            aggregate.month_groups.insert(
                month.clone(),
                PortfolioMonthGroup {
                    month,
                    position_returns,
                    position_count: count,
                    mean_return_pct,
                },
            );
        }

        aggregate.compounded_return_decimal = growth - Decimal::ONE;
        aggregate.compounded_return_pct = aggregate
            .compounded_return_decimal
            .checked_mul(HUNDRED)
            .ok_or(ProfitabilityError::ArithmeticOverflow("compounded return"))?;
        aggregate.simple_mean_return_pct = sum_of_returns
            .checked_div(Decimal::from(included))
            .ok_or(ProfitabilityError::ArithmeticOverflow("simple mean"))?;
        aggregate.positions_included = included;

        info!(
            "Portfolio aggregated: {} positions over {} months, compounded {}%",
            included,
            aggregate.month_groups.len(),
            aggregate.compounded_return_pct
        );

        Ok(aggregate)
    }
}
