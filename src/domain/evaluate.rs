//! Pure rule evaluation against a live price.
//!
//! Deterministic and side-effect free: given a rule and the latest price,
//! decide whether to fire, adjust trailing state, or do nothing.
//! Persistence of trailing updates is the worker's responsibility.

use rust_decimal::Decimal;

use super::price::{clamp_order_price, Price};
use super::rule::{Rule, RuleType};

/// Outcome of evaluating one rule against one price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to do.
    NoAction,
    /// Trailing state advanced; the worker persists the new values.
    UpdateTrailing { high_water: Price, trigger: Price },
    /// The rule's condition is met; hand off to the executor.
    Trigger,
}

/// Evaluate a rule against the latest price.
///
/// - `STOP_LOSS`: fires when `price <= trigger_price`.
/// - `TAKE_PROFIT`: fires when `price >= trigger_price`.
/// - `TRAILING_STOP`: fires like a stop-loss; otherwise a price above the
///   high-water mark advances the mark and drags the trigger up to
///   `high_water * (1 - trailing_percent / 100)`. The trigger only ever
///   rises. Only the sell-exit direction is modelled; the mirrored variant
///   that would trail a buy-back downward is intentionally not supported.
///
/// Equality satisfies both comparisons. Proposed triggers are clamped to
/// the venue's orderable range before being returned.
#[must_use]
pub fn evaluate(rule: &Rule, price: Price) -> Decision {
    match rule.rule_type {
        RuleType::StopLoss => {
            if price <= rule.trigger_price {
                Decision::Trigger
            } else {
                Decision::NoAction
            }
        }
        RuleType::TakeProfit => {
            if price >= rule.trigger_price {
                Decision::Trigger
            } else {
                Decision::NoAction
            }
        }
        RuleType::TrailingStop => evaluate_trailing(rule, price),
    }
}

fn evaluate_trailing(rule: &Rule, price: Price) -> Decision {
    if price <= rule.trigger_price {
        return Decision::Trigger;
    }

    let Some(percent) = rule.trailing_percent else {
        return Decision::NoAction;
    };

    // A missing high-water mark is initialized by the first observation.
    let advanced = match rule.high_water_price {
        Some(high_water) => price > high_water,
        None => true,
    };
    if !advanced {
        return Decision::NoAction;
    }

    let distance = Decimal::ONE - percent / Decimal::ONE_HUNDRED;
    let proposed = clamp_order_price(price * distance);
    // The trigger trails upward only.
    let trigger = proposed.max(rule.trigger_price);

    Decision::UpdateTrailing {
        high_water: price,
        trigger,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::RuleId;
    use crate::domain::rule::{RuleAction, Side};
    use rust_decimal_macros::dec;

    fn rule(rule_type: RuleType, trigger: Decimal) -> Rule {
        Rule::new(
            RuleId::new("r-1"),
            rule_type,
            "m-1",
            "t-1",
            Side::Buy,
            trigger,
            None,
            RuleAction::SellAll,
        )
    }

    fn trailing(trigger: Decimal, percent: Decimal, high_water: Decimal) -> Rule {
        let mut r = rule(RuleType::TrailingStop, trigger);
        r.trailing_percent = Some(percent);
        r.high_water_price = Some(high_water);
        r
    }

    #[test]
    fn stop_loss_fires_at_or_below_trigger() {
        let r = rule(RuleType::StopLoss, dec!(0.40));
        assert_eq!(evaluate(&r, dec!(0.46)), Decision::NoAction);
        assert_eq!(evaluate(&r, dec!(0.40)), Decision::Trigger);
        assert_eq!(evaluate(&r, dec!(0.39)), Decision::Trigger);
    }

    #[test]
    fn take_profit_fires_at_or_above_trigger() {
        let r = rule(RuleType::TakeProfit, dec!(0.70));
        assert_eq!(evaluate(&r, dec!(0.69)), Decision::NoAction);
        assert_eq!(evaluate(&r, dec!(0.70)), Decision::Trigger);
        assert_eq!(evaluate(&r, dec!(0.82)), Decision::Trigger);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let r = rule(RuleType::StopLoss, dec!(0.40));
        assert_eq!(evaluate(&r, dec!(0.41)), evaluate(&r, dec!(0.41)));
    }

    #[test]
    fn trailing_raises_trigger_with_new_high_water() {
        let r = trailing(dec!(0.50), dec!(10), dec!(0.60));
        assert_eq!(
            evaluate(&r, dec!(0.62)),
            Decision::UpdateTrailing {
                high_water: dec!(0.62),
                trigger: dec!(0.558),
            }
        );
    }

    #[test]
    fn trailing_ignores_prices_below_high_water() {
        let r = trailing(dec!(0.585), dec!(10), dec!(0.65));
        assert_eq!(evaluate(&r, dec!(0.60)), Decision::NoAction);
    }

    #[test]
    fn trailing_fires_like_stop_loss() {
        let r = trailing(dec!(0.585), dec!(10), dec!(0.65));
        assert_eq!(evaluate(&r, dec!(0.58)), Decision::Trigger);
    }

    /// The full sequence 0.62, 0.65, 0.60, 0.58 against trigger 0.50 /
    /// 10% / high-water 0.60.
    #[test]
    fn trailing_sequence_raises_then_fires() {
        let mut r = trailing(dec!(0.50), dec!(10), dec!(0.60));

        match evaluate(&r, dec!(0.62)) {
            Decision::UpdateTrailing { high_water, trigger } => {
                assert_eq!(high_water, dec!(0.62));
                assert_eq!(trigger, dec!(0.558));
                r.high_water_price = Some(high_water);
                r.trigger_price = trigger;
            }
            other => panic!("expected trailing update, got {other:?}"),
        }

        match evaluate(&r, dec!(0.65)) {
            Decision::UpdateTrailing { high_water, trigger } => {
                assert_eq!(high_water, dec!(0.65));
                assert_eq!(trigger, dec!(0.585));
                r.high_water_price = Some(high_water);
                r.trigger_price = trigger;
            }
            other => panic!("expected trailing update, got {other:?}"),
        }

        assert_eq!(evaluate(&r, dec!(0.60)), Decision::NoAction);
        assert_eq!(evaluate(&r, dec!(0.58)), Decision::Trigger);
    }

    #[test]
    fn trailing_trigger_never_decreases() {
        // A wide trailing distance would compute a trigger below the
        // current one; the current trigger must win.
        let r = trailing(dec!(0.60), dec!(50), dec!(0.61));
        assert_eq!(
            evaluate(&r, dec!(0.62)),
            Decision::UpdateTrailing {
                high_water: dec!(0.62),
                trigger: dec!(0.60),
            }
        );
    }

    #[test]
    fn trailing_initializes_missing_high_water() {
        let mut r = trailing(dec!(0.50), dec!(10), dec!(0.60));
        r.high_water_price = None;
        assert_eq!(
            evaluate(&r, dec!(0.70)),
            Decision::UpdateTrailing {
                high_water: dec!(0.70),
                trigger: dec!(0.63),
            }
        );
    }

    #[test]
    fn trailing_proposed_trigger_is_clamped() {
        let r = trailing(dec!(0.95), dec!(1), dec!(0.98));
        // 1.00 * 0.99 = 0.99, already the cap; push the computed value over.
        assert_eq!(
            evaluate(&r, dec!(1.00)),
            Decision::UpdateTrailing {
                high_water: dec!(1.00),
                trigger: dec!(0.99),
            }
        );
    }

    #[test]
    fn trailing_without_percent_never_updates() {
        let mut r = trailing(dec!(0.50), dec!(10), dec!(0.60));
        r.trailing_percent = None;
        assert_eq!(evaluate(&r, dec!(0.70)), Decision::NoAction);
    }
}
