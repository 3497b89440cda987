//! Costs are negative log probabilities: `0` is certainty, `+inf` is an
//! impossible event.

pub const ZERO_COST: f64 = 0.0;
pub const INFINITE_COST: f64 = f64::INFINITY;

/// Sums two probabilities given as costs, returning the cost of the sum.
///
/// This is `-ln(exp(-a) + exp(-b))`, evaluated by factoring out the larger
/// probability so the exponent is never positive:
///
/// ```text
/// a > b:  b - ln(1 + exp(b - a))
/// else:   a - ln(1 + exp(a - b))
/// ```
///
/// Two infinite costs give `+inf`, never NaN.
#[inline]
pub fn sum_neg_log_prob(a: f64, b: f64) -> f64 {
    if a == INFINITE_COST && b == INFINITE_COST {
        INFINITE_COST
    } else if a > b {
        b - (b - a).exp().ln_1p()
    } else {
        a - (a - b).exp().ln_1p()
    }
}

/// Probability encoded by a cost.
#[inline]
pub fn probability(cost: f64) -> f64 {
    (-cost).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_infinite() {
        assert_eq!(sum_neg_log_prob(INFINITE_COST, INFINITE_COST), INFINITE_COST);
    }

    #[test]
    fn one_infinite() {
        assert_eq!(sum_neg_log_prob(INFINITE_COST, 2.5), 2.5);
        assert_eq!(sum_neg_log_prob(2.5, INFINITE_COST), 2.5);
    }

    #[test]
    fn two_certain_events() {
        // 1 + 1 = 2
        let c = sum_neg_log_prob(ZERO_COST, ZERO_COST);
        assert!((c + 2f64.ln()).abs() < 1e-12, "{c}");
    }

    #[test]
    fn large_costs_do_not_underflow() {
        // exp(-1000) underflows to 0, the naive formula would give +inf.
        let c = sum_neg_log_prob(1000.0, 1000.0);
        assert!((c - (1000.0 - 2f64.ln())).abs() < 1e-9, "{c}");
    }

    #[test]
    fn probability_of_cost() {
        assert_eq!(probability(ZERO_COST), 1.0);
        assert_eq!(probability(INFINITE_COST), 0.0);
    }
}
