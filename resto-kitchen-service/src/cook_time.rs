use std::time::Duration;

use resto_core::models::OrderType;

/// Estimates how long an order takes to prepare. Injected into the worker
/// so the stand-in schedule can be swapped for real kitchen telemetry.
pub trait CookTimeEstimator: Send + Sync {
    fn estimate(&self, order_type: OrderType) -> Duration;
}

/// Fixed per-type schedule modeling kitchen throughput.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedSchedule;

impl CookTimeEstimator for FixedSchedule {
    fn estimate(&self, order_type: OrderType) -> Duration {
        match order_type {
            OrderType::DineIn => Duration::from_secs(8),
            OrderType::Takeout => Duration::from_secs(10),
            OrderType::Delivery => Duration::from_secs(12),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_schedule_matches_table() {
        let schedule = FixedSchedule;
        assert_eq!(schedule.estimate(OrderType::DineIn), Duration::from_secs(8));
        assert_eq!(schedule.estimate(OrderType::Takeout), Duration::from_secs(10));
        assert_eq!(
            schedule.estimate(OrderType::Delivery),
            Duration::from_secs(12)
        );
    }
}
