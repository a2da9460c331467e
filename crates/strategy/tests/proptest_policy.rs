use common::Action;
use proptest::prelude::*;
use strategy::DecisionPolicy;

proptest! {
    /// Following the policy's own decisions never drives inventory below zero.
    #[test]
    fn policy_never_sells_without_inventory(
        probabilities in prop::collection::vec(0.0f64..=1.0f64, 1..500),
        lower in 0.0f64..0.5f64,
        band in 0.01f64..0.5f64,
    ) {
        let policy = DecisionPolicy::new(lower, lower + band).unwrap();
        let mut position: u64 = 0;

        for p in probabilities {
            match policy.decide(p, position) {
                Action::Buy => position += 1,
                Action::Sell => {
                    prop_assert!(position > 0, "SELL emitted at zero inventory (p = {p})");
                    position -= 1;
                }
                Action::Hold => {}
            }
        }
    }

    /// Inside the neutral band the policy always holds.
    #[test]
    fn neutral_band_always_holds(
        lower in 0.0f64..0.5f64,
        band in 0.01f64..0.5f64,
        t in 0.0f64..=1.0f64,
        position in 0u64..100,
    ) {
        let upper = lower + band;
        let policy = DecisionPolicy::new(lower, upper).unwrap();
        let p = lower + t * band;
        prop_assert_eq!(policy.decide(p, position), Action::Hold);
    }
}
