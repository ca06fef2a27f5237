use rand::Rng;

/// Roll a drop amount for a consumed resource.
///
/// Every full 100% of `drop_rate_percent` above 100% adds one unit outright;
/// the fractional remainder is one more independent roll. At 250% a base of 1
/// becomes 2, or 3 half of the time.
pub fn roll_drop_amount<R: Rng + ?Sized>(base: u32, drop_rate_percent: f64, rng: &mut R) -> u32 {
    let bonus = drop_rate_percent / 100.0 - 1.0;
    if !bonus.is_finite() {
        tracing::warn!(drop_rate_percent, "non-finite drop rate, using base amount");
        return base;
    }
    if bonus <= 0.0 {
        return base;
    }
    // `as` saturates at u32::MAX.
    let mut amount = base.saturating_add(bonus.trunc() as u32);
    let remainder = bonus.fract();
    if remainder > 0.0 && rng.r#gen::<f64>() < remainder {
        amount = amount.saturating_add(1);
    }
    amount
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn base_rate_never_adds() {
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(roll_drop_amount(1, 100.0, &mut rng), 1);
            assert_eq!(roll_drop_amount(1, 40.0, &mut rng), 1);
        }
    }

    #[test]
    fn whole_multiples_are_guaranteed() {
        let mut rng = SmallRng::seed_from_u64(2);
        for _ in 0..100 {
            assert_eq!(roll_drop_amount(1, 300.0, &mut rng), 3);
            assert_eq!(roll_drop_amount(4, 200.0, &mut rng), 5);
        }
    }

    #[test]
    fn two_hundred_fifty_percent_adds_one_plus_a_coin_flip() {
        let mut rng = SmallRng::seed_from_u64(3);
        let trials = 4000;
        let mut threes = 0;
        for _ in 0..trials {
            let amount = roll_drop_amount(1, 250.0, &mut rng);
            assert!(amount == 2 || amount == 3, "got {amount}");
            if amount == 3 {
                threes += 1;
            }
        }
        let ratio = threes as f64 / trials as f64;
        assert!((0.45..0.55).contains(&ratio), "ratio {ratio}");
    }

    #[test]
    fn fractional_remainder_is_not_rounded() {
        let mut rng = SmallRng::seed_from_u64(4);
        let trials = 4000;
        let hits = (0..trials)
            .filter(|_| roll_drop_amount(0, 110.0, &mut rng) == 1)
            .count();
        let ratio = hits as f64 / trials as f64;
        assert!((0.07..0.13).contains(&ratio), "ratio {ratio}");
    }

    #[test]
    fn huge_rate_saturates_instead_of_spinning() {
        let mut rng = SmallRng::seed_from_u64(6);
        assert_eq!(roll_drop_amount(1, 1e20, &mut rng), u32::MAX);
        assert_eq!(roll_drop_amount(0, 1e12, &mut rng), u32::MAX);
        assert_eq!(roll_drop_amount(7, 5e8, &mut rng), 7 + 4_999_999);
    }

    #[test]
    fn infinite_rate_falls_back_to_base() {
        let mut rng = SmallRng::seed_from_u64(5);
        assert_eq!(roll_drop_amount(2, f64::INFINITY, &mut rng), 2);
        assert_eq!(roll_drop_amount(2, f64::NAN, &mut rng), 2);
    }
}
