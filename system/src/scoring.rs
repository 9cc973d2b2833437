/// Maps how far into the turn a correct guess landed (`elapsed_fraction`
/// in 0..=1) and its zero-based rank to the point deltas for the guesser
/// and the drawer.
pub type ScoreFn = fn(elapsed_fraction: f32, guess_rank: usize) -> (u32, u32);

/// Default formula: fast guesses beat slow ones, early ranks beat late
/// ones, and every correct guess is worth at least something. The drawer
/// earns a flat share per correct guesser.
pub fn default_score(elapsed_fraction: f32, guess_rank: usize) -> (u32, u32) {
    let clamped = elapsed_fraction.max(0.0).min(1.0);
    let time_bonus = (100.0 * (1.0 - clamped)) as u32;
    let rank_penalty = 10u32.saturating_mul(guess_rank as u32);
    let guesser = (50 + time_bonus).saturating_sub(rank_penalty).max(25);
    (guesser, 25)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_rewards_faster_guesses_more() {
        let (fast, _) = default_score(0.1, 0);
        let (slow, _) = default_score(0.9, 0);
        assert!(fast > slow);
    }

    #[test]
    fn it_never_lets_later_ranks_outscore_earlier_ones() {
        for elapsed in &[0.0, 0.25, 0.5, 1.0] {
            let mut prev = u32::MAX;
            for rank in 0..8 {
                let (g, _) = default_score(*elapsed, rank);
                assert!(g <= prev);
                prev = g;
            }
        }
    }

    #[test]
    fn it_always_awards_something() {
        let (guesser, drawer) = default_score(1.0, 100);
        assert!(guesser >= 25);
        assert!(drawer > 0);
    }

    #[test]
    fn it_tolerates_out_of_range_fractions() {
        assert_eq!(default_score(-1.0, 0), default_score(0.0, 0));
        assert_eq!(default_score(2.0, 0), default_score(1.0, 0));
    }
}
