use rand::seq::SliceRandom;
use rand::Rng;

use crate::lobby::WordCategories;

const AGENTS: &[&str] = &[
    "ninja", "pirate", "detective", "astronaut", "wizard", "robot", "vampire", "clown", "knight",
    "cowboy", "mermaid", "zombie", "pilot", "scientist", "samurai", "viking", "ghost",
    "superhero", "magician", "archer", "spy", "juggler", "firefighter", "diver", "acrobat",
];

const WEAPONS: &[&str] = &[
    "sword", "bow", "cannon", "catapult", "dagger", "shield", "spear", "axe", "hammer",
    "crossbow", "slingshot", "trident", "boomerang", "grenade", "musket", "katana", "mace",
    "whip", "harpoon", "shuriken", "lance", "pistol", "rifle", "club", "torpedo",
];

// Only reachable if someone constructs a bag from empty categories, which
// settings validation forbids.
const FALLBACK_WORD: &str = "scribble";

/// Per-session pool of drawable words. Words are handed out without
/// replacement; the pool is reshuffled and refilled only once exhausted,
/// so no word repeats within a game before every enabled word was used.
pub struct WordBag {
    categories: WordCategories,
    remaining: Vec<&'static str>,
}

impl WordBag {
    pub fn new<R: Rng>(categories: WordCategories, rng: &mut R) -> Self {
        let mut bag = Self {
            categories,
            remaining: Vec::new(),
        };
        bag.refill(rng);
        bag
    }

    pub fn draw<R: Rng>(&mut self, rng: &mut R) -> &'static str {
        if self.remaining.is_empty() {
            self.refill(rng);
        }
        self.remaining.pop().unwrap_or(FALLBACK_WORD)
    }

    fn refill<R: Rng>(&mut self, rng: &mut R) {
        if self.categories.agents {
            self.remaining.extend_from_slice(AGENTS);
        }
        if self.categories.weapons {
            self.remaining.extend_from_slice(WEAPONS);
        }
        self.remaining.shuffle(rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn it_never_repeats_before_exhausting_the_pool() {
        let mut rng = rand::thread_rng();
        let categories = WordCategories {
            agents: true,
            weapons: false,
        };
        let mut bag = WordBag::new(categories, &mut rng);

        let mut seen = HashSet::new();
        for _ in 0..AGENTS.len() {
            assert!(seen.insert(bag.draw(&mut rng)), "word repeated early");
        }
        // pool exhausted; the next draw refills
        assert!(seen.contains(bag.draw(&mut rng)));
    }

    #[test]
    fn it_only_draws_from_enabled_categories() {
        let mut rng = rand::thread_rng();
        let categories = WordCategories {
            agents: false,
            weapons: true,
        };
        let mut bag = WordBag::new(categories, &mut rng);
        for _ in 0..WEAPONS.len() {
            assert!(WEAPONS.contains(&bag.draw(&mut rng)));
        }
    }
}
