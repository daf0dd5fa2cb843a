//! Scenario ballots: drawing candidates and rendering them.

use rand::Rng;
use rand::seq::IndexedRandom;

use holdout_protocol::ScenarioView;
use holdout_store::Scenario;

/// Draws up to `n` distinct scenarios uniformly at random.
pub fn sample<R: Rng + ?Sized>(pool: &[Scenario], n: usize, rng: &mut R) -> Vec<Scenario> {
    pool.choose_multiple(rng, n).cloned().collect()
}

pub fn view(s: &Scenario) -> ScenarioView {
    ScenarioView {
        id: s.id,
        kind: s.kind,
        title: s.title.clone(),
        description: s.description.clone(),
        survivor_slots: s.survivor_slots,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use holdout_protocol::{ScenarioId, ScenarioKind};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn pool(n: u64) -> Vec<Scenario> {
        (1..=n)
            .map(|i| Scenario {
                id: ScenarioId(i),
                kind: ScenarioKind::Hazard,
                title: format!("hazard {i}"),
                description: String::new(),
                survivor_slots: None,
            })
            .collect()
    }

    #[test]
    fn test_sample_is_distinct() {
        let mut rng = StdRng::seed_from_u64(3);
        let picked = sample(&pool(8), 3, &mut rng);
        let ids: HashSet<_> = picked.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_sample_caps_at_pool_size() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(sample(&pool(2), 3, &mut rng).len(), 2);
    }
}
