//! Game rules that operators may tune.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use holdout_protocol::GameVariant;
use holdout_store::Scenario;

/// Hard limits on room size.
pub const MIN_CAPACITY: u8 = 4;
pub const MAX_CAPACITY: u8 = 16;

/// Longest accepted display name, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// Tunable game settings.
///
/// Loaded as the `[game]` section of the server config; every field has a
/// default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Players needed before the host can start.
    pub min_players: usize,

    /// Scenarios offered on each scenario ballot.
    pub candidates_per_ballot: usize,

    /// Discussion round length for [`GameVariant::Standard`].
    #[serde(with = "secs")]
    pub standard_round: Duration,

    /// Discussion round length for [`GameVariant::Quick`].
    #[serde(with = "secs")]
    pub quick_round: Duration,

    /// Pause between announcing an elimination and moving on.
    #[serde(with = "secs")]
    pub announcement_delay: Duration,

    /// Length of generated room codes.
    pub code_length: usize,

    /// Room actor command queue size.
    pub channel_size: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 4,
            candidates_per_ballot: 3,
            standard_round: Duration::from_secs(180),
            quick_round: Duration::from_secs(90),
            announcement_delay: Duration::from_secs(5),
            code_length: 6,
            channel_size: 64,
        }
    }
}

impl GameConfig {
    /// Checks the settings a running game relies on. Returns the offending
    /// key and why.
    pub fn validate(&self) -> Result<(), String> {
        let min_players = usize::from(MIN_CAPACITY)..=usize::from(MAX_CAPACITY);
        if !min_players.contains(&self.min_players) {
            return Err(format!(
                "game.min_players must be between {MIN_CAPACITY} and {MAX_CAPACITY}, got {}",
                self.min_players
            ));
        }
        if self.candidates_per_ballot == 0 {
            return Err("game.candidates_per_ballot must be at least 1".into());
        }
        if self.code_length == 0 {
            return Err("game.code_length must be at least 1".into());
        }
        Ok(())
    }

    pub fn round_duration(&self, variant: GameVariant) -> Duration {
        match variant {
            GameVariant::Standard => self.standard_round,
            GameVariant::Quick => self.quick_round,
        }
    }
}

/// Living-player count at or below which the game ends.
///
/// Never below two, whatever the chosen location allows.
pub fn survivor_threshold(location: Option<&Scenario>) -> usize {
    let slots = location.and_then(|l| l.survivor_slots).unwrap_or(0) as usize;
    slots.max(2)
}

/// Durations as whole seconds in config files.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use holdout_protocol::{ScenarioId, ScenarioKind};

    use super::*;

    fn location(slots: Option<u32>) -> Scenario {
        Scenario {
            id: ScenarioId(1),
            kind: ScenarioKind::Location,
            title: "Cellar".into(),
            description: String::new(),
            survivor_slots: slots,
        }
    }

    #[test]
    fn test_defaults() {
        let c = GameConfig::default();
        assert_eq!(c.min_players, 4);
        assert_eq!(c.candidates_per_ballot, 3);
        assert_eq!(c.round_duration(GameVariant::Quick), Duration::from_secs(90));
        assert_eq!(
            c.round_duration(GameVariant::Standard),
            Duration::from_secs(180)
        );
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_settings() {
        let below_floor = GameConfig {
            min_players: 3,
            ..GameConfig::default()
        };
        assert!(below_floor.validate().unwrap_err().contains("min_players"));

        let above_capacity = GameConfig {
            min_players: usize::from(MAX_CAPACITY) + 1,
            ..GameConfig::default()
        };
        assert!(above_capacity.validate().is_err());

        let no_candidates = GameConfig {
            candidates_per_ballot: 0,
            ..GameConfig::default()
        };
        assert!(no_candidates
            .validate()
            .unwrap_err()
            .contains("candidates_per_ballot"));

        let no_code = GameConfig {
            code_length: 0,
            ..GameConfig::default()
        };
        assert!(no_code.validate().unwrap_err().contains("code_length"));
    }

    #[test]
    fn test_survivor_threshold_floor_is_two() {
        assert_eq!(survivor_threshold(None), 2);
        assert_eq!(survivor_threshold(Some(&location(Some(1)))), 2);
        assert_eq!(survivor_threshold(Some(&location(None))), 2);
        assert_eq!(survivor_threshold(Some(&location(Some(4)))), 4);
    }
}
