//! Reference data: the card pool and the scenario lists.
//!
//! A small deck is compiled in so a fresh server is playable. Operators
//! can load their own deck from TOML:
//!
//! ```toml
//! [[cards]]
//! id = 1
//! category = "profession"
//! value = "Surgeon"
//! rarity = "rare"
//!
//! [[scenarios]]
//! id = 1
//! kind = "location"
//! title = "Metro tunnel"
//! description = "A sealed section of the old line."
//! survivor_slots = 3
//! ```

use std::collections::HashSet;

use serde::Deserialize;

use holdout_protocol::{CardCategory, CardId, ScenarioId, ScenarioKind};

use crate::StoreError;
use crate::models::{Card, Scenario};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReferenceData {
    #[serde(default)]
    pub cards: Vec<Card>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

impl ReferenceData {
    /// Parses a deck and checks that ids are unique.
    pub fn from_toml_str(text: &str) -> Result<Self, StoreError> {
        let data: Self = toml::from_str(text)?;

        let mut seen = HashSet::new();
        if let Some(card) = data.cards.iter().find(|c| !seen.insert(c.id)) {
            return Err(StoreError::Conflict(format!(
                "duplicate card id {}",
                card.id
            )));
        }
        let mut seen = HashSet::new();
        if let Some(s) = data.scenarios.iter().find(|s| !seen.insert(s.id)) {
            return Err(StoreError::Conflict(format!(
                "duplicate scenario id {}",
                s.id
            )));
        }
        Ok(data)
    }

    /// The compiled-in deck: 16 cards per category, 8 hazards and 8
    /// locations.
    pub fn builtin() -> Self {
        let mut cards = Vec::new();
        for (category, values) in CARD_VALUES {
            for (value, rarity) in *values {
                cards.push(Card {
                    id: CardId(cards.len() as u64 + 1),
                    category: *category,
                    value: (*value).to_string(),
                    description: None,
                    rarity: rarity.map(str::to_string),
                });
            }
        }

        let mut scenarios = Vec::new();
        for (title, description) in HAZARDS {
            scenarios.push(Scenario {
                id: ScenarioId(scenarios.len() as u64 + 1),
                kind: ScenarioKind::Hazard,
                title: (*title).to_string(),
                description: (*description).to_string(),
                survivor_slots: None,
            });
        }
        for (title, description, slots) in LOCATIONS {
            scenarios.push(Scenario {
                id: ScenarioId(scenarios.len() as u64 + 1),
                kind: ScenarioKind::Location,
                title: (*title).to_string(),
                description: (*description).to_string(),
                survivor_slots: Some(*slots),
            });
        }

        Self { cards, scenarios }
    }
}

type CardList = &'static [(&'static str, Option<&'static str>)];

const CARD_VALUES: &[(CardCategory, CardList)] = &[
    (
        CardCategory::Profession,
        &[
            ("Surgeon", Some("rare")),
            ("Electrician", None),
            ("Farmer", None),
            ("Chemist", None),
            ("Teacher", None),
            ("Plumber", None),
            ("Soldier", None),
            ("Cook", None),
            ("Architect", None),
            ("Pilot", Some("rare")),
            ("Veterinarian", None),
            ("Programmer", None),
            ("Priest", None),
            ("Firefighter", None),
            ("Mechanic", None),
            ("Psychologist", None),
        ],
    ),
    (
        CardCategory::Health,
        &[
            ("Perfectly healthy", Some("rare")),
            ("Asthma", None),
            ("Diabetes", None),
            ("Near-sighted", None),
            ("Insomnia", None),
            ("Broken arm", None),
            ("Allergic to dust", None),
            ("Pregnant", None),
            ("Chronic migraine", None),
            ("Hearing loss", None),
            ("Athlete's stamina", Some("rare")),
            ("Weak heart", None),
            ("Colour blind", None),
            ("Back pain", None),
            ("Anaemia", None),
            ("Sleepwalker", None),
        ],
    ),
    (
        CardCategory::Hobby,
        &[
            ("Gardening", None),
            ("Chess", None),
            ("Hunting", None),
            ("Knitting", None),
            ("Radio amateur", Some("rare")),
            ("Rock climbing", None),
            ("Guitar", None),
            ("Fishing", None),
            ("Woodworking", None),
            ("Painting", None),
            ("Brewing", None),
            ("First aid courses", Some("rare")),
            ("Poker", None),
            ("Yoga", None),
            ("Astronomy", None),
            ("Stand-up comedy", None),
        ],
    ),
    (
        CardCategory::Phobia,
        &[
            ("Claustrophobia", None),
            ("Fear of the dark", None),
            ("Fear of spiders", None),
            ("Fear of blood", None),
            ("Fear of crowds", None),
            ("Fear of silence", None),
            ("Fear of heights", None),
            ("Fear of water", None),
            ("Fear of dogs", None),
            ("Fear of fire", None),
            ("Fear of germs", None),
            ("Fear of being alone", None),
            ("Fear of loud noises", None),
            ("Fear of needles", None),
            ("No phobias", Some("rare")),
            ("Fear of clowns", None),
        ],
    ),
    (
        CardCategory::Baggage,
        &[
            ("First aid kit", None),
            ("Box of seeds", Some("rare")),
            ("Shotgun with 10 shells", None),
            ("Water filter", Some("rare")),
            ("Toolbox", None),
            ("Crate of canned food", None),
            ("Acoustic guitar", None),
            ("Encyclopedia set", None),
            ("Solar charger", None),
            ("Bag of cement", None),
            ("Sleeping bag", None),
            ("Bottle of whisky", None),
            ("Geiger counter", None),
            ("Deck of cards", None),
            ("Fishing rod", None),
            ("Empty suitcase", None),
        ],
    ),
    (
        CardCategory::Fact,
        &[
            ("Knows sign language", None),
            ("Was a child actor", None),
            ("Speaks five languages", None),
            ("Has a criminal record", None),
            ("Survived a plane crash", Some("rare")),
            ("Owns a bunker elsewhere", None),
            ("Cannot swim", None),
            ("Ran a marathon", None),
            ("Was married four times", None),
            ("Knows the bunker's builder", Some("rare")),
            ("Sleeps two hours a night", None),
            ("Has an identical twin", None),
            ("Is left-handed", None),
            ("Grew up on a farm", None),
            ("Won the lottery once", None),
            ("Never learned to read", None),
        ],
    ),
];

const HAZARDS: &[(&str, &str)] = &[
    ("Nuclear winter", "The sky stays grey for years; crops fail."),
    ("Pandemic", "A fast airborne virus spreads across the continent."),
    ("Asteroid impact", "Debris rains down; the coasts are gone."),
    ("Super-volcano", "Ash blocks the sun across the hemisphere."),
    ("Machine uprising", "Automated systems turn on their makers."),
    ("Great flood", "The ice caps melted within a single season."),
    ("Solar flare", "Every grid and chip on Earth is fried."),
    ("Alien occupation", "Landing ships patrol every city."),
];

const LOCATIONS: &[(&str, &str, u32)] = &[
    ("Metro tunnel", "A sealed section of the old line.", 3),
    ("Mountain shelter", "Carved into granite, cold but solid.", 4),
    ("Farm cellar", "Small, damp, next to fertile soil.", 2),
    ("Military bunker", "Reinforced concrete and a diesel generator.", 5),
    ("Submarine", "Cramped hull, sealed hatches.", 3),
    ("Hospital basement", "Backup power and a pharmacy.", 4),
    ("Abandoned mine", "Deep shafts, fresh groundwater.", 3),
    ("Private yacht", "Well stocked, but exposed to storms.", 2),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_sixteen_cards_per_category() {
        let data = ReferenceData::builtin();
        for category in CardCategory::ALL {
            let n = data.cards.iter().filter(|c| c.category == category).count();
            assert_eq!(n, 16, "{category}");
        }
    }

    #[test]
    fn test_builtin_ids_are_unique() {
        let data = ReferenceData::builtin();
        let ids: HashSet<_> = data.cards.iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), data.cards.len());
        let ids: HashSet<_> = data.scenarios.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), data.scenarios.len());
    }

    #[test]
    fn test_builtin_locations_have_slots() {
        let data = ReferenceData::builtin();
        assert!(
            data.scenarios
                .iter()
                .filter(|s| s.kind == ScenarioKind::Location)
                .all(|s| s.survivor_slots.is_some())
        );
    }

    #[test]
    fn test_from_toml_parses_deck() {
        let data = ReferenceData::from_toml_str(
            r#"
            [[cards]]
            id = 1
            category = "profession"
            value = "Surgeon"
            rarity = "rare"

            [[scenarios]]
            id = 7
            kind = "location"
            title = "Metro tunnel"
            description = "Sealed."
            survivor_slots = 3
            "#,
        )
        .unwrap();

        assert_eq!(data.cards.len(), 1);
        assert_eq!(data.cards[0].category, CardCategory::Profession);
        assert_eq!(data.scenarios[0].survivor_slots, Some(3));
    }

    #[test]
    fn test_from_toml_rejects_duplicate_ids() {
        let err = ReferenceData::from_toml_str(
            r#"
            [[cards]]
            id = 1
            category = "hobby"
            value = "Chess"

            [[cards]]
            id = 1
            category = "hobby"
            value = "Poker"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_from_toml_reports_syntax_errors() {
        let err = ReferenceData::from_toml_str("[[cards]\nid = ").unwrap_err();
        assert!(matches!(err, StoreError::InvalidReferenceData(_)));
    }
}
