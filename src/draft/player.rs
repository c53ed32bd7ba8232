// Player records and the ordered player catalog.

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::pick::Position;

/// Reported injury designation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjuryStatus {
    Healthy,
    Questionable,
    Doubtful,
    Out,
}

impl InjuryStatus {
    /// Parse an upstream injury string. Sleeper reports designations such as
    /// "Questionable", "Out", "IR" or "PUP"; every status that keeps a player
    /// off the field for the foreseeable future maps to `Out`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "healthy" | "active" => Some(InjuryStatus::Healthy),
            "questionable" | "q" => Some(InjuryStatus::Questionable),
            "doubtful" | "d" => Some(InjuryStatus::Doubtful),
            "out" | "o" | "ir" | "pup" | "sus" | "nfi" | "cov" => Some(InjuryStatus::Out),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InjuryStatus::Healthy => "healthy",
            InjuryStatus::Questionable => "questionable",
            InjuryStatus::Doubtful => "doubtful",
            InjuryStatus::Out => "out",
        }
    }

    /// Raw injury penalty before strategy weighting.
    pub fn penalty(&self) -> f64 {
        match self {
            InjuryStatus::Out => 50.0,
            InjuryStatus::Doubtful => 30.0,
            InjuryStatus::Questionable => 15.0,
            InjuryStatus::Healthy => 0.0,
        }
    }
}

/// A normalized player from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub player_id: String,
    pub full_name: String,
    /// `None` for positions the engine does not know (IDP, OL, ...).
    pub position: Option<Position>,
    pub team: Option<String>,
    pub adp: Option<f64>,
    /// Coarse ranking bucket, 1 is best.
    pub tier: Option<u32>,
    /// Season-long projected fantasy points.
    pub projection: Option<f64>,
    pub bye_week: Option<u8>,
    pub injury_status: Option<InjuryStatus>,
    pub news: Option<String>,
    /// Opaque attributes passed through from upstream.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Player {
    /// Projected points, 0 when unknown.
    pub fn projected_points(&self) -> f64 {
        self.projection.unwrap_or(0.0)
    }

    /// Whether the display name is usable for ranking output.
    pub fn has_usable_name(&self) -> bool {
        !self.full_name.trim().is_empty()
    }
}

/// Players keyed by id, iterated in insertion order.
///
/// Insertion order is what the scoring engine uses to break score ties, so
/// re-inserting an existing id replaces the record in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerCatalog {
    players: Vec<Player>,
    index: HashMap<String, usize>,
}

impl PlayerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, player: Player) {
        match self.index.get(&player.player_id) {
            Some(&slot) => self.players[slot] = player,
            None => {
                self.index.insert(player.player_id.clone(), self.players.len());
                self.players.push(player);
            }
        }
    }

    pub fn get(&self, player_id: &str) -> Option<&Player> {
        self.index.get(player_id).map(|&slot| &self.players[slot])
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.index.contains_key(player_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn into_players(self) -> Vec<Player> {
        self.players
    }
}

impl FromIterator<Player> for PlayerCatalog {
    fn from_iter<I: IntoIterator<Item = Player>>(iter: I) -> Self {
        let mut catalog = PlayerCatalog::new();
        for player in iter {
            catalog.insert(player);
        }
        catalog
    }
}

impl Serialize for PlayerCatalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.players.len()))?;
        for player in &self.players {
            map.serialize_entry(&player.player_id, player)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str, name: &str) -> Player {
        Player {
            player_id: id.into(),
            full_name: name.into(),
            position: Some(Position::RunningBack),
            team: Some("KC".into()),
            adp: None,
            tier: None,
            projection: None,
            bye_week: None,
            injury_status: None,
            news: None,
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn injury_parse_maps_sleeper_designations() {
        assert_eq!(InjuryStatus::parse("Questionable"), Some(InjuryStatus::Questionable));
        assert_eq!(InjuryStatus::parse("Doubtful"), Some(InjuryStatus::Doubtful));
        assert_eq!(InjuryStatus::parse("Out"), Some(InjuryStatus::Out));
        assert_eq!(InjuryStatus::parse("IR"), Some(InjuryStatus::Out));
        assert_eq!(InjuryStatus::parse("PUP"), Some(InjuryStatus::Out));
        assert_eq!(InjuryStatus::parse("healthy"), Some(InjuryStatus::Healthy));
        assert_eq!(InjuryStatus::parse("mystery"), None);
    }

    #[test]
    fn injury_penalty_strictly_ordered() {
        assert!(InjuryStatus::Out.penalty() > InjuryStatus::Doubtful.penalty());
        assert!(InjuryStatus::Doubtful.penalty() > InjuryStatus::Questionable.penalty());
        assert!(InjuryStatus::Questionable.penalty() > InjuryStatus::Healthy.penalty());
        assert_eq!(InjuryStatus::Healthy.penalty(), 0.0);
    }

    #[test]
    fn projected_points_defaults_to_zero() {
        let mut p = player("1", "A");
        assert_eq!(p.projected_points(), 0.0);
        p.projection = Some(212.5);
        assert_eq!(p.projected_points(), 212.5);
    }

    #[test]
    fn usable_name_rejects_blank() {
        assert!(player("1", "Bijan Robinson").has_usable_name());
        assert!(!player("1", "   ").has_usable_name());
        assert!(!player("1", "").has_usable_name());
    }

    #[test]
    fn catalog_preserves_insertion_order() {
        let catalog: PlayerCatalog = vec![player("c", "C"), player("a", "A"), player("b", "B")]
            .into_iter()
            .collect();
        let ids: Vec<&str> = catalog.iter().map(|p| p.player_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn catalog_reinsert_replaces_in_place() {
        let mut catalog: PlayerCatalog =
            vec![player("a", "A"), player("b", "B")].into_iter().collect();
        catalog.insert(player("a", "A Prime"));

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("a").unwrap().full_name, "A Prime");
        let ids: Vec<&str> = catalog.iter().map(|p| p.player_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn catalog_serializes_as_ordered_map() {
        let catalog: PlayerCatalog =
            vec![player("z", "Z"), player("a", "A")].into_iter().collect();
        let json = serde_json::to_string(&catalog).unwrap();
        let z_at = json.find("\"z\"").unwrap();
        let a_at = json.find("\"a\"").unwrap();
        assert!(z_at < a_at, "catalog order should be kept: {json}");
    }
}
