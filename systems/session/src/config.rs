//! Scenario files describing the starting town.

use gateway_town_core::{Direction, GridService, WorldBounds};
use gateway_town_system_play::DEFAULT_WEEK_SECONDS;
use gateway_town_world::{
    BusinessCatalog, BusinessTemplate, DecorTemplate, MapObject, ObjectTemplate, RoadTile,
    RoadVariant,
};
use glam::Vec2;
use serde::Deserialize;

/// Scenario format version understood by this build.
pub const SUPPORTED_SCENARIO_VERSION: u32 = 1;

/// Town rating a scenario starts with when it names none.
pub const DEFAULT_TOWN_RATING: i64 = 10;

/// Errors raised while reading a scenario.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document is not valid TOML or does not match the schema.
    #[error("failed to parse scenario toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// The document targets another format version.
    #[error("unsupported scenario version {found}; expected {expected}")]
    UnsupportedVersion {
        /// Version declared by the document.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },
    /// Grid cells must have a positive size.
    #[error("cell size must be positive, got {0}")]
    InvalidCellSize(f32),
    /// The bounds must enclose an area.
    #[error("world bounds must enclose an area")]
    EmptyBounds,
    /// Weeks must last a positive number of seconds.
    #[error("week length must be positive, got {0}")]
    InvalidWeekLength(f32),
    /// Car speed overrides must be positive.
    #[error("car speed must be positive, got {0}")]
    InvalidCarSpeed(f32),
    /// A road names sides other than N, E, S and W.
    #[error("unknown road variant `{0}`")]
    UnknownRoadVariant(String),
    /// A placed business is missing from the catalog.
    #[error("unknown business `{0}`")]
    UnknownBusiness(String),
}

/// Grid section of a scenario.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    /// Edge length of one cell in world units.
    pub cell_size: f32,
}

/// Playable rectangle in world units.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundsConfig {
    /// One corner.
    pub min: Vec2,
    /// The opposite corner.
    pub max: Vec2,
}

/// Road authored into the scenario.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoadPlacement {
    /// World position, snapped to the grid on load.
    pub at: Vec2,
    /// Side initials such as `"EW"`. Ordinary roads are retiled anyway.
    #[serde(default)]
    pub variant: String,
    /// Starter roads seed entrances and exits.
    #[serde(default)]
    pub starter: bool,
    /// Locked roads resist every tool.
    #[serde(default)]
    pub locked: bool,
}

/// Business authored into the scenario.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusinessPlacement {
    /// World position, snapped to the grid on load.
    pub at: Vec2,
    /// Catalog title.
    pub title: String,
    /// Driveway side for businesses that serve cars.
    #[serde(default)]
    pub facing: Option<Direction>,
    /// Locked businesses resist every tool.
    #[serde(default)]
    pub locked: bool,
}

/// Scenery authored into the scenario.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecorPlacement {
    /// World position, snapped to the grid on load.
    pub at: Vec2,
    /// Display name.
    pub name: String,
    /// Locked scenery cannot be cleaned.
    #[serde(default)]
    pub locked: bool,
}

/// Starting town read from a TOML document.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Format version, see [`SUPPORTED_SCENARIO_VERSION`].
    pub version: u32,
    /// Name used in messages.
    pub town_name: String,
    /// Seed of every random stream in the session.
    pub seed: u64,
    /// Money available on the first build day.
    pub starting_cash: i64,
    /// Rating before the first week is played.
    #[serde(default = "default_rating")]
    pub default_rating: i64,
    /// Target length of one simulated week.
    #[serde(default = "default_week_seconds")]
    pub week_seconds: f32,
    /// Fixed speed for every car.
    #[serde(default)]
    pub car_speed: Option<f32>,
    /// Grid layout.
    pub grid: GridConfig,
    /// Playable area.
    pub bounds: BoundsConfig,
    /// Pre-placed roads.
    #[serde(default)]
    pub roads: Vec<RoadPlacement>,
    /// Pre-placed businesses.
    #[serde(default)]
    pub businesses: Vec<BusinessPlacement>,
    /// Pre-placed scenery.
    #[serde(default)]
    pub decor: Vec<DecorPlacement>,
    /// Build menu; the standard line-up when absent.
    #[serde(default)]
    pub catalog: Option<Vec<BusinessTemplate>>,
}

fn default_rating() -> i64 {
    DEFAULT_TOWN_RATING
}

fn default_week_seconds() -> f32 {
    DEFAULT_WEEK_SECONDS
}

impl ScenarioConfig {
    /// Parses and validates a scenario document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value the session relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != SUPPORTED_SCENARIO_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                expected: SUPPORTED_SCENARIO_VERSION,
            });
        }
        if !positive(self.grid.cell_size) {
            return Err(ConfigError::InvalidCellSize(self.grid.cell_size));
        }
        let bounds = self.world_bounds();
        if !(bounds.max().x > bounds.min().x && bounds.max().y > bounds.min().y) {
            return Err(ConfigError::EmptyBounds);
        }
        if !positive(self.week_seconds) {
            return Err(ConfigError::InvalidWeekLength(self.week_seconds));
        }
        if let Some(speed) = self.car_speed {
            if !positive(speed) {
                return Err(ConfigError::InvalidCarSpeed(speed));
            }
        }
        let _ = self.objects()?;
        Ok(())
    }

    /// Grid described by the scenario.
    #[must_use]
    pub fn grid_service(&self) -> GridService {
        GridService::new(self.grid.cell_size)
    }

    /// Playable area described by the scenario.
    #[must_use]
    pub fn world_bounds(&self) -> WorldBounds {
        WorldBounds::new(self.bounds.min, self.bounds.max)
    }

    /// Build menu of the scenario.
    #[must_use]
    pub fn business_catalog(&self) -> BusinessCatalog {
        self.catalog
            .clone()
            .map_or_else(BusinessCatalog::standard, BusinessCatalog::new)
    }

    /// Every authored object with its unsnapped position: roads first, then
    /// businesses, then scenery.
    pub fn objects(&self) -> Result<Vec<(Vec2, MapObject)>, ConfigError> {
        let catalog = self.business_catalog();
        let mut objects = Vec::new();

        for road in &self.roads {
            let variant = RoadVariant::parse(&road.variant)
                .ok_or_else(|| ConfigError::UnknownRoadVariant(road.variant.clone()))?;
            let tile = if road.starter {
                RoadTile::starter(variant)
            } else {
                RoadTile::new(variant)
            };
            objects.push((road.at, placed(ObjectTemplate::Road(tile), road.locked)));
        }

        for business in &self.businesses {
            let mut template = catalog
                .find(&business.title)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownBusiness(business.title.clone()))?;
            if let Some(facing) = business.facing {
                template = template.facing(facing);
            }
            objects.push((
                business.at,
                placed(ObjectTemplate::Business(template), business.locked),
            ));
        }

        for decor in &self.decor {
            let template = ObjectTemplate::Decor(DecorTemplate::new(decor.name.as_str()));
            objects.push((decor.at, placed(template, decor.locked)));
        }

        Ok(objects)
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn placed(template: ObjectTemplate, locked: bool) -> MapObject {
    if locked {
        MapObject::locked(template)
    } else {
        MapObject::new(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        version = 1
        town_name = "Dustwater"
        seed = 4
        starting_cash = 5000

        [grid]
        cell_size = 1.0

        [bounds]
        min = [-4.0, -4.0]
        max = [4.0, 4.0]
    "#;

    fn with(extra: &str) -> String {
        format!("{MINIMAL}\n{extra}")
    }

    fn with_keys(keys: &str) -> String {
        format!("{keys}\n{MINIMAL}")
    }

    #[test]
    fn minimal_scenario_uses_defaults() {
        let config = ScenarioConfig::from_toml_str(MINIMAL).expect("minimal scenario parses");

        assert_eq!(config.default_rating, DEFAULT_TOWN_RATING);
        assert_eq!(config.week_seconds, DEFAULT_WEEK_SECONDS);
        assert_eq!(config.car_speed, None);
        assert_eq!(config.business_catalog(), BusinessCatalog::standard());
        assert!(config.objects().expect("no objects").is_empty());
    }

    #[test]
    fn objects_are_resolved_in_authoring_order() {
        let config = ScenarioConfig::from_toml_str(&with(
            r#"
            [[roads]]
            at = [-4.0, 0.0]
            variant = "EW"
            starter = true
            locked = true

            [[businesses]]
            at = [0.0, 1.0]
            title = "gas station"
            facing = "north"

            [[decor]]
            at = [2.0, 2.0]
            name = "cactus"
            "#,
        ))
        .expect("scenario parses");

        let objects = config.objects().expect("objects resolve");
        assert_eq!(objects.len(), 3);

        let (at, road) = &objects[0];
        assert_eq!(*at, Vec2::new(-4.0, 0.0));
        assert!(road.is_locked());
        assert!(road.as_road().is_some_and(RoadTile::is_starter));

        let stop = objects[1]
            .1
            .as_business()
            .and_then(BusinessTemplate::stop)
            .expect("gas station serves cars");
        assert_eq!(stop.facing, Direction::North, "facing overrides the catalog");

        assert!(objects[2].1.is_decor());
    }

    #[test]
    fn scenario_catalog_replaces_the_standard_one() {
        let config = ScenarioConfig::from_toml_str(&with(
            r#"
            [[catalog]]
            title = "Fruit Stand"
            cost = 300
            revenue_per_customer = 10
            weekly_upkeep = 5

            [catalog.kind]
            type = "stop"
            facing = "south"
            dwell_seconds = 0.5

            [[businesses]]
            at = [1.0, 1.0]
            title = "Fruit Stand"
            "#,
        ))
        .expect("scenario parses");

        let catalog = config.business_catalog();
        assert_eq!(catalog.entries().len(), 1);
        assert!(catalog.find("Diner").is_none(), "standard entries are replaced");
        assert_eq!(config.objects().expect("stand resolves").len(), 1);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_cell = MINIMAL.replace("cell_size = 1.0", "cell_size = 0.0");
        assert!(matches!(
            ScenarioConfig::from_toml_str(&bad_cell),
            Err(ConfigError::InvalidCellSize(_))
        ));

        let flat = MINIMAL.replace("max = [4.0, 4.0]", "max = [4.0, -4.0]");
        assert!(matches!(
            ScenarioConfig::from_toml_str(&flat),
            Err(ConfigError::EmptyBounds)
        ));

        let future = MINIMAL.replace("version = 1", "version = 2");
        assert!(matches!(
            ScenarioConfig::from_toml_str(&future),
            Err(ConfigError::UnsupportedVersion { found: 2, .. })
        ));

        let slow = with_keys("week_seconds = -1.0");
        assert!(matches!(
            ScenarioConfig::from_toml_str(&slow),
            Err(ConfigError::InvalidWeekLength(_))
        ));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let road = with(
            r#"
            [[roads]]
            at = [0.0, 0.0]
            variant = "NX"
            "#,
        );
        assert!(matches!(
            ScenarioConfig::from_toml_str(&road),
            Err(ConfigError::UnknownRoadVariant(label)) if label == "NX"
        ));

        let business = with(
            r#"
            [[businesses]]
            at = [0.0, 0.0]
            title = "Spaceport"
            "#,
        );
        assert!(matches!(
            ScenarioConfig::from_toml_str(&business),
            Err(ConfigError::UnknownBusiness(title)) if title == "Spaceport"
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let typo = with_keys("starting_money = 3");
        assert!(
            matches!(
                ScenarioConfig::from_toml_str(&typo),
                Err(ConfigError::Parse(_))
            ),
            "misspelled keys must not be ignored"
        );
    }
}
