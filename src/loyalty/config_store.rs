// Loyalty Configuration Store
//
// Holds the active loyalty settings and member level table behind async
// locks. Updates are validated before they replace the current values.

use std::path::Path;
use tokio::sync::RwLock;

use crate::loyalty::error::LoyaltyResult;
use crate::loyalty::member_levels::{LevelTable, MemberLevel};
use crate::loyalty::settings::LoyaltySettings;

/// Loyalty Configuration Store
pub struct LoyaltyConfigStore {
    settings: RwLock<LoyaltySettings>,
    levels: RwLock<LevelTable>,
}

impl LoyaltyConfigStore {
    /// Create a store seeded with the given settings and level table
    pub fn new(settings: LoyaltySettings, levels: LevelTable) -> Self {
        Self {
            settings: RwLock::new(settings),
            levels: RwLock::new(levels),
        }
    }

    /// Seed settings from a JSON file when a path is given, defaults otherwise
    pub async fn load(settings_path: Option<&Path>) -> LoyaltyResult<Self> {
        let settings = match settings_path {
            Some(path) => {
                let settings = LoyaltySettings::load_from_file(path).await?;
                tracing::info!("Loaded loyalty settings from {}", path.display());
                settings
            }
            None => {
                tracing::info!("Using default loyalty settings");
                LoyaltySettings::default()
            }
        };
        Ok(Self::new(settings, LevelTable::default_table()))
    }

    pub async fn settings(&self) -> LoyaltySettings {
        self.settings.read().await.clone()
    }

    /// Replace the settings after validating them
    pub async fn update_settings(&self, settings: LoyaltySettings) -> LoyaltyResult<LoyaltySettings> {
        settings.validate()?;
        let mut current = self.settings.write().await;
        *current = settings.clone();
        tracing::info!("Loyalty settings updated");
        Ok(settings)
    }

    pub async fn levels(&self) -> LevelTable {
        self.levels.read().await.clone()
    }

    /// Replace the level table; rejected tables leave the current one in place
    pub async fn update_levels(&self, levels: Vec<MemberLevel>) -> LoyaltyResult<LevelTable> {
        let table = LevelTable::new(levels)?;
        let mut current = self.levels.write().await;
        *current = table.clone();
        tracing::info!("Member level table updated ({} levels)", table.levels().len());
        Ok(table)
    }
}

impl Default for LoyaltyConfigStore {
    fn default() -> Self {
        Self::new(LoyaltySettings::default(), LevelTable::default_table())
    }
}
