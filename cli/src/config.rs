use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use platter_core::models::MacroVector;
use platter_core::service::PlannerConfig;

const CONFIG_FILE: &str = "config.toml";
const DEFAULT_CATALOG: &str = "catalog.csv";

/// Optional `config.toml` in the data directory.
///
/// ```toml
/// catalog_path = "/home/me/foods.csv"
/// default_training = false
///
/// [profiles.rest]
/// kcal = 1800.0
/// protein = 150.0
/// carbs = 140.0
/// fat = 70.0
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    catalog_path: Option<PathBuf>,
    #[serde(flatten)]
    planner: PlannerConfig,
}

pub struct Config {
    pub catalog_path: PathBuf,
    pub planner: PlannerConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "platter").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Self::load_from(&data_dir)
    }

    pub fn load_from(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let file = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            parse_config(&text).with_context(|| format!("Invalid config file {}", path.display()))?
        } else {
            ConfigFile::default()
        };

        let catalog_path = file
            .catalog_path
            .unwrap_or_else(|| data_dir.join(DEFAULT_CATALOG));
        tracing::debug!(data_dir = %data_dir.display(), catalog = %catalog_path.display(), "config loaded");

        Ok(Config {
            catalog_path,
            planner: file.planner,
        })
    }
}

fn parse_config(text: &str) -> Result<ConfigFile> {
    let file: ConfigFile = toml::from_str(text)?;
    let profiles = &file.planner.profiles;
    check_profile("training", &profiles.training)?;
    check_profile("rest", &profiles.rest)?;
    Ok(file)
}

/// Rejects `nan`, `inf` and negative targets.
fn check_profile(name: &str, target: &MacroVector) -> Result<()> {
    let fields = [
        ("kcal", target.kcal),
        ("protein", target.protein),
        ("carbs", target.carbs),
        ("fat", target.fat),
    ];
    for (field, value) in fields {
        if !value.is_finite() || value < 0.0 {
            bail!("profiles.{name}.{field} must be a non-negative number, got {value}");
        }
    }
    Ok(())
}
