use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::ConfigError;

/// A named competitor and the `[min, max]` multiplier band its synthesized
/// price is drawn from (applied to the list price).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompetitorBand {
    pub name: String,
    pub min_multiplier: Decimal,
    pub max_multiplier: Decimal,
}

impl CompetitorBand {
    /// Compiled-in default band set, used when no `competitors.yaml` is
    /// provided. Bands deliberately dip below the 1.10 floor so clamping
    /// is exercised in production, not just in tests.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        let band = |name: &str, min: i64, max: i64| CompetitorBand {
            name: name.to_owned(),
            min_multiplier: Decimal::new(min, 2),
            max_multiplier: Decimal::new(max, 2),
        };
        vec![
            band("ebay", 88, 128),
            band("walmart", 92, 120),
            band("target", 95, 130),
            band("aliexpress", 80, 115),
        ]
    }
}

/// Raw YAML shape; multipliers arrive as floats and are validated into
/// `Decimal` at load time.
#[derive(Debug, Deserialize)]
struct CompetitorEntry {
    name: String,
    min_multiplier: f64,
    max_multiplier: f64,
}

#[derive(Debug, Deserialize)]
struct CompetitorsDoc {
    competitors: Vec<CompetitorEntry>,
}

/// Validated competitor configuration.
#[derive(Debug, Clone)]
pub struct CompetitorsFile {
    pub competitors: Vec<CompetitorBand>,
}

/// Load and validate the competitor configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails
/// validation (empty set, duplicate names, non-finite or inverted bands).
pub fn load_competitors(path: &Path) -> Result<CompetitorsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CompetitorsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let doc: CompetitorsDoc =
        serde_yaml::from_str(&content).map_err(ConfigError::CompetitorsFileParse)?;

    validate_competitors(&doc)?;

    let competitors = doc
        .competitors
        .into_iter()
        .map(|entry| {
            let min = decimal_multiplier(&entry.name, "min_multiplier", entry.min_multiplier)?;
            let max = decimal_multiplier(&entry.name, "max_multiplier", entry.max_multiplier)?;
            Ok(CompetitorBand {
                name: entry.name,
                min_multiplier: min,
                max_multiplier: max,
            })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    Ok(CompetitorsFile { competitors })
}

fn decimal_multiplier(competitor: &str, field: &str, value: f64) -> Result<Decimal, ConfigError> {
    Decimal::from_f64_retain(value).ok_or_else(|| {
        ConfigError::Validation(format!(
            "competitor '{competitor}' has non-representable {field} {value}"
        ))
    })
}

fn validate_competitors(doc: &CompetitorsDoc) -> Result<(), ConfigError> {
    if doc.competitors.is_empty() {
        return Err(ConfigError::Validation(
            "competitor list must be non-empty".to_string(),
        ));
    }

    let mut seen_names = HashSet::new();
    for entry in &doc.competitors {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "competitor name must be non-empty".to_string(),
            ));
        }

        let lower = entry.name.to_lowercase();
        if !seen_names.insert(lower) {
            return Err(ConfigError::Validation(format!(
                "duplicate competitor name: '{}'",
                entry.name
            )));
        }

        if !entry.min_multiplier.is_finite() || !entry.max_multiplier.is_finite() {
            return Err(ConfigError::Validation(format!(
                "competitor '{}' has a non-finite multiplier",
                entry.name
            )));
        }

        if entry.min_multiplier <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "competitor '{}' has non-positive min_multiplier {}",
                entry.name, entry.min_multiplier
            )));
        }

        if entry.min_multiplier > entry.max_multiplier {
            return Err(ConfigError::Validation(format!(
                "competitor '{}' has min_multiplier {} above max_multiplier {}",
                entry.name, entry.min_multiplier, entry.max_multiplier
            )));
        }
    }

    Ok(())
}
