use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

const DEFAULT_RESERVOIR_CAPACITY: u32 = 10;

/// One publishing destination and its editorial voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    /// Human-readable destination the published entity lands on.
    pub destination: String,
    pub primary_locale: String,
    pub alternate_locale: Option<String>,
    /// Per-locale system prompts. Must contain at least the primary locale.
    pub voice: BTreeMap<String, String>,
    /// Keyword templates for the deterministic day-of-year fallback.
    /// `{year}` and `{month}` tokens are substituted at selection time.
    pub keyword_templates: Vec<String>,
    pub keywords: Option<Vec<String>>,
    pub reservoir_capacity: Option<u32>,
}

impl SiteConfig {
    /// Generate a URL-safe slug from the site name.
    #[must_use]
    pub fn slug(&self) -> String {
        self.name
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' {
                    c
                } else if c == ' ' {
                    '-'
                } else {
                    '\0'
                }
            })
            .filter(|&c| c != '\0')
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }

    #[must_use]
    pub fn reservoir_capacity(&self) -> u32 {
        self.reservoir_capacity
            .unwrap_or(DEFAULT_RESERVOIR_CAPACITY)
    }

    /// System prompt for a locale, falling back to the primary locale's voice.
    #[must_use]
    pub fn voice_for(&self, locale: &str) -> Option<&str> {
        self.voice
            .get(locale)
            .or_else(|| self.voice.get(&self.primary_locale))
            .map(String::as_str)
    }

    /// Deterministic fallback keyword for a date, keyed by day of year.
    ///
    /// The same date always selects the same template, so concurrent runners
    /// that both fall back to template topics converge on the same keyword
    /// and the duplicate is caught by draft creation, not by chance.
    #[must_use]
    pub fn template_keyword(&self, date: chrono::NaiveDate) -> Option<String> {
        if self.keyword_templates.is_empty() {
            return None;
        }
        let index = (date.ordinal0() as usize) % self.keyword_templates.len();
        let template = &self.keyword_templates[index];
        Some(
            template
                .replace("{year}", &date.year().to_string())
                .replace("{month}", month_name(date.month())),
        )
    }
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        _ => "December",
    }
}

#[derive(Debug, Deserialize)]
pub struct SitesFile {
    pub sites: Vec<SiteConfig>,
}

impl SitesFile {
    /// Look up a site by its derived slug.
    #[must_use]
    pub fn by_slug(&self, slug: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.slug() == slug)
    }
}

/// Load and validate the site registry from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sites(path: &Path) -> Result<SitesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SitesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let sites_file: SitesFile = serde_yaml::from_str(&content)?;

    validate_sites(&sites_file)?;

    Ok(sites_file)
}

fn validate_sites(sites_file: &SitesFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();
    let mut seen_slugs = HashSet::new();

    for site in &sites_file.sites {
        if site.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "site name must be non-empty".to_string(),
            ));
        }

        let lower_name = site.name.to_lowercase();
        if !seen_names.insert(lower_name) {
            return Err(ConfigError::Validation(format!(
                "duplicate site name: '{}'",
                site.name
            )));
        }

        let slug = site.slug();
        if !seen_slugs.insert(slug.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate site slug: '{}' (from site '{}')",
                slug, site.name
            )));
        }

        if site.keyword_templates.is_empty() {
            return Err(ConfigError::Validation(format!(
                "site '{}' has no keyword templates",
                site.name
            )));
        }

        if site
            .alternate_locale
            .as_ref()
            .is_some_and(|alt| alt == &site.primary_locale)
        {
            return Err(ConfigError::Validation(format!(
                "site '{}' declares its primary locale as its alternate",
                site.name
            )));
        }

        if !site.voice.contains_key(&site.primary_locale) {
            return Err(ConfigError::Validation(format!(
                "site '{}' has no voice for its primary locale '{}'",
                site.name, site.primary_locale
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(name: &str) -> SiteConfig {
        let mut voice = BTreeMap::new();
        voice.insert("en".to_string(), "You are a travel writer.".to_string());
        SiteConfig {
            name: name.to_string(),
            destination: "example.com".to_string(),
            primary_locale: "en".to_string(),
            alternate_locale: Some("es".to_string()),
            voice,
            keyword_templates: vec!["best {month} getaways {year}".to_string()],
            keywords: None,
            reservoir_capacity: None,
        }
    }

    #[test]
    fn slug_simple_name() {
        assert_eq!(site("Coastal Escapes").slug(), "coastal-escapes");
    }

    #[test]
    fn slug_special_characters() {
        assert_eq!(site("Traveler's Digest").slug(), "travelers-digest");
    }

    #[test]
    fn reservoir_capacity_defaults_to_ten() {
        assert_eq!(site("A").reservoir_capacity(), 10);
    }

    #[test]
    fn voice_for_unknown_locale_falls_back_to_primary() {
        let s = site("A");
        assert_eq!(s.voice_for("fr"), Some("You are a travel writer."));
    }

    #[test]
    fn template_keyword_substitutes_tokens() {
        let s = site("A");
        let date = chrono::NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert_eq!(
            s.template_keyword(date).unwrap(),
            "best March getaways 2026"
        );
    }

    #[test]
    fn template_keyword_is_deterministic_per_day() {
        let mut s = site("A");
        s.keyword_templates = vec![
            "topic one {year}".to_string(),
            "topic two {year}".to_string(),
            "topic three {year}".to_string(),
        ];
        let date = chrono::NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let a = s.template_keyword(date).unwrap();
        let b = s.template_keyword(date).unwrap();
        assert_eq!(a, b);
        // ordinal0 of Jan 2 is 1 → second template
        assert_eq!(a, "topic two 2026");
    }

    #[test]
    fn validate_rejects_empty_name() {
        let file = SitesFile {
            sites: vec![site("  ")],
        };
        let err = validate_sites(&file).unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn validate_rejects_duplicate_slug() {
        let file = SitesFile {
            sites: vec![site("High Desert"), site("High--Desert")],
        };
        let err = validate_sites(&file).unwrap_err();
        assert!(err.to_string().contains("duplicate site"));
    }

    #[test]
    fn validate_rejects_empty_templates() {
        let mut s = site("A");
        s.keyword_templates.clear();
        let file = SitesFile { sites: vec![s] };
        let err = validate_sites(&file).unwrap_err();
        assert!(err.to_string().contains("no keyword templates"));
    }

    #[test]
    fn validate_rejects_alternate_equal_to_primary() {
        let mut s = site("A");
        s.alternate_locale = Some("en".to_string());
        let file = SitesFile { sites: vec![s] };
        let err = validate_sites(&file).unwrap_err();
        assert!(err.to_string().contains("alternate"));
    }

    #[test]
    fn validate_rejects_missing_primary_voice() {
        let mut s = site("A");
        s.voice.clear();
        let file = SitesFile { sites: vec![s] };
        let err = validate_sites(&file).unwrap_err();
        assert!(err.to_string().contains("no voice"));
    }

    #[test]
    fn validate_accepts_valid_sites() {
        let file = SitesFile {
            sites: vec![site("Coastal Escapes"), site("High Desert")],
        };
        assert!(validate_sites(&file).is_ok());
    }

    #[test]
    fn load_sites_from_real_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
            .join("sites.yaml");
        assert!(
            path.exists(),
            "sites.yaml missing at {path:?}; required for this test"
        );
        let result = load_sites(&path);
        assert!(result.is_ok(), "failed to load sites.yaml: {result:?}");
        let sites_file = result.unwrap();
        assert!(!sites_file.sites.is_empty());
    }
}
