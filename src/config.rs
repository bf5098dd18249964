use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Profile ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Base URL of the answering service; requests go to `<endpoint>/ask`
    pub endpoint: String,
    /// Per-request timeout. A timed-out exchange fails like any other.
    pub timeout_secs: u64,
    /// Shown as the assistant's reply when an exchange fails
    pub apology: String,
    /// Welcome-screen shortcuts, bound to keys 1..9
    pub suggestions: Vec<String>,
    /// Label on assistant entries
    pub assistant_name: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000".to_string(),
            timeout_secs: 60,
            apology: "Maaf, terjadi kesalahan. Silakan coba lagi.".to_string(),
            suggestions: Vec::new(),
            assistant_name: "AI Genie".to_string(),
        }
    }
}

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Which profile to use when none is specified
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            default_profile: default_profile_name(),
            profiles: HashMap::new(),
        }
    }
}

fn default_profile_name() -> String {
    "default".to_string()
}

impl ConfigFile {
    /// Load from disk, or return a default config if the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Write a starter config file to disk (only if it doesn't exist).
    pub fn write_default_if_missing() -> Result<PathBuf> {
        let path = config_path();
        write_default_at(&path)?;
        Ok(path)
    }

    /// Resolve the active profile given an optional override name.
    pub fn resolve_profile(&self, name: Option<&str>) -> Option<&Profile> {
        let key = name.unwrap_or(&self.default_profile);
        self.profiles.get(key)
    }

    /// Profile names, sorted, for `--profiles`.
    pub fn profile_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn write_default_at(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("Failed to write {}", path.display()))
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub apology: String,
    pub suggestions: Vec<String>,
    pub assistant_name: String,
    /// Profile name that was resolved (for display)
    pub profile_name: String,
    /// Where conversations and the log file live
    pub data_dir: PathBuf,
}

impl ResolvedConfig {
    /// Merge config file profile with CLI overrides.
    /// Priority: CLI args > env vars (handled by clap) > config file profile > built-in defaults
    pub fn resolve(
        file: &ConfigFile,
        profile_override: Option<&str>,
        endpoint_override: Option<&str>,
        data_dir_override: Option<&Path>,
    ) -> Self {
        let profile_name = profile_override
            .unwrap_or(&file.default_profile)
            .to_string();

        let base = file
            .resolve_profile(profile_override)
            .cloned()
            .unwrap_or_default();

        Self {
            endpoint: endpoint_override
                .map(str::to_string)
                .unwrap_or(base.endpoint),
            timeout: Duration::from_secs(base.timeout_secs.max(1)),
            apology: base.apology,
            suggestions: base.suggestions,
            assistant_name: base.assistant_name,
            profile_name,
            data_dir: data_dir_override
                .map(Path::to_path_buf)
                .unwrap_or_else(crate::storage::data_dir),
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_path() -> PathBuf {
    dirs_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("genie")
        .join("config.toml")
}

fn dirs_config_dir() -> Option<PathBuf> {
    // XDG_CONFIG_HOME or ~/.config
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

// ── Default config template written on first run ──────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# genie configuration
# Run `genie --init` to regenerate this file.

default_profile = "local"

# ── Local development server ──────────────────────────────────────────────────
[profiles.local]
endpoint     = "http://localhost:5000"
timeout_secs = 60
suggestions  = [
    "Apa itu machine learning?",
    "Jelaskan perbedaan TCP dan UDP",
    "Tulis fungsi Python untuk membalik string",
]

# ── Remote deployment ─────────────────────────────────────────────────────────
# [profiles.remote]
# endpoint       = "https://genie.example.com"
# timeout_secs   = 120
# assistant_name = "AI Genie"
# apology        = "Sorry, something went wrong. Please try again."
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_parses() {
        let file: ConfigFile = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(file.default_profile, "local");
        let local = file.resolve_profile(None).unwrap();
        assert_eq!(local.endpoint, "http://localhost:5000");
        assert_eq!(local.suggestions.len(), 3);
        // Omitted fields fall back to built-in defaults
        assert_eq!(local.assistant_name, "AI Genie");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = ConfigFile::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(file.default_profile, "default");
        assert!(file.profiles.is_empty());
    }

    #[test]
    fn test_bad_toml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "default_profile = [").unwrap();
        assert!(ConfigFile::load_from(&path).is_err());
    }

    #[test]
    fn test_write_default_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genie").join("config.toml");
        write_default_at(&path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("[profiles.local]"));

        fs::write(&path, "# mine").unwrap();
        write_default_at(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "# mine");
    }

    #[test]
    fn test_resolve_priority() {
        let file: ConfigFile = toml::from_str(
            r#"
            default_profile = "a"
            [profiles.a]
            endpoint = "http://a:1"
            timeout_secs = 5
            [profiles.b]
            endpoint = "http://b:2"
            apology = "oops"
            "#,
        )
        .unwrap();

        let a = ResolvedConfig::resolve(&file, None, None, Some(Path::new("/tmp/g")));
        assert_eq!(a.profile_name, "a");
        assert_eq!(a.endpoint, "http://a:1");
        assert_eq!(a.timeout, Duration::from_secs(5));
        assert_eq!(a.data_dir, PathBuf::from("/tmp/g"));

        let b = ResolvedConfig::resolve(&file, Some("b"), Some("http://cli:3"), None);
        assert_eq!(b.endpoint, "http://cli:3");
        assert_eq!(b.apology, "oops");
        assert_eq!(b.timeout, Duration::from_secs(60));
        assert_eq!(file.profile_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_profile_uses_defaults() {
        let r = ResolvedConfig::resolve(&ConfigFile::default(), Some("ghost"), None, None);
        assert_eq!(r.profile_name, "ghost");
        assert_eq!(r.endpoint, Profile::default().endpoint);
        assert_eq!(r.apology, "Maaf, terjadi kesalahan. Silakan coba lagi.");
    }
}
