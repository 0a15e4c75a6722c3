//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::PathBuf;

const PROJECT_FILES: [&str; 2] = ["tradehub.toml", ".tradehub.toml"];

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (`TRADEHUB_BACKEND__ANON_KEY`, ...)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./tradehub.toml` or `./.tradehub.toml`
    /// 4. XDG config: `$XDG_CONFIG_HOME/tradehub/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        Self::figment(config_path).extract().map_err(Box::new)
    }

    fn figment(config_path: Option<&PathBuf>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(path) = Self::project_config_path() {
            figment = figment.merge(Toml::file(path));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("TRADEHUB_").split("__"))
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tradehub").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Print the config file locations being used (for debugging)
    pub fn print_config_sources(config_path: Option<&PathBuf>) {
        println!("Configuration sources (in priority order):");
        for line in Self::config_sources(config_path) {
            println!("  {}", line);
        }
    }

    /// One line per source, highest priority first
    fn config_sources(config_path: Option<&PathBuf>) -> Vec<String> {
        let mut lines = vec!["[     ] Env:      TRADEHUB_<SECTION>__<KEY>".to_string()];

        match config_path {
            Some(path) if path.exists() => {
                lines.push(format!("[FOUND] Explicit: {}", path.display()));
            }
            Some(path) => lines.push(format!("[MISS ] Explicit: {}", path.display())),
            None => lines.push("[     ] Explicit: --config <path>".to_string()),
        }

        match Self::project_config_path() {
            Some(path) => lines.push(format!("[FOUND] Project:  {}", path.display())),
            None => lines.push("[     ] Project:  ./tradehub.toml or ./.tradehub.toml".to_string()),
        }

        if let Some(path) = Self::global_config_path() {
            let marker = if path.exists() { "FOUND" } else { "     " };
            lines.push(format!("[{}] Global:   {}", marker, path.display()));
        }

        lines.push("[     ] Default:  built-in defaults".to_string());
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file_config::BackendKind;
    use figment::Jail;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.backend.kind, BackendKind::Hosted);
        assert!(config.backend.url.is_empty());
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("tradehub"));
    }

    #[test]
    fn test_project_file_and_env_merge() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "tradehub.toml",
                r#"
[backend]
url = "https://demo.example.co"
anon_key = "from-file"

[realtime]
heartbeat_seconds = 10
"#,
            )?;
            jail.set_env("TRADEHUB_BACKEND__ANON_KEY", "from-env");

            let config = ConfigLoader::load(None).map_err(|e| *e)?;
            assert_eq!(config.backend.url, "https://demo.example.co");
            assert_eq!(config.backend.anon_key, "from-env");
            assert_eq!(config.realtime.heartbeat_seconds, 10);
            assert_eq!(config.realtime.channel, "post-ch");
            Ok(())
        });
    }

    #[test]
    fn test_explicit_path_overrides_project_file() {
        Jail::expect_with(|jail| {
            jail.create_file("tradehub.toml", "[backend]\nkind = \"hosted\"\n")?;
            jail.create_file("local.toml", "[backend]\nkind = \"memory\"\n")?;

            let path = PathBuf::from("local.toml");
            let config = ConfigLoader::load(Some(&path)).map_err(|e| *e)?;
            assert_eq!(config.backend.kind, BackendKind::Memory);
            Ok(())
        });
    }

    #[test]
    fn test_config_sources_list_explicit_path() {
        Jail::expect_with(|jail| {
            jail.create_file("local.toml", "[backend]\nkind = \"memory\"\n")?;

            let path = PathBuf::from("local.toml");
            let lines = ConfigLoader::config_sources(Some(&path));
            assert!(lines.iter().any(|l| l == "[FOUND] Explicit: local.toml"));

            let missing = PathBuf::from("missing.toml");
            let lines = ConfigLoader::config_sources(Some(&missing));
            assert!(lines.iter().any(|l| l == "[MISS ] Explicit: missing.toml"));

            // Explicit file ranks between env and project
            let lines = ConfigLoader::config_sources(None);
            assert!(lines[0].contains("Env:"));
            assert!(lines[1].contains("Explicit: --config <path>"));
            assert!(lines[2].contains("Project:"));
            Ok(())
        });
    }
}
