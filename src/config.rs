use std::path::PathBuf;

use crate::cli::Cli;

/// Application configuration, derived from CLI arguments and environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub bucket: String,
    pub cache_db: PathBuf,
    pub timeout_secs: u64,
    pub serialize_identical_uploads: bool,
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            api_base_url: cli.api_url.clone(),
            bucket: cli.bucket.clone(),
            cache_db: expand_tilde(&cli.cache_db),
            timeout_secs: cli.timeout,
            serialize_identical_uploads: cli.serialize_identical_uploads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde_with_home() {
        let result = expand_tilde("~/uploads.db");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(result, home.join("uploads.db"));
        }
    }

    #[test]
    fn test_expand_tilde_no_prefix() {
        assert_eq!(
            expand_tilde("/var/lib/carkeep/uploads.db"),
            PathBuf::from("/var/lib/carkeep/uploads.db")
        );
        assert_eq!(
            expand_tilde("relative/uploads.db"),
            PathBuf::from("relative/uploads.db")
        );
    }

    #[test]
    fn test_from_cli() {
        use clap::Parser;
        let cli = Cli::try_parse_from([
            "carkeep",
            "--api-url",
            "https://api.example.com/",
            "--timeout",
            "10",
            "--serialize-identical-uploads",
            "list",
        ])
        .unwrap();
        let config = Config::from_cli(&cli);
        assert_eq!(config.api_base_url, "https://api.example.com/");
        assert_eq!(config.timeout_secs, 10);
        assert!(config.serialize_identical_uploads);
        assert!(config.cache_db.ends_with(".carkeep/uploads.db") || config.cache_db.ends_with("uploads.db"));
    }
}
