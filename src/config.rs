use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{env, path::PathBuf};

const DEFAULT_ROOT: &str = "./data/blobs";

/// Where blobs live on disk and how they are addressed publicly.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub root: PathBuf,
    pub endpoint: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Local filesystem blob storage")]
pub struct Args {
    /// Storage root directory (overrides LOCAL_BLOB_ROOT)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Public base URL used by `url` (overrides LOCAL_BLOB_ENDPOINT)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store the contents of FILE as BUCKET/KEY
    Put {
        bucket: String,
        key: String,
        file: PathBuf,
    },
    /// Write the object's bytes to stdout
    Get { bucket: String, key: String },
    /// Print the object's attributes as JSON
    Head { bucket: String, key: String },
    /// Delete the object and prune empty parent directories
    Rm { bucket: String, key: String },
    /// Copy an object to another bucket/key
    Cp {
        bucket: String,
        key: String,
        dst_bucket: String,
        dst_key: String,
    },
    /// Print the object's public URL, if an endpoint is configured
    Url { bucket: String, key: String },
}

impl StoreConfig {
    /// Parse environment variables + CLI args into a StoreConfig and the command to run.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_root = env::var_os("LOCAL_BLOB_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT));
        let env_endpoint = non_empty(env::var("LOCAL_BLOB_ENDPOINT").ok());

        // --- Merge ---
        let cfg = Self::merge(args.root, args.endpoint, env_root, env_endpoint);

        Ok((cfg, args.command))
    }

    fn merge(
        root: Option<PathBuf>,
        endpoint: Option<String>,
        env_root: PathBuf,
        env_endpoint: Option<String>,
    ) -> Self {
        Self {
            root: root.unwrap_or(env_root),
            endpoint: non_empty(endpoint).or(env_endpoint),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_environment() {
        let cfg = StoreConfig::merge(
            Some(PathBuf::from("/cli/root")),
            Some("http://cli.example".into()),
            PathBuf::from("/env/root"),
            Some("http://env.example".into()),
        );
        assert_eq!(cfg.root, PathBuf::from("/cli/root"));
        assert_eq!(cfg.endpoint.as_deref(), Some("http://cli.example"));
    }

    #[test]
    fn environment_fills_missing_flags() {
        let cfg = StoreConfig::merge(
            None,
            None,
            PathBuf::from("/env/root"),
            Some("http://env.example".into()),
        );
        assert_eq!(cfg.root, PathBuf::from("/env/root"));
        assert_eq!(cfg.endpoint.as_deref(), Some("http://env.example"));
    }

    #[test]
    fn blank_endpoint_means_unset() {
        let cfg = StoreConfig::merge(None, Some("  ".into()), PathBuf::from(DEFAULT_ROOT), None);
        assert_eq!(cfg.endpoint, None);
    }

    #[test]
    fn parses_put_command() {
        let args = Args::try_parse_from([
            "local-blob",
            "--root",
            "/tmp/blobs",
            "put",
            "photos",
            "2025/cat.jpg",
            "./cat.jpg",
        ])
        .unwrap();
        assert_eq!(args.root, Some(PathBuf::from("/tmp/blobs")));
        match args.command {
            Command::Put { bucket, key, file } => {
                assert_eq!(bucket, "photos");
                assert_eq!(key, "2025/cat.jpg");
                assert_eq!(file, PathBuf::from("./cat.jpg"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
