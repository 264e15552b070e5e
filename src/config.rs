use crate::{
    services::{
        album_service::AlbumSettings,
        migration::{MigrationSettings, RetryPolicy},
    },
    store::{MAX_PAGE_SIZE, s3::S3Settings},
};
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, str::FromStr, time::Duration};

/// Which object store the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// AWS S3 or an S3-compatible endpoint.
    S3,
    /// Process-local store; contents are lost on exit.
    Memory,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "s3" => Ok(Backend::S3),
            "memory" => Ok(Backend::Memory),
            other => bail!("unknown backend `{}` (expected `s3` or `memory`)", other),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: Backend,
    pub s3: S3Settings,
    pub public_host: Option<String>,
    pub root_prefix: String,
    pub page_size: i32,
    pub copy_concurrency: usize,
    pub copy_max_attempts: u32,
    pub retry_base_ms: u64,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Photo album backed by S3 object storage")]
pub struct Args {
    /// Host to bind to (overrides PHOTO_ALBUM_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PHOTO_ALBUM_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Object store backend (overrides PHOTO_ALBUM_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Bucket holding the album (overrides AWS_S3_BUCKET_NAME)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Bucket region (overrides AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Custom S3 endpoint URL (overrides PHOTO_ALBUM_S3_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Use path-style bucket addressing (overrides PHOTO_ALBUM_FORCE_PATH_STYLE)
    #[arg(long)]
    pub force_path_style: bool,

    /// Host images are served from (overrides PHOTO_ALBUM_PUBLIC_HOST)
    #[arg(long)]
    pub public_host: Option<String>,

    /// Prefix all albums live under (overrides PHOTO_ALBUM_ROOT_PREFIX)
    #[arg(long)]
    pub root_prefix: Option<String>,

    /// Copies in flight during a storage-class change (overrides PHOTO_ALBUM_COPY_CONCURRENCY)
    #[arg(long)]
    pub copy_concurrency: Option<usize>,
}

/// Read `name` and parse it, falling back to `default` when unset.
fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("{}", err))
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse())
    }

    /// Merge parsed CLI args over environment values; CLI wins.
    pub fn merge(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("PHOTO_ALBUM_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parse("PHOTO_ALBUM_PORT", 3000u16)?;
        let env_backend = env_parse("PHOTO_ALBUM_BACKEND", Backend::S3)?;
        let env_region = env_opt("AWS_REGION")
            .or_else(|| env_opt("AWS_DEFAULT_REGION"))
            .unwrap_or_else(|| "us-east-1".into());
        let env_path_style = env_parse("PHOTO_ALBUM_FORCE_PATH_STYLE", false)?;
        let env_root =
            env::var("PHOTO_ALBUM_ROOT_PREFIX").unwrap_or_else(|_| "photos/".into());
        let env_concurrency = env_parse("PHOTO_ALBUM_COPY_CONCURRENCY", 8usize)?;

        let mut root_prefix = args.root_prefix.unwrap_or(env_root);
        if !root_prefix.is_empty() && !root_prefix.ends_with('/') {
            root_prefix.push('/');
        }

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            backend: args.backend.unwrap_or(env_backend),
            s3: S3Settings {
                bucket: args.bucket.or_else(|| env_opt("AWS_S3_BUCKET_NAME")),
                region: args.region.unwrap_or(env_region),
                endpoint_url: args.endpoint.or_else(|| env_opt("PHOTO_ALBUM_S3_ENDPOINT")),
                force_path_style: args.force_path_style || env_path_style,
            },
            public_host: args.public_host.or_else(|| env_opt("PHOTO_ALBUM_PUBLIC_HOST")),
            root_prefix,
            page_size: env_parse("PHOTO_ALBUM_PAGE_SIZE", MAX_PAGE_SIZE)?.clamp(1, MAX_PAGE_SIZE),
            copy_concurrency: args.copy_concurrency.unwrap_or(env_concurrency).max(1),
            copy_max_attempts: env_parse("PHOTO_ALBUM_COPY_MAX_ATTEMPTS", 3u32)?.max(1),
            retry_base_ms: env_parse("PHOTO_ALBUM_RETRY_BASE_MS", 100u64)?,
            max_upload_bytes: env_parse("PHOTO_ALBUM_MAX_UPLOAD_BYTES", 25 * 1024 * 1024usize)?,
        };

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URL prefix the browser loads images from.
    ///
    /// Defaults to the virtual-hosted S3 address of the bucket.
    pub fn public_base_url(&self) -> String {
        let host = self.public_host.clone().or_else(|| {
            self.s3
                .bucket
                .as_ref()
                .map(|bucket| format!("{}.s3.amazonaws.com", bucket))
        });
        match host {
            Some(host) if host.starts_with("http://") || host.starts_with("https://") => {
                host.trim_end_matches('/').to_string()
            }
            Some(host) => format!("https://{}", host.trim_end_matches('/')),
            None => String::new(),
        }
    }

    pub fn album_settings(&self) -> AlbumSettings {
        AlbumSettings {
            root_prefix: self.root_prefix.clone(),
            public_base_url: self.public_base_url(),
            page_size: self.page_size,
            migration: MigrationSettings {
                page_size: self.page_size,
                concurrency: self.copy_concurrency,
                retry: RetryPolicy {
                    max_attempts: self.copy_max_attempts,
                    base_delay: Duration::from_millis(self.retry_base_ms),
                    ..RetryPolicy::default()
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bucket: Option<&str>, public_host: Option<&str>) -> AppConfig {
        AppConfig {
            host: "127.0.0.1".into(),
            port: 3000,
            backend: Backend::S3,
            s3: S3Settings {
                bucket: bucket.map(str::to_string),
                region: "eu-west-1".into(),
                endpoint_url: None,
                force_path_style: false,
            },
            public_host: public_host.map(str::to_string),
            root_prefix: "photos/".into(),
            page_size: 1000,
            copy_concurrency: 12,
            copy_max_attempts: 4,
            retry_base_ms: 50,
            max_upload_bytes: 1024,
        }
    }

    #[test]
    fn public_url_defaults_to_bucket_host() {
        assert_eq!(
            config(Some("album"), None).public_base_url(),
            "https://album.s3.amazonaws.com"
        );
        assert_eq!(
            config(Some("album"), Some("cdn.example.com/")).public_base_url(),
            "https://cdn.example.com"
        );
        assert_eq!(
            config(None, Some("http://localhost:9000/album")).public_base_url(),
            "http://localhost:9000/album"
        );
        assert_eq!(config(None, None).public_base_url(), "");
    }

    #[test]
    fn album_settings_carry_migration_tuning() {
        let settings = config(Some("album"), None).album_settings();
        assert_eq!(settings.root_prefix, "photos/");
        assert_eq!(settings.migration.concurrency, 12);
        assert_eq!(settings.migration.retry.max_attempts, 4);
        assert_eq!(
            settings.migration.retry.base_delay,
            Duration::from_millis(50)
        );
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!("MEMORY".parse::<Backend>().unwrap(), Backend::Memory);
        assert_eq!("s3".parse::<Backend>().unwrap(), Backend::S3);
        assert!("disk".parse::<Backend>().is_err());
    }
}
