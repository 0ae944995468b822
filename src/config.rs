use std::ffi::OsString;
use std::fmt;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

pub const GALLERY_DIR: &str = "GALLERY_DIR";
pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_REGION: &str = "AWS_REGION";
pub const AWS_BUCKET_NAME: &str = "AWS_BUCKET_NAME";

#[derive(Debug, Parser)]
#[clap(author, version, about)]
pub struct ServerConfig {
    /// The host to bind the server to.
    #[clap(long, env = "GALLERY_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// The port to bind the server to.
    #[clap(long, env = "GALLERY_PORT", default_value = "8000")]
    pub port: u16,

    /// An optional YAML file of storage settings.
    ///
    /// Values from the process environment take precedence over the file.
    #[clap(short, long, env = "GALLERY_CONFIG")]
    pub config: Option<PathBuf>,

    /// The default log filter, `RUST_LOG` overrides it when set.
    #[clap(long, env = "GALLERY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// The flat storage settings the backend is selected from.
///
/// Blank values are treated the same as absent ones.
#[derive(Clone, Default, Deserialize)]
pub struct StorageSettings {
    /// A local directory to keep pictures in.
    #[serde(rename = "GALLERY_DIR", default)]
    pub gallery_dir: Option<PathBuf>,

    #[serde(rename = "AWS_ACCESS_KEY_ID", default)]
    pub aws_access_key_id: Option<String>,

    #[serde(rename = "AWS_SECRET_ACCESS_KEY", default)]
    pub aws_secret_access_key: Option<String>,

    /// An AWS region identifier, e.g. `eu-west-1`.
    #[serde(rename = "AWS_REGION", default)]
    pub aws_region: Option<String>,

    #[serde(rename = "AWS_BUCKET_NAME", default)]
    pub aws_bucket_name: Option<String>,
}

impl fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSettings")
            .field("gallery_dir", &self.gallery_dir)
            .field("aws_access_key_id", &self.aws_access_key_id)
            .field(
                "aws_secret_access_key",
                &self.aws_secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("aws_region", &self.aws_region)
            .field("aws_bucket_name", &self.aws_bucket_name)
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl StorageSettings {
    /// Picks the recognised keys out of a flat string mapping.
    ///
    /// Unknown keys are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut settings = Self::default();
        for (key, value) in vars {
            let value = Some(value.into());
            match key.as_ref() {
                GALLERY_DIR => settings.gallery_dir = value.map(PathBuf::from),
                AWS_ACCESS_KEY_ID => settings.aws_access_key_id = value,
                AWS_SECRET_ACCESS_KEY => settings.aws_secret_access_key = value,
                AWS_REGION => settings.aws_region = value,
                AWS_BUCKET_NAME => settings.aws_bucket_name = value,
                _ => {},
            }
        }

        settings.normalise()
    }

    /// Like [`StorageSettings::from_vars`] for OS strings.
    ///
    /// Pairs that are not valid UTF-8 are skipped rather than rejected, so a
    /// stray binary variable in the environment cannot stop the server.
    pub fn from_os_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        Self::from_vars(
            vars.into_iter()
                .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?))),
        )
    }

    pub fn from_yaml(data: &str) -> anyhow::Result<Self> {
        let settings: Self = serde_yaml::from_str(data)?;
        Ok(settings.normalise())
    }

    pub fn from_file(file: &Path) -> anyhow::Result<Self> {
        let data = read_to_string(file)?;
        Self::from_yaml(&data)
    }

    /// Loads the optional settings file and lays the process environment
    /// over it.
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let base = match file {
            Some(file) => Self::from_file(file)?,
            None => Self::default(),
        };

        Ok(base.merge(Self::from_os_vars(std::env::vars_os())))
    }

    /// Key by key, any value present in `overrides` wins.
    pub fn merge(self, overrides: Self) -> Self {
        Self {
            gallery_dir: overrides.gallery_dir.or(self.gallery_dir),
            aws_access_key_id: overrides.aws_access_key_id.or(self.aws_access_key_id),
            aws_secret_access_key: overrides.aws_secret_access_key.or(self.aws_secret_access_key),
            aws_region: overrides.aws_region.or(self.aws_region),
            aws_bucket_name: overrides.aws_bucket_name.or(self.aws_bucket_name),
        }
    }

    fn normalise(self) -> Self {
        Self {
            gallery_dir: self.gallery_dir.filter(|p| !p.as_os_str().is_empty()),
            aws_access_key_id: non_blank(self.aws_access_key_id),
            aws_secret_access_key: non_blank(self.aws_secret_access_key),
            aws_region: non_blank(self.aws_region.map(|r| r.trim().to_string())),
            aws_bucket_name: non_blank(self.aws_bucket_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS_FILE: &str = r#"
GALLERY_DIR: /var/lib/gallery
AWS_REGION: eu-west-1
UNRELATED: ignored
"#;

    #[test]
    fn test_from_vars_picks_known_keys() {
        let settings = StorageSettings::from_vars([
            ("GALLERY_DIR", "/tmp/gallery"),
            ("AWS_BUCKET_NAME", "pictures"),
            ("PATH", "/usr/bin"),
        ]);

        assert_eq!(settings.gallery_dir, Some(PathBuf::from("/tmp/gallery")));
        assert_eq!(settings.aws_bucket_name.as_deref(), Some("pictures"));
        assert!(settings.aws_access_key_id.is_none());
    }

    #[test]
    fn test_blank_values_are_absent() {
        let settings = StorageSettings::from_vars([
            ("GALLERY_DIR", ""),
            ("AWS_ACCESS_KEY_ID", "   "),
            ("AWS_REGION", " us-east-1 "),
        ]);

        assert!(settings.gallery_dir.is_none());
        assert!(settings.aws_access_key_id.is_none());
        assert_eq!(settings.aws_region.as_deref(), Some("us-east-1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_variables_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let settings = StorageSettings::from_os_vars([
            (OsString::from("JUNK"), OsString::from_vec(vec![0xff, 0xfe])),
            (OsString::from("AWS_REGION"), OsString::from_vec(vec![0xff])),
            (OsString::from("GALLERY_DIR"), OsString::from("/srv/gallery")),
        ]);

        assert_eq!(settings.gallery_dir, Some(PathBuf::from("/srv/gallery")));
        assert!(settings.aws_region.is_none());
    }

    #[test]
    fn test_yaml_file_is_overridden_per_key() -> anyhow::Result<()> {
        let file = StorageSettings::from_yaml(SETTINGS_FILE)?;
        let env = StorageSettings::from_vars([("AWS_REGION", "us-west-2")]);
        let merged = file.merge(env);

        assert_eq!(merged.gallery_dir, Some(PathBuf::from("/var/lib/gallery")));
        assert_eq!(merged.aws_region.as_deref(), Some("us-west-2"));
        Ok(())
    }

    #[test]
    fn test_debug_redacts_secret() {
        let settings = StorageSettings::from_vars([("AWS_SECRET_ACCESS_KEY", "hunter2")]);
        let rendered = format!("{:?}", settings);

        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
