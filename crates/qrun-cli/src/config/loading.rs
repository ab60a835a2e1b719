use crate::cli::Cli;
use crate::config::validate;
use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized},
    value::Uncased,
};
use qrun_core::JobConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "qrun.config.json";

/// Prefix of environment variables overriding config values.
pub const ENV_PREFIX: &str = "QRUN_";

/// Load and validate the job configuration.
/// Priority: CLI args > environment variables > config file > defaults
pub fn load(cli: &Cli) -> Result<JobConfig, ConfigError> {
    let mut figment = Figment::new().merge(Serialized::defaults(JobConfig::default()));

    if let Some(path) = config_file(cli)? {
        tracing::debug!(path = %path.display(), "Loading config file");
        figment = figment.merge(Json::file(path));
    }

    // QRUN_FAIL_FAST -> failFast
    figment = figment.merge(
        Env::prefixed(ENV_PREFIX)
            .lowercase(false)
            .map(|key| Uncased::from(camel_case(key.as_str()))),
    );

    figment = figment.merge(Serialized::defaults(CliOverrides::from(cli)));

    let mut config: JobConfig = figment.extract()?;
    if cli.no_cache {
        config.cache = None;
    }

    validate(&config)?;
    Ok(config)
}

/// Explicit `--config` must exist; the default file is optional.
fn config_file(cli: &Cli) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = &cli.config {
        return if path.exists() {
            Ok(Some(path.clone()))
        } else {
            Err(ConfigError::NotFound(path.clone()))
        };
    }

    let default_path = cli.cwd.as_deref().unwrap_or(Path::new(".")).join(CONFIG_FILE);
    Ok(default_path.exists().then_some(default_path))
}

pub(crate) fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c.to_ascii_lowercase());
        }
    }
    out
}

/// The subset of job options given on the command line.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    cwd: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    webapp: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    testsuite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    libs: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ui5: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fail_fast: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    global_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_server: Option<bool>,
}

impl From<&Cli> for CliOverrides {
    fn from(cli: &Cli) -> Self {
        // Boolean flags only override when present
        Self {
            cwd: cli.cwd.clone(),
            webapp: cli.webapp.clone(),
            testsuite: cli.testsuite.clone(),
            port: cli.port,
            cache: cli.cache.clone(),
            libs: cli.libs.clone(),
            ui5: cli.ui5.clone(),
            parallel: cli.parallel,
            fail_fast: cli.fail_fast.then_some(true),
            global_timeout: cli.global_timeout,
            page_timeout: cli.page_timeout,
            report_dir: cli.report_dir.clone(),
            log_server: cli.log_server.then_some(true),
        }
    }
}
