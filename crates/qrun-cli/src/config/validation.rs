use crate::error::ConfigError;
use qrun_core::JobConfig;
use qrun_core::proxy::origin::Origin;

fn invalid(field: &str, value: impl std::fmt::Display, hint: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        hint: hint.to_string(),
    }
}

/// Validate configuration for logical consistency.
pub fn validate(config: &JobConfig) -> Result<(), ConfigError> {
    if config.parallel == 0 {
        return Err(invalid(
            "parallel",
            0,
            "At least one test page must be able to run at a time",
        ));
    }

    if config.testsuite.trim().is_empty() {
        return Err(invalid(
            "testsuite",
            "\"\"",
            "Point testsuite at the page listing the test pages, e.g. test/testsuite.qunit.html",
        ));
    }

    if let Err(e) = Origin::parse(&config.ui5) {
        return Err(invalid(
            "ui5",
            &config.ui5,
            &format!("Use an http(s) URL such as https://ui5.sap.com ({e})"),
        ));
    }

    let webapp = config.resolve(&config.webapp);
    if !webapp.is_dir() {
        return Err(invalid(
            "webapp",
            webapp.display(),
            "The application directory must exist; set --cwd or --webapp",
        ));
    }

    if let Some(libs) = &config.libs {
        let libs = config.resolve(libs);
        if !libs.is_dir() {
            return Err(invalid(
                "libs",
                libs.display(),
                "The local library directory must exist",
            ));
        }
    }

    // The report directory is wiped before every run
    let report_dir = config.resolve(&config.report_dir);
    if webapp.starts_with(&report_dir) || config.cwd.starts_with(&report_dir) {
        return Err(invalid(
            "reportDir",
            report_dir.display(),
            "The report directory is emptied before each run; it must not contain the project",
        ));
    }

    Ok(())
}
