#[cfg(test)]
mod tests {
    use crate::config::loading::camel_case;
    use crate::config::validate;
    use crate::error::ConfigError;
    use qrun_core::JobConfig;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn project() -> (TempDir, JobConfig) {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("webapp")).unwrap();
        let config = JobConfig {
            cwd: temp.path().to_path_buf(),
            ..JobConfig::default()
        };
        (temp, config)
    }

    fn invalid_field(result: Result<(), ConfigError>) -> String {
        match result {
            Err(ConfigError::InvalidValue { field, .. }) => field,
            other => panic!("expected an invalid value, got {other:?}"),
        }
    }

    #[test]
    fn test_env_keys_are_camel_cased() {
        assert_eq!(camel_case("FAIL_FAST"), "failFast");
        assert_eq!(camel_case("report_dir"), "reportDir");
        assert_eq!(camel_case("PARALLEL"), "parallel");
        assert_eq!(camel_case("GLOBAL_TIMEOUT"), "globalTimeout");
        assert_eq!(camel_case("_LOG_SERVER"), "logServer");
    }

    #[test]
    fn test_default_project_is_valid() {
        let (_temp, config) = project();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validation() {
        let (temp, config) = project();

        assert_eq!(
            invalid_field(validate(&JobConfig {
                parallel: 0,
                ..config.clone()
            })),
            "parallel"
        );

        assert_eq!(
            invalid_field(validate(&JobConfig {
                testsuite: "  ".to_string(),
                ..config.clone()
            })),
            "testsuite"
        );

        assert_eq!(
            invalid_field(validate(&JobConfig {
                ui5: "ftp://ui5.sap.com".to_string(),
                ..config.clone()
            })),
            "ui5"
        );

        assert_eq!(
            invalid_field(validate(&JobConfig {
                webapp: PathBuf::from("missing"),
                ..config.clone()
            })),
            "webapp"
        );

        assert_eq!(
            invalid_field(validate(&JobConfig {
                libs: Some(temp.path().join("no-libs")),
                ..config.clone()
            })),
            "libs"
        );
    }

    #[test]
    fn test_report_dir_must_not_contain_the_project() {
        let (_temp, config) = project();

        for report_dir in [".", "webapp"] {
            assert_eq!(
                invalid_field(validate(&JobConfig {
                    report_dir: PathBuf::from(report_dir),
                    ..config.clone()
                })),
                "reportDir",
                "reportDir = {report_dir}"
            );
        }

        assert!(
            validate(&JobConfig {
                report_dir: PathBuf::from("webapp-report"),
                ..config
            })
            .is_ok()
        );
    }
}
