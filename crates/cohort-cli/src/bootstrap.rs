use cohort_config::CohortConfig;

/// Load `.env` from the working directory (if any), then the layered config.
pub fn load_config() -> anyhow::Result<CohortConfig> {
    let config = CohortConfig::load_with_dotenv()?;
    warn_unconfigured(&config);
    Ok(config)
}

/// Emit warnings for likely mistyped env var keys that silently fell back to defaults.
fn warn_unconfigured(config: &CohortConfig) {
    for warning in collect_unconfigured_warnings(config, std::env::vars()) {
        tracing::warn!("{warning}");
    }
}

fn collect_unconfigured_warnings<I>(config: &CohortConfig, env: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let env_keys = env.into_iter().map(|(key, _)| key).collect::<Vec<_>>();

    let mut warnings = Vec::new();

    if !config.database.is_remote() && has_env_prefix(&env_keys, "COHORT_DATABASE__URL") {
        warnings.push(
            "Remote database URL is set but no auth token was found; using the local file. Set COHORT_DATABASE__AUTH_TOKEN."
                .to_string(),
        );
    }

    if !config.broker.is_configured() && has_env_prefix(&env_keys, "COHORT_BROKER") {
        warnings.push(
            "Broker config appears default while COHORT_BROKER* env vars exist. Use double underscores (example: COHORT_BROKER__URL)."
                .to_string(),
        );
    }

    if !config.sheets.is_configured() && has_env_prefix(&env_keys, "COHORT_SHEETS") {
        warnings.push(
            "Sheets config appears default while COHORT_SHEETS* env vars exist. Use double underscores (example: COHORT_SHEETS__SPREADSHEET_ID)."
                .to_string(),
        );
    }

    warnings
}

fn has_env_prefix(keys: &[String], prefix: &str) -> bool {
    keys.iter().any(|key| key.starts_with(prefix))
}
