use std::path::PathBuf;

use anyhow::{Context, Result};
use newsprep::{DatasetFlavor, PrepConfig, SplitOutcome, prepare};
use tracing_subscriber::EnvFilter;

/// Set to any value to emit JSON log lines.
const LOG_JSON_ENV: &str = "NEWSPREP_LOG_JSON";

fn main() -> Result<()> {
    init_tracing();

    let mut config_path: Option<PathBuf> = None;
    let mut flavor = DatasetFlavor::default();
    for arg in std::env::args().skip(1) {
        if arg.ends_with(".yaml") || arg.ends_with(".yml") {
            config_path = Some(PathBuf::from(arg));
        } else {
            flavor = arg
                .parse()
                .with_context(|| format!("usage: newsprep [config.yaml] [binary|all|all-separate], got `{arg}`"))?;
        }
    }

    let config = PrepConfig::load(config_path.as_deref()).context("failed to load configuration")?;
    let report = prepare(&config, flavor).with_context(|| format!("failed to prepare the `{flavor}` dataset"))?;

    if let Some(stats) = &report.preprocess {
        tracing::info!(
            emitted = stats.emitted,
            failed = stats.failed,
            duplicates = stats.skipped(),
            "preprocessing finished"
        );
    }
    match report.split {
        SplitOutcome::Written(sizes) => tracing::info!(
            train = sizes.train,
            test = sizes.test,
            val = sizes.val,
            path = %report.paths.split.train.display(),
            "dataset ready"
        ),
        SplitOutcome::AlreadyComplete => {
            tracing::info!(path = %report.paths.split.train.display(), "dataset already prepared")
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true);

    if std::env::var_os(LOG_JSON_ENV).is_some() {
        builder.json().init();
    } else {
        builder.init();
    }
}
