//! Guard rails applied before the engine starts.

use anyhow::{Context, bail};

use crate::models::Config;

/// Reject configurations the engine cannot run with. Returns warnings for
/// values that are legal but probably unintended.
pub fn validate(config: &Config) -> anyhow::Result<Vec<String>> {
    let mut warnings = Vec::new();

    let root = &config.index.root_directory;
    let root_meta = std::fs::metadata(root)
        .with_context(|| format!("watched root {} is not accessible", root.display()))?;
    if !root_meta.is_dir() {
        bail!("watched root {} is not a directory", root.display());
    }
    if !root.is_absolute() {
        warnings.push(format!(
            "watched root {} is relative; prefix stripping depends on the working directory",
            root.display()
        ));
    }

    if config.watch.settle_delay_ms == 0 {
        warnings.push("settle_delay_ms is 0; notification storms will not be absorbed".into());
    }
    if config.watch.tick_interval_ms == 0 {
        bail!("tick_interval_ms must be at least 1");
    }
    if config.index.reply_timeout_ms < config.watch.tick_interval_ms {
        warnings.push(
            "reply_timeout_ms is below tick_interval_ms; broker waits may expire spuriously"
                .into(),
        );
    }

    Ok(warnings)
}
