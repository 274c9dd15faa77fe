use blockharvest_core::{AuthMode, Config, FrameworkMapping, Paths};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug, Default)]
pub struct ScrapeArgs {
    /// Config file (defaults to ~/.blockharvest/config.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output directory (overrides output.dir)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Sign in by hand in the browser window even when TAILWIND_EMAIL/TAILWIND_PASSWORD are set
    #[arg(long)]
    pub interactive: bool,

    /// Run the browser without a window
    #[arg(long, conflicts_with = "interactive")]
    pub headless: bool,

    /// Browser executable (overrides browser.executable)
    #[arg(long)]
    pub browser: Option<String>,

    /// How language options map to frameworks: label or position
    #[arg(long, value_name = "MODE")]
    pub framework_mapping: Option<String>,
}

pub async fn run(args: ScrapeArgs) -> anyhow::Result<()> {
    let config = effective_config(&args)?;
    info!(
        output = %config.output.dir,
        auth = ?config.auth.mode,
        mapping = ?config.extraction.framework_mapping,
        headless = config.browser.headless,
        "Starting scrape"
    );
    let summary = blockharvest_scraper::harvest(&config).await?;

    println!();
    println!("✓ Scraping completed");
    println!("  Records:   {} ({} complete, {} without code)", summary.total(), summary.complete, summary.partial);
    println!("  Skipped:   {}", summary.skipped);
    println!("  Dropped:   {}", summary.dropped);
    println!("  Output:    {}", summary.output_dir.display());
    println!("  Manifest:  {}", summary.manifest_path.display());
    Ok(())
}

/// Config file (explicit or default location) with CLI flags applied on top.
fn effective_config(args: &ScrapeArgs) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Paths::new())?,
    };

    if let Some(dir) = &args.output {
        config.output.dir = dir.to_string_lossy().into_owned();
    }
    if args.interactive {
        config.auth.mode = AuthMode::Interactive;
        config.browser.headless = false;
    }
    if args.headless {
        config.browser.headless = true;
    }
    if let Some(browser) = &args.browser {
        config.browser.executable = Some(browser.clone());
    }
    if let Some(mapping) = &args.framework_mapping {
        config.extraction.framework_mapping = mapping.parse::<FrameworkMapping>()?;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args_with_config(dir: &TempDir, config: &Config) -> ScrapeArgs {
        let path = dir.path().join("config.json");
        config.save(&path).unwrap();
        ScrapeArgs {
            config: Some(path),
            ..ScrapeArgs::default()
        }
    }

    #[test]
    fn test_flags_override_file() {
        let dir = TempDir::new().unwrap();
        let mut file = Config::default();
        file.output.dir = "from-file".into();
        file.browser.headless = true;
        let mut args = args_with_config(&dir, &file);
        args.output = Some(PathBuf::from("from-flag"));
        args.interactive = true;
        args.browser = Some("/opt/chrome".into());
        args.framework_mapping = Some("position".into());

        let config = effective_config(&args).unwrap();
        assert_eq!(config.output.dir, "from-flag");
        assert_eq!(config.auth.mode, AuthMode::Interactive);
        assert!(!config.browser.headless);
        assert_eq!(config.browser.executable.as_deref(), Some("/opt/chrome"));
        assert_eq!(config.extraction.framework_mapping, FrameworkMapping::Position);
    }

    #[test]
    fn test_file_values_kept_without_flags() {
        let dir = TempDir::new().unwrap();
        let mut file = Config::default();
        file.output.dir = "from-file".into();
        let config = effective_config(&args_with_config(&dir, &file)).unwrap();
        assert_eq!(config.output.dir, "from-file");
        assert_eq!(config.auth.mode, AuthMode::Auto);
    }

    #[test]
    fn test_bad_mapping_rejected() {
        let dir = TempDir::new().unwrap();
        let mut args = args_with_config(&dir, &Config::default());
        args.framework_mapping = Some("alphabetical".into());
        assert!(effective_config(&args).is_err());
    }
}
