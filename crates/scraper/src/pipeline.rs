use blockharvest_browser::{CdpPage, PageDriver};
use blockharvest_core::{ComponentRecord, Config, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::bootstrap::{bootstrap, Login};
use crate::extract::{SectionExtractor, SectionOutcome};
use crate::sections::enumerate_sections;
use crate::store::ArtifactStore;

/// Counts for one finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    pub discovered: usize,
    pub complete: usize,
    pub partial: usize,
    pub skipped: usize,
    pub dropped: usize,
    pub output_dir: PathBuf,
    pub manifest_path: PathBuf,
}

impl HarvestSummary {
    /// Records written to the manifest.
    pub fn total(&self) -> usize {
        self.complete + self.partial
    }
}

/// Drives one scrape over an already-open page.
pub struct Harvester {
    config: Config,
    store: ArtifactStore,
    login: Login,
}

impl Harvester {
    pub fn new(config: &Config, login: Login) -> Self {
        Self {
            store: ArtifactStore::new(config.output_layout()),
            config: config.clone(),
            login,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub async fn run<D: PageDriver>(&self, page: &mut D) -> Result<HarvestSummary> {
        self.store.prepare()?;
        bootstrap(&*page, &self.config, &self.login, &self.store).await?;

        let sections = enumerate_sections(&*page, &self.config.selectors.section).await?;
        let extractor = SectionExtractor::new(&self.config, &self.store);
        let pacing = Duration::from_millis(self.config.timeouts.component_pacing_ms);

        let mut summary = HarvestSummary {
            discovered: sections.len(),
            output_dir: self.store.layout().base().to_path_buf(),
            ..HarvestSummary::default()
        };
        let mut records: Vec<ComponentRecord> = Vec::new();

        for (index, section) in sections.iter().enumerate() {
            let next_id = records.len() as u32 + 1;
            page.begin_scope(&format!("section-{}", index)).await;
            let outcome = extractor.extract(&*page, index, section, next_id).await;
            if let Err(e) = page.release_scope().await {
                warn!(index, error = %e, "Failed to release component handles");
            }

            match outcome {
                Ok(SectionOutcome::Recorded(record)) => {
                    info!(id = record.id, name = %record.name, "Component recorded");
                    records.push(record);
                    summary.complete += 1;
                    page.pause(pacing).await;
                }
                Ok(SectionOutcome::Partial(record)) => {
                    info!(id = record.id, name = %record.name, "Component recorded without code");
                    records.push(record);
                    summary.partial += 1;
                }
                Ok(SectionOutcome::Skipped(reason)) => {
                    info!(index, reason = %reason, "Skipping section");
                    summary.skipped += 1;
                }
                Err(failure) => {
                    error!(
                        index,
                        name = failure.name.as_deref().unwrap_or("Unknown"),
                        error = %failure.error,
                        "Error processing component"
                    );
                    summary.dropped += 1;
                }
            }
        }

        // section handles were taken in the default scope
        if let Err(e) = page.release_scope().await {
            warn!(error = %e, "Failed to release section handles");
        }

        summary.manifest_path = self.store.write_manifest(&records)?;
        info!(
            total = summary.total(),
            complete = summary.complete,
            partial = summary.partial,
            skipped = summary.skipped,
            dropped = summary.dropped,
            manifest = %summary.manifest_path.display(),
            "Scraping completed"
        );
        Ok(summary)
    }
}

/// Launch a browser, run a full scrape and shut the browser down.
pub async fn harvest(config: &Config) -> Result<HarvestSummary> {
    config.validate()?;
    let login = Login::from_config(config)?;

    let (profile, temporary) = profile_dir(config);
    let result = run_in_browser(config, login, &profile).await;

    if temporary && profile.exists() {
        if let Err(e) = std::fs::remove_dir_all(&profile) {
            warn!(path = %profile.display(), error = %e, "Could not remove temporary browser profile");
        }
    }
    result
}

/// Configured profile directory, or a per-process one under the temp dir
/// that the caller removes afterwards (the flag is true).
fn profile_dir(config: &Config) -> (PathBuf, bool) {
    match &config.browser.user_data_dir {
        Some(dir) => (PathBuf::from(dir), false),
        None => (
            std::env::temp_dir().join(format!("blockharvest-profile-{}", std::process::id())),
            true,
        ),
    }
}

async fn run_in_browser(config: &Config, login: Login, profile: &Path) -> Result<HarvestSummary> {
    let mut page = CdpPage::open(&config.browser, profile).await?;
    let result = Harvester::new(config, login).run(&mut page).await;
    page.close().await;
    info!("Browser closed");
    result
}
