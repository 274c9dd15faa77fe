//! Per-component extraction.
//!
//! One section goes through: breadcrumb + heading check, category parsing,
//! tab discovery, preview screenshot, code panel discovery, per-framework code
//! reads, and code file writes. Missing structure ends the walk early with a
//! [`SectionOutcome`]; any other failure is a [`SectionFailure`].

use blockharvest_browser::PageDriver;
use blockharvest_core::config::{SelectorConfig, TimeoutConfig};
use blockharvest_core::{
    slugify, CategoryInfo, CodeVariants, ComponentRecord, Config, Error, Framework,
    FrameworkMapping, Result,
};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::frameworks::{slots_by_label, slots_by_position, uses_labels};
use crate::store::{image_file_name, ArtifactStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoBreadcrumb,
    NoHeading,
    NoTablist,
    NoTabs,
    NoPreviewPanel,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NoBreadcrumb => "no preceding breadcrumb nav",
            Self::NoHeading => "no heading in section",
            Self::NoTablist => "no tablist in section",
            Self::NoTabs => "preview or code tab missing",
            Self::NoPreviewPanel => "no preview tab panel",
        })
    }
}

#[derive(Debug)]
pub enum SectionOutcome {
    /// Metadata, screenshot (if any) and every readable framework variant.
    Recorded(ComponentRecord),
    /// Code panel missing: metadata and screenshot only.
    Partial(ComponentRecord),
    /// Structure missing before a record could be built.
    Skipped(SkipReason),
}

/// A section that failed mid-walk; no record is emitted for it.
#[derive(Debug)]
pub struct SectionFailure {
    pub name: Option<String>,
    pub error: Error,
}

impl std::fmt::Display for SectionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({})",
            self.error,
            self.name.as_deref().unwrap_or("Unknown")
        )
    }
}

pub struct SectionExtractor<'a> {
    selectors: &'a SelectorConfig,
    timeouts: &'a TimeoutConfig,
    mapping: FrameworkMapping,
    store: &'a ArtifactStore,
}

impl<'a> SectionExtractor<'a> {
    pub fn new(config: &'a Config, store: &'a ArtifactStore) -> Self {
        Self {
            selectors: &config.selectors,
            timeouts: &config.timeouts,
            mapping: config.extraction.framework_mapping,
            store,
        }
    }

    /// Walk one section. `id` is used if a record is emitted.
    pub async fn extract<D: PageDriver>(
        &self,
        page: &D,
        index: usize,
        section: &D::Node,
        id: u32,
    ) -> std::result::Result<SectionOutcome, SectionFailure> {
        let mut name = None;
        self.walk(page, index, section, id, &mut name)
            .await
            .map_err(|error| SectionFailure { name, error })
    }

    async fn walk<D: PageDriver>(
        &self,
        page: &D,
        index: usize,
        section: &D::Node,
        id: u32,
        name_slot: &mut Option<String>,
    ) -> Result<SectionOutcome> {
        let sel = self.selectors;

        let Some(nav) = page.previous_sibling(section).await? else {
            return Ok(SectionOutcome::Skipped(SkipReason::NoBreadcrumb));
        };
        if !page.tag_name(&nav).await?.eq_ignore_ascii_case(&sel.breadcrumb_tag) {
            return Ok(SectionOutcome::Skipped(SkipReason::NoBreadcrumb));
        }
        let Some(heading) = page.query(section, &sel.heading).await? else {
            return Ok(SectionOutcome::Skipped(SkipReason::NoHeading));
        };
        let name = page
            .text_content(&heading)
            .await?
            .unwrap_or_default()
            .trim()
            .to_string();
        *name_slot = Some(name.clone());
        info!(index, name = %name, "Processing component");

        let categories = self.read_categories(page, &nav).await?;
        debug!(
            category = %categories.category,
            subcategory = %categories.subcategory,
            detail = %categories.detail_category,
            "Breadcrumb parsed"
        );

        let Some(tablist) = page.query(section, &sel.tablist).await? else {
            return Ok(SectionOutcome::Skipped(SkipReason::NoTablist));
        };
        let preview_tab = page.query(&tablist, &sel.preview_tab).await?;
        let code_tab = page.query(&tablist, &sel.code_tab).await?;
        let (Some(preview_tab), Some(code_tab)) = (preview_tab, code_tab) else {
            return Ok(SectionOutcome::Skipped(SkipReason::NoTabs));
        };

        page.click(&preview_tab).await?;
        self.settle(page).await?;
        let Some(preview_panel) = page.query(section, &sel.preview_panel).await? else {
            return Ok(SectionOutcome::Skipped(SkipReason::NoPreviewPanel));
        };

        let category_slug = slugify(&categories.category);
        let component_slug = slugify(&name);
        let image = self
            .capture_preview(page, &preview_panel, &image_file_name(&category_slug, &component_slug))
            .await?;

        page.click(&code_tab).await?;
        self.settle(page).await?;
        let (select, code_block) = match page.query(section, &sel.code_panel).await? {
            Some(panel) => (
                page.query(&panel, &sel.language_select).await?,
                page.query(&panel, &sel.code_block).await?,
            ),
            None => {
                debug!(index, "No code tab panel");
                (None, None)
            }
        };
        let (Some(select), Some(code_block)) = (select, code_block) else {
            warn!(
                index,
                name = %name,
                "Language selector or code block missing, recording component without code"
            );
            return Ok(SectionOutcome::Partial(ComponentRecord::new(
                id,
                name,
                categories,
                image,
                CodeVariants::default(),
            )));
        };

        let code = self.read_variants(page, &select, &code_block).await?;
        for (framework, text) in code.present() {
            self.store
                .write_code(&category_slug, &component_slug, framework, text)?;
        }

        Ok(SectionOutcome::Recorded(ComponentRecord::new(
            id, name, categories, image, code,
        )))
    }

    async fn read_categories<D: PageDriver>(&self, page: &D, nav: &D::Node) -> Result<CategoryInfo> {
        let links = page.query_all_in(nav, &self.selectors.breadcrumb_link).await?;
        let mut texts = Vec::with_capacity(3);
        for link in links.iter().take(3) {
            texts.push(page.text_content(link).await?.unwrap_or_default());
        }
        Ok(CategoryInfo::from_links(&texts))
    }

    /// Screenshot the preview iframe: its body first, then the iframe element.
    /// `None` when there is nothing capturable.
    async fn capture_preview<D: PageDriver>(
        &self,
        page: &D,
        panel: &D::Node,
        file_name: &str,
    ) -> Result<Option<String>> {
        let Some(iframe) = page.query(panel, &self.selectors.iframe).await? else {
            info!("No iframe in preview panel, skipping screenshot");
            return Ok(None);
        };
        if !page.has_content_frame(&iframe).await? {
            info!("Preview iframe has no reachable document, skipping screenshot");
            return Ok(None);
        }
        if let Err(e) = page
            .wait_for_frame_load(&iframe, ms(self.timeouts.frame_load_ms))
            .await
        {
            warn!(error = %e, "Preview iframe did not finish loading, skipping screenshot");
            return Ok(None);
        }

        let shot_timeout = ms(self.timeouts.screenshot_ms);
        let png = match page
            .screenshot_in_frame(&iframe, &self.selectors.frame_body, shot_timeout)
            .await
        {
            Ok(png) => png,
            Err(e) => {
                warn!(error = %e, "Frame body screenshot failed, trying the iframe element");
                match page.screenshot_node(&iframe, shot_timeout).await {
                    Ok(png) => png,
                    Err(e) => {
                        warn!(error = %e, "Iframe element screenshot failed");
                        return Ok(None);
                    }
                }
            }
        };
        self.store.write_image(file_name, &png).map(Some)
    }

    async fn read_variants<D: PageDriver>(
        &self,
        page: &D,
        select: &D::Node,
        code_block: &D::Node,
    ) -> Result<CodeVariants> {
        let options = page
            .query_all_in(select, &self.selectors.language_option)
            .await?;
        let slots = if uses_labels(self.mapping) {
            let mut labels = Vec::with_capacity(options.len());
            for option in &options {
                labels.push(page.text_content(option).await?.unwrap_or_default());
            }
            slots_by_label(&labels)
        } else {
            slots_by_position(options.len())
        };

        let mut code = CodeVariants::default();
        for framework in Framework::ALL {
            let Some(option) = slots[framework.position()].and_then(|i| options.get(i)) else {
                warn!(framework = %framework, "No language option for framework");
                continue;
            };
            match self.read_variant(page, select, option, code_block, framework).await {
                Ok(text) => code.set(framework, text),
                Err(e) => warn!(framework = %framework, error = %e, "Could not extract code"),
            }
        }
        Ok(code)
    }

    async fn read_variant<D: PageDriver>(
        &self,
        page: &D,
        select: &D::Node,
        option: &D::Node,
        code_block: &D::Node,
        framework: Framework,
    ) -> Result<Option<String>> {
        let value = page.option_value(option).await?;
        debug!(framework = %framework, value = %value, "Selecting language option");
        page.select_option(select, &value).await?;
        page.pause(ms(self.timeouts.option_settle_ms)).await;
        self.settle(page).await?;
        let text = page.text_content(code_block).await?;
        Ok(text.filter(|t| !t.trim().is_empty()))
    }

    /// Network-idle wait after a UI change; running out of time is not an error.
    async fn settle<D: PageDriver>(&self, page: &D) -> Result<()> {
        match page
            .wait_for_network_idle(ms(self.timeouts.tab_settle_ms))
            .await
        {
            Err(e) if e.is_timeout() => {
                debug!(error = %e, "Network did not settle, continuing");
                Ok(())
            }
            other => other,
        }
    }
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ComponentSpec, FakePage, FrameSpec, Variant};
    use blockharvest_core::OutputLayout;
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (Config, ArtifactStore) {
        let config = Config::default();
        let store = ArtifactStore::new(OutputLayout::new(dir.path().to_path_buf(), "m.json"));
        store.prepare().unwrap();
        (config, store)
    }

    async fn run_one(page: &FakePage, config: &Config, store: &ArtifactStore) -> SectionOutcome {
        let extractor = SectionExtractor::new(config, store);
        let sections = page.query_all(&config.selectors.section).await.unwrap();
        extractor.extract(page, 0, &sections[0], 7).await.unwrap()
    }

    #[tokio::test]
    async fn test_full_component() {
        let dir = TempDir::new().unwrap();
        let (config, store) = setup(&dir);
        let page = FakePage::with_components(vec![ComponentSpec::complete(
            "Simple centered",
            &["Marketing", "Page Sections", "Hero"],
        )]);

        let SectionOutcome::Recorded(record) = run_one(&page, &config, &store).await else {
            panic!("expected a full record");
        };
        assert_eq!(record.id, 7);
        assert_eq!(record.name, "Simple centered");
        assert_eq!(record.category, "Marketing");
        assert_eq!(record.subcategory, "Page Sections");
        assert_eq!(record.detail_category, "Hero");
        assert_eq!(record.image.as_deref(), Some("images/marketing-simple-centered.png"));
        assert_eq!(record.code.html.as_deref(), Some("<div>html</div>"));
        assert_eq!(record.code.react.as_deref(), Some("export default function Example() {}"));
        assert_eq!(record.code.vue.as_deref(), Some("<template></template>"));

        let code_dir = store.layout().code_dir();
        assert!(code_dir.join("marketing-simple-centered-html.html").exists());
        assert!(code_dir.join("marketing-simple-centered-react.jsx").exists());
        assert!(code_dir.join("marketing-simple-centered-vue.vue").exists());
    }

    #[tokio::test]
    async fn test_missing_breadcrumb_links_default_to_unknown() {
        let dir = TempDir::new().unwrap();
        let (config, store) = setup(&dir);
        let page = FakePage::with_components(vec![ComponentSpec::complete("Cards", &["Ecommerce"])]);

        let SectionOutcome::Recorded(record) = run_one(&page, &config, &store).await else {
            panic!("expected a record");
        };
        assert_eq!(record.category, "Ecommerce");
        assert_eq!(record.subcategory, "Unknown");
        assert_eq!(record.detail_category, "Unknown");
    }

    #[tokio::test]
    async fn test_structural_skips() {
        let dir = TempDir::new().unwrap();
        let (config, store) = setup(&dir);

        let cases = [
            (ComponentSpec { breadcrumb: None, ..ComponentSpec::complete("A", &["X"]) }, SkipReason::NoBreadcrumb),
            (ComponentSpec { heading: None, ..ComponentSpec::complete("A", &["X"]) }, SkipReason::NoHeading),
            (ComponentSpec { tablist: false, ..ComponentSpec::complete("A", &["X"]) }, SkipReason::NoTablist),
            (ComponentSpec { code_tab: false, ..ComponentSpec::complete("A", &["X"]) }, SkipReason::NoTabs),
            (ComponentSpec { preview_panel: false, ..ComponentSpec::complete("A", &["X"]) }, SkipReason::NoPreviewPanel),
        ];
        for (spec, expected) in cases {
            let page = FakePage::with_components(vec![spec]);
            match run_one(&page, &config, &store).await {
                SectionOutcome::Skipped(reason) => assert_eq!(reason, expected),
                other => panic!("expected skip {:?}, got {:?}", expected, other),
            }
        }
    }

    #[tokio::test]
    async fn test_breadcrumb_must_be_nav() {
        let dir = TempDir::new().unwrap();
        let (config, store) = setup(&dir);
        let mut spec = ComponentSpec::complete("A", &["X"]);
        spec.breadcrumb_tag = "div";
        let page = FakePage::with_components(vec![spec]);
        assert!(matches!(
            run_one(&page, &config, &store).await,
            SectionOutcome::Skipped(SkipReason::NoBreadcrumb)
        ));
    }

    #[tokio::test]
    async fn test_missing_code_block_gives_partial_record() {
        let dir = TempDir::new().unwrap();
        let (config, store) = setup(&dir);
        let mut spec = ComponentSpec::complete("Simple centered", &["Marketing"]);
        spec.code_block = false;
        let page = FakePage::with_components(vec![spec]);

        let SectionOutcome::Partial(record) = run_one(&page, &config, &store).await else {
            panic!("expected a partial record");
        };
        assert_eq!(record.code, CodeVariants::default());
        assert!(record.image.is_some());
        assert_eq!(std::fs::read_dir(store.layout().code_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_code_panel_gives_partial_record() {
        let dir = TempDir::new().unwrap();
        let (config, store) = setup(&dir);
        let mut spec = ComponentSpec::complete("Simple centered", &["Marketing"]);
        spec.code_panel = false;
        let page = FakePage::with_components(vec![spec]);
        assert!(matches!(run_one(&page, &config, &store).await, SectionOutcome::Partial(_)));
    }

    #[tokio::test]
    async fn test_screenshot_falls_back_to_iframe_element() {
        let dir = TempDir::new().unwrap();
        let (config, store) = setup(&dir);
        let mut spec = ComponentSpec::complete("Hero", &["Marketing"]);
        spec.frame = Some(FrameSpec { body_shot: false, ..FrameSpec::default() });
        let page = FakePage::with_components(vec![spec]);

        let SectionOutcome::Recorded(record) = run_one(&page, &config, &store).await else {
            panic!("expected a record");
        };
        assert_eq!(record.image.as_deref(), Some("images/marketing-hero.png"));
        let png = std::fs::read(store.layout().image_file("marketing-hero.png")).unwrap();
        assert_eq!(png, FakePage::ELEMENT_PNG);
    }

    #[tokio::test]
    async fn test_no_image_when_both_screenshots_fail() {
        let dir = TempDir::new().unwrap();
        let (config, store) = setup(&dir);
        let mut spec = ComponentSpec::complete("Hero", &["Marketing"]);
        spec.frame = Some(FrameSpec { body_shot: false, element_shot: false, ..FrameSpec::default() });
        let page = FakePage::with_components(vec![spec]);

        let SectionOutcome::Recorded(record) = run_one(&page, &config, &store).await else {
            panic!("expected a record");
        };
        assert_eq!(record.image, None);
        assert!(record.code.html.is_some());
    }

    #[tokio::test]
    async fn test_no_image_without_iframe_or_frame_document() {
        let dir = TempDir::new().unwrap();
        let (config, store) = setup(&dir);

        let mut no_iframe = ComponentSpec::complete("Hero", &["Marketing"]);
        no_iframe.frame = None;
        let mut unreachable = ComponentSpec::complete("Hero", &["Marketing"]);
        unreachable.frame = Some(FrameSpec { reachable: false, ..FrameSpec::default() });
        let mut never_loads = ComponentSpec::complete("Hero", &["Marketing"]);
        never_loads.frame = Some(FrameSpec { loads: false, ..FrameSpec::default() });

        for spec in [no_iframe, unreachable, never_loads] {
            let page = FakePage::with_components(vec![spec]);
            let SectionOutcome::Recorded(record) = run_one(&page, &config, &store).await else {
                panic!("expected a record");
            };
            assert_eq!(record.image, None);
        }
    }

    #[tokio::test]
    async fn test_one_framework_failure_does_not_abort_others() {
        let dir = TempDir::new().unwrap();
        let (config, store) = setup(&dir);
        let mut spec = ComponentSpec::complete("Hero", &["Marketing"]);
        spec.variants[1].fails = true;
        let page = FakePage::with_components(vec![spec]);

        let SectionOutcome::Recorded(record) = run_one(&page, &config, &store).await else {
            panic!("expected a record");
        };
        assert!(record.code.html.is_some());
        assert_eq!(record.code.react, None);
        assert!(record.code.vue.is_some());
        let code_dir = store.layout().code_dir();
        assert!(!code_dir.join("marketing-hero-react.jsx").exists());
        assert!(code_dir.join("marketing-hero-vue.vue").exists());
    }

    #[tokio::test]
    async fn test_blank_code_is_treated_as_missing() {
        let dir = TempDir::new().unwrap();
        let (config, store) = setup(&dir);
        let mut spec = ComponentSpec::complete("Hero", &["Marketing"]);
        spec.variants[2].code = Some("  \n".into());
        let page = FakePage::with_components(vec![spec]);

        let SectionOutcome::Recorded(record) = run_one(&page, &config, &store).await else {
            panic!("expected a record");
        };
        assert_eq!(record.code.vue, None);
        assert!(!store.layout().code_dir().join("marketing-hero-vue.vue").exists());
    }

    #[tokio::test]
    async fn test_label_mapping_follows_option_text() {
        let dir = TempDir::new().unwrap();
        let (config, store) = setup(&dir);
        let mut spec = ComponentSpec::complete("Hero", &["Marketing"]);
        spec.variants = vec![
            Variant::new("vue", "Vue", "<template/>"),
            Variant::new("svelte", "Svelte", "<script></script>"),
            Variant::new("html", "HTML", "<div/>"),
        ];
        let page = FakePage::with_components(vec![spec]);

        let SectionOutcome::Recorded(record) = run_one(&page, &config, &store).await else {
            panic!("expected a record");
        };
        assert_eq!(record.code.html.as_deref(), Some("<div/>"));
        assert_eq!(record.code.react, None);
        assert_eq!(record.code.vue.as_deref(), Some("<template/>"));
    }

    #[tokio::test]
    async fn test_position_mapping_uses_option_order() {
        let dir = TempDir::new().unwrap();
        let (mut config, store) = setup(&dir);
        config.extraction.framework_mapping = FrameworkMapping::Position;
        let mut spec = ComponentSpec::complete("Hero", &["Marketing"]);
        spec.variants = vec![
            Variant::new("vue", "Vue", "<template/>"),
            Variant::new("html", "HTML", "<div/>"),
        ];
        let page = FakePage::with_components(vec![spec]);

        let SectionOutcome::Recorded(record) = run_one(&page, &config, &store).await else {
            panic!("expected a record");
        };
        // positional slots ignore labels
        assert_eq!(record.code.html.as_deref(), Some("<template/>"));
        assert_eq!(record.code.react.as_deref(), Some("<div/>"));
        assert_eq!(record.code.vue, None);
    }

    #[tokio::test]
    async fn test_dom_error_reports_name() {
        let dir = TempDir::new().unwrap();
        let (config, store) = setup(&dir);
        let mut spec = ComponentSpec::complete("Broken", &["Marketing"]);
        spec.tablist_errors = true;
        let page = FakePage::with_components(vec![spec]);

        let extractor = SectionExtractor::new(&config, &store);
        let sections = page.query_all(&config.selectors.section).await.unwrap();
        let failure = extractor.extract(&page, 0, &sections[0], 1).await.unwrap_err();
        assert_eq!(failure.name.as_deref(), Some("Broken"));
        assert!(failure.to_string().contains("Broken"));
    }
}
