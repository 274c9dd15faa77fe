use blockharvest_core::{ComponentRecord, Error, Framework, OutputLayout, Result};
use std::path::PathBuf;
use tracing::{debug, info};

/// `<category-slug>-<component-slug>.png`
pub fn image_file_name(category_slug: &str, component_slug: &str) -> String {
    format!("{}-{}.png", category_slug, component_slug)
}

/// Writes run artifacts under an [`OutputLayout`].
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    layout: OutputLayout,
}

impl ArtifactStore {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn prepare(&self) -> Result<()> {
        self.layout.ensure_dirs()?;
        Ok(())
    }

    /// Save a screenshot and return its manifest path (relative to the output dir).
    pub fn write_image(&self, file_name: &str, png: &[u8]) -> Result<String> {
        let path = self.layout.image_file(file_name);
        std::fs::write(&path, png)?;
        info!(path = %path.display(), "Screenshot saved");
        self.layout
            .relative(&path)
            .ok_or_else(|| Error::Other(format!("{} is outside the output dir", path.display())))
    }

    pub fn write_code(
        &self,
        category_slug: &str,
        component_slug: &str,
        framework: Framework,
        code: &str,
    ) -> Result<PathBuf> {
        let path = self
            .layout
            .code_file(&framework.code_file_name(category_slug, component_slug));
        std::fs::write(&path, code)?;
        debug!(framework = %framework, path = %path.display(), "Code saved");
        Ok(path)
    }

    pub fn write_debug(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.layout.debug_file(name);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Write the manifest in one step: a sibling temp file renamed into place.
    pub fn write_manifest(&self, records: &[ComponentRecord]) -> Result<PathBuf> {
        let path = self.layout.manifest_file();
        let content = serde_json::to_string_pretty(records)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockharvest_core::{CategoryInfo, CodeVariants};
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ArtifactStore {
        let store = ArtifactStore::new(OutputLayout::new(dir.path().join("out"), "blocks.json"));
        store.prepare().unwrap();
        store
    }

    #[test]
    fn test_image_relative_path() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let rel = store
            .write_image(&image_file_name("marketing", "simple-centered"), b"png")
            .unwrap();
        assert_eq!(rel, "images/marketing-simple-centered.png");
        assert!(store.layout().image_file("marketing-simple-centered.png").exists());
    }

    #[test]
    fn test_code_file_location() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let path = store
            .write_code("marketing", "simple-centered", Framework::React, "export default 1")
            .unwrap();
        assert!(path.ends_with("code/marketing-simple-centered-react.jsx"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "export default 1");
    }

    #[test]
    fn test_manifest_is_pretty_array() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let records = vec![ComponentRecord::new(
            1,
            "Simple centered",
            CategoryInfo::from_links(&["Marketing"]),
            None,
            CodeVariants::default(),
        )];
        let path = store.write_manifest(&records).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("[\n  {\n    \"id\": 1,"));
        assert!(!path.with_extension("json.tmp").exists());

        let parsed: Vec<ComponentRecord> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, records);
    }

    #[test]
    fn test_empty_manifest() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let path = store.write_manifest(&[]).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "[]");
    }
}
