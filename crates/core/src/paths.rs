use std::path::{Path, PathBuf};

/// Per-user tool directory holding the config file.
#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".blockharvest"))
            .unwrap_or_else(|| PathBuf::from(".blockharvest"));
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a run writes its artifacts.
///
/// ```text
/// <base>/
///   images/<category>-<component>.png
///   code/<category>-<component>-<framework>.<ext>
///   <manifest>
///   debug-*.png, debug-page.html
/// ```
#[derive(Debug, Clone)]
pub struct OutputLayout {
    base: PathBuf,
    manifest_name: String,
}

impl OutputLayout {
    pub fn new(base: PathBuf, manifest_name: &str) -> Self {
        Self {
            base,
            manifest_name: manifest_name.to_string(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn images_dir(&self) -> PathBuf {
        self.base.join("images")
    }

    pub fn code_dir(&self) -> PathBuf {
        self.base.join("code")
    }

    pub fn manifest_file(&self) -> PathBuf {
        self.base.join(&self.manifest_name)
    }

    pub fn debug_file(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }

    pub fn image_file(&self, file_name: &str) -> PathBuf {
        self.images_dir().join(file_name)
    }

    pub fn code_file(&self, file_name: &str) -> PathBuf {
        self.code_dir().join(file_name)
    }

    /// Path as stored in the manifest: relative to the base, `/`-separated.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.base).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.images_dir())?;
        std::fs::create_dir_all(self.code_dir())?;
        Ok(())
    }
}
