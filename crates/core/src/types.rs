use serde::{Deserialize, Serialize};

pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// A framework rendition offered by the catalog's language selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Html,
    React,
    Vue,
}

impl Framework {
    pub const ALL: [Framework; 3] = [Framework::Html, Framework::React, Framework::Vue];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::React => "react",
            Self::Vue => "vue",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Html => "HTML",
            Self::React => "React",
            Self::Vue => "Vue",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::React => "jsx",
            Self::Vue => "vue",
        }
    }

    /// Fixed selector slot used when mapping options by position.
    pub fn position(&self) -> usize {
        match self {
            Self::Html => 0,
            Self::React => 1,
            Self::Vue => 2,
        }
    }

    /// Identify a framework from a selector option label.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        if label.contains("html") {
            Some(Self::Html)
        } else if label.contains("react") || label.contains("jsx") {
            Some(Self::React)
        } else if label.contains("vue") {
            Some(Self::Vue)
        } else {
            None
        }
    }

    pub fn code_file_name(&self, category_slug: &str, component_slug: &str) -> String {
        format!(
            "{}-{}-{}.{}",
            category_slug,
            component_slug,
            self.name(),
            self.extension()
        )
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeVariants {
    pub html: Option<String>,
    pub react: Option<String>,
    pub vue: Option<String>,
}

impl CodeVariants {
    pub fn get(&self, framework: Framework) -> Option<&str> {
        match framework {
            Framework::Html => self.html.as_deref(),
            Framework::React => self.react.as_deref(),
            Framework::Vue => self.vue.as_deref(),
        }
    }

    pub fn set(&mut self, framework: Framework, code: Option<String>) {
        let slot = match framework {
            Framework::Html => &mut self.html,
            Framework::React => &mut self.react,
            Framework::Vue => &mut self.vue,
        };
        *slot = code;
    }

    pub fn present(&self) -> impl Iterator<Item = (Framework, &str)> {
        Framework::ALL
            .into_iter()
            .filter_map(move |fw| self.get(fw).map(|code| (fw, code)))
    }

    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

/// Category trail read from a component's breadcrumb links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInfo {
    pub category: String,
    pub subcategory: String,
    pub detail_category: String,
}

impl CategoryInfo {
    /// Build from breadcrumb link texts; absent levels become `"Unknown"`.
    pub fn from_links<S: AsRef<str>>(links: &[S]) -> Self {
        let level = |i: usize| {
            links
                .get(i)
                .map(|s| s.as_ref().trim().to_string())
                .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string())
        };
        Self {
            category: level(0),
            subcategory: level(1),
            detail_category: level(2),
        }
    }
}

impl Default for CategoryInfo {
    fn default() -> Self {
        Self::from_links::<&str>(&[])
    }
}

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub id: u32,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub detail_category: String,
    pub image: Option<String>,
    pub code: CodeVariants,
}

impl ComponentRecord {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        categories: CategoryInfo,
        image: Option<String>,
        code: CodeVariants,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            category: categories.category,
            subcategory: categories.subcategory,
            detail_category: categories.detail_category,
            image,
            code,
        }
    }
}

/// File-name slug: lowercase, every character outside `[a-z0-9]` becomes `-`.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect()
}
