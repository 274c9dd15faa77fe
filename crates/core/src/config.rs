use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths::{OutputLayout, Paths};

pub const EMAIL_ENV: &str = "TAILWIND_EMAIL";
pub const PASSWORD_ENV: &str = "TAILWIND_PASSWORD";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default = "default_listing_url")]
    pub listing_url: String,
    /// Element that proves the listing page rendered for a logged-in user.
    #[serde(default = "default_ready_selector")]
    pub ready_selector: String,
    /// Substring the ready element's text must contain. `None` accepts any match.
    #[serde(default = "default_ready_text")]
    pub ready_text: Option<String>,
}

fn default_login_url() -> String {
    "https://tailwindcss.com/plus/login".to_string()
}

fn default_listing_url() -> String {
    "https://tailwindcss.com/plus/ui-blocks/preview".to_string()
}

fn default_ready_selector() -> String {
    "h1".to_string()
}

fn default_ready_text() -> Option<String> {
    Some("Get a better idea".to_string())
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            listing_url: default_listing_url(),
            ready_selector: default_ready_selector(),
            ready_text: default_ready_text(),
        }
    }
}

/// CSS selectors describing the catalog's markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorConfig {
    #[serde(default = "default_email_input")]
    pub email_input: String,
    #[serde(default = "default_password_input")]
    pub password_input: String,
    #[serde(default = "default_submit_button")]
    pub submit_button: String,
    #[serde(default = "default_section")]
    pub section: String,
    #[serde(default = "default_breadcrumb_tag")]
    pub breadcrumb_tag: String,
    #[serde(default = "default_breadcrumb_link")]
    pub breadcrumb_link: String,
    #[serde(default = "default_heading")]
    pub heading: String,
    #[serde(default = "default_tablist")]
    pub tablist: String,
    #[serde(default = "default_preview_tab")]
    pub preview_tab: String,
    #[serde(default = "default_code_tab")]
    pub code_tab: String,
    #[serde(default = "default_preview_panel")]
    pub preview_panel: String,
    #[serde(default = "default_code_panel")]
    pub code_panel: String,
    #[serde(default = "default_iframe")]
    pub iframe: String,
    #[serde(default = "default_frame_body")]
    pub frame_body: String,
    #[serde(default = "default_language_select")]
    pub language_select: String,
    #[serde(default = "default_language_option")]
    pub language_option: String,
    #[serde(default = "default_code_block")]
    pub code_block: String,
}

fn default_email_input() -> String {
    "input[type=\"email\"]".to_string()
}

fn default_password_input() -> String {
    "input[type=\"password\"]".to_string()
}

fn default_submit_button() -> String {
    "button[type=\"submit\"]".to_string()
}

fn default_section() -> String {
    "nav[aria-label=\"Breadcrumbs\"] + section".to_string()
}

fn default_breadcrumb_tag() -> String {
    "nav".to_string()
}

fn default_breadcrumb_link() -> String {
    "a".to_string()
}

fn default_heading() -> String {
    "h2".to_string()
}

fn default_tablist() -> String {
    "div[role=\"tablist\"]".to_string()
}

fn default_preview_tab() -> String {
    "button:nth-child(1)".to_string()
}

fn default_code_tab() -> String {
    "button:nth-child(2)".to_string()
}

fn default_preview_panel() -> String {
    "div[role=\"tabpanel\"]:nth-of-type(1)".to_string()
}

fn default_code_panel() -> String {
    "[role=\"tabpanel\"]:nth-of-type(2)".to_string()
}

fn default_iframe() -> String {
    "iframe".to_string()
}

fn default_frame_body() -> String {
    "body".to_string()
}

fn default_language_select() -> String {
    "select".to_string()
}

fn default_language_option() -> String {
    "option".to_string()
}

fn default_code_block() -> String {
    "pre".to_string()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            email_input: default_email_input(),
            password_input: default_password_input(),
            submit_button: default_submit_button(),
            section: default_section(),
            breadcrumb_tag: default_breadcrumb_tag(),
            breadcrumb_link: default_breadcrumb_link(),
            heading: default_heading(),
            tablist: default_tablist(),
            preview_tab: default_preview_tab(),
            code_tab: default_code_tab(),
            preview_panel: default_preview_panel(),
            code_panel: default_code_panel(),
            iframe: default_iframe(),
            frame_body: default_frame_body(),
            language_select: default_language_select(),
            language_option: default_language_option(),
            code_block: default_code_block(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    #[serde(default)]
    pub headless: bool,
    /// Explicit browser binary; otherwise Chrome, Chromium and Edge are searched for.
    #[serde(default)]
    pub executable: Option<String>,
    /// Profile directory. When unset each run uses `<temp dir>/blockharvest-profile-<pid>`,
    /// removed after the browser closes.
    #[serde(default)]
    pub user_data_dir: Option<String>,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Pause after every click or fill.
    #[serde(default = "default_action_delay_ms")]
    pub action_delay_ms: u64,
}

fn default_viewport_width() -> u32 {
    1920
}

fn default_viewport_height() -> u32 {
    1080
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.93 Safari/537.36".to_string()
}

fn default_action_delay_ms() -> u64 {
    50
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            user_data_dir: None,
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            user_agent: default_user_agent(),
            action_delay_ms: default_action_delay_ms(),
        }
    }
}

/// Every bounded wait in the run, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutConfig {
    #[serde(default = "default_login_form_ms")]
    pub login_form_ms: u64,
    #[serde(default = "default_post_login_delay_ms")]
    pub post_login_delay_ms: u64,
    #[serde(default = "default_navigation_ms")]
    pub navigation_ms: u64,
    #[serde(default = "default_post_navigation_delay_ms")]
    pub post_navigation_delay_ms: u64,
    #[serde(default = "default_ready_marker_ms")]
    pub ready_marker_ms: u64,
    #[serde(default = "default_tab_settle_ms")]
    pub tab_settle_ms: u64,
    #[serde(default = "default_frame_load_ms")]
    pub frame_load_ms: u64,
    #[serde(default = "default_screenshot_ms")]
    pub screenshot_ms: u64,
    #[serde(default = "default_option_settle_ms")]
    pub option_settle_ms: u64,
    #[serde(default = "default_component_pacing_ms")]
    pub component_pacing_ms: u64,
}

fn default_login_form_ms() -> u64 {
    10_000
}

fn default_post_login_delay_ms() -> u64 {
    2_000
}

fn default_navigation_ms() -> u64 {
    60_000
}

fn default_post_navigation_delay_ms() -> u64 {
    1_000
}

fn default_ready_marker_ms() -> u64 {
    120_000
}

fn default_tab_settle_ms() -> u64 {
    5_000
}

fn default_frame_load_ms() -> u64 {
    15_000
}

fn default_screenshot_ms() -> u64 {
    10_000
}

fn default_option_settle_ms() -> u64 {
    500
}

fn default_component_pacing_ms() -> u64 {
    500
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            login_form_ms: default_login_form_ms(),
            post_login_delay_ms: default_post_login_delay_ms(),
            navigation_ms: default_navigation_ms(),
            post_navigation_delay_ms: default_post_navigation_delay_ms(),
            ready_marker_ms: default_ready_marker_ms(),
            tab_settle_ms: default_tab_settle_ms(),
            frame_load_ms: default_frame_load_ms(),
            screenshot_ms: default_screenshot_ms(),
            option_settle_ms: default_option_settle_ms(),
            component_pacing_ms: default_component_pacing_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,
    /// Write the listing page HTML next to the debug screenshots after login.
    #[serde(default)]
    pub dump_page_html: bool,
}

fn default_output_dir() -> String {
    "tailwind-blocks".to_string()
}

fn default_manifest_name() -> String {
    "tailwind-blocks-master.json".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            manifest_name: default_manifest_name(),
            dump_page_html: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Credentials when both env vars are set, interactive otherwise.
    #[default]
    Auto,
    /// Fill the login form from `TAILWIND_EMAIL` / `TAILWIND_PASSWORD`.
    Credentials,
    /// Leave the form to a human in the visible browser window.
    Interactive,
}

impl AuthMode {
    /// The concrete mode once credential availability is known; never `Auto`.
    pub fn resolve(self, have_credentials: bool) -> AuthMode {
        match self {
            Self::Auto if have_credentials => Self::Credentials,
            Self::Auto => Self::Interactive,
            explicit => explicit,
        }
    }
}

impl std::str::FromStr for AuthMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "credentials" => Ok(Self::Credentials),
            "interactive" | "manual" => Ok(Self::Interactive),
            other => Err(Error::Config(format!("unknown auth mode '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrameworkMapping {
    /// Match option labels against framework keywords; skip unknown labels.
    #[default]
    Label,
    /// Option 0 is HTML, 1 is React, 2 is Vue.
    Position,
}

impl std::str::FromStr for FrameworkMapping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "label" => Ok(Self::Label),
            "position" | "index" => Ok(Self::Position),
            other => Err(Error::Config(format!(
                "unknown framework mapping '{}' (expected label or position)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionConfig {
    #[serde(default)]
    pub framework_mapping: FrameworkMapping,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

/// Login secrets, read from the environment only.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Option<Self> {
        let email = std::env::var(EMAIL_ENV).ok().filter(|v| !v.trim().is_empty())?;
        let password = std::env::var(PASSWORD_ENV)
            .ok()
            .filter(|v| !v.is_empty())?;
        Some(Self { email, password })
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn output_layout(&self) -> OutputLayout {
        OutputLayout::new(PathBuf::from(&self.output.dir), &self.output.manifest_name)
    }

    /// Reject settings the run cannot honor before a browser is launched.
    pub fn validate(&self) -> Result<()> {
        if self.site.login_url.trim().is_empty() || self.site.listing_url.trim().is_empty() {
            return Err(Error::Config("site.loginUrl and site.listingUrl are required".into()));
        }
        if self.output.manifest_name.trim().is_empty()
            || self.output.manifest_name.contains(['/', '\\'])
        {
            return Err(Error::Config(format!(
                "output.manifestName must be a plain file name, got '{}'",
                self.output.manifest_name
            )));
        }
        self.check_login_mode(Credentials::from_env().is_some())
    }

    fn check_login_mode(&self, have_credentials: bool) -> Result<()> {
        if self.auth.mode.resolve(have_credentials) == AuthMode::Interactive && self.browser.headless {
            return Err(Error::Config(format!(
                "interactive login needs a visible browser; unset browser.headless or set {} and {}",
                EMAIL_ENV, PASSWORD_ENV
            )));
        }
        Ok(())
    }

    /// Credentials for the configured auth mode, read from the environment.
    /// `None` means interactive login.
    pub fn credentials(&self) -> Result<Option<Credentials>> {
        self.select_credentials(Credentials::from_env())
    }

    pub fn select_credentials(&self, available: Option<Credentials>) -> Result<Option<Credentials>> {
        match self.auth.mode {
            AuthMode::Interactive => Ok(None),
            AuthMode::Auto => Ok(available),
            AuthMode::Credentials => available.map(Some).ok_or_else(|| {
                Error::Config(format!(
                    "{} and {} must be set for credentials login (or use --interactive)",
                    EMAIL_ENV, PASSWORD_ENV
                ))
            }),
        }
    }
}
