//! The page-automation surface the scraper is written against.

use async_trait::async_trait;
use blockharvest_core::Result;
use std::time::Duration;

/// Operations on one browser page.
///
/// Node handles are opaque and belong to the scope that was current when they
/// were obtained; [`PageDriver::release_scope`] invalidates all of them at once.
#[async_trait]
pub trait PageDriver: Send + Sync {
    type Node: Clone + Send + Sync + std::fmt::Debug;

    // ── page ──────────────────────────────────────────────────────────

    /// Navigate and wait for the load event followed by network idle.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<()>;

    /// Wait for an element matching `selector` (and containing `text`, if given).
    async fn wait_for_selector(&self, selector: &str, text: Option<&str>, timeout: Duration) -> Result<()>;

    /// Replace the value of the input matching `selector`.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    async fn click_selector(&self, selector: &str) -> Result<()>;

    async fn url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String>;

    /// PNG of the viewport, or of the whole document when `full_page`.
    async fn screenshot_page(&self, full_page: bool) -> Result<Vec<u8>>;

    /// Fixed delay between steps.
    async fn pause(&self, duration: Duration);

    // ── handle scopes ─────────────────────────────────────────────────

    /// Make `name` the scope that subsequently obtained nodes belong to.
    async fn begin_scope(&mut self, name: &str);

    /// Release every node obtained in the current scope and return to the default scope.
    async fn release_scope(&mut self) -> Result<()>;

    // ── nodes ─────────────────────────────────────────────────────────

    /// All document elements matching `selector`, in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<Self::Node>>;

    /// First descendant of `node` matching `selector`.
    async fn query(&self, node: &Self::Node, selector: &str) -> Result<Option<Self::Node>>;

    /// All descendants of `node` matching `selector`, in document order.
    async fn query_all_in(&self, node: &Self::Node, selector: &str) -> Result<Vec<Self::Node>>;

    async fn previous_sibling(&self, node: &Self::Node) -> Result<Option<Self::Node>>;

    /// Lowercase tag name.
    async fn tag_name(&self, node: &Self::Node) -> Result<String>;

    async fn text_content(&self, node: &Self::Node) -> Result<Option<String>>;

    /// Option `value` of a `<option>` element.
    async fn option_value(&self, node: &Self::Node) -> Result<String>;

    async fn click(&self, node: &Self::Node) -> Result<()>;

    /// Select the option with `value` in a `<select>` and fire input/change.
    async fn select_option(&self, select: &Self::Node, value: &str) -> Result<()>;

    /// Whether the iframe's document is reachable from this page.
    async fn has_content_frame(&self, iframe: &Self::Node) -> Result<bool>;

    /// Wait for the iframe's document to finish loading.
    async fn wait_for_frame_load(&self, iframe: &Self::Node, timeout: Duration) -> Result<()>;

    /// PNG of the element matching `selector` inside the iframe's document,
    /// clipped to the iframe's visible box.
    async fn screenshot_in_frame(&self, iframe: &Self::Node, selector: &str, timeout: Duration) -> Result<Vec<u8>>;

    /// PNG of the element's bounding box.
    async fn screenshot_node(&self, node: &Self::Node, timeout: Duration) -> Result<Vec<u8>>;
}
