//! `CdpPage`: a [`PageDriver`] backed by a live browser page.
//!
//! Nodes are Runtime remote objects. Each one is created in the current
//! object group, so releasing a scope is a single `Runtime.releaseObjectGroup`.

use async_trait::async_trait;
use base64::Engine;
use blockharvest_core::config::BrowserConfig;
use blockharvest_core::{Error, Result};
use serde_json::{json, Value};
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

use super::cdp::{js_string, remote_object_id, CdpClient, Clip};
use super::driver::PageDriver;
use super::network::NetworkMonitor;
use super::session::BrowserSession;

const DEFAULT_GROUP: &str = "blockharvest";
const POLL_INTERVAL: Duration = Duration::from_millis(200);
const PAGE_SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(30);

const QUERY_ONE: &str = "function(sel) { return this.querySelector(sel); }";
const QUERY_ALL: &str = "function(sel) { return Array.from(this.querySelectorAll(sel)); }";
const PREVIOUS_SIBLING: &str = "function() { return this.previousElementSibling; }";
const TAG_NAME: &str = "function() { return this.tagName.toLowerCase(); }";
const TEXT_CONTENT: &str = "function() { return this.textContent; }";
const OPTION_VALUE: &str = "function() { return this.value; }";
const CLICK: &str = "function() { this.scrollIntoView({block: 'center'}); this.click(); }";
const HAS_CONTENT_FRAME: &str = "function() { try { return !!this.contentDocument; } catch (e) { return false; } }";
const FRAME_READY_STATE: &str =
    "function() { const d = this.contentDocument; return d ? d.readyState : null; }";

/// Sets the value through the native setter so framework-controlled selects see the change.
const SELECT_OPTION: &str = r#"function(value) {
    const option = Array.from(this.options).find(o => o.value === value);
    if (!option) return false;
    const setter = Object.getOwnPropertyDescriptor(HTMLSelectElement.prototype, 'value').set;
    setter.call(this, value);
    this.dispatchEvent(new Event('input', {bubbles: true}));
    this.dispatchEvent(new Event('change', {bubbles: true}));
    return this.value === value;
}"#;

const ELEMENT_RECT: &str = r#"function() {
    this.scrollIntoView({block: 'start'});
    const r = this.getBoundingClientRect();
    return {x: r.left + window.scrollX, y: r.top + window.scrollY, width: r.width, height: r.height};
}"#;

/// Rectangle of an element inside the iframe, intersected with the iframe's content box,
/// in top-level page coordinates.
const FRAME_ELEMENT_RECT: &str = r#"function(sel) {
    const doc = this.contentDocument;
    if (!doc) throw new Error('frame document is not reachable');
    const el = doc.querySelector(sel);
    if (!el) throw new Error('no ' + sel + ' inside frame');
    this.scrollIntoView({block: 'start'});
    const f = this.getBoundingClientRect();
    const left = f.left + this.clientLeft;
    const top = f.top + this.clientTop;
    const r = el.getBoundingClientRect();
    const x1 = Math.max(left + r.left, left);
    const y1 = Math.max(top + r.top, top);
    const x2 = Math.min(left + r.right, left + this.clientWidth);
    const y2 = Math.min(top + r.bottom, top + this.clientHeight);
    return {x: x1 + window.scrollX, y: y1 + window.scrollY, width: x2 - x1, height: y2 - y1};
}"#;

/// Handle to a DOM element held as a remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNode {
    object_id: String,
}

impl RemoteNode {
    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

pub struct CdpPage {
    session: BrowserSession,
    network: NetworkMonitor,
    action_delay: Duration,
    group: String,
}

impl CdpPage {
    /// Launch a browser and prepare its page (viewport, user agent, network tracking).
    pub async fn open(config: &BrowserConfig, user_data_dir: &Path) -> Result<Self> {
        let session = BrowserSession::launch(config, user_data_dir).await?;
        session
            .cdp
            .set_viewport(config.viewport_width, config.viewport_height, 1.0)
            .await?;
        session.cdp.set_user_agent(&config.user_agent).await?;
        let network = NetworkMonitor::attach(&session.cdp).await;

        Ok(Self {
            session,
            network,
            action_delay: Duration::from_millis(config.action_delay_ms),
            group: DEFAULT_GROUP.to_string(),
        })
    }

    pub async fn close(mut self) {
        self.session.close().await;
    }

    fn cdp(&self) -> &CdpClient {
        &self.session.cdp
    }

    async fn after_action(&self) {
        if !self.action_delay.is_zero() {
            tokio::time::sleep(self.action_delay).await;
        }
    }

    /// Call `decl` on the node and return the result by value.
    async fn call_value(&self, node: &RemoteNode, decl: &str, args: &[Value]) -> Result<Value> {
        let remote = self
            .cdp()
            .call_function_on(&node.object_id, decl, args, None)
            .await?;
        Ok(remote.get("value").cloned().unwrap_or(Value::Null))
    }

    /// Call `decl` on the node and keep the result remote, in the current group.
    async fn call_handle(&self, node: &RemoteNode, decl: &str, args: &[Value]) -> Result<Option<String>> {
        let remote = self
            .cdp()
            .call_function_on(&node.object_id, decl, args, Some(&self.group))
            .await?;
        Ok(remote_object_id(&remote))
    }

    async fn nodes_from_array(&self, array_id: Option<String>) -> Result<Vec<RemoteNode>> {
        let Some(array_id) = array_id else {
            return Ok(Vec::new());
        };
        let ids = self.cdp().array_elements(&array_id).await?;
        Ok(ids.into_iter().map(|object_id| RemoteNode { object_id }).collect())
    }

    async fn capture(&self, clip: Option<Clip>, timeout: Duration) -> Result<Vec<u8>> {
        let data = self.cdp().screenshot(clip, timeout).await?;
        decode_png(&data)
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    type Node = RemoteNode;

    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        let mut loaded = self.cdp().subscribe_event("Page.loadEventFired").await;
        self.cdp().navigate(url).await?;

        let remaining = timeout.saturating_sub(start.elapsed());
        match tokio::time::timeout(remaining, loaded.recv()).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(Error::Browser("page closed during navigation".into())),
            Err(_) => {
                return Err(Error::Timeout(format!(
                    "{} did not finish loading within {}ms",
                    url,
                    timeout.as_millis()
                )))
            }
        }

        let remaining = timeout.saturating_sub(start.elapsed());
        self.network.wait_for_idle(remaining).await
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<()> {
        self.network.wait_for_idle(timeout).await
    }

    async fn wait_for_selector(&self, selector: &str, text: Option<&str>, timeout: Duration) -> Result<()> {
        let js = selector_check_js(selector, text);
        let js = &js;
        let start = Instant::now();
        let found = poll_until(timeout, POLL_INTERVAL, move || async move {
            Ok(self.cdp().evaluate_js(js).await?.as_bool() == Some(true))
        })
        .await?;
        if found {
            debug!(selector, waited_ms = start.elapsed().as_millis() as u64, "Selector found");
            return Ok(());
        }
        Err(Error::Timeout(match text {
            Some(t) => format!("'{}' containing \"{}\" not found within {}ms", selector, t, timeout.as_millis()),
            None => format!("'{}' not found within {}ms", selector, timeout.as_millis()),
        }))
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let focus = format!(
            "(function() {{ const el = document.querySelector({}); if (!el) return false; el.focus(); el.value = ''; return true; }})()",
            js_string(selector)
        );
        if self.cdp().evaluate_js(&focus).await?.as_bool() != Some(true) {
            return Err(Error::NotFound(format!("input {}", selector)));
        }
        self.cdp().insert_text(value).await?;
        // Frameworks listen for input events rather than value changes
        self.cdp()
            .evaluate_js("document.activeElement && document.activeElement.dispatchEvent(new Event('input', {bubbles: true}))")
            .await?;
        self.after_action().await;
        Ok(())
    }

    async fn click_selector(&self, selector: &str) -> Result<()> {
        let js = format!(
            "(function() {{ const el = document.querySelector({}); if (!el) return false; el.scrollIntoView({{block: 'center'}}); el.click(); return true; }})()",
            js_string(selector)
        );
        if self.cdp().evaluate_js(&js).await?.as_bool() != Some(true) {
            return Err(Error::NotFound(format!("element {}", selector)));
        }
        self.after_action().await;
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        // Read from the browser rather than the page so it works mid-navigation
        let history = self
            .cdp()
            .send_command("Page.getNavigationHistory", json!({}))
            .await?;
        current_history_url(&history)
            .ok_or_else(|| Error::Browser(format!("no current entry in navigation history: {}", history)))
    }

    async fn title(&self) -> Result<String> {
        let v = self.cdp().evaluate_js("document.title").await?;
        Ok(v.as_str().unwrap_or_default().to_string())
    }

    async fn content(&self) -> Result<String> {
        let v = self
            .cdp()
            .evaluate_js("document.documentElement ? document.documentElement.outerHTML : ''")
            .await?;
        Ok(v.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot_page(&self, full_page: bool) -> Result<Vec<u8>> {
        let clip = if full_page {
            let (width, height) = self.cdp().content_size().await?;
            Some(Clip { x: 0.0, y: 0.0, width, height })
        } else {
            None
        };
        self.capture(clip, PAGE_SCREENSHOT_TIMEOUT).await
    }

    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn begin_scope(&mut self, name: &str) {
        self.group = format!("{}:{}", DEFAULT_GROUP, name);
    }

    async fn release_scope(&mut self) -> Result<()> {
        let group = std::mem::replace(&mut self.group, DEFAULT_GROUP.to_string());
        self.cdp().release_object_group(&group).await
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<RemoteNode>> {
        let expr = format!("Array.from(document.querySelectorAll({}))", js_string(selector));
        let array_id = self.cdp().evaluate_handle(&expr, &self.group).await?;
        self.nodes_from_array(array_id).await
    }

    async fn query(&self, node: &RemoteNode, selector: &str) -> Result<Option<RemoteNode>> {
        let id = self.call_handle(node, QUERY_ONE, &[json!(selector)]).await?;
        Ok(id.map(|object_id| RemoteNode { object_id }))
    }

    async fn query_all_in(&self, node: &RemoteNode, selector: &str) -> Result<Vec<RemoteNode>> {
        let array_id = self.call_handle(node, QUERY_ALL, &[json!(selector)]).await?;
        self.nodes_from_array(array_id).await
    }

    async fn previous_sibling(&self, node: &RemoteNode) -> Result<Option<RemoteNode>> {
        let id = self.call_handle(node, PREVIOUS_SIBLING, &[]).await?;
        Ok(id.map(|object_id| RemoteNode { object_id }))
    }

    async fn tag_name(&self, node: &RemoteNode) -> Result<String> {
        let v = self.call_value(node, TAG_NAME, &[]).await?;
        Ok(v.as_str().unwrap_or_default().to_string())
    }

    async fn text_content(&self, node: &RemoteNode) -> Result<Option<String>> {
        let v = self.call_value(node, TEXT_CONTENT, &[]).await?;
        Ok(v.as_str().map(|s| s.to_string()))
    }

    async fn option_value(&self, node: &RemoteNode) -> Result<String> {
        let v = self.call_value(node, OPTION_VALUE, &[]).await?;
        Ok(v.as_str().unwrap_or_default().to_string())
    }

    async fn click(&self, node: &RemoteNode) -> Result<()> {
        self.call_value(node, CLICK, &[]).await?;
        self.after_action().await;
        Ok(())
    }

    async fn select_option(&self, select: &RemoteNode, value: &str) -> Result<()> {
        let selected = self.call_value(select, SELECT_OPTION, &[json!(value)]).await?;
        if selected.as_bool() != Some(true) {
            return Err(Error::NotFound(format!("option with value '{}'", value)));
        }
        self.after_action().await;
        Ok(())
    }

    async fn has_content_frame(&self, iframe: &RemoteNode) -> Result<bool> {
        let v = self.call_value(iframe, HAS_CONTENT_FRAME, &[]).await?;
        Ok(v.as_bool().unwrap_or(false))
    }

    async fn wait_for_frame_load(&self, iframe: &RemoteNode, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        loop {
            let state = self.call_value(iframe, FRAME_READY_STATE, &[]).await?;
            if state.as_str() == Some("complete") {
                break;
            }
            if start.elapsed() >= timeout {
                return Err(Error::Timeout(format!(
                    "frame not loaded within {}ms (readyState {})",
                    timeout.as_millis(),
                    state
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        // Same-origin frame requests are reported on this target's Network domain
        let remaining = timeout.saturating_sub(start.elapsed());
        self.network.wait_for_idle(remaining).await
    }

    async fn screenshot_in_frame(&self, iframe: &RemoteNode, selector: &str, timeout: Duration) -> Result<Vec<u8>> {
        let rect = self.call_value(iframe, FRAME_ELEMENT_RECT, &[json!(selector)]).await?;
        let clip = Clip::from_value(&rect)?;
        self.capture(Some(clip), timeout).await
    }

    async fn screenshot_node(&self, node: &RemoteNode, timeout: Duration) -> Result<Vec<u8>> {
        let rect = self.call_value(node, ELEMENT_RECT, &[]).await?;
        let clip = Clip::from_value(&rect)?;
        self.capture(Some(clip), timeout).await
    }
}

/// Run `check` every `interval` until it reports true or `timeout` passes.
/// Browser errors (a context torn down by navigation, say) count as "not yet".
async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, check: F) -> Result<bool>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    loop {
        match check().await {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(Error::Browser(msg)) => debug!(error = %msg, "Page not readable yet"),
            Err(e) => return Err(e),
        }
        if start.elapsed() >= timeout {
            return Ok(false);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Lowercase with whitespace runs collapsed to single spaces.
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Expression that is true once `selector` matches, and when `text` is given,
/// once a match contains it ignoring case and whitespace layout.
fn selector_check_js(selector: &str, text: Option<&str>) -> String {
    match text {
        None => format!("document.querySelector({}) !== null", js_string(selector)),
        Some(t) => format!(
            "Array.from(document.querySelectorAll({})).some(e => (e.textContent || '').replace(/\\s+/g, ' ').trim().toLowerCase().includes({}))",
            js_string(selector),
            js_string(&normalize_text(t)),
        ),
    }
}

fn current_history_url(history: &Value) -> Option<String> {
    let index = history.get("currentIndex")?.as_u64()? as usize;
    history
        .get("entries")?
        .get(index)?
        .get("url")?
        .as_str()
        .map(str::to_string)
}

fn decode_png(data: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| Error::Browser(format!("screenshot base64 decode: {}", e)))
}
