//! In-memory [`PageDriver`] for pipeline tests.
//!
//! The fake DOM only answers the selectors from `Config::default()`; each
//! listing section is built from a [`ComponentSpec`].

use async_trait::async_trait;
use blockharvest_browser::PageDriver;
use blockharvest_core::config::{SelectorConfig, SiteConfig};
use blockharvest_core::{Config, Error, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Variant {
    pub value: String,
    pub label: String,
    pub code: Option<String>,
    /// Selecting this option errors.
    pub fails: bool,
}

impl Variant {
    pub fn new(value: &str, label: &str, code: &str) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            code: Some(code.into()),
            fails: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FrameSpec {
    pub reachable: bool,
    pub loads: bool,
    pub body_shot: bool,
    pub element_shot: bool,
}

impl Default for FrameSpec {
    fn default() -> Self {
        Self {
            reachable: true,
            loads: true,
            body_shot: true,
            element_shot: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComponentSpec {
    pub breadcrumb: Option<Vec<String>>,
    pub breadcrumb_tag: &'static str,
    pub heading: Option<String>,
    pub tablist: bool,
    pub tablist_errors: bool,
    pub code_tab: bool,
    pub preview_panel: bool,
    pub frame: Option<FrameSpec>,
    pub code_panel: bool,
    pub code_block: bool,
    pub variants: Vec<Variant>,
}

impl ComponentSpec {
    pub fn complete(name: &str, links: &[&str]) -> Self {
        Self {
            breadcrumb: Some(links.iter().map(|l| l.to_string()).collect()),
            breadcrumb_tag: "nav",
            heading: Some(name.into()),
            tablist: true,
            tablist_errors: false,
            code_tab: true,
            preview_panel: true,
            frame: Some(FrameSpec::default()),
            code_panel: true,
            code_block: true,
            variants: vec![
                Variant::new("html", "HTML", "<div>html</div>"),
                Variant::new("react", "React", "export default function Example() {}"),
                Variant::new("vue", "Vue", "<template></template>"),
            ],
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
enum Role {
    #[default]
    Plain,
    Broken,
    Select,
    CodeBlock,
    Iframe(FrameSpec),
}

#[derive(Debug, Default)]
struct FakeNode {
    tag: String,
    text: Option<String>,
    value: String,
    prev: Option<usize>,
    children: HashMap<String, Vec<usize>>,
    role: Role,
    component: usize,
}

#[derive(Debug, Default)]
struct State {
    selected: HashMap<usize, String>,
    current_url: String,
    url_polls_left: Option<usize>,
    url_errors: usize,
    ready: bool,
    network_busy: bool,
    gotos: Vec<String>,
    fills: Vec<(String, String)>,
    current_scope: Option<String>,
    begun: Vec<String>,
    released: Vec<String>,
}

pub struct FakePage {
    site: SiteConfig,
    nodes: Vec<FakeNode>,
    sections: Vec<usize>,
    variants: Vec<Vec<Variant>>,
    state: Mutex<State>,
}

impl FakePage {
    pub const PAGE_PNG: &'static [u8] = b"page-png";
    pub const BODY_PNG: &'static [u8] = b"body-png";
    pub const ELEMENT_PNG: &'static [u8] = b"element-png";
    pub const SIGNED_IN_URL: &'static str = "https://fake.test/dashboard";

    pub fn with_components(specs: Vec<ComponentSpec>) -> Self {
        let config = Config::default();
        let mut page = Self {
            site: config.site,
            nodes: Vec::new(),
            sections: Vec::new(),
            variants: Vec::new(),
            state: Mutex::new(State {
                ready: true,
                ..State::default()
            }),
        };
        for (component, spec) in specs.into_iter().enumerate() {
            page.build(&config.selectors, component, spec);
        }
        page
    }

    fn add(&mut self, component: usize, tag: &str) -> usize {
        self.nodes.push(FakeNode {
            tag: tag.into(),
            component,
            ..FakeNode::default()
        });
        self.nodes.len() - 1
    }

    fn attach(&mut self, parent: usize, selector: &str, child: usize) {
        self.nodes[parent]
            .children
            .entry(selector.to_string())
            .or_default()
            .push(child);
    }

    fn build(&mut self, sel: &SelectorConfig, c: usize, spec: ComponentSpec) {
        let section = self.add(c, "section");
        self.sections.push(section);

        if let Some(links) = &spec.breadcrumb {
            let nav = self.add(c, spec.breadcrumb_tag);
            for text in links {
                let link = self.add(c, "a");
                self.nodes[link].text = Some(text.clone());
                self.attach(nav, &sel.breadcrumb_link, link);
            }
            self.nodes[section].prev = Some(nav);
        }

        if let Some(name) = &spec.heading {
            let h2 = self.add(c, "h2");
            self.nodes[h2].text = Some(format!("  {}\n", name));
            self.attach(section, &sel.heading, h2);
        }

        if spec.tablist {
            let tablist = self.add(c, "div");
            if spec.tablist_errors {
                self.nodes[tablist].role = Role::Broken;
            }
            let preview_tab = self.add(c, "button");
            self.attach(tablist, &sel.preview_tab, preview_tab);
            if spec.code_tab {
                let code_tab = self.add(c, "button");
                self.attach(tablist, &sel.code_tab, code_tab);
            }
            self.attach(section, &sel.tablist, tablist);
        }

        if spec.preview_panel {
            let panel = self.add(c, "div");
            if let Some(frame) = spec.frame {
                let iframe = self.add(c, "iframe");
                self.nodes[iframe].role = Role::Iframe(frame);
                self.attach(panel, &sel.iframe, iframe);
            }
            self.attach(section, &sel.preview_panel, panel);
        }

        if spec.code_panel {
            let panel = self.add(c, "div");
            let select = self.add(c, "select");
            self.nodes[select].role = Role::Select;
            for variant in &spec.variants {
                let option = self.add(c, "option");
                self.nodes[option].value = variant.value.clone();
                self.nodes[option].text = Some(variant.label.clone());
                self.attach(select, &sel.language_option, option);
            }
            self.attach(panel, &sel.language_select, select);
            if spec.code_block {
                let pre = self.add(c, "pre");
                self.nodes[pre].role = Role::CodeBlock;
                self.attach(panel, &sel.code_block, pre);
            }
            self.attach(section, &sel.code_panel, panel);
        }

        if let Some(first) = spec.variants.first() {
            self.state
                .get_mut()
                .unwrap()
                .selected
                .insert(c, first.value.clone());
        }
        self.variants.push(spec.variants);
    }

    fn node(&self, id: usize) -> Result<&FakeNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("node {}", id)))
    }

    fn children(&self, id: usize, selector: &str) -> Result<Vec<usize>> {
        let node = self.node(id)?;
        if matches!(node.role, Role::Broken) {
            return Err(Error::Browser("Execution context was destroyed".into()));
        }
        Ok(node.children.get(selector).cloned().unwrap_or_default())
    }

    fn frame(&self, id: usize) -> Result<FrameSpec> {
        match self.node(id)?.role {
            Role::Iframe(frame) => Ok(frame),
            _ => Err(Error::Browser(format!("node {} is not an iframe", id))),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().unwrap().ready = ready;
    }

    /// Network-idle waits time out from now on.
    pub fn set_network_busy(&self, busy: bool) {
        self.state.lock().unwrap().network_busy = busy;
    }

    /// `url()` reports the current page `polls` times, then a signed-in URL.
    pub fn leave_login_after_polls(&self, polls: usize) {
        self.state.lock().unwrap().url_polls_left = Some(polls);
    }

    /// The next `count` calls to `url()` fail as they do mid-navigation.
    pub fn fail_url_reads(&self, count: usize) {
        self.state.lock().unwrap().url_errors = count;
    }

    pub fn gotos(&self) -> Vec<String> {
        self.state.lock().unwrap().gotos.clone()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().fills.clone()
    }

    pub fn begun_scopes(&self) -> Vec<String> {
        self.state.lock().unwrap().begun.clone()
    }

    pub fn released_scopes(&self) -> Vec<String> {
        self.state.lock().unwrap().released.clone()
    }
}

#[async_trait]
impl PageDriver for FakePage {
    type Node = usize;

    async fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.gotos.push(url.to_string());
        state.current_url = url.to_string();
        if state.url_polls_left == Some(0) {
            state.url_polls_left = None;
        }
        Ok(())
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<()> {
        if self.state.lock().unwrap().network_busy {
            return Err(Error::Timeout(format!("network busy after {:?}", timeout)));
        }
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, _text: Option<&str>, timeout: Duration) -> Result<()> {
        let ready = self.state.lock().unwrap().ready;
        if !ready && selector == self.site.ready_selector {
            return Err(Error::Timeout(format!("'{}' not found within {:?}", selector, timeout)));
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .fills
            .push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn click_selector(&self, _selector: &str) -> Result<()> {
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if state.url_errors > 0 {
            state.url_errors -= 1;
            return Err(Error::Browser("Execution context was destroyed".into()));
        }
        match state.url_polls_left {
            Some(0) => Ok(Self::SIGNED_IN_URL.to_string()),
            Some(n) => {
                if n != usize::MAX {
                    state.url_polls_left = Some(n - 1);
                }
                Ok(state.current_url.clone())
            }
            None => Ok(state.current_url.clone()),
        }
    }

    async fn title(&self) -> Result<String> {
        Ok("Tailwind Plus".into())
    }

    async fn content(&self) -> Result<String> {
        Ok("<html><body>listing</body></html>".into())
    }

    async fn screenshot_page(&self, _full_page: bool) -> Result<Vec<u8>> {
        Ok(Self::PAGE_PNG.to_vec())
    }

    async fn pause(&self, _duration: Duration) {}

    async fn begin_scope(&mut self, name: &str) {
        let state = self.state.get_mut().unwrap();
        state.current_scope = Some(name.to_string());
        state.begun.push(name.to_string());
    }

    async fn release_scope(&mut self) -> Result<()> {
        let state = self.state.get_mut().unwrap();
        let scope = state
            .current_scope
            .take()
            .unwrap_or_else(|| "default".to_string());
        state.released.push(scope);
        Ok(())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<usize>> {
        if selector == Config::default().selectors.section {
            Ok(self.sections.clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn query(&self, node: &usize, selector: &str) -> Result<Option<usize>> {
        Ok(self.children(*node, selector)?.first().copied())
    }

    async fn query_all_in(&self, node: &usize, selector: &str) -> Result<Vec<usize>> {
        self.children(*node, selector)
    }

    async fn previous_sibling(&self, node: &usize) -> Result<Option<usize>> {
        Ok(self.node(*node)?.prev)
    }

    async fn tag_name(&self, node: &usize) -> Result<String> {
        Ok(self.node(*node)?.tag.to_lowercase())
    }

    async fn text_content(&self, node: &usize) -> Result<Option<String>> {
        let n = self.node(*node)?;
        if !matches!(n.role, Role::CodeBlock) {
            return Ok(n.text.clone());
        }
        let state = self.state.lock().unwrap();
        let selected = state.selected.get(&n.component);
        Ok(self.variants[n.component]
            .iter()
            .find(|v| Some(&v.value) == selected)
            .and_then(|v| v.code.clone()))
    }

    async fn option_value(&self, node: &usize) -> Result<String> {
        Ok(self.node(*node)?.value.clone())
    }

    async fn click(&self, node: &usize) -> Result<()> {
        self.node(*node).map(|_| ())
    }

    async fn select_option(&self, select: &usize, value: &str) -> Result<()> {
        let n = self.node(*select)?;
        if !matches!(n.role, Role::Select) {
            return Err(Error::Browser("not a <select>".into()));
        }
        let variant = self.variants[n.component]
            .iter()
            .find(|v| v.value == value)
            .ok_or_else(|| Error::NotFound(format!("option '{}'", value)))?;
        if variant.fails {
            return Err(Error::Browser(format!("selecting '{}' failed", value)));
        }
        self.state
            .lock()
            .unwrap()
            .selected
            .insert(n.component, value.to_string());
        Ok(())
    }

    async fn has_content_frame(&self, iframe: &usize) -> Result<bool> {
        Ok(self.frame(*iframe)?.reachable)
    }

    async fn wait_for_frame_load(&self, iframe: &usize, timeout: Duration) -> Result<()> {
        if self.frame(*iframe)?.loads {
            Ok(())
        } else {
            Err(Error::Timeout(format!("frame not loaded within {:?}", timeout)))
        }
    }

    async fn screenshot_in_frame(&self, iframe: &usize, _selector: &str, _timeout: Duration) -> Result<Vec<u8>> {
        if self.frame(*iframe)?.body_shot {
            Ok(Self::BODY_PNG.to_vec())
        } else {
            Err(Error::Browser("frame body has zero size".into()))
        }
    }

    async fn screenshot_node(&self, node: &usize, _timeout: Duration) -> Result<Vec<u8>> {
        match self.node(*node)?.role {
            Role::Iframe(frame) if frame.element_shot => Ok(Self::ELEMENT_PNG.to_vec()),
            _ => Err(Error::Browser("element not visible".into())),
        }
    }
}
