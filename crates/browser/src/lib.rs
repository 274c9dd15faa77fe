//! Browser automation over the Chrome DevTools Protocol.
//!
//! - `cdp`: WebSocket client correlating commands with responses and fanning out events
//! - `session`: launching a Chromium-family browser and attaching to its page target
//! - `network`: in-flight request tracking for network-idle waits
//! - `driver`: the `PageDriver` seam the scraper is written against
//! - `page`: `CdpPage`, the CDP-backed `PageDriver`

pub mod cdp;
pub mod driver;
pub mod network;
pub mod page;
pub mod session;

pub use driver::PageDriver;
pub use page::{CdpPage, RemoteNode};
pub use session::{find_browser_binary, list_available_browsers, BrowserEngine, BrowserSession};
