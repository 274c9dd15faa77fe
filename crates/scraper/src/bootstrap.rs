//! Authenticate and bring the listing page to a ready state.

use blockharvest_browser::PageDriver;
use blockharvest_core::config::{Credentials, EMAIL_ENV, PASSWORD_ENV};
use blockharvest_core::{AuthMode, Config, Error, Result};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::store::ArtifactStore;

pub const DEBUG_BEFORE_WAIT: &str = "debug-before-wait.png";
pub const DEBUG_LOGIN_ERROR: &str = "debug-login-error.png";
pub const DEBUG_PAGE_HTML: &str = "debug-page.html";

const LOGIN_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How the session gets past the login page.
#[derive(Debug, Clone)]
pub enum Login {
    /// Fill and submit the form.
    Credentials(Credentials),
    /// A person signs in through the visible window.
    Interactive,
}

impl Login {
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::choose(config, Credentials::from_env())
    }

    /// Pick the login flow given whatever credentials the environment offers.
    pub fn choose(config: &Config, available: Option<Credentials>) -> Result<Self> {
        Ok(match config.select_credentials(available)? {
            Some(creds) => Login::Credentials(creds),
            None => {
                if config.auth.mode == AuthMode::Auto {
                    info!(
                        "{} / {} not set; falling back to interactive login",
                        EMAIL_ENV, PASSWORD_ENV
                    );
                }
                Login::Interactive
            }
        })
    }
}

/// Log in, open the listing page and wait for its ready marker.
///
/// Any failure up to the ready marker saves a best-effort screenshot and is
/// reported as [`Error::Login`].
pub async fn bootstrap<D: PageDriver>(
    page: &D,
    config: &Config,
    login: &Login,
    store: &ArtifactStore,
) -> Result<()> {
    if let Err(e) = open_listing(page, config, login, store).await {
        match page.screenshot_page(true).await {
            Ok(png) => match store.write_debug(DEBUG_LOGIN_ERROR, &png) {
                Ok(path) => info!(path = %path.display(), "Saved login error screenshot"),
                Err(err) => warn!(error = %err, "Could not save login error screenshot"),
            },
            Err(err) => warn!(error = %err, "Could not capture login error screenshot"),
        }
        return Err(match e {
            Error::Login(msg) => Error::Login(msg),
            other => Error::Login(other.to_string()),
        });
    }

    let url = page.url().await.unwrap_or_default();
    let title = page.title().await.unwrap_or_default();
    info!(url = %url, title = %title, "Listing page ready");

    match page
        .wait_for_network_idle(Duration::from_millis(config.timeouts.navigation_ms))
        .await
    {
        Ok(()) => {}
        Err(e) if e.is_timeout() => warn!(error = %e, "Network did not go idle on listing page"),
        Err(e) => return Err(e),
    }

    if config.output.dump_page_html {
        let html = page.content().await?;
        let path = store.write_debug(DEBUG_PAGE_HTML, html.as_bytes())?;
        info!(path = %path.display(), "Saved listing page HTML");
    }
    Ok(())
}

async fn open_listing<D: PageDriver>(
    page: &D,
    config: &Config,
    login: &Login,
    store: &ArtifactStore,
) -> Result<()> {
    let site = &config.site;
    let timeouts = &config.timeouts;
    let navigation = Duration::from_millis(timeouts.navigation_ms);

    info!(url = %site.login_url, "Opening login page");
    page.goto(&site.login_url, navigation).await?;

    match login {
        Login::Credentials(creds) => {
            let sel = &config.selectors;
            page.wait_for_selector(
                &sel.email_input,
                None,
                Duration::from_millis(timeouts.login_form_ms),
            )
            .await?;
            debug!(email = %creds.email, "Filling login form");
            page.fill(&sel.email_input, &creds.email).await?;
            page.fill(&sel.password_input, &creds.password).await?;
            page.click_selector(&sel.submit_button).await?;
            page.pause(Duration::from_millis(timeouts.post_login_delay_ms))
                .await;
        }
        Login::Interactive => {
            info!("Sign in through the browser window; waiting for the login page to be left");
            wait_until_left(page, &site.login_url, timeouts.ready_marker_ms).await?;
        }
    }

    info!(url = %site.listing_url, "Opening component listing");
    page.goto(&site.listing_url, navigation).await?;
    page.pause(Duration::from_millis(timeouts.post_navigation_delay_ms))
        .await;

    match page.screenshot_page(true).await {
        Ok(png) => {
            if let Err(e) = store.write_debug(DEBUG_BEFORE_WAIT, &png) {
                warn!(error = %e, "Could not save pre-wait screenshot");
            }
        }
        Err(e) => warn!(error = %e, "Could not capture pre-wait screenshot"),
    }

    info!(selector = %site.ready_selector, "Waiting for listing content");
    page.wait_for_selector(
        &site.ready_selector,
        site.ready_text.as_deref(),
        Duration::from_millis(timeouts.ready_marker_ms),
    )
    .await
}

async fn wait_until_left<D: PageDriver>(page: &D, login_url: &str, timeout_ms: u64) -> Result<()> {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        match page.url().await {
            Ok(url) if !url.starts_with(login_url) => return Ok(()),
            Ok(_) => {}
            // Navigations triggered by the login form tear down the page context.
            Err(Error::Browser(msg)) => debug!(error = %msg, "URL not readable yet"),
            Err(e) => return Err(e),
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout(format!(
                "still on the login page after {}ms",
                timeout_ms
            )));
        }
        page.pause(LOGIN_POLL_INTERVAL).await;
    }
}
