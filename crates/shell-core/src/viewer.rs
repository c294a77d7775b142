//! Control surface over the embedded PDF viewer
//!
//! The viewer itself is an external document engine. [`ViewerShell`] waits
//! for it to come up and forwards zoom, sidebar, paging and print/download
//! commands.
//!
//! This crate ships no engine. Hosts that embed the viewer implement
//! [`DocumentEngine`] over their engine binding and drive it through
//! [`ViewerShell`]; the cache server itself only serves the viewer's assets.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::error::CoreError;

/// Viewer page served for opened documents
pub const VIEWER_PATH: &str = "/web/viewer.html";

/// Scale setting understood by the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomValue {
    Auto,
    PageWidth,
    PageFit,
    /// Explicit scale, 1.0 = 100%
    Scale(f64),
}

impl FromStr for ZoomValue {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ZoomValue::Auto),
            "page-width" => Ok(ZoomValue::PageWidth),
            "page-fit" => Ok(ZoomValue::PageFit),
            other => match other.parse::<f64>() {
                Ok(scale) if scale.is_finite() && scale > 0.0 => Ok(ZoomValue::Scale(scale)),
                _ => Err(CoreError::InvalidZoom(other.to_string())),
            },
        }
    }
}

impl fmt::Display for ZoomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoomValue::Auto => f.write_str("auto"),
            ZoomValue::PageWidth => f.write_str("page-width"),
            ZoomValue::PageFit => f.write_str("page-fit"),
            ZoomValue::Scale(scale) => write!(f, "{}", scale),
        }
    }
}

/// Sidebar panes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarView {
    Thumbnails,
    Outline,
    Attachments,
    Layers,
}

impl SidebarView {
    /// Numeric view id used by the engine
    pub fn code(&self) -> u8 {
        match self {
            SidebarView::Thumbnails => 1,
            SidebarView::Outline => 2,
            SidebarView::Attachments => 3,
            SidebarView::Layers => 4,
        }
    }
}

/// Toolbar actions triggered on the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineAction {
    Print,
    Download,
}

impl EngineAction {
    /// Id of the toolbar control that performs the action
    pub fn control_id(&self) -> &'static str {
        match self {
            EngineAction::Print => "print",
            EngineAction::Download => "download",
        }
    }
}

/// The embedded document engine
#[async_trait]
pub trait DocumentEngine: Send + Sync {
    /// Whether the engine finished initializing
    async fn is_ready(&self) -> bool;

    async fn set_scale(&self, zoom: ZoomValue) -> Result<(), CoreError>;

    async fn sidebar_is_open(&self) -> bool;

    async fn open_sidebar(&self) -> Result<(), CoreError>;

    async fn close_sidebar(&self) -> Result<(), CoreError>;

    async fn switch_sidebar_view(&self, view: SidebarView) -> Result<(), CoreError>;

    /// Current page, 1-based
    async fn page(&self) -> u32;

    async fn set_page(&self, page: u32) -> Result<(), CoreError>;

    async fn page_count(&self) -> u32;

    async fn trigger(&self, action: EngineAction) -> Result<(), CoreError>;
}

/// Polling schedule used while the engine has no readiness signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub initial_delay: Duration,
    /// Upper bound of the doubling delay
    pub max_delay: Duration,
    /// Give up after this long
    pub timeout: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Commands over a [`DocumentEngine`], each issued once the engine is ready
pub struct ViewerShell {
    engine: Arc<dyn DocumentEngine>,
    policy: ReadinessPolicy,
}

impl ViewerShell {
    pub fn new(engine: Arc<dyn DocumentEngine>) -> Self {
        Self::with_policy(engine, ReadinessPolicy::default())
    }

    pub fn with_policy(engine: Arc<dyn DocumentEngine>, policy: ReadinessPolicy) -> Self {
        Self { engine, policy }
    }

    /// Poll the engine with exponential backoff until it reports ready
    pub async fn wait_ready(&self) -> Result<(), CoreError> {
        let started = Instant::now();
        let mut delay = self.policy.initial_delay;

        loop {
            if self.engine.is_ready().await {
                return Ok(());
            }

            let elapsed = started.elapsed();
            if elapsed >= self.policy.timeout {
                warn!("Document engine not ready after {:?}", elapsed);
                return Err(CoreError::CollaboratorUnavailable(self.policy.timeout));
            }

            sleep(delay.min(self.policy.timeout - elapsed)).await;
            delay = (delay * 2).min(self.policy.max_delay);
        }
    }

    pub async fn set_zoom(&self, zoom: ZoomValue) -> Result<(), CoreError> {
        self.wait_ready().await?;
        debug!("Setting zoom to {}", zoom);
        self.engine.set_scale(zoom).await
    }

    /// Close the sidebar if open, otherwise open it on the thumbnail view
    pub async fn toggle_thumbnails(&self) -> Result<(), CoreError> {
        self.wait_ready().await?;

        if self.engine.sidebar_is_open().await {
            self.engine.close_sidebar().await
        } else {
            self.engine.open_sidebar().await?;
            self.engine
                .switch_sidebar_view(SidebarView::Thumbnails)
                .await
        }
    }

    /// Advance one page, stopping at the last. Returns the new page.
    pub async fn next_page(&self) -> Result<u32, CoreError> {
        self.wait_ready().await?;
        let last = self.engine.page_count().await.max(1);
        let page = (self.engine.page().await + 1).clamp(1, last);
        self.engine.set_page(page).await?;
        Ok(page)
    }

    /// Go back one page, stopping at the first. Returns the new page.
    pub async fn prev_page(&self) -> Result<u32, CoreError> {
        self.wait_ready().await?;
        let last = self.engine.page_count().await.max(1);
        let page = self.engine.page().await.saturating_sub(1).clamp(1, last);
        self.engine.set_page(page).await?;
        Ok(page)
    }

    pub async fn print(&self) -> Result<(), CoreError> {
        self.wait_ready().await?;
        self.engine.trigger(EngineAction::Print).await
    }

    pub async fn download(&self) -> Result<(), CoreError> {
        self.wait_ready().await?;
        self.engine.trigger(EngineAction::Download).await
    }

    /// Narrow-screen layout: no sidebar, fit to width
    pub async fn apply_mobile_defaults(&self) -> Result<(), CoreError> {
        self.wait_ready().await?;
        self.engine.close_sidebar().await?;
        self.engine.set_scale(ZoomValue::PageWidth).await
    }
}

/// Viewer location that opens `file`, fitted to the page width
pub fn viewer_url(file: Option<&str>) -> String {
    match file.filter(|f| !f.is_empty()) {
        Some(file) => {
            let query = form_urlencoded::Serializer::new(String::new())
                .append_pair("file", file)
                .finish();
            format!("{}?{}#zoom={}", VIEWER_PATH, query, ZoomValue::PageWidth)
        }
        None => format!("{}#zoom={}", VIEWER_PATH, ZoomValue::PageWidth),
    }
}
