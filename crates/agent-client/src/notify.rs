//! # Incoming Call Notification
//!
//! Alerts the agent over four independent channels while a call is ringing:
//!
//! - **Ringtone**: a 440/480 Hz dual tone, one second on, two seconds off
//! - **Desktop notification**: persistent until clicked, only with permission
//! - **Title flash**: alternates the window title every 800ms
//! - **In-page banner**: always shown, the fallback when the others are blocked
//!
//! Each channel talks to the host through a small trait so the same
//! notifier drives a browser shell, a desktop app, or a headless bot. A
//! failure in one channel is logged and never stops the others.
//!
//! [`IncomingCallNotifier::start_ringing`] is idempotent and
//! [`IncomingCallNotifier::stop_ringing`] is safe to call when nothing rings.

use crate::config::NotificationConfig;
use crate::error::{ClientError, ClientResult};
use greeter_infra_common::protocol::{CallIncomingPayload, RequestId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// One ring of the ringtone.
#[derive(Debug, Clone, PartialEq)]
pub struct RingTone {
    pub frequencies_hz: Vec<f32>,
    pub duration: Duration,
    pub volume: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPermission {
    Granted,
    Denied,
    /// The user has not been asked yet
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopNotification {
    pub title: String,
    pub body: String,
    /// Replaces any earlier notification with the same tag
    pub tag: String,
    pub require_interaction: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerContent {
    pub request_id: RequestId,
    pub headline: String,
    pub page_url: String,
}

pub trait RingtonePlayer: Send + Sync {
    fn play(&self, tone: &RingTone) -> ClientResult<()>;
    fn stop(&self);
}

pub trait DesktopNotifier: Send + Sync {
    fn permission(&self) -> NotificationPermission;
    fn request_permission(&self) -> NotificationPermission;
    fn show(&self, notification: &DesktopNotification) -> ClientResult<()>;
    fn close(&self, tag: &str);
}

pub trait TitleBar: Send + Sync {
    fn title(&self) -> String;
    fn set_title(&self, title: &str);
}

pub trait CallBanner: Send + Sync {
    fn show(&self, content: &BannerContent) -> ClientResult<()>;
    fn hide(&self);
}

pub trait WindowFocus: Send + Sync {
    fn focus(&self);
}

/// The host surfaces the notifier drives.
#[derive(Clone)]
pub struct NotificationSurfaces {
    pub ringtone: Arc<dyn RingtonePlayer>,
    pub desktop: Arc<dyn DesktopNotifier>,
    pub title: Arc<dyn TitleBar>,
    pub banner: Arc<dyn CallBanner>,
    pub window: Arc<dyn WindowFocus>,
}

impl NotificationSurfaces {
    /// Surfaces that only log, for hosts without a UI.
    pub fn headless() -> Self {
        let surface = Arc::new(HeadlessSurface::default());
        Self {
            ringtone: surface.clone(),
            desktop: surface.clone(),
            title: surface.clone(),
            banner: surface.clone(),
            window: surface,
        }
    }
}

/// Logs every alert through `tracing` and keeps the title in memory.
#[derive(Debug)]
pub struct HeadlessSurface {
    title: Mutex<String>,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self {
            title: Mutex::new("Greeter".to_string()),
        }
    }
}

impl RingtonePlayer for HeadlessSurface {
    fn play(&self, tone: &RingTone) -> ClientResult<()> {
        debug!(frequencies = ?tone.frequencies_hz, "🔔 ring");
        Ok(())
    }

    fn stop(&self) {}
}

impl DesktopNotifier for HeadlessSurface {
    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Denied
    }

    fn request_permission(&self) -> NotificationPermission {
        NotificationPermission::Denied
    }

    fn show(&self, _notification: &DesktopNotification) -> ClientResult<()> {
        Err(ClientError::PermissionDenied)
    }

    fn close(&self, _tag: &str) {}
}

impl TitleBar for HeadlessSurface {
    fn title(&self) -> String {
        self.title.lock().clone()
    }

    fn set_title(&self, title: &str) {
        *self.title.lock() = title.to_string();
    }
}

impl CallBanner for HeadlessSurface {
    fn show(&self, content: &BannerContent) -> ClientResult<()> {
        info!(request_id = %content.request_id, "{}", content.headline);
        Ok(())
    }

    fn hide(&self) {}
}

impl WindowFocus for HeadlessSurface {
    fn focus(&self) {}
}

struct RingingSession {
    request_id: RequestId,
    original_title: String,
    ring_task: JoinHandle<()>,
    title_task: JoinHandle<()>,
}

enum NotifierState {
    Idle,
    Ringing(RingingSession),
}

pub struct IncomingCallNotifier {
    surfaces: NotificationSurfaces,
    config: NotificationConfig,
    state: Mutex<NotifierState>,
    rings: Arc<AtomicU64>,
}

impl IncomingCallNotifier {
    pub fn new(surfaces: NotificationSurfaces, config: NotificationConfig) -> Self {
        Self {
            surfaces,
            config,
            state: Mutex::new(NotifierState::Idle),
            rings: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_ringing(&self) -> bool {
        matches!(*self.state.lock(), NotifierState::Ringing(_))
    }

    pub fn ringing_request(&self) -> Option<RequestId> {
        match &*self.state.lock() {
            NotifierState::Ringing(session) => Some(session.request_id.clone()),
            NotifierState::Idle => None,
        }
    }

    /// Total rings played since creation.
    pub fn ring_count(&self) -> u64 {
        self.rings.load(Ordering::Relaxed)
    }

    /// Ask the host for desktop notification permission if it has not
    /// decided yet.
    pub fn request_permission(&self) -> NotificationPermission {
        match self.surfaces.desktop.permission() {
            NotificationPermission::Default => self.surfaces.desktop.request_permission(),
            decided => decided,
        }
    }

    /// Start every alert channel for `call`. Returns `false` if already
    /// ringing, in which case nothing changes.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_ringing(&self, call: &CallIncomingPayload) -> bool {
        let mut state = self.state.lock();
        if let NotifierState::Ringing(session) = &*state {
            debug!(
                ringing = %session.request_id,
                requested = %call.request.request_id,
                "Already ringing"
            );
            return false;
        }

        info!(request_id = %call.request.request_id, page_url = %call.visitor.page_url, "🔔 Incoming call, ringing");

        let original_title = self.surfaces.title.title();
        let ring_task = self.spawn_ringtone();
        let title_task = self.spawn_title_flash();
        self.show_desktop_notification(call);
        self.show_banner(call);

        *state = NotifierState::Ringing(RingingSession {
            request_id: call.request.request_id.clone(),
            original_title,
            ring_task,
            title_task,
        });
        true
    }

    /// Tear down every alert channel. Returns `false` if nothing was ringing.
    pub fn stop_ringing(&self) -> bool {
        let previous = std::mem::replace(&mut *self.state.lock(), NotifierState::Idle);
        let NotifierState::Ringing(session) = previous else {
            return false;
        };

        session.ring_task.abort();
        session.title_task.abort();
        self.surfaces.ringtone.stop();
        self.surfaces.title.set_title(&session.original_title);
        self.surfaces.banner.hide();
        self.surfaces.desktop.close(&self.config.notification_tag);

        info!(request_id = %session.request_id, "🔕 Stopped ringing");
        true
    }

    /// The agent clicked the desktop notification.
    pub fn on_notification_clicked(&self) {
        self.surfaces.window.focus();
        self.surfaces.desktop.close(&self.config.notification_tag);
    }

    /// The agent clicked the in-page banner.
    pub fn on_banner_clicked(&self) {
        self.surfaces.window.focus();
        self.surfaces.banner.hide();
    }

    fn spawn_ringtone(&self) -> JoinHandle<()> {
        let player = self.surfaces.ringtone.clone();
        let rings = self.rings.clone();
        let tone = RingTone {
            frequencies_hz: self.config.ring_frequencies_hz.clone(),
            duration: self.config.ring_duration(),
            volume: self.config.ring_volume,
        };
        let mut ticker = interval(self.config.ring_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::spawn(async move {
            loop {
                ticker.tick().await;
                rings.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = player.play(&tone) {
                    warn!(error = %e, "Ringtone failed");
                }
            }
        })
    }

    fn spawn_title_flash(&self) -> JoinHandle<()> {
        let title = self.surfaces.title.clone();
        let frames = self.config.title_frames.clone();
        let mut ticker = interval(self.config.title_flash_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::spawn(async move {
            let mut frame = 0usize;
            loop {
                ticker.tick().await;
                if let Some(text) = frames.get(frame % frames.len().max(1)) {
                    title.set_title(text);
                }
                frame = frame.wrapping_add(1);
            }
        })
    }

    fn show_desktop_notification(&self, call: &CallIncomingPayload) {
        if self.surfaces.desktop.permission() != NotificationPermission::Granted {
            debug!("Desktop notifications not permitted, relying on banner");
            return;
        }
        let notification = DesktopNotification {
            title: self.config.notification_title.clone(),
            body: format!("Visitor from {} wants to connect", call.visitor.page_url),
            tag: self.config.notification_tag.clone(),
            require_interaction: true,
        };
        if let Err(e) = self.surfaces.desktop.show(&notification) {
            warn!(error = %e, "Desktop notification failed");
        }
    }

    fn show_banner(&self, call: &CallIncomingPayload) {
        let content = BannerContent {
            request_id: call.request.request_id.clone(),
            headline: self.config.notification_title.clone(),
            page_url: call.visitor.page_url.clone(),
        };
        if let Err(e) = self.surfaces.banner.show(&content) {
            warn!(error = %e, "Call banner failed");
        }
    }
}

impl Drop for IncomingCallNotifier {
    fn drop(&mut self) {
        self.stop_ringing();
    }
}
