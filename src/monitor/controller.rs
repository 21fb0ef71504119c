use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::audio::AlarmSink;
use crate::camera::{CameraAdapter, VideoDeviceBackend};
use crate::channel::{AnalysisEndpoint, ChannelConnector};
use crate::models::{ChannelState, IndicatorSnapshot, SessionInfo, SessionMode, User};
use crate::render::FrameRenderer;
use crate::settings::MalformedPayloadPolicy;

use super::events::{EventEmitter, MonitorEvent, NoticeKind};
use super::session::SessionRuntime;
use super::state::{SessionPublisher, SessionView};

struct ActiveSession {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Owns at most one monitoring session at a time.
pub struct MonitorController {
    endpoint: AnalysisEndpoint,
    connector: Arc<dyn ChannelConnector>,
    alarm: Arc<dyn AlarmSink>,
    camera: CameraAdapter,
    renderer: Arc<Mutex<FrameRenderer>>,
    policy: MalformedPayloadPolicy,
    publisher: SessionPublisher,
    active: Option<ActiveSession>,
}

impl MonitorController {
    pub fn new(
        endpoint: AnalysisEndpoint,
        connector: Arc<dyn ChannelConnector>,
        alarm: Arc<dyn AlarmSink>,
        cameras: Arc<dyn VideoDeviceBackend>,
        renderer: FrameRenderer,
        policy: MalformedPayloadPolicy,
    ) -> Self {
        let camera = CameraAdapter::new(cameras, endpoint.is_secure_context());
        Self {
            endpoint,
            connector,
            alarm,
            camera,
            renderer: Arc::new(Mutex::new(renderer)),
            policy,
            publisher: SessionPublisher::new(EventEmitter::new()),
            active: None,
        }
    }

    /// Replaces any running session with a fresh one for `subject`.
    ///
    /// On failure the operator has already been notified through a notice and
    /// no session is left running.
    pub async fn open_session(&mut self, subject: User, mode: SessionMode) -> Result<SessionInfo> {
        self.close_session().await?;

        let session = SessionInfo::new(subject, mode);
        info!(
            "opening {} session {} for {}",
            mode.as_str(),
            session.id,
            session.subject.username
        );
        self.publisher.begin(session.clone());
        let events = self.publisher.events();

        if mode == SessionMode::Realtime {
            if let Err(err) = self.camera.acquire().await {
                self.publisher.set_channel_state(ChannelState::Failed);
                events.notice(NoticeKind::Device(err.clone()), err.to_string());
                return Err(err).context("camera unavailable");
            }
        }

        self.publisher.set_channel_state(ChannelState::Connecting);
        let url = self.endpoint.url_for(session.subject.id, mode);
        let channel = match self.connector.connect(url).await {
            Ok(channel) => channel,
            Err(err) => {
                self.publisher.set_channel_state(ChannelState::Failed);
                events.notice(NoticeKind::Transport, err.to_string());
                return Err(err).context("analysis channel unavailable");
            }
        };
        self.publisher.set_channel_state(ChannelState::Open);

        let runtime = SessionRuntime::new(
            channel,
            Arc::clone(&self.alarm),
            Arc::clone(&self.renderer),
            self.policy,
            self.publisher.clone(),
        );
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(runtime.run(cancel_token.clone()));
        self.active = Some(ActiveSession {
            handle,
            cancel_token,
        });

        Ok(self.publisher.view().session.unwrap_or(session))
    }

    /// Stops the session task, channel and sentinel and silences the alarm.
    /// Closing with nothing open is a no-op.
    pub async fn close_session(&mut self) -> Result<()> {
        if let Some(active) = self.active.take() {
            active.cancel_token.cancel();
            active
                .handle
                .await
                .context("session task failed to join")?;
        }
        self.alarm.silence();
        Ok(())
    }

    pub fn snapshot(&self) -> IndicatorSnapshot {
        self.publisher.view().snapshot
    }

    pub fn session(&self) -> Option<SessionInfo> {
        self.publisher.view().session
    }

    pub fn view(&self) -> SessionView {
        self.publisher.view()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.publisher.events().subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.publisher.watch()
    }

    /// True while a session task is alive, including after completion while the
    /// sentinel still watches the final snapshot.
    pub fn is_session_running(&self) -> bool {
        self.active
            .as_ref()
            .map(|active| !active.handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for MonitorController {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel_token.cancel();
        }
        self.alarm.silence();
    }
}
