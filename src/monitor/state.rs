use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::models::{ChannelState, IndicatorSnapshot, SessionInfo};

use super::events::{EventEmitter, MonitorEvent};

/// What an observer of the monitor sees at any instant.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session: Option<SessionInfo>,
    pub snapshot: IndicatorSnapshot,
}

impl SessionView {
    pub fn opening(session: SessionInfo) -> Self {
        Self {
            session: Some(session),
            snapshot: IndicatorSnapshot::zero(),
        }
    }

    pub fn channel_state(&self) -> ChannelState {
        self.session
            .as_ref()
            .map(|session| session.channel_state)
            .unwrap_or_default()
    }
}

/// Writes the view and announces each change. Only the controller and the
/// running session task hold one.
#[derive(Clone)]
pub(crate) struct SessionPublisher {
    view: Arc<watch::Sender<SessionView>>,
    events: EventEmitter,
}

impl SessionPublisher {
    pub(crate) fn new(events: EventEmitter) -> Self {
        let (view, _) = watch::channel(SessionView::default());
        Self {
            view: Arc::new(view),
            events,
        }
    }

    pub(crate) fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub(crate) fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.subscribe()
    }

    pub(crate) fn begin(&self, session: SessionInfo) {
        self.view.send_replace(SessionView::opening(session));
        self.events
            .emit(MonitorEvent::SnapshotUpdated(IndicatorSnapshot::zero()));
    }

    pub(crate) fn set_snapshot(&self, snapshot: IndicatorSnapshot) {
        self.view.send_modify(|view| view.snapshot = snapshot);
        self.events.emit(MonitorEvent::SnapshotUpdated(snapshot));
    }

    pub(crate) fn set_channel_state(&self, state: ChannelState) {
        let mut changed = false;
        self.view.send_modify(|view| {
            if let Some(session) = view.session.as_mut() {
                changed = session.channel_state != state;
                session.channel_state = state;
            }
        });
        if changed {
            self.events.emit(MonitorEvent::ChannelStateChanged(state));
        }
    }
}
