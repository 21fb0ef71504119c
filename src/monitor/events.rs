use serde::Serialize;
use tokio::sync::broadcast;

use crate::alerts::AlarmTrigger;
use crate::camera::AcquisitionError;
use crate::models::{ChannelState, IndicatorSnapshot};

const EVENT_CAPACITY: usize = 256;

/// What the operator is told, grouped the way the dashboard groups its banners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "category")]
pub enum NoticeKind {
    Transport,
    Device(AcquisitionError),
    Payload,
    Playback,
    Render,
    Completed,
    ConnectionClosed,
}

impl NoticeKind {
    /// Error banners, as opposed to informational ones.
    pub fn is_error(&self) -> bool {
        !matches!(self, NoticeKind::Completed | NoticeKind::ConnectionClosed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CloseReason {
    /// The operator closed the view or opened another session.
    Cancelled,
    /// The service reported an error or the transport failed.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "payload")]
pub enum MonitorEvent {
    SnapshotUpdated(IndicatorSnapshot),
    ChannelStateChanged(ChannelState),
    AlarmFired { trigger: AlarmTrigger },
    FramePainted,
    Notice(Notice),
    SessionClosed { reason: CloseReason },
}

/// Fan-out of monitor events. Emitting with no subscribers is not an error.
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<MonitorEvent>,
}

impl EventEmitter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, event: MonitorEvent) {
        let _ = self.tx.send(event);
    }

    pub fn notice(&self, kind: NoticeKind, message: impl Into<String>) {
        self.emit(MonitorEvent::Notice(Notice::new(kind, message)));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
