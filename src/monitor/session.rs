use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::alerts::{AlarmTrigger, EscalationEngine, PeriodicSentinel};
use crate::audio::AlarmSink;
use crate::channel::{ChannelEvent, ChannelHandle};
use crate::models::{ChannelState, IndicatorReading, IndicatorSnapshot};
use crate::render::{FrameRenderer, PaintOutcome};
use crate::settings::MalformedPayloadPolicy;

use super::events::{CloseReason, MonitorEvent, NoticeKind};
use super::state::SessionPublisher;

// Set to false to silence per-session lifecycle logging
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const MSG_COMPLETED: &str = "Analysis completed. The last indicators remain on screen.";
const MSG_CONNECTION_CLOSED: &str = "The connection to the analysis server was closed.";

/// Plays alarms for one session and reports playback faults to the operator
/// at most once.
struct AlarmDispatcher {
    sink: Arc<dyn AlarmSink>,
    faults_tx: mpsc::UnboundedSender<String>,
    faults_rx: mpsc::UnboundedReceiver<String>,
    fault_reported: bool,
}

impl AlarmDispatcher {
    fn new(sink: Arc<dyn AlarmSink>) -> Self {
        let (faults_tx, faults_rx) = mpsc::unbounded_channel();
        let handler_tx = faults_tx.clone();
        sink.set_fault_handler(Some(Arc::new(move |message: String| {
            let _ = handler_tx.send(message);
        })));
        Self {
            sink,
            faults_tx,
            faults_rx,
            fault_reported: false,
        }
    }

    fn sound(&self) {
        if let Err(message) = self.sink.play() {
            let _ = self.faults_tx.send(message);
        }
    }

    async fn next_fault(&mut self) -> Option<String> {
        self.faults_rx.recv().await
    }

    /// The message to show, the first time only.
    fn first_report(&mut self, message: String) -> Option<String> {
        if self.fault_reported {
            return None;
        }
        self.fault_reported = true;
        Some(message)
    }

    fn shutdown(&self) {
        self.sink.silence();
        self.sink.set_fault_handler(None);
    }
}

/// Single writer of one session's state. Owns the channel, the counters and
/// the sentinel; everything it does happens inside [`SessionRuntime::run`].
pub(crate) struct SessionRuntime {
    channel: Option<ChannelHandle>,
    snapshot: IndicatorSnapshot,
    escalation: EscalationEngine,
    sentinel: PeriodicSentinel,
    alarm: AlarmDispatcher,
    renderer: Arc<Mutex<FrameRenderer>>,
    policy: MalformedPayloadPolicy,
    publisher: SessionPublisher,
    error_displayed: bool,
}

impl SessionRuntime {
    pub(crate) fn new(
        channel: ChannelHandle,
        alarm: Arc<dyn AlarmSink>,
        renderer: Arc<Mutex<FrameRenderer>>,
        policy: MalformedPayloadPolicy,
        publisher: SessionPublisher,
    ) -> Self {
        Self {
            channel: Some(channel),
            snapshot: IndicatorSnapshot::zero(),
            escalation: EscalationEngine::default(),
            sentinel: PeriodicSentinel::new(),
            alarm: AlarmDispatcher::new(alarm),
            renderer,
            policy,
            publisher,
            error_displayed: false,
        }
    }

    pub(crate) async fn run(mut self, cancel_token: CancellationToken) {
        let reason = loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break CloseReason::Cancelled,
                Some(message) = self.alarm.next_fault() => self.report_playback_fault(message),
                event = next_channel_event(&mut self.channel) => {
                    if let Some(reason) = self.handle_channel_event(event).await {
                        break reason;
                    }
                }
                _ = self.sentinel.tick() => {
                    if self.sentinel.should_alarm(&self.snapshot) {
                        self.fire(AlarmTrigger::Sentinel);
                    }
                }
            }
        };

        self.teardown(reason).await;
    }

    async fn handle_channel_event(&mut self, event: ChannelEvent) -> Option<CloseReason> {
        match event {
            ChannelEvent::Indicator { reading, frame } => {
                self.apply_reading(&reading);
                if let Some(frame) = frame {
                    self.paint(&frame).await;
                }
                None
            }
            ChannelEvent::Completed => {
                log_info!("analysis completed");
                self.close_channel();
                self.publisher.set_channel_state(ChannelState::Closed);
                self.publisher
                    .events()
                    .notice(NoticeKind::Completed, MSG_COMPLETED);
                None
            }
            ChannelEvent::Error(message) => {
                log_warn!("analysis service reported an error: {message}");
                self.show_error(NoticeKind::Transport, message);
                Some(CloseReason::Failed)
            }
            ChannelEvent::Closed => {
                log_info!("analysis stream closed");
                self.close_channel();
                self.publisher.set_channel_state(ChannelState::Closed);
                if !self.error_displayed {
                    self.publisher
                        .events()
                        .notice(NoticeKind::ConnectionClosed, MSG_CONNECTION_CLOSED);
                }
                None
            }
            ChannelEvent::Malformed(reason) => {
                match self.policy {
                    MalformedPayloadPolicy::Ignore => {}
                    MalformedPayloadPolicy::Log => {
                        log_warn!("dropping malformed analysis payload: {reason}");
                    }
                    MalformedPayloadPolicy::Report => {
                        log_warn!("dropping malformed analysis payload: {reason}");
                        self.show_error(
                            NoticeKind::Payload,
                            format!("Received an invalid message from the server: {reason}"),
                        );
                    }
                }
                None
            }
        }
    }

    fn apply_reading(&mut self, reading: &IndicatorReading) {
        self.snapshot = self.snapshot.apply(reading);
        for trigger in self.escalation.evaluate(&self.snapshot) {
            self.fire(trigger);
        }
        self.publisher.set_snapshot(self.snapshot);
    }

    async fn paint(&mut self, frame: &str) {
        let outcome = self.renderer.lock().await.paint(frame).await;
        match outcome {
            Ok(PaintOutcome::Painted) => self.publisher.events().emit(MonitorEvent::FramePainted),
            Ok(PaintOutcome::Throttled) => {}
            Err(err) => self.show_error(NoticeKind::Render, format!("Could not display frame: {err}")),
        }
    }

    fn fire(&self, trigger: AlarmTrigger) {
        self.alarm.sound();
        self.publisher
            .events()
            .emit(MonitorEvent::AlarmFired { trigger });
    }

    fn report_playback_fault(&mut self, message: String) {
        if let Some(message) = self.alarm.first_report(message) {
            self.show_error(
                NoticeKind::Playback,
                format!("The alarm sound could not be played: {message}"),
            );
        }
    }

    fn show_error(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.error_displayed = true;
        self.publisher.events().notice(kind, message);
    }

    fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
    }

    async fn teardown(mut self, reason: CloseReason) {
        self.close_channel();
        self.alarm.shutdown();
        self.renderer.lock().await.clear();

        match reason {
            CloseReason::Failed => self.publisher.set_channel_state(ChannelState::Failed),
            CloseReason::Cancelled => {
                if !self.publisher.view().channel_state().is_terminal() {
                    self.publisher.set_channel_state(ChannelState::Closed);
                }
            }
        }
        log_info!("session ended ({reason:?})");
        self.publisher
            .events()
            .emit(MonitorEvent::SessionClosed { reason });
    }
}

/// Pending forever once the channel is gone, so the sentinel keeps running
/// after completion until the operator closes the view.
async fn next_channel_event(channel: &mut Option<ChannelHandle>) -> ChannelEvent {
    match channel {
        Some(channel) => channel.next_event().await,
        None => std::future::pending().await,
    }
}
