use std::time::Duration;

use futures::{future::BoxFuture, FutureExt, Sink, SinkExt, Stream, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle, time};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
};
use tokio_util::sync::CancellationToken;

use super::{messages::parse_message, ChannelError, ChannelEvent};

// Set to false to silence per-frame channel logging
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const EVENT_BUFFER: usize = 64;
/// How long the detached reader waits to hand over its close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Receive-only handle on one analysis stream. Closing is idempotent and also
/// happens on drop.
pub struct ChannelHandle {
    events: mpsc::Receiver<ChannelEvent>,
    cancel_token: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    /// Wraps an already-running event source, e.g. an in-process producer.
    pub fn from_receiver(events: mpsc::Receiver<ChannelEvent>) -> Self {
        Self {
            events,
            cancel_token: CancellationToken::new(),
            reader: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Next event in receipt order. A vanished producer reads as `Closed`.
    pub async fn next_event(&mut self) -> ChannelEvent {
        if self.is_closed() {
            return ChannelEvent::Closed;
        }
        self.events.recv().await.unwrap_or(ChannelEvent::Closed)
    }

    pub fn close(&mut self) {
        if self.cancel_token.is_cancelled() {
            return;
        }
        self.cancel_token.cancel();
        self.events.close();
        // The reader sends a close frame on cancellation and exits on its own
        // within CLOSE_TIMEOUT.
        self.reader.take();
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens analysis streams. The WebSocket implementation is the production one;
/// other transports plug in here.
pub trait ChannelConnector: Send + Sync {
    fn connect(&self, url: String) -> BoxFuture<'_, Result<ChannelHandle, ChannelError>>;
}

#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

impl ChannelConnector for WebSocketConnector {
    fn connect(&self, url: String) -> BoxFuture<'_, Result<ChannelHandle, ChannelError>> {
        async move {
            log_info!("connecting to analysis stream {url}");
            let (socket, _response) =
                connect_async(url.as_str())
                    .await
                    .map_err(|err| ChannelError::Connect {
                        url: url.clone(),
                        reason: err.to_string(),
                    })?;

            let (tx, rx) = mpsc::channel(EVENT_BUFFER);
            let cancel_token = CancellationToken::new();
            let reader = tokio::spawn(read_loop(socket, tx, cancel_token.clone()));

            Ok(ChannelHandle {
                events: rx,
                cancel_token,
                reader: Some(reader),
            })
        }
        .boxed()
    }
}

async fn read_loop<S>(mut socket: S, events: mpsc::Sender<ChannelEvent>, cancel_token: CancellationToken)
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                match time::timeout(CLOSE_TIMEOUT, socket.close()).await {
                    Ok(_) => log_info!("analysis stream closed by client"),
                    Err(_) => log_warn!("analysis server did not take the close frame, dropping the socket"),
                }
                break;
            }
            message = socket.next() => {
                let event = match message {
                    Some(Ok(Message::Text(text))) => parse_message(&text),
                    Some(Ok(Message::Close(frame))) => {
                        log_info!("analysis stream closed by server: {frame:?}");
                        ChannelEvent::Closed
                    }
                    // Binary, ping and pong frames carry nothing for us.
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        log_warn!("analysis stream transport error: {err}");
                        ChannelEvent::Error(format!(
                            "connection to the analysis server failed: {err}"
                        ))
                    }
                    None => ChannelEvent::Closed,
                };

                let terminal = matches!(event, ChannelEvent::Closed | ChannelEvent::Error(_));
                if events.send(event).await.is_err() || terminal {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;
    use tokio_tungstenite::{accept_async, WebSocketStream};

    /// Serves one WebSocket client with `script` and returns its ws:// url.
    async fn serve_once<F, Fut>(script: F) -> (String, JoinHandle<()>)
    where
        F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/video/analyze/7", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let socket = accept_async(stream).await.unwrap();
            script(socket).await;
        });
        (url, server)
    }

    /// Reads nothing and never finishes closing.
    struct StalledSocket {
        incoming: mpsc::UnboundedReceiver<Result<Message, WsError>>,
    }

    impl Stream for StalledSocket {
        type Item = Result<Message, WsError>;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            self.incoming.poll_recv(cx)
        }
    }

    impl Sink<Message> for StalledSocket {
        type Error = WsError;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, _: Message) -> Result<(), WsError> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Pending
        }
    }

    #[tokio::test]
    async fn delivers_events_in_order_then_closed() {
        let (tx, rx) = mpsc::channel(8);
        let mut handle = ChannelHandle::from_receiver(rx);

        tx.send(ChannelEvent::Completed).await.unwrap();
        tx.send(ChannelEvent::Error("boom".into())).await.unwrap();
        drop(tx);

        assert_eq!(handle.next_event().await, ChannelEvent::Completed);
        assert_eq!(handle.next_event().await, ChannelEvent::Error("boom".into()));
        assert_eq!(handle.next_event().await, ChannelEvent::Closed);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (tx, rx) = mpsc::channel(8);
        let mut handle = ChannelHandle::from_receiver(rx);

        handle.close();
        handle.close();

        assert!(handle.is_closed());
        assert!(tx.send(ChannelEvent::Completed).await.is_err());
        assert_eq!(handle.next_event().await, ChannelEvent::Closed);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connect_error() {
        let connector = WebSocketConnector;
        let result = connector
            .connect("ws://127.0.0.1:9/video/analyze/1".to_string())
            .await;
        assert!(matches!(result, Err(ChannelError::Connect { .. })));
    }

    #[tokio::test]
    async fn reads_server_frames_until_close() {
        let (url, server) = serve_once(|mut socket| async move {
            let indicators = r#"{"indicators": {"blinks": 3, "microsleeps": 0.5, "yawns": 1, "yawn_duration": 2.0}}"#;
            socket.send(Message::Text(indicators.into())).await.unwrap();
            socket.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
            socket.send(Message::Ping(Vec::new())).await.unwrap();
            socket.send(Message::Text("not json".into())).await.unwrap();
            socket.send(Message::Text(r#"{"status": "completed"}"#.into())).await.unwrap();
            socket.close(None).await.unwrap();
            while let Some(Ok(_)) = socket.next().await {}
        })
        .await;

        let mut handle = WebSocketConnector.connect(url).await.unwrap();

        match handle.next_event().await {
            ChannelEvent::Indicator { reading, frame } => {
                assert_eq!(reading.blinks, 3);
                assert_eq!(reading.microsleeps, 0.5);
                assert_eq!(frame, None);
            }
            other => panic!("expected indicators, got {other:?}"),
        }
        assert!(matches!(handle.next_event().await, ChannelEvent::Malformed(_)));
        assert_eq!(handle.next_event().await, ChannelEvent::Completed);
        assert_eq!(handle.next_event().await, ChannelEvent::Closed);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_connection_is_a_transport_error() {
        let (url, server) = serve_once(|socket| async move { drop(socket) }).await;

        let mut handle = WebSocketConnector.connect(url).await.unwrap();

        match handle.next_event().await {
            ChannelEvent::Error(message) => assert!(message.contains("analysis server")),
            other => panic!("expected a transport error, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn client_close_sends_a_close_frame() {
        let (seen_tx, seen_rx) = oneshot::channel();
        let (url, server) = serve_once(|mut socket| async move {
            let first = socket.next().await;
            let _ = seen_tx.send(matches!(first, Some(Ok(Message::Close(_)))));
        })
        .await;

        let mut handle = WebSocketConnector.connect(url).await.unwrap();
        handle.close();

        assert!(seen_rx.await.unwrap());
        assert_eq!(handle.next_event().await, ChannelEvent::Closed);
        server.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unresponsive_peer_releases_the_reader() {
        let (_incoming_tx, incoming) = mpsc::unbounded_channel();
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let cancel_token = CancellationToken::new();
        let reader = tokio::spawn(read_loop(StalledSocket { incoming }, events_tx, cancel_token.clone()));

        cancel_token.cancel();

        time::timeout(CLOSE_TIMEOUT * 2, reader)
            .await
            .expect("reader should give up on the close frame")
            .unwrap();
        assert!(events_rx.recv().await.is_none());
    }
}
