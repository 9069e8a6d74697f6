//! WebSocket relay peer-sync provider.
//!
//! Connects to the first reachable signaling endpoint as
//! `<endpoint>?room=<room>`, sends the full document state, then forwards
//! local updates as binary frames and applies incoming binary frames.
//! Frames carry raw `yrs` v1 updates.

use super::peer_sync::{PeerStatus, PeerSyncConnector, PeerSyncProvider, SyncError};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use yrs::updates::decoder::Decode;
use yrs::{Doc, Origin, ReadTxn, StateVector, Subscription, Transact, Update};

/// Transaction origin of updates applied from the relay.
pub const RELAY_ORIGIN: &str = "quillnote-relay";

/// Builds relay providers for a fixed list of signaling endpoints.
#[derive(Debug, Clone)]
pub struct RelayConnector {
    endpoints: Vec<Url>,
}

impl RelayConnector {
    /// Parses endpoints; only `ws` and `wss` URLs are accepted.
    pub fn new<I, S>(endpoints: I) -> Result<Self, SyncError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Vec::new();
        for raw in endpoints {
            let raw = raw.as_ref().trim();
            let url =
                Url::parse(raw).map_err(|_| SyncError::InvalidEndpoint(raw.to_string()))?;
            if !matches!(url.scheme(), "ws" | "wss") {
                return Err(SyncError::InvalidEndpoint(raw.to_string()));
            }
            parsed.push(url);
        }
        if parsed.is_empty() {
            return Err(SyncError::Unavailable(
                "no signaling endpoints configured".to_string(),
            ));
        }
        Ok(Self { endpoints: parsed })
    }

    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }
}

/// Endpoint URL joined with the room query parameter.
pub fn room_url(endpoint: &Url, room: &str) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut().append_pair("room", room);
    url
}

impl PeerSyncConnector for RelayConnector {
    fn connect(&self, room: &str, doc: &Doc) -> Result<Box<dyn PeerSyncProvider>, SyncError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| SyncError::Unavailable("no tokio runtime".to_string()))?;

        let (status_tx, status_rx) = watch::channel(PeerStatus::Connecting);
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let subscription = doc
            .observe_update_v1(move |txn, event| {
                let from_relay = txn
                    .origin()
                    .is_some_and(|origin| *origin == Origin::from(RELAY_ORIGIN));
                if !from_relay {
                    let _ = outgoing_tx.send(event.update.clone());
                }
            })
            .map_err(|_| SyncError::Unavailable("document is busy".to_string()))?;

        let task = runtime.spawn(run_relay(
            self.endpoints.clone(),
            room.to_string(),
            doc.clone(),
            status_tx,
            outgoing_rx,
        ));

        Ok(Box::new(RelayProvider {
            status: status_rx,
            task: Some(task),
            subscription: Some(subscription),
        }))
    }
}

/// Provider returned by [`RelayConnector`].
pub struct RelayProvider {
    status: watch::Receiver<PeerStatus>,
    task: Option<JoinHandle<()>>,
    subscription: Option<Subscription>,
}

impl PeerSyncProvider for RelayProvider {
    fn status(&self) -> watch::Receiver<PeerStatus> {
        self.status.clone()
    }

    fn destroy(&mut self) {
        self.subscription.take();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for RelayProvider {
    fn drop(&mut self) {
        self.destroy();
    }
}

async fn run_relay(
    endpoints: Vec<Url>,
    room: String,
    doc: Doc,
    status: watch::Sender<PeerStatus>,
    mut outgoing: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    let mut connected = None;
    for endpoint in &endpoints {
        let url = room_url(endpoint, &room);
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                info!("event=relay_connect module=collab status=ok room={room} host={}", host_of(endpoint));
                connected = Some(stream);
                break;
            }
            Err(err) => warn!(
                "event=relay_connect module=collab status=error room={room} host={} error={err}",
                host_of(endpoint)
            ),
        }
    }
    let Some(stream) = connected else {
        let _ = status.send(PeerStatus::Disconnected);
        return;
    };

    let (mut writer, mut reader) = stream.split();
    let full_state = doc
        .transact()
        .encode_state_as_update_v1(&StateVector::default());
    if writer.send(Message::Binary(full_state.into())).await.is_err() {
        let _ = status.send(PeerStatus::Disconnected);
        return;
    }
    let _ = status.send(PeerStatus::Connected);

    loop {
        tokio::select! {
            update = outgoing.recv() => match update {
                Some(update) => {
                    if writer.send(Message::Binary(update.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            frame = reader.next() => match frame {
                Some(Ok(Message::Binary(data))) => apply_remote(&doc, &room, &data),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("event=relay_closed module=collab status=ok room={room}");
    let _ = status.send(PeerStatus::Disconnected);
}

fn apply_remote(doc: &Doc, room: &str, data: &[u8]) {
    match Update::decode_v1(data) {
        Ok(update) => {
            let mut txn = doc.transact_mut_with(RELAY_ORIGIN);
            if let Err(err) = txn.apply_update(update) {
                warn!("event=relay_apply module=collab status=error room={room} error={err}");
            }
        }
        Err(err) => {
            warn!("event=relay_apply module=collab status=skipped room={room} reason={err}");
        }
    }
}

fn host_of(url: &Url) -> &str {
    url.host_str().unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::{room_url, RelayConnector};
    use crate::collab::peer_sync::SyncError;

    #[test]
    fn rejects_non_websocket_endpoints() {
        assert!(matches!(
            RelayConnector::new(["https://signaling.example"]),
            Err(SyncError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            RelayConnector::new(Vec::<String>::new()),
            Err(SyncError::Unavailable(_))
        ));
    }

    #[test]
    fn room_is_appended_as_query() {
        let connector = RelayConnector::new(["wss://signaling.yjs.dev"]).unwrap();
        let url = room_url(&connector.endpoints()[0], "note 1");
        assert_eq!(url.as_str(), "wss://signaling.yjs.dev/?room=note+1");
    }
}
