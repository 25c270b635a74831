//! Delivery of tool-endpoint responses to open SSE sessions.
//!
//! A session is created by `GET {base}/sse` and receives every response to the
//! messages posted to `{base}/message?sessionId=<id>`. With Redis configured the
//! POST may land on a different process than the one holding the stream.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures_util::stream::{self, BoxStream};
use futures_util::{future, Stream, StreamExt};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;

const SESSION_BUFFER: usize = 64;
const CHANNEL_PREFIX: &str = "roster:mcp:session:";

type SessionMap = Arc<Mutex<HashMap<Uuid, mpsc::Sender<String>>>>;

#[derive(Clone)]
pub enum SessionBroker {
    Local(LocalSessions),
    Redis(RedisSessions),
}

impl SessionBroker {
    pub fn local() -> Self {
        Self::Local(LocalSessions::default())
    }

    pub fn redis(client: redis::Client, publisher: ConnectionManager) -> Self {
        Self::Redis(RedisSessions { client, publisher })
    }

    pub async fn open(&self) -> Result<Session, ApiError> {
        match self {
            Self::Local(local) => Ok(local.open()),
            Self::Redis(redis) => redis.open().await,
        }
    }

    pub async fn contains(&self, id: Uuid) -> Result<bool, ApiError> {
        match self {
            Self::Local(local) => Ok(local.contains(id)),
            Self::Redis(redis) => redis.contains(id).await,
        }
    }

    /// Push a serialized message to the session stream.
    ///
    /// Returns `false` when nobody is listening on `id` any more.
    pub async fn deliver(&self, id: Uuid, payload: String) -> Result<bool, ApiError> {
        match self {
            Self::Local(local) => Ok(local.deliver(id, payload).await),
            Self::Redis(redis) => redis.deliver(id, payload).await,
        }
    }
}

#[derive(Clone, Default)]
pub struct LocalSessions {
    senders: SessionMap,
}

impl LocalSessions {
    fn open(&self) -> Session {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(SESSION_BUFFER);
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, sender);
        debug!(session = %id, "opened local session");

        let messages = stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|message| (message, receiver))
        });

        Session {
            id,
            messages: messages.boxed(),
            _guard: Some(SessionGuard {
                id,
                senders: self.senders.clone(),
            }),
        }
    }

    fn contains(&self, id: Uuid) -> bool {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    async fn deliver(&self, id: Uuid, payload: String) -> bool {
        let sender = self
            .senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned();

        match sender {
            Some(sender) => sender.send(payload).await.is_ok(),
            None => false,
        }
    }
}

#[derive(Clone)]
pub struct RedisSessions {
    client: redis::Client,
    publisher: ConnectionManager,
}

impl RedisSessions {
    async fn open(&self) -> Result<Session, ApiError> {
        let id = Uuid::new_v4();
        let channel = channel_name(id);

        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;
        debug!(session = %id, channel = %channel, "subscribed redis session");

        let messages = pubsub
            .into_on_message()
            .filter_map(|message| future::ready(message.get_payload::<String>().ok()));

        Ok(Session {
            id,
            messages: messages.boxed(),
            _guard: None,
        })
    }

    async fn contains(&self, id: Uuid) -> Result<bool, ApiError> {
        let mut connection = self.publisher.clone();
        let (_, subscribers): (String, i64) = redis::cmd("PUBSUB")
            .arg("NUMSUB")
            .arg(channel_name(id))
            .query_async(&mut connection)
            .await?;
        Ok(subscribers > 0)
    }

    async fn deliver(&self, id: Uuid, payload: String) -> Result<bool, ApiError> {
        let mut connection = self.publisher.clone();
        let receivers: i64 = connection.publish(channel_name(id), payload).await?;
        if receivers == 0 {
            warn!(session = %id, "published to a session without subscribers");
        }
        Ok(receivers > 0)
    }
}

fn channel_name(id: Uuid) -> String {
    format!("{CHANNEL_PREFIX}{id}")
}

/// An open SSE session yielding serialized JSON-RPC messages.
pub struct Session {
    id: Uuid,
    messages: BoxStream<'static, String>,
    _guard: Option<SessionGuard>,
}

impl Session {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Stream for Session {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.messages.as_mut().poll_next(cx)
    }
}

struct SessionGuard {
    id: Uuid,
    senders: SessionMap,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
        debug!(session = %self.id, "closed local session");
    }
}
