//! Subscriptions and message handlers
//!
//! A subscription is identified by its topic. Registering the same topic
//! again swaps the handler in place. The registry outlives individual
//! connections and is replayed after every handshake.

use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::frame::{Command, Frame};

/// Acknowledgement mode requested on SUBSCRIBE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AckMode {
    #[default]
    Auto,
    /// ACK acknowledges every message up to and including this one
    Client,
    ClientIndividual,
}

impl AckMode {
    pub fn header_value(&self) -> &'static str {
        match self {
            AckMode::Auto => "auto",
            AckMode::Client => "client",
            AckMode::ClientIndividual => "client-individual",
        }
    }
}

impl fmt::Display for AckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_value())
    }
}

/// A MESSAGE frame routed to a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub subscription_id: String,
    pub message_id: Option<String>,
    /// Value for ACK/NACK under non-auto modes
    pub ack_id: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Delivery {
    pub(crate) fn from_frame(frame: Frame, topic: String, subscription_id: String) -> Self {
        let message_id = frame.header("message-id").map(str::to_string);
        let ack_id = frame.header("ack").map(str::to_string);
        Self {
            topic,
            subscription_id,
            message_id,
            ack_id,
            headers: frame.headers,
            body: frame.body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A handler refused a message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(reason: impl fmt::Display) -> Self {
        Self(reason.to_string())
    }
}

/// Receives the messages of one subscription
///
/// Runs inline on the session task, so it must not block. Under non-auto
/// ack modes `Ok` is acknowledged and `Err` is negatively acknowledged.
pub trait MessageHandler: Send + 'static {
    fn handle(&mut self, delivery: &Delivery) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: FnMut(&Delivery) -> Result<(), HandlerError> + Send + 'static,
{
    fn handle(&mut self, delivery: &Delivery) -> Result<(), HandlerError> {
        self(delivery)
    }
}

/// Forward deliveries to another task
impl MessageHandler for mpsc::UnboundedSender<Delivery> {
    fn handle(&mut self, delivery: &Delivery) -> Result<(), HandlerError> {
        self.send(delivery.clone())
            .map_err(|_| HandlerError::new("receiver dropped"))
    }
}

pub(crate) struct Subscription {
    pub id: String,
    pub topic: String,
    pub ack: AckMode,
    pub handler: Box<dyn MessageHandler>,
}

impl Subscription {
    pub fn subscribe_frame(&self) -> Frame {
        Frame::new(Command::Subscribe)
            .with_header("id", self.id.clone())
            .with_header("destination", self.topic.clone())
            .with_header("ack", self.ack.header_value())
    }

    pub fn unsubscribe_frame(&self) -> Frame {
        Frame::new(Command::Unsubscribe).with_header("id", self.id.clone())
    }
}

/// What `Registry::insert` changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Registered {
    New,
    /// Same topic and ack mode, only the handler changed
    HandlerReplaced,
    /// Same topic, different ack mode; the server side needs a re-subscribe
    AckChanged,
}

/// Live subscriptions in registration order
#[derive(Default)]
pub(crate) struct Registry {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl Registry {
    pub fn insert(
        &mut self,
        topic: String,
        ack: AckMode,
        handler: Box<dyn MessageHandler>,
    ) -> Registered {
        if let Some(existing) = self.subscriptions.iter_mut().find(|s| s.topic == topic) {
            existing.handler = handler;
            if existing.ack == ack {
                return Registered::HandlerReplaced;
            }
            existing.ack = ack;
            return Registered::AckChanged;
        }

        let id = format!("sub-{}", self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            topic,
            ack,
            handler,
        });
        Registered::New
    }

    pub fn remove(&mut self, topic: &str) -> Option<Subscription> {
        let index = self.subscriptions.iter().position(|s| s.topic == topic)?;
        Some(self.subscriptions.remove(index))
    }

    pub fn get(&self, topic: &str) -> Option<&Subscription> {
        self.subscriptions.iter().find(|s| s.topic == topic)
    }

    /// Route by the `subscription` header, falling back to `destination`
    pub fn route(
        &mut self,
        subscription_id: Option<&str>,
        destination: Option<&str>,
    ) -> Option<&mut Subscription> {
        let index = subscription_id
            .and_then(|id| self.subscriptions.iter().position(|s| s.id == id))
            .or_else(|| {
                destination.and_then(|topic| self.subscriptions.iter().position(|s| s.topic == topic))
            })?;
        self.subscriptions.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.iter()
    }
}
