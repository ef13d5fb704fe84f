//! Routing collaborator and the asynchronous routing pipeline
//!
//! The connection core never awaits the [`Router`]. Every routing step is described by a
//! [`RouteJob`] and handed to the engine as a [`RouteRequest`]. The engine runs the job on
//! the runtime and feeds the [`RouteCompletion`] back into the connection, which resumes the
//! link identified by the [`RouteTicket`].

use std::future::Future;

use fe2o3_amqp_types::messaging::{Message, Outcome};

pub mod policy;

/// A node resolved by the [`Router`], ie. a queue or an exchange
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingTarget(pub String);

impl RoutingTarget {
    /// Creates a routing target
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name of the node
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoutingTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of resolving an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The address names an existing node
    Routed(RoutingTarget),

    /// No node is known by the address
    NotFound,
}

/// The message store behind the protocol engine
///
/// ```rust,ignore
/// struct Queues(Mutex<HashMap<String, Vec<Message>>>);
///
/// impl Router for Queues {
///     async fn resolve(&self, address: &str) -> Resolution {
///         match self.0.lock().contains_key(address) {
///             true => Resolution::Routed(RoutingTarget::new(address)),
///             false => Resolution::NotFound,
///         }
///     }
///
///     async fn forward(&self, target: &RoutingTarget, message: Message) -> Outcome {
///         self.0.lock().entry(target.name().into()).or_default().push(message);
///         Outcome::Accepted(Accepted {})
///     }
/// }
/// ```
pub trait Router: Send + Sync + 'static {
    /// Looks up the node named by `address`
    fn resolve(&self, address: &str) -> impl Future<Output = Resolution> + Send;

    /// Delivers a message to a resolved node. The outcome becomes the disposition of an
    /// unsettled delivery.
    fn forward(
        &self,
        target: &RoutingTarget,
        message: Message,
    ) -> impl Future<Output = Outcome> + Send;
}

/// Identifies a link across the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkRef {
    /// Local channel of the session
    pub channel: u16,

    /// Output handle of the link
    pub handle: u32,

    /// Connection unique id of the link. Handles are reused, ids are not.
    pub id: u64,
}

/// Identifies one routing job of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTicket {
    /// The link waiting for the job
    pub link: LinkRef,

    /// Sequence number of the job on the link
    pub seq: u64,
}

/// One asynchronous routing step
#[derive(Debug, Clone)]
pub enum RouteJob {
    /// Resolve an address
    Resolve {
        /// Address to resolve
        address: String,
    },

    /// Forward to a node resolved earlier
    Forward {
        /// Resolved node
        target: RoutingTarget,
        /// Message to forward
        message: Message,
    },

    /// Resolve an address, then forward to the node if it exists
    Relay {
        /// Address taken from the message
        address: String,
        /// Message to forward
        message: Message,
    },

    /// Forward the messages of a transaction in order, stopping at the first failure
    Commit {
        /// Enlisted messages in enlistment order
        messages: Vec<(RoutingTarget, Message)>,
    },
}

/// Result of a [`RouteJob`]
#[derive(Debug, Clone, PartialEq)]
pub enum RouteResult {
    /// Result of [`RouteJob::Resolve`]
    Resolved(Resolution),

    /// Outcome of [`RouteJob::Forward`] or [`RouteJob::Relay`]
    Forwarded(Outcome),

    /// The address of a [`RouteJob::Relay`] did not resolve
    Unroutable,

    /// Result of [`RouteJob::Commit`]. Carries the first outcome other than accepted.
    Committed(Result<(), Outcome>),
}

/// A job the connection needs the engine to run
#[derive(Debug)]
pub struct RouteRequest {
    /// Where the result goes
    pub ticket: RouteTicket,

    /// What to do
    pub job: RouteJob,
}

/// A finished job on its way back to the connection
#[derive(Debug)]
pub struct RouteCompletion {
    /// Ticket of the request
    pub ticket: RouteTicket,

    /// Result of the job
    pub result: RouteResult,
}

/// Runs one job against the router
pub async fn run<R: Router>(router: &R, job: RouteJob) -> RouteResult {
    match job {
        RouteJob::Resolve { address } => RouteResult::Resolved(router.resolve(&address).await),
        RouteJob::Forward { target, message } => {
            RouteResult::Forwarded(router.forward(&target, message).await)
        }
        RouteJob::Relay { address, message } => match router.resolve(&address).await {
            Resolution::Routed(target) => {
                RouteResult::Forwarded(router.forward(&target, message).await)
            }
            Resolution::NotFound => RouteResult::Unroutable,
        },
        RouteJob::Commit { messages } => {
            for (target, message) in messages {
                match router.forward(&target, message).await {
                    Outcome::Accepted(_) => {}
                    outcome => return RouteResult::Committed(Err(outcome)),
                }
            }
            RouteResult::Committed(Ok(()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use fe2o3_amqp_types::messaging::{Accepted, Message, Outcome, Released};
    use parking_lot::Mutex;

    use super::{run, Resolution, RouteJob, RouteResult, Router, RoutingTarget};

    #[derive(Default)]
    struct Nodes {
        queues: Mutex<HashMap<String, Vec<Message>>>,
    }

    impl Router for Nodes {
        async fn resolve(&self, address: &str) -> Resolution {
            match self.queues.lock().contains_key(address) {
                true => Resolution::Routed(RoutingTarget::new(address)),
                false => Resolution::NotFound,
            }
        }

        async fn forward(&self, target: &RoutingTarget, message: Message) -> Outcome {
            match self.queues.lock().get_mut(target.name()) {
                Some(queue) => {
                    queue.push(message);
                    Outcome::Accepted(Accepted {})
                }
                None => Outcome::Released(Released {}),
            }
        }
    }

    fn nodes(names: &[&str]) -> Nodes {
        let nodes = Nodes::default();
        for name in names {
            nodes.queues.lock().insert(name.to_string(), Vec::new());
        }
        nodes
    }

    #[tokio::test]
    async fn relay_resolves_then_forwards() {
        let router = nodes(&["queue"]);
        let job = RouteJob::Relay {
            address: "queue".into(),
            message: Message::new("hi"),
        };
        assert_eq!(
            run(&router, job).await,
            RouteResult::Forwarded(Outcome::Accepted(Accepted {}))
        );
        assert_eq!(router.queues.lock()["queue"].len(), 1);
    }

    #[tokio::test]
    async fn relay_to_unknown_address_is_unroutable() {
        let router = nodes(&[]);
        let job = RouteJob::Relay {
            address: "Unknown".into(),
            message: Message::new("hi"),
        };
        assert_eq!(run(&router, job).await, RouteResult::Unroutable);
    }

    #[tokio::test]
    async fn commit_stops_at_first_failure() {
        let router = nodes(&["a"]);
        let job = RouteJob::Commit {
            messages: vec![
                (RoutingTarget::new("a"), Message::new("1")),
                (RoutingTarget::new("gone"), Message::new("2")),
                (RoutingTarget::new("a"), Message::new("3")),
            ],
        };
        assert_eq!(
            run(&router, job).await,
            RouteResult::Committed(Err(Outcome::Released(Released {})))
        );
        assert_eq!(router.queues.lock()["a"].len(), 1);
    }
}
