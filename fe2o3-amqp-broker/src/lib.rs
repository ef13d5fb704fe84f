#![warn(missing_docs, missing_debug_implementations)]

//! Broker side AMQP1.0 protocol engine
//!
//! The crate accepts connections over any `AsyncRead + AsyncWrite` stream, runs the
//! connection, session and link state machines of the peer initiated endpoints and hands
//! every received message to a [`Router`] supplied by the embedding broker.
//!
//! - Links with a target address forward to the node resolved at attach.
//! - Links without a target address (`ANONYMOUS-RELAY`) route each message by its `to`
//!   property.
//! - Coordinator links run local transactions. Transactional deliveries are enlisted and
//!   forwarded only when the transaction is committed. A delivery that cannot be routed
//!   makes the commit fail with `amqp:transaction:rollback`.
//!
//! Routing failures follow a fixed policy. A delivery that is not settled is rejected if
//! the source of the link supports `amqp:rejected:list`, otherwise the link is detached
//! with the routing error.
//!
//! # Quick start
//!
//! ```rust, ignore
//! use fe2o3_amqp_broker::{
//!     acceptor::ConnectionAcceptor,
//!     router::{Resolution, Router, RoutingTarget},
//! };
//! use fe2o3_amqp_types::messaging::{Accepted, Message, Outcome};
//! use tokio::net::TcpListener;
//!
//! struct Queues;
//!
//! impl Router for Queues {
//!     async fn resolve(&self, address: &str) -> Resolution {
//!         Resolution::Routed(RoutingTarget::new(address))
//!     }
//!
//!     async fn forward(&self, target: &RoutingTarget, message: Message) -> Outcome {
//!         println!("{} <- {:?}", target, message);
//!         Outcome::Accepted(Accepted {})
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("localhost:5672").await.unwrap();
//!     let acceptor = ConnectionAcceptor::new("broker", Queues);
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let mut connection = acceptor.accept(stream).await.unwrap();
//!         tokio::spawn(async move {
//!             while let Some(event) = connection.next_event().await {
//!                 println!("{:?}", event);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod acceptor;
pub mod connection;
mod control;
pub mod event;
pub mod frames;
pub mod link;
pub mod router;
pub mod session;
pub mod transaction;
pub mod transport;
pub mod util;

pub use acceptor::{AcceptorConfig, ConnectionAcceptor};
pub use connection::ConnectionHandle;
pub use event::ConnectionEvent;
pub use router::{LinkRef, Resolution, Router, RoutingTarget};

/// Payload of a transfer frame
pub type Payload = bytes::Bytes;
