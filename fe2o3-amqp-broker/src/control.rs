//! Controls sent from a [`crate::connection::ConnectionHandle`] to its engine

use fe2o3_amqp_types::{
    definitions::{self, DeliveryTag},
    messaging::Message,
};
use tokio::sync::oneshot;

use crate::{connection::SendError, router::LinkRef};

#[derive(Debug)]
pub(crate) enum ConnectionControl {
    Send {
        link: LinkRef,
        message: Message,
        settled: bool,
        responder: oneshot::Sender<Result<DeliveryTag, SendError>>,
    },
    Close(Option<definitions::Error>),
}
