//! Performatives defined in AMQP 1.0 specification Part 2.7

use bytes::Bytes;
use fe2o3_amqp_codec::{
    composite::{descriptor_of, from_described, is, to_described, type_name, Composite},
    Error, Value,
};

mod attach;
mod begin;
mod close;
mod detach;
mod disposition;
mod end;
mod flow;
mod open;
mod transfer;

pub use attach::*;
pub use begin::*;
pub use close::*;
pub use detach::*;
pub use disposition::*;
pub use end::*;
pub use flow::*;
pub use open::*;
pub use transfer::*;

/// AMQP 1.0 Performatives
#[derive(Debug, Clone, PartialEq)]
pub enum Performative {
    /// Open
    Open(Open),

    /// Begin
    Begin(Begin),

    /// Attach
    Attach(Attach),

    /// Flow
    Flow(Flow),

    /// Transfer
    Transfer(Transfer),

    /// Disposition
    Disposition(Disposition),

    /// Detach
    Detach(Detach),

    /// End
    End(End),

    /// Close
    Close(Close),
}

/// Receives performatives dispatched by [`Performative::dispatch`]
///
/// Exactly one method is called per performative.
pub trait PerformativeHandler {
    /// Error returned by the handler
    type Error;

    /// Open received
    fn on_open(&mut self, channel: u16, open: Open) -> Result<(), Self::Error>;

    /// Begin received
    fn on_begin(&mut self, channel: u16, begin: Begin) -> Result<(), Self::Error>;

    /// Attach received
    fn on_attach(&mut self, channel: u16, attach: Attach) -> Result<(), Self::Error>;

    /// Flow received
    fn on_flow(&mut self, channel: u16, flow: Flow) -> Result<(), Self::Error>;

    /// Transfer received with the payload that followed it in the frame
    fn on_transfer(
        &mut self,
        channel: u16,
        transfer: Transfer,
        payload: Bytes,
    ) -> Result<(), Self::Error>;

    /// Disposition received
    fn on_disposition(&mut self, channel: u16, disposition: Disposition)
        -> Result<(), Self::Error>;

    /// Detach received
    fn on_detach(&mut self, channel: u16, detach: Detach) -> Result<(), Self::Error>;

    /// End received
    fn on_end(&mut self, channel: u16, end: End) -> Result<(), Self::Error>;

    /// Close received
    fn on_close(&mut self, channel: u16, close: Close) -> Result<(), Self::Error>;
}

impl Performative {
    /// Symbolic descriptor of the performative
    pub fn name(&self) -> &'static str {
        match self {
            Performative::Open(_) => Open::NAME,
            Performative::Begin(_) => Begin::NAME,
            Performative::Attach(_) => Attach::NAME,
            Performative::Flow(_) => Flow::NAME,
            Performative::Transfer(_) => Transfer::NAME,
            Performative::Disposition(_) => Disposition::NAME,
            Performative::Detach(_) => Detach::NAME,
            Performative::End(_) => End::NAME,
            Performative::Close(_) => Close::NAME,
        }
    }

    /// Hands the performative to the matching handler method. The payload is only passed on
    /// for [`Transfer`].
    pub fn dispatch<H>(self, channel: u16, payload: Bytes, handler: &mut H) -> Result<(), H::Error>
    where
        H: PerformativeHandler + ?Sized,
    {
        match self {
            Performative::Open(open) => handler.on_open(channel, open),
            Performative::Begin(begin) => handler.on_begin(channel, begin),
            Performative::Attach(attach) => handler.on_attach(channel, attach),
            Performative::Flow(flow) => handler.on_flow(channel, flow),
            Performative::Transfer(transfer) => handler.on_transfer(channel, transfer, payload),
            Performative::Disposition(disposition) => {
                handler.on_disposition(channel, disposition)
            }
            Performative::Detach(detach) => handler.on_detach(channel, detach),
            Performative::End(end) => handler.on_end(channel, end),
            Performative::Close(close) => handler.on_close(channel, close),
        }
    }
}

macro_rules! impl_from_performative {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Performative {
                fn from(val: $variant) -> Self {
                    Performative::$variant(val)
                }
            }
        )*
    };
}

impl_from_performative!(Open, Begin, Attach, Flow, Transfer, Disposition, Detach, End, Close);

impl From<&Performative> for Value {
    fn from(performative: &Performative) -> Self {
        match performative {
            Performative::Open(val) => to_described(val),
            Performative::Begin(val) => to_described(val),
            Performative::Attach(val) => to_described(val),
            Performative::Flow(val) => to_described(val),
            Performative::Transfer(val) => to_described(val),
            Performative::Disposition(val) => to_described(val),
            Performative::Detach(val) => to_described(val),
            Performative::End(val) => to_described(val),
            Performative::Close(val) => to_described(val),
        }
    }
}

impl TryFrom<Value> for Performative {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let descriptor = match descriptor_of(&value) {
            Some(descriptor) => descriptor.clone(),
            None => return Err(Error::invalid_type("performative", type_name(&value))),
        };

        let performative = if is::<Open>(&descriptor) {
            Performative::Open(from_described(value)?)
        } else if is::<Begin>(&descriptor) {
            Performative::Begin(from_described(value)?)
        } else if is::<Attach>(&descriptor) {
            Performative::Attach(from_described(value)?)
        } else if is::<Flow>(&descriptor) {
            Performative::Flow(from_described(value)?)
        } else if is::<Transfer>(&descriptor) {
            Performative::Transfer(from_described(value)?)
        } else if is::<Disposition>(&descriptor) {
            Performative::Disposition(from_described(value)?)
        } else if is::<Detach>(&descriptor) {
            Performative::Detach(from_described(value)?)
        } else if is::<End>(&descriptor) {
            Performative::End(from_described(value)?)
        } else if is::<Close>(&descriptor) {
            Performative::Close(from_described(value)?)
        } else {
            return Err(Error::UnknownDescriptor(descriptor));
        };
        Ok(performative)
    }
}

described_enum_serde!(Performative);
