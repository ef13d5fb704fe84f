//! AMQP frame type and corresponding encoder and decoder

use bytes::{Buf, BufMut, BytesMut};
use fe2o3_amqp_codec::{decode, encode};
use fe2o3_amqp_types::performatives::{
    Attach, Begin, Close, Detach, Disposition, End, Flow, Open, Performative, Transfer,
};
use tokio_util::codec::{Decoder, Encoder};

use crate::Payload;

use super::{Error, FRAME_HEADER_SIZE, FRAME_TYPE_AMQP};

/// AMQP frame
#[derive(Debug)]
pub struct Frame {
    /// AMQP frame channel
    pub channel: u16,

    /// AMQP frame body
    pub body: FrameBody,
}

impl Frame {
    /// Creates a new AMQP frame
    pub fn new(channel: impl Into<u16>, body: impl Into<FrameBody>) -> Self {
        Self {
            channel: channel.into(),
            body: body.into(),
        }
    }

    /// Get the channel of the frame
    pub fn channel(&self) -> u16 {
        self.channel
    }

    /// Get the body of the frame
    pub fn body(&self) -> &FrameBody {
        &self.body
    }

    /// Consume the frame to get the frame body
    pub fn into_body(self) -> FrameBody {
        self.body
    }

    /// Creates an empty frame. Empty frames carry no performative and only keep the
    /// connection alive
    pub fn empty() -> Self {
        Self {
            channel: 0,
            body: FrameBody::Empty,
        }
    }
}

/// AMQP frame body
pub enum FrameBody {
    // Frames handled by Link
    /// Attach performative
    Attach(Attach),

    /// Flow performative
    Flow(Flow),

    /// Transfer performative and payload
    Transfer {
        /// Transfer performative
        performative: Transfer,

        /// Binary payload
        payload: Payload,
    },

    /// Disposition performative
    Disposition(Disposition),

    /// Detach performative
    Detach(Detach),

    // Frames handled by Session
    /// Begin performative
    Begin(Begin),

    /// End performative
    End(End),

    // Frames handled by Connection
    /// Open performative
    Open(Open),

    /// Close performative
    Close(Close),

    /// An empty frame
    Empty,
}

impl FrameBody {
    /// Splits the body into the performative and the payload that followed it. Returns `None`
    /// for empty frames.
    pub fn into_performative(self) -> Option<(Performative, Payload)> {
        let performative = match self {
            FrameBody::Attach(p) => Performative::Attach(p),
            FrameBody::Flow(p) => Performative::Flow(p),
            FrameBody::Transfer {
                performative,
                payload,
            } => return Some((Performative::Transfer(performative), payload)),
            FrameBody::Disposition(p) => Performative::Disposition(p),
            FrameBody::Detach(p) => Performative::Detach(p),
            FrameBody::Begin(p) => Performative::Begin(p),
            FrameBody::End(p) => Performative::End(p),
            FrameBody::Open(p) => Performative::Open(p),
            FrameBody::Close(p) => Performative::Close(p),
            FrameBody::Empty => return None,
        };
        Some((performative, Payload::new()))
    }

    /// Whether the body is a [`Close`]
    pub fn is_close(&self) -> bool {
        matches!(self, FrameBody::Close(_))
    }
}

impl From<Performative> for FrameBody {
    fn from(performative: Performative) -> Self {
        match performative {
            Performative::Open(p) => FrameBody::Open(p),
            Performative::Begin(p) => FrameBody::Begin(p),
            Performative::Attach(p) => FrameBody::Attach(p),
            Performative::Flow(p) => FrameBody::Flow(p),
            Performative::Transfer(p) => FrameBody::Transfer {
                performative: p,
                payload: Payload::new(),
            },
            Performative::Disposition(p) => FrameBody::Disposition(p),
            Performative::Detach(p) => FrameBody::Detach(p),
            Performative::End(p) => FrameBody::End(p),
            Performative::Close(p) => FrameBody::Close(p),
        }
    }
}

macro_rules! impl_from_performative_for_body {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for FrameBody {
                fn from(performative: $variant) -> Self {
                    FrameBody::$variant(performative)
                }
            }
        )*
    };
}

impl_from_performative_for_body!(Open, Begin, Attach, Flow, Disposition, Detach, End, Close);

impl std::fmt::Debug for FrameBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attach(arg0) => f.debug_tuple("Attach").field(arg0).finish(),
            Self::Flow(arg0) => f.debug_tuple("Flow").field(arg0).finish(),
            Self::Transfer {
                performative,
                payload,
            } => f
                .debug_struct("Transfer")
                .field("performative", performative)
                .field("payload.len", &payload.len())
                .finish(),
            Self::Disposition(arg0) => f.debug_tuple("Disposition").field(arg0).finish(),
            Self::Detach(arg0) => f.debug_tuple("Detach").field(arg0).finish(),
            Self::Begin(arg0) => f.debug_tuple("Begin").field(arg0).finish(),
            Self::End(arg0) => f.debug_tuple("End").field(arg0).finish(),
            Self::Open(arg0) => f.debug_tuple("Open").field(arg0).finish(),
            Self::Close(arg0) => f.debug_tuple("Close").field(arg0).finish(),
            Self::Empty => write!(f, "Empty"),
        }
    }
}

fn write_header(dst: &mut BytesMut, channel: u16) {
    // extended headers are never written, doff is always 2
    dst.put_u8(2);
    dst.put_u8(FRAME_TYPE_AMQP);
    dst.put_u16(channel);
}

/// Encoder and decoder of the bytes that follow the 4 byte size field of a frame
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec {}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        write_header(dst, item.channel);
        let (performative, payload) = match item.body.into_performative() {
            Some(parts) => parts,
            None => return Ok(()),
        };
        encode(&performative, dst).map_err(Error::Encode)?;
        dst.put(payload);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FRAME_HEADER_SIZE - 4 {
            return Err(Error::Truncated);
        }
        let doff = src.get_u8();
        let ftype = src.get_u8();
        let channel = src.get_u16();

        if ftype != FRAME_TYPE_AMQP {
            return Err(Error::UnsupportedFrameType(ftype));
        }
        if doff < 2 {
            return Err(Error::InvalidDataOffset(doff));
        }
        let extended = doff as usize * 4 - FRAME_HEADER_SIZE;
        if src.len() < extended {
            return Err(Error::InvalidDataOffset(doff));
        }
        src.advance(extended);

        if src.is_empty() {
            return Ok(Some(Frame::empty_on(channel)));
        }

        let (performative, consumed) = decode::<Performative>(&src[..]).map_err(Error::Decode)?;
        src.advance(consumed);

        let body = match performative {
            Performative::Transfer(performative) => FrameBody::Transfer {
                performative,
                payload: src.split().freeze(),
            },
            other => FrameBody::from(other),
        };
        Ok(Some(Frame { channel, body }))
    }
}

impl Frame {
    fn empty_on(channel: u16) -> Self {
        Self {
            channel,
            body: FrameBody::Empty,
        }
    }
}

/// Splits a transfer whose payload does not fit in one frame of `max_frame_size` bytes into
/// a sequence of transfers. Every transfer but the last carries `more = true` and only the
/// first carries the delivery id, tag, format and settled flag.
pub fn split_transfer(
    mut transfer: Transfer,
    mut payload: Payload,
    max_frame_size: usize,
) -> Result<Vec<(Transfer, Payload)>, fe2o3_amqp_codec::Error> {
    let max_body_size = max_frame_size.saturating_sub(FRAME_HEADER_SIZE);
    let encoded_len = |transfer: &Transfer| -> Result<usize, fe2o3_amqp_codec::Error> {
        let mut buf = BytesMut::new();
        encode(transfer, &mut buf)?;
        Ok(buf.len())
    };

    if encoded_len(&transfer)? + payload.len() <= max_body_size {
        return Ok(vec![(transfer, payload)]);
    }

    let orig_more = transfer.more;
    let mut frames = Vec::new();

    transfer.more = true;
    let split_index = max_body_size.saturating_sub(encoded_len(&transfer)?).max(1);
    let first = payload.split_to(split_index.min(payload.len()));
    frames.push((transfer.clone(), first));

    transfer.delivery_id = None;
    transfer.delivery_tag = None;
    transfer.message_format = None;
    transfer.settled = None;
    transfer.rcv_settle_mode = None;
    transfer.state = None;
    let split_index = max_body_size.saturating_sub(encoded_len(&transfer)?).max(1);

    while payload.len() > split_index {
        let partial = payload.split_to(split_index);
        frames.push((transfer.clone(), partial));
    }

    transfer.more = orig_more;
    frames.push((transfer, payload));
    Ok(frames)
}
