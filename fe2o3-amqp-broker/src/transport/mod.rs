//! Framing of the byte stream after the protocol header exchange

pub mod protocol_header;

mod error;
pub use error::{Error, NegotiationError};

use std::task::Poll;

use bytes::{Bytes, BytesMut};
use futures_util::{Sink, Stream};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{
    Decoder, Encoder, Framed, LengthDelimitedCodec, LengthDelimitedCodecError,
};

use crate::frames::amqp::{Frame, FrameCodec};

pin_project! {
    /// A stream and sink of AMQP frames over a byte stream whose protocol header has
    /// already been exchanged
    #[derive(Debug)]
    pub struct Transport<Io> {
        #[pin]
        framed: Framed<Io, LengthDelimitedCodec>,
    }
}

impl<Io> Transport<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    /// Bind the transport to the byte stream. Incoming frames larger than `max_frame_size`
    /// are reported as [`Error::MaxFrameSizeExceeded`]
    ///
    /// The limit is checked against the raw size field, which already counts its own 4 bytes.
    pub fn bind(io: Io, max_frame_size: usize) -> Self {
        let framed = LengthDelimitedCodec::builder()
            .big_endian()
            .length_field_length(4)
            .max_frame_length(max_frame_size)
            .length_adjustment(-4)
            .new_framed(io);
        Self { framed }
    }

    /// Consumes the transport, returning the underlying byte stream
    pub fn into_inner(self) -> Io {
        self.framed.into_inner()
    }
}

fn is_max_frame_size_exceeded(err: &std::io::Error) -> bool {
    err.get_ref()
        .map(|inner| inner.is::<LengthDelimitedCodecError>())
        .unwrap_or(false)
}

impl<Io> Sink<Frame> for Transport<Io>
where
    Io: AsyncWrite + Unpin,
{
    type Error = Error;

    fn poll_ready(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        Sink::<Bytes>::poll_ready(this.framed, cx).map_err(Into::into)
    }

    fn start_send(self: std::pin::Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        let mut bytesmut = BytesMut::new();
        let mut encoder = FrameCodec {};
        encoder.encode(item, &mut bytesmut)?;

        let this = self.project();
        Sink::<Bytes>::start_send(this.framed, Bytes::from(bytesmut)).map_err(Into::into)
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        Sink::<Bytes>::poll_flush(this.framed, cx).map_err(Into::into)
    }

    fn poll_close(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        Sink::<Bytes>::poll_close(this.framed, cx).map_err(Into::into)
    }
}

impl<Io> Stream for Transport<Io>
where
    Io: AsyncRead + Unpin,
{
    type Item = Result<Frame, Error>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.framed.poll_next(cx) {
            Poll::Ready(Some(Ok(mut src))) => {
                let mut decoder = FrameCodec {};
                Poll::Ready(decoder.decode(&mut src).map_err(Into::into).transpose())
            }
            Poll::Ready(Some(Err(err))) => {
                if is_max_frame_size_exceeded(&err) {
                    Poll::Ready(Some(Err(Error::MaxFrameSizeExceeded)))
                } else {
                    Poll::Ready(Some(Err(err.into())))
                }
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
