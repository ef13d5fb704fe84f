//! Implements the protocol headers

use std::convert::TryFrom;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::NegotiationError;

const PROTOCOL_HEADER_PREFIX: &[u8; 4] = b"AMQP";

/// Protocol header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolHeader {
    /// Protocol ID
    pub id: ProtocolId,

    /// Major number
    pub major: u8,

    /// Minor number
    pub minor: u8,

    /// Revision number
    pub revision: u8,
}

impl Default for ProtocolHeader {
    fn default() -> Self {
        Self::amqp()
    }
}

impl ProtocolHeader {
    /// Creates a new protocol header
    pub fn new(id: ProtocolId, major: u8, minor: u8, revision: u8) -> Self {
        Self {
            id,
            major,
            minor,
            revision,
        }
    }

    /// The plain AMQP 1.0.0 header, the only header the engine accepts
    pub fn amqp() -> Self {
        Self::new(
            ProtocolId::Amqp,
            fe2o3_amqp_types::definitions::MAJOR,
            fe2o3_amqp_types::definitions::MINOR,
            fe2o3_amqp_types::definitions::REVISION,
        )
    }

    /// Returns whether the protocol id is AMQP
    pub fn is_amqp(&self) -> bool {
        matches!(self.id, ProtocolId::Amqp)
    }

    /// Returns whether the protocol id is TLS
    pub fn is_tls(&self) -> bool {
        matches!(self.id, ProtocolId::Tls)
    }

    /// Returns whether the protocol id is SASL
    pub fn is_sasl(&self) -> bool {
        matches!(self.id, ProtocolId::Sasl)
    }
}

impl From<ProtocolHeader> for [u8; 8] {
    fn from(value: ProtocolHeader) -> Self {
        [
            PROTOCOL_HEADER_PREFIX[0],
            PROTOCOL_HEADER_PREFIX[1],
            PROTOCOL_HEADER_PREFIX[2],
            PROTOCOL_HEADER_PREFIX[3],
            value.id as u8,
            value.major,
            value.minor,
            value.revision,
        ]
    }
}

impl From<ProtocolHeader> for Bytes {
    fn from(header: ProtocolHeader) -> Self {
        let bytes: [u8; 8] = header.into();
        Bytes::copy_from_slice(&bytes[..])
    }
}

impl TryFrom<[u8; 8]> for ProtocolHeader {
    type Error = [u8; 8];

    fn try_from(v: [u8; 8]) -> Result<Self, Self::Error> {
        if &v[..4] != PROTOCOL_HEADER_PREFIX {
            return Err(v);
        }
        let id = ProtocolId::try_from(v[4]).map_err(|_| v)?;
        Ok(Self::new(id, v[5], v[6], v[7]))
    }
}

/// Protocol ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtocolId {
    /// AMQP
    Amqp = 0x0,

    /// TLS
    Tls = 0x2,

    /// SASL
    Sasl = 0x3,
}

impl TryFrom<u8> for ProtocolId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(Self::Amqp),
            0x2 => Ok(Self::Tls),
            0x3 => Ok(Self::Sasl),
            _ => Err(value),
        }
    }
}

/// Reads the 8 byte header of the peer and answers with our own header.
///
/// Our header is written even if the peer's header is not the plain AMQP 1.0.0 header, so
/// that the peer learns which protocol is supported before the stream is closed.
pub async fn negotiate<Io>(io: &mut Io) -> Result<ProtocolHeader, NegotiationError>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    let mut inbound = [0u8; 8];
    io.read_exact(&mut inbound).await?;

    let ours = ProtocolHeader::amqp();
    let buf: [u8; 8] = ours.clone().into();
    io.write_all(&buf).await?;
    io.flush().await?;

    match ProtocolHeader::try_from(inbound) {
        Ok(incoming) if incoming == ours => Ok(incoming),
        _ => Err(NegotiationError::ProtocolHeaderMismatch(inbound)),
    }
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use tokio_test::io::Builder;

    use crate::transport::NegotiationError;

    use super::{negotiate, ProtocolHeader, ProtocolId};

    #[test]
    fn header_bytes() {
        let buf: [u8; 8] = ProtocolHeader::amqp().into();
        assert_eq!(&buf, b"AMQP\x00\x01\x00\x00");

        let sasl = ProtocolHeader::try_from(*b"AMQP\x03\x01\x00\x00").unwrap();
        assert!(sasl.is_sasl());
        assert_eq!(sasl.id, ProtocolId::Sasl);

        assert!(ProtocolHeader::try_from(*b"HTTP/1.1").is_err());
        assert!(ProtocolHeader::try_from(*b"AMQP\x01\x01\x00\x00").is_err());
    }

    #[tokio::test]
    async fn matching_header_is_accepted() {
        let mut mock = Builder::new()
            .read(b"AMQP\x00\x01\x00\x00")
            .write(b"AMQP\x00\x01\x00\x00")
            .build();
        let header = negotiate(&mut mock).await.unwrap();
        assert!(header.is_amqp());
    }

    #[tokio::test]
    async fn sasl_header_is_answered_then_rejected() {
        let mut mock = Builder::new()
            .read(b"AMQP\x03\x01\x00\x00")
            .write(b"AMQP\x00\x01\x00\x00")
            .build();
        match negotiate(&mut mock).await {
            Err(NegotiationError::ProtocolHeaderMismatch(buf)) => {
                assert_eq!(&buf, b"AMQP\x03\x01\x00\x00")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn tls_header_is_rejected() {
        let mut mock = Builder::new()
            .read(b"AMQP\x02\x01\x00\x00")
            .write(b"AMQP\x00\x01\x00\x00")
            .build();
        assert!(matches!(
            negotiate(&mut mock).await,
            Err(NegotiationError::ProtocolHeaderMismatch(_))
        ));
    }
}
