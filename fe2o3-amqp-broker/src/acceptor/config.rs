//! Configuration of accepted connections

use fe2o3_amqp_types::definitions::{Milliseconds, MIN_MAX_FRAME_SIZE};
use serde::{Deserialize, Serialize};

/// Default max frame size
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 256 * 1024;

/// Default channel max
pub const DEFAULT_CHANNEL_MAX: u16 = 255;

/// Default incoming and outgoing session window
pub const DEFAULT_WINDOW: u32 = 2048;

/// Default handle max of a session
pub const DEFAULT_HANDLE_MAX: u32 = 1023;

/// Default credit granted to a sending peer
pub const DEFAULT_LINK_CREDIT: u32 = 100;

/// Default buffer size of the control channel of a connection
pub const DEFAULT_BUFFER_SIZE: usize = 64;

/// Configuration of the connections accepted by a [`super::ConnectionAcceptor`]
///
/// Missing fields take their default values when deserialized.
///
/// ```rust
/// use fe2o3_amqp_broker::acceptor::AcceptorConfig;
///
/// let config: AcceptorConfig = serde_json::from_str(r#"{
///     "container-id": "broker",
///     "anonymous-relay": false,
///     "link": { "credit": 10 }
/// }"#).unwrap();
/// assert_eq!(config.link.credit, 10);
/// assert!(config.transactions);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AcceptorConfig {
    /// Container id sent in the open
    pub container_id: String,

    /// Largest frame accepted from the peer. Values below 512 are raised to 512.
    pub max_frame_size: u32,

    /// Highest channel number the peer may use
    pub channel_max: u16,

    /// Idle timeout advertised in the open
    pub idle_time_out: Option<Milliseconds>,

    /// Whether links without a target address are accepted and `ANONYMOUS-RELAY` is offered
    pub anonymous_relay: bool,

    /// Whether coordinator links are accepted
    pub transactions: bool,

    /// Session settings
    pub session: SessionConfig,

    /// Link settings
    pub link: LinkConfig,

    /// Buffer size of the control channel between the handle and the engine
    pub buffer_size: usize,
}

impl Default for AcceptorConfig {
    fn default() -> Self {
        Self {
            container_id: format!("fe2o3-amqp-broker-{}", uuid::Uuid::new_v4()),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            channel_max: DEFAULT_CHANNEL_MAX,
            idle_time_out: None,
            anonymous_relay: true,
            transactions: true,
            session: SessionConfig::default(),
            link: LinkConfig::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl AcceptorConfig {
    /// The max frame size with the lower bound applied
    pub fn local_max_frame_size(&self) -> u32 {
        std::cmp::max(self.max_frame_size, MIN_MAX_FRAME_SIZE as u32)
    }
}

/// Session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionConfig {
    /// Incoming window restored on every flow sent
    pub incoming_window: u32,

    /// Outgoing window announced in begin and flow
    pub outgoing_window: u32,

    /// Highest handle the peer may use
    pub handle_max: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            incoming_window: DEFAULT_WINDOW,
            outgoing_window: DEFAULT_WINDOW,
            handle_max: DEFAULT_HANDLE_MAX,
        }
    }
}

/// Link settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LinkConfig {
    /// Credit granted to sending peers
    pub credit: u32,

    /// Largest message accepted, unlimited if `None`
    pub max_message_size: Option<u64>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            credit: DEFAULT_LINK_CREDIT,
            max_message_size: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AcceptorConfig, DEFAULT_LINK_CREDIT, DEFAULT_MAX_FRAME_SIZE, DEFAULT_WINDOW};

    #[test]
    fn missing_fields_take_defaults() {
        let config: AcceptorConfig = serde_json::from_str(r#"{ "container-id": "b" }"#).unwrap();
        assert_eq!(config.container_id, "b");
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
        assert_eq!(config.session.incoming_window, DEFAULT_WINDOW);
        assert_eq!(config.link.credit, DEFAULT_LINK_CREDIT);
        assert!(config.anonymous_relay);
        assert!(config.transactions);
    }

    #[test]
    fn nested_fields_are_kebab_case() {
        let config: AcceptorConfig = serde_json::from_str(
            r#"{
                "session": { "handle-max": 7, "incoming-window": 4 },
                "link": { "max-message-size": 1024 },
                "idle-time-out": 30000
            }"#,
        )
        .unwrap();
        assert_eq!(config.session.handle_max, 7);
        assert_eq!(config.session.incoming_window, 4);
        assert_eq!(config.session.outgoing_window, DEFAULT_WINDOW);
        assert_eq!(config.link.max_message_size, Some(1024));
        assert_eq!(config.idle_time_out, Some(30000));
    }

    #[test]
    fn max_frame_size_has_a_lower_bound() {
        let config = AcceptorConfig {
            max_frame_size: 16,
            ..Default::default()
        };
        assert_eq!(config.local_max_frame_size(), 512);
    }
}
