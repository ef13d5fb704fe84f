//! Failure handling shared by anonymous relay, transactions and decoding

use fe2o3_amqp_codec::primitives::Symbol;
use fe2o3_amqp_types::{
    definitions,
    messaging::{outcome_symbols, Source},
};

/// What to do with a delivery that could not be routed
#[derive(Debug, Clone, PartialEq)]
pub enum FailureAction {
    /// Settle the delivery with a rejected outcome carrying the error. The link stays
    /// attached.
    Reject(definitions::Error),

    /// Detach the link with the error
    Detach(definitions::Error),
}

/// Decides how a delivery-local failure is reported.
///
/// | settled | source supports `rejected` | action |
/// |---------|----------------------------|--------|
/// | true    | any                        | detach |
/// | false   | true                       | reject |
/// | false   | false                      | detach |
pub fn on_routing_failure(
    settled: bool,
    supports_rejected: bool,
    error: definitions::Error,
) -> FailureAction {
    match (settled, supports_rejected) {
        (true, _) => FailureAction::Detach(error),
        (false, true) => FailureAction::Reject(error),
        (false, false) => FailureAction::Detach(error),
    }
}

/// Outcomes the source of a link accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedOutcomes(Vec<Symbol>);

impl SupportedOutcomes {
    /// Whether the outcome with the symbolic descriptor `name` is supported
    pub fn supports(&self, name: &str) -> bool {
        self.0.iter().any(|symbol| symbol.as_str() == name)
    }

    /// Whether `amqp:rejected:list` is supported
    pub fn supports_rejected(&self) -> bool {
        self.supports(outcome_symbols::REJECTED)
    }
}

/// The outcomes listed by the source, or the accepted outcome plus the default outcome if
/// the source does not list any. A link without a source supports only accepted.
pub fn supported_outcomes(source: Option<&Source>) -> SupportedOutcomes {
    let source = match source {
        Some(source) => source,
        None => return SupportedOutcomes(vec![Symbol::from(outcome_symbols::ACCEPTED)]),
    };

    if let Some(outcomes) = &source.outcomes {
        return SupportedOutcomes(outcomes.iter().cloned().collect());
    }

    let mut outcomes = vec![Symbol::from(outcome_symbols::ACCEPTED)];
    if let Some(default_outcome) = &source.default_outcome {
        let name = default_outcome.descriptor_name();
        if name != outcome_symbols::ACCEPTED {
            outcomes.push(Symbol::from(name));
        }
    }
    SupportedOutcomes(outcomes)
}

#[cfg(test)]
mod tests {
    use fe2o3_amqp_codec::primitives::{Array, Symbol};
    use fe2o3_amqp_types::{
        definitions::{self, AmqpError},
        messaging::{outcome_symbols, Outcome, Released, Source},
    };

    use super::{on_routing_failure, supported_outcomes, FailureAction};

    fn not_found() -> definitions::Error {
        definitions::Error::with_condition(AmqpError::NotFound)
    }

    #[test]
    fn failure_matrix() {
        assert_eq!(
            on_routing_failure(true, true, not_found()),
            FailureAction::Detach(not_found())
        );
        assert_eq!(
            on_routing_failure(true, false, not_found()),
            FailureAction::Detach(not_found())
        );
        assert_eq!(
            on_routing_failure(false, true, not_found()),
            FailureAction::Reject(not_found())
        );
        assert_eq!(
            on_routing_failure(false, false, not_found()),
            FailureAction::Detach(not_found())
        );
    }

    #[test]
    fn listed_outcomes_win() {
        let source = Source {
            outcomes: Some(Array(vec![
                Symbol::from(outcome_symbols::ACCEPTED),
                Symbol::from(outcome_symbols::REJECTED),
            ])),
            default_outcome: Some(Outcome::Released(Released {})),
            ..Default::default()
        };
        let supported = supported_outcomes(Some(&source));
        assert!(supported.supports_rejected());
        assert!(!supported.supports(outcome_symbols::RELEASED));
    }

    #[test]
    fn default_outcome_is_supported() {
        let source = Source {
            default_outcome: Some(Outcome::Released(Released {})),
            ..Default::default()
        };
        let supported = supported_outcomes(Some(&source));
        assert!(supported.supports(outcome_symbols::ACCEPTED));
        assert!(supported.supports(outcome_symbols::RELEASED));
        assert!(!supported.supports_rejected());
    }

    #[test]
    fn missing_source_supports_accepted() {
        let supported = supported_outcomes(None);
        assert!(supported.supports(outcome_symbols::ACCEPTED));
        assert!(!supported.supports_rejected());
    }
}
