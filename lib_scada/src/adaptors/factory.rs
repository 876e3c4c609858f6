//! Transport kind → adaptor.
//!
//! Construction never fails: an unknown kind or an unusable configuration
//! yields a Manual adaptor, and the reason is handed back so the caller can
//! report it.

use crate::core::model::{Params, TransportKind};

use super::{
    Adaptor, AdaptorError, ManualAdaptor, PollingAdaptor, PollingConfig, PubSubAdaptor, PubSubConfig,
    PushSocketAdaptor,
};

/// Why the factory substituted a Manual adaptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Fallback {
    UnknownKind(String),
    Invalid(AdaptorError),
}

/// Builds the adaptor for `kind`, falling back to Manual when the kind is
/// unknown or its configuration is rejected.
pub fn resolve_adaptor(kind: &TransportKind, url: Option<&str>, params: &Params) -> (Adaptor, Option<Fallback>) {
    let built = match kind {
        TransportKind::Http => PollingConfig::from_params(url, params)
            .and_then(PollingAdaptor::new)
            .map(Adaptor::Polling),
        TransportKind::Ws => PushSocketAdaptor::new(url).map(Adaptor::PushSocket),
        TransportKind::Mqtt => PubSubConfig::from_params(url, params)
            .map(PubSubAdaptor::new)
            .map(Adaptor::PubSub),
        TransportKind::Manual => Ok(Adaptor::Manual(ManualAdaptor::new())),
        TransportKind::Unknown(name) => {
            log::debug!("Unknown transport '{}', using a manual adaptor", name);
            return (
                Adaptor::Manual(ManualAdaptor::new()),
                Some(Fallback::UnknownKind(name.clone())),
            );
        }
    };

    match built {
        Ok(adaptor) => (adaptor, None),
        Err(e) => {
            log::debug!("Cannot build {} adaptor ({}), using a manual adaptor", kind, e);
            (Adaptor::Manual(ManualAdaptor::new()), Some(Fallback::Invalid(e)))
        }
    }
}

/// Same as [`resolve_adaptor`] without the fallback reason.
pub fn create_adaptor(kind: &TransportKind, url: Option<&str>, params: &Params) -> Adaptor {
    resolve_adaptor(kind, url, params).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_map_to_their_variant() {
        let params = Params::new();
        assert_eq!(create_adaptor(&TransportKind::Manual, None, &params).kind(), "manual");
        assert_eq!(
            create_adaptor(&TransportKind::Http, Some("http://localhost/x"), &params).kind(),
            "polling"
        );
        assert_eq!(
            create_adaptor(&TransportKind::Ws, Some("ws://localhost/x"), &params).kind(),
            "push-socket"
        );
        assert_eq!(
            create_adaptor(&TransportKind::Mqtt, Some("mqtt://localhost"), &params).kind(),
            "pubsub"
        );
    }

    #[test]
    fn unknown_or_broken_declarations_fall_back_to_manual() {
        let params = Params::new();
        let (adaptor, fallback) = resolve_adaptor(&TransportKind::from("carrier-pigeon"), None, &params);
        assert!(adaptor.as_manual().is_some());
        assert_eq!(fallback, Some(Fallback::UnknownKind("carrier-pigeon".to_string())));

        let (adaptor, fallback) = resolve_adaptor(&TransportKind::Ws, None, &params);
        assert!(adaptor.as_manual().is_some());
        assert_eq!(fallback, Some(Fallback::Invalid(AdaptorError::MissingUrl { kind: "ws" })));
    }
}
