use crate::models::{CorrelationHint, HintSource, OrderKey, PaymentEvent};

/// Prefixes processors accept on namespaced external ids (`ORDER_123`).
const ORDER_PREFIXES: &[&str] = &["ORDER_", "order_"];

/// Values that leak out of loosely-typed checkout code instead of an id.
const PLACEHOLDER_VALUES: &[&str] = &["null", "undefined", "none", "nan"];

/// An order id derived from an event, plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOrderId {
    pub raw: String,
    pub source: HintSource,
}

impl ResolvedOrderId {
    /// Store keys to try, in order: as given, then as an integer.
    pub fn candidates(&self) -> Vec<OrderKey> {
        OrderKey::candidates(&self.raw)
    }
}

/// Derive the internal order id from an event's correlation hints.
///
/// Hints are tried by source priority (metadata, external reference,
/// prefixed external id, query string), keeping the adapter's order within a
/// source, and the first usable value wins. Returns `None` rather than
/// guessing when nothing usable is present.
pub fn resolve_order_id(event: &PaymentEvent) -> Option<ResolvedOrderId> {
    let mut hints: Vec<&CorrelationHint> = event.correlation_hints.iter().collect();
    hints.sort_by_key(|h| h.source);

    hints.into_iter().find_map(|hint| {
        normalize(hint).map(|raw| ResolvedOrderId {
            raw,
            source: hint.source,
        })
    })
}

fn normalize(hint: &CorrelationHint) -> Option<String> {
    let value = hint.value.trim();
    let value = match hint.source {
        HintSource::PrefixedExternalId => strip_order_prefix(value)?,
        _ => value,
    };

    if value.is_empty() || PLACEHOLDER_VALUES.contains(&value.to_lowercase().as_str()) {
        return None;
    }
    Some(value.to_string())
}

/// `ORDER_123` -> `123`. Ids without a known prefix are not ours.
pub fn strip_order_prefix(value: &str) -> Option<&str> {
    ORDER_PREFIXES
        .iter()
        .find_map(|p| value.strip_prefix(p))
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentStatus, Provider};

    fn event(hints: &[(HintSource, &str)]) -> PaymentEvent {
        let mut e = PaymentEvent::new(Provider::AbacatePay, "billing.paid", PaymentStatus::Confirmed);
        for (source, value) in hints {
            e.hint(*source, Some(value.to_string()));
        }
        e
    }

    #[test]
    fn test_metadata_beats_prefixed_external_id() {
        let e = event(&[
            (HintSource::PrefixedExternalId, "ORDER_9"),
            (HintSource::Metadata, "7"),
        ]);
        let resolved = resolve_order_id(&e).unwrap();
        assert_eq!(resolved.raw, "7");
        assert_eq!(resolved.source, HintSource::Metadata);
    }

    #[test]
    fn test_external_reference_is_trimmed() {
        let e = event(&[(HintSource::ExternalReference, "  100 \n")]);
        assert_eq!(resolve_order_id(&e).unwrap().raw, "100");
    }

    #[test]
    fn test_prefix_is_stripped() {
        let e = event(&[(HintSource::PrefixedExternalId, "ORDER_123")]);
        assert_eq!(resolve_order_id(&e).unwrap().raw, "123");
    }

    #[test]
    fn test_unprefixed_external_id_is_skipped() {
        let e = event(&[
            (HintSource::PrefixedExternalId, "cus_abc"),
            (HintSource::QueryParam, "55"),
        ]);
        let resolved = resolve_order_id(&e).unwrap();
        assert_eq!(resolved.raw, "55");
        assert_eq!(resolved.source, HintSource::QueryParam);
    }

    #[test]
    fn test_blank_and_placeholder_values_fall_through() {
        let e = event(&[
            (HintSource::Metadata, "   "),
            (HintSource::Metadata, "undefined"),
            (HintSource::ExternalReference, "null"),
            (HintSource::QueryParam, "12"),
        ]);
        assert_eq!(resolve_order_id(&e).unwrap().raw, "12");
    }

    #[test]
    fn test_first_hint_within_source_wins() {
        let e = event(&[(HintSource::Metadata, "a"), (HintSource::Metadata, "b")]);
        assert_eq!(resolve_order_id(&e).unwrap().raw, "a");
    }

    #[test]
    fn test_no_hints_resolves_nothing() {
        assert!(resolve_order_id(&event(&[])).is_none());
        assert!(resolve_order_id(&event(&[(HintSource::PrefixedExternalId, "ORDER_")])).is_none());
    }

    #[test]
    fn test_candidates_include_numeric_coercion() {
        let resolved = ResolvedOrderId {
            raw: "42".into(),
            source: HintSource::Metadata,
        };
        assert_eq!(
            resolved.candidates(),
            vec![OrderKey::Text("42".into()), OrderKey::Integer(42)]
        );
    }
}
