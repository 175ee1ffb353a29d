//! Static dictionaries mapping recorded namespaces and methods to their on-tape ids.
//!
//! Several namespaces may share one id (`eth` and `ftm` are aliases). Decoding always
//! yields the first name registered for an id.

/// Namespace flag of the Ethereum-compatible API.
pub const ETH_NAMESPACE: u8 = 1 << 0;

const NAMESPACES: &[(&str, u8)] = &[("eth", ETH_NAMESPACE), ("ftm", ETH_NAMESPACE)];

const ETH_METHODS: &[(&str, u8)] = &[
    ("call", 1),
    ("estimateGas", 2),
    ("getBalance", 3),
    ("getCode", 4),
    ("getStorageAt", 5),
    ("getTransactionCount", 6),
    ("getLogs", 7),
    ("getProof", 8),
];

const METHODS: &[(u8, &[(&str, u8)])] = &[(ETH_NAMESPACE, ETH_METHODS)];

pub fn namespace_id(name: &str) -> Option<u8> {
    NAMESPACES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, id)| *id)
}

pub fn namespace_name(id: u8) -> Option<&'static str> {
    NAMESPACES.iter().find(|(_, i)| *i == id).map(|(n, _)| *n)
}

fn methods_of(namespace_id: u8) -> Option<&'static [(&'static str, u8)]> {
    METHODS
        .iter()
        .find(|(ns, _)| *ns == namespace_id)
        .map(|(_, methods)| *methods)
}

pub fn method_id(namespace_id: u8, name: &str) -> Option<u8> {
    methods_of(namespace_id)?
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, id)| *id)
}

pub fn method_name(namespace_id: u8, id: u8) -> Option<&'static str> {
    methods_of(namespace_id)?
        .iter()
        .find(|(_, i)| *i == id)
        .map(|(n, _)| *n)
}

/// Whether the given namespace and method pair has a representation on tape.
pub fn can_record(namespace: &str, method: &str) -> bool {
    namespace_id(namespace).is_some_and(|ns| method_id(ns, method).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_share_an_id_and_decode_to_canonical_name() {
        assert_eq!(namespace_id("eth"), Some(ETH_NAMESPACE));
        assert_eq!(namespace_id("ftm"), Some(ETH_NAMESPACE));
        assert_eq!(namespace_name(ETH_NAMESPACE), Some("eth"));
        assert_eq!(namespace_id("debug"), None);
    }

    #[test]
    fn method_lookup_is_two_way() {
        for (name, id) in ETH_METHODS {
            assert_eq!(method_id(ETH_NAMESPACE, name), Some(*id));
            assert_eq!(method_name(ETH_NAMESPACE, *id), Some(*name));
        }
        assert_eq!(method_name(ETH_NAMESPACE, 0), None);
        assert_eq!(method_name(ETH_NAMESPACE, 9), None);
        assert_eq!(method_id(0b100, "call"), None);
    }

    #[test]
    fn recordable_pairs() {
        assert!(can_record("ftm", "getBalance"));
        assert!(can_record("eth", "getProof"));
        assert!(!can_record("eth", "sendRawTransaction"));
        assert!(!can_record("web3", "clientVersion"));
    }
}
