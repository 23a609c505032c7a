use dnsrelay_proto::packet::question::DnsClass;
use dnsrelay_proto::packet::QueryType;

/// A domain name in canonical form: lowercase, dot-terminated.
///
/// The wire codec already lowercases labels as it reads them; `canonicalize`
/// additionally guarantees the trailing dot so names coming from the hosts
/// file, the record store, and the wire all compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(String);

impl Name {
    pub fn canonicalize(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        if lower.ends_with('.') {
            Self(lower)
        } else {
            Self(format!("{lower}."))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Primary key for the answer cache and the pending-answer lookups: an
/// owner name together with the query type and class that were asked.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QKey {
    pub name: Name,
    pub qtype: QueryType,
    pub qclass: DnsClass,
}

impl QKey {
    pub fn new(name: Name, qtype: QueryType, qclass: DnsClass) -> Self {
        Self {
            name,
            qtype,
            qclass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_lowercase_and_terminate_with_a_dot() {
        assert_eq!(Name::canonicalize("Example.COM").as_str(), "example.com.");
        assert_eq!(Name::canonicalize("example.com.").as_str(), "example.com.");
    }
}
