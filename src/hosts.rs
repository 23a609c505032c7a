use std::collections::HashMap;
use std::net::IpAddr;

use dnsrelay_proto::packet::question::DnsClass;
use dnsrelay_proto::packet::record::Record;
use dnsrelay_proto::packet::QueryType;

use crate::name::{Name, QKey};

/// A static name -> address table loaded once at startup, consulted after
/// the cache and before the authoritative record store.
#[derive(Debug, Default)]
pub struct HostsMap {
    inner: HashMap<QKey, Record>,
}

impl HostsMap {
    pub fn parse(input: &str) -> Self {
        let mut inner = HashMap::new();
        for line in input.lines() {
            let line = match line.split_once('#') {
                Some((before, _)) => before,
                None => line,
            };
            let mut tokens = line.split_whitespace();
            let Some(addr_token) = tokens.next() else {
                continue;
            };
            let Ok(addr) = addr_token.parse::<IpAddr>() else {
                continue;
            };

            for name_token in tokens {
                let name = Name::canonicalize(name_token);
                let record = match addr {
                    IpAddr::V4(addr) => Record::A {
                        domain: name.as_str().to_string(),
                        addr,
                        ttl: 0,
                    },
                    IpAddr::V6(addr) => Record::AAAA {
                        domain: name.as_str().to_string(),
                        addr,
                        ttl: 0,
                    },
                };
                let qtype = match addr {
                    IpAddr::V4(_) => QueryType::A,
                    IpAddr::V6(_) => QueryType::AAAA,
                };
                inner.insert(QKey::new(name, qtype, DnsClass::Internet), record);
            }
        }
        Self { inner }
    }

    pub fn lookup(&self, key: &QKey) -> Option<Record> {
        self.inner.get(key).cloned()
    }
}
