use std::net::SocketAddr;
use std::sync::Arc;

use dnsrelay_proto::buffer::BytePacketBuffer;
use dnsrelay_proto::packet::header::ResponseCode;
use dnsrelay_proto::packet::record::Record;
use dnsrelay_proto::packet::DnsPacket;
use dnsrelay_resolver::prelude::Forwarder;
use dnsrelay_transport::prelude::Message;

use crate::cache::AnswerCache;
use crate::error::HandleError;
use crate::hosts::HostsMap;
use crate::name::{Name, QKey};
use crate::store;

/// TTL given to a hosts-map answer once it's copied into the cache. The
/// hosts map itself stores its records with `ttl: 0` (a static entry has no
/// expiry of its own), but the cache's per-second sweep evicts anything
/// whose ttl is already zero on the very next tick, so a cached copy needs
/// a real, non-zero value.
const HOSTS_CACHE_TTL: u32 = 60;

pub struct DnsHandler {
    cache: Arc<AnswerCache>,
    hosts: Arc<HostsMap>,
    store: store::Pool,
    forwarder: Arc<dyn Forwarder>,
}

impl DnsHandler {
    pub fn new(
        cache: Arc<AnswerCache>,
        hosts: Arc<HostsMap>,
        store: store::Pool,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        Self {
            cache,
            hosts,
            store,
            forwarder,
        }
    }

    /// Looks up `key` in the authoritative store, chasing one CNAME hop when
    /// the owner name itself only has an alias on file.
    async fn resolve_authoritative(&self, key: &QKey) -> Result<Vec<Record>, HandleError> {
        let all = store::records_by_name(&self.store, &key.name).await?;
        let direct: Vec<Record> = all
            .iter()
            .filter(|record| record.qtype() == key.qtype)
            .cloned()
            .collect();
        if !direct.is_empty() {
            return Ok(direct);
        }

        let Some(alias) = all.iter().find(|record| matches!(record, Record::CNAME { .. })) else {
            return Ok(Vec::new());
        };
        let Record::CNAME { host, .. } = alias else {
            unreachable!()
        };
        let target = Name::canonicalize(host);
        let target_key = QKey::new(target.clone(), key.qtype, key.qclass);
        let target_records = store::records_by_name(&self.store, &target).await?;
        let mut chased: Vec<Record> = target_records
            .into_iter()
            .filter(|record| record.qtype() == target_key.qtype)
            .collect();
        if chased.is_empty() {
            return Ok(Vec::new());
        }
        let mut answers = vec![alias.clone()];
        answers.append(&mut chased);
        Ok(answers)
    }

    async fn try_handle(
        &self,
        client: SocketAddr,
        request: &DnsPacket,
    ) -> Result<Option<DnsPacket>, HandleError> {
        let question = request.questions.first().ok_or(HandleError::NoQuestion)?;
        let key = QKey::new(
            Name::canonicalize(&question.name),
            question.qtype,
            question.qclass,
        );

        if let Some(records) = self.cache.get(&key).await {
            tracing::debug!(name = %key.name, "answered from cache");
            return Ok(Some(reply_with(request, records)));
        }

        if let Some(record) = self.hosts.lookup(&key) {
            tracing::debug!(name = %key.name, "answered from hosts map");
            let mut cached = record.clone();
            *cached.ttl_mut() = HOSTS_CACHE_TTL;
            self.cache.insert(key, vec![cached]).await;
            return Ok(Some(reply_with(request, vec![record])));
        }

        let records = match self.resolve_authoritative(&key).await {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(name = %key.name, "record store lookup failed, forwarding: {error}");
                Vec::new()
            }
        };
        if !records.is_empty() {
            tracing::debug!(name = %key.name, "answered from record store");
            self.cache.insert(key, records.clone()).await;
            return Ok(Some(reply_with(request, records)));
        }

        tracing::debug!(name = %key.name, "forwarding upstream");
        self.forwarder.forward(client, request.clone()).await?;
        Ok(None)
    }
}

fn reply_with(request: &DnsPacket, answers: Vec<Record>) -> DnsPacket {
    let mut reply = DnsPacket {
        questions: request.questions.clone(),
        answers,
        ..Default::default()
    };
    reply.header.id = request.header.id;
    reply.header.response = true;
    reply.header.recursion_desired = request.header.recursion_desired;
    reply.header.recursion_available = true;
    reply.header.response_code = ResponseCode::NOERROR;
    reply
}

#[async_trait::async_trait]
impl dnsrelay_transport::Handler for DnsHandler {
    #[tracing::instrument(skip_all, fields(origin = ?message.address, id = tracing::field::Empty))]
    async fn handle(&self, message: Message) -> Option<Message> {
        let Message {
            address,
            buffer,
            size: _,
        } = message;

        let mut buf = BytePacketBuffer::default();
        buf.buf = buffer;
        let request = match DnsPacket::try_from(buf) {
            Ok(packet) => packet,
            Err(error) => {
                tracing::debug!("couldn't decode packet: {error}");
                return None;
            }
        };

        tracing::Span::current().record("id", request.header.id);

        match self.try_handle(address, &request).await {
            Ok(Some(reply)) => {
                let mut buffer = reply.create_buffer().ok()?;
                Some(Message {
                    address,
                    buffer: buffer.buf,
                    size: buffer.pos(),
                })
            }
            Ok(None) => None,
            Err(HandleError::NoQuestion) => {
                tracing::debug!("query carried no question");
                None
            }
            Err(error) => {
                tracing::warn!("couldn't handle query: {error}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr};

    use dnsrelay_proto::packet::question::{DnsClass, Question};
    use dnsrelay_proto::packet::QueryType;
    use dnsrelay_resolver::mock::MockForwarder;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    fn client() -> SocketAddr {
        "127.0.0.1:53000".parse().unwrap()
    }

    fn query_for(name: &str) -> DnsPacket {
        let mut packet = DnsPacket {
            questions: vec![Question {
                name: name.into(),
                qtype: QueryType::A,
                qclass: DnsClass::Internet,
            }],
            ..Default::default()
        };
        packet.header.id = 7;
        packet.header.recursion_desired = true;
        packet
    }

    async fn empty_pool() -> store::Pool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        store::migrate(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn should_cache_a_hosts_map_answer_with_a_nonzero_ttl() {
        let hosts = HostsMap::parse("10.0.0.5 printer.lan\n");
        let handler = DnsHandler::new(
            Arc::new(AnswerCache::new(10)),
            Arc::new(hosts),
            empty_pool().await,
            Arc::new(MockForwarder::new()),
        );

        let reply = handler
            .try_handle(client(), &query_for("printer.lan"))
            .await
            .unwrap();
        assert!(reply.is_some());

        let key = QKey::new(
            Name::canonicalize("printer.lan"),
            QueryType::A,
            DnsClass::Internet,
        );
        let cached = handler.cache.get(&key).await.unwrap();
        assert_eq!(cached[0].ttl(), HOSTS_CACHE_TTL);
    }

    #[tokio::test]
    async fn should_forward_when_the_record_store_errors_instead_of_dropping_the_query() {
        let pool = empty_pool().await;
        sqlx::query("DROP TABLE dns_records")
            .execute(&pool)
            .await
            .unwrap();

        let forwarder = Arc::new(MockForwarder::new());
        let handler = DnsHandler::new(
            Arc::new(AnswerCache::new(10)),
            Arc::new(HostsMap::default()),
            pool,
            forwarder.clone(),
        );

        let reply = handler
            .try_handle(client(), &query_for("broken.example.com"))
            .await
            .unwrap();
        assert!(reply.is_none());
        assert_eq!(forwarder.forwarded().len(), 1);
    }

    #[tokio::test]
    async fn should_preserve_the_clients_id_when_answering_from_the_hosts_map() {
        let hosts = HostsMap::parse("10.0.0.5 printer.lan\n");
        let handler = DnsHandler::new(
            Arc::new(AnswerCache::new(10)),
            Arc::new(hosts),
            empty_pool().await,
            Arc::new(MockForwarder::new()),
        );

        let reply = handler
            .try_handle(client(), &query_for("printer.lan"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.header.id, 7);
    }
}
