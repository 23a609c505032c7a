use std::net::{Ipv4Addr, Ipv6Addr};

use dnsrelay_proto::packet::question::DnsClass;
use dnsrelay_proto::packet::record::Record;
use dnsrelay_proto::packet::QueryType;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{FromRow, Row};

use crate::name::Name;

pub type Pool = SqlitePool;

#[derive(Debug, serde::Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_url")]
    pub url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
        }
    }
}

impl Config {
    fn default_url() -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| String::from("sqlite::memory:"))
    }

    pub async fn build(self) -> Result<Pool, sqlx::Error> {
        let pool = SqlitePoolOptions::new().connect(&self.url).await?;
        migrate(&pool).await?;
        Ok(pool)
    }
}

/// No migration directory ships with this project; the single table the
/// store needs is created idempotently at startup instead.
pub async fn migrate(pool: &Pool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS dns_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner TEXT NOT NULL,
    rtype INTEGER NOT NULL,
    rclass INTEGER NOT NULL,
    ttl INTEGER NOT NULL,
    rdata TEXT NOT NULL
)"#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS dns_records_owner_idx ON dns_records (owner)")
        .execute(pool)
        .await?;

    Ok(())
}

struct ZoneRow {
    owner: String,
    rtype: u16,
    rclass: u16,
    ttl: u32,
    rdata: String,
}

impl FromRow<'_, SqliteRow> for ZoneRow {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            owner: row.try_get("owner")?,
            rtype: row.try_get("rtype")?,
            rclass: row.try_get("rclass")?,
            ttl: row.try_get("ttl")?,
            rdata: row.try_get("rdata")?,
        })
    }
}

fn decode(row: ZoneRow) -> Option<Record> {
    let domain = row.owner;
    match QueryType::from_num(row.rtype) {
        QueryType::A => row.rdata.parse::<Ipv4Addr>().ok().map(|addr| Record::A {
            domain,
            addr,
            ttl: row.ttl,
        }),
        QueryType::AAAA => row.rdata.parse::<Ipv6Addr>().ok().map(|addr| Record::AAAA {
            domain,
            addr,
            ttl: row.ttl,
        }),
        QueryType::CNAME => Some(Record::CNAME {
            domain,
            host: row.rdata,
            ttl: row.ttl,
        }),
        QueryType::NS => Some(Record::NS {
            domain,
            host: row.rdata,
            ttl: row.ttl,
        }),
        QueryType::MX => {
            let (priority, host) = row.rdata.split_once(' ')?;
            Some(Record::MX {
                domain,
                priority: priority.parse().ok()?,
                host: host.to_string(),
                ttl: row.ttl,
            })
        }
        QueryType::Unknown(qtype) => Some(Record::Unknown {
            domain,
            qtype,
            data_len: 0,
            ttl: row.ttl,
        }),
    }
}

fn encode(record: &Record) -> (u16, String) {
    match record {
        Record::A { addr, .. } => (QueryType::A.into_num(), addr.to_string()),
        Record::AAAA { addr, .. } => (QueryType::AAAA.into_num(), addr.to_string()),
        Record::CNAME { host, .. } => (QueryType::CNAME.into_num(), host.clone()),
        Record::NS { host, .. } => (QueryType::NS.into_num(), host.clone()),
        Record::MX { priority, host, .. } => {
            (QueryType::MX.into_num(), format!("{priority} {host}"))
        }
        Record::Unknown { qtype, .. } => (*qtype, String::new()),
    }
}

/// Looks up every record stored under `name`, regardless of type or class.
///
/// The query filters by owner name only; the caller is expected to filter
/// the returned records by (qtype, qclass) itself. Querying the store any
/// more narrowly would hide CNAME records under an A/AAAA query, breaking
/// the one-level CNAME chase the resolver pipeline relies on.
pub async fn records_by_name(pool: &Pool, name: &Name) -> Result<Vec<Record>, sqlx::Error> {
    let rows: Vec<ZoneRow> =
        sqlx::query_as("SELECT owner, rtype, rclass, ttl, rdata FROM dns_records WHERE owner = $1")
            .bind(name.as_str())
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().filter_map(decode).collect())
}

pub async fn persist(pool: &Pool, owner: &Name, qclass: DnsClass, record: &Record) -> Result<(), sqlx::Error> {
    let (rtype, rdata) = encode(record);
    sqlx::query(
        r#"INSERT INTO dns_records (owner, rtype, rclass, ttl, rdata)
VALUES ($1, $2, $3, $4, $5)"#,
    )
    .bind(owner.as_str())
    .bind(rtype)
    .bind(qclass as u16)
    .bind(record.ttl())
    .bind(rdata)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;

    async fn memory_pool() -> Pool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn should_round_trip_an_a_record() {
        let pool = memory_pool().await;
        let owner = Name::canonicalize("perdu.com");
        persist(
            &pool,
            &owner,
            DnsClass::Internet,
            &Record::A {
                domain: owner.as_str().to_string(),
                addr: Ipv4Addr::new(10, 0, 0, 1),
                ttl: 300,
            },
        )
        .await
        .unwrap();

        let found = records_by_name(&pool, &owner).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ttl(), 300);
    }

    #[tokio::test]
    async fn should_return_every_type_for_the_owner_and_let_the_caller_filter() {
        let pool = memory_pool().await;
        let owner = Name::canonicalize("app.example.com");
        persist(
            &pool,
            &owner,
            DnsClass::Internet,
            &Record::CNAME {
                domain: owner.as_str().to_string(),
                host: "lb.example.com.".into(),
                ttl: 120,
            },
        )
        .await
        .unwrap();
        persist(
            &pool,
            &owner,
            DnsClass::Internet,
            &Record::MX {
                domain: owner.as_str().to_string(),
                priority: 10,
                host: "mail.example.com.".into(),
                ttl: 120,
            },
        )
        .await
        .unwrap();

        let found = records_by_name(&pool, &owner).await.unwrap();
        assert_eq!(found.len(), 2);
    }
}
