// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// Postgres connection pool wrapper. Grounded on the teacher's usage contract
// (`indexer_common::infra::pool::postgres::PostgresPool::new(config)`, dereferenced as
// `&**pool` in `spo-api/src/infra/api/mod.rs`'s readiness probe and
// `indexer-common/src/infra/migrations/postgres.rs`'s `sqlx::migrate!(...).run(&**pool)`)
// — the teacher's own `pool.rs` was not among the retrieved files, so the wrapper here
// is authored fresh to match that contract exactly: a newtype `Deref`-ing to `PgPool`,
// sized ~10 + 20 overflow per spec.md §5.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::{ops::Deref, time::Duration};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: SecretString,
    #[serde(default = "default_sslmode")]
    pub sslmode: PgSslMode,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: Duration,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime: Duration,
}

fn default_sslmode() -> PgSslMode {
    PgSslMode::Prefer
}

/// spec.md §5: "SQL connection pool (size ~10 + 20 overflow)".
fn default_max_connections() -> u32 {
    30
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_lifetime() -> Duration {
    Duration::from_secs(5 * 60)
}

/// A Postgres connection pool, dereferencing to `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPool(PgPool);

impl PostgresPool {
    pub async fn new(config: Config) -> Result<Self, sqlx::Error> {
        let Config {
            host,
            port,
            dbname,
            user,
            password,
            sslmode,
            max_connections,
            idle_timeout,
            max_lifetime,
        } = config;

        let options = PgConnectOptions::new()
            .host(&host)
            .port(port)
            .database(&dbname)
            .username(&user)
            .password(password.expose_secret())
            .ssl_mode(sslmode);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(idle_timeout)
            .max_lifetime(max_lifetime)
            .connect_with(options)
            .await?;

        Ok(Self(pool))
    }
}

impl Deref for PostgresPool {
    type Target = PgPool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
