// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// Postgres-backed `Storage` implementation. Grounded on `spo-api/src/infra/repo.rs`'s
// `PostgresPool` wrapper + manual `sqlx::query_as(...).bind(...)` pattern (no
// compile-time `query!` macros, matching the teacher's retrieved query style) and
// `spo-indexer/src/domain/storage.rs`'s `SqlxTransaction` threading through write
// methods.

use crate::{
    domain::{
        District, Event, LottoPhase, PlotInfo, PlotLocation, PlotState, PurchaseSystem, Storage,
        SqlxTransaction, Sweeper, Timestamp, World, WsMessage,
    },
    infra::pool::PostgresPool,
};
use sqlx::{FromRow, Row};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PostgresPool,
}

impl PostgresStorage {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PlotStateRow {
    id: i64,
    world_id: i32,
    district_id: i32,
    ward_number: i32,
    plot_number: i32,
    first_seen: f64,
    last_seen: f64,
    is_owned: bool,
    owner_name: Option<String>,
    last_seen_price: Option<i64>,
    purchase_system: i32,
    lotto_entries: Option<i32>,
    lotto_phase: Option<String>,
    lotto_phase_until: Option<i64>,
}

impl From<PlotStateRow> for PlotState {
    fn from(row: PlotStateRow) -> Self {
        PlotState {
            id: row.id,
            world_id: row.world_id,
            district_id: row.district_id,
            ward_number: row.ward_number,
            plot_number: row.plot_number,
            first_seen: row.first_seen as Timestamp,
            last_seen: row.last_seen as Timestamp,
            is_owned: row.is_owned,
            owner_name: row.owner_name,
            last_seen_price: row.last_seen_price,
            purchase_system: PurchaseSystem(row.purchase_system),
            lotto_entries: row.lotto_entries,
            lotto_phase: row.lotto_phase.as_deref().and_then(lotto_phase_from_str),
            lotto_phase_until: row.lotto_phase_until,
        }
    }
}

fn lotto_phase_from_str(s: &str) -> Option<LottoPhase> {
    match s {
        "available" => Some(LottoPhase::Available),
        "results" => Some(LottoPhase::Results),
        "unavailable" => Some(LottoPhase::Unavailable),
        _ => None,
    }
}

fn lotto_phase_to_str(phase: LottoPhase) -> &'static str {
    match phase {
        LottoPhase::Available => "available",
        LottoPhase::Results => "results",
        LottoPhase::Unavailable => "unavailable",
    }
}

impl Storage for PostgresStorage {
    type Error = PostgresStorageError;

    async fn create_tx(&self) -> Result<SqlxTransaction, Self::Error> {
        self.pool.begin().await.map_err(PostgresStorageError::Query)
    }

    async fn upsert_world(&self, world: &World, tx: &mut SqlxTransaction) -> Result<(), Self::Error> {
        sqlx::query(
            "INSERT INTO worlds (world_id, name, datacenter_id, datacenter_name)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (world_id) DO NOTHING",
        )
        .bind(world.world_id)
        .bind(&world.name)
        .bind(world.datacenter_id)
        .bind(&world.datacenter_name)
        .execute(&mut **tx)
        .await
        .map_err(PostgresStorageError::Query)?;
        Ok(())
    }

    async fn upsert_district(&self, district: &District, tx: &mut SqlxTransaction) -> Result<(), Self::Error> {
        sqlx::query(
            "INSERT INTO districts (district_id, name, land_set_id)
             VALUES ($1, $2, $3)
             ON CONFLICT (district_id) DO NOTHING",
        )
        .bind(district.district_id)
        .bind(&district.name)
        .bind(district.land_set_id)
        .execute(&mut **tx)
        .await
        .map_err(PostgresStorageError::Query)?;
        Ok(())
    }

    async fn upsert_plot_info(&self, info: &PlotInfo, tx: &mut SqlxTransaction) -> Result<(), Self::Error> {
        sqlx::query(
            "INSERT INTO plotinfo (district_id, plot_number, house_size, base_price)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (district_id, plot_number) DO NOTHING",
        )
        .bind(info.district_id)
        .bind(info.plot_number)
        .bind(info.house_size)
        .bind(info.base_price)
        .execute(&mut **tx)
        .await
        .map_err(PostgresStorageError::Query)?;
        Ok(())
    }

    async fn historical_plot_states(
        &self,
        location: PlotLocation,
        tx: &mut SqlxTransaction,
    ) -> Result<Vec<PlotState>, Self::Error> {
        let rows = sqlx::query_as::<_, PlotStateRow>(
            "SELECT id, world_id, district_id, ward_number, plot_number, first_seen, last_seen,
                    is_owned, owner_name, last_seen_price, purchase_system, lotto_entries,
                    lotto_phase, lotto_phase_until
             FROM plot_states
             WHERE world_id = $1 AND district_id = $2 AND ward_number = $3 AND plot_number = $4
             ORDER BY last_seen DESC",
        )
        .bind(location.world_id)
        .bind(location.district_id)
        .bind(location.ward_number)
        .bind(location.plot_number)
        .fetch_all(&mut **tx)
        .await
        .map_err(PostgresStorageError::Query)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_plot_state(&self, state: &PlotState, tx: &mut SqlxTransaction) -> Result<i64, Self::Error> {
        let row = sqlx::query(
            "INSERT INTO plot_states (
                 world_id, district_id, ward_number, plot_number, first_seen, last_seen,
                 is_owned, owner_name, last_seen_price, purchase_system, lotto_entries,
                 lotto_phase, lotto_phase_until
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING id",
        )
        .bind(state.world_id)
        .bind(state.district_id)
        .bind(state.ward_number)
        .bind(state.plot_number)
        .bind(state.first_seen)
        .bind(state.last_seen)
        .bind(state.is_owned)
        .bind(&state.owner_name)
        .bind(state.last_seen_price)
        .bind(state.purchase_system.0)
        .bind(state.lotto_entries)
        .bind(state.lotto_phase.map(lotto_phase_to_str))
        .bind(state.lotto_phase_until)
        .fetch_one(&mut **tx)
        .await
        .map_err(PostgresStorageError::Query)?;

        Ok(row.get::<i64, _>("id"))
    }

    async fn update_plot_state(&self, state: &PlotState, tx: &mut SqlxTransaction) -> Result<(), Self::Error> {
        sqlx::query(
            "UPDATE plot_states
             SET last_seen = $2, is_owned = $3, owner_name = $4, last_seen_price = $5,
                 purchase_system = $6, lotto_entries = $7, lotto_phase = $8, lotto_phase_until = $9
             WHERE id = $1",
        )
        .bind(state.id)
        .bind(state.last_seen)
        .bind(state.is_owned)
        .bind(&state.owner_name)
        .bind(state.last_seen_price)
        .bind(state.purchase_system.0)
        .bind(state.lotto_entries)
        .bind(state.lotto_phase.map(lotto_phase_to_str))
        .bind(state.lotto_phase_until)
        .execute(&mut **tx)
        .await
        .map_err(PostgresStorageError::Query)?;
        Ok(())
    }

    async fn insert_event(&self, event: &Event, tx: &mut SqlxTransaction) -> Result<(), Self::Error> {
        sqlx::query(
            "INSERT INTO events (sweeper_id, timestamp, event_type, data) VALUES ($1, $2, $3, $4)",
        )
        .bind(event.sweeper_id)
        .bind(event.timestamp)
        .bind(&event.event_type)
        .bind(&event.data)
        .execute(&mut **tx)
        .await
        .map_err(PostgresStorageError::Query)?;
        Ok(())
    }

    async fn insert_broadcast(
        &self,
        message: &WsMessage,
        timestamp: Timestamp,
        tx: &mut SqlxTransaction,
    ) -> Result<(), Self::Error> {
        let (message_type, payload) = match message {
            WsMessage::PlotOpen(_) => ("plot_open", message.to_json()),
            WsMessage::PlotSold(_) => ("plot_sold", message.to_json()),
            WsMessage::PlotUpdate(_) => ("plot_update", message.to_json()),
        };
        let payload = payload.map_err(|e| PostgresStorageError::Serialize(e.to_string()))?;

        sqlx::query("INSERT INTO broadcasts (timestamp, message_type, payload) VALUES ($1, $2, $3)")
            .bind(timestamp)
            .bind(message_type)
            .bind(payload)
            .execute(&mut **tx)
            .await
            .map_err(PostgresStorageError::Query)?;
        Ok(())
    }

    async fn upsert_sweeper(&self, sweeper: &Sweeper, tx: &mut SqlxTransaction) -> Result<(), Self::Error> {
        sqlx::query(
            "INSERT INTO sweepers (sweeper_id, name, world_id, last_seen)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (sweeper_id) DO UPDATE
             SET name = EXCLUDED.name, world_id = EXCLUDED.world_id, last_seen = EXCLUDED.last_seen",
        )
        .bind(sweeper.sweeper_id)
        .bind(&sweeper.name)
        .bind(sweeper.world_id)
        .bind(sweeper.last_seen)
        .execute(&mut **tx)
        .await
        .map_err(PostgresStorageError::Query)?;
        Ok(())
    }

    async fn get_sweeper(&self, sweeper_id: i64) -> Result<Option<Sweeper>, Self::Error> {
        let row = sqlx::query_as::<_, (i64, String, i32, i64)>(
            "SELECT sweeper_id, name, world_id, last_seen FROM sweepers WHERE sweeper_id = $1",
        )
        .bind(sweeper_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(PostgresStorageError::Query)?;

        Ok(row.map(|(sweeper_id, name, world_id, last_seen)| Sweeper {
            sweeper_id,
            name,
            world_id,
            last_seen,
        }))
    }

    async fn list_worlds(&self) -> Result<Vec<World>, Self::Error> {
        let rows = sqlx::query_as::<_, (i32, String, i32, String)>(
            "SELECT world_id, name, datacenter_id, datacenter_name FROM worlds ORDER BY world_id",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(PostgresStorageError::Query)?;

        Ok(rows
            .into_iter()
            .map(|(world_id, name, datacenter_id, datacenter_name)| World {
                world_id,
                name,
                datacenter_id,
                datacenter_name,
            })
            .collect())
    }

    async fn get_world(&self, world_id: i32) -> Result<Option<World>, Self::Error> {
        let row = sqlx::query_as::<_, (i32, String, i32, String)>(
            "SELECT world_id, name, datacenter_id, datacenter_name FROM worlds WHERE world_id = $1",
        )
        .bind(world_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(PostgresStorageError::Query)?;

        Ok(row.map(|(world_id, name, datacenter_id, datacenter_name)| World {
            world_id,
            name,
            datacenter_id,
            datacenter_name,
        }))
    }

    async fn list_districts(&self) -> Result<Vec<District>, Self::Error> {
        let rows = sqlx::query_as::<_, (i32, String, i32)>(
            "SELECT district_id, name, land_set_id FROM districts ORDER BY district_id",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(PostgresStorageError::Query)?;

        Ok(rows
            .into_iter()
            .map(|(district_id, name, land_set_id)| District {
                district_id,
                name,
                land_set_id,
            })
            .collect())
    }

    async fn get_district(&self, district_id: i32) -> Result<Option<District>, Self::Error> {
        let row = sqlx::query_as::<_, (i32, String, i32)>(
            "SELECT district_id, name, land_set_id FROM districts WHERE district_id = $1",
        )
        .bind(district_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(PostgresStorageError::Query)?;

        Ok(row.map(|(district_id, name, land_set_id)| District {
            district_id,
            name,
            land_set_id,
        }))
    }

    async fn get_plot_info(&self, district_id: i32, plot_number: i32) -> Result<Option<PlotInfo>, Self::Error> {
        let row = sqlx::query_as::<_, (i32, i32, i32, i64)>(
            "SELECT district_id, plot_number, house_size, base_price
             FROM plotinfo WHERE district_id = $1 AND plot_number = $2",
        )
        .bind(district_id)
        .bind(plot_number)
        .fetch_optional(&*self.pool)
        .await
        .map_err(PostgresStorageError::Query)?;

        Ok(row.map(|(district_id, plot_number, house_size, base_price)| PlotInfo {
            district_id,
            plot_number,
            house_size,
            base_price,
        }))
    }

    async fn latest_plot_states(
        &self,
        world_id: i32,
        district_id: i32,
    ) -> Result<Vec<PlotState>, Self::Error> {
        // `DISTINCT ON` pattern per spec.md §4.6: one row per (ward, plot), the row with
        // the largest `last_seen`.
        let rows = sqlx::query_as::<_, PlotStateRow>(
            "SELECT DISTINCT ON (ward_number, plot_number)
                    id, world_id, district_id, ward_number, plot_number, first_seen, last_seen,
                    is_owned, owner_name, last_seen_price, purchase_system, lotto_entries,
                    lotto_phase, lotto_phase_until
             FROM plot_states
             WHERE world_id = $1 AND district_id = $2
             ORDER BY ward_number, plot_number, last_seen DESC",
        )
        .bind(world_id)
        .bind(district_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(PostgresStorageError::Query)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn plot_history(&self, location: PlotLocation) -> Result<Vec<PlotState>, Self::Error> {
        let rows = sqlx::query_as::<_, PlotStateRow>(
            "SELECT id, world_id, district_id, ward_number, plot_number, first_seen, last_seen,
                    is_owned, owner_name, last_seen_price, purchase_system, lotto_entries,
                    lotto_phase, lotto_phase_until
             FROM plot_states
             WHERE world_id = $1 AND district_id = $2 AND ward_number = $3 AND plot_number = $4
             ORDER BY last_seen DESC
             OFFSET 1",
        )
        .bind(location.world_id)
        .bind(location.district_id)
        .bind(location.ward_number)
        .bind(location.plot_number)
        .fetch_all(&*self.pool)
        .await
        .map_err(PostgresStorageError::Query)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn all_plot_states(&self) -> Result<Vec<PlotState>, Self::Error> {
        let rows = sqlx::query_as::<_, PlotStateRow>(
            "SELECT id, world_id, district_id, ward_number, plot_number, first_seen, last_seen,
                    is_owned, owner_name, last_seen_price, purchase_system, lotto_entries,
                    lotto_phase, lotto_phase_until
             FROM plot_states
             ORDER BY world_id, district_id, ward_number, plot_number, last_seen",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(PostgresStorageError::Query)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Error)]
pub enum PostgresStorageError {
    #[error("postgres query failed")]
    Query(#[source] sqlx::Error),

    #[error("cannot serialize broadcast payload: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{self, reconcile};
    use testcontainers::runners::AsyncRunner;
    use testcontainers_modules::postgres::Postgres;

    async fn storage() -> (PostgresStorage, testcontainers::ContainerAsync<Postgres>) {
        let container = Postgres::default()
            .with_tag("17.1-alpine")
            .start()
            .await
            .expect("start Postgres container");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("get Postgres port");

        let pool = PostgresPool::new(crate::infra::pool::Config {
            host: "localhost".into(),
            port,
            dbname: "postgres".into(),
            user: "postgres".into(),
            password: "postgres".into(),
            sslmode: sqlx::postgres::PgSslMode::Prefer,
            max_connections: 5,
            idle_timeout: std::time::Duration::from_secs(60),
            max_lifetime: std::time::Duration::from_secs(300),
        })
        .await
        .expect("create Postgres pool");

        crate::infra::migrations::run(&pool)
            .await
            .expect("run migrations");

        (PostgresStorage::new(pool), container)
    }

    #[tokio::test]
    async fn insert_and_fetch_round_trips() {
        let (storage, _container) = storage().await;

        let location = domain::PlotLocation {
            world_id: 31415,
            district_id: 339,
            ward_number: 0,
            plot_number: 0,
        };
        let entry = domain::PlotStateEntry {
            world_id: location.world_id,
            district_id: location.district_id,
            ward_num: location.ward_number,
            plot_num: location.plot_number,
            timestamp: 1000.0,
            is_owned: false,
            owner_name: None,
            price: None,
            purchase_system: domain::PurchaseSystem::NONE,
            lotto_entries: None,
            lotto_phase: None,
            lotto_phase_until: None,
        };
        let state = reconcile::new_state_from_event(&entry);

        let mut tx = storage.create_tx().await.expect("begin tx");
        let id = storage
            .insert_plot_state(&state, &mut tx)
            .await
            .expect("insert plot state");
        tx.commit().await.expect("commit");

        let mut tx = storage.create_tx().await.expect("begin tx");
        let fetched = storage
            .historical_plot_states(location, &mut tx)
            .await
            .expect("fetch states");
        tx.commit().await.expect("commit");

        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, id);
        assert_eq!(fetched[0].first_seen, 1000.0);
    }
}
