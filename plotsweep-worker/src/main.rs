// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#[tokio::main]
async fn main() {
    use log::error;
    use plotsweep_common::telemetry;
    use std::panic;

    telemetry::init_logging();
    panic::set_hook(Box::new(|panic| error!(panic:%; "process panicked")));

    if let Err(error) = run().await {
        let backtrace = error.backtrace();
        let error = format!("{error:#}");
        error!(error, backtrace:%; "process exited with ERROR");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    use anyhow::Context;
    use log::info;
    use plotsweep_common::{
        config::ConfigExt,
        infra::{gamedata, migrations, pool::PostgresPool, redis_queue::RedisQueue},
        telemetry,
    };
    use plotsweep_worker::{application, config::Config};
    use tokio::signal::unix::{SignalKind, signal};

    let sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler can be registered");
    let config = Config::load().context("load configuration")?;
    info!(config:?; "starting");
    let Config {
        run_migrations,
        application_config,
        storage_config,
        queue_config,
        telemetry_config:
            telemetry::Config {
                tracing_config,
                metrics_config,
            },
        gamedata_dir,
    } = config;

    telemetry::init_tracing(tracing_config);
    telemetry::init_metrics(metrics_config);

    let pool = PostgresPool::new(storage_config)
        .await
        .context("create DB pool for Postgres")?;

    if run_migrations {
        migrations::run(&pool).await.context("run DB migrations")?;
    }

    let storage = plotsweep_common::infra::postgres_storage::PostgresStorage::new(pool);
    gamedata::upsert_all(&gamedata_dir, &storage)
        .await
        .context("load game data")?;

    let redis_queue = RedisQueue::new(queue_config)
        .await
        .context("connect to Redis")?;

    application::run(
        application_config,
        storage,
        redis_queue.clone(),
        redis_queue,
        sigterm,
    )
    .await
    .context("run plotsweep worker")
}
