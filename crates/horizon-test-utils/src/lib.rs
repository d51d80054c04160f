//! Shared database plumbing for horizon integration tests.
//!
//! Tests call [`create_test_db`] to get a pool onto a uniquely-named,
//! fully-migrated database, and [`drop_test_db`] to remove it afterwards.
//! The PostgreSQL server behind those databases is shared:
//!
//! - with `HORIZON_TEST_PG_URL` set (CI setup script), that server is used
//!   directly and no container is started;
//! - otherwise a single testcontainers PostgreSQL is started lazily and kept
//!   alive for the rest of the test binary.

use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use horizon_db::pool::MIGRATOR;

static SERVER: OnceCell<PgServer> = OnceCell::const_new();

/// The shared server: a base URL without a database path, plus the container
/// handle when we started one ourselves (dropped with the process).
struct PgServer {
    base_url: String,
    _container: Option<ContainerAsync<Postgres>>,
}

impl PgServer {
    async fn start() -> Self {
        if let Ok(base_url) = std::env::var("HORIZON_TEST_PG_URL") {
            return Self {
                base_url,
                _container: None,
            };
        }

        let container = Postgres::default()
            .with_tag("18")
            .start()
            .await
            .expect("failed to start PostgreSQL container");
        let host = container.get_host().await.expect("failed to get host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("failed to get mapped port");

        Self {
            base_url: format!("postgresql://postgres:postgres@{host}:{port}"),
            _container: Some(container),
        }
    }

    async fn get() -> &'static Self {
        SERVER.get_or_init(Self::start).await
    }

    /// One-shot administrative connection to the `postgres` database.
    async fn admin(&self) -> PgConnection {
        PgConnection::connect(&format!("{}/postgres", self.base_url))
            .await
            .expect("failed to open admin connection to test server")
    }
}

/// Create a uniquely-named database with migrations applied.
///
/// Returns the pool and the database name; pass the name to [`drop_test_db`]
/// when the test is done.
pub async fn create_test_db() -> (PgPool, String) {
    let server = PgServer::get().await;
    let db_name = format!("horizon_test_{}", Uuid::new_v4().simple());

    let mut admin = server.admin().await;
    admin
        .execute(format!("CREATE DATABASE {db_name}").as_str())
        .await
        .unwrap_or_else(|e| panic!("failed to create test database {db_name}: {e}"));
    admin.close().await.ok();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&format!("{}/{db_name}", server.base_url))
        .await
        .unwrap_or_else(|e| panic!("failed to connect to test database {db_name}: {e}"));
    MIGRATOR
        .run(&pool)
        .await
        .expect("migrations should apply to a fresh test database");

    (pool, db_name)
}

/// Drop a test database. Safe to call when it is already gone.
pub async fn drop_test_db(db_name: &str) {
    let server = PgServer::get().await;
    let mut admin = server.admin().await;
    // FORCE (PostgreSQL 13+) kicks out any connection a test left behind.
    let _ = admin
        .execute(format!("DROP DATABASE IF EXISTS {db_name} WITH (FORCE)").as_str())
        .await;
    admin.close().await.ok();
}
