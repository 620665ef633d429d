//! PostgreSQL fixtures for gridplan integration tests.
//!
//! Each test gets its own migrated database on a server shared by the
//! test binary. The server comes from `GRIDPLAN_TEST_PG_URL` (server root,
//! no database name) or, with `GRIDPLAN_TEST_DOCKER=1`, from a `postgres`
//! container started once through testcontainers. With neither set,
//! [`TestDb::create`] returns `None` and the test returns early.

use sqlx::{Executor, PgPool};
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use gridplan_db::config::DbConfig;
use gridplan_db::pool;

pub const PG_URL_VAR: &str = "GRIDPLAN_TEST_PG_URL";
pub const DOCKER_VAR: &str = "GRIDPLAN_TEST_DOCKER";

struct Server {
    root_url: String,
    _container: Option<ContainerAsync<Postgres>>,
}

impl Server {
    fn database(&self, name: &str) -> DbConfig {
        DbConfig::new(format!("{}/{name}", self.root_url.trim_end_matches('/')))
    }
}

static SERVER: OnceCell<Option<Server>> = OnceCell::const_new();

async fn start_server() -> Option<Server> {
    if let Ok(url) = std::env::var(PG_URL_VAR) {
        return Some(Server {
            root_url: url,
            _container: None,
        });
    }
    if std::env::var(DOCKER_VAR).is_err() {
        return None;
    }

    let container = Postgres::default()
        .with_tag("17")
        .start()
        .await
        .expect("failed to start PostgreSQL container");
    let host = container.get_host().await.expect("failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get mapped port");
    Some(Server {
        root_url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    })
}

async fn server() -> Option<&'static Server> {
    SERVER.get_or_init(start_server).await.as_ref()
}

async fn maintenance_pool(server: &Server) -> PgPool {
    let config = server.database("postgres").with_max_connections(1);
    pool::create_pool(&config)
        .await
        .expect("failed to connect to maintenance database")
}

/// A throwaway database holding the `month_plans` schema.
pub struct TestDb {
    pub pool: PgPool,
    pub name: String,
    server: &'static Server,
}

impl TestDb {
    /// Create and migrate a uniquely named database, or `None` when no
    /// PostgreSQL server is configured for tests.
    pub async fn create() -> Option<Self> {
        let Some(server) = server().await else {
            eprintln!("skipping: set {PG_URL_VAR} or {DOCKER_VAR}=1 to run PostgreSQL tests");
            return None;
        };

        let name = format!("gridplan_test_{}", Uuid::new_v4().simple());
        let maint = maintenance_pool(server).await;
        maint
            .execute(format!("CREATE DATABASE {name}").as_str())
            .await
            .unwrap_or_else(|e| panic!("failed to create test database {name}: {e}"));
        maint.close().await;

        let pool = pool::create_pool(&server.database(&name))
            .await
            .unwrap_or_else(|e| panic!("failed to connect to test database {name}: {e:#}"));
        pool::run_migrations(&pool)
            .await
            .expect("migrations should succeed");

        Some(Self { pool, name, server })
    }

    /// Close the pool and drop the database.
    pub async fn teardown(self) {
        self.pool.close().await;
        let maint = maintenance_pool(self.server).await;
        let stmt = format!("DROP DATABASE IF EXISTS {} WITH (FORCE)", self.name);
        if let Err(e) = maint.execute(stmt.as_str()).await {
            eprintln!("failed to drop test database {}: {e}", self.name);
        }
        maint.close().await;
    }
}
