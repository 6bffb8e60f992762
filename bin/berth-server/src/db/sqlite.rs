//! SQLite implementation of [`ResourceStore`] and [`SearchStore`].
//!
//! Uses [`sqlx`] with the `sqlite` feature.  Migrations are run
//! automatically on startup via [`SqliteStore::connect`].
//!
//! # Migrations path
//!
//! `sqlx::migrate!("./migrations")` resolves the path **at compile time**
//! relative to `CARGO_MANIFEST_DIR` (the crate root), so the directory is
//! embedded into the binary.  The database file location is determined at
//! runtime by `BERTH_DATABASE_URL` and is **not** related to the current
//! working directory at runtime.
//!
//! # Queries
//!
//! The `sqlx::query` (runtime-verified) form is used deliberately so that no
//! `DATABASE_URL` environment variable is needed at compile time.  Dynamic
//! filter combinations go through [`sqlx::QueryBuilder`].

use std::str::FromStr;

use berth_core::ResourceKind;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::{
    HealthSample, HealthStatus, ProbeTarget, Resource, ResourceFilter, ResourceSource,
    ResourceStore, SearchStore,
};

const COLUMNS: &str = "id, kind, name, slug, description, tags, url, path, repo_url, owner, \
                       thumbnail_path, license, healthcheck_path, updated_at, last_synced_at, \
                       health_status, health_checked_at, source, created_at, modified_at";

/// SQLite-backed catalog + search index store.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending
    /// migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g.
    /// `"sqlite://berth.db"` or `"sqlite::memory:"` for tests.  In-memory
    /// databases are pinned to a single pool connection; each connection
    /// would otherwise see its own empty database.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

// ── Row mapping ───────────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct ResourceRow {
    id: i64,
    kind: String,
    name: String,
    slug: String,
    description: Option<String>,
    tags: String,
    url: Option<String>,
    path: Option<String>,
    repo_url: Option<String>,
    owner: Option<String>,
    thumbnail_path: Option<String>,
    license: Option<String>,
    healthcheck_path: Option<String>,
    updated_at: Option<String>,
    last_synced_at: Option<String>,
    health_status: String,
    health_checked_at: Option<String>,
    source: String,
    created_at: String,
    modified_at: String,
}

fn parse_rfc3339_or_now(raw: String, field: &'static str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(raw = %raw, error = %e, field, "failed to parse resource timestamp; using now");
        Utc::now()
    })
}

fn parse_optional_rfc3339(raw: Option<String>, field: &'static str) -> Option<DateTime<Utc>> {
    raw.and_then(|v| {
        v.parse()
            .map_err(|e: chrono::ParseError| {
                tracing::warn!(raw = %v, error = %e, field, "failed to parse optional resource timestamp; dropping value");
                e
            })
            .ok()
    })
}

fn parse_enum_or<T: FromStr + Copy>(raw: &str, field: &'static str, fallback: T) -> T {
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(raw, field, "unrecognized enum value in resource row; using fallback");
        fallback
    })
}

impl ResourceRow {
    fn into_resource(self) -> Resource {
        let tags = serde_json::from_str(&self.tags).unwrap_or_else(|e| {
            tracing::warn!(raw = %self.tags, error = %e, "invalid tags JSON in resource row; using empty list");
            Vec::new()
        });
        Resource {
            id: self.id,
            kind: parse_enum_or(&self.kind, "kind", ResourceKind::App),
            name: self.name,
            slug: self.slug,
            description: self.description,
            tags,
            url: self.url,
            path: self.path,
            repo_url: self.repo_url,
            owner: self.owner,
            thumbnail_path: self.thumbnail_path,
            license: self.license,
            healthcheck_path: self.healthcheck_path,
            updated_at: parse_optional_rfc3339(self.updated_at, "updated_at"),
            last_synced_at: parse_optional_rfc3339(self.last_synced_at, "last_synced_at"),
            health_status: parse_enum_or(&self.health_status, "health_status", HealthStatus::Unknown),
            health_checked_at: parse_optional_rfc3339(self.health_checked_at, "health_checked_at"),
            source: parse_enum_or(&self.source, "source", ResourceSource::Manual),
            created_at: parse_rfc3339_or_now(self.created_at, "created_at"),
            modified_at: parse_rfc3339_or_now(self.modified_at, "modified_at"),
        }
    }
}

fn tags_json(resource: &Resource) -> String {
    serde_json::to_string(&resource.tags).unwrap_or_else(|_| "[]".to_owned())
}

/// Append `filter`'s conditions to a query that already selects from
/// `resources`.
fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ResourceFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(kind) = filter.kind {
        qb.push(" AND kind = ").push_bind(kind.to_string());
    }
    if let Some(owner) = &filter.owner {
        qb.push(" AND owner = ").push_bind(owner.clone());
    }
    if let Some(tag) = &filter.tag {
        qb.push(" AND EXISTS (SELECT 1 FROM json_each(resources.tags) WHERE json_each.value = ")
            .push_bind(tag.clone())
            .push(")");
    }
    if let Some(ids) = &filter.ids {
        if ids.is_empty() {
            qb.push(" AND 0");
        } else {
            qb.push(" AND id IN (");
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(*id);
            }
            qb.push(")");
        }
    }
}

// ── ResourceStore ─────────────────────────────────────────────────────────────

impl ResourceStore for SqliteStore {
    async fn insert_resource(&self, resource: &Resource) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO resources \
             (kind, name, slug, description, tags, url, path, repo_url, owner, \
              thumbnail_path, license, healthcheck_path, updated_at, last_synced_at, \
              health_status, health_checked_at, source, created_at, modified_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        )
        .bind(resource.kind.to_string())
        .bind(&resource.name)
        .bind(&resource.slug)
        .bind(&resource.description)
        .bind(tags_json(resource))
        .bind(&resource.url)
        .bind(&resource.path)
        .bind(&resource.repo_url)
        .bind(&resource.owner)
        .bind(&resource.thumbnail_path)
        .bind(&resource.license)
        .bind(&resource.healthcheck_path)
        .bind(resource.updated_at.map(|v| v.to_rfc3339()))
        .bind(resource.last_synced_at.map(|v| v.to_rfc3339()))
        .bind(resource.health_status.to_string())
        .bind(resource.health_checked_at.map(|v| v.to_rfc3339()))
        .bind(resource.source.to_string())
        .bind(resource.created_at.to_rfc3339())
        .bind(resource.modified_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn update_resource(&self, resource: &Resource) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE resources SET \
             kind = ?1, name = ?2, slug = ?3, description = ?4, tags = ?5, url = ?6, \
             path = ?7, repo_url = ?8, owner = ?9, thumbnail_path = ?10, license = ?11, \
             healthcheck_path = ?12, updated_at = ?13, last_synced_at = ?14, source = ?15, \
             modified_at = ?16 \
             WHERE id = ?17",
        )
        .bind(resource.kind.to_string())
        .bind(&resource.name)
        .bind(&resource.slug)
        .bind(&resource.description)
        .bind(tags_json(resource))
        .bind(&resource.url)
        .bind(&resource.path)
        .bind(&resource.repo_url)
        .bind(&resource.owner)
        .bind(&resource.thumbnail_path)
        .bind(&resource.license)
        .bind(&resource.healthcheck_path)
        .bind(resource.updated_at.map(|v| v.to_rfc3339()))
        .bind(resource.last_synced_at.map(|v| v.to_rfc3339()))
        .bind(resource.source.to_string())
        .bind(resource.modified_at.to_rfc3339())
        .bind(resource.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_resource(&self, id: i64) -> Result<Option<Resource>, sqlx::Error> {
        let row: Option<ResourceRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM resources WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(ResourceRow::into_resource))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Resource>, sqlx::Error> {
        let row: Option<ResourceRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM resources WHERE slug = ?1"))
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(ResourceRow::into_resource))
    }

    async fn get_by_repo_url(&self, repo_url: &str) -> Result<Option<Resource>, sqlx::Error> {
        let row: Option<ResourceRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM resources WHERE repo_url = ?1 LIMIT 1"
        ))
        .bind(repo_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ResourceRow::into_resource))
    }

    async fn list_slugs(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT slug FROM resources")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(slug,)| slug).collect())
    }

    async fn list_resources(
        &self,
        filter: &ResourceFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Resource>, sqlx::Error> {
        let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM resources"));
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY modified_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows: Vec<ResourceRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ResourceRow::into_resource).collect())
    }

    async fn count_resources(&self, filter: &ResourceFilter) -> Result<i64, sqlx::Error> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM resources");
        push_filters(&mut qb, filter);
        qb.build_query_scalar().fetch_one(&self.pool).await
    }

    async fn delete_resource(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM resources WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_monitored(&self) -> Result<Vec<ProbeTarget>, sqlx::Error> {
        let rows: Vec<(i64, String, Option<String>)> = sqlx::query_as(
            "SELECT id, url, healthcheck_path FROM resources WHERE url IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, url, healthcheck_path)| ProbeTarget { id, url, healthcheck_path })
            .collect())
    }

    async fn record_health_batch(&self, samples: &[HealthSample]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for sample in samples {
            sqlx::query(
                "UPDATE resources SET health_status = ?1, health_checked_at = ?2 WHERE id = ?3",
            )
            .bind(sample.status.to_string())
            .bind(sample.checked_at.to_rfc3339())
            .bind(sample.resource_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

// ── SearchStore ───────────────────────────────────────────────────────────────

/// Build an FTS5 MATCH expression from free text.  Each alphanumeric term is
/// quoted so user input can never produce an FTS syntax error; `None` when
/// the query has no indexable terms.
fn fts_match_expr(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(|term| format!("\"{term}\""))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

impl SearchStore for SqliteStore {
    async fn upsert_search(&self, resource: &Resource) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM resources_fts WHERE rowid = ?1")
            .bind(resource.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO resources_fts (rowid, name, description, tags) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(resource.id)
        .bind(&resource.name)
        .bind(resource.description.as_deref().unwrap_or(""))
        .bind(resource.tags_text())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn remove_search(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM resources_fts WHERE rowid = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn search_ids(&self, query: &str) -> Result<Vec<i64>, sqlx::Error> {
        let Some(expr) = fts_match_expr(query) else {
            return Ok(Vec::new());
        };
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT rowid FROM resources_fts WHERE resources_fts MATCH ?1 ORDER BY rank",
        )
        .bind(&expr)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn sample(name: &str, slug: &str) -> Resource {
        let now = Utc::now();
        Resource {
            id: 0,
            kind: ResourceKind::App,
            name: name.to_owned(),
            slug: slug.to_owned(),
            description: None,
            tags: vec!["internal".to_owned()],
            url: None,
            path: None,
            repo_url: None,
            owner: None,
            thumbnail_path: None,
            license: None,
            healthcheck_path: None,
            updated_at: None,
            last_synced_at: None,
            health_status: HealthStatus::Unknown,
            health_checked_at: None,
            source: ResourceSource::Manual,
            created_at: now,
            modified_at: now,
        }
    }

    #[tokio::test]
    async fn insert_and_fetch_by_slug() {
        let store = store().await;
        let id = store.insert_resource(&sample("Demo", "demo")).await.unwrap();
        let fetched = store.get_by_slug("demo").await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.name, "Demo");
        assert_eq!(fetched.tags, vec!["internal"]);
        assert_eq!(fetched.health_status, HealthStatus::Unknown);
    }

    #[tokio::test]
    async fn duplicate_slug_is_a_unique_violation() {
        let store = store().await;
        store.insert_resource(&sample("One", "demo")).await.unwrap();
        let err = store.insert_resource(&sample("Two", "demo")).await.unwrap_err();
        match err {
            sqlx::Error::Database(db) => assert!(db.is_unique_violation()),
            other => panic!("expected database error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tag_filter_uses_json_membership() {
        let store = store().await;
        let mut tagged = sample("Tagged", "tagged");
        tagged.tags = vec!["metrics".to_owned(), "logs".to_owned()];
        store.insert_resource(&tagged).await.unwrap();
        store.insert_resource(&sample("Plain", "plain")).await.unwrap();

        let filter = ResourceFilter { tag: Some("metrics".to_owned()), ..Default::default() };
        let rows = store.list_resources(&filter, 50, 0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slug, "tagged");
        assert_eq!(store.count_resources(&filter).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_id_set_matches_nothing() {
        let store = store().await;
        store.insert_resource(&sample("Demo", "demo")).await.unwrap();
        let filter = ResourceFilter { ids: Some(Vec::new()), ..Default::default() };
        assert!(store.list_resources(&filter, 50, 0).await.unwrap().is_empty());
        assert_eq!(store.count_resources(&filter).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_index_round_trip() {
        let store = store().await;
        let mut res = sample("Local Logs", "local-logs");
        res.description = Some("System metrics dataset".to_owned());
        res.id = store.insert_resource(&res).await.unwrap();
        store.upsert_search(&res).await.unwrap();

        assert_eq!(store.search_ids("metrics").await.unwrap(), vec![res.id]);
        // Quoting makes hostile input safe rather than a syntax error.
        assert!(store.search_ids("metrics\" OR \"").await.unwrap().len() <= 1);
        assert!(store.search_ids("   ").await.unwrap().is_empty());

        store.remove_search(res.id).await.unwrap();
        assert!(store.search_ids("metrics").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn health_batch_is_recorded() {
        let store = store().await;
        let mut res = sample("Svc", "svc");
        res.url = Some("http://localhost:1".to_owned());
        let id = store.insert_resource(&res).await.unwrap();

        let targets = store.list_monitored().await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].id, id);

        let now = Utc::now();
        store
            .record_health_batch(&[HealthSample {
                resource_id: id,
                status: HealthStatus::Down,
                checked_at: now,
            }])
            .await
            .unwrap();

        let fetched = store.get_resource(id).await.unwrap().unwrap();
        assert_eq!(fetched.health_status, HealthStatus::Down);
        assert!(fetched.health_checked_at.is_some());
    }
}
