// src/db/schema.rs
//! Idempotent schema setup and fixed seed data, applied once on startup.

use anyhow::Result;
use sqlx::PgPool;

use crate::models::Toilet;

const SEED: [(i64, &str, &str); 6] = [
    (1, "Restroom 1", "Ground floor, east wing"),
    (2, "Restroom 2", "Ground floor, west wing"),
    (3, "Restroom 3", "First floor, east wing"),
    (4, "Restroom 4", "First floor, west wing"),
    (5, "Restroom 5", "Second floor, east wing"),
    (6, "Restroom 6", "Second floor, west wing"),
];

/// The six toilets every deployment starts with.
pub fn seed_toilets() -> Vec<Toilet> {
    SEED.iter()
        .map(|(id, name, location)| Toilet {
            id: *id,
            name: name.to_string(),
            location: location.to_string(),
            is_active: true,
        })
        .collect()
}

/// Create tables and indexes if missing, then seed toilets.
///
/// Safe on every startup. The partial unique index on `cleaning_tasks`
/// guarantees at most one assigned/in-progress task per toilet even when two
/// assignment requests race.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS public.toilets (
            id         BIGINT PRIMARY KEY,
            name       TEXT    NOT NULL,
            location   TEXT    NOT NULL,
            is_active  BOOLEAN NOT NULL DEFAULT TRUE
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS public.ratings (
            id          BIGSERIAL PRIMARY KEY,
            toilet_id   BIGINT      NOT NULL,
            rating      INTEGER     NOT NULL CHECK (rating BETWEEN 1 AND 5),
            problems    TEXT        NOT NULL DEFAULT '[]',
            other_text  TEXT        NOT NULL DEFAULT '',
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS public.cleaning_tasks (
            id            BIGSERIAL PRIMARY KEY,
            toilet_id     BIGINT      NOT NULL,
            cleaner_id    BIGINT      NOT NULL,
            cleaner_name  TEXT        NOT NULL,
            status        TEXT        NOT NULL
                          CHECK (status IN ('assigned','in_progress','completed')),
            started_at    TIMESTAMPTZ,
            completed_at  TIMESTAMPTZ,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at    TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS public.users (
            id             BIGSERIAL PRIMARY KEY,
            username       TEXT        NOT NULL UNIQUE,
            password_hash  TEXT        NOT NULL,
            name           TEXT        NOT NULL,
            role           TEXT        NOT NULL DEFAULT 'temizlikci'
                           CHECK (role IN ('admin','temizlikci')),
            is_active      BOOLEAN     NOT NULL DEFAULT TRUE,
            created_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at     TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS cleaning_tasks_one_active_per_toilet
            ON public.cleaning_tasks (toilet_id)
            WHERE status IN ('assigned','in_progress');
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_ratings_toilet_created
            ON public.ratings (toilet_id, created_at DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_cleaning_tasks_cleaner
            ON public.cleaning_tasks (cleaner_id, status);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    for t in seed_toilets() {
        sqlx::query(
            r#"INSERT INTO public.toilets (id, name, location, is_active)
               VALUES ($1,$2,$3,$4)
               ON CONFLICT (id) DO NOTHING"#,
        )
        .bind(t.id)
        .bind(&t.name)
        .bind(&t.location)
        .bind(t.is_active)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!("schema ready");
    Ok(())
}
