//! Schema migrations.
//!
//! Migrations are plain lists of SQL statements, applied in version order.
//! Each one runs in its own transaction together with the row that records
//! it in `__recipebox_migrations`, under a transaction-scoped advisory lock
//! so concurrent migrators apply each migration once.

use deadpool_postgres::Pool;
use recipebox_sql::{quote_ident, trigger_function_name, trigger_name};

use crate::{Error, Result};

use super::traced::ConnectionExt;

/// Table recording applied migration versions.
pub const MIGRATIONS_TABLE: &str = "__recipebox_migrations";

/// Advisory lock key held while a migration is applied.
const MIGRATION_LOCK: i64 = 0x7265_6369_7065;

/// A named, ordered schema change.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Sortable version, `YYYY_MM_DD_HHMMSS-name`.
    pub version: &'static str,
    pub statements: fn() -> Vec<String>,
}

/// Every migration, oldest first.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "2026_10_01_090000-create_user",
        statements: create_user,
    },
    Migration {
        version: "2026_10_01_090100-create_recipe",
        statements: create_recipe,
    },
    Migration {
        version: "2026_10_01_090200-create_recipe_like",
        statements: create_recipe_like,
    },
    Migration {
        version: "2026_10_01_090300-create_recipe_favorite",
        statements: create_recipe_favorite,
    },
    Migration {
        version: "2026_10_01_090400-create_recipe_comment",
        statements: create_recipe_comment,
    },
    Migration {
        version: "2026_10_01_090500-create_recipe_view",
        statements: create_recipe_view,
    },
];

/// Apply every pending migration. Returns the versions applied by this call.
pub async fn run_migrations(pool: &Pool) -> Result<Vec<&'static str>> {
    let mut conn = pool.get().await?;
    conn.traced()
        .execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (\n    \"version\" TEXT PRIMARY KEY,\n    \"applied_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW()\n)",
                quote_ident(MIGRATIONS_TABLE)
            ),
            &[],
        )
        .await?;

    let check = format!(
        "SELECT 1 FROM {} WHERE \"version\" = $1",
        quote_ident(MIGRATIONS_TABLE)
    );
    let record = format!(
        "INSERT INTO {} (\"version\") VALUES ($1)",
        quote_ident(MIGRATIONS_TABLE)
    );

    let mut applied = Vec::new();
    for migration in MIGRATIONS {
        let tx = conn.transaction().await?;
        let traced = tx.traced();
        traced
            .execute("SELECT pg_advisory_xact_lock($1)", &[&MIGRATION_LOCK])
            .await?;
        if traced
            .query_opt(&check, &[&migration.version])
            .await?
            .is_some()
        {
            tx.rollback().await?;
            continue;
        }

        for sql in (migration.statements)() {
            traced
                .execute(&sql, &[])
                .await
                .map_err(|err| match err {
                    Error::Postgres(source) => Error::Migration {
                        version: migration.version,
                        source,
                    },
                    other => other,
                })?;
        }
        traced.execute(&record, &[&migration.version]).await?;
        tx.commit().await?;

        tracing::info!(version = migration.version, "applied migration");
        applied.push(migration.version);
    }
    Ok(applied)
}

// ============================================================================
// Trigger helpers
// ============================================================================

/// Shared trigger function stamping `updated_at`.
fn touch_function_sql() -> String {
    format!(
        "CREATE OR REPLACE FUNCTION {}() RETURNS trigger LANGUAGE plpgsql AS $$\n\
         BEGIN\n\
             NEW.\"updated_at\" = NOW();\n\
             RETURN NEW;\n\
         END;\n\
         $$;",
        quote_ident(&trigger_function_name("any", "touch_updated_at"))
    )
}

/// `BEFORE UPDATE` trigger stamping `updated_at` on `table`.
///
/// With `columns`, only updates that touch one of them fire it, so counter
/// maintenance does not count as an edit.
pub fn touch_updated_at_sql(table: &str, columns: &[&str]) -> String {
    let of = if columns.is_empty() {
        String::new()
    } else {
        let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        format!(" OF {}", cols.join(", "))
    };
    format!(
        "CREATE TRIGGER {} BEFORE UPDATE{} ON {} FOR EACH ROW EXECUTE FUNCTION {}();",
        quote_ident(&trigger_name(table, "touch_updated_at")),
        of,
        quote_ident(table),
        quote_ident(&trigger_function_name("any", "touch_updated_at"))
    )
}

/// Trigger function and trigger keeping `parent.counter` equal to the number
/// of `child` rows pointing at it through `fk`.
///
/// The counter only ever moves by a single relative step per row, so
/// concurrent inserts and deletes cannot lose updates.
pub fn counter_cache_sql(child: &str, fk: &str, parent: &str, counter: &str) -> [String; 2] {
    let fn_name = trigger_function_name(child, counter);
    let step = |sign: &str, row: &str| {
        format!(
            "UPDATE {parent} SET {counter} = {counter} {sign} 1 WHERE \"id\" = {row}.{fk};",
            parent = quote_ident(parent),
            counter = quote_ident(counter),
            fk = quote_ident(fk),
        )
    };
    let function = format!(
        "CREATE OR REPLACE FUNCTION {}() RETURNS trigger LANGUAGE plpgsql AS $$\n\
         BEGIN\n\
             IF TG_OP = 'INSERT' THEN\n\
                 {}\n\
                 RETURN NEW;\n\
             ELSIF TG_OP = 'DELETE' THEN\n\
                 {}\n\
                 RETURN OLD;\n\
             END IF;\n\
             RETURN NULL;\n\
         END;\n\
         $$;",
        quote_ident(&fn_name),
        step("+", "NEW"),
        step("-", "OLD"),
    );
    let trigger = format!(
        "CREATE TRIGGER {} AFTER INSERT OR DELETE ON {} FOR EACH ROW EXECUTE FUNCTION {}();",
        quote_ident(&trigger_name(child, counter)),
        quote_ident(child),
        quote_ident(&fn_name)
    );
    [function, trigger]
}

fn index_sql(table: &str, columns: &[&str]) -> String {
    let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "CREATE INDEX {} ON {} ({});",
        quote_ident(&recipebox_sql::index_name(table, columns)),
        quote_ident(table),
        cols.join(", ")
    )
}

// ============================================================================
// Migrations
// ============================================================================

fn create_user() -> Vec<String> {
    vec![
        touch_function_sql(),
        r#"CREATE TABLE "user" (
    "id" BIGSERIAL PRIMARY KEY,
    "email" TEXT NOT NULL UNIQUE,
    "name" TEXT NOT NULL,
    "password_hash" TEXT NOT NULL,
    "created_at" TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    "updated_at" TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#
        .to_owned(),
        touch_updated_at_sql("user", &[]),
    ]
}

/// Columns whose change counts as editing a recipe.
const RECIPE_CONTENT_COLUMNS: &[&str] = &[
    "title",
    "category",
    "description",
    "ingredients",
    "instructions",
    "time",
    "servings",
    "difficulty",
    "image_url",
    "is_approved",
    "is_public",
];

fn create_recipe() -> Vec<String> {
    vec![
        r#"CREATE TABLE "recipe" (
    "id" BIGSERIAL PRIMARY KEY,
    "user_id" BIGINT NOT NULL REFERENCES "user" ("id") ON DELETE CASCADE,
    "title" TEXT NOT NULL,
    "category" TEXT NOT NULL,
    "description" TEXT NOT NULL,
    "ingredients" TEXT[] NOT NULL,
    "instructions" TEXT NOT NULL,
    "time" TEXT NOT NULL DEFAULT '30 мин',
    "servings" INTEGER NOT NULL DEFAULT 2,
    "difficulty" TEXT NOT NULL DEFAULT 'Средняя',
    "image_url" TEXT,
    "is_approved" BOOLEAN NOT NULL DEFAULT FALSE,
    "is_public" BOOLEAN NOT NULL DEFAULT FALSE,
    "views_count" INTEGER NOT NULL DEFAULT 0,
    "likes_count" INTEGER NOT NULL DEFAULT 0,
    "created_at" TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    "updated_at" TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#
        .to_owned(),
        index_sql("recipe", &["user_id"]),
        index_sql("recipe", &["category"]),
        index_sql("recipe", &["is_public", "is_approved", "created_at"]),
        touch_updated_at_sql("recipe", RECIPE_CONTENT_COLUMNS),
    ]
}

fn create_recipe_like() -> Vec<String> {
    let [function, trigger] = counter_cache_sql("recipe_like", "recipe_id", "recipe", "likes_count");
    vec![
        r#"CREATE TABLE "recipe_like" (
    "id" BIGSERIAL PRIMARY KEY,
    "user_id" BIGINT NOT NULL REFERENCES "user" ("id") ON DELETE CASCADE,
    "recipe_id" BIGINT NOT NULL REFERENCES "recipe" ("id") ON DELETE CASCADE,
    "created_at" TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE ("user_id", "recipe_id")
)"#
        .to_owned(),
        index_sql("recipe_like", &["recipe_id"]),
        function,
        trigger,
    ]
}

fn create_recipe_favorite() -> Vec<String> {
    vec![
        r#"CREATE TABLE "recipe_favorite" (
    "id" BIGSERIAL PRIMARY KEY,
    "user_id" BIGINT NOT NULL REFERENCES "user" ("id") ON DELETE CASCADE,
    "recipe_id" BIGINT NOT NULL REFERENCES "recipe" ("id") ON DELETE CASCADE,
    "recipe_type" TEXT NOT NULL DEFAULT 'user_recipe',
    "created_at" TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE ("user_id", "recipe_id", "recipe_type")
)"#
        .to_owned(),
        index_sql("recipe_favorite", &["recipe_id"]),
    ]
}

fn create_recipe_comment() -> Vec<String> {
    vec![
        r#"CREATE TABLE "recipe_comment" (
    "id" BIGSERIAL PRIMARY KEY,
    "recipe_id" BIGINT NOT NULL REFERENCES "recipe" ("id") ON DELETE CASCADE,
    "user_id" BIGINT NOT NULL REFERENCES "user" ("id") ON DELETE CASCADE,
    "parent_id" BIGINT REFERENCES "recipe_comment" ("id") ON DELETE CASCADE,
    "content" TEXT NOT NULL,
    "created_at" TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    "updated_at" TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#
        .to_owned(),
        index_sql("recipe_comment", &["recipe_id"]),
        touch_updated_at_sql("recipe_comment", &[]),
    ]
}

fn create_recipe_view() -> Vec<String> {
    vec![
        r#"CREATE TABLE "recipe_view" (
    "id" BIGSERIAL PRIMARY KEY,
    "recipe_id" BIGINT NOT NULL REFERENCES "recipe" ("id") ON DELETE CASCADE,
    "user_id" BIGINT REFERENCES "user" ("id") ON DELETE SET NULL,
    "ip" INET,
    "user_agent" TEXT,
    "created_at" TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#
        .to_owned(),
        index_sql("recipe_view", &["recipe_id"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_sorted_and_unique() {
        let versions: Vec<&str> = MIGRATIONS.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(versions, sorted);
    }

    #[test]
    fn every_migration_has_statements() {
        for migration in MIGRATIONS {
            assert!(!(migration.statements)().is_empty(), "{}", migration.version);
        }
    }

    #[test]
    fn likes_counter_trigger() {
        let [function, trigger] =
            counter_cache_sql("recipe_like", "recipe_id", "recipe", "likes_count");
        insta::assert_snapshot!(function, @r#"
        CREATE OR REPLACE FUNCTION "trgfn_recipe_like_likes_count"() RETURNS trigger LANGUAGE plpgsql AS $$
        BEGIN
        IF TG_OP = 'INSERT' THEN
        UPDATE "recipe" SET "likes_count" = "likes_count" + 1 WHERE "id" = NEW."recipe_id";
        RETURN NEW;
        ELSIF TG_OP = 'DELETE' THEN
        UPDATE "recipe" SET "likes_count" = "likes_count" - 1 WHERE "id" = OLD."recipe_id";
        RETURN OLD;
        END IF;
        RETURN NULL;
        END;
        $$;
        "#);
        insta::assert_snapshot!(trigger, @r#"CREATE TRIGGER "trg_recipe_like_likes_count" AFTER INSERT OR DELETE ON "recipe_like" FOR EACH ROW EXECUTE FUNCTION "trgfn_recipe_like_likes_count"();"#);
    }

    #[test]
    fn recipe_touch_trigger_ignores_counters() {
        let sql = touch_updated_at_sql("recipe", RECIPE_CONTENT_COLUMNS);
        assert!(sql.starts_with(r#"CREATE TRIGGER "trg_recipe_touch_updated_at" BEFORE UPDATE OF "title", "#));
        assert!(!sql.contains("likes_count"));
        assert!(!sql.contains("views_count"));
    }

    #[test]
    fn user_touch_trigger_fires_on_any_update() {
        insta::assert_snapshot!(touch_updated_at_sql("user", &[]), @r#"CREATE TRIGGER "trg_user_touch_updated_at" BEFORE UPDATE ON "user" FOR EACH ROW EXECUTE FUNCTION "trgfn_any_touch_updated_at"();"#);
    }
}
