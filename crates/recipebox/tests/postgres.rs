//! Store tests against a real Postgres.
//!
//! Uses `POSTGRES_HOST`/`POSTGRES_PORT` (user and password `postgres`) when
//! set, otherwise starts a container per test.

#![cfg(feature = "test-postgres")]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use recipebox::{
    Catalog, CatalogRequest, Error, NewUser, NewView, PgStore, PoolSettings,
    RecipeForm, RecipeId, RecipeStore, UserId,
};
use recipebox::db::ConnectionExt;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;

struct TestDb {
    store: Arc<PgStore>,
    _container: Option<ContainerAsync<Postgres>>,
}

static NEXT_DB: AtomicU32 = AtomicU32::new(0);

async fn setup() -> TestDb {
    let (url, container) = match (std::env::var("POSTGRES_HOST"), std::env::var("POSTGRES_PORT")) {
        (Ok(host), Ok(port)) => {
            // Shared server: give every test its own database.
            let admin_url = format!("postgres://postgres:postgres@{host}:{port}/postgres");
            let name = format!(
                "recipebox_test_{}_{}",
                std::process::id(),
                NEXT_DB.fetch_add(1, Ordering::Relaxed)
            );
            let admin = PgStore::connect(&admin_url, &PoolSettings::default()).unwrap();
            {
                let conn = admin.pool().get().await.unwrap();
                conn.traced()
                    .execute(&format!("CREATE DATABASE \"{name}\""), &[])
                    .await
                    .unwrap();
            }
            admin.close();
            (format!("postgres://postgres:postgres@{host}:{port}/{name}"), None)
        }
        _ => {
            let container = Postgres::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            (
                format!("postgres://postgres:postgres@{host}:{port}/postgres"),
                Some(container),
            )
        }
    };

    let store = PgStore::connect(&url, &PoolSettings::default()).unwrap();
    store.migrate().await.unwrap();
    TestDb {
        store: Arc::new(store),
        _container: container,
    }
}

async fn user(store: &PgStore, name: &str) -> UserId {
    store
        .create_user(NewUser {
            email: format!("{name}@example.com"),
            name: name.to_owned(),
            password_hash: "hash".into(),
        })
        .await
        .unwrap()
        .id
}

fn form(title: &str, category: &str, ingredients: &[&str]) -> RecipeForm {
    RecipeForm {
        title: Some(title.into()),
        category: Some(category.into()),
        description: Some("home cooking".into()),
        ingredients: Some(ingredients.iter().map(|s| s.to_string()).collect()),
        instructions: Some("Cook it.".into()),
        ..Default::default()
    }
}

async fn recipe(store: &PgStore, owner: UserId, form: RecipeForm, listed: bool) -> RecipeId {
    let id = store
        .create_recipe(owner, form.validate().unwrap())
        .await
        .unwrap()
        .id;
    if listed {
        store.set_visibility(id, owner, true).await.unwrap();
        store.set_approval(id, true).await.unwrap();
    }
    id
}

async fn scalar(store: &PgStore, sql: &str, id: i64) -> i64 {
    let conn = store.pool().get().await.unwrap();
    conn.traced()
        .query_one(sql, &[&id])
        .await
        .unwrap()
        .get(0)
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = setup().await;
    assert!(db.store.migrate().await.unwrap().is_empty());
    db.store.ping().await.unwrap();
}

#[tokio::test]
async fn defaults_apply_on_create() {
    let db = setup().await;
    let owner = user(&db.store, "ann").await;
    let id = recipe(&db.store, owner, form("Borscht", "Soups", &["beet"]), false).await;

    let row = db.store.get_recipe(id).await.unwrap();
    assert_eq!(row.time, "30 мин");
    assert_eq!(row.servings, 2);
    assert_eq!(row.difficulty, "Средняя");
    assert!(!row.is_public && !row.is_approved);
    assert_eq!((row.likes_count, row.views_count), (0, 0));
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let db = setup().await;
    user(&db.store, "ann").await;
    let err = db
        .store
        .create_user(NewUser {
            email: "ann@example.com".into(),
            name: "Ann again".into(),
            password_hash: "hash".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "{err:?}");
}

#[tokio::test]
async fn like_trigger_tracks_rows() {
    let db = setup().await;
    let owner = user(&db.store, "ann").await;
    let fan = user(&db.store, "bob").await;
    let id = recipe(&db.store, owner, form("Borscht", "Soups", &["beet"]), true).await;
    let before = db.store.get_recipe(id).await.unwrap().updated_at;

    let on = db.store.toggle_like(fan, id).await.unwrap();
    assert!(on.liked);
    assert_eq!(on.likes_count, 1);
    let rows = scalar(
        &db.store,
        r#"SELECT COUNT(*) FROM "recipe_like" WHERE "recipe_id" = $1"#,
        id,
    )
    .await;
    assert_eq!(rows, 1);

    let off = db.store.toggle_like(fan, id).await.unwrap();
    assert!(!off.liked);
    assert_eq!(off.likes_count, 0);

    // Counter maintenance is not an edit.
    assert_eq!(db.store.get_recipe(id).await.unwrap().updated_at, before);

    let err = db.store.toggle_like(fan, id + 1000).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { entity: "recipe", .. }));
}

#[tokio::test]
async fn concurrent_likes_all_count() {
    let db = setup().await;
    let owner = user(&db.store, "owner").await;
    let id = recipe(&db.store, owner, form("Pie", "Baking", &["flour"]), true).await;

    let mut fans = Vec::new();
    for i in 0..8 {
        fans.push(user(&db.store, &format!("fan{i}")).await);
    }
    let tasks: Vec<_> = fans
        .into_iter()
        .map(|fan| {
            let store = Arc::clone(&db.store);
            tokio::spawn(async move { store.toggle_like(fan, id).await })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().unwrap().liked);
    }

    assert_eq!(db.store.get_recipe(id).await.unwrap().likes_count, 8);
}

#[tokio::test]
async fn favorite_keeps_like_in_step() {
    let db = setup().await;
    let owner = user(&db.store, "ann").await;
    let fan = user(&db.store, "bob").await;
    let id = recipe(&db.store, owner, form("Borscht", "Soups", &["beet"]), true).await;

    let fav = db.store.toggle_favorite(fan, id).await.unwrap();
    assert!(fav.favorited && fav.liked);
    assert_eq!(fav.likes_count, 1);

    let favorites = db.store.favorites(fan).await.unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].recipe.id, id);
    assert_eq!(favorites[0].author_name, "ann");

    let unfav = db.store.toggle_favorite(fan, id).await.unwrap();
    assert!(!unfav.favorited && !unfav.liked);
    assert_eq!(unfav.likes_count, 0);
    assert!(db.store.favorites(fan).await.unwrap().is_empty());
}

#[tokio::test]
async fn visibility_needs_ownership() {
    let db = setup().await;
    let owner = user(&db.store, "ann").await;
    let other = user(&db.store, "bob").await;
    let id = recipe(&db.store, owner, form("Borscht", "Soups", &["beet"]), false).await;

    let err = db.store.set_visibility(id, other, true).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)), "{err:?}");
    let err = db.store.set_visibility(id + 1000, owner, true).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "{err:?}");

    let published = db.store.set_visibility(id, owner, true).await.unwrap();
    assert!(published.is_public);
    assert!(!published.is_approved);
}

#[tokio::test]
async fn delete_cascades() {
    let db = setup().await;
    let owner = user(&db.store, "ann").await;
    let fan = user(&db.store, "bob").await;
    let id = recipe(&db.store, owner, form("Borscht", "Soups", &["beet"]), true).await;

    db.store.toggle_favorite(fan, id).await.unwrap();
    db.store
        .record_view(NewView {
            recipe_id: id,
            user_id: Some(fan),
            ip: Some("192.0.2.7".parse().unwrap()),
            user_agent: Some("test".into()),
        })
        .await
        .unwrap();
    {
        let conn = db.store.pool().get().await.unwrap();
        conn.traced()
            .execute(
                r#"INSERT INTO "recipe_comment" ("recipe_id", "user_id", "content") VALUES ($1, $2, 'yum')"#,
                &[&id, &fan],
            )
            .await
            .unwrap();
    }

    let err = db.store.delete_recipe(id, fan).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    db.store.delete_recipe(id, owner).await.unwrap();

    for table in ["recipe_like", "recipe_favorite", "recipe_comment", "recipe_view"] {
        let left = scalar(
            &db.store,
            &format!(r#"SELECT COUNT(*) FROM "{table}" WHERE "recipe_id" = $1"#),
            id,
        )
        .await;
        assert_eq!(left, 0, "{table}");
    }
}

#[tokio::test]
async fn views_count_and_keep_anonymous_rows() {
    let db = setup().await;
    let owner = user(&db.store, "ann").await;
    let id = recipe(&db.store, owner, form("Borscht", "Soups", &["beet"]), true).await;

    for ip in ["192.0.2.1", "2001:db8::1"] {
        db.store
            .record_view(NewView {
                recipe_id: id,
                user_id: None,
                ip: Some(ip.parse().unwrap()),
                user_agent: None,
            })
            .await
            .unwrap();
    }
    assert_eq!(db.store.get_recipe(id).await.unwrap().views_count, 2);

    let err = db
        .store
        .record_view(NewView {
            recipe_id: id + 1000,
            user_id: None,
            ip: None,
            user_agent: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn catalog_pages_and_filters() {
    let db = setup().await;
    let owner = user(&db.store, "chef").await;
    for i in 0..15 {
        recipe(&db.store, owner, form(&format!("Soup {i}"), "Soups", &["water"]), true).await;
    }
    let chicken = recipe(
        &db.store,
        owner,
        form("Dinner", "Mains", &["Chicken breast", "rice"]),
        true,
    )
    .await;
    recipe(&db.store, owner, form("Hidden chicken", "Mains", &["chicken"]), false).await;

    let catalog = Catalog::new(Arc::clone(&db.store));
    let req = |category: Option<&str>, search: Option<&str>, page: &str| CatalogRequest {
        category: category.map(Into::into),
        search: search.map(Into::into),
        page: Some(page.into()),
        limit: Some("12".into()),
    };

    let page2 = catalog
        .list_public_recipes(&req(Some("Soups"), None, "2"))
        .await
        .unwrap();
    assert_eq!(page2.recipes.len(), 3);
    assert_eq!(page2.pagination.total, 15);
    assert_eq!(page2.pagination.total_pages, 2);

    let all = catalog.list_public_recipes(&req(Some("all"), None, "1")).await.unwrap();
    let none = catalog.list_public_recipes(&req(None, None, "1")).await.unwrap();
    assert_eq!(all.pagination, none.pagination);
    assert_eq!(all.pagination.total, 16);

    let found = catalog
        .list_public_recipes(&req(None, Some("CHICKEN"), "1"))
        .await
        .unwrap();
    assert_eq!(found.pagination.total, 1);
    assert_eq!(found.recipes[0].recipe.id, chicken);
    assert_eq!(found.recipes[0].author_name, "chef");

    assert_eq!(
        catalog.list_categories().await.unwrap(),
        vec!["Mains".to_string(), "Soups".to_string()]
    );
}

#[tokio::test]
async fn paging_visits_each_recipe_once_in_order() {
    let db = setup().await;
    let owner = user(&db.store, "chef").await;
    let mut ids = Vec::new();
    for _ in 0..7 {
        ids.push(recipe(&db.store, owner, form("Soup", "Soups", &["water"]), true).await);
    }
    recipe(&db.store, owner, form("Soup", "Soups", &["water"]), false).await;

    // Two creation instants, each shared by several recipes.
    {
        let conn = db.store.pool().get().await.unwrap();
        for (i, id) in ids.iter().enumerate() {
            let at = if i < 4 { "2024-05-01 12:00:00+00" } else { "2024-05-01 11:00:00+00" };
            let sql = format!(r#"UPDATE "recipe" SET "created_at" = '{at}' WHERE "id" = $1"#);
            conn.traced().execute(&sql, &[id]).await.unwrap();
        }
    }

    let catalog = Catalog::new(Arc::clone(&db.store));
    let req = |page: Option<String>, limit: &str| CatalogRequest {
        page,
        limit: Some(limit.into()),
        ..Default::default()
    };

    let expected = vec![ids[3], ids[2], ids[1], ids[0], ids[6], ids[5], ids[4]];
    let single = catalog.list_public_recipes(&req(None, "1000")).await.unwrap();
    let single: Vec<RecipeId> = single.recipes.iter().map(|r| r.recipe.id).collect();
    assert_eq!(single, expected);

    for limit in ["1", "2", "3", "7"] {
        let total_pages = catalog
            .list_public_recipes(&req(None, limit))
            .await
            .unwrap()
            .pagination
            .total_pages;
        let mut paged = Vec::new();
        for page in 1..=total_pages {
            let rows = catalog
                .list_public_recipes(&req(Some(page.to_string()), limit))
                .await
                .unwrap();
            paged.extend(rows.recipes.iter().map(|r| r.recipe.id));
        }
        let unique: std::collections::HashSet<_> = paged.iter().collect();
        assert_eq!(unique.len(), paged.len(), "limit={limit}");
        assert_eq!(paged, expected, "limit={limit}");
    }
}

#[tokio::test]
async fn escaped_wildcards_search_literally() {
    let db = setup().await;
    let owner = user(&db.store, "chef").await;
    let literal = recipe(&db.store, owner, form("a_b", "Soups", &["water"]), true).await;
    recipe(&db.store, owner, form("axb", "Soups", &["water"]), true).await;

    let catalog = Catalog::new(Arc::clone(&db.store));
    let search = |term: &str| CatalogRequest {
        search: Some(term.into()),
        ..Default::default()
    };

    let escaped = catalog.list_public_recipes(&search(r"a\_b")).await.unwrap();
    assert_eq!(escaped.pagination.total, 1);
    assert_eq!(escaped.recipes[0].recipe.id, literal);

    let wildcard = catalog.list_public_recipes(&search("a_b")).await.unwrap();
    assert_eq!(wildcard.pagination.total, 2);
}

#[tokio::test]
async fn owner_sees_own_recipes_listed_or_not() {
    let db = setup().await;
    let owner = user(&db.store, "chef").await;
    let other = user(&db.store, "guest").await;
    let listed = recipe(&db.store, owner, form("Borscht", "Soups", &["beet"]), true).await;
    let draft = recipe(&db.store, owner, form("Draft", "Soups", &["water"]), false).await;
    recipe(&db.store, other, form("Not mine", "Mains", &["rice"]), true).await;

    let mut mine: Vec<RecipeId> = db
        .store
        .owner_recipes(owner)
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    mine.sort();
    assert_eq!(mine, vec![listed, draft]);
}
