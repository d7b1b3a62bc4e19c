//! Postgres-backed store.

use deadpool_postgres::Pool;
use recipebox_sql::{ColumnName, Delete, Expr, Insert, Select, Source, Update};
use tokio_postgres::{GenericClient, IsolationLevel};
use tokio_postgres::error::SqlState;

use crate::catalog::{CatalogQuery, categories_stmt};
use crate::{
    CatalogRows, CreatedRecipe, Error, FavoriteRecipe, FavoriteState, LikeState, NewRecipe,
    NewUser, NewView, Params, Recipe, RecipeId, RecipeStore, Result, User, UserId,
};

mod migrate;
mod pool;
mod rows;
mod traced;

pub use migrate::{
    MIGRATIONS, MIGRATIONS_TABLE, Migration, counter_cache_sql, run_migrations,
    touch_updated_at_sql,
};
pub use pool::{PoolSettings, build_pool, mask_password};
pub use traced::{ConnectionExt, TracedConn};

use rows::{RECIPE_COLUMNS, USER_COLUMNS};

/// Favorites written by this service all carry this type.
const FAVORITE_TYPE: &str = "user_recipe";

fn col(name: &str) -> Expr {
    Expr::column(name)
}

fn qcol(table: &str, name: &str) -> Expr {
    Expr::qualified(table, name)
}

fn param(name: &str) -> Expr {
    Expr::param(name)
}

fn names(cols: &[&str]) -> Vec<ColumnName> {
    cols.iter().map(|c| ColumnName::from(*c)).collect()
}

fn recipe_select() -> Select {
    RECIPE_COLUMNS
        .iter()
        .fold(Select::new(Source::table("recipe")), |stmt, c| stmt.item(col(c)))
}

fn newest_first(stmt: Select, table: Option<&str>) -> Select {
    let c = |name: &str| match table {
        Some(t) => qcol(t, name),
        None => col(name),
    };
    stmt.order_desc(c("created_at")).order_desc(c("id"))
}

fn like_key() -> Expr {
    col("user_id")
        .eq(param("user_id"))
        .and(col("recipe_id").eq(param("recipe_id")))
}

fn favorite_key() -> Expr {
    like_key().and(col("recipe_type").eq(Expr::text(FAVORITE_TYPE)))
}

fn pair_insert(table: &str, conflict: &[&str]) -> Insert {
    Insert::into(table)
        .value("user_id", param("user_id"))
        .value("recipe_id", param("recipe_id"))
        .on_conflict_do_nothing(names(conflict))
}

fn sql_state(err: &Error) -> Option<&SqlState> {
    match err {
        Error::Postgres(e) => e.code(),
        _ => None,
    }
}

/// Turn a foreign key violation into `NotFound` for the referenced entity.
fn missing_reference(err: Error, entity: &'static str, id: i64) -> Error {
    if sql_state(&err) == Some(&SqlState::FOREIGN_KEY_VIOLATION) {
        Error::not_found(entity, id)
    } else {
        err
    }
}

async fn ensure_recipe<C>(conn: &TracedConn<'_, C>, recipe: RecipeId) -> Result<()>
where
    C: GenericClient + Sync + ?Sized,
{
    let stmt = Select::new(Source::table("recipe"))
        .item(Expr::int(1))
        .filter(col("id").eq(param("id")));
    match conn.fetch_opt(&stmt, &Params::new().with("id", recipe)).await? {
        Some(_) => Ok(()),
        None => Err(Error::not_found("recipe", recipe)),
    }
}

async fn likes_count<C>(conn: &TracedConn<'_, C>, recipe: RecipeId) -> Result<i32>
where
    C: GenericClient + Sync + ?Sized,
{
    let stmt = Select::new(Source::table("recipe"))
        .item(col("likes_count"))
        .filter(col("id").eq(param("id")));
    let row = conn
        .fetch_one(&stmt, &Params::new().with("id", recipe))
        .await?;
    Ok(row.try_get("likes_count")?)
}

/// Add (`liked`) or remove the like row. The trigger moves the counter.
async fn set_like<C>(conn: &TracedConn<'_, C>, key: &Params, liked: bool) -> Result<u64>
where
    C: GenericClient + Sync + ?Sized,
{
    if liked {
        conn.run(&pair_insert("recipe_like", &["user_id", "recipe_id"]), key)
            .await
    } else {
        conn.run(&Delete::table("recipe_like").filter(like_key()), key)
            .await
    }
}

/// A [`RecipeStore`] over a Postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    /// Build the pool for `url`. Connections open lazily.
    pub fn connect(url: &str, settings: &PoolSettings) -> Result<Self> {
        Ok(Self::from_pool(build_pool(url, settings)?))
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> Result<Vec<&'static str>> {
        run_migrations(&self.pool).await
    }

    /// Close the pool. Checked-out connections are dropped when returned.
    pub fn close(&self) {
        self.pool.close();
    }

    /// Tell a missing recipe apart from someone else's.
    async fn ownership_error(&self, recipe: RecipeId) -> Error {
        match self.get_recipe(recipe).await {
            Ok(_) => Error::Forbidden("recipe"),
            Err(err) => err,
        }
    }
}

impl RecipeStore for PgStore {
    async fn ping(&self) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.traced().query_one("SELECT 1", &[]).await?;
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let email = user.email.clone();
        let stmt = Insert::into("user")
            .value("email", param("email"))
            .value("name", param("name"))
            .value("password_hash", param("password_hash"))
            .returning(names(USER_COLUMNS));
        let params = Params::new()
            .with("email", user.email)
            .with("name", user.name)
            .with("password_hash", user.password_hash);

        let conn = self.pool.get().await?;
        match conn.traced().fetch_one(&stmt, &params).await {
            Ok(row) => Ok(rows::user(&row)?),
            Err(err) if sql_state(&err) == Some(&SqlState::UNIQUE_VIOLATION) => Err(
                Error::Conflict(format!("email {email} is already registered")),
            ),
            Err(err) => Err(err),
        }
    }

    async fn create_recipe(&self, owner: UserId, recipe: NewRecipe) -> Result<CreatedRecipe> {
        let fields = [
            "user_id",
            "title",
            "category",
            "description",
            "ingredients",
            "instructions",
            "time",
            "servings",
            "difficulty",
            "image_url",
        ];
        let stmt = fields
            .iter()
            .fold(Insert::into("recipe"), |stmt, f| stmt.value(*f, param(f)))
            .returning(names(&["id", "title", "category", "created_at"]));
        let params = Params::new()
            .with("user_id", owner)
            .with("title", recipe.title())
            .with("category", recipe.category())
            .with("description", recipe.description())
            .with("ingredients", recipe.ingredients().to_vec())
            .with("instructions", recipe.instructions())
            .with("time", recipe.time())
            .with("servings", recipe.servings())
            .with("difficulty", recipe.difficulty())
            .with("image_url", recipe.image_url().map(str::to_owned));

        let conn = self.pool.get().await?;
        let row = conn
            .traced()
            .fetch_one(&stmt, &params)
            .await
            .map_err(|e| missing_reference(e, "user", owner))?;
        let created = rows::created(&row)?;
        tracing::info!(recipe = created.id, owner, "recipe created");
        Ok(created)
    }

    async fn get_recipe(&self, id: RecipeId) -> Result<Recipe> {
        let stmt = recipe_select().filter(col("id").eq(param("id")));
        let conn = self.pool.get().await?;
        match conn
            .traced()
            .fetch_opt(&stmt, &Params::new().with("id", id))
            .await?
        {
            Some(row) => Ok(rows::recipe(&row)?),
            None => Err(Error::not_found("recipe", id)),
        }
    }

    async fn owner_recipes(&self, owner: UserId) -> Result<Vec<Recipe>> {
        let stmt = newest_first(
            recipe_select().filter(col("user_id").eq(param("user_id"))),
            None,
        );
        let conn = self.pool.get().await?;
        let found = conn
            .traced()
            .fetch(&stmt, &Params::new().with("user_id", owner))
            .await?;
        Ok(found.iter().map(rows::recipe).collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn catalog_page(&self, query: &CatalogQuery) -> Result<CatalogRows> {
        let compiled = query.compile();
        let mut conn = self.pool.get().await?;
        let tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await?;

        let traced = tx.traced();
        let page = traced
            .fetch(&compiled.page_stmt(), compiled.params())
            .await?;
        let total: i64 = traced
            .fetch_one(&compiled.count_stmt(), compiled.params())
            .await?
            .try_get("total")?;
        tx.commit().await?;

        Ok(CatalogRows {
            recipes: page
                .iter()
                .map(rows::summary)
                .collect::<std::result::Result<Vec<_>, _>>()?,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn categories(&self) -> Result<Vec<String>> {
        let conn = self.pool.get().await?;
        let found = conn
            .traced()
            .fetch(&categories_stmt(), &Params::new())
            .await?;
        Ok(found
            .iter()
            .map(|row| row.try_get("category"))
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn toggle_like(&self, user: UserId, recipe: RecipeId) -> Result<LikeState> {
        let key = Params::new()
            .with("user_id", user)
            .with("recipe_id", recipe);
        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await?;
        let traced = tx.traced();

        ensure_recipe(&traced, recipe).await?;
        let removed = set_like(&traced, &key, false).await?;
        let liked = removed == 0;
        if liked {
            set_like(&traced, &key, true)
                .await
                .map_err(|e| missing_reference(e, "recipe", recipe))?;
        }
        let likes_count = likes_count(&traced, recipe).await?;
        tx.commit().await?;

        Ok(LikeState { liked, likes_count })
    }

    async fn toggle_favorite(&self, user: UserId, recipe: RecipeId) -> Result<FavoriteState> {
        let key = Params::new()
            .with("user_id", user)
            .with("recipe_id", recipe);
        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await?;
        let traced = tx.traced();

        ensure_recipe(&traced, recipe).await?;
        let removed = traced
            .run(
                &Delete::table("recipe_favorite").filter(favorite_key()),
                &key,
            )
            .await?;
        let favorited = removed == 0;
        if favorited {
            traced
                .run(
                    &pair_insert("recipe_favorite", &["user_id", "recipe_id", "recipe_type"]),
                    &key,
                )
                .await
                .map_err(|e| missing_reference(e, "recipe", recipe))?;
        }
        set_like(&traced, &key, favorited)
            .await
            .map_err(|e| missing_reference(e, "recipe", recipe))?;
        let likes_count = likes_count(&traced, recipe).await?;
        tx.commit().await?;

        Ok(FavoriteState {
            favorited,
            liked: favorited,
            likes_count,
        })
    }

    async fn favorites(&self, user: UserId) -> Result<Vec<FavoriteRecipe>> {
        let stmt = Select::new(Source::aliased("recipe_favorite", "f"))
            .all_of("r")
            .item_as(qcol("u", "name"), "author_name")
            .item_as(qcol("f", "created_at"), "favorited_at")
            .inner_join("recipe", "r", qcol("r", "id").eq(qcol("f", "recipe_id")))
            .inner_join("user", "u", qcol("u", "id").eq(qcol("r", "user_id")))
            .filter(qcol("f", "user_id").eq(param("user_id")))
            .filter(qcol("f", "recipe_type").eq(Expr::text(FAVORITE_TYPE)));
        let stmt = newest_first(stmt, Some("f"));

        let conn = self.pool.get().await?;
        let found = conn
            .traced()
            .fetch(&stmt, &Params::new().with("user_id", user))
            .await?;
        Ok(found.iter().map(rows::favorite).collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn set_visibility(
        &self,
        recipe: RecipeId,
        owner: UserId,
        is_public: bool,
    ) -> Result<Recipe> {
        let stmt = Update::table("recipe")
            .set("is_public", param("is_public"))
            .filter(col("id").eq(param("id")))
            .filter(col("user_id").eq(param("user_id")))
            .returning(names(RECIPE_COLUMNS));
        let params = Params::new()
            .with("is_public", is_public)
            .with("id", recipe)
            .with("user_id", owner);

        let row = {
            let conn = self.pool.get().await?;
            conn.traced().fetch_opt(&stmt, &params).await?
        };
        match row {
            Some(row) => Ok(rows::recipe(&row)?),
            None => Err(self.ownership_error(recipe).await),
        }
    }

    async fn delete_recipe(&self, recipe: RecipeId, owner: UserId) -> Result<()> {
        let stmt = Delete::table("recipe")
            .filter(col("id").eq(param("id")))
            .filter(col("user_id").eq(param("user_id")));
        let params = Params::new().with("id", recipe).with("user_id", owner);

        let deleted = {
            let conn = self.pool.get().await?;
            conn.traced().run(&stmt, &params).await?
        };
        if deleted == 0 {
            return Err(self.ownership_error(recipe).await);
        }
        tracing::info!(recipe, owner, "recipe deleted");
        Ok(())
    }

    async fn record_view(&self, view: NewView) -> Result<()> {
        let bump = Update::table("recipe")
            .set("views_count", col("views_count").add(Expr::int(1)))
            .filter(col("id").eq(param("recipe_id")));
        let insert = Insert::into("recipe_view")
            .value("recipe_id", param("recipe_id"))
            .value("user_id", param("user_id"))
            .value("ip", param("ip"))
            .value("user_agent", param("user_agent"));
        let params = Params::new()
            .with("recipe_id", view.recipe_id)
            .with("user_id", view.user_id)
            .with("ip", view.ip)
            .with("user_agent", view.user_agent);

        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await?;
        let traced = tx.traced();
        if traced.run(&bump, &params).await? == 0 {
            return Err(Error::not_found("recipe", view.recipe_id));
        }
        traced.run(&insert, &params).await.map_err(|e| match view.user_id {
            Some(user) => missing_reference(e, "user", user),
            None => e,
        })?;
        tx.commit().await?;
        Ok(())
    }

    async fn set_approval(&self, recipe: RecipeId, approved: bool) -> Result<Recipe> {
        let stmt = Update::table("recipe")
            .set("is_approved", param("is_approved"))
            .filter(col("id").eq(param("id")))
            .returning(names(RECIPE_COLUMNS));
        let params = Params::new()
            .with("is_approved", approved)
            .with("id", recipe);

        let conn = self.pool.get().await?;
        match conn.traced().fetch_opt(&stmt, &params).await? {
            Some(row) => {
                tracing::info!(recipe, approved, "approval changed");
                Ok(rows::recipe(&row)?)
            }
            None => Err(Error::not_found("recipe", recipe)),
        }
    }
}
