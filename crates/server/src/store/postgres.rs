//! `PostgreSQL` recipe store.
//!
//! # Table: `recipes`
//!
//! One row per provider recipe. Nutrition and tags are plain columns so that
//! filters become ordinary `WHERE` clauses; `extended_ingredients` is kept as
//! JSONB with a lower-cased `ingredient_names` array alongside it for fridge
//! matching.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument, warn};

use larder_core::{
    Cents, ExternalId, FridgeMatcher, Ingredient, NutrientField, Nutrition, Recipe, RecipeFilter,
};

use super::{
    RecipeHit, RecipeQuery, RecipeStore, SearchPage, StoreError, StorePredicate, UpsertFailure,
    UpsertReport,
};
/// How many single-row upserts run at once.
const UPSERT_CONCURRENCY: usize = 8;

/// Pool bounds. Upserts never hold more than `UPSERT_CONCURRENCY` connections.
const MAX_CONNECTIONS: u32 = 10;
const MIN_CONNECTIONS: u32 = 2;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS recipes (
        external_id          BIGINT PRIMARY KEY,
        title                TEXT NOT NULL,
        image                TEXT,
        extended_ingredients JSONB NOT NULL DEFAULT '[]'::jsonb,
        ingredient_names     TEXT[] NOT NULL DEFAULT '{}',
        ready_in_minutes     INTEGER,
        servings             INTEGER,
        price_per_serving    BIGINT,
        calories             DOUBLE PRECISION,
        protein              DOUBLE PRECISION,
        carbs                DOUBLE PRECISION,
        fat                  DOUBLE PRECISION,
        diets                TEXT[] NOT NULL DEFAULT '{}',
        cuisines             TEXT[] NOT NULL DEFAULT '{}',
        intolerances         TEXT[] NOT NULL DEFAULT '{}',
        score                DOUBLE PRECISION,
        updated_at           TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS recipes_title_fts_idx
        ON recipes USING GIN (to_tsvector('english', title))
    ",
    r"
    CREATE INDEX IF NOT EXISTS recipes_ingredient_names_idx
        ON recipes USING GIN (ingredient_names)
    ",
];

const COLUMNS: &str = "external_id, title, image, extended_ingredients, ready_in_minutes, \
     servings, price_per_serving, calories, protein, carbs, fat, diets, cuisines, \
     intolerances, score, updated_at";

const UPSERT: &str = r"
    INSERT INTO recipes (
        external_id, title, image, extended_ingredients, ingredient_names,
        ready_in_minutes, servings, price_per_serving,
        calories, protein, carbs, fat,
        diets, cuisines, intolerances, score, updated_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
    ON CONFLICT (external_id) DO UPDATE SET
        title = EXCLUDED.title,
        image = EXCLUDED.image,
        extended_ingredients = EXCLUDED.extended_ingredients,
        ingredient_names = EXCLUDED.ingredient_names,
        ready_in_minutes = EXCLUDED.ready_in_minutes,
        servings = EXCLUDED.servings,
        price_per_serving = EXCLUDED.price_per_serving,
        calories = EXCLUDED.calories,
        protein = EXCLUDED.protein,
        carbs = EXCLUDED.carbs,
        fat = EXCLUDED.fat,
        diets = EXCLUDED.diets,
        cuisines = EXCLUDED.cuisines,
        intolerances = EXCLUDED.intolerances,
        score = EXCLUDED.score,
        updated_at = EXCLUDED.updated_at
";

/// Recipe store backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgRecipeStore {
    pool: PgPool,
}

impl PgRecipeStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool.
    ///
    /// The schema is not touched; call [`RecipeStore::ensure_indexes`] once
    /// the store is open.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the connection cannot be established.
    pub async fn connect(database_url: &SecretString) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .min_connections(MIN_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url.expose_secret())
            .await?;
        Ok(Self::new(pool))
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecipeStore for PgRecipeStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self))]
    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("recipes schema ensured");
        Ok(())
    }

    #[instrument(skip_all, fields(count = recipes.len()))]
    async fn upsert_many(&self, recipes: &[Recipe]) -> Result<UpsertReport, StoreError> {
        let pending: Vec<_> = recipes
            .iter()
            .map(|recipe| {
                let external_id = recipe.external_id;
                let upsert = upsert_one(self.pool.clone(), recipe.clone());
                async move { (external_id, upsert.await) }
            })
            .collect();

        let outcomes: Vec<(ExternalId, Result<(), sqlx::Error>)> = stream::iter(pending)
            .buffer_unordered(UPSERT_CONCURRENCY)
            .collect()
            .await;

        let mut report = UpsertReport::default();
        for (external_id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.upserted += 1,
                Err(e) if is_connection_error(&e) => return Err(StoreError::Database(e)),
                Err(e) => {
                    warn!(%external_id, error = %e, "Recipe upsert rejected");
                    report.failures.push(UpsertFailure {
                        external_id,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: ExternalId) -> Result<Option<Recipe>, StoreError> {
        // Using runtime query since the table is created by ensure_indexes, not migrations
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {COLUMNS} FROM recipes WHERE external_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Recipe::from))
    }

    async fn count_matching(&self, predicate: StorePredicate) -> Result<u64, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM recipes");
        push_predicate(&mut builder, predicate);

        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        to_u64(count)
    }

    async fn sample_matching(
        &self,
        predicate: StorePredicate,
        limit: usize,
    ) -> Result<Vec<Recipe>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM recipes"));
        push_predicate(&mut builder, predicate);
        builder
            .push(" ORDER BY external_id ASC LIMIT ")
            .push_bind(to_i64(limit));

        let rows: Vec<RecipeRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Recipe::from).collect())
    }

    #[instrument(skip_all, fields(offset = query.offset, limit = query.limit))]
    async fn search(&self, query: &RecipeQuery) -> Result<SearchPage, StoreError> {
        let mut count_query = count_sql(&query.filter, &query.fridge);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut page_query = page_sql(query);
        let rows: Vec<HitRow> = page_query.build_query_as().fetch_all(&self.pool).await?;

        let results = rows
            .into_iter()
            .map(|row| {
                let match_count = usize::try_from(row.match_count).map_err(|_| {
                    StoreError::DataCorruption(format!("negative match count {}", row.match_count))
                })?;
                Ok(RecipeHit::new(Recipe::from(row.recipe), match_count))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(SearchPage {
            results,
            total_results: to_u64(total)?,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Insert or replace one recipe. Takes its inputs by value so the future is
/// `'static` and can be driven by `buffer_unordered`.
async fn upsert_one(pool: PgPool, recipe: Recipe) -> Result<(), sqlx::Error> {
    let names: Vec<String> = recipe.ingredient_names().collect();

    sqlx::query(UPSERT)
        .bind(recipe.external_id)
        .bind(&recipe.title)
        .bind(recipe.image.as_deref())
        .bind(Json(&recipe.extended_ingredients))
        .bind(names)
        .bind(recipe.ready_in_minutes)
        .bind(recipe.servings)
        .bind(recipe.price_per_serving.map(|p| p.as_i64()))
        .bind(recipe.nutrition.calories)
        .bind(recipe.nutrition.protein)
        .bind(recipe.nutrition.carbs)
        .bind(recipe.nutrition.fat)
        .bind(recipe.diets.as_slice())
        .bind(recipe.cuisines.as_slice())
        .bind(recipe.intolerances.as_slice())
        .bind(recipe.score)
        .bind(recipe.updated_at)
        .execute(&pool)
        .await?;
    Ok(())
}

// =============================================================================
// Query building
// =============================================================================

fn push_predicate(builder: &mut QueryBuilder<'_, Postgres>, predicate: StorePredicate) {
    match predicate {
        StorePredicate::All => {}
        StorePredicate::HasNutrient(field) => {
            builder.push(format!(" WHERE {} IS NOT NULL", field.as_str()));
        }
    }
}

/// `SELECT <columns>, <match_count> FROM recipes WHERE <filter>`.
///
/// Wrapped as a subquery by [`count_sql`] and [`page_sql`] so both see the
/// same filtered set and can refer to `match_count` by name.
fn push_matched<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    filter: &RecipeFilter,
    fridge: &FridgeMatcher,
) {
    builder.push("SELECT ");
    builder.push(COLUMNS);
    builder.push(", ");
    if fridge.is_empty() {
        builder.push("0::BIGINT");
    } else {
        // An ingredient counts once however many fridge items it matches
        builder.push(
            "(SELECT COUNT(*) FROM unnest(ingredient_names) AS ing(name) \
             WHERE EXISTS (SELECT 1 FROM unnest(",
        );
        builder.push_bind(fridge.items().to_vec());
        builder.push(
            "::TEXT[]) AS fridge(item) \
             WHERE strpos(ing.name, fridge.item) > 0 OR strpos(fridge.item, ing.name) > 0))",
        );
    }
    builder.push(" AS match_count FROM recipes WHERE TRUE");
    push_filter(builder, filter);
}

/// Any-word query string for `websearch_to_tsquery`.
///
/// Terms arrive without quotes or leading `-`; a bare `or` is dropped since
/// websearch syntax would read it as the operator.
fn websearch_query(terms: &[String]) -> Option<String> {
    let words: Vec<&str> = terms
        .iter()
        .map(String::as_str)
        .filter(|term| *term != "or")
        .collect();
    (!words.is_empty()).then(|| words.join(" or "))
}

fn push_filter<'a>(builder: &mut QueryBuilder<'a, Postgres>, filter: &RecipeFilter) {
    if let Some(query) = websearch_query(&filter.query_terms()) {
        builder.push(
            " AND to_tsvector('english', title) @@ websearch_to_tsquery('english', ",
        );
        builder.push_bind(query);
        builder.push(")");
    }

    if let Some(min) = filter.price.min {
        builder.push(" AND price_per_serving >= ").push_bind(min.as_i64());
    }
    if let Some(max) = filter.price.max {
        builder.push(" AND price_per_serving <= ").push_bind(max.as_i64());
    }

    if !filter.price_buckets.is_empty() {
        builder.push(" AND (");
        for (i, bucket) in filter.price_buckets.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder
                .push("(price_per_serving >= ")
                .push_bind(bucket.min().as_i64());
            if let Some(max) = bucket.max() {
                builder.push(" AND price_per_serving < ").push_bind(max.as_i64());
            }
            builder.push(")");
        }
        builder.push(")");
    }

    for field in NutrientField::ALL {
        let range = filter.nutrient(field);
        let column = field.as_str();
        if let Some(min) = range.min {
            builder.push(format!(" AND {column} >= ")).push_bind(min);
        }
        if let Some(max) = range.max {
            builder.push(format!(" AND {column} <= ")).push_bind(max);
        }
    }

    if !filter.diets.is_empty() {
        builder.push(" AND diets && ").push_bind(filter.diets.clone());
    }
    if !filter.cuisines.is_empty() {
        builder.push(" AND cuisines && ").push_bind(filter.cuisines.clone());
    }
    if !filter.intolerances.is_empty() {
        builder
            .push(" AND NOT (intolerances && ")
            .push_bind(filter.intolerances.clone())
            .push(")");
    }
}

fn push_match_requirement(builder: &mut QueryBuilder<'_, Postgres>, fridge: &FridgeMatcher) {
    if !fridge.is_empty() {
        builder.push(" WHERE matched.match_count > 0");
    }
}

fn count_sql(filter: &RecipeFilter, fridge: &FridgeMatcher) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM (");
    push_matched(&mut builder, filter, fridge);
    builder.push(") AS matched");
    push_match_requirement(&mut builder, fridge);
    builder
}

fn page_sql(query: &RecipeQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT * FROM (");
    push_matched(&mut builder, &query.filter, &query.fridge);
    builder.push(") AS matched");
    push_match_requirement(&mut builder, &query.fridge);
    builder
        .push(" ORDER BY matched.match_count DESC, matched.external_id ASC LIMIT ")
        .push_bind(to_i64(query.limit))
        .push(" OFFSET ")
        .push_bind(to_i64(query.offset));
    builder
}

/// Errors that mean the database itself is unreachable, not that one row was bad.
const fn is_connection_error(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_)
    )
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn to_u64(n: i64) -> Result<u64, StoreError> {
    u64::try_from(n).map_err(|_| StoreError::DataCorruption(format!("negative count {n}")))
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, FromRow)]
struct RecipeRow {
    external_id: ExternalId,
    title: String,
    image: Option<String>,
    extended_ingredients: Json<Vec<Ingredient>>,
    ready_in_minutes: Option<i32>,
    servings: Option<i32>,
    price_per_serving: Option<i64>,
    calories: Option<f64>,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    diets: Vec<String>,
    cuisines: Vec<String>,
    intolerances: Vec<String>,
    score: Option<f64>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct HitRow {
    #[sqlx(flatten)]
    recipe: RecipeRow,
    match_count: i64,
}

impl From<RecipeRow> for Recipe {
    fn from(row: RecipeRow) -> Self {
        Self {
            external_id: row.external_id,
            title: row.title,
            image: row.image,
            extended_ingredients: row.extended_ingredients.0,
            ready_in_minutes: row.ready_in_minutes,
            servings: row.servings,
            price_per_serving: row.price_per_serving.map(Cents::new),
            nutrition: Nutrition {
                calories: row.calories,
                protein: row.protein,
                carbs: row.carbs,
                fat: row.fat,
            },
            diets: row.diets,
            cuisines: row.cuisines,
            intolerances: row.intolerances,
            score: row.score,
            updated_at: row.updated_at,
        }
    }
}
