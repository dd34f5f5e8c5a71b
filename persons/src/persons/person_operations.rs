use async_trait::async_trait;
use common_cache::{EntityStore, StoreError};
use common_database::{is_unavailable_error, CustomDatabaseError};
use sqlx::PgPool;
use tracing::instrument;

use crate::persons::person_models::Person;

const PERSON_COLUMNS: &str = "id, firstname, lastname, age";

/// Postgres-backed person store over the `persons` table.
#[derive(Clone)]
pub struct PgPersonStore {
    pool: PgPool,
}

impl PgPersonStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_store_error(err: impl Into<CustomDatabaseError>) -> StoreError {
    let err = err.into();
    if err.is_timeout() {
        return StoreError::Timeout(err.to_string());
    }
    match &err {
        CustomDatabaseError::Other(sqlx_error) if is_unavailable_error(sqlx_error) => {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Database(err.to_string()),
    }
}

#[async_trait]
impl EntityStore<Person> for PgPersonStore {
    #[instrument(skip_all, fields(id = id))]
    async fn get(&self, id: &i64) -> Result<Option<Person>, StoreError> {
        let query = format!("SELECT {PERSON_COLUMNS} FROM persons WHERE id = $1");
        sqlx::query_as::<_, Person>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(to_store_error)
    }

    #[instrument(skip_all, fields(id = person.id))]
    async fn save(&self, person: &Person) -> Result<Person, StoreError> {
        let query = format!(
            "INSERT INTO persons ({PERSON_COLUMNS}) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET \
             firstname = EXCLUDED.firstname, lastname = EXCLUDED.lastname, age = EXCLUDED.age \
             RETURNING {PERSON_COLUMNS}"
        );
        sqlx::query_as::<_, Person>(&query)
            .bind(person.id)
            .bind(&person.firstname)
            .bind(&person.lastname)
            .bind(person.age)
            .fetch_one(&self.pool)
            .await
            .map_err(to_store_error)
    }

    #[instrument(skip_all, fields(id = id))]
    async fn delete(&self, id: &i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM persons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(to_store_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip_all)]
    async fn count(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM persons")
            .fetch_one(&self.pool)
            .await
            .map_err(to_store_error)
    }

    #[instrument(skip_all)]
    async fn find_all(&self) -> Result<Vec<Person>, StoreError> {
        let query = format!("SELECT {PERSON_COLUMNS} FROM persons ORDER BY id");
        sqlx::query_as::<_, Person>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(to_store_error)
    }
}
