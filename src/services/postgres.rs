use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::BTreeSet;
use std::time::Duration;
use uuid::Uuid;
use crate::models::{
    normalize_skill_name, tidy_skill_name, Direction, NewDeclaration, NewSwapRequest, PublicProfile,
    Skill, SkillDeclaration, SkillId, SkillOffer, SwapRequest, SwapRequestStatus,
};
use crate::services::ledger::{verify_swap_request, LedgerError, SkillLedger, SkillRegistry};

// Must stay in sync with the skills_name_key index in migrations/.
const NORMALIZED_NAME_SQL: &str = r"lower(regexp_replace(btrim(name), '\s+', ' ', 'g'))";

/// Pool settings for [`PostgresLedger`]
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub run_migrations: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 600,
            run_migrations: false,
        }
    }
}

/// Ledger backed by a direct connection to the hosted PostgreSQL database
///
/// Reads the same tables as [`crate::services::RestLedger`] but skips the
/// HTTP hop, which suits deployments running next to the database.
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Connect to PostgreSQL, optionally applying the bundled migrations
    pub async fn connect(database_url: &str, options: &PoolOptions) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .min_connections(options.min_connections)
            .acquire_timeout(Duration::from_secs(options.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(options.idle_timeout_secs))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        if options.run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Applied ledger migrations");
        }

        Ok(Self { pool })
    }
}

/// Parse an id column value, rejecting anything that is not a UUID
fn parse_id(kind: &str, id: &str) -> Result<Uuid, LedgerError> {
    Uuid::parse_str(id).map_err(|_| LedgerError::InvalidInput(format!("invalid {} id: {}", kind, id)))
}

fn parse_ids(kind: &str, ids: &BTreeSet<SkillId>) -> Result<Vec<Uuid>, LedgerError> {
    ids.iter().map(|id| parse_id(kind, id)).collect()
}

fn skill_from_row(row: &PgRow) -> Result<Skill, sqlx::Error> {
    Ok(Skill {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        description: row.try_get("description")?,
    })
}

#[async_trait]
impl SkillLedger for PostgresLedger {
    async fn skills_by_user_and_direction(
        &self,
        user_id: &str,
        direction: Direction,
    ) -> Result<BTreeSet<SkillId>, LedgerError> {
        let user = parse_id("user", user_id)?;
        let query = r#"
            SELECT skill_id::text AS skill_id
            FROM user_skills
            WHERE user_id = $1 AND type = $2
        "#;

        let rows = sqlx::query(query)
            .bind(user)
            .bind(direction.as_str())
            .fetch_all(&self.pool)
            .await?;

        let skills = rows
            .iter()
            .map(|row| row.try_get::<String, _>("skill_id"))
            .collect::<Result<BTreeSet<_>, _>>()?;

        tracing::debug!("User {} has {} {} skills", user_id, skills.len(), direction);
        Ok(skills)
    }

    async fn offerers_of_skills(
        &self,
        skill_ids: &BTreeSet<SkillId>,
        excluding_user_id: &str,
    ) -> Result<Vec<SkillOffer>, LedgerError> {
        if skill_ids.is_empty() {
            return Ok(Vec::new());
        }

        let excluded = parse_id("user", excluding_user_id)?;
        let query = r#"
            SELECT user_id::text AS user_id, skill_id::text AS skill_id
            FROM user_skills
            WHERE type = 'offer' AND user_id <> $1 AND skill_id = ANY($2)
            ORDER BY user_id, skill_id
        "#;

        let rows = sqlx::query(query)
            .bind(excluded)
            .bind(parse_ids("skill", skill_ids)?)
            .fetch_all(&self.pool)
            .await?;

        let offers = rows
            .iter()
            .map(|row| {
                Ok(SkillOffer {
                    user_id: row.try_get("user_id")?,
                    skill_id: row.try_get("skill_id")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(offers)
    }

    async fn skills_by_ids(&self, skill_ids: &BTreeSet<SkillId>) -> Result<Vec<Skill>, LedgerError> {
        if skill_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = r#"
            SELECT id::text AS id, name, category, description
            FROM skills
            WHERE id = ANY($1)
        "#;

        let rows = sqlx::query(query)
            .bind(parse_ids("skill", skill_ids)?)
            .fetch_all(&self.pool)
            .await?;

        let skills = rows.iter().map(skill_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(skills)
    }

    async fn public_profile_summary(&self, user_id: &str) -> Result<Option<PublicProfile>, LedgerError> {
        let user = parse_id("user", user_id)?;
        // Email is deliberately not selected
        let query = r#"
            SELECT id::text AS id, name, bio, rating::float8 AS rating, completed_swaps
            FROM profiles
            WHERE id = $1
        "#;

        let row = sqlx::query(query).bind(user).fetch_optional(&self.pool).await?;

        let profile = match row {
            Some(row) => Some(PublicProfile {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                bio: row.try_get("bio")?,
                rating: row.try_get("rating")?,
                completed_swaps: row.try_get("completed_swaps")?,
            }),
            None => None,
        };

        Ok(profile)
    }
}

#[async_trait]
impl SkillRegistry for PostgresLedger {
    async fn declare_skill(&self, declaration: NewDeclaration) -> Result<SkillDeclaration, LedgerError> {
        let user = parse_id("user", &declaration.user_id)?;
        let name = tidy_skill_name(&declaration.name);
        let key = normalize_skill_name(&name);

        let mut tx = self.pool.begin().await?;

        let select = format!("SELECT id FROM skills WHERE {} = $1 LIMIT 1", NORMALIZED_NAME_SQL);
        let existing: Option<Uuid> = sqlx::query_scalar(&select)
            .bind(&key)
            .fetch_optional(&mut *tx)
            .await?;

        let skill_id = match existing {
            Some(id) => id,
            None => {
                let inserted: Option<Uuid> = sqlx::query_scalar(
                    r#"
                    INSERT INTO skills (name, category, description)
                    VALUES ($1, $2, $3)
                    ON CONFLICT DO NOTHING
                    RETURNING id
                    "#,
                )
                .bind(&name)
                .bind(declaration.category.trim())
                .bind(&declaration.description)
                .fetch_optional(&mut *tx)
                .await?;

                match inserted {
                    Some(id) => {
                        tracing::info!("Created skill {} ({})", id, name);
                        id
                    }
                    // Lost a race with a concurrent insert of the same name
                    None => sqlx::query_scalar(&select)
                        .bind(&key)
                        .fetch_one(&mut *tx)
                        .await?,
                }
            }
        };

        let created_at: Option<chrono::DateTime<chrono::Utc>> = sqlx::query_scalar(
            r#"
            INSERT INTO user_skills (user_id, skill_id, type, level)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, skill_id, type) DO NOTHING
            RETURNING created_at
            "#,
        )
        .bind(user)
        .bind(skill_id)
        .bind(declaration.direction.as_str())
        .bind(&declaration.level)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(created_at) = created_at else {
            tx.rollback().await?;
            return Err(LedgerError::Conflict(format!(
                "user {} already declared skill {} as {}",
                declaration.user_id, skill_id, declaration.direction
            )));
        };

        tx.commit().await?;

        Ok(SkillDeclaration {
            user_id: declaration.user_id,
            skill_id: skill_id.to_string(),
            direction: declaration.direction,
            level: declaration.level,
            created_at: Some(created_at),
        })
    }

    async fn remove_declaration(
        &self,
        user_id: &str,
        skill_id: &str,
        direction: Direction,
    ) -> Result<bool, LedgerError> {
        let query = r#"
            DELETE FROM user_skills
            WHERE user_id = $1 AND skill_id = $2 AND type = $3
        "#;

        let result = sqlx::query(query)
            .bind(parse_id("user", user_id)?)
            .bind(parse_id("skill", skill_id)?)
            .bind(direction.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_swap_request(&self, request: NewSwapRequest) -> Result<SwapRequest, LedgerError> {
        verify_swap_request(self, &request).await?;

        let query = r#"
            INSERT INTO skill_swap_requests
                (requester_id, receiver_id, offered_skill_id, requested_skill_id, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id::text AS id, created_at
        "#;

        let row = sqlx::query(query)
            .bind(parse_id("user", &request.requester_id)?)
            .bind(parse_id("user", &request.receiver_id)?)
            .bind(parse_id("skill", &request.offered_skill_id)?)
            .bind(parse_id("skill", &request.requested_skill_id)?)
            .bind(SwapRequestStatus::Pending.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(SwapRequest {
            id: row.try_get("id")?,
            requester_id: request.requester_id,
            receiver_id: request.receiver_id,
            offered_skill_id: request.offered_skill_id,
            requested_skill_id: request.requested_skill_id,
            status: SwapRequestStatus::Pending,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn health_check(&self) -> Result<bool, LedgerError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
