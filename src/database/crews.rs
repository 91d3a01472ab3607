// ABOUTME: Run crew and membership database operations
// ABOUTME: Crew CRUD, join-code lookup, membership roles, and transactional ownership transfer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use chrono::{DateTime, Utc};
use gofast_core::errors::{AppError, AppResult};
use gofast_core::models::{generate_join_code, Athlete, CrewMembership, CrewRole, RunCrew};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use super::athletes::row_to_athlete;
use super::{parse_timestamp, parse_uuid, violates_unique_column};

const CREW_COLUMNS: &str =
    "id, name, description, join_code, handle, city, logo_url, created_at, updated_at";

/// Attempts at drawing an unused join code before giving up
const JOIN_CODE_ATTEMPTS: usize = 5;

/// A crew the athlete belongs to, with their role in it
#[derive(Debug, Clone)]
pub struct AthleteCrew {
    /// The crew
    pub crew: RunCrew,
    /// The athlete's role
    pub role: CrewRole,
    /// When the athlete joined
    pub joined_at: DateTime<Utc>,
    /// Current member count
    pub member_count: i64,
}

/// A membership joined with the member's profile
#[derive(Debug, Clone)]
pub struct CrewMemberDetail {
    /// Membership row
    pub membership: CrewMembership,
    /// Member profile
    pub athlete: Athlete,
}

/// Run crew database operations manager
pub struct CrewManager {
    pool: SqlitePool,
}

impl CrewManager {
    /// Create a new crew manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Crews
    // ========================================================================

    /// Insert a crew and make `admin_id` its first admin, in one transaction
    ///
    /// A join code collision draws a fresh code; `crew.join_code` holds the stored one.
    ///
    /// # Errors
    ///
    /// - `ResourceAlreadyExists` if the crew handle is taken
    /// - `DatabaseError` if no unused join code was found
    pub async fn create_with_admin(
        &self,
        crew: &mut RunCrew,
        admin_id: Uuid,
    ) -> AppResult<CrewMembership> {
        for attempt in 1..=JOIN_CODE_ATTEMPTS {
            match self.try_create_with_admin(crew, admin_id).await {
                Err(e) if violates_unique_column(&e, "join_code") => {
                    debug!(attempt, "Join code collision, drawing a new one");
                    crew.join_code = generate_join_code();
                }
                Err(e) if violates_unique_column(&e, "handle") => {
                    return Err(AppError::already_exists("That crew handle is already taken"));
                }
                Err(e) => {
                    return Err(AppError::database(format!("Failed to create run crew: {e}")));
                }
                Ok(membership) => return Ok(membership),
            }
        }

        warn!("Exhausted join code attempts");
        Err(AppError::database("Failed to allocate a unique join code"))
    }

    async fn try_create_with_admin(
        &self,
        crew: &RunCrew,
        admin_id: Uuid,
    ) -> Result<CrewMembership, sqlx::Error> {
        let membership = CrewMembership::new(crew.id, admin_id, CrewRole::Admin);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO run_crews (id, name, description, join_code, handle, city, logo_url,
                                   created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(crew.id.to_string())
        .bind(&crew.name)
        .bind(&crew.description)
        .bind(&crew.join_code)
        .bind(&crew.handle)
        .bind(&crew.city)
        .bind(&crew.logo_url)
        .bind(crew.created_at.to_rfc3339())
        .bind(crew.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        insert_membership(&mut tx, &membership).await?;
        tx.commit().await?;

        Ok(membership)
    }

    /// Get a crew by id
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get(&self, id: Uuid) -> AppResult<Option<RunCrew>> {
        self.fetch_one_by("id", &id.to_string()).await
    }

    /// Get a crew by its (normalized) join code
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_by_join_code(&self, join_code: &str) -> AppResult<Option<RunCrew>> {
        self.fetch_one_by("join_code", join_code).await
    }

    /// Get a crew by its (normalized) handle
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_by_handle(&self, handle: &str) -> AppResult<Option<RunCrew>> {
        self.fetch_one_by("handle", handle).await
    }

    async fn fetch_one_by(&self, column: &'static str, value: &str) -> AppResult<Option<RunCrew>> {
        let row = sqlx::query(&format!(
            "SELECT {CREW_COLUMNS} FROM run_crews WHERE {column} = $1"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get run crew: {e}")))?;

        row.map(|r| row_to_crew(&r)).transpose()
    }

    /// Persist editable crew fields and bump `updated_at`
    ///
    /// # Errors
    ///
    /// - `ResourceAlreadyExists` if the handle belongs to another crew
    /// - `ResourceNotFound` if the crew no longer exists
    pub async fn update(&self, crew: &RunCrew) -> AppResult<RunCrew> {
        let now = Utc::now();
        let result = sqlx::query(
            r"
            UPDATE run_crews
            SET name = $1, description = $2, handle = $3, city = $4, logo_url = $5, updated_at = $6
            WHERE id = $7
            ",
        )
        .bind(&crew.name)
        .bind(&crew.description)
        .bind(&crew.handle)
        .bind(&crew.city)
        .bind(&crew.logo_url)
        .bind(now.to_rfc3339())
        .bind(crew.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if violates_unique_column(&e, "handle") {
                AppError::already_exists("That crew handle is already taken")
            } else {
                AppError::database(format!("Failed to update run crew: {e}"))
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Run crew"));
        }

        Ok(RunCrew {
            updated_at: now,
            ..crew.clone()
        })
    }

    /// Delete a crew; memberships, content, runs and RSVPs cascade
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM run_crews WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete run crew: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Crews the athlete belongs to, most recently joined first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_for_athlete(&self, athlete_id: Uuid) -> AppResult<Vec<AthleteCrew>> {
        let rows = sqlx::query(
            r"
            SELECT c.id, c.name, c.description, c.join_code, c.handle, c.city, c.logo_url,
                   c.created_at, c.updated_at, m.role, m.joined_at,
                   (SELECT COUNT(*) FROM crew_memberships cm WHERE cm.run_crew_id = c.id) AS member_count
            FROM crew_memberships m
            JOIN run_crews c ON c.id = m.run_crew_id
            WHERE m.athlete_id = $1
            ORDER BY m.joined_at DESC
            ",
        )
        .bind(athlete_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list athlete crews: {e}")))?;

        rows.iter()
            .map(|row| {
                let role: String = row.get("role");
                let joined_at: String = row.get("joined_at");
                Ok(AthleteCrew {
                    crew: row_to_crew(row)?,
                    role: role.parse().map_err(|e: AppError| AppError::database(e.message))?,
                    joined_at: parse_timestamp(&joined_at)?,
                    member_count: row.get("member_count"),
                })
            })
            .collect()
    }

    // ========================================================================
    // Memberships
    // ========================================================================

    /// Full membership list of a crew, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_memberships(&self, run_crew_id: Uuid) -> AppResult<Vec<CrewMembership>> {
        let rows = sqlx::query(
            r"
            SELECT id, run_crew_id, athlete_id, role, joined_at
            FROM crew_memberships
            WHERE run_crew_id = $1
            ORDER BY joined_at ASC, rowid ASC
            ",
        )
        .bind(run_crew_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list crew memberships: {e}")))?;

        rows.iter().map(row_to_membership).collect()
    }

    /// Memberships joined with member profiles, admins first then by join date
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_member_details(&self, run_crew_id: Uuid) -> AppResult<Vec<CrewMemberDetail>> {
        let rows = sqlx::query(
            r"
            SELECT m.id AS membership_id, m.run_crew_id, m.athlete_id, m.role, m.joined_at,
                   a.id, a.firebase_id, a.email, a.first_name, a.last_name, a.gofast_handle,
                   a.city, a.state, a.bio, a.photo_url, a.created_at, a.updated_at
            FROM crew_memberships m
            JOIN athletes a ON a.id = m.athlete_id
            WHERE m.run_crew_id = $1
            ORDER BY CASE m.role WHEN 'admin' THEN 0 WHEN 'manager' THEN 1 ELSE 2 END,
                     m.joined_at ASC
            ",
        )
        .bind(run_crew_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list crew members: {e}")))?;

        rows.iter()
            .map(|row| {
                let membership_id: String = row.get("membership_id");
                let run_crew_id: String = row.get("run_crew_id");
                let role: String = row.get("role");
                let joined_at: String = row.get("joined_at");
                let athlete = row_to_athlete(row)?;
                Ok(CrewMemberDetail {
                    membership: CrewMembership {
                        id: parse_uuid(&membership_id)?,
                        run_crew_id: parse_uuid(&run_crew_id)?,
                        athlete_id: athlete.id,
                        role: role.parse().map_err(|e: AppError| AppError::database(e.message))?,
                        joined_at: parse_timestamp(&joined_at)?,
                    },
                    athlete,
                })
            })
            .collect()
    }

    /// Number of members in a crew
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn member_count(&self, run_crew_id: Uuid) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM crew_memberships WHERE run_crew_id = $1")
            .bind(run_crew_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count crew members: {e}")))
    }

    /// Add a membership
    ///
    /// # Errors
    ///
    /// Returns `ResourceAlreadyExists` if the athlete is already a member
    pub async fn add_member(&self, membership: &CrewMembership) -> AppResult<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::database(format!("Failed to acquire connection: {e}")))?;

        insert_membership(&mut conn, membership)
            .await
            .map_err(|e| {
                if violates_unique_column(&e, "crew_memberships") {
                    AppError::already_exists("You are already a member of this run crew")
                } else {
                    AppError::database(format!("Failed to add crew member: {e}"))
                }
            })
    }

    /// Change a member's role and return the updated membership
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the athlete is not a member
    pub async fn update_role(
        &self,
        run_crew_id: Uuid,
        athlete_id: Uuid,
        role: CrewRole,
    ) -> AppResult<CrewMembership> {
        let row = sqlx::query(
            r"
            UPDATE crew_memberships
            SET role = $1
            WHERE run_crew_id = $2 AND athlete_id = $3
            RETURNING id, run_crew_id, athlete_id, role, joined_at
            ",
        )
        .bind(role.as_str())
        .bind(run_crew_id.to_string())
        .bind(athlete_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update member role: {e}")))?;

        row.map(|r| row_to_membership(&r))
            .transpose()?
            .ok_or_else(|| AppError::not_found("Crew member"))
    }

    /// Remove a membership; returns whether a row was deleted
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn remove_member(&self, run_crew_id: Uuid, athlete_id: Uuid) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM crew_memberships WHERE run_crew_id = $1 AND athlete_id = $2")
                .bind(run_crew_id.to_string())
                .bind(athlete_id.to_string())
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to remove crew member: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Promote `new_admin` and demote `previous_admin` to `demote_to` atomically
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if either athlete is no longer a member
    pub async fn transfer_ownership(
        &self,
        run_crew_id: Uuid,
        previous_admin: Uuid,
        new_admin: Uuid,
        demote_to: CrewRole,
    ) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        for (athlete_id, role) in [(new_admin, CrewRole::Admin), (previous_admin, demote_to)] {
            let result = sqlx::query(
                "UPDATE crew_memberships SET role = $1 WHERE run_crew_id = $2 AND athlete_id = $3",
            )
            .bind(role.as_str())
            .bind(run_crew_id.to_string())
            .bind(athlete_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to transfer ownership: {e}")))?;

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls back the first update
                return Err(AppError::not_found("Crew member"));
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit ownership transfer: {e}")))
    }
}

async fn insert_membership(
    conn: &mut sqlx::SqliteConnection,
    membership: &CrewMembership,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        INSERT INTO crew_memberships (id, run_crew_id, athlete_id, role, joined_at)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(membership.id.to_string())
    .bind(membership.run_crew_id.to_string())
    .bind(membership.athlete_id.to_string())
    .bind(membership.role.as_str())
    .bind(membership.joined_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(())
}

fn row_to_crew(row: &SqliteRow) -> AppResult<RunCrew> {
    let id: String = row.get("id");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(RunCrew {
        id: parse_uuid(&id)?,
        name: row.get("name"),
        description: row.get("description"),
        join_code: row.get("join_code"),
        handle: row.get("handle"),
        city: row.get("city"),
        logo_url: row.get("logo_url"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_to_membership(row: &SqliteRow) -> AppResult<CrewMembership> {
    let id: String = row.get("id");
    let run_crew_id: String = row.get("run_crew_id");
    let athlete_id: String = row.get("athlete_id");
    let role: String = row.get("role");
    let joined_at: String = row.get("joined_at");

    Ok(CrewMembership {
        id: parse_uuid(&id)?,
        run_crew_id: parse_uuid(&run_crew_id)?,
        athlete_id: parse_uuid(&athlete_id)?,
        role: role
            .parse()
            .map_err(|e: AppError| AppError::database(e.message))?,
        joined_at: parse_timestamp(&joined_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use gofast_core::errors::ErrorCode;

    async fn setup() -> (Database, Athlete, Athlete) {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let admin = Athlete::new("admin".to_owned(), None);
        let member = Athlete::new("member".to_owned(), None);
        db.athletes().create(&admin).await.unwrap();
        db.athletes().create(&member).await.unwrap();
        (db, admin, member)
    }

    #[tokio::test]
    async fn test_create_crew_makes_creator_admin() {
        let (db, admin, _) = setup().await;
        let mut crew = RunCrew::new("Dawn Patrol".to_owned(), None, None);
        let membership = db.crews().create_with_admin(&mut crew, admin.id).await.unwrap();

        assert_eq!(membership.role, CrewRole::Admin);
        let stored = db.crews().get_by_join_code(&crew.join_code).await.unwrap().unwrap();
        assert_eq!(stored.id, crew.id);

        let mine = db.crews().list_for_athlete(admin.id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].role, CrewRole::Admin);
        assert_eq!(mine[0].member_count, 1);
    }

    #[tokio::test]
    async fn test_join_code_collision_retries() {
        let (db, admin, _) = setup().await;
        let mut first = RunCrew::new("One".to_owned(), None, None);
        db.crews().create_with_admin(&mut first, admin.id).await.unwrap();

        let mut second = RunCrew::new("Two".to_owned(), None, None);
        second.join_code.clone_from(&first.join_code);
        db.crews().create_with_admin(&mut second, admin.id).await.unwrap();
        assert_ne!(first.join_code, second.join_code);
    }

    #[tokio::test]
    async fn test_duplicate_membership_conflicts() {
        let (db, admin, member) = setup().await;
        let mut crew = RunCrew::new("Crew".to_owned(), None, None);
        db.crews().create_with_admin(&mut crew, admin.id).await.unwrap();

        let membership = CrewMembership::new(crew.id, member.id, CrewRole::Member);
        db.crews().add_member(&membership).await.unwrap();
        let again = CrewMembership::new(crew.id, member.id, CrewRole::Member);
        let err = db.crews().add_member(&again).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceAlreadyExists);
        assert_eq!(db.crews().member_count(crew.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_transfer_ownership_is_atomic() {
        let (db, admin, member) = setup().await;
        let mut crew = RunCrew::new("Crew".to_owned(), None, None);
        db.crews().create_with_admin(&mut crew, admin.id).await.unwrap();
        db.crews()
            .add_member(&CrewMembership::new(crew.id, member.id, CrewRole::Member))
            .await
            .unwrap();

        let err = db
            .crews()
            .transfer_ownership(crew.id, Uuid::new_v4(), member.id, CrewRole::Member)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceNotFound);
        let roles: Vec<CrewRole> = db
            .crews()
            .list_memberships(crew.id)
            .await
            .unwrap()
            .iter()
            .map(|m| m.role)
            .collect();
        assert_eq!(roles, vec![CrewRole::Admin, CrewRole::Member]);

        db.crews()
            .transfer_ownership(crew.id, admin.id, member.id, CrewRole::Manager)
            .await
            .unwrap();
        let details = db.crews().list_member_details(crew.id).await.unwrap();
        assert_eq!(details[0].athlete.id, member.id);
        assert_eq!(details[0].membership.role, CrewRole::Admin);
        assert_eq!(details[1].membership.role, CrewRole::Manager);
    }

    #[tokio::test]
    async fn test_delete_cascades_memberships() {
        let (db, admin, _) = setup().await;
        let mut crew = RunCrew::new("Crew".to_owned(), None, None);
        db.crews().create_with_admin(&mut crew, admin.id).await.unwrap();

        assert!(db.crews().delete(crew.id).await.unwrap());
        assert!(db.crews().list_memberships(crew.id).await.unwrap().is_empty());
        assert!(db.crews().list_for_athlete(admin.id).await.unwrap().is_empty());
    }
}
