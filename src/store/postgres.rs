use async_trait::async_trait;
use log::debug;
use sqlx::{query, query_as, query_scalar, Pool, Postgres, Transaction};
use time::OffsetDateTime;

use super::{Store, StoreError, CRITICAL_HEALTH_THRESHOLD};
use crate::models::{
    DashboardStats, Equipment, EquipmentChanges, EquipmentDetail, EquipmentFilter,
    EquipmentSummary, MaintenanceRequest, NewEquipment, NewRequest, NewTeam, NewUser,
    RequestChanges, RequestView, Stage, Team, TeamChanges, User,
};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const USERS_EMAIL_KEY: &str = "users_email_key";

const REQUEST_VIEW: &str = r#"
    SELECT
        r.id,
        r.subject,
        r.description,
        r.request_type,
        r.priority,
        r.stage_id,
        COALESCE(s.name, 'Unknown') AS stage_name,
        r.equipment_id,
        e.name AS equipment_name,
        r.maintenance_team_id,
        r.technician_user_id,
        COALESCE(u.name, 'Unassigned') AS technician_name,
        r.created_by,
        r.kanban_state,
        r.scheduled_date,
        r.created_at,
        r.company_id
    FROM maintenance_requests r
    LEFT JOIN maintenance_stages s ON s.id = r.stage_id
    LEFT JOIN equipment e ON e.id = r.equipment_id
    LEFT JOIN users u ON u.id = r.technician_user_id
"#;

/// [`Store`] backed by a PostgreSQL database holding `sql/schema.sql`.
#[derive(Clone)]
pub struct PgStore {
    database: Pool<Postgres>,
}

impl PgStore {
    pub fn new(database: Pool<Postgres>) -> Self {
        Self { database }
    }
}

/// Translates constraint violations into their domain meaning.
fn constraint_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(violation) =
            violation(db_err.code().as_deref(), db_err.constraint(), db_err.message())
        {
            return violation;
        }
    }
    StoreError::Database(err)
}

/// Unique violations other than the email key stay plain database errors.
fn violation(code: Option<&str>, constraint: Option<&str>, message: &str) -> Option<StoreError> {
    match (code, constraint) {
        (Some(UNIQUE_VIOLATION), Some(USERS_EMAIL_KEY)) => Some(StoreError::DuplicateEmail),
        (Some(FOREIGN_KEY_VIOLATION), _) => Some(StoreError::InvalidReference(format!(
            "Referenced record does not exist: {message}"
        ))),
        _ => None,
    }
}

async fn lock_team(
    tx: &mut Transaction<'_, Postgres>,
    id: i32,
) -> Result<Team, StoreError> {
    query_as::<_, Team>(
        r#"
        SELECT id, name, company_id, created_at, updated_at
        FROM maintenance_teams
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(tx)
    .await?
    .ok_or(StoreError::NotFound { entity: "Team", id })
}

async fn lock_equipment(
    tx: &mut Transaction<'_, Postgres>,
    id: i32,
) -> Result<Equipment, StoreError> {
    query_as::<_, Equipment>(
        r#"
        SELECT
            id,
            name,
            serial_number,
            category_id,
            maintenance_team_id,
            technician_user_id,
            health_percentage,
            location,
            company_id
        FROM equipment
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(tx)
    .await?
    .ok_or(StoreError::NotFound {
        entity: "Equipment",
        id,
    })
}

async fn lock_request(
    tx: &mut Transaction<'_, Postgres>,
    id: i32,
) -> Result<MaintenanceRequest, StoreError> {
    query_as::<_, MaintenanceRequest>(
        r#"
        SELECT
            id,
            subject,
            description,
            request_type,
            equipment_id,
            maintenance_team_id,
            technician_user_id,
            stage_id,
            priority,
            kanban_state,
            scheduled_date,
            created_at,
            company_id,
            created_by
        FROM maintenance_requests
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(tx)
    .await?
    .ok_or(StoreError::NotFound {
        entity: "Maintenance request",
        id,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn find_user(&self, id: i32) -> Result<Option<User>, StoreError> {
        let user = query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, company_id
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.database)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, company_id
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.database)
        .await?;

        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, role, company_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, password_hash, role, company_id
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.company_id)
        .fetch_one(&self.database)
        .await
        .map_err(constraint_error)
    }

    async fn list_stages(&self) -> Result<Vec<Stage>, StoreError> {
        let stages = query_as::<_, Stage>(
            r#"
            SELECT id, name, sequence, is_closed, is_scrap
            FROM maintenance_stages
            ORDER BY sequence, id
            "#,
        )
        .fetch_all(&self.database)
        .await?;

        Ok(stages)
    }

    async fn list_teams(&self) -> Result<Vec<Team>, StoreError> {
        let teams = query_as::<_, Team>(
            r#"
            SELECT id, name, company_id, created_at, updated_at
            FROM maintenance_teams
            ORDER BY id
            "#,
        )
        .fetch_all(&self.database)
        .await?;

        Ok(teams)
    }

    async fn insert_team(&self, team: NewTeam) -> Result<Team, StoreError> {
        let mut tx = self.database.begin().await?;
        let team = query_as::<_, Team>(
            r#"
            INSERT INTO maintenance_teams (name, company_id, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            RETURNING id, name, company_id, created_at, updated_at
            "#,
        )
        .bind(&team.name)
        .bind(team.company_id)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&mut tx)
        .await
        .map_err(constraint_error)?;
        tx.commit().await?;

        Ok(team)
    }

    async fn update_team(
        &self,
        id: i32,
        changes: TeamChanges,
        now: OffsetDateTime,
    ) -> Result<Team, StoreError> {
        let mut tx = self.database.begin().await?;
        let mut team = lock_team(&mut tx, id).await?;
        changes.apply_to(&mut team, now);

        query(
            r#"
            UPDATE maintenance_teams
            SET name = $2, company_id = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&team.name)
        .bind(team.company_id)
        .bind(team.updated_at)
        .execute(&mut tx)
        .await
        .map_err(constraint_error)?;
        tx.commit().await?;

        Ok(team)
    }

    async fn delete_team(&self, id: i32) -> Result<Team, StoreError> {
        let mut tx = self.database.begin().await?;
        let team = lock_team(&mut tx, id).await?;

        let references = query_scalar::<_, i64>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM equipment WHERE maintenance_team_id = $1)
                + (SELECT COUNT(*) FROM maintenance_requests WHERE maintenance_team_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut tx)
        .await?;

        if references > 0 {
            debug!("Refusing to delete team {id}: {references} references");
            return Err(StoreError::InUse(format!(
                "Team {id} is still referenced by {references} equipment or maintenance requests"
            )));
        }

        query("DELETE FROM maintenance_teams WHERE id = $1")
            .bind(id)
            .execute(&mut tx)
            .await
            .map_err(constraint_error)?;
        tx.commit().await?;

        Ok(team)
    }

    async fn list_equipment(
        &self,
        filter: &EquipmentFilter,
    ) -> Result<Vec<EquipmentSummary>, StoreError> {
        let equipment = query_as::<_, EquipmentSummary>(
            r#"
            SELECT
                e.id,
                e.name,
                e.serial_number,
                e.health_percentage,
                e.location,
                e.category_id,
                e.maintenance_team_id,
                e.technician_user_id,
                (
                    SELECT COUNT(*)
                    FROM maintenance_requests r
                    WHERE r.equipment_id = e.id
                ) AS active_requests_count
            FROM equipment e
            WHERE ($1::int4 IS NULL OR e.category_id = $1)
            ORDER BY e.id
            "#,
        )
        .bind(filter.category_id)
        .fetch_all(&self.database)
        .await?;

        Ok(equipment)
    }

    async fn equipment_detail(&self, id: i32) -> Result<Option<EquipmentDetail>, StoreError> {
        let equipment = query_as::<_, Equipment>(
            r#"
            SELECT
                id,
                name,
                serial_number,
                category_id,
                maintenance_team_id,
                technician_user_id,
                health_percentage,
                location,
                company_id
            FROM equipment
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.database)
        .await?;

        let Some(equipment) = equipment else {
            return Ok(None);
        };

        let active_requests = query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM maintenance_requests r
            JOIN maintenance_stages s ON s.id = r.stage_id
            WHERE r.equipment_id = $1
                AND s.is_closed = false
            "#,
        )
        .bind(id)
        .fetch_one(&self.database)
        .await?;

        Ok(Some(EquipmentDetail::new(equipment, active_requests)))
    }

    async fn insert_equipment(&self, equipment: NewEquipment) -> Result<Equipment, StoreError> {
        let mut tx = self.database.begin().await?;
        let equipment = query_as::<_, Equipment>(
            r#"
            INSERT INTO equipment (
                name,
                serial_number,
                category_id,
                maintenance_team_id,
                technician_user_id,
                health_percentage,
                location,
                company_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                id,
                name,
                serial_number,
                category_id,
                maintenance_team_id,
                technician_user_id,
                health_percentage,
                location,
                company_id
            "#,
        )
        .bind(&equipment.name)
        .bind(&equipment.serial_number)
        .bind(equipment.category_id)
        .bind(equipment.maintenance_team_id)
        .bind(equipment.technician_user_id)
        .bind(equipment.health_percentage)
        .bind(&equipment.location)
        .bind(equipment.company_id)
        .fetch_one(&mut tx)
        .await
        .map_err(constraint_error)?;
        tx.commit().await?;

        Ok(equipment)
    }

    async fn update_equipment(
        &self,
        id: i32,
        changes: EquipmentChanges,
    ) -> Result<Equipment, StoreError> {
        let mut tx = self.database.begin().await?;
        let mut equipment = lock_equipment(&mut tx, id).await?;
        changes.apply_to(&mut equipment);

        query(
            r#"
            UPDATE equipment
            SET
                name = $2,
                serial_number = $3,
                category_id = $4,
                maintenance_team_id = $5,
                technician_user_id = $6,
                health_percentage = $7,
                location = $8
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&equipment.name)
        .bind(&equipment.serial_number)
        .bind(equipment.category_id)
        .bind(equipment.maintenance_team_id)
        .bind(equipment.technician_user_id)
        .bind(equipment.health_percentage)
        .bind(&equipment.location)
        .execute(&mut tx)
        .await
        .map_err(constraint_error)?;
        tx.commit().await?;

        Ok(equipment)
    }

    async fn delete_equipment(&self, id: i32) -> Result<Equipment, StoreError> {
        let mut tx = self.database.begin().await?;
        let equipment = lock_equipment(&mut tx, id).await?;

        let references = query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM maintenance_requests WHERE equipment_id = $1",
        )
        .bind(id)
        .fetch_one(&mut tx)
        .await?;

        if references > 0 {
            debug!("Refusing to delete equipment {id}: {references} references");
            return Err(StoreError::InUse(format!(
                "Equipment {id} is still referenced by {references} maintenance requests"
            )));
        }

        query("DELETE FROM equipment WHERE id = $1")
            .bind(id)
            .execute(&mut tx)
            .await
            .map_err(constraint_error)?;
        tx.commit().await?;

        Ok(equipment)
    }

    async fn list_requests(&self) -> Result<Vec<RequestView>, StoreError> {
        let requests = query_as::<_, RequestView>(&format!("{REQUEST_VIEW} ORDER BY r.id"))
            .fetch_all(&self.database)
            .await?;

        Ok(requests)
    }

    async fn find_request(&self, id: i32) -> Result<Option<RequestView>, StoreError> {
        let request = query_as::<_, RequestView>(&format!("{REQUEST_VIEW} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&self.database)
            .await?;

        Ok(request)
    }

    async fn insert_request(&self, request: NewRequest) -> Result<MaintenanceRequest, StoreError> {
        let mut tx = self.database.begin().await?;

        let stage_id = match request.stage_id {
            Some(stage_id) => stage_id,
            None => query_scalar::<_, i32>(
                "SELECT id FROM maintenance_stages ORDER BY sequence, id LIMIT 1",
            )
            .fetch_optional(&mut tx)
            .await?
            .ok_or(StoreError::NoStages)?,
        };

        let created = query_as::<_, MaintenanceRequest>(
            r#"
            INSERT INTO maintenance_requests (
                subject,
                description,
                request_type,
                equipment_id,
                maintenance_team_id,
                technician_user_id,
                stage_id,
                priority,
                kanban_state,
                scheduled_date,
                created_at,
                company_id,
                created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'normal', $9, $10, $11, $12)
            RETURNING
                id,
                subject,
                description,
                request_type,
                equipment_id,
                maintenance_team_id,
                technician_user_id,
                stage_id,
                priority,
                kanban_state,
                scheduled_date,
                created_at,
                company_id,
                created_by
            "#,
        )
        .bind(&request.subject)
        .bind(&request.description)
        .bind(request.request_type)
        .bind(request.equipment_id)
        .bind(request.maintenance_team_id)
        .bind(request.technician_user_id)
        .bind(stage_id)
        .bind(request.priority)
        .bind(request.scheduled_date)
        .bind(OffsetDateTime::now_utc())
        .bind(request.company_id)
        .bind(request.created_by)
        .fetch_one(&mut tx)
        .await
        .map_err(constraint_error)?;
        tx.commit().await?;

        Ok(created)
    }

    async fn update_request(
        &self,
        id: i32,
        changes: RequestChanges,
    ) -> Result<MaintenanceRequest, StoreError> {
        let mut tx = self.database.begin().await?;
        let mut request = lock_request(&mut tx, id).await?;
        changes.apply_to(&mut request);

        query(
            r#"
            UPDATE maintenance_requests
            SET
                stage_id = $2,
                technician_user_id = $3,
                priority = $4,
                kanban_state = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(request.stage_id)
        .bind(request.technician_user_id)
        .bind(request.priority)
        .bind(request.kanban_state)
        .execute(&mut tx)
        .await
        .map_err(constraint_error)?;
        tx.commit().await?;

        Ok(request)
    }

    async fn dashboard_stats(
        &self,
        user_id: i32,
        now: OffsetDateTime,
    ) -> Result<DashboardStats, StoreError> {
        let total_open_requests = query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM maintenance_requests r
            JOIN maintenance_stages s ON s.id = r.stage_id
            WHERE s.is_closed = false
            "#,
        )
        .fetch_one(&self.database)
        .await?;

        let critical_equipment = query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM equipment WHERE health_percentage < $1",
        )
        .bind(CRITICAL_HEALTH_THRESHOLD)
        .fetch_one(&self.database)
        .await?;

        let overdue_tasks = query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM maintenance_requests r
            JOIN maintenance_stages s ON s.id = r.stage_id
            WHERE s.is_closed = false
                AND r.scheduled_date < $1
            "#,
        )
        .bind(now)
        .fetch_one(&self.database)
        .await?;

        let my_pending_tasks = query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM maintenance_requests WHERE technician_user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.database)
        .await?;

        Ok(DashboardStats {
            total_open_requests,
            critical_equipment,
            overdue_tasks,
            my_pending_tasks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_email_key_reports_a_duplicate_email() {
        assert!(matches!(
            violation(Some(UNIQUE_VIOLATION), Some(USERS_EMAIL_KEY), "duplicate key"),
            Some(StoreError::DuplicateEmail)
        ));
        assert!(violation(
            Some(UNIQUE_VIOLATION),
            Some("equipment_serial_number_key"),
            "duplicate key"
        )
        .is_none());
        assert!(violation(Some(UNIQUE_VIOLATION), None, "duplicate key").is_none());
    }

    #[test]
    fn foreign_key_violations_are_invalid_references() {
        let err = violation(
            Some(FOREIGN_KEY_VIOLATION),
            Some("equipment_maintenance_team_id_fkey"),
            "insert or update on table \"equipment\" violates foreign key constraint",
        );
        assert!(matches!(
            err,
            Some(StoreError::InvalidReference(message))
                if message.starts_with("Referenced record does not exist")
        ));
        assert!(violation(Some("40001"), None, "serialization failure").is_none());
    }
}
