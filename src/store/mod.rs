//! Persistence for users, stages, teams, equipment and maintenance requests.
//!
//! Handlers only see the [`Store`] trait. [`PgStore`] backs the running
//! service; [`MemoryStore`] keeps the same constraints in process memory so
//! every test can start from an empty, isolated instance.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::models::{
    DashboardStats, Equipment, EquipmentChanges, EquipmentDetail, EquipmentFilter,
    EquipmentSummary, MaintenanceRequest, NewEquipment, NewRequest, NewTeam, NewUser,
    RequestChanges, RequestView, Stage, Team, TeamChanges, User,
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Equipment below this health counts as critical on the dashboard.
pub const CRITICAL_HEALTH_THRESHOLD: i32 = 30;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} {id} was not found")]
    NotFound { entity: &'static str, id: i32 },

    #[error("{0}")]
    InUse(String),

    #[error("{0}")]
    InvalidReference(String),

    #[error("email already registered")]
    DuplicateEmail,

    #[error("No maintenance stages are configured")]
    NoStages,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user(&self, id: i32) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Stages in ascending sequence order.
    async fn list_stages(&self) -> Result<Vec<Stage>, StoreError>;

    async fn list_teams(&self) -> Result<Vec<Team>, StoreError>;
    async fn insert_team(&self, team: NewTeam) -> Result<Team, StoreError>;
    async fn update_team(
        &self,
        id: i32,
        changes: TeamChanges,
        now: OffsetDateTime,
    ) -> Result<Team, StoreError>;
    /// Refuses with [`StoreError::InUse`] while equipment or requests point at the team.
    async fn delete_team(&self, id: i32) -> Result<Team, StoreError>;

    async fn list_equipment(
        &self,
        filter: &EquipmentFilter,
    ) -> Result<Vec<EquipmentSummary>, StoreError>;
    async fn equipment_detail(&self, id: i32) -> Result<Option<EquipmentDetail>, StoreError>;
    async fn insert_equipment(&self, equipment: NewEquipment) -> Result<Equipment, StoreError>;
    async fn update_equipment(
        &self,
        id: i32,
        changes: EquipmentChanges,
    ) -> Result<Equipment, StoreError>;
    /// Refuses with [`StoreError::InUse`] while requests point at the equipment.
    async fn delete_equipment(&self, id: i32) -> Result<Equipment, StoreError>;

    async fn list_requests(&self) -> Result<Vec<RequestView>, StoreError>;
    async fn find_request(&self, id: i32) -> Result<Option<RequestView>, StoreError>;
    async fn insert_request(&self, request: NewRequest) -> Result<MaintenanceRequest, StoreError>;
    async fn update_request(
        &self,
        id: i32,
        changes: RequestChanges,
    ) -> Result<MaintenanceRequest, StoreError>;

    /// Four independent counts; `now` decides which open requests are overdue.
    async fn dashboard_stats(
        &self,
        user_id: i32,
        now: OffsetDateTime,
    ) -> Result<DashboardStats, StoreError>;
}
