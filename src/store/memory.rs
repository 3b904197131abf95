use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use time::OffsetDateTime;

use super::{Store, StoreError, CRITICAL_HEALTH_THRESHOLD};
use crate::models::{
    DashboardStats, Equipment, EquipmentChanges, EquipmentDetail, EquipmentFilter,
    EquipmentSummary, MaintenanceRequest, NewEquipment, NewRequest, NewTeam, NewUser,
    RequestChanges, RequestView, Stage, Team, TeamChanges, User,
};

struct Table<T> {
    rows: BTreeMap<i32, T>,
    last_id: i32,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<T> Table<T> {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn contains(&self, id: i32) -> bool {
        self.rows.contains_key(&id)
    }
}

#[derive(Default)]
struct Tables {
    users: Table<User>,
    stages: Table<Stage>,
    teams: Table<Team>,
    equipment: Table<Equipment>,
    requests: Table<MaintenanceRequest>,
}

impl Tables {
    fn is_open(&self, request: &MaintenanceRequest) -> bool {
        self.stages
            .rows
            .get(&request.stage_id)
            .map_or(false, |stage| !stage.is_closed)
    }

    fn check_reference<T>(
        table: &Table<T>,
        entity: &str,
        id: Option<i32>,
    ) -> Result<(), StoreError> {
        match id {
            Some(id) if !table.contains(id) => Err(StoreError::InvalidReference(format!(
                "Referenced record does not exist: {entity} {id}"
            ))),
            _ => Ok(()),
        }
    }

    fn check_equipment(&self, equipment: &Equipment) -> Result<(), StoreError> {
        Self::check_reference(&self.teams, "team", equipment.maintenance_team_id)?;
        Self::check_reference(&self.users, "user", equipment.technician_user_id)
    }

    fn check_request(&self, request: &MaintenanceRequest) -> Result<(), StoreError> {
        Self::check_reference(&self.stages, "stage", Some(request.stage_id))?;
        Self::check_reference(&self.equipment, "equipment", request.equipment_id)?;
        Self::check_reference(&self.teams, "team", request.maintenance_team_id)?;
        Self::check_reference(&self.users, "user", request.technician_user_id)?;
        Self::check_reference(&self.users, "user", request.created_by)
    }

    fn view(&self, request: &MaintenanceRequest) -> RequestView {
        let stage_name = self
            .stages
            .rows
            .get(&request.stage_id)
            .map_or_else(|| "Unknown".to_string(), |stage| stage.name.clone());
        let equipment_name = request
            .equipment_id
            .and_then(|id| self.equipment.rows.get(&id))
            .map(|equipment| equipment.name.clone());
        let technician_name = request
            .technician_user_id
            .and_then(|id| self.users.rows.get(&id))
            .map_or_else(|| "Unassigned".to_string(), |user| user.name.clone());

        RequestView {
            id: request.id,
            subject: request.subject.clone(),
            description: request.description.clone(),
            request_type: request.request_type,
            priority: request.priority,
            stage_id: request.stage_id,
            stage_name,
            equipment_id: request.equipment_id,
            equipment_name,
            maintenance_team_id: request.maintenance_team_id,
            technician_user_id: request.technician_user_id,
            technician_name,
            created_by: request.created_by,
            kanban_state: request.kanban_state,
            scheduled_date: request.scheduled_date,
            created_at: request.created_at,
            company_id: request.company_id,
        }
    }
}

/// In-process [`Store`] enforcing the same constraints as the database
/// schema: unique emails, existing foreign keys and restricted deletes.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with the stages shipped in `sql/schema.sql`.
    pub fn with_default_stages() -> Self {
        let store = Self::new();
        store.insert_stage("New Request", 1, false, false);
        store.insert_stage("In Progress", 2, false, false);
        store.insert_stage("Repaired", 3, true, false);
        store.insert_stage("Scrap", 4, true, true);
        store
    }

    pub fn insert_stage(&self, name: &str, sequence: i32, is_closed: bool, is_scrap: bool) -> Stage {
        let mut tables = self.lock();
        let id = tables.stages.next_id();
        let stage = Stage {
            id,
            name: name.to_string(),
            sequence,
            is_closed,
            is_scrap,
        };
        tables.stages.rows.insert(id, stage.clone());
        stage
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // Rows are replaced whole, so a poisoned lock still guards consistent tables.
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user(&self, id: i32) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.rows.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()
            .users
            .rows
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.lock();
        if tables.users.rows.values().any(|existing| existing.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }

        let id = tables.users.next_id();
        let user = User {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            company_id: Some(user.company_id),
        };
        tables.users.rows.insert(id, user.clone());
        Ok(user)
    }

    async fn list_stages(&self) -> Result<Vec<Stage>, StoreError> {
        let mut stages: Vec<Stage> = self.lock().stages.rows.values().cloned().collect();
        stages.sort_by_key(|stage| (stage.sequence, stage.id));
        Ok(stages)
    }

    async fn list_teams(&self) -> Result<Vec<Team>, StoreError> {
        Ok(self.lock().teams.rows.values().cloned().collect())
    }

    async fn insert_team(&self, team: NewTeam) -> Result<Team, StoreError> {
        let mut tables = self.lock();
        let id = tables.teams.next_id();
        let now = OffsetDateTime::now_utc();
        let team = Team {
            id,
            name: team.name,
            company_id: team.company_id,
            created_at: now,
            updated_at: now,
        };
        tables.teams.rows.insert(id, team.clone());
        Ok(team)
    }

    async fn update_team(
        &self,
        id: i32,
        changes: TeamChanges,
        now: OffsetDateTime,
    ) -> Result<Team, StoreError> {
        let mut tables = self.lock();
        let team = tables
            .teams
            .rows
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "Team", id })?;
        changes.apply_to(team, now);
        Ok(team.clone())
    }

    async fn delete_team(&self, id: i32) -> Result<Team, StoreError> {
        let mut tables = self.lock();
        if !tables.teams.contains(id) {
            return Err(StoreError::NotFound { entity: "Team", id });
        }

        let references = tables
            .equipment
            .rows
            .values()
            .filter(|equipment| equipment.maintenance_team_id == Some(id))
            .count()
            + tables
                .requests
                .rows
                .values()
                .filter(|request| request.maintenance_team_id == Some(id))
                .count();
        if references > 0 {
            return Err(StoreError::InUse(format!(
                "Team {id} is still referenced by {references} equipment or maintenance requests"
            )));
        }

        tables
            .teams
            .rows
            .remove(&id)
            .ok_or(StoreError::NotFound { entity: "Team", id })
    }

    async fn list_equipment(
        &self,
        filter: &EquipmentFilter,
    ) -> Result<Vec<EquipmentSummary>, StoreError> {
        let tables = self.lock();
        let equipment = tables
            .equipment
            .rows
            .values()
            .filter(|equipment| {
                filter
                    .category_id
                    .map_or(true, |category_id| equipment.category_id == Some(category_id))
            })
            .map(|equipment| EquipmentSummary {
                id: equipment.id,
                name: equipment.name.clone(),
                serial_number: equipment.serial_number.clone(),
                health_percentage: equipment.health_percentage,
                location: equipment.location.clone(),
                category_id: equipment.category_id,
                maintenance_team_id: equipment.maintenance_team_id,
                technician_user_id: equipment.technician_user_id,
                active_requests_count: tables
                    .requests
                    .rows
                    .values()
                    .filter(|request| request.equipment_id == Some(equipment.id))
                    .count() as i64,
            })
            .collect();

        Ok(equipment)
    }

    async fn equipment_detail(&self, id: i32) -> Result<Option<EquipmentDetail>, StoreError> {
        let tables = self.lock();
        let Some(equipment) = tables.equipment.rows.get(&id) else {
            return Ok(None);
        };

        let active_requests = tables
            .requests
            .rows
            .values()
            .filter(|request| request.equipment_id == Some(id) && tables.is_open(request))
            .count() as i64;

        Ok(Some(EquipmentDetail::new(equipment.clone(), active_requests)))
    }

    async fn insert_equipment(&self, equipment: NewEquipment) -> Result<Equipment, StoreError> {
        let mut tables = self.lock();
        let mut equipment = Equipment {
            id: 0,
            name: equipment.name,
            serial_number: equipment.serial_number,
            category_id: equipment.category_id,
            maintenance_team_id: equipment.maintenance_team_id,
            technician_user_id: equipment.technician_user_id,
            health_percentage: equipment.health_percentage,
            location: equipment.location,
            company_id: equipment.company_id,
        };
        tables.check_equipment(&equipment)?;

        equipment.id = tables.equipment.next_id();
        tables.equipment.rows.insert(equipment.id, equipment.clone());
        Ok(equipment)
    }

    async fn update_equipment(
        &self,
        id: i32,
        changes: EquipmentChanges,
    ) -> Result<Equipment, StoreError> {
        let mut tables = self.lock();
        let mut equipment = tables.equipment.rows.get(&id).cloned().ok_or(StoreError::NotFound {
            entity: "Equipment",
            id,
        })?;
        changes.apply_to(&mut equipment);
        tables.check_equipment(&equipment)?;

        tables.equipment.rows.insert(id, equipment.clone());
        Ok(equipment)
    }

    async fn delete_equipment(&self, id: i32) -> Result<Equipment, StoreError> {
        let mut tables = self.lock();
        if !tables.equipment.contains(id) {
            return Err(StoreError::NotFound {
                entity: "Equipment",
                id,
            });
        }

        let references = tables
            .requests
            .rows
            .values()
            .filter(|request| request.equipment_id == Some(id))
            .count();
        if references > 0 {
            return Err(StoreError::InUse(format!(
                "Equipment {id} is still referenced by {references} maintenance requests"
            )));
        }

        tables.equipment.rows.remove(&id).ok_or(StoreError::NotFound {
            entity: "Equipment",
            id,
        })
    }

    async fn list_requests(&self) -> Result<Vec<RequestView>, StoreError> {
        let tables = self.lock();
        Ok(tables
            .requests
            .rows
            .values()
            .map(|request| tables.view(request))
            .collect())
    }

    async fn find_request(&self, id: i32) -> Result<Option<RequestView>, StoreError> {
        let tables = self.lock();
        Ok(tables.requests.rows.get(&id).map(|request| tables.view(request)))
    }

    async fn insert_request(&self, request: NewRequest) -> Result<MaintenanceRequest, StoreError> {
        let mut tables = self.lock();
        let stage_id = match request.stage_id {
            Some(stage_id) => stage_id,
            None => tables
                .stages
                .rows
                .values()
                .min_by_key(|stage| (stage.sequence, stage.id))
                .map(|stage| stage.id)
                .ok_or(StoreError::NoStages)?,
        };

        let mut created = MaintenanceRequest {
            id: 0,
            subject: request.subject,
            description: request.description,
            request_type: request.request_type,
            equipment_id: request.equipment_id,
            maintenance_team_id: request.maintenance_team_id,
            technician_user_id: request.technician_user_id,
            stage_id,
            priority: request.priority,
            kanban_state: Default::default(),
            scheduled_date: request.scheduled_date,
            created_at: OffsetDateTime::now_utc(),
            company_id: request.company_id,
            created_by: Some(request.created_by),
        };
        tables.check_request(&created)?;

        created.id = tables.requests.next_id();
        tables.requests.rows.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_request(
        &self,
        id: i32,
        changes: RequestChanges,
    ) -> Result<MaintenanceRequest, StoreError> {
        let mut tables = self.lock();
        let mut request = tables.requests.rows.get(&id).cloned().ok_or(StoreError::NotFound {
            entity: "Maintenance request",
            id,
        })?;
        changes.apply_to(&mut request);
        tables.check_request(&request)?;

        tables.requests.rows.insert(id, request.clone());
        Ok(request)
    }

    async fn dashboard_stats(
        &self,
        user_id: i32,
        now: OffsetDateTime,
    ) -> Result<DashboardStats, StoreError> {
        let tables = self.lock();
        let requests = || tables.requests.rows.values();

        Ok(DashboardStats {
            total_open_requests: requests().filter(|request| tables.is_open(request)).count()
                as i64,
            critical_equipment: tables
                .equipment
                .rows
                .values()
                .filter(|equipment| equipment.health_percentage < CRITICAL_HEALTH_THRESHOLD)
                .count() as i64,
            overdue_tasks: requests()
                .filter(|request| {
                    tables.is_open(request)
                        && request.scheduled_date.map_or(false, |date| date < now)
                })
                .count() as i64,
            my_pending_tasks: requests()
                .filter(|request| request.technician_user_id == Some(user_id))
                .count() as i64,
        })
    }
}
