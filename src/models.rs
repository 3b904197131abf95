use std::sync::Arc;

use serde::{de, Deserialize, Deserializer, Serialize};
use sqlx::{FromRow, Type};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    PrimitiveDateTime,
};
use utoipa::{IntoParams, ToSchema};

use crate::{session::Sessions, store::Store};

pub const DEFAULT_COMPANY_ID: i32 = 1;
pub const DEFAULT_CATEGORY_ID: i32 = 1;
pub const DEFAULT_HEALTH_PERCENTAGE: i32 = 100;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sessions: Sessions,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Technician,
    Employee,
}

impl UserRole {
    /// Maps the role names used by the frontend onto the stored roles.
    pub fn from_hint(hint: Option<&str>) -> Self {
        match hint.map(str::trim) {
            Some("super_admin") | Some("admin") => UserRole::Admin,
            Some("maintenance_staff") | Some("technician") => UserRole::Technician,
            _ => UserRole::Employee,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "maintenance_request_type", rename_all = "lowercase")]
pub enum RequestType {
    Corrective,
    Preventive,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "priority_level", rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "kanban_state", rename_all = "lowercase")]
pub enum KanbanState {
    #[default]
    Normal,
    Blocked,
    Done,
}

#[derive(Clone, Debug, FromRow)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub company_id: Option<i32>,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub company_id: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: i32,
    pub name: String,
    pub role: UserRole,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            role: user.role,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Stage {
    pub id: i32,
    pub name: String,
    pub sequence: i32,
    pub is_closed: bool,
    pub is_scrap: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Team {
    pub id: i32,
    pub name: String,
    pub company_id: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub struct NewTeam {
    pub name: String,
    pub company_id: i32,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TeamChanges {
    pub name: Option<String>,
    pub company_id: Option<i32>,
}

impl TeamChanges {
    pub fn apply_to(self, team: &mut Team, now: OffsetDateTime) {
        if let Some(name) = self.name {
            team.name = name;
        }
        if let Some(company_id) = self.company_id {
            team.company_id = company_id;
        }
        team.updated_at = now;
    }
}

#[derive(Clone, Debug, FromRow)]
pub struct Equipment {
    pub id: i32,
    pub name: String,
    pub serial_number: Option<String>,
    pub category_id: Option<i32>,
    pub maintenance_team_id: Option<i32>,
    pub technician_user_id: Option<i32>,
    pub health_percentage: i32,
    pub location: Option<String>,
    pub company_id: Option<i32>,
}

#[derive(Clone, Debug)]
pub struct NewEquipment {
    pub name: String,
    pub serial_number: Option<String>,
    pub category_id: Option<i32>,
    pub maintenance_team_id: Option<i32>,
    pub technician_user_id: Option<i32>,
    pub health_percentage: i32,
    pub location: Option<String>,
    pub company_id: Option<i32>,
}

/// Partial update of an equipment row. Nullable columns use a nested option
/// so an explicit `null` clears the value while an absent key leaves it alone.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct EquipmentChanges {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub serial_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<i32>)]
    pub category_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<i32>)]
    pub maintenance_team_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<i32>)]
    pub technician_user_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub location: Option<Option<String>>,
    pub health_percentage: Option<i32>,
}

impl EquipmentChanges {
    pub fn apply_to(self, equipment: &mut Equipment) {
        if let Some(name) = self.name {
            equipment.name = name;
        }
        if let Some(serial_number) = self.serial_number {
            equipment.serial_number = serial_number;
        }
        if let Some(category_id) = self.category_id {
            equipment.category_id = category_id;
        }
        if let Some(maintenance_team_id) = self.maintenance_team_id {
            equipment.maintenance_team_id = maintenance_team_id;
        }
        if let Some(technician_user_id) = self.technician_user_id {
            equipment.technician_user_id = technician_user_id;
        }
        if let Some(location) = self.location {
            equipment.location = location;
        }
        if let Some(health_percentage) = self.health_percentage {
            equipment.health_percentage = health_percentage;
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EquipmentFilter {
    /// Only return equipment of this category; an empty value means no filter
    #[serde(default, deserialize_with = "optional_id")]
    pub category_id: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct EquipmentSummary {
    pub id: i32,
    pub name: String,
    pub serial_number: Option<String>,
    #[serde(rename = "health")]
    pub health_percentage: i32,
    pub location: Option<String>,
    pub category_id: Option<i32>,
    pub maintenance_team_id: Option<i32>,
    pub technician_user_id: Option<i32>,
    pub active_requests_count: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MaintenanceStats {
    pub active_requests: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EquipmentDetail {
    pub id: i32,
    pub name: String,
    pub serial_number: Option<String>,
    #[serde(rename = "health")]
    pub health_percentage: i32,
    pub location: Option<String>,
    pub category_id: Option<i32>,
    pub maintenance_team_id: Option<i32>,
    pub technician_user_id: Option<i32>,
    pub company_id: Option<i32>,
    pub maintenance_stats: MaintenanceStats,
}

impl EquipmentDetail {
    pub fn new(equipment: Equipment, active_requests: i64) -> Self {
        Self {
            id: equipment.id,
            name: equipment.name,
            serial_number: equipment.serial_number,
            health_percentage: equipment.health_percentage,
            location: equipment.location,
            category_id: equipment.category_id,
            maintenance_team_id: equipment.maintenance_team_id,
            technician_user_id: equipment.technician_user_id,
            company_id: equipment.company_id,
            maintenance_stats: MaintenanceStats { active_requests },
        }
    }
}

#[derive(Clone, Debug, FromRow)]
pub struct MaintenanceRequest {
    pub id: i32,
    pub subject: String,
    pub description: Option<String>,
    pub request_type: RequestType,
    pub equipment_id: Option<i32>,
    pub maintenance_team_id: Option<i32>,
    pub technician_user_id: Option<i32>,
    pub stage_id: i32,
    pub priority: Priority,
    pub kanban_state: KanbanState,
    pub scheduled_date: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub company_id: i32,
    pub created_by: Option<i32>,
}

#[derive(Clone, Debug)]
pub struct NewRequest {
    pub subject: String,
    pub description: Option<String>,
    pub request_type: RequestType,
    pub equipment_id: Option<i32>,
    pub maintenance_team_id: Option<i32>,
    pub technician_user_id: Option<i32>,
    pub priority: Priority,
    /// Falls back to the lowest-sequence stage when unset
    pub stage_id: Option<i32>,
    pub scheduled_date: Option<OffsetDateTime>,
    pub company_id: i32,
    pub created_by: i32,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RequestChanges {
    pub stage_id: Option<i32>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<i32>)]
    pub technician_user_id: Option<Option<i32>>,
    pub priority: Option<Priority>,
    pub kanban_state: Option<KanbanState>,
}

impl RequestChanges {
    pub fn apply_to(self, request: &mut MaintenanceRequest) {
        if let Some(stage_id) = self.stage_id {
            request.stage_id = stage_id;
        }
        if let Some(technician_user_id) = self.technician_user_id {
            request.technician_user_id = technician_user_id;
        }
        if let Some(priority) = self.priority {
            request.priority = priority;
        }
        if let Some(kanban_state) = self.kanban_state {
            request.kanban_state = kanban_state;
        }
    }
}

/// A maintenance request joined with the names of its stage, equipment and
/// technician.
#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RequestView {
    pub id: i32,
    pub subject: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub request_type: RequestType,
    pub priority: Priority,
    pub stage_id: i32,
    pub stage_name: String,
    pub equipment_id: Option<i32>,
    pub equipment_name: Option<String>,
    pub maintenance_team_id: Option<i32>,
    #[serde(rename = "technician_id")]
    pub technician_user_id: Option<i32>,
    pub technician_name: String,
    pub created_by: Option<i32>,
    pub kanban_state: KanbanState,
    #[serde(with = "time::serde::rfc3339::option")]
    pub scheduled_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub company_id: i32,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    pub total_open_requests: i64,
    pub critical_equipment: i64,
    pub overdue_tasks: i64,
    pub my_pending_tasks: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatedResponse {
    pub message: String,
    pub id: i32,
}

/// Deserializes a key that is present in the payload, even when its value is
/// `null`. Paired with `#[serde(default)]` an absent key stays `None`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

pub(crate) fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(value) if !value.trim().is_empty() => parse_timestamp(value.trim())
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid date `{value}`"))),
        _ => Ok(None),
    }
}

/// Reads an id from a query string, treating an empty or blank value as absent.
fn optional_id<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|err| de::Error::custom(format!("invalid id `{value}`: {err}"))),
        _ => Ok(None),
    }
}

/// Accepts RFC 3339, a naive date-time (read as UTC) or a bare date.
pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    if let Ok(timestamp) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(timestamp);
    }

    let naive_formats = [
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ];
    for format in naive_formats {
        if let Ok(timestamp) = PrimitiveDateTime::parse(value, format) {
            return Some(timestamp.assume_utc());
        }
    }

    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|date| date.midnight().assume_utc())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    use super::*;

    #[test]
    fn role_hints_map_to_stored_roles() {
        assert_eq!(UserRole::from_hint(Some("super_admin")), UserRole::Admin);
        assert_eq!(UserRole::from_hint(Some("maintenance_staff")), UserRole::Technician);
        assert_eq!(UserRole::from_hint(Some("end_user")), UserRole::Employee);
        assert_eq!(UserRole::from_hint(Some("technician")), UserRole::Technician);
        assert_eq!(UserRole::from_hint(Some("janitor")), UserRole::Employee);
        assert_eq!(UserRole::from_hint(None), UserRole::Employee);
    }

    #[test]
    fn parses_supported_timestamp_shapes() {
        assert_eq!(
            parse_timestamp("2024-03-01T10:30:00Z"),
            Some(datetime!(2024-03-01 10:30 UTC))
        );
        assert_eq!(
            parse_timestamp("2024-03-01T10:30:00+02:00"),
            Some(datetime!(2024-03-01 08:30 UTC))
        );
        assert_eq!(
            parse_timestamp("2024-03-01T10:30"),
            Some(datetime!(2024-03-01 10:30 UTC))
        );
        assert_eq!(
            parse_timestamp("2024-03-01T10:30:15.250"),
            Some(datetime!(2024-03-01 10:30:15.25 UTC))
        );
        assert_eq!(
            parse_timestamp("2024-03-01"),
            Some(datetime!(2024-03-01 0:00 UTC))
        );
        assert_eq!(parse_timestamp("next tuesday"), None);
    }

    #[test]
    fn blank_category_filter_is_no_filter() {
        let blank: EquipmentFilter = serde_json::from_str(r#"{"category_id": " "}"#).unwrap();
        assert_eq!(blank.category_id, None);

        let absent: EquipmentFilter = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.category_id, None);

        let given: EquipmentFilter = serde_json::from_str(r#"{"category_id": "2"}"#).unwrap();
        assert_eq!(given.category_id, Some(2));

        assert!(serde_json::from_str::<EquipmentFilter>(r#"{"category_id": "two"}"#).is_err());
    }

    #[test]
    fn request_changes_distinguish_null_from_absent() {
        let cleared: RequestChanges =
            serde_json::from_str(r#"{"technician_user_id": null}"#).unwrap();
        assert_eq!(cleared.technician_user_id, Some(None));

        let untouched: RequestChanges = serde_json::from_str(r#"{"priority": "high"}"#).unwrap();
        assert_eq!(untouched.technician_user_id, None);
        assert_eq!(untouched.priority, Some(Priority::High));
    }

    #[test]
    fn request_changes_only_touch_supplied_fields() {
        let mut request = MaintenanceRequest {
            id: 7,
            subject: "Leaking valve".to_string(),
            description: None,
            request_type: RequestType::Corrective,
            equipment_id: Some(3),
            maintenance_team_id: None,
            technician_user_id: Some(4),
            stage_id: 1,
            priority: Priority::Low,
            kanban_state: KanbanState::Normal,
            scheduled_date: None,
            created_at: datetime!(2024-01-01 0:00 UTC),
            company_id: 1,
            created_by: Some(2),
        };

        RequestChanges {
            priority: Some(Priority::Critical),
            ..Default::default()
        }
        .apply_to(&mut request);

        assert_eq!(request.priority, Priority::Critical);
        assert_eq!(request.stage_id, 1);
        assert_eq!(request.technician_user_id, Some(4));
        assert_eq!(request.kanban_state, KanbanState::Normal);
    }

    #[test]
    fn equipment_changes_clear_nullable_columns() {
        let mut equipment = Equipment {
            id: 1,
            name: "Press".to_string(),
            serial_number: Some("SN-1".to_string()),
            category_id: Some(1),
            maintenance_team_id: Some(2),
            technician_user_id: Some(3),
            health_percentage: 90,
            location: Some("Hall A".to_string()),
            company_id: Some(1),
        };

        let changes: EquipmentChanges =
            serde_json::from_str(r#"{"technician_user_id": null, "health_percentage": 40}"#)
                .unwrap();
        changes.apply_to(&mut equipment);

        assert_eq!(equipment.technician_user_id, None);
        assert_eq!(equipment.health_percentage, 40);
        assert_eq!(equipment.maintenance_team_id, Some(2));
        assert_eq!(equipment.location.as_deref(), Some("Hall A"));
    }
}
