//! Timesheet records and the payload shapes sent to the gateway.
//!
//! Every worker type goes through the same clock-in flow; what differs is the
//! handful of extra fields carried by [`WorkVariant`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Coordinate, SessionId, TimesheetId, WorkerId};

pub const SHIFT_ABCD: &str = "ABCD";
pub const SHIFT_E: &str = "E";
pub const SHIFT_F: &str = "F";

pub const LABOR_MANUAL: &str = "Manual Labor";
pub const LABOR_OPERATOR: &str = "Operator";
pub const LABOR_E_SHIFT: &str = "EShift";
pub const LABOR_F_SHIFT: &str = "FShift";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkType {
    General,
    TruckDriver,
    TruckEquipmentOperator,
    TascoAbcdLabor,
    TascoAbcdEquipment,
    TascoE,
    TascoF,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkType::General => "General",
            WorkType::TruckDriver => "TruckDriver",
            WorkType::TruckEquipmentOperator => "TruckEquipmentOperator",
            WorkType::TascoAbcdLabor => "TascoAbcdLabor",
            WorkType::TascoAbcdEquipment => "TascoAbcdEquipment",
            WorkType::TascoE => "TascoE",
            WorkType::TascoF => "TascoF",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "General" => Some(WorkType::General),
            "TruckDriver" => Some(WorkType::TruckDriver),
            "TruckEquipmentOperator" => Some(WorkType::TruckEquipmentOperator),
            "TascoAbcdLabor" => Some(WorkType::TascoAbcdLabor),
            "TascoAbcdEquipment" => Some(WorkType::TascoAbcdEquipment),
            "TascoE" => Some(WorkType::TascoE),
            "TascoF" => Some(WorkType::TascoF),
            _ => None,
        }
    }
}

/// Variant descriptor for a clock-in. Carries only what the worker type adds
/// on top of the common jobsite/cost-code fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkVariant {
    General,
    TruckDriver {
        truck_id: String,
        #[serde(default)]
        starting_mileage: Option<u32>,
    },
    TruckEquipmentOperator {
        equipment_id: String,
    },
    TascoAbcdLabor,
    TascoAbcdEquipment {
        material_type: String,
        #[serde(default)]
        equipment_id: Option<String>,
    },
    TascoE {
        material_type: String,
    },
    TascoF {
        material_type: String,
    },
}

impl WorkVariant {
    pub fn work_type(&self) -> WorkType {
        match self {
            WorkVariant::General => WorkType::General,
            WorkVariant::TruckDriver { .. } => WorkType::TruckDriver,
            WorkVariant::TruckEquipmentOperator { .. } => WorkType::TruckEquipmentOperator,
            WorkVariant::TascoAbcdLabor => WorkType::TascoAbcdLabor,
            WorkVariant::TascoAbcdEquipment { .. } => WorkType::TascoAbcdEquipment,
            WorkVariant::TascoE { .. } => WorkType::TascoE,
            WorkVariant::TascoF { .. } => WorkType::TascoF,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            WorkVariant::General | WorkVariant::TascoAbcdLabor => Ok(()),
            WorkVariant::TruckDriver { truck_id, .. } => require("truckId", truck_id),
            WorkVariant::TruckEquipmentOperator { equipment_id } => {
                require("equipmentId", equipment_id)
            }
            WorkVariant::TascoAbcdEquipment { material_type, .. }
            | WorkVariant::TascoE { material_type }
            | WorkVariant::TascoF { material_type } => require("materialType", material_type),
        }
    }

    fn variant_fields(&self) -> VariantFields {
        let mut fields = VariantFields::default();
        match self {
            WorkVariant::General => {}
            WorkVariant::TruckDriver {
                truck_id,
                starting_mileage,
            } => {
                fields.truck_id = Some(truck_id.clone());
                fields.starting_mileage = *starting_mileage;
            }
            WorkVariant::TruckEquipmentOperator { equipment_id } => {
                fields.equipment_id = Some(equipment_id.clone());
            }
            WorkVariant::TascoAbcdLabor => {
                fields.shift_type = Some(SHIFT_ABCD.into());
                fields.labor_type = Some(LABOR_MANUAL.into());
            }
            WorkVariant::TascoAbcdEquipment {
                material_type,
                equipment_id,
            } => {
                fields.shift_type = Some(SHIFT_ABCD.into());
                fields.labor_type = Some(LABOR_OPERATOR.into());
                fields.material_type = Some(material_type.clone());
                fields.equipment_id = equipment_id.clone();
            }
            WorkVariant::TascoE { material_type } => {
                fields.shift_type = Some(SHIFT_E.into());
                fields.labor_type = Some(LABOR_E_SHIFT.into());
                fields.material_type = Some(material_type.clone());
            }
            WorkVariant::TascoF { material_type } => {
                fields.shift_type = Some(SHIFT_F.into());
                fields.labor_type = Some(LABOR_F_SHIFT.into());
                fields.material_type = Some(material_type.clone());
            }
        }
        fields
    }
}

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} is required"))
    } else {
        Ok(())
    }
}

/// What the worker is clocking into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkDetails {
    pub jobsite_id: String,
    pub cost_code: String,
    pub variant: WorkVariant,
}

impl WorkDetails {
    pub fn new(jobsite_id: impl Into<String>, cost_code: impl Into<String>, variant: WorkVariant) -> Self {
        Self {
            jobsite_id: jobsite_id.into(),
            cost_code: cost_code.into(),
            variant,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        require("jobsiteId", &self.jobsite_id)?;
        require("costCode", &self.cost_code)?;
        self.variant.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantFields {
    pub shift_type: Option<String>,
    pub labor_type: Option<String>,
    pub material_type: Option<String>,
    pub truck_id: Option<String>,
    pub equipment_id: Option<String>,
    pub starting_mileage: Option<u32>,
}

/// Close-out of the previous timesheet, sent together with the new record on a
/// job switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorTimesheetClosure {
    pub previous_timesheet_id: TimesheetId,
    pub end_time: DateTime<Utc>,
    pub end_coordinate: Option<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimesheetPayload {
    pub worker_id: WorkerId,
    pub session_id: SessionId,
    pub work_type: WorkType,
    pub jobsite_id: String,
    pub cost_code: String,
    pub start_time: DateTime<Utc>,
    pub start_coordinate: Option<Coordinate>,
    #[serde(flatten)]
    pub fields: VariantFields,
    pub closing: Option<PriorTimesheetClosure>,
}

impl TimesheetPayload {
    pub fn fresh(
        worker_id: WorkerId,
        session_id: SessionId,
        details: &WorkDetails,
        start_time: DateTime<Utc>,
        start_coordinate: Option<Coordinate>,
    ) -> Self {
        Self {
            worker_id,
            session_id,
            work_type: details.variant.work_type(),
            jobsite_id: details.jobsite_id.clone(),
            cost_code: details.cost_code.clone(),
            start_time,
            start_coordinate,
            fields: details.variant.variant_fields(),
            closing: None,
        }
    }

    pub fn with_closing(mut self, closing: PriorTimesheetClosure) -> Self {
        self.closing = Some(closing);
        self
    }

    pub fn is_switch(&self) -> bool {
        self.closing.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timesheet {
    pub id: TimesheetId,
    pub worker_id: WorkerId,
    pub session_id: SessionId,
    pub work_type: WorkType,
    pub jobsite_id: String,
    pub cost_code: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub start_coordinate: Option<Coordinate>,
    pub end_coordinate: Option<Coordinate>,
    #[serde(flatten)]
    pub fields: VariantFields,
}

impl Timesheet {
    /// Materializes a record from a payload, the way a gateway echoes it back.
    pub fn from_payload(id: TimesheetId, payload: &TimesheetPayload) -> Self {
        Self {
            id,
            worker_id: payload.worker_id.clone(),
            session_id: payload.session_id.clone(),
            work_type: payload.work_type,
            jobsite_id: payload.jobsite_id.clone(),
            cost_code: payload.cost_code.clone(),
            start_time: payload.start_time,
            end_time: None,
            start_coordinate: payload.start_coordinate,
            end_coordinate: None,
            fields: payload.fields.clone(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_for(variant: WorkVariant) -> TimesheetPayload {
        TimesheetPayload::fresh(
            WorkerId::new("w-1"),
            SessionId::new("s-1"),
            &WorkDetails::new("site-9", "01.100", variant),
            Utc::now(),
            None,
        )
    }

    #[test]
    fn tasco_shifts_carry_shift_and_labor_types() {
        let abcd = payload_for(WorkVariant::TascoAbcdLabor);
        assert_eq!(abcd.fields.shift_type.as_deref(), Some("ABCD"));
        assert_eq!(abcd.fields.labor_type.as_deref(), Some("Manual Labor"));

        let operator = payload_for(WorkVariant::TascoAbcdEquipment {
            material_type: "Rock".into(),
            equipment_id: None,
        });
        assert_eq!(operator.fields.labor_type.as_deref(), Some("Operator"));
        assert_eq!(operator.fields.material_type.as_deref(), Some("Rock"));

        let e = payload_for(WorkVariant::TascoE {
            material_type: "Fill".into(),
        });
        assert_eq!(e.fields.shift_type.as_deref(), Some("E"));
        assert_eq!(e.fields.labor_type.as_deref(), Some("EShift"));

        let f = payload_for(WorkVariant::TascoF {
            material_type: "Fill".into(),
        });
        assert_eq!(f.fields.shift_type.as_deref(), Some("F"));
        assert_eq!(f.fields.labor_type.as_deref(), Some("FShift"));
    }

    #[test]
    fn truck_variants_set_vehicle_ids() {
        let driver = payload_for(WorkVariant::TruckDriver {
            truck_id: "T-12".into(),
            starting_mileage: Some(120_400),
        });
        assert_eq!(driver.work_type, WorkType::TruckDriver);
        assert_eq!(driver.fields.truck_id.as_deref(), Some("T-12"));
        assert_eq!(driver.fields.starting_mileage, Some(120_400));
        assert!(driver.fields.shift_type.is_none());

        let operator = payload_for(WorkVariant::TruckEquipmentOperator {
            equipment_id: "EQ-3".into(),
        });
        assert_eq!(operator.fields.equipment_id.as_deref(), Some("EQ-3"));
    }

    #[test]
    fn blank_required_fields_fail_validation() {
        let details = WorkDetails::new(
            "site-9",
            "01.100",
            WorkVariant::TruckDriver {
                truck_id: "  ".into(),
                starting_mileage: None,
            },
        );
        assert_eq!(details.validate(), Err("truckId is required".to_string()));

        let details = WorkDetails::new("", "01.100", WorkVariant::General);
        assert_eq!(details.validate(), Err("jobsiteId is required".to_string()));
    }

    #[test]
    fn variant_descriptor_uses_tagged_json() {
        let variant: WorkVariant =
            serde_json::from_str(r#"{"kind":"tascoE","materialType":"Sand"}"#).unwrap();
        assert_eq!(
            variant,
            WorkVariant::TascoE {
                material_type: "Sand".into()
            }
        );
        assert_eq!(WorkType::parse(variant.work_type().as_str()), Some(WorkType::TascoE));
    }
}
