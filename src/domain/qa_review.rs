use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The fixed dozen installation checklist items, in review order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QaStep {
    #[serde(rename = "step_01_house_photo")]
    HousePhoto,
    #[serde(rename = "step_02_cable_from_pole")]
    CableFromPole,
    #[serde(rename = "step_03_cable_entry_outside")]
    CableEntryOutside,
    #[serde(rename = "step_04_cable_entry_inside")]
    CableEntryInside,
    #[serde(rename = "step_05_wall_for_installation")]
    WallForInstallation,
    #[serde(rename = "step_06_ont_back_after_install")]
    OntBackAfterInstall,
    #[serde(rename = "step_07_power_meter_reading")]
    PowerMeterReading,
    #[serde(rename = "step_08_ont_barcode")]
    OntBarcode,
    #[serde(rename = "step_09_ups_serial")]
    UpsSerial,
    #[serde(rename = "step_10_final_installation")]
    FinalInstallation,
    #[serde(rename = "step_11_green_lights")]
    GreenLights,
    #[serde(rename = "step_12_customer_signature")]
    CustomerSignature,
}

impl QaStep {
    pub const ALL: [QaStep; 12] = [
        QaStep::HousePhoto,
        QaStep::CableFromPole,
        QaStep::CableEntryOutside,
        QaStep::CableEntryInside,
        QaStep::WallForInstallation,
        QaStep::OntBackAfterInstall,
        QaStep::PowerMeterReading,
        QaStep::OntBarcode,
        QaStep::UpsSerial,
        QaStep::FinalInstallation,
        QaStep::GreenLights,
        QaStep::CustomerSignature,
    ];

    pub const COUNT: usize = 12;

    /// Column / JSON key of the step.
    pub fn key(self) -> &'static str {
        match self {
            QaStep::HousePhoto => "step_01_house_photo",
            QaStep::CableFromPole => "step_02_cable_from_pole",
            QaStep::CableEntryOutside => "step_03_cable_entry_outside",
            QaStep::CableEntryInside => "step_04_cable_entry_inside",
            QaStep::WallForInstallation => "step_05_wall_for_installation",
            QaStep::OntBackAfterInstall => "step_06_ont_back_after_install",
            QaStep::PowerMeterReading => "step_07_power_meter_reading",
            QaStep::OntBarcode => "step_08_ont_barcode",
            QaStep::UpsSerial => "step_09_ups_serial",
            QaStep::FinalInstallation => "step_10_final_installation",
            QaStep::GreenLights => "step_11_green_lights",
            QaStep::CustomerSignature => "step_12_customer_signature",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QaStep::HousePhoto => "House Photo",
            QaStep::CableFromPole => "Cable from Pole",
            QaStep::CableEntryOutside => "Cable Entry Outside",
            QaStep::CableEntryInside => "Cable Entry Inside",
            QaStep::WallForInstallation => "Wall for Installation",
            QaStep::OntBackAfterInstall => "ONT Back After Install",
            QaStep::PowerMeterReading => "Power Meter Reading",
            QaStep::OntBarcode => "ONT Barcode",
            QaStep::UpsSerial => "UPS Serial",
            QaStep::FinalInstallation => "Final Installation",
            QaStep::GreenLights => "Green Lights",
            QaStep::CustomerSignature => "Customer Signature",
        }
    }

    fn index(self) -> usize {
        QaStep::ALL
            .iter()
            .position(|s| *s == self)
            .unwrap_or_default()
    }
}

/// The 12 boolean checklist flags of one drop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QaSteps([bool; QaStep::COUNT]);

impl QaSteps {
    pub fn all_passed() -> Self {
        Self([true; QaStep::COUNT])
    }

    pub fn from_flags(flags: [bool; QaStep::COUNT]) -> Self {
        Self(flags)
    }

    pub fn flags(&self) -> [bool; QaStep::COUNT] {
        self.0
    }

    pub fn get(&self, step: QaStep) -> bool {
        self.0[step.index()]
    }

    pub fn set(&mut self, step: QaStep, value: bool) {
        self.0[step.index()] = value;
    }

    pub fn apply(&mut self, patch: &BTreeMap<QaStep, bool>) {
        for (step, value) in patch {
            self.set(*step, *value);
        }
    }

    pub fn completed_count(&self) -> usize {
        self.0.iter().filter(|v| **v).count()
    }

    pub fn is_complete(&self) -> bool {
        self.completed_count() == QaStep::COUNT
    }

    pub fn missing(&self) -> Vec<QaStep> {
        QaStep::ALL.into_iter().filter(|s| !self.get(*s)).collect()
    }
}

impl Serialize for QaSteps {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let map: BTreeMap<QaStep, bool> = QaStep::ALL.into_iter().map(|s| (s, self.get(s))).collect();
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for QaSteps {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<QaStep, bool>::deserialize(deserializer)?;
        let mut steps = QaSteps::default();
        steps.apply(&map);
        Ok(steps)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropStatus {
    Incomplete,
    Complete,
}

impl std::str::FromStr for DropStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "incomplete" => Ok(DropStatus::Incomplete),
            "complete" => Ok(DropStatus::Complete),
            other => Err(format!("Unknown drop status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QaReviewDrop {
    pub id: String,
    pub drop_number: String,
    pub project: Option<String>,
    pub review_date: NaiveDate,
    pub user_name: String,
    pub steps: QaSteps,
    pub completed_photos: i64,
    pub outstanding_photos: i64,
    pub comment: Option<String>,
    pub assigned_agent: Option<String>,
    pub sender_phone: Option<String>,
    pub resubmitted: bool,
    pub feedback_count: i64,
    pub feedback_sent_at: Option<i64>,
    pub submitted_date: NaiveDate,
    pub created_at: i64,
    pub updated_at: i64,
}

impl QaReviewDrop {
    pub fn status(&self) -> DropStatus {
        if self.steps.is_complete() {
            DropStatus::Complete
        } else {
            DropStatus::Incomplete
        }
    }

    /// Recompute photo counters from the step flags.
    pub fn refresh_derived(&mut self) {
        let completed = self.steps.completed_count() as i64;
        self.completed_photos = completed;
        self.outstanding_photos = QaStep::COUNT as i64 - completed;
    }
}

/// API view of a drop with its derived status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QaReviewDropView {
    #[serde(flatten)]
    pub drop: QaReviewDrop,
    pub status: DropStatus,
    pub completed: bool,
    pub incomplete: bool,
}

impl From<QaReviewDrop> for QaReviewDropView {
    fn from(drop: QaReviewDrop) -> Self {
        let status = drop.status();
        Self {
            drop,
            status,
            completed: status == DropStatus::Complete,
            incomplete: status == DropStatus::Incomplete,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DropFilter {
    pub status: Option<DropStatus>,
    pub project: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDrop {
    pub drop_number: String,
    pub project: Option<String>,
    pub user_name: Option<String>,
    pub sender_phone: Option<String>,
    pub review_date: Option<NaiveDate>,
    #[serde(default)]
    pub steps: BTreeMap<QaStep, bool>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropUpdate {
    #[serde(default)]
    pub steps: BTreeMap<QaStep, bool>,
    pub comment: Option<String>,
    pub drop_number: Option<String>,
    pub assigned_agent: Option<String>,
    pub project: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QaSummary {
    pub total: i64,
    pub complete: i64,
    pub incomplete: i64,
    pub average_completed_photos: f64,
    pub total_feedback: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyProjectCount {
    pub date: String,
    pub project: String,
    pub count: i64,
}

/// Feedback text listing the checklist items still missing on a drop.
pub fn auto_feedback(drop_number: &str, steps: &QaSteps) -> String {
    let missing = steps.missing();
    if missing.is_empty() {
        return format!("{}: All items complete! \u{2705}", drop_number);
    }
    let labels: Vec<&str> = missing.into_iter().map(QaStep::label).collect();
    format!("{}: Missing {}", drop_number, labels.join(", "))
}
