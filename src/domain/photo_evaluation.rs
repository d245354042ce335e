use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationStep {
    pub number: u8,
    pub name: &'static str,
    pub label: &'static str,
    pub criteria: &'static str,
}

/// Photo evaluation steps the vision model scores.
pub const EVALUATION_STEPS: [EvaluationStep; 11] = [
    EvaluationStep {
        number: 1,
        name: "house_photo",
        label: "House Photo",
        criteria: "Clear photo of the house with visible address/street number",
    },
    EvaluationStep {
        number: 2,
        name: "cable_span",
        label: "Cable Span from Pole",
        criteria: "Photo showing cable span from pole to house",
    },
    EvaluationStep {
        number: 3,
        name: "cable_entry_outside",
        label: "Cable Entry Outside",
        criteria: "Outside view of cable entry point into house",
    },
    EvaluationStep {
        number: 4,
        name: "cable_entry_inside",
        label: "Cable Entry Inside",
        criteria: "Inside view of cable entry, showing clean installation",
    },
    EvaluationStep {
        number: 5,
        name: "wall_installation",
        label: "Wall for Installation",
        criteria: "Photo of wall where ONT will be/is installed",
    },
    EvaluationStep {
        number: 6,
        name: "ont_back",
        label: "ONT Back After Install",
        criteria: "Back of ONT showing cable connections",
    },
    EvaluationStep {
        number: 7,
        name: "power_meter",
        label: "Power Meter Reading",
        criteria: "Clear photo of power meter showing reading",
    },
    EvaluationStep {
        number: 8,
        name: "ont_barcode",
        label: "ONT Barcode",
        criteria: "ONT barcode/serial number clearly visible and readable",
    },
    EvaluationStep {
        number: 9,
        name: "ups_serial",
        label: "UPS Serial Number",
        criteria: "UPS serial number clearly visible and readable",
    },
    EvaluationStep {
        number: 10,
        name: "final_installation",
        label: "Final Installation",
        criteria: "Complete installation showing ONT and cables neatly installed",
    },
    EvaluationStep {
        number: 11,
        name: "ont_lights",
        label: "Green Lights on ONT",
        criteria: "ONT with green lights indicating successful connection",
    },
];

pub fn evaluation_step(number: u8) -> Option<&'static EvaluationStep> {
    EVALUATION_STEPS.iter().find(|s| s.number == number)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverallStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    pub step_number: u8,
    pub step_name: String,
    pub step_label: String,
    pub passed: bool,
    pub score: f64,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub dr_number: String,
    pub overall_status: OverallStatus,
    pub average_score: f64,
    pub total_steps: usize,
    pub passed_steps: usize,
    pub step_results: Vec<StepResult>,
    pub photos_evaluated: usize,
    pub feedback_sent: bool,
    pub evaluated_at: i64,
    pub markdown_report: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VlmHealth {
    pub reachable: bool,
    pub model: String,
    pub model_available: bool,
}

/// WhatsApp message for an evaluation: an approval, or the failed steps with the model's comments.
pub fn evaluation_feedback(result: &EvaluationResult) -> String {
    let failed: Vec<&StepResult> = result.step_results.iter().filter(|s| !s.passed).collect();
    if failed.is_empty() {
        return format!("{}\nAll items complete! \u{2705}", result.dr_number);
    }

    let mut message = format!("{}\nNEEDS CORRECTION\n\nIncorrect items:\n", result.dr_number);
    for step in &failed {
        message.push_str(&format!("\u{2022} {} - {}\n", step.step_label, step.comment));
    }

    let missing: Vec<&StepResult> = result
        .step_results
        .iter()
        .filter(|s| s.score == 0.0 || looks_missing(&s.comment))
        .collect();
    if !missing.is_empty() && missing.len() != failed.len() {
        message.push_str("\nMissing items:\n");
        for step in missing {
            message.push_str(&format!("\u{2022} {}\n", step.step_label));
        }
    }
    message
}

fn looks_missing(comment: &str) -> bool {
    let comment = comment.to_lowercase();
    comment.contains("missing") || comment.contains("not found")
}
