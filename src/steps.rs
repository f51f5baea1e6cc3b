//! Onboarding step completion tracker.
//!
//! Classifies the locally cached values of each onboarding form into
//! `empty`, `partial` or `complete`. Output only feeds progress display and
//! never gates navigation nor submission.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Serialized values of one step's form.
pub type Snapshot = Map<String, Value>;

const NAME_FIELDS: [&str; 3] = ["fullNameEnglish", "fullNameArabic", "name"];
const LOCATION_FIELDS: [&str; 4] = ["country", "city", "address", "workCountry"];
const EDUCATION_FIELDS: [&str; 2] = ["educationLevel", "university"];
const SKILLS_FIELD: &str = "skills";
const ID_FIELD: &str = "id";

/// Onboarding form sections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Attachment,
    Contact,
    Information,
    Education,
    Activity,
    Eligibility,
}

/// Steps shown on the progress indicator, in display order.
pub const TRACKED_STEPS: [Step; 5] = [
    Step::Attachment,
    Step::Contact,
    Step::Information,
    Step::Education,
    Step::Activity,
];

impl Step {
    /// Value saved in `onboarding_step` once this step is submitted.
    pub fn number(&self) -> i32 {
        match self {
            Step::Attachment => 1,
            Step::Contact => 2,
            Step::Information => 3,
            Step::Education => 4,
            Step::Activity => 5,
            Step::Eligibility => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Attachment => "attachment",
            Step::Contact => "contact",
            Step::Information => "information",
            Step::Education => "education",
            Step::Activity => "activity",
            Step::Eligibility => "eligibility",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = crate::profile::UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attachment" => Ok(Step::Attachment),
            "contact" => Ok(Step::Contact),
            "information" => Ok(Step::Information),
            "education" => Ok(Step::Education),
            "activity" => Ok(Step::Activity),
            "eligibility" => Ok(Step::Eligibility),
            _ => Err(crate::profile::UnknownStatus(s.to_owned())),
        }
    }
}

/// Completion of one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completion {
    Empty,
    Partial,
    Complete,
}

fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(_) => true,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn any_filled(snapshot: &Snapshot, fields: &[&str]) -> bool {
    fields
        .iter()
        .any(|field| snapshot.get(*field).is_some_and(is_filled))
}

fn filled_count(snapshot: &Snapshot) -> usize {
    snapshot
        .iter()
        .filter(|(key, value)| key.as_str() != ID_FIELD && is_filled(value))
        .count()
}

fn complete_or_partial(complete: bool) -> Completion {
    if complete {
        Completion::Complete
    } else {
        Completion::Partial
    }
}

/// Classify one step from its snapshot. A missing snapshot is always empty.
pub fn classify(step: Step, snapshot: Option<&Snapshot>) -> Completion {
    let Some(snapshot) = snapshot else {
        return Completion::Empty;
    };

    match step {
        Step::Attachment | Step::Eligibility => complete_or_partial(filled_count(snapshot) > 0),
        Step::Contact => match filled_count(snapshot) {
            0 => Completion::Empty,
            1 => Completion::Partial,
            _ => Completion::Complete,
        },
        Step::Information => {
            match (
                any_filled(snapshot, &NAME_FIELDS),
                any_filled(snapshot, &LOCATION_FIELDS),
            ) {
                (true, true) => Completion::Complete,
                (false, false) => Completion::Empty,
                _ => Completion::Partial,
            }
        },
        Step::Education => complete_or_partial(any_filled(snapshot, &EDUCATION_FIELDS)),
        Step::Activity => complete_or_partial(matches!(
            snapshot.get(SKILLS_FIELD),
            Some(Value::Array(skills)) if !skills.is_empty()
        )),
    }
}

/// Per-step completion with progress bar fraction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub steps: BTreeMap<Step, Completion>,
    pub completed: usize,
    pub total: usize,
    pub fraction: f64,
}

/// Classify every tracked step.
pub fn progress(snapshots: &HashMap<Step, Snapshot>) -> Progress {
    let steps: BTreeMap<Step, Completion> = TRACKED_STEPS
        .iter()
        .map(|step| (*step, classify(*step, snapshots.get(step))))
        .collect();
    let completed = steps
        .values()
        .filter(|c| **c == Completion::Complete)
        .count();
    let total = TRACKED_STEPS.len();

    Progress {
        steps,
        completed,
        total,
        fraction: completed as f64 / total as f64,
    }
}

/// Client-side cache of step snapshots.
///
/// Stale snapshots are dropped when the server reports a lower step counter
/// than previously observed.
#[derive(Clone, Debug, Default)]
pub struct SnapshotCache {
    snapshots: HashMap<Step, Snapshot>,
    server_step: i32,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save the values of a successfully submitted step.
    pub fn put(&mut self, step: Step, snapshot: Snapshot) {
        self.snapshots.insert(step, snapshot);
    }

    pub fn get(&self, step: Step) -> Option<&Snapshot> {
        self.snapshots.get(&step)
    }

    /// Drop the snapshot of one step.
    pub fn clear(&mut self, step: Step) -> Option<Snapshot> {
        self.snapshots.remove(&step)
    }

    /// Record the server step counter. On regression, clears every step
    /// beyond the new counter and returns them.
    pub fn observe_server_step(&mut self, step: i32) -> Vec<Step> {
        let regressed = step < self.server_step;
        self.server_step = step;
        if !regressed {
            return Vec::new();
        }

        let mut stale: Vec<Step> = self
            .snapshots
            .keys()
            .filter(|s| s.number() > step)
            .copied()
            .collect();
        stale.sort();
        for s in &stale {
            self.clear(*s);
        }
        stale
    }

    /// Classify cached snapshots.
    pub fn progress(&self) -> Progress {
        progress(&self.snapshots)
    }
}
