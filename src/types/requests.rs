//! Request bodies for the REST API
//!
//! Every body deserializes leniently (all fields optional) and is then
//! validated into a typed value, so a missing field becomes a 400 with a
//! per-field message rather than a generic JSON error. The same structs are
//! serialized by the offline HTTP client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::Status;
use super::validation::{
    is_valid_email, parse_rfc3339, parse_timestamp, require_text, FieldErrors,
};
use super::{MAX_ACTIONS_PER_STRATEGY, MAX_STRATEGIES_PER_GOAL};

pub const MIN_PASSWORD_LEN: usize = 8;

// ============================================================================
// Accounts
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Validated email/password pair
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub credentials: Credentials,
    pub name: Option<String>,
}

fn validate_credentials(
    errors: &mut FieldErrors,
    email: Option<&str>,
    password: Option<&str>,
) -> Option<Credentials> {
    let email = email.map(|e| e.trim().to_lowercase());
    let email = match email {
        Some(e) if is_valid_email(&e) => Some(e),
        Some(_) => {
            errors.add("email", "Invalid email address");
            None
        }
        None => {
            errors.add("email", "Email is required");
            None
        }
    };

    let password = match password {
        Some(p) if p.chars().count() >= MIN_PASSWORD_LEN => Some(p.to_string()),
        Some(_) => {
            errors.add(
                "password",
                format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
            );
            None
        }
        None => {
            errors.add("password", "Password is required");
            None
        }
    };

    Some(Credentials {
        email: email?,
        password: password?,
    })
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<NewUser, FieldErrors> {
        let mut errors = FieldErrors::new();
        let credentials =
            validate_credentials(&mut errors, self.email.as_deref(), self.password.as_deref());

        let name = match self.name.as_deref().map(str::trim) {
            Some("") => {
                errors.add("name", "Name cannot be empty");
                None
            }
            other => other.map(str::to_string),
        };

        errors.into_result()?;
        match credentials {
            Some(credentials) => Ok(NewUser { credentials, name }),
            None => Err(errors_for("email", "Invalid credentials")),
        }
    }
}

impl LoginRequest {
    pub fn validate(&self) -> Result<Credentials, FieldErrors> {
        let mut errors = FieldErrors::new();
        let credentials =
            validate_credentials(&mut errors, self.email.as_deref(), self.password.as_deref());
        errors.into_result()?;
        credentials.ok_or_else(|| errors_for("email", "Invalid credentials"))
    }
}

fn errors_for(field: &str, message: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.add(field, message);
    errors
}

// ============================================================================
// Vision
// ============================================================================

/// Answers to the eleven vision prompts. Every answer is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionAnswers {
    pub learn: Option<String>,
    pub have: Option<String>,
    pub be: Option<String>,
    #[serde(rename = "try")]
    pub try_: Option<String>,
    pub see: Option<String>,
    #[serde(rename = "do")]
    pub do_: Option<String>,
    pub go: Option<String>,
    pub create: Option<String>,
    pub contribute: Option<String>,
    pub overcome: Option<String>,
    pub one_day: Option<String>,
}

impl VisionAnswers {
    /// Prompt names in storage order
    pub const PROMPTS: [&'static str; 11] = [
        "learn",
        "have",
        "be",
        "try",
        "see",
        "do",
        "go",
        "create",
        "contribute",
        "overcome",
        "oneDay",
    ];

    /// Answers in `PROMPTS` order
    pub fn as_array(&self) -> [Option<&str>; 11] {
        [
            self.learn.as_deref(),
            self.have.as_deref(),
            self.be.as_deref(),
            self.try_.as_deref(),
            self.see.as_deref(),
            self.do_.as_deref(),
            self.go.as_deref(),
            self.create.as_deref(),
            self.contribute.as_deref(),
            self.overcome.as_deref(),
            self.one_day.as_deref(),
        ]
    }

    /// Build from answers in `PROMPTS` order
    pub fn from_array(values: [Option<String>; 11]) -> Self {
        let [learn, have, be, try_, see, do_, go, create, contribute, overcome, one_day] = values;
        Self {
            learn,
            have,
            be,
            try_,
            see,
            do_,
            go,
            create,
            contribute,
            overcome,
            one_day,
        }
    }

    /// Blank answers become absent ones
    pub fn normalized(self) -> Self {
        let values = [
            self.learn,
            self.have,
            self.be,
            self.try_,
            self.see,
            self.do_,
            self.go,
            self.create,
            self.contribute,
            self.overcome,
            self.one_day,
        ]
        .map(|value| value.filter(|v| !v.trim().is_empty()));
        Self::from_array(values)
    }

    pub fn is_empty(&self) -> bool {
        self.as_array().iter().all(Option::is_none)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVisionRequest {
    #[serde(flatten)]
    pub answers: VisionAnswers,
    /// Idempotency key supplied by the offline client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewVision {
    pub answers: VisionAnswers,
    pub client_key: Option<String>,
}

impl CreateVisionRequest {
    pub fn validate(&self) -> Result<NewVision, FieldErrors> {
        let mut errors = FieldErrors::new();
        let client_key = validate_client_key(&mut errors, self.client_key.as_deref());
        errors.into_result()?;
        Ok(NewVision {
            answers: self.answers.clone().normalized(),
            client_key,
        })
    }
}

fn validate_client_key(errors: &mut FieldErrors, key: Option<&str>) -> Option<String> {
    match key.map(str::trim) {
        Some("") => {
            errors.add("clientKey", "Client key cannot be empty");
            None
        }
        Some(k) if k.len() > 128 => {
            errors.add("clientKey", "Client key is too long");
            None
        }
        other => other.map(str::to_string),
    }
}

// ============================================================================
// Goals
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDraft {
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDraft {
    pub title: Option<String>,
    #[serde(default)]
    pub actions: Vec<ActionDraft>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalRequest {
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
    pub expected_completion_date: Option<String>,
    #[serde(default)]
    pub strategies: Vec<StrategyDraft>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStrategy {
    pub title: String,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewGoal {
    pub title: String,
    pub why: Option<String>,
    pub expected_completion_date: DateTime<Utc>,
    pub strategies: Vec<NewStrategy>,
    pub client_key: Option<String>,
}

impl CreateGoalRequest {
    pub fn validate(&self) -> Result<NewGoal, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = require_text(&mut errors, "title", self.title.as_deref(), "Title is required");
        let why = self
            .why
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(str::to_string);

        let expected = match self.expected_completion_date.as_deref() {
            Some(raw) => {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    errors.add("expectedCompletionDate", "Expected completion date is not a valid date");
                }
                parsed
            }
            None => {
                errors.add("expectedCompletionDate", "Expected completion date is required");
                None
            }
        };

        if self.strategies.len() > MAX_STRATEGIES_PER_GOAL {
            errors.add(
                "strategies",
                format!("A goal can have at most {} strategies", MAX_STRATEGIES_PER_GOAL),
            );
        }

        let mut strategies = Vec::with_capacity(self.strategies.len());
        for (i, draft) in self.strategies.iter().enumerate() {
            let title = require_text(
                &mut errors,
                &format!("strategies[{}].title", i),
                draft.title.as_deref(),
                "Strategy title is required",
            );

            if draft.actions.len() > MAX_ACTIONS_PER_STRATEGY {
                errors.add(
                    format!("strategies[{}].actions", i),
                    format!("A strategy can have at most {} actions", MAX_ACTIONS_PER_STRATEGY),
                );
            }

            let actions: Vec<String> = draft
                .actions
                .iter()
                .enumerate()
                .filter_map(|(j, action)| {
                    require_text(
                        &mut errors,
                        &format!("strategies[{}].actions[{}].description", i, j),
                        action.description.as_deref(),
                        "Action description is required",
                    )
                })
                .collect();

            if let Some(title) = title {
                strategies.push(NewStrategy { title, actions });
            }
        }

        let client_key = validate_client_key(&mut errors, self.client_key.as_deref());

        errors.into_result()?;
        match (title, expected) {
            (Some(title), Some(expected_completion_date)) => Ok(NewGoal {
                title,
                why,
                expected_completion_date,
                strategies,
                client_key,
            }),
            _ => Err(errors_for("title", "Title is required")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: Status) -> Self {
        Self {
            status: Some(status.as_str().to_string()),
        }
    }

    pub fn validate(&self) -> Result<Status, FieldErrors> {
        match self.status.as_deref() {
            Some(raw) => raw
                .parse::<Status>()
                .map_err(|e| errors_for("status", &e.to_string())),
            None => Err(errors_for("status", "Status is required")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateStrategyRequest {
    pub title: Option<String>,
}

impl CreateStrategyRequest {
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let title = require_text(&mut errors, "title", self.title.as_deref(), "Title is required");
        errors.into_result()?;
        title.ok_or_else(|| errors_for("title", "Title is required"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateActionRequest {
    pub description: Option<String>,
}

impl CreateActionRequest {
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let description = require_text(
            &mut errors,
            "description",
            self.description.as_deref(),
            "Description is required",
        );
        errors.into_result()?;
        description.ok_or_else(|| errors_for("description", "Description is required"))
    }
}

// ============================================================================
// Milestones
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateMilestoneRequest {
    #[serde(alias = "text")]
    pub note: Option<String>,
}

impl CreateMilestoneRequest {
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let note = require_text(&mut errors, "note", self.note.as_deref(), "Note is required");
        errors.into_result()?;
        note.ok_or_else(|| errors_for("note", "Note is required"))
    }
}

/// Milestone in the structured shape. `text` and `timestamp` are accepted
/// for records written by older clients; `date` and `time` are display-only
/// and ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneRecord {
    #[serde(alias = "text")]
    pub note: Option<String>,
    #[serde(alias = "timestamp", skip_serializing_if = "Option::is_none")]
    pub reached_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub date: Option<String>,
    #[serde(default, skip_serializing)]
    pub time: Option<String>,
}

/// One element of a milestone replace array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MilestoneInput {
    /// Legacy bare-string milestone
    Legacy(String),
    Record(MilestoneRecord),
}

/// Milestone in the single canonical shape used past the API boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMilestone {
    pub note: String,
    /// `None` means "now" at insert time
    pub reached_at: Option<DateTime<Utc>>,
}

impl MilestoneInput {
    pub fn new(note: impl Into<String>, reached_at: DateTime<Utc>) -> Self {
        MilestoneInput::Record(MilestoneRecord {
            note: Some(note.into()),
            reached_at: Some(crate::db::format_ts(&reached_at)),
            date: None,
            time: None,
        })
    }

    /// Convert either accepted shape into a `NewMilestone`.
    ///
    /// Returns the message to report when the note is empty or the
    /// timestamp cannot be parsed.
    pub fn normalize(&self) -> Result<NewMilestone, &'static str> {
        let (note, reached_at) = match self {
            MilestoneInput::Legacy(text) => (Some(text.as_str()), None),
            MilestoneInput::Record(record) => {
                (record.note.as_deref(), record.reached_at.as_deref())
            }
        };

        let note = note
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or("Milestone note is required")?;

        let reached_at = match reached_at {
            Some(raw) => Some(parse_timestamp(raw).ok_or("Milestone timestamp is not a valid date")?),
            None => None,
        };

        Ok(NewMilestone {
            note: note.to_string(),
            reached_at,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplaceMilestonesRequest {
    pub milestones: Option<Vec<MilestoneInput>>,
}

impl ReplaceMilestonesRequest {
    pub fn validate(&self) -> Result<Vec<NewMilestone>, FieldErrors> {
        let Some(inputs) = self.milestones.as_ref() else {
            return Err(errors_for("milestones", "Milestones array is required"));
        };

        let mut errors = FieldErrors::new();
        let mut milestones = Vec::with_capacity(inputs.len());
        for (i, input) in inputs.iter().enumerate() {
            match input.normalize() {
                Ok(m) => milestones.push(m),
                Err(msg) => errors.add(format!("milestones[{}]", i), msg),
            }
        }
        errors.into_result()?;
        Ok(milestones)
    }
}

// ============================================================================
// Journal: summaries and letters
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpsertSummaryRequest {
    pub year: Option<i32>,
    pub quarter: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SummaryUpsert {
    pub year: i32,
    pub quarter: u8,
    pub achievements: Option<String>,
    pub reflection: Option<String>,
}

/// `quarter` must be 1..=4
pub fn validate_period(
    errors: &mut FieldErrors,
    year: Option<i32>,
    quarter: Option<u8>,
) -> Option<(i32, u8)> {
    let year = match year {
        Some(y) if (1..=9999).contains(&y) => Some(y),
        Some(_) => {
            errors.add("year", "Year must be between 1 and 9999");
            None
        }
        None => {
            errors.add("year", "Year is required");
            None
        }
    };
    let quarter = match quarter {
        Some(q) if (1..=4).contains(&q) => Some(q),
        Some(_) => {
            errors.add("quarter", "Quarter must be between 1 and 4");
            None
        }
        None => {
            errors.add("quarter", "Quarter is required");
            None
        }
    };
    Some((year?, quarter?))
}

impl UpsertSummaryRequest {
    pub fn validate(&self) -> Result<SummaryUpsert, FieldErrors> {
        let mut errors = FieldErrors::new();
        let period = validate_period(&mut errors, self.year, self.quarter);
        errors.into_result()?;
        let (year, quarter) = period.ok_or_else(|| errors_for("quarter", "Quarter is required"))?;
        Ok(SummaryUpsert {
            year,
            quarter,
            achievements: self.achievements.clone(),
            reflection: self.reflection.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLetterRequest {
    pub content: Option<String>,
    pub deliver_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewLetter {
    pub content: String,
    pub deliver_on: DateTime<Utc>,
    pub delivery_email: Option<String>,
}

impl CreateLetterRequest {
    pub fn validate(&self) -> Result<NewLetter, FieldErrors> {
        let mut errors = FieldErrors::new();

        let content = match self.content.as_deref() {
            Some(c) if !c.trim().is_empty() => Some(c.to_string()),
            _ => {
                errors.add("content", "Content is required");
                None
            }
        };

        let deliver_on = match self.deliver_on.as_deref() {
            Some(raw) => {
                let parsed = parse_rfc3339(raw);
                if parsed.is_none() {
                    errors.add("deliverOn", "Delivery date must be an ISO 8601 datetime");
                }
                parsed
            }
            None => {
                errors.add("deliverOn", "Delivery date is required");
                None
            }
        };

        let delivery_email = match self.delivery_email.as_deref().map(str::trim) {
            Some(e) if is_valid_email(e) => Some(e.to_string()),
            Some(_) => {
                errors.add("deliveryEmail", "Invalid email address");
                None
            }
            None => None,
        };

        errors.into_result()?;
        match (content, deliver_on) {
            (Some(content), Some(deliver_on)) => Ok(NewLetter {
                content,
                deliver_on,
                delivery_email,
            }),
            _ => Err(errors_for("content", "Content is required")),
        }
    }
}
