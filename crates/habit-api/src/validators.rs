//! Cross-field rules checked on every habit and user write.
//!
//! Rules never transform their input. Every rule runs on every candidate and
//! all violations are reported together.

use std::fmt;

use thiserror::Error;

use habit_types::models::{Habit, HabitDraft};

pub const MAX_DURATION_SECS: u32 = 120;
pub const PERIODICITY_RANGE: std::ops::RangeInclusive<u32> = 1..=7;
pub const MAX_HABIT_TEXT_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_PROFILE_TEXT_LEN: usize = 35;
pub const MAX_CHAT_ID_LEN: usize = 50;
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("Both related habit and reward cannot be chosen at the same time.")]
    RelatedHabitWithReward,

    #[error("Duration cannot be greater than {} seconds.", MAX_DURATION_SECS)]
    DurationTooLong,

    #[error("Related habit does not exist.")]
    RelatedHabitMissing,

    #[error("Related habit must be a pleasant one.")]
    RelatedHabitNotPleasant,

    #[error("Pleasant habit can not have reward or related habit.")]
    PleasantHabitWithReward,

    #[error("Habit can not be performed less than once per 7 days or more than once per day.")]
    PeriodicityOutOfRange,

    #[error("{field} may not be blank.")]
    Blank { field: &'static str },

    #[error("{field} must be at most {max} characters.")]
    TooLong { field: &'static str, max: usize },

    #[error("Enter a valid email address.")]
    InvalidEmail,

    #[error("Password must be at least {} characters.", MIN_PASSWORD_LEN)]
    PasswordTooShort,

    #[error("Habit can not be its own related habit.")]
    RelatedHabitIsSelf,

    #[error("Habit is the related habit of other habits and must stay pleasant.")]
    PleasantHabitInUse,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),
}

impl Violation {
    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RelatedHabitWithReward => "related_habit_with_reward",
            Self::DurationTooLong => "duration_too_long",
            Self::RelatedHabitMissing => "related_habit_missing",
            Self::RelatedHabitNotPleasant => "related_habit_not_pleasant",
            Self::PleasantHabitWithReward => "pleasant_habit_with_reward",
            Self::PeriodicityOutOfRange => "periodicity_out_of_range",
            Self::Blank { .. } => "blank",
            Self::TooLong { .. } => "too_long",
            Self::InvalidEmail => "invalid_email",
            Self::PasswordTooShort => "password_too_short",
            Self::RelatedHabitIsSelf => "related_habit_is_self",
            Self::PleasantHabitInUse => "pleasant_habit_in_use",
            Self::InvalidBody(_) => "invalid_body",
        }
    }
}

/// Non-empty list of violations from one validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<Violation>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    pub fn contains(&self, violation: &Violation) -> bool {
        self.0.contains(violation)
    }

    pub fn into_vec(self) -> Vec<Violation> {
        self.0
    }

    fn check(violations: Vec<Violation>) -> Result<(), Self> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Self(violations))
        }
    }
}

impl From<Violation> for ValidationErrors {
    fn from(violation: Violation) -> Self {
        Self(vec![violation])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// -- Habits --

type HabitRule = fn(&HabitDraft, Option<&Habit>, &mut Vec<Violation>);

const HABIT_RULES: &[HabitRule] = &[
    related_habit_and_reward,
    duration_limit,
    related_habit_exists,
    related_habit_is_pleasant,
    pleasant_habit_stands_alone,
    periodicity_in_range,
    habit_text_fields,
];

/// Check a merged habit field set.
///
/// `related` is the habit `draft.related_habit` points to, if the caller could
/// resolve it. Passing `None` while the draft names a related habit reports it
/// as missing.
pub fn validate_habit(draft: &HabitDraft, related: Option<&Habit>) -> Result<(), ValidationErrors> {
    ValidationErrors::check(habit_violations(draft, related))
}

/// Check a draft that replaces `existing`.
///
/// On top of the rules for new habits, a habit may not link to itself, and a
/// pleasant habit other habits link to (`has_dependants`) may not stop being
/// pleasant.
pub fn validate_habit_update(
    existing: &Habit,
    draft: &HabitDraft,
    related: Option<&Habit>,
    has_dependants: bool,
) -> Result<(), ValidationErrors> {
    let mut violations = habit_violations(draft, related);
    if draft.related_habit == Some(existing.id) {
        violations.push(Violation::RelatedHabitIsSelf);
    }
    if existing.is_pleasant && !draft.is_pleasant && has_dependants {
        violations.push(Violation::PleasantHabitInUse);
    }
    ValidationErrors::check(violations)
}

fn habit_violations(draft: &HabitDraft, related: Option<&Habit>) -> Vec<Violation> {
    let mut violations = Vec::new();
    for rule in HABIT_RULES {
        rule(draft, related, &mut violations);
    }
    violations
}

fn related_habit_and_reward(draft: &HabitDraft, _: Option<&Habit>, out: &mut Vec<Violation>) {
    if draft.related_habit.is_some() && draft.reward().is_some() {
        out.push(Violation::RelatedHabitWithReward);
    }
}

fn duration_limit(draft: &HabitDraft, _: Option<&Habit>, out: &mut Vec<Violation>) {
    if draft.duration > MAX_DURATION_SECS {
        out.push(Violation::DurationTooLong);
    }
}

fn related_habit_exists(draft: &HabitDraft, related: Option<&Habit>, out: &mut Vec<Violation>) {
    if draft.related_habit.is_some() && related.is_none() {
        out.push(Violation::RelatedHabitMissing);
    }
}

fn related_habit_is_pleasant(draft: &HabitDraft, related: Option<&Habit>, out: &mut Vec<Violation>) {
    if draft.related_habit.is_none() {
        return;
    }
    if let Some(related) = related {
        if !related.is_pleasant {
            out.push(Violation::RelatedHabitNotPleasant);
        }
    }
}

fn pleasant_habit_stands_alone(draft: &HabitDraft, _: Option<&Habit>, out: &mut Vec<Violation>) {
    if draft.is_pleasant && (draft.reward().is_some() || draft.related_habit.is_some()) {
        out.push(Violation::PleasantHabitWithReward);
    }
}

fn periodicity_in_range(draft: &HabitDraft, _: Option<&Habit>, out: &mut Vec<Violation>) {
    // A missing periodicity fails the range check too.
    match draft.periodicity {
        Some(p) if PERIODICITY_RANGE.contains(&p) => {}
        _ => out.push(Violation::PeriodicityOutOfRange),
    }
}

fn habit_text_fields(draft: &HabitDraft, _: Option<&Habit>, out: &mut Vec<Violation>) {
    required_text("location", &draft.location, MAX_HABIT_TEXT_LEN, out);
    required_text("action", &draft.action, MAX_HABIT_TEXT_LEN, out);
    if let Some(reward) = draft.reward() {
        max_len("reward", reward, MAX_HABIT_TEXT_LEN, out);
    }
}

// -- Users --

/// Profile fields as they will be stored. `password` is the plain-text
/// password when one is being set.
pub struct UserCandidate<'a> {
    pub email: &'a str,
    pub password: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub city: Option<&'a str>,
    pub tg_chat_id: Option<&'a str>,
}

pub fn validate_user(user: &UserCandidate<'_>) -> Result<(), ValidationErrors> {
    let mut violations = Vec::new();

    if user.email.trim().is_empty() {
        violations.push(Violation::Blank { field: "email" });
    } else if !looks_like_email(user.email) {
        violations.push(Violation::InvalidEmail);
    }
    max_len("email", user.email, MAX_EMAIL_LEN, &mut violations);

    if let Some(password) = user.password {
        if password.chars().count() < MIN_PASSWORD_LEN {
            violations.push(Violation::PasswordTooShort);
        }
    }
    if let Some(phone) = user.phone {
        max_len("phone", phone, MAX_PROFILE_TEXT_LEN, &mut violations);
    }
    if let Some(city) = user.city {
        max_len("city", city, MAX_PROFILE_TEXT_LEN, &mut violations);
    }
    if let Some(chat_id) = user.tg_chat_id {
        max_len("tg_chat_id", chat_id, MAX_CHAT_ID_LEN, &mut violations);
    }

    ValidationErrors::check(violations)
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn required_text(field: &'static str, value: &str, max: usize, out: &mut Vec<Violation>) {
    if value.trim().is_empty() {
        out.push(Violation::Blank { field });
    }
    max_len(field, value, max, out);
}

fn max_len(field: &'static str, value: &str, max: usize, out: &mut Vec<Violation>) {
    if value.chars().count() > max {
        out.push(Violation::TooLong { field, max });
    }
}
