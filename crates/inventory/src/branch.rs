//! Branch (pharmacy location) directory entries.

use core::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use pharmacy_core::{BranchId, DomainError, DomainResult, Entity};

const MAX_CODE_LEN: usize = 50;
const MAX_NAME_LEN: usize = 200;
const MAX_ADDRESS_LEN: usize = 300;
const MAX_CITY_LEN: usize = 100;
const MAX_PHONE_LEN: usize = 20;
const MAX_EMAIL_LEN: usize = 100;
const MAX_MANAGER_LEN: usize = 150;

/// Operating status of a branch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BranchStatus {
    Active,
    Inactive,
    Maintenance,
    Closed,
}

impl BranchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchStatus::Active => "ACTIVE",
            BranchStatus::Inactive => "INACTIVE",
            BranchStatus::Maintenance => "MAINTENANCE",
            BranchStatus::Closed => "CLOSED",
        }
    }
}

impl FromStr for BranchStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(BranchStatus::Active),
            "INACTIVE" => Ok(BranchStatus::Inactive),
            "MAINTENANCE" => Ok(BranchStatus::Maintenance),
            "CLOSED" => Ok(BranchStatus::Closed),
            other => Err(DomainError::invalid_argument(format!(
                "unknown branch status '{other}' (expected ACTIVE, INACTIVE, MAINTENANCE or CLOSED)"
            ))),
        }
    }
}

/// Mutable attributes of a branch (everything except identity and creation time).
///
/// Used both for creation and for full-replace updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchDetails {
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub manager_name: Option<String>,
    pub status: BranchStatus,
    pub opening_time: Option<NaiveTime>,
    pub closing_time: Option<NaiveTime>,
}

impl BranchDetails {
    /// Minimal details (code, name, status); optional fields empty.
    pub fn new(code: impl Into<String>, name: impl Into<String>, status: BranchStatus) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            address: None,
            city: None,
            province: None,
            phone: None,
            email: None,
            manager_name: None,
            status,
            opening_time: None,
            closing_time: None,
        }
    }

    /// Trim the code and name; callers validate afterwards.
    pub fn normalized(mut self) -> Self {
        self.code = self.code.trim().to_string();
        self.name = self.name.trim().to_string();
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.code.trim().is_empty() {
            return Err(DomainError::invalid_argument("branch code cannot be empty"));
        }
        check_len("code", &self.code, MAX_CODE_LEN)?;

        if self.name.trim().is_empty() {
            return Err(DomainError::invalid_argument("branch name cannot be empty"));
        }
        check_len("name", &self.name, MAX_NAME_LEN)?;

        check_opt_len("address", self.address.as_deref(), MAX_ADDRESS_LEN)?;
        check_opt_len("city", self.city.as_deref(), MAX_CITY_LEN)?;
        check_opt_len("province", self.province.as_deref(), MAX_CITY_LEN)?;
        check_opt_len("manager_name", self.manager_name.as_deref(), MAX_MANAGER_LEN)?;

        if let Some(phone) = self.phone.as_deref() {
            check_len("phone", phone, MAX_PHONE_LEN)?;
            let valid = phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' '));
            if !valid {
                return Err(DomainError::invalid_argument("invalid phone format"));
            }
        }

        if let Some(email) = self.email.as_deref() {
            check_len("email", email, MAX_EMAIL_LEN)?;
            if !looks_like_email(email) {
                return Err(DomainError::invalid_argument("invalid email"));
            }
        }

        Ok(())
    }
}

/// A branch as stored in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub details: BranchDetails,
    pub created_at: DateTime<Utc>,
}

impl Branch {
    pub fn code(&self) -> &str {
        &self.details.code
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn status(&self) -> BranchStatus {
        self.details.status
    }
}

impl Entity for Branch {
    type Id = BranchId;

    fn id(&self) -> BranchId {
        self.id
    }
}

fn check_len(field: &str, value: &str, max: usize) -> DomainResult<()> {
    if value.chars().count() > max {
        return Err(DomainError::invalid_argument(format!(
            "{field} cannot exceed {max} characters"
        )));
    }
    Ok(())
}

fn check_opt_len(field: &str, value: Option<&str>, max: usize) -> DomainResult<()> {
    match value {
        Some(v) => check_len(field, v, max),
        None => Ok(()),
    }
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        && !email.chars().any(char::is_whitespace)
}
