use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
use crate::models::domain::{Direction, NewDeclaration, NewSwapRequest};

/// Request to find matches
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FindMatchesRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[validate(range(min = 1, max = 100))]
    #[serde(default)]
    pub limit: Option<u16>,
}

/// Request to declare a skill, creating the skill record if needed
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeclareSkillRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[validate(custom(function = "validate_skill_name"))]
    pub name: String,
    #[validate(custom(function = "validate_category"))]
    pub category: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub description: Option<String>,
    pub direction: Direction,
    #[validate(length(max = 50))]
    #[serde(default)]
    pub level: Option<String>,
}

/// Request to remove one skill declaration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RemoveSkillRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "skill_id", rename = "skillId")]
    pub skill_id: String,
    pub direction: Direction,
}

/// Request to propose a swap to a match
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_not_self"))]
pub struct CreateSwapRequestRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "requester_id", rename = "requesterId")]
    pub requester_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "receiver_id", rename = "receiverId")]
    pub receiver_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "offered_skill_id", rename = "offeredSkillId")]
    pub offered_skill_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "requested_skill_id", rename = "requestedSkillId")]
    pub requested_skill_id: String,
}

// Length rules apply to the trimmed value, matching the profile form.
fn trimmed_len_between(value: &str, min: usize, max: usize, code: &'static str) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(ValidationError::new(code));
    }
    Ok(())
}

fn validate_skill_name(name: &str) -> Result<(), ValidationError> {
    trimmed_len_between(name, 2, 100, "skill_name_length")
}

fn validate_category(category: &str) -> Result<(), ValidationError> {
    trimmed_len_between(category, 2, 50, "category_length")
}

impl From<DeclareSkillRequest> for NewDeclaration {
    fn from(req: DeclareSkillRequest) -> Self {
        NewDeclaration {
            user_id: req.user_id,
            name: req.name,
            category: req.category,
            description: req.description.filter(|d| !d.trim().is_empty()),
            direction: req.direction,
            level: req.level,
        }
    }
}

impl From<CreateSwapRequestRequest> for NewSwapRequest {
    fn from(req: CreateSwapRequestRequest) -> Self {
        NewSwapRequest {
            requester_id: req.requester_id,
            receiver_id: req.receiver_id,
            offered_skill_id: req.offered_skill_id,
            requested_skill_id: req.requested_skill_id,
        }
    }
}

fn validate_not_self(req: &CreateSwapRequestRequest) -> Result<(), ValidationError> {
    if req.requester_id == req.receiver_id {
        return Err(ValidationError::new("self_swap"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_matches_limit_bounds() {
        let req: FindMatchesRequest = serde_json::from_str(r#"{"userId":"u1","limit":0}"#).unwrap();
        assert!(req.validate().is_err());

        let req: FindMatchesRequest = serde_json::from_str(r#"{"user_id":"u1"}"#).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.limit, None);
    }

    #[test]
    fn test_skill_name_is_trimmed_before_length_check() {
        let req = DeclareSkillRequest {
            user_id: "u1".to_string(),
            name: "  a  ".to_string(),
            category: "Languages".to_string(),
            description: None,
            direction: Direction::Offer,
            level: None,
        };
        assert!(req.validate().is_err());

        let req = DeclareSkillRequest { name: " Go ".to_string(), ..req };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_self_swap_rejected() {
        let req = CreateSwapRequestRequest {
            requester_id: "u1".to_string(),
            receiver_id: "u1".to_string(),
            offered_skill_id: "s1".to_string(),
            requested_skill_id: "s2".to_string(),
        };
        assert!(req.validate().is_err());
    }
}
