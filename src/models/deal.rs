use serde::{Deserialize, Serialize};

/// Deal model
///
/// A sales opportunity. Always assigned to exactly one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub stage_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// Payload for creating a deal (`POST /deals`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealDraft {
    pub stage_id: i64,
    pub name: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl DealDraft {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Deal name cannot be empty".to_string());
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(format!("Invalid deal amount: {}. Amount must be zero or more.", self.amount));
        }
        Ok(())
    }
}

/// Body of the move request (`PUT /deals/{id}/stage`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealMove {
    pub new_stage_id: i64,
}

/// One recorded stage assignment of a deal (local store only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageChange {
    pub deal_id: i64,
    /// `None` for the assignment made when the deal was created
    pub from_stage_id: Option<i64>,
    pub to_stage_id: i64,
    pub changed_ts: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deal_draft_validation() {
        let draft = DealDraft {
            stage_id: 1,
            name: "Acme renewal".to_string(),
            amount: 5000.0,
            owner: Some("sam".to_string()),
        };
        assert!(draft.validate().is_ok());

        let empty = DealDraft { name: " ".to_string(), ..draft.clone() };
        assert!(empty.validate().is_err());

        let negative = DealDraft { amount: -1.0, ..draft.clone() };
        assert!(negative.validate().is_err());

        let nan = DealDraft { amount: f64::NAN, ..draft };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_deal_move_wire_format() {
        let body = serde_json::to_string(&DealMove { new_stage_id: 7 }).unwrap();
        assert_eq!(body, r#"{"newStageId":7}"#);
    }

    #[test]
    fn test_deal_owner_optional() {
        let deal: Deal = serde_json::from_str(r#"{"id":1,"name":"D1","amount":5000,"stageId":2}"#).unwrap();
        assert_eq!(deal.owner, None);
        assert_eq!(deal.amount, 5000.0);
    }
}
