//! Run DTOs

use serde::{Deserialize, Serialize};

use crate::domain::status::{ResultOutcome, RunId, RunLifecycleState, RunStatus};
use crate::transport::RunHandle;

/// Response of `jobs/runs/submit`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRunResponse {
    pub run_id: i64,
}

impl From<SubmitRunResponse> for RunHandle {
    fn from(resp: SubmitRunResponse) -> Self {
        RunHandle {
            run_id: RunId::from(resp.run_id),
        }
    }
}

/// `state` object of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStateDto {
    pub life_cycle_state: RunLifecycleState,
    #[serde(default)]
    pub result_state: Option<ResultOutcome>,
    #[serde(default)]
    pub state_message: Option<String>,
}

/// Response of `jobs/runs/get`
///
/// Only the fields used for lifecycle tracking are decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRunResponse {
    #[serde(default)]
    pub run_id: Option<i64>,
    pub state: RunStateDto,
    #[serde(default)]
    pub run_page_url: Option<String>,
}

impl From<GetRunResponse> for RunStatus {
    fn from(resp: GetRunResponse) -> Self {
        RunStatus {
            lifecycle_state: resp.state.life_cycle_state,
            result_state: resp.state.result_state,
            run_page_url: resp.run_page_url,
            state_message: resp.state.state_message.filter(|m| !m.is_empty()),
        }
    }
}
