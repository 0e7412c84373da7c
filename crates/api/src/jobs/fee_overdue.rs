//! Daily promotion of unpaid fees past their due date.

use crate::services::FeeService;

use super::scheduler::{Job, JobFrequency};

pub struct FeeOverdueJob {
    fees: FeeService,
}

impl FeeOverdueJob {
    pub fn new(fees: FeeService) -> Self {
        Self { fees }
    }
}

#[async_trait::async_trait]
impl Job for FeeOverdueJob {
    fn name(&self) -> &'static str {
        "fee_overdue"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Daily
    }

    async fn execute(&self) -> Result<(), String> {
        self.fees
            .promote_overdue()
            .await
            .map(|_| ())
            .map_err(|e| format!("Failed to promote overdue fees: {}", e))
    }
}
