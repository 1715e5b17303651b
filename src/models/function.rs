use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A stored program the platform can execute on request.
///
/// Owned by the function store, not by the execution core. The core only
/// ever sees a `FunctionRecord` handed to it by `/functions/execute/{name}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    pub language: String,
    pub code: String,
    pub timeout: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FunctionCreate {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    pub language: String,
    #[validate(length(min = 1, max = 100_000))]
    pub code: String,
    #[validate(range(min = 1, max = 300))]
    pub timeout: u32,
}

impl FunctionRecord {
    pub fn new(req: FunctionCreate) -> Self {
        let now = Utc::now();
        Self {
            name: req.name,
            language: req.language,
            code: req.code,
            timeout: req.timeout,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, req: FunctionCreate) {
        self.language = req.language;
        self.code = req.code;
        self.timeout = req.timeout;
        self.updated_at = Utc::now();
    }
}
