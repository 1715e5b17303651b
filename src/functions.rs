use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::error::{PlatformError, PlatformResult};
use crate::models::{FunctionCreate, FunctionRecord};

/// In-process store of registered functions, keyed by name. Stands in
/// for the original's SQL table (`backend/database.py`'s `Function`
/// model), same identity rules (name is the primary key, unique),
/// traded for an async `RwLock<HashMap>` since this platform has no
/// database layer.
pub struct FunctionStore {
    functions: RwLock<HashMap<String, FunctionRecord>>,
}

impl FunctionStore {
    pub fn new() -> Self {
        Self {
            functions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self, req: FunctionCreate) -> PlatformResult<FunctionRecord> {
        let mut functions = self.functions.write().await;
        if functions.contains_key(&req.name) {
            return Err(PlatformError::NameInUse(req.name));
        }
        let record = FunctionRecord::new(req);
        functions.insert(record.name.clone(), record.clone());
        Ok(record)
    }

    pub async fn get(&self, name: &str) -> PlatformResult<FunctionRecord> {
        self.functions
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(name.to_string()))
    }

    pub async fn list(&self) -> Vec<FunctionRecord> {
        let mut all: Vec<FunctionRecord> = self.functions.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub async fn update(&self, name: &str, req: FunctionCreate) -> PlatformResult<FunctionRecord> {
        let mut functions = self.functions.write().await;
        let record = functions
            .get_mut(name)
            .ok_or_else(|| PlatformError::NotFound(name.to_string()))?;
        record.apply_update(req);
        Ok(record.clone())
    }

    pub async fn delete(&self, name: &str) -> PlatformResult<()> {
        let mut functions = self.functions.write().await;
        functions
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| PlatformError::NotFound(name.to_string()))
    }

    pub async fn exists(&self, name: &str) -> bool {
        self.functions.read().await.contains_key(name)
    }
}

impl Default for FunctionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> FunctionCreate {
        FunctionCreate {
            name: name.to_string(),
            language: "python".to_string(),
            code: "print('hi')".to_string(),
            timeout: 30,
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_name() {
        let store = FunctionStore::new();
        store.create(sample("f1")).await.unwrap();
        let err = store.create(sample("f1")).await.unwrap_err();
        assert!(matches!(err, PlatformError::NameInUse(_)));
    }

    #[tokio::test]
    async fn get_unknown_function_returns_not_found() {
        let store = FunctionStore::new();
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, PlatformError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_replaces_fields_and_bumps_timestamp() {
        let store = FunctionStore::new();
        let created = store.create(sample("f1")).await.unwrap();
        let updated = store
            .update(
                "f1",
                FunctionCreate {
                    name: "f1".to_string(),
                    language: "javascript".to_string(),
                    code: "console.log(1)".to_string(),
                    timeout: 10,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.language, "javascript");
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let store = FunctionStore::new();
        store.create(sample("f1")).await.unwrap();
        store.delete("f1").await.unwrap();
        assert!(store.get("f1").await.is_err());
    }
}
