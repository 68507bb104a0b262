//! General information singleton

use std::sync::Arc;

use super::{activity::ActivityLogger, Actor};
use crate::db::schemas::GeneralInfoDoc;
use crate::repository::GeneralInfoRepository;
use crate::types::{MarketError, Result};

#[derive(Clone)]
pub struct GeneralInfoService {
    info: Arc<dyn GeneralInfoRepository>,
    activity: ActivityLogger,
}

impl GeneralInfoService {
    pub fn new(info: Arc<dyn GeneralInfoRepository>, activity: ActivityLogger) -> Self {
        Self { info, activity }
    }

    pub async fn get(&self) -> Result<GeneralInfoDoc> {
        self.info
            .get()
            .await?
            .ok_or_else(|| MarketError::NotFound("General information not found".into()))
    }

    /// Replace the content, creating it on first use
    pub async fn update(&self, actor: &Actor, info: GeneralInfoDoc) -> Result<GeneralInfoDoc> {
        let created = self.info.upsert(info).await?;
        let action = if created {
            "Created general information"
        } else {
            "Updated general information"
        };
        self.activity.record(actor, action).await;
        self.get().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SubjectType;
    use crate::repository::memory::MemoryRepositories;
    use crate::repository::ActivityRepository;
    use bson::oid::ObjectId;

    #[tokio::test]
    async fn test_upsert_logs_create_then_update() {
        let memory = MemoryRepositories::new();
        let activity_repo = memory.activity.clone();
        let repos = memory.into_repositories();
        let logger = ActivityLogger::new(
            repos.activity.clone(),
            repos.accounts.clone(),
            repos.admins.active.clone(),
        );
        let service = GeneralInfoService::new(repos.general_info.clone(), logger);
        let actor = Actor {
            id: ObjectId::new(),
            kind: SubjectType::Admin,
        };

        assert!(matches!(service.get().await, Err(MarketError::NotFound(_))));

        let first = service
            .update(
                &actor,
                GeneralInfoDoc {
                    about: "Garment capital of the Philippines".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let second = service
            .update(
                &actor,
                GeneralInfoDoc {
                    jeepney: "Ride a Taytay-bound jeep from Cubao".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(first.oid, second.oid);
        assert_eq!(second.about, "");
        assert!(second.jeepney.contains("Cubao"));

        let actions: Vec<String> = activity_repo
            .list_recent()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec!["Updated general information", "Created general information"]
        );
    }
}
