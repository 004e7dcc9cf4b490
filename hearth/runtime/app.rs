use std::sync::Arc;

use anyhow::{Context, Result};
use hearth_access::{PolicyStore, SessionStore};
use hearth_backend::{
    DualBackend, ExecutionBackend, HearthTelemetry, LocalBackend, RemoteBackend,
};
use serde_json::json;
use shared_event_bus::{EventPublisher, FileEventPublisher};
use shared_logging::LogLevel;

use crate::{
    activity::ActivityLog, config::HearthConfig, family::FamilyManager,
    pipeline::CommandPipeline,
};

/// Fully wired hearth runtime: backends, policy store, pipeline and family
/// manager sharing one telemetry handle.
pub struct Hearth {
    config: HearthConfig,
    telemetry: HearthTelemetry,
    backend: Arc<DualBackend>,
    pipeline: CommandPipeline,
    family: FamilyManager,
}

impl std::fmt::Debug for Hearth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hearth")
            .field("backend", &self.backend)
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}

impl Hearth {
    /// Builds the runtime described by `config`.
    pub async fn start(config: HearthConfig) -> Result<Self> {
        let remote = match config.remote.adapter_config() {
            Some(remote) => {
                let adapter = RemoteBackend::new(&remote).context("configuring remote backend")?;
                Some(Arc::new(adapter) as Arc<dyn ExecutionBackend>)
            }
            None => None,
        };
        let local = match &config.local.snapshot_path {
            Some(path) => LocalBackend::open(path)
                .await
                .context("opening local backend")?,
            None => LocalBackend::new(),
        };
        Self::with_backends(config, remote, local).await
    }

    /// Builds the runtime around explicit adapters.
    pub async fn with_backends(
        config: HearthConfig,
        remote: Option<Arc<dyn ExecutionBackend>>,
        local: LocalBackend,
    ) -> Result<Self> {
        let telemetry = build_telemetry(&config)?;
        if let Some(seed) = &config.local.seed_admin {
            if let Some(admin) = local
                .ensure_admin(seed.to_new_member())
                .await
                .context("seeding local administrator")?
            {
                telemetry.log(
                    LogLevel::Info,
                    "runtime.admin.seeded",
                    json!({ "member": admin.id }),
                )?;
            }
        }

        let backend = Arc::new(
            DualBackend::new(remote, Arc::new(local))
                .with_telemetry(telemetry.scoped("backend")),
        );
        let policies = Arc::new(PolicyStore::new());
        let activity = match &config.activity.path {
            Some(path) => ActivityLog::open(path)?,
            None => ActivityLog::new(),
        }
        .with_telemetry(telemetry.scoped("activity"));
        let pipeline = CommandPipeline::builder()
            .backend(Arc::clone(&backend) as Arc<dyn ExecutionBackend>)
            .policies(Arc::clone(&policies))
            .activity(activity)
            .telemetry(telemetry.scoped("pipeline"))
            .build();
        let family = FamilyManager::new(
            Arc::clone(&backend) as Arc<dyn ExecutionBackend>,
            policies,
            Arc::new(SessionStore::new(&config.session.path)),
        )
        .with_telemetry(telemetry.scoped("family"));
        family
            .restore_session()
            .await
            .context("restoring admin session")?;

        telemetry.log(
            LogLevel::Info,
            "runtime.started",
            json!({ "remote": backend.has_remote() }),
        )?;
        Ok(Self {
            config,
            telemetry,
            backend,
            pipeline,
            family,
        })
    }

    /// Effective configuration.
    #[must_use]
    pub const fn config(&self) -> &HearthConfig {
        &self.config
    }

    /// Command pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &CommandPipeline {
        &self.pipeline
    }

    /// Family manager.
    #[must_use]
    pub const fn family(&self) -> &FamilyManager {
        &self.family
    }

    /// The dual-mode backend.
    #[must_use]
    pub fn backend(&self) -> Arc<DualBackend> {
        Arc::clone(&self.backend)
    }

    /// Activity history.
    #[must_use]
    pub fn activity(&self) -> ActivityLog {
        self.pipeline.activity()
    }

    /// Root telemetry handle.
    #[must_use]
    pub const fn telemetry(&self) -> &HearthTelemetry {
        &self.telemetry
    }
}

fn build_telemetry(config: &HearthConfig) -> Result<HearthTelemetry> {
    let mut builder = HearthTelemetry::builder("runtime").min_level(config.telemetry.min_level);
    if let Some(path) = &config.telemetry.log_path {
        builder = builder.log_path(path);
    }
    if let Some(path) = &config.telemetry.event_log_path {
        let publisher = FileEventPublisher::new(path)
            .with_context(|| format!("opening event log {}", path.display()))?;
        builder = builder.event_publisher(Arc::new(publisher) as Arc<dyn EventPublisher>);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeedAdmin;
    use tempfile::tempdir;

    #[tokio::test]
    async fn start_seeds_admin_and_writes_logs() {
        let dir = tempdir().unwrap();
        let mut config = HearthConfig::default();
        config.local.seed_admin = Some(SeedAdmin {
            name: "Root".into(),
            email: "root@home.test".into(),
            pin: "0000".into(),
        });
        config.local.snapshot_path = Some(dir.path().join("local.json"));
        config.telemetry.log_path = Some(dir.path().join("hearth.log"));
        config.session.path = dir.path().join("session.json");

        let hearth = Hearth::start(config.clone()).await.unwrap();
        let members = hearth.family().members().await.unwrap();
        assert_eq!(members.len(), 1);
        assert!(members[0].is_admin());
        assert!(!hearth.backend().has_remote());

        // A second start reuses the snapshot instead of seeding again.
        let again = Hearth::start(config).await.unwrap();
        assert_eq!(again.family().members().await.unwrap().len(), 1);

        let records = shared_logging::read_records(dir.path().join("hearth.log")).unwrap();
        assert!(records
            .iter()
            .any(|record| record.message == "runtime.admin.seeded"));
    }
}
