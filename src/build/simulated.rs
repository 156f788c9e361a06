//! Deterministic, network-free build backend
//!
//! A build's status is a pure function of its id plus the number of explicit
//! advances it has received: the id hash picks the starting stage among
//! QUEUED, WORKING and terminal, and each advance moves one stage forward.
//! The terminal status defaults to SUCCESS and can be scripted per build.

use super::backend::BuildBackend;
use super::types::{BuildError, BuildStatus};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::info;

const STAGES: u32 = 3;

/// Terminal outcome and log text for a future simulated build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedBuild {
    pub outcome: BuildStatus,
    pub logs: Option<String>,
}

impl ScriptedBuild {
    pub fn success() -> Self {
        Self {
            outcome: BuildStatus::Success,
            logs: None,
        }
    }

    pub fn failure(logs: impl Into<String>) -> Self {
        Self {
            outcome: BuildStatus::Failure,
            logs: Some(logs.into()),
        }
    }
}

#[derive(Debug, Default)]
struct SimulatedBuild {
    advances: u32,
    script: Option<ScriptedBuild>,
}

#[derive(Debug, Default)]
pub struct SimulatedBuildBackend {
    builds: Mutex<HashMap<String, SimulatedBuild>>,
    scripted: Mutex<VecDeque<ScriptedBuild>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Starting stage (0 = queued, 1 = working, 2 = terminal) derived from the id
fn initial_stage(build_id: &str) -> u32 {
    let digest = Sha256::digest(build_id.as_bytes());
    u32::from(digest[0]) % STAGES
}

impl SimulatedBuildBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an outcome for the next submitted build. Builds submitted with
    /// an empty script queue succeed.
    pub fn script_next(&self, build: ScriptedBuild) {
        lock(&self.scripted).push_back(build);
    }

    pub fn script_many(&self, builds: impl IntoIterator<Item = ScriptedBuild>) {
        lock(&self.scripted).extend(builds);
    }

    fn stage(&self, build_id: &str) -> (u32, BuildStatus) {
        let builds = lock(&self.builds);
        let (advances, outcome) = builds
            .get(build_id)
            .map(|b| {
                (
                    b.advances,
                    b.script
                        .as_ref()
                        .map_or(BuildStatus::Success, |s| s.outcome),
                )
            })
            .unwrap_or((0, BuildStatus::Success));

        let stage = (initial_stage(build_id) + advances).min(STAGES - 1);
        (stage, outcome)
    }

    fn success_log(build_id: &str) -> String {
        format!(
            "=== Build Logs (Simulated) ===\n\
             Build ID: {id}\n\
             \n\
             Step 1/2: Building container image\n\
             \x20 FROM python:3.11-slim\n\
             \x20 RUN pip install -r requirements.txt\n\
             \x20 Image built successfully\n\
             \n\
             Step 2/2: Pushing to container registry\n\
             \x20 Image pushed\n\
             \n\
             Build completed successfully!\n",
            id = build_id
        )
    }
}

#[async_trait]
impl BuildBackend for SimulatedBuildBackend {
    async fn submit(&self, source_locator: &str, image_tag: &str) -> Result<String, BuildError> {
        let build_id = format!("sim-{}", uuid::Uuid::new_v4().simple());
        let script = lock(&self.scripted).pop_front();

        info!(
            build_id = %build_id,
            "[SIMULATE] Triggered build of {} as {}", source_locator, image_tag
        );

        lock(&self.builds).insert(
            build_id.clone(),
            SimulatedBuild {
                advances: 0,
                script,
            },
        );
        Ok(build_id)
    }

    async fn poll(&self, build_id: &str) -> Result<BuildStatus, BuildError> {
        let status = match self.stage(build_id) {
            (0, _) => BuildStatus::Queued,
            (1, _) => BuildStatus::Working,
            (_, outcome) => outcome,
        };
        Ok(status)
    }

    async fn fetch_logs(&self, build_id: &str) -> Result<String, BuildError> {
        let (stage, outcome) = self.stage(build_id);
        if stage < STAGES - 1 {
            return Ok(format!(
                "=== Build Logs (Simulated) ===\nBuild ID: {}\nBuild in progress\n",
                build_id
            ));
        }

        if outcome == BuildStatus::Success {
            return Ok(Self::success_log(build_id));
        }

        let scripted_logs = lock(&self.builds)
            .get(build_id)
            .and_then(|b| b.script.as_ref())
            .and_then(|s| s.logs.clone())
            .unwrap_or_default();

        Ok(format!(
            "=== Build Logs (Simulated) ===\nBuild ID: {}\nStatus: {}\n{}",
            build_id, outcome, scripted_logs
        ))
    }

    async fn advance(&self, build_id: &str) -> Result<(), BuildError> {
        lock(&self.builds)
            .entry(build_id.to_string())
            .or_default()
            .advances += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "simulated"
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
