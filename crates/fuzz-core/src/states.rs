//! Lifecycle state enums for the fleet entities.
//!
//! Each state enum implements [`FleetState`]: its symbolic name (identical
//! to the serde wire form), whether the state still has orchestration work
//! pending, and whether it belongs to the stopping category. The stopping
//! category is re-queued with a longer visibility delay so in-flight work
//! can settle before the update is picked up.

use serde::{Deserialize, Serialize};

/// Classification shared by all entity lifecycle states.
pub trait FleetState: Copy + Eq {
    /// Symbolic name, identical to the serialized form.
    fn name(&self) -> &'static str;

    /// True while the orchestrator still has work to do for this state.
    fn needs_work(&self) -> bool;

    /// True for shutdown-type transitions.
    fn is_stopping(&self) -> bool;
}

// ── Pool ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    Init,
    Running,
    Shutdown,
    Halt,
}

impl FleetState for PoolState {
    fn name(&self) -> &'static str {
        match self {
            PoolState::Init => "init",
            PoolState::Running => "running",
            PoolState::Shutdown => "shutdown",
            PoolState::Halt => "halt",
        }
    }

    fn needs_work(&self) -> bool {
        matches!(self, PoolState::Init | PoolState::Shutdown | PoolState::Halt)
    }

    fn is_stopping(&self) -> bool {
        matches!(self, PoolState::Shutdown | PoolState::Halt)
    }
}

// ── Scaleset ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalesetState {
    Init,
    Setup,
    Resize,
    Running,
    Shutdown,
    Halt,
    CreationFailed,
}

impl ScalesetState {
    /// States in which a scaleset can accept resize requests.
    pub fn available(&self) -> bool {
        matches!(self, ScalesetState::Running | ScalesetState::Resize)
    }
}

impl FleetState for ScalesetState {
    fn name(&self) -> &'static str {
        match self {
            ScalesetState::Init => "init",
            ScalesetState::Setup => "setup",
            ScalesetState::Resize => "resize",
            ScalesetState::Running => "running",
            ScalesetState::Shutdown => "shutdown",
            ScalesetState::Halt => "halt",
            ScalesetState::CreationFailed => "creation_failed",
        }
    }

    fn needs_work(&self) -> bool {
        matches!(
            self,
            ScalesetState::Init
                | ScalesetState::Setup
                | ScalesetState::Resize
                | ScalesetState::Shutdown
                | ScalesetState::Halt
        )
    }

    fn is_stopping(&self) -> bool {
        matches!(self, ScalesetState::Shutdown | ScalesetState::Halt)
    }
}

// ── Node ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Init,
    Free,
    SettingUp,
    Rebooting,
    Ready,
    Busy,
    Done,
    Shutdown,
    Halt,
}

impl FleetState for NodeState {
    fn name(&self) -> &'static str {
        match self {
            NodeState::Init => "init",
            NodeState::Free => "free",
            NodeState::SettingUp => "setting_up",
            NodeState::Rebooting => "rebooting",
            NodeState::Ready => "ready",
            NodeState::Busy => "busy",
            NodeState::Done => "done",
            NodeState::Shutdown => "shutdown",
            NodeState::Halt => "halt",
        }
    }

    fn needs_work(&self) -> bool {
        matches!(self, NodeState::Done | NodeState::Shutdown | NodeState::Halt)
    }

    fn is_stopping(&self) -> bool {
        matches!(self, NodeState::Shutdown | NodeState::Halt)
    }
}

// ── Task ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Init,
    Waiting,
    Scheduled,
    SettingUp,
    Running,
    Stopping,
    Stopped,
    WaitJobFinished,
}

impl TaskState {
    /// States counted against a pool's requested capacity.
    pub fn consumes_nodes(&self) -> bool {
        !matches!(self, TaskState::Stopping | TaskState::Stopped)
    }
}

impl FleetState for TaskState {
    fn name(&self) -> &'static str {
        match self {
            TaskState::Init => "init",
            TaskState::Waiting => "waiting",
            TaskState::Scheduled => "scheduled",
            TaskState::SettingUp => "setting_up",
            TaskState::Running => "running",
            TaskState::Stopping => "stopping",
            TaskState::Stopped => "stopped",
            TaskState::WaitJobFinished => "wait_job_finished",
        }
    }

    fn needs_work(&self) -> bool {
        matches!(self, TaskState::Init | TaskState::Stopping)
    }

    fn is_stopping(&self) -> bool {
        matches!(self, TaskState::Stopping)
    }
}

// ── Job ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Init,
    Enabled,
    Stopping,
    Stopped,
}

impl FleetState for JobState {
    fn name(&self) -> &'static str {
        match self {
            JobState::Init => "init",
            JobState::Enabled => "enabled",
            JobState::Stopping => "stopping",
            JobState::Stopped => "stopped",
        }
    }

    fn needs_work(&self) -> bool {
        matches!(self, JobState::Init | JobState::Stopping)
    }

    fn is_stopping(&self) -> bool {
        matches!(self, JobState::Stopping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbolic_names_match_wire_form() {
        // The resolver and the query compiler both rely on name() being the
        // exact serialized representation.
        for state in [
            NodeState::Init,
            NodeState::SettingUp,
            NodeState::Busy,
            NodeState::Halt,
        ] {
            let wire = serde_json::to_value(state).unwrap();
            assert_eq!(wire, serde_json::Value::String(state.name().to_string()));
        }
        let wire = serde_json::to_value(TaskState::WaitJobFinished).unwrap();
        assert_eq!(wire, "wait_job_finished");
    }

    #[test]
    fn settled_states_need_no_work() {
        assert!(!PoolState::Running.needs_work());
        assert!(!ScalesetState::Running.needs_work());
        assert!(!ScalesetState::CreationFailed.needs_work());
        assert!(!NodeState::Busy.needs_work());
        assert!(!TaskState::Stopped.needs_work());
        assert!(!JobState::Enabled.needs_work());
    }

    #[test]
    fn pending_states_need_work() {
        assert!(PoolState::Init.needs_work());
        assert!(ScalesetState::Resize.needs_work());
        assert!(NodeState::Done.needs_work());
        assert!(TaskState::Stopping.needs_work());
        assert!(JobState::Init.needs_work());
    }

    #[test]
    fn stopping_category_is_a_subset_of_pending() {
        for state in [PoolState::Init, PoolState::Running] {
            assert!(!state.is_stopping());
        }
        assert!(PoolState::Halt.is_stopping() && PoolState::Halt.needs_work());
        assert!(ScalesetState::Shutdown.is_stopping());
        assert!(TaskState::Stopping.is_stopping());
        assert!(!TaskState::Init.is_stopping());
    }
}
