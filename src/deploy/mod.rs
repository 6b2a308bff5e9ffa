// ABOUTME: Deployment orchestration using the type state pattern.
// ABOUTME: Exports the orchestrator, state markers, health and log evaluation, and the deploy lock.

mod attempt;
mod clock;
mod deployment;
mod error;
mod guard;
mod health;
mod lock;
mod logs;
mod orchestrator;
mod state;
mod transitions;

pub use attempt::{DeployFailure, DeployReport, DeploymentAttempt, Phase};
pub use clock::{Clock, TokioClock};
pub use deployment::Deployment;
pub use error::{DeployError, DeployErrorKind};
pub use guard::Guard;
pub use health::{HealthProbe, HealthVerdict};
pub use lock::{DeployLock, LockInfo};
pub use logs::{LogErrorCounter, LogSample};
pub use orchestrator::{DeploySettings, Orchestrator, live_color};
pub use state::{
    Completed, Planned, PostSwitch, PreSwitch, Provisioned, Ready, Soaked, SmokeTested, Switched,
};
pub use transitions::{StepContext, TransitionResult};
