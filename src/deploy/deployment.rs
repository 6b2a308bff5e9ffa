// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: Owns the attempt record and warnings as it moves through the states.

use crate::cluster::{Environment, InstanceRef};
use crate::diagnostics::Diagnostics;
use crate::types::{AppName, Color};

use super::attempt::DeploymentAttempt;
use super::logs::LogSample;
use super::state::{Planned, Soaked, SmokeTested};

/// A deployment in progress, parameterized by its current state.
///
/// The state type parameter `S` carries state-specific data (the smoke-tested
/// instance, the soak sample) so later steps can only read what earlier steps
/// actually produced.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) app: AppName,
    pub(crate) target: Environment,
    pub(crate) attempt: DeploymentAttempt,
    pub(crate) diag: Diagnostics,
    pub(crate) state: S,
}

impl Deployment<Planned> {
    pub fn new(attempt: DeploymentAttempt, target: Environment, diag: Diagnostics) -> Self {
        Deployment {
            app: attempt.app.clone(),
            target,
            attempt,
            diag,
            state: Planned,
        }
    }
}

impl<S> Deployment<S> {
    pub fn app(&self) -> &AppName {
        &self.app
    }

    pub fn attempt(&self) -> &DeploymentAttempt {
        &self.attempt
    }

    /// The environment being rolled out.
    pub fn target(&self) -> &Environment {
        &self.target
    }

    pub fn start_color(&self) -> Color {
        self.attempt.start_color
    }

    pub fn target_color(&self) -> Color {
        self.target.color
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }
}

impl Deployment<SmokeTested> {
    pub fn instance(&self) -> &InstanceRef {
        &self.state.instance
    }
}

impl Deployment<Soaked> {
    pub fn sample(&self) -> &LogSample {
        &self.state.sample
    }
}
