// ABOUTME: Deployment state marker types for the type state pattern.
// ABOUTME: Markers decide which transitions exist and carry data earned by earlier steps.

use crate::cluster::InstanceRef;

use super::logs::LogSample;

/// Colors decided, target environment built. Available: `provision()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Planned;

/// Target workload applied. Available: `await_readiness()`, `abandon()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Provisioned;

/// Every target replica ready. Available: `smoke_test()`, `abandon()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Ready;

/// One target instance reported healthy. Available: `switch_traffic()`
#[derive(Debug, Clone)]
pub struct SmokeTested {
    pub(crate) instance: InstanceRef,
}

/// Selector points at the target. Available: `soak()`, `roll_back()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Switched;

/// Soak window observed. Available: `finalize()`, `roll_back()`
#[derive(Debug, Clone)]
pub struct Soaked {
    pub(crate) sample: LogSample,
}

/// Old color removed. Available: `finish()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Completed;

/// States before traffic moves. Failing here deletes the target and leaves
/// the selector alone.
pub trait PreSwitch {}

impl PreSwitch for Planned {}
impl PreSwitch for Provisioned {}
impl PreSwitch for Ready {}

/// States after traffic moved. Failing here reverts the selector.
pub trait PostSwitch {}

impl PostSwitch for Switched {}
impl PostSwitch for Soaked {}
