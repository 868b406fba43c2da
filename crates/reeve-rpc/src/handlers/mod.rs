//! Gateway handler modules and registration.

pub mod controller;
pub mod model;
pub mod sync;
pub mod system;

use crate::context::GatewayContext;
use crate::registry::MethodRegistry;

/// Register every gateway facade with the registry.
pub fn register_all(registry: &MethodRegistry, ctx: &GatewayContext) {
    system::register(registry, ctx);
    controller::register(registry, ctx);
    model::register(registry, ctx);
    sync::register(registry, ctx);
}
