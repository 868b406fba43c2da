//! Controller facade: fleet membership.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use reeve_core::ControllerId;
use reeve_runtime::RuntimeError;
use reeve_runtime::fleet::ControllerInfo;

use crate::context::GatewayContext;
use crate::errors::RpcError;
use crate::method::Params;
use crate::registry::MethodRegistry;

/// Params for `Controller(1).Add`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddControllerArgs {
    /// Unique controller name.
    pub name: String,
    /// Dial address, `host:port`.
    pub address: String,
}
impl Params for AddControllerArgs {}

/// Result of `Controller(1).Add`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddControllerResult {
    /// Assigned controller ID.
    pub id: ControllerId,
}

/// Params for `Controller(1).Get` and `Controller(1).Remove`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerRefArgs {
    /// Controller to address.
    pub id: ControllerId,
}
impl Params for ControllerRefArgs {}

/// Result of `Controller(1).List`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerList {
    /// All registered controllers, sorted by name.
    pub controllers: Vec<ControllerInfo>,
}

/// Register the Controller root.
pub fn register(registry: &MethodRegistry, ctx: &GatewayContext) {
    let fleet = Arc::clone(&ctx.fleet);
    registry.register("Controller", 1, "List", move || {
        let fleet = Arc::clone(&fleet);
        async move {
            ControllerList {
                controllers: fleet.controllers(),
            }
        }
    });

    let fleet = Arc::clone(&ctx.fleet);
    registry.register("Controller", 1, "Get", move |args: ControllerRefArgs| {
        let fleet = Arc::clone(&fleet);
        async move {
            fleet.controller(&args.id).ok_or_else(|| {
                RpcError::from(RuntimeError::ControllerNotFound(
                    args.id.as_str().to_owned(),
                ))
            })
        }
    });

    let fleet = Arc::clone(&ctx.fleet);
    registry.register("Controller", 1, "Add", move |args: AddControllerArgs| {
        let fleet = Arc::clone(&fleet);
        async move {
            let id = fleet.add_controller(&args.name, &args.address)?;
            Ok::<_, RpcError>(AddControllerResult { id })
        }
    });

    let fleet = Arc::clone(&ctx.fleet);
    registry.register("Controller", 1, "Remove", move |args: ControllerRefArgs| {
        let fleet = Arc::clone(&fleet);
        async move {
            fleet.remove_controller(&args.id)?;
            Ok::<(), RpcError>(())
        }
    });
}
