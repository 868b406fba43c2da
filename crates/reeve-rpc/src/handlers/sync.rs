//! Fleet facade: coalesced reconciliation.
//!
//! `Sync` hands one refresh task per target controller to the single-flight
//! runner. A controller whose refresh is already running absorbs the new
//! submission silently; `submitted` lists what was handed over, with no
//! distinction between "started" and "coalesced".

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use reeve_core::ControllerId;
use reeve_runtime::RuntimeError;

use crate::context::GatewayContext;
use crate::errors::RpcError;
use crate::method::Params;
use crate::registry::MethodRegistry;

/// Params for `Fleet(1).Sync`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncArgs {
    /// Controllers to reconcile; empty means the whole fleet.
    #[serde(default)]
    pub controllers: Vec<ControllerId>,
    /// Block until every active refresh has finished.
    #[serde(default)]
    pub wait: bool,
}
impl Params for SyncArgs {}

/// Result of `Fleet(1).Sync`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// Controllers whose refresh was submitted this call.
    pub submitted: Vec<ControllerId>,
}

/// Register the Fleet root.
pub fn register(registry: &MethodRegistry, ctx: &GatewayContext) {
    let fleet = Arc::clone(&ctx.fleet);
    let runner = Arc::clone(&ctx.runner);
    registry.register(
        "Fleet",
        1,
        "Sync",
        move |ctx: CancellationToken, args: SyncArgs| {
            let fleet = Arc::clone(&fleet);
            let runner = Arc::clone(&runner);
            async move {
                let targets = if args.controllers.is_empty() {
                    fleet.controller_ids()
                } else {
                    // Validate explicit targets up front so nothing is
                    // submitted for a half-valid request.
                    for id in &args.controllers {
                        if !fleet.has_controller(id) {
                            return Err(RpcError::from(RuntimeError::ControllerNotFound(
                                id.as_str().to_owned(),
                            )));
                        }
                    }
                    args.controllers
                };

                for id in &targets {
                    let fleet = Arc::clone(&fleet);
                    let key = id.as_str().to_owned();
                    let id = id.clone();
                    runner.run(key, async move {
                        if let Err(e) = fleet.refresh(&id) {
                            // Controller may have been removed since submission.
                            warn!(controller = %id, error = %e, "fleet refresh failed");
                        }
                    });
                }

                if args.wait {
                    tokio::select! {
                        () = runner.wait() => {}
                        () = ctx.cancelled() => return Err(RpcError::Cancelled),
                    }
                }

                Ok(SyncResult { submitted: targets })
            }
        },
    );
}
