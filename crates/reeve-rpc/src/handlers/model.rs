//! Model facade: object-id-addressed model lookups.
//!
//! `Info` and `Status` address a model by object identifier rather than by
//! params, matching how clients pin a request to one entity within a root.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use chrono::{DateTime, Utc};
use reeve_core::{ControllerId, ModelId};
use reeve_runtime::RuntimeError;
use reeve_runtime::fleet::{ControllerStatus, Fleet, ModelInfo, ModelLife};

use crate::context::GatewayContext;
use crate::errors::RpcError;
use crate::method::Params;
use crate::registry::MethodRegistry;

/// Params for `Model(1).Create`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateModelArgs {
    /// Hosting controller.
    pub controller: ControllerId,
    /// Model name.
    pub name: String,
    /// Owning user.
    pub owner: String,
}
impl Params for CreateModelArgs {}

/// Result of `Model(1).Create`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateModelResult {
    /// Assigned model ID.
    pub id: ModelId,
}

/// Result of `Model(1).List`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelList {
    /// All known models, sorted by owner then name.
    pub models: Vec<ModelInfo>,
}

/// Result of `Model(1).Status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    /// Model lifecycle state.
    pub life: ModelLife,
    /// Hosting controller.
    pub controller: ControllerId,
    /// Hosting controller's state.
    pub controller_status: ControllerStatus,
    /// When the hosting controller last reconciled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refreshed: Option<DateTime<Utc>>,
}

fn lookup_model(fleet: &Fleet, id: &str) -> Result<ModelInfo, RpcError> {
    fleet
        .model(&ModelId::from(id))
        .ok_or_else(|| RpcError::from(RuntimeError::ModelNotFound(id.to_owned())))
}

/// Register the Model root.
pub fn register(registry: &MethodRegistry, ctx: &GatewayContext) {
    let fleet = Arc::clone(&ctx.fleet);
    registry.register("Model", 1, "List", move || {
        let fleet = Arc::clone(&fleet);
        async move {
            ModelList {
                models: fleet.models(),
            }
        }
    });

    let fleet = Arc::clone(&ctx.fleet);
    registry.register("Model", 1, "Create", move |args: CreateModelArgs| {
        let fleet = Arc::clone(&fleet);
        async move {
            let id = fleet.add_model(&args.controller, &args.name, &args.owner)?;
            Ok::<_, RpcError>(CreateModelResult { id })
        }
    });

    let fleet = Arc::clone(&ctx.fleet);
    registry.register("Model", 1, "Info", move |id: String| {
        let fleet = Arc::clone(&fleet);
        async move { lookup_model(&fleet, &id) }
    });

    let fleet = Arc::clone(&ctx.fleet);
    registry.register("Model", 1, "Status", move |id: String| {
        let fleet = Arc::clone(&fleet);
        async move {
            let model = lookup_model(&fleet, &id)?;
            let controller = fleet.controller(&model.controller).ok_or_else(|| {
                RpcError::from(RuntimeError::ControllerNotFound(
                    model.controller.as_str().to_owned(),
                ))
            })?;
            Ok::<_, RpcError>(ModelStatus {
                life: model.life,
                controller: controller.id,
                controller_status: controller.status,
                last_refreshed: controller.last_refreshed,
            })
        }
    });
}

#[cfg(test)]
mod tests {
    use crate::errors;
    use crate::handlers::test_helpers::{dispatch, dispatch_on, make_root_with_context};
    use serde_json::json;

    #[tokio::test]
    async fn create_and_list_models() {
        let (root, ctx) = make_root_with_context();
        let ctl = ctx.fleet.add_controller("east", "e:1").unwrap();

        let resp = dispatch(
            &root,
            "Model",
            1,
            "Create",
            Some(json!({"controller": ctl.as_str(), "name": "prod", "owner": "admin"})),
        )
        .await;
        assert!(resp.success);

        let resp = dispatch(&root, "Model", 1, "List", None).await;
        let models = resp.result.unwrap();
        assert_eq!(models["models"].as_array().unwrap().len(), 1);
        assert_eq!(models["models"][0]["name"], "prod");
        assert_eq!(models["models"][0]["life"], "alive");
    }

    #[tokio::test]
    async fn info_addresses_model_by_object_id() {
        let (root, ctx) = make_root_with_context();
        let ctl = ctx.fleet.add_controller("east", "e:1").unwrap();
        let model = ctx.fleet.add_model(&ctl, "prod", "admin").unwrap();

        let resp = dispatch_on(&root, "Model", 1, "Info", model.as_str(), None).await;
        assert!(resp.success);
        let result = resp.result.unwrap();
        assert_eq!(result["name"], "prod");
        assert_eq!(result["owner"], "admin");
    }

    #[tokio::test]
    async fn info_unknown_model_not_found() {
        let (root, _ctx) = make_root_with_context();
        let resp = dispatch_on(&root, "Model", 1, "Info", "m-missing", None).await;
        assert!(!resp.success);
        let err = resp.error.unwrap();
        assert_eq!(err.code, errors::MODEL_NOT_FOUND);
        assert_eq!(err.message, "model \"m-missing\" not found");
    }

    #[tokio::test]
    async fn status_reflects_controller_refresh() {
        let (root, ctx) = make_root_with_context();
        let ctl = ctx.fleet.add_controller("east", "e:1").unwrap();
        let model = ctx.fleet.add_model(&ctl, "prod", "admin").unwrap();

        let resp = dispatch_on(&root, "Model", 1, "Status", model.as_str(), None).await;
        let result = resp.result.unwrap();
        assert_eq!(result["controllerStatus"], "pending");
        assert!(result.get("lastRefreshed").is_none());

        ctx.fleet.refresh(&ctl).unwrap();
        let resp = dispatch_on(&root, "Model", 1, "Status", model.as_str(), None).await;
        let result = resp.result.unwrap();
        assert_eq!(result["controllerStatus"], "available");
        assert!(result.get("lastRefreshed").is_some());
    }

    #[tokio::test]
    async fn object_id_on_list_is_rejected() {
        let (root, _ctx) = make_root_with_context();
        let resp = dispatch_on(&root, "Model", 1, "List", "m-1", None).await;
        assert!(!resp.success);
        assert_eq!(resp.error.unwrap().code, errors::BAD_OBJECT_ID);
    }

    #[tokio::test]
    async fn create_on_unknown_controller_fails() {
        let (root, _ctx) = make_root_with_context();
        let resp = dispatch(
            &root,
            "Model",
            1,
            "Create",
            Some(json!({"controller": "nope", "name": "m", "owner": "admin"})),
        )
        .await;
        assert!(!resp.success);
        assert_eq!(resp.error.unwrap().code, errors::CONTROLLER_NOT_FOUND);
    }
}
