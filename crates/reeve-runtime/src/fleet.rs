//! In-memory directory of backend controllers and their models.
//!
//! The fleet is the gateway's view of the world it brokers for. It is
//! deliberately ephemeral: controllers are registered at startup (from
//! config) or at runtime over RPC, and a restart starts from scratch.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use reeve_core::{ControllerId, ModelId};

use crate::errors::RuntimeError;

/// Lifecycle state of a registered controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerStatus {
    /// Registered but not yet reconciled.
    Pending,
    /// Reconciled at least once.
    Available,
}

/// A backend controller known to the gateway.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerInfo {
    /// Controller identifier.
    pub id: ControllerId,
    /// Unique human-chosen name.
    pub name: String,
    /// Dial address, `host:port`.
    pub address: String,
    /// Lifecycle state.
    pub status: ControllerStatus,
    /// When the last reconciliation pass finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// Lifecycle of a hosted model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelLife {
    /// Model is live.
    Alive,
    /// Teardown requested.
    Dying,
    /// Gone; kept only until the next refresh sweep.
    Dead,
}

/// A model hosted on some controller.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Model identifier.
    pub id: ModelId,
    /// Model name, unique per owner.
    pub name: String,
    /// Owning user.
    pub owner: String,
    /// Hosting controller.
    pub controller: ControllerId,
    /// Lifecycle state.
    pub life: ModelLife,
}

/// Thread-safe fleet directory.
#[derive(Default)]
pub struct Fleet {
    controllers: RwLock<HashMap<ControllerId, ControllerInfo>>,
    models: RwLock<HashMap<ModelId, ModelInfo>>,
}

impl Fleet {
    /// Create an empty fleet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller. Names must be unique across the fleet.
    pub fn add_controller(&self, name: &str, address: &str) -> Result<ControllerId, RuntimeError> {
        let mut controllers = self.controllers.write();
        if controllers.values().any(|c| c.name == name) {
            return Err(RuntimeError::ControllerExists(name.to_owned()));
        }
        let id = ControllerId::new();
        let _ = controllers.insert(
            id.clone(),
            ControllerInfo {
                id: id.clone(),
                name: name.to_owned(),
                address: address.to_owned(),
                status: ControllerStatus::Pending,
                last_refreshed: None,
            },
        );
        Ok(id)
    }

    /// Deregister a controller and every model it hosts.
    pub fn remove_controller(&self, id: &ControllerId) -> Result<(), RuntimeError> {
        let mut controllers = self.controllers.write();
        if controllers.remove(id).is_none() {
            return Err(RuntimeError::ControllerNotFound(id.as_str().to_owned()));
        }
        self.models.write().retain(|_, m| m.controller != *id);
        Ok(())
    }

    /// Look up one controller.
    pub fn controller(&self, id: &ControllerId) -> Option<ControllerInfo> {
        self.controllers.read().get(id).cloned()
    }

    /// Whether a controller is registered.
    pub fn has_controller(&self, id: &ControllerId) -> bool {
        self.controllers.read().contains_key(id)
    }

    /// All controllers, sorted by name.
    pub fn controllers(&self) -> Vec<ControllerInfo> {
        let mut all: Vec<ControllerInfo> = self.controllers.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// IDs of all registered controllers.
    pub fn controller_ids(&self) -> Vec<ControllerId> {
        self.controllers().into_iter().map(|c| c.id).collect()
    }

    /// Number of registered controllers.
    pub fn controller_count(&self) -> usize {
        self.controllers.read().len()
    }

    /// Record a completed reconciliation pass against a controller.
    pub fn refresh(&self, id: &ControllerId) -> Result<(), RuntimeError> {
        let mut controllers = self.controllers.write();
        let info = controllers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::ControllerNotFound(id.as_str().to_owned()))?;
        info.status = ControllerStatus::Available;
        info.last_refreshed = Some(Utc::now());
        Ok(())
    }

    /// Place a model on a controller.
    pub fn add_model(
        &self,
        controller: &ControllerId,
        name: &str,
        owner: &str,
    ) -> Result<ModelId, RuntimeError> {
        if !self.has_controller(controller) {
            return Err(RuntimeError::ControllerNotFound(
                controller.as_str().to_owned(),
            ));
        }
        let id = ModelId::new();
        let _ = self.models.write().insert(
            id.clone(),
            ModelInfo {
                id: id.clone(),
                name: name.to_owned(),
                owner: owner.to_owned(),
                controller: controller.clone(),
                life: ModelLife::Alive,
            },
        );
        Ok(id)
    }

    /// Look up one model.
    pub fn model(&self, id: &ModelId) -> Option<ModelInfo> {
        self.models.read().get(id).cloned()
    }

    /// All models, sorted by owner then name.
    pub fn models(&self) -> Vec<ModelInfo> {
        let mut all: Vec<ModelInfo> = self.models.read().values().cloned().collect();
        all.sort_by(|a, b| (&a.owner, &a.name).cmp(&(&b.owner, &b.name)));
        all
    }

    /// Models hosted on one controller.
    pub fn models_on(&self, controller: &ControllerId) -> Vec<ModelInfo> {
        self.models
            .read()
            .values()
            .filter(|m| m.controller == *controller)
            .cloned()
            .collect()
    }

    /// Number of known models.
    pub fn model_count(&self) -> usize {
        self.models.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fleet_with_controller() -> (Fleet, ControllerId) {
        let fleet = Fleet::new();
        let id = fleet.add_controller("east", "10.0.0.2:17070").unwrap();
        (fleet, id)
    }

    #[test]
    fn add_and_get_controller() {
        let (fleet, id) = fleet_with_controller();
        let info = fleet.controller(&id).unwrap();
        assert_eq!(info.name, "east");
        assert_eq!(info.address, "10.0.0.2:17070");
        assert_eq!(info.status, ControllerStatus::Pending);
        assert!(info.last_refreshed.is_none());
    }

    #[test]
    fn duplicate_name_rejected() {
        let (fleet, _id) = fleet_with_controller();
        let err = fleet.add_controller("east", "10.0.0.3:17070").unwrap_err();
        assert!(matches!(err, RuntimeError::ControllerExists(_)));
        assert_eq!(fleet.controller_count(), 1);
    }

    #[test]
    fn remove_controller_cascades_to_models() {
        let (fleet, id) = fleet_with_controller();
        let _ = fleet.add_model(&id, "prod", "admin").unwrap();
        let _ = fleet.add_model(&id, "staging", "admin").unwrap();
        assert_eq!(fleet.model_count(), 2);

        fleet.remove_controller(&id).unwrap();
        assert_eq!(fleet.controller_count(), 0);
        assert_eq!(fleet.model_count(), 0);
    }

    #[test]
    fn remove_unknown_controller_errors() {
        let fleet = Fleet::new();
        let err = fleet.remove_controller(&ControllerId::from("nope")).unwrap_err();
        assert!(matches!(err, RuntimeError::ControllerNotFound(_)));
    }

    #[test]
    fn controllers_sorted_by_name() {
        let fleet = Fleet::new();
        let _ = fleet.add_controller("west", "w:1").unwrap();
        let _ = fleet.add_controller("east", "e:1").unwrap();
        let names: Vec<String> = fleet.controllers().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["east", "west"]);
    }

    #[test]
    fn refresh_marks_available_and_stamps_time() {
        let (fleet, id) = fleet_with_controller();
        fleet.refresh(&id).unwrap();
        let info = fleet.controller(&id).unwrap();
        assert_eq!(info.status, ControllerStatus::Available);
        assert!(info.last_refreshed.is_some());
    }

    #[test]
    fn refresh_unknown_controller_errors() {
        let fleet = Fleet::new();
        let err = fleet.refresh(&ControllerId::from("nope")).unwrap_err();
        assert!(matches!(err, RuntimeError::ControllerNotFound(_)));
    }

    #[test]
    fn model_requires_existing_controller() {
        let fleet = Fleet::new();
        let err = fleet
            .add_model(&ControllerId::from("nope"), "m", "admin")
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ControllerNotFound(_)));
    }

    #[test]
    fn model_lookup_roundtrip() {
        let (fleet, ctl) = fleet_with_controller();
        let id = fleet.add_model(&ctl, "prod", "admin").unwrap();
        let model = fleet.model(&id).unwrap();
        assert_eq!(model.name, "prod");
        assert_eq!(model.owner, "admin");
        assert_eq!(model.controller, ctl);
        assert_eq!(model.life, ModelLife::Alive);
    }

    #[test]
    fn models_on_filters_by_controller() {
        let fleet = Fleet::new();
        let a = fleet.add_controller("a", "a:1").unwrap();
        let b = fleet.add_controller("b", "b:1").unwrap();
        let _ = fleet.add_model(&a, "m1", "admin").unwrap();
        let _ = fleet.add_model(&b, "m2", "admin").unwrap();
        let on_a = fleet.models_on(&a);
        assert_eq!(on_a.len(), 1);
        assert_eq!(on_a[0].name, "m1");
    }

    #[test]
    fn models_sorted_by_owner_then_name() {
        let (fleet, ctl) = fleet_with_controller();
        let _ = fleet.add_model(&ctl, "zeta", "alice").unwrap();
        let _ = fleet.add_model(&ctl, "alpha", "bob").unwrap();
        let _ = fleet.add_model(&ctl, "alpha", "alice").unwrap();
        let order: Vec<(String, String)> = fleet
            .models()
            .into_iter()
            .map(|m| (m.owner, m.name))
            .collect();
        assert_eq!(
            order,
            vec![
                ("alice".into(), "alpha".into()),
                ("alice".into(), "zeta".into()),
                ("bob".into(), "alpha".into()),
            ]
        );
    }

    #[test]
    fn controller_info_serializes_camel_case() {
        let (fleet, id) = fleet_with_controller();
        fleet.refresh(&id).unwrap();
        let info = fleet.controller(&id).unwrap();
        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("lastRefreshed").is_some());
        assert_eq!(json["status"], "available");
    }
}
