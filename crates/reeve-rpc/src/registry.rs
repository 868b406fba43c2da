//! The shared method table and the per-connection root dispatcher.
//!
//! [`MethodRegistry`] maps `(root, version, method)` keys to adapted callers
//! and may be mutated at any time. Each client connection gets its own
//! [`Root`] over the shared registry; the root assigns monotonically
//! increasing call IDs, tracks the cancellation token of every in-flight
//! call, and [`Root::kill`] cancels them all when the connection dies.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use metrics::{counter, histogram};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::RpcError;
use crate::method::{Handler, MethodCaller, PayloadType};
use crate::types::{RpcRequest, RpcResponse};

/// Registry key: `(root, version, method)`, compared by exact equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodKey {
    /// Root name.
    pub root: String,
    /// Facade version.
    pub version: u32,
    /// Method name.
    pub name: String,
}

impl MethodKey {
    /// Build a key.
    pub fn new(root: impl Into<String>, version: u32, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            version,
            name: name.into(),
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}).{}", self.root, self.version, self.name)
    }
}

/// Concurrent method table shared by every connection's [`Root`].
pub struct MethodRegistry {
    methods: RwLock<HashMap<MethodKey, Arc<MethodCaller>>>,
}

impl MethodRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite the caller for a key. The most recent
    /// registration wins.
    pub fn add_method(&self, root: &str, version: u32, name: &str, caller: MethodCaller) {
        let key = MethodKey::new(root, version, name);
        let _ = self.methods.write().insert(key, Arc::new(caller));
    }

    /// Adapt and register a handler function in one step.
    pub fn register<M, H>(&self, root: &str, version: u32, name: &str, handler: H)
    where
        H: Handler<M>,
    {
        self.add_method(root, version, name, MethodCaller::new(handler));
    }

    /// Remove the entry for a key if present. Idempotent.
    pub fn remove_method(&self, root: &str, version: u32, name: &str) {
        let key = MethodKey::new(root, version, name);
        let _ = self.methods.write().remove(&key);
    }

    /// Look up the caller for a key.
    pub fn lookup(&self, root: &str, version: u32, name: &str) -> Option<Arc<MethodCaller>> {
        let key = MethodKey::new(root, version, name);
        self.methods.read().get(&key).cloned()
    }

    /// Whether a method is registered.
    pub fn has_method(&self, root: &str, version: u32, name: &str) -> bool {
        let key = MethodKey::new(root, version, name);
        self.methods.read().contains_key(&key)
    }

    /// All registered keys, sorted.
    pub fn methods(&self) -> Vec<MethodKey> {
        let mut keys: Vec<MethodKey> = self.methods.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// In-flight call table: call ID → cancellation token of the call's context.
#[derive(Default, Debug)]
struct InFlight {
    table: Mutex<HashMap<u64, CancellationToken>>,
    next_call_id: AtomicU64,
}

/// Per-connection dispatcher over a shared [`MethodRegistry`].
///
/// Cloning a `Root` shares its in-flight table; each connection should build
/// its own.
#[derive(Clone)]
pub struct Root {
    registry: Arc<MethodRegistry>,
    calls: Arc<InFlight>,
}

impl Root {
    /// Create a root over a shared registry with an empty in-flight table.
    pub fn new(registry: Arc<MethodRegistry>) -> Self {
        Self {
            registry,
            calls: Arc::new(InFlight::default()),
        }
    }

    /// The shared method registry.
    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    /// Insert or overwrite a method in the shared registry.
    pub fn add_method(&self, root: &str, version: u32, name: &str, caller: MethodCaller) {
        self.registry.add_method(root, version, name, caller);
    }

    /// Adapt and register a handler in the shared registry.
    pub fn register<M, H>(&self, root: &str, version: u32, name: &str, handler: H)
    where
        H: Handler<M>,
    {
        self.registry.register(root, version, name, handler);
    }

    /// Remove a method from the shared registry. Idempotent.
    pub fn remove_method(&self, root: &str, version: u32, name: &str) {
        self.registry.remove_method(root, version, name);
    }

    /// Resolve a method to a caller bound to this root's in-flight table.
    ///
    /// A miss returns [`RpcError::NotImplemented`] and mutates nothing.
    pub fn find_method(
        &self,
        root: &str,
        version: u32,
        method: &str,
    ) -> Result<BoundCaller, RpcError> {
        let caller = self
            .registry
            .lookup(root, version, method)
            .ok_or_else(|| RpcError::not_implemented(root, version, method))?;
        Ok(BoundCaller {
            calls: Arc::clone(&self.calls),
            caller,
        })
    }

    /// Cancel the context of every in-flight call.
    ///
    /// Synchronous and idempotent: triggers each cancel under the lock but
    /// does not wait for handlers to return. Entries stay in the table until
    /// their calls exit, and the method table is untouched, so dispatch
    /// keeps working afterwards.
    pub fn kill(&self) {
        let table = self.calls.table.lock();
        debug!(in_flight = table.len(), "cancelling in-flight calls");
        for token in table.values() {
            token.cancel();
        }
    }

    /// Number of calls currently in flight on this root.
    pub fn in_flight_count(&self) -> usize {
        self.calls.table.lock().len()
    }

    /// Dispatch a framed request end-to-end: resolve, call under `parent`,
    /// and map the outcome to a wire response.
    pub async fn dispatch(&self, request: RpcRequest, parent: &CancellationToken) -> RpcResponse {
        let label = MethodKey::new(&*request.root, request.version, &*request.method).to_string();
        counter!("rpc_requests_total", "method" => label.clone()).increment(1);

        let caller = match self.find_method(&request.root, request.version, &request.method) {
            Ok(caller) => caller,
            Err(err) => {
                counter!("rpc_errors_total", "method" => label, "error_type" => err.code().to_owned())
                    .increment(1);
                return RpcResponse::from_error(&request.id, &err);
            }
        };

        let start = Instant::now();
        let response = match caller.call(parent, &request.object_id, request.params).await {
            Ok(result) => RpcResponse::success(&request.id, result),
            Err(err) => {
                counter!("rpc_errors_total", "method" => label.clone(), "error_type" => err.code().to_owned())
                    .increment(1);
                RpcResponse::from_error(&request.id, &err)
            }
        };

        let duration = start.elapsed();
        histogram!("rpc_request_duration_seconds", "method" => label.clone())
            .record(duration.as_secs_f64());
        if duration.as_secs() >= 5 {
            warn!(
                method = %label,
                duration_secs = duration.as_secs_f64(),
                "slow RPC request"
            );
        }

        response
    }
}

/// A resolved method bound to one root's in-flight table.
#[derive(Debug)]
pub struct BoundCaller {
    calls: Arc<InFlight>,
    caller: Arc<MethodCaller>,
}

impl BoundCaller {
    /// Descriptor of the params payload, if the method takes one.
    pub fn params_type(&self) -> Option<PayloadType> {
        self.caller.params_type()
    }

    /// Descriptor of the result payload, if the method returns one.
    pub fn result_type(&self) -> Option<PayloadType> {
        self.caller.result_type()
    }

    /// Whether the method addresses an object within the root.
    pub fn takes_object_id(&self) -> bool {
        self.caller.takes_object_id()
    }

    /// Invoke the method under a child context of `parent`.
    ///
    /// The call is assigned a fresh call ID and tracked in the root's
    /// in-flight table for the duration of the handler. On exit — normal
    /// return, error, or the dispatch future being dropped — the entry is
    /// removed and the child context cancelled.
    pub async fn call(
        &self,
        parent: &CancellationToken,
        object_id: &str,
        params: Option<Value>,
    ) -> Result<Option<Value>, RpcError> {
        let token = parent.child_token();
        let _guard = CallGuard::track(&self.calls, token.clone());
        self.caller.call(token, object_id, params).await
    }
}

/// Removes a call from the in-flight table and cancels its context on drop.
struct CallGuard {
    calls: Arc<InFlight>,
    call_id: u64,
    token: CancellationToken,
}

impl CallGuard {
    fn track(calls: &Arc<InFlight>, token: CancellationToken) -> Self {
        let call_id = calls.next_call_id.fetch_add(1, Ordering::Relaxed);
        let _ = calls.table.lock().insert(call_id, token.clone());
        Self {
            calls: Arc::clone(calls),
            call_id,
            token,
        }
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        let _ = self.calls.table.lock().remove(&self.call_id);
        // Cancelling after the handler has returned is a no-op for the
        // handler but releases anything still tied to the child context.
        self.token.cancel();
    }
}
