//! Method adapters.
//!
//! Handlers are written in their most natural shape: a pure lookup takes no
//! cancellation token, a setter returns only an error, an object method takes
//! the object's identifier. This module erases all admissible shapes into a
//! single [`MethodCaller`] so the dispatcher only ever sees one signature.
//!
//! Parameters appear in the fixed order `[CancellationToken, object id
//! String, params P]`, any prefix subset of which may be present. Returns are
//! `()`, a serializable result `R`, or either wrapped in
//! `Result<_, RpcError>`. A function whose shape falls outside that grid does
//! not implement [`Handler`] and is rejected at compile time, so a
//! mis-shaped registration can never reach a running gateway.
//!
//! Structured parameter types opt in through the [`Params`] marker trait;
//! a bare `String` argument is always the object identifier.

use std::any::{TypeId, type_name};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::errors::RpcError;

/// Runtime descriptor for a params or result payload type.
///
/// Two descriptors compare equal exactly when they describe the same Rust
/// type; `name` is diagnostic only.
#[derive(Clone, Copy, Debug)]
pub struct PayloadType {
    /// The described type's `TypeId`.
    pub id: TypeId,
    /// The described type's name, for diagnostics.
    pub name: &'static str,
}

impl PayloadType {
    /// Descriptor for `T`.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

impl PartialEq for PayloadType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PayloadType {}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Marker for structured aggregate types usable in the params position.
///
/// Deliberately opt-in: it keeps a lone `String` parameter unambiguous (that
/// position is always the object identifier).
pub trait Params: DeserializeOwned + Send + 'static {}

/// Future returned by an erased method call.
pub type CallFuture = Pin<Box<dyn Future<Output = Result<Option<Value>, RpcError>> + Send>>;

/// An erased handler invocation: `(ctx, object id, params) -> outcome`.
pub type ErasedCall =
    Box<dyn Fn(CancellationToken, String, Option<Value>) -> CallFuture + Send + Sync>;

/// Shape markers used to select [`Handler`] and [`IntoCallOutcome`] impls.
pub mod shape {
    use std::marker::PhantomData;

    /// No parameters.
    pub struct Nullary(());
    /// `(ctx)`.
    pub struct Ctx(());
    /// `(object id)`.
    pub struct Id(());
    /// `(ctx, object id)`.
    pub struct CtxId(());
    /// `(params)`.
    pub struct WithParams<P>(PhantomData<P>);
    /// `(ctx, params)`.
    pub struct CtxParams<P>(PhantomData<P>);
    /// `(object id, params)`.
    pub struct IdParams<P>(PhantomData<P>);
    /// `(ctx, object id, params)`.
    pub struct CtxIdParams<P>(PhantomData<P>);
    /// Return is `()` or a bare serializable value.
    pub struct Plain(());
    /// Return is `Result<_, RpcError>`.
    pub struct Fallible(());
}

/// How a handler's return value maps onto the call outcome.
pub trait IntoCallOutcome<M>: Send + 'static {
    /// Descriptor for the result position, or `None` when the shape has no
    /// result payload.
    fn result_type() -> Option<PayloadType>;
    /// Whether the shape carries an error return.
    fn fallible() -> bool;
    /// Encode the value as the call outcome.
    fn into_outcome(self) -> Result<Option<Value>, RpcError>;
}

fn encode_result<R: Serialize>(result: R) -> Result<Option<Value>, RpcError> {
    serde_json::to_value(result)
        .map(Some)
        .map_err(|e| RpcError::internal(format!("failed to encode result: {e}")))
}

impl<R> IntoCallOutcome<shape::Plain> for R
where
    R: Serialize + Send + 'static,
{
    fn result_type() -> Option<PayloadType> {
        // A unit return means the method has no result payload.
        (TypeId::of::<R>() != TypeId::of::<()>()).then(PayloadType::of::<R>)
    }

    fn fallible() -> bool {
        false
    }

    fn into_outcome(self) -> Result<Option<Value>, RpcError> {
        if TypeId::of::<R>() == TypeId::of::<()>() {
            return Ok(None);
        }
        encode_result(self)
    }
}

impl<R> IntoCallOutcome<shape::Fallible> for Result<R, RpcError>
where
    R: Serialize + Send + 'static,
{
    fn result_type() -> Option<PayloadType> {
        (TypeId::of::<R>() != TypeId::of::<()>()).then(PayloadType::of::<R>)
    }

    fn fallible() -> bool {
        true
    }

    fn into_outcome(self) -> Result<Option<Value>, RpcError> {
        let result = self?;
        if TypeId::of::<R>() == TypeId::of::<()>() {
            return Ok(None);
        }
        encode_result(result)
    }
}

fn decode_params<P: Params>(params: Option<Value>) -> Result<P, RpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| RpcError::invalid_params(format!("invalid params: {e}")))
}

/// A function adoptable as an RPC method.
///
/// `M` is a shape marker that never appears in user code; it exists so the
/// compiler can tell the impls apart during inference, the same way axum's
/// `Handler<T, S>` does.
pub trait Handler<M>: Send + Sync + Sized + 'static {
    /// Whether the handler addresses an object within the root.
    const TAKES_OBJECT_ID: bool;

    /// Descriptor for the params position, if the shape has one.
    fn params_type() -> Option<PayloadType>;
    /// Descriptor for the result position, if the shape has one.
    fn result_type() -> Option<PayloadType>;
    /// Whether the shape carries an error return.
    fn fallible() -> bool;
    /// Erase into the uniform call signature.
    fn erase(self) -> ErasedCall;
}

impl<F, Fut, Out, MO> Handler<(shape::Nullary, MO)> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoCallOutcome<MO>,
    MO: 'static,
{
    const TAKES_OBJECT_ID: bool = false;

    fn params_type() -> Option<PayloadType> {
        None
    }

    fn result_type() -> Option<PayloadType> {
        Out::result_type()
    }

    fn fallible() -> bool {
        Out::fallible()
    }

    fn erase(self) -> ErasedCall {
        Box::new(move |_ctx, _id, _params| -> CallFuture {
            let fut = self();
            Box::pin(async move { fut.await.into_outcome() })
        })
    }
}

impl<F, Fut, Out, MO> Handler<(shape::Ctx, MO)> for F
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoCallOutcome<MO>,
    MO: 'static,
{
    const TAKES_OBJECT_ID: bool = false;

    fn params_type() -> Option<PayloadType> {
        None
    }

    fn result_type() -> Option<PayloadType> {
        Out::result_type()
    }

    fn fallible() -> bool {
        Out::fallible()
    }

    fn erase(self) -> ErasedCall {
        Box::new(move |ctx, _id, _params| -> CallFuture {
            let fut = self(ctx);
            Box::pin(async move { fut.await.into_outcome() })
        })
    }
}

impl<F, Fut, Out, MO> Handler<(shape::Id, MO)> for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoCallOutcome<MO>,
    MO: 'static,
{
    const TAKES_OBJECT_ID: bool = true;

    fn params_type() -> Option<PayloadType> {
        None
    }

    fn result_type() -> Option<PayloadType> {
        Out::result_type()
    }

    fn fallible() -> bool {
        Out::fallible()
    }

    fn erase(self) -> ErasedCall {
        Box::new(move |_ctx, id, _params| -> CallFuture {
            let fut = self(id);
            Box::pin(async move { fut.await.into_outcome() })
        })
    }
}

impl<F, Fut, Out, MO> Handler<(shape::CtxId, MO)> for F
where
    F: Fn(CancellationToken, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoCallOutcome<MO>,
    MO: 'static,
{
    const TAKES_OBJECT_ID: bool = true;

    fn params_type() -> Option<PayloadType> {
        None
    }

    fn result_type() -> Option<PayloadType> {
        Out::result_type()
    }

    fn fallible() -> bool {
        Out::fallible()
    }

    fn erase(self) -> ErasedCall {
        Box::new(move |ctx, id, _params| -> CallFuture {
            let fut = self(ctx, id);
            Box::pin(async move { fut.await.into_outcome() })
        })
    }
}

impl<F, Fut, Out, MO, P> Handler<(shape::WithParams<P>, MO)> for F
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    P: Params,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoCallOutcome<MO>,
    MO: 'static,
{
    const TAKES_OBJECT_ID: bool = false;

    fn params_type() -> Option<PayloadType> {
        Some(PayloadType::of::<P>())
    }

    fn result_type() -> Option<PayloadType> {
        Out::result_type()
    }

    fn fallible() -> bool {
        Out::fallible()
    }

    fn erase(self) -> ErasedCall {
        Box::new(move |_ctx, _id, params| -> CallFuture {
            match decode_params::<P>(params) {
                Ok(p) => {
                    let fut = self(p);
                    Box::pin(async move { fut.await.into_outcome() })
                }
                Err(err) => Box::pin(std::future::ready(Err(err))),
            }
        })
    }
}

impl<F, Fut, Out, MO, P> Handler<(shape::CtxParams<P>, MO)> for F
where
    F: Fn(CancellationToken, P) -> Fut + Send + Sync + 'static,
    P: Params,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoCallOutcome<MO>,
    MO: 'static,
{
    const TAKES_OBJECT_ID: bool = false;

    fn params_type() -> Option<PayloadType> {
        Some(PayloadType::of::<P>())
    }

    fn result_type() -> Option<PayloadType> {
        Out::result_type()
    }

    fn fallible() -> bool {
        Out::fallible()
    }

    fn erase(self) -> ErasedCall {
        Box::new(move |ctx, _id, params| -> CallFuture {
            match decode_params::<P>(params) {
                Ok(p) => {
                    let fut = self(ctx, p);
                    Box::pin(async move { fut.await.into_outcome() })
                }
                Err(err) => Box::pin(std::future::ready(Err(err))),
            }
        })
    }
}

impl<F, Fut, Out, MO, P> Handler<(shape::IdParams<P>, MO)> for F
where
    F: Fn(String, P) -> Fut + Send + Sync + 'static,
    P: Params,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoCallOutcome<MO>,
    MO: 'static,
{
    const TAKES_OBJECT_ID: bool = true;

    fn params_type() -> Option<PayloadType> {
        Some(PayloadType::of::<P>())
    }

    fn result_type() -> Option<PayloadType> {
        Out::result_type()
    }

    fn fallible() -> bool {
        Out::fallible()
    }

    fn erase(self) -> ErasedCall {
        Box::new(move |_ctx, id, params| -> CallFuture {
            match decode_params::<P>(params) {
                Ok(p) => {
                    let fut = self(id, p);
                    Box::pin(async move { fut.await.into_outcome() })
                }
                Err(err) => Box::pin(std::future::ready(Err(err))),
            }
        })
    }
}

impl<F, Fut, Out, MO, P> Handler<(shape::CtxIdParams<P>, MO)> for F
where
    F: Fn(CancellationToken, String, P) -> Fut + Send + Sync + 'static,
    P: Params,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoCallOutcome<MO>,
    MO: 'static,
{
    const TAKES_OBJECT_ID: bool = true;

    fn params_type() -> Option<PayloadType> {
        Some(PayloadType::of::<P>())
    }

    fn result_type() -> Option<PayloadType> {
        Out::result_type()
    }

    fn fallible() -> bool {
        Out::fallible()
    }

    fn erase(self) -> ErasedCall {
        Box::new(move |ctx, id, params| -> CallFuture {
            match decode_params::<P>(params) {
                Ok(p) => {
                    let fut = self(ctx, id, p);
                    Box::pin(async move { fut.await.into_outcome() })
                }
                Err(err) => Box::pin(std::future::ready(Err(err))),
            }
        })
    }
}

/// A handler erased to the uniform call signature, together with its shape
/// metadata.
pub struct MethodCaller {
    takes_object_id: bool,
    fallible: bool,
    params: Option<PayloadType>,
    result: Option<PayloadType>,
    call: ErasedCall,
}

impl MethodCaller {
    /// Adapt a handler function of any admissible shape.
    pub fn new<M, H>(handler: H) -> Self
    where
        H: Handler<M>,
    {
        Self {
            takes_object_id: H::TAKES_OBJECT_ID,
            fallible: H::fallible(),
            params: H::params_type(),
            result: H::result_type(),
            call: handler.erase(),
        }
    }

    /// Descriptor of the params payload, if the handler takes one.
    pub fn params_type(&self) -> Option<PayloadType> {
        self.params
    }

    /// Descriptor of the result payload, if the handler returns one.
    pub fn result_type(&self) -> Option<PayloadType> {
        self.result
    }

    /// Whether the handler addresses an object within the root.
    pub fn takes_object_id(&self) -> bool {
        self.takes_object_id
    }

    /// Whether the handler has an error return.
    pub fn fallible(&self) -> bool {
        self.fallible
    }

    /// Invoke the handler.
    ///
    /// A non-empty `object_id` against a handler that does not address
    /// objects returns [`RpcError::BadId`] without invoking the handler.
    /// Handlers without a ctx parameter ignore `ctx`; handlers without a
    /// params parameter ignore `params`.
    pub async fn call(
        &self,
        ctx: CancellationToken,
        object_id: &str,
        params: Option<Value>,
    ) -> Result<Option<Value>, RpcError> {
        if !self.takes_object_id && !object_id.is_empty() {
            return Err(RpcError::BadId {
                id: object_id.to_owned(),
            });
        }
        (self.call)(ctx, object_id.to_owned(), params).await
    }
}

impl fmt::Debug for MethodCaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCaller")
            .field("takes_object_id", &self.takes_object_id)
            .field("fallible", &self.fallible)
            .field("params", &self.params.map(|p| p.name))
            .field("result", &self.result.map(|r| r.name))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Deserialize, PartialEq)]
    struct AddArgs {
        a: i64,
        b: i64,
    }
    impl Params for AddArgs {}

    #[derive(Debug, Serialize)]
    struct SumResult {
        sum: i64,
    }

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    // ── Shape metadata coverage ─────────────────────────────────────

    #[test]
    fn nullary_unit_reports_nothing() {
        let caller = MethodCaller::new(|| async {});
        assert!(caller.params_type().is_none());
        assert!(caller.result_type().is_none());
        assert!(!caller.takes_object_id());
        assert!(!caller.fallible());
    }

    #[test]
    fn full_shape_reports_both_payloads() {
        let caller = MethodCaller::new(
            |_ctx: CancellationToken, _id: String, args: AddArgs| async move {
                Ok::<_, RpcError>(SumResult { sum: args.a + args.b })
            },
        );
        assert_eq!(caller.params_type(), Some(PayloadType::of::<AddArgs>()));
        assert_eq!(caller.result_type(), Some(PayloadType::of::<SumResult>()));
        assert!(caller.takes_object_id());
        assert!(caller.fallible());
    }

    #[test]
    fn payload_type_name_is_diagnostic() {
        let ty = PayloadType::of::<AddArgs>();
        assert!(ty.name.ends_with("AddArgs"));
        assert_eq!(ty, PayloadType::of::<AddArgs>());
        assert_ne!(ty, PayloadType::of::<SumResult>());
    }

    #[test]
    fn every_parameter_shape_adapts() {
        // No-params shapes.
        let shapes = [
            MethodCaller::new(|| async {}),
            MethodCaller::new(|_ctx: CancellationToken| async {}),
            MethodCaller::new(|_id: String| async {}),
            MethodCaller::new(|_ctx: CancellationToken, _id: String| async {}),
        ];
        for (i, caller) in shapes.iter().enumerate() {
            assert!(caller.params_type().is_none(), "shape {i}");
            assert_eq!(caller.takes_object_id(), i >= 2, "shape {i}");
        }

        // Params-taking shapes.
        let shapes = [
            MethodCaller::new(|_p: AddArgs| async {}),
            MethodCaller::new(|_ctx: CancellationToken, _p: AddArgs| async {}),
            MethodCaller::new(|_id: String, _p: AddArgs| async {}),
            MethodCaller::new(|_ctx: CancellationToken, _id: String, _p: AddArgs| async {}),
        ];
        for (i, caller) in shapes.iter().enumerate() {
            assert_eq!(
                caller.params_type(),
                Some(PayloadType::of::<AddArgs>()),
                "shape {i}"
            );
            assert_eq!(caller.takes_object_id(), i >= 2, "shape {i}");
        }
    }

    #[test]
    fn every_return_shape_adapts() {
        let unit = MethodCaller::new(|| async {});
        assert!(unit.result_type().is_none() && !unit.fallible());

        let plain = MethodCaller::new(|| async { SumResult { sum: 0 } });
        assert_eq!(plain.result_type(), Some(PayloadType::of::<SumResult>()));
        assert!(!plain.fallible());

        let fallible_unit = MethodCaller::new(|| async { Ok::<(), RpcError>(()) });
        assert!(fallible_unit.result_type().is_none() && fallible_unit.fallible());

        let fallible = MethodCaller::new(|| async { Ok::<_, RpcError>(SumResult { sum: 0 }) });
        assert_eq!(fallible.result_type(), Some(PayloadType::of::<SumResult>()));
        assert!(fallible.fallible());
    }

    #[tokio::test]
    async fn mixed_shapes_combine_freely() {
        // (id, params) -> Result<R, _>
        let caller = MethodCaller::new(|id: String, args: AddArgs| async move {
            Ok::<_, RpcError>(SumResult {
                sum: args.a + args.b + id.len() as i64,
            })
        });
        assert!(caller.takes_object_id());
        assert_eq!(caller.params_type(), Some(PayloadType::of::<AddArgs>()));
        assert!(caller.fallible());
        let out = caller
            .call(token(), "xy", Some(json!({"a": 1, "b": 2})))
            .await
            .unwrap();
        assert_eq!(out.unwrap()["sum"], 5);

        // (ctx) -> R
        let caller = MethodCaller::new(|_ctx: CancellationToken| async { 9_i64 });
        assert!(caller.params_type().is_none());
        assert_eq!(caller.result_type(), Some(PayloadType::of::<i64>()));
        assert!(!caller.fallible());

        // (ctx, params) -> Result<(), _>
        let caller = MethodCaller::new(|_ctx: CancellationToken, _args: AddArgs| async {
            Ok::<(), RpcError>(())
        });
        assert_eq!(caller.params_type(), Some(PayloadType::of::<AddArgs>()));
        assert!(caller.result_type().is_none());
        assert!(caller.fallible());
    }

    // ── Call semantics ──────────────────────────────────────────────

    #[tokio::test]
    async fn params_and_result_roundtrip() {
        let caller = MethodCaller::new(|args: AddArgs| async move {
            SumResult { sum: args.a + args.b }
        });
        let out = caller
            .call(token(), "", Some(json!({"a": 1, "b": 2})))
            .await
            .unwrap();
        assert_eq!(out.unwrap()["sum"], 3);
    }

    #[tokio::test]
    async fn unit_result_is_absent() {
        let caller = MethodCaller::new(|| async {});
        let out = caller.call(token(), "", None).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn fallible_unit_result_is_absent() {
        let caller = MethodCaller::new(|| async { Ok::<(), RpcError>(()) });
        let out = caller.call(token(), "", None).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn handler_error_passes_through() {
        let caller = MethodCaller::new(|| async {
            Err::<SumResult, _>(RpcError::internal("boom"))
        });
        let err = caller.call(token(), "", None).await.unwrap_err();
        assert_eq!(err.code(), crate::errors::INTERNAL_ERROR);
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn bad_id_rejected_without_invoking_handler() {
        let invoked = Arc::new(AtomicUsize::new(0));
        let invoked2 = Arc::clone(&invoked);
        let caller = MethodCaller::new(move || {
            let invoked = Arc::clone(&invoked2);
            async move {
                let _ = invoked.fetch_add(1, Ordering::SeqCst);
            }
        });

        let err = caller.call(token(), "m-1", None).await.unwrap_err();
        assert_eq!(err.code(), crate::errors::BAD_OBJECT_ID);
        assert_eq!(err.to_string(), "bad object identifier \"m-1\"");
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn object_id_forwarded_when_declared() {
        let caller = MethodCaller::new(|id: String| async move {
            Ok::<_, RpcError>(serde_json::json!({ "echo": id }))
        });
        let out = caller.call(token(), "m-42", None).await.unwrap();
        assert_eq!(out.unwrap()["echo"], "m-42");
    }

    #[tokio::test]
    async fn empty_object_id_accepted_by_no_id_handler() {
        let caller = MethodCaller::new(|| async { 7_i64 });
        let out = caller.call(token(), "", None).await.unwrap();
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test]
    async fn malformed_params_rejected() {
        let caller = MethodCaller::new(|_p: AddArgs| async {});
        let err = caller
            .call(token(), "", Some(json!({"a": "one"})))
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::errors::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn missing_params_rejected_when_required() {
        let caller = MethodCaller::new(|_p: AddArgs| async {});
        let err = caller.call(token(), "", None).await.unwrap_err();
        assert_eq!(err.code(), crate::errors::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn extra_params_ignored_by_paramless_handler() {
        let caller = MethodCaller::new(|| async { 1_i64 });
        let out = caller
            .call(token(), "", Some(json!({"ignored": true})))
            .await
            .unwrap();
        assert_eq!(out.unwrap(), 1);
    }

    #[tokio::test]
    async fn ctx_is_forwarded_to_handler() {
        let caller = MethodCaller::new(|ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Ok::<(), RpcError>(())
        });
        let ctx = token();
        ctx.cancel();
        // Returns promptly because the forwarded token is already cancelled.
        let out = caller.call(ctx, "", None).await;
        assert!(out.is_ok());
    }
}
