//! Boundary adapters for caller-supplied acquire/release actions.
//!
//! Callers hand actions to [`Manager::add`](crate::Manager::add) in
//! whichever shape is natural at the call site; each shape is
//! converted exactly once, at the boundary, into one internal
//! boxed-future contract that the rest of the crate operates on.
//!
//! An acquire is either a ready future or a zero-argument closure
//! producing one. A release is either an async closure or a plain
//! closure returning `Result` directly. The `Shape` type parameter on
//! the conversion traits only disambiguates the blanket impls and is
//! always inferred.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::BoxError;

/// Normalized acquire action: a boxed future yielding the resource.
pub type AcquireFuture<T> = BoxFuture<'static, std::result::Result<T, BoxError>>;

/// Normalized release action, already bound to its resource instance.
pub type ReleaseFuture = BoxFuture<'static, std::result::Result<(), BoxError>>;

/// Shape marker: action supplied as a zero-argument closure.
pub struct ThunkShape(());

/// Shape marker: action supplied as a ready future.
pub struct FutureShape(());

/// Shape marker: release supplied as an async closure.
pub struct AsyncShape(());

/// Shape marker: release supplied as a plain closure returning `Result`.
pub struct BlockingShape(());

/// Conversion of a caller-supplied acquire action into the internal
/// contract.
pub trait IntoAcquire<T, Shape> {
    /// Normalize into the boxed acquire future.
    fn into_acquire(self) -> AcquireFuture<T>;
}

impl<T, F, Fut, E> IntoAcquire<T, ThunkShape> for F
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    E: Into<BoxError>,
{
    fn into_acquire(self) -> AcquireFuture<T> {
        async move { self().await.map_err(Into::into) }.boxed()
    }
}

impl<T, Fut, E> IntoAcquire<T, FutureShape> for Fut
where
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    E: Into<BoxError>,
{
    fn into_acquire(self) -> AcquireFuture<T> {
        async move { self.await.map_err(Into::into) }.boxed()
    }
}

/// Conversion of a caller-supplied release action into the internal
/// contract, binding it to the resource instance it will tear down.
pub trait IntoRelease<T, Shape> {
    /// Bind to `resource`, producing the boxed release future. The
    /// future is lazy: nothing runs until the drain polls it.
    fn into_release(self, resource: Arc<T>) -> ReleaseFuture;
}

impl<T, F, Fut, E> IntoRelease<T, AsyncShape> for F
where
    T: Send + Sync + 'static,
    F: FnOnce(Arc<T>) -> Fut + Send + 'static,
    Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
    E: Into<BoxError>,
{
    fn into_release(self, resource: Arc<T>) -> ReleaseFuture {
        async move { self(resource).await.map_err(Into::into) }.boxed()
    }
}

impl<T, F, E> IntoRelease<T, BlockingShape> for F
where
    T: Send + Sync + 'static,
    F: FnOnce(Arc<T>) -> std::result::Result<(), E> + Send + 'static,
    E: Into<BoxError>,
{
    fn into_release(self, resource: Arc<T>) -> ReleaseFuture {
        async move { self(resource).map_err(Into::into) }.boxed()
    }
}
