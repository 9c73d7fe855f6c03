//! Dispose hooks.
//!
//! A hook is an async cleanup function bound to a factory-built
//! instance. Hooks are type-erased into [`DisposeFn`] when the layer is
//! built and only ever invoked by `Container::dispose`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BoxError;
use crate::layer::Instance;

/// Future returned by an erased dispose hook.
pub type DisposeFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'static>>;

/// Type-erased dispose hook.
pub(crate) type DisposeFn = Arc<dyn Fn(Instance) -> DisposeFuture + Send + Sync>;

/// Cleanup behaviour owned by a service type.
///
/// Register it with [`FactoryOptions::disposable`](crate::layer::FactoryOptions::disposable)
/// instead of writing a closure.
///
/// # Examples
/// ```rust
/// use tabaqa_container::prelude::*;
///
/// struct Pool;
///
/// #[async_trait]
/// impl Dispose for Pool {
///     async fn dispose(&self) -> Result<(), BoxError> {
///         // close connections here
///         Ok(())
///     }
/// }
///
/// let pool = Tag::<Pool>::new("Pool");
/// let layer = Layer::from_fn_with(&pool, || Pool, FactoryOptions::new().disposable());
/// ```
#[async_trait]
pub trait Dispose: Send + Sync + 'static {
    async fn dispose(&self) -> Result<(), BoxError>;
}

/// Erases a typed hook.
///
/// The container only hands a hook the instance its own factory built,
/// so the downcast failing means the record was corrupted.
pub(crate) fn erase<T, F, Fut>(hook: F) -> DisposeFn
where
    T: Send + Sync + 'static,
    F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |instance: Instance| -> DisposeFuture {
        match instance.downcast::<T>() {
            Ok(service) => Box::pin(hook(service)),
            Err(_) => {
                let message = format!("dispose hook expected {}", std::any::type_name::<T>());
                Box::pin(async move { Err::<(), BoxError>(message.into()) })
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Connection {
        closed: AtomicUsize,
    }

    #[async_trait]
    impl Dispose for Connection {
        async fn dispose(&self) -> Result<(), BoxError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn erased_hook_receives_instance() {
        let hook = erase(|conn: Arc<Connection>| async move { conn.dispose().await });

        let conn = Arc::new(Connection { closed: AtomicUsize::new(0) });
        hook(conn.clone() as Instance).await.unwrap();

        assert_eq!(conn.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn erased_hook_rejects_foreign_instance() {
        let hook = erase(|_: Arc<Connection>| async { Ok::<(), BoxError>(()) });

        let result = hook(Arc::new(42u8) as Instance).await;
        assert!(result.unwrap_err().to_string().contains("Connection"));
    }
}
