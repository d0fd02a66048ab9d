//! Declarative macros for ergonomic effect construction

/// Create an `Effect::Future` from an async block body
///
/// The body is wrapped in `async move`, so it captures its environment by
/// value. It must evaluate to `Option<Action>`.
///
/// # Example
///
/// ```rust,ignore
/// use venue_ops_core::async_effect;
///
/// let notifier = Arc::clone(&env.notifier);
/// async_effect! {
///     let _ = notifier.notify(notification).await;
///     None
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}
