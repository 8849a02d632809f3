//! Database dispatch macros for reducing code duplication.
//!
//! `sqlx` pools are typed per engine, so anything that only needs the
//! engine-independent `Pool<DB>` API is written once and expanded per variant.

/// Macro for generating database dispatch match arms.
///
/// This macro generates match arms for `DbPool` variants, reducing the need
/// to manually write repetitive match statements.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(pool, {
///     MySql(p) => p.size(),
///     Postgres(p) => p.size(),
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($pool:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $pool {
            $(
                $crate::db::pool::DbPool::$variant($p) => $body,
            )+
        }
    };
    // Same body for every variant.
    ($pool:expr, |$p:ident| $body:expr) => {
        $crate::impl_db_dispatch!($pool, {
            MySql($p) => $body,
            Postgres($p) => $body,
        })
    };
}

pub use impl_db_dispatch;
