pub use mediator::DefaultAsyncMediator;
use sqlx::PgPool;

use crate::cache::RecordCache;

pub mod middleware;

pub type AppMediator = DefaultAsyncMediator;

/// Wire every command and query handler into one mediator.
pub fn build_mediator(pool: PgPool, cache: RecordCache) -> AppMediator {
    DefaultAsyncMediator::builder()
        // Employees
        .add_handler({
            let pool = pool.clone();
            let cache = cache.clone();
            move |cmd| {
                let pool = pool.clone();
                let cache = cache.clone();
                async move { crate::features::employees::commands::create::handle(pool, cache, cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            let cache = cache.clone();
            move |cmd| {
                let pool = pool.clone();
                let cache = cache.clone();
                async move { crate::features::employees::commands::update::handle(pool, cache, cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            let cache = cache.clone();
            move |cmd| {
                let pool = pool.clone();
                let cache = cache.clone();
                async move { crate::features::employees::commands::delete::handle(pool, cache, cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            let cache = cache.clone();
            move |cmd| {
                let pool = pool.clone();
                let cache = cache.clone();
                async move {
                    crate::features::employees::commands::bulk_update::handle(pool, cache, cmd).await
                }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |query| {
                let pool = pool.clone();
                async move { crate::features::employees::queries::get::handle(pool, query).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            let cache = cache.clone();
            move |query| {
                let pool = pool.clone();
                let cache = cache.clone();
                async move { crate::features::employees::queries::list::handle(pool, cache, query).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            let cache = cache.clone();
            move |query| {
                let pool = pool.clone();
                let cache = cache.clone();
                async move {
                    crate::features::employees::queries::countries::handle(pool, cache, query).await
                }
            }
        })
        // Uploads
        .add_handler({
            let pool = pool.clone();
            move |query| {
                let pool = pool.clone();
                async move { crate::features::uploads::queries::get_job::handle(pool, query).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |query| {
                let pool = pool.clone();
                async move { crate::features::uploads::queries::list_jobs::handle(pool, query).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |query| {
                let pool = pool.clone();
                async move { crate::features::uploads::queries::list_errors::handle(pool, query).await }
            }
        })
        // Dashboard
        .add_handler({
            let pool = pool.clone();
            move |query| {
                let pool = pool.clone();
                let cache = cache.clone();
                async move { crate::features::dashboard::queries::stats::handle(pool, cache, query).await }
            }
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mediator_builds() {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost".to_string());
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost".to_string());

        if let (Ok(pool), Ok(cache)) = (
            PgPool::connect(&database_url).await,
            RecordCache::connect(&redis_url).await,
        ) {
            let _mediator = build_mediator(pool, cache);
        }
    }
}
