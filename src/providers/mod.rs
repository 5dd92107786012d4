//! Remote Catalog Integration Module
//!
//! Rate-limited, multi-credential access to the catalog API.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────┐
//!                 │ CatalogProvider Trait│
//!                 └──────────┬───────────┘
//!                            │
//!                    ┌───────┴────────┐
//!                    │ShopifyProvider │
//!                    └───────┬────────┘
//!                            │
//!   ┌────────────────────────┴─────────────────────────┐
//!   │ ClientContext: session + CredentialPool          │
//!   │                + one SlidingWindowLimiter/cred   │
//!   └──────────────────────────────────────────────────┘
//! ```

pub mod credentials;
pub mod http_client;
pub mod pagination;
pub mod rate_limiter;
pub mod shopify;
pub mod traits;

// Re-export commonly used types
pub use credentials::{ConfigurationError, Credential, CredentialPool};
pub use http_client::{ClientContext, RetryPolicy};
pub use pagination::{PageTermination, PagedFetcher, PagedResult};
pub use rate_limiter::SlidingWindowLimiter;
pub use shopify::ShopifyProvider;
pub use traits::{CatalogProvider, ProviderError, ProviderResult};
