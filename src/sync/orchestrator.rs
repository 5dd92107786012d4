//! Sync orchestrator for catalog imports
//!
//! Builds payloads from input rows, submits them through a
//! [`CatalogProvider`] and collects one [`SyncResult`] per record. Nothing at
//! the record level aborts the run; the caller gets the whole report.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::SyncSettings;
use crate::domain::catalog::{numeric_id, CreatedProduct, Metafield, MetafieldType, ProductPayload};
use crate::providers::{CatalogProvider, ProviderError};

use super::payload::{PayloadBuilder, RawRow};

/// Namespace and key of the cross-linking metafield
const LINKED_PRODUCTS: (&str, &str) = ("custom", "linked_products");

/// Create call used for new products
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Rest,
    GraphQl,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Rest => write!(f, "rest"),
            SyncMode::GraphQl => write!(f, "graphql"),
        }
    }
}

/// Options of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Credential every call of the run is charged to
    pub credential_index: usize,
    /// Only the first `limit` records are processed
    pub limit: Option<usize>,
    /// Records submitted concurrently
    pub concurrency: usize,
    pub mode: SyncMode,
    /// Push variant ids onto images after a REST create
    pub link_variant_images: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            credential_index: 0,
            limit: None,
            concurrency: 1,
            mode: SyncMode::Rest,
            link_variant_images: false,
        }
    }
}

impl From<&SyncSettings> for SyncOptions {
    fn from(settings: &SyncSettings) -> Self {
        SyncOptions {
            concurrency: settings.concurrency.max(1),
            link_variant_images: settings.link_variant_images,
            ..SyncOptions::default()
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Why a record was not created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncFailure {
    /// Connection refused, timeout, broken stream
    Transport { message: String },
    /// Non-2xx status, or validation errors reported in a 200
    RemoteRejection { status: u16, body: String },
    /// 2xx whose body could not be read
    UnexpectedShape { message: String },
    /// Credential or endpoint could not be resolved
    Configuration { message: String },
    Cancelled,
}

impl From<ProviderError> for SyncFailure {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Transport(e) => SyncFailure::Transport { message: e.to_string() },
            ProviderError::RemoteRejection { status, body } => {
                SyncFailure::RemoteRejection { status, body }
            }
            ProviderError::GraphQl(body) => SyncFailure::RemoteRejection { status: 200, body },
            ProviderError::UnexpectedShape(message) => SyncFailure::UnexpectedShape { message },
            ProviderError::Configuration(e) => SyncFailure::Configuration { message: e.to_string() },
            ProviderError::Cancelled => SyncFailure::Cancelled,
        }
    }
}

impl std::fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncFailure::Transport { message } => write!(f, "transport error: {}", message),
            SyncFailure::RemoteRejection { status, body } => write!(f, "HTTP {}: {}", status, body),
            SyncFailure::UnexpectedShape { message } => write!(f, "unexpected response: {}", message),
            SyncFailure::Configuration { message } => write!(f, "configuration: {}", message),
            SyncFailure::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Created { id: String, title: Option<String> },
    Failed(SyncFailure),
}

/// Outcome of one input record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Position in the input
    pub index: usize,
    /// Title, SKU or identifier; may be empty
    pub label: String,
    pub outcome: SyncOutcome,
    /// Follow-up problems on an otherwise successful record
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl SyncResult {
    fn failed(index: usize, label: String, failure: SyncFailure) -> Self {
        SyncResult {
            index,
            label,
            outcome: SyncOutcome::Failed(failure),
            warnings: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Created { .. })
    }

    /// Numeric id of the created product
    pub fn product_id(&self) -> Option<i64> {
        match &self.outcome {
            SyncOutcome::Created { id, .. } => numeric_id(id),
            SyncOutcome::Failed(_) => None,
        }
    }

    /// Label for display, with a placeholder for unlabeled rows
    pub fn display_label(&self) -> String {
        if self.label.is_empty() {
            format!("<row {}>", self.index + 1)
        } else {
            self.label.clone()
        }
    }
}

/// Aggregate of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub mode: SyncMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// In input order
    pub results: Vec<SyncResult>,
}

impl SyncReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn cancelled(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, SyncOutcome::Failed(SyncFailure::Cancelled)))
            .count()
    }

    pub fn duration_secs(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

/// Outcome of linking one product to the others
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkResult {
    pub product_id: i64,
    /// Id of the created metafield
    pub outcome: Result<i64, SyncFailure>,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives records through the payload builder and the provider
pub struct SyncOrchestrator {
    provider: Arc<dyn CatalogProvider>,
    builder: PayloadBuilder,
}

impl SyncOrchestrator {
    pub fn new(provider: Arc<dyn CatalogProvider>) -> Self {
        SyncOrchestrator {
            provider,
            builder: PayloadBuilder::new(),
        }
    }

    /// Build the payloads of the first `limit` records, without submitting
    pub fn prepare(&self, records: &[RawRow], limit: Option<usize>) -> Vec<(ProductPayload, String)> {
        records
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|row| self.builder.build(row))
            .collect()
    }

    /// Submit every record and report each outcome.
    ///
    /// Results come back in input order whatever the concurrency. Once
    /// `cancel` fires, pending and in-flight records end as
    /// [`SyncFailure::Cancelled`].
    #[instrument(skip(self, records, cancel), fields(records = records.len(), provider = self.provider.code()))]
    pub async fn run(
        &self,
        records: &[RawRow],
        options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> SyncReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let prepared = self.prepare(records, options.limit);

        info!(%run_id, count = prepared.len(), mode = %options.mode, "Starting sync run");

        let results: Vec<SyncResult> = stream::iter(prepared.into_iter().enumerate())
            .map(|(index, (payload, label))| self.submit(index, label, payload, options, cancel))
            .buffered(options.concurrency.max(1))
            .collect()
            .await;

        let report = SyncReport {
            run_id,
            mode: options.mode,
            started_at,
            finished_at: Utc::now(),
            results,
        };

        info!(
            %run_id,
            total = report.total(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Sync run finished"
        );

        report
    }

    async fn submit(
        &self,
        index: usize,
        label: String,
        payload: ProductPayload,
        options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> SyncResult {
        if cancel.is_cancelled() {
            return SyncResult::failed(index, label, SyncFailure::Cancelled);
        }

        info!(index, label = %label, "Creating product");

        let idx = options.credential_index;
        let created = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            created = self.create(idx, &payload, options.mode) => created,
        };

        let created = match created {
            Ok(created) => created,
            Err(e) => {
                let failure = SyncFailure::from(e);
                match &failure {
                    SyncFailure::Transport { message } => {
                        error!(index, label = %label, error = %message, "Product creation failed")
                    }
                    SyncFailure::Cancelled => {}
                    other => warn!(index, label = %label, error = %other, "Product rejected"),
                }
                return SyncResult::failed(index, label, failure);
            }
        };

        let mut warnings = Vec::new();
        if options.link_variant_images && options.mode == SyncMode::Rest {
            let linked = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err("image linking cancelled".to_string()),
                linked = self.link_variant_images(idx, payload, &created) => linked,
            };
            if let Err(message) = linked {
                warn!(index, product_id = %created.id, error = %message, "Image linking failed");
                warnings.push(message);
            }
        }

        SyncResult {
            index,
            label,
            outcome: SyncOutcome::Created {
                id: created.id,
                title: created.title,
            },
            warnings,
        }
    }

    async fn create(
        &self,
        credential_index: usize,
        payload: &ProductPayload,
        mode: SyncMode,
    ) -> Result<CreatedProduct, ProviderError> {
        match mode {
            SyncMode::Rest => self.provider.create_product(credential_index, payload).await,
            SyncMode::GraphQl => self.provider.create_product_graphql(credential_index, payload).await,
        }
    }

    /// Bind images to the created variants by SKU and push them back
    async fn link_variant_images(
        &self,
        credential_index: usize,
        mut payload: ProductPayload,
        created: &CreatedProduct,
    ) -> Result<(), String> {
        let product_id = created
            .numeric_id()
            .ok_or_else(|| format!("product id {} is not numeric", created.id))?;

        if payload.product.assign_variant_ids(&created.variants) == 0 {
            return Ok(());
        }

        self.provider
            .update_product(credential_index, product_id, &payload.images_update(product_id))
            .await
            .map(|_| ())
            .map_err(|e| SyncFailure::from(e).to_string())
    }

    /// Give each product a `list.product_reference` metafield pointing at
    /// every other product of `product_ids`.
    #[instrument(skip(self, product_ids), fields(count = product_ids.len()))]
    pub async fn link_products(&self, credential_index: usize, product_ids: &[i64]) -> Vec<LinkResult> {
        let mut results = Vec::with_capacity(product_ids.len());

        for &product_id in product_ids {
            let others: Vec<String> = product_ids
                .iter()
                .filter(|&&other| other != product_id)
                .map(|other| format!("gid://shopify/Product/{}", other))
                .collect();

            let outcome = match serde_json::to_string(&others) {
                Ok(value) => {
                    let metafield = Metafield::new(
                        LINKED_PRODUCTS.0,
                        LINKED_PRODUCTS.1,
                        value,
                        MetafieldType::ProductReferenceList,
                    );
                    self.provider
                        .create_metafield(credential_index, product_id, &metafield)
                        .await
                        .map(|created| created.id)
                        .map_err(SyncFailure::from)
                }
                Err(e) => Err(SyncFailure::UnexpectedShape { message: e.to_string() }),
            };

            match &outcome {
                Ok(_) => info!(product_id, linked = others.len(), "Linked products"),
                Err(e) => warn!(product_id, error = %e, "Linking products failed"),
            }
            results.push(LinkResult { product_id, outcome });
        }

        results
    }
}
