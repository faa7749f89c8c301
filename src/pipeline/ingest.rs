// src/pipeline/ingest.rs

//! Catalog ingestion: PDF bytes in, stored assets and product rows out.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use url::Url;

use crate::database::{ProductRepository, SessionRepository};
use crate::error::{AppError, Result};
use crate::models::{Config, IngestConfig, IngestReport, IngestSession, NewProduct, new_session_id};
use crate::services::{CatalogDocument, CollageLayout, PageMetadata, create_collage, encode_jpeg};
use crate::services::{fallback_sku, parse_page_text};
use crate::storage::{JPEG_CONTENT_TYPE, ObjectStore, collage_key, image_key};
use crate::utils::http::{create_async_client, fetch_bytes, file_name_from_url};
use crate::utils::sha256_hex;

/// Assets and metadata extracted from one page, ready to upload.
#[derive(Debug)]
struct ExtractedPage {
    page_number: u32,
    sku: String,
    metadata: PageMetadata,
    image_count: usize,
    main_jpeg: Vec<u8>,
    collage_jpeg: Option<Vec<u8>>,
}

/// Result of the blocking extraction phase.
struct Extraction {
    page_count: usize,
    /// One entry per page; `Ok(None)` for pages without product images
    pages: Vec<(u32, Result<Option<ExtractedPage>>)>,
}

/// Turns PDF catalogs into products.
pub struct Ingestor {
    config: IngestConfig,
    store: Arc<dyn ObjectStore>,
    pool: SqlitePool,
    products: ProductRepository,
    sessions: SessionRepository,
    http: reqwest::Client,
}

impl Ingestor {
    pub fn new(config: &Config, store: Arc<dyn ObjectStore>, pool: SqlitePool) -> Result<Self> {
        Ok(Self {
            config: config.ingest.clone(),
            store,
            products: ProductRepository::new(pool.clone()),
            sessions: SessionRepository::new(pool.clone()),
            pool,
            http: create_async_client(&config.http)?,
        })
    }

    /// Ingest a PDF held in memory.
    ///
    /// Fails only when the document cannot be opened or the final database
    /// write fails. Problems on individual pages are logged and counted in
    /// `pages_failed`.
    pub async fn ingest(&self, pdf: Vec<u8>, source_file: Option<String>) -> Result<IngestReport> {
        let session_id = new_session_id();
        let source_sha256 = sha256_hex(&pdf);
        log::info!(
            "Ingest session {} started ({} bytes, source {:?})",
            session_id,
            pdf.len(),
            source_file
        );

        let config = self.config.clone();
        let extraction = tokio::task::spawn_blocking(move || extract_pages(&pdf, &config)).await??;

        let mut report = IngestReport {
            session_id: session_id.clone(),
            pages_processed: extraction.page_count,
            ..IngestReport::default()
        };
        let mut products = Vec::new();

        for (page_number, outcome) in extraction.pages {
            let page = match outcome {
                Ok(Some(page)) => page,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("Skipping page {}: {}", page_number, e);
                    report.pages_failed += 1;
                    continue;
                }
            };

            report.images_extracted += page.image_count;
            match self.store_page(&session_id, &page).await {
                Ok((main_key, collage)) => {
                    if collage.is_some() {
                        report.collages_created += 1;
                    }
                    products.push(self.new_product(&session_id, source_file.as_deref(), page, main_key, collage));
                }
                Err(e) => {
                    log::warn!("Skipping page {}: {}", page_number, e);
                    report.pages_failed += 1;
                }
            }
        }
        report.products_created = products.len();

        let session = IngestSession {
            id: session_id.clone(),
            source_file,
            source_sha256,
            pages_processed: report.pages_processed as i64,
            products_created: report.products_created as i64,
            images_extracted: report.images_extracted as i64,
            collages_created: report.collages_created as i64,
            created_at: Utc::now(),
        };

        let mut tx = self.pool.begin().await?;
        self.products.insert_batch(&mut tx, &products).await?;
        self.sessions.insert(&mut tx, &session).await?;
        tx.commit().await?;

        log::info!(
            "Ingest session {} done: {} pages, {} products, {} images, {} collages, {} failed",
            report.session_id,
            report.pages_processed,
            report.products_created,
            report.images_extracted,
            report.collages_created,
            report.pages_failed
        );
        Ok(report)
    }

    /// Ingest a PDF from the local filesystem.
    pub async fn ingest_path(&self, path: impl AsRef<Path>) -> Result<IngestReport> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        self.ingest(bytes, file_name).await
    }

    /// Download a PDF over HTTP(S) and ingest it.
    pub async fn ingest_url(&self, url: &str) -> Result<IngestReport> {
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::validation(format!(
                "Unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }

        log::info!("Downloading catalog from {}", parsed);
        let bytes = fetch_bytes(&self.http, parsed.as_str()).await?;
        self.ingest(bytes, Some(file_name_from_url(&parsed))).await
    }

    /// Upload the main image and, when present, the collage.
    async fn store_page(
        &self,
        session_id: &str,
        page: &ExtractedPage,
    ) -> Result<(String, Option<String>)> {
        let main_key = image_key(session_id, &page.sku, page.page_number);
        let collage = page
            .collage_jpeg
            .as_ref()
            .map(|bytes| (collage_key(session_id, &page.sku, page.page_number), bytes));

        let put_main = self
            .store
            .put(&main_key, page.main_jpeg.clone(), JPEG_CONTENT_TYPE);
        let put_collage = async {
            match &collage {
                Some((key, bytes)) => self.store.put(key, (*bytes).clone(), JPEG_CONTENT_TYPE).await,
                None => Ok(()),
            }
        };
        futures::try_join!(put_main, put_collage)?;

        Ok((main_key, collage.map(|(key, _)| key)))
    }

    fn new_product(
        &self,
        session_id: &str,
        source_file: Option<&str>,
        page: ExtractedPage,
        image_key: String,
        collage_key: Option<String>,
    ) -> NewProduct {
        NewProduct {
            id: uuid::Uuid::new_v4().to_string(),
            sku_code: Some(page.sku),
            cn_name: page.metadata.cn_name,
            category: Some(self.config.default_category.clone()),
            dimensions: page.metadata.dimensions,
            description: Some(format!("Product from page {}", page.page_number)),
            image_key: Some(image_key),
            collage_key,
            session_id: session_id.to_string(),
            source_file: source_file.map(str::to_string),
            page_number: page.page_number,
        }
    }
}

/// Parse the document and prepare every page. CPU-bound; run off the runtime.
fn extract_pages(pdf: &[u8], config: &IngestConfig) -> Result<Extraction> {
    let document = CatalogDocument::from_bytes(pdf)?;
    let layout = CollageLayout::from(config);

    let pages = document
        .page_numbers()
        .into_iter()
        .map(|page| (page, extract_page(&document, page, config, &layout)))
        .collect();

    Ok(Extraction {
        page_count: document.page_count(),
        pages,
    })
}

fn extract_page(
    document: &CatalogDocument,
    page_number: u32,
    config: &IngestConfig,
    layout: &CollageLayout,
) -> Result<Option<ExtractedPage>> {
    let metadata = parse_page_text(&document.page_text(page_number));
    let images = document.page_images(page_number, config.min_image_size)?;

    let Some(first) = images.first() else {
        log::debug!("Page {}: no product images", page_number);
        return Ok(None);
    };

    let sku = metadata
        .sku
        .clone()
        .unwrap_or_else(|| fallback_sku(page_number));
    let main_jpeg = encode_jpeg(&first.image, config.jpeg_quality)
        .map_err(|e| AppError::page(page_number, e))?;

    let collage_jpeg = if images.len() > 1 {
        let refs: Vec<_> = images.iter().map(|img| &img.image).collect();
        create_collage(&refs, layout)
            .map(|collage| encode_jpeg(&collage, config.jpeg_quality))
            .transpose()
            .map_err(|e| AppError::page(page_number, e))?
    } else {
        None
    };

    log::debug!(
        "Page {}: sku {}, images {:?}, collage {}",
        page_number,
        sku,
        images.iter().map(|img| img.index).collect::<Vec<_>>(),
        collage_jpeg.is_some()
    );

    Ok(Some(ExtractedPage {
        page_number,
        sku,
        metadata,
        image_count: images.len(),
        main_jpeg,
        collage_jpeg,
    }))
}
