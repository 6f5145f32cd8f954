//! The asset server as seen from the client: one trait, one HTTP
//! implementation.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::Serialize;
use shared::{
    domain::{AssetId, TagId},
    error::ApiException,
    protocol::{AssetPage, AssetRecord, BulkTagRequest, IdsRequest, TagRecord, TagRequest},
};
use tracing::{debug, info};
use url::Url;

const API_PREFIX: &str = "/api/v1";

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: None,
            bytes,
        }
    }
}

#[async_trait]
pub trait AssetBackend: Send + Sync {
    async fn list_assets(&self, page: u32, limit: u32, tag_filter: Option<&str>)
        -> Result<AssetPage>;
    async fn delete_asset(&self, id: &AssetId) -> Result<()>;
    async fn bulk_delete_assets(&self, ids: &[AssetId]) -> Result<()>;
    async fn upload_asset(&self, file: UploadFile) -> Result<AssetRecord>;
    /// Queues a compression job; the outcome shows up in later listings.
    async fn compress_asset(&self, id: &AssetId) -> Result<()>;
    async fn bulk_compress_assets(&self, ids: &[AssetId]) -> Result<()>;
    async fn list_tags(&self) -> Result<Vec<TagRecord>>;
    async fn create_tag(&self, name: &str, color: &str) -> Result<TagRecord>;
    async fn update_tag(&self, id: &TagId, name: &str, color: &str) -> Result<TagRecord>;
    /// Server-side this also deletes every asset carrying the tag.
    async fn delete_tag(&self, id: &TagId) -> Result<()>;
    /// Replaces the tag set of each asset with exactly `tag_ids`.
    async fn bulk_tag_assets(&self, asset_ids: &[AssetId], tag_ids: &[TagId]) -> Result<()>;
    async fn download_asset(&self, id: &AssetId) -> Result<Vec<u8>>;
    fn download_url(&self, id: &AssetId) -> String;
}

#[derive(Serialize)]
struct ListAssetsQuery<'a> {
    page: u32,
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<&'a str>,
}

pub struct HttpAssetBackend {
    http: Client,
    api_base: String,
}

impl HttpAssetBackend {
    pub fn new(server_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self> {
        let parsed = Url::parse(server_url.trim())
            .with_context(|| format!("invalid server url '{server_url}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!(
                "unsupported server url scheme '{}'",
                parsed.scheme()
            ));
        }
        let root = parsed.as_str().trim_end_matches('/');
        Ok(Self {
            http,
            api_base: format!("{root}{API_PREFIX}"),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

/// Turns non-2xx responses into an [`ApiException`] carrying the body text.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiException::from_status(status.as_u16(), body).into())
}

#[async_trait]
impl AssetBackend for HttpAssetBackend {
    async fn list_assets(
        &self,
        page: u32,
        limit: u32,
        tag_filter: Option<&str>,
    ) -> Result<AssetPage> {
        debug!(page, limit, tag_filter, "assets: listing page");
        let response = self
            .http
            .get(format!("{}/assets", self.api_base))
            .query(&ListAssetsQuery {
                page,
                limit,
                tags: tag_filter,
            })
            .send()
            .await
            .context("failed to fetch asset page")?;
        let page: AssetPage = check_status(response)
            .await?
            .json()
            .await
            .context("malformed asset page")?;
        Ok(page)
    }

    async fn delete_asset(&self, id: &AssetId) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/assets/{id}", self.api_base))
            .send()
            .await
            .with_context(|| format!("failed to delete asset {id}"))?;
        check_status(response).await?;
        info!(asset_id = %id, "assets: deleted");
        Ok(())
    }

    async fn bulk_delete_assets(&self, ids: &[AssetId]) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/assets/bulk/delete", self.api_base))
            .json(&IdsRequest { ids: ids.to_vec() })
            .send()
            .await
            .context("failed to bulk delete assets")?;
        check_status(response).await?;
        info!(count = ids.len(), "assets: bulk deleted");
        Ok(())
    }

    async fn upload_asset(&self, file: UploadFile) -> Result<AssetRecord> {
        let file_name = file.file_name.clone();
        let size = file.bytes.len();
        let mut part = multipart::Part::bytes(file.bytes).file_name(file.file_name);
        if let Some(mime) = &file.mime_type {
            part = part
                .mime_str(mime)
                .with_context(|| format!("invalid mime type '{mime}'"))?;
        }
        let form = multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(format!("{}/assets", self.api_base))
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("failed to upload '{file_name}'"))?;
        let asset: AssetRecord = check_status(response)
            .await?
            .json()
            .await
            .context("malformed upload response")?;
        info!(file_name = %file_name, size, asset_id = %asset.id, "assets: uploaded");
        Ok(asset)
    }

    async fn compress_asset(&self, id: &AssetId) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/assets/{id}/compress", self.api_base))
            .send()
            .await
            .with_context(|| format!("failed to request compression of {id}"))?;
        check_status(response).await?;
        Ok(())
    }

    async fn bulk_compress_assets(&self, ids: &[AssetId]) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/assets/bulk/compress", self.api_base))
            .json(&IdsRequest { ids: ids.to_vec() })
            .send()
            .await
            .context("failed to request bulk compression")?;
        check_status(response).await?;
        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<TagRecord>> {
        let response = self
            .http
            .get(format!("{}/tags", self.api_base))
            .send()
            .await
            .context("failed to fetch tags")?;
        // The backend encodes an empty tag table as `null`.
        let tags: Option<Vec<TagRecord>> = check_status(response)
            .await?
            .json()
            .await
            .context("malformed tag list")?;
        Ok(tags.unwrap_or_default())
    }

    async fn create_tag(&self, name: &str, color: &str) -> Result<TagRecord> {
        let response = self
            .http
            .post(format!("{}/tags", self.api_base))
            .json(&TagRequest {
                name: name.to_string(),
                color: color.to_string(),
            })
            .send()
            .await
            .with_context(|| format!("failed to create tag '{name}'"))?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn update_tag(&self, id: &TagId, name: &str, color: &str) -> Result<TagRecord> {
        let response = self
            .http
            .put(format!("{}/tags/{id}", self.api_base))
            .json(&TagRequest {
                name: name.to_string(),
                color: color.to_string(),
            })
            .send()
            .await
            .with_context(|| format!("failed to update tag {id}"))?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn delete_tag(&self, id: &TagId) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/tags/{id}", self.api_base))
            .send()
            .await
            .with_context(|| format!("failed to delete tag {id}"))?;
        check_status(response).await?;
        info!(tag_id = %id, "tags: deleted with associated assets");
        Ok(())
    }

    async fn bulk_tag_assets(&self, asset_ids: &[AssetId], tag_ids: &[TagId]) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/tags/bulk/assets", self.api_base))
            .json(&BulkTagRequest {
                asset_ids: asset_ids.to_vec(),
                tag_ids: tag_ids.to_vec(),
            })
            .send()
            .await
            .context("failed to tag assets")?;
        check_status(response).await?;
        Ok(())
    }

    async fn download_asset(&self, id: &AssetId) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(self.download_url(id))
            .send()
            .await
            .with_context(|| format!("failed to download asset {id}"))?;
        let bytes = check_status(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    fn download_url(&self, id: &AssetId) -> String {
        format!("{}/assets/{id}/download", self.api_base)
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
