use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde_json::Value;

/// Thin client for the faceregd HTTP API.
pub struct Client {
    http: reqwest::Client,
    base: String,
}

impl Client {
    pub fn new(server: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            base: server.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base, path)
    }

    pub async fn create(&self, name: &str, images: &[impl AsRef<Path>]) -> Result<Value> {
        if images.is_empty() {
            bail!("at least one image is required");
        }
        let mut form = Form::new().text("name", name.to_string());
        for image in images {
            form = form.part("image", image_part(image.as_ref()).await?);
        }
        let resp = self.http.post(self.url("/users")).multipart(form).send().await?;
        read_json(resp).await
    }

    pub async fn delete(&self, identity_id: &str) -> Result<Value> {
        let resp = self
            .http
            .delete(self.url(&format!("/users/{identity_id}")))
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn search(&self, image: &Path) -> Result<Value> {
        self.post_image("/users/search", image).await
    }

    pub async fn detect(&self, image: &Path) -> Result<Value> {
        self.post_image("/users/detect", image).await
    }

    pub async fn list(&self) -> Result<Value> {
        let resp = self.http.get(self.url("/users")).send().await?;
        read_json(resp).await
    }

    pub async fn status(&self) -> Result<Value> {
        let resp = self.http.get(self.url("/status")).send().await?;
        read_json(resp).await
    }

    async fn post_image(&self, path: &str, image: &Path) -> Result<Value> {
        let form = Form::new().part("image", image_part(image).await?);
        let resp = self.http.post(self.url(path)).multipart(form).send().await?;
        read_json(resp).await
    }
}

async fn image_part(path: &Path) -> Result<Part> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image.jpg".to_string());
    Ok(Part::bytes(bytes).file_name(file_name))
}

/// Body of a successful response, or an error carrying the server's `detail`.
async fn read_json(resp: Response) -> Result<Value> {
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        bail!("server returned {status}: {}", error_detail(&text));
    }
    serde_json::from_str(&text).with_context(|| format!("unexpected response: {text}"))
}

fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
