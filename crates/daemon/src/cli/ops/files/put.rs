use std::path::PathBuf;

use clap::Args;

use common::category::Category;
use depot_daemon::http_server::api::client::ApiError;
use depot_daemon::http_server::api::upload::UploadFileRequest;

#[derive(Args, Debug, Clone)]
pub struct Put {
    /// Local file to upload
    pub file: PathBuf,

    /// Category directory to store into (wins over --namespace)
    #[arg(long)]
    pub category: Option<Category>,

    /// Namespace directory to store into
    #[arg(long)]
    pub namespace: Option<String>,

    /// Name to upload as (defaults to the local file name)
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PutError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot derive a file name from {0}, pass --name")]
    NoFileName(PathBuf),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Put {
    type Error = PutError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let filename = match &self.name {
            Some(name) => name.clone(),
            None => self
                .file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| PutError::NoFileName(self.file.clone()))?,
        };
        let data = tokio::fs::read(&self.file)
            .await
            .map_err(|source| PutError::Read {
                path: self.file.clone(),
                source,
            })?;
        let mime_type = mime_guess::from_path(&self.file)
            .first_raw()
            .map(str::to_string);

        let request = UploadFileRequest {
            filename,
            data,
            mime_type,
            category: self.category,
            namespace: self.namespace.clone(),
        };

        let mut client = ctx.client.clone();
        let response = client.call(request).await?;

        let mut lines = vec![
            format!("Uploaded {} ({} bytes)", response.filename, response.size),
            format!("  category: {}", response.category),
        ];
        if let Some(namespace) = response.namespace {
            lines.push(format!("  namespace: {}", namespace));
        }
        lines.push(format!("  url: {}", response.url));
        Ok(lines.join("\n"))
    }
}
