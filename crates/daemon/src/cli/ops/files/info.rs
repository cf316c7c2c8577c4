use depot_daemon::http_server::api::client::ApiError;
use depot_daemon::http_server::api::file::FileInfoRequest;

#[async_trait::async_trait]
impl crate::cli::op::Op for FileInfoRequest {
    type Error = ApiError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        let file = client.call(self.clone()).await?;

        let mut lines = vec![
            format!("path:     {}", file.relative_path()),
            format!("size:     {} bytes", file.size),
            format!("category: {}", file.category),
        ];
        if let Some(modified) = file.modified {
            lines.push(format!("modified: {}", modified.to_rfc3339()));
        }
        Ok(lines.join("\n"))
    }
}
