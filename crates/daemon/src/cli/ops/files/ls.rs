use depot_daemon::http_server::api::client::ApiError;
use depot_daemon::http_server::api::files::ListFilesRequest;

#[async_trait::async_trait]
impl crate::cli::op::Op for ListFilesRequest {
    type Error = ApiError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        let entries = client.call(self.clone()).await?;

        if entries.is_empty() {
            return Ok("No items found".to_string());
        }
        let output = entries
            .iter()
            .map(|entry| {
                if entry.is_directory {
                    format!("{}/", entry.name)
                } else {
                    format!("{} ({} bytes)", entry.name, entry.size)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(output)
    }
}
