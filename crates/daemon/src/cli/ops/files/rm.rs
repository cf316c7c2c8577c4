use depot_daemon::http_server::api::client::ApiError;
use depot_daemon::http_server::api::delete::DeleteRequest;

#[async_trait::async_trait]
impl crate::cli::op::Op for DeleteRequest {
    type Error = ApiError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        let response = client.call(self.clone()).await?;
        Ok(format!("Deleted {} {}", response.kind, response.path))
    }
}
