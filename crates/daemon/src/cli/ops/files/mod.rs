use clap::{Args, Subcommand};

pub mod info;
pub mod ls;
pub mod mkdir;
pub mod put;
pub mod rm;

use crate::cli::op::Op;
use depot_daemon::http_server::api::delete::DeleteRequest;
use depot_daemon::http_server::api::directory::CreateDirectoryRequest;
use depot_daemon::http_server::api::file::FileInfoRequest;
use depot_daemon::http_server::api::files::ListFilesRequest;

crate::command_enum! {
    (Ls, ListFilesRequest),
    (Info, FileInfoRequest),
    (Mkdir, CreateDirectoryRequest),
    (Rm, DeleteRequest),
    (Put, put::Put),
}

pub type FilesCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Files {
    #[command(subcommand)]
    pub command: FilesCommand,
}

#[async_trait::async_trait]
impl Op for Files {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
