pub mod daemon;
pub mod files;
pub mod health;
pub mod init;
pub mod sweep;
pub mod version;

pub use daemon::Daemon;
pub use files::Files;
pub use health::Health;
pub use init::Init;
pub use sweep::Sweep;
pub use version::Version;
