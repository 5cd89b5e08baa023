pub mod config;
pub mod context;
pub mod error;

pub use config::Config;
pub use context::SecurityContext;
pub use error::{MemoError, Result};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// 初始化日志
///
/// 宿主应用在进程启动时调用一次
pub fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}
