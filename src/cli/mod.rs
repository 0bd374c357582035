// CLI層 - デモプログラムの引数定義とコマンド
// エンジンの外側にある呼び出し側として Unit の公開APIだけを使う

pub mod args;
pub mod commands;

use tracing_subscriber::EnvFilter;

// 公開API
pub use args::*;
pub use commands::*;

/// tracingの初期化。RUST_LOG が未設定なら `default_level` を使う
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
