// デモコマンド共通の入力生成とシャットダウン処理

pub mod chain;
pub mod single;

pub use chain::*;
pub use single::*;

use crate::unit::UnitInput;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Ctrl-C を受けるか `max_items` 件を送るまで `generate` の結果を投入し続ける
///
/// 送信できた件数を返す。
pub async fn feed_until_shutdown<T, G>(
    input: &UnitInput<T>,
    max_items: Option<u64>,
    mut generate: G,
) -> u64
where
    T: Send,
    G: FnMut(u64) -> T,
{
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut sent = 0;
    loop {
        if max_items.is_some_and(|max| sent >= max) {
            info!(sent, "指定件数を投入しました");
            break;
        }
        let item = generate(sent);
        tokio::select! {
            signal = &mut shutdown => {
                match signal {
                    Ok(()) => info!(sent, "割り込みシグナルを受信しました"),
                    Err(e) => warn!(error = %e, "シグナルハンドラを設定できませんでした"),
                }
                break;
            }
            result = input.send(item) => {
                if result.is_err() {
                    warn!(sent, "入力が閉じられています");
                    break;
                }
                sent += 1;
            }
        }
    }
    sent
}

/// 0..=max の範囲でランダムな処理時間を模擬する
pub(crate) async fn simulate_work(max: Duration) {
    let millis = max.as_millis() as u64;
    if millis == 0 {
        return;
    }
    let delay = rand::rng().random_range(0..=millis);
    tokio::time::sleep(Duration::from_millis(delay)).await;
}
