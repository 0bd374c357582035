// 統合テスト共通のヘルパー
#![allow(dead_code)]

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use unit_pipeline::{Unit, UnitOptions};

pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// ワーカー数と名前を指定したUnitを作成
pub fn unit_with_workers<I, O>(name: &str, workers: usize) -> Unit<I, O>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    Unit::with_options(UnitOptions::new().with_workers(workers).with_name(name))
        .expect("有効なオプション")
}

/// 受信側が閉じるまで全件を集めるタスク
pub fn collect_all<T: Send + 'static>(mut rx: mpsc::Receiver<T>) -> JoinHandle<Vec<T>> {
    tokio::spawn(async move {
        let mut items = Vec::new();
        while let Some(item) = rx.recv().await {
            items.push(item);
        }
        items
    })
}
