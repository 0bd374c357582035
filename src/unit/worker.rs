// Worker - 共有入力キューを奪い合う並列ワーカー

use super::input::UnitInput;
use super::state::SharedStates;
use crate::core::{ErrorRecord, Executor};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// 成功した結果の送り先
pub(crate) enum ResultSink<O> {
    /// このUnit自身の出力キュー
    Output(mpsc::Sender<O>),
    /// 連結された下流Unitの入力キュー
    Next(UnitInput<O>),
}

impl<O> Clone for ResultSink<O> {
    fn clone(&self) -> Self {
        match self {
            Self::Output(tx) => Self::Output(tx.clone()),
            Self::Next(input) => Self::Next(input.clone()),
        }
    }
}

/// 全ワーカーで共有する実行コンテキスト
pub(crate) struct WorkerContext<I, O> {
    pub(crate) unit_name: Arc<str>,
    pub(crate) executor: Arc<dyn Executor<I, O>>,
    pub(crate) work_rx: Arc<Mutex<mpsc::Receiver<I>>>,
    pub(crate) sink: ResultSink<O>,
    pub(crate) errors_tx: mpsc::Sender<ErrorRecord<I>>,
    pub(crate) states: SharedStates,
}

impl<I, O> Clone for WorkerContext<I, O> {
    fn clone(&self) -> Self {
        Self {
            unit_name: Arc::clone(&self.unit_name),
            executor: Arc::clone(&self.executor),
            work_rx: Arc::clone(&self.work_rx),
            sink: self.sink.clone(),
            errors_tx: self.errors_tx.clone(),
            states: self.states.clone(),
        }
    }
}

impl<I, O> WorkerContext<I, O>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    /// アイテム1件の処理。カウンタはworker_idのスロットにだけ書く
    pub(crate) async fn execute(&self, worker_id: usize, item: I) {
        let state = self.states.slot(worker_id);
        state.record_attempt();

        let outcome = AssertUnwindSafe(self.executor.execute(item.clone()))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(unit = %self.unit_name, worker_id, %message, "変換関数がpanicしました");
                Err(anyhow::anyhow!("変換関数がpanicしました: {message}"))
            }
        };

        match result {
            Ok(output) => {
                state.record_done();
                trace!(unit = %self.unit_name, worker_id, "アイテム処理成功");
                self.forward(worker_id, output).await;
            }
            Err(error) => {
                state.record_error();
                trace!(unit = %self.unit_name, worker_id, %error, "アイテム処理失敗");
                if self
                    .errors_tx
                    .send(ErrorRecord::new(error, item))
                    .await
                    .is_err()
                {
                    debug!(unit = %self.unit_name, worker_id, "エラー受信側が閉じられています");
                }
            }
        }
    }

    async fn forward(&self, worker_id: usize, output: O) {
        let delivered = match &self.sink {
            ResultSink::Output(tx) => tx.send(output).await.is_ok(),
            ResultSink::Next(next) => next.send(output).await.is_ok(),
        };
        if !delivered {
            warn!(unit = %self.unit_name, worker_id, "送り先が閉じられているため結果を破棄しました");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// 単一ワーカー。入力キューが閉じて空になるまで処理を続ける
pub(crate) fn spawn_single_worker<I, O>(
    worker_id: usize,
    context: WorkerContext<I, O>,
) -> JoinHandle<()>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    tokio::spawn(async move {
        loop {
            // 次の作業を取得
            let item = {
                let mut rx = context.work_rx.lock().await;
                match rx.recv().await {
                    Some(item) => item,
                    None => break, // 入力終了
                }
            };

            context.execute(worker_id, item).await;
        }
        trace!(unit = %context.unit_name, worker_id, "ワーカー終了");
    })
}

/// ワーカープールを起動
pub(crate) fn spawn_workers<I, O>(
    context: WorkerContext<I, O>,
    worker_count: usize,
) -> Vec<JoinHandle<()>>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    (0..worker_count)
        .map(|worker_id| spawn_single_worker(worker_id, context.clone()))
        .collect()
}
