// Unit - ワーカープールによる並列処理ステージ
//
// ライフサイクル: NotStarted -> Running -> Stopping -> Stopped
// 下流Unitが連結されている場合、start()/stop() は下流へ連鎖する。

use super::input::UnitInput;
use super::options::UnitOptions;
use super::state::SharedStates;
use super::worker::{spawn_workers, ResultSink, WorkerContext};
use crate::core::{
    ErrorRecord, Executor, NextUnit, Phase, StateSnapshot, UnitError, UnitReport, UnitResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info};

#[derive(Debug, Default)]
struct Lifecycle {
    phase: Phase,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

/// 入力型 `I` を出力型 `O` に変換する並列処理ステージ
///
/// 構築後に [`Unit::on_execute`] で変換関数を設定し、[`Unit::start`] でワーカーを起動する。
/// 入力は [`Unit::input`]、結果は [`Unit::output`]、失敗は [`Unit::errors`] から扱う。
/// [`Unit::set_next_unit`] で下流Unitを連結すると、結果は下流の入力へ直接流れる。
///
/// `start()` はTokioランタイム内で呼ぶ必要がある。
///
/// 失敗したアイテムを [`ErrorRecord`] として返すため、ワーカーは変換関数へ渡す前に
/// 入力を毎回 `clone()` する。大きな入力は `Arc` などで包んで複製を安くしておくこと。
pub struct Unit<I, O> {
    options: UnitOptions,
    name: Arc<str>,
    executor: Option<Arc<dyn Executor<I, O>>>,
    states: SharedStates,
    lifecycle: Arc<Mutex<Lifecycle>>,

    // 入力キューを生かしている唯一のSender。stop()で捨てる
    input_tx: Mutex<Option<mpsc::Sender<I>>>,
    input_weak: mpsc::WeakSender<I>,
    input_rx: Mutex<Option<mpsc::Receiver<I>>>,

    // 下流Unitが連結されていない間だけ存在する
    output_tx: Mutex<Option<mpsc::Sender<O>>>,
    output_rx: Mutex<Option<mpsc::Receiver<O>>>,

    errors_tx: Mutex<Option<mpsc::Sender<ErrorRecord<I>>>>,
    errors_rx: Mutex<Option<mpsc::Receiver<ErrorRecord<I>>>>,

    done_tx: Mutex<Option<watch::Sender<bool>>>,
    done_rx: watch::Receiver<bool>,

    next: Option<Arc<dyn NextUnit<O>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<I, O> Unit<I, O>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    /// デフォルト設定（ワーカー数 = CPU数）でUnitを作成
    pub fn new() -> Self {
        Self::build(UnitOptions::default())
    }

    /// 設定を検証してUnitを作成
    pub fn with_options(options: UnitOptions) -> UnitResult<Self> {
        options.validate()?;
        Ok(Self::build(options))
    }

    fn build(options: UnitOptions) -> Self {
        let workers = options.workers();
        let (input_tx, input_rx) = mpsc::channel(options.input_buffer());
        let (output_tx, output_rx) = mpsc::channel(workers);
        let (errors_tx, errors_rx) = mpsc::channel(workers);
        let (done_tx, done_rx) = watch::channel(false);

        Self {
            name: Arc::from(options.name()),
            options,
            executor: None,
            states: SharedStates::new(workers),
            lifecycle: Arc::new(Mutex::new(Lifecycle::default())),
            input_weak: input_tx.downgrade(),
            input_tx: Mutex::new(Some(input_tx)),
            input_rx: Mutex::new(Some(input_rx)),
            output_tx: Mutex::new(Some(output_tx)),
            output_rx: Mutex::new(Some(output_rx)),
            errors_tx: Mutex::new(Some(errors_tx)),
            errors_rx: Mutex::new(Some(errors_rx)),
            done_tx: Mutex::new(Some(done_tx)),
            done_rx,
            next: None,
        }
    }

    /// 変換関数を設定する（async クロージャ）
    pub fn on_execute<F, Fut>(&mut self, execute: F) -> UnitResult<()>
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
    {
        self.set_executor(Arc::new(execute))
    }

    /// 変換関数を設定する。設定できるのは開始前に一度だけ
    pub fn set_executor(&mut self, executor: Arc<dyn Executor<I, O>>) -> UnitResult<()> {
        if self.phase() != Phase::NotStarted {
            return Err(UnitError::AlreadyStarted);
        }
        if self.executor.is_some() {
            return Err(UnitError::ExecuteFunctionAlreadySet);
        }
        self.executor = Some(executor);
        Ok(())
    }

    /// 下流Unitを連結する。このUnit自身の出力キューは破棄される
    ///
    /// 連結後は start()/stop() が下流へ連鎖するため、下流を個別に開始してはならない。
    pub fn set_next_unit(&mut self, next: Arc<dyn NextUnit<O>>) -> UnitResult<()> {
        if self.phase() != Phase::NotStarted {
            return Err(UnitError::AlreadyStarted);
        }
        lock(&self.output_tx).take();
        lock(&self.output_rx).take();
        self.next = Some(next);
        debug!(unit = %self.name, "下流Unitを連結しました");
        Ok(())
    }

    pub fn has_next_unit(&self) -> bool {
        self.next.is_some()
    }

    /// 入力キューへの書き込みハンドル。構築直後から利用できる
    pub fn input(&self) -> UnitInput<I> {
        UnitInput::new(self.input_weak.clone())
    }

    /// 出力キューの受信側。取得できるのは一度だけ
    ///
    /// 下流Unitが連結されている場合は `NextUnitAttached` を返す。
    pub fn output(&self) -> UnitResult<mpsc::Receiver<O>> {
        if self.has_next_unit() {
            return Err(UnitError::NextUnitAttached);
        }
        lock(&self.output_rx)
            .take()
            .ok_or_else(|| UnitError::surface_taken("output"))
    }

    /// 失敗したアイテムの受信側。Unitが終了すると閉じる
    ///
    /// キュー容量はワーカー数と同じで、満杯になるとワーカーは受信されるまで待つ。
    pub fn errors(&self) -> UnitResult<mpsc::Receiver<ErrorRecord<I>>> {
        lock(&self.errors_rx)
            .take()
            .ok_or_else(|| UnitError::surface_taken("errors"))
    }

    /// ワーカーを起動する
    ///
    /// 下流Unitが連結されていれば、ローカルのワーカーより先に下流を開始する。
    /// 下流の開始に失敗した場合、このUnitは NotStarted のまま `Downstream` エラーを返す。
    pub fn start(&self) -> UnitResult<()> {
        let executor = self
            .executor
            .clone()
            .ok_or(UnitError::ExecuteFunctionNotSet)?;

        let mut lifecycle = lock(&self.lifecycle);
        match lifecycle.phase {
            Phase::Stopping | Phase::Stopped => return Err(UnitError::AlreadyStopped),
            Phase::Running => return Err(UnitError::AlreadyStarted),
            Phase::NotStarted => {}
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(UnitError::NoRuntime);
        }

        if let Some(next) = &self.next {
            next.start().map_err(|e| {
                error!(
                    unit = %self.name,
                    error = %e,
                    severity = e.severity().as_str(),
                    "下流Unitの開始に失敗しました"
                );
                UnitError::downstream(e)
            })?;
        }

        let (Some(work_rx), Some(errors_tx), Some(done_tx)) = (
            lock(&self.input_rx).take(),
            lock(&self.errors_tx).take(),
            lock(&self.done_tx).take(),
        ) else {
            return Err(UnitError::AlreadyStarted);
        };
        let sink = match &self.next {
            Some(next) => ResultSink::Next(next.input()),
            None => match lock(&self.output_tx).take() {
                Some(output_tx) => ResultSink::Output(output_tx),
                None => return Err(UnitError::AlreadyStarted),
            },
        };

        let context = WorkerContext {
            unit_name: Arc::clone(&self.name),
            executor,
            work_rx: Arc::new(tokio::sync::Mutex::new(work_rx)),
            sink,
            errors_tx,
            states: self.states.clone(),
        };
        let workers = self.states.len();
        let handles = spawn_workers(context, workers);

        lifecycle.phase = Phase::Running;
        lifecycle.started_at = Some(Utc::now());
        drop(lifecycle);
        info!(unit = %self.name, workers, chained = self.has_next_unit(), "Unitを開始しました");

        // 監視タスク: 全ワーカーの終了を待ち、終端状態を記録してから完了を通知する
        let lifecycle = Arc::clone(&self.lifecycle);
        let name = Arc::clone(&self.name);
        tokio::spawn(async move {
            for handle in handles {
                if let Err(e) = handle.await {
                    error!(unit = %name, error = %e, "ワーカータスクが異常終了しました");
                }
            }
            {
                let mut lifecycle = lock(&lifecycle);
                lifecycle.phase = Phase::Stopped;
                lifecycle.ended_at = Some(Utc::now());
            }
            debug!(unit = %name, "全ワーカーが終了しました");
            let _ = done_tx.send(true);
        });

        Ok(())
    }

    /// 入力を閉じ、残りのアイテムが処理されるまで最大 `deadline` 待つ
    ///
    /// デッドラインを超えた場合は `DeadlineExceeded` を返すが、処理中のアイテムは
    /// バックグラウンドで最後まで実行される。その結果が観測される保証はない。
    /// `Duration::MAX` のように現在時刻に加算できない値は無期限の待機になる。
    pub async fn stop(&self, deadline: Duration) -> UnitResult<()> {
        self.stop_with_cancel(deadline, std::future::pending()).await
    }

    /// [`Unit::stop`] に加え、`cancel` が完了した時点で `Cancelled` を返す
    pub async fn stop_with_cancel<F>(&self, deadline: Duration, cancel: F) -> UnitResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        {
            let mut lifecycle = lock(&self.lifecycle);
            match lifecycle.phase {
                Phase::NotStarted => return Err(UnitError::NotStarted),
                Phase::Stopping | Phase::Stopped => return Err(UnitError::AlreadyStopped),
                Phase::Running => lifecycle.phase = Phase::Stopping,
            }
        }
        // Instantで表せないほど長いデッドラインは無期限として扱う
        let deadline_at = Instant::now().checked_add(deadline);

        // 入力を閉じる。キューに残ったアイテムはワーカーが処理してから終了する
        drop(lock(&self.input_tx).take());
        debug!(unit = %self.name, "入力を閉じました");

        let expired = async {
            match deadline_at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            result = wait_done(self.done_rx.clone()) => result?,
            _ = expired => {
                let e = UnitError::deadline_exceeded(deadline);
                error!(
                    unit = %self.name,
                    ?deadline,
                    severity = e.severity().as_str(),
                    "停止待機がデッドラインを超過しました"
                );
                return Err(e);
            }
            _ = cancel => {
                debug!(unit = %self.name, "停止待機がキャンセルされました");
                return Err(UnitError::Cancelled);
            }
        }
        info!(unit = %self.name, state = %self.state(), "Unitを停止しました");

        if let Some(next) = &self.next {
            let remaining = match deadline_at {
                Some(at) => at.saturating_duration_since(Instant::now()),
                None => deadline,
            };
            next.stop(remaining).await.map_err(|e| {
                error!(
                    unit = %self.name,
                    error = %e,
                    severity = e.severity().as_str(),
                    recoverable = e.is_recoverable(),
                    "下流Unitの停止に失敗しました"
                );
                UnitError::downstream(e)
            })?;
        }
        Ok(())
    }

    /// 全ワーカーのカウンタを合算したスナップショット
    pub fn state(&self) -> StateSnapshot {
        self.states.aggregate()
    }

    /// ワーカーごとのスナップショット（インデックス = ワーカーID）
    pub fn worker_states(&self) -> Vec<StateSnapshot> {
        self.states.per_worker()
    }

    pub fn phase(&self) -> Phase {
        lock(&self.lifecycle).phase
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        lock(&self.lifecycle).started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        lock(&self.lifecycle).ended_at
    }

    pub fn workers(&self) -> usize {
        self.options.workers()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn report(&self) -> UnitReport {
        let lifecycle = lock(&self.lifecycle);
        UnitReport {
            name: self.name.to_string(),
            workers: self.workers(),
            phase: lifecycle.phase,
            started_at: lifecycle.started_at,
            ended_at: lifecycle.ended_at,
            state: self.state(),
        }
    }
}

impl<I, O> Default for Unit<I, O>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_done(mut done_rx: watch::Receiver<bool>) -> UnitResult<()> {
    loop {
        let done = *done_rx.borrow_and_update();
        if done {
            return Ok(());
        }
        if done_rx.changed().await.is_err() {
            let done = *done_rx.borrow();
            return if done {
                Ok(())
            } else {
                Err(UnitError::SupervisorLost)
            };
        }
    }
}

#[async_trait]
impl<I, O> NextUnit<I> for Unit<I, O>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    fn input(&self) -> UnitInput<I> {
        Unit::input(self)
    }

    fn start(&self) -> UnitResult<()> {
        Unit::start(self)
    }

    async fn stop(&self, deadline: Duration) -> UnitResult<()> {
        Unit::stop(self, deadline).await
    }
}
