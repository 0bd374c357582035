// コアトレイト定義 - 変換関数と連結契約の抽象化

use super::error::UnitResult;
use crate::unit::UnitInput;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// 入力1件を出力1件へ変換する処理
///
/// `Err` を返したアイテムはエラーチャンネルに報告され、他のアイテムの処理には影響しない。
#[async_trait]
pub trait Executor<I, O>: Send + Sync {
    async fn execute(&self, input: I) -> anyhow::Result<O>;
}

// async クロージャをそのまま変換関数として使えるようにする
#[async_trait]
impl<I, O, F, Fut> Executor<I, O> for F
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
{
    async fn execute(&self, input: I) -> anyhow::Result<O> {
        (self)(input).await
    }
}

/// 上流Unitの後段として接続できるUnitの契約
///
/// 上流は具象型を知らずにこのトレイト経由で入力の投入と開始・停止の連鎖を行う。
#[async_trait]
pub trait NextUnit<I: Send + 'static>: Send + Sync {
    /// 入力キューへの書き込みハンドル
    fn input(&self) -> UnitInput<I>;

    /// 上流のstart()から連鎖して呼ばれる
    fn start(&self) -> UnitResult<()>;

    /// 上流のstop()から、残り時間をデッドラインとして連鎖して呼ばれる
    async fn stop(&self, deadline: Duration) -> UnitResult<()>;
}
