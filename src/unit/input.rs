// Unit入力キューへの書き込みハンドル

use tokio::sync::mpsc::{self, error::SendError, error::TrySendError};

/// 入力キューへの書き込み専用ハンドル
///
/// キューを生かしておくのはUnit自身が持つSenderだけで、このハンドルは弱参照しか持たない。
/// そのため stop() がSenderを捨てた時点で、ハンドルがいくつ残っていても入力は閉じる。
pub struct UnitInput<I> {
    tx: mpsc::WeakSender<I>,
}

impl<I> UnitInput<I> {
    pub(crate) fn new(tx: mpsc::WeakSender<I>) -> Self {
        Self { tx }
    }

    /// アイテムを投入する。キューが満杯なら空くまで待つ
    ///
    /// 入力が既に閉じていれば、アイテムを `SendError` に入れて返す。
    pub async fn send(&self, item: I) -> Result<(), SendError<I>> {
        match self.tx.upgrade() {
            Some(tx) => tx.send(item).await,
            None => Err(SendError(item)),
        }
    }

    /// 待たずに投入を試みる
    pub fn try_send(&self, item: I) -> Result<(), TrySendError<I>> {
        match self.tx.upgrade() {
            Some(tx) => tx.try_send(item),
            None => Err(TrySendError::Closed(item)),
        }
    }

    /// 入力が閉じているかどうか
    pub fn is_closed(&self) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx.is_closed(),
            None => true,
        }
    }
}

impl<I> Clone for UnitInput<I> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<I> std::fmt::Debug for UnitInput<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitInput")
            .field("closed", &self.is_closed())
            .finish()
    }
}
