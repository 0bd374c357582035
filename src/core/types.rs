// Unitが外部に公開する値型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// 変換に失敗したアイテムとその原因の組
///
/// エラーチャンネル経由で呼び出し側に届けられる。
#[derive(Debug)]
pub struct ErrorRecord<I> {
    /// 変換関数が返した（または捕捉したpanicから作った）エラー
    pub error: anyhow::Error,
    /// 失敗の原因となった入力
    pub input: I,
}

impl<I> ErrorRecord<I> {
    pub fn new(error: anyhow::Error, input: I) -> Self {
        Self { error, input }
    }
}

impl<I> fmt::Display for ErrorRecord<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl<I: fmt::Debug> std::error::Error for ErrorRecord<I> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error.as_ref())
    }
}

/// 全ワーカーのカウンタを合算した読み取り専用スナップショット
///
/// 実行中のワーカーとは同期しないため、各値は少しずつ古い可能性がある。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// デキューしたアイテム数
    pub total: u64,
    /// 変換に成功したアイテム数
    pub done: u64,
    /// 変換に失敗したアイテム数
    pub errors: u64,
}

impl StateSnapshot {
    /// 変換中のアイテム数
    pub fn in_flight(&self) -> u64 {
        self.total.saturating_sub(self.done + self.errors)
    }
}

impl Add for StateSnapshot {
    type Output = StateSnapshot;

    fn add(self, rhs: StateSnapshot) -> StateSnapshot {
        StateSnapshot {
            total: self.total + rhs.total,
            done: self.done + rhs.done,
            errors: self.errors + rhs.errors,
        }
    }
}

impl std::iter::Sum for StateSnapshot {
    fn sum<It: Iterator<Item = StateSnapshot>>(iter: It) -> Self {
        iter.fold(StateSnapshot::default(), Add::add)
    }
}

impl fmt::Display for StateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {}, Done: {}, Errors: {}",
            self.total, self.done, self.errors
        )
    }
}

/// Unitのライフサイクル段階
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    NotStarted,
    Running,
    /// 入力を閉じ、残りのアイテムを処理中
    Stopping,
    /// 終端状態
    Stopped,
}

/// Unitの状態レポート（デモやログ出力用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitReport {
    pub name: String,
    pub workers: usize,
    pub phase: Phase,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub state: StateSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_sum_and_display() {
        let snapshots = vec![
            StateSnapshot { total: 3, done: 2, errors: 1 },
            StateSnapshot { total: 5, done: 5, errors: 0 },
        ];
        let sum: StateSnapshot = snapshots.into_iter().sum();

        assert_eq!(sum, StateSnapshot { total: 8, done: 7, errors: 1 });
        assert_eq!(sum.to_string(), "Total: 8, Done: 7, Errors: 1");
        assert_eq!(sum.in_flight(), 0);
    }

    #[test]
    fn test_in_flight_never_underflows() {
        let torn = StateSnapshot { total: 1, done: 1, errors: 1 };
        assert_eq!(torn.in_flight(), 0);
    }

    #[test]
    fn test_error_record_display_uses_error() {
        let record = ErrorRecord::new(anyhow::anyhow!("壊れた入力"), 42u32);
        assert_eq!(record.to_string(), "壊れた入力");
        assert_eq!(record.input, 42);
        assert!(std::error::Error::source(&record).is_some());
    }

    #[test]
    fn test_report_serializes_phase_in_snake_case() {
        let report = UnitReport {
            name: "upper".to_string(),
            workers: 2,
            phase: Phase::NotStarted,
            started_at: None,
            ended_at: None,
            state: StateSnapshot::default(),
        };
        let json = serde_json::to_string(&report).unwrap();

        assert!(json.contains("\"phase\":\"not_started\""));
        assert!(json.contains("\"workers\":2"));
    }
}
