// Unit専用のカスタムエラー型定義
// ライフサイクルの誤用はすべてここで表現し、アイテム単位の失敗は ErrorRecord で扱う

use thiserror::Error;

/// Unitのライフサイクル操作で発生するエラー
#[derive(Error, Debug)]
pub enum UnitError {
    #[error("start()の前にon_execute()で変換関数を設定する必要があります")]
    ExecuteFunctionNotSet,

    #[error("変換関数は既に設定されています")]
    ExecuteFunctionAlreadySet,

    #[error("Unitは既に開始されています")]
    AlreadyStarted,

    #[error("Unitは既に停止しています")]
    AlreadyStopped,

    #[error("Unitはまだ開始されていません")]
    NotStarted,

    #[error("停止待機がデッドラインを超過しました: {deadline_ms}ms")]
    DeadlineExceeded { deadline_ms: u128 },

    #[error("停止待機がキャンセルされました")]
    Cancelled,

    #[error("次のUnitが設定されているため出力は利用できません")]
    NextUnitAttached,

    #[error("{surface}は既に取得されています")]
    SurfaceTaken { surface: &'static str },

    #[error("Tokioランタイムの外でstart()が呼ばれました")]
    NoRuntime,

    #[error("完了通知を受け取る前に監視タスクが終了しました")]
    SupervisorLost,

    #[error("下流Unitエラー: {source}")]
    Downstream {
        #[source]
        source: Box<UnitError>,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl UnitError {
    /// デッドライン超過エラーの作成
    pub fn deadline_exceeded(deadline: std::time::Duration) -> Self {
        Self::DeadlineExceeded {
            deadline_ms: deadline.as_millis(),
        }
    }

    /// 取得済みサーフェスエラーの作成
    pub fn surface_taken(surface: &'static str) -> Self {
        Self::SurfaceTaken { surface }
    }

    /// 下流Unitのエラーをラップ
    pub fn downstream(source: UnitError) -> Self {
        Self::Downstream {
            source: Box::new(source),
        }
    }

    /// Downstreamラッパーを剥がした最も内側のエラー
    pub fn root(&self) -> &UnitError {
        match self {
            Self::Downstream { source } => source.root(),
            other => other,
        }
    }

    /// デッドライン超過かどうか（下流由来も含む）
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self.root(), Self::DeadlineExceeded { .. })
    }

    /// エラーの重要度を取得
    pub fn severity(&self) -> ErrorSeverity {
        match self.root() {
            Self::ExecuteFunctionNotSet
            | Self::ExecuteFunctionAlreadySet
            | Self::NextUnitAttached
            | Self::NoRuntime
            | Self::Validation(_) => ErrorSeverity::Critical,
            Self::AlreadyStarted | Self::AlreadyStopped | Self::NotStarted => ErrorSeverity::Low,
            Self::SurfaceTaken { .. } => ErrorSeverity::Medium,
            Self::DeadlineExceeded { .. } | Self::Cancelled => ErrorSeverity::High,
            Self::SupervisorLost => ErrorSeverity::Critical,
            Self::Downstream { .. } => ErrorSeverity::High,
        }
    }

    /// 呼び出し側が再試行や継続で回復できるかどうか
    pub fn is_recoverable(&self) -> bool {
        match self.root() {
            Self::AlreadyStarted | Self::AlreadyStopped | Self::NotStarted => true,
            Self::SurfaceTaken { .. } => true,
            Self::DeadlineExceeded { .. } | Self::Cancelled => true,
            Self::ExecuteFunctionNotSet | Self::NoRuntime => true,
            Self::ExecuteFunctionAlreadySet | Self::NextUnitAttached => false,
            Self::Validation(_) | Self::SupervisorLost => false,
            Self::Downstream { .. } => false,
        }
    }
}

/// エラーの重要度レベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// 低重要度 - ログ出力程度
    Low,
    /// 中重要度 - 警告レベル
    Medium,
    /// 高重要度 - 要対応
    High,
    /// 致命的 - 使い方の誤り
    Critical,
}

impl ErrorSeverity {
    /// 重要度の文字列表現を取得
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Unit操作の結果型
pub type UnitResult<T> = std::result::Result<T, UnitError>;

/// 設定値のバリデーションエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("バリデーションエラー: {field} - {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    /// 新しいバリデーションエラーを作成
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::time::Duration;

    #[test]
    fn test_lifecycle_error_messages() {
        assert!(UnitError::ExecuteFunctionNotSet
            .to_string()
            .contains("on_execute"));
        assert!(UnitError::AlreadyStarted.to_string().contains("既に開始"));
        assert!(UnitError::AlreadyStopped.to_string().contains("既に停止"));
        assert!(UnitError::NotStarted.to_string().contains("まだ開始"));
    }

    #[test]
    fn test_deadline_exceeded_reports_millis() {
        let error = UnitError::deadline_exceeded(Duration::from_millis(250));
        assert!(error.to_string().contains("250ms"));
        assert!(error.is_deadline_exceeded());
    }

    #[test]
    fn test_downstream_root_and_source_chain() {
        let error = UnitError::downstream(UnitError::downstream(UnitError::NotStarted));

        assert!(matches!(error.root(), UnitError::NotStarted));
        assert!(error.source().is_some());
        assert_eq!(error.severity(), ErrorSeverity::Low);
        assert!(error.to_string().contains("下流Unitエラー"));
    }

    #[test]
    fn test_downstream_deadline_is_detected() {
        let error = UnitError::downstream(UnitError::deadline_exceeded(Duration::from_secs(1)));
        assert!(error.is_deadline_exceeded());
        assert!(!UnitError::Cancelled.is_deadline_exceeded());
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(
            UnitError::ExecuteFunctionNotSet.severity(),
            ErrorSeverity::Critical
        );
        assert_eq!(UnitError::Cancelled.severity(), ErrorSeverity::High);
        assert_eq!(
            UnitError::surface_taken("output").severity(),
            ErrorSeverity::Medium
        );

        assert!(ErrorSeverity::Critical > ErrorSeverity::High);
        assert!(ErrorSeverity::High > ErrorSeverity::Medium);
        assert!(ErrorSeverity::Medium > ErrorSeverity::Low);
        assert_eq!(ErrorSeverity::Critical.as_str(), "CRITICAL");
    }

    #[test]
    fn test_error_recoverability() {
        assert!(UnitError::NotStarted.is_recoverable());
        assert!(!UnitError::NextUnitAttached.is_recoverable());
        assert!(!UnitError::from(ValidationError::new("workers", "0")).is_recoverable());
    }

    #[test]
    fn test_downstream_error_is_classified_by_root() {
        let error = UnitError::downstream(UnitError::deadline_exceeded(Duration::from_secs(1)));

        assert_eq!(error.severity(), ErrorSeverity::High);
        assert_eq!(error.severity().as_str(), "HIGH");
        assert!(error.is_recoverable());

        let lost = UnitError::downstream(UnitError::SupervisorLost);
        assert_eq!(lost.severity().as_str(), "CRITICAL");
        assert!(!lost.is_recoverable());
    }

    #[test]
    fn test_validation_error_conversion() {
        let validation = ValidationError::new("workers", "1以上である必要があります");
        let error: UnitError = validation.clone().into();

        assert_eq!(validation.field, "workers");
        assert!(error.to_string().contains("バリデーションエラー"));
        assert!(error.to_string().contains("workers"));
    }
}
