//! 汎用ワーカープールによる並列処理ステージ
//!
//! [`Unit`] は変換関数を固定数のワーカーで並列に適用し、結果を自身の出力キューか
//! 連結された下流Unitの入力キューへ送る。下流Unitを連結すると start()/stop() は連鎖する。

pub mod cli;
pub mod core;
pub mod unit;

pub use crate::core::{
    ErrorRecord, ErrorSeverity, Executor, NextUnit, Phase, StateSnapshot, UnitError, UnitReport,
    UnitResult, ValidationError,
};
pub use crate::unit::{Unit, UnitInput, UnitOptions};
