// Unitレイヤー - ワーカープールエンジン本体
//
// options  - 構築時設定
// state    - ワーカー単位のカウンタ
// input    - 入力キューへの書き込みハンドル
// worker   - ワーカーの起動とアイテム単位の実行
// engine   - ライフサイクルと連結

pub mod engine;
pub mod input;
pub mod options;
pub mod state;
mod worker;

// 公開API
pub use engine::Unit;
pub use input::UnitInput;
pub use options::UnitOptions;
pub use state::State;
