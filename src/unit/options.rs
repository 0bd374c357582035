// Unitの構築時オプション

use crate::core::ValidationError;

/// Unit構築時に適用される設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOptions {
    workers: usize,
    input_buffer: Option<usize>,
    name: String,
}

impl UnitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// ワーカー数（出力キューとエラーキューの容量も同じ値になる）
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// 入力キューの容量。未指定ならワーカー数と同じ
    pub fn with_input_buffer(mut self, input_buffer: usize) -> Self {
        self.input_buffer = Some(input_buffer);
        self
    }

    /// ログ出力に使う名前
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn input_buffer(&self) -> usize {
        self.input_buffer.unwrap_or(self.workers)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 設定値を検証
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::new(
                "workers",
                "ワーカー数は1以上である必要があります",
            ));
        }
        if self.input_buffer() == 0 {
            return Err(ValidationError::new(
                "input_buffer",
                "入力バッファは1以上である必要があります",
            ));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("name", "名前が空です"));
        }
        Ok(())
    }
}

impl Default for UnitOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            input_buffer: None,
            name: "unit".to_string(),
        }
    }
}
