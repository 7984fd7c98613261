use serde::{Deserialize, Serialize};

/// 既定重み（キーワード・勤務地・給与を均等配分）
pub const DEFAULT_WEIGHTS: Weights = Weights {
    keyword: 1.0 / 3.0,
    location: 1.0 / 3.0,
    salary: 1.0 / 3.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub keyword: f64,
    pub location: f64,
    pub salary: f64,
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.keyword + self.location + self.salary
    }
}

impl Default for Weights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}
