//! 情景与人设类型
//!
//! 会话开始后二者不可变：状态机只持有引用快照，从不回写。

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// 培训情景：必做步骤、关键错误、时间压力
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub title: String,
    pub description: String,
    /// 有序且唯一的必做步骤标签
    pub required_steps: Vec<String>,
    /// 情景定义的关键错误标签（触发即计入提前终止）
    pub critical_errors: Vec<String>,
    /// 时间压力 1-10
    pub time_pressure: u8,
}

/// 客人人设：特质、隐藏动机、沟通风格与情绪弧
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub background: String,
    pub traits: Vec<String>,
    /// 隐藏动机：按情绪弧进度逐步向学员透露
    pub hidden_motivations: Vec<String>,
    pub communication_style: String,
    /// 有序情绪弧（≥1 阶段），如 curious → concerned → frustrated → satisfied
    pub arc: Vec<String>,
}

/// 保序去重：重复条目（不要求相邻）只留第一次出现
fn dedup_preserving(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    items.retain(|s| seen.insert(s.clone()));
}

impl Scenario {
    /// 结构校验与安全钳制：步骤与错误标签保序去重（含非相邻重复）、
    /// 时间压力钳到 1-10；空步骤集视为畸形
    pub fn validate(mut self) -> Result<Self, String> {
        self.required_steps.retain(|s| !s.trim().is_empty());
        dedup_preserving(&mut self.required_steps);
        self.critical_errors.retain(|s| !s.trim().is_empty());
        dedup_preserving(&mut self.critical_errors);
        if self.required_steps.is_empty() {
            return Err("scenario has no required steps".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("scenario title is empty".to_string());
        }
        self.time_pressure = self.time_pressure.clamp(1, 10);
        Ok(self)
    }
}

impl Persona {
    /// 结构校验：情绪弧至少 1 个阶段，否则视为畸形（走兜底人设）
    pub fn validate(mut self) -> Result<Self, String> {
        self.arc.retain(|s| !s.trim().is_empty());
        if self.arc.is_empty() {
            return Err("persona arc is empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("persona name is empty".to_string());
        }
        Ok(self)
    }
}
