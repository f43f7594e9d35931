//! 事件过滤 - 按摄像头/标签的包含与排除列表决定是否通知

use crate::frigate::Event;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 包含列表的禁用哨兵值
pub const INCLUDE_ALL: &str = "All";
/// 排除列表的禁用哨兵值
pub const EXCLUDE_NONE: &str = "None";

/// 过滤策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPolicy {
    pub include_cameras: Vec<String>,
    pub exclude_cameras: Vec<String>,
    pub include_labels: Vec<String>,
    pub exclude_labels: Vec<String>,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            include_cameras: vec![INCLUDE_ALL.to_string()],
            exclude_cameras: vec![EXCLUDE_NONE.to_string()],
            include_labels: vec![INCLUDE_ALL.to_string()],
            exclude_labels: vec![EXCLUDE_NONE.to_string()],
        }
    }
}

/// 未通过过滤的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    CameraExcluded,
    CameraNotIncluded,
    LabelExcluded,
    LabelNotIncluded,
}

/// 列表只包含一个哨兵值时视为关闭
fn is_active(list: &[String], sentinel: &str) -> bool {
    !(list.len() == 1 && list[0] == sentinel)
}

fn contains(list: &[String], value: &str) -> bool {
    list.iter().any(|v| v == value)
}

impl FilterPolicy {
    /// 按顺序检查：摄像头排除、摄像头包含、标签排除、标签包含
    ///
    /// 第一个失败的检查直接返回。
    pub fn check(&self, event: &Event) -> Result<(), Rejection> {
        if is_active(&self.exclude_cameras, EXCLUDE_NONE) && contains(&self.exclude_cameras, &event.camera) {
            return Err(Rejection::CameraExcluded);
        }
        if is_active(&self.include_cameras, INCLUDE_ALL) && !contains(&self.include_cameras, &event.camera) {
            return Err(Rejection::CameraNotIncluded);
        }
        if is_active(&self.exclude_labels, EXCLUDE_NONE) && contains(&self.exclude_labels, &event.label) {
            return Err(Rejection::LabelExcluded);
        }
        if is_active(&self.include_labels, INCLUDE_ALL) && !contains(&self.include_labels, &event.label) {
            return Err(Rejection::LabelNotIncluded);
        }
        Ok(())
    }
}

/// 事件是否满足通知条件
pub fn is_eligible(event: &Event, policy: &FilterPolicy) -> bool {
    match policy.check(event) {
        Ok(()) => true,
        Err(reason) => {
            debug!(
                event_id = %event.id,
                camera = %event.camera,
                label = %event.label,
                reason = ?reason,
                "Skip event"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(camera: &str, label: &str) -> Event {
        serde_json::from_value(serde_json::json!({
            "id": "1",
            "camera": camera,
            "label": label,
        }))
        .unwrap()
    }

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_policy_allows_everything() {
        let policy = FilterPolicy::default();
        assert!(is_eligible(&event("yard", "person"), &policy));
        assert!(is_eligible(&event("", ""), &policy));
    }

    #[test]
    fn test_camera_exclude_wins_over_include() {
        let policy = FilterPolicy {
            include_cameras: list(&["yard", "garage"]),
            exclude_cameras: list(&["yard"]),
            ..Default::default()
        };
        assert_eq!(policy.check(&event("yard", "person")), Err(Rejection::CameraExcluded));
        assert!(is_eligible(&event("garage", "person"), &policy));

        let all = FilterPolicy {
            exclude_cameras: list(&["yard"]),
            ..Default::default()
        };
        assert!(!is_eligible(&event("yard", "person"), &all));
    }

    #[test]
    fn test_camera_include_list() {
        let policy = FilterPolicy {
            include_cameras: list(&["garage"]),
            ..Default::default()
        };
        assert_eq!(policy.check(&event("yard", "car")), Err(Rejection::CameraNotIncluded));
        assert!(policy.check(&event("garage", "car")).is_ok());
    }

    #[test]
    fn test_label_lists() {
        let policy = FilterPolicy {
            include_labels: list(&["person", "car"]),
            exclude_labels: list(&["car"]),
            ..Default::default()
        };
        assert_eq!(policy.check(&event("yard", "car")), Err(Rejection::LabelExcluded));
        assert_eq!(policy.check(&event("yard", "dog")), Err(Rejection::LabelNotIncluded));
        assert!(policy.check(&event("yard", "person")).is_ok());
    }

    #[test]
    fn test_sentinel_only_disables_when_alone() {
        // "None" 与其他值同时出现时按普通值处理
        let policy = FilterPolicy {
            exclude_labels: list(&["None", "cat"]),
            ..Default::default()
        };
        assert!(!is_eligible(&event("yard", "cat"), &policy));
        assert!(is_eligible(&event("yard", "dog"), &policy));
    }

    #[test]
    fn test_checks_short_circuit_in_order() {
        let policy = FilterPolicy {
            include_cameras: list(&["garage"]),
            exclude_cameras: list(&["yard"]),
            include_labels: list(&["person"]),
            exclude_labels: list(&["cat"]),
        };
        assert_eq!(policy.check(&event("yard", "cat")), Err(Rejection::CameraExcluded));
        assert_eq!(policy.check(&event("porch", "cat")), Err(Rejection::CameraNotIncluded));
        assert_eq!(policy.check(&event("garage", "cat")), Err(Rejection::LabelExcluded));
        assert_eq!(policy.check(&event("garage", "dog")), Err(Rejection::LabelNotIncluded));
    }
}
