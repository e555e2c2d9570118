//! 完成度分析：原始消息中属于其它能力的子句，转交给对应智能体
//!
//! 按分隔符把消息切成子句，对本智能体关键词不命中、而另一智能体命中的第一个子句发起转交。
//! 预订智能体从不作为转交目标（必须先经过可用性查询与用户选择）。

use crate::agents::{AgentKind, Handoff};

const CLAUSE_SEPARATORS: &[&str] = &[" and also ", " and ", " also ", " plus ", ", ", "; ", "? ", ". ", "! "];

/// 拆分子句（保留原文大小写，去掉首尾标点）
pub fn split_clauses(message: &str) -> Vec<String> {
    let mut clauses = vec![message.to_string()];
    for sep in CLAUSE_SEPARATORS {
        clauses = clauses
            .into_iter()
            .flat_map(|c| split_case_insensitive(&c, sep))
            .collect();
    }
    clauses
        .into_iter()
        .map(|c| {
            c.trim()
                .trim_matches(|ch: char| ch.is_ascii_punctuation() && ch != '-')
                .trim()
                .to_string()
        })
        .filter(|c| !c.is_empty())
        .collect()
}

fn split_case_insensitive(text: &str, sep: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    // 大小写转换改变字节长度时不切分
    if lower.len() != text.len() {
        return vec![text.to_string()];
    }
    let mut parts = Vec::new();
    let mut start = 0;
    for (idx, _) in lower.match_indices(sep) {
        parts.push(text[start..idx].to_string());
        start = idx + sep.len();
    }
    parts.push(text[start..].to_string());
    parts
}

/// 当前智能体未覆盖的子句中，第一个明确属于另一能力的子句
pub fn analyse(current: AgentKind, original_message: &str) -> Option<Handoff> {
    for clause in split_clauses(original_message) {
        if current.relevance(&clause) > 0 {
            continue;
        }
        let Some(target) = AgentKind::best_match(&clause) else {
            continue;
        };
        if target == current || target == AgentKind::Reservation {
            continue;
        }
        return Some(Handoff {
            target,
            unanswered_query: clause,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_multi_intent() {
        let clauses =
            split_clauses("What time do you close on Saturdays, and are your lamb chops gluten-free?");
        assert_eq!(
            clauses,
            vec!["What time do you close on Saturdays", "are your lamb chops gluten-free"]
        );
    }

    #[test]
    fn test_info_hands_off_menu_clause() {
        let handoff = analyse(
            AgentKind::Info,
            "What time do you close on Saturdays, and are your lamb chops gluten-free?",
        )
        .unwrap();
        assert_eq!(handoff.target, AgentKind::Menu);
        assert_eq!(handoff.unanswered_query, "are your lamb chops gluten-free");
    }

    #[test]
    fn test_single_intent_has_no_handoff() {
        assert!(analyse(
            AgentKind::Availability,
            "Check availability for tomorrow at 8pm for 4 people"
        )
        .is_none());
        assert!(analyse(AgentKind::Reservation, "standard table").is_none());
    }

    #[test]
    fn test_reservation_is_never_a_target() {
        assert!(analyse(AgentKind::Menu, "is the risotto vegan? I want to book").is_none());
    }
}
