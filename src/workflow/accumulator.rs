//! 结果合并：并行访谈产出的 Section 批次合并
//!
//! merge 对整个集合操作而非就地逐元素追加：每次 join 完成后用全量新批次调用一次，
//! 重试不会重复套用旧状态。满足交换律 / 结合律（以产出者身份计的多重集相等）、
//! 从不丢弃非空贡献；不做去重——每参与者恰好派发一个任务由引擎保证。

use crate::workflow::types::Section;

/// 合并已有与新到的 Section 集合，返回新集合
pub fn merge(existing: &[Section], incoming: &[Section]) -> Vec<Section> {
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    merged.extend_from_slice(existing);
    merged.extend_from_slice(incoming);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(participant: &str, content: &str) -> Section {
        Section {
            participant: participant.into(),
            content: content.into(),
            prompt_tokens: 100,
            completion_tokens: 200,
            generated_at: 0,
        }
    }

    /// 以 (participant, content) 对构成的多重集比较，忽略存储顺序
    fn as_sorted_pairs(sections: &[Section]) -> Vec<(String, String)> {
        let mut pairs: Vec<_> = sections
            .iter()
            .map(|s| (s.participant.clone(), s.content.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    #[test]
    fn test_merge_order_independence() {
        let a = section("Dr. Chen", "Healthcare AI regulations overview");
        let b = section("Dr. Torres", "Clinical implementation challenges");
        let c = section("Dr. Okafor", "Patient data privacy concerns");

        // 3 位分析员的全部完成顺序
        let permutations: [[&Section; 3]; 6] = [
            [&a, &b, &c],
            [&a, &c, &b],
            [&b, &a, &c],
            [&b, &c, &a],
            [&c, &a, &b],
            [&c, &b, &a],
        ];

        let reference = as_sorted_pairs(&[a.clone(), b.clone(), c.clone()]);
        for perm in permutations {
            let mut acc: Vec<Section> = Vec::new();
            for s in perm {
                acc = merge(&acc, std::slice::from_ref(s));
            }
            assert_eq!(as_sorted_pairs(&acc), reference);
        }
    }

    #[test]
    fn test_merge_batch_equals_element_wise() {
        let existing = vec![section("Dr. Chen", "one")];
        let incoming = vec![section("Dr. Torres", "two"), section("Dr. Okafor", "three")];

        let batched = merge(&existing, &incoming);
        let mut stepped = existing.clone();
        for s in &incoming {
            stepped = merge(&stepped, std::slice::from_ref(s));
        }
        assert_eq!(as_sorted_pairs(&batched), as_sorted_pairs(&stepped));
    }

    #[test]
    fn test_empty_contribution_is_noop() {
        let existing = vec![section("Dr. Chen", "one"), section("Dr. Torres", "two")];
        let merged = merge(&existing, &[]);
        assert_eq!(merged.len(), 2);
        assert_eq!(as_sorted_pairs(&merged), as_sorted_pairs(&existing));
    }

    #[test]
    fn test_merge_never_drops_contributions() {
        let mixed = [
            vec![section("Dr. Chen", "Valid section 1")],
            vec![], // 访谈失败，空贡献
            vec![section("Dr. Torres", "Valid section 2")],
            vec![], // 超时
            vec![section("Dr. Okafor", "Valid section 3")],
        ];

        let mut acc: Vec<Section> = Vec::new();
        for batch in &mixed {
            acc = merge(&acc, batch);
        }
        assert_eq!(acc.len(), 3);
        assert!(acc.iter().any(|s| s.content == "Valid section 1"));
        assert!(acc.iter().any(|s| s.content == "Valid section 2"));
        assert!(acc.iter().any(|s| s.content == "Valid section 3"));
    }

    #[test]
    fn test_merge_preserves_metadata() {
        let merged = merge(&[section("Dr. Chen", "x")], &[section("Dr. Torres", "y")]);
        let total_tokens: u64 = merged
            .iter()
            .map(|s| s.prompt_tokens + s.completion_tokens)
            .sum();
        assert_eq!(total_tokens, 600);
        assert!(merged.iter().all(|s| !s.participant.is_empty()));
    }
}
