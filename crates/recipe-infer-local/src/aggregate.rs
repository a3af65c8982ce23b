//! Per-subtree results and the sibling fold that builds a parent's result.

use crate::boundary::{best_pair, SplitItem};
use recipe_infer_core::{
    CalibrationStats, ListOfPairs, MaterialPair, ProcedureCandidate, TokenScore,
};

/// One scored token of a leaf.
#[derive(Debug, Clone, Copy)]
pub struct ScoredToken<'a> {
    pub text: &'a str,
    pub score: TokenScore,
    pub embedding: Option<&'a [f32]>,
}

/// Everything a parent needs to know about one child subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAggregate {
    /// Normalized text; siblings are joined with a single space.
    pub text: String,
    pub name_sum: f64,
    pub quantity_sum: f64,
    /// Whether the first token of the subtree starts with an ASCII digit.
    pub starts_with_number: bool,
    pub pair: MaterialPair,
    pub list: ListOfPairs,
    pub procedure: Option<ProcedureCandidate>,
    /// All tokens, embedded or not.
    pub token_count: usize,
    pub embedded_count: usize,
    /// Sum of the embeddings of embedded tokens; `None` until one is seen.
    pub embedding_sum: Option<Vec<f32>>,
}

fn add_into(acc: &mut Option<Vec<f32>>, v: &[f32]) {
    match acc {
        Some(sum) => {
            for (s, x) in sum.iter_mut().zip(v) {
                *s += *x;
            }
        }
        None => *acc = Some(v.to_vec()),
    }
}

impl NodeAggregate {
    /// Aggregate for a leaf's token sequence. `None` when there are no tokens.
    pub fn leaf(
        text: String,
        tokens: &[ScoredToken<'_>],
        stats: &CalibrationStats,
    ) -> Option<Self> {
        let first = tokens.first()?;
        let mut name_sum = 0.0;
        let mut quantity_sum = 0.0;
        let mut embedded_count = 0;
        let mut embedding_sum = None;
        for t in tokens {
            name_sum += t.score.name;
            quantity_sum += t.score.quantity;
            if let Some(v) = t.embedding {
                embedded_count += 1;
                add_into(&mut embedding_sum, v);
            }
        }
        let items: Vec<SplitItem<'_>> = tokens
            .iter()
            .map(|t| SplitItem {
                name: t.score.name,
                quantity: t.score.quantity,
                weight: 1,
                text: t.text,
            })
            .collect();
        let pair = best_pair(&items, stats);
        Some(Self {
            text,
            name_sum,
            quantity_sum,
            starts_with_number: first.text.starts_with(|c: char| c.is_ascii_digit()),
            list: ListOfPairs::single(pair.clone()),
            pair,
            procedure: None,
            token_count: tokens.len(),
            embedded_count,
            embedding_sum,
        })
    }

    /// Fold `N >= 2` sibling aggregates into their parent's.
    ///
    /// With fewer than two children there is nothing to fold: a single child is
    /// returned as is, and no children yield `None`.
    pub fn merge(mut children: Vec<NodeAggregate>, stats: &CalibrationStats) -> Option<Self> {
        match children.len() {
            0 => return None,
            1 => return children.pop(),
            _ => {}
        }

        let items: Vec<SplitItem<'_>> = children
            .iter()
            .map(|c| SplitItem {
                name: c.name_sum,
                quantity: c.quantity_sum,
                weight: c.token_count,
                text: &c.text,
            })
            .collect();
        let pair = best_pair(&items, stats);
        let list = combine_lists(&children);

        let mut iter = children.into_iter();
        let mut acc = iter.next()?;
        for child in iter {
            acc.text.push(' ');
            acc.text.push_str(&child.text);
            acc.name_sum += child.name_sum;
            acc.quantity_sum += child.quantity_sum;
            acc.token_count += child.token_count;
            acc.embedded_count += child.embedded_count;
            if let Some(v) = &child.embedding_sum {
                add_into(&mut acc.embedding_sum, v);
            }
            acc.procedure = better_procedure(acc.procedure, child.procedure);
        }
        acc.pair = pair;
        acc.list = list;
        Some(acc)
    }

    /// Replace the procedure candidate with this node's own text when `score`
    /// is at least as good as what the subtree already holds.
    pub fn with_own_procedure_score(mut self, score: f64) -> Self {
        let keep_inherited = self
            .procedure
            .as_ref()
            .is_some_and(|current| score < current.score);
        if !keep_inherited {
            self.procedure = Some(ProcedureCandidate {
                score,
                texts: vec![self.text.clone()],
            });
        }
        self
    }
}

/// Earliest candidate wins ties.
fn better_procedure(
    first: Option<ProcedureCandidate>,
    second: Option<ProcedureCandidate>,
) -> Option<ProcedureCandidate> {
    match (first, second) {
        (Some(a), Some(b)) => Some(if b.score > a.score { b } else { a }),
        (a, b) => a.or(b),
    }
}

/// Children's own pairs versus the concatenation of their lists; the pairs
/// reading has to win strictly.
pub fn combine_lists(children: &[NodeAggregate]) -> ListOfPairs {
    let if_pairs: f64 = children.iter().map(|c| c.pair.score).sum();
    let if_lists: f64 = children.iter().map(|c| c.list.score).sum();
    if if_pairs > if_lists {
        ListOfPairs {
            score: if_pairs,
            pairs: children.iter().map(|c| c.pair.clone()).collect(),
        }
    } else {
        ListOfPairs {
            score: if_lists,
            pairs: children
                .iter()
                .flat_map(|c| c.list.pairs.iter().cloned())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::tests::fixture;

    fn pair(name: &str, quantity: &str, score: f64) -> MaterialPair {
        MaterialPair {
            name: name.to_string(),
            quantity: quantity.to_string(),
            score,
        }
    }

    fn agg(text: &str, pair: MaterialPair, list: ListOfPairs) -> NodeAggregate {
        NodeAggregate {
            text: text.to_string(),
            name_sum: 0.5,
            quantity_sum: 0.5,
            starts_with_number: false,
            pair,
            list,
            procedure: None,
            token_count: 1,
            embedded_count: 1,
            embedding_sum: Some(vec![1.0, 0.0]),
        }
    }

    #[test]
    fn leaf_sums_scores_and_embeddings() {
        let (_, stats) = fixture();
        let a = [1.0f32, 0.0];
        let b = [0.0f32, 1.0];
        let tokens = [
            ScoredToken {
                text: "醤油",
                score: TokenScore { name: 0.9, quantity: 0.1 },
                embedding: Some(&a),
            },
            ScoredToken {
                text: "大さじ",
                score: TokenScore { name: 0.1, quantity: 0.9 },
                embedding: Some(&b),
            },
            ScoredToken {
                text: "1",
                score: TokenScore::NEUTRAL,
                embedding: None,
            },
        ];
        let leaf = NodeAggregate::leaf("醤油大さじ1".to_string(), &tokens, &stats).unwrap();
        assert_eq!(leaf.token_count, 3);
        assert_eq!(leaf.embedded_count, 2);
        assert_eq!(leaf.embedding_sum, Some(vec![1.0, 1.0]));
        assert!((leaf.name_sum - 1.5).abs() < 1e-12);
        assert!(!leaf.starts_with_number);
        assert_eq!(leaf.pair.name, "醤油");
        assert_eq!(leaf.list.pairs, vec![leaf.pair.clone()]);
        assert_eq!(leaf.list.score, leaf.pair.score);
    }

    #[test]
    fn leaf_without_tokens_is_absent() {
        let (_, stats) = fixture();
        assert!(NodeAggregate::leaf(String::new(), &[], &stats).is_none());
    }

    #[test]
    fn single_child_passes_through_unchanged() {
        let (_, stats) = fixture();
        let child = agg(
            "塩少々",
            pair("塩", "少々", 0.4),
            ListOfPairs::single(pair("塩", "少々", 0.4)),
        );
        let merged = NodeAggregate::merge(vec![child.clone()], &stats).unwrap();
        assert_eq!(merged, child);
        assert!(NodeAggregate::merge(Vec::new(), &stats).is_none());
    }

    #[test]
    fn pairs_reading_wins_only_when_strictly_better() {
        let listed = |score: f64, p: MaterialPair| ListOfPairs {
            score,
            pairs: vec![p],
        };
        let children = vec![
            agg("a", pair("a", "1", 0.5), listed(0.2, pair("x", "1", 0.2))),
            agg("b", pair("b", "2", 0.5), listed(0.3, pair("y", "2", 0.3))),
        ];
        let list = combine_lists(&children);
        assert_eq!(list.score, 1.0);
        assert_eq!(list.pairs, vec![pair("a", "1", 0.5), pair("b", "2", 0.5)]);

        let tied = vec![
            agg("a", pair("a", "1", 0.5), listed(0.5, pair("x", "1", 0.5))),
            agg("b", pair("b", "2", 0.5), listed(0.5, pair("y", "2", 0.5))),
        ];
        let list = combine_lists(&tied);
        assert_eq!(list.pairs, vec![pair("x", "1", 0.5), pair("y", "2", 0.5)]);
    }

    #[test]
    fn merge_joins_text_and_keeps_first_number_flag() {
        let (_, stats) = fixture();
        let mut first = agg("1", pair("", "1", 0.0), ListOfPairs::single(pair("", "1", 0.0)));
        first.starts_with_number = true;
        first.embedding_sum = None;
        first.embedded_count = 0;
        let second = agg(
            "鍋に入れる",
            pair("鍋に入れる", "", 0.0),
            ListOfPairs::single(pair("鍋に入れる", "", 0.0)),
        );
        let merged = NodeAggregate::merge(vec![first, second], &stats).unwrap();
        assert_eq!(merged.text, "1 鍋に入れる");
        assert!(merged.starts_with_number);
        assert_eq!(merged.token_count, 2);
        assert_eq!(merged.embedded_count, 1);
        assert_eq!(merged.embedding_sum, Some(vec![1.0, 0.0]));
        assert_eq!(format!("{}{}", merged.pair.name, merged.pair.quantity), "1鍋に入れる");
    }

    #[test]
    fn own_procedure_replaces_inherited_on_ties() {
        let mut node = agg("手順", MaterialPair::empty(), ListOfPairs::single(MaterialPair::empty()));
        node.procedure = Some(ProcedureCandidate {
            score: 0.7,
            texts: vec!["child".to_string()],
        });
        let lower = node.clone().with_own_procedure_score(0.6);
        assert_eq!(lower.procedure.unwrap().texts, vec!["child"]);
        let equal = node.with_own_procedure_score(0.7);
        assert_eq!(equal.procedure.unwrap().texts, vec!["手順"]);
    }

    #[test]
    fn sibling_procedures_keep_the_earliest_best() {
        let (_, stats) = fixture();
        let mut a = agg("a", MaterialPair::empty(), ListOfPairs::single(MaterialPair::empty()));
        a.procedure = Some(ProcedureCandidate { score: 0.9, texts: vec!["a".to_string()] });
        let mut b = a.clone();
        b.text = "b".to_string();
        b.procedure = Some(ProcedureCandidate { score: 0.9, texts: vec!["b".to_string()] });
        let c = agg("c", MaterialPair::empty(), ListOfPairs::single(MaterialPair::empty()));
        let merged = NodeAggregate::merge(vec![c, a, b], &stats).unwrap();
        assert_eq!(merged.procedure.unwrap().texts, vec!["a"]);
    }
}
