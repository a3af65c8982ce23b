//! Bottom-up document traversal that picks the best material list and the
//! best procedure element of a page.

use crate::aggregate::{NodeAggregate, ScoredToken};
use crate::heading::is_procedure_heading;
use crate::normalize::normalize;
use crate::procedure::feature_vector;
use crate::similarity::SimilarityScorer;
use crate::tokenize::Tokenizer;
use futures_util::future::try_join_all;
use recipe_infer_core::{
    EmbeddingModel, Error, ExtractionResult, ListOfPairs, Materials, Node, Predictor,
    ProcedureCandidate, Result, TokenScore,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// Everything needed to run extractions. Cheap to share; each call to
/// [`Extractor::extract`] gets its own token cache.
#[derive(Clone)]
pub struct Extractor {
    tokenizer: Tokenizer,
    embeddings: Arc<dyn EmbeddingModel>,
    predictor: Arc<dyn Predictor>,
    scorer: SimilarityScorer,
}

impl Extractor {
    pub fn new(
        tokenizer: Tokenizer,
        embeddings: Arc<dyn EmbeddingModel>,
        predictor: Arc<dyn Predictor>,
        scorer: SimilarityScorer,
    ) -> Self {
        Self {
            tokenizer,
            embeddings,
            predictor,
            scorer,
        }
    }

    pub async fn extract(&self, root: &Node) -> Result<ExtractionResult> {
        let run = ExtractionRun::new(self);
        let visited = run.fold(root).await?;
        let result = visited.best.into_result();
        tracing::debug!(
            materials = result.materials.len(),
            procedures = result.procedures.len(),
            distinct_tokens = run.memo_len(),
            "extracted recipe"
        );
        Ok(result)
    }

    /// Classifier input for `text`, built exactly as the traversal builds it
    /// for a leaf element. `None` when no token has an embedding.
    pub async fn procedure_features(&self, text: &str) -> Result<Option<Vec<f32>>> {
        let run = ExtractionRun::new(self);
        let Some(agg) = run.leaf(text).await? else {
            return Ok(None);
        };
        Ok(agg
            .embedding_sum
            .as_deref()
            .map(|sum| feature_vector(agg.token_count, agg.starts_with_number, sum)))
    }
}

#[derive(Debug)]
struct TokenEntry {
    score: TokenScore,
    embedding: Option<Vec<f32>>,
}

/// Running maxima for one subtree. Strict comparisons keep the earliest winner.
#[derive(Debug, Default)]
struct BestSoFar {
    materials: Option<ListOfPairs>,
    procedure: Option<ProcedureCandidate>,
}

impl BestSoFar {
    fn offer_materials(&mut self, list: &ListOfPairs) {
        if self.materials.as_ref().is_none_or(|m| list.score > m.score) {
            self.materials = Some(list.clone());
        }
    }

    fn offer_procedure(&mut self, candidate: &ProcedureCandidate) {
        if self.procedure.as_ref().is_none_or(|p| candidate.score > p.score) {
            self.procedure = Some(candidate.clone());
        }
    }

    /// Fold in a later sibling's maxima.
    fn absorb(&mut self, later: BestSoFar) {
        if let Some(list) = &later.materials {
            self.offer_materials(list);
        }
        if let Some(candidate) = &later.procedure {
            self.offer_procedure(candidate);
        }
    }

    fn into_result(self) -> ExtractionResult {
        ExtractionResult {
            materials: self.materials.as_ref().map(Materials::from).unwrap_or_default(),
            procedures: self.procedure.map(|p| p.texts).unwrap_or_default(),
        }
    }
}

#[derive(Default)]
struct Visited {
    aggregate: Option<NodeAggregate>,
    best: BestSoFar,
}

/// A node of the flattened tree. Child indices are in document order and
/// always greater than the parent's.
struct Slot<'n> {
    node: &'n Node,
    children: Vec<usize>,
    height: usize,
}

/// Pre-order flattening with an explicit stack. Leaf elements are not
/// descended into; their text is read whole.
fn flatten(root: &Node) -> Vec<Slot<'_>> {
    let mut slots: Vec<Slot<'_>> = Vec::new();
    let mut stack = vec![(root, None::<usize>)];
    while let Some((node, parent)) = stack.pop() {
        let index = slots.len();
        slots.push(Slot {
            node,
            children: Vec::new(),
            height: 0,
        });
        if let Some(parent) = parent {
            slots[parent].children.push(index);
        }
        if !node.is_leaf() {
            stack.extend(node.children().iter().rev().map(|c| (c, Some(index))));
        }
    }
    for i in (0..slots.len()).rev() {
        let height = slots[i]
            .children
            .iter()
            .map(|&c| slots[c].height + 1)
            .max()
            .unwrap_or(0);
        slots[i].height = height;
    }
    slots
}

/// Slot indices grouped by height, leaves first.
fn levels(slots: &[Slot<'_>]) -> Vec<Vec<usize>> {
    let mut levels = vec![Vec::new(); slots.first().map_or(0, |s| s.height + 1)];
    for (i, slot) in slots.iter().enumerate() {
        levels[slot.height].push(i);
    }
    levels
}

type TokenCell = Arc<OnceCell<Arc<TokenEntry>>>;

/// State scoped to a single extraction.
struct ExtractionRun<'e> {
    extractor: &'e Extractor,
    memo: Mutex<HashMap<String, TokenCell>>,
}

impl<'e> ExtractionRun<'e> {
    fn new(extractor: &'e Extractor) -> Self {
        Self {
            extractor,
            memo: Mutex::new(HashMap::new()),
        }
    }

    fn memo_len(&self) -> usize {
        self.memo.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// One embedding lookup per distinct token, even when several branches
    /// ask for it at once: later callers wait on the first caller's cell.
    async fn token_entry(&self, token: &str) -> Result<Arc<TokenEntry>> {
        let cell = self
            .memo
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(token.to_owned())
            .or_default()
            .clone();
        let entry = cell
            .get_or_try_init(|| async {
                let embedding = self.extractor.embeddings.embedding(token).await?;
                Ok::<_, Error>(Arc::new(TokenEntry {
                    score: self.extractor.scorer.score(embedding.as_deref()),
                    embedding,
                }))
            })
            .await?;
        Ok(entry.clone())
    }

    async fn leaf(&self, raw: &str) -> Result<Option<NodeAggregate>> {
        let text = normalize(raw.trim()).trim().to_string();
        if text.is_empty() {
            return Ok(None);
        }
        let tokens = self.extractor.tokenizer.tokenize(&text)?;
        let mut entries = Vec::with_capacity(tokens.len());
        for token in &tokens {
            entries.push(self.token_entry(token).await?);
        }
        let scored: Vec<ScoredToken<'_>> = tokens
            .iter()
            .zip(&entries)
            .map(|(text, entry)| ScoredToken {
                text,
                score: entry.score,
                embedding: entry.embedding.as_deref(),
            })
            .collect();
        Ok(NodeAggregate::leaf(text, &scored, self.extractor.scorer.stats()))
    }

    /// Bottom-up fold over the flattened tree, one height level at a time.
    ///
    /// Nodes of equal height never depend on each other, so each level's
    /// lookups and classifier calls run concurrently. Call depth stays
    /// constant however deep the document is.
    async fn fold(&self, root: &Node) -> Result<Visited> {
        let slots = flatten(root);
        let mut done: Vec<Option<Visited>> = slots.iter().map(|_| None).collect();
        for level in levels(&slots) {
            let pending = level.iter().map(|&i| {
                let children: Vec<Visited> = slots[i]
                    .children
                    .iter()
                    .filter_map(|&c| done[c].take())
                    .collect();
                self.visit(slots[i].node, children)
            });
            let visited = try_join_all(pending.collect::<Vec<_>>()).await?;
            for (&i, v) in level.iter().zip(visited) {
                done[i] = Some(v);
            }
        }
        Ok(done.into_iter().next().flatten().unwrap_or_default())
    }

    /// Score one node given its children's results, in document order.
    async fn visit(&self, node: &Node, children: Vec<Visited>) -> Result<Visited> {
        let (aggregate, mut best) = if node.is_leaf() {
            let raw = match node {
                Node::Text(t) => t.clone(),
                Node::Element(_) => node.text_content(),
            };
            (self.leaf(&raw).await?, BestSoFar::default())
        } else {
            let mut best = BestSoFar::default();
            let mut aggregates = Vec::with_capacity(children.len());
            for child in children {
                best.absorb(child.best);
                aggregates.extend(child.aggregate);
            }
            (
                NodeAggregate::merge(aggregates, self.extractor.scorer.stats()),
                best,
            )
        };

        let Some(mut aggregate) = aggregate else {
            return Ok(Visited {
                aggregate: None,
                best,
            });
        };

        if aggregate.embedded_count > 0 {
            best.offer_materials(&aggregate.list);
        }

        if node.is_element() {
            if aggregate.embedded_count > 0 && !is_procedure_heading(&aggregate.text) {
                if let Some(sum) = &aggregate.embedding_sum {
                    let features = feature_vector(
                        aggregate.token_count,
                        aggregate.starts_with_number,
                        sum,
                    );
                    let score = self.extractor.predictor.predict(&features).await?;
                    aggregate = aggregate.with_own_procedure_score(f64::from(score));
                }
            }
            if let Some(candidate) = &aggregate.procedure {
                best.offer_procedure(candidate);
            }
        }

        Ok(Visited {
            aggregate: Some(aggregate),
            best,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::VocabularySegmenter;
    use crate::similarity::tests::fixture;
    use crate::word2vec::EmbeddingTable;
    use recipe_infer_core::WordSegmenter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TABLE: &str = "\
6 2
醤油 1 0
酒 1 0
大さじ 0 1
炒める 3 4
作り方 3 4
鍋 1 1
";

    struct Constant(f32);

    #[async_trait::async_trait]
    impl Predictor for Constant {
        async fn predict(&self, _input: &[f32]) -> Result<f32> {
            Ok(self.0)
        }
    }

    /// 1.0 for one exact feature vector, 0.0 for everything else.
    struct Designated(Vec<f32>);

    #[async_trait::async_trait]
    impl Predictor for Designated {
        async fn predict(&self, input: &[f32]) -> Result<f32> {
            let hit = input.len() == self.0.len()
                && input.iter().zip(&self.0).all(|(a, b)| (a - b).abs() < 1e-6);
            Ok(if hit { 1.0 } else { 0.0 })
        }
    }

    /// Scores by inverse token count, so shorter elements win.
    struct Shortest;

    #[async_trait::async_trait]
    impl Predictor for Shortest {
        async fn predict(&self, input: &[f32]) -> Result<f32> {
            Ok(input[0])
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl Predictor for Failing {
        async fn predict(&self, _input: &[f32]) -> Result<f32> {
            Err(Error::Predict("model unavailable".to_string()))
        }
    }

    struct Counting {
        inner: EmbeddingTable,
        lookups: AtomicUsize,
    }

    /// Counts lookups and yields once before answering, like a remote store.
    #[async_trait::async_trait]
    impl EmbeddingModel for Counting {
        async fn embedding(&self, token: &str) -> Result<Option<Vec<f32>>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.inner.embedding(token).await
        }
    }

    struct Unreachable;

    #[async_trait::async_trait]
    impl EmbeddingModel for Unreachable {
        async fn embedding(&self, _token: &str) -> Result<Option<Vec<f32>>> {
            Err(Error::Embedding("store unreachable".to_string()))
        }
    }

    struct BrokenSegmenter;

    impl WordSegmenter for BrokenSegmenter {
        fn segment(&self, _text: &str) -> Result<Vec<String>> {
            Err(Error::Tokenize("dictionary missing".to_string()))
        }
    }

    fn counting() -> Arc<Counting> {
        Arc::new(Counting {
            inner: EmbeddingTable::parse(TABLE).unwrap(),
            lookups: AtomicUsize::new(0),
        })
    }

    fn extractor_with(
        embeddings: Arc<dyn EmbeddingModel>,
        predictor: Arc<dyn Predictor>,
    ) -> Extractor {
        let table = EmbeddingTable::parse(TABLE).unwrap();
        let segmenter = VocabularySegmenter::new(table.words());
        let (vectors, stats) = fixture();
        Extractor::new(
            Tokenizer::new(Arc::new(segmenter)),
            embeddings,
            predictor,
            SimilarityScorer::new(vectors, stats),
        )
    }

    fn extractor(predictor: Arc<dyn Predictor>) -> Extractor {
        let table = EmbeddingTable::parse(TABLE).unwrap();
        extractor_with(Arc::new(table), predictor)
    }

    fn el(name: &str, children: Vec<Node>) -> Node {
        Node::element(name, children)
    }

    fn text(s: &str) -> Node {
        Node::text(s)
    }

    #[tokio::test]
    async fn single_line_yields_one_material() {
        let doc = el("body", vec![el("p", vec![text("醤油：大さじ１")])]);
        let got = extractor(Arc::new(Constant(0.0))).extract(&doc).await.unwrap();
        let want: Materials = [("醤油", "大さじ1")].into_iter().collect();
        assert_eq!(got.materials, want);
    }

    #[tokio::test]
    async fn sibling_lines_form_a_list() {
        let doc = el(
            "body",
            vec![el(
                "ul",
                vec![
                    el("li", vec![text("醤油 大さじ1")]),
                    text("\n  "),
                    el("li", vec![text("酒 大さじ2")]),
                ],
            )],
        );
        let got = extractor(Arc::new(Constant(0.0))).extract(&doc).await.unwrap();
        let want: Materials = [("醤油", "大さじ1"), ("酒", "大さじ2")]
            .into_iter()
            .collect();
        assert_eq!(got.materials, want);
    }

    #[tokio::test]
    async fn designated_element_is_the_procedure_at_any_depth() {
        // A lone "炒める" (embedding [3, 4]) is the only element with these features.
        let designated = || Arc::new(Designated(vec![1.0, 0.0, 0.6, 0.8]));
        let target = || el("li", vec![text("炒める")]);
        let docs = [
            el("body", vec![target()]),
            el(
                "body",
                vec![
                    el("p", vec![text("醤油")]),
                    el(
                        "ol",
                        vec![el("li", vec![text("鍋")]), target(), el("li", vec![text("酒")])],
                    ),
                ],
            ),
            el(
                "body",
                vec![el(
                    "div",
                    vec![el(
                        "section",
                        vec![
                            el("h2", vec![text("醤油 大さじ1")]),
                            el("div", vec![el("div", vec![target()])]),
                            el("p", vec![text("鍋 酒")]),
                        ],
                    )],
                )],
            ),
        ];
        for doc in &docs {
            let got = extractor(designated()).extract(doc).await.unwrap();
            assert_eq!(got.procedures, vec!["炒める"], "doc={doc:?}");
        }
    }

    #[tokio::test]
    async fn procedure_headings_are_not_candidates() {
        let doc = el(
            "body",
            vec![el("h2", vec![text("作り方")]), el("p", vec![text("炒める")])],
        );
        let got = extractor(Arc::new(Shortest)).extract(&doc).await.unwrap();
        assert_eq!(got.procedures, vec!["炒める"]);
    }

    #[tokio::test]
    async fn bare_text_and_unembedded_text_are_never_procedures() {
        let doc = el("body", vec![text("みりん")]);
        let got = extractor(Arc::new(Constant(1.0))).extract(&doc).await.unwrap();
        assert!(got.procedures.is_empty());
        assert!(got.materials.is_empty());
    }

    #[tokio::test]
    async fn empty_document_yields_empty_result() {
        let doc = el("body", vec![text("  "), el("div", Vec::new())]);
        let got = extractor(Arc::new(Constant(1.0))).extract(&doc).await.unwrap();
        assert_eq!(got, ExtractionResult::default());
    }

    #[tokio::test]
    async fn token_cache_is_scoped_to_one_extraction() {
        let counting = counting();
        let ex = extractor_with(counting.clone(), Arc::new(Constant(0.0)));
        let doc = el("body", vec![el("p", vec![text("醤油")]), el("p", vec![text("醤油")])]);

        ex.extract(&doc).await.unwrap();
        assert_eq!(counting.lookups.load(Ordering::SeqCst), 1);
        ex.extract(&doc).await.unwrap();
        assert_eq!(counting.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_siblings_share_one_lookup_per_token() {
        let counting = counting();
        let ex = extractor_with(counting.clone(), Arc::new(Constant(0.0)));
        let siblings = (0..8).map(|_| el("p", vec![text("醤油")])).collect();
        ex.extract(&el("body", siblings)).await.unwrap();
        assert_eq!(counting.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deep_nesting_does_not_exhaust_the_stack() {
        let mut node = el("p", vec![text("炒める")]);
        for _ in 0..5000 {
            node = el("div", vec![node]);
        }
        let doc = el("body", vec![el("p", vec![text("醤油 大さじ")]), node]);
        let got = extractor(Arc::new(Designated(vec![1.0, 0.0, 0.6, 0.8])))
            .extract(&doc)
            .await
            .unwrap();
        assert_eq!(got.procedures, vec!["炒める"]);
    }

    #[tokio::test]
    async fn predictor_failure_aborts_extraction() {
        let doc = el("body", vec![el("p", vec![text("炒める")])]);
        let err = extractor(Arc::new(Failing)).extract(&doc).await.unwrap_err();
        assert!(matches!(err, Error::Predict(_)), "err={err}");
    }

    #[tokio::test]
    async fn embedding_failure_aborts_extraction() {
        let doc = el("body", vec![el("p", vec![text("醤油 大さじ1")])]);
        let ex = extractor_with(Arc::new(Unreachable), Arc::new(Constant(0.0)));
        let err = ex.extract(&doc).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)), "err={err}");
    }

    #[tokio::test]
    async fn segmenter_failure_aborts_extraction() {
        let (vectors, stats) = fixture();
        let ex = Extractor::new(
            Tokenizer::new(Arc::new(BrokenSegmenter)),
            Arc::new(EmbeddingTable::parse(TABLE).unwrap()),
            Arc::new(Constant(0.0)),
            SimilarityScorer::new(vectors, stats),
        );
        let doc = el("body", vec![el("p", vec![text("醤油 大さじ1")])]);
        let err = ex.extract(&doc).await.unwrap_err();
        assert!(matches!(err, Error::Tokenize(_)), "err={err}");
    }

    #[tokio::test]
    async fn training_features_match_inference_features() {
        let ex = extractor(Arc::new(Constant(0.0)));
        let f = ex.procedure_features("炒める").await.unwrap().unwrap();
        assert_eq!(f.len(), 4);
        assert!((f[0] - 1.0).abs() < 1e-6);
        assert!((f[2] - 0.6).abs() < 1e-6 && (f[3] - 0.8).abs() < 1e-6);

        let f = ex.procedure_features("2 鍋").await.unwrap().unwrap();
        assert!((f[0] - 0.5).abs() < 1e-6);
        assert_eq!(f[1], 1.0);

        assert_eq!(ex.procedure_features("みりん").await.unwrap(), None);
        assert_eq!(ex.procedure_features("   ").await.unwrap(), None);
    }
}
