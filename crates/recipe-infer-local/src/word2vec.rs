//! In-memory embedding table read from the word2vec text format.
//!
//! ```text
//! <vocab_size> <dim>
//! <token> <v1> ... <v_dim>
//! ```

use recipe_infer_core::{EmbeddingModel, Error, Result};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct EmbeddingTable {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl EmbeddingTable {
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        let (_, header) = lines
            .next()
            .ok_or_else(|| Error::Config("embedding table is empty".to_string()))?;
        let mut fields = header.split_whitespace();
        let mut header_num = |what: &str| -> Result<usize> {
            fields
                .next()
                .and_then(|s| s.parse::<usize>().ok())
                .ok_or_else(|| Error::Config(format!("embedding header: bad {what} in {header:?}")))
        };
        let expected = header_num("vocabulary size")?;
        let dim = header_num("dimension")?;
        if dim == 0 {
            return Err(Error::Config("embedding dimension must be > 0".to_string()));
        }

        let mut vectors = HashMap::with_capacity(expected);
        for (lineno, line) in lines {
            let mut fields = line.split_whitespace();
            let Some(token) = fields.next() else {
                continue;
            };
            let values = fields
                .map(str::parse::<f32>)
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| Error::Config(format!("embedding line {}: {e}", lineno + 1)))?;
            if values.len() != dim {
                return Err(Error::Config(format!(
                    "embedding line {}: {} values, expected {dim}",
                    lineno + 1,
                    values.len()
                )));
            }
            vectors.insert(token.to_string(), values);
        }
        if vectors.len() != expected {
            tracing::warn!(
                expected,
                actual = vectors.len(),
                "embedding table size differs from its header"
            );
        }
        Ok(Self { dim, vectors })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
        let table = Self::parse(&text)?;
        tracing::info!(
            path = %path.display(),
            words = table.len(),
            dim = table.dim,
            "loaded embedding table"
        );
        Ok(table)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn get(&self, token: &str) -> Option<&[f32]> {
        self.vectors.get(token).map(Vec::as_slice)
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.vectors.keys().map(String::as_str)
    }
}

#[async_trait::async_trait]
impl EmbeddingModel for EmbeddingTable {
    async fn embedding(&self, token: &str) -> Result<Option<Vec<f32>>> {
        Ok(self.get(token).map(<[f32]>::to_vec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "3 2\n醤油 1.0 0.0\n大さじ 0 1\n</s> 0.5 0.5\n";

    #[test]
    fn parses_header_and_rows() {
        let t = EmbeddingTable::parse(SMALL).unwrap();
        assert_eq!(t.dim(), 2);
        assert_eq!(t.len(), 3);
        assert_eq!(t.get("大さじ"), Some(&[0.0f32, 1.0][..]));
        let mut words: Vec<&str> = t.words().collect();
        words.sort();
        assert_eq!(words, vec!["</s>", "大さじ", "醤油"]);
    }

    #[test]
    fn rejects_rows_of_the_wrong_width() {
        let err = EmbeddingTable::parse("1 3\nfoo 1 2\n").unwrap_err().to_string();
        assert!(err.contains("line 2"), "err={err}");
        assert!(matches!(EmbeddingTable::parse(""), Err(Error::Config(_))));
        assert!(matches!(EmbeddingTable::parse("x y\n"), Err(Error::Config(_))));
        assert!(matches!(EmbeddingTable::parse("1 2\nfoo 1 bar\n"), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn unknown_tokens_are_not_errors() {
        let t = EmbeddingTable::parse(SMALL).unwrap();
        assert_eq!(t.embedding("醤油").await.unwrap(), Some(vec![1.0, 0.0]));
        assert_eq!(t.embedding("みりん").await.unwrap(), None);
    }
}
