//! Description matcher - in-process text matching over dataset descriptions / 描述匹配器
//!
//! Cluster search refines per-archive description counts by re-running the
//! user's query against the stored description text, without another engine
//! round trip. / 集群搜索在进程内对描述文本复跑查询，避免再次访问引擎。
//!
//! - words match independently / 词项独立匹配
//! - quoted phrases match consecutive positions / 引号短语按连续位置匹配
//! - boolean operator words are matched literally / 布尔操作符按字面匹配

use std::collections::HashMap;

use crate::error::SearchError;

use super::tokenizer::{tokenize, tokenize_query};

/// One parsed query term / 单个查询词项
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTerm {
    Word(String),
    Phrase(Vec<String>),
}

/// Parsed description query / 解析后的描述查询
#[derive(Debug, Clone, Default)]
pub struct DescriptionQuery {
    terms: Vec<QueryTerm>,
}

impl DescriptionQuery {
    /// Parse raw query text, quoted segments become phrases / 解析原始查询，引号段成为短语
    pub fn parse(raw: &str) -> Result<Self, SearchError> {
        if raw.trim().is_empty() {
            return Err(SearchError::SearchExecution {
                reason: "empty description query".to_string(),
            });
        }

        let mut terms = Vec::new();
        for (i, segment) in raw.split('"').enumerate() {
            if i % 2 == 1 {
                // 引号内
                let words = tokenize(segment);
                match words.len() {
                    0 => {}
                    1 => terms.push(QueryTerm::Word(words.into_iter().next().unwrap_or_default())),
                    _ => terms.push(QueryTerm::Phrase(words)),
                }
            } else {
                for word in tokenize_query(segment) {
                    terms.push(QueryTerm::Word(word));
                }
            }
        }

        Ok(Self { terms })
    }

    pub fn terms(&self) -> &[QueryTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Match counts for one description / 单个描述的匹配计数
#[derive(Debug, Clone, Default)]
pub struct DescriptionMatches {
    /// Sum of all term occurrence counts / 所有词项出现次数之和
    pub total: u64,
    /// Per-term occurrence counts, phrases joined with spaces / 按词项的出现次数
    pub term_counts: Vec<(String, u64)>,
}

/// Positional index over one description text / 单个描述文本的位置索引
pub struct DescriptionIndex {
    postings: HashMap<String, Vec<usize>>,
    token_count: usize,
}

impl DescriptionIndex {
    /// Index one description / 索引一段描述
    pub fn new(text: &str) -> Self {
        let mut postings: HashMap<String, Vec<usize>> = HashMap::new();
        let tokens = tokenize(text);
        let token_count = tokens.len();
        for (position, token) in tokens.into_iter().enumerate() {
            postings.entry(token).or_default().push(position);
        }
        Self {
            postings,
            token_count,
        }
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    /// Count query matches in this description / 统计查询在描述中的匹配数
    pub fn search(&self, query: &DescriptionQuery) -> DescriptionMatches {
        let mut matches = DescriptionMatches::default();
        for term in query.terms() {
            match term {
                QueryTerm::Word(word) => {
                    let count = self.postings.get(word).map(|p| p.len()).unwrap_or(0) as u64;
                    matches.total += count;
                    matches.term_counts.push((word.clone(), count));
                }
                QueryTerm::Phrase(words) => {
                    let count = self.phrase_count(words);
                    matches.total += count;
                    matches.term_counts.push((words.join(" "), count));
                }
            }
        }
        matches
    }

    /// Occurrences of `words` at consecutive positions / 连续位置上的短语出现次数
    fn phrase_count(&self, words: &[String]) -> u64 {
        let first = match words.first().and_then(|w| self.postings.get(w)) {
            Some(positions) => positions,
            None => return 0,
        };

        let mut count = 0;
        for &start in first {
            let mut all_aligned = true;
            for (offset, word) in words.iter().enumerate().skip(1) {
                let aligned = self
                    .postings
                    .get(word)
                    .map(|positions| positions.binary_search(&(start + offset)).is_ok())
                    .unwrap_or(false);
                if !aligned {
                    all_aligned = false;
                    break;
                }
            }
            if all_aligned {
                count += 1;
            }
        }
        count
    }
}
