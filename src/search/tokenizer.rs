//! Description tokenizer / 描述文本分词器
//!
//! Splits finding-aid description text into lowercase word tokens for the
//! in-process description matcher. / 将描述文本切分为小写词元，供描述匹配器使用。
//!
//! - Unicode letters and digits form tokens / 字母与数字构成词元
//! - everything else separates / 其余字符作为分隔
//! - output is lowercased / 输出统一小写

use once_cell::sync::Lazy;
use regex::Regex;

/// Word pattern shared by index and query tokenization / 索引与查询共用的词元模式
static WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("word pattern is valid"));

/// Tokenize description text / 对描述文本分词
pub fn tokenize(text: &str) -> Vec<String> {
    WORD_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Tokenize query text / 对查询文本分词
pub fn tokenize_query(query: &str) -> Vec<String> {
    // 查询分词与索引分词保持一致
    tokenize(query)
}
