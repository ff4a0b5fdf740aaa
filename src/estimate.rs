//! 成本估算
//!
//! 调用方在申请准入前用文本长度近似 token 数，而不是运行分词器。
//! 调速器把传入的成本当作事实，不做校验。

use crate::constants::{CHARS_PER_TOKEN, MIN_ESTIMATED_TOKENS};

/// 估算单段文本的 token 成本：字符数 / 4，最小为1
///
/// # 示例
/// ```rust
/// use quotagate::estimate::estimate_tokens;
///
/// assert_eq!(estimate_tokens("test"), 1);
/// assert_eq!(estimate_tokens(&"a".repeat(400)), 100);
/// ```
pub fn estimate_tokens(text: &str) -> u64 {
    let tokens = (text.chars().count() / CHARS_PER_TOKEN) as u64;
    tokens.max(MIN_ESTIMATED_TOKENS)
}

/// 估算一批文本的 token 成本总和
pub fn estimate_batch_tokens<I, S>(texts: I) -> u64
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    texts
        .into_iter()
        .map(|text| estimate_tokens(text.as_ref()))
        .sum()
}
