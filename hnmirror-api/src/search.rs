use crate::ItemId;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum SearchResultKind {
    Story,
    Comment,
}

/// One search hit, positioned inside the matched text.
///
/// `context_before` and `context_after` hold up to 50 characters on
/// either side of `matched_text`, clipped at the string boundaries.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SearchResult {
    pub kind: SearchResultKind,
    /// Story owning this result
    pub story_id: ItemId,
    /// Present iff `kind` is `Comment`
    pub comment_id: Option<ItemId>,
    pub title: String,
    /// Full text the match was found in
    pub content: String,
    pub author: String,
    /// Creation time of the matched item, seconds since epoch
    pub timestamp: i64,
    pub matched_text: String,
    pub context_before: String,
    pub context_after: String,
}
