use std::cmp::Reverse;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::{Comment, SearchResult, SearchResultKind, Story};

/// How long a query must sit unchanged before a search actually runs
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(300);

const CONTEXT_RADIUS: usize = 50;

/// Searches stories and their assembled comment trees for `query` and
/// returns ranked results: exact full matches first, then partial
/// matches, most recent first within each tier.
///
/// Matching is case-insensitive substring only. A story contributes at
/// most one result (title checked before body); dead comments (no
/// author) are not searchable.
pub fn search(
    query: &str,
    stories: &[Story],
    trees: &[(Story, Vec<Comment>)],
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = stories
        .iter()
        .filter_map(|story| search_in_story(story, query))
        .collect();
    for (story, comments) in trees {
        results.extend(search_in_comments(story, comments, query));
    }

    let query_lowered = query.to_lowercase();
    results.sort_unstable_by_key(|result| {
        (
            result.matched_text.to_lowercase() != query_lowered,
            Reverse(result.timestamp),
        )
    });
    results
}

/// Case-insensitive substring filter over title and body text
pub fn filter_stories(stories: &[Story], query: &str) -> Vec<Story> {
    stories
        .iter()
        .filter(|story| {
            find_case_insensitive(&story.title, query).is_some()
                || story
                    .text
                    .as_deref()
                    .map(|text| find_case_insensitive(text, query).is_some())
                    .unwrap_or(false)
        })
        .cloned()
        .collect()
}

fn search_in_story(story: &Story, query: &str) -> Option<SearchResult> {
    if let Some(context) = find_match_context(&story.title, query) {
        return Some(story_result(story, context));
    }
    if let Some(context) = story
        .text
        .as_deref()
        .and_then(|text| find_match_context(text, query))
    {
        return Some(story_result(story, context));
    }
    None
}

fn story_result(story: &Story, context: MatchContext) -> SearchResult {
    SearchResult {
        kind: SearchResultKind::Story,
        story_id: story.id,
        comment_id: None,
        title: story.title.clone(),
        content: story.text.clone().unwrap_or_default(),
        author: story.by.clone(),
        timestamp: story.time,
        matched_text: context.matched,
        context_before: context.before,
        context_after: context.after,
    }
}

fn search_in_comments(story: &Story, comments: &[Comment], query: &str) -> Vec<SearchResult> {
    let mut results = Vec::new();
    let mut queue: VecDeque<&Comment> = comments.iter().collect();
    while let Some(comment) = queue.pop_front() {
        if let (Some(text), Some(author)) = (&comment.text, &comment.by) {
            if let Some(context) = find_match_context(text, query) {
                results.push(SearchResult {
                    kind: SearchResultKind::Comment,
                    story_id: story.id,
                    comment_id: Some(comment.id),
                    title: story.title.clone(),
                    content: text.clone(),
                    author: author.clone(),
                    timestamp: comment.time,
                    matched_text: context.matched,
                    context_before: context.before,
                    context_after: context.after,
                });
            }
        }
        if let Some(replies) = &comment.replies {
            queue.extend(replies.iter());
        }
    }
    results
}

struct MatchContext {
    matched: String,
    before: String,
    after: String,
}

/// Finds the first case-insensitive occurrence of `query` in `source`
/// and captures up to [`CONTEXT_RADIUS`] characters on either side,
/// clipped at the string boundaries
fn find_match_context(source: &str, query: &str) -> Option<MatchContext> {
    let (start, end) = find_case_insensitive(source, query)?;

    let head = &source[..start];
    let before_start = head
        .char_indices()
        .rev()
        .nth(CONTEXT_RADIUS - 1)
        .map(|(idx, _)| idx)
        .unwrap_or(0);

    let tail = &source[end..];
    let after_len = tail
        .char_indices()
        .nth(CONTEXT_RADIUS)
        .map(|(idx, _)| idx)
        .unwrap_or(tail.len());

    Some(MatchContext {
        matched: source[start..end].to_owned(),
        before: head[before_start..].to_owned(),
        after: tail[..after_len].to_owned(),
    })
}

/// Byte range of the first case-insensitive occurrence of `query`,
/// scanning over char boundaries so multi-byte text never splits
fn find_case_insensitive(source: &str, query: &str) -> Option<(usize, usize)> {
    let query: Vec<char> = query.chars().collect();
    if query.is_empty() {
        return None;
    }
    let source: Vec<(usize, char)> = source.char_indices().collect();
    'starts: for start in 0..source.len() {
        let mut end = source[start].0;
        for (offset, query_char) in query.iter().enumerate() {
            match source.get(start + offset) {
                Some(&(pos, source_char)) if chars_eq_ci(source_char, *query_char) => {
                    end = pos + source_char.len_utf8();
                }
                _ => continue 'starts,
            }
        }
        return Some((source[start].0, end));
    }
    None
}

fn chars_eq_ci(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Snapshot of the search state as seen by consumers
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchSnapshot {
    pub query: String,
    /// False only when the query is empty
    pub searching: bool,
    pub results: Vec<SearchResult>,
    /// Stories passing [`filter_stories`] for the current query
    pub filtered_stories: Vec<Story>,
}

/// Debounces queries and runs [`search`] over incrementally registered
/// comment trees.
///
/// A query received while a search is pending aborts the pending one
/// and restarts the delay; only the most recent query ever executes.
/// Empty and whitespace-only queries bypass the delay entirely and
/// reset to "not searching" with the unfiltered story list.
pub struct Searcher {
    delay: Duration,
    trees: Arc<Mutex<Vec<(Story, Vec<Comment>)>>>,
    pending: Option<JoinHandle<()>>,
    searching: bool,
    tx: Arc<watch::Sender<SearchSnapshot>>,
}

impl Searcher {
    pub fn new() -> Searcher {
        Searcher::with_delay(DEBOUNCE_DELAY)
    }

    pub fn with_delay(delay: Duration) -> Searcher {
        let (tx, _) = watch::channel(SearchSnapshot::default());
        Searcher {
            delay,
            trees: Arc::new(Mutex::new(Vec::new())),
            pending: None,
            searching: false,
            tx: Arc::new(tx),
        }
    }

    /// Snapshots are published here once per executed search (and
    /// immediately on query reset)
    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.tx.subscribe()
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    /// Registers the assembled comment tree of a story, replacing any
    /// previously registered tree for the same story. Trees arrive
    /// incrementally as stories get loaded.
    pub fn register_comments(&self, story: Story, comments: Vec<Comment>) {
        let mut trees = self.trees.lock();
        match trees.iter_mut().find(|(s, _)| s.id == story.id) {
            Some(entry) => *entry = (story, comments),
            None => trees.push((story, comments)),
        }
    }

    /// Must be called from within a tokio runtime
    pub fn update_query(&mut self, query: &str, stories: &[Story]) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }

        if query.trim().is_empty() {
            self.searching = false;
            self.tx.send_replace(SearchSnapshot {
                query: query.to_owned(),
                searching: false,
                results: Vec::new(),
                filtered_stories: stories.to_vec(),
            });
            return;
        }

        self.searching = true;
        let query = query.to_owned();
        let stories = stories.to_vec();
        let trees = self.trees.clone();
        let tx = self.tx.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let trees = trees.lock().clone();
            let results = search(&query, &stories, &trees);
            let filtered_stories = filter_stories(&stories, &query);
            tx.send_replace(SearchSnapshot {
                query,
                searching: true,
                results,
                filtered_stories,
            });
        }));
    }
}

impl Drop for Searcher {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl Default for Searcher {
    fn default() -> Searcher {
        Searcher::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ItemId;

    fn story(id: u64, title: &str, text: Option<&str>, time: i64) -> Story {
        Story {
            id: ItemId(id),
            title: title.to_owned(),
            by: "pg".to_owned(),
            time,
            score: 1,
            descendants: None,
            url: None,
            text: text.map(str::to_owned),
            kids: None,
            kind: "story".to_owned(),
        }
    }

    fn comment(id: u64, by: Option<&str>, text: &str, time: i64) -> Comment {
        Comment {
            id: ItemId(id),
            by: by.map(str::to_owned),
            time,
            text: Some(text.to_owned()),
            kids: None,
            parent: None,
            replies: None,
        }
    }

    #[test]
    fn title_match_with_clipped_context() {
        let stories = vec![story(1, "Rust is great", None, 0)];
        let results = search("rust", &stories, &[]);
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.kind, SearchResultKind::Story);
        assert_eq!(result.matched_text, "Rust");
        assert_eq!(result.context_before, "");
        assert_eq!(result.context_after, " is great");
        assert_eq!(result.comment_id, None);
    }

    #[test]
    fn title_wins_over_body_and_yields_one_result() {
        let stories = vec![story(1, "Rust 1.0 released", Some("rust rust rust"), 0)];
        let results = search("rust", &stories, &[]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].matched_text, "Rust");
        assert_eq!(results[0].context_after, " 1.0 released");
    }

    #[test]
    fn body_is_searched_when_title_misses() {
        let stories = vec![story(1, "Show HN", Some("a tool written in Rust"), 0)];
        let results = search("rust", &stories, &[]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].matched_text, "Rust");
        assert_eq!(results[0].context_before, "a tool written in ");
    }

    #[test]
    fn context_is_capped_at_fifty_chars_each_side() {
        let text = format!("{}needle{}", "a".repeat(80), "b".repeat(80));
        let stories = vec![story(1, "irrelevant", Some(&text), 0)];
        let results = search("needle", &stories, &[]);
        assert_eq!(results[0].context_before, "a".repeat(50));
        assert_eq!(results[0].context_after, "b".repeat(50));
    }

    #[test]
    fn context_survives_multibyte_text() {
        let stories = vec![story(1, "héllo wörld", None, 0)];
        let results = search("wörld", &stories, &[]);
        assert_eq!(results[0].matched_text, "wörld");
        assert_eq!(results[0].context_before, "héllo ");
        assert_eq!(results[0].context_after, "");
    }

    #[test]
    fn whole_reply_tree_is_searched_and_dead_comments_skipped() {
        let mut root = comment(10, Some("a"), "rust at the root", 3);
        let mut child = comment(11, Some("b"), "rust in the child", 2);
        let grandchild = comment(12, Some("c"), "rust in the grandchild", 1);
        let dead = comment(13, None, "rust in a dead comment", 4);
        child.replies = Some(vec![grandchild]);
        root.replies = Some(vec![child]);

        let owner = story(1, "irrelevant", None, 0);
        let trees = vec![(owner, vec![root, dead])];
        let results = search("rust", &[], &trees);

        assert_eq!(results.len(), 3);
        assert!(results
            .iter()
            .all(|result| result.kind == SearchResultKind::Comment));
        assert!(results
            .iter()
            .all(|result| result.comment_id != Some(ItemId(13))));
    }

    #[test]
    fn exact_matches_outrank_newer_partial_matches() {
        let stories = vec![
            story(1, "rustacean life", None, 100),
            story(2, "rust", None, 1),
        ];
        let results = search("rust", &stories, &[]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].story_id, ItemId(2));
        assert_eq!(results[1].story_id, ItemId(1));
    }

    #[test]
    fn within_a_tier_newest_comes_first() {
        let stories = vec![
            story(1, "rusty nails", None, 5),
            story(2, "rustic cabins", None, 50),
            story(3, "trust me", None, 20),
        ];
        let results = search("rust", &stories, &[]);
        let ids: Vec<ItemId> = results.iter().map(|r| r.story_id).collect();
        assert_eq!(ids, vec![ItemId(2), ItemId(3), ItemId(1)]);
    }

    #[test]
    fn filter_stories_is_case_insensitive_over_title_and_body() {
        let stories = vec![
            story(1, "Rust is great", None, 0),
            story(2, "Show HN", Some("made with RUST"), 0),
            story(3, "Python news", None, 0),
        ];
        let filtered = filter_stories(&stories, "rust");
        let ids: Vec<ItemId> = filtered.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![ItemId(1), ItemId(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_query_updates_execute_exactly_one_search() {
        let mut searcher = Searcher::new();
        let mut rx = searcher.subscribe();
        let stories = vec![story(1, "Rust is great", None, 0)];

        for query in ["r", "ru", "rus", "rust"] {
            searcher.update_query(query, &stories);
        }
        assert!(searcher.is_searching());

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.query, "rust");
        assert_eq!(snapshot.results.len(), 1);
        assert_eq!(snapshot.results[0].matched_text, "Rust");
        assert_eq!(snapshot.filtered_stories.len(), 1);
        // the three superseded queries never executed
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_query_resets_immediately_without_delay() {
        let mut searcher = Searcher::new();
        let mut rx = searcher.subscribe();
        let stories = vec![story(1, "Rust is great", None, 0)];

        searcher.update_query("rust", &stories);
        searcher.update_query("   ", &stories);

        // no time has passed, the reset is already visible
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert!(!snapshot.searching);
        assert!(snapshot.results.is_empty());
        assert_eq!(snapshot.filtered_stories.len(), 1);
        assert!(!searcher.is_searching());

        // and the aborted "rust" search never lands
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn registered_trees_replace_by_story_id() {
        let mut searcher = Searcher::with_delay(Duration::from_millis(10));
        let mut rx = searcher.subscribe();
        let owner = story(1, "irrelevant", None, 0);

        searcher.register_comments(owner.clone(), vec![comment(10, Some("a"), "old rust", 1)]);
        searcher.register_comments(
            owner.clone(),
            vec![
                comment(11, Some("a"), "new rust", 1),
                comment(12, Some("b"), "more rust", 2),
            ],
        );

        searcher.update_query("rust", &[]);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.results.len(), 2);
        assert!(snapshot
            .results
            .iter()
            .all(|result| result.comment_id != Some(ItemId(10))));
    }

    #[test]
    fn empty_query_matches_nothing() {
        let stories = vec![story(1, "Rust is great", None, 0)];
        assert!(search("", &stories, &[]).is_empty());
    }
}
