//! Plain-text rendering of query results.

use crate::api::types::{Post, PostsPage, Todo, User};
use crate::cache::{CacheResult, CacheSource};
use crate::error::QueryError;
use crate::pagination::PageParams;

/// Maximum number of todos listed at once
pub const TODO_LIST_LIMIT: usize = 100;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

fn checkbox(done: bool) -> &'static str {
  if done {
    "[x]"
  } else {
    "[ ]"
  }
}

pub fn todo_list(todos: &[Todo]) -> String {
  let mut out = format!("Todos ({})\n", todos.len());
  for todo in todos.iter().take(TODO_LIST_LIMIT) {
    out.push_str(&format!(
      "  {} {:>3}. {}\n",
      checkbox(todo.completed),
      todo.id,
      todo.title
    ));
  }
  if todos.len() > TODO_LIST_LIMIT {
    out.push_str(&format!("  ... {} more\n", todos.len() - TODO_LIST_LIMIT));
  }
  out
}

pub fn todo_detail(todo: &Todo) -> String {
  format!(
    "Todo #{}\n  {} {}\n  user {}\n",
    todo.id,
    checkbox(todo.completed),
    todo.title,
    todo.user_id
  )
}

fn post_summary(post: &Post) -> String {
  let mut out = format!("  #{} {}\n", post.id, truncate(&post.title, 72));
  if !post.tags.is_empty() {
    out.push_str(&format!("     tags: {}\n", post.tags.join(", ")));
  }
  out.push_str(&format!(
    "     {} views | {} likes | {} dislikes\n",
    post.views, post.reactions.likes, post.reactions.dislikes
  ));
  out
}

/// One page of posts. `placeholder` marks data kept from the previous page.
pub fn posts_page(params: &PageParams, page: &PostsPage, placeholder: bool) -> String {
  let pages = page.total.div_ceil(u64::from(params.limit)).max(1);
  let mut out = format!("Posts, page {} of {}", params.page_number(), pages);
  if !params.q.is_empty() {
    out.push_str(&format!(" matching '{}'", params.q));
  }
  if placeholder {
    out.push_str(" (loading...)");
  }
  out.push('\n');

  if page.posts.is_empty() {
    out.push_str("  No posts found\n");
  }
  for post in &page.posts {
    out.push_str(&post_summary(post));
  }
  out
}

/// One user's card, or `None` when the load was cancelled.
pub fn user_card(id: u32, result: &Result<User, QueryError>) -> Option<String> {
  match result {
    Ok(user) => {
      let mut out = format!("User #{}: {} ({})\n", user.id, user.full_name(), user.age);
      if let Some(city) = &user.city {
        out.push_str(&format!("  city: {}\n", city));
      }
      if let Some(company) = &user.company {
        out.push_str(&format!("  company: {}\n", company));
      }
      Some(out)
    }
    Err(QueryError::Cancelled) => None,
    Err(e) => Some(format!("Error loading user #{}: {}\n", id, e)),
  }
}

/// Human-readable error, or `None` for cancellations.
pub fn error_message(err: &QueryError) -> Option<String> {
  match err {
    QueryError::Cancelled => None,
    e => Some(format!("Error: {}", e)),
  }
}

/// Note about where a result came from, if it was not the network.
pub fn source_note<T>(result: &CacheResult<T>) -> Option<String> {
  let when = result
    .cached_at
    .map(|at| at.format("%H:%M:%S").to_string())
    .unwrap_or_else(|| "unknown time".to_string());
  match result.source {
    CacheSource::Network => None,
    CacheSource::CacheFresh => Some(format!("(cached at {})", when)),
    CacheSource::Offline => Some(format!("(offline, showing data from {})", when)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::Reactions;

  fn todo(id: u32, completed: bool) -> Todo {
    Todo {
      user_id: 1,
      id,
      title: format!("todo {}", id),
      completed,
    }
  }

  #[test]
  fn test_truncate() {
    assert_eq!(truncate("hello", 5), "hello");
    assert_eq!(truncate("hello world", 8), "hello...");
    assert_eq!(truncate("héllo wörld", 8), "héllo...");
  }

  #[test]
  fn test_todo_list_caps_at_limit() {
    let todos: Vec<Todo> = (1..=120).map(|id| todo(id, id % 2 == 0)).collect();
    let out = todo_list(&todos);
    assert!(out.starts_with("Todos (120)"));
    assert!(out.contains("[ ]   1. todo 1"));
    assert!(out.contains("[x]   2. todo 2"));
    assert!(out.contains("todo 100\n"));
    assert!(!out.contains("todo 101\n"));
    assert!(out.contains("... 20 more"));
  }

  #[test]
  fn test_todo_detail() {
    let out = todo_detail(&todo(3, true));
    assert!(out.starts_with("Todo #3"));
    assert!(out.contains("[x] todo 3"));
  }

  #[test]
  fn test_posts_page() {
    let page = PostsPage {
      posts: vec![Post {
        id: 1,
        title: "His mother had always taught him".to_string(),
        body: String::new(),
        tags: vec!["history".to_string(), "crime".to_string()],
        reactions: Reactions {
          likes: 192,
          dislikes: 25,
        },
        views: 305,
        user_id: 121,
      }],
      total: 9,
    };
    let params = PageParams::new(4, 4, "his");
    let out = posts_page(&params, &page, true);
    assert!(out.starts_with("Posts, page 2 of 3 matching 'his' (loading...)"));
    assert!(out.contains("tags: history, crime"));
    assert!(out.contains("305 views | 192 likes | 25 dislikes"));
  }

  #[test]
  fn test_empty_posts_page() {
    let out = posts_page(&PageParams::default(), &PostsPage::default(), false);
    assert!(out.contains("page 1 of 1"));
    assert!(out.contains("No posts found"));
  }

  #[test]
  fn test_user_card() {
    let user = User {
      id: 2,
      first_name: "Michael".to_string(),
      last_name: "Williams".to_string(),
      age: 35,
      image: None,
      city: Some("Phoenix".to_string()),
      company: None,
    };
    let out = user_card(2, &Ok(user)).unwrap();
    assert!(out.contains("User #2: Michael Williams (35)"));
    assert!(out.contains("city: Phoenix"));

    assert_eq!(user_card(3, &Err(QueryError::Cancelled)), None);
    let err = user_card(4, &Err(QueryError::transport("HTTP 404"))).unwrap();
    assert!(err.starts_with("Error loading user #4"));
  }

  #[test]
  fn test_error_message_hides_cancel() {
    assert_eq!(error_message(&QueryError::Cancelled), None);
    assert_eq!(
      error_message(&QueryError::transport("boom")).as_deref(),
      Some("Error: boom")
    );
  }

  #[test]
  fn test_source_note() {
    assert_eq!(source_note(&CacheResult::from_network(1)), None);
    let at = chrono::Utc::now();
    let note = source_note(&CacheResult::offline(1, Some(at))).unwrap();
    assert!(note.starts_with("(offline"));
    assert!(note.contains(&at.format("%H:%M:%S").to_string()));
  }
}
