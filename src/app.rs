use crate::api::types::{PostsPage, Todo};
use crate::api::{CachedApi, ResourceKey};
use crate::cache::CacheResult;
use crate::commands::{self, Input};
use crate::config::Config;
use crate::debounce::Debouncer;
use crate::error::QueryError;
use crate::event::{Event, EventHandler};
use crate::observer::QueryObserver;
use crate::pagination::PageParams;
use crate::render;
use color_eyre::Result;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(250);

/// Main application state
pub struct App {
  config: Config,
  api: CachedApi,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let api = CachedApi::new(&config)?;
    Ok(Self { config, api })
  }

  /// Default page parameters, honoring the configured page size.
  pub fn page_params(&self, limit: Option<u32>, skip: u32, q: &str) -> PageParams {
    PageParams::new(limit.unwrap_or(self.config.search.page_size), skip, q)
  }

  pub async fn todos(&self) -> Result<()> {
    let result = self.api.todos().await?;
    print_source(&result);
    print!("{}", render::todo_list(&result.data));
    Ok(())
  }

  pub async fn todo(&self, id: u32, toggle: bool) -> Result<()> {
    let result = self.api.todo(id).await?;
    print_source(&result);
    print!("{}", render::todo_detail(&result.data));

    if !toggle {
      return Ok(());
    }

    println!("Updating todo #{}...", id);
    match self.api.toggle_todo(id).await {
      Ok(updated) => {
        print!("{}", render::todo_detail(&updated));
        Ok(())
      }
      Err(e) if e.is_cancelled() => surface(e),
      Err(e) => {
        let key = ResourceKey::Todo { id }.cache_key();
        if let Ok(Some(restored)) = self.api.client().get_query_data::<Todo>(&key) {
          println!("Update failed, restored previous value:");
          print!("{}", render::todo_detail(&restored));
        }
        surface(e)
      }
    }
  }

  pub async fn posts(&self, params: &PageParams) -> Result<()> {
    let result = self.api.posts(params).await?;
    print_source(&result);
    print!("{}", render::posts_page(params, &result.data, false));
    Ok(())
  }

  pub async fn users(&self, ids: &[u32]) -> Result<()> {
    for (id, result) in self.api.users(ids).await {
      let result = result.map(|r| r.data);
      if let Some(card) = render::user_card(id, &result) {
        print!("{}", card);
      }
    }
    Ok(())
  }

  /// Interactive posts browser.
  ///
  /// Plain lines are search text, applied after the debounce delay.
  /// Lines starting with `:` are commands.
  pub async fn browse_posts(&self, params: PageParams) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);
    let mut debouncer = Debouncer::new(
      Duration::from_millis(self.config.search.debounce_ms),
      events.sender(),
    );
    let mut browser = PostsBrowser::new(&self.api, params);

    println!("Type to search, :help for commands");
    browser.render();
    prompt();

    while let Some(event) = events.next().await {
      match event {
        Event::Input(line) => match commands::parse_input(&line) {
          Input::Command(cmd) => match cmd.name {
            "next" => browser.next_page(),
            "prev" => browser.prev_page(),
            "refresh" => browser.refresh(),
            "help" => println!("{}", commands::help_text()),
            "quit" => break,
            other => debug!(command = other, "unhandled command"),
          },
          Input::Search(text) => debouncer.call(Event::Search(text)),
          Input::Unknown(name) => println!("Unknown command :{} (try :help)", name),
        },
        Event::Search(q) => browser.search(q),
        Event::Tick => {
          if browser.poll() {
            prompt();
          }
          let evicted = self.api.client().collect_garbage();
          if evicted > 0 {
            debug!(evicted, "cache entries evicted");
          }
        }
        Event::Eof => break,
      }
    }

    debouncer.cancel();
    info!("posts browser closed");
    Ok(())
  }
}

/// Current page of the interactive browser and its observer.
struct PostsBrowser<'a> {
  api: &'a CachedApi,
  params: PageParams,
  observer: QueryObserver<PostsPage>,
  last_rendered: Option<String>,
}

impl<'a> PostsBrowser<'a> {
  fn new(api: &'a CachedApi, params: PageParams) -> Self {
    let mut observer = api.posts_observer(&params, None);
    observer.fetch();
    Self {
      api,
      params,
      observer,
      last_rendered: None,
    }
  }

  /// Switch to `params`, showing the current page until the new one loads.
  fn navigate(&mut self, params: PageParams) {
    let placeholder = self.observer.data().cloned();
    self.params = params;
    self.observer = self.api.posts_observer(&self.params, placeholder);
    self.observer.fetch();
    self.render();
  }

  fn next_page(&mut self) {
    if self.observer.is_placeholder() {
      println!("Still loading, try again in a moment");
      return;
    }
    let has_more = self
      .observer
      .data()
      .is_some_and(|page| self.params.has_next(page.total));
    if has_more {
      self.navigate(self.params.next());
    } else {
      println!("Already on the last page");
    }
  }

  fn prev_page(&mut self) {
    if self.params.is_first() {
      println!("Already on the first page");
    } else {
      self.navigate(self.params.prev());
    }
  }

  fn search(&mut self, q: String) {
    if q != self.params.q {
      self.navigate(self.params.with_search(q));
    }
  }

  fn refresh(&mut self) {
    self.last_rendered = None;
    self.observer.refetch();
  }

  /// Apply cache notifications. Returns true if something was printed.
  fn poll(&mut self) -> bool {
    self.observer.poll() && self.render()
  }

  fn render(&mut self) -> bool {
    let out = match (self.observer.data(), self.observer.error()) {
      (Some(page), _) => render::posts_page(&self.params, page, self.observer.is_placeholder()),
      (None, Some(error)) => format!("Error: {}\n", error),
      (None, None) => "Loading...\n".to_string(),
    };
    if self.last_rendered.as_deref() == Some(out.as_str()) {
      return false;
    }
    print!("{}", out);
    self.last_rendered = Some(out);
    true
  }
}

fn print_source<T>(result: &CacheResult<T>) {
  if let Some(note) = render::source_note(result) {
    println!("{}", note);
  }
}

fn prompt() {
  print!("> ");
  let _ = std::io::stdout().flush();
}

/// Turn a query error into the command's result. Cancellation means a newer
/// action took over, so there is nothing to report.
fn surface(err: QueryError) -> Result<()> {
  if err.is_cancelled() {
    debug!("operation superseded, nothing to report");
    Ok(())
  } else {
    Err(err.into())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cancelled_is_silent() {
    assert!(surface(QueryError::Cancelled).is_ok());
  }

  #[test]
  fn test_transport_error_is_reported() {
    let err = surface(QueryError::transport("500 internal server error")).unwrap_err();
    assert_eq!(err.to_string(), "500 internal server error");
  }
}
