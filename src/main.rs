use clap::{Parser, Subcommand};
use color_eyre::Result;
use querydeck::app::App;
use querydeck::config::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "querydeck")]
#[command(about = "Browse todos, posts and users through a keyed query cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/querydeck/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Increase log verbosity (-v info, -vv debug, -vvv trace)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  /// Write logs to this file instead of stderr
  #[arg(long, global = true)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// List all todos
  Todos,
  /// Show one todo
  Todo {
    id: u32,
    /// Flip the completed flag optimistically
    #[arg(long)]
    toggle: bool,
  },
  /// Search posts, one page at a time
  Posts {
    /// Posts per page (default from config)
    #[arg(long)]
    limit: Option<u32>,
    /// Number of posts to skip
    #[arg(long, default_value_t = 0)]
    skip: u32,
    /// Search text
    #[arg(short, long, default_value = "")]
    q: String,
    /// Browse pages and search interactively
    #[arg(short, long)]
    interactive: bool,
  },
  /// Load several users in parallel
  Users {
    #[arg(default_values_t = [1, 2, 3, 4])]
    ids: Vec<u32>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _guard = querydeck::logging::init(args.verbose, args.log_file.as_deref())?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let app = App::new(config)?;
  match args.command {
    Commands::Todos => app.todos().await,
    Commands::Todo { id, toggle } => app.todo(id, toggle).await,
    Commands::Posts {
      limit,
      skip,
      q,
      interactive,
    } => {
      let params = app.page_params(limit, skip, &q);
      if interactive {
        app.browse_posts(params).await
      } else {
        app.posts(&params).await
      }
    }
    Commands::Users { ids } => app.users(&ids).await,
  }
}
