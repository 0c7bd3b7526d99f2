//! lingua-kb CLI: ask and tell a knowledge base from the shell.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use miette::Result;

use lingua_kb::backend::Backend;
use lingua_kb::backend::document::DocumentAdapter;
use lingua_kb::backend::reasoner::DEFAULT_ABOX;
use lingua_kb::config::KbConfig;
use lingua_kb::error::KbError;
use lingua_kb::registry::ConnectionRegistry;
use lingua_kb::session::KnowledgeBase;
use lingua_kb::store::DocumentStore;
use lingua_kb::store::durable::DurableDocumentStore;
use lingua_kb::store::mem::MemDocumentStore;

#[derive(Parser)]
#[command(name = "lingua-kb", version, about = "Statement-level knowledge base client")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend answering the statements.
    #[arg(long, global = true, value_enum, default_value_t = BackendKind::Reasoner)]
    backend: BackendKind,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    Reasoner,
    Document,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a statement, e.g. "(? has-color ball1)".
    Ask { statement: String },

    /// Assert statements in order; wrap one in (not ...) to retract it.
    Tell {
        #[arg(required = true)]
        statements: Vec<String>,
    },

    /// Print every fact in the knowledge base.
    Dump,

    /// Inspect or edit the type forest (document backend).
    Types {
        #[command(subcommand)]
        action: TypeAction,
    },
}

#[derive(Subcommand)]
enum TypeAction {
    /// All ancestors of a type.
    Parents { typename: String },
    /// All descendants of a type.
    Children { typename: String },
    /// Add or replace a type.
    Add {
        typename: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Remove a type and everything below it.
    Remove { typename: String },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = KbConfig::load_or_default(cli.config.as_deref())?;

    let outcome = match cli.backend {
        BackendKind::Reasoner => {
            let registry = ConnectionRegistry::global();
            let mut kb = KnowledgeBase::reasoner(registry, &config);
            // Without an ontology to load, work in the reasoner's default abox.
            if config.reasoner.ontology.is_none() {
                kb = kb.with_abox(DEFAULT_ABOX);
            }
            let outcome = run(&mut kb, cli.command);
            registry.shutdown();
            outcome
        }
        BackendKind::Document => {
            let store: Arc<dyn DocumentStore> = match &config.document.path {
                Some(path) => Arc::new(DurableDocumentStore::open(path)?),
                None => Arc::new(MemDocumentStore::new()),
            };
            let mut kb = KnowledgeBase::document(store, &config);
            match cli.command {
                Commands::Types { action } => types(&mut kb, action),
                command => run(&mut kb, command),
            }
        }
    };

    // A failed clone leaves the reasoner's abox selection unknown.
    if let Err(report) = &outcome {
        if report.downcast_ref::<KbError>().is_some_and(KbError::is_fatal) {
            eprintln!("{report:?}");
            std::process::exit(2);
        }
    }
    outcome
}

fn run<B: Backend>(kb: &mut KnowledgeBase<B>, command: Commands) -> Result<()> {
    if matches!(command, Commands::Types { .. }) {
        miette::bail!("the types commands need --backend document");
    }
    kb.connect()?;
    match command {
        Commands::Ask { statement } => {
            println!("{}", kb.ask(&statement)?);
        }
        Commands::Tell { statements } => {
            for statement in &statements {
                kb.tell(statement)?;
            }
            println!("told {} statement(s)", statements.len());
        }
        Commands::Dump => {
            for fact in kb.dump()? {
                println!("{fact}");
            }
        }
        Commands::Types { .. } => {}
    }
    Ok(())
}

fn types(kb: &mut KnowledgeBase<DocumentAdapter>, action: TypeAction) -> Result<()> {
    match action {
        TypeAction::Parents { typename } => {
            for t in kb.get_parent_types(&typename)? {
                println!("{t}");
            }
        }
        TypeAction::Children { typename } => {
            for t in kb.get_child_types(&typename)? {
                println!("{t}");
            }
        }
        TypeAction::Add { typename, parent } => {
            kb.add_type(&typename, parent.as_deref())?;
            println!("added type {typename}");
        }
        TypeAction::Remove { typename } => {
            let removed = kb.remove_type(&typename)?;
            println!("removed {removed} type(s)");
        }
    }
    Ok(())
}
