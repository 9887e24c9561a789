use std::{fs, path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use color_eyre::eyre;
use tracing_subscriber::EnvFilter;

use desk_agents::{
	AgentContext, AgentDeps, BoxFuture, CaseHistory, CaseRecord, CaseStore, CaseUpdate,
	Collaborators, HttpChat, Notification, NotificationSink, Tier1Agent, Tier2Agent, TimelineEvent,
	VisualSession, VisualSessionRequest, VisualSessionService,
};
use desk_playbook::PlaybookRegistry;
use desk_providers::{ChatClient, EmbeddingClient};
use desk_retrieval::{HttpEmbedder, IngestRequest, RetrievalEngine, qdrant::QdrantIndex};

#[derive(Debug, Parser)]
#[command(version, rename_all = "kebab", about = "Support desk engine operator tool.")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Validate the configuration file and exit.
	CheckConfig,
	/// Chunk, embed, and index a document into a tenant knowledge base.
	Ingest {
		#[arg(long)]
		tenant: String,
		#[arg(long)]
		kb: String,
		#[arg(long)]
		doc: String,
		#[arg(long)]
		product: String,
		#[arg(long)]
		language: Option<String>,
		/// Path of the document to ingest.
		file: PathBuf,
	},
	/// Run a single agent turn against the live providers.
	Turn {
		#[arg(long)]
		tenant: String,
		#[arg(long)]
		case: String,
		#[arg(long, default_value_t = 1)]
		tier: u8,
		#[arg(long)]
		product: Option<String>,
		message: String,
	},
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let cfg = desk_config::load(&args.config)?;

	init_tracing(&cfg);

	match args.command {
		Command::CheckConfig => {
			println!("Configuration is valid.");

			Ok(())
		},
		Command::Ingest { tenant, kb, doc, product, language, file } =>
			ingest(&cfg, &tenant, &kb, &doc, &product, language.as_deref(), &file).await,
		Command::Turn { tenant, case, tier, product, message } =>
			turn(&cfg, &tenant, &case, tier, product, &message).await,
	}
}

async fn ingest(
	cfg: &desk_config::Config,
	tenant: &str,
	kb: &str,
	doc: &str,
	product: &str,
	language: Option<&str>,
	file: &PathBuf,
) -> color_eyre::Result<()> {
	let text = fs::read_to_string(file)?;
	let engine = retrieval_engine(cfg).await?;
	let chunking = chunking_config(cfg);
	let report = engine
		.ingest_document(
			&IngestRequest { tenant_id: tenant, kb_id: kb, doc_id: doc, product, language, text: &text },
			&chunking,
		)
		.await?;

	tracing::info!(
		tenant,
		kb,
		doc,
		chunks = report.chunks,
		language = report.language.as_deref().unwrap_or("unknown"),
		"Document ingested."
	);
	println!("Indexed {} chunks from {}.", report.chunks, file.display());

	Ok(())
}

async fn turn(
	cfg: &desk_config::Config,
	tenant: &str,
	case: &str,
	tier: u8,
	product: Option<String>,
	message: &str,
) -> color_eyre::Result<()> {
	let retrieval = Arc::new(retrieval_engine(cfg).await?);
	let chat = HttpChat::new(ChatClient::new(cfg.providers.chat.clone())?);
	let playbooks = match cfg.playbooks.dir.as_ref() {
		Some(dir) => PlaybookRegistry::load_dir(dir)?,
		None => PlaybookRegistry::empty(),
	};
	let deps = AgentDeps {
		chat,
		retrieval,
		playbooks: Arc::new(playbooks),
		collaborators: Collaborators {
			case_store: Arc::new(LogCaseStore),
			visual_sessions: Arc::new(NoVisualSessions),
			notifications: Arc::new(LogSink),
		},
		guardrails: cfg.guardrails.clone(),
	};
	let ctx = AgentContext {
		tenant_id: tenant.to_string(),
		case_id: case.to_string(),
		product,
		category: None,
		language: None,
		severity: None,
		history: Vec::new(),
		playbook_state: None,
		failed_attempts: 0,
	};
	let response = match tier {
		1 => Tier1Agent::new(deps, cfg.agents.tier1.clone()).handle_turn(&ctx, message).await?,
		2 =>
			Tier2Agent::new(deps, cfg.agents.tier2.clone())
				.handle_turn(&ctx, &CaseHistory::default(), message)
				.await?,
		other => return Err(eyre::eyre!("Unknown tier {other}; expected 1 or 2.")),
	};

	println!("{}", response.message);

	if response.should_escalate {
		println!(
			"-- escalate: {} ({})",
			response.escalation_level.map(|level| level.to_string()).unwrap_or_default(),
			response.escalation_reason.unwrap_or_default(),
		);
	}
	if !response.sources.is_empty() {
		println!("-- sources:");

		for source in &response.sources {
			println!("   [{}] {}/{}", source.number, source.kb_id, source.doc_id);
		}
	}

	tracing::info!(
		model = response.metadata.model.as_deref().unwrap_or("unknown"),
		prompt_tokens = response.metadata.usage.prompt_tokens,
		completion_tokens = response.metadata.usage.completion_tokens,
		elapsed_ms = response.metadata.processing_ms,
		"Turn complete."
	);

	Ok(())
}

async fn retrieval_engine(cfg: &desk_config::Config) -> color_eyre::Result<RetrievalEngine> {
	let index = QdrantIndex::new(&cfg.storage.qdrant)?;

	index.ensure_collection().await?;

	let embedder = HttpEmbedder::new(EmbeddingClient::new(cfg.providers.embedding.clone())?);

	Ok(RetrievalEngine::new(Arc::new(index), embedder).with_thresholds(&cfg.retrieval))
}

fn chunking_config(cfg: &desk_config::Config) -> desk_chunking::ChunkingConfig {
	desk_chunking::ChunkingConfig {
		max_tokens: cfg.chunking.max_tokens,
		min_tokens: cfg.chunking.min_tokens,
		overlap_tokens: cfg.chunking.overlap_tokens,
	}
}

fn init_tracing(cfg: &desk_config::Config) {
	let filter =
		EnvFilter::try_new(&cfg.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// The CLI runs without a case store attached; timeline events land in the log.
struct LogCaseStore;
impl CaseStore for LogCaseStore {
	fn add_timeline_event<'a>(
		&'a self,
		case_id: &'a str,
		event: TimelineEvent,
	) -> BoxFuture<'a, desk_agents::Result<()>> {
		tracing::info!(case = case_id, kind = %event.kind, detail = %event.detail, "Timeline event.");

		Box::pin(async move { Ok(()) })
	}

	fn get_case<'a>(&'a self, _case_id: &'a str) -> BoxFuture<'a, desk_agents::Result<CaseRecord>> {
		Box::pin(async move {
			Err(desk_agents::Error::Collaborator {
				message: "No case store is attached to the CLI.".to_string(),
			})
		})
	}

	fn update_case<'a>(
		&'a self,
		case_id: &'a str,
		update: CaseUpdate,
	) -> BoxFuture<'a, desk_agents::Result<()>> {
		tracing::info!(case = case_id, ?update, "Case update requested.");

		Box::pin(async move { Ok(()) })
	}
}

struct NoVisualSessions;
impl VisualSessionService for NoVisualSessions {
	fn create_session<'a>(
		&'a self,
		_tenant_id: &'a str,
		_case_id: &'a str,
		_request: VisualSessionRequest,
	) -> BoxFuture<'a, desk_agents::Result<VisualSession>> {
		Box::pin(async move {
			Err(desk_agents::Error::Collaborator {
				message: "No visual session service is attached to the CLI.".to_string(),
			})
		})
	}
}

struct LogSink;
impl NotificationSink for LogSink {
	fn notify<'a>(&'a self, notification: Notification) -> BoxFuture<'a, desk_agents::Result<()>> {
		tracing::info!(
			case = %notification.case_id,
			severity = %notification.severity,
			"{}",
			notification.message,
		);

		Box::pin(async move { Ok(()) })
	}
}
