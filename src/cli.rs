//! CLI argument definitions using clap derive macros.

use std::time::Duration;

use clap::Parser;

use regfetch_core::extract::DEFAULT_MAX_CONTENT_LENGTH;
use regfetch_core::processor::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_WORKERS};
use regfetch_core::registry::{DEFAULT_API_BASE, DEFAULT_SITE_BASE};
use regfetch_core::retriever::DEFAULT_PAGE_SIZE;
use regfetch_core::{
    ContentLimits, DEFAULT_MAX_RETRIES, HttpSettings, PipelineConfig, ProcessorConfig,
    RegistryEndpoints, RetrievalSettings, RetryPolicy,
};

/// Fetch Federal Register documents for one or more agencies.
///
/// Prints one JSON line per retrieved document to stdout; logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "regfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Agency slugs, e.g. environmental-protection-agency
    #[arg(required = true)]
    pub agencies: Vec<String>,

    /// Maximum documents per agency (default: no limit)
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Whole-request timeout in seconds (1-600)
    #[arg(long, env = "REGFETCH_REQUEST_TIMEOUT", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub request_timeout: u64,

    /// Maximum attempts per request, including the first (1-10)
    #[arg(short = 'r', long, env = "REGFETCH_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_retries: u32,

    /// Base retry delay in milliseconds
    #[arg(long, env = "REGFETCH_RETRY_BASE_DELAY_MS", default_value_t = 1000)]
    pub retry_base_delay_ms: u64,

    /// Retry delay cap in milliseconds
    #[arg(long, env = "REGFETCH_RETRY_MAX_DELAY_MS", default_value_t = 60_000)]
    pub retry_max_delay_ms: u64,

    /// Backoff multiplier applied per attempt
    #[arg(long, env = "REGFETCH_BACKOFF_MULTIPLIER", default_value_t = 2.0)]
    pub backoff_multiplier: f64,

    /// Listing page size (1-1000)
    #[arg(long, env = "REGFETCH_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub page_size: u32,

    /// Delay between listing pages and between documents in milliseconds (max 60000)
    #[arg(short = 'l', long, env = "REGFETCH_RATE_LIMIT_MS", default_value_t = 1000, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_limit_ms: u64,

    /// Maximum characters kept per document
    #[arg(long, env = "REGFETCH_MAX_DOC_LENGTH", default_value_t = DEFAULT_MAX_CONTENT_LENGTH)]
    pub max_doc_length: usize,

    /// Concurrent processing workers (1-100)
    #[arg(short = 'w', long, env = "REGFETCH_WORKERS", default_value_t = DEFAULT_MAX_WORKERS as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub workers: u8,

    /// Documents per processing chunk
    #[arg(long, env = "REGFETCH_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE, value_parser = parse_chunk_size)]
    pub chunk_size: usize,

    /// Process memory ceiling in megabytes
    #[arg(long, env = "REGFETCH_MEMORY_LIMIT_MB", default_value_t = 1024)]
    pub memory_limit_mb: u64,

    /// Do not scrape the page view when structured text fails
    #[arg(long, env = "REGFETCH_NO_PAGE_FALLBACK")]
    pub no_page_fallback: bool,

    /// Disable memory/CPU monitoring
    #[arg(long)]
    pub no_monitor: bool,

    /// Listing API base URL
    #[arg(long, env = "REGFETCH_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Public site base URL
    #[arg(long, env = "REGFETCH_SITE_BASE", default_value = DEFAULT_SITE_BASE)]
    pub site_base: String,
}

fn parse_chunk_size(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("chunk size must be at least 1".to_string()),
        Ok(size) => Ok(size),
        Err(e) => Err(e.to_string()),
    }
}

impl Args {
    /// Maps the flags onto pipeline settings. Validation happens later.
    pub fn pipeline_config(&self) -> PipelineConfig {
        let delay = Duration::from_millis(self.rate_limit_ms);
        let defaults = PipelineConfig::default();
        PipelineConfig {
            http: HttpSettings {
                request_timeout: Duration::from_secs(self.request_timeout),
                ..HttpSettings::default()
            },
            retry: RetryPolicy::new(
                self.max_retries,
                Duration::from_millis(self.retry_base_delay_ms),
                Duration::from_millis(self.retry_max_delay_ms),
                self.backoff_multiplier,
            ),
            retrieval: RetrievalSettings::new(self.page_size, delay, delay),
            content: ContentLimits {
                max_length: self.max_doc_length,
                page_fallback: !self.no_page_fallback,
                ..ContentLimits::default()
            },
            processor: ProcessorConfig {
                max_workers: usize::from(self.workers),
                chunk_size: self.chunk_size,
                memory_limit_mb: self.memory_limit_mb,
                enable_monitoring: !self.no_monitor,
                ..ProcessorConfig::default()
            },
            endpoints: RegistryEndpoints::new(&self.api_base, &self.site_base),
            ..defaults
        }
    }
}
