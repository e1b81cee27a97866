// src/pipeline/collect.rs

//! Incremental collection over the configured rules.
//!
//! Per rule: pick `since_id` from a fresh cursor, fetch every page, write
//! the merged result, advance the cursor and save the cursor store.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Credentials;
use crate::error::Result;
use crate::models::{Config, CursorRecord, CursorStoreMap, CursorUpdate, MergedResult, ResponsePage, Rule, RunStamp};
use crate::services::{
    BackoffPolicy, CursorStore, EndpointClient, HttpTransport, RequestParams, ResultWriter,
};
use crate::storage::ObjectStore;
use crate::utils::{http, log};

/// Everything one run needs, fixed before the first request.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Rules to collect, in order
    pub rules: Vec<Rule>,

    /// Query parameters shared by every rule
    pub base_params: RequestParams,

    /// Cursors older than this are not used as `since_id`
    pub recency_window: chrono::Duration,

    /// Run start; stamps output files and new cursors
    pub started_at: DateTime<Utc>,

    pub follow_pagination: bool,
    pub abort_on_rejection: bool,
}

impl RunPlan {
    /// Build the plan for a run starting at `started_at`.
    ///
    /// Development runs use the small page size and only the first rule.
    pub fn new(config: &Config, production: bool, started_at: DateTime<Utc>) -> Result<Self> {
        let rules = if production {
            config.rules.clone()
        } else {
            config.rules.iter().take(1).cloned().collect()
        };

        Ok(Self {
            rules,
            base_params: RequestParams::base(&config.endpoint.query, config.max_results(production)),
            recency_window: config.collection.recency_window()?,
            started_at,
            follow_pagination: config.collection.follow_pagination,
            abort_on_rejection: config.collection.abort_on_rejection,
        })
    }

    pub fn run_stamp(&self) -> RunStamp {
        RunStamp::new(self.started_at)
    }

    /// First-page parameters for `rule` given the stored cursors.
    pub fn first_page_params(&self, rule: &Rule, cursors: &CursorStoreMap) -> RequestParams {
        let params = self.base_params.for_rule(rule);
        match cursors.get(&rule.tag) {
            Some(record) if record.is_fresh(self.started_at, self.recency_window) => {
                ::log::info!("Cursor for '{}' is fresh, since_id={}", rule.tag, record.newest_id);
                params.with_since_id(&record.newest_id)
            }
            Some(record) => {
                ::log::info!(
                    "Cursor for '{}' is stale (newest item from {}), fetching the full window",
                    rule.tag,
                    record.created_at
                );
                params
            }
            None => {
                ::log::info!("No cursor for '{}', fetching the full window", rule.tag);
                params
            }
        }
    }
}

/// What happened to one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Pages fetched and written
    Collected {
        items: usize,
        pages: usize,
        cursor_advanced: bool,
    },
    /// Request failed; nothing written, cursor untouched
    Skipped { reason: String },
}

/// Outcomes of one run, in rule order.
#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub run_stamp: RunStamp,
    pub outcomes: Vec<(String, RuleOutcome)>,
}

impl CollectionSummary {
    pub fn rules_collected(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, RuleOutcome::Collected { .. }))
            .count()
    }

    pub fn rules_skipped(&self) -> usize {
        self.outcomes.len() - self.rules_collected()
    }

    pub fn items_collected(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                RuleOutcome::Collected { items, .. } => *items,
                RuleOutcome::Skipped { .. } => 0,
            })
            .sum()
    }

    pub fn outcome(&self, tag: &str) -> Option<&RuleOutcome> {
        self.outcomes.iter().find(|(t, _)| t == tag).map(|(_, o)| o)
    }

    fn print(&self) {
        let mut items = vec![
            ("Run", self.run_stamp.to_string()),
            ("Rules collected", self.rules_collected().to_string()),
            ("Rules skipped", self.rules_skipped().to_string()),
            ("Items collected", self.items_collected().to_string()),
        ];
        for (tag, outcome) in &self.outcomes {
            if let RuleOutcome::Skipped { reason } = outcome {
                items.push(("Skipped", format!("{tag}: {reason}")));
            }
        }
        log::summary("Collection", &items);
    }
}

/// Drives collection rule by rule.
pub struct Collector {
    client: EndpointClient,
    cursors: CursorStore,
    writer: ResultWriter,
}

impl Collector {
    pub fn new(client: EndpointClient, cursors: CursorStore, writer: ResultWriter) -> Self {
        Self {
            client,
            cursors,
            writer,
        }
    }

    /// Collect every rule of `plan`.
    ///
    /// Rejected or exhausted requests skip their rule unless the plan asks
    /// to abort; storage failures always end the run.
    pub async fn run(&self, plan: &RunPlan) -> Result<CollectionSummary> {
        log::header("Collecting recent search results");
        let mut cursors = self.cursors.load().await?;
        let stamp = plan.run_stamp();
        let total = plan.rules.len();
        let mut outcomes = Vec::with_capacity(total);

        for (i, rule) in plan.rules.iter().enumerate() {
            log::step(i + 1, total, &format!("Rule '{}'", rule.tag));
            let outcome = match self.collect_rule(plan, &stamp, rule, &mut cursors).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_rule_scoped() && !plan.abort_on_rejection => {
                    ::log::error!("Skipping rule '{}': {}", rule.tag, e);
                    RuleOutcome::Skipped {
                        reason: e.to_string(),
                    }
                }
                Err(e) => {
                    ::log::error!("Rule '{}' failed, stopping the run: {}", rule.tag, e);
                    return Err(e);
                }
            };
            outcomes.push((rule.tag.clone(), outcome));
        }

        let summary = CollectionSummary {
            run_stamp: stamp,
            outcomes,
        };
        summary.print();
        Ok(summary)
    }

    async fn collect_rule(
        &self,
        plan: &RunPlan,
        stamp: &RunStamp,
        rule: &Rule,
        cursors: &mut CursorStoreMap,
    ) -> Result<RuleOutcome> {
        let params = plan.first_page_params(rule, cursors);

        let first = self.client.fetch_page(&params).await?;
        let staged = staged_cursor(rule, &first, stamp);
        let mut next_token = first.meta.next_token.clone();
        let mut result = MergedResult::empty();
        result.merge(first);
        let mut pages = 1;

        while plan.follow_pagination {
            let Some(token) = next_token.take() else {
                break;
            };
            let page = self.client.fetch_page(&params.next_page(&token)).await?;
            next_token = page.meta.next_token.clone();
            result.merge(page);
            pages += 1;
        }
        log::sub_item(&format!("{} items over {} pages", result.data.len(), pages));

        self.writer.write(&rule.tag, stamp, &result).await?;

        let cursor_advanced = match staged {
            Some(record) => apply_cursor(cursors, &rule.tag, record),
            None => false,
        };
        self.cursors.save(cursors).await?;

        Ok(RuleOutcome::Collected {
            items: result.data.len(),
            pages,
            cursor_advanced,
        })
    }
}

/// Cursor candidate from the first page: its newest ID and that item's creation time.
fn staged_cursor(rule: &Rule, page: &ResponsePage, stamp: &RunStamp) -> Option<CursorRecord> {
    let newest_id = page.meta.newest_id.as_ref()?;
    let Some(created_at) = page.created_at_of(newest_id) else {
        ::log::warn!(
            "Newest item {} for '{}' is missing from the first page, cursor left as is",
            newest_id,
            rule.tag
        );
        return None;
    };
    Some(CursorRecord {
        newest_id: newest_id.clone(),
        created_at,
        collection_datetime: *stamp,
    })
}

fn apply_cursor(cursors: &mut CursorStoreMap, tag: &str, record: CursorRecord) -> bool {
    let newest_id = record.newest_id.clone();
    let update = cursors.advance(tag, record);
    match update {
        CursorUpdate::Created | CursorUpdate::Advanced => {
            ::log::info!("Cursor for '{}' now at {}", tag, newest_id);
        }
        CursorUpdate::Unchanged => {
            ::log::debug!("Cursor for '{}' unchanged at {}", tag, newest_id);
        }
        CursorUpdate::Refused => {
            ::log::warn!("Refusing to move cursor for '{}' back to {}", tag, newest_id);
        }
    }
    update.changed()
}

/// Collect with the live endpoint: checks config and credentials, then runs.
pub async fn run_collect(
    config: &Config,
    credentials: &Credentials,
    store: Arc<dyn ObjectStore>,
    production: bool,
) -> Result<CollectionSummary> {
    config.validate()?;

    let client = http::create_async_client(&config.endpoint)?;
    let transport = HttpTransport::new(client, &config.endpoint.url, credentials)?;
    let collector = Collector::new(
        EndpointClient::new(Arc::new(transport), BackoffPolicy::new(&config.retry)),
        CursorStore::new(store.clone(), &config.storage.raw_folder),
        ResultWriter::new(store, config.storage.raw_folder.clone()),
    );

    let plan = RunPlan::new(config, production, Utc::now())?;
    ::log::info!(
        "Collecting {} of {} rules (production={})",
        plan.rules.len(),
        config.rules.len(),
        production
    );
    collector.run(&plan).await
}
